use super::*;

fn floats(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

fn read_floats(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(read_f32).collect()
}

#[test]
fn resolution_table() {
    use PixelFormat as F;
    assert_eq!(Conversion::resolve(F::Bgr24, F::Bgr24).unwrap(), Conversion::Copy);
    assert_eq!(
        Conversion::resolve(F::Bgr24, F::Bgr96LinearFloat).unwrap(),
        Conversion::ByteToFloat { linear: true }
    );
    assert_eq!(
        Conversion::resolve(F::Bgra128Float, F::Bgra32).unwrap(),
        Conversion::FloatToByte { linear: false }
    );
    assert_eq!(
        Conversion::resolve(F::Grey8, F::Grey16LinearUq15).unwrap(),
        Conversion::ByteToUq15
    );
    assert_eq!(
        Conversion::resolve(F::Pbgra128Float, F::Bgra128Float).unwrap(),
        Conversion::Unpremultiply
    );
    assert!(matches!(
        Conversion::resolve(F::Bgr24, F::Cmyk32),
        Err(ScaleError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        FormatConverter::new(F::Indexed8, F::Bgr24),
        Err(ScaleError::UnsupportedFormat(_))
    ));
}

#[test]
fn companded_bytes_round_trip_through_float() {
    let input: Vec<u8> = (0..=255u8).flat_map(|v| [v, 255 - v, v / 2]).collect();
    let to_float = FormatConverter::new(PixelFormat::Bgr24, PixelFormat::Bgr96Float).unwrap();
    let to_byte = FormatConverter::new(PixelFormat::Bgr96Float, PixelFormat::Bgr24).unwrap();
    let mut mid = vec![0u8; input.len() * 4];
    let mut back = vec![0u8; input.len()];
    to_float.convert_line(&input, &mut mid).unwrap();
    to_byte.convert_line(&mid, &mut back).unwrap();
    assert_eq!(back, input);
    assert_eq!(read_f32(&mid[..4]), 0.0);
    assert_eq!(read_f32(&mid[4..]), 1.0);
}

#[test]
fn linear_bytes_round_trip_through_float() {
    let input: Vec<u8> = (0..=255u8).flat_map(|v| [v, v, 255 - v]).collect();
    let to_float =
        FormatConverter::new(PixelFormat::Bgr24, PixelFormat::Bgr96LinearFloat).unwrap();
    let to_byte =
        FormatConverter::new(PixelFormat::Bgr96LinearFloat, PixelFormat::Bgr24).unwrap();
    let mut mid = vec![0u8; input.len() * 4];
    let mut back = vec![0u8; input.len()];
    to_float.convert_line(&input, &mut mid).unwrap();
    to_byte.convert_line(&mid, &mut back).unwrap();
    assert_eq!(back, input);
    assert!((read_f32(&mid[128 * 12..]) - 0.2158).abs() < 1e-3);
}

#[test]
fn alpha_and_padding_channels_stay_linear() {
    let conv =
        FormatConverter::new(PixelFormat::Bgrx32, PixelFormat::Bgrx128LinearFloat).unwrap();
    let mut out = vec![0u8; 16];
    conv.convert_line(&[128, 128, 128, 128], &mut out).unwrap();
    let v = read_floats(&out);
    assert!((v[0] - gamma::byte_to_linear(128)).abs() < 1e-7);
    assert!((v[3] - 128.0 / 255.0).abs() < 1e-7);

    let conv = FormatConverter::new(PixelFormat::Bgra32, PixelFormat::Bgra128Float).unwrap();
    conv.convert_line(&[0, 51, 255, 102], &mut out).unwrap();
    assert_eq!(read_floats(&out), vec![0.0, 0.2, 1.0, 0.4]);
}

#[test]
fn uq15_round_trip() {
    let input: Vec<u8> = (0..=255u8).collect();
    let up = FormatConverter::new(PixelFormat::Grey8, PixelFormat::Grey16LinearUq15).unwrap();
    let down = FormatConverter::new(PixelFormat::Grey16LinearUq15, PixelFormat::Grey8).unwrap();
    let mut mid = vec![0u8; 512];
    let mut back = vec![0u8; 256];
    up.convert_line(&input, &mut mid).unwrap();
    down.convert_line(&mid, &mut back).unwrap();
    assert_eq!(back, input);
}

#[test]
fn premultiply_and_back_for_every_width() {
    let mut values = Vec::new();
    for i in 0..5 {
        values.extend_from_slice(&[0.5, 0.4, 0.2, i as f32 * 0.25]);
    }
    let input = floats(&values);

    for level in [SimdLevel::Portable, SimdLevel::V128, SimdLevel::V256] {
        let pre = FormatConverter::new(PixelFormat::Bgra128Float, PixelFormat::Pbgra128Float)
            .unwrap()
            .with_level(level);
        let un = FormatConverter::new(PixelFormat::Pbgra128Float, PixelFormat::Bgra128Float)
            .unwrap()
            .with_level(level);
        assert_eq!(pre.conversion(), Conversion::Premultiply);

        let mut mid = vec![0u8; input.len()];
        pre.convert_line(&input, &mut mid).unwrap();
        let p = read_floats(&mid);
        for i in 0..5 {
            let a = i as f32 * 0.25;
            assert_eq!(p[i * 4 + 3], a, "{level:?}");
            assert!((p[i * 4] - 0.5 * a).abs() < 1e-7);
            assert!((p[i * 4 + 2] - 0.2 * a).abs() < 1e-7);
        }

        let mut back = vec![0u8; input.len()];
        un.convert_line(&mid, &mut back).unwrap();
        let u = read_floats(&back);
        // Zero alpha unpremultiplies to zero color.
        assert_eq!(&u[..4], &[0.0, 0.0, 0.0, 0.0]);
        for i in 1..5 {
            assert!((u[i * 4] - 0.5).abs() < 1e-6, "{level:?} px {i}");
            assert!((u[i * 4 + 1] - 0.4).abs() < 1e-6);
        }
    }
}

#[test]
fn short_output_is_reported() {
    let conv = FormatConverter::new(PixelFormat::Bgr24, PixelFormat::Bgr96Float).unwrap();
    let mut out = vec![0u8; 11];
    assert!(matches!(
        conv.convert_line(&[1, 2, 3], &mut out),
        Err(ScaleError::BufferTooSmall(_))
    ));
}

#[test]
fn byte_matte_blends_by_alpha() {
    let matte = MatteColor { b: 10, g: 20, r: 30 };
    let mut line = [200, 100, 0, 0, 200, 100, 0, 255, 200, 100, 0, 128];
    matte_line(SimdLevel::detect(), PixelFormat::Bgra32, &mut line, matte).unwrap();
    assert_eq!(&line[..4], &[10, 20, 30, 255]);
    assert_eq!(&line[4..8], &[200, 100, 0, 255]);
    assert_eq!(line[8], 105);
    assert_eq!(line[11], 255);
}

#[test]
fn float_matte_matches_for_every_width() {
    let matte = MatteColor { b: 255, g: 0, r: 51 };
    let mut values = Vec::new();
    for i in 0..5 {
        values.extend_from_slice(&[0.0, 1.0, 0.6, i as f32 * 0.25]);
    }
    for level in [SimdLevel::Portable, SimdLevel::V256] {
        let mut line = floats(&values);
        matte_line(level, PixelFormat::Bgra128Float, &mut line, matte).unwrap();
        let v = read_floats(&line);
        for i in 0..5 {
            let a = i as f32 * 0.25;
            assert_eq!(v[i * 4 + 3], 1.0);
            assert!((v[i * 4] - (1.0 - a)).abs() < 1e-6);
            assert!((v[i * 4 + 1] - a).abs() < 1e-6);
            assert!((v[i * 4 + 2] - (0.2 + 0.4 * a)).abs() < 1e-6);
        }
    }
    assert_eq!(
        matte_output_format(PixelFormat::Bgra128Float).unwrap(),
        PixelFormat::Bgrx128Float
    );
    assert!(matte_line(SimdLevel::detect(), PixelFormat::Bgr24, &mut [0; 3], matte).is_err());
}

#[test]
fn byte_premultiply_round_trip() {
    assert_eq!(
        Conversion::resolve(PixelFormat::Bgra32, PixelFormat::Pbgra32).unwrap(),
        Conversion::Premultiply
    );
    let pre = FormatConverter::new(PixelFormat::Bgra32, PixelFormat::Pbgra32).unwrap();
    let un = FormatConverter::new(PixelFormat::Pbgra32, PixelFormat::Bgra32).unwrap();

    let input = [200, 100, 50, 255, 200, 100, 50, 128, 0, 255, 0, 0];
    let mut mid = [0u8; 12];
    pre.convert_line(&input, &mut mid).unwrap();
    assert_eq!(mid, [200, 100, 50, 255, 100, 50, 25, 128, 0, 0, 0, 0]);

    let mut back = [0u8; 12];
    un.convert_line(&mid, &mut back).unwrap();
    assert_eq!(&back[..4], &input[..4]);
    assert_eq!(&back[4..8], &[199, 100, 50, 128]);
    assert_eq!(&back[8..], &[0, 0, 0, 0]);
}

#[test]
fn unpremultiply_clamps_color_above_alpha() {
    let un = FormatConverter::new(PixelFormat::Pbgra32, PixelFormat::Bgra32).unwrap();
    let mut out = [0u8; 4];
    un.convert_line(&[90, 10, 0, 60], &mut out).unwrap();
    assert_eq!(out, [255, 43, 0, 60]);
}
