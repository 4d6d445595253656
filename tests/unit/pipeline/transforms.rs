use super::*;
use crate::pipeline::source::MemorySource;

fn grey(width: u32, height: u32) -> Upstream {
    let data = (0..width * height).map(|v| v as u8).collect();
    Upstream::new(Box::new(
        MemorySource::new(width, height, PixelFormat::Grey8, data).unwrap(),
    ))
}

fn render(src: &mut dyn PixelSource) -> Vec<u8> {
    let row = src.width() as usize * src.format().bytes_per_pixel();
    let mut out = vec![0u8; row * src.height() as usize];
    src.fill_region(PixelArea::full(src.width(), src.height()), row, &mut out)
        .unwrap();
    out
}

#[test]
fn crop_translates_requests() {
    let mut crop = Crop::new(grey(4, 4), PixelArea::new(1, 2, 2, 2)).unwrap();
    assert_eq!((crop.width(), crop.height()), (2, 2));
    assert_eq!(render(&mut crop), [9, 10, 13, 14]);

    let mut px = [0u8; 1];
    crop.fill_region(PixelArea::new(1, 1, 1, 1), 1, &mut px).unwrap();
    assert_eq!(px, [14]);
}

#[test]
fn crop_outside_source_is_rejected() {
    let err = Crop::new(grey(4, 4), PixelArea::new(3, 0, 2, 1)).err().unwrap();
    assert!(matches!(err, ScaleError::Validation(_)));
}

#[test]
fn convert_format_widens_bytes() {
    let up = Upstream::new(Box::new(
        MemorySource::new(2, 1, PixelFormat::Grey8, vec![0, 255]).unwrap(),
    ));
    let mut conv = ConvertFormat::new(up, PixelFormat::Grey32Float).unwrap();
    let out = render(&mut conv);
    let vals: Vec<f32> = out
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    assert_eq!(vals, [0.0, 1.0]);
}

#[test]
fn convert_format_rejects_unknown_pair() {
    let err = ConvertFormat::new(grey(2, 2), PixelFormat::Cmyk32).err().unwrap();
    assert!(matches!(err, ScaleError::UnsupportedFormat(_)));
}

#[test]
fn to_grey_uses_bt601_weights() {
    let data = vec![0, 0, 255, 0, 255, 0, 255, 0, 0];
    let up = Upstream::new(Box::new(
        MemorySource::new(3, 1, PixelFormat::Bgr24, data).unwrap(),
    ));
    let mut g = ToGrey::new(up).unwrap();
    assert_eq!(g.format(), PixelFormat::Grey8);
    assert_eq!(render(&mut g), [76, 150, 29]);
}

#[test]
fn matte_flattens_transparent_pixels() {
    let data = vec![10, 20, 30, 255, 10, 20, 30, 0];
    let up = Upstream::new(Box::new(
        MemorySource::new(2, 1, PixelFormat::Bgra32, data).unwrap(),
    ));
    let mut m = Matte::new(up, MatteColor { b: 1, g: 2, r: 3 }).unwrap();
    assert_eq!(m.format(), PixelFormat::Bgrx32);
    assert_eq!(render(&mut m), [10, 20, 30, 255, 1, 2, 3, 255]);
}

#[test]
fn orient_rotates_and_mirrors() {
    // 3x2 source:
    // 0 1 2
    // 3 4 5
    let cases = [
        (Orientation::Normal, (3, 2), vec![0, 1, 2, 3, 4, 5]),
        (Orientation::FlipHorizontal, (3, 2), vec![2, 1, 0, 5, 4, 3]),
        (Orientation::FlipVertical, (3, 2), vec![3, 4, 5, 0, 1, 2]),
        (Orientation::Rotate180, (3, 2), vec![5, 4, 3, 2, 1, 0]),
        (Orientation::Transpose, (2, 3), vec![0, 3, 1, 4, 2, 5]),
        (Orientation::Rotate90, (2, 3), vec![3, 0, 4, 1, 5, 2]),
        (Orientation::Rotate270, (2, 3), vec![2, 5, 1, 4, 0, 3]),
        (Orientation::Transverse, (2, 3), vec![5, 2, 4, 1, 3, 0]),
    ];
    for (orientation, size, expected) in cases {
        let mut o = Orient::new(grey(3, 2), orientation);
        assert_eq!((o.width(), o.height()), size, "{orientation:?}");
        assert_eq!(render(&mut o), expected, "{orientation:?}");
    }
}

#[test]
fn orient_partial_region_matches_full_render() {
    let mut o = Orient::new(grey(5, 4), Orientation::Rotate90);
    let full = render(&mut o);
    let mut part = [0u8; 4];
    o.fill_region(PixelArea::new(1, 2, 2, 2), 2, &mut part).unwrap();
    let w = o.width() as usize;
    assert_eq!(part, [full[2 * w + 1], full[2 * w + 2], full[3 * w + 1], full[3 * w + 2]]);
}

#[test]
fn planar_chroma_is_not_interleaved() {
    assert!(ensure_interleaved(PixelFormat::Bgr24, "blur").is_ok());
    assert!(ensure_interleaved(PixelFormat::Y8, "blur").is_ok());
    let err = ensure_interleaved(PixelFormat::Cb8, "blur").unwrap_err();
    assert!(matches!(err, ScaleError::NotSupported(_)));
}
