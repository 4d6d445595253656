//! Luma extraction.
//!
//! Companded inputs use BT.601 weights; linear-light inputs use BT.709 weights and are converted
//! back to a companded result. Byte and UQ15 inputs produce [`PixelFormat::Grey8`] with bit-exact
//! fixed-point math; float inputs produce [`PixelFormat::Grey32Float`].

use crate::convert::format::PixelFormat;
use crate::convert::{gamma, line_pixels, read_f32, read_u16, write_f32};
use crate::foundation::error::{ScaleError, ScaleResult};
use crate::foundation::math::{fix15_coef, unfix15_to_byte, unfix15_to_uq15};
use crate::simd::{Lanes, SimdLevel, with_lanes};

const B601: f64 = 0.114;
const G601: f64 = 0.587;
const R601: f64 = 0.299;
const B709: f64 = 0.0722;
const G709: f64 = 0.7152;
const R709: f64 = 0.2126;

const B601_FIX: i64 = fix15_coef(B601) as i64;
const G601_FIX: i64 = fix15_coef(G601) as i64;
const R601_FIX: i64 = fix15_coef(R601) as i64;
const B709_FIX: i64 = fix15_coef(B709) as i64;
const G709_FIX: i64 = fix15_coef(G709) as i64;
const R709_FIX: i64 = fix15_coef(R709) as i64;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Coefs {
    b: f32,
    g: f32,
    r: f32,
}

const BT601: Coefs = Coefs {
    b: B601 as f32,
    g: G601 as f32,
    r: R601 as f32,
};

const BT709: Coefs = Coefs {
    b: B709 as f32,
    g: G709 as f32,
    r: R709 as f32,
};

#[derive(Clone, Copy, Debug, PartialEq)]
enum GreyPath {
    Byte { channels: usize },
    LinearUq15 { channels: usize },
    Float { channels: usize, coefs: Coefs, linear: bool },
    GreyLinearUq15,
    GreyLinearFloat,
}

impl GreyPath {
    fn of(format: PixelFormat) -> ScaleResult<Self> {
        use PixelFormat as F;
        let path = match format {
            F::Bgr24 => Self::Byte { channels: 3 },
            F::Bgrx32 | F::Bgra32 | F::Pbgra32 => Self::Byte { channels: 4 },
            F::Bgr48LinearUq15 => Self::LinearUq15 { channels: 3 },
            F::Pbgra64LinearUq15 => Self::LinearUq15 { channels: 4 },
            F::Bgr96Float => Self::Float {
                channels: 3,
                coefs: BT601,
                linear: false,
            },
            F::Bgrx128Float | F::Bgra128Float | F::Pbgra128Float => Self::Float {
                channels: 4,
                coefs: BT601,
                linear: false,
            },
            F::Bgr96LinearFloat => Self::Float {
                channels: 3,
                coefs: BT709,
                linear: true,
            },
            F::Bgrx128LinearFloat | F::Pbgra128LinearFloat => Self::Float {
                channels: 4,
                coefs: BT709,
                linear: true,
            },
            F::Grey16LinearUq15 => Self::GreyLinearUq15,
            F::Grey32LinearFloat => Self::GreyLinearFloat,
            F::Grey8
            | F::Grey32Float
            | F::Y8
            | F::Cb8
            | F::Cr8
            | F::Cmyk32
            | F::Indexed8 => {
                return Err(ScaleError::unsupported_format(format!(
                    "no luma conversion from {format}"
                )));
            }
        };
        Ok(path)
    }

    fn output(self) -> PixelFormat {
        match self {
            Self::Byte { .. } | Self::LinearUq15 { .. } | Self::GreyLinearUq15 => PixelFormat::Grey8,
            Self::Float { .. } | Self::GreyLinearFloat => PixelFormat::Grey32Float,
        }
    }
}

/// Format-dispatching luma extraction.
#[derive(Clone, Copy, Debug)]
pub struct GreyConverter {
    level: SimdLevel,
}

impl Default for GreyConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl GreyConverter {
    /// Converter using the detected vector width.
    pub fn new() -> Self {
        Self::with_level(SimdLevel::detect())
    }

    /// Converter pinned to a specific vector width.
    pub fn with_level(level: SimdLevel) -> Self {
        Self { level }
    }

    /// Grey format produced for `format`.
    pub fn output_format(format: PixelFormat) -> ScaleResult<PixelFormat> {
        Ok(GreyPath::of(format)?.output())
    }

    /// Convert every whole pixel of `input` (in `format`) into `output`.
    pub fn convert_line(
        &self,
        format: PixelFormat,
        input: &[u8],
        output: &mut [u8],
    ) -> ScaleResult<()> {
        let path = GreyPath::of(format)?;
        let n = line_pixels(
            input,
            format.bytes_per_pixel(),
            output,
            path.output().bytes_per_pixel(),
        )?;
        let input = &input[..n * format.bytes_per_pixel()];

        match path {
            GreyPath::Byte { channels } => luma_byte(input, output, channels),
            GreyPath::LinearUq15 { channels } => luma_uq15(input, output, channels),
            GreyPath::Float {
                channels,
                coefs,
                linear,
            } => with_lanes!(self.level, L => luma_float::<L>(input, output, channels, coefs, linear)),
            GreyPath::GreyLinearUq15 => {
                for (px, out) in input.chunks_exact(2).zip(output.iter_mut()) {
                    *out = gamma::uq15_to_byte(read_u16(px));
                }
            }
            GreyPath::GreyLinearFloat => with_lanes!(self.level, L => sqrt_float::<L>(input, output)),
        }
        Ok(())
    }
}

fn luma_byte(input: &[u8], output: &mut [u8], channels: usize) {
    for (px, out) in input.chunks_exact(channels).zip(output.iter_mut()) {
        let y = i64::from(px[0]) * B601_FIX + i64::from(px[1]) * G601_FIX + i64::from(px[2]) * R601_FIX;
        *out = unfix15_to_byte(y);
    }
}

fn luma_uq15(input: &[u8], output: &mut [u8], channels: usize) {
    for (px, out) in input.chunks_exact(channels * 2).zip(output.iter_mut()) {
        let y = i64::from(read_u16(px)) * B709_FIX
            + i64::from(read_u16(&px[2..])) * G709_FIX
            + i64::from(read_u16(&px[4..])) * R709_FIX;
        *out = gamma::uq15_to_byte(unfix15_to_uq15(y));
    }
}

// The tail runs as a zero-padded vector so every pixel sees the same operation sequence.
fn luma_float<L: Lanes>(
    input: &[u8],
    output: &mut [u8],
    channels: usize,
    coefs: Coefs,
    linear: bool,
) {
    let stride = channels * 4;
    let n = input.len() / stride;
    let lanes = L::LANES;
    let (cb, cg, cr) = (L::splat(coefs.b), L::splat(coefs.g), L::splat(coefs.r));

    let mut b = [0.0f32; 8];
    let mut g = [0.0f32; 8];
    let mut r = [0.0f32; 8];
    let mut y = [0.0f32; 8];

    let mut i = 0;
    while i < n {
        let take = lanes.min(n - i);
        for k in 0..lanes {
            (b[k], g[k], r[k]) = if k < take {
                let px = &input[(i + k) * stride..];
                (read_f32(px), read_f32(&px[4..]), read_f32(&px[8..]))
            } else {
                (0.0, 0.0, 0.0)
            };
        }
        let mut v = L::load(&b) * cb;
        v = v.mul_add_mem(cg, &g);
        v = v.mul_add_mem(cr, &r);
        if linear {
            v = v.max(L::splat(0.0)).sqrt();
        }
        v.store(&mut y);
        for (k, &yk) in y[..take].iter().enumerate() {
            write_f32(&mut output[(i + k) * 4..], yk);
        }
        i += take;
    }
}

fn sqrt_float<L: Lanes>(input: &[u8], output: &mut [u8]) {
    let n = input.len() / 4;
    let lanes = L::LANES;
    let mut buf = [0.0f32; 8];

    let mut i = 0;
    while i + lanes <= n {
        for (k, v) in buf[..lanes].iter_mut().enumerate() {
            *v = read_f32(&input[(i + k) * 4..]);
        }
        L::load(&buf).max(L::splat(0.0)).sqrt().store(&mut buf);
        for (k, &v) in buf[..lanes].iter().enumerate() {
            write_f32(&mut output[(i + k) * 4..], v);
        }
        i += lanes;
    }
    for j in i..n {
        write_f32(&mut output[j * 4..], read_f32(&input[j * 4..]).max(0.0).sqrt());
    }
}

#[cfg(test)]
#[path = "../../tests/unit/convert/grey.rs"]
mod tests;
