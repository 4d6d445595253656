use crate::convert::format::PixelFormat;
use crate::convert::{gamma, line_pixels, read_f32, read_u16, write_f32, write_u16};
use crate::foundation::error::{ScaleError, ScaleResult};
use crate::foundation::math::unit_to_byte;
use crate::simd::{Lanes, SimdLevel, with_lanes};

/// Per-pixel conversion between two formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conversion {
    /// Identical formats.
    Copy,
    /// 8-bit to float; `linear` decodes the sRGB curve on color channels.
    ByteToFloat {
        /// Decode to linear light.
        linear: bool,
    },
    /// Float to 8-bit; `linear` encodes the sRGB curve on color channels.
    FloatToByte {
        /// Source is linear light.
        linear: bool,
    },
    /// Companded 8-bit to linear UQ15.
    ByteToUq15,
    /// Linear UQ15 to companded 8-bit.
    Uq15ToByte,
    /// Straight to premultiplied alpha, 8-bit or float.
    Premultiply,
    /// Premultiplied to straight alpha, 8-bit or float.
    Unpremultiply,
}

impl Conversion {
    /// Resolve the conversion between `from` and `to`.
    pub fn resolve(from: PixelFormat, to: PixelFormat) -> ScaleResult<Self> {
        use PixelFormat as F;
        if from == to {
            return Ok(Self::Copy);
        }
        let conv = match (from, to) {
            (F::Grey8, F::Grey32Float)
            | (F::Bgr24, F::Bgr96Float)
            | (F::Bgrx32, F::Bgrx128Float)
            | (F::Bgra32, F::Bgra128Float)
            | (F::Pbgra32, F::Pbgra128Float) => Self::ByteToFloat { linear: false },
            (F::Grey8, F::Grey32LinearFloat)
            | (F::Bgr24, F::Bgr96LinearFloat)
            | (F::Bgrx32, F::Bgrx128LinearFloat) => Self::ByteToFloat { linear: true },
            (F::Grey32Float, F::Grey8)
            | (F::Bgr96Float, F::Bgr24)
            | (F::Bgrx128Float, F::Bgrx32)
            | (F::Bgra128Float, F::Bgra32)
            | (F::Pbgra128Float, F::Pbgra32) => Self::FloatToByte { linear: false },
            (F::Grey32LinearFloat, F::Grey8)
            | (F::Bgr96LinearFloat, F::Bgr24)
            | (F::Bgrx128LinearFloat, F::Bgrx32) => Self::FloatToByte { linear: true },
            (F::Grey8, F::Grey16LinearUq15) | (F::Bgr24, F::Bgr48LinearUq15) => Self::ByteToUq15,
            (F::Grey16LinearUq15, F::Grey8) | (F::Bgr48LinearUq15, F::Bgr24) => Self::Uq15ToByte,
            (F::Bgra32, F::Pbgra32) | (F::Bgra128Float, F::Pbgra128Float) => Self::Premultiply,
            (F::Pbgra32, F::Bgra32) | (F::Pbgra128Float, F::Bgra128Float) => Self::Unpremultiply,
            _ => {
                return Err(ScaleError::unsupported_format(format!(
                    "no conversion from {from} to {to}"
                )));
            }
        };
        Ok(conv)
    }
}

/// Bit-depth, transfer-function and alpha conversion over whole lines.
#[derive(Clone, Copy, Debug)]
pub struct FormatConverter {
    from: PixelFormat,
    to: PixelFormat,
    conversion: Conversion,
    level: SimdLevel,
}

impl FormatConverter {
    /// Converter between two formats, using the detected vector width.
    pub fn new(from: PixelFormat, to: PixelFormat) -> ScaleResult<Self> {
        Ok(Self {
            from,
            to,
            conversion: Conversion::resolve(from, to)?,
            level: SimdLevel::detect(),
        })
    }

    /// Pin the vector width.
    pub fn with_level(mut self, level: SimdLevel) -> Self {
        self.level = level;
        self
    }

    /// Resolved conversion kind.
    pub fn conversion(&self) -> Conversion {
        self.conversion
    }

    /// Convert every whole pixel of `input` into `output`.
    pub fn convert_line(&self, input: &[u8], output: &mut [u8]) -> ScaleResult<()> {
        let n = line_pixels(
            input,
            self.from.bytes_per_pixel(),
            output,
            self.to.bytes_per_pixel(),
        )?;
        let channels = self.from.channels();
        let alpha = channels == 4;
        let input = &input[..n * self.from.bytes_per_pixel()];
        let output = &mut output[..n * self.to.bytes_per_pixel()];

        match self.conversion {
            Conversion::Copy => output.copy_from_slice(input),
            Conversion::ByteToFloat { linear } => {
                for (i, (&v, out)) in input.iter().zip(output.chunks_exact_mut(4)).enumerate() {
                    let is_alpha = alpha && i % 4 == 3;
                    let f = if linear && !is_alpha {
                        gamma::byte_to_linear(v)
                    } else {
                        f32::from(v) / 255.0
                    };
                    write_f32(out, f);
                }
            }
            Conversion::FloatToByte { linear } => {
                for (i, (px, out)) in input.chunks_exact(4).zip(output.iter_mut()).enumerate() {
                    let is_alpha = alpha && i % 4 == 3;
                    let f = read_f32(px);
                    let f = if linear && !is_alpha {
                        gamma::linear_to_srgb(f.max(0.0))
                    } else {
                        f
                    };
                    *out = unit_to_byte(f);
                }
            }
            Conversion::ByteToUq15 => {
                for (&v, out) in input.iter().zip(output.chunks_exact_mut(2)) {
                    write_u16(out, gamma::byte_to_uq15(v));
                }
            }
            Conversion::Uq15ToByte => {
                for (px, out) in input.chunks_exact(2).zip(output.iter_mut()) {
                    *out = gamma::uq15_to_byte(read_u16(px));
                }
            }
            Conversion::Premultiply | Conversion::Unpremultiply => {
                let unpremultiply = self.conversion == Conversion::Unpremultiply;
                if self.from.bytes_per_pixel() == 4 {
                    alpha_byte(input, output, unpremultiply);
                } else {
                    with_lanes!(self.level, L => alpha_float::<L>(input, output, unpremultiply))
                }
            }
        }
        Ok(())
    }
}

fn alpha_byte(input: &[u8], output: &mut [u8], unpremultiply: bool) {
    for (src, dst) in input.chunks_exact(4).zip(output.chunks_exact_mut(4)) {
        let a = u32::from(src[3]);
        for (c, o) in src[..3].iter().zip(dst.iter_mut()) {
            let c = u32::from(*c);
            *o = match (unpremultiply, a) {
                (false, _) => (c * a + 127) / 255,
                (true, 0) => 0,
                (true, _) => ((c * 255 + a / 2) / a).min(255),
            } as u8;
        }
        dst[3] = src[3];
    }
}

// Lane mask selecting the alpha slot of each 4-channel pixel.
fn alpha_mask<L: Lanes>() -> L {
    let mut slots = [0.0f32; 8];
    for s in slots.iter_mut().skip(3).step_by(4) {
        *s = 1.0;
    }
    L::load(&slots).eq_mask(L::splat(1.0))
}

fn alpha_float<L: Lanes>(input: &[u8], output: &mut [u8], unpremultiply: bool) {
    let lanes = L::LANES;
    let floats = input.len() / 4;
    let mask = alpha_mask::<L>();
    let zero = L::splat(0.0);
    let one = L::splat(1.0);

    let mut px = [0.0f32; 8];
    let mut a = [0.0f32; 8];
    let mut i = 0;
    while i + lanes <= floats {
        for k in 0..lanes {
            px[k] = read_f32(&input[(i + k) * 4..]);
        }
        for k in 0..lanes {
            a[k] = px[k - k % 4 + 3];
        }
        let v = L::load(&px);
        let av = L::load(&a);
        let factor = if unpremultiply {
            L::blend(av.eq_mask(zero), zero, one / av)
        } else {
            av
        };
        L::blend(mask, v, v * factor).store(&mut px);
        for (k, &f) in px[..lanes].iter().enumerate() {
            write_f32(&mut output[(i + k) * 4..], f);
        }
        i += lanes;
    }

    for p in i / 4..floats / 4 {
        let base = p * 16;
        let alpha = read_f32(&input[base + 12..]);
        let factor = if !unpremultiply {
            alpha
        } else if alpha == 0.0 {
            0.0
        } else {
            1.0 / alpha
        };
        for c in 0..3 {
            let off = base + c * 4;
            write_f32(&mut output[off..], read_f32(&input[off..]) * factor);
        }
        write_f32(&mut output[base + 12..], alpha);
    }
}

/// Matte color as companded 8-bit BGR.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MatteColor {
    /// Blue.
    pub b: u8,
    /// Green.
    pub g: u8,
    /// Red.
    pub r: u8,
}

/// Opaque format produced by flattening `format` over a matte.
pub fn matte_output_format(format: PixelFormat) -> ScaleResult<PixelFormat> {
    match format {
        PixelFormat::Bgra32 => Ok(PixelFormat::Bgrx32),
        PixelFormat::Bgra128Float => Ok(PixelFormat::Bgrx128Float),
        other => Err(ScaleError::unsupported_format(format!(
            "matte requires straight alpha input, got {other}"
        ))),
    }
}

/// Flatten straight-alpha pixels over `matte` in place; alpha becomes opaque.
pub fn matte_line(
    level: SimdLevel,
    format: PixelFormat,
    line: &mut [u8],
    matte: MatteColor,
) -> ScaleResult<()> {
    matte_output_format(format)?;
    match format {
        PixelFormat::Bgra32 => {
            let m = [matte.b, matte.g, matte.r];
            for px in line.chunks_exact_mut(4) {
                let a = u32::from(px[3]);
                for (c, &mc) in px[..3].iter_mut().zip(&m) {
                    *c = ((u32::from(*c) * a + u32::from(mc) * (255 - a) + 127) / 255) as u8;
                }
                px[3] = 255;
            }
        }
        _ => with_lanes!(level, L => matte_float::<L>(line, matte)),
    }
    Ok(())
}

fn matte_float<L: Lanes>(line: &mut [u8], matte: MatteColor) {
    let lanes = L::LANES;
    let floats = line.len() / 16 * 4;
    let mvals = [
        f32::from(matte.b) / 255.0,
        f32::from(matte.g) / 255.0,
        f32::from(matte.r) / 255.0,
        1.0,
    ];
    let mut m = [0.0f32; 8];
    for (k, v) in m.iter_mut().enumerate() {
        *v = mvals[k % 4];
    }
    let mv = L::load(&m);
    let one = L::splat(1.0);
    let mask = alpha_mask::<L>();

    let mut px = [0.0f32; 8];
    let mut a = [0.0f32; 8];
    let mut i = 0;
    while i + lanes <= floats {
        for k in 0..lanes {
            px[k] = read_f32(&line[(i + k) * 4..]);
        }
        for k in 0..lanes {
            a[k] = px[k - k % 4 + 3];
        }
        let v = L::lerp(mv, L::load(&px), L::load(&a));
        L::blend(mask, one, v).store(&mut px);
        for (k, &f) in px[..lanes].iter().enumerate() {
            write_f32(&mut line[(i + k) * 4..], f);
        }
        i += lanes;
    }

    for p in i / 4..floats / 4 {
        let base = p * 16;
        let alpha = read_f32(&line[base + 12..]);
        for (c, &mc) in mvals[..3].iter().enumerate() {
            let off = base + c * 4;
            let v = read_f32(&line[off..]);
            write_f32(&mut line[off..], mc + (v - mc) * alpha);
        }
        write_f32(&mut line[base + 12..], 1.0);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/convert/format_converter.rs"]
mod tests;
