use std::fmt;

/// Numeric encoding of a channel value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumericRepresentation {
    /// Unsigned integer, full range.
    UnsignedInteger,
    /// Unsigned fixed point with 15 fraction bits (`0..=32768`).
    Fixed,
    /// IEEE 32-bit float, nominal range `0.0..=1.0`.
    Float,
    /// Palette index.
    Indexed,
}

/// How transparency is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlphaRepresentation {
    /// No alpha channel, or a padding channel.
    None,
    /// Straight alpha.
    Unassociated,
    /// Premultiplied alpha.
    Associated,
}

/// Color model of the channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorRepresentation {
    /// Blue, green, red in memory order.
    Bgr,
    /// Single luminance channel.
    Grey,
    /// Cyan, magenta, yellow, key.
    Cmyk,
    /// Luma plane of a planar YCbCr image.
    Y,
    /// Blue-difference chroma plane.
    Cb,
    /// Red-difference chroma plane.
    Cr,
}

/// Transfer function of the stored values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Linearity {
    /// Gamma encoded (sRGB curve).
    Companded,
    /// Proportional to light intensity.
    Linear,
}

/// Static description of a [`PixelFormat`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FormatDesc {
    /// Display name.
    pub name: &'static str,
    /// Channels per pixel, including alpha or padding.
    pub channels: usize,
    /// Bits per channel.
    pub bits_per_channel: usize,
    /// Channel encoding.
    pub numeric: NumericRepresentation,
    /// Alpha storage.
    pub alpha: AlphaRepresentation,
    /// Color model.
    pub color: ColorRepresentation,
    /// Transfer function.
    pub linearity: Linearity,
}

impl FormatDesc {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        self.channels * self.bits_per_channel / 8
    }

    /// Bytes per channel value.
    pub fn bytes_per_channel(&self) -> usize {
        self.bits_per_channel / 8
    }

    /// `true` when the format carries meaningful transparency.
    pub fn has_alpha(&self) -> bool {
        self.alpha != AlphaRepresentation::None
    }
}

/// Closed set of pixel encodings the pipeline understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    /// 8-bit grey.
    Grey8,
    /// Linear-light grey, UQ15 in 16 bits.
    Grey16LinearUq15,
    /// Companded float grey.
    Grey32Float,
    /// Linear-light float grey.
    Grey32LinearFloat,
    /// 8-bit luma plane.
    Y8,
    /// 8-bit blue-difference plane.
    Cb8,
    /// 8-bit red-difference plane.
    Cr8,
    /// 8-bit BGR.
    Bgr24,
    /// Linear-light BGR, UQ15 in 16 bits.
    Bgr48LinearUq15,
    /// Companded float BGR.
    Bgr96Float,
    /// Linear-light float BGR.
    Bgr96LinearFloat,
    /// 8-bit BGR with a padding byte.
    Bgrx32,
    /// 8-bit BGRA, straight alpha.
    Bgra32,
    /// 8-bit BGRA, premultiplied alpha.
    Pbgra32,
    /// Linear-light premultiplied BGRA, UQ15 in 16 bits.
    Pbgra64LinearUq15,
    /// Companded float BGR with a padding channel.
    Bgrx128Float,
    /// Linear-light float BGR with a padding channel.
    Bgrx128LinearFloat,
    /// Companded float BGRA, straight alpha.
    Bgra128Float,
    /// Companded float BGRA, premultiplied alpha.
    Pbgra128Float,
    /// Linear-light float BGRA, premultiplied alpha.
    Pbgra128LinearFloat,
    /// 8-bit CMYK.
    Cmyk32,
    /// 8-bit palette index.
    Indexed8,
}

macro_rules! desc {
    ($name:literal, $ch:literal, $bits:literal, $num:ident, $alpha:ident, $color:ident, $lin:ident) => {
        FormatDesc {
            name: $name,
            channels: $ch,
            bits_per_channel: $bits,
            numeric: NumericRepresentation::$num,
            alpha: AlphaRepresentation::$alpha,
            color: ColorRepresentation::$color,
            linearity: Linearity::$lin,
        }
    };
}

impl PixelFormat {
    /// Static descriptor.
    pub const fn desc(self) -> FormatDesc {
        match self {
            Self::Grey8 => desc!("Grey8", 1, 8, UnsignedInteger, None, Grey, Companded),
            Self::Grey16LinearUq15 => desc!("Grey16LinearUq15", 1, 16, Fixed, None, Grey, Linear),
            Self::Grey32Float => desc!("Grey32Float", 1, 32, Float, None, Grey, Companded),
            Self::Grey32LinearFloat => desc!("Grey32LinearFloat", 1, 32, Float, None, Grey, Linear),
            Self::Y8 => desc!("Y8", 1, 8, UnsignedInteger, None, Y, Companded),
            Self::Cb8 => desc!("Cb8", 1, 8, UnsignedInteger, None, Cb, Companded),
            Self::Cr8 => desc!("Cr8", 1, 8, UnsignedInteger, None, Cr, Companded),
            Self::Bgr24 => desc!("Bgr24", 3, 8, UnsignedInteger, None, Bgr, Companded),
            Self::Bgr48LinearUq15 => desc!("Bgr48LinearUq15", 3, 16, Fixed, None, Bgr, Linear),
            Self::Bgr96Float => desc!("Bgr96Float", 3, 32, Float, None, Bgr, Companded),
            Self::Bgr96LinearFloat => desc!("Bgr96LinearFloat", 3, 32, Float, None, Bgr, Linear),
            Self::Bgrx32 => desc!("Bgrx32", 4, 8, UnsignedInteger, None, Bgr, Companded),
            Self::Bgra32 => desc!("Bgra32", 4, 8, UnsignedInteger, Unassociated, Bgr, Companded),
            Self::Pbgra32 => desc!("Pbgra32", 4, 8, UnsignedInteger, Associated, Bgr, Companded),
            Self::Pbgra64LinearUq15 => {
                desc!("Pbgra64LinearUq15", 4, 16, Fixed, Associated, Bgr, Linear)
            }
            Self::Bgrx128Float => desc!("Bgrx128Float", 4, 32, Float, None, Bgr, Companded),
            Self::Bgrx128LinearFloat => {
                desc!("Bgrx128LinearFloat", 4, 32, Float, None, Bgr, Linear)
            }
            Self::Bgra128Float => desc!("Bgra128Float", 4, 32, Float, Unassociated, Bgr, Companded),
            Self::Pbgra128Float => desc!("Pbgra128Float", 4, 32, Float, Associated, Bgr, Companded),
            Self::Pbgra128LinearFloat => {
                desc!("Pbgra128LinearFloat", 4, 32, Float, Associated, Bgr, Linear)
            }
            Self::Cmyk32 => desc!("Cmyk32", 4, 8, UnsignedInteger, None, Cmyk, Companded),
            Self::Indexed8 => desc!("Indexed8", 1, 8, Indexed, None, Bgr, Companded),
        }
    }

    /// Bytes per pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        let d = self.desc();
        d.channels * d.bits_per_channel / 8
    }

    /// Channels per pixel.
    pub const fn channels(self) -> usize {
        self.desc().channels
    }

    /// `true` for single-plane chroma/luma formats of a planar image.
    pub fn is_planar_component(self) -> bool {
        matches!(
            self.desc().color,
            ColorRepresentation::Y | ColorRepresentation::Cb | ColorRepresentation::Cr
        )
    }

    /// `true` for single-channel grey or luma formats.
    pub fn is_grey(self) -> bool {
        matches!(
            self.desc().color,
            ColorRepresentation::Grey | ColorRepresentation::Y
        )
    }

    /// Premultiplied counterpart of a straight-alpha format, `None` for every other format.
    pub fn premultiplied(self) -> Option<Self> {
        match self {
            Self::Bgra32 => Some(Self::Pbgra32),
            Self::Bgra128Float => Some(Self::Pbgra128Float),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.desc().name)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/convert/format.rs"]
mod tests;
