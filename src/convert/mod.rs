pub(crate) mod format;
pub(crate) mod format_converter;
pub(crate) mod gamma;
pub(crate) mod grey;

use crate::foundation::error::{ScaleError, ScaleResult};

pub(crate) fn read_f32(b: &[u8]) -> f32 {
    f32::from_ne_bytes([b[0], b[1], b[2], b[3]])
}

pub(crate) fn write_f32(b: &mut [u8], v: f32) {
    b[..4].copy_from_slice(&v.to_ne_bytes());
}

pub(crate) fn read_u16(b: &[u8]) -> u16 {
    u16::from_ne_bytes([b[0], b[1]])
}

pub(crate) fn write_u16(b: &mut [u8], v: u16) {
    b[..2].copy_from_slice(&v.to_ne_bytes());
}

/// Pixel count of `input` and a check that `output` can hold it at `out_bpp`.
pub(crate) fn line_pixels(
    input: &[u8],
    in_bpp: usize,
    output: &[u8],
    out_bpp: usize,
) -> ScaleResult<usize> {
    let pixels = input.len() / in_bpp;
    let needed = pixels * out_bpp;
    if output.len() < needed {
        return Err(ScaleError::buffer_too_small(format!(
            "output line holds {} bytes, {needed} required",
            output.len()
        )));
    }
    Ok(pixels)
}
