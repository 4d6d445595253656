use std::sync::LazyLock;

use crate::foundation::math::{UQ15_ONE, clamp_to_uq15};

/// sRGB decode: companded unit value to linear light.
pub fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// sRGB encode: linear light to companded unit value.
pub fn linear_to_srgb(v: f32) -> f32 {
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

static BYTE_TO_LINEAR: LazyLock<[f32; 256]> =
    LazyLock::new(|| std::array::from_fn(|i| srgb_to_linear(i as f32 / 255.0)));

static BYTE_TO_UQ15: LazyLock<[u16; 256]> = LazyLock::new(|| {
    std::array::from_fn(|i| {
        (f64::from(BYTE_TO_LINEAR[i]) * f64::from(UQ15_ONE) + 0.5).floor() as u16
    })
});

static UQ15_TO_BYTE: LazyLock<Vec<u8>> = LazyLock::new(|| {
    (0..=UQ15_ONE)
        .map(|v| {
            let c = linear_to_srgb(v as f32 / UQ15_ONE as f32);
            (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        })
        .collect()
});

/// Linear value of a companded byte.
pub fn byte_to_linear(v: u8) -> f32 {
    BYTE_TO_LINEAR[usize::from(v)]
}

/// Linear UQ15 value of a companded byte.
pub fn byte_to_uq15(v: u8) -> u16 {
    BYTE_TO_UQ15[usize::from(v)]
}

/// Companded byte of a linear UQ15 value; out-of-range input clamps.
pub fn uq15_to_byte(v: u16) -> u8 {
    UQ15_TO_BYTE[clamp_to_uq15(i32::from(v))]
}

#[cfg(test)]
#[path = "../../tests/unit/convert/gamma.rs"]
mod tests;
