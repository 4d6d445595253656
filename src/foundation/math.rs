/// One in unsigned Q15 fixed point.
pub(crate) const UQ15_ONE: i32 = 1 << 15;

/// Rounding bias added before a Q15 right shift.
pub(crate) const UQ15_ROUND: i32 = 1 << 14;

/// Scale a unit float to Q15 with round-half-up semantics.
///
/// `floor(x * 2^15 + 0.5)`; this must stay bit-exact with the integer coefficient tables.
pub(crate) fn fix15(x: f32) -> i32 {
    (f64::from(x) * f64::from(UQ15_ONE) + 0.5).floor() as i32
}

/// Q15 coefficient for a luma weight, as `(u16)(c * 32768 + 0.5)`.
pub(crate) const fn fix15_coef(c: f64) -> u32 {
    (c * UQ15_ONE as f64 + 0.5) as u16 as u32
}

/// Drop Q15 fraction bits with rounding, clamping to a byte.
pub(crate) fn unfix15_to_byte(x: i64) -> u8 {
    ((x + i64::from(UQ15_ROUND)) >> 15).clamp(0, 255) as u8
}

/// Drop Q15 fraction bits with rounding, clamping to `[0, UQ15_ONE]`.
pub(crate) fn unfix15_to_uq15(x: i64) -> u16 {
    ((x + i64::from(UQ15_ROUND)) >> 15).clamp(0, i64::from(UQ15_ONE)) as u16
}

/// Clamp to `[0, UQ15_ONE]` for table lookups.
pub(crate) fn clamp_to_uq15(x: i32) -> usize {
    x.clamp(0, UQ15_ONE) as usize
}

pub(crate) fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Clamp a unit float and scale to a byte with round-half-up.
pub(crate) fn unit_to_byte(x: f32) -> u8 {
    (x.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
