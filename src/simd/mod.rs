//! Vector capability probe and lane primitives.
//!
//! The widest usable register width is detected once per process. Algorithms are written once as
//! generic loop bodies over [`Lanes`] and instantiated for the selected width, always followed by
//! a scalar remainder loop. Results do not depend on which width was selected beyond float
//! summation order.

use std::sync::OnceLock;

use wide::{CmpEq, CmpGt, f32x4, f32x8};

static LEVEL: OnceLock<SimdLevel> = OnceLock::new();

/// Vector register width usable at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SimdLevel {
    /// No hardware vector unit detected; lane types fall back to portable code.
    Portable,
    /// 128-bit registers (SSE2 / NEON).
    V128,
    /// 256-bit registers (AVX).
    V256,
}

impl SimdLevel {
    /// Detected level, probed once and cached.
    pub fn detect() -> Self {
        *LEVEL.get_or_init(probe)
    }

    /// Register width in bytes. The portable fallback models a 128-bit register.
    pub fn register_bytes(self) -> usize {
        match self {
            Self::Portable | Self::V128 => 16,
            Self::V256 => 32,
        }
    }

    /// Element count of `T` in one register at this level.
    pub fn lanes_of<T>(self) -> usize {
        self.register_bytes() / std::mem::size_of::<T>().max(1)
    }
}

fn probe() -> SimdLevel {
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx") {
            return SimdLevel::V256;
        }
        if std::arch::is_x86_feature_detected!("sse2") {
            return SimdLevel::V128;
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            return SimdLevel::V128;
        }
    }
    let level = SimdLevel::Portable;
    tracing::debug!(?level, "no hardware vector unit detected");
    level
}

/// `true` when a baseline hardware vector unit is available.
pub fn is_supported() -> bool {
    SimdLevel::detect() >= SimdLevel::V128
}

/// `true` when the widest supported vector unit is available.
pub fn is_wide_supported() -> bool {
    SimdLevel::detect() == SimdLevel::V256
}

/// Element count of `T` in the widest usable vector.
pub fn vector_count<T>() -> usize {
    SimdLevel::detect().lanes_of::<T>()
}

/// Fixed-width `f32` vector with the primitives the conversion and convolution loops need.
pub(crate) trait Lanes:
    Copy
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<Output = Self>
    + std::ops::Div<Output = Self>
{
    /// Number of `f32` lanes.
    const LANES: usize;

    fn splat(v: f32) -> Self;

    /// Load the first `LANES` values of `src`.
    fn load(src: &[f32]) -> Self;

    /// Store into the first `LANES` values of `dst`.
    fn store(self, dst: &mut [f32]);

    /// `self * m + a`.
    fn mul_add(self, m: Self, a: Self) -> Self;

    /// `self + load(mem) * m`.
    fn mul_add_mem(self, m: Self, mem: &[f32]) -> Self {
        Self::load(mem).mul_add(m, self)
    }

    /// Per lane, `t` where `mask` is set, else `f`.
    fn blend(mask: Self, t: Self, f: Self) -> Self;

    /// `lo + (hi - lo) * t`.
    fn lerp(lo: Self, hi: Self, t: Self) -> Self {
        (hi - lo).mul_add(t, lo)
    }

    fn hsum(self) -> f32;

    fn max(self, rhs: Self) -> Self;

    fn sqrt(self) -> Self;

    fn eq_mask(self, rhs: Self) -> Self;
}

macro_rules! impl_lanes {
    ($ty:ty, $n:literal) => {
        impl Lanes for $ty {
            const LANES: usize = $n;

            #[inline(always)]
            fn splat(v: f32) -> Self {
                <$ty>::splat(v)
            }

            #[inline(always)]
            fn load(src: &[f32]) -> Self {
                let mut a = [0.0f32; $n];
                a.copy_from_slice(&src[..$n]);
                <$ty>::from(a)
            }

            #[inline(always)]
            fn store(self, dst: &mut [f32]) {
                dst[..$n].copy_from_slice(&self.to_array());
            }

            #[inline(always)]
            fn mul_add(self, m: Self, a: Self) -> Self {
                <$ty>::mul_add(self, m, a)
            }

            #[inline(always)]
            fn blend(mask: Self, t: Self, f: Self) -> Self {
                mask.blend(t, f)
            }

            #[inline(always)]
            fn hsum(self) -> f32 {
                self.to_array().iter().sum()
            }

            #[inline(always)]
            fn max(self, rhs: Self) -> Self {
                <$ty>::max(self, rhs)
            }

            #[inline(always)]
            fn sqrt(self) -> Self {
                <$ty>::sqrt(self)
            }

            #[inline(always)]
            fn eq_mask(self, rhs: Self) -> Self {
                self.cmp_eq(rhs)
            }
        }
    };
}

impl_lanes!(f32x4, 4);
impl_lanes!(f32x8, 8);

/// Run `$body` with `$L` bound to the lane type for `$level`.
macro_rules! with_lanes {
    ($level:expr, $L:ident => $body:expr) => {
        match $level {
            $crate::simd::SimdLevel::V256 => {
                type $L = ::wide::f32x8;
                $body
            }
            $crate::simd::SimdLevel::V128 | $crate::simd::SimdLevel::Portable => {
                type $L = ::wide::f32x4;
                $body
            }
        }
    };
}

pub(crate) use with_lanes;

#[cfg(test)]
#[path = "../../tests/unit/simd/lanes.rs"]
mod tests;
