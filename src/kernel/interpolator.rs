use std::f64::consts::PI;
use std::fmt::Debug;
use std::sync::{Arc, LazyLock};

use crate::foundation::error::{ScaleError, ScaleResult};
use crate::foundation::fingerprint::StableHasher;

/// Continuous weighting function sampled by the kernel engine.
///
/// `value` is only evaluated for distances in `[0, support]`; implementations may assume `d >= 0`.
pub trait Interpolator: Debug + Send + Sync {
    /// Half-width in filter space beyond which the weight is zero.
    fn support(&self) -> f64;

    /// Weight at distance `d` from the sample center.
    fn value(&self, d: f64) -> f64;

    /// Stable identity for filters that are pure functions of their parameters.
    ///
    /// Filters returning `None` are never cached.
    fn unique_id(&self) -> Option<u128> {
        None
    }
}

fn identity(name: &str, params: &[f64]) -> u128 {
    let mut h = StableHasher::new();
    h.write_bytes(name.as_bytes());
    for &p in params {
        h.write_f64(p);
    }
    h.finish().0
}

/// Nearest neighbor.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointInterpolator;

impl Interpolator for PointInterpolator {
    fn support(&self) -> f64 {
        0.000_001
    }

    fn value(&self, _d: f64) -> f64 {
        1.0
    }

    fn unique_id(&self) -> Option<u128> {
        Some(identity("point", &[]))
    }
}

/// Box average.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoxInterpolator;

impl Interpolator for BoxInterpolator {
    fn support(&self) -> f64 {
        0.5
    }

    fn value(&self, d: f64) -> f64 {
        if d <= 0.5 { 1.0 } else { 0.0 }
    }

    fn unique_id(&self) -> Option<u128> {
        Some(identity("box", &[]))
    }
}

/// Triangle (bilinear).
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearInterpolator;

impl Interpolator for LinearInterpolator {
    fn support(&self) -> f64 {
        1.0
    }

    fn value(&self, d: f64) -> f64 {
        if d < 1.0 { 1.0 - d } else { 0.0 }
    }

    fn unique_id(&self) -> Option<u128> {
        Some(identity("linear", &[]))
    }
}

/// Mitchell-Netravali cubic family.
#[derive(Clone, Copy, Debug)]
pub struct CubicInterpolator {
    b: f64,
    c: f64,
    support: f64,
}

impl CubicInterpolator {
    /// Cubic with the given B and C parameters.
    pub fn new(b: f64, c: f64) -> Self {
        // B=0, C=0 is the Hermite cubic, which is zero beyond 1.
        let support = if b == 0.0 && c == 0.0 { 1.0 } else { 2.0 };
        Self { b, c, support }
    }

    /// B=0, C=0.5.
    pub fn catmull_rom() -> Self {
        Self::new(0.0, 0.5)
    }

    /// B=1/3, C=1/3.
    pub fn mitchell() -> Self {
        Self::new(1.0 / 3.0, 1.0 / 3.0)
    }

    /// B=1, C=0.
    pub fn b_spline() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl Interpolator for CubicInterpolator {
    fn support(&self) -> f64 {
        self.support
    }

    fn value(&self, d: f64) -> f64 {
        let (b, c) = (self.b, self.c);
        let v = if d < 1.0 {
            (12.0 - 9.0 * b - 6.0 * c) * d * d * d
                + (-18.0 + 12.0 * b + 6.0 * c) * d * d
                + (6.0 - 2.0 * b)
        } else if d < 2.0 {
            (-b - 6.0 * c) * d * d * d
                + (6.0 * b + 30.0 * c) * d * d
                + (-12.0 * b - 48.0 * c) * d
                + (8.0 * b + 24.0 * c)
        } else {
            0.0
        };
        v / 6.0
    }

    fn unique_id(&self) -> Option<u128> {
        Some(identity("cubic", &[self.b, self.c]))
    }
}

/// Windowed sinc with a configurable number of lobes.
#[derive(Clone, Copy, Debug)]
pub struct LanczosInterpolator {
    lobes: u32,
}

impl LanczosInterpolator {
    /// Lanczos window with `lobes` lobes (at least 1).
    pub fn new(lobes: u32) -> ScaleResult<Self> {
        if lobes == 0 {
            return Err(ScaleError::validation("lanczos lobes must be >= 1"));
        }
        Ok(Self { lobes })
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

impl Interpolator for LanczosInterpolator {
    fn support(&self) -> f64 {
        f64::from(self.lobes)
    }

    fn value(&self, d: f64) -> f64 {
        let lobes = f64::from(self.lobes);
        if d < lobes {
            sinc(d) * sinc(d / lobes)
        } else {
            0.0
        }
    }

    fn unique_id(&self) -> Option<u128> {
        Some(identity("lanczos", &[f64::from(self.lobes)]))
    }
}

/// Three-lobe piecewise cubic spline.
#[derive(Clone, Copy, Debug, Default)]
pub struct Spline36Interpolator;

impl Interpolator for Spline36Interpolator {
    fn support(&self) -> f64 {
        3.0
    }

    fn value(&self, d: f64) -> f64 {
        if d < 1.0 {
            ((13.0 / 11.0 * d - 453.0 / 209.0) * d - 3.0 / 209.0) * d + 1.0
        } else if d < 2.0 {
            let d = d - 1.0;
            ((-6.0 / 11.0 * d + 270.0 / 209.0) * d - 156.0 / 209.0) * d
        } else if d < 3.0 {
            let d = d - 2.0;
            ((1.0 / 11.0 * d - 45.0 / 209.0) * d + 26.0 / 209.0) * d
        } else {
            0.0
        }
    }

    fn unique_id(&self) -> Option<u128> {
        Some(identity("spline36", &[]))
    }
}

/// Gaussian with standard deviation `radius`, truncated at three deviations.
#[derive(Clone, Copy, Debug)]
pub struct GaussianInterpolator {
    radius: f64,
}

impl GaussianInterpolator {
    /// Gaussian with the given radius (> 0).
    pub fn new(radius: f64) -> ScaleResult<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ScaleError::validation("gaussian radius must be > 0"));
        }
        Ok(Self { radius })
    }

    /// Radius this filter was built with.
    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl Interpolator for GaussianInterpolator {
    fn support(&self) -> f64 {
        self.radius * 3.0
    }

    fn value(&self, d: f64) -> f64 {
        let r = self.radius;
        (-(d * d) / (2.0 * r * r)).exp() / (r * (2.0 * PI).sqrt())
    }

    fn unique_id(&self) -> Option<u128> {
        Some(identity("gaussian", &[self.radius]))
    }
}

/// Radii that have a shared [`GaussianInterpolator`] instance.
pub const CACHED_BLUR_RADII: [f64; 5] = [0.50, 0.60, 0.75, 1.00, 1.50];

static GAUSSIANS: LazyLock<Vec<Arc<dyn Interpolator>>> = LazyLock::new(|| {
    CACHED_BLUR_RADII
        .iter()
        .map(|&radius| Arc::new(GaussianInterpolator { radius }) as Arc<dyn Interpolator>)
        .collect()
});

/// Gaussian filter for `radius`, reusing a shared instance when the radius matches one of
/// [`CACHED_BLUR_RADII`] exactly.
pub fn gaussian(radius: f64) -> ScaleResult<Arc<dyn Interpolator>> {
    if let Some(pos) = CACHED_BLUR_RADII.iter().position(|&r| r == radius)
        && let Some(shared) = GAUSSIANS.get(pos)
    {
        return Ok(Arc::clone(shared));
    }
    Ok(Arc::new(GaussianInterpolator::new(radius)?))
}

/// A weighting function together with its blur factor.
#[derive(Clone, Debug)]
pub struct InterpolationSettings {
    /// Filter sampled by the kernel engine.
    pub weighting_function: Arc<dyn Interpolator>,
    /// Filter scale multiplier; `> 1` softens, `< 1` sharpens.
    pub blur: f64,
}

impl InterpolationSettings {
    /// Settings with an explicit blur factor.
    pub fn new(weighting_function: Arc<dyn Interpolator>, blur: f64) -> ScaleResult<Self> {
        if !blur.is_finite() || blur <= 0.0 {
            return Err(ScaleError::validation("interpolation blur must be > 0"));
        }
        Ok(Self {
            weighting_function,
            blur,
        })
    }

    fn unblurred(weighting_function: Arc<dyn Interpolator>) -> Self {
        Self {
            weighting_function,
            blur: 1.0,
        }
    }

    /// Nearest neighbor.
    pub fn nearest() -> Self {
        Self::unblurred(Arc::new(PointInterpolator))
    }

    /// Box average.
    pub fn average() -> Self {
        Self::unblurred(Arc::new(BoxInterpolator))
    }

    /// Bilinear.
    pub fn linear() -> Self {
        Self::unblurred(Arc::new(LinearInterpolator))
    }

    /// Catmull-Rom cubic.
    pub fn catmull_rom() -> Self {
        Self::unblurred(Arc::new(CubicInterpolator::catmull_rom()))
    }

    /// Mitchell-Netravali cubic.
    pub fn mitchell() -> Self {
        Self::unblurred(Arc::new(CubicInterpolator::mitchell()))
    }

    /// Cubic B-spline (smooth, no ringing).
    pub fn b_spline() -> Self {
        Self::unblurred(Arc::new(CubicInterpolator::b_spline()))
    }

    /// Three-lobe Lanczos.
    pub fn lanczos() -> Self {
        Self::unblurred(Arc::new(LanczosInterpolator { lobes: 3 }))
    }

    /// Spline36.
    pub fn spline36() -> Self {
        Self::unblurred(Arc::new(Spline36Interpolator))
    }

    /// `true` when the filter degenerates to nearest-neighbor sampling.
    pub fn is_point_sampler(&self) -> bool {
        self.weighting_function.support() < 0.1
    }
}

impl Default for InterpolationSettings {
    fn default() -> Self {
        Self::catmull_rom()
    }
}

/// Serializable filter choice for option files.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterKind {
    /// [`InterpolationSettings::nearest`].
    Nearest,
    /// [`InterpolationSettings::average`].
    Average,
    /// [`InterpolationSettings::linear`].
    Linear,
    /// [`InterpolationSettings::catmull_rom`].
    #[default]
    CatmullRom,
    /// [`InterpolationSettings::mitchell`].
    Mitchell,
    /// [`InterpolationSettings::b_spline`].
    BSpline,
    /// Lanczos with `lobes` lobes.
    Lanczos {
        /// Number of lobes.
        lobes: u32,
    },
    /// [`InterpolationSettings::spline36`].
    Spline36,
}

impl FilterKind {
    /// Resolve into interpolation settings with the given blur.
    pub fn to_settings(self, blur: f64) -> ScaleResult<InterpolationSettings> {
        let f: Arc<dyn Interpolator> = match self {
            Self::Nearest => Arc::new(PointInterpolator),
            Self::Average => Arc::new(BoxInterpolator),
            Self::Linear => Arc::new(LinearInterpolator),
            Self::CatmullRom => Arc::new(CubicInterpolator::catmull_rom()),
            Self::Mitchell => Arc::new(CubicInterpolator::mitchell()),
            Self::BSpline => Arc::new(CubicInterpolator::b_spline()),
            Self::Lanczos { lobes } => Arc::new(LanczosInterpolator::new(lobes)?),
            Self::Spline36 => Arc::new(Spline36Interpolator),
        };
        InterpolationSettings::new(f, blur)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/interpolator.rs"]
mod tests;
