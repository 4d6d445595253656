use crate::convert::format::PixelFormat;
use crate::foundation::core::{Orientation, PixelArea};
use crate::foundation::error::ScaleResult;
use crate::pipeline::source::PixelSource;

/// Outcome of offering a transform to a platform codec.
pub enum Delegation {
    /// The codec applied the transform; continue from the returned source.
    Handled(Box<dyn PixelSource>),
    /// The codec cannot apply it; the source is handed back untouched.
    Declined(Box<dyn PixelSource>),
}

/// Hook for codecs that can apply transforms natively while decoding.
///
/// The builder offers each supported operation to the hook before appending its own stage. Every
/// method defaults to declining.
pub trait NativeTransforms: Send + Sync {
    /// Crop to `area`.
    fn crop(&self, source: Box<dyn PixelSource>, area: PixelArea) -> ScaleResult<Delegation> {
        let _ = area;
        Ok(Delegation::Declined(source))
    }

    /// Scale to `width x height`.
    fn scale(
        &self,
        source: Box<dyn PixelSource>,
        width: u32,
        height: u32,
    ) -> ScaleResult<Delegation> {
        let _ = (width, height);
        Ok(Delegation::Declined(source))
    }

    /// Correct a stored `orientation`.
    fn orient(
        &self,
        source: Box<dyn PixelSource>,
        orientation: Orientation,
    ) -> ScaleResult<Delegation> {
        let _ = orientation;
        Ok(Delegation::Declined(source))
    }

    /// Convert to `format`.
    fn convert(&self, source: Box<dyn PixelSource>, format: PixelFormat) -> ScaleResult<Delegation> {
        let _ = format;
        Ok(Delegation::Declined(source))
    }
}
