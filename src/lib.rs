//! sharpscale is a lazy, pull-based image resampling pipeline.
//!
//! A chain of [`PixelSource`] stages is assembled with [`PipelineBuilder`] over a leaf source
//! (an in-memory buffer or a decoded [`image::DynamicImage`]). Nothing is computed until an
//! encoder pulls a rectangle from the final stage; each stage then pulls exactly the upstream
//! region it needs.
//!
//! # Building blocks
//!
//! 1. **Kernels**: [`KernelMap`] turns an [`Interpolator`] and a pair of axis lengths into a
//!    normalized, edge-folded, deduplicated weight table.
//! 2. **Kernel cache**: [`KernelCache`] shares maps between stages and pipelines by content key.
//! 3. **Conversion**: [`FormatConverter`] and [`GreyConverter`] transform whole lines between
//!    [`PixelFormat`]s using the widest available vector unit.
//! 4. **Stages**: crop, resize, blur, format conversion, luma extraction, matte, orientation and
//!    planar YCbCr merging.
//!
//! The key constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate; vector code goes through `wide`.
//! - **Bit-exact fixed point**: byte formats are convolved with Q15 weights that sum to exactly
//!   one, so constant regions stay constant.
//! - **Deterministic keys**: cache keys and artifact names are stable across runs.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod convert;
mod foundation;
mod kernel;
mod pipeline;
mod simd;

pub use convert::format::{
    AlphaRepresentation, ColorRepresentation, FormatDesc, Linearity, NumericRepresentation,
    PixelFormat,
};
pub use convert::format_converter::{
    Conversion, FormatConverter, MatteColor, matte_line, matte_output_format,
};
pub use convert::gamma::{linear_to_srgb, srgb_to_linear};
pub use convert::grey::GreyConverter;
pub use foundation::core::{FrameInfo, Orientation, PixelArea};
pub use foundation::error::{ScaleError, ScaleResult};
pub use foundation::fingerprint::{CacheKey, DIGEST_LENGTH, content_hash, encode_base32_digest};
pub use foundation::pool::{BufferPool, BufferPoolOpts, BufferPoolStats, PooledBuffer};
pub use kernel::cache::{KernelCache, KernelCacheOpts, KernelCacheStats};
pub use kernel::interpolator::{
    BoxInterpolator, CACHED_BLUR_RADII, CubicInterpolator, FilterKind, GaussianInterpolator,
    InterpolationSettings, Interpolator, LanczosInterpolator, LinearInterpolator,
    PointInterpolator, Spline36Interpolator, gaussian,
};
pub use kernel::map::{KernelMap, KernelView, KernelWeight};
pub use pipeline::builder::{Pipeline, PipelineBuilder, PipelineOpts, process_batch};
pub use pipeline::convolution::Convolution;
pub use pipeline::image_source::ImageSource;
pub use pipeline::native::{Delegation, NativeTransforms};
pub use pipeline::planar::{Planes, YccMerge};
pub use pipeline::profiler::{PixelSourceStats, SourceProfiler};
pub use pipeline::source::{MemorySource, PixelSource, Upstream, check_region};
pub use pipeline::transforms::{ConvertFormat, Crop, Matte, Orient, ToGrey};
pub use simd::{SimdLevel, is_supported, is_wide_supported, vector_count};
