pub(crate) mod builder;
pub(crate) mod convolution;
pub(crate) mod image_source;
pub(crate) mod native;
pub(crate) mod planar;
pub(crate) mod profiler;
pub(crate) mod source;
pub(crate) mod transforms;
