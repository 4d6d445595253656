pub(crate) mod cache;
pub(crate) mod interpolator;
pub(crate) mod map;
