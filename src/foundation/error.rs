/// Convenience result type used across sharpscale.
pub type ScaleResult<T> = Result<T, ScaleError>;

/// Top-level error taxonomy used by pipeline, kernel and conversion APIs.
///
/// None of these are retried internally; every error surfaces synchronously to the caller of the
/// operation that detected it.
#[derive(thiserror::Error, Debug)]
pub enum ScaleError {
    /// A conversion or capability routine was asked to handle a pixel encoding outside its table.
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// A destination buffer is smaller than the operation requires.
    #[error("buffer too small: {0}")]
    BufferTooSmall(String),

    /// The transform chain lacks an upstream capability the operation needs.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A kernel map was accessed after its last reference was released.
    #[error("use of disposed resource: {0}")]
    Disposed(String),

    /// Invalid caller-provided geometry, sizes or settings.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when serializing or deserializing options.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScaleError {
    /// Build a [`ScaleError::UnsupportedFormat`] value.
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Build a [`ScaleError::BufferTooSmall`] value.
    pub fn buffer_too_small(msg: impl Into<String>) -> Self {
        Self::BufferTooSmall(msg.into())
    }

    /// Build a [`ScaleError::NotSupported`] value.
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Build a [`ScaleError::Disposed`] value.
    pub fn disposed(msg: impl Into<String>) -> Self {
        Self::Disposed(msg.into())
    }

    /// Build a [`ScaleError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ScaleError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
