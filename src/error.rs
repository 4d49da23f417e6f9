use thiserror::Error;

/// Failure of a single render call.
///
/// Errors never leave a partially drawn surface behind: the surface is owned by
/// the failing call and is dropped with it.
#[derive(Debug, Error)]
pub enum CompositeError {
    /// Missing or malformed request fields.
    #[error("{0}")]
    Validation(String),
    /// The image source could not be fetched or is not a supported raster.
    #[error("failed to decode image: {0}")]
    Decode(String),
    /// Non-finite or out-of-range numeric layer fields.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// The font database has no usable face at all.
    #[error("no usable font: {0}")]
    FontUnavailable(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
}

impl CompositeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry(message.into())
    }

    /// True when the caller sent bad input, as opposed to a decode/encode or
    /// environment failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidGeometry(_))
    }
}
