use thiserror::Error;

/// Failures of the tiling and aggregation core.
///
/// Configuration, IO and encoding problems outside the core are reported
/// through `anyhow` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoverageError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Unsupported resolution {0} (expected 0-15)")]
    UnsupportedResolution(u8),

    #[error("Tiling failed: {0}")]
    TilingFailure(String),

    #[error("Cancelled before tiling started")]
    Cancelled,
}

impl CoverageError {
    /// Whether the error aborts a country regardless of the failure policy.
    pub fn is_fatal_for_country(&self) -> bool {
        !matches!(self, CoverageError::TilingFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, CoverageError>;
