use thiserror::Error;

/// Everything that can go wrong while loading a design, rendering its mask
/// or refining the result.
#[derive(Debug, Error)]
pub enum MaskError {
    /// An annotation of a known kind is missing a field it needs, or holds
    /// a value that cannot be drawn (odd point list, NaN, ...).
    #[error("annotation #{index} (id '{id}', kind '{kind}'): {reason}")]
    InvalidAnnotation {
        index: usize,
        id: String,
        kind: String,
        reason: String,
    },

    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("annotation #{index} (id '{id}'): no usable font for family '{family}'")]
    FontUnavailable {
        index: usize,
        id: String,
        family: String,
    },

    #[error("invalid design document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid data URI: {0}")]
    DataUri(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MaskError>;

impl MaskError {
    pub(crate) fn annotation(
        index: usize,
        id: &str,
        kind: &str,
        reason: impl Into<String>,
    ) -> Self {
        MaskError::InvalidAnnotation {
            index,
            id: id.to_string(),
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }
}
