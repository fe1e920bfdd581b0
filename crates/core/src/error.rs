use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid time range: start {start}s must be before end {end}s")]
    InvalidRange { start: u64, end: u64 },

    #[error("time range starting at {start}s does not overlap the video ({duration:.1}s long)")]
    RangeOutsideVideo { start: u64, duration: f64 },

    #[error("cannot read video: {0}")]
    Source(String),

    #[error("failed to stage frame {}: {reason}", .path.display())]
    Stage { path: PathBuf, reason: String },

    #[error("failed to render timestamp overlay: {0}")]
    Overlay(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Errors caused by the requested settings rather than by the video or the
    /// filesystem.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument(_) | Error::InvalidRange { .. } | Error::RangeOutsideVideo { .. }
        )
    }
}
