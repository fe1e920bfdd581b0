use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{OutputFormat, TimeRange};
use crate::session::DEFAULT_SIMILARITY_THRESHOLD;
use crate::staging::DEFAULT_STAGING_DIR;

/// Everything one run needs, fixed before the run starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: String,
    /// Candidates scoring below this against the last kept frame are kept.
    pub similarity_threshold: f64,
    pub format: OutputFormat,
    pub output_dir: PathBuf,
    pub document_name: String,
    pub timestamp_overlay: bool,
    pub quiet: bool,
    pub range: TimeRange,
    pub staging_dir: PathBuf,
}

impl RunConfig {
    /// Defaults: threshold 0.6, PNG output next to the video, whole video.
    pub fn for_video(input: impl Into<String>) -> Self {
        let input = input.into();
        let output_dir = default_output_dir(&input);
        let document_name = format!("{}.pdf", video_name(&input));
        Self {
            input,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            format: OutputFormat::ImageSet,
            output_dir,
            document_name,
            timestamp_overlay: false,
            quiet: false,
            range: TimeRange::full(),
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::InvalidArgument(format!(
                "similarity must be between 0 and 1, got {}",
                self.similarity_threshold
            )));
        }
        if self.document_name.is_empty() || self.document_name.contains(['/', '\\']) {
            return Err(Error::InvalidArgument(format!(
                "invalid document name: {:?}",
                self.document_name
            )));
        }
        if let Some(end) = self.range.end {
            if self.range.start >= end {
                return Err(Error::InvalidRange {
                    start: self.range.start,
                    end,
                });
            }
        }
        Ok(())
    }

    pub fn video_name(&self) -> String {
        video_name(&self.input)
    }

    /// Pixel burn-in during extraction; used for image-set runs.
    pub fn burn_in_frames(&self) -> bool {
        self.timestamp_overlay && self.format == OutputFormat::ImageSet
    }

    /// Text stamp per document page; used for document runs.
    pub fn stamp_pages(&self) -> bool {
        self.timestamp_overlay && self.format == OutputFormat::Document
    }

    pub fn image_set_dir(&self) -> PathBuf {
        self.output_dir.join(format!("{}_frames", self.video_name()))
    }

    pub fn document_path(&self) -> PathBuf {
        self.output_dir.join(&self.document_name)
    }
}

fn is_url(input: &str) -> bool {
    input.contains("://")
}

fn video_name(input: &str) -> String {
    let last = if is_url(input) {
        input
            .split(['?', '#'])
            .next()
            .unwrap_or(input)
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(input)
    } else {
        input
    };
    Path::new(last)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("video")
        .to_string()
}

fn default_output_dir(input: &str) -> PathBuf {
    if is_url(input) {
        return PathBuf::from(".");
    }
    Path::new(input)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
