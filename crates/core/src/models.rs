use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use image::RgbImage;

use crate::error::{Error, Result};
use crate::naming::parse_hms;

/// Spelling of an open-ended range end on the command line.
pub const UNBOUNDED_TOKEN: &str = "INFINITY";

/// Section of the video to scan, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: u64,
    /// `None` scans to the end of the stream.
    pub end: Option<u64>,
}

impl TimeRange {
    pub fn new(start: u64, end: Option<u64>) -> Result<Self> {
        if let Some(end) = end {
            if start >= end {
                return Err(Error::InvalidRange { start, end });
            }
        }
        Ok(Self { start, end })
    }

    pub fn full() -> Self {
        Self {
            start: 0,
            end: None,
        }
    }

    /// Parses `HH:MM:SS` bounds. The end also accepts `INFINITY` or `unbounded`.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let start = parse_hms(start)?;
        let end = if end.eq_ignore_ascii_case(UNBOUNDED_TOKEN) || end.eq_ignore_ascii_case("unbounded")
        {
            None
        } else {
            Some(parse_hms(end)?)
        };
        Self::new(start, end)
    }

    /// Fails when the range starts at or after the end of the video.
    pub fn check_overlap(&self, meta: &VideoMeta) -> Result<()> {
        let duration = meta.duration();
        if self.start as f64 >= duration {
            return Err(Error::RangeOutsideVideo {
                start: self.start,
                duration,
            });
        }
        Ok(())
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::full()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMeta {
    pub frame_rate: f64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
}

impl VideoMeta {
    pub fn duration(&self) -> f64 {
        if self.frame_rate > 0.0 {
            self.frame_count as f64 / self.frame_rate
        } else {
            0.0
        }
    }

    /// Rejects sources that reported no frames or no usable rate.
    pub fn validate(&self, input: &str) -> Result<()> {
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(Error::Source(format!(
                "could not detect a frame rate for {input}"
            )));
        }
        if self.frame_count == 0 {
            return Err(Error::Source(format!(
                "no frames found in {input}, check that the path or URL is correct"
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::Source(format!(
                "could not detect the resolution of {input}"
            )));
        }
        Ok(())
    }
}

/// A sampled frame proposed to the session.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// 1-based count of frames read since the start of the range.
    pub frame_index: u64,
    /// Presentation time in seconds.
    pub time: f64,
    pub image: RgbImage,
}

impl Candidate {
    pub fn timestamp(&self) -> u64 {
        self.time.max(0.0) as u64
    }
}

/// Score recorded for an accepted frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameScore {
    /// First frame of a run; nothing to compare against. Encoded as `0`.
    First,
    Measured(f64),
}

impl FrameScore {
    pub fn value(&self) -> f64 {
        match self {
            FrameScore::First => 0.0,
            FrameScore::Measured(v) => *v,
        }
    }
}

impl fmt::Display for FrameScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameScore::First => f.write_str("0"),
            FrameScore::Measured(v) => {
                // Precision formatting rounds the exact binary value half to even.
                let mut text = format!("{v:.2}");
                if text.ends_with('0') {
                    text.pop();
                }
                f.write_str(&text)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcceptedFrame {
    pub timestamp: u64,
    pub score: FrameScore,
    pub image: RgbImage,
}

/// An accepted frame as it sits in the staging area.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFrame {
    pub path: PathBuf,
    pub timestamp: u64,
    pub score: FrameScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    ImageSet,
    Document,
}

#[derive(Debug, Clone)]
pub struct ExtractProgress {
    pub frames_read: u64,
    pub frame_budget: u64,
    pub candidates: u64,
    pub accepted: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    pub frames_read: u64,
    pub candidates: u64,
    pub accepted: u64,
    pub elapsed: Duration,
}

impl ExtractReport {
    pub fn summary(&self, quiet: bool) -> String {
        if quiet {
            format!("Extracted {} frames", self.accepted)
        } else {
            format!(
                "Extracted {} frames in {:.1}s",
                self.accepted,
                self.elapsed.as_secs_f64()
            )
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExportReport {
    ImageSet { directory: PathBuf, written: usize },
    Document { path: PathBuf, pages: usize, bytes: u64 },
}

impl ExportReport {
    pub fn destination(&self) -> &PathBuf {
        match self {
            ExportReport::ImageSet { directory, .. } => directory,
            ExportReport::Document { path, .. } => path,
        }
    }

    pub fn summary(&self, quiet: bool) -> String {
        if quiet {
            return format!("Saved to: {}", self.destination().display());
        }
        match self {
            ExportReport::ImageSet { directory, written } => {
                format!("Saved {written} frames to: {}", directory.display())
            }
            ExportReport::Document { path, pages, bytes } => format!(
                "Created PDF ({:.1}MB, {pages} pages): {}",
                *bytes as f64 / (1024.0 * 1024.0),
                path.display()
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub extract: ExtractReport,
    pub export: ExportReport,
}
