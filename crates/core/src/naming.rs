//! Timestamp and score encoding for staged and exported frame files.
//!
//! Staged files carry all of their metadata in the name, so these helpers are
//! the only place that knows the format.

use crate::error::{Error, Result};
use crate::models::FrameScore;

const STAGED_PREFIX: &str = "frame";
const STAGED_EXT: &str = "jpg";

/// Formats whole seconds as zero-padded `HH<sep>MM<sep>SS`.
pub fn format_hms(seconds: u64, sep: char) -> String {
    let (m, s) = (seconds / 60, seconds % 60);
    let (h, m) = (m / 60, m % 60);
    format!("{h:02}{sep}{m:02}{sep}{s:02}")
}

/// Parses `HH:MM:SS` into whole seconds.
pub fn parse_hms(value: &str) -> Result<u64> {
    let invalid = || Error::InvalidArgument(format!("invalid time {value:?}, expected HH:MM:SS"));

    let mut parts = value.trim().split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    let field = |part: &str| part.parse::<u64>().map_err(|_| invalid());
    let (h, m, s) = (field(h)?, field(m)?, field(s)?);
    if m >= 60 || s >= 60 {
        return Err(invalid());
    }
    Ok(h * 3600 + m * 60 + s)
}

/// `frameHH.MM.SS-<score>.jpg`
pub fn staged_name(timestamp: u64, score: FrameScore) -> String {
    format!(
        "{STAGED_PREFIX}{}-{score}.{STAGED_EXT}",
        format_hms(timestamp, '.')
    )
}

/// Inverse of [`staged_name`]. Returns `None` for anything else in the
/// staging directory.
pub fn parse_staged_name(name: &str) -> Option<(u64, FrameScore)> {
    let stem = name
        .strip_prefix(STAGED_PREFIX)?
        .strip_suffix(STAGED_EXT)?
        .strip_suffix('.')?;
    let (hms, score) = stem.split_once('-')?;

    let mut fields = hms.split('.').map(|p| p.parse::<u64>().ok());
    let (Some(Some(h)), Some(Some(m)), Some(Some(s)), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return None;
    };

    let score = if score == "0" {
        FrameScore::First
    } else {
        FrameScore::Measured(score.parse::<f64>().ok()?)
    };
    Some((h * 3600 + m * 60 + s, score))
}

/// `timestamp_HH-MM-SS_similarity_<score>.png`
pub fn exported_name(timestamp: u64, score: FrameScore) -> String {
    format!(
        "timestamp_{}_similarity_{score}.png",
        format_hms(timestamp, '-')
    )
}

/// Label drawn on stamped frames and document pages.
pub fn timestamp_label(timestamp: u64) -> String {
    format!("Time: {}", format_hms(timestamp, ':'))
}
