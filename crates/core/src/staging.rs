use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{FrameScore, StagedFrame};
use crate::naming::{parse_staged_name, staged_name};

pub const DEFAULT_STAGING_DIR: &str = ".vidslides-staging";

const JPEG_QUALITY: u8 = 95;

/// Run-scoped directory holding accepted frames until export.
///
/// Leftovers from an earlier run are removed by [`StagingArea::prepare`]; the
/// directory itself is removed by [`StagingArea::clear`] or, failing that, on
/// drop.
#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
    cleared: bool,
}

impl StagingArea {
    pub fn prepare(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.exists() {
            debug!(path = %root.display(), "removing stale staging directory");
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            cleared: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Writes an accepted frame as `frame<HH.MM.SS>-<score>.jpg`.
    pub fn stage(&self, timestamp: u64, score: FrameScore, image: &RgbImage) -> Result<StagedFrame> {
        let path = self.root.join(staged_name(timestamp, score));
        write_jpeg(&path, image).map_err(|reason| Error::Stage {
            path: path.clone(),
            reason,
        })?;
        Ok(StagedFrame {
            path,
            timestamp,
            score,
        })
    }

    /// Staged frames in name order, which is chronological order.
    pub fn frames(&self) -> Result<Vec<StagedFrame>> {
        let mut frames = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some((timestamp, score)) = name.to_str().and_then(parse_staged_name) else {
                continue;
            };
            frames.push(StagedFrame {
                path: entry.path(),
                timestamp,
                score,
            });
        }
        frames.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        Ok(frames)
    }

    pub fn clear(mut self) -> Result<()> {
        self.cleared = true;
        remove_if_exists(&self.root)
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if self.cleared {
            return;
        }
        if let Err(err) = remove_if_exists(&self.root) {
            warn!(path = %self.root.display(), "failed to remove staging directory: {err}");
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn write_jpeg(path: &Path, image: &RgbImage) -> std::result::Result<(), String> {
    let file = File::create(path).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
        .encode_image(image)
        .map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())
}
