use tracing::info;

use crate::config::RunConfig;
use crate::error::Result;
use crate::export::{export_document, export_image_set};
use crate::models::{ExtractProgress, OutputFormat, RunReport};
use crate::session::{extract_with_progress, CancelToken, ExtractionSession};
use crate::staging::StagingArea;
use crate::video::VideoSource;

pub fn run<S: VideoSource + ?Sized>(config: &RunConfig, source: &mut S) -> Result<RunReport> {
    run_with_progress(config, source, None, |_| {})
}

/// Extracts and exports one video.
///
/// Configuration and range problems are reported before the staging
/// directory is created. Once it exists it is removed on every return path.
pub fn run_with_progress<S, F>(
    config: &RunConfig,
    source: &mut S,
    cancel: Option<&CancelToken>,
    on_progress: F,
) -> Result<RunReport>
where
    S: VideoSource + ?Sized,
    F: FnMut(&ExtractProgress),
{
    config.validate()?;
    let meta = *source.meta();
    meta.validate(&config.input)?;
    config.range.check_overlap(&meta)?;

    let staging = StagingArea::prepare(&config.staging_dir)?;
    info!(input = %config.input, staging = %staging.path().display(), "extraction started");

    let mut session =
        ExtractionSession::new(&staging, config.similarity_threshold, config.burn_in_frames());
    let extract = extract_with_progress(source, &config.range, &mut session, cancel, on_progress)?;

    let export = match config.format {
        OutputFormat::ImageSet => export_image_set(&staging, &config.image_set_dir())?,
        OutputFormat::Document => {
            export_document(&staging, &meta, &config.document_path(), config.stamp_pages())?
        }
    };

    staging.clear()?;
    Ok(RunReport { extract, export })
}
