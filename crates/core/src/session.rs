use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{
    AcceptedFrame, Candidate, ExtractProgress, ExtractReport, FrameScore, StagedFrame, TimeRange,
};
use crate::overlay::burn_timestamp;
use crate::sampling::SamplingScheduler;
use crate::similarity::{ChangeDetector, Fingerprint};
use crate::staging::StagingArea;
use crate::video::VideoSource;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;

#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Tracking,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accepted(StagedFrame),
    Rejected { score: f64 },
}

/// Keeps a candidate only when it looks different enough from the last
/// frame kept.
pub struct ExtractionSession<'a> {
    staging: &'a StagingArea,
    detector: ChangeDetector,
    threshold: f64,
    burn_in: bool,
    last_accepted: Option<(u64, Fingerprint)>,
    last_score: f64,
    accepted: u64,
}

impl<'a> ExtractionSession<'a> {
    pub fn new(staging: &'a StagingArea, threshold: f64, burn_in: bool) -> Self {
        Self {
            staging,
            detector: ChangeDetector::new(),
            threshold,
            burn_in,
            last_accepted: None,
            last_score: 0.0,
            accepted: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.last_accepted.is_some() {
            SessionState::Tracking
        } else {
            SessionState::Empty
        }
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Score of the most recent accepted frame, 0 until one was measured.
    pub fn last_score(&self) -> f64 {
        self.last_score
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.last_accepted.as_ref().map(|(ts, _)| *ts)
    }

    /// Accepts or rejects one candidate. Staging failures are returned as
    /// errors and end the run.
    pub fn evaluate(&mut self, candidate: Candidate) -> Result<Decision> {
        let fingerprint = self.detector.fingerprint(&candidate.image);
        let score = match &self.last_accepted {
            None => FrameScore::First,
            Some((_, last)) => {
                let score = fingerprint.similarity(last);
                if score >= self.threshold {
                    debug!(
                        frame = candidate.frame_index,
                        time = candidate.time,
                        score,
                        "candidate too similar"
                    );
                    return Ok(Decision::Rejected { score });
                }
                FrameScore::Measured(score)
            }
        };

        let frame_index = candidate.frame_index;
        let frame = AcceptedFrame {
            timestamp: candidate.timestamp(),
            score,
            image: candidate.image,
        };
        let staged = self.persist(frame)?;

        self.last_accepted = Some((staged.timestamp, fingerprint));
        if let FrameScore::Measured(v) = score {
            self.last_score = v;
        }
        self.accepted += 1;
        info!(
            frame = frame_index,
            timestamp = staged.timestamp,
            score = %score,
            "frame accepted"
        );
        Ok(Decision::Accepted(staged))
    }

    fn persist(&self, mut frame: AcceptedFrame) -> Result<StagedFrame> {
        if self.burn_in {
            burn_timestamp(&mut frame.image, frame.timestamp)?;
        }
        self.staging.stage(frame.timestamp, frame.score, &frame.image)
    }
}

/// Scans `range` of `source` and stages every accepted frame.
pub fn extract_with_progress<S, F>(
    source: &mut S,
    range: &TimeRange,
    session: &mut ExtractionSession<'_>,
    cancel: Option<&CancelToken>,
    mut on_progress: F,
) -> Result<ExtractReport>
where
    S: VideoSource + ?Sized,
    F: FnMut(&ExtractProgress),
{
    let started = Instant::now();
    let mut scheduler = SamplingScheduler::new(source, range)?;
    let mut candidates = 0u64;

    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        let Some(candidate) = scheduler.next_candidate()? else {
            break;
        };
        candidates += 1;
        let timestamp = candidate.timestamp();
        session.evaluate(candidate)?;

        on_progress(&ExtractProgress {
            frames_read: scheduler.frames_read(),
            frame_budget: scheduler.frame_budget(),
            candidates,
            accepted: session.accepted(),
            timestamp,
        });
    }

    Ok(ExtractReport {
        frames_read: scheduler.frames_read(),
        candidates,
        accepted: session.accepted(),
        elapsed: started.elapsed(),
    })
}
