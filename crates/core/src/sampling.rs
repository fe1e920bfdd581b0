use tracing::debug;

use crate::error::Result;
use crate::models::{Candidate, TimeRange};
use crate::video::VideoSource;

/// Picks roughly one frame per second of source time out of the decoded
/// stream.
///
/// The bucket width is `round(frame_rate)` decoded frames; the frame that
/// closes a bucket becomes the candidate. Source time, not wall time, drives
/// everything.
pub struct SamplingScheduler<'a, S: VideoSource + ?Sized> {
    source: &'a mut S,
    start: f64,
    frame_rate: f64,
    bucket: u64,
    frame_budget: u64,
    frames_read: u64,
    pending: Option<Candidate>,
    exhausted: bool,
}

impl<'a, S: VideoSource + ?Sized> SamplingScheduler<'a, S> {
    /// Validates `range` against the source and seeks to its start.
    pub fn new(source: &'a mut S, range: &TimeRange) -> Result<Self> {
        let meta = *source.meta();
        range.check_overlap(&meta)?;

        let start = range.start as f64;
        let end = match range.end {
            Some(end) => end as f64,
            None => meta.duration(),
        };
        // The epsilon absorbs float error from `frame_count / frame_rate * frame_rate`.
        let frame_budget = ((end - start) * meta.frame_rate + 1e-6).max(0.0) as u64;
        let bucket = (meta.frame_rate.round() as u64).max(1);

        if range.start > 0 {
            source.seek(start)?;
        }
        debug!(start, end, frame_budget, bucket, "sampling scheduled");

        Ok(Self {
            source,
            start,
            frame_rate: meta.frame_rate,
            bucket,
            frame_budget,
            frames_read: 0,
            pending: None,
            exhausted: false,
        })
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub fn frame_budget(&self) -> u64 {
        self.frame_budget
    }

    /// Next candidate, or `None` once the range or the stream is exhausted.
    pub fn next_candidate(&mut self) -> Result<Option<Candidate>> {
        while !self.exhausted {
            let Some(candidate) = self.next_modulus_frame()? else {
                self.exhausted = true;
                break;
            };
            // Keep only the last candidate of a whole second.
            match self.pending.take() {
                Some(prev) if prev.timestamp() != candidate.timestamp() => {
                    self.pending = Some(candidate);
                    return Ok(Some(prev));
                }
                _ => self.pending = Some(candidate),
            }
        }
        Ok(self.pending.take())
    }

    fn next_modulus_frame(&mut self) -> Result<Option<Candidate>> {
        while self.frames_read < self.frame_budget {
            let Some(image) = self.source.next_frame()? else {
                return Ok(None);
            };
            self.frames_read += 1;
            if self.frames_read % self.bucket != 0 {
                continue;
            }
            let time = self.start + (self.frames_read - 1) as f64 / self.frame_rate;
            return Ok(Some(Candidate {
                frame_index: self.frames_read,
                time,
                image,
            }));
        }
        Ok(None)
    }
}
