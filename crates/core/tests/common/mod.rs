#![allow(dead_code)]

use std::path::Path;

use image::{Rgb, RgbImage};
use vidslides_core::video::VideoSource;
use vidslides_core::{Error, OutputFormat, Result, RunConfig, TimeRange, VideoMeta};

pub const BLACK: [u8; 3] = [0, 0, 0];
pub const WHITE: [u8; 3] = [255, 255, 255];

/// In-memory video whose frames are produced from their presentation time.
pub struct SyntheticSource {
    meta: VideoMeta,
    render: Box<dyn Fn(f64) -> RgbImage>,
    next_index: u64,
    started: bool,
    pub decoded: u64,
}

impl SyntheticSource {
    pub fn new(
        frame_rate: f64,
        seconds: u64,
        (width, height): (u32, u32),
        render: impl Fn(f64) -> RgbImage + 'static,
    ) -> Self {
        Self {
            meta: VideoMeta {
                frame_rate,
                frame_count: (seconds as f64 * frame_rate).round() as u64,
                width,
                height,
            },
            render: Box::new(render),
            next_index: 0,
            started: false,
            decoded: 0,
        }
    }

    /// Solid frames switching between black and white every `period` seconds.
    pub fn alternating(seconds: u64, period: u64, size: (u32, u32)) -> Self {
        Self::new(30.0, seconds, size, move |t| {
            let color = if (t as u64 / period) % 2 == 0 { BLACK } else { WHITE };
            RgbImage::from_pixel(size.0, size.1, Rgb(color))
        })
    }

    pub fn static_color(seconds: u64, color: [u8; 3]) -> Self {
        Self::new(30.0, seconds, (320, 180), move |_| {
            RgbImage::from_pixel(320, 180, Rgb(color))
        })
    }

    /// Black left part growing by a tenth of the width each second.
    pub fn sweeping(seconds: u64) -> Self {
        Self::new(25.0, seconds, (320, 180), move |t| {
            let split = (t.floor() as u32 * 32).min(320);
            RgbImage::from_fn(320, 180, |x, _| if x < split { Rgb(BLACK) } else { Rgb(WHITE) })
        })
    }
}

impl VideoSource for SyntheticSource {
    fn meta(&self) -> &VideoMeta {
        &self.meta
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        let target = (seconds * self.meta.frame_rate).round() as u64;
        if self.started || target < self.next_index {
            return Err(Error::Source("cannot rewind".to_string()));
        }
        self.next_index = target;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        self.started = true;
        if self.next_index >= self.meta.frame_count {
            return Ok(None);
        }
        let t = self.next_index as f64 / self.meta.frame_rate;
        self.next_index += 1;
        self.decoded += 1;
        Ok(Some((self.render)(t)))
    }
}

pub fn config_in(dir: &Path, format: OutputFormat) -> RunConfig {
    let mut cfg = RunConfig::for_video("synthetic.mp4");
    cfg.output_dir = dir.join("out");
    cfg.staging_dir = dir.join("staging");
    cfg.format = format;
    cfg.range = TimeRange::full();
    cfg
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
