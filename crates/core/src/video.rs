use std::io::{BufReader, ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::RgbImage;
use serde_json::Value;
use tracing::debug;
use wait_timeout::ChildExt;

use crate::error::{Error, Result};
use crate::models::VideoMeta;

/// A decoded video, read front to back.
pub trait VideoSource {
    fn meta(&self) -> &VideoMeta;

    /// Moves the read position to `seconds`. Only forward, and only before
    /// frames have been read.
    fn seek(&mut self, seconds: f64) -> Result<()>;

    /// Next frame in decode order, `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub probe_timeout: Duration,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            probe_timeout: Duration::from_secs(30),
        }
    }
}

/// Probes with `ffprobe` and decodes RGB24 frames from an `ffmpeg` child.
pub struct FfmpegSource {
    input: String,
    config: FfmpegConfig,
    meta: VideoMeta,
    offset: f64,
    decoder: Option<Decoder>,
    finished: bool,
}

struct Decoder {
    child: Child,
    reader: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
}

impl Decoder {
    /// Fills `buf` with one frame. Returns the number of bytes read, which is
    /// short only at end of stream.
    fn read_frame(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Waits for ffmpeg after its output ended and turns a failed exit into
    /// an error carrying the last line it printed.
    fn finish(&mut self) -> Result<()> {
        let status = self.child.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if status.success() {
            return Ok(());
        }
        let reason = stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("no diagnostic output");
        Err(Error::Source(format!("ffmpeg failed decoding ({status}): {reason}")))
    }
}

impl FfmpegSource {
    pub fn open(input: &str) -> Result<Self> {
        Self::open_with(input, FfmpegConfig::default())
    }

    pub fn open_with(input: &str, config: FfmpegConfig) -> Result<Self> {
        let meta = probe(input, &config)?;
        meta.validate(input)?;
        debug!(
            input,
            fps = meta.frame_rate,
            frames = meta.frame_count,
            width = meta.width,
            height = meta.height,
            "probed video"
        );
        Ok(Self {
            input: input.to_string(),
            config,
            meta,
            offset: 0.0,
            decoder: None,
            finished: false,
        })
    }

    fn spawn_decoder(&self) -> Result<Decoder> {
        let mut cmd = Command::new(&self.config.ffmpeg_path);
        cmd.args(["-v", "error", "-nostdin"]);
        if self.offset > 0.0 {
            cmd.args(["-ss", &format!("{:.3}", self.offset)]);
        }
        cmd.args(["-i", &self.input])
            .args(["-map", "0:v:0", "-an", "-vsync", "0"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Source(format!("failed to start ffmpeg: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Source("ffmpeg stdout unavailable".to_string()))?;
        // Drained on its own thread so a chatty decoder cannot block on a full pipe.
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });
        debug!(input = %self.input, offset = self.offset, "spawned decoder");
        Ok(Decoder {
            child,
            reader: BufReader::with_capacity(1024 * 1024, stdout),
            stderr,
        })
    }
}

impl VideoSource for FfmpegSource {
    fn meta(&self) -> &VideoMeta {
        &self.meta
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        if self.decoder.is_some() || seconds < self.offset {
            return Err(Error::Source(
                "cannot seek backwards or after decoding started".to_string(),
            ));
        }
        self.offset = seconds;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }
        if self.decoder.is_none() {
            self.decoder = Some(self.spawn_decoder()?);
        }
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(None);
        };

        let (width, height) = (self.meta.width, self.meta.height);
        let mut buf = vec![0u8; width as usize * height as usize * 3];
        let filled = decoder
            .read_frame(&mut buf)
            .map_err(|e| Error::Source(format!("decoding failed: {e}")))?;
        if filled < buf.len() {
            self.finished = true;
            decoder.finish()?;
            if filled > 0 {
                return Err(Error::Source(format!(
                    "ffmpeg output ended inside a frame ({filled} of {} bytes)",
                    buf.len()
                )));
            }
            return Ok(None);
        }

        RgbImage::from_raw(width, height, buf)
            .map(Some)
            .ok_or_else(|| Error::Source("decoded frame has the wrong size".to_string()))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            let _ = decoder.child.kill();
            let _ = decoder.child.wait();
        }
    }
}

fn probe(input: &str, config: &FfmpegConfig) -> Result<VideoMeta> {
    let mut child = Command::new(&config.ffprobe_path)
        .args(["-v", "error", "-select_streams", "v:0"])
        .args([
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames:format=duration",
        ])
        .args(["-of", "json", input])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::Source(format!("failed to start ffprobe: {e}")))?;

    let status = match child.wait_timeout(config.probe_timeout)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Source(format!("ffprobe timed out on {input}")));
        }
    };
    let mut out = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout.read_to_string(&mut out)?;
    }
    if !status.success() {
        return Err(Error::Source(format!(
            "ffprobe could not read {input}, check that the path or URL is correct"
        )));
    }

    parse_probe_output(&out)
        .ok_or_else(|| Error::Source(format!("unexpected ffprobe output for {input}")))
}

/// Reads the JSON printed by `ffprobe -of json`. Missing frame counts are
/// estimated from the container duration.
pub(crate) fn parse_probe_output(json: &str) -> Option<VideoMeta> {
    let root: Value = serde_json::from_str(json).ok()?;
    let stream = root.get("streams")?.as_array()?.first()?;

    let width = stream.get("width")?.as_u64()? as u32;
    let height = stream.get("height")?.as_u64()? as u32;

    let frame_rate = ["avg_frame_rate", "r_frame_rate"]
        .iter()
        .filter_map(|key| stream.get(*key)?.as_str().and_then(parse_rate))
        .find(|rate| *rate > 0.0)
        .unwrap_or(0.0);

    let nb_frames = stream
        .get("nb_frames")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|n| *n > 0);
    let frame_count = match nb_frames {
        Some(n) => n,
        None => {
            let duration = root
                .get("format")
                .and_then(|f| f.get("duration"))
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(0.0);
            (duration * frame_rate).round().max(0.0) as u64
        }
    };

    Some(VideoMeta {
        frame_rate,
        frame_count,
        width,
        height,
    })
}

fn parse_rate(value: &str) -> Option<f64> {
    match value.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().ok()?;
            let den = den.parse::<f64>().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => value.parse::<f64>().ok(),
    }
}
