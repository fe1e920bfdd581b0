use image::imageops::{self, FilterType};
use image::RgbImage;

const SAMPLE_SIZE: u32 = 64;
const LEVELS: usize = 256;
const GRID: u32 = 8;

/// Downsampled summary of one frame: per-channel level histograms plus a grid
/// of mean luma values.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    histograms: [[u32; LEVELS]; 3],
    cells: Vec<u32>,
    pixels: u32,
}

impl Fingerprint {
    pub fn of(frame: &RgbImage) -> Self {
        let sample = imageops::resize(frame, SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle);

        let mut histograms = [[0u32; LEVELS]; 3];
        let cell = SAMPLE_SIZE / GRID;
        let mut cell_sums = vec![0u32; (GRID * GRID) as usize];

        for (x, y, px) in sample.enumerate_pixels() {
            let [r, g, b] = px.0;
            for (channel, value) in [r, g, b].into_iter().enumerate() {
                histograms[channel][value as usize] += 1;
            }
            let idx = ((y / cell) * GRID + x / cell) as usize;
            cell_sums[idx] += luma(r, g, b);
        }

        let per_cell = cell * cell;
        let cells = cell_sums.into_iter().map(|sum| sum / per_cell).collect();

        Self {
            histograms,
            cells,
            pixels: SAMPLE_SIZE * SAMPLE_SIZE,
        }
    }

    /// 1.0 for identical fingerprints, towards 0.0 as they diverge.
    ///
    /// The colour term is one minus the distance between cumulative level
    /// histograms, so a uniform shift by one level costs 1/255 rather than a
    /// whole bin.
    pub fn similarity(&self, other: &Fingerprint) -> f64 {
        let span = (LEVELS - 1) as f64 * self.pixels.max(other.pixels) as f64;
        let hist = self
            .histograms
            .iter()
            .zip(other.histograms.iter())
            .map(|(a, b)| 1.0 - cumulative_distance(a, b) as f64 / span)
            .sum::<f64>()
            / 3.0;

        let diff: u32 = self
            .cells
            .iter()
            .zip(other.cells.iter())
            .map(|(a, b)| a.abs_diff(*b))
            .sum();
        let structural = 1.0 - diff as f64 / (self.cells.len() as f64 * 255.0);

        (hist * structural).clamp(0.0, 1.0)
    }
}

/// Sum of absolute differences between the running totals of two histograms.
fn cumulative_distance(a: &[u32; LEVELS], b: &[u32; LEVELS]) -> u64 {
    let (mut ca, mut cb) = (0u64, 0u64);
    let mut total = 0u64;
    for (x, y) in a.iter().zip(b.iter()).take(LEVELS - 1) {
        ca += u64::from(*x);
        cb += u64::from(*y);
        total += ca.abs_diff(cb);
    }
    total
}

fn luma(r: u8, g: u8, b: u8) -> u32 {
    (r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000
}

/// Scores how alike two frames look.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn fingerprint(&self, frame: &RgbImage) -> Fingerprint {
        Fingerprint::of(frame)
    }

    pub fn similarity(&self, a: &RgbImage, b: &RgbImage) -> f64 {
        Fingerprint::of(a).similarity(&Fingerprint::of(b))
    }
}
