use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vidslides_core::pipeline::run_with_progress;
use vidslides_core::video::{FfmpegConfig, FfmpegSource, VideoSource};
use vidslides_core::{ExtractProgress, OutputFormat, RunConfig, TimeRange, UNBOUNDED_TOKEN};

#[derive(Parser, Debug)]
#[command(name = "vidslides")]
#[command(about = "Extract distinct slides from a video as PNG images or a PDF")]
#[command(version)]
struct Args {
    /// Video file or URL understood by ffmpeg
    input: String,

    /// Keep frames scoring below this similarity to the last kept frame (0..=1)
    #[arg(long, default_value_t = 0.6)]
    similarity: f64,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Png)]
    format: Format,

    /// Output directory (defaults to the video's directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// PDF file name (defaults to <video-name>.pdf)
    #[arg(long)]
    pdfname: Option<String>,

    /// Mark every kept frame with its timestamp
    #[arg(long)]
    add_timestamp: bool,

    /// Print only the result lines
    #[arg(short, long)]
    quiet: bool,

    /// Start of the scanned range, HH:MM:SS
    #[arg(long, default_value = "00:00:00")]
    start_frame: String,

    /// End of the scanned range, HH:MM:SS or INFINITY
    #[arg(long, default_value = UNBOUNDED_TOKEN)]
    end_frame: String,

    /// Scratch directory for frames kept during extraction
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// ffmpeg binary
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// ffprobe binary
    #[arg(long, default_value = "ffprobe")]
    ffprobe: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Png,
    Pdf,
}

impl From<Format> for OutputFormat {
    fn from(value: Format) -> Self {
        match value {
            Format::Png => OutputFormat::ImageSet,
            Format::Pdf => OutputFormat::Document,
        }
    }
}

fn main() {
    init_tracing();
    let args = Args::parse();
    if let Err(err) = real_main(args) {
        eprintln!("error: {err}");
        std::process::exit(if err.is_configuration() { 2 } else { 1 });
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn real_main(args: Args) -> vidslides_core::Result<()> {
    let cfg = build_config(&args)?;
    cfg.validate()?;
    tracing::debug!(?cfg, "configuration resolved");

    let mut source = FfmpegSource::open_with(
        &cfg.input,
        FfmpegConfig {
            ffmpeg_path: args.ffmpeg,
            ffprobe_path: args.ffprobe,
            ..FfmpegConfig::default()
        },
    )?;

    if !cfg.quiet {
        let meta = source.meta();
        eprintln!(
            "Processing: {} ({}x{}, {:.1}s @ {:.2} fps)",
            cfg.video_name(),
            meta.width,
            meta.height,
            meta.duration(),
            meta.frame_rate
        );
    }

    let quiet = cfg.quiet;
    let report = run_with_progress(&cfg, &mut source, None, |p| {
        if !quiet {
            print_progress(p);
        }
    })?;
    if !quiet {
        eprintln!();
    }

    println!("{}", report.extract.summary(quiet));
    println!("{}", report.export.summary(quiet));
    Ok(())
}

fn build_config(args: &Args) -> vidslides_core::Result<RunConfig> {
    // Range errors surface before ffprobe runs.
    let range = TimeRange::parse(&args.start_frame, &args.end_frame)?;

    let mut cfg = RunConfig::for_video(args.input.clone());
    cfg.similarity_threshold = args.similarity;
    cfg.format = args.format.into();
    cfg.timestamp_overlay = args.add_timestamp;
    cfg.quiet = args.quiet;
    cfg.range = range;
    if let Some(output) = &args.output {
        cfg.output_dir = output.clone();
    }
    if let Some(name) = &args.pdfname {
        cfg.document_name = name.clone();
    }
    if let Some(dir) = &args.staging_dir {
        cfg.staging_dir = dir.clone();
    }
    Ok(cfg)
}

fn print_progress(p: &ExtractProgress) {
    let percent = if p.frame_budget == 0 {
        100.0
    } else {
        (p.frames_read as f64 / p.frame_budget as f64 * 100.0).min(100.0)
    };
    let mut err = std::io::stderr().lock();
    let _ = write!(
        err,
        "\rProgress: {percent:5.1}% at {} ({} kept)",
        vidslides_core::naming::format_hms(p.timestamp, ':'),
        p.accepted
    );
    let _ = err.flush();
}
