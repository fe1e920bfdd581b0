mod common;

use common::{config_in, file_names, SyntheticSource, BLACK};
use lopdf::Document;
use vidslides_core::export::export_image_set;
use vidslides_core::pipeline::{run, run_with_progress};
use vidslides_core::session::{CancelToken, ExtractionSession};
use vidslides_core::staging::StagingArea;
use vidslides_core::{Error, ExportReport, FrameScore, OutputFormat, TimeRange};

#[test]
fn alternating_slides_are_kept_once_per_change() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path(), OutputFormat::ImageSet);
    let mut source = SyntheticSource::alternating(10, 3, (1280, 720));

    let report = run(&cfg, &mut source).unwrap();

    assert_eq!(report.extract.accepted, 4);
    assert_eq!(report.extract.candidates, 10);
    assert_eq!(
        file_names(&cfg.image_set_dir()),
        vec![
            "timestamp_00-00-00_similarity_0.png",
            "timestamp_00-00-03_similarity_0.0.png",
            "timestamp_00-00-06_similarity_0.0.png",
            "timestamp_00-00-09_similarity_0.0.png",
        ]
    );
    assert!(!cfg.staging_dir.exists());
}

#[test]
fn static_video_yields_one_frame() {
    for threshold in [0.1, 0.6, 1.0] {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_in(dir.path(), OutputFormat::ImageSet);
        cfg.similarity_threshold = threshold;
        let mut source = SyntheticSource::static_color(5, [40, 90, 160]);

        let report = run(&cfg, &mut source).unwrap();
        assert_eq!(report.extract.accepted, 1, "threshold {threshold}");
        assert_eq!(
            file_names(&cfg.image_set_dir()),
            vec!["timestamp_00-00-00_similarity_0.png"]
        );
    }
}

#[test]
fn raising_the_threshold_never_keeps_fewer_frames() {
    let mut counts = Vec::new();
    for threshold in [0.0, 0.3, 0.55, 0.7, 0.9, 1.0] {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_in(dir.path(), OutputFormat::ImageSet);
        cfg.similarity_threshold = threshold;
        let mut source = SyntheticSource::sweeping(10);
        counts.push(run(&cfg, &mut source).unwrap().extract.accepted);
    }

    assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{counts:?}");
    assert_eq!(counts.first(), Some(&1));
    assert_eq!(counts.last(), Some(&10));
}

#[test]
fn exporting_twice_gives_identical_files() {
    let dir = tempfile::tempdir().unwrap();
    let staging = StagingArea::prepare(dir.path().join("staging")).unwrap();
    let mut session = ExtractionSession::new(&staging, 0.6, false);
    let mut source = SyntheticSource::alternating(7, 2, (160, 90));
    vidslides_core::session::extract_with_progress(
        &mut source,
        &TimeRange::full(),
        &mut session,
        None,
        |_| {},
    )
    .unwrap();

    let first = dir.path().join("first");
    let second = dir.path().join("second");
    export_image_set(&staging, &first).unwrap();
    export_image_set(&staging, &second).unwrap();

    let names = file_names(&first);
    assert_eq!(names.len(), 4);
    assert_eq!(names, file_names(&second));
    for name in &names {
        let a = std::fs::read(first.join(name)).unwrap();
        let b = std::fs::read(second.join(name)).unwrap();
        assert_eq!(a, b, "{name}");
    }
}

#[test]
fn invalid_range_fails_before_decoding() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(dir.path(), OutputFormat::ImageSet);
    cfg.range = TimeRange { start: 5, end: Some(2) };
    let mut source = SyntheticSource::alternating(10, 3, (160, 90));

    let err = run(&cfg, &mut source).unwrap_err();
    assert!(matches!(err, Error::InvalidRange { start: 5, end: 2 }));
    assert!(err.is_configuration());
    assert_eq!(source.decoded, 0);
    assert!(!cfg.staging_dir.exists());
    assert!(!cfg.image_set_dir().exists());

    assert!(TimeRange::parse("00:00:05", "00:00:02").is_err());
}

#[test]
fn range_starting_at_the_end_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(dir.path(), OutputFormat::ImageSet);
    cfg.range = TimeRange::new(10, None).unwrap();
    let mut source = SyntheticSource::alternating(10, 3, (160, 90));

    let err = run(&cfg, &mut source).unwrap_err();
    assert!(matches!(err, Error::RangeOutsideVideo { start: 10, .. }));
    assert_eq!(source.decoded, 0);
    assert!(!cfg.staging_dir.exists());
}

#[test]
fn range_ending_at_the_duration_covers_the_last_second() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(dir.path(), OutputFormat::ImageSet);
    cfg.range = TimeRange::new(0, Some(10)).unwrap();
    let mut source = SyntheticSource::alternating(10, 3, (160, 90));

    let report = run(&cfg, &mut source).unwrap();
    assert_eq!(report.extract.accepted, 4);
    assert!(cfg
        .image_set_dir()
        .join("timestamp_00-00-09_similarity_0.0.png")
        .is_file());
}

#[test]
fn partial_range_starts_from_the_requested_second() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(dir.path(), OutputFormat::ImageSet);
    cfg.range = TimeRange::new(4, Some(8)).unwrap();
    let mut source = SyntheticSource::alternating(10, 3, (160, 90));

    let report = run(&cfg, &mut source).unwrap();
    assert_eq!(report.extract.candidates, 4);
    // Seconds 4 and 5 are white, 6 and 7 black.
    assert_eq!(
        file_names(&cfg.image_set_dir()),
        vec![
            "timestamp_00-00-04_similarity_0.png",
            "timestamp_00-00-06_similarity_0.0.png",
        ]
    );
}

#[test]
fn document_has_a_page_per_accepted_frame() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(dir.path(), OutputFormat::Document);
    cfg.timestamp_overlay = true;
    let mut source = SyntheticSource::alternating(10, 3, (320, 180));

    let report = run(&cfg, &mut source).unwrap();
    let ExportReport::Document { path, pages, .. } = &report.export else {
        panic!("expected a document");
    };
    assert_eq!(*pages as u64, report.extract.accepted);
    assert_eq!(path, &dir.path().join("out").join("synthetic.pdf"));

    let doc = Document::load(path).unwrap();
    assert_eq!(doc.get_pages().len(), 4);
    assert!(!cfg.staging_dir.exists());
    assert!(!dir.path().join("out").join("synthetic.pdf.part").exists());
}

#[test]
fn burned_in_timestamp_changes_exported_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(dir.path(), OutputFormat::ImageSet);
    cfg.timestamp_overlay = true;
    let mut source = SyntheticSource::static_color(3, [255, 255, 255]);
    run(&cfg, &mut source).unwrap();

    let png = cfg
        .image_set_dir()
        .join("timestamp_00-00-00_similarity_0.png");
    let img = image::open(png).unwrap().to_rgb8();
    let dark = img.pixels().filter(|p| p.0[0] < 64).count();
    assert!(dark > 0);
    // The label only covers the lower part of the frame.
    assert!(img.get_pixel(img.width() - 1, 0).0[0] > 200);
}

#[test]
fn cancelling_removes_staging() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path(), OutputFormat::ImageSet);
    let mut source = SyntheticSource::alternating(10, 3, (160, 90));
    let token = CancelToken::new();

    let err = run_with_progress(&cfg, &mut source, Some(&token), |p| {
        if p.candidates == 2 {
            token.cancel();
        }
    })
    .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(!err.is_configuration());
    assert!(!cfg.staging_dir.exists());
    assert!(!cfg.image_set_dir().exists());
}

#[test]
fn progress_is_reported_per_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path(), OutputFormat::ImageSet);
    let mut source = SyntheticSource::alternating(10, 3, (160, 90));

    let mut seen = Vec::new();
    run_with_progress(&cfg, &mut source, None, |p| {
        seen.push((p.candidates, p.timestamp, p.accepted))
    })
    .unwrap();

    assert_eq!(seen.len(), 10);
    assert_eq!(seen.first(), Some(&(1, 0, 1)));
    assert_eq!(seen.last(), Some(&(10, 9, 4)));
    assert!(seen.windows(2).all(|w| w[0].1 < w[1].1));
}

#[test]
fn stale_staging_content_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path(), OutputFormat::ImageSet);
    std::fs::create_dir_all(&cfg.staging_dir).unwrap();
    let leftover = image::RgbImage::from_pixel(16, 16, image::Rgb(BLACK));
    leftover
        .save(cfg.staging_dir.join("frame00.00.42-0.1.jpg"))
        .unwrap();

    let mut source = SyntheticSource::static_color(2, [200, 10, 10]);
    run(&cfg, &mut source).unwrap();

    assert_eq!(
        file_names(&cfg.image_set_dir()),
        vec!["timestamp_00-00-00_similarity_0.png"]
    );
}

#[test]
fn summaries_match_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path(), OutputFormat::ImageSet);
    let mut source = SyntheticSource::alternating(10, 3, (160, 90));
    let report = run(&cfg, &mut source).unwrap();

    assert_eq!(report.extract.summary(true), "Extracted 4 frames");
    assert!(report.extract.summary(false).starts_with("Extracted 4 frames in "));
    assert_eq!(
        report.export.summary(false),
        format!("Saved 4 frames to: {}", cfg.image_set_dir().display())
    );
    assert_eq!(
        report.export.summary(true),
        format!("Saved to: {}", cfg.image_set_dir().display())
    );
    assert_eq!(FrameScore::First.to_string(), "0");
}

#[cfg(unix)]
#[test]
fn decoder_failure_fails_the_run() {
    use std::os::unix::fs::PermissionsExt;
    use vidslides_core::video::{FfmpegConfig, FfmpegSource};

    let dir = tempfile::tempdir().unwrap();
    let script = |name: &str, body: &str| {
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    };
    let config = FfmpegConfig {
        ffprobe_path: script(
            "ffprobe",
            r#"echo '{"streams":[{"width":64,"height":36,"avg_frame_rate":"30/1","nb_frames":"300"}],"format":{"duration":"10.0"}}'"#,
        ),
        ffmpeg_path: script("ffmpeg", "exit 1"),
        ..FfmpegConfig::default()
    };
    let mut source = FfmpegSource::open_with("talk.mp4", config).unwrap();
    let cfg = config_in(dir.path(), OutputFormat::ImageSet);

    let err = run(&cfg, &mut source).unwrap_err();
    assert!(matches!(err, Error::Source(_)), "{err}");
    assert!(!err.is_configuration());
    assert!(!cfg.staging_dir.exists());
    assert!(!cfg.image_set_dir().exists());
}
