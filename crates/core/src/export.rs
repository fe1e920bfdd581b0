use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::ImageFormat;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{ExportReport, StagedFrame, VideoMeta};
use crate::naming::{exported_name, timestamp_label};
use crate::staging::StagingArea;

/// Re-encodes staged frames as PNG into `directory`.
///
/// Frames that cannot be decoded or written are skipped; the report carries
/// the number actually written.
pub fn export_image_set(staging: &StagingArea, directory: &Path) -> Result<ExportReport> {
    let frames = staging.frames()?;
    fs::create_dir_all(directory)?;

    let written = frames
        .par_iter()
        .filter(|frame| match write_png(frame, directory) {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %frame.path.display(), "skipping staged frame: {err}");
                false
            }
        })
        .count();

    info!(written, total = frames.len(), dir = %directory.display(), "image set exported");
    Ok(ExportReport::ImageSet {
        directory: directory.to_path_buf(),
        written,
    })
}

fn write_png(frame: &StagedFrame, directory: &Path) -> Result<()> {
    let image = image::open(&frame.path)?;
    let dest = directory.join(exported_name(frame.timestamp, frame.score));
    image.save_with_format(&dest, ImageFormat::Png)?;
    Ok(())
}

/// Writes all staged frames into one PDF at `dest`, one page per frame.
///
/// The document is assembled inside staging and then installed under a
/// temporary name next to `dest` before an atomic rename, so `dest` is either
/// complete or absent.
pub fn export_document(
    staging: &StagingArea,
    meta: &VideoMeta,
    dest: &Path,
    stamp_pages: bool,
) -> Result<ExportReport> {
    let frames = staging.frames()?;
    let file_name = dest
        .file_name()
        .ok_or_else(|| Error::InvalidArgument(format!("bad document path: {}", dest.display())))?;
    let assembled = staging.path().join(file_name);

    let mut doc = build_document(&frames, meta, stamp_pages)?;
    let mut writer = BufWriter::new(File::create(&assembled)?);
    doc.save_to(&mut writer)?;
    writer.flush()?;
    drop(writer);

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    install(&assembled, dest)?;

    let bytes = fs::metadata(dest)?.len();
    info!(pages = frames.len(), bytes, path = %dest.display(), "document exported");
    Ok(ExportReport::Document {
        path: dest.to_path_buf(),
        pages: frames.len(),
        bytes,
    })
}

fn install(assembled: &Path, dest: &Path) -> Result<()> {
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let result = fs::copy(assembled, &part).and_then(|_| fs::rename(&part, dest));
    if let Err(err) = result {
        let _ = fs::remove_file(&part);
        return Err(Error::Export(format!(
            "could not write {}: {err}",
            dest.display()
        )));
    }
    Ok(())
}

fn build_document(frames: &[StagedFrame], meta: &VideoMeta, stamp_pages: bool) -> Result<Document> {
    let (width, height) = (meta.width as i64, meta.height as i64);
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::with_capacity(frames.len());
    for frame in frames {
        let page_id = add_page(&mut doc, pages_id, font_id, frame, (width, height), stamp_pages)?;
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    debug!(pages = count, "document assembled");
    Ok(doc)
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    frame: &StagedFrame,
    (width, height): (i64, i64),
    stamp_pages: bool,
) -> Result<ObjectId> {
    let jpeg = fs::read(&frame.path)?;
    let (img_w, img_h) = image::image_dimensions(&frame.path)?;

    let image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => img_w as i64,
            "Height" => img_h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    )
    .with_compression(false);
    let image_id = doc.add_object(image_stream);

    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![width.into(), 0.into(), 0.into(), height.into(), 0.into(), 0.into()],
        ),
        Operation::new("Do", vec!["Im0".into()]),
        Operation::new("Q", vec![]),
    ];
    if stamp_pages {
        operations.extend(label_operations(&timestamp_label(frame.timestamp), height));
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
            "Font" => dictionary! { "F1" => font_id },
        },
    }))
}

/// White Helvetica label on a black box near the bottom-left corner.
fn label_operations(label: &str, page_height: i64) -> Vec<Operation> {
    let size = (page_height / 24).max(8);
    let margin = size;
    let pad = size / 4;
    // Helvetica averages a little over half an em per glyph.
    let text_w = label.len() as i64 * size * 3 / 5;

    vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![0.into(), 0.into(), 0.into()]),
        Operation::new(
            "re",
            vec![
                (margin - pad).into(),
                (margin - pad).into(),
                (text_w + 2 * pad).into(),
                (size + 2 * pad).into(),
            ],
        ),
        Operation::new("f", vec![]),
        Operation::new("BT", vec![]),
        Operation::new("rg", vec![1.into(), 1.into(), 1.into()]),
        Operation::new("Tf", vec!["F1".into(), size.into()]),
        Operation::new("Td", vec![margin.into(), (margin + pad).into()]),
        Operation::new("Tj", vec![Object::string_literal(label)]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}
