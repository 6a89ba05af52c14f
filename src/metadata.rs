//! Image Metadata Extraction
//!
//! Reads the two kinds of technical data the catalog stores:
//! - **Dimensions** from the container header (JPEG, PNG, WebP, AVIF)
//! - **EXIF** camera/exposure fields via kamadak-exif
//!
//! Both are best-effort. A file that cannot be parsed yields `None` (dimensions)
//! or an empty [`ExifData`], never an error; callers branch on presence.
//!
//! ## Normalization
//!
//! | Field         | Source tag               | Display            |
//! |---------------|--------------------------|--------------------|
//! | camera        | Make + Model             | "Nikon Zf"         |
//! | lens          | LensModel                | as recorded        |
//! | focal_length  | FocalLength              | "35mm" (rounded)   |
//! | aperture      | FNumber                  | "f/2.8"            |
//! | shutter_speed | ExposureTime             | "1/250s", "2s"     |
//! | iso           | PhotographicSensitivity  | "100"              |
//!
//! Zero numeric values normalize to absent.

use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

use crate::catalog::src_for;
use crate::error::{CatalogError, Result};
use crate::photo::{Dimensions, ExifData, Photo};

// ============================================================================
// Dimensions
// ============================================================================

/// Read pixel dimensions from image bytes
///
/// Returns both dimensions or neither. Zero-sized results count as a failure.
pub fn extract_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    match read_dimensions(bytes) {
        Ok(dims) if dims.width > 0 && dims.height > 0 => Some(dims),
        Ok(_) => None,
        Err(e) => {
            debug!("Dimension read failed: {}", e);
            None
        }
    }
}

fn read_dimensions(bytes: &[u8]) -> Result<Dimensions> {
    // The image crate only reads AVIF headers with the native dav1d decoder
    if infer::image::is_avif(bytes) {
        return avif_dimensions(bytes)
            .ok_or_else(|| CatalogError::UnsupportedImage("AVIF without ispe box".to_string()));
    }

    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;

    Ok(Dimensions { width, height })
}

/// Read the primary item's `ispe` (image spatial extents) from an AVIF file
///
/// Walks `meta` -> `iprp` -> `ipco`/`ipma` and picks the `ispe` associated with
/// the `pitm` item, so thumbnails and alpha planes are not mistaken for the
/// image. Falls back to the first `ispe` in `ipco` when there is no
/// association for the primary item.
fn avif_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let top = child_boxes(bytes);
    let meta = find_box(&top, b"meta")?;
    // meta is a full box: 4 bytes of version + flags before its children
    let meta_children = child_boxes(meta.get(4..)?);
    let iprp_children = child_boxes(find_box(&meta_children, b"iprp")?);
    let properties = child_boxes(find_box(&iprp_children, b"ipco")?);

    let primary_ispe = find_box(&meta_children, b"pitm")
        .and_then(primary_item_id)
        .and_then(|item| {
            iprp_children
                .iter()
                .filter(|(kind, _)| kind == b"ipma")
                .find_map(|(_, body)| associated_ispe(body, item, &properties))
        });

    let ispe = primary_ispe.or_else(|| find_box(&properties, b"ispe"))?;
    // ispe: version+flags(4) width(4) height(4)
    let width = be_u32(ispe, 4)?;
    let height = be_u32(ispe, 8)?;
    Some(Dimensions { width, height })
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

fn be_u64(bytes: &[u8], at: usize) -> Option<u64> {
    Some(u64::from_be_bytes(bytes.get(at..at + 8)?.try_into().ok()?))
}

/// Split an ISO-BMFF byte range into `(type, body)` pairs
///
/// Stops at the first box whose declared size runs past the data.
fn child_boxes(mut data: &[u8]) -> Vec<([u8; 4], &[u8])> {
    let mut boxes = Vec::new();
    while let (Some(size), Some(kind)) = (be_u32(data, 0), data.get(4..8)) {
        let (header, size) = match size {
            0 => (8, data.len()),
            1 => match be_u64(data, 8).and_then(|s| usize::try_from(s).ok()) {
                Some(large) => (16, large),
                None => break,
            },
            n => (8, n as usize),
        };
        if size < header || size > data.len() {
            break;
        }
        let mut k = [0u8; 4];
        k.copy_from_slice(kind);
        boxes.push((k, &data[header..size]));
        data = &data[size..];
    }
    boxes
}

fn find_box<'a>(boxes: &[([u8; 4], &'a [u8])], kind: &[u8; 4]) -> Option<&'a [u8]> {
    boxes.iter().find(|(k, _)| k == kind).map(|(_, body)| *body)
}

/// `pitm`: version(1) flags(3) item_ID (u16 for v0, u32 otherwise)
fn primary_item_id(pitm: &[u8]) -> Option<u32> {
    match *pitm.first()? {
        0 => be_u16(pitm, 4).map(u32::from),
        _ => be_u32(pitm, 4),
    }
}

/// Find the `ispe` property an `ipma` box associates with `item`
///
/// Property indices are 1-based into `ipco`; flag bit 0 selects 15-bit
/// indices over 7-bit ones, and the top bit marks the association essential.
fn associated_ispe<'a>(
    ipma: &[u8],
    item: u32,
    properties: &[([u8; 4], &'a [u8])],
) -> Option<&'a [u8]> {
    let version = *ipma.first()?;
    let wide_index = ipma.get(3)? & 1 == 1;
    let entry_count = be_u32(ipma, 4)?;
    let mut pos = 8;

    for _ in 0..entry_count {
        let item_id = if version < 1 {
            pos += 2;
            u32::from(be_u16(ipma, pos - 2)?)
        } else {
            pos += 4;
            be_u32(ipma, pos - 4)?
        };
        let count = *ipma.get(pos)?;
        pos += 1;

        for _ in 0..count {
            let index = if wide_index {
                pos += 2;
                usize::from(be_u16(ipma, pos - 2)? & 0x7fff)
            } else {
                pos += 1;
                usize::from(ipma.get(pos - 1)? & 0x7f)
            };
            if item_id != item || index == 0 {
                continue;
            }
            if let Some((kind, body)) = properties.get(index - 1) {
                if kind == b"ispe" {
                    return Some(*body);
                }
            }
        }
    }
    None
}

// ============================================================================
// EXIF
// ============================================================================

/// Extract display-ready EXIF fields from image bytes
///
/// Missing or corrupt EXIF is the common case for exported web images and
/// returns an empty block.
pub fn extract_exif(bytes: &[u8]) -> ExifData {
    match read_exif(bytes) {
        Ok(exif) => exif,
        Err(e) => {
            debug!("No usable EXIF: {}", e);
            ExifData::default()
        }
    }
}

fn read_exif(bytes: &[u8]) -> Result<ExifData> {
    let exif_data = exif::Reader::new().read_from_container(&mut Cursor::new(bytes))?;

    let get_str = |tag: exif::Tag| -> Option<String> {
        exif_data.get_field(tag, exif::In::PRIMARY).and_then(|f| match f.value {
            exif::Value::Ascii(ref parts) => {
                let joined = parts
                    .iter()
                    .map(|p| String::from_utf8_lossy(p).into_owned())
                    .collect::<Vec<_>>()
                    .join(" ");
                Some(joined)
            }
            _ => None,
        })
    };

    let get_rational = |tag: exif::Tag| -> Option<f64> {
        exif_data.get_field(tag, exif::In::PRIMARY).and_then(|f| match f.value {
            exif::Value::Rational(ref v) if !v.is_empty() && v[0].denom != 0 => {
                Some(v[0].to_f64())
            }
            _ => None,
        })
    };

    let get_u32 = |tag: exif::Tag| -> Option<u32> {
        exif_data.get_field(tag, exif::In::PRIMARY).and_then(|f| match f.value {
            exif::Value::Short(ref v) if !v.is_empty() => Some(v[0] as u32),
            exif::Value::Long(ref v) if !v.is_empty() => Some(v[0]),
            _ => None,
        })
    };

    let camera = format_camera(get_str(exif::Tag::Make), get_str(exif::Tag::Model));

    Ok(ExifData {
        camera,
        lens: format_lens(get_str(exif::Tag::LensModel)),
        focal_length: format_focal_length(get_rational(exif::Tag::FocalLength)),
        aperture: format_aperture(get_rational(exif::Tag::FNumber)),
        shutter_speed: format_shutter_speed(get_rational(exif::Tag::ExposureTime)),
        iso: format_iso(get_u32(exif::Tag::PhotographicSensitivity)),
        ..Default::default()
    })
}

/// Strip NUL padding and collapse whitespace runs; empty becomes `None`.
fn clean_text(s: &str) -> Option<String> {
    let cleaned = s
        .replace('\0', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

pub fn format_camera(make: Option<String>, model: Option<String>) -> Option<String> {
    let joined = [make, model]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    clean_text(&joined)
}

/// Lens names are kept as recorded apart from NUL padding and outer whitespace.
pub fn format_lens(lens: Option<String>) -> Option<String> {
    let lens = lens?;
    let trimmed = lens.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn format_focal_length(focal_length: Option<f64>) -> Option<String> {
    let fl = focal_length.filter(|v| *v > 0.0 && v.is_finite())?;
    Some(format!("{}mm", fl.round()))
}

pub fn format_aperture(f_number: Option<f64>) -> Option<String> {
    let f = f_number.filter(|v| *v > 0.0 && v.is_finite())?;
    Some(format!("f/{}", f))
}

/// `>= 1s` prints seconds as-is, faster speeds print as a reciprocal
pub fn format_shutter_speed(exposure_time: Option<f64>) -> Option<String> {
    let t = exposure_time.filter(|v| *v > 0.0 && v.is_finite())?;
    if t >= 1.0 {
        Some(format!("{}s", t))
    } else {
        Some(format!("1/{}s", (1.0 / t).round()))
    }
}

pub fn format_iso(iso: Option<u32>) -> Option<String> {
    iso.filter(|v| *v > 0).map(|v| v.to_string())
}

// ============================================================================
// Entry Construction
// ============================================================================

/// Build a fresh catalog entry for an image file
///
/// Returns `None` (with a warning) when the file cannot be read or its
/// dimensions cannot be determined. The `exif` block is omitted entirely when
/// the image carries none of the recognized fields.
pub fn build_entry(path: &Path, filename: &str) -> Option<Photo> {
    let id = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to process {}: {}", filename, e);
            return None;
        }
    };

    let Some(dimensions) = extract_dimensions(&bytes) else {
        warn!("Could not extract dimensions for {}. Skipping.", filename);
        return None;
    };
    let exif = extract_exif(&bytes);

    let mut photo = Photo::new(id, src_for(filename), dimensions);
    if !exif.is_empty() {
        photo.exif = Some(exif);
    }
    Some(photo)
}

// ============================================================================
// Tests
// ============================================================================
