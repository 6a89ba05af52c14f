//! Catalog data model
//!
//! Mirrors the JSON shape the gallery reads at build time:
//!
//! ```json
//! {
//!   "id": "amalfi-coast",
//!   "src": "/photos/amalfi-coast.jpg",
//!   "width": 4000,
//!   "height": 2667,
//!   "alt": "Amalfi coastline at golden hour",
//!   "title": "Amalfi Coast",
//!   "tags": { "location": ["Italy"], "genre": ["Landscape"] },
//!   "exif": { "camera": "Sony ILCE-7M4", "aperture": "f/8", "iso": "100" },
//!   "priority": true
//! }
//! ```
//!
//! `alt`, `title`, `tags` and `priority` are curated by hand. `width`, `height`
//! and `exif` are technical and may be backfilled from the image file.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Lenient Field Readers
// ============================================================================

// Hand-edited catalogs carry `null`s and stray types. A single odd value must
// not fail the whole document, or every entry would be rebuilt from scratch.

/// `null` reads as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Pixel count; `null`, negatives and non-numbers read as 0 ("unknown").
fn lenient_dimension<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let pixels = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f.round() as u64))
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0),
        _ => 0,
    };
    Ok(pixels)
}

/// Display string; numbers are stringified, `null` and other types are absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// ============================================================================
// Technical Metadata
// ============================================================================

/// Pixel dimensions, always known as a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Display-ready camera metadata
///
/// Every field is independently optional. An empty string is treated the same
/// as an absent field when deciding what to backfill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExifData {
    /// Make and model, e.g. "Nikon Zf"
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,

    /// Lens model, e.g. "NIKKOR Z 24-70mm f/4 S"
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,

    /// e.g. "35mm"
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<String>,

    /// e.g. "f/8"
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,

    /// e.g. "1/250s" or "2s"
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub shutter_speed: Option<String>,

    /// e.g. "100"
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub iso: Option<String>,

    /// Hand-added keys, kept as written
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Returns `true` if a metadata field holds no usable value.
pub(crate) fn is_missing(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, str::is_empty)
}

impl ExifData {
    /// All fields in declaration order, for field-wise merging.
    pub(crate) fn fields_mut(&mut self) -> [&mut Option<String>; 6] {
        [
            &mut self.camera,
            &mut self.lens,
            &mut self.focal_length,
            &mut self.aperture,
            &mut self.shutter_speed,
            &mut self.iso,
        ]
    }

    pub(crate) fn fields(&self) -> [&Option<String>; 6] {
        [
            &self.camera,
            &self.lens,
            &self.focal_length,
            &self.aperture,
            &self.shutter_speed,
            &self.iso,
        ]
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|f| f.is_none())
    }

    /// One-line caption as shown under a photo in the lightbox.
    ///
    /// `"Nikon Zf · NIKKOR Z 24-70mm · f/4 · 1/250s · ISO 100"`
    pub fn summary(&self) -> Option<String> {
        let iso = self
            .iso
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| format!("ISO {}", s));

        let parts: Vec<&str> = [
            self.camera.as_deref(),
            self.lens.as_deref(),
            self.aperture.as_deref(),
            self.shutter_speed.as_deref(),
            iso.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" · "))
        }
    }
}

// ============================================================================
// Curated Metadata
// ============================================================================

/// Tag container; the scaffold itself is required, its lists may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagScaffold {
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genre: Vec<String>,

    /// Additional tag groups curated by hand
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Catalog Entry
// ============================================================================

/// A single photo in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    /// Filename stem, stable across syncs
    pub id: String,

    /// Web path, "/photos/<filename>"
    pub src: String,

    /// Zero means "not yet known"
    #[serde(default, deserialize_with = "lenient_dimension")]
    pub width: u32,
    #[serde(default, deserialize_with = "lenient_dimension")]
    pub height: u32,

    #[serde(default, deserialize_with = "null_as_default")]
    pub alt: String,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// `None` only for entries written before tags existed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagScaffold>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exif: Option<ExifData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<bool>,

    /// Keys this tool does not manage, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Photo {
    /// Fresh entry with empty curated fields.
    pub fn new(id: impl Into<String>, src: impl Into<String>, dimensions: Dimensions) -> Self {
        Self {
            id: id.into(),
            src: src.into(),
            width: dimensions.width,
            height: dimensions.height,
            alt: String::new(),
            title: Some(String::new()),
            tags: Some(TagScaffold::default()),
            exif: None,
            priority: None,
            extra: Map::new(),
        }
    }

    /// Basename of `src`, which names the backing file in the photos directory.
    pub fn filename(&self) -> &str {
        self.src.rsplit('/').next().unwrap_or(&self.src)
    }
}
