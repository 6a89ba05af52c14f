//! Integration tests for catalog synchronization

use glass_catalog::{build_entry, extract_exif, synchronize, SyncOptions};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::{json, Value};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    _tmp: TempDir,
    photos_dir: PathBuf,
    catalog: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let photos_dir = tmp.path().join("photos");
        let catalog = tmp.path().join("photos.json");
        fs::create_dir_all(&photos_dir).unwrap();
        Self { _tmp: tmp, photos_dir, catalog }
    }

    fn options(&self) -> SyncOptions {
        SyncOptions::new(&self.photos_dir, &self.catalog)
    }

    fn add_image(&self, name: &str, bytes: &[u8]) {
        fs::write(self.photos_dir.join(name), bytes).unwrap();
    }

    fn seed(&self, value: Value) {
        fs::write(&self.catalog, serde_json::to_string(&value).unwrap()).unwrap();
    }

    fn read(&self) -> Value {
        serde_json::from_str(&fs::read_to_string(&self.catalog).unwrap()).unwrap()
    }
}

/// Encode a blank image of the given size
fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut buf, format)
        .unwrap();
    buf.into_inner()
}

/// JPEG with an APP1 EXIF segment carrying camera and exposure fields
fn jpeg_with_exif(width: u32, height: u32) -> Vec<u8> {
    use exif::{Field, In, Rational, Tag, Value};

    let fields = [
        Field { tag: Tag::Make, ifd_num: In::PRIMARY, value: Value::Ascii(vec![b"Nikon".to_vec()]) },
        Field { tag: Tag::Model, ifd_num: In::PRIMARY, value: Value::Ascii(vec![b"Zf".to_vec()]) },
        Field {
            tag: Tag::LensModel,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![b"NIKKOR Z 24-70mm f/4 S".to_vec()]),
        },
        Field {
            tag: Tag::FocalLength,
            ifd_num: In::PRIMARY,
            value: Value::Rational(vec![Rational { num: 35, denom: 1 }]),
        },
        Field {
            tag: Tag::FNumber,
            ifd_num: In::PRIMARY,
            value: Value::Rational(vec![Rational { num: 28, denom: 10 }]),
        },
        Field {
            tag: Tag::ExposureTime,
            ifd_num: In::PRIMARY,
            value: Value::Rational(vec![Rational { num: 1, denom: 250 }]),
        },
        Field { tag: Tag::PhotographicSensitivity, ifd_num: In::PRIMARY, value: Value::Short(vec![400]) },
    ];

    let mut writer = exif::experimental::Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let jpeg = encode(width, height, ImageFormat::Jpeg);
    let segment_len = (2 + 6 + tiff.len()) as u16;

    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

#[test]
fn test_exif_extraction_formats_fields() {
    let exif = extract_exif(&jpeg_with_exif(16, 16));

    assert_eq!(exif.camera.as_deref(), Some("Nikon Zf"));
    assert_eq!(exif.lens.as_deref(), Some("NIKKOR Z 24-70mm f/4 S"));
    assert_eq!(exif.focal_length.as_deref(), Some("35mm"));
    assert_eq!(exif.aperture.as_deref(), Some("f/2.8"));
    assert_eq!(exif.shutter_speed.as_deref(), Some("1/250s"));
    assert_eq!(exif.iso.as_deref(), Some("400"));
}

#[test]
fn test_build_entry_with_exif() {
    let fx = Fixture::new();
    fx.add_image("donald-duck.jpeg", &jpeg_with_exif(120, 80));

    let entry = build_entry(&fx.photos_dir.join("donald-duck.jpeg"), "my-photo.jpeg").unwrap();
    assert_eq!(entry.id, "my-photo");
    assert_eq!(entry.src, "/photos/my-photo.jpeg");
    assert_eq!((entry.width, entry.height), (120, 80));
    assert_eq!(entry.alt, "");
    assert_eq!(entry.title.as_deref(), Some(""));
    assert_eq!(entry.exif.unwrap().camera.as_deref(), Some("Nikon Zf"));
}

#[test]
fn test_build_entry_without_exif_omits_block() {
    let fx = Fixture::new();
    fx.add_image("plain.png", &encode(10, 20, ImageFormat::Png));

    let entry = build_entry(&fx.photos_dir.join("plain.png"), "plain.png").unwrap();
    assert_eq!(entry.exif, None);
    let value = serde_json::to_value(&entry).unwrap();
    assert!(value.get("exif").is_none());
}

#[test]
fn test_build_entry_unprocessable() {
    let fx = Fixture::new();
    fx.add_image("broken.jpg", b"not an image");

    assert!(build_entry(&fx.photos_dir.join("broken.jpg"), "broken.jpg").is_none());
    assert!(build_entry(&fx.photos_dir.join("missing.jpg"), "missing.jpg").is_none());
}

#[test]
fn test_sync_adds_to_empty_catalog() {
    let fx = Fixture::new();
    fx.add_image("test-photo.png", &encode(64, 48, ImageFormat::Png));

    let report = synchronize(&fx.options()).unwrap();
    assert_eq!(report.added, vec!["test-photo.png"]);
    assert!(report.updated.is_empty());
    assert_eq!(report.total, 1);

    assert_eq!(
        fx.read(),
        json!([{
            "id": "test-photo",
            "src": "/photos/test-photo.png",
            "width": 64,
            "height": 48,
            "alt": "",
            "title": "",
            "tags": { "location": [], "genre": [] }
        }])
    );
}

#[test]
fn test_sync_includes_exif_when_present() {
    let fx = Fixture::new();
    fx.add_image("camera.jpg", &jpeg_with_exif(32, 24));

    synchronize(&fx.options()).unwrap();
    let data = fx.read();
    assert_eq!(data[0]["exif"]["camera"], "Nikon Zf");
    assert_eq!(data[0]["exif"]["shutterSpeed"], "1/250s");
    assert_eq!(data[0]["width"], 32);
}

#[test]
fn test_sync_preserves_existing_and_appends() {
    let fx = Fixture::new();
    fx.seed(json!([{
        "id": "existing",
        "src": "/photos/existing.jpeg",
        "width": 100,
        "height": 100,
        "alt": "Existing photo",
        "title": "Keep me",
        "tags": { "location": ["Tokyo"], "genre": ["Street"] },
        "priority": true
    }]));
    fx.add_image("new-b.png", &encode(8, 8, ImageFormat::Png));
    fx.add_image("new-a.png", &encode(4, 4, ImageFormat::Png));

    let report = synchronize(&fx.options()).unwrap();
    assert_eq!(report.added, vec!["new-a.png", "new-b.png"]);
    assert_eq!(report.total, 3);

    let data = fx.read();
    assert_eq!(data[0]["alt"], "Existing photo");
    assert_eq!(data[0]["title"], "Keep me");
    assert_eq!(data[0]["tags"]["location"], json!(["Tokyo"]));
    assert_eq!(data[0]["priority"], true);
    assert_eq!(data[1]["id"], "new-a");
    assert_eq!(data[2]["id"], "new-b");
}

#[test]
fn test_sync_creates_catalog_directory() {
    let fx = Fixture::new();
    fx.add_image("photo.png", &encode(2, 2, ImageFormat::Png));
    let nested = fx.catalog.parent().unwrap().join("new-dir").join("photos.json");

    synchronize(&SyncOptions::new(&fx.photos_dir, &nested)).unwrap();
    assert!(nested.exists());
}

#[test]
fn test_sync_is_idempotent() {
    let fx = Fixture::new();
    fx.add_image("photo.jpg", &jpeg_with_exif(16, 16));

    synchronize(&fx.options()).unwrap();
    let first = fs::read(&fx.catalog).unwrap();
    let first_modified = fs::metadata(&fx.catalog).unwrap().modified().unwrap();

    let report = synchronize(&fx.options()).unwrap();
    assert!(report.added.is_empty());
    assert!(report.updated.is_empty());
    assert_eq!(report.total, 1);

    assert_eq!(fs::read(&fx.catalog).unwrap(), first);
    assert_eq!(fs::metadata(&fx.catalog).unwrap().modified().unwrap(), first_modified);
}

#[test]
fn test_sync_empty_directory() {
    let fx = Fixture::new();
    let report = synchronize(&fx.options()).unwrap();
    assert_eq!(report.total, 0);
    assert!(report.is_noop());
    assert!(!fx.catalog.exists());

    let missing = SyncOptions::new(Path::new("/nonexistent/photos"), &fx.catalog);
    assert!(synchronize(&missing).unwrap().is_noop());
}

#[test]
fn test_sync_backfills_tag_scaffold() {
    let fx = Fixture::new();
    fx.seed(json!([{
        "id": "donald-duck",
        "src": "/photos/donald-duck.png",
        "width": 5425,
        "height": 3616,
        "alt": "Donald Duck event",
        "title": "Donald Duck",
        "exif": { "camera": "Nikon Zf" }
    }]));
    fx.add_image("donald-duck.png", &encode(6, 4, ImageFormat::Png));

    let report = synchronize(&fx.options()).unwrap();
    assert_eq!(report.updated, vec!["donald-duck.png"]);

    let data = fx.read();
    assert_eq!(data[0]["tags"], json!({ "location": [], "genre": [] }));
    assert_eq!(data[0]["alt"], "Donald Duck event");
    assert_eq!(data[0]["title"], "Donald Duck");
    assert_eq!(data[0]["width"], 5425);
    assert_eq!(data[0]["exif"], json!({ "camera": "Nikon Zf" }));
}

#[test]
fn test_sync_backfills_exif_without_overwriting() {
    let fx = Fixture::new();
    fx.seed(json!([{
        "id": "shot",
        "src": "/photos/shot.jpg",
        "width": 0,
        "height": 0,
        "alt": "Custom alt",
        "title": "Custom title",
        "tags": { "location": ["Tokyo"], "genre": ["Street"] },
        "exif": { "camera": "My Custom Camera" }
    }]));
    fx.add_image("shot.jpg", &jpeg_with_exif(40, 30));

    let report = synchronize(&fx.options()).unwrap();
    assert_eq!(report.updated, vec!["shot.jpg"]);
    assert!(report.added.is_empty());

    let data = fx.read();
    assert_eq!(data[0]["exif"]["camera"], "My Custom Camera");
    assert_eq!(data[0]["exif"]["lens"], "NIKKOR Z 24-70mm f/4 S");
    assert_eq!(data[0]["exif"]["iso"], "400");
    assert_eq!((data[0]["width"].clone(), data[0]["height"].clone()), (json!(40), json!(30)));
    assert_eq!(data[0]["alt"], "Custom alt");
    assert_eq!(data[0]["tags"]["genre"], json!(["Street"]));
}

#[test]
fn test_sync_keeps_entries_without_files() {
    let fx = Fixture::new();
    fx.seed(json!([{
        "id": "gone",
        "src": "/photos/gone.jpg",
        "width": 10,
        "height": 10,
        "alt": "",
        "custom": { "keep": 1 }
    }]));
    fx.add_image("here.png", &encode(3, 3, ImageFormat::Png));

    let report = synchronize(&fx.options()).unwrap();
    assert_eq!(report.added, vec!["here.png"]);
    assert!(report.updated.is_empty());

    let data = fx.read();
    assert_eq!(data[0]["id"], "gone");
    assert!(data[0].get("tags").is_none());
    assert_eq!(data[0]["custom"], json!({ "keep": 1 }));
}

#[test]
fn test_sync_skips_unprocessable_images() {
    let fx = Fixture::new();
    fx.add_image("broken.jpg", b"not an image");
    fx.add_image("good.png", &encode(5, 5, ImageFormat::Png));
    fx.add_image("notes.txt", b"ignored");

    let report = synchronize(&fx.options()).unwrap();
    assert_eq!(report.added, vec!["good.png"]);
    assert_eq!(report.total, 1);
}

#[test]
fn test_sync_corrupt_catalog_rebuilds() {
    let fx = Fixture::new();
    fs::write(&fx.catalog, "[{ broken").unwrap();
    fx.add_image("a.png", &encode(2, 2, ImageFormat::Png));

    let report = synchronize(&fx.options()).unwrap();
    assert_eq!(report.added, vec!["a.png"]);
    assert_eq!(fx.read().as_array().unwrap().len(), 1);
}

#[test]
fn test_sync_dry_run_does_not_write() {
    let fx = Fixture::new();
    fx.add_image("a.png", &encode(2, 2, ImageFormat::Png));

    let mut options = fx.options();
    options.dry_run = true;
    options.jobs = Some(2);

    let report = synchronize(&options).unwrap();
    assert_eq!(report.added, vec!["a.png"]);
    assert!(!fx.catalog.exists());
}

#[test]
fn test_sync_order_stable_with_many_files() {
    let fx = Fixture::new();
    let png = encode(2, 2, ImageFormat::Png);
    let names: Vec<String> = (0..24).map(|i| format!("img-{:02}.png", i)).collect();
    for name in names.iter().rev() {
        fx.add_image(name, &png);
    }

    let mut options = fx.options();
    options.jobs = Some(4);
    let report = synchronize(&options).unwrap();
    assert_eq!(report.added, names);

    let ids: Vec<String> = fx
        .read()
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect();
    let expected: Vec<String> = (0..24).map(|i| format!("img-{:02}", i)).collect();
    assert_eq!(ids, expected);
}

#[test]
fn test_sync_null_dimensions_keep_curation() {
    let fx = Fixture::new();
    fx.seed(json!([{
        "id": "a",
        "src": "/photos/a.png",
        "width": null,
        "height": null,
        "alt": "Curated A",
        "title": "Keep",
        "tags": { "location": ["Kyoto"], "genre": [] },
        "priority": true
    }, {
        "id": "c",
        "src": "/photos/c.png",
        "width": 7,
        "height": 7,
        "alt": null
    }]));
    fx.add_image("a.png", &encode(12, 9, ImageFormat::Png));
    fx.add_image("b.png", &encode(3, 3, ImageFormat::Png));

    let report = synchronize(&fx.options()).unwrap();
    assert_eq!(report.added, vec!["b.png"]);
    assert_eq!(report.updated, vec!["a.png"]);
    assert_eq!(report.total, 3);

    let data = fx.read();
    assert_eq!(data[0]["alt"], "Curated A");
    assert_eq!(data[0]["title"], "Keep");
    assert_eq!(data[0]["tags"]["location"], json!(["Kyoto"]));
    assert_eq!(data[0]["priority"], true);
    assert_eq!((data[0]["width"].clone(), data[0]["height"].clone()), (json!(12), json!(9)));
    assert_eq!(data[1]["id"], "c");
    assert_eq!(data[1]["alt"], "");
    assert_eq!(data[2]["id"], "b");
}

#[test]
fn test_sync_keeps_nested_unknown_keys() {
    let fx = Fixture::new();
    fx.seed(json!([{
        "id": "a",
        "src": "/photos/a.png",
        "width": 4,
        "height": 4,
        "alt": "",
        "tags": { "location": [], "genre": [], "mood": ["calm"] },
        "exif": { "camera": "Leica Q2", "whiteBalance": "Daylight" }
    }]));
    fx.add_image("a.png", &encode(4, 4, ImageFormat::Png));
    fx.add_image("b.png", &encode(2, 2, ImageFormat::Png));

    let report = synchronize(&fx.options()).unwrap();
    assert_eq!(report.added, vec!["b.png"]);

    let data = fx.read();
    assert_eq!(data[0]["tags"]["mood"], json!(["calm"]));
    assert_eq!(data[0]["exif"]["whiteBalance"], "Daylight");
    assert_eq!(data[0]["exif"]["camera"], "Leica Q2");
}

#[test]
fn test_sync_unreadable_backing_file_keeps_entry() {
    let fx = Fixture::new();
    let curated = json!({
        "id": "x",
        "src": "/photos/x.jpg",
        "width": 0,
        "height": 0,
        "alt": "Hand written",
        "title": "Curated"
    });
    fx.seed(json!([curated.clone()]));
    // A directory named like an image exists but cannot be read as a file
    fs::create_dir(fx.photos_dir.join("x.jpg")).unwrap();
    fx.add_image("y.png", &encode(5, 5, ImageFormat::Png));

    let report = synchronize(&fx.options()).unwrap();
    assert!(report.updated.is_empty());
    assert_eq!(report.added, vec!["y.png"]);
    assert_eq!(report.total, 2);

    let data = fx.read();
    assert_eq!(data[0], curated);
    assert_eq!(data[1]["id"], "y");
}
