//! glass_catalog - photo catalog maintenance for the gallery
//!
//! Scans a flat directory of images, reads dimensions and EXIF, and keeps the
//! gallery's `photos.json` in sync without touching hand-curated fields.

pub mod catalog;
pub mod error;
pub mod metadata;
pub mod photo;
pub mod sync;

pub use catalog::{find_new_images, list_images, load_catalog, write_catalog};
pub use error::{CatalogError, Result};
pub use metadata::{build_entry, extract_dimensions, extract_exif};
pub use photo::{Dimensions, ExifData, Photo, TagScaffold};
pub use sync::{merge_entry, synchronize, SyncOptions, SyncReport};
