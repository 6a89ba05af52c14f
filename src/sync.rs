//! Catalog Synchronization
//!
//! Reconciles the catalog with the photos directory in one pass:
//!
//! 1. **Merge**: every existing entry whose file is still on disk is re-read and
//!    its technical fields (dimensions, EXIF) backfilled where missing
//! 2. **Append**: images with no entry get a fresh one, in filename order
//! 3. **Write**: only when something was added or updated
//!
//! Curated fields (`alt`, `title`, `tags` contents, `priority`) are never
//! overwritten. Entries whose files disappeared are kept as they are; removing
//! them is a curation decision.
//!
//! Per-file extraction fans out over a rayon pool. Results are collected in
//! input order, so the written catalog does not depend on completion order.

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::catalog::{find_new_images, list_images, load_catalog, write_catalog};
use crate::error::Result;
use crate::metadata::{build_entry, extract_dimensions, extract_exif};
use crate::photo::{is_missing, Dimensions, ExifData, Photo, TagScaffold};

/// Inputs for a sync run, resolved by the caller
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub photos_dir: PathBuf,
    pub catalog_path: PathBuf,
    /// Extraction threads; `None` uses rayon's default
    pub jobs: Option<usize>,
    /// Compute the report without writing the catalog
    pub dry_run: bool,
}

impl SyncOptions {
    pub fn new(photos_dir: impl Into<PathBuf>, catalog_path: impl Into<PathBuf>) -> Self {
        Self {
            photos_dir: photos_dir.into(),
            catalog_path: catalog_path.into(),
            jobs: None,
            dry_run: false,
        }
    }
}

/// Outcome of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Filenames that received a new entry
    pub added: Vec<String>,
    /// Filenames whose existing entry was backfilled
    pub updated: Vec<String>,
    /// Entries in the catalog after the run
    pub total: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty()
    }
}

// ============================================================================
// Merge
// ============================================================================

/// Backfill technical fields of an existing entry from fresh file data
///
/// Returns the merged entry and whether anything changed. Values already
/// present are never replaced; only missing ones (unset, zero, or empty) are
/// filled.
pub fn merge_entry(
    existing: &Photo,
    fresh_exif: &ExifData,
    fresh_dimensions: Option<Dimensions>,
) -> (Photo, bool) {
    let mut merged = existing.clone();
    let mut changed = false;

    if merged.tags.is_none() {
        merged.tags = Some(TagScaffold::default());
        changed = true;
    }

    if let Some(dims) = fresh_dimensions {
        if merged.width == 0 {
            merged.width = dims.width;
            changed = true;
        }
        if merged.height == 0 {
            merged.height = dims.height;
            changed = true;
        }
    }

    if !fresh_exif.is_empty() {
        let mut exif = merged.exif.clone().unwrap_or_default();
        let mut exif_changed = false;

        for (slot, fresh) in exif.fields_mut().into_iter().zip(fresh_exif.fields()) {
            if is_missing(slot) && !is_missing(fresh) {
                *slot = fresh.clone();
                exif_changed = true;
            }
        }

        if exif_changed {
            merged.exif = Some(exif);
            changed = true;
        }
    }

    (merged, changed)
}

/// Re-read an existing entry's backing file and merge it in
///
/// Returns the entry unchanged when the file is gone or unreadable.
fn refresh_entry(photos_dir: &Path, photo: &Photo) -> (Photo, bool) {
    let path = photos_dir.join(photo.filename());
    if !path.exists() {
        debug!("{} no longer on disk, keeping entry", photo.src);
        return (photo.clone(), false);
    }

    match std::fs::read(&path) {
        Ok(bytes) => {
            let dims = extract_dimensions(&bytes);
            let exif = extract_exif(&bytes);
            merge_entry(photo, &exif, dims)
        }
        Err(e) => {
            warn!("Could not read {}: {}. Keeping existing entry.", path.display(), e);
            (photo.clone(), false)
        }
    }
}

// ============================================================================
// Sync
// ============================================================================

/// Run one reconciliation pass
///
/// Fails only when the directory cannot be listed, the catalog cannot be
/// read, or the final write fails. Per-file problems are logged and skipped.
pub fn synchronize(options: &SyncOptions) -> Result<SyncReport> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(jobs) = options.jobs {
        builder = builder.num_threads(jobs);
    }
    let pool = builder.build()?;

    pool.install(|| sync_in_pool(options))
}

fn sync_in_pool(options: &SyncOptions) -> Result<SyncReport> {
    let photos_dir = options.photos_dir.as_path();
    let image_files = list_images(photos_dir)?;
    let existing = load_catalog(&options.catalog_path)?;

    info!(
        "Syncing {} image(s) against {} existing entries",
        image_files.len(),
        existing.len()
    );

    // Phase 1: merge existing entries
    let refreshed: Vec<(Photo, bool)> = existing
        .par_iter()
        .map(|photo| refresh_entry(photos_dir, photo))
        .collect();

    let mut updated = Vec::new();
    let mut all_photos = Vec::with_capacity(refreshed.len());
    for (photo, changed) in refreshed {
        if changed {
            info!("  ~ {} (updated)", photo.src);
            updated.push(photo.filename().to_string());
        }
        all_photos.push(photo);
    }

    // Phase 2: new images, diffed against the catalog as loaded
    let new_images = find_new_images(&image_files, &existing);
    let new_entries: Vec<Photo> = new_images
        .par_iter()
        .filter_map(|filename| {
            info!("Processing: {}", filename);
            build_entry(&photos_dir.join(filename), filename)
        })
        .collect();

    if new_entries.is_empty() && updated.is_empty() {
        info!("No changes needed.");
        return Ok(SyncReport {
            added: Vec::new(),
            updated: Vec::new(),
            total: existing.len(),
        });
    }

    let added: Vec<String> = new_entries.iter().map(|p| p.filename().to_string()).collect();
    all_photos.extend(new_entries);

    if options.dry_run {
        info!("Dry run, not writing {}", options.catalog_path.display());
    } else {
        write_catalog(&options.catalog_path, &all_photos)?;
    }

    if !added.is_empty() {
        info!("Added {} new photo(s):", added.len());
        for photo in &all_photos[all_photos.len() - added.len()..] {
            info!("  + {} ({}x{})", photo.src, photo.width, photo.height);
        }
    }
    if !updated.is_empty() {
        info!("Updated {} existing photo(s).", updated.len());
    }
    info!("Total: {}", all_photos.len());

    Ok(SyncReport {
        added,
        updated,
        total: all_photos.len(),
    })
}
