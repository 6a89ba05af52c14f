//! Catalog file I/O and photo directory scanning

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use tracing::error;

use crate::error::{CatalogError, Result};
use crate::photo::Photo;

/// Web path prefix every catalog `src` starts with
pub const SRC_PREFIX: &str = "/photos/";

/// File extensions treated as gallery images (matched case-insensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif"];

/// Web path for a file in the photos directory.
pub fn src_for(filename: &str) -> String {
    format!("{}{}", SRC_PREFIX, filename)
}

/// Returns `true` if `path` has an allowed image extension.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
}

/// List image filenames directly inside `photos_dir`, sorted ascending
///
/// A missing directory is an empty gallery, not an error.
pub fn list_images(photos_dir: &Path) -> Result<Vec<String>> {
    if !photos_dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(photos_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if is_supported_image(Path::new(name)) {
            files.push(name.to_string());
        }
    }
    files.sort();
    Ok(files)
}

/// Load the catalog, treating a missing file as empty
///
/// A file that exists but does not parse is logged and also treated as empty,
/// so the next sync rebuilds it from the photos directory.
pub fn load_catalog(catalog_path: &Path) -> Result<Vec<Photo>> {
    if !catalog_path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(catalog_path)?;
    match serde_json::from_str(&content) {
        Ok(photos) => Ok(photos),
        Err(e) => {
            error!("Error parsing {}: {}", catalog_path.display(), e);
            Ok(Vec::new())
        }
    }
}

/// Filenames with no catalog entry whose `src` matches, in input order.
pub fn find_new_images(image_files: &[String], existing: &[Photo]) -> Vec<String> {
    let known: HashSet<&str> = existing.iter().map(|p| p.src.as_str()).collect();
    image_files
        .iter()
        .filter(|file| !known.contains(src_for(file).as_str()))
        .cloned()
        .collect()
}

/// Replace the catalog with pretty-printed JSON and a trailing newline
///
/// Creates the parent directory if needed. The document goes to a temp file
/// in the same directory and is renamed over the catalog, so readers see
/// either the old file or the complete new one.
pub fn write_catalog(catalog_path: &Path, photos: &[Photo]) -> Result<()> {
    let mut json = serde_json::to_string_pretty(photos)?;
    json.push('\n');

    let write_err = |source: std::io::Error| CatalogError::Write {
        path: catalog_path.to_path_buf(),
        source,
    };

    let dir = catalog_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(json.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    // Temp files are created owner-only; keep the catalog readable like a normal write
    let permissions = match std::fs::metadata(catalog_path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    };
    if let Some(permissions) = permissions {
        tmp.as_file().set_permissions(permissions).map_err(write_err)?;
    }

    tmp.persist(catalog_path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(unix)]
fn default_permissions() -> Option<std::fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<std::fs::Permissions> {
    None
}
