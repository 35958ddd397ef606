//! Watch-folder artifacts: recognition by name and best-effort retirement.

use std::path::{Path, PathBuf};

/// Elevation raster that rebuilds the terrain.
pub const TERRAIN_FILE: &str = "terrain.tif";
/// Orthophoto draped over the terrain top. Consumed alongside the raster, never on its own.
pub const TERRAIN_TEXTURE_FILE: &str = "image.png";
/// Polyline placing the dynamic camera.
pub const VANTAGE_FILE: &str = "vantage.shp";
/// Prefix of vegetation density masks.
pub const PATCH_PREFIX: &str = "patch_";
/// Extension of vegetation density masks.
pub const PATCH_EXTENSION: &str = "png";
/// Extension a mask is renamed to once planted.
pub const DONE_EXTENSION: &str = "done";

/// Sidecar extensions that travel with a shapefile.
const SHAPEFILE_SIDECARS: [&str; 4] = ["shx", "dbf", "prj", "cpg"];

/// A recognised watch-folder entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Terrain,
    Vantage,
    /// Density mask for a vegetation class.
    Patch {
        file_name: String,
    },
}

impl Artifact {
    /// Classify a directory entry by name. Unrecognised names return `None`.
    #[must_use]
    pub fn classify(file_name: &str) -> Option<Self> {
        if file_name == TERRAIN_FILE {
            Some(Artifact::Terrain)
        } else if file_name == VANTAGE_FILE {
            Some(Artifact::Vantage)
        } else if is_patch_file(file_name) {
            Some(Artifact::Patch {
                file_name: file_name.to_owned(),
            })
        } else {
            None
        }
    }
}

/// Whether a name matches `patch_*.png`.
#[must_use]
pub fn is_patch_file(file_name: &str) -> bool {
    file_name.starts_with(PATCH_PREFIX)
        && Path::new(file_name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(PATCH_EXTENSION))
}

/// The vegetation class encoded in a mask name, `patch_<class>.png` → `<class>`.
///
/// Returns `None` when the class part is empty or the name doesn't match.
#[must_use]
pub fn patch_class(file_name: &str) -> Option<&str> {
    if !is_patch_file(file_name) {
        return None;
    }
    let stem = &file_name[..file_name.len() - PATCH_EXTENSION.len() - 1];
    stem.strip_prefix(PATCH_PREFIX).filter(|class| !class.is_empty())
}

/// Sibling path a consumed mask is renamed to.
#[must_use]
pub fn done_path(path: &Path) -> PathBuf {
    path.with_extension(DONE_EXTENSION)
}

/// Delete a consumed file, logging instead of failing.
pub fn remove_best_effort(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Could not remove {}: {e}", path.display());
        }
    }
}

/// Delete a consumed shapefile together with its sidecars.
pub fn remove_shapefile_best_effort(path: &Path) {
    remove_best_effort(path);
    for extension in SHAPEFILE_SIDECARS {
        let sidecar = path.with_extension(extension);
        if sidecar.exists() {
            remove_best_effort(&sidecar);
        }
    }
}

/// Rename a consumed mask to its `.done` sibling, replacing any stale one.
///
/// Returns the done path on success. Failures are logged and swallowed.
pub fn mark_done_best_effort(path: &Path) -> Option<PathBuf> {
    let done = done_path(path);
    if done.exists() {
        remove_best_effort(&done);
    }
    match std::fs::rename(path, &done) {
        Ok(()) => Some(done),
        Err(e) => {
            tracing::warn!("Could not mark {} as done: {e}", path.display());
            None
        }
    }
}

/// Delete every file in a folder. Subdirectories are left alone.
///
/// Returns the number of files removed. Listing failures are logged.
pub fn clear_folder(folder: &Path) -> usize {
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Could not list {}: {e}", folder.display());
            return 0;
        }
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Could not remove {}: {e}", path.display()),
        }
    }
    removed
}
