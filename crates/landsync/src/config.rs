//! Settings file loading.
//!
//! Settings are read once when the engine starts. The raw JSON keeps the key
//! names the tangible landscape tooling writes (`CRS`, `timer`, `trees`, ...);
//! [`Prefs`] resolves them into absolute paths and typed values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::artifact::{TERRAIN_FILE, TERRAIN_TEXTURE_FILE, VANTAGE_FILE};
use crate::error::{Error, Result};

/// Name of the watch folder inside the base folder.
pub const WATCH_FOLDER_NAME: &str = "Watch";
/// Realism tier used to namespace prototype collections when none is configured.
pub const DEFAULT_REALISM: &str = "High";

/// Settings file as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Base folder holding the watch folder and asset files.
    pub folder: PathBuf,
    /// EPSG code, without the `EPSG:` prefix.
    #[serde(rename = "CRS")]
    pub crs: String,
    /// Poll interval in seconds.
    pub timer: f64,
    /// Scale applied to imported prototype models.
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub realism: Option<String>,
    pub terrain: TerrainSettings,
    pub world: WorldSettings,
    /// Vegetation class id to prototype assets.
    #[serde(default)]
    pub trees: BTreeMap<String, TreeSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerrainSettings {
    pub sides_texture_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorldSettings {
    pub texture_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeSettings {
    pub model: PathBuf,
    pub texture: PathBuf,
}

fn default_scale() -> f64 {
    1.0
}

impl Settings {
    /// Read and parse a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io("read", path, e))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(text)?;
        if !(settings.timer.is_finite() && settings.timer > 0.0) {
            return Err(Error::Config {
                detail: format!("timer must be a positive number of seconds, got {}", settings.timer),
            });
        }
        Ok(settings)
    }
}

/// Prototype assets for one vegetation class, with resolved paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassAssets {
    pub model: PathBuf,
    pub texture: PathBuf,
}

/// Resolved settings used by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Prefs {
    pub watch_folder: PathBuf,
    pub terrain_path: PathBuf,
    pub terrain_texture_path: PathBuf,
    pub terrain_sides_texture_path: PathBuf,
    pub world_texture_path: PathBuf,
    pub view_path: PathBuf,
    /// Full CRS identifier, e.g. `EPSG:31370`.
    pub crs: String,
    pub poll_interval: Duration,
    pub scale: f64,
    pub realism: String,
    pub classes: BTreeMap<String, ClassAssets>,
}

impl Prefs {
    /// Resolve paths relative to the configured base folder.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let folder = &settings.folder;
        Self::with_watch_folder(settings, folder.join(WATCH_FOLDER_NAME))
    }

    /// Like [`from_settings`](Self::from_settings) with a different watch folder.
    #[must_use]
    pub fn with_watch_folder(settings: &Settings, watch_folder: PathBuf) -> Self {
        let folder = &settings.folder;
        Self {
            terrain_path: watch_folder.join(TERRAIN_FILE),
            terrain_texture_path: watch_folder.join(TERRAIN_TEXTURE_FILE),
            view_path: watch_folder.join(VANTAGE_FILE),
            watch_folder,
            terrain_sides_texture_path: folder.join(&settings.terrain.sides_texture_file),
            world_texture_path: folder.join(&settings.world.texture_file),
            crs: format!("EPSG:{}", settings.crs),
            poll_interval: Duration::from_secs_f64(settings.timer),
            scale: settings.scale,
            realism: settings
                .realism
                .clone()
                .unwrap_or_else(|| DEFAULT_REALISM.to_owned()),
            classes: settings
                .trees
                .iter()
                .map(|(class, tree)| {
                    (
                        class.clone(),
                        ClassAssets {
                            model: folder.join(&tree.model),
                            texture: folder.join(&tree.texture),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Preferences for a bare watch folder with no assets configured.
    #[must_use]
    pub fn for_watch_folder(watch_folder: impl Into<PathBuf>, crs: &str) -> Self {
        let watch_folder = watch_folder.into();
        Self {
            terrain_path: watch_folder.join(TERRAIN_FILE),
            terrain_texture_path: watch_folder.join(TERRAIN_TEXTURE_FILE),
            view_path: watch_folder.join(VANTAGE_FILE),
            terrain_sides_texture_path: watch_folder.join("sides.png"),
            world_texture_path: watch_folder.join("world.png"),
            watch_folder,
            crs: crs.to_owned(),
            poll_interval: Duration::from_secs(1),
            scale: 1.0,
            realism: DEFAULT_REALISM.to_owned(),
            classes: BTreeMap::new(),
        }
    }
}
