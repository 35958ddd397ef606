//! Keeps a 3D terrain scene in sync with a tangible landscape pipeline.
//!
//! The pipeline scans a physical sand model and drops files into a watch
//! folder: an elevation raster, a vantage polyline and per-class vegetation
//! masks. This crate polls that folder and applies each artifact to an
//! in-memory scene: it rebuilds the terrain mesh, moves the viewing camera and
//! plants vegetation, then deletes or renames the consumed files.
//!
//! # Design principles
//!
//! - **Single owner**: the [`SceneRegistry`] owns every object; components
//!   refer to objects by name and resolve them on each use
//! - **Fault isolation**: handler failures are logged per artifact and never
//!   stop the loop
//! - **Pluggable import**: GIS and model loading sit behind the
//!   [`GisImporter`] and [`ModelImporter`] traits
//!
//! # Example
//!
//! ```ignore
//! use landsync::{Engine, FileImporter, Prefs, Settings};
//!
//! let settings = Settings::load("settings.json".as_ref())?;
//! let mut engine = Engine::new(Prefs::from_settings(&settings), FileImporter::default());
//! let mut watch = engine.arm()?;
//!
//! // Call on every timer tick.
//! if let Some(report) = watch.on_tick(tick, &mut engine) {
//!     println!("{:?}", report.dispatched);
//! }
//! ```

pub mod artifact;
pub mod bird_rig;
pub mod camera;
pub mod config;
pub mod engine;
mod error;
pub mod geometry;
pub mod import;
pub mod scene;
pub mod terrain;
pub mod vegetation;
pub mod watch;

#[cfg(test)]
mod testing;

pub use artifact::Artifact;
pub use bird_rig::BirdCameraRig;
pub use camera::{CameraSynchronizer, VantagePose};
pub use config::{Prefs, Settings};
pub use engine::{AssetReport, Engine};
pub use error::{Error, Result};
pub use import::{FileImporter, GisImporter, ImportedMesh, ModelImporter, RasterOptions};
pub use scene::SceneRegistry;
pub use terrain::{TerrainAdapter, TerrainUpdate};
pub use vegetation::{PlacementConfig, PlantReport, VegetationPlacer};
pub use watch::{Inbox, PollReport, WatchLoop, WatchState};
