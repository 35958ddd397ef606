//! Import collaborators: GIS rasters and vectors, and prototype models.
//!
//! The engine only talks to the [`GisImporter`] and [`ModelImporter`] traits.
//! [`FileImporter`] is a plain-file implementation of both, good enough for
//! north-up rasters already in the scene's units; it never reprojects.

mod obj;
mod raster;
mod shapefile;

use std::path::Path;

use glam::DVec3;

use crate::error::Result;
use crate::scene::{Mesh, ObjectData, SceneObject, Transform};

pub use raster::RasterOptions;

/// A mesh produced by an importer, not yet added to the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedMesh {
    /// Object name, usually the file stem.
    pub name: String,
    pub mesh: Mesh,
    pub transform: Transform,
}

impl ImportedMesh {
    /// Turn the import into a scene object.
    #[must_use]
    pub fn into_object(self) -> SceneObject {
        let mut object = SceneObject::new(self.name, ObjectData::Mesh(self.mesh));
        object.transform = self.transform;
        object
    }
}

/// Turns georeferenced files into scene geometry.
///
/// Implementations may fail; the engine treats any error as an import failure
/// for the current cycle only.
pub trait GisImporter {
    /// Materialise an elevation raster as a mesh in the given CRS.
    fn import_elevation(&self, path: &Path, crs: &str) -> Result<ImportedMesh>;

    /// Read a polyline as an ordered list of vertices in the given CRS.
    fn import_vector(&self, path: &Path, crs: &str) -> Result<Vec<DVec3>>;
}

/// Loads prototype models for vegetation classes.
pub trait ModelImporter {
    /// Every mesh object in a model file, with `scale` applied to its transform.
    fn import_models(&self, path: &Path, scale: f64) -> Result<Vec<ImportedMesh>>;
}

/// Importer backed by plain files: grayscale rasters, ESRI shapefiles and OBJ models.
#[derive(Debug, Clone, Default)]
pub struct FileImporter {
    pub raster: RasterOptions,
}

impl FileImporter {
    #[must_use]
    pub fn new(raster: RasterOptions) -> Self {
        Self { raster }
    }
}

impl GisImporter for FileImporter {
    fn import_elevation(&self, path: &Path, crs: &str) -> Result<ImportedMesh> {
        tracing::debug!("Importing elevation {} as {crs}", path.display());
        raster::import_elevation(path, &self.raster)
    }

    fn import_vector(&self, path: &Path, crs: &str) -> Result<Vec<DVec3>> {
        tracing::debug!("Importing vector {} as {crs}", path.display());
        shapefile::read_polyline(path)
    }
}

impl ModelImporter for FileImporter {
    fn import_models(&self, path: &Path, scale: f64) -> Result<Vec<ImportedMesh>> {
        obj::read_models(path, scale)
    }
}

/// File stem of a path, or an empty string.
fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
