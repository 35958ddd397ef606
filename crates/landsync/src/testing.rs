//! Fixtures shared by the unit tests.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::DVec3;
use image::{GrayImage, Luma};

use crate::error::{Error, Result};
use crate::import::{GisImporter, ImportedMesh, ModelImporter};
use crate::scene::{Mesh, Transform};

/// Flat grid of `columns x rows` vertices spaced `spacing` apart, quads facing +Z.
///
/// Vertex `(column, row)` has index `row * columns + column`.
pub fn grid_mesh(columns: usize, rows: usize, spacing: f64) -> Mesh {
    let mut vertices = Vec::with_capacity(columns * rows);
    for row in 0..rows {
        for column in 0..columns {
            vertices.push(DVec3::new(
                column as f64 * spacing,
                row as f64 * spacing,
                0.0,
            ));
        }
    }
    let mut faces = Vec::new();
    for row in 0..rows.saturating_sub(1) {
        for column in 0..columns.saturating_sub(1) {
            let i = row * columns + column;
            faces.push(vec![i, i + 1, i + columns + 1, i + columns]);
        }
    }
    Mesh::from_faces(vertices, faces)
}

/// Route log output through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A directory under the system temp dir, removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(label: &str) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let path = std::env::temp_dir().join(format!(
            "landsync-{label}-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sorted entry names.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.path)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Create an empty placeholder file.
    pub fn touch(&self, name: &str) -> PathBuf {
        let path = self.path.join(name);
        std::fs::write(&path, b"").unwrap();
        path
    }

    /// Write a 4x4 mask: black (plant) on the left half, white on the right.
    pub fn write_mask(&self, name: &str) -> PathBuf {
        let path = self.path.join(name);
        let mask = GrayImage::from_fn(4, 4, |x, _| Luma([if x < 2 { 0 } else { 255 }]));
        mask.save(&path).unwrap();
        path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// In-memory importer that records every call.
#[derive(Clone, Default)]
pub struct FakeImporter {
    /// Mesh returned for elevation imports; `None` makes them fail.
    pub terrain: Option<Mesh>,
    /// Transform returned with the terrain.
    pub terrain_transform: Transform,
    /// Vertices returned for vector imports.
    pub line: Vec<DVec3>,
    /// Meshes returned for model imports, by name.
    pub models: Vec<(String, Mesh)>,
    pub calls: Rc<RefCell<Vec<String>>>,
}

impl FakeImporter {
    /// Importer yielding a `size x size` flat terrain with 10 unit cells.
    pub fn with_terrain(size: usize) -> Self {
        Self {
            terrain: Some(grid_mesh(size, size, 10.0)),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, kind: &str, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.borrow_mut().push(format!("{kind}:{name}"));
    }
}

impl GisImporter for FakeImporter {
    fn import_elevation(&self, path: &Path, _crs: &str) -> Result<ImportedMesh> {
        self.record("elevation", path);
        let mesh = self
            .terrain
            .clone()
            .ok_or_else(|| Error::import(path, "fake importer has no terrain"))?;
        Ok(ImportedMesh {
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            mesh,
            transform: self.terrain_transform,
        })
    }

    fn import_vector(&self, path: &Path, _crs: &str) -> Result<Vec<DVec3>> {
        self.record("vector", path);
        Ok(self.line.clone())
    }
}

impl ModelImporter for FakeImporter {
    fn import_models(&self, path: &Path, scale: f64) -> Result<Vec<ImportedMesh>> {
        self.record("model", path);
        Ok(self
            .models
            .iter()
            .map(|(name, mesh)| ImportedMesh {
                name: name.clone(),
                mesh: mesh.clone(),
                transform: Transform {
                    scale: DVec3::splat(scale),
                    ..Transform::IDENTITY
                },
            })
            .collect())
    }
}
