//! Terrain rebuilds from elevation rasters.
//!
//! Each raster replaces the terrain object wholesale: the mesh is imported,
//! baked into world space, given planar UVs, split into a textured top and a
//! skirt of side faces, and the raster file is deleted. The first import also
//! fits the viewport, the bird camera ring and the sun to the new terrain.

use std::path::Path;

use glam::{DAffine3, DVec3};

use crate::artifact::remove_best_effort;
use crate::bird_rig::BirdCameraRig;
use crate::error::{Error, Result};
use crate::geometry::{
    SIDE_DOWN_LIMIT, SIDE_UP_LIMIT, boundary_fringe_drop, classify_side_faces, planar_uv,
};
use crate::import::GisImporter;
use crate::scene::{ObjectData, SceneObject, SceneRegistry, SunData, Transform};

pub const TERRAIN_OBJECT: &str = "terrain";
/// UV layer used for texturing and vegetation density lookups.
pub const TERRAIN_UV: &str = "TL_UV";
pub const TERRAIN_MATERIAL: &str = "terrain_material";
pub const TERRAIN_SIDES_MATERIAL: &str = "terrain_sides_material";
pub const SUN_OBJECT: &str = "TL_Sun";

/// Skirt depth as a fraction of the terrain width.
const FRINGE_FRACTION: f64 = 1.0 / 20.0;

/// What a terrain rebuild did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainUpdate {
    /// No terrain existed before this import.
    pub first_import: bool,
    /// World-space bounding box size right after the transform was applied.
    pub dimensions: DVec3,
    /// Vertices lowered into the skirt.
    pub fringe_vertices: usize,
    /// Faces given the side material.
    pub side_faces: usize,
}

/// Rebuilds the terrain object from elevation rasters.
#[derive(Debug)]
pub struct TerrainAdapter {
    flip_v: bool,
    dimensions: Option<DVec3>,
}

impl Default for TerrainAdapter {
    fn default() -> Self {
        Self {
            flip_v: true,
            dimensions: None,
        }
    }
}

impl TerrainAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimensions recorded by the last successful rebuild.
    #[must_use]
    pub fn dimensions(&self) -> Option<DVec3> {
        self.dimensions
    }

    /// Replace the terrain with the raster at `raster_path`.
    ///
    /// The raster is imported before the old terrain is removed. An import
    /// failure leaves the old terrain, the scene and the raster untouched, so
    /// the next poll retries it.
    pub fn terrain_change(
        &mut self,
        scene: &mut SceneRegistry,
        importer: &dyn GisImporter,
        birds: &BirdCameraRig,
        raster_path: &Path,
        crs: &str,
    ) -> Result<TerrainUpdate> {
        let first_import = !scene.contains(TERRAIN_OBJECT);

        let mut imported = importer.import_elevation(raster_path, crs)?;
        if imported.mesh.faces.is_empty() {
            return Err(Error::import(raster_path, "elevation mesh has no faces"));
        }
        imported.name = TERRAIN_OBJECT.to_owned();

        scene.remove(TERRAIN_OBJECT);
        scene.insert(imported.into_object())?;

        let terrain = scene.require_mut(TERRAIN_OBJECT)?;
        terrain.apply_transform();
        let dimensions = terrain.dimensions();
        let mesh = terrain.mesh_mut().ok_or_else(|| Error::MissingObject {
            name: format!("{TERRAIN_OBJECT} (mesh)"),
        })?;

        let uvs = planar_uv(mesh, &DAffine3::IDENTITY, self.flip_v);
        mesh.ensure_uv_layer(TERRAIN_UV).uvs = uvs;
        mesh.activate_uv_layer(TERRAIN_UV);

        let top = mesh.append_material(TERRAIN_MATERIAL);
        for face in &mut mesh.faces {
            face.material_index = top;
        }

        let fringe_vertices = boundary_fringe_drop(mesh, dimensions.x * FRINGE_FRACTION).len();
        let sides = classify_side_faces(mesh, SIDE_UP_LIMIT, SIDE_DOWN_LIMIT);
        mesh.select_faces(&sides);
        let slot = mesh.append_material(TERRAIN_SIDES_MATERIAL);
        mesh.assign_material_to_selected(slot);
        let side_faces = mesh.faces_with_material(slot);

        self.dimensions = Some(dimensions);
        remove_best_effort(raster_path);

        if first_import {
            let max_dimension = dimensions.max_element();
            scene.viewport_mut().fit_to(TERRAIN_OBJECT, max_dimension);
            birds.adjust_to_subject(scene, TERRAIN_OBJECT)?;
            fit_sun(scene, max_dimension);
        } else {
            birds.retarget(scene, TERRAIN_OBJECT)?;
        }

        tracing::info!(
            "Terrain {} ({:.1} x {:.1} x {:.1}), {side_faces} side faces",
            if first_import { "imported" } else { "reimported" },
            dimensions.x,
            dimensions.y,
            dimensions.z
        );
        Ok(TerrainUpdate {
            first_import,
            dimensions,
            fringe_vertices,
            side_faces,
        })
    }
}

// ============================================================================
// Sun
// ============================================================================

/// Return the sun light, creating it with its start-up settings if missing.
pub fn ensure_sun(scene: &mut SceneRegistry) -> &mut SceneObject {
    scene.get_or_insert_with(SUN_OBJECT, || {
        let mut sun = SceneObject::new(
            SUN_OBJECT,
            ObjectData::Sun(SunData {
                energy: 2.0,
                shadow_cascade_max_distance: 1000.0,
            }),
        );
        sun.transform = Transform {
            location: DVec3::new(0.0, 0.0, 1000.0),
            rotation: DVec3::new(0.9, 0.9, 0.0),
            ..Transform::IDENTITY
        };
        sun
    })
}

/// Raise the sun to the terrain's size and stretch its shadow range to match.
fn fit_sun(scene: &mut SceneRegistry, max_dimension: f64) {
    let distance = max_dimension.round();
    let sun = ensure_sun(scene);
    sun.transform.location.z = distance;
    if let ObjectData::Sun(data) = &mut sun.data {
        data.shadow_cascade_max_distance = distance * 2.0;
    }
}
