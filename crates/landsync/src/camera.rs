//! Dynamic camera following the vantage line drawn on the physical model.

use std::path::Path;

use glam::DVec3;

use crate::artifact::remove_shapefile_best_effort;
use crate::error::{Error, Result};
use crate::import::GisImporter;
use crate::scene::{CameraData, Mesh, ObjectData, SceneObject, SceneRegistry, TrackTo};

pub const DYNAMIC_CAMERA: &str = "dynamic_camera";
pub const DYNAMIC_CAMERA_TARGET: &str = "dynamic_camera_target";
/// Hidden object holding the last imported vantage line.
pub const VANTAGE_OBJECT: &str = "vantage";

/// Height of the eye above the first vertex of the line.
pub const EYE_HEIGHT: f64 = 5.0;
/// Height of the look-at point above the first vertex of the line.
pub const TARGET_HEIGHT: f64 = 2.0;

/// Where the dynamic camera ended up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VantagePose {
    pub eye: DVec3,
    pub target: DVec3,
}

impl VantagePose {
    /// Pose for a line: eye above the first vertex, looking towards the last one.
    ///
    /// `None` when the line has fewer than two vertices.
    #[must_use]
    pub fn from_line(line: &[DVec3]) -> Option<Self> {
        let [first, .., last] = line else {
            return None;
        };
        Some(Self {
            eye: *first + DVec3::Z * EYE_HEIGHT,
            target: DVec3::new(last.x, last.y, first.z + TARGET_HEIGHT),
        })
    }
}

/// Places the dynamic camera from vantage polylines.
#[derive(Debug, Default)]
pub struct CameraSynchronizer;

impl CameraSynchronizer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Import the vantage line at `path` and look through the dynamic camera.
    ///
    /// A line with fewer than two vertices is rejected with
    /// [`Error::MalformedArtifact`] before the scene is touched; its file is
    /// left for the producer to overwrite.
    pub fn sync_vantage(
        &self,
        scene: &mut SceneRegistry,
        importer: &dyn GisImporter,
        path: &Path,
        crs: &str,
    ) -> Result<VantagePose> {
        let line = importer.import_vector(path, crs)?;
        let pose = VantagePose::from_line(&line).ok_or_else(|| {
            Error::malformed(
                path,
                format!("vantage line needs 2 vertices, got {}", line.len()),
            )
        })?;

        scene.remove(VANTAGE_OBJECT);
        let mut vantage = SceneObject::new(
            VANTAGE_OBJECT,
            ObjectData::Mesh(Mesh::from_faces(line, Vec::new())),
        );
        vantage.hidden = true;
        scene.insert(vantage)?;

        ensure_dynamic_camera(scene);
        scene.require_mut(DYNAMIC_CAMERA)?.transform.location = pose.eye;
        scene.require_mut(DYNAMIC_CAMERA_TARGET)?.transform.location = pose.target;
        scene.bind_camera(DYNAMIC_CAMERA)?;

        remove_shapefile_best_effort(path);
        tracing::info!(
            "Dynamic camera at {:?} looking at {:?}",
            pose.eye,
            pose.target
        );
        Ok(pose)
    }
}

/// Create the dynamic camera and its look-at target if either is missing.
fn ensure_dynamic_camera(scene: &mut SceneRegistry) {
    scene.get_or_insert_with(DYNAMIC_CAMERA_TARGET, || {
        let mut target = SceneObject::new(DYNAMIC_CAMERA_TARGET, ObjectData::Empty);
        target.hidden = true;
        target
    });
    let camera = scene.get_or_insert_with(DYNAMIC_CAMERA, || {
        let mut camera = SceneObject::new(DYNAMIC_CAMERA, ObjectData::Camera(CameraData::wide()));
        camera.hidden = true;
        camera
    });
    // Re-bind in case the target was recreated.
    camera.track_to = Some(TrackTo {
        target: Some(DYNAMIC_CAMERA_TARGET.to_owned()),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ViewPerspective;
    use crate::testing::{FakeImporter, TempDir};

    fn importer(line: &[DVec3]) -> FakeImporter {
        FakeImporter {
            line: line.to_vec(),
            ..FakeImporter::default()
        }
    }

    #[test]
    fn test_pose_from_line() {
        let line = [
            DVec3::new(1.0, 2.0, 10.0),
            DVec3::new(5.0, 5.0, 50.0),
            DVec3::new(8.0, 9.0, 30.0),
        ];
        let pose = VantagePose::from_line(&line).unwrap();
        assert_eq!(pose.eye, DVec3::new(1.0, 2.0, 15.0));
        assert_eq!(pose.target, DVec3::new(8.0, 9.0, 12.0));
        assert!(VantagePose::from_line(&line[..1]).is_none());
        assert!(VantagePose::from_line(&[]).is_none());
    }

    #[test]
    fn test_sync_vantage_places_camera() {
        let dir = TempDir::new("vantage");
        let shp = dir.touch("vantage.shp");
        dir.touch("vantage.dbf");
        dir.touch("vantage.shx");

        let mut scene = SceneRegistry::new();
        let line = [DVec3::new(0.0, 0.0, 1.0), DVec3::new(10.0, 0.0, 3.0)];
        CameraSynchronizer::new()
            .sync_vantage(&mut scene, &importer(&line), &shp, "EPSG:4326")
            .unwrap();

        let camera = scene.get(DYNAMIC_CAMERA).unwrap();
        assert!(camera.hidden);
        assert_eq!(camera.transform.location, DVec3::new(0.0, 0.0, 6.0));
        assert_eq!(camera.camera().unwrap().angle, crate::scene::WIDE_CAMERA_ANGLE);
        assert_eq!(
            camera.track_to.as_ref().unwrap().target.as_deref(),
            Some(DYNAMIC_CAMERA_TARGET)
        );
        assert_eq!(
            scene.get(DYNAMIC_CAMERA_TARGET).unwrap().transform.location,
            DVec3::new(10.0, 0.0, 3.0)
        );
        assert!(scene.get(VANTAGE_OBJECT).unwrap().hidden);
        assert_eq!(scene.scene_camera(), Some(DYNAMIC_CAMERA));
        assert_eq!(scene.viewport().perspective, ViewPerspective::Camera);
        assert!(dir.file_names().is_empty());
    }

    #[test]
    fn test_sync_vantage_replaces_previous_line() {
        let dir = TempDir::new("vantage-again");
        let mut scene = SceneRegistry::new();
        let sync = CameraSynchronizer::new();

        let first = [DVec3::ZERO, DVec3::X];
        let shp = dir.touch("vantage.shp");
        sync.sync_vantage(&mut scene, &importer(&first), &shp, "EPSG:4326")
            .unwrap();
        let second = [DVec3::Y, DVec3::ONE, DVec3::Z];
        let shp = dir.touch("vantage.shp");
        sync.sync_vantage(&mut scene, &importer(&second), &shp, "EPSG:4326")
            .unwrap();

        assert_eq!(scene.objects().count(), 3);
        assert_eq!(scene.mesh(VANTAGE_OBJECT).unwrap().vertices.len(), 3);
        assert_eq!(
            scene.get(DYNAMIC_CAMERA).unwrap().transform.location,
            DVec3::new(0.0, 1.0, 5.0)
        );
    }

    #[test]
    fn test_single_vertex_line_is_rejected_without_mutation() {
        let dir = TempDir::new("vantage-short");
        let shp = dir.touch("vantage.shp");
        let mut scene = SceneRegistry::new();

        let result = CameraSynchronizer::new().sync_vantage(
            &mut scene,
            &importer(&[DVec3::ONE]),
            &shp,
            "EPSG:4326",
        );
        assert!(matches!(result, Err(Error::MalformedArtifact { .. })));
        assert_eq!(scene.objects().count(), 0);
        assert_eq!(scene.scene_camera(), None);
        assert_eq!(dir.file_names(), vec!["vantage.shp".to_owned()]);
    }
}
