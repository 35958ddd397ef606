//! Ring of overview cameras circling the terrain.
//!
//! The rig is created once when the engine starts. Each camera carries an
//! unbound track-to constraint that is pointed at the terrain on the first
//! import and re-pointed on every re-import; the cameras themselves are never
//! rebuilt.

use glam::DVec3;

use crate::error::{Error, Result};
use crate::geometry::ring_positions;
use crate::scene::{CameraData, ObjectData, SceneObject, SceneRegistry, TrackTo};

/// Number of cameras in the ring.
pub const BIRD_CAMERA_COUNT: usize = 5;
/// Name prefix of ring cameras, followed by `_<index>`.
pub const BIRD_CAMERA_PREFIX: &str = "bird_camera";

/// Ring radius as a multiple of the subject's size.
const RADIUS_FACTOR: f64 = 1.5;
/// Far clip as a multiple of the ring radius.
const CLIP_FACTOR: f64 = 1.5;

/// Where a camera of the ring was placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingLayout {
    /// Rounded largest dimension of the subject; also the camera elevation.
    pub distance: f64,
    pub radius: f64,
    pub clip_end: f64,
}

impl RingLayout {
    /// Layout for a subject whose largest bounding box dimension is `max_dimension`.
    #[must_use]
    pub fn for_dimension(max_dimension: f64) -> Self {
        let distance = max_dimension.round();
        let radius = distance * RADIUS_FACTOR;
        Self {
            distance,
            radius,
            clip_end: radius * CLIP_FACTOR,
        }
    }
}

/// Fixed set of overview cameras, addressed by name through the registry.
#[derive(Debug, Clone)]
pub struct BirdCameraRig {
    names: Vec<String>,
}

impl BirdCameraRig {
    /// Create `count` hidden wide-angle cameras, reusing any that already exist.
    pub fn create(scene: &mut SceneRegistry, count: usize) -> Self {
        let names: Vec<String> = (0..count)
            .map(|i| format!("{BIRD_CAMERA_PREFIX}_{i}"))
            .collect();
        for name in &names {
            scene.get_or_insert_with(name, || {
                let mut camera = SceneObject::new(name.as_str(), ObjectData::Camera(CameraData::wide()));
                camera.hidden = true;
                camera.track_to = Some(TrackTo::default());
                camera
            });
        }
        tracing::debug!("Bird camera rig ready with {count} cameras");
        Self { names }
    }

    /// Camera names in ring order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Spread the ring around `subject` and aim every camera at it.
    pub fn adjust_to_subject(&self, scene: &mut SceneRegistry, subject: &str) -> Result<RingLayout> {
        let dimensions = scene
            .get(subject)
            .ok_or_else(|| Error::MissingObject {
                name: subject.to_owned(),
            })?
            .dimensions();
        let layout = RingLayout::for_dimension(dimensions.max_element());

        let positions = ring_positions(layout.radius, self.names.len());
        for (name, position) in self.names.iter().zip(positions) {
            let camera = scene.require_mut(name)?;
            camera.transform.location = DVec3::new(position.x, position.y, layout.distance);
            camera.track_to = Some(TrackTo {
                target: Some(subject.to_owned()),
            });
            if let Some(data) = camera.camera_mut() {
                data.clip_end = layout.clip_end;
            }
        }
        tracing::info!(
            "Bird cameras circling {subject} at radius {} and elevation {}",
            layout.radius,
            layout.distance
        );
        Ok(layout)
    }

    /// Aim every camera at `subject` without moving it.
    pub fn retarget(&self, scene: &mut SceneRegistry, subject: &str) -> Result<()> {
        if !scene.contains(subject) {
            return Err(Error::MissingObject {
                name: subject.to_owned(),
            });
        }
        for name in &self.names {
            scene.require_mut(name)?.track_to = Some(TrackTo {
                target: Some(subject.to_owned()),
            });
        }
        Ok(())
    }

    /// Look through the next camera of the ring.
    ///
    /// Starts at the first camera when the scene camera isn't part of the ring.
    /// Returns the name of the camera now active.
    pub fn toggle_next(&self, scene: &mut SceneRegistry) -> Result<&str> {
        let next = match scene
            .scene_camera()
            .and_then(|current| self.names.iter().position(|name| name == current))
        {
            Some(index) => (index + 1) % self.names.len(),
            None => 0,
        };
        let name = self.names.get(next).ok_or_else(|| Error::MissingObject {
            name: format!("{BIRD_CAMERA_PREFIX}_{next}"),
        })?;
        scene.bind_camera(name)?;
        tracing::debug!("Viewing through {name}");
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ViewPerspective;
    use crate::testing::grid_mesh;
    use proptest::prelude::*;

    fn scene_with_subject(size: f64) -> SceneRegistry {
        let mut scene = SceneRegistry::new();
        // 3x3 grid of 100 unit cells scaled to `size` across.
        let mut terrain = SceneObject::new("terrain", ObjectData::Mesh(grid_mesh(3, 3, 100.0)));
        terrain.transform.scale = DVec3::splat(size / 200.0);
        scene.insert(terrain).unwrap();
        scene
    }

    #[test]
    fn test_create_is_idempotent() {
        let mut scene = SceneRegistry::new();
        let rig = BirdCameraRig::create(&mut scene, BIRD_CAMERA_COUNT);
        BirdCameraRig::create(&mut scene, BIRD_CAMERA_COUNT);

        assert_eq!(scene.objects().count(), 5);
        assert_eq!(rig.names()[4], "bird_camera_4");
        let camera = scene.get("bird_camera_0").unwrap();
        assert!(camera.hidden);
        assert_eq!(camera.track_to, Some(TrackTo::default()));
        assert!(!camera.camera().unwrap().show_passepartout);
    }

    #[test]
    fn test_adjust_to_200_unit_terrain() {
        let mut scene = scene_with_subject(200.0);
        let rig = BirdCameraRig::create(&mut scene, BIRD_CAMERA_COUNT);

        let layout = rig.adjust_to_subject(&mut scene, "terrain").unwrap();
        assert_eq!(layout.radius, 300.0);
        assert_eq!(layout.clip_end, 450.0);

        for (i, name) in rig.names().iter().enumerate() {
            let camera = scene.get(name).unwrap();
            let angle = std::f64::consts::TAU / 5.0 * (i + 1) as f64;
            let expected = DVec3::new(angle.cos() * 300.0, angle.sin() * 300.0, 200.0);
            assert!((camera.transform.location - expected).length() < 1e-9);
            assert_eq!(camera.camera().unwrap().clip_end, 450.0);
            assert_eq!(
                camera.track_to.as_ref().unwrap().target.as_deref(),
                Some("terrain")
            );
        }
        // The fifth camera sits at 360 degrees.
        let last = scene.get("bird_camera_4").unwrap().transform.location;
        assert!((last.x - 300.0).abs() < 1e-9 && last.y.abs() < 1e-9);
    }

    #[test]
    fn test_adjust_missing_subject() {
        let mut scene = SceneRegistry::new();
        let rig = BirdCameraRig::create(&mut scene, 2);
        assert!(matches!(
            rig.adjust_to_subject(&mut scene, "terrain"),
            Err(Error::MissingObject { .. })
        ));
        assert!(rig.retarget(&mut scene, "terrain").is_err());
    }

    #[test]
    fn test_retarget_keeps_positions() {
        let mut scene = scene_with_subject(200.0);
        let rig = BirdCameraRig::create(&mut scene, BIRD_CAMERA_COUNT);
        rig.adjust_to_subject(&mut scene, "terrain").unwrap();
        let before = scene.get("bird_camera_2").unwrap().transform;

        scene.remove("terrain");
        assert_eq!(
            scene.get("bird_camera_2").unwrap().track_to,
            Some(TrackTo::default())
        );
        scene
            .insert(SceneObject::new("terrain", ObjectData::Mesh(grid_mesh(2, 2, 1.0))))
            .unwrap();
        rig.retarget(&mut scene, "terrain").unwrap();

        let camera = scene.get("bird_camera_2").unwrap();
        assert_eq!(camera.transform, before);
        assert_eq!(
            camera.track_to.as_ref().unwrap().target.as_deref(),
            Some("terrain")
        );
    }

    #[test]
    fn test_toggle_starts_at_first_camera() {
        let mut scene = SceneRegistry::new();
        let rig = BirdCameraRig::create(&mut scene, BIRD_CAMERA_COUNT);
        scene
            .insert(SceneObject::new("dynamic_camera", ObjectData::Camera(CameraData::wide())))
            .unwrap();
        scene.bind_camera("dynamic_camera").unwrap();

        assert_eq!(rig.toggle_next(&mut scene).unwrap(), "bird_camera_0");
        assert_eq!(rig.toggle_next(&mut scene).unwrap(), "bird_camera_1");
        assert_eq!(scene.viewport().perspective, ViewPerspective::Camera);
        assert!(scene.viewport().camera_centered);
    }

    #[test]
    fn test_toggle_empty_rig() {
        let mut scene = SceneRegistry::new();
        let rig = BirdCameraRig::create(&mut scene, 0);
        assert!(rig.toggle_next(&mut scene).is_err());
    }

    proptest! {
        #[test]
        fn test_toggle_cycles_back(count in 1usize..8, start in 0usize..8) {
            let mut scene = SceneRegistry::new();
            let rig = BirdCameraRig::create(&mut scene, count);
            let start = rig.names()[start % count].clone();
            scene.bind_camera(&start).unwrap();

            for _ in 0..count {
                rig.toggle_next(&mut scene).unwrap();
            }
            prop_assert_eq!(scene.scene_camera(), Some(start.as_str()));
        }
    }
}
