//! In-memory scene graph mutated by the synchronisation engine.
//!
//! The [`SceneRegistry`] exclusively owns every object and data-block. Other
//! components refer to objects by name and resolve them through the registry
//! each time, so a removed object can never be reached through a stale handle.

mod mesh;
mod registry;
mod resources;

use glam::{DAffine3, DQuat, DVec3, EulerRot};

pub use mesh::{Face, Mesh, UvLayer};
pub use registry::{SceneRegistry, ViewPerspective, Viewport};
pub use resources::{
    ColorRamp, ColorSpace, Extension, Image, Material, RampStop, Texture, TextureCoords, World,
};

/// Field of view shared by the dynamic and bird cameras, in radians (80 degrees).
pub const WIDE_CAMERA_ANGLE: f64 = 1.396_26;

/// Location, rotation and scale of an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub location: DVec3,
    /// Euler angles in radians, applied X then Y then Z.
    pub rotation: DVec3,
    pub scale: DVec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        location: DVec3::ZERO,
        rotation: DVec3::ZERO,
        scale: DVec3::ONE,
    };

    #[must_use]
    pub fn from_location(location: DVec3) -> Self {
        Self {
            location,
            ..Self::IDENTITY
        }
    }

    /// Object-to-world matrix.
    #[must_use]
    pub fn matrix(&self) -> DAffine3 {
        let rotation = DQuat::from_euler(
            EulerRot::ZYX,
            self.rotation.z,
            self.rotation.y,
            self.rotation.x,
        );
        DAffine3::from_scale_rotation_translation(self.scale, rotation, self.location)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Perspective camera settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraData {
    /// Horizontal field of view in radians.
    pub angle: f64,
    pub clip_start: f64,
    pub clip_end: f64,
    pub show_passepartout: bool,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            angle: 0.691_111,
            clip_start: 0.1,
            clip_end: 1000.0,
            show_passepartout: true,
        }
    }
}

impl CameraData {
    /// Wide-angle camera without passepartout, as used by every camera we create.
    #[must_use]
    pub fn wide() -> Self {
        Self {
            angle: WIDE_CAMERA_ANGLE,
            show_passepartout: false,
            ..Self::default()
        }
    }
}

/// Sun lamp settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunData {
    pub energy: f64,
    pub shadow_cascade_max_distance: f64,
}

/// What an object carries.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    Mesh(Mesh),
    Camera(CameraData),
    Sun(SunData),
    /// Transform-only object, e.g. a look-at target.
    Empty,
}

/// Aims the object's −Z axis at a target with +Y up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTo {
    /// Target object name; `None` leaves the constraint unbound.
    pub target: Option<String>,
}

/// Particle system attached to a mesh object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modifier {
    pub name: String,
    /// Name of the particle system instance.
    pub system: String,
    /// Key of the placement configuration driving it.
    pub settings: String,
}

/// A named object in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub transform: Transform,
    pub data: ObjectData,
    /// Hidden in the viewport.
    pub hidden: bool,
    /// Hidden in renders.
    pub hide_render: bool,
    pub track_to: Option<TrackTo>,
    pub modifiers: Vec<Modifier>,
}

impl SceneObject {
    #[must_use]
    pub fn new(name: impl Into<String>, data: ObjectData) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            data,
            hidden: false,
            hide_render: false,
            track_to: None,
            modifiers: Vec::new(),
        }
    }

    #[must_use]
    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.data {
            ObjectData::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.data {
            ObjectData::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    #[must_use]
    pub fn camera(&self) -> Option<&CameraData> {
        match &self.data {
            ObjectData::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn camera_mut(&mut self) -> Option<&mut CameraData> {
        match &mut self.data {
            ObjectData::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_camera(&self) -> bool {
        matches!(self.data, ObjectData::Camera(_))
    }

    /// World-space bounding box extents, or zero for objects without geometry.
    #[must_use]
    pub fn dimensions(&self) -> DVec3 {
        self.mesh()
            .and_then(Mesh::bounds)
            .map_or(DVec3::ZERO, |b| b.dimensions() * self.transform.scale.abs())
    }

    /// Bake the transform into the mesh and reset it to identity.
    ///
    /// No-op for objects without a mesh.
    pub fn apply_transform(&mut self) {
        let matrix = self.transform.matrix();
        if let ObjectData::Mesh(mesh) = &mut self.data {
            mesh.apply_transform(&matrix);
            self.transform = Transform::IDENTITY;
        }
    }
}
