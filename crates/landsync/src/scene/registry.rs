//! Name-indexed ownership of scene objects and data-blocks.

use std::collections::BTreeMap;
use std::path::Path;

use super::{Image, Material, Mesh, SceneObject, Texture, World};
use crate::error::{Error, Result};

/// Clip distance ceiling; larger values break depth precision in the viewport.
pub const MAX_CLIP_END: f64 = 10_000_000.0;

/// How the 3D viewport looks at the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewPerspective {
    #[default]
    Perspective,
    /// Looking through the active scene camera.
    Camera,
}

/// State of the interactive 3D viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub clip_start: f64,
    pub clip_end: f64,
    pub perspective: ViewPerspective,
    /// Object the view was last framed on.
    pub framed: Option<String>,
    /// Whether the camera view is centred in the viewport.
    pub camera_centered: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            clip_start: 0.01,
            clip_end: 1000.0,
            perspective: ViewPerspective::Perspective,
            framed: None,
            camera_centered: false,
        }
    }
}

impl Viewport {
    /// Fit clip distances to a subject of the given largest dimension and frame it.
    ///
    /// The far plane is only ever pushed out, never pulled in.
    pub fn fit_to(&mut self, subject: &str, max_dimension: f64) {
        let distance = max_dimension.round() * 5.0;
        self.clip_start = if distance < 100.0 {
            1.0
        } else if distance < 1000.0 {
            10.0
        } else {
            100.0
        };
        if self.clip_end < distance {
            self.clip_end = distance.min(MAX_CLIP_END);
        }
        self.framed = Some(subject.to_owned());
    }
}

/// Owner of everything in the scene.
///
/// Objects and data-blocks are keyed by unique name. Callers keep names, not
/// references, and look objects up again whenever they need them.
#[derive(Debug, Default)]
pub struct SceneRegistry {
    objects: BTreeMap<String, SceneObject>,
    materials: BTreeMap<String, Material>,
    images: BTreeMap<String, Image>,
    textures: BTreeMap<String, Texture>,
    collections: BTreeMap<String, Vec<String>>,
    world: Option<World>,
    scene_camera: Option<String>,
    active_object: Option<String>,
    viewport: Viewport,
}

impl SceneRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================================================
    // Objects
    // ============================================================================

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SceneObject> {
        self.objects.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.get_mut(name)
    }

    /// Like [`get_mut`](Self::get_mut), but a missing object is an error.
    pub fn require_mut(&mut self, name: &str) -> Result<&mut SceneObject> {
        self.objects.get_mut(name).ok_or_else(|| Error::MissingObject {
            name: name.to_owned(),
        })
    }

    /// The mesh of a mesh object.
    #[must_use]
    pub fn mesh(&self, name: &str) -> Option<&Mesh> {
        self.get(name).and_then(SceneObject::mesh)
    }

    /// Add an object. Fails if the name is taken.
    pub fn insert(&mut self, object: SceneObject) -> Result<&mut SceneObject> {
        use std::collections::btree_map::Entry;
        match self.objects.entry(object.name.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateObject { name: object.name }),
            Entry::Vacant(slot) => Ok(slot.insert(object)),
        }
    }

    /// Return the named object, creating it with `create` if it doesn't exist.
    pub fn get_or_insert_with(
        &mut self,
        name: &str,
        create: impl FnOnce() -> SceneObject,
    ) -> &mut SceneObject {
        self.objects
            .entry(name.to_owned())
            .or_insert_with(|| SceneObject {
                name: name.to_owned(),
                ..create()
            })
    }

    /// Remove an object and every by-name reference to it. No-op if absent.
    pub fn remove(&mut self, name: &str) -> Option<SceneObject> {
        let removed = self.objects.remove(name)?;
        for object in self.objects.values_mut() {
            if let Some(track) = &mut object.track_to {
                if track.target.as_deref() == Some(name) {
                    track.target = None;
                }
            }
        }
        for members in self.collections.values_mut() {
            members.retain(|member| member != name);
        }
        if self.scene_camera.as_deref() == Some(name) {
            self.scene_camera = None;
        }
        if self.active_object.as_deref() == Some(name) {
            self.active_object = None;
        }
        if self.viewport.framed.as_deref() == Some(name) {
            self.viewport.framed = None;
        }
        Some(removed)
    }

    /// Rename an object. Fails if `from` is missing or `to` is taken.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        if self.objects.contains_key(to) {
            return Err(Error::DuplicateObject {
                name: to.to_owned(),
            });
        }
        let mut object = self.objects.remove(from).ok_or_else(|| Error::MissingObject {
            name: from.to_owned(),
        })?;
        object.name = to.to_owned();
        self.objects.insert(to.to_owned(), object);
        Ok(())
    }

    /// All objects, ordered by name.
    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values()
    }

    // ============================================================================
    // Cameras and viewport
    // ============================================================================

    /// Name of the camera the scene renders through.
    #[must_use]
    pub fn scene_camera(&self) -> Option<&str> {
        self.scene_camera.as_deref()
    }

    #[must_use]
    pub fn active_object(&self) -> Option<&str> {
        self.active_object.as_deref()
    }

    /// Make a camera the scene camera and look through it in the viewport.
    pub fn bind_camera(&mut self, name: &str) -> Result<()> {
        let object = self.get(name).ok_or_else(|| Error::MissingObject {
            name: name.to_owned(),
        })?;
        if !object.is_camera() {
            return Err(Error::MissingObject {
                name: format!("{name} (camera)"),
            });
        }
        self.scene_camera = Some(name.to_owned());
        self.active_object = Some(name.to_owned());
        self.viewport.perspective = ViewPerspective::Camera;
        self.viewport.camera_centered = true;
        Ok(())
    }

    #[must_use]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    // ============================================================================
    // Data-blocks
    // ============================================================================

    #[must_use]
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    /// Add or replace a material.
    pub fn set_material(&mut self, material: Material) {
        self.materials.insert(material.name.clone(), material);
    }

    #[must_use]
    pub fn image(&self, name: &str) -> Option<&Image> {
        self.images.get(name)
    }

    pub fn images(&self) -> impl Iterator<Item = &Image> {
        self.images.values()
    }

    /// Add or replace an image.
    pub fn set_image(&mut self, image: Image) {
        self.images.insert(image.name.clone(), image);
    }

    /// Remove images matching a predicate, unlinking them from textures and
    /// materials. Returns how many were removed.
    pub fn remove_images_where(&mut self, mut predicate: impl FnMut(&Image) -> bool) -> usize {
        let doomed: Vec<String> = self
            .images
            .values()
            .filter(|image| predicate(image))
            .map(|image| image.name.clone())
            .collect();
        for name in &doomed {
            self.images.remove(name);
            for texture in self.textures.values_mut() {
                if texture.image.as_deref() == Some(name.as_str()) {
                    texture.image = None;
                }
            }
            for material in self.materials.values_mut() {
                if material.base_color_image.as_deref() == Some(name.as_str()) {
                    material.base_color_image = None;
                }
            }
        }
        doomed.len()
    }

    /// Remove every image loaded from `path` or named `name`.
    pub fn purge_images(&mut self, name: &str, path: &Path) -> usize {
        self.remove_images_where(|image| image.name == name || image.filepath == path)
    }

    #[must_use]
    pub fn texture(&self, name: &str) -> Option<&Texture> {
        self.textures.get(name)
    }

    pub fn textures(&self) -> impl Iterator<Item = &Texture> {
        self.textures.values()
    }

    /// Get or create an image texture.
    pub fn ensure_texture(&mut self, name: &str) -> &mut Texture {
        self.textures
            .entry(name.to_owned())
            .or_insert_with(|| Texture::new(name))
    }

    pub fn remove_texture(&mut self, name: &str) -> Option<Texture> {
        self.textures.remove(name)
    }

    /// Members of a collection, if it exists.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&[String]> {
        self.collections.get(name).map(Vec::as_slice)
    }

    /// Create or replace a collection.
    pub fn set_collection(&mut self, name: &str, members: Vec<String>) {
        self.collections.insert(name.to_owned(), members);
    }

    #[must_use]
    pub fn world(&self) -> Option<&World> {
        self.world.as_ref()
    }

    pub fn set_world(&mut self, world: World) {
        self.world = Some(world);
    }
}
