//! Vegetation planting from per-class density masks.
//!
//! Every `patch_<class>.png` mask becomes one particle modifier on the terrain,
//! driven by a placement configuration keyed by the class. The mask is bound
//! through the terrain's UV layer as a subtractive density texture: black
//! keeps full density, white removes it. Rerunning a class replaces its
//! modifier, image and texture instead of adding new ones.

use std::collections::BTreeMap;
use std::path::Path;

use glam::DVec2;

use crate::artifact::{PATCH_PREFIX, mark_done_best_effort, patch_class};
use crate::error::{Error, Result};
use crate::geometry::planar_uv;
use crate::scene::{
    ColorRamp, ColorSpace, Extension, Image, Modifier, SceneRegistry, TextureCoords,
};
use crate::terrain::{TERRAIN_OBJECT, TERRAIN_UV};

/// Particle count every configuration is reset to on each run.
pub const DEFAULT_COUNT: u32 = 150;
/// Particle size applied when a configuration has none.
pub const DEFAULT_PARTICLE_SIZE: f64 = 0.8;
/// Name prefix of the particle modifiers we own.
pub const MODIFIER_PREFIX: &str = "PS_";

// ============================================================================
// Placement configuration
// ============================================================================

/// What each particle instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderTarget {
    /// A single prototype object.
    Object(String),
    /// Members of a collection.
    Collection { name: String, pick_random: bool },
}

/// How a texture slot combines with the density accumulated so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendType {
    #[default]
    Mix,
    Multiply,
    Subtract,
}

/// Orientation of instanced particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationMode {
    Normal,
    #[default]
    GlobalX,
}

/// A texture influencing a placement configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSlot {
    pub texture: String,
    pub coords: TextureCoords,
    pub uv_layer: Option<String>,
    pub use_map_density: bool,
    pub blend: BlendType,
}

/// Settings of one class's hair particle system, emitted from terrain faces.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementConfig {
    pub name: String,
    pub count: u32,
    pub particle_size: f64,
    pub size_random: f64,
    pub use_emit_random: bool,
    pub use_even_distribution: bool,
    /// Child particles multiply the count; always off.
    pub use_children: bool,
    /// Share of particles drawn in the viewport, in percent.
    pub display_percentage: u8,
    pub render_step: u32,
    pub display_step: u32,
    pub use_rotations: bool,
    pub rotation_mode: RotationMode,
    pub use_modifier_stack: bool,
    pub render_target: Option<RenderTarget>,
    pub texture_slots: Vec<TextureSlot>,
}

impl PlacementConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: DEFAULT_COUNT,
            particle_size: DEFAULT_PARTICLE_SIZE,
            size_random: 0.5,
            use_emit_random: true,
            use_even_distribution: false,
            use_children: false,
            display_percentage: 25,
            render_step: 2,
            display_step: 1,
            use_rotations: true,
            rotation_mode: RotationMode::GlobalX,
            use_modifier_stack: true,
            render_target: None,
            texture_slots: Vec::new(),
        }
    }

    /// Reset the count and fill in a missing size.
    #[allow(clippy::float_cmp)]
    fn normalize(&mut self) {
        self.count = DEFAULT_COUNT;
        if self.particle_size == 0.0 {
            self.particle_size = DEFAULT_PARTICLE_SIZE;
        }
    }

    /// Emission density in `[0, 1]` at a UV coordinate of the emitter.
    ///
    /// Starts from full density and folds in every density slot in order.
    /// Slots whose texture or image is missing are ignored.
    #[must_use]
    pub fn density_at(&self, scene: &SceneRegistry, uv: DVec2) -> f32 {
        let mut density = 1.0_f32;
        for slot in self.texture_slots.iter().filter(|s| s.use_map_density) {
            let Some(texture) = scene.texture(&slot.texture) else {
                continue;
            };
            let Some(image) = texture.image.as_deref().and_then(|name| scene.image(name)) else {
                continue;
            };
            let value = texture.sample(image, uv);
            density = match slot.blend {
                BlendType::Mix => value,
                BlendType::Multiply => density * value,
                BlendType::Subtract => density - value,
            };
        }
        density.clamp(0.0, 1.0)
    }
}

/// Placement configurations keyed by class id.
#[derive(Debug, Default)]
pub struct PlacementTable {
    configs: BTreeMap<String, PlacementConfig>,
}

impl PlacementTable {
    /// Get the configuration for `class`, creating it with defaults.
    pub fn get_or_create(&mut self, class: &str) -> &mut PlacementConfig {
        self.configs
            .entry(class.to_owned())
            .or_insert_with(|| PlacementConfig::new(class))
    }

    #[must_use]
    pub fn get(&self, class: &str) -> Option<&PlacementConfig> {
        self.configs.get(class)
    }

    /// Insert or replace a configuration.
    pub fn insert(&mut self, config: PlacementConfig) {
        self.configs.insert(config.name.clone(), config);
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

// ============================================================================
// Placer
// ============================================================================

/// Outcome of a planting pass.
#[derive(Debug, Default)]
pub struct PlantReport {
    /// Classes planted, in processing order.
    pub planted: Vec<String>,
    /// Masks left in place, with the reason.
    pub skipped: Vec<(String, Error)>,
    /// No terrain existed, so nothing was looked at.
    pub waiting_for_terrain: bool,
}

/// Turns density masks into particle modifiers on the terrain.
#[derive(Debug)]
pub struct VegetationPlacer {
    realism: String,
    table: PlacementTable,
}

impl VegetationPlacer {
    /// `realism` namespaces prototype collections, e.g. `High_class1`.
    #[must_use]
    pub fn new(realism: impl Into<String>) -> Self {
        Self {
            realism: realism.into(),
            table: PlacementTable::default(),
        }
    }

    #[must_use]
    pub fn placements(&self) -> &PlacementTable {
        &self.table
    }

    pub fn placements_mut(&mut self) -> &mut PlacementTable {
        &mut self.table
    }

    /// Plant every mask in `files`, in order, from `watch_folder`.
    ///
    /// Each mask is independent: one that fails is reported and left on disk
    /// while the others proceed. Planted masks are renamed to `.done`.
    pub fn plant_from_patches(
        &mut self,
        scene: &mut SceneRegistry,
        files: &[String],
        watch_folder: &Path,
    ) -> PlantReport {
        let mut report = PlantReport::default();
        if !scene.contains(TERRAIN_OBJECT) {
            tracing::info!(
                "No terrain yet, leaving {} vegetation mask(s) for later",
                files.len()
            );
            report.waiting_for_terrain = true;
            return report;
        }

        for file in files {
            match self.plant_one(scene, file, &watch_folder.join(file)) {
                Ok(class) => report.planted.push(class),
                Err(e) => {
                    tracing::warn!("Skipping {file}: {e}");
                    report.skipped.push((file.clone(), e));
                }
            }
        }
        if !report.planted.is_empty() {
            tracing::info!("Planted: {}", report.planted.join(", "));
        }
        report
    }

    fn plant_one(&mut self, scene: &mut SceneRegistry, file: &str, path: &Path) -> Result<String> {
        let class = patch_class(file)
            .ok_or_else(|| Error::malformed(path, "expected patch_<class>.png"))?
            .to_owned();

        ensure_terrain_uv(scene)?;

        let config = self.table.get_or_create(&class);
        config.normalize();
        let target = resolve_render_target(scene, &class, &self.realism)
            .ok_or_else(|| Error::MissingRenderTarget {
                class: class.clone(),
            })?;

        // Decode first so a half-written mask keeps the previous planting.
        let pixels = image::open(path)
            .map_err(|e| Error::import(path, e))?
            .to_luma8();

        scene.purge_images(file, path);
        scene.set_image(Image {
            name: file.to_owned(),
            filepath: path.to_owned(),
            color_space: ColorSpace::NonColor,
            packed: Some(pixels),
        });
        let texture = scene.ensure_texture(&class);
        texture.image = Some(file.to_owned());
        texture.extension = Extension::Clip;
        texture.interpolation = false;
        texture.use_alpha = false;
        texture.color_ramp = Some(ColorRamp::binary_threshold());

        config.render_target = Some(target);
        config.texture_slots = vec![TextureSlot {
            texture: class.clone(),
            coords: TextureCoords::Uv,
            uv_layer: Some(TERRAIN_UV.to_owned()),
            use_map_density: true,
            blend: BlendType::Subtract,
        }];

        let terrain = scene.require_mut(TERRAIN_OBJECT)?;
        terrain.modifiers.retain(|m| m.system != class);
        terrain.modifiers.push(Modifier {
            name: format!("{MODIFIER_PREFIX}{class}"),
            system: class.clone(),
            settings: class.clone(),
        });

        mark_done_best_effort(path);
        tracing::debug!("Planted {class} from {file}");
        Ok(class)
    }

    /// Remove every modifier from the terrain. Returns how many were removed.
    pub fn clear(&self, scene: &mut SceneRegistry) -> usize {
        let Some(terrain) = scene.get_mut(TERRAIN_OBJECT) else {
            return 0;
        };
        let removed = terrain.modifiers.len();
        terrain.modifiers.clear();
        tracing::info!("Cleared {removed} vegetation modifier(s)");
        removed
    }

    /// Drop mask images, terrain particle modifiers and the textures of `classes`
    /// along with every class already configured.
    pub fn purge<'a>(&self, scene: &mut SceneRegistry, classes: impl IntoIterator<Item = &'a str>) {
        let images = scene.remove_images_where(|image| image.name.contains(PATCH_PREFIX));
        let modifiers = self.clear(scene);
        let mut doomed: Vec<String> = classes.into_iter().map(str::to_owned).collect();
        doomed.extend(self.table.classes().map(str::to_owned));
        let mut textures = 0;
        for class in &doomed {
            if scene.remove_texture(class).is_some() {
                textures += 1;
            }
        }
        tracing::debug!(
            "Purged {images} mask image(s), {modifiers} modifier(s), {textures} texture(s)"
        );
    }
}

/// Prototype for a class: an object named after it, else a collection named
/// after it or after `<realism>_<class>`.
fn resolve_render_target(scene: &SceneRegistry, class: &str, realism: &str) -> Option<RenderTarget> {
    if scene.contains(class) {
        return Some(RenderTarget::Object(class.to_owned()));
    }
    let themed = format!("{realism}_{class}");
    [class, themed.as_str()]
        .into_iter()
        .find(|name| scene.collection(name).is_some())
        .map(|name| RenderTarget::Collection {
            name: name.to_owned(),
            pick_random: true,
        })
}

/// Give the terrain a planar UV layer if it has none, and make it active.
fn ensure_terrain_uv(scene: &mut SceneRegistry) -> Result<()> {
    let terrain = scene.require_mut(TERRAIN_OBJECT)?;
    let matrix = terrain.transform.matrix();
    let mesh = terrain.mesh_mut().ok_or_else(|| Error::MissingObject {
        name: format!("{TERRAIN_OBJECT} (mesh)"),
    })?;
    if mesh.uv_layer(TERRAIN_UV).is_none() {
        let uvs = planar_uv(mesh, &matrix, true);
        mesh.ensure_uv_layer(TERRAIN_UV).uvs = uvs;
    }
    mesh.activate_uv_layer(TERRAIN_UV);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ObjectData, SceneObject};
    use crate::testing::{TempDir, grid_mesh};

    fn scene_with_terrain() -> SceneRegistry {
        let mut scene = SceneRegistry::new();
        scene
            .insert(SceneObject::new(
                TERRAIN_OBJECT,
                ObjectData::Mesh(grid_mesh(3, 3, 10.0)),
            ))
            .unwrap();
        scene
    }

    fn add_prototype(scene: &mut SceneRegistry, class: &str) {
        let mut prototype = SceneObject::new(class, ObjectData::Mesh(grid_mesh(2, 2, 1.0)));
        prototype.hidden = true;
        scene.insert(prototype).unwrap();
    }

    fn plant(
        placer: &mut VegetationPlacer,
        scene: &mut SceneRegistry,
        dir: &TempDir,
        names: &[&str],
    ) -> PlantReport {
        let files: Vec<String> = names.iter().map(|&n| n.to_owned()).collect();
        placer.plant_from_patches(scene, &files, dir.path())
    }

    #[test]
    fn test_no_terrain_leaves_everything() {
        let dir = TempDir::new("veg-no-terrain");
        dir.write_mask("patch_class1.png");
        let mut scene = SceneRegistry::new();
        add_prototype(&mut scene, "class1");
        let mut placer = VegetationPlacer::new("High");

        let report = plant(&mut placer, &mut scene, &dir, &["patch_class1.png"]);
        assert!(report.waiting_for_terrain);
        assert!(report.planted.is_empty());
        assert!(placer.placements().is_empty());
        assert_eq!(scene.images().count(), 0);
        assert_eq!(scene.textures().count(), 0);
        assert_eq!(dir.file_names(), vec!["patch_class1.png".to_owned()]);
    }

    #[test]
    fn test_plant_object_target() {
        let dir = TempDir::new("veg-plant");
        dir.write_mask("patch_class1.png");
        let mut scene = scene_with_terrain();
        add_prototype(&mut scene, "class1");
        let mut placer = VegetationPlacer::new("High");

        let report = plant(&mut placer, &mut scene, &dir, &["patch_class1.png"]);
        assert_eq!(report.planted, vec!["class1".to_owned()]);
        assert_eq!(dir.file_names(), vec!["patch_class1.done".to_owned()]);

        let terrain = scene.get(TERRAIN_OBJECT).unwrap();
        assert_eq!(
            terrain.modifiers,
            vec![Modifier {
                name: "PS_class1".into(),
                system: "class1".into(),
                settings: "class1".into(),
            }]
        );
        assert_eq!(
            terrain.mesh().unwrap().active_uv_layer().unwrap().name,
            TERRAIN_UV
        );

        let image = scene.image("patch_class1.png").unwrap();
        assert_eq!(image.color_space, ColorSpace::NonColor);
        assert!(image.packed.is_some());

        let texture = scene.texture("class1").unwrap();
        assert_eq!(texture.image.as_deref(), Some("patch_class1.png"));
        assert_eq!(texture.extension, Extension::Clip);
        assert!(!texture.interpolation);
        assert_eq!(texture.color_ramp, Some(ColorRamp::binary_threshold()));

        let config = placer.placements().get("class1").unwrap();
        assert_eq!(config.count, DEFAULT_COUNT);
        assert_eq!(
            config.render_target,
            Some(RenderTarget::Object("class1".into()))
        );
        assert_eq!(config.texture_slots.len(), 1);
        assert_eq!(config.texture_slots[0].blend, BlendType::Subtract);
        assert_eq!(config.texture_slots[0].uv_layer.as_deref(), Some(TERRAIN_UV));
    }

    #[test]
    fn test_repeated_runs_do_not_accumulate() {
        let dir = TempDir::new("veg-repeat");
        let mut scene = scene_with_terrain();
        add_prototype(&mut scene, "class1");
        add_prototype(&mut scene, "class2");
        let mut placer = VegetationPlacer::new("High");

        for _ in 0..2 {
            dir.write_mask("patch_class1.png");
            dir.write_mask("patch_class2.png");
            let report = plant(
                &mut placer,
                &mut scene,
                &dir,
                &["patch_class1.png", "patch_class2.png"],
            );
            assert_eq!(report.planted.len(), 2);
        }

        let terrain = scene.get(TERRAIN_OBJECT).unwrap();
        assert_eq!(terrain.modifiers.len(), 2);
        assert_eq!(scene.images().count(), 2);
        assert_eq!(scene.textures().count(), 2);
        assert_eq!(placer.placements().len(), 2);
        assert_eq!(
            dir.file_names(),
            vec!["patch_class1.done".to_owned(), "patch_class2.done".to_owned()]
        );
    }

    #[test]
    fn test_replant_replaces_only_its_class() {
        let dir = TempDir::new("veg-replant");
        let mut scene = scene_with_terrain();
        add_prototype(&mut scene, "class1");
        add_prototype(&mut scene, "class2");
        let mut placer = VegetationPlacer::new("High");

        dir.write_mask("patch_class1.png");
        dir.write_mask("patch_class2.png");
        plant(
            &mut placer,
            &mut scene,
            &dir,
            &["patch_class1.png", "patch_class2.png"],
        );
        dir.write_mask("patch_class2.png");
        plant(&mut placer, &mut scene, &dir, &["patch_class2.png"]);

        let systems: Vec<&str> = scene
            .get(TERRAIN_OBJECT)
            .unwrap()
            .modifiers
            .iter()
            .map(|m| m.system.as_str())
            .collect();
        assert_eq!(systems, vec!["class1", "class2"]);
        assert_eq!(
            dir.file_names(),
            vec!["patch_class1.done".to_owned(), "patch_class2.done".to_owned()]
        );
    }

    #[test]
    fn test_missing_target_leaves_mask() {
        let dir = TempDir::new("veg-missing");
        dir.write_mask("patch_class3.png");
        let mut scene = scene_with_terrain();
        let mut placer = VegetationPlacer::new("High");

        let report = plant(&mut placer, &mut scene, &dir, &["patch_class3.png"]);
        assert!(report.planted.is_empty());
        assert!(matches!(
            report.skipped[0].1,
            Error::MissingRenderTarget { ref class } if class == "class3"
        ));
        assert_eq!(dir.file_names(), vec!["patch_class3.png".to_owned()]);
        assert!(scene.get(TERRAIN_OBJECT).unwrap().modifiers.is_empty());
        assert_eq!(scene.images().count(), 0);

        // A prototype showing up later lets the retry succeed.
        add_prototype(&mut scene, "class3");
        let report = plant(&mut placer, &mut scene, &dir, &["patch_class3.png"]);
        assert_eq!(report.planted, vec!["class3".to_owned()]);
    }

    #[test]
    fn test_collection_targets() {
        let dir = TempDir::new("veg-collection");
        let mut scene = scene_with_terrain();
        scene.set_collection("High_class1", vec![]);
        scene.set_collection("class2", vec![]);
        scene.set_collection("Low_class2", vec![]);
        let mut placer = VegetationPlacer::new("High");

        dir.write_mask("patch_class1.png");
        dir.write_mask("patch_class2.png");
        plant(
            &mut placer,
            &mut scene,
            &dir,
            &["patch_class1.png", "patch_class2.png"],
        );

        assert_eq!(
            placer.placements().get("class1").unwrap().render_target,
            Some(RenderTarget::Collection {
                name: "High_class1".into(),
                pick_random: true,
            })
        );
        assert_eq!(
            placer.placements().get("class2").unwrap().render_target,
            Some(RenderTarget::Collection {
                name: "class2".into(),
                pick_random: true,
            })
        );
    }

    #[test]
    fn test_stale_config_is_normalized() {
        let dir = TempDir::new("veg-normalize");
        let mut scene = scene_with_terrain();
        add_prototype(&mut scene, "class1");
        add_prototype(&mut scene, "class2");
        let mut placer = VegetationPlacer::new("High");
        placer.placements_mut().insert(PlacementConfig {
            count: 90_000,
            particle_size: 0.0,
            ..PlacementConfig::new("class1")
        });
        placer.placements_mut().insert(PlacementConfig {
            count: 0,
            particle_size: 2.5,
            ..PlacementConfig::new("class2")
        });

        dir.write_mask("patch_class1.png");
        dir.write_mask("patch_class2.png");
        plant(
            &mut placer,
            &mut scene,
            &dir,
            &["patch_class1.png", "patch_class2.png"],
        );

        let class1 = placer.placements().get("class1").unwrap();
        assert_eq!(class1.count, DEFAULT_COUNT);
        assert_eq!(class1.particle_size, DEFAULT_PARTICLE_SIZE);
        let class2 = placer.placements().get("class2").unwrap();
        assert_eq!(class2.count, DEFAULT_COUNT);
        assert_eq!(class2.particle_size, 2.5);
    }

    #[test]
    fn test_density_follows_mask() {
        let dir = TempDir::new("veg-density");
        dir.write_mask("patch_class1.png");
        let mut scene = scene_with_terrain();
        add_prototype(&mut scene, "class1");
        let mut placer = VegetationPlacer::new("High");
        plant(&mut placer, &mut scene, &dir, &["patch_class1.png"]);

        let config = placer.placements().get("class1").unwrap();
        // Black on the left keeps full density, white on the right removes it.
        assert_eq!(config.density_at(&scene, DVec2::new(0.1, 0.5)), 1.0);
        assert_eq!(config.density_at(&scene, DVec2::new(0.9, 0.5)), 0.0);
        // Without slots everything is planted.
        assert_eq!(
            PlacementConfig::new("x").density_at(&scene, DVec2::new(0.9, 0.5)),
            1.0
        );
    }

    #[test]
    fn test_bad_masks_are_skipped() {
        let dir = TempDir::new("veg-bad");
        dir.touch("patch_class1.png");
        let mut scene = scene_with_terrain();
        add_prototype(&mut scene, "class1");
        let mut placer = VegetationPlacer::new("High");

        let report = plant(
            &mut placer,
            &mut scene,
            &dir,
            &["patch_.png", "patch_class1.png"],
        );
        assert!(report.planted.is_empty());
        assert!(matches!(report.skipped[0].1, Error::MalformedArtifact { .. }));
        assert!(matches!(report.skipped[1].1, Error::ImportFailure { .. }));
        assert_eq!(dir.file_names(), vec!["patch_class1.png".to_owned()]);
        assert!(scene.get(TERRAIN_OBJECT).unwrap().modifiers.is_empty());
    }

    #[test]
    fn test_clear_and_purge() {
        let dir = TempDir::new("veg-clear");
        let mut scene = scene_with_terrain();
        add_prototype(&mut scene, "class1");
        let mut placer = VegetationPlacer::new("High");
        dir.write_mask("patch_class1.png");
        plant(&mut placer, &mut scene, &dir, &["patch_class1.png"]);
        scene.set_image(Image::external("sky.png", "/assets/sky.png"));

        placer.purge(&mut scene, ["class9"]);
        assert!(scene.get(TERRAIN_OBJECT).unwrap().modifiers.is_empty());
        assert_eq!(scene.images().count(), 1);
        assert_eq!(scene.textures().count(), 0);
        assert_eq!(placer.clear(&mut scene), 0);
    }
}
