//! The engine: scene state plus the handlers and commands that mutate it.
//!
//! [`Engine`] owns the [`SceneRegistry`] and every component working on it.
//! The watch loop calls the artifact handlers; the binary calls the commands.
//! Nothing here runs concurrently, so no component needs synchronisation.

use std::path::Path;

use crate::artifact::clear_folder;
use crate::bird_rig::{BIRD_CAMERA_COUNT, BirdCameraRig};
use crate::camera::{CameraSynchronizer, VantagePose};
use crate::config::Prefs;
use crate::error::{Error, Result};
use crate::import::{GisImporter, ModelImporter};
use crate::scene::{Image, Material, SceneRegistry, TextureCoords, World};
use crate::terrain::{
    TERRAIN_MATERIAL, TERRAIN_SIDES_MATERIAL, TerrainAdapter, TerrainUpdate, ensure_sun,
};
use crate::vegetation::{PlacementTable, PlantReport, VegetationPlacer};
use crate::watch::WatchLoop;

/// Name of the scene background.
pub const WORLD_NAME: &str = "TL_World";

/// Roughness of the image-textured surfaces we create.
const SURFACE_ROUGHNESS: f64 = 0.8;

/// Outcome of [`Engine::initialize_assets`].
#[derive(Debug, Default)]
pub struct AssetReport {
    /// Classes whose prototype was loaded.
    pub loaded: Vec<String>,
    /// Classes that already had a prototype.
    pub present: Vec<String>,
    pub failed: Vec<(String, Error)>,
    /// Files deleted from the watch folder.
    pub cleared_files: usize,
}

/// Keeps the scene in sync with the watch folder.
pub struct Engine {
    prefs: Prefs,
    scene: SceneRegistry,
    importer: Box<dyn GisImporter>,
    terrain: TerrainAdapter,
    vantage: CameraSynchronizer,
    vegetation: VegetationPlacer,
    birds: BirdCameraRig,
}

impl Engine {
    /// Build an engine and set up the scene: bird cameras, sun, terrain
    /// materials and world background.
    pub fn new(prefs: Prefs, importer: impl GisImporter + 'static) -> Self {
        let mut scene = SceneRegistry::new();
        let birds = BirdCameraRig::create(&mut scene, BIRD_CAMERA_COUNT);
        ensure_sun(&mut scene);
        install_surfaces(&mut scene, &prefs);
        tracing::info!("Scene ready, watching {}", prefs.watch_folder.display());

        Self {
            vegetation: VegetationPlacer::new(prefs.realism.clone()),
            prefs,
            scene,
            importer: Box::new(importer),
            terrain: TerrainAdapter::new(),
            vantage: CameraSynchronizer::new(),
            birds,
        }
    }

    #[must_use]
    pub fn prefs(&self) -> &Prefs {
        &self.prefs
    }

    #[must_use]
    pub fn scene(&self) -> &SceneRegistry {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneRegistry {
        &mut self.scene
    }

    #[must_use]
    pub fn placements(&self) -> &PlacementTable {
        self.vegetation.placements()
    }

    #[must_use]
    pub fn bird_cameras(&self) -> &BirdCameraRig {
        &self.birds
    }

    // ============================================================================
    // Artifact handlers
    // ============================================================================

    /// Rebuild the terrain from the raster in the watch folder.
    pub fn handle_terrain(&mut self) -> Result<TerrainUpdate> {
        self.terrain.terrain_change(
            &mut self.scene,
            self.importer.as_ref(),
            &self.birds,
            &self.prefs.terrain_path,
            &self.prefs.crs,
        )
    }

    /// Move the dynamic camera along the vantage line in the watch folder.
    pub fn handle_vantage(&mut self) -> Result<VantagePose> {
        self.vantage.sync_vantage(
            &mut self.scene,
            self.importer.as_ref(),
            &self.prefs.view_path,
            &self.prefs.crs,
        )
    }

    /// Plant the given density masks from the watch folder.
    pub fn handle_patches(&mut self, files: &[String]) -> PlantReport {
        self.vegetation
            .plant_from_patches(&mut self.scene, files, &self.prefs.watch_folder)
    }

    // ============================================================================
    // Commands
    // ============================================================================

    /// Clear the watch folder and return a loop ready to poll it.
    pub fn arm(&self) -> Result<WatchLoop> {
        let mut watch = WatchLoop::new(self.prefs.watch_folder.clone());
        watch.arm()?;
        Ok(watch)
    }

    /// Load one hidden prototype per configured class and reset vegetation state.
    ///
    /// Classes that already have a prototype object are left alone. Each
    /// prototype is the first mesh in its model file, renamed after the class
    /// and sitting on its lowest point. Afterwards the watch folder is emptied
    /// and mask images, particle modifiers and class textures are purged.
    pub fn initialize_assets(&mut self, models: &dyn ModelImporter) -> AssetReport {
        let mut report = AssetReport::default();
        for (class, assets) in &self.prefs.classes {
            if self.scene.contains(class) {
                report.present.push(class.clone());
                continue;
            }
            let loaded = load_prototype(
                &mut self.scene,
                models,
                class,
                &assets.model,
                &assets.texture,
                self.prefs.scale,
            );
            match loaded {
                Ok(()) => report.loaded.push(class.clone()),
                Err(e) => {
                    tracing::warn!("No prototype for {class}: {e}");
                    report.failed.push((class.clone(), e));
                }
            }
        }

        report.cleared_files = clear_folder(&self.prefs.watch_folder);
        self.vegetation
            .purge(&mut self.scene, self.prefs.classes.keys().map(String::as_str));
        tracing::info!(
            "Assets initialised: {} loaded, {} already present, {} failed",
            report.loaded.len(),
            report.present.len(),
            report.failed.len()
        );
        report
    }

    /// Look through the next bird camera. Returns its name.
    pub fn toggle_bird_camera(&mut self) -> Result<String> {
        self.birds.toggle_next(&mut self.scene).map(str::to_owned)
    }

    /// Remove all vegetation from the terrain. Returns the number of modifiers removed.
    pub fn clear_vegetation(&mut self) -> usize {
        self.vegetation.clear(&mut self.scene)
    }
}

/// Insert the prototype for `class` from the first mesh of `model`.
fn load_prototype(
    scene: &mut SceneRegistry,
    models: &dyn ModelImporter,
    class: &str,
    model: &Path,
    texture: &Path,
    scale: f64,
) -> Result<()> {
    let mut imported = models
        .import_models(model, scale)?
        .into_iter()
        .find(|m| !m.mesh.faces.is_empty())
        .ok_or_else(|| Error::import(model, "no mesh in model file"))?;

    imported.mesh.origin_to_bottom();
    let image = image_name(texture);
    scene.set_image(Image::external(image.clone(), texture));
    scene.set_material(Material {
        name: class.to_owned(),
        base_color_image: Some(image),
        coords: TextureCoords::Uv,
        roughness: SURFACE_ROUGHNESS,
    });
    imported.mesh.materials = vec![class.to_owned()];
    imported.name = class.to_owned();

    let prototype = scene.insert(imported.into_object())?;
    prototype.hidden = true;
    prototype.hide_render = true;
    tracing::debug!("Loaded prototype {class} from {}", model.display());
    Ok(())
}

/// Terrain top and side materials and the world background.
fn install_surfaces(scene: &mut SceneRegistry, prefs: &Prefs) {
    let surfaces = [
        (TERRAIN_MATERIAL, &prefs.terrain_texture_path, TextureCoords::Uv),
        (
            TERRAIN_SIDES_MATERIAL,
            &prefs.terrain_sides_texture_path,
            TextureCoords::Object,
        ),
    ];
    for (name, path, coords) in surfaces {
        let image = image_name(path);
        scene.set_image(Image::external(image.clone(), path.as_path()));
        scene.set_material(Material {
            name: name.to_owned(),
            base_color_image: Some(image),
            coords,
            roughness: SURFACE_ROUGHNESS,
        });
    }

    let image = image_name(&prefs.world_texture_path);
    scene.set_image(Image::external(image.clone(), prefs.world_texture_path.as_path()));
    scene.set_world(World {
        name: WORLD_NAME.to_owned(),
        background_image: Some(image),
        coords: TextureCoords::Window,
    });
}

fn image_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
