//! Shared data-blocks referenced by objects: materials, images, textures and the world.

use std::path::PathBuf;

use glam::DVec2;
use image::GrayImage;

/// Coordinate source feeding an image lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureCoords {
    /// The mesh's active UV layer.
    Uv,
    /// Object-space position.
    Object,
    /// Screen-space position.
    Window,
}

/// Colour management applied to an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    Srgb,
    /// Raw data, used for masks.
    NonColor,
}

/// Behaviour of texture lookups outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extension {
    #[default]
    Repeat,
    Extend,
    /// Zero outside the image.
    Clip,
}

/// Image-textured principled surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Name of the base colour image.
    pub base_color_image: Option<String>,
    pub coords: TextureCoords,
    pub roughness: f64,
}

/// Image data-block.
#[derive(Debug, Clone)]
pub struct Image {
    pub name: String,
    pub filepath: PathBuf,
    pub color_space: ColorSpace,
    /// Pixels embedded in the scene, independent of the file on disk.
    pub packed: Option<GrayImage>,
}

impl Image {
    /// An image referencing a file that is read lazily by the host.
    #[must_use]
    pub fn external(name: impl Into<String>, filepath: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            filepath: filepath.into(),
            color_space: ColorSpace::Srgb,
            packed: None,
        }
    }

    /// Nearest-pixel intensity in `[0, 1]` at a UV coordinate, `v = 0` at the bottom row.
    ///
    /// Returns `None` for unpacked images or coordinates outside the unit square.
    #[must_use]
    pub fn sample(&self, uv: DVec2) -> Option<f32> {
        let pixels = self.packed.as_ref()?;
        if !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) {
            return None;
        }
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let x = ((uv.x * f64::from(width)) as u32).min(width - 1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let y = (((1.0 - uv.y) * f64::from(height)) as u32).min(height - 1);
        Some(f32::from(pixels.get_pixel(x, y).0[0]) / 255.0)
    }
}

/// A stop of a colour ramp, reduced to intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampStop {
    pub position: f32,
    pub value: f32,
}

/// Piecewise-linear remapping of intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    stops: Vec<RampStop>,
}

impl ColorRamp {
    /// Ramp with the given stops, sorted by position.
    #[must_use]
    pub fn new(mut stops: Vec<RampStop>) -> Self {
        stops.sort_by(|a, b| a.position.total_cmp(&b.position));
        Self { stops }
    }

    /// Black below 0.499, white from 0.5: a hard threshold for binary masks.
    #[must_use]
    pub fn binary_threshold() -> Self {
        Self::new(vec![
            RampStop {
                position: 0.499,
                value: 0.0,
            },
            RampStop {
                position: 0.5,
                value: 1.0,
            },
        ])
    }

    #[must_use]
    pub fn stops(&self) -> &[RampStop] {
        &self.stops
    }

    /// Remap an intensity.
    #[must_use]
    pub fn evaluate(&self, input: f32) -> f32 {
        let (Some(first), Some(last)) = (self.stops.first(), self.stops.last()) else {
            return input;
        };
        if input <= first.position {
            return first.value;
        }
        if input >= last.position {
            return last.value;
        }
        for pair in self.stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if input <= b.position {
                let t = (input - a.position) / (b.position - a.position);
                return a.value + (b.value - a.value) * t;
            }
        }
        last.value
    }
}

/// Image texture data-block.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub name: String,
    pub image: Option<String>,
    pub extension: Extension,
    pub interpolation: bool,
    pub use_alpha: bool,
    pub color_ramp: Option<ColorRamp>,
}

impl Texture {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: None,
            extension: Extension::Repeat,
            interpolation: true,
            use_alpha: true,
            color_ramp: None,
        }
    }

    /// Intensity of this texture at a UV coordinate, ramp applied.
    ///
    /// Clipped lookups outside the image read as 0.
    #[must_use]
    pub fn sample(&self, image: &Image, uv: DVec2) -> f32 {
        let uv = match self.extension {
            Extension::Clip => uv,
            Extension::Extend => uv.clamp(DVec2::ZERO, DVec2::ONE),
            Extension::Repeat => uv.rem_euclid(DVec2::ONE),
        };
        let value = image.sample(uv).unwrap_or(0.0);
        match &self.color_ramp {
            Some(ramp) => ramp.evaluate(value),
            None => value,
        }
    }
}

/// Scene background.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    pub name: String,
    pub background_image: Option<String>,
    pub coords: TextureCoords,
}
