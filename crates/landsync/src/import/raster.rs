//! Elevation rasters as grid meshes.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use glam::{DVec2, DVec3};
use image::DynamicImage;
use tiff::decoder::{Decoder, DecodingResult};

use super::{ImportedMesh, file_stem};
use crate::error::{Error, Result};
use crate::scene::{Mesh, Transform};

/// How raster pixels map to scene units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    /// Sample every `step` pixels in both directions.
    pub step: u32,
    /// Ground distance between adjacent pixels.
    pub cell_size: f64,
    /// Multiplier applied to pixel values to get heights.
    pub z_scale: f64,
    /// World position of the raster's south-west corner.
    pub origin: DVec2,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            step: 2,
            cell_size: 1.0,
            z_scale: 1.0,
            origin: DVec2::ZERO,
        }
    }
}

/// Decode a single-band raster and build one vertex per sampled pixel.
pub(super) fn import_elevation(path: &Path, options: &RasterOptions) -> Result<ImportedMesh> {
    let is_tiff = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"));
    let (heights, width, height) = if is_tiff {
        tiff_heights(path)?
    } else {
        let image = image::open(path).map_err(|e| Error::import(path, e))?;
        (image_heights(&image), image.width(), image.height())
    };
    if heights.len() < width as usize * height as usize {
        return Err(Error::import(
            path,
            format!("raster {width}x{height} holds only {} samples", heights.len()),
        ));
    }
    let mesh = grid_from_heights(&heights, width, height, options)
        .ok_or_else(|| Error::import(path, format!("raster {width}x{height} is too small")))?;

    Ok(ImportedMesh {
        name: file_stem(path),
        mesh,
        transform: Transform::from_location(options.origin.extend(0.0)),
    })
}

/// First band of a GeoTIFF, row-major from the top row.
///
/// DEMs exported from GIS tools are usually single-band `Float32`, which the
/// `image` decoder rejects, so TIFFs are read with `tiff` directly.
fn tiff_heights(path: &Path) -> Result<(Vec<f64>, u32, u32)> {
    let file = File::open(path).map_err(|e| Error::io("open", path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file)).map_err(|e| Error::import(path, e))?;
    let (width, height) = decoder.dimensions().map_err(|e| Error::import(path, e))?;
    let samples = usize::from(
        decoder
            .colortype()
            .map_err(|e| Error::import(path, e))?
            .num_samples()
            .max(1),
    );

    let values: Vec<f64> = match decoder.read_image().map_err(|e| Error::import(path, e))? {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F16(v) => v.into_iter().map(|x| x.to_f64()).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
    };
    let heights = values.into_iter().step_by(samples).collect();
    Ok((heights, width, height))
}

/// Raw pixel values, row-major from the top row.
fn image_heights(image: &DynamicImage) -> Vec<f64> {
    match image {
        DynamicImage::ImageLuma8(buffer) => buffer.pixels().map(|p| f64::from(p.0[0])).collect(),
        DynamicImage::ImageLuma16(buffer) => buffer.pixels().map(|p| f64::from(p.0[0])).collect(),
        other => other
            .to_luma32f()
            .pixels()
            .map(|p| f64::from(p.0[0]))
            .collect(),
    }
}

/// Quad grid over sampled pixels; `None` if fewer than 2x2 samples.
fn grid_from_heights(
    heights: &[f64],
    width: u32,
    height: u32,
    options: &RasterOptions,
) -> Option<Mesh> {
    let step = options.step.max(1) as usize;
    let columns: Vec<u32> = (0..width).step_by(step).collect();
    let rows: Vec<u32> = (0..height).step_by(step).collect();
    if columns.len() < 2 || rows.len() < 2 {
        return None;
    }

    let mut vertices = Vec::with_capacity(columns.len() * rows.len());
    for &row in &rows {
        for &column in &columns {
            let value = heights[(row * width + column) as usize];
            vertices.push(DVec3::new(
                f64::from(column) * options.cell_size,
                f64::from(height - 1 - row) * options.cell_size,
                value * options.z_scale,
            ));
        }
    }

    let stride = columns.len();
    let mut faces = Vec::with_capacity((rows.len() - 1) * (stride - 1));
    for r in 0..rows.len() - 1 {
        for c in 0..stride - 1 {
            let top_left = r * stride + c;
            let bottom_left = top_left + stride;
            faces.push(vec![bottom_left, bottom_left + 1, top_left + 1, top_left]);
        }
    }

    Some(Mesh::from_faces(vertices, faces))
}
