//! Geometry helpers shared by the terrain, vegetation and camera handlers.
//!
//! All functions here are pure with respect to their inputs: they read the
//! current vertex positions and either return derived data or rewrite the
//! mesh in place. Nothing is cached between calls, so every terrain rebuild
//! derives UVs and side faces from scratch.

use glam::{DAffine3, DVec2, DVec3};

use crate::scene::Mesh;

/// Default limit for classifying a face as facing up.
pub const SIDE_UP_LIMIT: f64 = 0.5;
/// Default limit for classifying a face as facing down.
pub const SIDE_DOWN_LIMIT: f64 = 0.5;
/// Distance from a planar bounding box edge within which a vertex belongs to the fringe.
pub const FRINGE_TOLERANCE: f64 = 0.1;

/// Axis-aligned bounding box in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Bounding box of all finite points, or `None` if there are none.
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
        points
            .into_iter()
            .filter(|p| p.is_finite())
            .fold(None, |acc, p| match acc {
                None => Some(Self { min: p, max: p }),
                Some(b) => Some(Self {
                    min: b.min.min(p),
                    max: b.max.max(p),
                }),
            })
    }

    /// Extent along each axis.
    #[must_use]
    pub fn dimensions(&self) -> DVec3 {
        self.max - self.min
    }

    /// Largest extent along any axis.
    #[must_use]
    pub fn max_dimension(&self) -> f64 {
        self.dimensions().max_element()
    }
}

/// Project every face corner onto the XY plane of the mesh's world-space bounding box.
///
/// Returns one `(u, v)` per face corner, in loop order. `u = (x - xmin) / dx` and
/// `v = (y - ymin) / dy`, where a zero extent is replaced by 1.0 so degenerate
/// meshes don't divide by zero. With `flip_v`, `v` becomes `1 - v`.
///
/// Corners whose vertex is not finite map to `(0, 0)`.
#[must_use]
pub fn planar_uv(mesh: &Mesh, world: &DAffine3, flip_v: bool) -> Vec<DVec2> {
    let world_positions: Vec<DVec3> = mesh
        .vertices
        .iter()
        .map(|v| world.transform_point3(*v))
        .collect();

    let Some(bounds) = Aabb::from_points(world_positions.iter().copied()) else {
        return vec![DVec2::ZERO; mesh.loop_count()];
    };

    let extent = bounds.dimensions();
    let dx = if extent.x == 0.0 { 1.0 } else { extent.x };
    let dy = if extent.y == 0.0 { 1.0 } else { extent.y };

    mesh.loop_vertices()
        .map(|index| {
            let co = world_positions[index];
            if !co.is_finite() {
                return DVec2::ZERO;
            }
            let u = (co.x - bounds.min.x) / dx;
            let v = (co.y - bounds.min.y) / dy;
            DVec2::new(u, if flip_v { 1.0 - v } else { v })
        })
        .collect()
}

/// Returns whether each face is a side face.
///
/// A face is a side face iff `dot(n, +Z) <= up_limit` and `dot(n, -Z) <= down_limit`,
/// with `n` the face's unit normal.
#[must_use]
pub fn classify_side_faces(mesh: &Mesh, up_limit: f64, down_limit: f64) -> Vec<bool> {
    (0..mesh.faces.len())
        .map(|face| {
            let normal = mesh.face_normal(face);
            normal.dot(DVec3::Z) <= up_limit && normal.dot(DVec3::NEG_Z) <= down_limit
        })
        .collect()
}

/// `count` points on a circle of `radius`, at angles `2π·i/count` for `i = 1..=count`.
#[must_use]
pub fn ring_positions(radius: f64, count: usize) -> Vec<DVec2> {
    (1..=count)
        .map(|i| {
            let angle = std::f64::consts::TAU / count as f64 * i as f64;
            DVec2::new(angle.cos() * radius, angle.sin() * radius)
        })
        .collect()
}

/// Lower the vertices on the planar bounding box edges to form a skirt.
///
/// Every vertex within [`FRINGE_TOLERANCE`] of `xmin`, `xmax`, `ymin` or `ymax`
/// gets `z = zmin - fringe`, where `zmin` is taken before any vertex moves. Edges
/// are tested independently; a corner matching two edges is still lowered
/// exactly once to the same height.
///
/// The mesh must already be in world space (transform applied). Returns the
/// indices of the lowered vertices.
pub fn boundary_fringe_drop(mesh: &mut Mesh, fringe: f64) -> Vec<usize> {
    let Some(bounds) = Aabb::from_points(mesh.vertices.iter().copied()) else {
        return Vec::new();
    };
    let floor = bounds.min.z - fringe;
    let near = |value: f64, edge: f64| (value - edge).abs() < FRINGE_TOLERANCE;

    let mut lowered = Vec::new();
    for (index, vertex) in mesh.vertices.iter_mut().enumerate() {
        let on_edge = near(vertex.x, bounds.min.x)
            || near(vertex.x, bounds.max.x)
            || near(vertex.y, bounds.min.y)
            || near(vertex.y, bounds.max.y);
        if on_edge {
            vertex.z = floor;
            lowered.push(index);
        }
    }
    lowered
}
