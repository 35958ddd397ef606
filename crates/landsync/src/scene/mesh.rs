//! Editable polygon mesh data.

use glam::{DAffine3, DVec2, DVec3};

use crate::geometry::Aabb;

/// A polygon of a mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// Vertex indices, counter-clockwise when seen from the front.
    pub vertices: Vec<usize>,
    /// Index into [`Mesh::materials`].
    pub material_index: usize,
    pub selected: bool,
}

/// One UV coordinate per face corner ("loop").
#[derive(Debug, Clone, PartialEq)]
pub struct UvLayer {
    pub name: String,
    pub uvs: Vec<DVec2>,
    /// Whether this layer is used for rendering and particle texture lookups.
    pub active_render: bool,
}

/// Polygon mesh in object-local space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<DVec3>,
    pub faces: Vec<Face>,
    pub uv_layers: Vec<UvLayer>,
    /// Index of the layer targeted by edits.
    pub active_uv: Option<usize>,
    /// Material slots, by material name.
    pub materials: Vec<String>,
}

impl Mesh {
    /// Build a mesh from vertex positions and per-face vertex indices.
    #[must_use]
    pub fn from_faces(vertices: Vec<DVec3>, faces: Vec<Vec<usize>>) -> Self {
        Self {
            vertices,
            faces: faces
                .into_iter()
                .map(|vertices| Face {
                    vertices,
                    material_index: 0,
                    selected: false,
                })
                .collect(),
            ..Self::default()
        }
    }

    /// Total number of face corners.
    #[must_use]
    pub fn loop_count(&self) -> usize {
        self.faces.iter().map(|f| f.vertices.len()).sum()
    }

    /// Vertex index of every face corner, in loop order.
    pub fn loop_vertices(&self) -> impl Iterator<Item = usize> + '_ {
        self.faces.iter().flat_map(|f| f.vertices.iter().copied())
    }

    /// Unit normal of a face, using Newell's method so non-planar quads behave.
    ///
    /// Degenerate faces return `DVec3::ZERO`.
    #[must_use]
    pub fn face_normal(&self, face: usize) -> DVec3 {
        let indices = &self.faces[face].vertices;
        let mut normal = DVec3::ZERO;
        for (i, &current) in indices.iter().enumerate() {
            let a = self.vertices[current];
            let b = self.vertices[indices[(i + 1) % indices.len()]];
            normal.x += (a.y - b.y) * (a.z + b.z);
            normal.y += (a.z - b.z) * (a.x + b.x);
            normal.z += (a.x - b.x) * (a.y + b.y);
        }
        normal.normalize_or_zero()
    }

    /// Bounding box of the finite vertices in local space.
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().copied())
    }

    /// Bake a transform into the vertex positions.
    pub fn apply_transform(&mut self, transform: &DAffine3) {
        for vertex in &mut self.vertices {
            *vertex = transform.transform_point3(*vertex);
        }
    }

    /// Shift the vertices so the lowest point sits at local `z = 0`.
    pub fn origin_to_bottom(&mut self) {
        let Some(bounds) = self.bounds() else {
            return;
        };
        if bounds.min.z.abs() > 1e-6 {
            for vertex in &mut self.vertices {
                vertex.z -= bounds.min.z;
            }
        }
    }

    /// Look up a UV layer by name.
    #[must_use]
    pub fn uv_layer(&self, name: &str) -> Option<&UvLayer> {
        self.uv_layers.iter().find(|l| l.name == name)
    }

    /// Get or create a UV layer sized to the current loop count.
    pub fn ensure_uv_layer(&mut self, name: &str) -> &mut UvLayer {
        let loops = self.loop_count();
        let index = match self.uv_layers.iter().position(|l| l.name == name) {
            Some(index) => index,
            None => {
                self.uv_layers.push(UvLayer {
                    name: name.to_owned(),
                    uvs: Vec::new(),
                    active_render: false,
                });
                self.uv_layers.len() - 1
            }
        };
        let layer = &mut self.uv_layers[index];
        layer.uvs.resize(loops, DVec2::ZERO);
        layer
    }

    /// Make a layer active for editing and rendering. Returns false if it doesn't exist.
    pub fn activate_uv_layer(&mut self, name: &str) -> bool {
        let Some(index) = self.uv_layers.iter().position(|l| l.name == name) else {
            return false;
        };
        self.active_uv = Some(index);
        for (i, layer) in self.uv_layers.iter_mut().enumerate() {
            layer.active_render = i == index;
        }
        true
    }

    /// The layer targeted by edits, if any.
    #[must_use]
    pub fn active_uv_layer(&self) -> Option<&UvLayer> {
        self.active_uv.and_then(|i| self.uv_layers.get(i))
    }

    /// Append a material slot and return its index.
    pub fn append_material(&mut self, material: &str) -> usize {
        self.materials.push(material.to_owned());
        self.materials.len() - 1
    }

    /// Assign a material slot to every selected face.
    pub fn assign_material_to_selected(&mut self, slot: usize) {
        for face in self.faces.iter_mut().filter(|f| f.selected) {
            face.material_index = slot;
        }
    }

    /// Replace the face selection.
    pub fn select_faces(&mut self, selection: &[bool]) {
        for (face, selected) in self.faces.iter_mut().zip(selection) {
            face.selected = *selected;
        }
    }

    /// Number of faces using a material slot.
    #[must_use]
    pub fn faces_with_material(&self, slot: usize) -> usize {
        self.faces.iter().filter(|f| f.material_index == slot).count()
    }
}
