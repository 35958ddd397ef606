//! Wavefront OBJ models for vegetation prototypes.

use std::path::Path;

use glam::DVec3;

use super::{ImportedMesh, file_stem};
use crate::error::{Error, Result};
use crate::scene::{Mesh, Transform};

/// Read every object in an OBJ file. Vertex indices are global to the file, as
/// in the format; each object keeps only the vertices its faces use.
pub(super) fn read_models(path: &Path, scale: f64) -> Result<Vec<ImportedMesh>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io("read", path, e))?;
    let models = parse_obj(&text, &file_stem(path)).map_err(|detail| Error::import(path, detail))?;
    Ok(models
        .into_iter()
        .map(|(name, mesh)| ImportedMesh {
            name,
            mesh,
            transform: Transform {
                scale: DVec3::splat(scale),
                ..Transform::IDENTITY
            },
        })
        .collect())
}

fn parse_obj(text: &str, default_name: &str) -> std::result::Result<Vec<(String, Mesh)>, String> {
    let mut positions: Vec<DVec3> = Vec::new();
    let mut objects: Vec<(String, Vec<Vec<usize>>)> = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let coords: Vec<f64> = tokens
                    .take(3)
                    .map(str::parse)
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| format!("line {}: {e}", number + 1))?;
                if coords.len() != 3 {
                    return Err(format!("line {}: vertex needs 3 coordinates", number + 1));
                }
                positions.push(DVec3::new(coords[0], coords[1], coords[2]));
            }
            Some("o") => {
                let name = tokens.next().unwrap_or(default_name).to_owned();
                objects.push((name, Vec::new()));
            }
            Some("f") => {
                let face = tokens
                    .map(|t| resolve_index(t, positions.len()))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| format!("line {}: bad face index", number + 1))?;
                if face.len() < 3 {
                    return Err(format!("line {}: face needs 3 vertices", number + 1));
                }
                if objects.is_empty() {
                    objects.push((default_name.to_owned(), Vec::new()));
                }
                if let Some((_, faces)) = objects.last_mut() {
                    faces.push(face);
                }
            }
            _ => {}
        }
    }

    Ok(objects
        .into_iter()
        .filter(|(_, faces)| !faces.is_empty())
        .map(|(name, faces)| (name, compact(&positions, faces)))
        .collect())
}

/// 1-based or negative (relative) index from a `v/vt/vn` token.
fn resolve_index(token: &str, count: usize) -> Option<usize> {
    let index: i64 = token.split('/').next()?.parse().ok()?;
    let count = i64::try_from(count).ok()?;
    let resolved = if index < 0 { count + index } else { index - 1 };
    usize::try_from(resolved).ok().filter(|_| resolved < count)
}

/// Mesh holding only the referenced positions, with faces reindexed.
fn compact(positions: &[DVec3], faces: Vec<Vec<usize>>) -> Mesh {
    let mut remap = vec![usize::MAX; positions.len()];
    let mut vertices = Vec::new();
    let faces = faces
        .into_iter()
        .map(|face| {
            face.into_iter()
                .map(|i| {
                    if remap[i] == usize::MAX {
                        remap[i] = vertices.len();
                        vertices.push(positions[i]);
                    }
                    remap[i]
                })
                .collect()
        })
        .collect();
    Mesh::from_faces(vertices, faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_OBJECTS: &str = "\
# two triangles
v 0 0 0
v 1 0 0
v 0 1 0
v 0 0 2
o Trunk
f 1 2 3
o Crown
f 1/1/1 2//2 -1
";

    #[test]
    fn test_parse_objects() {
        let models = parse_obj(TWO_OBJECTS, "tree").unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].0, "Trunk");
        assert_eq!(models[1].0, "Crown");

        let crown = &models[1].1;
        assert_eq!(crown.vertices.len(), 3);
        assert_eq!(crown.vertices[2], DVec3::new(0.0, 0.0, 2.0));
        assert_eq!(crown.faces[0].vertices, vec![0, 1, 2]);
    }

    #[test]
    fn test_parse_unnamed_object() {
        let models = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n", "oak").unwrap();
        assert_eq!(models[0].0, "oak");
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_obj("v 0 0\n", "x").is_err());
        assert!(parse_obj("v 0 0 0\nf 1 2 3\n", "x").is_err());
        assert!(parse_obj("v 0 0 0\nv 1 0 0\nf 1 2\n", "x").is_err());
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index("1", 3), Some(0));
        assert_eq!(resolve_index("-1", 3), Some(2));
        assert_eq!(resolve_index("3/4/5", 3), Some(2));
        assert_eq!(resolve_index("4", 3), None);
        assert_eq!(resolve_index("0", 3), None);
    }
}
