//! Minimal Wavefront OBJ loader.
//!
//! Reads positions (`v`), texture coordinates (`vt`) and faces (`f`).
//! Polygons are fan-triangulated. Normals, groups and materials are skipped.

use std::path::Path;

use glam::Vec3A;
use log::debug;
use smallvec::SmallVec;

use crate::error::{RenderError, Result};
use crate::mesh::{Aabb, HostMesh};

/// Load and parse an OBJ file.
pub fn load_obj(path: impl AsRef<Path>) -> Result<HostMesh> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)?;
    let mesh = parse_obj(&source)?;
    debug!(
        "Loaded {}: {} vertices, {} triangles",
        path.display(),
        mesh.vertices.len() / 3,
        mesh.triangle_count()
    );
    Ok(mesh)
}

fn parse_error(line: usize, message: impl Into<String>) -> RenderError {
    RenderError::ObjParse {
        line,
        message: message.into(),
    }
}

fn parse_floats<const N: usize>(line: usize, fields: &mut std::str::SplitWhitespace<'_>) -> Result<[f32; N]> {
    let mut out = [0.0; N];
    for value in out.iter_mut() {
        let field = fields
            .next()
            .ok_or_else(|| parse_error(line, format!("expected {} coordinates", N)))?;
        *value = field
            .parse()
            .map_err(|_| parse_error(line, format!("invalid number '{field}'")))?;
    }
    Ok(out)
}

/// Resolve a 1-based (or negative, relative) OBJ index against `count`
/// elements read so far.
fn resolve_index(line: usize, field: &str, count: usize) -> Result<u32> {
    let raw = field
        .split('/')
        .next()
        .unwrap_or_default()
        .parse::<i64>()
        .map_err(|_| parse_error(line, format!("invalid face index '{field}'")))?;

    let resolved = match raw {
        0 => None,
        r if r > 0 => Some(r - 1),
        r => Some(count as i64 + r),
    };
    match resolved {
        Some(i) if (0..count as i64).contains(&i) => Ok(i as u32),
        _ => Err(parse_error(
            line,
            format!("face index {raw} out of range ({count} vertices)"),
        )),
    }
}

/// Parse OBJ text into a mesh.
pub fn parse_obj(source: &str) -> Result<HostMesh> {
    let mut mesh = HostMesh::default();

    for (number, text) in source.lines().enumerate() {
        let line = number + 1;
        let mut fields = text.split_whitespace();
        match fields.next() {
            Some("v") => {
                let [x, y, z] = parse_floats::<3>(line, &mut fields)?;
                mesh.vertices.extend_from_slice(&[x, y, z]);
            }
            Some("vt") => {
                let [u, v] = parse_floats::<2>(line, &mut fields)?;
                mesh.uvs.extend_from_slice(&[u, v]);
            }
            Some("f") => {
                let count = mesh.vertices.len() / 3;
                let corners = fields
                    .map(|field| resolve_index(line, field, count))
                    .collect::<Result<SmallVec<[u32; 8]>>>()?;
                if corners.len() < 3 {
                    return Err(parse_error(line, "face needs at least 3 vertices"));
                }
                for i in 1..corners.len() - 1 {
                    mesh.triangles
                        .extend_from_slice(&[corners[0], corners[i], corners[i + 1]]);
                }
            }
            _ => {}
        }
    }

    mesh.bounds = Some(Aabb::from_vertices(&mesh.vertices, Vec3A::ZERO));
    Ok(mesh)
}
