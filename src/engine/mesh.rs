// Mesh types and Wavefront OBJ parsing.
//
// Two-layer architecture:
//   OBJ text → parse_obj() → MeshData (flat, de-indexed) → Geometry::from_mesh() → GPU

use std::sync::Arc;

use glam::{Vec2, Vec3};
use thiserror::Error;

// ============================================================================
// GPU VERTEX
// ============================================================================

/// GPU-ready vertex.
///   @location(0) position: vec3<f32>
///   @location(1) uv:       vec2<f32>
///   @location(2) normal:   vec3<f32>
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub uv:       [f32; 2],
    pub normal:   [f32; 3],
}

impl GpuVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

// ============================================================================
// INSTANCE DATA (per-instance model matrix)
// ============================================================================

/// One column-major model matrix: 16 floats per instance.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub model: [[f32; 4]; 4],
}

impl InstanceRaw {
    pub const FLOATS: usize = 16;

    pub fn from_matrix(matrix: &glam::Mat4) -> Self {
        Self { model: matrix.to_cols_array_2d() }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
            3 => Float32x4, 4 => Float32x4, 5 => Float32x4, 6 => Float32x4
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,  // One matrix per instance
            attributes: &ATTRIBUTES,
        }
    }
}

// ============================================================================
// PARSED MESH
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum MeshError {
    #[error("line {line}: malformed number in {record:?} record")]
    BadNumber { line: usize, record: String },
    #[error("line {line}: face references missing {kind} index {index}")]
    BadIndex { line: usize, kind: &'static str, index: i64 },
    #[error("line {line}: face has {count} vertices, need at least 3")]
    DegenerateFace { line: usize, count: usize },
    #[error("mesh contains no faces")]
    Empty,
}

/// De-indexed triangle soup: three vertices per triangle, arrays in lockstep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub uvs:       Vec<Vec2>,
    pub normals:   Vec<Vec3>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize { self.positions.len() }
}

#[derive(Clone, Copy)]
struct FaceVertex {
    position: usize,
    uv:       Option<usize>,
    normal:   Option<usize>,
}

/// Parse Wavefront OBJ text.
///
/// Supports `v`, `vt`, `vn` and `f` records; everything else is ignored.
/// Polygons are fan-triangulated from their first vertex, negative indices
/// count back from the end, texture V is flipped to top-left origin.
/// Faces without normals get their flat face normal.
pub fn parse_obj(text: &str) -> Result<MeshData, MeshError> {
    let mut positions: Vec<Vec3> = Vec::new();
    let mut uvs: Vec<Vec2> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();
    let mut mesh = MeshData::default();

    for (line_idx, raw) in text.lines().enumerate() {
        let line = line_idx + 1;
        let mut parts = raw.split_whitespace();
        let Some(record) = parts.next() else { continue };

        match record {
            "v" => positions.push(parse_vec3(&mut parts, line, record)?),
            "vn" => normals.push(parse_vec3(&mut parts, line, record)?),
            "vt" => {
                let u = parse_f32(parts.next(), line, record)?;
                let v = parse_f32(parts.next(), line, record)?;
                uvs.push(Vec2::new(u, 1.0 - v));
            }
            "f" => {
                let face = parts
                    .map(|corner| parse_corner(corner, line, positions.len(), uvs.len(), normals.len()))
                    .collect::<Result<Vec<_>, _>>()?;
                if face.len() < 3 {
                    return Err(MeshError::DegenerateFace { line, count: face.len() });
                }
                // Fan triangulate from vertex 0
                for i in 1..(face.len() - 1) {
                    let tri = [face[0], face[i], face[i + 1]];
                    let flat = {
                        let [a, b, c] = tri.map(|v| positions[v.position]);
                        (b - a).cross(c - a).normalize_or_zero()
                    };
                    for corner in tri {
                        mesh.positions.push(positions[corner.position]);
                        mesh.uvs.push(corner.uv.map_or(Vec2::ZERO, |i| uvs[i]));
                        mesh.normals.push(corner.normal.map_or(flat, |i| normals[i]));
                    }
                }
            }
            _ => {}
        }
    }

    if mesh.positions.is_empty() {
        return Err(MeshError::Empty);
    }
    Ok(mesh)
}

fn parse_f32(token: Option<&str>, line: usize, record: &str) -> Result<f32, MeshError> {
    token
        .and_then(|t| t.parse::<f32>().ok())
        .ok_or_else(|| MeshError::BadNumber { line, record: record.to_string() })
}

fn parse_vec3<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    line: usize,
    record: &str,
) -> Result<Vec3, MeshError> {
    Ok(Vec3::new(
        parse_f32(parts.next(), line, record)?,
        parse_f32(parts.next(), line, record)?,
        parse_f32(parts.next(), line, record)?,
    ))
}

// Resolve a 1-based (or negative, relative) OBJ index into a 0-based one.
fn resolve_index(raw: &str, len: usize, line: usize, kind: &'static str) -> Result<usize, MeshError> {
    let index: i64 = raw
        .parse()
        .map_err(|_| MeshError::BadNumber { line, record: "f".to_string() })?;
    let resolved = if index < 0 { len as i64 + index } else { index - 1 };
    if index == 0 || resolved < 0 || resolved >= len as i64 {
        return Err(MeshError::BadIndex { line, kind, index });
    }
    Ok(resolved as usize)
}

fn parse_corner(
    corner: &str,
    line: usize,
    n_positions: usize,
    n_uvs: usize,
    n_normals: usize,
) -> Result<FaceVertex, MeshError> {
    let mut fields = corner.split('/');
    let position = resolve_index(fields.next().unwrap_or(""), n_positions, line, "position")?;
    let uv = match fields.next() {
        Some(s) if !s.is_empty() => Some(resolve_index(s, n_uvs, line, "uv")?),
        _ => None,
    };
    let normal = match fields.next() {
        Some(s) if !s.is_empty() => Some(resolve_index(s, n_normals, line, "normal")?),
        _ => None,
    };
    Ok(FaceVertex { position, uv, normal })
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// Immutable, scale-normalised vertex data shared by every instance of a model.
#[derive(Debug)]
pub struct Geometry {
    pub name: String,
    vertices: Vec<GpuVertex>,
}

impl Geometry {
    /// Bake a uniform scale into the positions. Normals are unaffected by
    /// uniform scale.
    pub fn from_mesh(name: impl Into<String>, mesh: &MeshData, scale: f32) -> Arc<Self> {
        let vertices = mesh
            .positions
            .iter()
            .zip(&mesh.uvs)
            .zip(&mesh.normals)
            .map(|((p, uv), n)| GpuVertex {
                position: (*p * scale).to_array(),
                uv:       uv.to_array(),
                normal:   n.to_array(),
            })
            .collect();
        Arc::new(Self { name: name.into(), vertices })
    }

    pub fn vertices(&self) -> &[GpuVertex] { &self.vertices }

    /// Cast vertex slice to raw bytes for buffer upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn vertex_count(&self) -> u32 { self.vertices.len() as u32 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn quad_is_fan_triangulated() {
        let mesh = parse_obj(QUAD).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.positions[3], Vec3::ZERO);
        assert_eq!(mesh.positions[5], Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn texture_v_is_flipped() {
        let mesh = parse_obj(QUAD).unwrap();
        assert_eq!(mesh.uvs[0], Vec2::new(0.0, 1.0));
        assert_eq!(mesh.uvs[2], Vec2::new(1.0, 0.0));
    }

    #[test]
    fn missing_normals_use_face_normal() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert!(mesh.normals.iter().all(|n| *n == Vec3::Z));
        assert!(mesh.uvs.iter().all(|uv| *uv == Vec2::ZERO));
    }

    #[test]
    fn negative_indices_are_relative() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
        assert_eq!(mesh.positions[1], Vec3::X);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let err = parse_obj("v 0 0 0\nv 1 0 0\nf 1 2 3\n").unwrap_err();
        assert_eq!(err, MeshError::BadIndex { line: 3, kind: "position", index: 3 });
    }

    #[test]
    fn garbage_numbers_are_rejected() {
        let err = parse_obj("v 0 zero 0\n").unwrap_err();
        assert!(matches!(err, MeshError::BadNumber { line: 1, .. }));
    }

    #[test]
    fn empty_mesh_is_an_error() {
        assert_eq!(parse_obj("# nothing\nv 0 0 0\n"), Err(MeshError::Empty));
    }

    #[test]
    fn geometry_bakes_scale() {
        let mesh = parse_obj(QUAD).unwrap();
        let geometry = Geometry::from_mesh("quad", &mesh, 0.5);
        assert_eq!(geometry.vertex_count(), 6);
        assert_eq!(geometry.vertices()[1].position, [0.5, 0.0, 0.0]);
        assert_eq!(geometry.vertex_bytes().len(), 6 * std::mem::size_of::<GpuVertex>());
    }
}
