//! Fixed octahedral unfold geometry.
//!
//! A unit octahedron is unfolded into the square `[-1, 1]²`: the lower
//! hemisphere (`y <= 0`) forms the inner diamond around the center, the upper
//! hemisphere folds out into the four corners. Every triangle spans exactly one
//! octant, so interpolating the per-vertex direction across a triangle yields
//! the same direction as the analytic octahedral decode of that position.

use glam::{Vec2, Vec3};

use crate::device::{BufferUsage, GpuDevice, VertexArrayDescriptor, VertexAttribute};
use crate::error::Result;

/// Number of vertices in the unfold mesh.
pub const VERTEX_COUNT: usize = 9;

/// Number of indices in the unfold mesh.
pub const INDEX_COUNT: usize = 24;

/// A clip-space position paired with the cube direction it projects.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CubeDirectionVertex {
    pub position: [f32; 2],
    pub direction: [f32; 3],
}

impl CubeDirectionVertex {
    const fn new(position: [f32; 2], direction: [f32; 3]) -> Self {
        Self {
            position,
            direction,
        }
    }
}

const POS_X: [f32; 3] = [1.0, 0.0, 0.0];
const NEG_X: [f32; 3] = [-1.0, 0.0, 0.0];
const POS_Y: [f32; 3] = [0.0, 1.0, 0.0];
const NEG_Y: [f32; 3] = [0.0, -1.0, 0.0];
const POS_Z: [f32; 3] = [0.0, 0.0, 1.0];
const NEG_Z: [f32; 3] = [0.0, 0.0, -1.0];

/// The nine unfold vertices.
pub const OCTAHEDRAL_VERTICES: [CubeDirectionVertex; VERTEX_COUNT] = [
    CubeDirectionVertex::new([-1.0, 1.0], POS_Y),  // top left
    CubeDirectionVertex::new([-1.0, 0.0], NEG_X),  // left
    CubeDirectionVertex::new([0.0, 1.0], POS_Z),   // top
    CubeDirectionVertex::new([0.0, 0.0], NEG_Y),   // center
    CubeDirectionVertex::new([1.0, 0.0], POS_X),   // right
    CubeDirectionVertex::new([1.0, 1.0], POS_Y),   // top right
    CubeDirectionVertex::new([0.0, -1.0], NEG_Z),  // bottom
    CubeDirectionVertex::new([-1.0, -1.0], POS_Y), // bottom left
    CubeDirectionVertex::new([1.0, -1.0], POS_Y),  // bottom right
];

/// Triangle list over [`OCTAHEDRAL_VERTICES`].
pub const OCTAHEDRAL_INDICES: [u32; INDEX_COUNT] = [
    0, 1, 2, //
    2, 3, 1, //
    7, 6, 1, //
    3, 6, 1, //
    2, 5, 4, //
    3, 4, 2, //
    4, 8, 6, //
    3, 4, 6, //
];

/// Vertex attributes of [`CubeDirectionVertex`], with their shader locations.
pub const VERTEX_ATTRIBUTES: [VertexAttribute; 2] = [
    VertexAttribute {
        name: "position",
        location: 0,
        components: 2,
        offset: 0,
    },
    VertexAttribute {
        name: "direction",
        location: 1,
        components: 3,
        offset: 8,
    },
];

/// Byte stride of one [`CubeDirectionVertex`].
pub const VERTEX_STRIDE: u64 = std::mem::size_of::<CubeDirectionVertex>() as u64;

/// Uploads the unfold mesh and assembles it into a vertex array.
pub fn create_vertex_array<D: GpuDevice>(device: &D, label: &str) -> Result<D::VertexArray> {
    let vertex_buffer = device.create_vertex_buffer(
        &format!("{label} vertices"),
        bytemuck::cast_slice(&OCTAHEDRAL_VERTICES),
        BufferUsage::Static,
    )?;
    let index_buffer = device.create_index_buffer(
        &format!("{label} indices"),
        &OCTAHEDRAL_INDICES,
        BufferUsage::Static,
    )?;

    device.create_vertex_array(VertexArrayDescriptor {
        label,
        vertex_buffer,
        stride: VERTEX_STRIDE,
        attributes: &VERTEX_ATTRIBUTES,
        index_buffer,
        index_count: INDEX_COUNT as u32,
    })
}

/// Maps a direction to its octahedral texture coordinate.
///
/// The result is in texture space with the origin at the top-left texel
/// corner, matching where the unfold mesh rasterizes that direction.
pub fn octahedral_uv(direction: Vec3) -> Vec2 {
    let d = direction / (direction.x.abs() + direction.y.abs() + direction.z.abs());
    let clip = if d.y <= 0.0 {
        Vec2::new(d.x, d.z)
    } else {
        Vec2::new(
            (1.0 - d.z.abs()) * sign(d.x),
            (1.0 - d.x.abs()) * sign(d.z),
        )
    };
    clip_to_uv(clip)
}

/// Maps an octahedral texture coordinate back to a unit direction.
pub fn octahedral_direction(uv: Vec2) -> Vec3 {
    let clip = uv_to_clip(uv);
    let y = clip.x.abs() + clip.y.abs() - 1.0;
    let (x, z) = if y <= 0.0 {
        (clip.x, clip.y)
    } else {
        (
            (1.0 - clip.y.abs()) * sign(clip.x),
            (1.0 - clip.x.abs()) * sign(clip.y),
        )
    };
    Vec3::new(x, y, z).normalize()
}

/// Converts a clip-space position of the unfold mesh to texture space.
pub fn clip_to_uv(clip: Vec2) -> Vec2 {
    Vec2::new((clip.x + 1.0) * 0.5, (1.0 - clip.y) * 0.5)
}

/// Converts a texture-space coordinate to the unfold mesh's clip space.
pub fn uv_to_clip(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0)
}

// Zero folds toward the positive side so the seams resolve consistently.
fn sign(v: f32) -> f32 {
    if v >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn position(index: u32) -> Vec2 {
        Vec2::from(OCTAHEDRAL_VERTICES[index as usize].position)
    }

    fn direction(index: u32) -> Vec3 {
        Vec3::from(OCTAHEDRAL_VERTICES[index as usize].direction)
    }

    #[test]
    fn test_counts_are_fixed() {
        assert_eq!(OCTAHEDRAL_VERTICES.len(), 9);
        assert_eq!(OCTAHEDRAL_INDICES.len(), 24);
        assert!(OCTAHEDRAL_INDICES
            .iter()
            .all(|&i| (i as usize) < VERTEX_COUNT));
    }

    #[test]
    fn test_vertex_layout_matches_attributes() {
        assert_eq!(VERTEX_STRIDE, 20);
        let direction = &VERTEX_ATTRIBUTES[1];
        assert_eq!(direction.offset, 8);
        assert_eq!(direction.components, 3);
    }

    #[test]
    fn test_directions_are_canonical_axes() {
        for vertex in &OCTAHEDRAL_VERTICES {
            let d = Vec3::from(vertex.direction);
            assert!((d.length() - 1.0).abs() < 1e-6);
            let nonzero = vertex.direction.iter().filter(|c| **c != 0.0).count();
            assert_eq!(nonzero, 1);
        }
    }

    #[test]
    fn test_vertices_decode_to_their_direction() {
        for vertex in &OCTAHEDRAL_VERTICES {
            let uv = clip_to_uv(Vec2::from(vertex.position));
            let decoded = octahedral_direction(uv);
            let expected = Vec3::from(vertex.direction);
            assert!(
                (decoded - expected).length() < 1e-5,
                "{vertex:?} decoded to {decoded}"
            );
        }
    }

    #[test]
    fn test_triangles_cover_the_square() {
        let mut area = 0.0;
        for tri in OCTAHEDRAL_INDICES.chunks_exact(3) {
            let (a, b, c) = (position(tri[0]), position(tri[1]), position(tri[2]));
            area += 0.5 * (b - a).perp_dot(c - a).abs();
        }
        assert!((area - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_each_triangle_spans_one_octant() {
        for tri in OCTAHEDRAL_INDICES.chunks_exact(3) {
            let sum = direction(tri[0]) + direction(tri[1]) + direction(tri[2]);
            // Three distinct axes of one octant sum to a vector with all components set.
            assert!(sum.x != 0.0 && sum.y != 0.0 && sum.z != 0.0, "{tri:?}");
        }
    }

    #[test]
    fn test_interpolated_direction_matches_decode() {
        // Barycentric interpolation inside each triangle equals the analytic decode.
        for tri in OCTAHEDRAL_INDICES.chunks_exact(3) {
            let weights = Vec3::new(0.2, 0.3, 0.5);
            let p = position(tri[0]) * weights.x
                + position(tri[1]) * weights.y
                + position(tri[2]) * weights.z;
            let d = direction(tri[0]) * weights.x
                + direction(tri[1]) * weights.y
                + direction(tri[2]) * weights.z;
            let decoded = octahedral_direction(clip_to_uv(p));
            assert!((decoded - d.normalize()).length() < 1e-5);
        }
    }

    #[test]
    fn test_poles() {
        let down = octahedral_uv(Vec3::NEG_Y);
        assert!((down - Vec2::splat(0.5)).length() < 1e-6);
        let up = octahedral_uv(Vec3::Y);
        assert!((up - Vec2::new(1.0, 0.0)).length() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_encode_decode_inverse(
            x in -1.0f32..1.0,
            y in -1.0f32..1.0,
            z in -1.0f32..1.0,
        ) {
            let v = Vec3::new(x, y, z);
            prop_assume!(v.length() > 0.1);
            let decoded = octahedral_direction(octahedral_uv(v));
            prop_assert!((decoded - v.normalize()).length() < 1e-4);
        }
    }
}
