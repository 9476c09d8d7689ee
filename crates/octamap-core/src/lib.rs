//! Core of octamap.
//!
//! Packs a chain of progressively convolved cube maps into one 2D atlas using
//! an octahedral projection, so image-based lighting can be sampled with a
//! single texture lookup per level:
//! - [`geometry`]: the fixed octahedral unfold mesh and CPU-side encode/decode
//! - [`layout`]: placement of every level inside the atlas
//! - [`device`]: the allocation port a rendering backend implements
//! - [`command`]: deferred passes and the per-frame command list
//! - [`OctahedralProjectedCubeMap`]: the lazy build / scaffold release / destroy lifecycle

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Texel coordinates are converted to f32 for UV math
#![allow(clippy::cast_precision_loss)]

pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod octahedral_map;
pub mod shaders;

pub use command::{ComputeCommand, FrameState, OwnerTag, PassGeometry, UniformValue};
pub use config::OctahedralMapConfig;
pub use device::{
    BufferUsage, CubeMapTexture, GpuDevice, PixelDatatype, PixelFormat, ShaderProgramDescriptor,
    TextureDescriptor, VertexArrayDescriptor, VertexAttribute,
};
pub use error::{OctamapError, Result};
pub use geometry::{
    octahedral_direction, octahedral_uv, CubeDirectionVertex, INDEX_COUNT, OCTAHEDRAL_INDICES,
    OCTAHEDRAL_VERTICES, VERTEX_COUNT,
};
pub use layout::{atlas_width, maximum_mipmap_level, AtlasLayout, AtlasRect, MAX_LEVELS};
pub use octahedral_map::{LifecycleState, OctahedralProjectedCubeMap};

// Re-export glam types for convenience
pub use glam::{Vec2, Vec3, Vec4};
