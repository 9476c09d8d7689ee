//! wgpu backend for octamap.
//!
//! This crate provides:
//! - [`WgpuDevice`], the allocation port implemented on a wgpu device
//! - Pass execution for recorded projection and atlas commands
//! - Cube map upload and texture readback

// Texel sizes and channel values are narrowed deliberately
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod buffer;
pub mod device;
pub mod error;
pub mod executor;
pub mod readback;
pub mod shader;
pub mod texture;

pub use device::{GpuVertexArray, WgpuDevice};
pub use error::{RenderError, RenderResult};
pub use executor::pack_scalars;
pub use readback::{save_rgba8_image, to_rgba8};
pub use shader::{ShaderBuilder, ShaderProgram};
pub use texture::{texture_format, GpuCubeMap, GpuTexture};

/// The projected cube map driven by a wgpu device.
pub type WgpuOctahedralMap = octamap_core::OctahedralProjectedCubeMap<WgpuDevice>;
