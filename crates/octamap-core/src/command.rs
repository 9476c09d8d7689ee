//! Deferred GPU passes and the per-frame command list.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::device::GpuDevice;

/// Identifies the object that issued a command, for resource tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerTag(u64);

impl OwnerTag {
    /// Returns a tag not handed out before in this process.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// What a pass rasterizes.
pub enum PassGeometry<D: GpuDevice> {
    /// An indexed mesh.
    Mesh(D::VertexArray),
    /// A single triangle covering the output; the vertex stage generates it.
    FullScreen,
}

/// A value bound to a named shader uniform.
pub enum UniformValue<D: GpuDevice> {
    Scalar(f32),
    Texture(D::Texture),
    CubeMap(D::CubeMap),
}

/// One render-to-texture pass, recorded now and executed later.
pub struct ComputeCommand<D: GpuDevice> {
    pub label: String,
    pub geometry: PassGeometry<D>,
    pub shader_program: D::ShaderProgram,
    /// Uniforms in binding order.
    pub uniforms: Vec<(String, UniformValue<D>)>,
    pub output_texture: D::Texture,
    /// Whether the output must stay valid beyond the frame that produced it.
    pub persists: bool,
    pub owner: OwnerTag,
}

impl<D: GpuDevice> ComputeCommand<D> {
    /// Looks up a uniform by name.
    pub fn uniform(&self, name: &str) -> Option<&UniformValue<D>> {
        self.uniforms
            .iter()
            .find(|(uniform, _)| uniform == name)
            .map(|(_, value)| value)
    }

    pub fn is_full_screen(&self) -> bool {
        matches!(self.geometry, PassGeometry::FullScreen)
    }
}

/// Per-frame state handed to `update` calls.
///
/// Holds the rendering context for the frame and the list of passes recorded
/// during it. The executor drains the list in submission order.
pub struct FrameState<'a, D: GpuDevice> {
    context: Option<&'a D>,
    frame_number: u64,
    command_list: Vec<ComputeCommand<D>>,
}

impl<'a, D: GpuDevice> FrameState<'a, D> {
    /// Creates the state for frame `frame_number`.
    pub fn new(context: &'a D, frame_number: u64) -> Self {
        Self {
            context: Some(context),
            frame_number,
            command_list: Vec::new(),
        }
    }

    /// Creates a frame without a rendering context.
    pub fn without_context(frame_number: u64) -> Self {
        Self {
            context: None,
            frame_number,
            command_list: Vec::new(),
        }
    }

    pub fn context(&self) -> Option<&'a D> {
        self.context
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Appends a command after every command recorded so far.
    pub fn push_command(&mut self, command: ComputeCommand<D>) {
        log::trace!(
            "frame {}: enqueued '{}' (owner {})",
            self.frame_number,
            command.label,
            command.owner.id()
        );
        self.command_list.push(command);
    }

    pub fn commands(&self) -> &[ComputeCommand<D>] {
        &self.command_list
    }

    /// Removes and returns all recorded commands, oldest first.
    pub fn drain_commands(&mut self) -> Vec<ComputeCommand<D>> {
        std::mem::take(&mut self.command_list)
    }

    /// Advances to the next frame. Commands not yet drained are kept.
    pub fn advance(&mut self) {
        self.frame_number += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_tags_are_unique() {
        let a = OwnerTag::next();
        let b = OwnerTag::next();
        assert_ne!(a, b);
        assert!(b.id() > a.id());
    }
}
