//! Executes recorded passes on a wgpu device.
//!
//! Every command becomes one render pass into its output texture. Bindings in
//! group 0 follow the order the shaders declare them: the sampler at binding 0,
//! then one texture per texture or cube map uniform in recording order, then one
//! `vec4<f32>` uniform buffer per four scalar uniforms.

use std::sync::{Arc, PoisonError};

use octamap_core::{ComputeCommand, FrameState, PassGeometry, UniformValue};

use crate::buffer;
use crate::device::{GpuVertexArray, WgpuDevice};
use crate::error::{RenderError, RenderResult};
use crate::shader::ShaderProgram;

/// Kind of resource at one binding after the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BindingKind {
    Texture2d,
    Cube,
    Scalars,
}

/// Everything a render pipeline depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    program: String,
    output_format: wgpu::TextureFormat,
    bindings: Vec<BindingKind>,
    filterable: bool,
    vertex_layout: Option<(u64, Vec<wgpu::VertexAttribute>)>,
}

#[derive(Debug)]
pub(crate) struct CachedPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

/// Packs scalars four to a block, padding the last block with zeros.
pub fn pack_scalars(scalars: &[f32]) -> Vec<[f32; 4]> {
    scalars
        .chunks(4)
        .map(|chunk| {
            let mut block = [0.0; 4];
            block[..chunk.len()].copy_from_slice(chunk);
            block
        })
        .collect()
}

fn layout_entry(binding: u32, kind: BindingKind, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    let ty = match kind {
        BindingKind::Texture2d | BindingKind::Cube => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: if kind == BindingKind::Cube {
                wgpu::TextureViewDimension::Cube
            } else {
                wgpu::TextureViewDimension::D2
            },
            multisampled: false,
        },
        BindingKind::Scalars => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty,
        count: None,
    }
}

fn layout_entries(key: &PipelineKey) -> Vec<wgpu::BindGroupLayoutEntry> {
    let sampler_type = if key.filterable {
        wgpu::SamplerBindingType::Filtering
    } else {
        wgpu::SamplerBindingType::NonFiltering
    };
    let sampler = wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(sampler_type),
        count: None,
    };
    std::iter::once(sampler)
        .chain(
            key.bindings
                .iter()
                .zip(1u32..)
                .map(|(kind, binding)| layout_entry(binding, *kind, key.filterable)),
        )
        .collect()
}

/// Fails unless every attribute the program reads is supplied at the same location.
fn check_attributes(program: &ShaderProgram, vertex_array: &GpuVertexArray) -> RenderResult<()> {
    for (name, location) in &program.attribute_locations {
        let bound = vertex_array
            .attribute_names
            .iter()
            .find(|(supplied, _)| supplied == name);
        match bound {
            Some((_, supplied)) if supplied == location => {}
            Some((_, supplied)) => {
                return Err(RenderError::PipelineCreationFailed(format!(
                    "'{}' reads attribute '{name}' at location {location}, vertex array binds it at {supplied}",
                    program.key
                )));
            }
            None => {
                return Err(RenderError::PipelineCreationFailed(format!(
                    "'{}' reads attribute '{name}' which the vertex array does not supply",
                    program.key
                )));
            }
        }
    }
    Ok(())
}

impl WgpuDevice {
    /// Encodes every command recorded in `frame` into one submission.
    ///
    /// Commands run in recording order. Returns the number of passes submitted.
    pub fn submit_frame(&self, frame: &mut FrameState<'_, WgpuDevice>) -> RenderResult<usize> {
        let commands = frame.drain_commands();
        if commands.is_empty() {
            return Ok(0);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("octamap frame encoder"),
            });
        for command in &commands {
            self.encode_command(&mut encoder, command)?;
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        log::debug!(
            "frame {}: submitted {} passes",
            frame.frame_number(),
            commands.len()
        );
        Ok(commands.len())
    }

    /// Records one render pass for `command`.
    pub fn encode_command(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        command: &ComputeCommand<WgpuDevice>,
    ) -> RenderResult<()> {
        let mut bindings = Vec::new();
        let mut views = Vec::new();
        let mut scalars = Vec::new();
        let mut filterable = true;
        for (_, value) in &command.uniforms {
            match value {
                UniformValue::Scalar(scalar) => scalars.push(*scalar),
                UniformValue::Texture(texture) => {
                    filterable &= self.is_filterable(texture.format());
                    bindings.push(BindingKind::Texture2d);
                    views.push(texture.view());
                }
                UniformValue::CubeMap(cube_map) => {
                    filterable &= self.is_filterable(cube_map.format());
                    bindings.push(BindingKind::Cube);
                    views.push(cube_map.view());
                }
            }
        }
        let scalar_blocks = pack_scalars(&scalars);
        bindings.extend(scalar_blocks.iter().map(|_| BindingKind::Scalars));

        let vertex_array = match &command.geometry {
            PassGeometry::Mesh(vertex_array) => {
                check_attributes(&command.shader_program, vertex_array)?;
                Some(vertex_array)
            }
            PassGeometry::FullScreen => None,
        };

        let key = PipelineKey {
            program: command.shader_program.key.clone(),
            output_format: command.output_texture.format(),
            bindings,
            filterable,
            vertex_layout: vertex_array.map(|va| (va.stride, va.attributes.clone())),
        };
        let cached = self.pipeline(&key, &command.shader_program)?;

        let scalar_buffers: Vec<wgpu::Buffer> = scalar_blocks
            .iter()
            .map(|block| {
                buffer::create_uniform_buffer(&self.device, &[*block], Some("octamap scalars"))
            })
            .collect();

        let sampler = if filterable {
            &self.filtering_sampler
        } else {
            &self.non_filtering_sampler
        };
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Sampler(sampler),
        }];
        let resources = views
            .iter()
            .copied()
            .map(wgpu::BindingResource::TextureView)
            .chain(scalar_buffers.iter().map(wgpu::Buffer::as_entire_binding));
        entries.extend(
            resources
                .zip(1u32..)
                .map(|(resource, binding)| wgpu::BindGroupEntry { binding, resource }),
        );
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(command.label.as_str()),
            layout: &cached.bind_group_layout,
            entries: &entries,
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(command.label.as_str()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: command.output_texture.view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        render_pass.set_pipeline(&cached.pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        match vertex_array {
            Some(vertex_array) => {
                render_pass.set_vertex_buffer(0, vertex_array.vertex_buffer.slice(..));
                render_pass
                    .set_index_buffer(vertex_array.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..vertex_array.index_count, 0, 0..1);
            }
            None => render_pass.draw(0..3, 0..1), // Fullscreen triangle
        }

        log::trace!(
            "encoded '{}' into {}x{} {:?}",
            command.label,
            command.output_texture.width(),
            command.output_texture.height(),
            command.output_texture.format()
        );
        Ok(())
    }

    fn pipeline(&self, key: &PipelineKey, program: &ShaderProgram) -> RenderResult<Arc<CachedPipeline>> {
        let mut pipelines = self.pipelines.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = pipelines.get(key) {
            return Ok(Arc::clone(cached));
        }

        let entries = layout_entries(key);
        let cached = self
            .scoped(|device| {
                let bind_group_layout =
                    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(key.program.as_str()),
                        entries: &entries,
                    });
                let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(key.program.as_str()),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                });
                let buffers: Vec<wgpu::VertexBufferLayout<'_>> = key
                    .vertex_layout
                    .iter()
                    .map(|(stride, attributes)| wgpu::VertexBufferLayout {
                        array_stride: *stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes,
                    })
                    .collect();
                let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(key.program.as_str()),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &program.module,
                        entry_point: Some(program.vertex_entry.as_str()),
                        buffers: &buffers,
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &program.module,
                        entry_point: Some(program.fragment_entry.as_str()),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: key.output_format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        cull_mode: None,
                        ..Default::default()
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                });
                CachedPipeline {
                    pipeline,
                    bind_group_layout,
                }
            })
            .map_err(|e| RenderError::from_scope(&e, RenderError::PipelineCreationFailed))?;

        log::debug!(
            "created pipeline for '{}' targeting {:?}",
            key.program,
            key.output_format
        );
        let cached = Arc::new(cached);
        pipelines.insert(key.clone(), Arc::clone(&cached));
        Ok(cached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(bindings: Vec<BindingKind>, filterable: bool) -> PipelineKey {
        PipelineKey {
            program: "octahedral_atlas_128x2".into(),
            output_format: wgpu::TextureFormat::Rgba16Float,
            bindings,
            filterable,
            vertex_layout: None,
        }
    }

    #[test]
    fn test_pack_scalars_pads_last_block() {
        assert_eq!(pack_scalars(&[256.0]), vec![[256.0, 0.0, 0.0, 0.0]]);
        assert_eq!(
            pack_scalars(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            vec![[1.0, 2.0, 3.0, 4.0], [5.0, 0.0, 0.0, 0.0]]
        );
        assert!(pack_scalars(&[]).is_empty());
    }

    #[test]
    fn test_atlas_layout_entries() {
        let entries = layout_entries(&key(
            vec![
                BindingKind::Texture2d,
                BindingKind::Texture2d,
                BindingKind::Scalars,
            ],
            true,
        ));
        assert_eq!(entries.len(), 4);
        assert_eq!(
            entries[0].ty,
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
        );
        assert_eq!(entries[3].binding, 3);
        assert!(matches!(entries[3].ty, wgpu::BindingType::Buffer { .. }));
    }

    #[test]
    fn test_non_filterable_inputs_use_non_filtering_sampler() {
        let entries = layout_entries(&key(vec![BindingKind::Cube], false));
        assert_eq!(
            entries[0].ty,
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering)
        );
        assert_eq!(
            entries[1].ty,
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::Cube,
                multisampled: false,
            }
        );
    }

    #[test]
    fn test_pipeline_keys_distinguish_formats() {
        let a = key(vec![BindingKind::Cube], true);
        let mut b = a.clone();
        assert_eq!(a, b);
        b.output_format = wgpu::TextureFormat::Rgba8Unorm;
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn prop_pack_scalars_preserves_values(scalars in prop::collection::vec(-1.0e6f32..1.0e6, 0..17)) {
            let blocks = pack_scalars(&scalars);
            prop_assert_eq!(blocks.len(), scalars.len().div_ceil(4));
            let flat: Vec<f32> = blocks.iter().flatten().copied().collect();
            prop_assert_eq!(&flat[..scalars.len()], &scalars[..]);
            prop_assert!(flat[scalars.len()..].iter().all(|v| *v == 0.0));
        }
    }
}
