//! Lifecycle of an octahedral projected cube map.
//!
//! The first [`OctahedralProjectedCubeMap::update`] allocates everything and
//! records one projection pass per level followed by the atlas pass. The
//! vertex array, shader programs and level textures only exist to produce the
//! atlas; they are released on the next `update`, once the passes that read
//! them have been handed to the executor.

use crate::command::{ComputeCommand, FrameState, OwnerTag, PassGeometry, UniformValue};
use crate::config::OctahedralMapConfig;
use crate::device::{
    CubeMapTexture, GpuDevice, PixelDatatype, PixelFormat, ShaderProgramDescriptor,
    TextureDescriptor,
};
use crate::error::{OctamapError, Result};
use crate::geometry::{self, VERTEX_ATTRIBUTES};
use crate::layout::AtlasLayout;
use crate::shaders;

/// Build progress of a projected cube map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Nothing allocated yet.
    Unbuilt,
    /// Allocation in progress. An instance stays here if an allocation failed.
    Building,
    /// The atlas exists and its passes were recorded.
    Built {
        /// Whether the intermediate resources have been released.
        scaffold_released: bool,
    },
    Destroyed,
}

/// Packs a chain of convolved cube maps into one octahedral atlas texture.
pub struct OctahedralProjectedCubeMap<D: GpuDevice> {
    config: OctahedralMapConfig,
    cube_maps: Vec<D::CubeMap>,
    owner: OwnerTag,
    state: LifecycleState,
    layout: Option<AtlasLayout>,
    maximum_mipmap_level: Option<usize>,

    // Scaffold, released one update after the passes are recorded.
    vertex_array: Option<D::VertexArray>,
    projection_program: Option<D::ShaderProgram>,
    atlas_program: Option<D::ShaderProgram>,
    level_textures: Vec<D::Texture>,

    texture: Option<D::Texture>,
}

impl<D: GpuDevice> OctahedralProjectedCubeMap<D> {
    /// Creates an unbuilt map over cube maps ordered from sharpest to blurriest.
    pub fn new(cube_maps: Vec<D::CubeMap>) -> Self {
        Self::with_config(cube_maps, OctahedralMapConfig::default())
    }

    /// Creates an unbuilt map with an explicit configuration.
    pub fn with_config(cube_maps: Vec<D::CubeMap>, config: OctahedralMapConfig) -> Self {
        Self {
            config,
            cube_maps,
            owner: OwnerTag::next(),
            state: LifecycleState::Unbuilt,
            layout: None,
            maximum_mipmap_level: None,
            vertex_array: None,
            projection_program: None,
            atlas_program: None,
            level_textures: Vec::new(),
            texture: None,
        }
    }

    /// Whether `device` can produce an atlas in the given format.
    pub fn is_supported(device: &D, format: PixelFormat, datatype: PixelDatatype) -> bool {
        device.supports_render_target(format, datatype)
    }

    /// The packed atlas, once its passes have been recorded.
    pub fn texture(&self) -> Option<&D::Texture> {
        self.texture.as_ref()
    }

    /// Highest level stored in the atlas, once a build has started.
    pub fn maximum_mipmap_level(&self) -> Option<usize> {
        self.maximum_mipmap_level
    }

    /// Packing of the atlas, once a build has started.
    pub fn layout(&self) -> Option<&AtlasLayout> {
        self.layout.as_ref()
    }

    /// Flat per-level textures. Empty before the build and after the scaffold is released.
    pub fn level_textures(&self) -> &[D::Texture] {
        &self.level_textures
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Tag carried by every command this instance records.
    pub fn owner(&self) -> OwnerTag {
        self.owner
    }

    /// Configuration the instance was created with.
    pub fn config(&self) -> &OctahedralMapConfig {
        &self.config
    }

    /// Whether the atlas exists and its passes have been recorded.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, LifecycleState::Built { .. })
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == LifecycleState::Destroyed
    }

    /// Advances the lifecycle by one frame.
    ///
    /// Builds and records the passes on the first call, releases the scaffold
    /// on the second, and does nothing afterwards.
    pub fn update(&mut self, frame: &mut FrameState<'_, D>) -> Result<()> {
        match self.state {
            LifecycleState::Destroyed => return Err(OctamapError::Destroyed),
            LifecycleState::Building => return Err(OctamapError::IncompleteBuild),
            LifecycleState::Unbuilt | LifecycleState::Built { .. } => {}
        }
        let device = frame.context().ok_or(OctamapError::MissingRenderContext)?;

        if self.state == (LifecycleState::Built { scaffold_released: false }) {
            self.release_scaffold();
            self.state = LifecycleState::Built {
                scaffold_released: true,
            };
            log::debug!(
                "{} (owner {}): released projection scaffold",
                self.config.label,
                self.owner.id()
            );
        }

        if self.texture.is_some() {
            return Ok(());
        }

        self.build(device, frame)
    }

    /// Releases every GPU object in teardown order. Safe to call in any state.
    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }
        self.release_scaffold();
        self.texture = None;
        self.cube_maps.clear();
        self.layout = None;
        self.maximum_mipmap_level = None;
        self.state = LifecycleState::Destroyed;
        log::debug!("{} (owner {}): destroyed", self.config.label, self.owner.id());
    }

    fn release_scaffold(&mut self) {
        self.vertex_array = None;
        self.projection_program = None;
        self.atlas_program = None;
        self.level_textures.clear();
    }

    fn build(&mut self, device: &D, frame: &mut FrameState<'_, D>) -> Result<()> {
        let level_count = self.config.level_count(self.cube_maps.len());
        let base = self.cube_maps.first().ok_or(OctamapError::NoCubeMaps)?;
        let base_format = base.pixel_format();
        let base_datatype = base.pixel_datatype();
        self.maximum_mipmap_level = Some(level_count - 1);

        for (level, cube_map) in self.cube_maps.iter().take(level_count).enumerate() {
            if cube_map.width() == 0 {
                return Err(OctamapError::InvalidCubeMap {
                    level,
                    reason: "face width is zero".to_string(),
                });
            }
            if !device.supports_render_target(cube_map.pixel_format(), cube_map.pixel_datatype())
            {
                log::warn!(
                    "{}: level {level} format {:?}/{:?} cannot be rendered",
                    self.config.label,
                    cube_map.pixel_format(),
                    cube_map.pixel_datatype()
                );
                return Err(OctamapError::UnsupportedFormat {
                    format: cube_map.pixel_format(),
                    datatype: cube_map.pixel_datatype(),
                });
            }
        }

        let original_size = base.width().checked_mul(2).ok_or_else(|| {
            OctamapError::InvalidCubeMap {
                level: 0,
                reason: format!("face width {} is too large", base.width()),
            }
        })?;
        let layout = AtlasLayout::new(original_size, level_count)?;

        self.state = LifecycleState::Building;
        let label = self.config.label.clone();
        log::debug!(
            "{label} (owner {}): building {level_count} levels into a {}x{} atlas",
            self.owner.id(),
            layout.width(),
            layout.height()
        );

        let vertex_array = geometry::create_vertex_array(device, &label)?;
        self.vertex_array = Some(vertex_array.clone());

        let projection_program = device.shader_program(&ShaderProgramDescriptor {
            key: shaders::PROJECTION_PROGRAM_KEY,
            vertex_source: shaders::PROJECTION_SHADER,
            fragment_source: shaders::PROJECTION_SHADER,
            attribute_locations: &VERTEX_ATTRIBUTES,
        })?;
        self.projection_program = Some(projection_program.clone());

        let mut commands = Vec::with_capacity(level_count + 1);
        let mut atlas_uniforms = vec![(
            "originalSize".to_string(),
            UniformValue::Scalar(original_size as f32),
        )];

        for (level, cube_map) in self.cube_maps.iter().take(level_count).enumerate() {
            let size = cube_map.width() * 2;
            let level_texture = device.create_texture(&TextureDescriptor {
                label: format!("{label} level {level}"),
                width: size,
                height: size,
                pixel_format: cube_map.pixel_format(),
                pixel_datatype: cube_map.pixel_datatype(),
            })?;
            self.level_textures.push(level_texture.clone());

            commands.push(ComputeCommand {
                label: format!("{label} projection {level}"),
                geometry: PassGeometry::Mesh(vertex_array.clone()),
                shader_program: projection_program.clone(),
                uniforms: vec![("cubeMap".to_string(), UniformValue::CubeMap(cube_map.clone()))],
                output_texture: level_texture.clone(),
                persists: true,
                owner: self.owner,
            });
            atlas_uniforms.push((format!("texture{level}"), UniformValue::Texture(level_texture)));
        }

        let atlas_fragment = shaders::atlas_fragment_source(&layout);
        let atlas_key = shaders::atlas_program_key(&layout);
        let atlas_program = device.shader_program(&ShaderProgramDescriptor {
            key: &atlas_key,
            vertex_source: shaders::FULL_SCREEN_VERTEX_SHADER,
            fragment_source: &atlas_fragment,
            attribute_locations: &[],
        })?;
        self.atlas_program = Some(atlas_program.clone());

        let atlas = device.create_texture(&TextureDescriptor {
            label: format!("{label} atlas"),
            width: layout.width(),
            height: layout.height(),
            pixel_format: base_format,
            pixel_datatype: base_datatype,
        })?;

        commands.push(ComputeCommand {
            label: format!("{label} atlas"),
            geometry: PassGeometry::FullScreen,
            shader_program: atlas_program,
            uniforms: atlas_uniforms,
            output_texture: atlas.clone(),
            persists: false,
            owner: self.owner,
        });

        // Enqueue only once every allocation succeeded.
        for command in commands {
            frame.push_command(command);
        }

        self.texture = Some(atlas);
        self.layout = Some(layout);
        self.state = LifecycleState::Built {
            scaffold_released: false,
        };
        Ok(())
    }
}
