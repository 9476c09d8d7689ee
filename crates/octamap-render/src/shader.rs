//! Shader management.

use crate::error::{RenderError, RenderResult};

/// A compiled shader program.
#[derive(Debug)]
pub struct ShaderProgram {
    /// Cache key the program was compiled under.
    pub key: String,
    /// The compiled module holding both entry points.
    pub module: wgpu::ShaderModule,
    pub vertex_entry: String,
    pub fragment_entry: String,
    /// Vertex attribute names and the locations the vertex stage reads them from.
    pub attribute_locations: Vec<(String, u32)>,
}

/// Builder for creating shader programs.
pub struct ShaderBuilder {
    vertex_source: Option<String>,
    fragment_source: Option<String>,
    vertex_entry: String,
    fragment_entry: String,
    attribute_locations: Vec<(String, u32)>,
    label: Option<String>,
}

impl ShaderBuilder {
    /// Creates a new shader builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vertex_source: None,
            fragment_source: None,
            vertex_entry: "vs_main".to_string(),
            fragment_entry: "fs_main".to_string(),
            attribute_locations: Vec::new(),
            label: None,
        }
    }

    /// Sets the vertex shader source (WGSL).
    #[must_use]
    pub fn with_vertex(mut self, source: impl Into<String>) -> Self {
        self.vertex_source = Some(source.into());
        self
    }

    /// Sets the fragment shader source (WGSL).
    #[must_use]
    pub fn with_fragment(mut self, source: impl Into<String>) -> Self {
        self.fragment_source = Some(source.into());
        self
    }

    /// Binds a named vertex attribute to a shader location.
    #[must_use]
    pub fn with_attribute_location(mut self, name: impl Into<String>, location: u32) -> Self {
        self.attribute_locations.push((name.into(), location));
        self
    }

    /// Sets the shader label for debugging.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Builds the shader module (does not create pipeline).
    pub fn build_module(&self, device: &wgpu::Device) -> RenderResult<wgpu::ShaderModule> {
        let source = self.combined_source()?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: self.label.as_deref(),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        Ok(module)
    }

    /// Builds the module and wraps it into a program with its attribute bindings.
    pub fn build_program(self, device: &wgpu::Device) -> RenderResult<ShaderProgram> {
        let module = self.build_module(device)?;
        Ok(ShaderProgram {
            key: self.label.unwrap_or_default(),
            module,
            vertex_entry: self.vertex_entry,
            fragment_entry: self.fragment_entry,
            attribute_locations: self.attribute_locations,
        })
    }

    fn combined_source(&self) -> RenderResult<String> {
        let vertex = self
            .vertex_source
            .as_ref()
            .ok_or_else(|| RenderError::ShaderCompilationFailed("missing vertex shader".into()))?;

        let fragment = self.fragment_source.as_ref().ok_or_else(|| {
            RenderError::ShaderCompilationFailed("missing fragment shader".into())
        })?;

        // If sources are the same file, just return one
        if vertex == fragment {
            return Ok(vertex.clone());
        }

        // Otherwise combine them
        Ok(format!("{vertex}\n\n{fragment}"))
    }
}

impl Default for ShaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_source_is_not_duplicated() {
        let builder = ShaderBuilder::new()
            .with_vertex(octamap_core::shaders::PROJECTION_SHADER)
            .with_fragment(octamap_core::shaders::PROJECTION_SHADER);
        let source = builder.combined_source().unwrap();
        assert_eq!(source.matches("fn vs_main").count(), 1);
    }

    #[test]
    fn test_distinct_sources_are_concatenated() {
        let builder = ShaderBuilder::new()
            .with_vertex("// vertex")
            .with_fragment("// fragment");
        assert_eq!(builder.combined_source().unwrap(), "// vertex\n\n// fragment");
    }

    #[test]
    fn test_programs_use_shared_entry_point_names() {
        let builder = ShaderBuilder::new()
            .with_vertex(octamap_core::shaders::FULL_SCREEN_VERTEX_SHADER)
            .with_attribute_location("position", 0);
        assert_eq!(builder.vertex_entry, "vs_main");
        assert_eq!(builder.fragment_entry, "fs_main");
        assert_eq!(builder.attribute_locations, vec![("position".to_string(), 0)]);
    }

    #[test]
    fn test_missing_fragment_fails() {
        let builder = ShaderBuilder::new().with_vertex("// vertex");
        assert!(matches!(
            builder.combined_source(),
            Err(RenderError::ShaderCompilationFailed(_))
        ));
    }
}
