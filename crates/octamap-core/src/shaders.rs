//! WGSL sources for the projection and atlas passes.
//!
//! Binding convention (group 0): binding 0 is the sampler, then one binding per
//! texture uniform in declaration order, then one `vec4<f32>` uniform block
//! per four scalar uniforms.

use std::fmt::Write;

use crate::layout::AtlasLayout;

/// Program cache key of the projection pass.
pub const PROJECTION_PROGRAM_KEY: &str = "octahedral_projection";

/// Projects a cube map onto the octahedral unfold mesh.
pub const PROJECTION_SHADER: &str = include_str!("shaders/octahedral_projection.wgsl");

/// Full-screen triangle shared by passes without geometry.
pub const FULL_SCREEN_VERTEX_SHADER: &str = include_str!("shaders/full_screen.wgsl");

/// Program cache key of the atlas pass for `layout`.
///
/// The generated source depends on the packing, so the key does too.
pub fn atlas_program_key(layout: &AtlasLayout) -> String {
    format!(
        "octahedral_atlas_{}x{}",
        layout.original_size(),
        layout.level_count()
    )
}

/// Generates the atlas fragment shader for `layout`.
///
/// Level 0 spans `original_size` texels from the left edge. Strip levels are
/// emitted as constant rectangles taken from `layout`, which keeps the shader
/// and [`AtlasLayout::atlas_uv`] in agreement. Gutter texels copy the nearest
/// texel of the region that owns them.
pub fn atlas_fragment_source(layout: &AtlasLayout) -> String {
    let level_count = layout.level_count();
    let mut src = String::new();

    let _ = writeln!(src, "@group(0) @binding(0) var atlas_sampler: sampler;");
    for level in 0..level_count {
        let _ = writeln!(
            src,
            "@group(0) @binding({}) var texture{level}: texture_2d<f32>;",
            level + 1
        );
    }
    let _ = writeln!(
        src,
        "@group(0) @binding({}) var<uniform> scalars: vec4<f32>;",
        level_count + 1
    );
    src.push_str(
        r"
fn region_uv(p: vec2<f32>, rect: vec4<f32>) -> vec2<f32> {
    return clamp((p - rect.xy) / rect.zw, vec2<f32>(0.0), vec2<f32>(1.0));
}

@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    let original_size = scalars.x;
    let p = frag_coord.xy;
",
    );

    let level0 = "vec4<f32>(0.0, 0.0, original_size, original_size)";
    if level_count == 1 {
        let _ = writeln!(
            src,
            "    return textureSampleLevel(texture0, atlas_sampler, region_uv(p, {level0}), 0.0);"
        );
    } else {
        let _ = writeln!(src, "    if (p.x < original_size + 1.0) {{");
        let _ = writeln!(
            src,
            "        return textureSampleLevel(texture0, atlas_sampler, region_uv(p, {level0}), 0.0);"
        );
        let _ = writeln!(src, "    }}");

        for (level, rect) in layout.rects().iter().enumerate().skip(1) {
            let rect_expr = format!(
                "vec4<f32>({:.1}, {:.1}, {:.1}, {:.1})",
                rect.x as f32, rect.y as f32, rect.width as f32, rect.height as f32
            );
            let sample = format!(
                "textureSampleLevel(texture{level}, atlas_sampler, region_uv(p, {rect_expr}), 0.0)"
            );
            if level + 1 < level_count {
                let _ = writeln!(
                    src,
                    "    if (p.y < {:.1}) {{\n        return {sample};\n    }}",
                    (rect.bottom() + 1) as f32
                );
            } else {
                let _ = writeln!(src, "    return {sample};");
            }
        }
    }
    src.push_str("}\n");
    src
}
