/// WGSL shader for the instanced tilemap.
///
/// Each instance offsets the shared cube by its grid cell; the model matrix
/// then scales cells to world units and flattens Z. Tile type and variant are
/// not part of the instance data, so every tile samples layer 0.
pub const TILEMAP_SHADER: &str = r#"
struct Matrices {
    m_proj: mat4x4<f32>,
    m_view: mat4x4<f32>,
    m_model: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> matrices: Matrices;

@group(1) @binding(0)
var tiler: texture_2d_array<f32>;
@group(1) @binding(1)
var tiler_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

struct InstanceInput {
    @location(2) offset: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let local = vec4<f32>(vertex.position + instance.offset, 1.0);

    var out: VertexOutput;
    out.clip_position = matrices.m_proj * matrices.m_view * matrices.m_model * local;
    out.uv = vertex.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(tiler, tiler_sampler, in.uv, 0);
}
"#;
