//! Rendering adapter for the tilemap: a backend-agnostic render context,
//! the camera contract and the instanced [`Tilemap`] component.
//!
//! # Invariants
//! - The tile instance buffer is uploaded once, at construction.
//! - Every frame issues exactly one instanced draw covering every tile.
//! - Backends are reached only through [`RenderContext`] and typed handles;
//!   nothing is looked up by name.
//!
//! [`RecordingContext`] is a GPU-free backend that records every call. The
//! trait is the seam; swap in the wgpu backend without changing consumers.

mod camera;
mod context;
mod recording;
mod tilemap;

pub use camera::{CameraMatrices, FlyCamera};
pub use context::{
    BufferHandle, MAX_TEXTURE_UNITS, MatrixUniform, MeshHandle, ProgramHandle, RenderContext,
    RenderError, SamplerUniform, TextureHandle, VaoHandle, check_buffer_size, check_texture_unit,
    instance_capacity,
};
pub use recording::{RecordingContext, RenderCommand};
pub use tilemap::{ATLAS_TEXTURE_UNIT, Tilemap, TilemapError, TilemapResources};

pub fn crate_info() -> &'static str {
    "tilegrid-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
