//! wgpu render backend for the tilemap.
//!
//! Implements [`tilegrid_render::RenderContext`] on top of wgpu: one tilemap
//! pipeline, the shared cube mesh, RGBA8 texture arrays and a depth target.
//!
//! # Invariants
//! - Uniform writes and texture unit bindings are sticky until overwritten.
//! - Each queued draw owns a copy of the uniform block taken when it was queued.
//! - Queued draws are encoded and submitted only by `present`, once per frame.

mod gpu;
mod mesh;
mod shaders;
mod texture;

pub use gpu::WgpuContext;
pub use texture::procedural_atlas;
