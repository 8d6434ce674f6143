use glam::Mat4;
use std::fmt;

/// A GPU buffer created by a [`RenderContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// A shader program owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

/// A base mesh (vertex + index data) owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

/// A texture array owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// An instanced draw binding: program + base mesh + per-instance buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VaoHandle(pub u32);

/// Matrix uniforms the tilemap program exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixUniform {
    Projection,
    View,
    Model,
}

impl MatrixUniform {
    pub const ALL: [MatrixUniform; 3] = [Self::Projection, Self::View, Self::Model];

    /// Name of the uniform in the shader.
    pub fn name(self) -> &'static str {
        match self {
            Self::Projection => "m_proj",
            Self::View => "m_view",
            Self::Model => "m_model",
        }
    }

    /// Byte offset of the matrix inside the uniform block.
    pub fn offset(self) -> u64 {
        match self {
            Self::Projection => 0,
            Self::View => 64,
            Self::Model => 128,
        }
    }
}

impl fmt::Display for MatrixUniform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sampler uniforms the tilemap program exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerUniform {
    /// The tile texture array.
    Tiler,
}

impl SamplerUniform {
    pub fn name(self) -> &'static str {
        match self {
            Self::Tiler => "Tiler",
        }
    }
}

impl fmt::Display for SamplerUniform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised by a render backend.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferHandle),
    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramHandle),
    #[error("unknown mesh {0:?}")]
    UnknownMesh(MeshHandle),
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureHandle),
    #[error("unknown vertex array {0:?}")]
    UnknownVao(VaoHandle),
    #[error("texture unit {unit} is out of range (max {max})")]
    TextureUnitOutOfRange { unit: u32, max: u32 },
    #[error("no texture bound to unit {0}")]
    UnboundTextureUnit(u32),
    #[error("program {0:?} has no sampler unit set")]
    SamplerNotSet(ProgramHandle),
    #[error("draw of {requested} instances exceeds buffer capacity of {capacity}")]
    InstanceOverflow { requested: u32, capacity: u32 },
    #[error("instance buffer of {len} bytes is not a multiple of the {stride}-byte stride")]
    MisalignedInstanceBuffer { len: u64, stride: u64 },
    #[error("texture data is {actual} bytes, expected {expected}")]
    InvalidTextureData { expected: usize, actual: usize },
    #[error("buffer of {len} bytes exceeds the device limit of {max}")]
    BufferTooLarge { len: u64, max: u64 },
}

/// Texture units a backend must provide.
pub const MAX_TEXTURE_UNITS: u32 = 8;

/// Graphics context: resource creation, uniform state, and instanced draws.
///
/// Programs, meshes and textures are shared resources created by the backend
/// and handed to consumers as typed handles. Uniform writes and texture unit
/// bindings are sticky state, as in a GL context: they stay in effect for
/// every later draw until overwritten. A draw uses the state current when
/// `render_instanced` is called, even if the backend submits it later.
pub trait RenderContext {
    /// Upload `contents` into a new vertex buffer.
    fn create_buffer(&mut self, label: &str, contents: &[u8]) -> Result<BufferHandle, RenderError>;

    /// Bind `program`, the base `mesh` and a per-instance buffer into one draw binding.
    fn create_instanced_vao(
        &mut self,
        program: ProgramHandle,
        mesh: MeshHandle,
        instances: BufferHandle,
    ) -> Result<VaoHandle, RenderError>;

    fn write_matrix(
        &mut self,
        program: ProgramHandle,
        uniform: MatrixUniform,
        value: &Mat4,
    ) -> Result<(), RenderError>;

    /// Point a sampler uniform at a texture unit.
    fn set_sampler(
        &mut self,
        program: ProgramHandle,
        uniform: SamplerUniform,
        unit: u32,
    ) -> Result<(), RenderError>;

    /// Bind a texture to a texture unit.
    fn use_texture(&mut self, texture: TextureHandle, unit: u32) -> Result<(), RenderError>;

    /// Draw the VAO's mesh `instances` times.
    fn render_instanced(&mut self, vao: VaoHandle, instances: u32) -> Result<(), RenderError>;
}

/// Reject texture units beyond [`MAX_TEXTURE_UNITS`].
pub fn check_texture_unit(unit: u32) -> Result<(), RenderError> {
    if unit >= MAX_TEXTURE_UNITS {
        return Err(RenderError::TextureUnitOutOfRange {
            unit,
            max: MAX_TEXTURE_UNITS - 1,
        });
    }
    Ok(())
}

/// Reject buffers larger than the backend's `max` allocation size.
pub fn check_buffer_size(len: u64, max: u64) -> Result<(), RenderError> {
    if len > max {
        return Err(RenderError::BufferTooLarge { len, max });
    }
    Ok(())
}

/// Number of whole instances of `stride` bytes held by a buffer of `len` bytes.
pub fn instance_capacity(len: u64, stride: u64) -> Result<u32, RenderError> {
    if stride == 0 || len % stride != 0 {
        return Err(RenderError::MisalignedInstanceBuffer { len, stride });
    }
    Ok(u32::try_from(len / stride).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_names_match_shader() {
        assert_eq!(MatrixUniform::Projection.to_string(), "m_proj");
        assert_eq!(MatrixUniform::View.to_string(), "m_view");
        assert_eq!(MatrixUniform::Model.to_string(), "m_model");
        assert_eq!(SamplerUniform::Tiler.to_string(), "Tiler");
    }

    #[test]
    fn uniform_offsets_are_packed_mat4s() {
        let offsets: Vec<u64> = MatrixUniform::ALL.iter().map(|u| u.offset()).collect();
        assert_eq!(offsets, vec![0, 64, 128]);
    }

    #[test]
    fn texture_unit_bounds() {
        assert!(check_texture_unit(0).is_ok());
        assert!(check_texture_unit(MAX_TEXTURE_UNITS - 1).is_ok());
        assert!(matches!(
            check_texture_unit(MAX_TEXTURE_UNITS),
            Err(RenderError::TextureUnitOutOfRange { .. })
        ));
    }

    #[test]
    fn buffer_size_is_checked_against_the_limit() {
        assert!(check_buffer_size(256, 256).is_ok());
        // A full 65535-edge grid of 12-byte instances.
        let huge = 65_535u64 * 65_535 * 12;
        assert!(matches!(
            check_buffer_size(huge, 1 << 28),
            Err(RenderError::BufferTooLarge { len, max }) if len == huge && max == 1 << 28
        ));
    }

    #[test]
    fn capacity_requires_whole_instances() {
        assert_eq!(instance_capacity(120, 12).unwrap(), 10);
        assert!(matches!(
            instance_capacity(121, 12),
            Err(RenderError::MisalignedInstanceBuffer { .. })
        ));
    }
}
