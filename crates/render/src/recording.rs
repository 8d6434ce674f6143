use crate::context::{
    BufferHandle, MAX_TEXTURE_UNITS, MatrixUniform, MeshHandle, ProgramHandle, RenderContext,
    RenderError, SamplerUniform, TextureHandle, VaoHandle, check_texture_unit, instance_capacity,
};
use glam::Mat4;
use std::fmt::Write as _;
use tilegrid_map::TileInstance;

/// One call made against a [`RecordingContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    CreateBuffer {
        buffer: BufferHandle,
        label: String,
        len: usize,
    },
    CreateVao {
        vao: VaoHandle,
        program: ProgramHandle,
        mesh: MeshHandle,
        instances: BufferHandle,
    },
    WriteMatrix {
        program: ProgramHandle,
        uniform: MatrixUniform,
        value: Mat4,
    },
    SetSampler {
        program: ProgramHandle,
        uniform: SamplerUniform,
        unit: u32,
    },
    UseTexture {
        texture: TextureHandle,
        unit: u32,
    },
    Draw {
        vao: VaoHandle,
        instances: u32,
    },
}

#[derive(Debug)]
struct RecordedProgram {
    name: String,
    sampler_unit: Option<u32>,
}

#[derive(Debug)]
struct RecordedVao {
    program: ProgramHandle,
    capacity: u32,
}

/// In-memory render context that validates and records every call.
///
/// Drives the tilemap without a GPU: used by the CLI to trace frames and by
/// tests to assert exactly which uniforms and draws a frame produced.
#[derive(Debug, Default)]
pub struct RecordingContext {
    programs: Vec<RecordedProgram>,
    meshes: Vec<String>,
    textures: Vec<String>,
    buffers: Vec<Vec<u8>>,
    vaos: Vec<RecordedVao>,
    texture_units: [Option<TextureHandle>; MAX_TEXTURE_UNITS as usize],
    commands: Vec<RenderCommand>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_program(&mut self, name: &str) -> ProgramHandle {
        self.programs.push(RecordedProgram {
            name: name.into(),
            sampler_unit: None,
        });
        ProgramHandle(self.programs.len() as u32 - 1)
    }

    pub fn register_mesh(&mut self, name: &str) -> MeshHandle {
        self.meshes.push(name.into());
        MeshHandle(self.meshes.len() as u32 - 1)
    }

    pub fn register_texture(&mut self, name: &str) -> TextureHandle {
        self.textures.push(name.into());
        TextureHandle(self.textures.len() as u32 - 1)
    }

    /// All recorded commands, oldest first.
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Forget recorded commands; resources and bindings are kept.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// `(vao, instances)` for every recorded draw.
    pub fn draw_calls(&self) -> Vec<(VaoHandle, u32)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RenderCommand::Draw { vao, instances } => Some((*vao, *instances)),
                _ => None,
            })
            .collect()
    }

    /// Contents of a buffer created through this context.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(buffer.0 as usize).map(Vec::as_slice)
    }

    /// Most recent value written to `uniform` on `program`.
    pub fn last_matrix(&self, program: ProgramHandle, uniform: MatrixUniform) -> Option<Mat4> {
        self.commands.iter().rev().find_map(|c| match c {
            RenderCommand::WriteMatrix {
                program: p,
                uniform: u,
                value,
            } if *p == program && *u == uniform => Some(*value),
            _ => None,
        })
    }

    pub fn texture_at_unit(&self, unit: u32) -> Option<TextureHandle> {
        self.texture_units.get(unit as usize).copied().flatten()
    }

    /// Human-readable listing of the recorded commands.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Render Commands ({} recorded, {} draws) ===",
            self.commands.len(),
            self.draw_calls().len()
        );
        for cmd in &self.commands {
            let _ = match cmd {
                RenderCommand::CreateBuffer { buffer, label, len } => {
                    writeln!(out, "  create_buffer #{} '{label}' ({len} bytes)", buffer.0)
                }
                RenderCommand::CreateVao {
                    vao,
                    program,
                    mesh,
                    instances,
                } => writeln!(
                    out,
                    "  create_vao #{} program='{}' mesh='{}' instances=#{}",
                    vao.0,
                    self.program_name(*program),
                    self.mesh_name(*mesh),
                    instances.0
                ),
                RenderCommand::WriteMatrix {
                    program,
                    uniform,
                    value,
                } => {
                    let t = value.w_axis;
                    writeln!(
                        out,
                        "  {}[{uniform}] <- mat4 (translation {:.2}, {:.2}, {:.2})",
                        self.program_name(*program),
                        t.x,
                        t.y,
                        t.z
                    )
                }
                RenderCommand::SetSampler {
                    program,
                    uniform,
                    unit,
                } => writeln!(
                    out,
                    "  {}[{uniform}] <- unit {unit}",
                    self.program_name(*program)
                ),
                RenderCommand::UseTexture { texture, unit } => writeln!(
                    out,
                    "  use_texture '{}' -> unit {unit}",
                    self.texture_name(*texture)
                ),
                RenderCommand::Draw { vao, instances } => {
                    writeln!(out, "  draw vao #{} x {instances}", vao.0)
                }
            };
        }
        out
    }

    fn program_name(&self, handle: ProgramHandle) -> &str {
        self.programs
            .get(handle.0 as usize)
            .map_or("?", |p| p.name.as_str())
    }

    fn mesh_name(&self, handle: MeshHandle) -> &str {
        self.meshes.get(handle.0 as usize).map_or("?", String::as_str)
    }

    fn texture_name(&self, handle: TextureHandle) -> &str {
        self.textures.get(handle.0 as usize).map_or("?", String::as_str)
    }

    fn program_mut(&mut self, handle: ProgramHandle) -> Result<&mut RecordedProgram, RenderError> {
        self.programs
            .get_mut(handle.0 as usize)
            .ok_or(RenderError::UnknownProgram(handle))
    }
}

impl RenderContext for RecordingContext {
    fn create_buffer(&mut self, label: &str, contents: &[u8]) -> Result<BufferHandle, RenderError> {
        self.buffers.push(contents.to_vec());
        let buffer = BufferHandle(self.buffers.len() as u32 - 1);
        self.commands.push(RenderCommand::CreateBuffer {
            buffer,
            label: label.into(),
            len: contents.len(),
        });
        Ok(buffer)
    }

    fn create_instanced_vao(
        &mut self,
        program: ProgramHandle,
        mesh: MeshHandle,
        instances: BufferHandle,
    ) -> Result<VaoHandle, RenderError> {
        self.program_mut(program)?;
        if mesh.0 as usize >= self.meshes.len() {
            return Err(RenderError::UnknownMesh(mesh));
        }
        let len = self
            .buffers
            .get(instances.0 as usize)
            .ok_or(RenderError::UnknownBuffer(instances))?
            .len();
        let capacity = instance_capacity(len as u64, TileInstance::STRIDE)?;

        self.vaos.push(RecordedVao { program, capacity });
        let vao = VaoHandle(self.vaos.len() as u32 - 1);
        self.commands.push(RenderCommand::CreateVao {
            vao,
            program,
            mesh,
            instances,
        });
        Ok(vao)
    }

    fn write_matrix(
        &mut self,
        program: ProgramHandle,
        uniform: MatrixUniform,
        value: &Mat4,
    ) -> Result<(), RenderError> {
        self.program_mut(program)?;
        self.commands.push(RenderCommand::WriteMatrix {
            program,
            uniform,
            value: *value,
        });
        Ok(())
    }

    fn set_sampler(
        &mut self,
        program: ProgramHandle,
        uniform: SamplerUniform,
        unit: u32,
    ) -> Result<(), RenderError> {
        check_texture_unit(unit)?;
        self.program_mut(program)?.sampler_unit = Some(unit);
        self.commands.push(RenderCommand::SetSampler {
            program,
            uniform,
            unit,
        });
        Ok(())
    }

    fn use_texture(&mut self, texture: TextureHandle, unit: u32) -> Result<(), RenderError> {
        check_texture_unit(unit)?;
        if texture.0 as usize >= self.textures.len() {
            return Err(RenderError::UnknownTexture(texture));
        }
        self.texture_units[unit as usize] = Some(texture);
        self.commands.push(RenderCommand::UseTexture { texture, unit });
        Ok(())
    }

    fn render_instanced(&mut self, vao: VaoHandle, instances: u32) -> Result<(), RenderError> {
        let entry = self
            .vaos
            .get(vao.0 as usize)
            .ok_or(RenderError::UnknownVao(vao))?;
        if instances > entry.capacity {
            return Err(RenderError::InstanceOverflow {
                requested: instances,
                capacity: entry.capacity,
            });
        }
        let program = entry.program;
        let unit = self
            .program_mut(program)?
            .sampler_unit
            .ok_or(RenderError::SamplerNotSet(program))?;
        if self.texture_at_unit(unit).is_none() {
            return Err(RenderError::UnboundTextureUnit(unit));
        }

        self.commands.push(RenderCommand::Draw { vao, instances });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (RecordingContext, ProgramHandle, MeshHandle, TextureHandle) {
        let mut ctx = RecordingContext::new();
        let program = ctx.register_program("tilemap");
        let mesh = ctx.register_mesh("cube");
        let texture = ctx.register_texture("grass_tileset");
        (ctx, program, mesh, texture)
    }

    #[test]
    fn records_buffer_and_vao_creation() {
        let (mut ctx, program, mesh, _) = setup();
        let buffer = ctx.create_buffer("tiles", &[0u8; 36]).unwrap();
        let vao = ctx.create_instanced_vao(program, mesh, buffer).unwrap();

        assert_eq!(ctx.buffer_contents(buffer).unwrap().len(), 36);
        assert_eq!(ctx.commands().len(), 2);
        assert!(matches!(
            ctx.commands()[1],
            RenderCommand::CreateVao { vao: v, .. } if v == vao
        ));
    }

    #[test]
    fn rejects_unknown_handles() {
        let (mut ctx, program, mesh, _) = setup();
        assert!(matches!(
            ctx.create_instanced_vao(program, mesh, BufferHandle(7)),
            Err(RenderError::UnknownBuffer(_))
        ));
        assert!(matches!(
            ctx.write_matrix(ProgramHandle(9), MatrixUniform::Model, &Mat4::IDENTITY),
            Err(RenderError::UnknownProgram(_))
        ));
        assert!(matches!(
            ctx.use_texture(TextureHandle(3), 0),
            Err(RenderError::UnknownTexture(_))
        ));
        assert!(matches!(
            ctx.render_instanced(VaoHandle(0), 1),
            Err(RenderError::UnknownVao(_))
        ));
    }

    #[test]
    fn draw_requires_sampler_and_bound_texture() {
        let (mut ctx, program, mesh, texture) = setup();
        let buffer = ctx.create_buffer("tiles", &[0u8; 24]).unwrap();
        let vao = ctx.create_instanced_vao(program, mesh, buffer).unwrap();

        assert!(matches!(
            ctx.render_instanced(vao, 2),
            Err(RenderError::SamplerNotSet(_))
        ));
        ctx.set_sampler(program, SamplerUniform::Tiler, 1).unwrap();
        assert!(matches!(
            ctx.render_instanced(vao, 2),
            Err(RenderError::UnboundTextureUnit(1))
        ));
        ctx.use_texture(texture, 1).unwrap();
        ctx.render_instanced(vao, 2).unwrap();
        assert_eq!(ctx.draw_calls(), vec![(vao, 2)]);
    }

    #[test]
    fn draw_cannot_exceed_buffer_capacity() {
        let (mut ctx, program, mesh, texture) = setup();
        let buffer = ctx.create_buffer("tiles", &[0u8; 24]).unwrap();
        let vao = ctx.create_instanced_vao(program, mesh, buffer).unwrap();
        ctx.set_sampler(program, SamplerUniform::Tiler, 0).unwrap();
        ctx.use_texture(texture, 0).unwrap();

        assert!(matches!(
            ctx.render_instanced(vao, 3),
            Err(RenderError::InstanceOverflow {
                requested: 3,
                capacity: 2
            })
        ));
    }

    #[test]
    fn last_matrix_returns_latest_write() {
        let (mut ctx, program, _, _) = setup();
        let a = Mat4::from_translation(glam::Vec3::X);
        let b = Mat4::from_translation(glam::Vec3::Y);
        ctx.write_matrix(program, MatrixUniform::View, &a).unwrap();
        ctx.write_matrix(program, MatrixUniform::View, &b).unwrap();
        assert_eq!(ctx.last_matrix(program, MatrixUniform::View), Some(b));
        assert_eq!(ctx.last_matrix(program, MatrixUniform::Model), None);
    }

    #[test]
    fn summary_lists_commands() {
        let (mut ctx, program, mesh, texture) = setup();
        let buffer = ctx.create_buffer("tiles", &[0u8; 12]).unwrap();
        let vao = ctx.create_instanced_vao(program, mesh, buffer).unwrap();
        ctx.set_sampler(program, SamplerUniform::Tiler, 0).unwrap();
        ctx.use_texture(texture, 0).unwrap();
        ctx.render_instanced(vao, 1).unwrap();

        let out = ctx.summary();
        assert!(out.contains("5 recorded, 1 draws"));
        assert!(out.contains("mesh='cube'"));
        assert!(out.contains("tilemap[Tiler] <- unit 0"));
        assert!(out.contains("use_texture 'grass_tileset'"));

        ctx.clear_commands();
        assert!(ctx.commands().is_empty());
        assert_eq!(ctx.texture_at_unit(0), Some(texture));
    }
}
