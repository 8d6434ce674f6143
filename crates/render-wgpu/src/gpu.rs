use crate::mesh::{CubeVertex, cube_mesh};
use crate::shaders;
use crate::texture::layer_len;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use tilegrid_map::TileInstance;
use tilegrid_render::{
    BufferHandle, MAX_TEXTURE_UNITS, MatrixUniform, MeshHandle, ProgramHandle, RenderContext,
    RenderError, SamplerUniform, TextureHandle, VaoHandle, check_buffer_size, check_texture_unit,
    instance_capacity,
};
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Matrices {
    m_proj: [[f32; 4]; 4],
    m_view: [[f32; 4]; 4],
    m_model: [[f32; 4]; 4],
}

const _: () = assert!(std::mem::size_of::<Matrices>() == 192);

const IDENTITY_COLS: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

impl Matrices {
    const IDENTITY: Self = Self {
        m_proj: IDENTITY_COLS,
        m_view: IDENTITY_COLS,
        m_model: IDENTITY_COLS,
    };

    fn set(&mut self, uniform: MatrixUniform, value: &Mat4) {
        let slot = match uniform {
            MatrixUniform::Projection => &mut self.m_proj,
            MatrixUniform::View => &mut self.m_view,
            MatrixUniform::Model => &mut self.m_model,
        };
        *slot = value.to_cols_array_2d();
    }
}

struct Program {
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    /// Uniform values as last written; copied into each queued draw.
    matrices: Matrices,
    sampler_unit: Option<u32>,
}

struct Mesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct TextureArray {
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

struct VertexBuffer {
    buffer: wgpu::Buffer,
    len: u64,
}

struct Vao {
    program: ProgramHandle,
    mesh: MeshHandle,
    instances: BufferHandle,
    capacity: u32,
}

/// A draw queued by `render_instanced`, replayed by [`WgpuContext::present`].
///
/// Owns its own uniform block, so writes made after queueing do not reach it.
struct PendingDraw {
    vao: VaoHandle,
    instances: u32,
    uniform_bind_group: wgpu::BindGroup,
    texture_bind_group: wgpu::BindGroup,
}

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.1,
    b: 0.15,
    a: 1.0,
};

/// wgpu implementation of [`RenderContext`].
///
/// Matrix writes update a per-program staging block. Each `render_instanced`
/// snapshots that block into its own uniform buffer and queues the draw;
/// [`WgpuContext::present`] encodes the queue into a single render pass, and
/// the frame loop calls it once per frame with the surface view.
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    depth_view: wgpu::TextureView,
    programs: Vec<Program>,
    meshes: Vec<Mesh>,
    textures: Vec<TextureArray>,
    buffers: Vec<VertexBuffer>,
    vaos: Vec<Vao>,
    texture_units: [Option<TextureHandle>; MAX_TEXTURE_UNITS as usize],
    pending: Vec<PendingDraw>,
}

impl WgpuContext {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let depth_view = Self::create_depth_texture(&device, width, height);
        tracing::info!(?surface_format, width, height, "wgpu context ready");

        Self {
            device,
            queue,
            surface_format,
            depth_view,
            programs: Vec::new(),
            meshes: Vec::new(),
            textures: Vec::new(),
            buffers: Vec::new(),
            vaos: Vec::new(),
            texture_units: Default::default(),
            pending: Vec::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.depth_view = Self::create_depth_texture(&self.device, width, height);
    }

    /// Compile the tilemap shader and build its pipeline.
    ///
    /// Group 0 holds the `m_proj`/`m_view`/`m_model` block, group 1 the tile
    /// texture array and its sampler. Vertex slot 0 is the base mesh, slot 1
    /// the per-instance [`TileInstance`] buffer.
    pub fn create_tilemap_program(&mut self) -> ProgramHandle {
        let uniform_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("tilemap_uniform_layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });

        let texture_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("tilemap_texture_layout"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2Array,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("tilemap_pipeline_layout"),
                bind_group_layouts: &[&uniform_layout, &texture_layout],
                push_constant_ranges: &[],
            });

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("tilemap_shader"),
                source: wgpu::ShaderSource::Wgsl(shaders::TILEMAP_SHADER.into()),
            });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("tilemap_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[
                        wgpu::VertexBufferLayout {
                            array_stride: std::mem::size_of::<CubeVertex>() as u64,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &wgpu::vertex_attr_array![
                                0 => Float32x3,
                                1 => Float32x2,
                            ],
                        },
                        wgpu::VertexBufferLayout {
                            array_stride: TileInstance::STRIDE,
                            step_mode: wgpu::VertexStepMode::Instance,
                            attributes: &wgpu::vertex_attr_array![
                                2 => Float32x3,
                            ],
                        },
                    ],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.surface_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: Some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: wgpu::TextureFormat::Depth32Float,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            });

        self.programs.push(Program {
            pipeline,
            uniform_layout,
            texture_layout,
            matrices: Matrices::IDENTITY,
            sampler_unit: None,
        });
        let handle = ProgramHandle(self.programs.len() as u32 - 1);
        tracing::debug!(?handle, "tilemap program created");
        handle
    }

    /// Upload the shared unit cube.
    pub fn create_cube_mesh(&mut self) -> MeshHandle {
        let (verts, indices) = cube_mesh();
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("cube_vertex_buffer"),
                contents: bytemuck::cast_slice(&verts),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("cube_index_buffer"),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        self.meshes.push(Mesh {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        });
        MeshHandle(self.meshes.len() as u32 - 1)
    }

    /// Upload RGBA8 layers of `width x height` pixels as one texture array.
    pub fn create_texture_array(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        layers: &[Vec<u8>],
    ) -> Result<TextureHandle, RenderError> {
        let expected = layer_len(width, height);
        if layers.is_empty() {
            return Err(RenderError::InvalidTextureData {
                expected,
                actual: 0,
            });
        }
        if let Some(bad) = layers.iter().find(|l| l.len() != expected) {
            return Err(RenderError::InvalidTextureData {
                expected,
                actual: bad.len(),
            });
        }

        let data = layers.concat();
        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: layers.len() as u32,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &data,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        self.textures.push(TextureArray { view, sampler });
        let handle = TextureHandle(self.textures.len() as u32 - 1);
        tracing::debug!(
            ?handle,
            label,
            width,
            height,
            layers = layers.len(),
            "texture array created"
        );
        Ok(handle)
    }

    /// Encode every queued draw into one render pass over `target` and submit.
    pub fn present(&mut self, target: &wgpu::TextureView) -> Result<(), RenderError> {
        let draws = std::mem::take(&mut self.pending);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tilemap_encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("tilemap_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for draw in &draws {
                let vao = self.vao(draw.vao)?;
                let program = self.program(vao.program)?;
                let mesh = self.mesh(vao.mesh)?;
                let instances = self.buffer(vao.instances)?;

                pass.set_pipeline(&program.pipeline);
                pass.set_bind_group(0, &draw.uniform_bind_group, &[]);
                pass.set_bind_group(1, &draw.texture_bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_vertex_buffer(1, instances.buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..mesh.index_count, 0, 0..draw.instances);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        tracing::trace!(draws = draws.len(), "frame submitted");
        Ok(())
    }

    fn program(&self, handle: ProgramHandle) -> Result<&Program, RenderError> {
        self.programs
            .get(handle.0 as usize)
            .ok_or(RenderError::UnknownProgram(handle))
    }

    fn program_mut(&mut self, handle: ProgramHandle) -> Result<&mut Program, RenderError> {
        self.programs
            .get_mut(handle.0 as usize)
            .ok_or(RenderError::UnknownProgram(handle))
    }

    fn mesh(&self, handle: MeshHandle) -> Result<&Mesh, RenderError> {
        self.meshes
            .get(handle.0 as usize)
            .ok_or(RenderError::UnknownMesh(handle))
    }

    fn texture(&self, handle: TextureHandle) -> Result<&TextureArray, RenderError> {
        self.textures
            .get(handle.0 as usize)
            .ok_or(RenderError::UnknownTexture(handle))
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&VertexBuffer, RenderError> {
        self.buffers
            .get(handle.0 as usize)
            .ok_or(RenderError::UnknownBuffer(handle))
    }

    fn vao(&self, handle: VaoHandle) -> Result<&Vao, RenderError> {
        self.vaos
            .get(handle.0 as usize)
            .ok_or(RenderError::UnknownVao(handle))
    }

    fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&Default::default())
    }
}

impl RenderContext for WgpuContext {
    fn create_buffer(&mut self, label: &str, contents: &[u8]) -> Result<BufferHandle, RenderError> {
        check_buffer_size(contents.len() as u64, self.device.limits().max_buffer_size)?;
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.buffers.push(VertexBuffer {
            buffer,
            len: contents.len() as u64,
        });
        let handle = BufferHandle(self.buffers.len() as u32 - 1);
        tracing::debug!(?handle, label, bytes = contents.len(), "vertex buffer uploaded");
        Ok(handle)
    }

    fn create_instanced_vao(
        &mut self,
        program: ProgramHandle,
        mesh: MeshHandle,
        instances: BufferHandle,
    ) -> Result<VaoHandle, RenderError> {
        self.program(program)?;
        self.mesh(mesh)?;
        let capacity = instance_capacity(self.buffer(instances)?.len, TileInstance::STRIDE)?;

        self.vaos.push(Vao {
            program,
            mesh,
            instances,
            capacity,
        });
        Ok(VaoHandle(self.vaos.len() as u32 - 1))
    }

    fn write_matrix(
        &mut self,
        program: ProgramHandle,
        uniform: MatrixUniform,
        value: &Mat4,
    ) -> Result<(), RenderError> {
        self.program_mut(program)?.matrices.set(uniform, value);
        Ok(())
    }

    fn set_sampler(
        &mut self,
        program: ProgramHandle,
        _uniform: SamplerUniform,
        unit: u32,
    ) -> Result<(), RenderError> {
        check_texture_unit(unit)?;
        self.program_mut(program)?.sampler_unit = Some(unit);
        Ok(())
    }

    fn use_texture(&mut self, texture: TextureHandle, unit: u32) -> Result<(), RenderError> {
        check_texture_unit(unit)?;
        self.texture(texture)?;
        self.texture_units[unit as usize] = Some(texture);
        Ok(())
    }

    fn render_instanced(&mut self, vao: VaoHandle, instances: u32) -> Result<(), RenderError> {
        let entry = self.vao(vao)?;
        if instances > entry.capacity {
            return Err(RenderError::InstanceOverflow {
                requested: instances,
                capacity: entry.capacity,
            });
        }
        let program = self.program(entry.program)?;
        let unit = program
            .sampler_unit
            .ok_or(RenderError::SamplerNotSet(entry.program))?;
        let texture_handle = self
            .texture_units
            .get(unit as usize)
            .copied()
            .flatten()
            .ok_or(RenderError::UnboundTextureUnit(unit))?;
        let texture = self.texture(texture_handle)?;

        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("tilemap_draw_uniforms"),
                contents: bytemuck::bytes_of(&program.matrices),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tilemap_uniform_bind_group"),
            layout: &program.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tilemap_texture_bind_group"),
            layout: &program.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
        });

        self.pending.push(PendingDraw {
            vao,
            instances,
            uniform_bind_group,
            texture_bind_group,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn set_writes_each_matrix_at_its_uniform_offset() {
        let value = Mat4::from_translation(Vec3::new(5.0, 6.0, 7.0));
        for uniform in MatrixUniform::ALL {
            let mut block = Matrices::IDENTITY;
            block.set(uniform, &value);
            let start = uniform.offset() as usize;
            assert_eq!(
                &bytemuck::bytes_of(&block)[start..start + 64],
                bytemuck::bytes_of(&value.to_cols_array_2d())
            );
        }
    }

    #[test]
    fn queued_block_is_unaffected_by_later_writes() {
        let first = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let mut staged = Matrices::IDENTITY;
        staged.set(MatrixUniform::Model, &first);

        let queued = bytemuck::bytes_of(&staged).to_vec();
        staged.set(MatrixUniform::Model, &Mat4::from_scale(Vec3::splat(2.0)));

        let queued: Matrices = bytemuck::pod_read_unaligned(&queued);
        assert_eq!(queued.m_model, first.to_cols_array_2d());
        assert_ne!(staged.m_model, queued.m_model);
    }
}
