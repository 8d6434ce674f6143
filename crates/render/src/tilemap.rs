use crate::camera::CameraMatrices;
use crate::context::{
    BufferHandle, MatrixUniform, MeshHandle, ProgramHandle, RenderContext, RenderError,
    SamplerUniform, TextureHandle, VaoHandle,
};
use glam::Mat4;
use tilegrid_common::{GridCoord, Transform};
use tilegrid_map::{DEFAULT_TILE_TYPE, DEFAULT_VARIANT, MapError, TileDescriptor, TileGrid};

/// Texture unit the tile atlas is bound to.
pub const ATLAS_TEXTURE_UNIT: u32 = 0;

/// Shared backend resources a tilemap draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilemapResources {
    pub program: ProgramHandle,
    /// Base cube mesh, instanced once per tile.
    pub mesh: MeshHandle,
    /// Tile texture array.
    pub atlas: TextureHandle,
}

#[derive(Debug, thiserror::Error)]
pub enum TilemapError {
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// An instanced grid of tiles.
///
/// The instance buffer is uploaded once at construction. Each frame only the
/// camera and model matrices change, followed by a single instanced draw.
#[derive(Debug)]
pub struct Tilemap {
    grid: TileGrid,
    tile_size: u32,
    transform: Transform,
    model: Mat4,
    resources: TilemapResources,
    buffer: BufferHandle,
    vao: VaoHandle,
}

impl Tilemap {
    /// Build a `grid_size x grid_size` map of default tiles and upload its
    /// instance buffer through `ctx`.
    pub fn new<C: RenderContext + ?Sized>(
        ctx: &mut C,
        resources: TilemapResources,
        tile_size: u32,
        grid_size: u32,
    ) -> Result<Self, TilemapError> {
        let grid = TileGrid::with_default_tiles(grid_size, DEFAULT_TILE_TYPE, DEFAULT_VARIANT)?;
        Self::from_grid(ctx, resources, tile_size, grid)
    }

    /// Upload an already built grid.
    pub fn from_grid<C: RenderContext + ?Sized>(
        ctx: &mut C,
        resources: TilemapResources,
        tile_size: u32,
        grid: TileGrid,
    ) -> Result<Self, TilemapError> {
        let buffer = ctx.create_buffer("tilemap_instances", grid.instance_bytes())?;
        let vao = ctx.create_instanced_vao(resources.program, resources.mesh, buffer)?;

        let transform = Transform::with_uniform_scale(tile_size as f32);
        let model = transform.model_matrix();

        tracing::info!(
            grid_size = grid.size(),
            tiles = grid.len(),
            tile_size,
            "tilemap built"
        );

        Ok(Self {
            grid,
            tile_size,
            transform,
            model,
            resources,
            buffer,
            vao,
        })
    }

    /// Model matrix for the current transform.
    pub fn model_matrix(&self) -> Mat4 {
        self.transform.model_matrix()
    }

    /// Recompute the model matrix from the current transform, push it with the
    /// camera matrices and bind the tile atlas.
    pub fn update<C, M>(&mut self, ctx: &mut C, camera: &M) -> Result<(), RenderError>
    where
        C: RenderContext + ?Sized,
        M: CameraMatrices + ?Sized,
    {
        self.model = self.model_matrix();
        let program = self.resources.program;
        ctx.write_matrix(program, MatrixUniform::Projection, &camera.projection())?;
        ctx.write_matrix(program, MatrixUniform::View, &camera.view())?;
        ctx.write_matrix(program, MatrixUniform::Model, &self.model)?;

        ctx.use_texture(self.resources.atlas, ATLAS_TEXTURE_UNIT)?;
        ctx.set_sampler(program, SamplerUniform::Tiler, ATLAS_TEXTURE_UNIT)?;
        Ok(())
    }

    /// Update uniforms and draw every tile.
    pub fn render<C, M>(&mut self, ctx: &mut C, camera: &M) -> Result<(), RenderError>
    where
        C: RenderContext + ?Sized,
        M: CameraMatrices + ?Sized,
    {
        self.update(ctx, camera)?;
        ctx.render_instanced(self.vao, self.instance_count())?;
        tracing::trace!(instances = self.instance_count(), "tilemap drawn");
        Ok(())
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn tile_at(&self, coord: GridCoord) -> Option<&TileDescriptor> {
        self.grid.tile_at(coord)
    }

    pub fn grid_size(&self) -> u32 {
        self.grid.size()
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn instance_count(&self) -> u32 {
        self.grid.instance_count()
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Mutable transform. Takes effect on the next [`Tilemap::render`].
    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn resources(&self) -> TilemapResources {
        self.resources
    }

    pub fn instance_buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn vao(&self) -> VaoHandle {
        self.vao
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::FlyCamera;
    use crate::recording::{RecordingContext, RenderCommand};
    use glam::{Vec2, Vec3};
    use tilegrid_map::TileInstance;

    fn setup(grid_size: u32) -> (RecordingContext, Tilemap) {
        let mut ctx = RecordingContext::new();
        let resources = TilemapResources {
            program: ctx.register_program("tilemap"),
            mesh: ctx.register_mesh("cube"),
            atlas: ctx.register_texture("grass_tileset"),
        };
        let map = Tilemap::new(&mut ctx, resources, 16, grid_size).unwrap();
        (ctx, map)
    }

    #[test]
    fn construction_uploads_instances_once() {
        let (ctx, map) = setup(8);
        assert_eq!(map.grid().len(), 64);
        assert_eq!(map.instance_count(), 64);

        let bytes = ctx.buffer_contents(map.instance_buffer()).unwrap();
        assert_eq!(bytes.len() as u64, 64 * TileInstance::STRIDE);
        assert_eq!(bytes, map.grid().instance_bytes());

        let creates = ctx
            .commands()
            .iter()
            .filter(|c| matches!(c, RenderCommand::CreateBuffer { .. }))
            .count();
        assert_eq!(creates, 1);
        assert!(ctx.draw_calls().is_empty());
    }

    #[test]
    fn initial_scale_is_tile_size() {
        let (_, map) = setup(4);
        assert_eq!(map.transform().scale, Vec2::splat(16.0));
        assert_eq!(map.tile_size(), 16);
        assert_eq!(
            map.tile_at(GridCoord::new(-2, -2)).map(|t| t.variant),
            Some(DEFAULT_VARIANT)
        );
    }

    #[test]
    fn render_issues_one_draw_with_every_instance() {
        let (mut ctx, mut map) = setup(10);
        let camera = FlyCamera::default();

        map.render(&mut ctx, &camera).unwrap();
        assert_eq!(ctx.draw_calls(), vec![(map.vao(), 100)]);

        ctx.clear_commands();
        *map.transform_mut() = Transform {
            position: Vec3::new(50.0, -20.0, 3.0),
            roll_degrees: 45.0,
            scale: Vec2::new(4.0, 9.0),
        };
        map.render(&mut ctx, &camera).unwrap();
        assert_eq!(ctx.draw_calls(), vec![(map.vao(), 100)]);
    }

    #[test]
    fn update_writes_camera_model_and_atlas() {
        let (mut ctx, mut map) = setup(2);
        let camera = FlyCamera::default();
        let program = map.resources().program;

        map.transform_mut().position = Vec3::new(1.0, 2.0, 0.0);
        map.render(&mut ctx, &camera).unwrap();

        assert_eq!(
            ctx.last_matrix(program, MatrixUniform::Projection),
            Some(camera.projection_matrix())
        );
        assert_eq!(
            ctx.last_matrix(program, MatrixUniform::View),
            Some(camera.view_matrix())
        );
        assert_eq!(
            ctx.last_matrix(program, MatrixUniform::Model),
            Some(map.model_matrix())
        );
        assert_eq!(
            ctx.texture_at_unit(ATLAS_TEXTURE_UNIT),
            Some(map.resources().atlas)
        );
        assert!(ctx.commands().contains(&RenderCommand::SetSampler {
            program,
            uniform: SamplerUniform::Tiler,
            unit: ATLAS_TEXTURE_UNIT,
        }));
    }

    #[test]
    fn update_uses_the_current_transform() {
        let (mut ctx, mut map) = setup(2);
        let camera = FlyCamera::default();
        let program = map.resources().program;
        map.render(&mut ctx, &camera).unwrap();

        map.transform_mut().roll_degrees = 30.0;
        map.transform_mut().position = Vec3::new(-8.0, 4.0, 0.0);
        map.update(&mut ctx, &camera).unwrap();

        let expected = map.transform().model_matrix();
        assert_ne!(expected, Mat4::from_scale(Vec3::new(16.0, 16.0, 0.0)));
        assert_eq!(
            ctx.last_matrix(program, MatrixUniform::Model),
            Some(expected)
        );
    }

    #[test]
    fn maps_sharing_a_program_draw_with_their_own_model() {
        let (mut ctx, mut left) = setup(2);
        let mut right = Tilemap::new(&mut ctx, left.resources(), 16, 3).unwrap();
        left.transform_mut().position = Vec3::new(-100.0, 0.0, 0.0);
        right.transform_mut().position = Vec3::new(100.0, 0.0, 0.0);
        right.transform_mut().roll_degrees = 90.0;

        let camera = FlyCamera::default();
        ctx.clear_commands();
        left.render(&mut ctx, &camera).unwrap();
        right.render(&mut ctx, &camera).unwrap();

        let mut model = None;
        let mut drawn = Vec::new();
        for command in ctx.commands() {
            match command {
                RenderCommand::WriteMatrix {
                    uniform: MatrixUniform::Model,
                    value,
                    ..
                } => model = Some(*value),
                RenderCommand::Draw { vao, .. } => drawn.push((*vao, model)),
                _ => {}
            }
        }
        assert_eq!(
            drawn,
            vec![
                (left.vao(), Some(left.model_matrix())),
                (right.vao(), Some(right.model_matrix())),
            ]
        );
    }

    #[test]
    fn frame_command_order() {
        let (mut ctx, mut map) = setup(3);
        ctx.clear_commands();
        map.render(&mut ctx, &FlyCamera::default()).unwrap();

        let kinds: Vec<&str> = ctx
            .commands()
            .iter()
            .map(|c| match c {
                RenderCommand::WriteMatrix { uniform, .. } => uniform.name(),
                RenderCommand::UseTexture { .. } => "use_texture",
                RenderCommand::SetSampler { uniform, .. } => uniform.name(),
                RenderCommand::Draw { .. } => "draw",
                _ => "other",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["m_proj", "m_view", "m_model", "use_texture", "Tiler", "draw"]
        );
    }

    #[test]
    fn model_matrix_is_identity_on_plane_for_unit_transform() {
        let (_, mut map) = setup(2);
        *map.transform_mut() = Transform::default();
        let m = map.model_matrix();
        assert_eq!(m, Mat4::from_scale(Vec3::new(1.0, 1.0, 0.0)));
        assert_eq!(m, map.model_matrix());
    }

    #[test]
    fn invalid_grid_size_is_a_map_error() {
        let mut ctx = RecordingContext::new();
        let resources = TilemapResources {
            program: ctx.register_program("tilemap"),
            mesh: ctx.register_mesh("cube"),
            atlas: ctx.register_texture("grass_tileset"),
        };
        assert!(matches!(
            Tilemap::new(&mut ctx, resources, 16, 0),
            Err(TilemapError::Map(MapError::EmptyGrid))
        ));
        assert!(ctx.commands().is_empty());
    }

    #[test]
    fn unknown_mesh_is_a_render_error() {
        let mut ctx = RecordingContext::new();
        let resources = TilemapResources {
            program: ctx.register_program("tilemap"),
            mesh: MeshHandle(42),
            atlas: ctx.register_texture("grass_tileset"),
        };
        assert!(matches!(
            Tilemap::new(&mut ctx, resources, 16, 2),
            Err(TilemapError::Render(RenderError::UnknownMesh(_)))
        ));
    }
}
