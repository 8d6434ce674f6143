use anyhow::Result;
use clap::Parser;
use egui::Context as EguiContext;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tilegrid_common::Transform;
use tilegrid_map::{TileGrid, TilemapConfig};
use tilegrid_render::{FlyCamera, Tilemap, TilemapResources};
use tilegrid_render_wgpu::{WgpuContext, procedural_atlas};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Edge length in pixels of each generated atlas layer.
const ATLAS_TILE_PX: u32 = 16;
const ATLAS_LAYERS: u32 = 4;

#[derive(Parser)]
#[command(name = "tilegrid-desktop", about = "Instanced tilemap viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON tilemap config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tiles per grid edge (overrides the config file)
    #[arg(long)]
    grid_size: Option<u32>,

    /// World units per tile (overrides the config file)
    #[arg(long)]
    tile_size: Option<u32>,
}

impl Cli {
    fn tilemap_config(&self) -> Result<TilemapConfig> {
        let mut config = TilemapConfig::load_or_default(self.config.as_deref())?;
        if let Some(n) = self.grid_size {
            config.grid_size = n;
        }
        if let Some(n) = self.tile_size {
            config.tile_size = n;
        }
        Ok(config)
    }
}

/// Upload the shared program, cube mesh and atlas, then build the tilemap on them.
fn build_tilemap(gpu: &mut WgpuContext, config: &TilemapConfig) -> Result<Tilemap> {
    let program = gpu.create_tilemap_program();
    let mesh = gpu.create_cube_mesh();
    let atlas = gpu.create_texture_array(
        "grass_tileset",
        ATLAS_TILE_PX,
        ATLAS_TILE_PX,
        &procedural_atlas(ATLAS_TILE_PX, ATLAS_LAYERS),
    )?;

    let grid = TileGrid::with_default_tiles(config.grid_size, &config.tile_type, config.variant)?;
    let resources = TilemapResources {
        program,
        mesh,
        atlas,
    };
    Ok(Tilemap::from_grid(gpu, resources, config.tile_size, grid)?)
}

/// Application state.
struct AppState {
    config: TilemapConfig,
    camera: FlyCamera,
    tilemap: Option<Tilemap>,
    show_panel: bool,
    spin: bool,
    // Input state
    keys_held: HashSet<KeyCode>,
    mouse_captured: bool,
    last_frame: Instant,
}

impl AppState {
    fn new(config: TilemapConfig) -> Self {
        let half_extent = (config.grid_size / 2) as f32 * config.tile_size as f32;
        Self {
            camera: FlyCamera::framing(half_extent),
            config,
            tilemap: None,
            show_panel: true,
            spin: false,
            keys_held: HashSet::new(),
            mouse_captured: false,
            last_frame: Instant::now(),
        }
    }

    fn default_transform(&self) -> Transform {
        Transform::with_uniform_scale(self.config.tile_size as f32)
    }

    fn update(&mut self, dt: f32) {
        let speed_mult = if self.keys_held.contains(&KeyCode::ShiftLeft) {
            3.0
        } else {
            1.0
        };
        let dt_scaled = dt * speed_mult;

        // Top-down view: WASD pans across the tile plane, E/Q zoom.
        if self.keys_held.contains(&KeyCode::KeyW) {
            self.camera.move_up(dt_scaled);
        }
        if self.keys_held.contains(&KeyCode::KeyS) {
            self.camera.move_down(dt_scaled);
        }
        if self.keys_held.contains(&KeyCode::KeyA) {
            self.camera.move_left(dt_scaled);
        }
        if self.keys_held.contains(&KeyCode::KeyD) {
            self.camera.move_right(dt_scaled);
        }
        if self.keys_held.contains(&KeyCode::KeyE) {
            self.camera.move_forward(dt_scaled);
        }
        if self.keys_held.contains(&KeyCode::KeyQ) {
            self.camera.move_backward(dt_scaled);
        }

        if self.spin {
            if let Some(tilemap) = &mut self.tilemap {
                let t = tilemap.transform_mut();
                t.roll_degrees = (t.roll_degrees + 30.0 * dt) % 360.0;
            }
        }
    }

    fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.keys_held.insert(key);
        } else {
            self.keys_held.remove(&key);
        }

        if !pressed {
            return;
        }

        match key {
            KeyCode::F1 => {
                self.show_panel = !self.show_panel;
            }
            KeyCode::KeyR => {
                let reset = self.default_transform();
                if let Some(tilemap) = &mut self.tilemap {
                    *tilemap.transform_mut() = reset;
                    tracing::info!("transform reset");
                }
            }
            KeyCode::Home => {
                let half_extent =
                    (self.config.grid_size / 2) as f32 * self.config.tile_size as f32;
                let aspect = self.camera.aspect;
                self.camera = FlyCamera::framing(half_extent);
                self.camera.aspect = aspect;
            }
            _ => {}
        }
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        if !self.show_panel {
            return;
        }
        let reset = self.default_transform();
        let Some(tilemap) = &mut self.tilemap else {
            return;
        };

        egui::SidePanel::left("tilemap")
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("Tilemap");
                ui.separator();
                ui.label(format!(
                    "Grid: {0} x {0}  Tiles: {1}",
                    tilemap.grid_size(),
                    tilemap.grid().len()
                ));
                ui.label(format!("Tile size: {}", tilemap.tile_size()));
                ui.label(format!("Instances per draw: {}", tilemap.instance_count()));
                ui.label(format!(
                    "Camera: ({:.1}, {:.1}, {:.1})",
                    self.camera.position.x, self.camera.position.y, self.camera.position.z
                ));
                ui.separator();

                ui.heading("Transform");
                let t = tilemap.transform_mut();
                ui.label("Position:");
                ui.horizontal(|ui| {
                    ui.add(egui::DragValue::new(&mut t.position.x).prefix("X: ").speed(1.0));
                    ui.add(egui::DragValue::new(&mut t.position.y).prefix("Y: ").speed(1.0));
                    ui.add(egui::DragValue::new(&mut t.position.z).prefix("Z: ").speed(1.0));
                });
                ui.add(egui::Slider::new(&mut t.roll_degrees, -180.0..=180.0).text("Roll"));
                ui.label("Scale:");
                ui.horizontal(|ui| {
                    ui.add(egui::DragValue::new(&mut t.scale.x).prefix("X: ").speed(0.1));
                    ui.add(egui::DragValue::new(&mut t.scale.y).prefix("Y: ").speed(0.1));
                });
                ui.checkbox(&mut self.spin, "Spin");
                if ui.button("Reset (R)").clicked() {
                    *t = reset;
                }

                ui.separator();
                ui.small("F1: Toggle Panel | RMB: Look | WASD: Pan | E/Q: Zoom | Home: Reframe");
            });
    }
}

struct GpuApp {
    state: AppState,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    config: Option<wgpu::SurfaceConfiguration>,
    gpu: Option<WgpuContext>,
    egui_ctx: EguiContext,
    egui_winit: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
}

impl GpuApp {
    fn new(config: TilemapConfig) -> Self {
        Self {
            state: AppState::new(config),
            window: None,
            surface: None,
            config: None,
            gpu: None,
            egui_ctx: EguiContext::default(),
            egui_winit: None,
            egui_renderer: None,
        }
    }

    fn draw_egui(&mut self, view: &wgpu::TextureView) {
        let (Some(window), Some(gpu), Some(config), Some(egui_winit), Some(egui_renderer)) = (
            &self.window,
            &self.gpu,
            &self.config,
            &mut self.egui_winit,
            &mut self.egui_renderer,
        ) else {
            return;
        };

        let raw_input = egui_winit.take_egui_input(window);
        let state = &mut self.state;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            state.draw_ui(ctx);
        });
        egui_winit.handle_platform_output(window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [config.width, config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        let (device, queue) = (gpu.device(), gpu.queue());
        for (id, image_delta) in &full_output.textures_delta.set {
            egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("egui_encoder"),
        });
        egui_renderer.update_buffers(device, queue, &mut encoder, &paint_jobs, &screen_descriptor);
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            egui_renderer.free_texture(id);
        }
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("Tilegrid")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).expect("create window"));

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("create surface");

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .expect("find adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("tilegrid_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .expect("create device");

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        self.state.camera.aspect = size.width as f32 / size.height.max(1) as f32;

        let mut gpu = WgpuContext::new(device, queue, surface_format, size.width, size.height);
        match build_tilemap(&mut gpu, &self.state.config) {
            Ok(tilemap) => self.state.tilemap = Some(tilemap),
            Err(e) => {
                tracing::error!("failed to build tilemap: {e:#}");
                event_loop.exit();
                return;
            }
        }

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer =
            egui_wgpu::Renderer::new(gpu.device(), surface_format, None, 1, false);

        self.window = Some(window);
        self.surface = Some(surface);
        self.config = Some(config);
        self.gpu = Some(gpu);
        self.egui_winit = Some(egui_winit);
        self.egui_renderer = Some(egui_renderer);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(egui_winit), Some(window)) = (&mut self.egui_winit, &self.window) {
            let response = egui_winit.on_window_event(window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let (Some(surface), Some(gpu), Some(config)) =
                    (&self.surface, &mut self.gpu, &mut self.config)
                {
                    config.width = new_size.width.max(1);
                    config.height = new_size.height.max(1);
                    surface.configure(gpu.device(), config);
                    self.state.camera.aspect = config.width as f32 / config.height as f32;
                    gpu.resize(config.width, config.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                self.state
                    .handle_key(key, key_state == ElementState::Pressed);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: btn_state,
                ..
            } => {
                self.state.mouse_captured = btn_state == ElementState::Pressed;
                if let Some(window) = &self.window {
                    window.set_cursor_visible(!self.state.mouse_captured);
                }
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.state.last_frame).as_secs_f32().min(0.1);
                self.state.last_frame = now;
                self.state.update(dt);

                let (Some(surface), Some(gpu)) = (&self.surface, &mut self.gpu) else {
                    return;
                };

                let output = match surface.get_current_texture() {
                    Ok(t) => t,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        if let Some(config) = &self.config {
                            surface.configure(gpu.device(), config);
                        }
                        return;
                    }
                    Err(e) => {
                        tracing::error!("surface error: {e}");
                        return;
                    }
                };

                let view = output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());

                if let Some(tilemap) = &mut self.state.tilemap {
                    if let Err(e) = tilemap.render(gpu, &self.state.camera) {
                        tracing::error!("tilemap render failed: {e}");
                    }
                }
                if let Err(e) = gpu.present(&view) {
                    tracing::error!("frame submit failed: {e}");
                }

                self.draw_egui(&view);

                output.present();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.state.mouse_captured {
                self.state.camera.rotate(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = cli.tilemap_config()?;
    tracing::info!(
        grid_size = config.grid_size,
        tile_size = config.tile_size,
        "tilegrid-desktop starting"
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
