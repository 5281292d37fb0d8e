mod input;
mod overlay;

use std::sync::Arc;
use egui::{Context, FullOutput, LayerId};
use egui_wgpu::{Renderer, RendererOptions, ScreenDescriptor};
use log::warn;
use web_time::Instant;
use wgpu::{Backends, ExperimentalFeatures, Features, Instance, InstanceDescriptor, MemoryHints, SurfaceError, Trace};
use winit::window::Window;

use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;

use crate::map::config::MapConfig;
use crate::map::network::TransitNetwork;
use crate::map::MapSystem;
pub use input::InputTranslator;

pub struct State {
    pub window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub is_surface_configured: bool,
    pub map: MapSystem,
    input: InputTranslator,
    resize_request: Option<PhysicalSize<u32>>,
    ui_renderer: Renderer,
    egui_ctx: Context,
    egui_state: egui_winit::State,
    egui_output: Option<FullOutput>,
}

impl State {
    pub async fn new(
        window: Arc<Window>,
        map_config: MapConfig,
        network: TransitNetwork,
    ) -> anyhow::Result<Self> {
        let instance = Instance::new(&InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });

        let surface: wgpu::Surface<'_> = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Main Device"),
                required_features: Features::empty(),
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                experimental_features: ExperimentalFeatures::disabled(),
                memory_hints: MemoryHints::Performance,
                trace: Trace::Off,
            })
            .await?;

        let cap: wgpu::SurfaceCapabilities = surface.get_capabilities(&adapter);

        let texture_format = cap
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| cap.formats.first())
            .copied()
            .ok_or_else(|| anyhow::anyhow!("surface is incompatible with the adapter"))?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: texture_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: cap.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let (map_width, map_height) = logical_size(size, window.scale_factor());
        let map = MapSystem::new(&device, texture_format, map_width, map_height, map_config, network);
        log::info!("Surface {}x{} ({:?})", config.width, config.height, texture_format);

        let ui_renderer = Renderer::new(&device, texture_format, RendererOptions {
            msaa_samples: 0,
            depth_stencil_format: None,
            dithering: false,
            predictable_texture_filtering: false,
        });
        let egui_ctx = Context::default();

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            window.as_ref(),
            egui_ctx.native_pixels_per_point(),
            window.theme(),
            None,
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            is_surface_configured: false,
            map,
            input: InputTranslator::new(),
            resize_request: None,
            ui_renderer,
            egui_ctx,
            egui_state,
            egui_output: None,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            if !self.is_surface_configured {
                self.apply_size(width, height);
                self.is_surface_configured = true;
            } else {
                self.resize_request = Some(PhysicalSize::new(width, height));
            }
        }
    }

    fn apply_size(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        let (map_width, map_height) = logical_size(PhysicalSize::new(width, height), self.window.scale_factor());
        self.map.resize(map_width, map_height);
    }

    /// Returns true when the event was consumed (by egui or the map)
    pub fn handle_input(&mut self, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(self.window.as_ref(), event);
        if response.consumed {
            // The pointer is over a panel; the map must not keep a stale hover
            if matches!(event, WindowEvent::CursorMoved { .. }) {
                self.map.clear_hover();
            }
            return true;
        }

        if let WindowEvent::CursorLeft { .. } = event {
            self.map.clear_hover();
        }
        match self.input.translate(event, self.window.scale_factor(), Instant::now()) {
            Some(map_event) => {
                self.map.handle_input(&map_event);
                true
            }
            None => false,
        }
    }

    pub fn update(&mut self) {
        self.map.update(&self.device, &self.queue);

        let input = self.egui_state.take_egui_input(self.window.as_ref());
        let map = &self.map;
        let scale_factor = self.window.scale_factor() as f32;
        let output = self.egui_ctx.run(input, |ctx| {
            let painter = ctx.layer_painter(LayerId::background());
            // Map logical pixels to egui points (differs only under egui zoom)
            let points_per_pixel = scale_factor / ctx.pixels_per_point();
            overlay::paint_scene(&painter, map.scene(), &map.network().stations, points_per_pixel);
            overlay::status_panel(ctx, map);
            overlay::info_panel(ctx, map.highlighted_station());
        });
        self.egui_output = Some(output);
    }

    pub fn render(&mut self) -> Result<(), SurfaceError> {
        self.window.request_redraw();

        if !self.is_surface_configured {
            return Ok(());
        }

        if let Some(PhysicalSize { width, height }) = self.resize_request.take() {
            self.apply_size(width, height)
        }

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(_) => {
                self.surface.configure(&self.device, &self.config);
                self.surface.get_current_texture()?
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });

        let mut egui_frame = None;
        if let Some(output) = self.egui_output.take() {
            let FullOutput {
                platform_output,
                textures_delta,
                shapes,
                pixels_per_point,
                viewport_output
            } = output;

            for _ in viewport_output {
                warn!("Viewport change is not handled!")
            }

            self.egui_state.handle_platform_output(self.window.as_ref(), platform_output);

            for (id, delta) in &textures_delta.set {
                self.ui_renderer.update_texture(&self.device, &self.queue, *id, delta);
            }
            let descriptor = ScreenDescriptor {
                size_in_pixels: [self.config.width, self.config.height],
                pixels_per_point,
            };
            let primitives = self.egui_ctx.tessellate(shapes, pixels_per_point);
            self.ui_renderer.update_buffers(&self.device, &self.queue, &mut encoder, &primitives, &descriptor);
            egui_frame = Some((primitives, descriptor, textures_delta.free));
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.93,
                            g: 0.93,
                            b: 0.91,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            }).forget_lifetime();

            self.map.render(&mut render_pass);

            if let Some((primitives, descriptor, _)) = &egui_frame {
                self.ui_renderer.render(&mut render_pass, primitives, descriptor);
            }
        }

        if let Some((_, _, freed)) = egui_frame {
            for id in freed {
                self.ui_renderer.free_texture(&id)
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        Ok(())
    }
}

/// Window size in the logical pixels the map works in
fn logical_size(size: PhysicalSize<u32>, scale_factor: f64) -> (u32, u32) {
    let logical = size.to_logical::<f64>(scale_factor);
    (
        (logical.width.round() as u32).max(1),
        (logical.height.round() as u32).max(1),
    )
}
