mod config;
mod yard;

use anyhow::{Context as _, Result};
use clap::Parser;
use config::{AppConfig, Cli};
use egui::Context as EguiContext;
use petyard_github::{
    AvatarLoader, GithubClient, LoadedAvatar, load_contributors, placeholder_avatar,
};
use petyard_render_wgpu::{GpuContext, WgpuRenderer};
use petyard_scene::{Controller, InputEvent};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};
use yard::{Yard, frame_delta_ms, label_card, wheel_delta};

/// Window-bound GPU resources, created on the first `resumed`.
struct Gpu {
    window: Arc<Window>,
    context: GpuContext,
    renderer: WgpuRenderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

struct PetyardApp {
    yard: Yard,
    avatars: AvatarLoader,
    window_config: config::WindowConfig,
    gpu: Option<Gpu>,
    egui_ctx: EguiContext,
    cursor: (f32, f32),
    last_frame: Instant,
}

impl PetyardApp {
    fn create_gpu(&self, event_loop: &ActiveEventLoop) -> Result<Gpu> {
        let attrs = Window::default_attributes()
            .with_title(self.window_config.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.window_config.width,
                self.window_config.height,
            ));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );
        let size = window.inner_size();

        let context = GpuContext::new(window.clone(), size.width, size.height)?;
        let mut renderer = WgpuRenderer::new(
            &context.device,
            &context.queue,
            context.surface_format(),
            size.width,
            size.height,
            &self.yard.scene,
        );

        let placeholder = placeholder_avatar();
        let fallback = renderer.upload_texture(
            &context.device,
            &context.queue,
            placeholder.width(),
            placeholder.height(),
            placeholder.as_raw(),
        );
        renderer.set_fallback_texture(fallback);

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer =
            egui_wgpu::Renderer::new(&context.device, context.surface_format(), None, 1, false);

        tracing::info!(
            backend = context.backend_name(),
            adapter = context.adapter_name(),
            "GPU initialized"
        );

        Ok(Gpu {
            window,
            context,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }

    /// Upload avatars that finished since the last frame and attach them to their pets.
    fn attach_avatars(&mut self) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        for LoadedAvatar { index, avatar } in self.avatars.poll() {
            let (Some(pet), Some(avatar)) = (self.yard.pets.get_mut(index), avatar) else {
                continue;
            };
            let handle = gpu.renderer.upload_texture(
                &gpu.context.device,
                &gpu.context.queue,
                avatar.width(),
                avatar.height(),
                avatar.as_raw(),
            );
            pet.set_avatar(Some(handle));
            tracing::debug!(index, login = pet.login(), "avatar attached");
        }
    }

    fn send_input(&mut self, event: InputEvent) {
        self.yard.camera.handle(&event);
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt_ms = frame_delta_ms((now - self.last_frame).as_secs_f32());
        self.last_frame = now;

        self.attach_avatars();
        self.yard.update(dt_ms);
        self.yard.collect();

        let Some(gpu) = &mut self.gpu else {
            return;
        };
        let Some(output) = gpu.context.acquire() else {
            return;
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let frame = self.yard.frame();
        gpu.renderer
            .render(&gpu.context.device, &gpu.context.queue, &view, &frame);

        let raw_input = gpu.egui_winit.take_egui_input(&gpu.window);
        let yard = &self.yard;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            draw_labels(ctx, yard);
            if yard.show_panel {
                draw_panel(ctx, yard);
            }
        });
        gpu.egui_winit
            .handle_platform_output(&gpu.window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.context.config.width, gpu.context.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        let device = &gpu.context.device;
        let queue = &gpu.context.queue;
        for (id, image_delta) in &full_output.textures_delta.set {
            gpu.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("egui_encoder"),
        });
        gpu.egui_renderer.update_buffers(
            device,
            queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
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
            gpu.egui_renderer
                .render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            gpu.egui_renderer.free_texture(id);
        }

        output.present();
        gpu.window.request_redraw();
    }
}

/// Name cards under each pet, painted behind any panel.
fn draw_labels(ctx: &EguiContext, yard: &Yard) {
    let painter = ctx.layer_painter(egui::LayerId::background());
    let ppp = ctx.pixels_per_point();
    let frame = yard.frame();

    for label in frame.labels {
        let Some(card) = label_card(frame.camera, label) else {
            continue;
        };
        let center = egui::pos2(card.center.x / ppp, card.center.y / ppp);
        let size = egui::vec2(card.size.x / ppp, card.size.y / ppp);
        if size.y < 4.0 {
            continue;
        }
        let rect = egui::Rect::from_center_size(center, size);
        painter.rect_filled(
            rect,
            egui::CornerRadius::same((size.y * 0.125).min(255.0) as u8),
            egui::Color32::from_black_alpha(178),
        );
        painter.text(
            egui::pos2(center.x, rect.top() + size.y * 0.36),
            egui::Align2::CENTER_CENTER,
            &label.title,
            egui::FontId::proportional(size.y * 0.375),
            egui::Color32::WHITE,
        );
        painter.text(
            egui::pos2(center.x, rect.top() + size.y * 0.72),
            egui::Align2::CENTER_CENTER,
            &label.subtitle,
            egui::FontId::proportional(size.y * 0.25),
            egui::Color32::from_gray(0xaa),
        );
    }
}

fn draw_panel(ctx: &EguiContext, yard: &Yard) {
    egui::SidePanel::left("contributors")
        .default_width(240.0)
        .show(ctx, |ui| {
            ui.heading(yard.repo.to_string());
            ui.label(format!("Source: {}", yard.origin.as_str()));
            ui.label(format!(
                "Pets: {} of {} contributors",
                yard.pets.len(),
                yard.contributors.len()
            ));
            ui.separator();

            egui::Grid::new("pet_grid").striped(true).show(ui, |ui| {
                ui.strong("Login");
                ui.strong("Commits");
                ui.strong("Scale");
                ui.end_row();
                for pet in &yard.pets {
                    ui.label(pet.login());
                    ui.label(pet.contributions().to_string());
                    ui.label(format!("{:.2}", pet.scale()));
                    ui.end_row();
                }
            });

            ui.separator();
            let camera = &yard.camera;
            ui.label(format!(
                "Camera: angle {:.2}  pitch {:.2}  distance {:.1}",
                camera.angle,
                camera.pitch(),
                camera.distance()
            ));
            ui.label("Drag to orbit, scroll to zoom. F1 hides this panel.");
        });
}

impl ApplicationHandler for PetyardApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match self.create_gpu(event_loop) {
            Ok(gpu) => {
                let size = gpu.window.inner_size();
                self.yard.camera.attach();
                self.send_input(InputEvent::Resize {
                    width: size.width,
                    height: size.height,
                });
                self.last_frame = Instant::now();
                gpu.window.request_redraw();
                self.gpu = Some(gpu);
            }
            Err(e) => {
                tracing::error!("render initialisation failed: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(gpu) = &mut self.gpu {
            let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                self.yard.camera.detach();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.context.resize(new_size.width, new_size.height);
                    gpu.renderer.resize(
                        &gpu.context.device,
                        gpu.context.config.width,
                        gpu.context.config.height,
                    );
                }
                self.send_input(InputEvent::Resize {
                    width: new_size.width,
                    height: new_size.height,
                });
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match key {
                KeyCode::Escape => {
                    self.yard.camera.detach();
                    event_loop.exit();
                }
                KeyCode::F1 => self.yard.show_panel = !self.yard.show_panel,
                _ => {}
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                self.send_input(InputEvent::PointerMove {
                    x: self.cursor.0,
                    y: self.cursor.1,
                });
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                let event = match state {
                    ElementState::Pressed => InputEvent::PointerDown {
                        x: self.cursor.0,
                        y: self.cursor.1,
                    },
                    ElementState::Released => InputEvent::PointerUp,
                };
                self.send_input(event);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.send_input(InputEvent::Wheel {
                    delta_y: wheel_delta(delta),
                });
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = AppConfig::resolve(&cli)?;
    let repo = config.repo_ref();
    let seed = config.seed.unwrap_or_else(rand::random);
    tracing::info!(%repo, seed, "petyard-desktop starting");

    let client =
        Arc::new(GithubClient::new(config.api_base.clone()).with_token(config.token.clone()));
    let loaded = load_contributors(client.as_ref(), &repo);
    let yard = Yard::new(repo, loaded, config.max_pets, seed);
    let avatars = AvatarLoader::spawn(client, yard.avatar_jobs());

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = PetyardApp {
        yard,
        avatars,
        window_config: config.window,
        gpu: None,
        egui_ctx: EguiContext::default(),
        cursor: (0.0, 0.0),
        last_frame: Instant::now(),
    };
    event_loop.run_app(&mut app)?;

    Ok(())
}
