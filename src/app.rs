use crate::components::tools::{SWATCHES, Tool};
use crate::config::AppConfig;
use crate::error::CanvasError;
use crate::service::{HttpRecognitionService, RecognitionResult, RecognitionService};
use crate::session::{CanvasSession, ExportSnapshot, SessionState};
use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions, Vec2};
use image::RgbaImage;
use std::sync::{Arc, mpsc};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// ASYNC SERVICE PIPELINE: background requests with channel completion
// ============================================================================

/// Result delivered from a background service thread.
pub enum ServiceResult {
    Calculated {
        snapshot: ExportSnapshot,
        outcome: Result<Vec<RecognitionResult>, CanvasError>,
    },
    Generated(Result<RgbaImage, CanvasError>),
}

fn full_uv() -> Rect {
    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0))
}

pub struct MathCanvasApp {
    session: CanvasSession,
    service: Option<Arc<HttpRecognitionService>>,
    surface_texture: Option<TextureHandle>,
    /// (revision, size) the texture was last uploaded at.
    uploaded: Option<(u64, (u32, u32))>,
    generated_texture: Option<(Uuid, TextureHandle)>,
    /// Screen position of the surface's top-left pixel.
    canvas_origin: Pos2,
    result_sender: mpsc::Sender<ServiceResult>,
    result_receiver: mpsc::Receiver<ServiceResult>,
    pending_jobs: usize,
    status: Option<String>,
}

impl MathCanvasApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        let mut session = CanvasSession::new(config.canvas_width, config.canvas_height);
        session.set_overlay_step(config.overlay_step());
        session.set_color(config.brush_color());
        session.set_stroke_width(config.stroke_width as i64);

        let (service, status) =
            match HttpRecognitionService::new(&config.service_url, config.request_timeout()) {
                Ok(s) => {
                    tracing::info!("recognition service at {}", s.base_url());
                    (Some(Arc::new(s)), None)
                }
                Err(e) => {
                    tracing::error!("could not create service client: {}", e);
                    (None, Some(e.user_message()))
                }
            };

        let (result_sender, result_receiver) = mpsc::channel();

        Self {
            session,
            service,
            surface_texture: None,
            uploaded: None,
            generated_texture: None,
            canvas_origin: Pos2::ZERO,
            result_sender,
            result_receiver,
            pending_jobs: 0,
            status,
        }
    }

    // ---- service jobs -------------------------------------------------------

    fn start_calculate(&mut self, ctx: &egui::Context) {
        let Some(service) = self.service.clone() else {
            return;
        };
        let snapshot = match self.session.begin_export() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("calculate aborted: {}", e);
                self.status = Some(e.user_message());
                return;
            }
        };
        let sender = self.result_sender.clone();
        let ctx = ctx.clone();
        self.pending_jobs += 1;
        self.status = None;
        rayon::spawn(move || {
            let outcome = service.calculate(&snapshot.request);
            let _ = sender.send(ServiceResult::Calculated { snapshot, outcome });
            ctx.request_repaint();
        });
    }

    fn start_generate(&mut self, ctx: &egui::Context) {
        let Some(service) = self.service.clone() else {
            return;
        };
        let snapshot = match self.session.begin_export() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("generate aborted: {}", e);
                self.status = Some(e.user_message());
                return;
            }
        };
        let sender = self.result_sender.clone();
        let ctx = ctx.clone();
        self.pending_jobs += 1;
        self.status = None;
        rayon::spawn(move || {
            let outcome = service.generate(&snapshot.request);
            let _ = sender.send(ServiceResult::Generated(outcome));
            ctx.request_repaint();
        });
    }

    fn poll_service_results(&mut self) {
        while let Ok(result) = self.result_receiver.try_recv() {
            self.pending_jobs = self.pending_jobs.saturating_sub(1);
            match result {
                ServiceResult::Calculated { snapshot, outcome: Ok(results) } => {
                    if results.is_empty() {
                        self.status = Some("Nothing recognised".to_string());
                    }
                    self.session.complete_recognition(&snapshot, &results);
                }
                ServiceResult::Generated(Ok(image)) => {
                    self.session.complete_generation(image);
                }
                ServiceResult::Calculated { outcome: Err(e), .. } | ServiceResult::Generated(Err(e)) => {
                    tracing::warn!("service request failed: {}", e);
                    self.status = Some(e.user_message());
                }
            }
        }
    }

    // ---- views --------------------------------------------------------------

    fn toolbar(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            if ui.button("Reset").clicked() {
                self.session.reset();
                self.generated_texture = None;
                self.status = None;
            }
            let online = self.service.is_some();
            if ui.add_enabled(online, egui::Button::new("Calculate")).clicked() {
                self.start_calculate(ctx);
            }
            if ui.add_enabled(online, egui::Button::new("Generate")).clicked() {
                self.start_generate(ctx);
            }

            ui.separator();
            let mut width = self.session.settings().stroke_width() as i64;
            if ui
                .add(egui::DragValue::new(&mut width).clamp_range(1..=50).prefix("width "))
                .changed()
            {
                self.session.set_stroke_width(width);
            }

            ui.separator();
            for &tool in Tool::all() {
                let active = self.session.settings().tool() == tool;
                if ui.selectable_label(active, tool.label()).clicked() {
                    self.session.set_tool(tool);
                }
            }

            ui.separator();
            let current = self.session.settings().color();
            for swatch in SWATCHES {
                let (rect, resp) = ui.allocate_exact_size(Vec2::splat(20.0), Sense::click());
                let fill = Color32::from_rgb(swatch[0], swatch[1], swatch[2]);
                ui.painter().circle_filled(rect.center(), 8.0, fill);
                if swatch == current {
                    ui.painter()
                        .circle_stroke(rect.center(), 9.5, Stroke::new(2.0, Color32::LIGHT_BLUE));
                }
                if resp.clicked() {
                    self.session.set_color(swatch);
                }
            }

            if self.pending_jobs > 0 {
                ui.separator();
                ui.spinner();
            }
            if let Some(status) = &self.status {
                ui.separator();
                ui.colored_label(Color32::LIGHT_RED, status.as_str());
            }
        });
    }

    fn sync_surface_texture(&mut self, ctx: &egui::Context) {
        let surface = self.session.surface();
        let key = (surface.revision(), surface.dimensions());
        if self.surface_texture.is_some() && self.uploaded == Some(key) {
            return;
        }
        let (w, h) = surface.dimensions();
        let image = ColorImage::from_rgba_unmultiplied([w as usize, h as usize], surface.as_raw());
        match self.surface_texture.as_mut() {
            Some(texture) => texture.set(image, TextureOptions::NEAREST),
            None => {
                self.surface_texture = Some(ctx.load_texture("surface", image, TextureOptions::NEAREST));
            }
        }
        self.uploaded = Some(key);
    }

    fn canvas_view(&mut self, ui: &mut egui::Ui) {
        let size = ui.available_size();
        self.session
            .resize(size.x.max(1.0) as u32, size.y.max(1.0) as u32);
        let (rect, response) = ui.allocate_exact_size(size, Sense::click_and_drag());
        self.canvas_origin = rect.min;

        self.sync_surface_texture(ui.ctx());
        if let Some(texture) = &self.surface_texture {
            let (sw, sh) = self.session.surface().dimensions();
            let image_rect = Rect::from_min_size(rect.min, Vec2::new(sw as f32, sh as f32));
            ui.painter().image(texture.id(), image_rect, full_uv(), Color32::WHITE);
        }

        let origin = rect.min;
        let local = |p: Pos2| (p.x - origin.x, p.y - origin.y);

        if response.drag_started() {
            if let Some(p) = response.interact_pointer_pos() {
                let (x, y) = local(p);
                self.session.pointer_down(x, y);
            }
        }
        if response.dragged() {
            if let Some(p) = response.interact_pointer_pos() {
                let (x, y) = local(p);
                self.session.pointer_move(x, y);
            }
        }
        if response.drag_released() {
            self.session.pointer_up();
        } else if self.session.state() == SessionState::Drawing {
            let inside = ui
                .ctx()
                .pointer_hover_pos()
                .is_some_and(|p| rect.contains(p));
            if !inside {
                self.session.pointer_leave();
            }
        }
        if response.clicked() {
            if let Some(p) = response.interact_pointer_pos() {
                let (x, y) = local(p);
                self.session.pointer_click(x, y);
            }
        }
    }

    fn text_overlays(&mut self, ctx: &egui::Context) {
        let origin = self.canvas_origin;
        let mut moved = Vec::new();
        for overlay in self.session.overlays() {
            let pos = Pos2::new(origin.x + overlay.position.0, origin.y + overlay.position.1);
            let area = egui::Area::new(egui::Id::new(overlay.id))
                .default_pos(pos)
                .movable(true)
                .order(egui::Order::Foreground)
                .show(ctx, |ui| {
                    egui::Frame::none().inner_margin(8.0).show(ui, |ui| {
                        ui.label(
                            egui::RichText::new(overlay.label())
                                .size(28.0)
                                .color(Color32::WHITE),
                        );
                    });
                });
            if area.response.drag_released() {
                let p = area.response.rect.min;
                moved.push((overlay.id, p.x - origin.x, p.y - origin.y));
            }
        }
        for (id, x, y) in moved {
            self.session.move_overlay(id, x, y);
        }
    }

    fn generated_overlay(&mut self, ctx: &egui::Context) {
        let Some(generated) = self.session.generated_image() else {
            self.generated_texture = None;
            return;
        };
        let id = generated.id;
        let (iw, ih) = generated.image.dimensions();
        let position = generated.position;
        let size = generated.size;

        let stale = self.generated_texture.as_ref().is_none_or(|(tid, _)| *tid != id);
        if stale {
            let image = ColorImage::from_rgba_unmultiplied(
                [iw as usize, ih as usize],
                generated.image.as_raw(),
            );
            let texture = ctx.load_texture(format!("generated_{}", id), image, TextureOptions::LINEAR);
            self.generated_texture = Some((id, texture));
        }
        let Some((_, texture)) = &self.generated_texture else {
            return;
        };
        let texture_id = texture.id();

        let shown = egui::Window::new("Generated")
            .id(egui::Id::new(id))
            .default_pos(Pos2::new(position.0, position.1))
            .default_size(Vec2::new(size.0, size.1))
            .min_width(crate::components::overlays::GENERATED_MIN_SIZE.0)
            .min_height(crate::components::overlays::GENERATED_MIN_SIZE.1)
            .resizable(true)
            .collapsible(false)
            .show(ctx, |ui| {
                let avail = ui.available_size();
                let (rect, _) = ui.allocate_exact_size(avail, Sense::hover());
                if iw > 0 && ih > 0 {
                    let scale = (avail.x / iw as f32).min(avail.y / ih as f32);
                    let fitted =
                        Rect::from_center_size(rect.center(), Vec2::new(iw as f32 * scale, ih as f32 * scale));
                    ui.painter().image(texture_id, fitted, full_uv(), Color32::WHITE);
                }
            });

        if let Some(inner) = shown {
            let r = inner.response.rect;
            self.session.move_generated(r.min.x, r.min.y);
            self.session.resize_generated(r.width(), r.height());
        }
    }
}

impl eframe::App for MathCanvasApp {
    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0, 0.0, 0.0, 1.0]
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // --- Poll async service results ---
        self.poll_service_results();

        // --- Staggered overlay placement ---
        if self.session.poll_overlays() > 0 {
            ctx.request_repaint();
        }
        if let Some(wait) = self.session.next_overlay_in() {
            ctx.request_repaint_after(wait);
        }
        if self.pending_jobs > 0 {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.toolbar(ui, ctx);
        });
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(Color32::BLACK))
            .show(ctx, |ui| {
                self.canvas_view(ui);
            });

        self.text_overlays(ctx);
        self.generated_overlay(ctx);
    }
}
