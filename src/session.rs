//! Drawing session: owns the surface and routes pointer input to the paint
//! algorithms, exports snapshots to the recognition service and places the
//! returned overlays.
//!
//! Everything here runs on the host's single event thread. The only slow
//! step, the service round-trip, happens between [`CanvasSession::begin_export`]
//! (a synchronous snapshot) and [`CanvasSession::complete_recognition`], so the
//! surface is never locked while a request is in flight and strokes drawn in
//! the meantime are not part of that request.

use std::time::Duration;

use image::{Rgba, RgbaImage};
use uuid::Uuid;

use crate::canvas::PixelSurface;
use crate::components::overlays::{
    Clock, DEFAULT_TEXT_ANCHOR, GeneratedImageOverlay, MonotonicClock, OverlayScheduler,
    TextOverlay,
};
use crate::components::tools::{Tool, ToolSettings};
use crate::error::CanvasError;
use crate::ops::bounds::{BoundingBox, painted_bounds};
use crate::ops::fill::{FillOutcome, FillRequest, flood_fill};
use crate::ops::stroke::StrokeRenderer;
use crate::service::{RecognitionRequest, RecognitionResult, RecognitionService, SymbolValues};

/// Default stagger between successive result overlays.
pub const DEFAULT_OVERLAY_STEP: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Drawing,
}

/// Everything captured synchronously for one export.
#[derive(Clone, Debug)]
pub struct ExportSnapshot {
    pub request: RecognitionRequest,
    /// Painted region at snapshot time; `None` for a blank surface.
    pub bounds: Option<BoundingBox>,
    /// Where this export's overlays will be placed.
    pub anchor: (f32, f32),
}

/// The drawing-session aggregate.
pub struct CanvasSession<C: Clock = MonotonicClock> {
    surface: PixelSurface,
    settings: ToolSettings,
    state: SessionState,
    stroke: StrokeRenderer,
    symbol_values: SymbolValues,
    anchor: (f32, f32),
    scheduler: OverlayScheduler,
    overlays: Vec<TextOverlay>,
    generated: Option<GeneratedImageOverlay>,
    overlay_step: Duration,
    clock: C,
}

impl CanvasSession<MonotonicClock> {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_clock(width, height, MonotonicClock::default())
    }
}

impl<C: Clock> CanvasSession<C> {
    pub fn with_clock(width: u32, height: u32, clock: C) -> Self {
        tracing::info!("drawing session created ({}x{})", width, height);
        Self {
            surface: PixelSurface::new(width, height),
            settings: ToolSettings::default(),
            state: SessionState::Idle,
            stroke: StrokeRenderer::new(),
            symbol_values: SymbolValues::new(),
            anchor: DEFAULT_TEXT_ANCHOR,
            scheduler: OverlayScheduler::new(),
            overlays: Vec::new(),
            generated: None,
            overlay_step: DEFAULT_OVERLAY_STEP,
            clock,
        }
    }

    /// Start from an existing image (headless mode).
    pub fn with_surface(surface: PixelSurface, clock: C) -> Self {
        let mut session = Self::with_clock(surface.width(), surface.height(), clock);
        session.surface = surface;
        session
    }

    // ---- accessors ----------------------------------------------------------

    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    pub fn symbol_values(&self) -> &SymbolValues {
        &self.symbol_values
    }

    pub fn anchor(&self) -> (f32, f32) {
        self.anchor
    }

    /// Overlays already placed on screen.
    pub fn overlays(&self) -> &[TextOverlay] {
        &self.overlays
    }

    /// Overlays scheduled but not placed yet.
    pub fn pending_overlays(&self) -> impl Iterator<Item = &TextOverlay> {
        self.scheduler.pending()
    }

    pub fn pending_overlay_count(&self) -> usize {
        self.scheduler.len()
    }

    pub fn generated_image(&self) -> Option<&GeneratedImageOverlay> {
        self.generated.as_ref()
    }

    pub fn set_overlay_step(&mut self, step: Duration) {
        self.overlay_step = step;
    }

    pub fn set_symbol_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.symbol_values.insert(name.into(), value.into());
    }

    // ---- tool inputs --------------------------------------------------------

    /// Switching tools ends any stroke in progress.
    pub fn set_tool(&mut self, tool: Tool) {
        if tool != self.settings.tool() {
            self.finish_stroke();
        }
        self.settings.set_tool(tool);
    }

    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.settings.set_color(color);
    }

    pub fn set_stroke_width(&mut self, width: i64) {
        self.settings.set_stroke_width(width);
    }

    // ---- pointer routing ----------------------------------------------------

    /// Clamp a host pointer position onto the surface rectangle.
    fn clamp_point(&self, x: f32, y: f32) -> (f32, f32) {
        let max_x = (self.surface.width() - 1) as f32;
        let max_y = (self.surface.height() - 1) as f32;
        let fix = |v: f32, max: f32| if v.is_finite() { v.clamp(0.0, max) } else { 0.0 };
        (fix(x, max_x), fix(y, max_y))
    }

    /// `Idle --pointerDown, brush--> Drawing`.
    pub fn pointer_down(&mut self, x: f32, y: f32) {
        if self.settings.tool() != Tool::Brush || self.state != SessionState::Idle {
            return;
        }
        let p = self.clamp_point(x, y);
        self.stroke.begin(p);
        self.state = SessionState::Drawing;
    }

    /// `Drawing --pointerMove, brush--> Drawing`. Returns the repainted box.
    pub fn pointer_move(&mut self, x: f32, y: f32) -> Option<BoundingBox> {
        if self.settings.tool() != Tool::Brush || self.state != SessionState::Drawing {
            return None;
        }
        let p = self.clamp_point(x, y);
        self.stroke
            .extend(&mut self.surface, p, self.settings.color(), self.settings.stroke_width())
    }

    /// `Drawing --pointerUp--> Idle`.
    pub fn pointer_up(&mut self) {
        self.finish_stroke();
    }

    /// `Drawing --pointerLeave--> Idle`.
    pub fn pointer_leave(&mut self) {
        self.finish_stroke();
    }

    fn finish_stroke(&mut self) {
        if self.state == SessionState::Drawing {
            self.stroke.end();
            self.state = SessionState::Idle;
        }
    }

    /// `Idle --pointerClick, fill--> Idle`: one flood fill at the clamped point.
    pub fn pointer_click(&mut self, x: f32, y: f32) -> Option<FillOutcome> {
        if self.settings.tool() != Tool::Fill || self.state != SessionState::Idle {
            return None;
        }
        let (px, py) = self.clamp_point(x, y);
        let request = FillRequest::new(px as i32, py as i32, self.settings.color());
        match flood_fill(&mut self.surface, request) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                // Unreachable after clamping; keep the event loop alive anyway.
                tracing::error!("fill rejected: {}", e);
                None
            }
        }
    }

    // ---- lifecycle ----------------------------------------------------------

    /// Clear the surface, discard overlays and assignments, return to Idle.
    pub fn reset(&mut self) {
        self.stroke.end();
        self.state = SessionState::Idle;
        self.surface.clear();
        self.scheduler.clear();
        self.overlays.clear();
        self.generated = None;
        self.symbol_values.clear();
        self.anchor = DEFAULT_TEXT_ANCHOR;
        tracing::info!("session reset");
    }

    /// Replace the surface with one of the new size, keeping the overlap.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.surface.dimensions() == (width, height) {
            return;
        }
        self.finish_stroke();
        self.surface = self.surface.resized(width, height);
        tracing::info!("surface resized to {}x{}", self.surface.width(), self.surface.height());
    }

    // ---- export -------------------------------------------------------------

    /// Snapshot the surface for a service request.
    ///
    /// The full surface is encoded, not the painted crop. On failure nothing
    /// in the session changes.
    pub fn begin_export(&mut self) -> Result<ExportSnapshot, CanvasError> {
        let bounds = painted_bounds(&self.surface);
        let png = self.surface.to_encoded_image()?;
        if let Some(b) = bounds {
            self.anchor = b.centroid();
        }
        tracing::info!(
            "export snapshot: {} byte PNG, {} symbol(s), content {:?}",
            png.len(),
            self.symbol_values.len(),
            bounds
        );
        Ok(ExportSnapshot {
            request: RecognitionRequest {
                image: crate::io::png_data_url(&png),
                symbol_values: self.symbol_values.clone(),
            },
            bounds,
            anchor: self.anchor,
        })
    }

    /// Apply a calculate response: merge assignments, schedule one overlay
    /// per result at the snapshot's anchor, and clear the surface.
    pub fn complete_recognition(&mut self, snapshot: &ExportSnapshot, results: &[RecognitionResult]) {
        for r in results.iter().filter(|r| r.is_assignment) {
            self.symbol_values.insert(r.expression.clone(), r.result.clone());
        }
        let overlays = results
            .iter()
            .map(|r| TextOverlay::new(r.expression.clone(), r.result.clone(), snapshot.anchor));
        self.scheduler
            .schedule_staggered(self.clock.now(), self.overlay_step, overlays);
        self.surface.clear();
        tracing::info!(
            "recognition returned {} result(s), {} overlay(s) pending",
            results.len(),
            self.scheduler.len()
        );
    }

    /// Show a generated image, replacing any previous one.
    pub fn complete_generation(&mut self, image: RgbaImage) {
        tracing::info!("generated image {}x{}", image.width(), image.height());
        self.generated = Some(GeneratedImageOverlay::new(image));
    }

    /// Snapshot, call the service, and apply the response in one go.
    /// Transport or encoding failures leave the surface untouched.
    pub fn export_for_recognition(
        &mut self,
        service: &dyn RecognitionService,
    ) -> Result<Vec<RecognitionResult>, CanvasError> {
        let snapshot = self.begin_export()?;
        let results = service.calculate(&snapshot.request).inspect_err(|e| {
            tracing::warn!("calculate failed: {}", e);
        })?;
        self.complete_recognition(&snapshot, &results);
        Ok(results)
    }

    /// Snapshot and ask the service for a generated image.
    pub fn export_for_generation(&mut self, service: &dyn RecognitionService) -> Result<(), CanvasError> {
        let snapshot = self.begin_export()?;
        let image = service.generate(&snapshot.request).inspect_err(|e| {
            tracing::warn!("generate failed: {}", e);
        })?;
        self.complete_generation(image);
        Ok(())
    }

    // ---- overlays -----------------------------------------------------------

    /// Place every overlay whose time has come. Returns how many were placed.
    pub fn poll_overlays(&mut self) -> usize {
        let due = self.scheduler.drain_due(self.clock.now());
        let n = due.len();
        for overlay in &due {
            tracing::debug!("placing overlay '{}' at {:?}", overlay.label(), overlay.position);
        }
        self.overlays.extend(due);
        n
    }

    /// Time until the next scheduled overlay, if any.
    pub fn next_overlay_in(&self) -> Option<Duration> {
        self.scheduler
            .next_due()
            .map(|at| at.saturating_sub(self.clock.now()))
    }

    /// Move a placed overlay; its new position becomes the default anchor.
    pub fn move_overlay(&mut self, id: Uuid, x: f32, y: f32) -> bool {
        match self.overlays.iter_mut().find(|o| o.id == id) {
            Some(o) => {
                o.position = (x, y);
                self.anchor = (x, y);
                true
            }
            None => false,
        }
    }

    pub fn move_generated(&mut self, x: f32, y: f32) {
        if let Some(g) = self.generated.as_mut() {
            g.move_to(x, y);
        }
    }

    pub fn resize_generated(&mut self, width: f32, height: f32) {
        if let Some(g) = self.generated.as_mut() {
            g.resize(width, height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::overlays::ManualClock;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn session() -> CanvasSession<ManualClock> {
        CanvasSession::with_clock(32, 32, ManualClock::new())
    }

    #[test]
    fn brush_events_move_between_idle_and_drawing() {
        let mut s = session();
        assert_eq!(s.state(), SessionState::Idle);
        s.pointer_down(2.0, 2.0);
        assert_eq!(s.state(), SessionState::Drawing);
        assert!(s.pointer_move(10.0, 2.0).is_some());
        s.pointer_up();
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.pointer_move(20.0, 20.0).is_none());
        assert_eq!(s.surface().get_pixel(20, 20).unwrap()[3], 0);
    }

    #[test]
    fn events_for_the_other_tool_are_ignored() {
        let mut s = session();
        assert!(s.pointer_click(5.0, 5.0).is_none());
        assert!(s.surface().is_blank());

        s.set_tool(Tool::Fill);
        s.pointer_down(1.0, 1.0);
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.pointer_move(5.0, 5.0).is_none());
        assert!(s.surface().is_blank());
    }

    #[test]
    fn switching_tool_mid_stroke_ends_it() {
        let mut s = session();
        s.pointer_down(1.0, 1.0);
        s.set_tool(Tool::Fill);
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn pointer_coordinates_are_clamped() {
        let mut s = session();
        s.pointer_down(-40.0, 5.0);
        s.pointer_move(-10.0, 5.0);
        assert_eq!(s.surface().get_pixel(0, 5).unwrap(), WHITE);

        s.pointer_up();
        s.set_tool(Tool::Fill);
        let outcome = s.pointer_click(500.0, f32::NAN).unwrap();
        assert!(outcome.painted > 0);
    }

    #[test]
    fn leave_ends_stroke() {
        let mut s = session();
        s.pointer_down(1.0, 1.0);
        s.pointer_leave();
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn blank_export_keeps_previous_anchor() {
        let mut s = session();
        let snap = s.begin_export().unwrap();
        assert_eq!(snap.bounds, None);
        assert_eq!(snap.anchor, DEFAULT_TEXT_ANCHOR);
        assert!(snap.request.image.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn moving_an_overlay_updates_anchor() {
        let clock = ManualClock::new();
        let mut s = CanvasSession::with_clock(16, 16, clock.clone());
        let snap = s.begin_export().unwrap();
        s.complete_recognition(&snap, &[RecognitionResult::new("1+1", "2", false)]);
        clock.advance(Duration::from_secs(1));
        assert_eq!(s.poll_overlays(), 1);
        let id = s.overlays()[0].id;
        assert!(s.move_overlay(id, 40.0, 50.0));
        assert_eq!(s.anchor(), (40.0, 50.0));
        assert!(!s.move_overlay(Uuid::new_v4(), 0.0, 0.0));
    }

    #[test]
    fn resize_migrates_content() {
        let mut s = session();
        s.pointer_down(3.0, 3.0);
        s.pointer_move(3.0, 3.0);
        s.pointer_up();
        s.resize(64, 48);
        assert_eq!(s.surface().dimensions(), (64, 48));
        assert_eq!(s.surface().get_pixel(3, 3).unwrap(), WHITE);
    }
}
