// ============================================================================
// OVERLAYS: result labels and generated images layered above the surface
// ============================================================================
//
// Text overlays are not placed the moment a response arrives: each result
// waits `step * (index + 1)` so they appear one after another. Pending
// placements live in an ordered queue that the event loop drains with
// `drain_due(now)`; time comes from a `Clock` so tests can drive it by hand.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use image::RgbaImage;
use uuid::Uuid;

// ---- clocks -----------------------------------------------------------------

/// Monotonic time source, measured from an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock backed by `Instant`.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

// ---- overlay payloads -------------------------------------------------------

/// Anchor used before any export has located painted content.
pub const DEFAULT_TEXT_ANCHOR: (f32, f32) = (10.0, 200.0);

/// One solved expression shown above the canvas.
#[derive(Clone, Debug, PartialEq)]
pub struct TextOverlay {
    pub id: Uuid,
    pub expression: String,
    pub result: String,
    pub position: (f32, f32),
}

impl TextOverlay {
    pub fn new(expression: impl Into<String>, result: impl Into<String>, position: (f32, f32)) -> Self {
        Self {
            id: Uuid::new_v4(),
            expression: expression.into(),
            result: result.into(),
            position,
        }
    }

    /// Text handed to the notation renderer.
    pub fn label(&self) -> String {
        format!("{} = {}", self.expression, self.result)
    }
}

pub const GENERATED_DEFAULT_POSITION: (f32, f32) = (10.0, 10.0);
pub const GENERATED_DEFAULT_SIZE: (f32, f32) = (200.0, 200.0);
pub const GENERATED_MIN_SIZE: (f32, f32) = (100.0, 100.0);

/// Image returned by the generate endpoint; movable and resizable.
#[derive(Clone, Debug)]
pub struct GeneratedImageOverlay {
    pub id: Uuid,
    pub image: RgbaImage,
    pub position: (f32, f32),
    pub size: (f32, f32),
}

impl GeneratedImageOverlay {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            image,
            position: GENERATED_DEFAULT_POSITION,
            size: GENERATED_DEFAULT_SIZE,
        }
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.position = (x, y);
    }

    /// Resize, never below the minimum frame.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.size = (width.max(GENERATED_MIN_SIZE.0), height.max(GENERATED_MIN_SIZE.1));
    }
}

// ---- scheduler --------------------------------------------------------------

#[derive(Clone, Debug)]
struct Scheduled {
    fire_at: Duration,
    overlay: TextOverlay,
}

/// Time-ordered queue of overlays waiting to be placed.
#[derive(Clone, Debug, Default)]
pub struct OverlayScheduler {
    queue: VecDeque<Scheduled>,
}

impl OverlayScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch: overlay `i` fires at `now + step * (i + 1)`.
    /// Entries with equal fire times keep insertion order.
    pub fn schedule_staggered(
        &mut self,
        now: Duration,
        step: Duration,
        overlays: impl IntoIterator<Item = TextOverlay>,
    ) {
        for (i, overlay) in overlays.into_iter().enumerate() {
            let fire_at = now + step * (i as u32 + 1);
            let at = self.queue.partition_point(|s| s.fire_at <= fire_at);
            self.queue.insert(at, Scheduled { fire_at, overlay });
        }
    }

    /// Remove and return every overlay due at or before `now`, in order.
    pub fn drain_due(&mut self, now: Duration) -> Vec<TextOverlay> {
        let due = self.queue.partition_point(|s| s.fire_at <= now);
        self.queue.drain(..due).map(|s| s.overlay).collect()
    }

    /// Fire time of the next pending overlay.
    pub fn next_due(&self) -> Option<Duration> {
        self.queue.front().map(|s| s.fire_at)
    }

    pub fn pending(&self) -> impl Iterator<Item = &TextOverlay> {
        self.queue.iter().map(|s| &s.overlay)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(expr: &str) -> TextOverlay {
        TextOverlay::new(expr, "1", DEFAULT_TEXT_ANCHOR)
    }

    #[test]
    fn staggered_batch_fires_one_per_step() {
        let mut s = OverlayScheduler::new();
        let step = Duration::from_secs(1);
        s.schedule_staggered(Duration::ZERO, step, vec![overlay("a"), overlay("b"), overlay("c")]);
        assert_eq!(s.next_due(), Some(Duration::from_secs(1)));

        assert!(s.drain_due(Duration::from_millis(999)).is_empty());
        let first = s.drain_due(Duration::from_secs(1));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].expression, "a");

        let rest = s.drain_due(Duration::from_secs(5));
        let names: Vec<_> = rest.iter().map(|o| o.expression.as_str()).collect();
        assert_eq!(names, ["b", "c"]);
        assert!(s.is_empty());
    }

    #[test]
    fn later_batches_merge_in_time_order() {
        let mut s = OverlayScheduler::new();
        let step = Duration::from_secs(1);
        s.schedule_staggered(Duration::ZERO, step, vec![overlay("a1"), overlay("a2"), overlay("a3")]);
        s.schedule_staggered(Duration::from_millis(1500), step, vec![overlay("b1")]);
        let order: Vec<_> = s.drain_due(Duration::from_secs(10)).into_iter().map(|o| o.expression).collect();
        assert_eq!(order, ["a1", "a2", "b1", "a3"]);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(Duration::from_millis(250));
        assert_eq!(other.now(), Duration::from_millis(250));
    }

    #[test]
    fn generated_overlay_respects_minimum_size() {
        let mut g = GeneratedImageOverlay::new(RgbaImage::new(4, 4));
        assert_eq!(g.position, GENERATED_DEFAULT_POSITION);
        g.resize(40.0, 300.0);
        assert_eq!(g.size, (100.0, 300.0));
        g.move_to(50.0, 60.0);
        assert_eq!(g.position, (50.0, 60.0));
    }

    #[test]
    fn label_joins_expression_and_result() {
        assert_eq!(TextOverlay::new("x", "5", (0.0, 0.0)).label(), "x = 5");
    }
}
