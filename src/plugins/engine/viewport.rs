//! Canvas size and the world ↔ screen transform.

use bevy::prelude::*;

use crate::layout::MIN_CANVAS_EXTENT;

pub const DEFAULT_SCALE: f32 = 1.0;

// =============================================================================
// Canvas
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    size: Vec2,
    pub clear_color: Color,
}

impl Canvas {
    pub fn new(size: Vec2, clear_color: Color) -> Self {
        Self {
            size: size.max(Vec2::splat(MIN_CANVAS_EXTENT)),
            clear_color,
        }
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn width(&self) -> f32 {
        self.size.x
    }

    pub fn height(&self) -> f32 {
        self.size.y
    }

    pub(crate) fn set_size(&mut self, size: Vec2) -> bool {
        let size = size.max(Vec2::splat(MIN_CANVAS_EXTENT));
        if size == self.size {
            return false;
        }
        self.size = size;
        true
    }
}

// =============================================================================
// Viewport
// =============================================================================

/// World point `center` lands in the middle of the canvas, and one world unit
/// spans `scale` pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    scale: f32,
    center: Vec2,
    min_scale: f32,
    max_scale: f32,
    canvas: Vec2,
}

impl Viewport {
    pub fn new(canvas: Vec2, min_scale: f32, max_scale: f32) -> Self {
        let min_scale = min_scale.max(f32::EPSILON);
        let max_scale = max_scale.max(min_scale);
        Self {
            scale: DEFAULT_SCALE.clamp(min_scale, max_scale),
            center: canvas * 0.5,
            min_scale,
            max_scale,
            canvas,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn scale_bounds(&self) -> (f32, f32) {
        (self.min_scale, self.max_scale)
    }

    /// Clamp and apply `scale`. Returns true when the effective scale changed.
    pub fn set_scale(&mut self, scale: f32) -> bool {
        let clamped = scale.clamp(self.min_scale, self.max_scale);
        if (clamped - self.scale).abs() <= f32::EPSILON {
            return false;
        }
        self.scale = clamped;
        true
    }

    pub fn recenter(&mut self, center: Vec2) {
        self.center = center;
    }

    /// Back to the default scale, centred on the canvas. Returns true when the
    /// scale changed.
    pub fn reset(&mut self) -> bool {
        self.center = self.canvas * 0.5;
        self.set_scale(DEFAULT_SCALE)
    }

    pub(crate) fn set_canvas(&mut self, canvas: Vec2) {
        self.canvas = canvas;
    }

    pub fn world_to_screen(&self, point: Vec2) -> Vec2 {
        (point - self.center) * self.scale + self.canvas * 0.5
    }

    pub fn screen_to_world(&self, point: Vec2) -> Vec2 {
        (point - self.canvas * 0.5) / self.scale + self.center
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Vec2, expected: Vec2) {
        assert!(
            (actual - expected).length() < 1e-4,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn default_viewport_is_identity() {
        let viewport = Viewport::new(Vec2::new(800.0, 600.0), 1.0, 1.0);
        let point = Vec2::new(123.0, 45.0);
        assert_close(viewport.world_to_screen(point), point);
        assert_close(viewport.screen_to_world(point), point);
    }

    #[test]
    fn scale_is_clamped_to_bounds() {
        let mut viewport = Viewport::new(Vec2::new(800.0, 600.0), 0.5, 2.0);
        assert!(viewport.set_scale(10.0));
        assert_eq!(viewport.scale(), 2.0);
        assert!(!viewport.set_scale(3.0));
        assert!(viewport.set_scale(0.1));
        assert_eq!(viewport.scale(), 0.5);
    }

    #[test]
    fn pinned_scale_never_changes() {
        let mut viewport = Viewport::new(Vec2::new(800.0, 600.0), 1.0, 1.0);
        assert!(!viewport.set_scale(4.0));
        assert_eq!(viewport.scale(), 1.0);
    }

    #[test]
    fn screen_to_world_inverts_world_to_screen() {
        let mut viewport = Viewport::new(Vec2::new(640.0, 480.0), 0.25, 4.0);
        viewport.set_scale(1.75);
        viewport.recenter(Vec2::new(-40.0, 90.0));
        let world = Vec2::new(12.5, -33.0);
        assert_close(viewport.screen_to_world(viewport.world_to_screen(world)), world);
    }

    #[test]
    fn reset_restores_default_scale_and_center() {
        let mut viewport = Viewport::new(Vec2::new(400.0, 200.0), 0.5, 2.0);
        viewport.set_scale(2.0);
        viewport.recenter(Vec2::ZERO);
        assert!(viewport.reset());
        assert_eq!(viewport.scale(), DEFAULT_SCALE);
        assert_eq!(viewport.center(), Vec2::new(200.0, 100.0));
    }

    #[test]
    fn canvas_never_shrinks_below_minimum() {
        let mut canvas = Canvas::new(Vec2::new(10.0, 500.0), Color::BLACK);
        assert_eq!(canvas.size(), Vec2::new(MIN_CANVAS_EXTENT, 500.0));
        assert!(!canvas.set_size(Vec2::new(0.0, 500.0)));
        assert!(canvas.set_size(Vec2::new(300.0, 200.0)));
    }
}
