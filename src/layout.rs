//! Uniformly scaled, centered grid layouts that fit arbitrary canvas bounds.

use bevy::math::Vec2;

/// Smallest canvas edge for which a fitted grid is guaranteed a positive scale
/// with the default margins.
pub const MIN_CANVAS_EXTENT: f32 = 64.0;

/// Unscaled description of a grid: cell counts plus base item size and gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub columns: u32,
    pub rows: u32,
    pub item_size: f32,
    pub padding: f32,
}

impl GridSpec {
    pub const fn new(columns: u32, rows: u32, item_size: f32, padding: f32) -> Self {
        Self {
            columns,
            rows,
            item_size,
            padding,
        }
    }

    pub fn cell_count(&self) -> u32 {
        self.columns * self.rows
    }

    fn base_extent(&self) -> Vec2 {
        Vec2::new(
            span(self.columns, self.item_size, self.padding),
            span(self.rows, self.item_size, self.padding),
        )
    }
}

fn span(count: u32, item: f32, padding: f32) -> f32 {
    if count == 0 {
        return 0.0;
    }
    count as f32 * item + (count - 1) as f32 * padding
}

/// A grid placed on a concrete canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub scale: f32,
    pub item_size: f32,
    pub padding: f32,
    pub start: Vec2,
    pub total_width: f32,
    pub total_height: f32,
    pub columns: u32,
    pub rows: u32,
}

impl GridLayout {
    /// Fit `spec` inside `canvas` minus `margin` on every side.
    ///
    /// Item size and padding share one scale so cells never distort. When the
    /// canvas leaves no room at all the layout collapses to zero size at the
    /// canvas center.
    pub fn fit(canvas: Vec2, spec: &GridSpec, margin: f32) -> Self {
        let available = Vec2::new(canvas.x - 2.0 * margin, canvas.y - 2.0 * margin);
        let base = spec.base_extent();

        let scale = if available.x <= 0.0 || available.y <= 0.0 || base.x <= 0.0 || base.y <= 0.0
        {
            0.0
        } else {
            (available.x / base.x).min(available.y / base.y)
        };

        let item_size = spec.item_size * scale;
        let padding = spec.padding * scale;
        let total_width = span(spec.columns, item_size, padding).min(available.x.max(0.0));
        let total_height = span(spec.rows, item_size, padding).min(available.y.max(0.0));

        Self {
            scale,
            item_size,
            padding,
            start: Vec2::new(
                (canvas.x - total_width) * 0.5,
                (canvas.y - total_height) * 0.5,
            ),
            total_width,
            total_height,
            columns: spec.columns,
            rows: spec.rows,
        }
    }

    /// Distance between the top-left corners of neighbouring cells.
    pub fn pitch(&self) -> f32 {
        self.item_size + self.padding
    }

    pub fn is_degenerate(&self) -> bool {
        self.item_size <= 0.0
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.start.x
            && point.y >= self.start.y
            && point.x <= self.start.x + self.total_width
            && point.y <= self.start.y + self.total_height
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-3;

    fn assert_close(a: f32, b: f32) {
        let diff = (a - b).abs();
        assert!(diff < 1e-4, "expected {} close to {}", a, b);
    }

    const CONFIGS: [GridSpec; 4] = [
        GridSpec::new(8, 5, 120.0, 16.0),
        GridSpec::new(10, 10, 64.0, 8.0),
        GridSpec::new(10, 10, 56.0, 10.0),
        GridSpec::new(1, 1, 100.0, 0.0),
    ];

    #[test]
    fn fitted_grid_stays_inside_margins_for_many_canvases() {
        let margin = 20.0;
        for spec in CONFIGS.iter() {
            let mut width = MIN_CANVAS_EXTENT;
            while width <= 2600.0 {
                let mut height = MIN_CANVAS_EXTENT;
                while height <= 1800.0 {
                    let layout = GridLayout::fit(Vec2::new(width, height), spec, margin);
                    assert!(layout.scale > 0.0, "scale must be positive for {}x{}", width, height);
                    assert!(layout.total_width + 2.0 * margin <= width + EPSILON);
                    assert!(layout.total_height + 2.0 * margin <= height + EPSILON);
                    height += 37.0;
                }
                width += 53.0;
            }
        }
    }

    #[test]
    fn fitted_grid_is_centered() {
        let spec = GridSpec::new(8, 5, 120.0, 16.0);
        let layout = GridLayout::fit(Vec2::new(1280.0, 720.0), &spec, 24.0);
        let left = layout.start.x;
        let right = 1280.0 - (layout.start.x + layout.total_width);
        let top = layout.start.y;
        let bottom = 720.0 - (layout.start.y + layout.total_height);
        assert_close(left, right);
        assert_close(top, bottom);
    }

    #[test]
    fn scale_is_limited_by_tighter_axis() {
        let spec = GridSpec::new(10, 10, 64.0, 8.0);
        // base extent is 712 on both axes; height is the binding constraint
        let layout = GridLayout::fit(Vec2::new(2000.0, 396.0), &spec, 20.0);
        assert_close(layout.scale, 356.0 / 712.0);
        assert_close(layout.total_height, 356.0);
        assert_close(layout.item_size, 64.0 * layout.scale);
        assert_close(layout.padding, 8.0 * layout.scale);
    }

    #[test]
    fn zero_room_collapses_layout() {
        let spec = GridSpec::new(10, 10, 64.0, 8.0);
        let layout = GridLayout::fit(Vec2::new(30.0, 500.0), &spec, 20.0);
        assert_eq!(layout.scale, 0.0);
        assert!(layout.is_degenerate());
        assert_eq!(layout.total_width, 0.0);
        assert_close(layout.start.x, 15.0);
    }

    #[test]
    fn pitch_is_item_plus_padding() {
        let spec = GridSpec::new(10, 10, 56.0, 10.0);
        let layout = GridLayout::fit(Vec2::new(650.0, 650.0), &spec, 0.0);
        assert_close(layout.scale, 1.0);
        assert_close(layout.pitch(), 66.0);
    }
}
