//! Drawing surface abstraction and the recording implementation the Bevy
//! host flushes to gizmos and text each frame.

use bevy::prelude::*;

use super::viewport::Viewport;

pub trait Renderer {
    fn clear(&mut self, color: Color);
    fn circle(&mut self, center: Vec2, radius: f32, color: Color);
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color);
    /// Outline of an axis-aligned rectangle given by its top-left corner.
    fn rect(&mut self, origin: Vec2, size: Vec2, color: Color);
    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Color);
    fn line(&mut self, start: Vec2, end: Vec2, color: Color);
    fn text(&mut self, position: Vec2, text: &str, size: f32, color: Color);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    Circle {
        center: Vec2,
        radius: f32,
        color: Color,
        filled: bool,
    },
    Rect {
        origin: Vec2,
        size: Vec2,
        color: Color,
        filled: bool,
    },
    Line {
        start: Vec2,
        end: Vec2,
        color: Color,
    },
    Text {
        position: Vec2,
        text: String,
        size: f32,
        color: Color,
    },
}

/// Frame's worth of draw calls in canvas pixels (origin top-left, y down).
#[derive(Resource, Debug, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Renderer for DrawList {
    fn clear(&mut self, color: Color) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear(color));
    }

    fn circle(&mut self, center: Vec2, radius: f32, color: Color) {
        self.commands.push(DrawCommand::Circle {
            center,
            radius,
            color,
            filled: false,
        });
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        self.commands.push(DrawCommand::Circle {
            center,
            radius,
            color,
            filled: true,
        });
    }

    fn rect(&mut self, origin: Vec2, size: Vec2, color: Color) {
        self.commands.push(DrawCommand::Rect {
            origin,
            size,
            color,
            filled: false,
        });
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Color) {
        self.commands.push(DrawCommand::Rect {
            origin,
            size,
            color,
            filled: true,
        });
    }

    fn line(&mut self, start: Vec2, end: Vec2, color: Color) {
        self.commands.push(DrawCommand::Line { start, end, color });
    }

    fn text(&mut self, position: Vec2, text: &str, size: f32, color: Color) {
        self.commands.push(DrawCommand::Text {
            position,
            text: text.to_string(),
            size,
            color,
        });
    }
}

/// Applies the viewport transform to world-space draw calls.
pub struct ViewportRenderer<'a> {
    inner: &'a mut dyn Renderer,
    viewport: &'a Viewport,
}

impl<'a> ViewportRenderer<'a> {
    pub fn new(inner: &'a mut dyn Renderer, viewport: &'a Viewport) -> Self {
        Self { inner, viewport }
    }
}

impl Renderer for ViewportRenderer<'_> {
    fn clear(&mut self, color: Color) {
        self.inner.clear(color);
    }

    fn circle(&mut self, center: Vec2, radius: f32, color: Color) {
        let scale = self.viewport.scale();
        self.inner
            .circle(self.viewport.world_to_screen(center), radius * scale, color);
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        let scale = self.viewport.scale();
        self.inner
            .fill_circle(self.viewport.world_to_screen(center), radius * scale, color);
    }

    fn rect(&mut self, origin: Vec2, size: Vec2, color: Color) {
        let scale = self.viewport.scale();
        self.inner
            .rect(self.viewport.world_to_screen(origin), size * scale, color);
    }

    fn fill_rect(&mut self, origin: Vec2, size: Vec2, color: Color) {
        let scale = self.viewport.scale();
        self.inner
            .fill_rect(self.viewport.world_to_screen(origin), size * scale, color);
    }

    fn line(&mut self, start: Vec2, end: Vec2, color: Color) {
        self.inner.line(
            self.viewport.world_to_screen(start),
            self.viewport.world_to_screen(end),
            color,
        );
    }

    fn text(&mut self, position: Vec2, text: &str, size: f32, color: Color) {
        self.inner.text(
            self.viewport.world_to_screen(position),
            text,
            size * self.viewport.scale(),
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_resets_recorded_commands() {
        let mut list = DrawList::default();
        list.circle(Vec2::ZERO, 2.0, Color::WHITE);
        list.clear(Color::BLACK);
        assert_eq!(list.commands(), &[DrawCommand::Clear(Color::BLACK)]);
    }

    #[test]
    fn texts_lists_only_text_commands() {
        let mut list = DrawList::default();
        list.text(Vec2::ZERO, "A03", 12.0, Color::WHITE);
        list.line(Vec2::ZERO, Vec2::ONE, Color::WHITE);
        list.text(Vec2::ONE, "A04", 12.0, Color::WHITE);
        assert_eq!(list.texts().collect::<Vec<_>>(), vec!["A03", "A04"]);
    }

    #[test]
    fn viewport_renderer_scales_and_offsets() {
        let mut viewport = Viewport::new(Vec2::new(200.0, 100.0), 0.5, 2.0);
        viewport.set_scale(2.0);
        viewport.recenter(Vec2::new(50.0, 50.0));

        let mut list = DrawList::default();
        {
            let mut renderer = ViewportRenderer::new(&mut list, &viewport);
            renderer.circle(Vec2::new(60.0, 50.0), 3.0, Color::WHITE);
        }
        assert_eq!(
            list.commands(),
            &[DrawCommand::Circle {
                center: Vec2::new(120.0, 50.0),
                radius: 6.0,
                color: Color::WHITE,
                filled: false,
            }]
        );
    }
}
