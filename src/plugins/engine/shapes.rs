//! Reusable drawables for map views.

use bevy::color::Srgba;
use bevy::prelude::*;

use super::layers::{Drawable, FrameInfo};
use super::renderer::Renderer;

// =============================================================================
// Grid Pieces
// =============================================================================

/// Square grid cell with a fill and an outline.
#[derive(Debug, Clone)]
pub struct CellTile {
    pub origin: Vec2,
    pub size: Vec2,
    pub fill: Color,
    pub outline: Color,
}

impl Drawable for CellTile {
    fn draw(&self, renderer: &mut dyn Renderer, _frame: &FrameInfo) {
        renderer.fill_rect(self.origin, self.size, self.fill);
        renderer.rect(self.origin, self.size, self.outline);
    }
}

#[derive(Debug, Clone)]
pub struct Label {
    pub position: Vec2,
    pub text: String,
    pub size: f32,
    pub color: Color,
}

impl Drawable for Label {
    fn draw(&self, renderer: &mut dyn Renderer, _frame: &FrameInfo) {
        renderer.text(self.position, &self.text, self.size, self.color);
    }
}

#[derive(Debug, Clone)]
pub struct StarDot {
    pub center: Vec2,
    pub radius: f32,
    pub color: Color,
    pub halo: bool,
}

impl Drawable for StarDot {
    fn draw(&self, renderer: &mut dyn Renderer, _frame: &FrameInfo) {
        renderer.fill_circle(self.center, self.radius, self.color);
        if self.halo {
            renderer.circle(self.center, self.radius * 1.8, self.color);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ring {
    pub center: Vec2,
    pub radius: f32,
    pub color: Color,
}

impl Drawable for Ring {
    fn draw(&self, renderer: &mut dyn Renderer, _frame: &FrameInfo) {
        renderer.circle(self.center, self.radius, self.color);
    }
}

/// Pulsing outline used for hover and selection.
#[derive(Debug, Clone)]
pub enum Highlight {
    Cell { origin: Vec2, size: Vec2, color: Srgba },
    Circle { center: Vec2, radius: f32, color: Srgba },
}

impl Highlight {
    fn pulse(color: Srgba, elapsed: f32) -> Color {
        let alpha = 0.55 + 0.35 * (elapsed * 4.0).sin();
        Color::from(Srgba {
            alpha: color.alpha * alpha,
            ..color
        })
    }
}

impl Drawable for Highlight {
    fn draw(&self, renderer: &mut dyn Renderer, frame: &FrameInfo) {
        match self {
            Highlight::Cell {
                origin,
                size,
                color,
            } => renderer.rect(*origin, *size, Self::pulse(*color, frame.elapsed)),
            Highlight::Circle {
                center,
                radius,
                color,
            } => renderer.circle(*center, *radius, Self::pulse(*color, frame.elapsed)),
        }
    }
}

// =============================================================================
// Starfields
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackdropStar {
    pub position: Vec2,
    pub radius: f32,
    pub color: Color,
}

/// Static field of dim background stars covering the canvas.
#[derive(Debug, Clone)]
pub struct StarfieldBackdrop {
    stars: Vec<BackdropStar>,
}

impl StarfieldBackdrop {
    pub fn generate(size: Vec2, seed: u64) -> Self {
        let mut rng_state = seed;
        let mut next_random = || -> f32 {
            rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let value = (rng_state >> 33) as u32;
            (value as f32) / (u32::MAX as f32)
        };

        // Density scales with canvas area so resizing keeps the same look.
        let area = (size.x * size.y).max(0.0);
        let distant = ((area / 6000.0) as usize).clamp(40, 400);
        let near = distant / 4;

        let mut stars = Vec::with_capacity(distant + near);
        for _ in 0..distant {
            let brightness = 0.3 + next_random() * 0.3;
            stars.push(BackdropStar {
                position: Vec2::new(next_random() * size.x, next_random() * size.y),
                radius: 0.5 + next_random() * 0.5,
                color: Color::srgba(brightness, brightness, brightness * 1.1, 1.0),
            });
        }
        for _ in 0..near {
            let brightness = 0.5 + next_random() * 0.4;
            let blue_tint = next_random() * 0.2;
            stars.push(BackdropStar {
                position: Vec2::new(next_random() * size.x, next_random() * size.y),
                radius: 0.8 + next_random() * 0.7,
                color: Color::srgba(brightness, brightness, brightness + blue_tint, 1.0),
            });
        }
        Self { stars }
    }

    pub fn stars(&self) -> &[BackdropStar] {
        &self.stars
    }
}

impl Drawable for StarfieldBackdrop {
    fn draw(&self, renderer: &mut dyn Renderer, _frame: &FrameInfo) {
        for star in &self.stars {
            renderer.fill_circle(star.position, star.radius, star.color);
        }
    }
}

/// Tiny per-region preview of which systems hold stars.
#[derive(Debug, Clone, Default)]
pub struct MiniStarfield {
    pub dots: Vec<BackdropStar>,
}

impl Drawable for MiniStarfield {
    fn draw(&self, renderer: &mut dyn Renderer, _frame: &FrameInfo) {
        for dot in &self.dots {
            renderer.fill_circle(dot.position, dot.radius, dot.color);
        }
    }
}
