//! Map engine: canvas, viewport, layered scene graph, and frame ticker.
//!
//! The engine owns no Bevy world state. The host drives it by calling
//! [`MapEngine::tick`] once per frame and [`MapEngine::render`] into any
//! [`Renderer`].

pub mod layers;
pub mod renderer;
pub mod shapes;
pub mod ticker;
pub mod viewport;

use bevy::log::{debug, info};
use bevy::prelude::*;

use crate::errors::MapError;
use crate::plugins::core::MapConfig;

pub use layers::{Drawable, FrameInfo, Layer, LayerKind, SceneGraph};
pub use renderer::{DrawCommand, DrawList, Renderer, ViewportRenderer};
pub use ticker::{HudSample, Ticker};
pub use viewport::{Canvas, Viewport};

pub type SampleHandler = Box<dyn FnMut(&HudSample)>;

struct EngineState {
    canvas: Canvas,
    viewport: Viewport,
    scene: SceneGraph,
    ticker: Ticker,
    sample_handler: Option<SampleHandler>,
}

/// Composition root for a single map canvas.
///
/// Lifecycle is explicit: `start` and `stop` toggle the frame callback and
/// `destroy` releases every layer and entity. After `destroy` the accessors
/// return [`MapError::EngineDestroyed`] and mutators do nothing.
pub struct MapEngine {
    state: Option<EngineState>,
}

impl MapEngine {
    pub fn new(width: f32, height: f32, config: &MapConfig) -> Self {
        let canvas = Canvas::new(Vec2::new(width, height), config.clear_color());
        let viewport = Viewport::new(canvas.size(), config.min_scale, config.max_scale);
        info!(
            "Map engine created ({}x{})",
            canvas.width(),
            canvas.height()
        );
        Self {
            state: Some(EngineState {
                canvas,
                viewport,
                scene: SceneGraph::default(),
                ticker: Ticker::new(config.sample_interval),
                sample_handler: None,
            }),
        }
    }

    fn state(&self) -> Result<&EngineState, MapError> {
        self.state.as_ref().ok_or(MapError::EngineDestroyed)
    }

    fn state_mut(&mut self) -> Result<&mut EngineState, MapError> {
        self.state.as_mut().ok_or(MapError::EngineDestroyed)
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.is_none()
    }

    pub fn canvas(&self) -> Result<&Canvas, MapError> {
        self.state().map(|state| &state.canvas)
    }

    pub fn viewport(&self) -> Result<&Viewport, MapError> {
        self.state().map(|state| &state.viewport)
    }

    pub fn viewport_mut(&mut self) -> Result<&mut Viewport, MapError> {
        self.state_mut().map(|state| &mut state.viewport)
    }

    pub fn layer(&self, kind: LayerKind) -> Result<&Layer, MapError> {
        self.state().map(|state| state.scene.layer(kind))
    }

    pub fn layer_mut(&mut self, kind: LayerKind) -> Result<&mut Layer, MapError> {
        self.state_mut().map(|state| state.scene.layer_mut(kind))
    }

    pub fn entity_count(&self) -> usize {
        self.state
            .as_ref()
            .map_or(0, |state| state.scene.entity_count())
    }

    pub fn contains_entity(&self, id: &str) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.scene.contains(id))
    }

    pub fn is_running(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.ticker.is_running())
    }

    /// Seconds accumulated by the ticker while running.
    pub fn elapsed(&self) -> f32 {
        self.state.as_ref().map_or(0.0, |state| state.ticker.elapsed())
    }

    pub fn frames(&self) -> u64 {
        self.state.as_ref().map_or(0, |state| state.ticker.frames())
    }

    /// Canvas and viewport change together. Returns true when the size changed.
    pub fn resize(&mut self, width: f32, height: f32) -> Result<bool, MapError> {
        let state = self.state_mut()?;
        if !state.canvas.set_size(Vec2::new(width, height)) {
            return Ok(false);
        }
        state.viewport.set_canvas(state.canvas.size());
        debug!(
            "Map canvas resized to {}x{}",
            state.canvas.width(),
            state.canvas.height()
        );
        Ok(true)
    }

    pub fn add_entity(
        &mut self,
        id: impl Into<String>,
        drawable: Box<dyn Drawable>,
        layer: LayerKind,
    ) -> Result<(), MapError> {
        self.state_mut()?.scene.add(id, drawable, layer)
    }

    pub fn replace_entity(
        &mut self,
        id: impl Into<String>,
        drawable: Box<dyn Drawable>,
        layer: LayerKind,
    ) -> Result<(), MapError> {
        self.state_mut()?.scene.replace(id, drawable, layer);
        Ok(())
    }

    pub fn remove_entity(&mut self, id: &str) -> bool {
        self.state
            .as_mut()
            .is_some_and(|state| state.scene.remove(id))
    }

    pub fn clear_layer(&mut self, kind: LayerKind) -> usize {
        self.state
            .as_mut()
            .map_or(0, |state| state.scene.clear_layer(kind))
    }

    pub fn start(&mut self) -> bool {
        let Some(state) = self.state.as_mut() else {
            debug!("Map engine destroyed; start ignored");
            return false;
        };
        let started = state.ticker.start();
        if started {
            info!("Map engine started");
        }
        started
    }

    pub fn stop(&mut self) -> bool {
        let stopped = self
            .state
            .as_mut()
            .is_some_and(|state| state.ticker.stop());
        if stopped {
            info!("Map engine stopped");
        }
        stopped
    }

    pub fn set_sample_handler(&mut self, handler: SampleHandler) {
        if let Some(state) = self.state.as_mut() {
            state.sample_handler = Some(handler);
        }
    }

    /// Advance the frame clock. Fires the sample handler and returns the
    /// sample when a sample interval has elapsed.
    pub fn tick(&mut self, delta: f32) -> Option<HudSample> {
        let state = self.state.as_mut()?;
        let entities = state.scene.entity_count();
        let sample = state.ticker.advance(delta, entities)?;
        if let Some(handler) = state.sample_handler.as_mut() {
            handler(&sample);
        }
        Some(sample)
    }

    /// Background and UI layers are canvas-space; entities and effects go
    /// through the viewport.
    pub fn render(&self, renderer: &mut dyn Renderer) -> Result<(), MapError> {
        let state = self.state()?;
        let frame = FrameInfo {
            elapsed: state.ticker.elapsed(),
            scale: state.viewport.scale(),
        };

        renderer.clear(state.canvas.clear_color);
        state.scene.layer(LayerKind::Background).draw(renderer, &frame);
        {
            let mut world = ViewportRenderer::new(renderer, &state.viewport);
            state.scene.layer(LayerKind::Entities).draw(&mut world, &frame);
            state.scene.layer(LayerKind::Effects).draw(&mut world, &frame);
        }
        state.scene.layer(LayerKind::Ui).draw(renderer, &frame);
        Ok(())
    }

    /// Stop the ticker and drop every layer, entity, and the sample handler.
    /// Returns false when already destroyed.
    pub fn destroy(&mut self) -> bool {
        let Some(mut state) = self.state.take() else {
            return false;
        };
        state.ticker.stop();
        info!(
            "Map engine destroyed ({} entities released)",
            state.scene.entity_count()
        );
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    struct Tracked {
        drops: Rc<Cell<u32>>,
    }

    impl Drawable for Tracked {
        fn draw(&self, renderer: &mut dyn Renderer, _frame: &FrameInfo) {
            renderer.circle(Vec2::new(10.0, 10.0), 1.0, Color::WHITE);
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    fn engine() -> MapEngine {
        MapEngine::new(800.0, 600.0, &MapConfig::default())
    }

    #[test]
    fn start_twice_advances_one_frame_per_tick() {
        let mut engine = engine();
        let calls = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&calls);
        engine.set_sample_handler(Box::new(move |_| counter.set(counter.get() + 1)));

        assert!(engine.start());
        assert!(!engine.start());
        for _ in 0..4 {
            engine.tick(0.0625);
        }
        assert_eq!(engine.frames(), 4);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn stop_without_start_is_noop() {
        let mut engine = engine();
        assert!(!engine.stop());
        assert!(engine.tick(1.0).is_none());
        assert_eq!(engine.frames(), 0);
    }

    #[test]
    fn destroy_twice_tears_down_once() {
        let drops = Rc::new(Cell::new(0));
        let mut engine = engine();
        engine.start();
        engine
            .add_entity(
                "tracked",
                Box::new(Tracked {
                    drops: Rc::clone(&drops),
                }),
                LayerKind::Entities,
            )
            .unwrap();

        assert!(engine.destroy());
        assert_eq!(drops.get(), 1);
        assert!(!engine.destroy());
        assert_eq!(drops.get(), 1);
        assert!(!engine.is_running());
        assert!(!engine.start());
    }

    #[test]
    fn accessors_fail_after_destroy() {
        let mut engine = engine();
        engine.destroy();
        assert_eq!(engine.canvas().unwrap_err(), MapError::EngineDestroyed);
        assert_eq!(engine.viewport().unwrap_err(), MapError::EngineDestroyed);
        assert!(engine.viewport_mut().is_err());
        assert!(engine.layer(LayerKind::Ui).is_err());
        assert!(engine.resize(10.0, 10.0).is_err());
        assert!(engine
            .add_entity("late", Box::new(shapes::Ring {
                center: Vec2::ZERO,
                radius: 1.0,
                color: Color::WHITE,
            }), LayerKind::Ui)
            .is_err());
        assert!(!engine.remove_entity("late"));
        let mut list = DrawList::default();
        assert!(engine.render(&mut list).is_err());
    }

    #[test]
    fn removing_entity_drops_it() {
        let drops = Rc::new(Cell::new(0));
        let mut engine = engine();
        engine
            .add_entity(
                "tracked",
                Box::new(Tracked {
                    drops: Rc::clone(&drops),
                }),
                LayerKind::Effects,
            )
            .unwrap();
        assert!(engine.remove_entity("tracked"));
        assert_eq!(drops.get(), 1);
        assert!(!engine.remove_entity("tracked"));
    }

    #[test]
    fn resize_moves_canvas_and_viewport_together() {
        let mut engine = engine();
        assert!(!engine.resize(800.0, 600.0).unwrap());
        assert!(engine.resize(1000.0, 500.0).unwrap());
        assert_eq!(engine.canvas().unwrap().size(), Vec2::new(1000.0, 500.0));

        engine.viewport_mut().unwrap().recenter(Vec2::new(500.0, 250.0));
        let viewport = engine.viewport().unwrap();
        assert_eq!(viewport.world_to_screen(Vec2::new(500.0, 250.0)), Vec2::new(500.0, 250.0));
    }

    #[test]
    fn render_transforms_world_layers_only() {
        let mut config = MapConfig::default();
        config.min_scale = 0.5;
        config.max_scale = 2.0;
        let mut engine = MapEngine::new(200.0, 200.0, &config);
        {
            let viewport = engine.viewport_mut().unwrap();
            viewport.set_scale(2.0);
        }
        let ring = |radius| {
            Box::new(shapes::Ring {
                center: Vec2::new(110.0, 100.0),
                radius,
                color: Color::WHITE,
            })
        };
        engine.add_entity("ui", ring(1.0), LayerKind::Ui).unwrap();
        engine.add_entity("world", ring(2.0), LayerKind::Entities).unwrap();

        let mut list = DrawList::default();
        engine.render(&mut list).unwrap();
        let circles: Vec<(Vec2, f32)> = list
            .commands()
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Circle { center, radius, .. } => Some((*center, *radius)),
                _ => None,
            })
            .collect();
        assert_eq!(
            circles,
            vec![
                (Vec2::new(120.0, 100.0), 4.0),
                (Vec2::new(110.0, 100.0), 1.0)
            ]
        );
        assert!(matches!(list.commands()[0], DrawCommand::Clear(_)));
    }

    #[test]
    fn sample_handler_sees_entity_count() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut engine = engine();
        engine.set_sample_handler(Box::new(move |sample| sink.borrow_mut().push(sample.entities)));
        engine
            .add_entity("a", Box::new(shapes::Ring {
                center: Vec2::ZERO,
                radius: 1.0,
                color: Color::WHITE,
            }), LayerKind::Ui)
            .unwrap();
        engine.start();
        engine.tick(0.5);
        assert_eq!(*seen.borrow(), vec![1]);
    }
}
