//! Z-ordered layers and the entities they own.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::errors::MapError;

use super::renderer::Renderer;

/// Per-frame values handed to every drawable.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameInfo {
    pub elapsed: f32,
    pub scale: f32,
}

/// Anything the engine can draw. Coordinates are world units; the engine
/// applies the viewport before they reach the backend.
pub trait Drawable {
    fn draw(&self, renderer: &mut dyn Renderer, frame: &FrameInfo);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKind {
    Background,
    Entities,
    Effects,
    Ui,
}

impl LayerKind {
    /// Bottom to top.
    pub const ALL: [LayerKind; 4] = [
        LayerKind::Background,
        LayerKind::Entities,
        LayerKind::Effects,
        LayerKind::Ui,
    ];

    pub fn index(self) -> usize {
        match self {
            LayerKind::Background => 0,
            LayerKind::Entities => 1,
            LayerKind::Effects => 2,
            LayerKind::Ui => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LayerKind::Background => "background",
            LayerKind::Entities => "entities",
            LayerKind::Effects => "effects",
            LayerKind::Ui => "ui",
        }
    }
}

// =============================================================================
// Layer
// =============================================================================

pub struct Layer {
    kind: LayerKind,
    pub visible: bool,
    entities: IndexMap<String, Box<dyn Drawable>>,
}

impl Layer {
    fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            visible: true,
            entities: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub(crate) fn draw(&self, renderer: &mut dyn Renderer, frame: &FrameInfo) {
        if !self.visible {
            return;
        }
        for drawable in self.entities.values() {
            drawable.draw(renderer, frame);
        }
    }
}

// =============================================================================
// Scene Graph
// =============================================================================

/// All four layers plus an id → layer index so removal never scans.
pub struct SceneGraph {
    layers: [Layer; 4],
    owners: HashMap<String, LayerKind>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self {
            layers: LayerKind::ALL.map(Layer::new),
            owners: HashMap::new(),
        }
    }
}

impl SceneGraph {
    pub fn layer(&self, kind: LayerKind) -> &Layer {
        &self.layers[kind.index()]
    }

    pub fn layer_mut(&mut self, kind: LayerKind) -> &mut Layer {
        &mut self.layers[kind.index()]
    }

    pub fn entity_count(&self) -> usize {
        self.owners.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.owners.contains_key(id)
    }

    pub fn layer_of(&self, id: &str) -> Option<LayerKind> {
        self.owners.get(id).copied()
    }

    pub fn add(&mut self, id: impl Into<String>, drawable: Box<dyn Drawable>, kind: LayerKind) -> Result<(), MapError> {
        let id = id.into();
        if self.owners.contains_key(&id) {
            return Err(MapError::DuplicateEntity(id));
        }
        self.owners.insert(id.clone(), kind);
        self.layers[kind.index()].entities.insert(id, drawable);
        Ok(())
    }

    /// Swap an existing entity or add a new one, keeping ids unique. An entity
    /// replaced within its own layer keeps its draw position.
    pub fn replace(&mut self, id: impl Into<String>, drawable: Box<dyn Drawable>, kind: LayerKind) {
        let id = id.into();
        if self.owners.get(&id) != Some(&kind) {
            self.remove(&id);
            self.owners.insert(id.clone(), kind);
        }
        self.layers[kind.index()].entities.insert(id, drawable);
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let Some(kind) = self.owners.remove(id) else {
            return false;
        };
        self.layers[kind.index()].entities.shift_remove(id).is_some()
    }

    pub fn clear_layer(&mut self, kind: LayerKind) -> usize {
        let layer = &mut self.layers[kind.index()];
        let removed = layer.entities.len();
        for id in layer.entities.keys() {
            self.owners.remove(id);
        }
        layer.entities.clear();
        removed
    }

    pub fn draw(&self, renderer: &mut dyn Renderer, frame: &FrameInfo) {
        for layer in &self.layers {
            layer.draw(renderer, frame);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
