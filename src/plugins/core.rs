use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::coords::{Coordinate, ZoomLevel};
use crate::prefetch::PrefetchConfig;

pub const CONFIG_PATH: &str = "config/map.ron";

pub struct CorePlugin;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub server: char,
    pub data_seed: u64,
    /// Fraction of systems that hold a star.
    pub star_density: f32,
    pub margin: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub sample_interval: f32,
    pub backdrop_seed: u64,
    pub background: [f32; 3],
    /// How far from a body a click may land and still select it when no body
    /// is hit directly.
    pub fallback_hit_distance: f32,
    pub prefetch: PrefetchConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            server: 'A',
            data_seed: 0x5eed_cafe,
            star_density: 0.35,
            margin: 24.0,
            min_scale: 1.0,
            max_scale: 1.0,
            sample_interval: 0.25,
            backdrop_seed: 42,
            background: [0.02, 0.02, 0.04],
            fallback_hit_distance: 40.0,
            prefetch: PrefetchConfig::default(),
        }
    }
}

impl MapConfig {
    pub fn clear_color(&self) -> Color {
        let [red, green, blue] = self.background;
        Color::srgb(red, green, blue)
    }

    pub fn from_ron(contents: &str) -> Result<Self, String> {
        ron::de::from_str::<MapConfig>(contents).map_err(|error| format!("RON parse error: {}", error))
    }
}

pub fn load_map_config() -> Result<Option<MapConfig>, String> {
    let path = Path::new(CONFIG_PATH);

    if !path.exists() {
        return Ok(None);
    }

    match fs::read_to_string(path) {
        Ok(contents) => MapConfig::from_ron(&contents).map(Some),
        Err(error) => Err(format!("Read error: {}", error)),
    }
}

// =============================================================================
// Navigation
// =============================================================================

/// Where the map should be looking. The host owns this; the view
/// coordinator follows it.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationContext {
    pub level: ZoomLevel,
    pub coordinate: Coordinate,
}

impl Default for NavigationContext {
    fn default() -> Self {
        Self {
            level: ZoomLevel::Universe,
            coordinate: Coordinate::default(),
        }
    }
}

impl NavigationContext {
    pub fn new(level: ZoomLevel, coordinate: Coordinate) -> Self {
        Self {
            level,
            coordinate: coordinate.truncated(level),
        }
    }

    /// Universe view on the configured server. An invalid server letter falls
    /// back to the default coordinate.
    pub fn starting_point(config: &MapConfig) -> Self {
        match Coordinate::origin(config.server) {
            Ok(coordinate) => Self::new(ZoomLevel::Universe, coordinate),
            Err(error) => {
                warn!("Map config server ignored: {}", error);
                Self::default()
            }
        }
    }

    /// Step one level up. Returns false at the universe level.
    pub fn zoom_out(&mut self) -> bool {
        let Some(level) = self.level.shallower() else {
            return false;
        };
        *self = Self::new(level, self.coordinate);
        true
    }

    pub fn label(&self) -> String {
        format!(
            "{} {}",
            self.level.label(),
            self.coordinate.prefix_label(self.level)
        )
    }
}

// =============================================================================
// Input / Log
// =============================================================================

#[derive(Resource, Debug, Clone)]
pub struct InputBindings {
    pub zoom_out: KeyCode,
    pub zoom_out_alt: KeyCode,
    pub toggle_hud: KeyCode,
    pub pause: KeyCode,
    pub save: KeyCode,
    pub load: KeyCode,
}

impl Default for InputBindings {
    fn default() -> Self {
        Self {
            zoom_out: KeyCode::Escape,
            zoom_out_alt: KeyCode::Backspace,
            toggle_hud: KeyCode::F3,
            pause: KeyCode::Space,
            save: KeyCode::F5,
            load: KeyCode::F9,
        }
    }
}

#[derive(Resource, Debug)]
pub struct EventLog {
    entries: Vec<String>,
    max_entries: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            max_entries: 8,
        }
    }
}

impl EventLog {
    pub fn push(&mut self, entry: String) {
        self.entries.push(entry);
        if self.entries.len() > self.max_entries {
            let overflow = self.entries.len() - self.max_entries;
            self.entries.drain(0..overflow);
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

#[derive(Resource, Debug)]
pub struct HudVisibility {
    pub visible: bool,
}

impl Default for HudVisibility {
    fn default() -> Self {
        Self { visible: true }
    }
}

impl Plugin for CorePlugin {
    fn build(&self, app: &mut App) {
        let config = match load_map_config() {
            Ok(Some(config)) => {
                info!("Loaded map config from {}", CONFIG_PATH);
                config
            }
            Ok(None) => MapConfig::default(),
            Err(error) => {
                warn!("Map config ignored ({}); using defaults", error);
                MapConfig::default()
            }
        };

        let navigation = NavigationContext::starting_point(&config);
        app.insert_resource(config)
            .insert_resource(InputBindings::default())
            .insert_resource(navigation)
            .init_resource::<EventLog>()
            .init_resource::<HudVisibility>()
            .add_systems(Update, (handle_zoom_out_input, handle_hud_toggle));
    }
}

fn handle_zoom_out_input(
    input: Res<ButtonInput<KeyCode>>,
    bindings: Res<InputBindings>,
    mut navigation: ResMut<NavigationContext>,
    mut log: ResMut<EventLog>,
) {
    if input.just_pressed(bindings.zoom_out) || input.just_pressed(bindings.zoom_out_alt) {
        if navigation.zoom_out() {
            info!("Zoomed out to {}", navigation.label());
            log.push(format!("Zoom out: {}", navigation.label()));
        }
    }
}

fn handle_hud_toggle(
    input: Res<ButtonInput<KeyCode>>,
    bindings: Res<InputBindings>,
    mut hud: ResMut<HudVisibility>,
) {
    if input.just_pressed(bindings.toggle_hud) {
        hud.visible = !hud.visible;
        info!("HUD: {}", if hud.visible { "shown" } else { "hidden" });
    }
}
