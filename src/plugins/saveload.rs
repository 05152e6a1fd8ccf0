use bevy::prelude::*;

use crate::coords::ZoomLevel;
use crate::plugins::core::{EventLog, InputBindings, NavigationContext};
use std::fs;
use std::path::Path;

pub struct SaveLoadPlugin;

impl Plugin for SaveLoadPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PreStartup, restore_navigation_on_startup)
            .add_systems(Update, (handle_save_request, handle_load_request));
    }
}

const SAVE_PATH: &str = "saves/navigation.ron";

#[derive(serde::Serialize, serde::Deserialize)]
struct SaveNavigation {
    /// Canonical coordinate string, e.g. `A03:17:00:00`.
    coordinate: String,
    level: ZoomLevel,
}

impl SaveNavigation {
    fn from_context(context: &NavigationContext) -> Self {
        Self {
            coordinate: context.coordinate.to_string(),
            level: context.level,
        }
    }

    fn into_context(self) -> Result<NavigationContext, String> {
        let coordinate = self
            .coordinate
            .parse()
            .map_err(|error| format!("Bad coordinate: {}", error))?;
        Ok(NavigationContext::new(self.level, coordinate))
    }
}

fn serialize_navigation(context: &NavigationContext) -> Result<String, String> {
    let config = ron::ser::PrettyConfig::default();
    ron::ser::to_string_pretty(&SaveNavigation::from_context(context), config)
        .map_err(|error| format!("Serialize error: {}", error))
}

fn parse_navigation(contents: &str) -> Result<NavigationContext, String> {
    ron::de::from_str::<SaveNavigation>(contents)
        .map_err(|error| format!("RON parse error: {}", error))?
        .into_context()
}

fn restore_navigation_on_startup(mut navigation: ResMut<NavigationContext>) {
    match load_navigation_from_file() {
        Ok(Some(loaded)) => {
            info!("Restored map position {} from {}", loaded.label(), SAVE_PATH);
            *navigation = loaded;
        }
        Ok(None) => {}
        Err(error) => warn!("Ignoring {}: {}", SAVE_PATH, error),
    }
}

fn handle_save_request(
    input: Res<ButtonInput<KeyCode>>,
    bindings: Res<InputBindings>,
    navigation: Res<NavigationContext>,
    mut log: ResMut<EventLog>,
) {
    if input.just_pressed(bindings.save) {
        match serialize_navigation(&navigation).and_then(|serialized| write_save_file(&serialized)) {
            Ok(()) => {
                info!("Saved map position {} to {}", navigation.label(), SAVE_PATH);
                log.push(format!("Saved {} to {}", navigation.label(), SAVE_PATH));
            }
            Err(error) => {
                error!("Save failed: {}", error);
                log.push(format!("Save failed: {}", error));
            }
        }
    }
}

fn handle_load_request(
    input: Res<ButtonInput<KeyCode>>,
    bindings: Res<InputBindings>,
    mut navigation: ResMut<NavigationContext>,
    mut log: ResMut<EventLog>,
) {
    if input.just_pressed(bindings.load) {
        match load_navigation_from_file() {
            Ok(Some(loaded)) => {
                info!("Loaded map position {} from {}", loaded.label(), SAVE_PATH);
                log.push(format!("Loaded {}", loaded.label()));
                *navigation = loaded;
            }
            Ok(None) => {
                log.push(format!("No save at {}", SAVE_PATH));
            }
            Err(error) => {
                error!("Load failed: {}", error);
                log.push(format!("Load failed: {}", error));
            }
        }
    }
}

fn load_navigation_from_file() -> Result<Option<NavigationContext>, String> {
    let path = Path::new(SAVE_PATH);

    if !path.exists() {
        return Ok(None);
    }

    match fs::read_to_string(path) {
        Ok(contents) => parse_navigation(&contents).map(Some),
        Err(error) => Err(format!("Read error: {}", error)),
    }
}

fn write_save_file(contents: &str) -> Result<(), String> {
    let path = Path::new(SAVE_PATH);
    let dir = path.parent().unwrap_or_else(|| Path::new("saves"));

    if let Err(error) = fs::create_dir_all(dir) {
        return Err(format!("Create dir error: {}", error));
    }

    match fs::write(path, contents) {
        Ok(_) => Ok(()),
        Err(error) => Err(format!("Write error: {}", error)),
    }
}
