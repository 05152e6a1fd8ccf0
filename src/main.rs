use bevy::prelude::*;

use starmap::plugins;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Starmap".to_string(),
                resolution: (1280, 720).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins((
            plugins::core::CorePlugin,
            plugins::saveload::SaveLoadPlugin,
            plugins::map_view::MapViewPlugin,
            plugins::hud::HudPlugin,
        ))
        .run();
}
