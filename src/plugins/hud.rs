//! HUD overlay: frame stats, loader state, pick details, and the event log.

use bevy::prelude::*;
use bevy::ui::Node as UiNode;

use crate::plugins::core::{EventLog, HudVisibility};
use crate::plugins::map_view::{HoveredLocation, MapStats, SelectedLocation};

pub struct HudPlugin;

impl Plugin for HudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_hud).add_systems(
            Update,
            (
                update_stats_panel,
                update_pick_panel,
                update_log_panel,
                sync_hud_visibility,
            ),
        );
    }
}

// =============================================================================
// Components
// =============================================================================

/// Every HUD text node, toggled together.
#[derive(Component)]
pub struct HudPanel;

#[derive(Component)]
pub struct StatsText;

#[derive(Component)]
pub struct PickText;

#[derive(Component)]
pub struct LogText;

// =============================================================================
// Formatting
// =============================================================================

pub fn format_stats(stats: &MapStats) -> String {
    let frame = match stats.sample {
        Some(sample) => format!(
            "{:.0} fps | {} entities | t {:.1}s",
            sample.fps, sample.entities, sample.elapsed
        ),
        None => "-- fps".to_string(),
    };
    let loader = if stats.loading_galaxy {
        format!(
            "Regions {} | galaxy loading | queue {}+{}",
            stats.cached_regions, stats.queued, stats.in_flight
        )
    } else {
        format!(
            "Regions {} | queue {}+{}",
            stats.cached_regions, stats.queued, stats.in_flight
        )
    };
    format!(
        "{} | zoom {:.2}{}\n{}\n{}",
        stats.navigation.label(),
        stats.zoom,
        if stats.running { "" } else { " | paused" },
        frame,
        loader
    )
}

pub fn format_pick(selected: &SelectedLocation, hovered: &HoveredLocation) -> String {
    let hover = hovered
        .location
        .as_ref()
        .map(|location| location.label())
        .unwrap_or_else(|| "--".to_string());
    let selection = match (&selected.location, &selected.detail) {
        (_, Some(detail)) => format!("{} {} ({})", detail.coordinate, detail.name, detail.terrain),
        (Some(location), None) => location.label(),
        (None, None) => "--".to_string(),
    };
    format!("Hover: {}\nSelected: {}", hover, selection)
}

pub fn format_log(log: &EventLog) -> String {
    let entries = log.entries();
    if entries.is_empty() {
        return "No events".to_string();
    }
    entries
        .iter()
        .map(|entry| format!("> {}", entry))
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Systems
// =============================================================================

fn spawn_panel(commands: &mut Commands, marker: impl Component, node: UiNode, font_size: f32, color: Color) {
    commands.spawn((
        HudPanel,
        marker,
        Text::new(""),
        TextFont {
            font_size,
            ..default()
        },
        TextColor(color),
        node,
    ));
}

pub fn setup_hud(mut commands: Commands) {
    spawn_panel(
        &mut commands,
        StatsText,
        UiNode {
            position_type: PositionType::Absolute,
            left: Val::Px(14.0),
            top: Val::Px(10.0),
            ..default()
        },
        14.0,
        Color::srgb(0.9, 0.9, 0.95),
    );
    spawn_panel(
        &mut commands,
        PickText,
        UiNode {
            position_type: PositionType::Absolute,
            right: Val::Px(14.0),
            top: Val::Px(10.0),
            ..default()
        },
        14.0,
        Color::srgb(0.82, 0.88, 0.95),
    );
    spawn_panel(
        &mut commands,
        LogText,
        UiNode {
            position_type: PositionType::Absolute,
            left: Val::Px(14.0),
            bottom: Val::Px(10.0),
            ..default()
        },
        12.0,
        Color::srgb(0.6, 0.65, 0.72),
    );
}

pub fn update_stats_panel(stats: Res<MapStats>, mut panel: Query<&mut Text, With<StatsText>>) {
    if let Some(mut text) = panel.iter_mut().next() {
        text.0 = format_stats(&stats);
    }
}

pub fn update_pick_panel(
    selected: Res<SelectedLocation>,
    hovered: Res<HoveredLocation>,
    mut panel: Query<&mut Text, With<PickText>>,
) {
    if let Some(mut text) = panel.iter_mut().next() {
        text.0 = format_pick(&selected, &hovered);
    }
}

pub fn update_log_panel(log: Res<EventLog>, mut panel: Query<&mut Text, With<LogText>>) {
    if let Some(mut text) = panel.iter_mut().next() {
        text.0 = format_log(&log);
    }
}

pub fn sync_hud_visibility(
    hud: Res<HudVisibility>,
    mut panels: Query<&mut Visibility, With<HudPanel>>,
) {
    if !hud.is_changed() {
        return;
    }
    let target = if hud.visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };
    for mut visibility in panels.iter_mut() {
        *visibility = target;
    }
}
