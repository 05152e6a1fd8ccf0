//! Bevy host for the map engine: window size, pointer, keyboard, and time in;
//! gizmos and 2D text out.

use std::task::Poll;

use bevy::log::{debug, info, warn};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::coords::ZoomLevel;
use crate::data::{poll_fetch, FetchFuture, LocationDetail, ProceduralSource};
use crate::errors::{FetchError, MapError};
use crate::plugins::core::{EventLog, InputBindings, MapConfig, NavigationContext};
use crate::plugins::engine::{DrawCommand, DrawList, HudSample, MapEngine};
use crate::plugins::view::{MapLocation, MapNotification, ViewCoordinator};

const FALLBACK_CANVAS: Vec2 = Vec2::new(1280.0, 720.0);
/// Spacing of the scanlines used to fill rectangles with gizmo lines.
const FILL_STEP: f32 = 2.0;
const MAX_FILL_RINGS: u32 = 32;

pub struct MapViewPlugin;

// =============================================================================
// Session
// =============================================================================

/// Engine plus coordinator for the primary window. Lives on the main thread
/// as a non-send resource.
pub struct MapSession {
    pub engine: MapEngine,
    pub coordinator: ViewCoordinator,
    pending_detail: Option<FetchFuture<LocationDetail>>,
}

impl MapSession {
    pub fn new(engine: MapEngine, coordinator: ViewCoordinator) -> Self {
        Self {
            engine,
            coordinator,
            pending_detail: None,
        }
    }

    /// Look up detail for a picked body. A newer pick replaces an older
    /// lookup.
    fn request_detail(&mut self, location: &MapLocation) {
        let Ok(coordinate) = location.coordinate() else {
            return;
        };
        self.pending_detail = Some(self.coordinator.source().location_by_coord(coordinate));
    }

    fn poll_detail(&mut self) -> Option<Result<LocationDetail, FetchError>> {
        let pending = self.pending_detail.as_mut()?;
        match poll_fetch(pending) {
            Poll::Ready(result) => {
                self.pending_detail = None;
                Some(result)
            }
            Poll::Pending => None,
        }
    }
}

impl Drop for MapSession {
    fn drop(&mut self) {
        self.coordinator.destroy();
        self.engine.destroy();
    }
}

// =============================================================================
// Resources
// =============================================================================

#[derive(Resource, Debug, Default)]
pub struct SelectedLocation {
    pub location: Option<MapLocation>,
    pub detail: Option<LocationDetail>,
}

#[derive(Resource, Debug, Default)]
pub struct HoveredLocation {
    pub location: Option<MapLocation>,
}

/// Snapshot of engine and loader state for the HUD.
#[derive(Resource, Debug, Default, Clone)]
pub struct MapStats {
    pub sample: Option<HudSample>,
    pub navigation: NavigationContext,
    pub zoom: f32,
    pub running: bool,
    pub cached_regions: usize,
    pub queued: usize,
    pub in_flight: usize,
    pub loading_galaxy: bool,
}

/// Text entity showing the `slot`-th text command of the draw list. Slots are
/// reused across frames and only spawned or despawned when the count changes.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapText {
    pub slot: usize,
}

impl Plugin for MapViewPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DrawList>()
            .init_resource::<SelectedLocation>()
            .init_resource::<HoveredLocation>()
            .init_resource::<MapStats>()
            .add_systems(Startup, (setup_camera, setup_map_session))
            .add_systems(
                Update,
                (
                    sync_canvas_size,
                    apply_navigation,
                    handle_pointer,
                    handle_pause_input,
                    tick_map,
                    dispatch_notifications,
                    draw_map,
                    flush_draw_list,
                    sync_map_text,
                )
                    .chain(),
            );
    }
}

// =============================================================================
// Setup
// =============================================================================

fn setup_camera(mut commands: Commands) {
    commands.spawn(Camera2d);
}

fn build_session(config: &MapConfig, navigation: NavigationContext, canvas: Vec2) -> MapSession {
    let mut engine = MapEngine::new(canvas.x, canvas.y, config);
    engine.set_sample_handler(Box::new(|sample: &HudSample| {
        debug!(
            "Map frame sample: {:.1} fps, {} entities",
            sample.fps, sample.entities
        );
    }));
    engine.start();

    let source = ProceduralSource::new(config.data_seed, config.star_density);
    let coordinator = ViewCoordinator::new(config.clone(), Box::new(source), navigation);
    MapSession::new(engine, coordinator)
}

fn setup_map_session(world: &mut World) {
    let config = world
        .get_resource::<MapConfig>()
        .cloned()
        .unwrap_or_default();
    let navigation = world
        .get_resource::<NavigationContext>()
        .copied()
        .unwrap_or_default();
    let mut windows = world.query_filtered::<&Window, With<PrimaryWindow>>();
    let canvas = windows
        .single(world)
        .map(|window| Vec2::new(window.width(), window.height()))
        .unwrap_or(FALLBACK_CANVAS);

    info!("Map session starting at {}", navigation.label());
    world.insert_non_send_resource(build_session(&config, navigation, canvas));
}

// =============================================================================
// Input Systems
// =============================================================================

fn sync_canvas_size(
    windows: Query<&Window, With<PrimaryWindow>>,
    session: Option<NonSendMut<MapSession>>,
) {
    let (Some(mut session), Ok(window)) = (session, windows.single()) else {
        return;
    };
    let size = Vec2::new(window.width(), window.height());
    let Ok(canvas) = session.engine.canvas() else {
        return;
    };
    if canvas.size() == size {
        return;
    }
    match session.engine.resize(size.x, size.y) {
        Ok(true) => debug!("Map canvas resized to {}x{}", size.x, size.y),
        Ok(false) => {}
        Err(error) => warn!("Map resize failed: {}", error),
    }
}

fn apply_navigation(
    navigation: Res<NavigationContext>,
    session: Option<NonSendMut<MapSession>>,
) {
    let Some(mut session) = session else {
        return;
    };
    if navigation.is_changed() {
        session.coordinator.navigate(&navigation);
    }
}

fn handle_pointer(
    windows: Query<&Window, With<PrimaryWindow>>,
    mouse: Res<ButtonInput<MouseButton>>,
    session: Option<NonSendMut<MapSession>>,
) {
    let Some(mut session) = session else {
        return;
    };
    let session = &mut *session;
    let cursor = windows.single().ok().and_then(|window| window.cursor_position());

    let result = match cursor {
        Some(cursor) => pointer_at(session, cursor, mouse.just_pressed(MouseButton::Left)),
        None => session.coordinator.pointer_left(&mut session.engine),
    };
    if let Err(error) = result {
        warn!("Map pointer handling failed: {}", error);
    }
}

fn pointer_at(session: &mut MapSession, cursor: Vec2, clicked: bool) -> Result<(), MapError> {
    session.coordinator.pointer_moved(&mut session.engine, cursor)?;
    if clicked {
        session.coordinator.click(&session.engine, cursor)?;
    }
    Ok(())
}

fn handle_pause_input(
    input: Res<ButtonInput<KeyCode>>,
    bindings: Res<InputBindings>,
    session: Option<NonSendMut<MapSession>>,
    mut log: ResMut<EventLog>,
) {
    let Some(mut session) = session else {
        return;
    };
    if !input.just_pressed(bindings.pause) {
        return;
    }
    if session.engine.is_running() {
        session.engine.stop();
        log.push("Map animation paused".to_string());
    } else {
        session.engine.start();
        log.push("Map animation resumed".to_string());
    }
}

// =============================================================================
// Frame Systems
// =============================================================================

fn tick_map(
    time: Res<Time>,
    session: Option<NonSendMut<MapSession>>,
    mut stats: ResMut<MapStats>,
) {
    let Some(mut session) = session else {
        return;
    };
    let session = &mut *session;
    if let Some(sample) = session.engine.tick(time.delta_secs()) {
        stats.sample = Some(sample);
    }
    // The fetch clock keeps running while the animation is paused.
    if let Err(error) = session
        .coordinator
        .update(&mut session.engine, time.elapsed_secs())
    {
        warn!("Map update failed: {}", error);
    }

    stats.navigation = session.coordinator.navigation();
    stats.zoom = session
        .engine
        .viewport()
        .map(|viewport| viewport.scale())
        .unwrap_or(0.0);
    stats.running = session.engine.is_running();
    stats.cached_regions = session.coordinator.regions().len();
    stats.queued = session.coordinator.queue().pending_len();
    stats.in_flight = session.coordinator.queue().in_flight_len();
    stats.loading_galaxy = session.coordinator.is_loading_galaxy();
}

fn dispatch_notifications(
    session: Option<NonSendMut<MapSession>>,
    mut navigation: ResMut<NavigationContext>,
    mut selected: ResMut<SelectedLocation>,
    mut hovered: ResMut<HoveredLocation>,
    mut log: ResMut<EventLog>,
) {
    let Some(mut session) = session else {
        return;
    };

    for notification in session.coordinator.drain_notifications() {
        match notification {
            MapNotification::Select(location) => {
                log.push(format!("Selected {}", location.label()));
                if let Some(next) = location.drill_down() {
                    *navigation = next;
                } else if location.level == ZoomLevel::System {
                    session.request_detail(&location);
                }
                selected.location = Some(location);
                selected.detail = None;
            }
            MapNotification::Hover(location) => {
                hovered.location = location;
            }
            MapNotification::ZoomChanged(scale) => {
                debug!("Map zoom {:.2}", scale);
            }
            MapNotification::ViewChanged(level) => {
                info!("Map showing {}", level.label());
            }
            MapNotification::FetchFailed { key, error } => {
                warn!("Map data for {} unavailable: {}", key, error);
                log.push(format!("Fetch failed: {}", key));
            }
        }
    }

    match session.poll_detail() {
        Some(Ok(detail)) => {
            log.push(format!("{}: {} ({})", detail.coordinate, detail.name, detail.terrain));
            selected.detail = Some(detail);
        }
        Some(Err(error)) => {
            warn!("Location detail failed: {}", error);
            log.push("Location detail unavailable".to_string());
        }
        None => {}
    }
}

fn draw_map(session: Option<NonSend<MapSession>>, mut draw_list: ResMut<DrawList>) {
    let Some(session) = session else {
        return;
    };
    if let Err(error) = session.engine.render(&mut *draw_list) {
        warn!("Map render failed: {}", error);
    }
}

// =============================================================================
// Flush
// =============================================================================

/// Canvas pixels (origin top-left, y down) to world units for a 2D camera
/// centred on the origin.
pub fn canvas_to_world(point: Vec2, canvas: Vec2) -> Vec2 {
    Vec2::new(point.x - canvas.x * 0.5, canvas.y * 0.5 - point.y)
}

fn draw_rect(gizmos: &mut Gizmos, origin: Vec2, size: Vec2, canvas: Vec2, color: Color) {
    let top_left = canvas_to_world(origin, canvas);
    let top_right = canvas_to_world(origin + Vec2::new(size.x, 0.0), canvas);
    let bottom_right = canvas_to_world(origin + size, canvas);
    let bottom_left = canvas_to_world(origin + Vec2::new(0.0, size.y), canvas);
    gizmos.line_2d(top_left, top_right, color);
    gizmos.line_2d(top_right, bottom_right, color);
    gizmos.line_2d(bottom_right, bottom_left, color);
    gizmos.line_2d(bottom_left, top_left, color);
}

fn fill_rect(gizmos: &mut Gizmos, origin: Vec2, size: Vec2, canvas: Vec2, color: Color) {
    let mut y = 0.0;
    while y <= size.y {
        gizmos.line_2d(
            canvas_to_world(origin + Vec2::new(0.0, y), canvas),
            canvas_to_world(origin + Vec2::new(size.x, y), canvas),
            color,
        );
        y += FILL_STEP;
    }
}

fn fill_circle(gizmos: &mut Gizmos, center: Vec2, radius: f32, color: Color) {
    let rings = (radius.ceil() as u32).clamp(1, MAX_FILL_RINGS);
    for ring in 1..=rings {
        gizmos.circle_2d(center, radius * ring as f32 / rings as f32, color);
    }
}

fn flush_draw_list(
    draw_list: Res<DrawList>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut gizmos: Gizmos,
    mut clear_color: ResMut<ClearColor>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let canvas = Vec2::new(window.width(), window.height());

    for command in draw_list.commands() {
        match command {
            DrawCommand::Clear(color) => {
                if clear_color.0 != *color {
                    clear_color.0 = *color;
                }
            }
            DrawCommand::Circle {
                center,
                radius,
                color,
                filled,
            } => {
                let center = canvas_to_world(*center, canvas);
                if *filled {
                    fill_circle(&mut gizmos, center, *radius, *color);
                } else {
                    gizmos.circle_2d(center, *radius, *color);
                }
            }
            DrawCommand::Rect {
                origin,
                size,
                color,
                filled,
            } => {
                if *filled {
                    fill_rect(&mut gizmos, *origin, *size, canvas, *color);
                } else {
                    draw_rect(&mut gizmos, *origin, *size, canvas, *color);
                }
            }
            DrawCommand::Line { start, end, color } => {
                gizmos.line_2d(
                    canvas_to_world(*start, canvas),
                    canvas_to_world(*end, canvas),
                    *color,
                );
            }
            // Text goes through `sync_map_text`.
            DrawCommand::Text { .. } => {}
        }
    }
}

pub fn sync_map_text(
    mut commands: Commands,
    draw_list: Res<DrawList>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut texts: Query<(
        Entity,
        &MapText,
        &mut Text2d,
        &mut TextFont,
        &mut TextColor,
        &mut Transform,
    )>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let canvas = Vec2::new(window.width(), window.height());

    let labels: Vec<(Vec3, &String, f32, Color)> = draw_list
        .commands()
        .iter()
        .filter_map(|command| match command {
            DrawCommand::Text {
                position,
                text,
                size,
                color,
            } => Some((
                canvas_to_world(*position, canvas).extend(1.0),
                text,
                size.max(1.0),
                *color,
            )),
            _ => None,
        })
        .collect();

    let mut filled = vec![false; labels.len()];
    for (entity, marker, mut text, mut font, mut text_color, mut transform) in texts.iter_mut() {
        let Some((translation, label, size, color)) = labels.get(marker.slot) else {
            commands.entity(entity).despawn();
            continue;
        };
        filled[marker.slot] = true;
        if text.0 != **label {
            text.0 = (*label).clone();
        }
        if font.font_size != *size {
            font.font_size = *size;
        }
        if text_color.0 != *color {
            text_color.0 = *color;
        }
        if transform.translation != *translation {
            transform.translation = *translation;
        }
    }

    for (slot, (translation, label, size, color)) in labels.iter().enumerate() {
        if filled[slot] {
            continue;
        }
        commands.spawn((
            MapText { slot },
            Text2d::new((*label).clone()),
            TextFont {
                font_size: *size,
                ..default()
            },
            TextColor(*color),
            Transform::from_translation(*translation),
        ));
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::SystemState;
    use std::time::Duration;

    use futures::future;
    use futures::FutureExt;

    use crate::coords::{grid_cell_center, GridIndex};
    use crate::layout::GridLayout;
    use crate::plugins::engine::Renderer;
    use crate::plugins::view::{LevelView, UniverseView};

    fn session_world(navigation: NavigationContext) -> World {
        let config = MapConfig::default();
        let mut world = World::default();
        world.insert_non_send_resource(build_session(&config, navigation, Vec2::new(800.0, 600.0)));
        world.insert_resource(config);
        world.insert_resource(navigation);
        world.insert_resource(SelectedLocation::default());
        world.insert_resource(HoveredLocation::default());
        world.insert_resource(MapStats::default());
        world.insert_resource(EventLog::default());
        world
    }

    #[test]
    fn canvas_to_world_flips_y_around_center() {
        let canvas = Vec2::new(800.0, 600.0);
        assert_eq!(canvas_to_world(Vec2::new(400.0, 300.0), canvas), Vec2::ZERO);
        assert_eq!(canvas_to_world(Vec2::ZERO, canvas), Vec2::new(-400.0, 300.0));
        assert_eq!(
            canvas_to_world(Vec2::new(800.0, 600.0), canvas),
            Vec2::new(400.0, -300.0)
        );
    }

    #[test]
    fn tick_map_builds_scene_and_fills_stats() {
        let mut world = session_world(NavigationContext::default());
        let mut time = Time::<()>::default();
        time.advance_by(Duration::from_millis(300));
        world.insert_resource(time);

        let mut system_state: SystemState<(
            Res<Time>,
            Option<NonSendMut<MapSession>>,
            ResMut<MapStats>,
        )> = SystemState::new(&mut world);
        let (time, session, stats) = system_state.get_mut(&mut world);
        tick_map(time, session, stats);
        system_state.apply(&mut world);

        let stats = world.resource::<MapStats>();
        assert!(stats.sample.is_some());
        assert!(stats.running);
        assert_eq!(stats.navigation.level, ZoomLevel::Universe);
        assert!(world.non_send_resource::<MapSession>().engine.contains_entity("galaxy:0"));
    }

    #[test]
    fn select_notification_drills_navigation_down() {
        let mut world = session_world(NavigationContext::default());
        {
            let mut session = world.non_send_resource_mut::<MapSession>();
            let session = &mut *session;
            session.coordinator.update(&mut session.engine, 0.0).unwrap();
            let layout = GridLayout::fit(
                Vec2::new(800.0, 600.0),
                &UniverseView.spec(),
                MapConfig::default().margin,
            );
            let cell = grid_cell_center(GridIndex::new(0, 3), &layout);
            session.coordinator.click(&session.engine, cell).unwrap();
        }

        let mut system_state: SystemState<(
            Option<NonSendMut<MapSession>>,
            ResMut<NavigationContext>,
            ResMut<SelectedLocation>,
            ResMut<HoveredLocation>,
            ResMut<EventLog>,
        )> = SystemState::new(&mut world);
        let (session, navigation, selected, hovered, log) = system_state.get_mut(&mut world);
        dispatch_notifications(session, navigation, selected, hovered, log);
        system_state.apply(&mut world);

        let navigation = world.resource::<NavigationContext>();
        assert_eq!(navigation.level, ZoomLevel::Galaxy);
        assert_eq!(navigation.coordinate.galaxy(), 3);
        assert_eq!(
            world.resource::<SelectedLocation>().location.as_ref().map(|l| l.galaxy),
            Some(3)
        );
        assert!(world
            .resource::<EventLog>()
            .entries()
            .iter()
            .any(|entry| entry.starts_with("Selected A03")));
    }

    #[test]
    fn failed_detail_lookup_is_logged() {
        let mut world = session_world(NavigationContext::default());
        {
            let mut session = world.non_send_resource_mut::<MapSession>();
            let failing: FetchFuture<LocationDetail> =
                future::ready(Err(FetchError::NotFound("A00:00:00:00".to_string()))).boxed_local();
            session.pending_detail = Some(failing);
            session.coordinator.drain_notifications();
        }

        let mut system_state: SystemState<(
            Option<NonSendMut<MapSession>>,
            ResMut<NavigationContext>,
            ResMut<SelectedLocation>,
            ResMut<HoveredLocation>,
            ResMut<EventLog>,
        )> = SystemState::new(&mut world);
        let (session, navigation, selected, hovered, log) = system_state.get_mut(&mut world);
        dispatch_notifications(session, navigation, selected, hovered, log);
        system_state.apply(&mut world);

        assert_eq!(
            world.resource::<EventLog>().entries().last().map(String::as_str),
            Some("Location detail unavailable")
        );
        assert!(world.non_send_resource::<MapSession>().pending_detail.is_none());
    }

    #[test]
    fn apply_navigation_follows_context_changes() {
        let mut world = session_world(NavigationContext::default());
        let target = NavigationContext::new(
            ZoomLevel::Region,
            "A02:40:00:00".parse().expect("coordinate"),
        );
        *world.resource_mut::<NavigationContext>() = target;

        let mut system_state: SystemState<(
            Res<NavigationContext>,
            Option<NonSendMut<MapSession>>,
        )> = SystemState::new(&mut world);
        let (navigation, session) = system_state.get_mut(&mut world);
        apply_navigation(navigation, session);
        system_state.apply(&mut world);

        assert_eq!(
            world.non_send_resource::<MapSession>().coordinator.navigation(),
            target
        );
    }

    fn map_texts(world: &mut World) -> Vec<(Entity, usize, String)> {
        let mut query = world.query::<(Entity, &MapText, &Text2d)>();
        let mut texts: Vec<_> = query
            .iter(world)
            .map(|(entity, marker, text)| (entity, marker.slot, text.0.clone()))
            .collect();
        texts.sort_by_key(|(_, slot, _)| *slot);
        texts
    }

    fn run_text_sync(world: &mut World) {
        let mut system_state: SystemState<(
            Commands,
            Res<DrawList>,
            Query<&Window, With<PrimaryWindow>>,
            Query<(
                Entity,
                &MapText,
                &mut Text2d,
                &mut TextFont,
                &mut TextColor,
                &mut Transform,
            )>,
        )> = SystemState::new(world);
        let (commands, draw_list, windows, texts) = system_state.get_mut(world);
        sync_map_text(commands, draw_list, windows, texts);
        system_state.apply(world);
    }

    #[test]
    fn map_text_entities_are_reused_between_frames() {
        let mut world = World::default();
        world.spawn((Window::default(), PrimaryWindow));
        let mut list = DrawList::default();
        list.text(Vec2::new(10.0, 10.0), "A00", 12.0, Color::WHITE);
        list.text(Vec2::new(20.0, 10.0), "A01", 12.0, Color::WHITE);
        world.insert_resource(list);

        run_text_sync(&mut world);
        let first = map_texts(&mut world);
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].2, "A01");

        let mut list = DrawList::default();
        list.text(Vec2::new(10.0, 10.0), "A00", 12.0, Color::WHITE);
        list.text(Vec2::new(20.0, 10.0), "Galaxy A01", 12.0, Color::WHITE);
        world.insert_resource(list);
        run_text_sync(&mut world);
        let second = map_texts(&mut world);
        assert_eq!(second[0].0, first[0].0);
        assert_eq!(second[1].0, first[1].0);
        assert_eq!(second[1].2, "Galaxy A01");

        let mut list = DrawList::default();
        list.text(Vec2::new(10.0, 10.0), "A00", 12.0, Color::WHITE);
        world.insert_resource(list);
        run_text_sync(&mut world);
        let third = map_texts(&mut world);
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].0, first[0].0);
    }
}
