//! Zoom-level state machine that turns a navigation target into entities on
//! the engine, streams the data each level needs, and answers pointer hits.

mod galaxy;
pub mod orbits;
mod region;
mod system;
mod universe;

use std::collections::HashSet;
use std::task::Poll;

use bevy::log::{debug, info, warn};
use bevy::color::Srgba;
use bevy::prelude::*;

use crate::coords::{Coordinate, ZoomLevel, REGION_COUNT};
use crate::data::{poll_fetch, FetchFuture, MapDataSource, SystemBodies};
use crate::errors::{FetchError, MapError};
use crate::layout::{GridLayout, GridSpec};
use crate::plugins::core::{MapConfig, NavigationContext};
use crate::plugins::engine::shapes::{Label, StarfieldBackdrop};
use crate::plugins::engine::{Drawable, LayerKind, MapEngine};
use crate::prefetch::{GalaxyPrefetch, PrefetchEvent, QueueTask, SummaryPrefetchQueue};
use crate::summaries::{region_key, system_key, RegionSummaryCache, SystemBodyCache};

pub use galaxy::GalaxyView;
pub use region::RegionView;
pub use system::SystemView;
pub use universe::UniverseView;

pub(crate) const BACKDROP_ID: &str = "backdrop";
pub(crate) const TITLE_ID: &str = "title";
pub(crate) const HOVER_ID: &str = "hover";

pub(crate) const LABEL_COLOR: Color = Color::srgba(0.75, 0.82, 0.92, 0.9);
pub(crate) const HOVER_COLOR: Srgba = Srgba::new(0.45, 0.85, 1.0, 1.0);
pub(crate) const SELECT_COLOR: Srgba = Srgba::new(1.0, 0.8, 0.35, 1.0);

// =============================================================================
// Host-Facing Types
// =============================================================================

/// Something the pointer picked. `level` is the level it was picked at, so a
/// galaxy picked on the universe map has `level == Universe`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapLocation {
    pub level: ZoomLevel,
    pub server: char,
    pub galaxy: u8,
    pub region: Option<u8>,
    pub system: Option<u8>,
    pub body: Option<u8>,
    pub x: Option<f32>,
    pub y: Option<f32>,
}

impl MapLocation {
    pub fn galaxy(server: char, galaxy: u8) -> Self {
        Self {
            level: ZoomLevel::Universe,
            server,
            galaxy,
            region: None,
            system: None,
            body: None,
            x: None,
            y: None,
        }
    }

    pub fn region(server: char, galaxy: u8, region: u8) -> Self {
        Self {
            level: ZoomLevel::Galaxy,
            region: Some(region),
            ..Self::galaxy(server, galaxy)
        }
    }

    pub fn system(server: char, galaxy: u8, region: u8, system: u8) -> Self {
        Self {
            level: ZoomLevel::Region,
            system: Some(system),
            ..Self::region(server, galaxy, region)
        }
    }

    pub fn body(server: char, galaxy: u8, region: u8, system: u8, body: u8) -> Self {
        Self {
            level: ZoomLevel::System,
            body: Some(body),
            ..Self::system(server, galaxy, region, system)
        }
    }

    pub fn at(mut self, point: Vec2) -> Self {
        self.x = Some(point.x);
        self.y = Some(point.y);
        self
    }

    /// Same picked object, wherever the pointer was.
    pub fn same_target(&self, other: &MapLocation) -> bool {
        self.level == other.level
            && self.server == other.server
            && self.galaxy == other.galaxy
            && self.region == other.region
            && self.system == other.system
            && self.body == other.body
    }

    pub fn coordinate(&self) -> Result<Coordinate, MapError> {
        Coordinate::new(
            self.server,
            self.galaxy,
            self.region.unwrap_or(0),
            self.system.unwrap_or(0),
            self.body.unwrap_or(0),
        )
    }

    /// Navigation target one level below the pick, or `None` for bodies.
    pub fn drill_down(&self) -> Option<NavigationContext> {
        let level = self.level.deeper()?;
        let coordinate = self.coordinate().ok()?;
        Some(NavigationContext::new(level, coordinate))
    }

    pub fn label(&self) -> String {
        match self.coordinate() {
            Ok(coordinate) => coordinate.prefix_label(self.level),
            Err(_) => format!("{}{:02}", self.server, self.galaxy),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapNotification {
    Select(MapLocation),
    Hover(Option<MapLocation>),
    ZoomChanged(f32),
    ViewChanged(ZoomLevel),
    FetchFailed { key: String, error: FetchError },
}

// =============================================================================
// Level Views
// =============================================================================

/// Everything a level view may read while building or hit-testing.
pub struct ViewContext<'a> {
    pub coordinate: Coordinate,
    pub canvas: Vec2,
    pub elapsed: f32,
    pub config: &'a MapConfig,
    pub regions: &'a RegionSummaryCache,
    pub bodies: Option<&'a SystemBodies>,
}

pub trait LevelView {
    fn spec(&self) -> GridSpec;

    /// The one place a view's grid is fitted. Build, refresh, hover, and
    /// click all receive the layout this returns.
    fn layout(&self, ctx: &ViewContext) -> GridLayout {
        GridLayout::fit(ctx.canvas, &self.spec(), ctx.config.margin)
    }

    fn title(&self, ctx: &ViewContext) -> String;

    fn build(&self, ctx: &ViewContext, layout: &GridLayout, engine: &mut MapEngine) -> Result<(), MapError>;

    /// Redraw overlays for regions whose summaries changed.
    fn refresh_regions(
        &self,
        _ctx: &ViewContext,
        _layout: &GridLayout,
        _engine: &mut MapEngine,
        _regions: &[u8],
    ) -> Result<(), MapError> {
        Ok(())
    }

    fn hit_test(&self, ctx: &ViewContext, layout: &GridLayout, point: Vec2) -> Option<MapLocation>;

    fn highlight(
        &self,
        ctx: &ViewContext,
        layout: &GridLayout,
        location: &MapLocation,
    ) -> Option<Box<dyn Drawable>>;
}

pub fn view_for(level: ZoomLevel) -> &'static dyn LevelView {
    match level {
        ZoomLevel::Universe => &UniverseView,
        ZoomLevel::Galaxy => &GalaxyView,
        ZoomLevel::Region => &RegionView,
        ZoomLevel::System => &SystemView,
    }
}

// =============================================================================
// Coordinator
// =============================================================================

struct BodyFetch {
    key: String,
    fetch: FetchFuture<SystemBodies>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DrawnScene {
    level: ZoomLevel,
    coordinate: Coordinate,
    canvas: Vec2,
    region_version: u64,
    bodies_settled: bool,
}

pub struct ViewCoordinator {
    config: MapConfig,
    source: Box<dyn MapDataSource>,
    level: ZoomLevel,
    coordinate: Coordinate,
    regions: RegionSummaryCache,
    bodies: SystemBodyCache,
    body_failures: HashSet<String>,
    queue: SummaryPrefetchQueue,
    galaxy_prefetch: Option<GalaxyPrefetch>,
    body_fetch: Option<BodyFetch>,
    drawn: Option<DrawnScene>,
    hovered: Option<MapLocation>,
    notifications: Vec<MapNotification>,
    destroyed: bool,
}

impl ViewCoordinator {
    pub fn new(config: MapConfig, source: Box<dyn MapDataSource>, start: NavigationContext) -> Self {
        let queue = SummaryPrefetchQueue::new(config.prefetch.clone());
        let mut coordinator = Self {
            config,
            source,
            level: start.level,
            coordinate: start.coordinate.truncated(start.level),
            regions: RegionSummaryCache::default(),
            bodies: SystemBodyCache::default(),
            body_failures: HashSet::new(),
            queue,
            galaxy_prefetch: None,
            body_fetch: None,
            drawn: None,
            hovered: None,
            notifications: Vec::new(),
            destroyed: false,
        };
        coordinator.request_level_data();
        coordinator.notify(MapNotification::ViewChanged(start.level));
        coordinator
    }

    pub fn level(&self) -> ZoomLevel {
        self.level
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    pub fn navigation(&self) -> NavigationContext {
        NavigationContext::new(self.level, self.coordinate)
    }

    pub fn regions(&self) -> &RegionSummaryCache {
        &self.regions
    }

    pub fn bodies(&self) -> &SystemBodyCache {
        &self.bodies
    }

    pub fn queue(&self) -> &SummaryPrefetchQueue {
        &self.queue
    }

    pub fn source(&self) -> &dyn MapDataSource {
        self.source.as_ref()
    }

    pub fn hovered(&self) -> Option<&MapLocation> {
        self.hovered.as_ref()
    }

    pub fn is_loading_galaxy(&self) -> bool {
        self.galaxy_prefetch.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn drain_notifications(&mut self) -> Vec<MapNotification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, notification: MapNotification) {
        if !self.destroyed {
            self.notifications.push(notification);
        }
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    pub fn navigate_to_universe(&mut self) -> bool {
        self.enter(ZoomLevel::Universe, self.coordinate)
    }

    pub fn navigate_to_galaxy(&mut self, galaxy: u8) -> Result<bool, MapError> {
        let coordinate = Coordinate::new(self.coordinate.server(), galaxy, 0, 0, 0)?;
        Ok(self.enter(ZoomLevel::Galaxy, coordinate))
    }

    pub fn navigate_to_region(&mut self, galaxy: u8, region: u8) -> Result<bool, MapError> {
        let coordinate = Coordinate::new(self.coordinate.server(), galaxy, region, 0, 0)?;
        Ok(self.enter(ZoomLevel::Region, coordinate))
    }

    pub fn navigate_to_system(&mut self, galaxy: u8, region: u8, system: u8) -> Result<bool, MapError> {
        let coordinate = Coordinate::new(self.coordinate.server(), galaxy, region, system, 0)?;
        Ok(self.enter(ZoomLevel::System, coordinate))
    }

    pub fn navigate(&mut self, context: &NavigationContext) -> bool {
        self.enter(context.level, context.coordinate)
    }

    /// One level up. Returns false at the universe level.
    pub fn zoom_out(&mut self) -> bool {
        match self.level.shallower() {
            Some(level) => self.enter(level, self.coordinate),
            None => false,
        }
    }

    fn enter(&mut self, level: ZoomLevel, coordinate: Coordinate) -> bool {
        if self.destroyed {
            return false;
        }
        let coordinate = coordinate.truncated(level);
        if self.level == level && self.coordinate == coordinate {
            return false;
        }

        self.level = level;
        self.coordinate = coordinate;
        self.request_level_data();
        if self.hovered.take().is_some() {
            self.notify(MapNotification::Hover(None));
        }
        self.drawn = None;

        info!(
            "Map view: {} {}",
            level.label(),
            coordinate.prefix_label(level)
        );
        self.notify(MapNotification::ViewChanged(level));
        true
    }

    fn request_level_data(&mut self) {
        if self.level >= ZoomLevel::Galaxy {
            self.ensure_galaxy();
        }
        if self.level >= ZoomLevel::Region {
            self.ensure_region(self.coordinate.region(), true);
        }
        if self.level == ZoomLevel::System {
            self.ensure_bodies();
        }
    }

    fn ensure_galaxy(&mut self) {
        let server = self.coordinate.server();
        let galaxy = self.coordinate.galaxy();
        self.queue.retain_galaxy(server, galaxy);

        if let Some(loader) = &self.galaxy_prefetch {
            if loader.server() == server && loader.galaxy() == galaxy {
                return;
            }
            debug!(
                "Dropping bulk prefetch for {}{}",
                loader.server(),
                loader.galaxy()
            );
            self.galaxy_prefetch = None;
        }

        let complete = (0..REGION_COUNT).all(|region| {
            let key = region_key(server, galaxy, region);
            self.regions.is_complete(&key) || self.queue.is_tracked(&key)
        });
        if !complete {
            self.galaxy_prefetch = Some(GalaxyPrefetch::start(server, galaxy, self.source.as_ref()));
        }
    }

    fn ensure_region(&mut self, region: u8, priority: bool) {
        let server = self.coordinate.server();
        let galaxy = self.coordinate.galaxy();
        if self.regions.is_complete(&region_key(server, galaxy, region)) {
            return;
        }
        let task = QueueTask::new(server, galaxy, region);
        self.queue.enqueue(if priority { task.prioritized() } else { task });
    }

    fn ensure_bodies(&mut self) {
        let coordinate = self.coordinate;
        let key = system_key(
            coordinate.server(),
            coordinate.galaxy(),
            coordinate.region(),
            coordinate.system(),
        );
        if self.bodies.contains(&key) {
            return;
        }
        if self.body_fetch.as_ref().is_some_and(|pending| pending.key == key) {
            return;
        }
        self.body_failures.remove(&key);
        let fetch = self.source.system_bodies(
            coordinate.server(),
            coordinate.galaxy(),
            coordinate.region(),
            coordinate.system(),
        );
        self.body_fetch = Some(BodyFetch { key, fetch });
    }

    fn current_system_key(&self) -> String {
        system_key(
            self.coordinate.server(),
            self.coordinate.galaxy(),
            self.coordinate.region(),
            self.coordinate.system(),
        )
    }

    fn current_region_key(&self) -> String {
        region_key(
            self.coordinate.server(),
            self.coordinate.galaxy(),
            self.coordinate.region(),
        )
    }

    // -------------------------------------------------------------------------
    // Frame Update
    // -------------------------------------------------------------------------

    /// Pump every outstanding fetch, then bring the engine's entities in line
    /// with the current level, coordinate, canvas, and cached data.
    pub fn update(&mut self, engine: &mut MapEngine, now: f32) -> Result<(), MapError> {
        if self.destroyed {
            return Ok(());
        }
        self.pump_fetches(now);
        self.sync_scene(engine)
    }

    fn pump_fetches(&mut self, now: f32) {
        if let Some(loader) = self.galaxy_prefetch.as_mut() {
            let key = format!("{}{}", loader.server(), loader.galaxy());
            let failures = loader.pump(self.source.as_ref(), &mut self.regions, &mut self.queue);
            if loader.is_done() {
                self.galaxy_prefetch = None;
            }
            for error in failures {
                self.notify(MapNotification::FetchFailed {
                    key: key.clone(),
                    error,
                });
            }
        }

        for event in self.queue.pump(now, self.source.as_ref(), &mut self.regions) {
            if let PrefetchEvent::Failed { key, error } = event {
                self.notify(MapNotification::FetchFailed { key, error });
            }
        }

        let Some(pending) = self.body_fetch.as_mut() else {
            return;
        };
        let Poll::Ready(result) = poll_fetch(&mut pending.fetch) else {
            return;
        };
        let key = pending.key.clone();
        self.body_fetch = None;
        match result {
            Ok(bodies) => {
                debug!("System bodies for {}: {}", key, bodies.bodies.len());
                self.bodies.insert(key, bodies);
            }
            Err(error) => {
                warn!("System bodies for {} failed: {}", key, error);
                self.body_failures.insert(key.clone());
                self.notify(MapNotification::FetchFailed { key, error });
            }
        }
    }

    fn bodies_settled(&self) -> bool {
        if self.level != ZoomLevel::System {
            return true;
        }
        let key = self.current_system_key();
        self.bodies.contains(&key) || self.body_failures.contains(&key)
    }

    fn context(&self, canvas: Vec2, elapsed: f32) -> ViewContext<'_> {
        let bodies = if self.level == ZoomLevel::System {
            self.bodies.get(&self.current_system_key())
        } else {
            None
        };
        ViewContext {
            coordinate: self.coordinate,
            canvas,
            elapsed,
            config: &self.config,
            regions: &self.regions,
            bodies,
        }
    }

    fn sync_scene(&mut self, engine: &mut MapEngine) -> Result<(), MapError> {
        let canvas = engine.canvas()?.size();
        let bodies_settled = self.bodies_settled();

        let Some(drawn) = self.drawn else {
            return self.rebuild(engine, canvas, None);
        };

        let region_changed = matches!(self.level, ZoomLevel::Region | ZoomLevel::System) && {
            let key = self.current_region_key();
            self.regions
                .changed_since(drawn.region_version)
                .any(|(changed, _)| changed == key)
        };
        if drawn.level != self.level
            || drawn.coordinate != self.coordinate
            || drawn.canvas != canvas
            || drawn.bodies_settled != bodies_settled
            || region_changed
        {
            return self.rebuild(engine, canvas, Some(drawn));
        }

        if self.level == ZoomLevel::Galaxy && self.regions.version() != drawn.region_version {
            let prefix = format!("{}{}:", self.coordinate.server(), self.coordinate.galaxy());
            let mut changed: Vec<u8> = self
                .regions
                .changed_since(drawn.region_version)
                .filter_map(|(key, _)| key.strip_prefix(prefix.as_str())?.parse().ok())
                .collect();
            changed.sort_unstable();
            if !changed.is_empty() {
                let view = view_for(self.level);
                let ctx = self.context(canvas, engine.elapsed());
                let layout = view.layout(&ctx);
                view.refresh_regions(&ctx, &layout, engine, &changed)?;
            }
        }
        self.drawn = Some(DrawnScene {
            region_version: self.regions.version(),
            ..drawn
        });
        Ok(())
    }

    fn rebuild(
        &mut self,
        engine: &mut MapEngine,
        canvas: Vec2,
        previous: Option<DrawnScene>,
    ) -> Result<(), MapError> {
        engine.clear_layer(LayerKind::Entities);
        engine.clear_layer(LayerKind::Effects);
        engine.clear_layer(LayerKind::Ui);

        if previous.is_none_or(|drawn| drawn.canvas != canvas) || !engine.contains_entity(BACKDROP_ID) {
            engine.replace_entity(
                BACKDROP_ID,
                Box::new(StarfieldBackdrop::generate(canvas, self.config.backdrop_seed)),
                LayerKind::Background,
            )?;
        }

        let recentered = previous.is_none_or(|drawn| {
            drawn.level != self.level || drawn.coordinate != self.coordinate || drawn.canvas != canvas
        });
        if recentered {
            let viewport = engine.viewport_mut()?;
            if viewport.reset() {
                let scale = viewport.scale();
                self.notify(MapNotification::ZoomChanged(scale));
            }
        }

        let view = view_for(self.level);
        let ctx = self.context(canvas, engine.elapsed());
        let layout = view.layout(&ctx);
        view.build(&ctx, &layout, engine)?;
        engine.add_entity(
            TITLE_ID,
            Box::new(Label {
                position: Vec2::new(canvas.x * 0.5, ctx.config.margin * 0.5),
                text: view.title(&ctx),
                size: 18.0,
                color: LABEL_COLOR,
            }),
            LayerKind::Ui,
        )?;
        if let Some(hovered) = self.hovered.as_ref() {
            if let Some(highlight) = view.highlight(&ctx, &layout, hovered) {
                engine.add_entity(HOVER_ID, highlight, LayerKind::Effects)?;
            }
        }

        self.drawn = Some(DrawnScene {
            level: self.level,
            coordinate: self.coordinate,
            canvas,
            region_version: self.regions.version(),
            bodies_settled: self.bodies_settled(),
        });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Pointer
    // -------------------------------------------------------------------------

    fn pick(&self, engine: &MapEngine, screen: Vec2) -> Result<Option<MapLocation>, MapError> {
        let world = engine.viewport()?.screen_to_world(screen);
        let canvas = engine.canvas()?.size();
        let view = view_for(self.level);
        let ctx = self.context(canvas, engine.elapsed());
        let layout = view.layout(&ctx);
        Ok(view.hit_test(&ctx, &layout, world).map(|hit| hit.at(world)))
    }

    /// Track the hovered object. Emits `Hover` only when the target changes.
    pub fn pointer_moved(&mut self, engine: &mut MapEngine, screen: Vec2) -> Result<(), MapError> {
        if self.destroyed {
            return Ok(());
        }
        let hit = self.pick(engine, screen)?;
        self.set_hover(engine, hit)
    }

    pub fn pointer_left(&mut self, engine: &mut MapEngine) -> Result<(), MapError> {
        if self.destroyed {
            return Ok(());
        }
        self.set_hover(engine, None)
    }

    fn set_hover(&mut self, engine: &mut MapEngine, hit: Option<MapLocation>) -> Result<(), MapError> {
        let unchanged = match (&self.hovered, &hit) {
            (Some(current), Some(next)) => current.same_target(next),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return Ok(());
        }

        engine.remove_entity(HOVER_ID);
        if let Some(location) = hit.as_ref() {
            let canvas = engine.canvas()?.size();
            let view = view_for(self.level);
            let highlight = {
                let ctx = self.context(canvas, engine.elapsed());
                let layout = view.layout(&ctx);
                view.highlight(&ctx, &layout, location)
            };
            if let Some(highlight) = highlight {
                engine.add_entity(HOVER_ID, highlight, LayerKind::Effects)?;
            }
            if let (ZoomLevel::Galaxy, Some(region)) = (location.level, location.region) {
                self.ensure_region(region, true);
            }
        }

        self.hovered = hit.clone();
        self.notify(MapNotification::Hover(hit));
        Ok(())
    }

    /// Resolve a click. Emits `Select` and returns the pick when something
    /// selectable is under the pointer.
    pub fn click(&mut self, engine: &MapEngine, screen: Vec2) -> Result<Option<MapLocation>, MapError> {
        if self.destroyed {
            return Ok(None);
        }
        let hit = self.pick(engine, screen)?;
        if let Some(location) = hit.as_ref() {
            info!("Map select: {} {}", location.level.label(), location.label());
            self.notify(MapNotification::Select(location.clone()));
        }
        Ok(hit)
    }

    /// Drop all queued and in-flight fetches. The coordinator ignores every
    /// call afterwards. Returns false when already destroyed.
    pub fn destroy(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.queue.destroy();
        self.galaxy_prefetch = None;
        self.body_fetch = None;
        self.hovered = None;
        self.drawn = None;
        self.notifications.clear();
        self.destroyed = true;
        info!("View coordinator destroyed");
        true
    }
}

// =============================================================================
// Tests
// =============================================================================
