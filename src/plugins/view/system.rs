use bevy::color::Srgba;
use bevy::prelude::*;

use crate::coords::{grid_cell_center, Coordinate, GridIndex};
use crate::data::{BodyInfo, BodyKind};
use crate::errors::MapError;
use crate::layout::{GridLayout, GridSpec};
use crate::plugins::engine::shapes::{Highlight, Ring};
use crate::plugins::engine::{Drawable, FrameInfo, LayerKind, MapEngine, Renderer};
use crate::summaries::region_key;

use super::orbits::{hit_body, nearest_body, place_bodies, BodyPlacement, Orbit};
use super::{LevelView, MapLocation, ViewContext, HOVER_COLOR, LABEL_COLOR};

const ORBIT_COLOR: Color = Color::srgba(0.25, 0.3, 0.4, 0.35);
const HIGHLIGHT_GAP: f32 = 4.0;

/// One star system: the star at the centre, planets on circular orbits.
pub struct SystemView;

/// Stand-in while the body list is loading or after it failed.
const PLACEHOLDER_STAR: BodyInfo = BodyInfo {
    body: 0,
    kind: BodyKind::Star,
    name: None,
    size: 2.5,
};

fn body_color(kind: BodyKind) -> Color {
    match kind {
        BodyKind::Star => Color::srgb(1.0, 0.92, 0.7),
        BodyKind::Rocky => Color::srgb(0.72, 0.58, 0.44),
        BodyKind::GasGiant => Color::srgb(0.9, 0.66, 0.38),
        BodyKind::Ice => Color::srgb(0.7, 0.86, 0.95),
        BodyKind::Asteroid => Color::srgb(0.55, 0.55, 0.55),
    }
}

/// Body drawn wherever its orbit puts it at the current frame time.
#[derive(Debug, Clone)]
pub struct OrbitingBody {
    pub orbit: Orbit,
    pub radius: f32,
    pub color: Color,
    pub label: Option<String>,
}

impl Drawable for OrbitingBody {
    fn draw(&self, renderer: &mut dyn Renderer, frame: &FrameInfo) {
        let position = self.orbit.position_at(frame.elapsed);
        renderer.fill_circle(position, self.radius, self.color);
        if let Some(label) = &self.label {
            renderer.text(
                position + Vec2::new(0.0, self.radius + 8.0),
                label,
                11.0,
                LABEL_COLOR,
            );
        }
    }
}

/// Hover ring that follows a moving body.
#[derive(Debug, Clone)]
pub struct OrbitHighlight {
    pub orbit: Orbit,
    pub radius: f32,
    pub color: Srgba,
}

impl Drawable for OrbitHighlight {
    fn draw(&self, renderer: &mut dyn Renderer, frame: &FrameInfo) {
        Highlight::Circle {
            center: self.orbit.position_at(frame.elapsed),
            radius: self.radius,
            color: self.color,
        }
        .draw(renderer, frame);
    }
}

impl SystemView {
    /// Body placements for `coordinate` inside the view's single cell.
    pub fn placements(
        coordinate: &Coordinate,
        bodies: &[BodyInfo],
        layout: &GridLayout,
    ) -> Vec<BodyPlacement> {
        let center = grid_cell_center(GridIndex::new(0, 0), layout);
        if bodies.is_empty() {
            return place_bodies(coordinate, &[PLACEHOLDER_STAR], center, layout.item_size);
        }
        place_bodies(coordinate, bodies, center, layout.item_size)
    }

    fn context_placements(ctx: &ViewContext, layout: &GridLayout) -> Vec<BodyPlacement> {
        let bodies = ctx.bodies.map(|bodies| bodies.bodies.as_slice()).unwrap_or(&[]);
        Self::placements(&ctx.coordinate, bodies, layout)
    }

    fn star_color(ctx: &ViewContext) -> Color {
        let coordinate = ctx.coordinate;
        ctx.regions
            .get(&region_key(
                coordinate.server(),
                coordinate.galaxy(),
                coordinate.region(),
            ))
            .map(|summary| summary.star_color(coordinate.system()))
            .unwrap_or_else(|| body_color(BodyKind::Star))
    }
}

impl LevelView for SystemView {
    fn spec(&self) -> GridSpec {
        GridSpec::new(1, 1, 600.0, 0.0)
    }

    fn title(&self, ctx: &ViewContext) -> String {
        let label = format!(
            "System {}{:02}:{:02}:{:02}",
            ctx.coordinate.server(),
            ctx.coordinate.galaxy(),
            ctx.coordinate.region(),
            ctx.coordinate.system()
        );
        match ctx.bodies {
            Some(_) => label,
            None => format!("{} (loading)", label),
        }
    }

    fn build(&self, ctx: &ViewContext, layout: &GridLayout, engine: &mut MapEngine) -> Result<(), MapError> {
        if layout.is_degenerate() {
            return Ok(());
        }
        let names: Vec<(u8, Option<String>)> = ctx
            .bodies
            .map(|bodies| {
                bodies
                    .bodies
                    .iter()
                    .map(|info| (info.body, info.name.clone()))
                    .collect()
            })
            .unwrap_or_default();

        for placement in Self::context_placements(ctx, layout) {
            if placement.orbit.radius > 0.0 {
                engine.add_entity(
                    format!("orbit:{}", placement.body),
                    Box::new(Ring {
                        center: placement.orbit.center,
                        radius: placement.orbit.radius,
                        color: ORBIT_COLOR,
                    }),
                    LayerKind::Entities,
                )?;
            }
            let color = match placement.kind {
                BodyKind::Star => Self::star_color(ctx),
                kind => body_color(kind),
            };
            let label = names
                .iter()
                .find(|(body, _)| *body == placement.body)
                .and_then(|(_, name)| name.clone());
            engine.add_entity(
                format!("body:{}", placement.body),
                Box::new(OrbitingBody {
                    orbit: placement.orbit,
                    radius: placement.radius,
                    color,
                    label,
                }),
                LayerKind::Entities,
            )?;
        }
        Ok(())
    }

    fn hit_test(&self, ctx: &ViewContext, layout: &GridLayout, point: Vec2) -> Option<MapLocation> {
        if layout.is_degenerate() {
            return None;
        }
        let placements = Self::context_placements(ctx, layout);
        let picked = hit_body(&placements, point, ctx.elapsed).or_else(|| {
            nearest_body(
                &placements,
                point,
                ctx.elapsed,
                ctx.config.fallback_hit_distance,
            )
        })?;
        let coordinate = ctx.coordinate;
        Some(MapLocation::body(
            coordinate.server(),
            coordinate.galaxy(),
            coordinate.region(),
            coordinate.system(),
            picked.body,
        ))
    }

    fn highlight(
        &self,
        ctx: &ViewContext,
        layout: &GridLayout,
        location: &MapLocation,
    ) -> Option<Box<dyn Drawable>> {
        let body = location.body?;
        let placement = Self::context_placements(ctx, layout)
            .into_iter()
            .find(|placement| placement.body == body)?;
        Some(Box::new(OrbitHighlight {
            orbit: placement.orbit,
            radius: placement.hit_radius + HIGHLIGHT_GAP,
            color: HOVER_COLOR,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::ZoomLevel;
    use crate::data::SystemBodies;
    use crate::plugins::core::MapConfig;
    use crate::plugins::engine::{DrawCommand, DrawList};
    use crate::summaries::RegionSummaryCache;

    const CANVAS: Vec2 = Vec2::new(800.0, 700.0);

    fn bodies() -> SystemBodies {
        SystemBodies {
            bodies: vec![
                BodyInfo {
                    body: 0,
                    kind: BodyKind::Star,
                    name: Some("Vega".to_string()),
                    size: 2.0,
                },
                BodyInfo {
                    body: 1,
                    kind: BodyKind::Rocky,
                    name: None,
                    size: 1.0,
                },
                BodyInfo {
                    body: 2,
                    kind: BodyKind::Ice,
                    name: None,
                    size: 0.8,
                },
            ],
        }
    }

    fn context<'a>(
        config: &'a MapConfig,
        regions: &'a RegionSummaryCache,
        bodies: Option<&'a SystemBodies>,
        elapsed: f32,
    ) -> ViewContext<'a> {
        ViewContext {
            coordinate: "A03:17:47:00".parse::<Coordinate>().expect("coordinate"),
            canvas: CANVAS,
            elapsed,
            config,
            regions,
            bodies,
        }
    }

    #[test]
    fn build_adds_orbits_for_planets_only() {
        let config = MapConfig::default();
        let regions = RegionSummaryCache::default();
        let bodies = bodies();
        let ctx = context(&config, &regions, Some(&bodies), 0.0);
        let view = SystemView;
        let layout = view.layout(&ctx);
        let mut engine = MapEngine::new(CANVAS.x, CANVAS.y, &config);

        view.build(&ctx, &layout, &mut engine).unwrap();
        assert!(engine.contains_entity("body:0"));
        assert!(engine.contains_entity("body:2"));
        assert!(!engine.contains_entity("orbit:0"));
        assert!(engine.contains_entity("orbit:1"));
        assert_eq!(engine.entity_count(), 5);
    }

    #[test]
    fn loading_system_shows_placeholder_star() {
        let config = MapConfig::default();
        let regions = RegionSummaryCache::default();
        let ctx = context(&config, &regions, None, 0.0);
        let view = SystemView;
        let layout = view.layout(&ctx);
        let mut engine = MapEngine::new(CANVAS.x, CANVAS.y, &config);

        view.build(&ctx, &layout, &mut engine).unwrap();
        assert_eq!(engine.entity_count(), 1);
        assert!(view.title(&ctx).ends_with("(loading)"));
        let hit = view.hit_test(&ctx, &layout, CANVAS * 0.5).expect("star");
        assert_eq!(hit.body, Some(0));
        assert_eq!(hit.level, ZoomLevel::System);
    }

    #[test]
    fn hit_test_follows_orbit_over_time() {
        let config = MapConfig::default();
        let regions = RegionSummaryCache::default();
        let bodies = bodies();
        let view = SystemView;
        let early = context(&config, &regions, Some(&bodies), 0.0);
        let layout = view.layout(&early);
        let placements = SystemView::placements(&early.coordinate, &bodies.bodies, &layout);
        let planet = placements.iter().find(|p| p.body == 1).expect("planet");

        let later = context(&config, &regions, Some(&bodies), 5.0);
        let position = planet.orbit.position_at(5.0);
        let hit = view.hit_test(&later, &layout, position).expect("planet");
        assert_eq!(hit.body, Some(1));
    }

    #[test]
    fn orbiting_body_draws_at_frame_time() {
        let orbit = Orbit {
            center: Vec2::ZERO,
            radius: 10.0,
            phase: 0.0,
            angular_speed: std::f32::consts::FRAC_PI_2,
        };
        let body = OrbitingBody {
            orbit,
            radius: 2.0,
            color: Color::WHITE,
            label: Some("Io".to_string()),
        };
        let mut list = DrawList::default();
        body.draw(
            &mut list,
            &FrameInfo {
                elapsed: 1.0,
                scale: 1.0,
            },
        );
        match list.commands() {
            [DrawCommand::Circle { center, .. }, DrawCommand::Text { text, .. }] => {
                assert!((*center - Vec2::new(0.0, 10.0)).length() < 1e-3);
                assert_eq!(text, "Io");
            }
            other => panic!("unexpected commands {:?}", other),
        }
    }
}
