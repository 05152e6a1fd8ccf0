use bevy::prelude::*;

use crate::coords::{
    grid_cell_center, grid_index_to_world_position, pixel_to_grid_index, GridIndex, SECTOR_COLUMNS,
    SECTOR_ROWS, SYSTEM_COUNT,
};
use crate::errors::MapError;
use crate::layout::{GridLayout, GridSpec};
use crate::plugins::engine::shapes::{CellTile, Highlight, Label, StarDot};
use crate::plugins::engine::{Drawable, LayerKind, MapEngine};
use crate::summaries::{region_key, RegionSummary};

use super::{LevelView, MapLocation, ViewContext, HOVER_COLOR, LABEL_COLOR};

const SYSTEM_FILL: Color = Color::srgba(0.04, 0.05, 0.09, 0.7);
const SYSTEM_OUTLINE: Color = Color::srgba(0.14, 0.18, 0.26, 0.5);
const STAR_RADIUS: f32 = 0.18;
const STAR_HIT_RADIUS: f32 = 0.3;

/// 10×10 grid of systems. Only systems holding a star can be picked.
pub struct RegionView;

impl RegionView {
    fn summary<'a>(ctx: &ViewContext<'a>) -> Option<&'a RegionSummary> {
        let coordinate = ctx.coordinate;
        ctx.regions.get(&region_key(
            coordinate.server(),
            coordinate.galaxy(),
            coordinate.region(),
        ))
    }

    fn starred_systems(ctx: &ViewContext) -> Vec<u8> {
        Self::summary(ctx)
            .map(|summary| {
                summary
                    .systems_with_stars
                    .iter()
                    .copied()
                    .filter(|system| *system < SYSTEM_COUNT)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn nearest_star(ctx: &ViewContext, layout: &GridLayout, point: Vec2, reach: f32) -> Option<u8> {
        Self::starred_systems(ctx)
            .into_iter()
            .map(|system| {
                let index = GridIndex::from_linear(system as u32, layout.columns);
                (system, grid_cell_center(index, layout).distance(point))
            })
            .filter(|(_, distance)| *distance <= reach)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(system, _)| system)
    }

    fn location(ctx: &ViewContext, system: u8) -> MapLocation {
        MapLocation::system(
            ctx.coordinate.server(),
            ctx.coordinate.galaxy(),
            ctx.coordinate.region(),
            system,
        )
    }
}

impl LevelView for RegionView {
    fn spec(&self) -> GridSpec {
        GridSpec::new(SECTOR_COLUMNS, SECTOR_ROWS, 56.0, 10.0)
    }

    fn title(&self, ctx: &ViewContext) -> String {
        let label = format!(
            "Region {}{:02}:{:02}",
            ctx.coordinate.server(),
            ctx.coordinate.galaxy(),
            ctx.coordinate.region()
        );
        match Self::summary(ctx) {
            Some(_) => label,
            None => format!("{} (loading)", label),
        }
    }

    fn build(&self, ctx: &ViewContext, layout: &GridLayout, engine: &mut MapEngine) -> Result<(), MapError> {
        if layout.is_degenerate() {
            return Ok(());
        }
        for system in 0..SYSTEM_COUNT {
            let index = GridIndex::from_linear(system as u32, layout.columns);
            engine.add_entity(
                format!("system:{}", system),
                Box::new(CellTile {
                    origin: grid_index_to_world_position(index, layout),
                    size: Vec2::splat(layout.item_size),
                    fill: SYSTEM_FILL,
                    outline: SYSTEM_OUTLINE,
                }),
                LayerKind::Entities,
            )?;
        }

        let Some(summary) = Self::summary(ctx) else {
            return Ok(());
        };
        let labelled = layout.item_size >= 36.0;
        for system in Self::starred_systems(ctx) {
            let index = GridIndex::from_linear(system as u32, layout.columns);
            let center = grid_cell_center(index, layout);
            engine.add_entity(
                format!("star:{}", system),
                Box::new(StarDot {
                    center,
                    radius: layout.item_size * STAR_RADIUS,
                    color: summary.star_color(system),
                    halo: summary.complete,
                }),
                LayerKind::Entities,
            )?;
            if labelled {
                engine.add_entity(
                    format!("star-label:{}", system),
                    Box::new(Label {
                        position: center + Vec2::new(0.0, layout.item_size * 0.36),
                        text: format!("{:02}", system),
                        size: layout.item_size * 0.18,
                        color: LABEL_COLOR,
                    }),
                    LayerKind::Entities,
                )?;
            }
        }
        Ok(())
    }

    fn hit_test(&self, ctx: &ViewContext, layout: &GridLayout, point: Vec2) -> Option<MapLocation> {
        if layout.is_degenerate() {
            return None;
        }

        // Nearest star dot whose hit circle covers the pointer.
        let hit_radius = layout.item_size * STAR_HIT_RADIUS;
        if let Some(system) = Self::nearest_star(ctx, layout, point, hit_radius) {
            return Some(Self::location(ctx, system));
        }

        // Then the cell under the pointer, when it holds a star.
        if let Some(index) = pixel_to_grid_index(point, layout) {
            let system = index.linear(layout.columns);
            if system < SYSTEM_COUNT as u32 {
                let system = system as u8;
                if Self::summary(ctx).is_some_and(|summary| summary.has_star(system)) {
                    return Some(Self::location(ctx, system));
                }
            }
        }

        // Near misses in the padding pick the closest star within half a cell pitch.
        let reach = ctx
            .config
            .fallback_hit_distance
            .min((layout.item_size + layout.padding) * 0.5);
        Self::nearest_star(ctx, layout, point, reach).map(|system| Self::location(ctx, system))
    }

    fn highlight(
        &self,
        ctx: &ViewContext,
        layout: &GridLayout,
        location: &MapLocation,
    ) -> Option<Box<dyn Drawable>> {
        let system = location.system?;
        let index = GridIndex::from_linear(system as u32, layout.columns);
        let starred = Self::summary(ctx).is_some_and(|summary| summary.has_star(system));
        if starred {
            Some(Box::new(Highlight::Circle {
                center: grid_cell_center(index, layout),
                radius: layout.item_size * STAR_HIT_RADIUS,
                color: HOVER_COLOR,
            }))
        } else {
            Some(Box::new(Highlight::Cell {
                origin: grid_index_to_world_position(index, layout),
                size: Vec2::splat(layout.item_size),
                color: HOVER_COLOR,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Coordinate, ZoomLevel};
    use crate::data::{RegionStarColors, SystemColor};
    use crate::plugins::core::MapConfig;
    use crate::summaries::RegionSummaryCache;

    const CANVAS: Vec2 = Vec2::new(900.0, 800.0);

    fn cache_with(systems: &[u8]) -> RegionSummaryCache {
        let mut regions = RegionSummaryCache::default();
        regions.insert(
            region_key('A', 3, 17),
            RegionSummary::from_colors(&RegionStarColors {
                region: 17,
                systems: systems
                    .iter()
                    .map(|system| SystemColor {
                        system: *system,
                        color: "#9bb0ff".to_string(),
                    })
                    .collect(),
            }),
        );
        regions
    }

    fn context<'a>(config: &'a MapConfig, regions: &'a RegionSummaryCache) -> ViewContext<'a> {
        ViewContext {
            coordinate: "A03:17:00:00".parse::<Coordinate>().expect("coordinate"),
            canvas: CANVAS,
            elapsed: 0.0,
            config,
            regions,
            bodies: None,
        }
    }

    #[test]
    fn build_draws_only_starred_systems() {
        let config = MapConfig::default();
        let regions = cache_with(&[3, 47]);
        let ctx = context(&config, &regions);
        let view = RegionView;
        let layout = view.layout(&ctx);
        let mut engine = MapEngine::new(CANVAS.x, CANVAS.y, &config);

        view.build(&ctx, &layout, &mut engine).unwrap();
        assert!(engine.contains_entity("system:0"));
        assert!(engine.contains_entity("system:99"));
        assert!(engine.contains_entity("star:3"));
        assert!(engine.contains_entity("star:47"));
        assert!(!engine.contains_entity("star:4"));
    }

    #[test]
    fn title_marks_missing_summary() {
        let config = MapConfig::default();
        let empty = RegionSummaryCache::default();
        assert_eq!(
            RegionView.title(&context(&config, &empty)),
            "Region A03:17 (loading)"
        );
        let regions = cache_with(&[1]);
        assert_eq!(RegionView.title(&context(&config, &regions)), "Region A03:17");
    }

    #[test]
    fn star_dot_wins_over_cell() {
        let config = MapConfig::default();
        let regions = cache_with(&[47]);
        let ctx = context(&config, &regions);
        let view = RegionView;
        let layout = view.layout(&ctx);

        let center = grid_cell_center(GridIndex::new(4, 7), &layout);
        let hit = view.hit_test(&ctx, &layout, center).expect("hit");
        assert_eq!(hit.level, ZoomLevel::Region);
        assert_eq!(hit.system, Some(47));
        assert_eq!(hit.region, Some(17));
    }

    #[test]
    fn empty_cells_and_missing_summary_pick_nothing() {
        let config = MapConfig::default();
        let regions = cache_with(&[47]);
        let ctx = context(&config, &regions);
        let view = RegionView;
        let layout = view.layout(&ctx);
        let empty = grid_cell_center(GridIndex::new(0, 0), &layout);
        assert!(view.hit_test(&ctx, &layout, empty).is_none());

        let none = RegionSummaryCache::default();
        let ctx = context(&config, &none);
        let starred = grid_cell_center(GridIndex::new(4, 7), &layout);
        assert!(view.hit_test(&ctx, &layout, starred).is_none());
    }

    #[test]
    fn near_miss_in_padding_picks_adjacent_star() {
        let config = MapConfig::default();
        let regions = cache_with(&[47]);
        let ctx = context(&config, &regions);
        let view = RegionView;
        let layout = view.layout(&ctx);
        assert!(layout.padding > 0.0);

        // Padding strip just right of system 47's cell.
        let center = grid_cell_center(GridIndex::new(4, 7), &layout);
        let gap = center + Vec2::new(layout.item_size * 0.5 + layout.padding * 0.25, 0.0);
        assert!(pixel_to_grid_index(gap, &layout).is_none());
        let hit = view.hit_test(&ctx, &layout, gap).expect("adjacent star");
        assert_eq!(hit.system, Some(47));

        // The centre of the neighbouring empty cell stays unselectable.
        let neighbour = grid_cell_center(GridIndex::new(4, 8), &layout);
        assert!(view.hit_test(&ctx, &layout, neighbour).is_none());
    }

    #[test]
    fn highlight_circles_starred_systems() {
        let config = MapConfig::default();
        let regions = cache_with(&[47]);
        let ctx = context(&config, &regions);
        let view = RegionView;
        let layout = view.layout(&ctx);
        let location = MapLocation::system('A', 3, 17, 47);
        let mut list = crate::plugins::engine::DrawList::default();
        view.highlight(&ctx, &layout, &location)
            .expect("highlight")
            .draw(&mut list, &Default::default());
        assert!(matches!(
            list.commands(),
            [crate::plugins::engine::DrawCommand::Circle { filled: false, .. }]
        ));
    }
}
