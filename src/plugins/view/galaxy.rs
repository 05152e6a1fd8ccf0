use bevy::prelude::*;

use crate::coords::{
    grid_index_to_world_position, pixel_to_grid_index, GridIndex, REGION_COUNT, SECTOR_COLUMNS,
    SECTOR_ROWS, SYSTEM_COUNT,
};
use crate::errors::MapError;
use crate::layout::{GridLayout, GridSpec};
use crate::plugins::engine::shapes::{BackdropStar, CellTile, Highlight, Label, MiniStarfield};
use crate::plugins::engine::{Drawable, LayerKind, MapEngine};
use crate::summaries::{region_key, RegionSummary};

use super::{LevelView, MapLocation, ViewContext, HOVER_COLOR, LABEL_COLOR};

const REGION_FILL: Color = Color::srgba(0.06, 0.08, 0.14, 0.85);
const REGION_OUTLINE: Color = Color::srgba(0.22, 0.3, 0.45, 0.6);
const PENDING_OUTLINE: Color = Color::srgba(0.18, 0.2, 0.26, 0.4);

/// 10×10 grid of regions, each with a preview of its starred systems.
pub struct GalaxyView;

fn stars_id(region: u8) -> String {
    format!("region-stars:{}", region)
}

/// Dots for every starred system laid out on the region's own 10×10 grid,
/// scaled into one region tile.
fn mini_starfield(summary: &RegionSummary, origin: Vec2, item_size: f32) -> MiniStarfield {
    let pitch = item_size / SECTOR_COLUMNS as f32;
    let radius = (pitch * 0.22).max(0.6);
    let dots = summary
        .systems_with_stars
        .iter()
        .filter(|system| **system < SYSTEM_COUNT)
        .map(|system| {
            let index = GridIndex::from_linear(*system as u32, SECTOR_COLUMNS);
            BackdropStar {
                position: origin
                    + Vec2::new(index.col as f32 + 0.5, index.row as f32 + 0.5) * pitch,
                radius,
                color: summary.star_color(*system),
            }
        })
        .collect();
    MiniStarfield { dots }
}

impl GalaxyView {
    /// Tile plus star preview for one region. Regions without a cached
    /// summary get a dim outline and no preview.
    fn draw_region(
        ctx: &ViewContext,
        layout: &GridLayout,
        engine: &mut MapEngine,
        region: u8,
    ) -> Result<(), MapError> {
        let key = region_key(ctx.coordinate.server(), ctx.coordinate.galaxy(), region);
        let summary = ctx.regions.get(&key);
        let index = GridIndex::from_linear(region as u32, layout.columns);
        let origin = grid_index_to_world_position(index, layout);

        engine.replace_entity(
            format!("region:{}", region),
            Box::new(CellTile {
                origin,
                size: Vec2::splat(layout.item_size),
                fill: REGION_FILL,
                outline: if summary.is_some() {
                    REGION_OUTLINE
                } else {
                    PENDING_OUTLINE
                },
            }),
            LayerKind::Entities,
        )?;
        if let Some(summary) = summary {
            engine.replace_entity(
                stars_id(region),
                Box::new(mini_starfield(summary, origin, layout.item_size)),
                LayerKind::Entities,
            )?;
        }
        Ok(())
    }
}

impl LevelView for GalaxyView {
    fn spec(&self) -> GridSpec {
        GridSpec::new(SECTOR_COLUMNS, SECTOR_ROWS, 64.0, 8.0)
    }

    fn title(&self, ctx: &ViewContext) -> String {
        format!("Galaxy {}{:02}", ctx.coordinate.server(), ctx.coordinate.galaxy())
    }

    fn build(&self, ctx: &ViewContext, layout: &GridLayout, engine: &mut MapEngine) -> Result<(), MapError> {
        if layout.is_degenerate() {
            return Ok(());
        }
        for region in 0..REGION_COUNT {
            Self::draw_region(ctx, layout, engine, region)?;
        }

        // Region numbers only where there is room to read them.
        if layout.item_size >= 40.0 {
            for region in 0..REGION_COUNT {
                let index = GridIndex::from_linear(region as u32, layout.columns);
                engine.add_entity(
                    format!("region-label:{}", region),
                    Box::new(Label {
                        position: grid_index_to_world_position(index, layout)
                            + Vec2::new(layout.item_size * 0.5, layout.item_size * 0.12),
                        text: format!("{:02}", region),
                        size: layout.item_size * 0.16,
                        color: LABEL_COLOR,
                    }),
                    LayerKind::Entities,
                )?;
            }
        }
        Ok(())
    }

    fn refresh_regions(
        &self,
        ctx: &ViewContext,
        layout: &GridLayout,
        engine: &mut MapEngine,
        regions: &[u8],
    ) -> Result<(), MapError> {
        if layout.is_degenerate() {
            return Ok(());
        }
        for region in regions.iter().filter(|region| **region < REGION_COUNT) {
            Self::draw_region(ctx, layout, engine, *region)?;
        }
        Ok(())
    }

    fn hit_test(&self, ctx: &ViewContext, layout: &GridLayout, point: Vec2) -> Option<MapLocation> {
        let index = pixel_to_grid_index(point, layout)?;
        let region = index.linear(layout.columns);
        if region >= REGION_COUNT as u32 {
            return None;
        }
        Some(MapLocation::region(
            ctx.coordinate.server(),
            ctx.coordinate.galaxy(),
            region as u8,
        ))
    }

    fn highlight(
        &self,
        _ctx: &ViewContext,
        layout: &GridLayout,
        location: &MapLocation,
    ) -> Option<Box<dyn Drawable>> {
        let index = GridIndex::from_linear(location.region? as u32, layout.columns);
        Some(Box::new(Highlight::Cell {
            origin: grid_index_to_world_position(index, layout),
            size: Vec2::splat(layout.item_size),
            color: HOVER_COLOR,
        }))
    }
}
