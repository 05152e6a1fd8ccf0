use bevy::color::Srgba;
use bevy::prelude::*;

use crate::coords::{
    coordinate_to_grid_index, grid_cell_center, grid_index_to_world_position, pixel_to_grid_index,
    GridIndex, ZoomLevel, GALAXY_COUNT, UNIVERSE_COLUMNS, UNIVERSE_ROWS,
};
use crate::errors::MapError;
use crate::layout::{GridLayout, GridSpec};
use crate::plugins::engine::shapes::{CellTile, Highlight, Label};
use crate::plugins::engine::{Drawable, LayerKind, MapEngine};

use super::{LevelView, MapLocation, ViewContext, HOVER_COLOR, LABEL_COLOR, SELECT_COLOR};

const GALAXY_FILL: Color = Color::srgba(0.08, 0.1, 0.18, 0.85);
const GALAXY_OUTLINE: Color = Color::srgba(0.3, 0.4, 0.6, 0.7);

/// 8×5 grid of galaxies.
pub struct UniverseView;

impl UniverseView {
    fn cell_highlight(layout: &GridLayout, index: GridIndex, color: Srgba) -> Highlight {
        Highlight::Cell {
            origin: grid_index_to_world_position(index, layout),
            size: Vec2::splat(layout.item_size),
            color,
        }
    }
}

impl LevelView for UniverseView {
    fn spec(&self) -> GridSpec {
        GridSpec::new(UNIVERSE_COLUMNS, UNIVERSE_ROWS, 120.0, 16.0)
    }

    fn title(&self, ctx: &ViewContext) -> String {
        format!("Universe {}", ctx.coordinate.server())
    }

    fn build(&self, ctx: &ViewContext, layout: &GridLayout, engine: &mut MapEngine) -> Result<(), MapError> {
        if layout.is_degenerate() {
            return Ok(());
        }
        let server = ctx.coordinate.server();
        for galaxy in 0..GALAXY_COUNT {
            let index = GridIndex::from_linear(galaxy as u32, layout.columns);
            engine.add_entity(
                format!("galaxy:{}", galaxy),
                Box::new(CellTile {
                    origin: grid_index_to_world_position(index, layout),
                    size: Vec2::splat(layout.item_size),
                    fill: GALAXY_FILL,
                    outline: GALAXY_OUTLINE,
                }),
                LayerKind::Entities,
            )?;
            engine.add_entity(
                format!("galaxy-label:{}", galaxy),
                Box::new(Label {
                    position: grid_cell_center(index, layout),
                    text: format!("{}{:02}", server, galaxy),
                    size: (layout.item_size * 0.16).max(9.0),
                    color: LABEL_COLOR,
                }),
                LayerKind::Entities,
            )?;
        }

        let current = coordinate_to_grid_index(&ctx.coordinate, ZoomLevel::Universe);
        engine.add_entity(
            "selection",
            Box::new(Self::cell_highlight(layout, current, SELECT_COLOR)),
            LayerKind::Effects,
        )?;
        Ok(())
    }

    fn hit_test(&self, ctx: &ViewContext, layout: &GridLayout, point: Vec2) -> Option<MapLocation> {
        let index = pixel_to_grid_index(point, layout)?;
        let galaxy = index.linear(layout.columns);
        if galaxy >= GALAXY_COUNT as u32 {
            return None;
        }
        Some(MapLocation::galaxy(ctx.coordinate.server(), galaxy as u8))
    }

    fn highlight(
        &self,
        _ctx: &ViewContext,
        layout: &GridLayout,
        location: &MapLocation,
    ) -> Option<Box<dyn Drawable>> {
        let index = GridIndex::from_linear(location.galaxy as u32, layout.columns);
        Some(Box::new(Self::cell_highlight(layout, index, HOVER_COLOR)))
    }
}
