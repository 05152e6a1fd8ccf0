//! Game coordinates, zoom levels, and the mapping between coordinates, grid
//! cells, and canvas pixels.
//!
//! The canonical string form is a server letter followed by four zero-padded
//! two digit fields: `A03:12:45:02` is galaxy 3, region 12, system 45, body 2
//! on server `A`.

use std::fmt;
use std::str::FromStr;

use bevy::math::Vec2;
use serde::{Deserialize, Serialize};

use crate::errors::MapError;
use crate::layout::GridLayout;

// =============================================================================
// Constants
// =============================================================================

pub const GALAXY_COUNT: u8 = 40;
pub const REGION_COUNT: u8 = 100;
pub const SYSTEM_COUNT: u8 = 100;
pub const BODY_COUNT: u8 = 48;

pub const UNIVERSE_COLUMNS: u32 = 8;
pub const UNIVERSE_ROWS: u32 = 5;
pub const SECTOR_COLUMNS: u32 = 10;
pub const SECTOR_ROWS: u32 = 10;

const CANONICAL_LEN: usize = 12;

// =============================================================================
// Zoom Level
// =============================================================================

/// Nested scene scales, ordered from outermost to innermost.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum ZoomLevel {
    #[default]
    Universe,
    Galaxy,
    Region,
    System,
}

impl ZoomLevel {
    pub const ALL: [ZoomLevel; 4] = [
        ZoomLevel::Universe,
        ZoomLevel::Galaxy,
        ZoomLevel::Region,
        ZoomLevel::System,
    ];

    pub fn deeper(self) -> Option<ZoomLevel> {
        match self {
            ZoomLevel::Universe => Some(ZoomLevel::Galaxy),
            ZoomLevel::Galaxy => Some(ZoomLevel::Region),
            ZoomLevel::Region => Some(ZoomLevel::System),
            ZoomLevel::System => None,
        }
    }

    pub fn shallower(self) -> Option<ZoomLevel> {
        match self {
            ZoomLevel::Universe => None,
            ZoomLevel::Galaxy => Some(ZoomLevel::Universe),
            ZoomLevel::Region => Some(ZoomLevel::Galaxy),
            ZoomLevel::System => Some(ZoomLevel::Region),
        }
    }

    /// Grid shape (columns, rows) of the cells shown at this level.
    pub fn grid_dimensions(self) -> (u32, u32) {
        match self {
            ZoomLevel::Universe => (UNIVERSE_COLUMNS, UNIVERSE_ROWS),
            ZoomLevel::Galaxy | ZoomLevel::Region => (SECTOR_COLUMNS, SECTOR_ROWS),
            ZoomLevel::System => (1, 1),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ZoomLevel::Universe => "Universe",
            ZoomLevel::Galaxy => "Galaxy",
            ZoomLevel::Region => "Region",
            ZoomLevel::System => "System",
        }
    }
}

// =============================================================================
// Coordinate
// =============================================================================

/// Structured game-world address. Every field is range checked on
/// construction, so a `Coordinate` value is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coordinate {
    server: char,
    galaxy: u8,
    region: u8,
    system: u8,
    body: u8,
}

impl Coordinate {
    pub fn new(server: char, galaxy: u8, region: u8, system: u8, body: u8) -> Result<Self, MapError> {
        if !server.is_ascii_uppercase() {
            return Err(MapError::InvalidCoordinate(format!(
                "server {:?} is not an uppercase letter",
                server
            )));
        }
        check_range("galaxy", galaxy, GALAXY_COUNT)?;
        check_range("region", region, REGION_COUNT)?;
        check_range("system", system, SYSTEM_COUNT)?;
        check_range("body", body, BODY_COUNT)?;

        Ok(Self {
            server,
            galaxy,
            region,
            system,
            body,
        })
    }

    /// Origin of a server: galaxy 0, region 0, system 0, body 0.
    pub fn origin(server: char) -> Result<Self, MapError> {
        Self::new(server, 0, 0, 0, 0)
    }

    pub fn server(&self) -> char {
        self.server
    }

    pub fn galaxy(&self) -> u8 {
        self.galaxy
    }

    pub fn region(&self) -> u8 {
        self.region
    }

    pub fn system(&self) -> u8 {
        self.system
    }

    pub fn body(&self) -> u8 {
        self.body
    }

    /// Keep the fields meaningful at `level` and zero the deeper ones.
    pub fn truncated(&self, level: ZoomLevel) -> Self {
        let mut coord = *self;
        if level < ZoomLevel::System {
            coord.body = 0;
        }
        if level < ZoomLevel::Region {
            coord.system = 0;
        }
        if level < ZoomLevel::Galaxy {
            coord.region = 0;
        }
        coord
    }

    /// Short label for the part of the coordinate shown at `level`.
    pub fn prefix_label(&self, level: ZoomLevel) -> String {
        match level {
            ZoomLevel::Universe => format!("{}{:02}", self.server, self.galaxy),
            ZoomLevel::Galaxy => format!("{}{:02}:{:02}", self.server, self.galaxy, self.region),
            ZoomLevel::Region => format!(
                "{}{:02}:{:02}:{:02}",
                self.server, self.galaxy, self.region, self.system
            ),
            ZoomLevel::System => self.to_string(),
        }
    }
}

fn check_range(name: &str, value: u8, count: u8) -> Result<(), MapError> {
    if value >= count {
        return Err(MapError::InvalidCoordinate(format!(
            "{} {} outside 0..{}",
            name, value, count
        )));
    }
    Ok(())
}

impl Default for Coordinate {
    fn default() -> Self {
        Self {
            server: 'A',
            galaxy: 0,
            region: 0,
            system: 0,
            body: 0,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:02}:{:02}:{:02}:{:02}",
            self.server, self.galaxy, self.region, self.system, self.body
        )
    }
}

impl FromStr for Coordinate {
    type Err = MapError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let malformed = || MapError::InvalidCoordinateFormat(input.to_string());

        if input.len() != CANONICAL_LEN || !input.is_ascii() {
            return Err(malformed());
        }

        let mut chars = input.chars();
        let server = chars.next().ok_or_else(malformed)?;
        if !server.is_ascii_uppercase() {
            return Err(malformed());
        }

        let mut fields = [0u8; 4];
        let mut parts = input[1..].split(':');
        for field in fields.iter_mut() {
            let part = parts.next().ok_or_else(malformed)?;
            if part.len() != 2 || !part.bytes().all(|byte| byte.is_ascii_digit()) {
                return Err(malformed());
            }
            *field = part.parse().map_err(|_| malformed())?;
        }
        if parts.next().is_some() {
            return Err(malformed());
        }

        Coordinate::new(server, fields[0], fields[1], fields[2], fields[3])
    }
}

impl TryFrom<String> for Coordinate {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Coordinate> for String {
    fn from(value: Coordinate) -> Self {
        value.to_string()
    }
}

pub fn parse_coordinate_string(input: &str) -> Result<Coordinate, MapError> {
    input.parse()
}

pub fn format_coordinate_string(coord: &Coordinate) -> String {
    coord.to_string()
}

// =============================================================================
// Grid Mapping
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridIndex {
    pub row: u32,
    pub col: u32,
}

impl GridIndex {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    pub fn from_linear(index: u32, columns: u32) -> Self {
        Self {
            row: index / columns,
            col: index % columns,
        }
    }

    pub fn linear(&self, columns: u32) -> u32 {
        self.row * columns + self.col
    }
}

/// Grid cell that holds `coord` when the map shows `level`.
///
/// The universe view addresses galaxies, the galaxy view regions, and the
/// region view systems. The system view is a single cell.
pub fn coordinate_to_grid_index(coord: &Coordinate, level: ZoomLevel) -> GridIndex {
    let (columns, _) = level.grid_dimensions();
    let linear = match level {
        ZoomLevel::Universe => coord.galaxy() as u32,
        ZoomLevel::Galaxy => coord.region() as u32,
        ZoomLevel::Region => coord.system() as u32,
        ZoomLevel::System => 0,
    };
    GridIndex::from_linear(linear, columns)
}

/// Top-left corner of a cell.
pub fn grid_index_to_world_position(index: GridIndex, layout: &GridLayout) -> Vec2 {
    layout.start + Vec2::new(index.col as f32, index.row as f32) * layout.pitch()
}

pub fn grid_cell_center(index: GridIndex, layout: &GridLayout) -> Vec2 {
    grid_index_to_world_position(index, layout) + Vec2::splat(layout.item_size * 0.5)
}

/// Cell under `point`, or `None` for padding, out-of-grid points, and
/// collapsed layouts.
pub fn pixel_to_grid_index(point: Vec2, layout: &GridLayout) -> Option<GridIndex> {
    if layout.is_degenerate() {
        return None;
    }

    let relative = point - layout.start;
    if relative.x < 0.0 || relative.y < 0.0 {
        return None;
    }

    let pitch = layout.pitch();
    let col = (relative.x / pitch).floor();
    let row = (relative.y / pitch).floor();
    if col >= layout.columns as f32 || row >= layout.rows as f32 {
        return None;
    }

    let within_x = relative.x - col * pitch;
    let within_y = relative.y - row * pitch;
    if within_x > layout.item_size || within_y > layout.item_size {
        return None;
    }

    Some(GridIndex::new(row as u32, col as u32))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::GridSpec;

    fn coord(galaxy: u8, region: u8, system: u8, body: u8) -> Coordinate {
        Coordinate::new('A', galaxy, region, system, body).expect("valid coordinate")
    }

    #[test]
    fn format_pads_every_field() {
        assert_eq!(coord(0, 0, 12, 3).to_string(), "A00:00:12:03");
        assert_eq!(coord(39, 99, 99, 47).to_string(), "A39:99:99:47");
    }

    #[test]
    fn parse_format_round_trip_for_all_levels() {
        for galaxy in 0..GALAXY_COUNT {
            for region in (0..REGION_COUNT).step_by(7) {
                for system in (0..SYSTEM_COUNT).step_by(11) {
                    for body in (0..BODY_COUNT).step_by(5) {
                        let original = coord(galaxy, region, system, body);
                        let text = format_coordinate_string(&original);
                        assert_eq!(parse_coordinate_string(&text), Ok(original));
                    }
                }
            }
        }
    }

    #[test]
    fn malformed_galaxy_width_is_rejected() {
        let result = parse_coordinate_string("A0:10:22:10");
        assert_eq!(
            result,
            Err(MapError::InvalidCoordinateFormat("A0:10:22:10".to_string()))
        );
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        for input in [
            "",
            "a00:00:12:03",
            "A00-00-12-03",
            "A00:00:12",
            "A00:00:12:03:",
            "A00:0a:12:03",
            "AA0:00:12:03",
            "A00:00:12:3 ",
        ] {
            assert!(
                matches!(
                    parse_coordinate_string(input),
                    Err(MapError::InvalidCoordinateFormat(_))
                ),
                "expected format error for {:?}",
                input
            );
        }
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        assert!(matches!(
            parse_coordinate_string("A40:00:00:00"),
            Err(MapError::InvalidCoordinate(_))
        ));
        assert!(matches!(
            parse_coordinate_string("A00:00:00:48"),
            Err(MapError::InvalidCoordinate(_))
        ));
        assert!(Coordinate::new('A', 0, 100, 0, 0).is_err());
        assert!(Coordinate::new('1', 0, 0, 0, 0).is_err());
    }

    #[test]
    fn serde_uses_canonical_string() {
        let original = coord(3, 12, 45, 2);
        let text = ron::ser::to_string(&original).expect("serialize");
        assert_eq!(text, "\"A03:12:45:02\"");
        let back: Coordinate = ron::de::from_str(&text).expect("deserialize");
        assert_eq!(back, original);
        assert!(ron::de::from_str::<Coordinate>("\"A3:12:45:02\"").is_err());
    }

    #[test]
    fn prefix_labels_follow_level() {
        let c = coord(3, 12, 45, 2);
        assert_eq!(c.prefix_label(ZoomLevel::Universe), "A03");
        assert_eq!(c.prefix_label(ZoomLevel::Galaxy), "A03:12");
        assert_eq!(c.prefix_label(ZoomLevel::Region), "A03:12:45");
        assert_eq!(c.prefix_label(ZoomLevel::System), "A03:12:45:02");
    }

    #[test]
    fn truncated_zeroes_deeper_fields() {
        let c = coord(3, 12, 45, 2);
        assert_eq!(c.truncated(ZoomLevel::Galaxy), coord(3, 12, 0, 0));
        assert_eq!(c.truncated(ZoomLevel::Universe), coord(3, 0, 0, 0));
        assert_eq!(c.truncated(ZoomLevel::System), c);
    }

    #[test]
    fn zoom_levels_are_ordered_by_depth() {
        assert!(ZoomLevel::Universe < ZoomLevel::Galaxy);
        assert!(ZoomLevel::Galaxy < ZoomLevel::Region);
        assert!(ZoomLevel::Region < ZoomLevel::System);
        assert_eq!(ZoomLevel::Region.deeper(), Some(ZoomLevel::System));
        assert_eq!(ZoomLevel::Universe.shallower(), None);
    }

    #[test]
    fn grid_index_per_level() {
        let c = coord(13, 47, 82, 5);
        assert_eq!(
            coordinate_to_grid_index(&c, ZoomLevel::Universe),
            GridIndex::new(1, 5)
        );
        assert_eq!(
            coordinate_to_grid_index(&c, ZoomLevel::Galaxy),
            GridIndex::new(4, 7)
        );
        assert_eq!(
            coordinate_to_grid_index(&c, ZoomLevel::Region),
            GridIndex::new(8, 2)
        );
        assert_eq!(
            coordinate_to_grid_index(&c, ZoomLevel::System),
            GridIndex::new(0, 0)
        );
    }

    #[test]
    fn every_galaxy_maps_to_a_distinct_universe_cell() {
        let mut seen = std::collections::HashSet::new();
        for galaxy in 0..GALAXY_COUNT {
            let index = coordinate_to_grid_index(&coord(galaxy, 0, 0, 0), ZoomLevel::Universe);
            assert!(index.row < UNIVERSE_ROWS && index.col < UNIVERSE_COLUMNS);
            assert!(seen.insert(index));
        }
        assert_eq!(seen.len(), 40);
    }

    #[test]
    fn cell_centers_hit_test_back_to_their_index() {
        let specs = [
            GridSpec::new(8, 5, 120.0, 16.0),
            GridSpec::new(10, 10, 64.0, 8.0),
        ];
        for spec in specs.iter() {
            for canvas in [Vec2::new(1280.0, 720.0), Vec2::new(377.0, 911.0)] {
                let layout = GridLayout::fit(canvas, spec, 20.0);
                for linear in 0..spec.cell_count() {
                    let index = GridIndex::from_linear(linear, spec.columns);
                    let center = grid_cell_center(index, &layout);
                    assert_eq!(pixel_to_grid_index(center, &layout), Some(index));
                }
            }
        }
    }

    #[test]
    fn padding_points_do_not_resolve_to_neighbours() {
        let spec = GridSpec::new(10, 10, 56.0, 10.0);
        let layout = GridLayout::fit(Vec2::new(650.0, 650.0), &spec, 0.0);
        // gap between column 0 and column 1 spans x in (56, 66)
        let in_gap = layout.start + Vec2::new(61.0, 20.0);
        assert_eq!(pixel_to_grid_index(in_gap, &layout), None);
        let in_row_gap = layout.start + Vec2::new(20.0, 61.0);
        assert_eq!(pixel_to_grid_index(in_row_gap, &layout), None);
    }

    #[test]
    fn points_outside_grid_are_rejected() {
        let spec = GridSpec::new(10, 10, 56.0, 10.0);
        let layout = GridLayout::fit(Vec2::new(800.0, 800.0), &spec, 0.0);
        assert_eq!(pixel_to_grid_index(layout.start - Vec2::ONE, &layout), None);
        let beyond = layout.start + Vec2::new(layout.total_width + 1.0, 5.0);
        assert_eq!(pixel_to_grid_index(beyond, &layout), None);
    }

    #[test]
    fn world_position_uses_origin_plus_pitch() {
        let spec = GridSpec::new(10, 10, 56.0, 10.0);
        let layout = GridLayout::fit(Vec2::new(650.0, 650.0), &spec, 0.0);
        let position = grid_index_to_world_position(GridIndex::new(2, 3), &layout);
        assert!((position.x - (layout.start.x + 3.0 * 66.0)).abs() < 1e-3);
        assert!((position.y - (layout.start.y + 2.0 * 66.0)).abs() < 1e-3);
    }
}
