//! Versioned caches for region star summaries and system body lists.

use std::collections::{BTreeMap, HashMap};

use bevy::color::{Color, Srgba};

use crate::data::{GalaxyStarColors, RegionStarColors, RegionStarPositions, SystemBodies};

/// Colour used when a star has no colour yet or the hex string is malformed.
pub const DEFAULT_STAR_COLOR: Color = Color::srgb(0.95, 0.95, 1.0);

pub fn region_key(server: char, galaxy: u8, region: u8) -> String {
    format!("{}{}:{}", server, galaxy, region)
}

pub fn system_key(server: char, galaxy: u8, region: u8, system: u8) -> String {
    format!("{}{:02}:{:02}:{:02}", server, galaxy, region, system)
}

// =============================================================================
// Region Summary
// =============================================================================

/// Which systems of a region hold a star, and the star colours when known.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegionSummary {
    pub systems_with_stars: Vec<u8>,
    pub star_colors: BTreeMap<u8, String>,
    /// False for positions-only entries that still need colours.
    pub complete: bool,
}

impl RegionSummary {
    pub fn from_colors(colors: &RegionStarColors) -> Self {
        let mut systems_with_stars: Vec<u8> = colors.systems.iter().map(|entry| entry.system).collect();
        systems_with_stars.sort_unstable();
        systems_with_stars.dedup();
        Self {
            systems_with_stars,
            star_colors: colors
                .systems
                .iter()
                .map(|entry| (entry.system, entry.color.clone()))
                .collect(),
            complete: true,
        }
    }

    pub fn from_positions(positions: &RegionStarPositions) -> Self {
        let mut systems_with_stars = positions.systems_with_stars.clone();
        systems_with_stars.sort_unstable();
        systems_with_stars.dedup();
        Self {
            systems_with_stars,
            star_colors: BTreeMap::new(),
            complete: false,
        }
    }

    pub fn has_star(&self, system: u8) -> bool {
        self.systems_with_stars.binary_search(&system).is_ok()
    }

    pub fn star_color(&self, system: u8) -> Color {
        self.star_colors
            .get(&system)
            .and_then(|hex| Srgba::hex(hex).ok())
            .map(Color::from)
            .unwrap_or(DEFAULT_STAR_COLOR)
    }
}

#[derive(Debug, Clone)]
struct CachedSummary {
    summary: RegionSummary,
    written_at: u64,
}

/// Region summaries keyed by [`region_key`].
///
/// Entries are only ever inserted or overwritten whole. `version` grows by one
/// on every write so readers can tell something changed without comparing
/// contents.
#[derive(Debug, Default)]
pub struct RegionSummaryCache {
    entries: HashMap<String, CachedSummary>,
    version: u64,
}

impl RegionSummaryCache {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&RegionSummary> {
        self.entries.get(key).map(|cached| &cached.summary)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_complete(&self, key: &str) -> bool {
        self.get(key).is_some_and(|summary| summary.complete)
    }

    pub fn insert(&mut self, key: String, summary: RegionSummary) -> u64 {
        self.version += 1;
        self.entries.insert(
            key,
            CachedSummary {
                summary,
                written_at: self.version,
            },
        );
        self.version
    }

    /// Store positions without clobbering an entry that already has colours.
    pub fn insert_positions(&mut self, key: String, positions: &RegionStarPositions) -> bool {
        if self.is_complete(&key) {
            return false;
        }
        self.insert(key, RegionSummary::from_positions(positions));
        true
    }

    /// Write every region of a bulk colour response. Returns how many entries
    /// were written.
    pub fn insert_galaxy(&mut self, server: char, galaxy: u8, colors: &GalaxyStarColors) -> usize {
        for region in &colors.regions {
            self.insert(
                region_key(server, galaxy, region.region),
                RegionSummary::from_colors(region),
            );
        }
        colors.regions.len()
    }

    /// Keys written after `version`, in no particular order.
    pub fn changed_since(&self, version: u64) -> impl Iterator<Item = (&str, &RegionSummary)> {
        self.entries
            .iter()
            .filter(move |(_, cached)| cached.written_at > version)
            .map(|(key, cached)| (key.as_str(), &cached.summary))
    }
}

// =============================================================================
// System Bodies
// =============================================================================

#[derive(Debug, Default)]
pub struct SystemBodyCache {
    entries: HashMap<String, SystemBodies>,
}

impl SystemBodyCache {
    pub fn get(&self, key: &str) -> Option<&SystemBodies> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, bodies: SystemBodies) {
        self.entries.insert(key, bodies);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
