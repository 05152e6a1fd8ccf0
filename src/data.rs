//! Data contracts the map consumes, and a procedural source for offline use.

use std::task::{Context, Poll};

use futures::future::{self, LocalBoxFuture};
use futures::task::noop_waker_ref;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::coords::{Coordinate, BODY_COUNT, REGION_COUNT, SYSTEM_COUNT};
use crate::errors::FetchError;

/// Pending response from a data source. Polled once per frame, never awaited.
pub type FetchFuture<T> = LocalBoxFuture<'static, Result<T, FetchError>>;

/// Poll a fetch once without blocking.
///
/// Sources hand back futures that are woken by whatever drives the transport;
/// the map only checks them on its own frame cadence.
pub fn poll_fetch<T>(future: &mut FetchFuture<T>) -> Poll<Result<T, FetchError>> {
    let mut context = Context::from_waker(noop_waker_ref());
    future.as_mut().poll(&mut context)
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemColor {
    pub system: u8,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionStarColors {
    pub region: u8,
    pub systems: Vec<SystemColor>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GalaxyStarColors {
    pub regions: Vec<RegionStarColors>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionStarPositions {
    pub region: u8,
    pub systems_with_stars: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GalaxyRegionSummaries {
    pub regions: Vec<RegionStarPositions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyKind {
    Star,
    Rocky,
    GasGiant,
    Ice,
    Asteroid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyInfo {
    pub body: u8,
    pub kind: BodyKind,
    #[serde(default)]
    pub name: Option<String>,
    /// Relative display size, 1.0 for a typical planet.
    #[serde(default = "default_body_size")]
    pub size: f32,
}

fn default_body_size() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemBodies {
    pub bodies: Vec<BodyInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDetail {
    pub coordinate: Coordinate,
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub terrain: String,
}

// =============================================================================
// Source Trait
// =============================================================================

/// Backend the map pulls its visual data from.
///
/// Implementations decide the transport. Every call returns immediately with a
/// future; failures are reported through the future, never by panicking.
pub trait MapDataSource {
    /// Star positions and colours for every region of a galaxy in one call.
    fn galaxy_region_star_colors(&self, server: char, galaxy: u8) -> FetchFuture<GalaxyStarColors>;

    /// Star positions only, for every region of a galaxy.
    fn galaxy_region_summaries(&self, server: char, galaxy: u8)
        -> FetchFuture<GalaxyRegionSummaries>;

    /// Star positions and colours for a single region.
    fn region_star_colors(&self, server: char, galaxy: u8, region: u8)
        -> FetchFuture<RegionStarColors>;

    fn system_bodies(&self, server: char, galaxy: u8, region: u8, system: u8)
        -> FetchFuture<SystemBodies>;

    /// Detail lookup for a single location. Used by hosts, not by the map.
    fn location_by_coord(&self, coord: Coordinate) -> FetchFuture<LocationDetail>;
}

// =============================================================================
// Procedural Source
// =============================================================================

const STAR_PALETTE: [&str; 6] = [
    "#9bb0ff", "#cad7ff", "#f8f7ff", "#fff4ea", "#ffd2a1", "#ffcc6f",
];

/// Deterministic universe generated from a seed. Every request resolves on
/// the first poll.
#[derive(Debug, Clone)]
pub struct ProceduralSource {
    seed: u64,
    star_density: f32,
}

impl ProceduralSource {
    pub fn new(seed: u64, star_density: f32) -> Self {
        Self {
            seed,
            star_density: star_density.clamp(0.0, 1.0),
        }
    }

    fn roll(&self, server: char, galaxy: u8, region: u8, system: u8, salt: u64) -> u64 {
        let mut state = self.seed ^ salt.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        for part in [server as u64, galaxy as u64, region as u64, system as u64] {
            state = mix(state ^ part);
        }
        state
    }

    fn has_star(&self, server: char, galaxy: u8, region: u8, system: u8) -> bool {
        let value = self.roll(server, galaxy, region, system, 1);
        unit(value) < self.star_density
    }

    fn region_colors(&self, server: char, galaxy: u8, region: u8) -> RegionStarColors {
        let systems = (0..SYSTEM_COUNT)
            .filter(|system| self.has_star(server, galaxy, region, *system))
            .map(|system| {
                let pick = self.roll(server, galaxy, region, system, 2) as usize % STAR_PALETTE.len();
                SystemColor {
                    system,
                    color: STAR_PALETTE[pick].to_string(),
                }
            })
            .collect();
        RegionStarColors { region, systems }
    }

    fn bodies(&self, server: char, galaxy: u8, region: u8, system: u8) -> SystemBodies {
        let roll = self.roll(server, galaxy, region, system, 3);
        let planet_count = 2 + (roll % 9) as u8;
        let mut bodies = vec![BodyInfo {
            body: 0,
            kind: BodyKind::Star,
            name: None,
            size: 2.5,
        }];
        for body in 1..=planet_count.min(BODY_COUNT - 1) {
            let kind_roll = self.roll(server, galaxy, region, system, 10 + body as u64);
            let kind = match kind_roll % 5 {
                0 | 1 => BodyKind::Rocky,
                2 => BodyKind::GasGiant,
                3 => BodyKind::Ice,
                _ => BodyKind::Asteroid,
            };
            let size = match kind {
                BodyKind::GasGiant => 1.6,
                BodyKind::Asteroid => 0.5,
                _ => 0.8 + unit(kind_roll >> 8) * 0.5,
            };
            bodies.push(BodyInfo {
                body,
                kind,
                name: None,
                size,
            });
        }
        SystemBodies { bodies }
    }
}

impl MapDataSource for ProceduralSource {
    fn galaxy_region_star_colors(&self, server: char, galaxy: u8) -> FetchFuture<GalaxyStarColors> {
        let regions = (0..REGION_COUNT)
            .map(|region| self.region_colors(server, galaxy, region))
            .collect();
        future::ready(Ok(GalaxyStarColors { regions })).boxed_local()
    }

    fn galaxy_region_summaries(
        &self,
        server: char,
        galaxy: u8,
    ) -> FetchFuture<GalaxyRegionSummaries> {
        let regions = (0..REGION_COUNT)
            .map(|region| {
                let colors = self.region_colors(server, galaxy, region);
                RegionStarPositions {
                    region,
                    systems_with_stars: colors.systems.iter().map(|entry| entry.system).collect(),
                }
            })
            .collect();
        future::ready(Ok(GalaxyRegionSummaries { regions })).boxed_local()
    }

    fn region_star_colors(
        &self,
        server: char,
        galaxy: u8,
        region: u8,
    ) -> FetchFuture<RegionStarColors> {
        future::ready(Ok(self.region_colors(server, galaxy, region))).boxed_local()
    }

    fn system_bodies(
        &self,
        server: char,
        galaxy: u8,
        region: u8,
        system: u8,
    ) -> FetchFuture<SystemBodies> {
        let result = if self.has_star(server, galaxy, region, system) {
            Ok(self.bodies(server, galaxy, region, system))
        } else {
            Err(FetchError::NotFound(format!(
                "{}{:02}:{:02}:{:02}",
                server, galaxy, region, system
            )))
        };
        future::ready(result).boxed_local()
    }

    fn location_by_coord(&self, coord: Coordinate) -> FetchFuture<LocationDetail> {
        let roll = self.roll(
            coord.server(),
            coord.galaxy(),
            coord.region(),
            coord.system(),
            40 + coord.body() as u64,
        );
        let terrain = ["barren", "oceanic", "volcanic", "frozen", "temperate"][(roll % 5) as usize];
        future::ready(Ok(LocationDetail {
            coordinate: coord,
            name: format!("Body {}", coord),
            owner: None,
            terrain: terrain.to_string(),
        }))
        .boxed_local()
    }
}

/// splitmix64 finaliser.
pub(crate) fn mix(mut value: u64) -> u64 {
    value = value.wrapping_add(0x9e37_79b9_7f4a_7c15);
    value = (value ^ (value >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    value = (value ^ (value >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    value ^ (value >> 31)
}

pub(crate) fn unit(value: u64) -> f32 {
    ((value >> 40) as f32) / ((1u64 << 24) as f32)
}

// =============================================================================
// Tests
// =============================================================================
