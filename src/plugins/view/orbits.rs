//! Deterministic orbital placement of a system's bodies.
//!
//! Drawing and hit-testing both call [`place_bodies`] and
//! [`Orbit::position_at`] with the same elapsed time, so what is clicked is
//! exactly what is on screen.

use std::f32::consts::TAU;

use bevy::prelude::*;

use crate::coords::Coordinate;
use crate::data::{mix, unit, BodyInfo, BodyKind};

const INNER_ORBIT: f32 = 0.14;
const OUTER_ORBIT: f32 = 0.47;
const BODY_SCALE: f32 = 0.016;
const MIN_BODY_RADIUS: f32 = 2.0;
const MIN_HIT_RADIUS: f32 = 6.0;
const BASE_ANGULAR_SPEED: f32 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orbit {
    pub center: Vec2,
    pub radius: f32,
    pub phase: f32,
    /// Radians per second.
    pub angular_speed: f32,
}

impl Orbit {
    pub fn stationary(center: Vec2) -> Self {
        Self {
            center,
            radius: 0.0,
            phase: 0.0,
            angular_speed: 0.0,
        }
    }

    pub fn position_at(&self, elapsed: f32) -> Vec2 {
        if self.radius <= 0.0 {
            return self.center;
        }
        self.center + Vec2::from_angle(self.phase + self.angular_speed * elapsed) * self.radius
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyPlacement {
    pub body: u8,
    pub kind: BodyKind,
    pub orbit: Orbit,
    pub radius: f32,
    pub hit_radius: f32,
}

pub fn system_seed(coordinate: &Coordinate) -> u64 {
    let mut state = coordinate.server() as u64;
    for part in [coordinate.galaxy(), coordinate.region(), coordinate.system()] {
        state = mix(state ^ part as u64);
    }
    state
}

/// Lay out `bodies` around `center` inside a square of side `extent`.
///
/// Body 0 (or any star) sits at the centre. Planets take evenly spaced
/// orbits in body order with a phase seeded from the coordinate, inner
/// orbits turning faster.
pub fn place_bodies(
    coordinate: &Coordinate,
    bodies: &[BodyInfo],
    center: Vec2,
    extent: f32,
) -> Vec<BodyPlacement> {
    let seed = system_seed(coordinate);
    let half = extent * 0.5;
    let inner = extent * INNER_ORBIT;
    let outer = extent * OUTER_ORBIT;

    let mut planets: Vec<&BodyInfo> = bodies
        .iter()
        .filter(|info| info.kind != BodyKind::Star)
        .collect();
    planets.sort_by_key(|info| info.body);
    let ring_count = planets.len().max(1) as f32;

    let mut placements = Vec::with_capacity(bodies.len());
    for info in bodies.iter().filter(|info| info.kind == BodyKind::Star) {
        let radius = (half * BODY_SCALE * 2.0 * info.size).max(MIN_BODY_RADIUS);
        placements.push(BodyPlacement {
            body: info.body,
            kind: info.kind,
            orbit: Orbit::stationary(center),
            radius,
            hit_radius: radius.max(MIN_HIT_RADIUS),
        });
    }

    for (ring, info) in planets.iter().enumerate() {
        let orbit_radius = if planets.len() == 1 {
            (inner + outer) * 0.5
        } else {
            inner + (outer - inner) * ring as f32 / (ring_count - 1.0)
        };
        let roll = mix(seed ^ (info.body as u64).wrapping_mul(0x2545_f491_4f6c_dd1d));
        let radius = (extent * BODY_SCALE * info.size).max(MIN_BODY_RADIUS);
        placements.push(BodyPlacement {
            body: info.body,
            kind: info.kind,
            orbit: Orbit {
                center,
                radius: orbit_radius,
                phase: unit(roll) * TAU,
                angular_speed: BASE_ANGULAR_SPEED * (inner / orbit_radius).sqrt(),
            },
            radius,
            hit_radius: radius.max(MIN_HIT_RADIUS),
        });
    }
    placements
}

/// Body whose hit circle contains `point`, nearest centre first.
pub fn hit_body(placements: &[BodyPlacement], point: Vec2, elapsed: f32) -> Option<&BodyPlacement> {
    placements
        .iter()
        .map(|placement| (placement, placement.orbit.position_at(elapsed).distance(point)))
        .filter(|(placement, distance)| *distance <= placement.hit_radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(placement, _)| placement)
}

/// Nearest body edge within `max_distance` of `point`.
pub fn nearest_body(
    placements: &[BodyPlacement],
    point: Vec2,
    elapsed: f32,
    max_distance: f32,
) -> Option<&BodyPlacement> {
    placements
        .iter()
        .map(|placement| {
            let gap = placement.orbit.position_at(elapsed).distance(point) - placement.radius;
            (placement, gap.max(0.0))
        })
        .filter(|(_, gap)| *gap <= max_distance)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(placement, _)| placement)
}
