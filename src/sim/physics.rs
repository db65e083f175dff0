//! Per-bubble forces, integration and wall reflection
//!
//! Velocities are in pixels per physics tick. Damping is applied once per
//! tick, so behaviour is tied to the tick period rather than wall time.

use glam::Vec2;
use rand::Rng;

use super::bounds::PlayBounds;
use crate::consts::*;
use crate::settings::ClusterSettings;
use crate::{centered, direction_or};

/// Snapshot of a neighbour used for pairwise forces
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub pos: Vec2,
    pub size: f32,
    pub group: Option<&'a str>,
}

/// Random isotropic kick in [-JITTER, JITTER) per axis
pub fn brownian<R: Rng>(rng: &mut R) -> Vec2 {
    Vec2::new(
        centered(rng.random(), 2.0 * JITTER),
        centered(rng.random(), 2.0 * JITTER),
    )
}

/// Velocity change from one neighbour.
///
/// Overlapping pairs (closer than `(a + b) / 1.5`) are pushed apart with a
/// fixed [`REPULSION`]. Otherwise, within `max_radius`, an inverse-square
/// pull capped at [`MAX_ATTRACTION`]; with `same_group_only` the pull needs
/// both bubbles to carry the same group tag.
pub fn pair_force(
    pos: Vec2,
    size: f32,
    group: Option<&str>,
    other: &Neighbor<'_>,
    cluster: &ClusterSettings,
) -> Vec2 {
    let dist = pos.distance(other.pos);
    let min_dist = (size + other.size) / SPACING_DIVISOR;

    if dist < min_dist {
        // Coincident centers separate along +x
        return direction_or(pos, other.pos, Vec2::X) * REPULSION;
    }

    if dist > cluster.max_radius {
        return Vec2::ZERO;
    }
    if cluster.same_group_only && (group.is_none() || group != other.group) {
        return Vec2::ZERO;
    }

    let magnitude = (cluster.strength / (dist * dist)).min(MAX_ATTRACTION);
    direction_or(other.pos, pos, Vec2::ZERO) * magnitude
}

/// Exponential decay of velocity
#[inline]
pub fn damp(vel: Vec2) -> Vec2 {
    vel * DAMPING
}

/// Keep a bubble's edges inside the bounds.
///
/// On each axis where the edge would cross a bound the center is clamped to
/// the bound and that velocity component is turned inward, keeping
/// [`RESTITUTION`] of its magnitude.
pub fn reflect(pos: &mut Vec2, vel: &mut Vec2, size: f32, bounds: &PlayBounds) {
    let half = size / 2.0;
    reflect_axis(&mut pos.x, &mut vel.x, bounds.left + half, bounds.right - half);
    reflect_axis(&mut pos.y, &mut vel.y, bounds.top + half, bounds.bottom - half);
}

fn reflect_axis(p: &mut f32, v: &mut f32, lo: f32, hi: f32) {
    if lo > hi {
        // Bubble wider than the region: pin to the middle
        *p = (lo + hi) / 2.0;
        *v = 0.0;
        return;
    }
    if *p < lo {
        *p = lo;
        *v = v.abs() * RESTITUTION;
    } else if *p > hi {
        *p = hi;
        *v = -v.abs() * RESTITUTION;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::bounds::Viewport;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn bounds() -> PlayBounds {
        PlayBounds::new(Viewport::new(1000.0, 800.0), None)
    }

    #[test]
    fn test_reflect_right_wall() {
        let mut pos = Vec2::new(960.0, 400.0);
        let mut vel = Vec2::new(2.0, 0.5);
        reflect(&mut pos, &mut vel, 90.0, &bounds());
        assert_eq!(pos.x, 955.0);
        assert!((vel.x - (-1.6)).abs() < 1e-6);
        assert_eq!(vel.y, 0.5);
    }

    #[test]
    fn test_reflect_top_wall() {
        let mut pos = Vec2::new(500.0, 10.0);
        let mut vel = Vec2::new(0.0, -1.0);
        reflect(&mut pos, &mut vel, 80.0, &bounds());
        assert_eq!(pos.y, 40.0);
        assert!((vel.y - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_reflect_inside_is_noop() {
        let mut pos = Vec2::new(500.0, 400.0);
        let mut vel = Vec2::new(0.3, -0.2);
        reflect(&mut pos, &mut vel, 90.0, &bounds());
        assert_eq!(pos, Vec2::new(500.0, 400.0));
        assert_eq!(vel, Vec2::new(0.3, -0.2));
    }

    #[test]
    fn test_brownian_range() {
        let mut rng = Pcg32::seed_from_u64(1);
        for _ in 0..1000 {
            let kick = brownian(&mut rng);
            assert!(kick.x >= -JITTER && kick.x < JITTER);
            assert!(kick.y >= -JITTER && kick.y < JITTER);
        }
    }

    #[test]
    fn test_overlap_pushes_apart() {
        let other = Neighbor {
            pos: Vec2::new(50.0, 0.0),
            size: 90.0,
            group: None,
        };
        let f = pair_force(Vec2::ZERO, 90.0, None, &other, &ClusterSettings::default());
        assert!((f - Vec2::new(-REPULSION, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_attraction_requires_group_match() {
        let cluster = ClusterSettings::default();
        let other = Neighbor {
            pos: Vec2::new(150.0, 0.0),
            size: 90.0,
            group: Some("calm"),
        };
        let same = pair_force(Vec2::ZERO, 90.0, Some("calm"), &other, &cluster);
        assert!(same.x > 0.0 && same.x <= MAX_ATTRACTION);
        assert_eq!(same.y, 0.0);

        let different = pair_force(Vec2::ZERO, 90.0, Some("joy"), &other, &cluster);
        assert_eq!(different, Vec2::ZERO);

        let open = ClusterSettings {
            same_group_only: false,
            ..ClusterSettings::default()
        };
        assert!(pair_force(Vec2::ZERO, 90.0, None, &other, &open).x > 0.0);
    }

    #[test]
    fn test_attraction_cutoff_and_cap() {
        let cluster = ClusterSettings {
            same_group_only: false,
            ..ClusterSettings::default()
        };
        let far = Neighbor {
            pos: Vec2::new(301.0, 0.0),
            size: 90.0,
            group: None,
        };
        assert_eq!(pair_force(Vec2::ZERO, 90.0, None, &far, &cluster), Vec2::ZERO);

        let near = Neighbor {
            pos: Vec2::new(0.0, 61.0),
            size: 1.0,
            group: None,
        };
        let f = pair_force(Vec2::ZERO, 1.0, None, &near, &cluster);
        assert!((f.y - MAX_ATTRACTION).abs() < 1e-6);
    }
}
