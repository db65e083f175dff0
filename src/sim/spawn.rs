//! Bubble spawning from the backlog

use glam::Vec2;
use rand::Rng;

use super::bounds::PlayBounds;
use super::state::{Bubble, BubbleId, BubblePhase, FieldState};
use crate::centered;
use crate::consts::*;
use crate::settings::EngineSettings;

/// Pick a spawn position that does not overlap existing bubbles.
///
/// Samples uniformly inside the bounds, accepting the first spot whose
/// center distance to every bubble exceeds `(size + other) / 1.5`. After
/// [`PLACEMENT_ATTEMPTS`] misses the last sample is used anyway.
///
/// The full viewport is inset by `size * 1.2`; a lane already carries its
/// own margin, so there the bubble only has to fit (inset by the radius).
pub fn find_spawn_position<R: Rng>(
    rng: &mut R,
    items: &[Bubble],
    size: f32,
    bounds: &PlayBounds,
) -> Vec2 {
    let inset = if bounds.lane.is_some() {
        size / 2.0
    } else {
        size * SPAWN_INSET
    };
    let ((x0, x1), (y0, y1)) = bounds.center_range(inset);
    let mut candidate = Vec2::new(x0, y0);

    for _ in 0..PLACEMENT_ATTEMPTS {
        candidate = Vec2::new(
            x0 + rng.random::<f32>() * (x1 - x0),
            y0 + rng.random::<f32>() * (y1 - y0),
        );
        let clear = items
            .iter()
            .all(|other| candidate.distance(other.pos) > (size + other.size) / SPACING_DIVISOR);
        if clear {
            return candidate;
        }
    }

    log::warn!(
        "No free spawn spot after {} attempts, accepting overlap",
        PLACEMENT_ATTEMPTS
    );
    candidate
}

/// Spawn timer body: move one random backlog label onto the field.
///
/// No-op when the backlog is empty or the concurrency cap is reached.
pub fn spawn_tick(
    state: &mut FieldState,
    settings: &EngineSettings,
    bounds: &PlayBounds,
    now: f64,
) -> Option<BubbleId> {
    if state.backlog.is_empty() {
        return None;
    }
    if let Some(cap) = settings.max_concurrent
        && state.live_count() >= cap
    {
        return None;
    }

    let index = state.rng.random_range(0..state.backlog.len());
    let entry = state.backlog.swap_remove(index);

    let size = state.rng.random_range(MIN_SIZE..MIN_SIZE + SIZE_SPREAD);
    let pos = find_spawn_position(&mut state.rng, &state.items, size, bounds);
    let vel = Vec2::new(
        centered(state.rng.random(), SPAWN_SPEED_SPREAD),
        centered(state.rng.random(), SPAWN_SPEED_SPREAD),
    );

    let id = state.next_bubble_id();
    log::debug!("Spawned '{}' at ({:.0}, {:.0})", entry.text, pos.x, pos.y);
    state.items.push(Bubble {
        id,
        text: entry.text,
        group: entry.group,
        pos,
        vel,
        size,
        created_at: now,
        phase: BubblePhase::Active,
    });
    state.normalize_order();

    Some(id)
}
