//! Fixed-period physics tick and cleanup sweep

use glam::Vec2;

use super::bounds::PlayBounds;
use super::physics::{Neighbor, brownian, damp, pair_force, reflect};
use super::resolve::ResolutionKind;
use super::state::{BubbleId, BubblePhase, FieldState};
use crate::settings::EngineSettings;

/// Advance the field by one physics period.
///
/// Active bubbles get forces, damping, integration and wall reflection.
/// Fading bubbles whose fade has finished are resolved as expired and
/// removed. Active bubbles past their lifetime start fading. Dragging
/// bubbles are left alone.
pub fn physics_tick(
    state: &mut FieldState,
    settings: &EngineSettings,
    bounds: &PlayBounds,
    now: f64,
) {
    // Pairwise forces see positions from the start of the tick
    let neighbors: Vec<(BubbleId, Vec2, f32, Option<String>)> = if settings.cluster.enabled {
        state
            .items
            .iter()
            .filter(|b| b.is_active())
            .map(|b| (b.id, b.pos, b.size, b.group.clone()))
            .collect()
    } else {
        Vec::new()
    };

    let mut expired: Vec<BubbleId> = Vec::new();

    for bubble in &mut state.items {
        match bubble.phase {
            BubblePhase::Dragging => continue,
            BubblePhase::Fading { started_at } => {
                if now - started_at >= settings.fade_duration_ms {
                    expired.push(bubble.id);
                }
                continue;
            }
            BubblePhase::Active => {}
        }

        if settings.brownian {
            bubble.vel += brownian(&mut state.rng);
        }

        for (other_id, pos, size, group) in &neighbors {
            if *other_id == bubble.id {
                continue;
            }
            let other = Neighbor {
                pos: *pos,
                size: *size,
                group: group.as_deref(),
            };
            bubble.vel += pair_force(
                bubble.pos,
                bubble.size,
                bubble.group.as_deref(),
                &other,
                &settings.cluster,
            );
        }

        bubble.vel = damp(bubble.vel);
        bubble.pos += bubble.vel;
        reflect(&mut bubble.pos, &mut bubble.vel, bubble.size, bounds);

        if now - bubble.created_at >= settings.lifetime_ms {
            bubble.begin_fade(now);
        }
    }

    for id in expired {
        state.resolve(id, ResolutionKind::Expired);
    }
}

/// Cleanup sweep: drop bubbles that are already resolving and return any
/// bubble stuck in Dragging without a live drag to Active.
///
/// Returns the number of bubbles touched.
pub fn cleanup_tick(state: &mut FieldState) -> usize {
    let before = state.items.len();
    let resolving = &state.resolving;
    state.items.retain(|b| !resolving.contains(&b.id));
    let mut touched = before - state.items.len();

    let dragged = state.drag.map(|d| d.item);
    for bubble in &mut state.items {
        if bubble.phase == BubblePhase::Dragging && dragged != Some(bubble.id) {
            bubble.phase = BubblePhase::Active;
            touched += 1;
        }
    }

    if touched > 0 {
        log::warn!("Cleanup repaired {} bubbles", touched);
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::sim::bounds::Viewport;
    use crate::sim::drag::DragState;
    use crate::sim::state::test_bubble;

    fn quiet_settings() -> EngineSettings {
        let mut settings = EngineSettings::default();
        settings.brownian = false;
        settings.cluster.enabled = false;
        settings
    }

    fn bounds() -> PlayBounds {
        PlayBounds::new(Viewport::new(1280.0, 800.0), None)
    }

    #[test]
    fn test_right_edge_reflection() {
        let settings = quiet_settings();
        let mut state = FieldState::new(Vec::<String>::new(), 1);
        let id = test_bubble(&mut state, "Joy", Vec2::new(1280.0 - 45.0, 400.0), 0.0);
        state.get_mut(id).unwrap().vel = Vec2::new(2.0, 0.0);

        physics_tick(&mut state, &settings, &bounds(), 50.0);

        let b = state.get(id).unwrap();
        assert!(b.pos.x + b.size / 2.0 <= 1280.0 + 1e-3);
        let expected = -2.0 * DAMPING * RESTITUTION;
        assert!((b.vel.x - expected).abs() < 1e-6, "vx {}", b.vel.x);
    }

    #[test]
    fn test_damping_decay() {
        let settings = quiet_settings();
        let mut state = FieldState::new(Vec::<String>::new(), 1);
        let id = test_bubble(&mut state, "Joy", Vec2::new(640.0, 400.0), 0.0);
        let v0 = Vec2::new(0.6, -0.4);
        state.get_mut(id).unwrap().vel = v0;

        for n in 1..=20 {
            physics_tick(&mut state, &settings, &bounds(), n as f64 * 50.0);
        }

        let expected = v0 * DAMPING.powi(20);
        let vel = state.get(id).unwrap().vel;
        assert!((vel - expected).length() < 1e-5);
    }

    #[test]
    fn test_lifetime_then_fade_then_expire() {
        let mut settings = quiet_settings();
        settings.lifetime_ms = 1000.0;
        settings.fade_duration_ms = 500.0;
        let mut state = FieldState::new(Vec::<String>::new(), 1);
        let id = test_bubble(&mut state, "Joy", Vec2::new(640.0, 400.0), 0.0);

        physics_tick(&mut state, &settings, &bounds(), 950.0);
        assert!(state.get(id).unwrap().is_active());

        physics_tick(&mut state, &settings, &bounds(), 1000.0);
        assert_eq!(
            state.get(id).unwrap().phase,
            BubblePhase::Fading { started_at: 1000.0 }
        );

        physics_tick(&mut state, &settings, &bounds(), 1450.0);
        assert!(state.get(id).is_some());

        physics_tick(&mut state, &settings, &bounds(), 1500.0);
        assert!(state.get(id).is_none());
        assert_eq!(state.pending.len(), 1);
        assert_eq!(state.pending[0].kind, ResolutionKind::Expired);

        physics_tick(&mut state, &settings, &bounds(), 1550.0);
        assert_eq!(state.pending.len(), 1);
    }

    #[test]
    fn test_fading_bubble_is_frozen() {
        let settings = quiet_settings();
        let mut state = FieldState::new(Vec::<String>::new(), 1);
        let id = test_bubble(&mut state, "Joy", Vec2::new(640.0, 400.0), 0.0);
        {
            let b = state.get_mut(id).unwrap();
            b.vel = Vec2::new(0.5, 0.5);
            b.begin_fade(0.0);
        }
        physics_tick(&mut state, &settings, &bounds(), 50.0);
        assert_eq!(state.get(id).unwrap().pos, Vec2::new(640.0, 400.0));
    }

    #[test]
    fn test_dragging_bubble_skips_lifetime() {
        let mut settings = quiet_settings();
        settings.lifetime_ms = 100.0;
        let mut state = FieldState::new(Vec::<String>::new(), 1);
        let id = test_bubble(&mut state, "Joy", Vec2::new(640.0, 400.0), 0.0);
        state.get_mut(id).unwrap().grab();

        physics_tick(&mut state, &settings, &bounds(), 10_000.0);
        assert_eq!(state.get(id).unwrap().phase, BubblePhase::Dragging);
    }

    #[test]
    fn test_fade_timeout_races_click() {
        let settings = quiet_settings();
        let mut state = FieldState::new(Vec::<String>::new(), 1);
        let id = test_bubble(&mut state, "Joy", Vec2::new(640.0, 400.0), 0.0);
        state.get_mut(id).unwrap().begin_fade(0.0);

        // Click lands first, then the fade completes in the same tick
        assert!(state.resolve(id, ResolutionKind::Selected));
        physics_tick(&mut state, &settings, &bounds(), 5000.0);
        assert!(!state.resolve(id, ResolutionKind::Expired));

        assert_eq!(state.pending.len(), 1);
        assert!(state.pending[0].kind.was_selected());
    }

    #[test]
    fn test_cluster_separates_overlapping_pair() {
        let mut settings = quiet_settings();
        settings.cluster.enabled = true;
        let mut state = FieldState::new(Vec::<String>::new(), 1);
        let a = test_bubble(&mut state, "Joy", Vec2::new(600.0, 400.0), 0.0);
        let b = test_bubble(&mut state, "Calm", Vec2::new(630.0, 400.0), 0.0);

        let before = state.get(b).unwrap().pos.x - state.get(a).unwrap().pos.x;
        physics_tick(&mut state, &settings, &bounds(), 50.0);
        let after = state.get(b).unwrap().pos.x - state.get(a).unwrap().pos.x;
        assert!(after > before);
    }

    #[test]
    fn test_cleanup_repairs_state() {
        let mut state = FieldState::new(Vec::<String>::new(), 1);
        let stuck = test_bubble(&mut state, "Joy", Vec2::new(400.0, 400.0), 0.0);
        let held = test_bubble(&mut state, "Calm", Vec2::new(600.0, 400.0), 0.0);
        let stale = test_bubble(&mut state, "Hope", Vec2::new(800.0, 400.0), 0.0);

        state.get_mut(stuck).unwrap().grab();
        state.get_mut(held).unwrap().grab();
        state.drag = Some(DragState {
            item: held,
            start: Vec2::new(600.0, 400.0),
            last: Vec2::new(600.0, 400.0),
        });
        state.resolving.insert(stale);

        assert_eq!(cleanup_tick(&mut state), 2);
        assert_eq!(state.get(stuck).unwrap().phase, BubblePhase::Active);
        assert_eq!(state.get(held).unwrap().phase, BubblePhase::Dragging);
        assert!(state.get(stale).is_none());
        assert_eq!(cleanup_tick(&mut state), 0);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::consts::DAMPING;
    use crate::sim::bounds::Viewport;
    use crate::sim::state::test_bubble;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn free_velocity_decays_geometrically(
            vx in -0.75f32..0.75,
            vy in -0.75f32..0.75,
            ticks in 1u32..40,
        ) {
            let mut settings = EngineSettings::default();
            settings.brownian = false;
            settings.cluster.enabled = false;
            let bounds = PlayBounds::new(Viewport::new(1280.0, 800.0), None);
            let mut state = FieldState::new(Vec::<String>::new(), 1);
            let id = test_bubble(&mut state, "Joy", Vec2::new(640.0, 400.0), 0.0);
            state.get_mut(id).unwrap().vel = Vec2::new(vx, vy);

            for n in 1..=ticks {
                physics_tick(&mut state, &settings, &bounds, n as f64 * 50.0);
            }

            let factor = DAMPING.powi(ticks as i32);
            let vel = state.get(id).unwrap().vel;
            prop_assert!((vel.x - vx * factor).abs() < 1e-5);
            prop_assert!((vel.y - vy * factor).abs() < 1e-5);
        }

        #[test]
        fn edges_stay_inside_bounds(
            x in 0.0f32..1280.0,
            y in 0.0f32..800.0,
            vx in -20.0f32..20.0,
            vy in -20.0f32..20.0,
        ) {
            let mut settings = EngineSettings::default();
            settings.brownian = false;
            let bounds = PlayBounds::new(Viewport::new(1280.0, 800.0), None);
            let mut state = FieldState::new(Vec::<String>::new(), 1);
            let id = test_bubble(&mut state, "Joy", Vec2::new(x, y), 0.0);
            state.get_mut(id).unwrap().vel = Vec2::new(vx, vy);

            physics_tick(&mut state, &settings, &bounds, 50.0);

            let b = state.get(id).unwrap();
            let half = b.size / 2.0;
            prop_assert!(b.pos.x - half >= -1e-3 && b.pos.x + half <= 1280.0 + 1e-3);
            prop_assert!(b.pos.y - half >= -1e-3 && b.pos.y + half <= 800.0 + 1e-3);
        }
    }
}
