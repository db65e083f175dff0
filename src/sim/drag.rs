//! Pointer drag state machine
//!
//! Idle -> Dragging on pointer-down over a bubble. From Dragging:
//! - pointer-up with a small displacement selects the bubble (click)
//! - pointer-up after a real drag lets it float again
//! - moving the pointer into the edge zone abandons it
//!
//! Each transition consumes the current drag record and the event and
//! installs the next one, so no handler ever acts on a stale record.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::bounds::Viewport;
use super::resolve::ResolutionKind;
use super::state::{BubbleId, BubblePhase, FieldState};
use crate::centered;
use crate::consts::SPAWN_SPEED_SPREAD;
use crate::settings::{AbandonPolicy, EngineSettings};

/// Pointer input in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { id: BubbleId, x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up { x: f32, y: f32 },
}

/// The active drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub item: BubbleId,
    /// Pointer position at pointer-down
    pub start: Vec2,
    /// Last pointer position seen
    pub last: Vec2,
}

/// What a pointer event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    /// Stray or rejected event
    Ignored,
    Started(BubbleId),
    Moved(BubbleId),
    /// Released after a real drag; floating again
    Released(BubbleId),
    /// Released as a click
    Selected(BubbleId),
    /// Dragged into the edge zone and resolved
    Abandoned(BubbleId),
    /// Dragged into the edge zone and returned to the backlog
    Requeued(BubbleId),
}

/// Apply one pointer event to the field
pub fn handle_pointer(
    state: &mut FieldState,
    event: PointerEvent,
    viewport: Viewport,
    settings: &EngineSettings,
) -> DragOutcome {
    let current = state.drag.take();

    match (current, event) {
        (current, PointerEvent::Down { id, x, y }) => {
            let grabbable = !state.resolving.contains(&id) && state.get(id).is_some();
            if !grabbable {
                state.drag = current;
                return DragOutcome::Ignored;
            }
            // A second pointer-down replaces the old drag; the old bubble floats on
            if let Some(old) = current
                && old.item != id
            {
                release(state, old.item, settings);
            }
            if let Some(bubble) = state.get_mut(id) {
                bubble.grab();
            }
            let p = Vec2::new(x, y);
            state.drag = Some(DragState {
                item: id,
                start: p,
                last: p,
            });
            DragOutcome::Started(id)
        }

        (None, PointerEvent::Move { .. } | PointerEvent::Up { .. }) => DragOutcome::Ignored,

        (Some(mut drag), PointerEvent::Move { x, y }) => {
            let p = Vec2::new(x, y);
            let delta = p - drag.last;
            drag.last = p;
            let Some(bubble) = state.get_mut(drag.item) else {
                return DragOutcome::Ignored;
            };
            bubble.pos += delta;

            if viewport.near_edge(p, settings.edge_threshold) {
                return match settings.abandon {
                    AbandonPolicy::Resolve => {
                        state.resolve(drag.item, ResolutionKind::Abandoned);
                        DragOutcome::Abandoned(drag.item)
                    }
                    AbandonPolicy::Requeue => {
                        state.requeue(drag.item);
                        DragOutcome::Requeued(drag.item)
                    }
                };
            }

            state.drag = Some(drag);
            DragOutcome::Moved(drag.item)
        }

        (Some(drag), PointerEvent::Up { x, y }) => {
            let displacement = Vec2::new(x, y) - drag.start;
            if displacement.length() < settings.click_threshold {
                if state.resolve(drag.item, ResolutionKind::Selected) {
                    DragOutcome::Selected(drag.item)
                } else {
                    DragOutcome::Ignored
                }
            } else {
                release(state, drag.item, settings);
                DragOutcome::Released(drag.item)
            }
        }
    }
}

/// Let a dragged bubble float again
fn release(state: &mut FieldState, id: BubbleId, settings: &EngineSettings) {
    let vel = if settings.randomize_on_release {
        Vec2::new(
            centered(state.rng.random(), SPAWN_SPEED_SPREAD),
            centered(state.rng.random(), SPAWN_SPEED_SPREAD),
        )
    } else {
        Vec2::ZERO
    };
    if let Some(bubble) = state.get_mut(id)
        && bubble.phase == BubblePhase::Dragging
    {
        bubble.phase = BubblePhase::Active;
        bubble.vel = vel;
    }
}
