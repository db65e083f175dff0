//! Deterministic bubble engine
//!
//! All field logic lives here. This module must be pure and deterministic:
//! - Timestamps are injected, never read from a clock
//! - Seeded RNG only
//! - Stable iteration order (by bubble id)
//! - No rendering or platform dependencies

pub mod bounds;
pub mod drag;
pub mod physics;
pub mod resolve;
pub mod scheduler;
pub mod spawn;
pub mod state;
pub mod tick;

pub use bounds::{LaneLayout, PlayBounds, Viewport};
pub use drag::{DragOutcome, DragState, PointerEvent, handle_pointer};
pub use resolve::{
    FateReport, FateSink, PendingResolution, RecordingSink, ResolutionKind, batch_reports, flush,
};
pub use scheduler::{Fire, Scheduler, Timer, TimerKind};
pub use spawn::{find_spawn_position, spawn_tick};
pub use state::{BacklogEntry, Bubble, BubbleId, BubblePhase, FieldState};
pub use tick::{cleanup_tick, physics_tick};
