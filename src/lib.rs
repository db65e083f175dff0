//! Mood Bubbles - a floating emotion/needs picker
//!
//! Core modules:
//! - `sim`: Deterministic bubble engine (spawning, physics, drag, resolution)
//! - `field`: Mounted bubble field (timers, viewport, fate reporting)
//! - `settings`: Engine configuration and presets
//! - `source`: Candidate labels loaded from category tables
//! - `session`: Stage/category progression across a journaling session

pub mod field;
pub mod session;
pub mod settings;
pub mod sim;
pub mod source;

pub use field::BubbleField;
pub use settings::{EngineSettings, FieldPreset};

use glam::Vec2;

/// Engine reference constants
pub mod consts {
    /// Spawn timer period (ms)
    pub const SPAWN_INTERVAL_MS: f64 = 2000.0;
    /// Physics timer period (ms)
    pub const PHYSICS_INTERVAL_MS: f64 = 50.0;
    /// Cleanup sweep period (ms)
    pub const CLEANUP_INTERVAL_MS: f64 = 1000.0;
    /// Maximum catch-up fires per timer per advance (prevents spiral of death)
    pub const MAX_CATCH_UP: u32 = 8;

    /// Concurrent non-fading bubbles allowed on screen
    pub const MAX_CONCURRENT: usize = 5;
    /// Time a bubble floats before it starts fading (ms)
    pub const LIFETIME_MS: f64 = 15_000.0;
    /// Fade-out duration (ms)
    pub const FADE_DURATION_MS: f64 = 1000.0;

    /// Bubble size range: 80 + random * 20
    pub const MIN_SIZE: f32 = 80.0;
    pub const SIZE_SPREAD: f32 = 20.0;
    /// Spawn velocity per axis: (random - 0.5) * 1.5
    pub const SPAWN_SPEED_SPREAD: f32 = 1.5;
    /// Placement search attempts before accepting an overlapping spot
    pub const PLACEMENT_ATTEMPTS: u32 = 50;
    /// Spawn inset from playable edges, as a multiple of size
    pub const SPAWN_INSET: f32 = 1.2;
    /// Minimum spacing divisor: centers closer than (a + b) / 1.5 overlap
    pub const SPACING_DIVISOR: f32 = 1.5;

    /// Brownian jitter per axis per tick
    pub const JITTER: f32 = 0.15;
    /// Velocity retained per physics tick
    pub const DAMPING: f32 = 0.95;
    /// Wall bounce retention
    pub const RESTITUTION: f32 = 0.8;
    /// Separation push for overlapping bubbles
    pub const REPULSION: f32 = 0.8;
    /// Attraction magnitude cap
    pub const MAX_ATTRACTION: f32 = 0.1;
    /// Attraction numerator (force = strength / d²)
    pub const ATTRACTION_STRENGTH: f32 = 1000.0;
    /// Maximum attraction range (px)
    pub const INTERACTION_RADIUS: f32 = 300.0;

    /// Pointer within this distance of a viewport edge abandons the drag (px)
    pub const EDGE_THRESHOLD: f32 = 100.0;
    /// Release displacement below this is a click (px)
    pub const CLICK_THRESHOLD: f32 = 5.0;

    /// Lane mode defaults
    pub const LANE_WIDTH_PERCENT: f32 = 50.0;
    pub const LANE_MARGIN: f32 = 100.0;
}

/// Uniform sample in [-half_spread, half_spread) from a unit random value
#[inline]
pub fn centered(unit: f32, spread: f32) -> f32 {
    (unit - 0.5) * spread
}

/// Direction from `b` to `a`, or `fallback` when the points coincide
#[inline]
pub fn direction_or(a: Vec2, b: Vec2, fallback: Vec2) -> Vec2 {
    let delta = a - b;
    let len = delta.length();
    if len > f32::EPSILON { delta / len } else { fallback }
}
