//! Bubble field state and core simulation types
//!
//! Everything a mounted field mutates lives in [`FieldState`]; timers and
//! pointer input only ever touch it through the tick functions.

use std::collections::BTreeSet;
use std::fmt;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::drag::DragState;
use super::resolve::{PendingResolution, ResolutionKind};

/// Unique bubble id: random per-field salt in the high half, counter in the low half
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BubbleId(pub u64);

impl fmt::Display for BubbleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl BubbleId {
    pub fn parse(s: &str) -> Option<Self> {
        u64::from_str_radix(s, 16).ok().map(BubbleId)
    }
}

/// One candidate label waiting in the backlog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogEntry {
    pub text: String,
    /// Optional grouping tag used by same-group clustering
    #[serde(default)]
    pub group: Option<String>,
}

impl BacklogEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            group: None,
        }
    }

    pub fn grouped(text: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            group: Some(group.into()),
        }
    }
}

impl From<&str> for BacklogEntry {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for BacklogEntry {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// Lifecycle phase of a bubble
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BubblePhase {
    /// Free-floating under physics
    Active,
    /// Position follows the pointer, velocity pinned to zero
    Dragging,
    /// Fading out, physics frozen
    Fading { started_at: f64 },
}

/// An on-screen bubble
#[derive(Debug, Clone)]
pub struct Bubble {
    pub id: BubbleId,
    pub text: String,
    pub group: Option<String>,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Diameter (px)
    pub size: f32,
    pub created_at: f64,
    pub phase: BubblePhase,
}

impl Bubble {
    pub fn radius(&self) -> f32 {
        self.size / 2.0
    }

    pub fn is_active(&self) -> bool {
        self.phase == BubblePhase::Active
    }

    pub fn is_fading(&self) -> bool {
        matches!(self.phase, BubblePhase::Fading { .. })
    }

    /// Start fading; no-op unless Active
    pub fn begin_fade(&mut self, now: f64) {
        if self.is_active() {
            self.phase = BubblePhase::Fading { started_at: now };
        }
    }

    /// Render opacity in [0, 1]
    pub fn opacity(&self, now: f64, fade_duration_ms: f64) -> f32 {
        match self.phase {
            BubblePhase::Active | BubblePhase::Dragging => 1.0,
            BubblePhase::Fading { started_at } => {
                let t = (now - started_at) / fade_duration_ms;
                (1.0 - t).clamp(0.0, 1.0) as f32
            }
        }
    }

    /// Pin the bubble to the pointer
    pub fn grab(&mut self) {
        self.phase = BubblePhase::Dragging;
        self.vel = Vec2::ZERO;
    }
}

/// Complete engine state for one mounted field
#[derive(Debug, Clone)]
pub struct FieldState {
    /// Seed the field was created with
    pub seed: u64,
    /// On-screen bubbles (sorted by id for determinism)
    pub items: Vec<Bubble>,
    /// Labels not yet spawned
    pub backlog: Vec<BacklogEntry>,
    /// Ids already handed to resolution; each id enters at most once
    pub resolving: BTreeSet<BubbleId>,
    /// Active pointer drag
    pub drag: Option<DragState>,
    /// Resolutions not yet flushed to the fate sink
    pub pending: Vec<PendingResolution>,
    pub(crate) rng: Pcg32,
    id_salt: u32,
    next_id: u32,
}

impl FieldState {
    /// Create a field with the given backlog and seed
    pub fn new<I, E>(backlog: I, seed: u64) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<BacklogEntry>,
    {
        let mut rng = Pcg32::seed_from_u64(seed);
        let id_salt = rng.random();
        Self {
            seed,
            items: Vec::new(),
            backlog: backlog.into_iter().map(Into::into).collect(),
            resolving: BTreeSet::new(),
            drag: None,
            pending: Vec::new(),
            rng,
            id_salt,
            next_id: 1,
        }
    }

    /// Discard all bubbles, drag and resolution state and load a new backlog.
    ///
    /// The RNG keeps running and the id salt is re-rolled, so ids from the
    /// old backlog never collide with the new one.
    pub fn reset<I, E>(&mut self, backlog: I)
    where
        I: IntoIterator<Item = E>,
        E: Into<BacklogEntry>,
    {
        self.items.clear();
        self.backlog = backlog.into_iter().map(Into::into).collect();
        self.resolving.clear();
        self.drag = None;
        self.pending.clear();
        self.id_salt = self.rng.random();
        self.next_id = 1;
    }

    /// Allocate a new bubble id
    pub fn next_bubble_id(&mut self) -> BubbleId {
        let id = BubbleId(((self.id_salt as u64) << 32) | self.next_id as u64);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    pub fn get(&self, id: BubbleId) -> Option<&Bubble> {
        self.items.iter().find(|b| b.id == id)
    }

    pub fn get_mut(&mut self, id: BubbleId) -> Option<&mut Bubble> {
        self.items.iter_mut().find(|b| b.id == id)
    }

    /// Bubbles that count toward the concurrency cap
    pub fn live_count(&self) -> usize {
        self.items.iter().filter(|b| !b.is_fading()).count()
    }

    /// Nothing left to spawn and nothing on screen
    pub fn is_exhausted(&self) -> bool {
        self.backlog.is_empty() && self.items.is_empty()
    }

    /// Resolve a bubble exactly once: claims its id, removes it from the
    /// field and queues it for the fate sink.
    ///
    /// Returns false if the id was already claimed or is unknown.
    pub fn resolve(&mut self, id: BubbleId, kind: ResolutionKind) -> bool {
        let Some(index) = self.items.iter().position(|b| b.id == id) else {
            return false;
        };
        if !self.resolving.insert(id) {
            return false;
        }
        let bubble = self.items.remove(index);
        if self.drag.as_ref().is_some_and(|d| d.item == id) {
            self.drag = None;
        }
        log::debug!("Resolved '{}' ({:?})", bubble.text, kind);
        self.pending.push(PendingResolution {
            id,
            text: bubble.text,
            kind,
        });
        true
    }

    /// Take a bubble off screen and put its label back in the backlog.
    ///
    /// Nothing is reported; the label can spawn again later.
    pub fn requeue(&mut self, id: BubbleId) -> bool {
        if self.resolving.contains(&id) {
            return false;
        }
        let Some(index) = self.items.iter().position(|b| b.id == id) else {
            return false;
        };
        let bubble = self.items.remove(index);
        if self.drag.as_ref().is_some_and(|d| d.item == id) {
            self.drag = None;
        }
        log::debug!("Requeued '{}'", bubble.text);
        self.backlog.push(BacklogEntry {
            text: bubble.text,
            group: bubble.group,
        });
        true
    }

    /// Drain resolutions waiting to be reported
    pub fn take_pending(&mut self) -> Vec<PendingResolution> {
        std::mem::take(&mut self.pending)
    }

    /// Ensure bubbles are sorted by id for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.items.sort_by_key(|b| b.id);
    }
}

#[cfg(test)]
pub(crate) fn test_bubble(state: &mut FieldState, text: &str, pos: Vec2, now: f64) -> BubbleId {
    let id = state.next_bubble_id();
    state.items.push(Bubble {
        id,
        text: text.to_string(),
        group: None,
        pos,
        vel: Vec2::ZERO,
        size: 90.0,
        created_at: now,
        phase: BubblePhase::Active,
    });
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_across_resets() {
        let mut state = FieldState::new(["Joy"], 7);
        let a = state.next_bubble_id();
        let b = state.next_bubble_id();
        assert_ne!(a, b);

        state.reset(["Calm"]);
        let c = state.next_bubble_id();
        assert_ne!(a, c);
        assert_eq!(BubbleId::parse(&c.to_string()), Some(c));
    }

    #[test]
    fn test_resolve_is_at_most_once() {
        let mut state = FieldState::new(Vec::<String>::new(), 1);
        let id = test_bubble(&mut state, "Joy", Vec2::new(100.0, 100.0), 0.0);

        assert!(state.resolve(id, ResolutionKind::Expired));
        assert!(!state.resolve(id, ResolutionKind::Selected));
        assert_eq!(state.pending.len(), 1);
        assert!(state.items.is_empty());
        assert!(state.resolving.contains(&id));
    }

    #[test]
    fn test_requeue_returns_label() {
        let mut state = FieldState::new(Vec::<String>::new(), 1);
        let id = test_bubble(&mut state, "Joy", Vec2::new(100.0, 100.0), 0.0);

        assert!(state.requeue(id));
        assert!(state.items.is_empty());
        assert_eq!(state.backlog, vec![BacklogEntry::new("Joy")]);
        assert!(state.pending.is_empty());
        assert!(!state.resolving.contains(&id));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = FieldState::new(["Joy", "Calm"], 3);
        let id = test_bubble(&mut state, "Joy", Vec2::ZERO, 0.0);
        state.resolve(id, ResolutionKind::Selected);

        state.reset(["Hope"]);
        assert!(state.items.is_empty());
        assert!(state.resolving.is_empty());
        assert!(state.pending.is_empty());
        assert_eq!(state.backlog, vec![BacklogEntry::new("Hope")]);
    }

    #[test]
    fn test_fading_opacity() {
        let mut state = FieldState::new(Vec::<String>::new(), 1);
        let id = test_bubble(&mut state, "Joy", Vec2::ZERO, 0.0);
        let bubble = state.get_mut(id).unwrap();
        assert_eq!(bubble.opacity(500.0, 1000.0), 1.0);

        bubble.begin_fade(1000.0);
        assert!((bubble.opacity(1500.0, 1000.0) - 0.5).abs() < 1e-6);
        assert_eq!(bubble.opacity(2500.0, 1000.0), 0.0);
    }
}
