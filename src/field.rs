//! A mounted bubble field
//!
//! Owns the engine state, its timers, the viewport bounds and the fate sink.
//! Hosts feed it timestamps and pointer events; it reports resolved bubbles
//! to the sink after every call that can resolve something.

use serde::{Deserialize, Serialize};

use crate::settings::{EngineSettings, SettingsError};
use crate::sim::{
    BacklogEntry, BubbleId, BubblePhase, DragOutcome, FateSink, FieldState, PlayBounds,
    PointerEvent, Scheduler, TimerKind, Viewport, cleanup_tick, flush, handle_pointer,
    physics_tick, spawn_tick,
};

/// Render phase of a bubble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewPhase {
    Active,
    Dragging,
    Fading,
}

/// What the render layer needs to draw one bubble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleView {
    pub id: BubbleId,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub opacity: f32,
    pub phase: ViewPhase,
}

/// Bubble field bound to one backlog at a time
#[derive(Debug)]
pub struct BubbleField<S: FateSink> {
    state: FieldState,
    scheduler: Scheduler,
    settings: EngineSettings,
    viewport: Viewport,
    bounds: PlayBounds,
    category: String,
    header: String,
    sink: S,
    /// Bumped on every mount and unmount; timers carry the value they were
    /// scheduled under
    generation: u64,
    mounted: bool,
}

impl<S: FateSink> BubbleField<S> {
    /// Create an unmounted field
    pub fn new(
        settings: EngineSettings,
        viewport: Viewport,
        seed: u64,
        sink: S,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let bounds = PlayBounds::new(viewport, settings.lane);
        Ok(Self {
            state: FieldState::new(Vec::<BacklogEntry>::new(), seed),
            scheduler: Scheduler::default(),
            settings,
            viewport,
            bounds,
            category: String::new(),
            header: String::new(),
            sink,
            generation: 0,
            mounted: false,
        })
    }

    /// Mount with a backlog, or replace the current backlog wholesale.
    ///
    /// Discards every bubble, drag and resolution record of the previous
    /// backlog and restarts the timers from `now`. Returns the new generation.
    pub fn mount<I, E>(
        &mut self,
        backlog: I,
        category: impl Into<String>,
        header: impl Into<String>,
        now: f64,
    ) -> u64
    where
        I: IntoIterator<Item = E>,
        E: Into<BacklogEntry>,
    {
        self.state.reset(backlog);
        self.category = category.into();
        self.header = header.into();
        self.scheduler = Scheduler::new(&self.settings, now);
        self.generation += 1;
        self.mounted = true;
        log::info!(
            "Mounted '{}' / '{}' with {} labels (generation {})",
            self.header,
            self.category,
            self.state.backlog.len(),
            self.generation
        );
        self.generation
    }

    /// Tear down: cancel timers and drop all state. Later calls are no-ops
    /// until the next mount.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.scheduler.clear();
        self.state.reset(Vec::<BacklogEntry>::new());
        self.generation += 1;
        self.mounted = false;
        log::info!("Unmounted field");
    }

    /// Recompute bounds for a new viewport. Existing bubbles keep their
    /// positions; the next physics tick pulls stragglers back inside.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.bounds = PlayBounds::new(viewport, self.settings.lane);
        log::debug!("Viewport resized to {}x{}", viewport.width, viewport.height);
    }

    /// Swap settings; timers restart from `now` when mounted
    pub fn set_settings(&mut self, settings: EngineSettings, now: f64) -> Result<(), SettingsError> {
        settings.validate()?;
        self.settings = settings;
        self.bounds = PlayBounds::new(self.viewport, self.settings.lane);
        if self.mounted {
            self.scheduler = Scheduler::new(&self.settings, now);
        }
        Ok(())
    }

    /// Run every timer due at `now`, then report resolutions.
    ///
    /// Returns the number of fate reports delivered.
    pub fn advance(&mut self, now: f64) -> usize {
        if !self.mounted {
            return 0;
        }
        for fire in self.scheduler.due(now) {
            match fire.kind {
                TimerKind::Spawn => {
                    spawn_tick(&mut self.state, &self.settings, &self.bounds, fire.at_ms);
                }
                TimerKind::Physics => {
                    physics_tick(&mut self.state, &self.settings, &self.bounds, fire.at_ms);
                }
                TimerKind::Cleanup => {
                    cleanup_tick(&mut self.state);
                }
            }
        }
        self.report_pending()
    }

    /// [`advance`](Self::advance) on behalf of a timer scheduled under
    /// `generation`; stale timers get `None` and change nothing.
    pub fn advance_for(&mut self, generation: u64, now: f64) -> Option<usize> {
        if generation != self.generation || !self.mounted {
            log::debug!("Ignoring stale timer (generation {})", generation);
            return None;
        }
        Some(self.advance(now))
    }

    /// Apply a pointer event, then report resolutions
    pub fn pointer(&mut self, event: PointerEvent) -> DragOutcome {
        if !self.mounted {
            return DragOutcome::Ignored;
        }
        let outcome = handle_pointer(&mut self.state, event, self.viewport, &self.settings);
        self.report_pending();
        outcome
    }

    fn report_pending(&mut self) -> usize {
        let pending = self.state.take_pending();
        let delivered = flush(pending, &self.category, &self.header, &mut self.sink);
        if delivered > 0 {
            log::debug!("Reported {} resolutions for '{}'", delivered, self.category);
        }
        delivered
    }

    /// Render views for every bubble on screen
    pub fn views(&self, now: f64) -> Vec<BubbleView> {
        self.state
            .items
            .iter()
            .map(|b| BubbleView {
                id: b.id,
                text: b.text.clone(),
                x: b.pos.x,
                y: b.pos.y,
                size: b.size,
                opacity: b.opacity(now, self.settings.fade_duration_ms),
                phase: match b.phase {
                    BubblePhase::Active => ViewPhase::Active,
                    BubblePhase::Dragging => ViewPhase::Dragging,
                    BubblePhase::Fading { .. } => ViewPhase::Fading,
                },
            })
            .collect()
    }

    /// Mounted, nothing left in the backlog and nothing on screen
    pub fn is_exhausted(&self) -> bool {
        self.mounted && self.state.is_exhausted()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> &FieldState {
        &self.state
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn bounds(&self) -> &PlayBounds {
        &self.bounds
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Bubble at a viewport point (topmost wins)
    pub fn hit_test(&self, x: f32, y: f32) -> Option<BubbleId> {
        let p = glam::Vec2::new(x, y);
        self.state
            .items
            .iter()
            .rev()
            .find(|b| b.pos.distance(p) <= b.radius())
            .map(|b| b.id)
    }
}
