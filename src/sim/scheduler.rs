//! Periodic timers driven by injected timestamps
//!
//! The host calls [`Scheduler::due`] with the current time and runs the
//! returned fires in order. Tests drive it with synthetic timestamps.

use serde::{Deserialize, Serialize};

use crate::consts::MAX_CATCH_UP;
use crate::settings::EngineSettings;

/// Which timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimerKind {
    Physics,
    Spawn,
    Cleanup,
}

/// A fixed-period timer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    pub kind: TimerKind,
    pub period_ms: f64,
    pub next_due_ms: f64,
}

impl Timer {
    pub fn new(kind: TimerKind, period_ms: f64, start_ms: f64) -> Self {
        Self {
            kind,
            period_ms,
            next_due_ms: start_ms + period_ms,
        }
    }
}

/// One timer fire at its scheduled time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fire {
    pub at_ms: f64,
    pub kind: TimerKind,
}

/// The field's timers
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    timers: Vec<Timer>,
}

impl Scheduler {
    /// Spawn, physics and (optionally) cleanup timers starting at `now`
    pub fn new(settings: &EngineSettings, now: f64) -> Self {
        let mut timers = vec![
            Timer::new(TimerKind::Physics, settings.physics_interval_ms, now),
            Timer::new(TimerKind::Spawn, settings.spawn_interval_ms, now),
        ];
        if let Some(period) = settings.cleanup_interval_ms {
            timers.push(Timer::new(TimerKind::Cleanup, period, now));
        }
        Self { timers }
    }

    /// Cancel every timer
    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    /// Collect every fire due at or before `now`, oldest first.
    ///
    /// Each timer fires at most [`MAX_CATCH_UP`] times per call; anything
    /// beyond that is skipped and the timer is re-phased from `now`.
    pub fn due(&mut self, now: f64) -> Vec<Fire> {
        let mut fires = Vec::new();
        for timer in &mut self.timers {
            let mut count = 0;
            while timer.next_due_ms <= now && count < MAX_CATCH_UP {
                fires.push(Fire {
                    at_ms: timer.next_due_ms,
                    kind: timer.kind,
                });
                timer.next_due_ms += timer.period_ms;
                count += 1;
            }
            if timer.next_due_ms <= now {
                log::warn!(
                    "{:?} timer fell behind by {:.0}ms, skipping",
                    timer.kind,
                    now - timer.next_due_ms
                );
                timer.next_due_ms = now + timer.period_ms;
            }
        }
        fires.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms).then(a.kind.cmp(&b.kind)));
        fires
    }
}
