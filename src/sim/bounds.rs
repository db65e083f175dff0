//! Playable bounds
//!
//! Full-viewport bounds by default; lane mode narrows the horizontal extent
//! to a centered column with an inner margin. Vertical bounds always follow
//! the viewport.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::settings::LaneSettings;

/// Viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// True if `p` is within `threshold` of any edge (or outside)
    pub fn near_edge(&self, p: Vec2, threshold: f32) -> bool {
        p.x < threshold
            || p.x > self.width - threshold
            || p.y < threshold
            || p.y > self.height - threshold
    }
}

/// Lane geometry for a given viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneLayout {
    pub left: f32,
    pub width: f32,
    pub effective_left: f32,
    pub effective_width: f32,
}

impl LaneLayout {
    /// Compute the lane. Width is clamped to 10-100% of the viewport and the
    /// margin to half the lane width.
    pub fn compute(viewport_width: f32, lane: LaneSettings) -> Self {
        let percent = lane.width_percent.clamp(10.0, 100.0);
        let width = viewport_width * percent / 100.0;
        let left = (viewport_width - width) / 2.0;
        let margin = lane.margin.clamp(0.0, width / 2.0);
        Self {
            left,
            width,
            effective_left: left + margin,
            effective_width: width - 2.0 * margin,
        }
    }
}

/// Edge rectangle bubbles must stay inside (bubble edges, not centers)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayBounds {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub lane: Option<LaneLayout>,
}

impl PlayBounds {
    pub fn new(viewport: Viewport, lane: Option<LaneSettings>) -> Self {
        let lane = lane.map(|l| LaneLayout::compute(viewport.width, l));
        let (left, right) = match lane {
            Some(l) => (l.effective_left, l.effective_left + l.effective_width),
            None => (0.0, viewport.width),
        };
        Self {
            left,
            right,
            top: 0.0,
            bottom: viewport.height,
            lane,
        }
    }

    /// Allowed center range on each axis, inset from every edge by `inset`.
    ///
    /// Collapses to the midpoint when the region is narrower than the inset.
    pub fn center_range(&self, inset: f32) -> ((f32, f32), (f32, f32)) {
        (
            inset_range(self.left, self.right, inset),
            inset_range(self.top, self.bottom, inset),
        )
    }
}

fn inset_range(lo: f32, hi: f32, inset: f32) -> (f32, f32) {
    let (a, b) = (lo + inset, hi - inset);
    if a <= b {
        (a, b)
    } else {
        let mid = (lo + hi) / 2.0;
        (mid, mid)
    }
}
