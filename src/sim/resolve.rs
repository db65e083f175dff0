//! Resolution batching and fate reporting
//!
//! Resolved bubbles queue up as [`PendingResolution`]s and are flushed in
//! batches: one partition for selected labels, one for everything else, each
//! reduced to the first occurrence of every text.

use serde::{Deserialize, Serialize};

use super::state::BubbleId;

/// How a bubble left the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionKind {
    /// Clicked
    Selected,
    /// Lifetime ran out and the fade completed
    Expired,
    /// Dragged into the edge zone
    Abandoned,
}

impl ResolutionKind {
    pub fn was_selected(&self) -> bool {
        matches!(self, ResolutionKind::Selected)
    }
}

/// A resolution waiting to be reported
#[derive(Debug, Clone, PartialEq)]
pub struct PendingResolution {
    pub id: BubbleId,
    pub text: String,
    pub kind: ResolutionKind,
}

/// One entry of a fate report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FateReport {
    pub item: String,
    pub was_selected: bool,
    pub category: String,
    pub header: String,
}

/// Receives resolution batches
pub trait FateSink {
    fn report(&mut self, batch: &[FateReport]);
}

impl<F> FateSink for F
where
    F: FnMut(&[FateReport]),
{
    fn report(&mut self, batch: &[FateReport]) {
        self(batch)
    }
}

/// Collects every batch for later delivery.
///
/// Hosts that forward reports to outside code drain it once the engine call
/// has returned, so that code never runs in the middle of an engine update.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub batches: Vec<Vec<FateReport>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports across batches, in delivery order
    pub fn reports(&self) -> impl Iterator<Item = &FateReport> {
        self.batches.iter().flatten()
    }

    /// Take every queued batch, oldest first
    pub fn drain(&mut self) -> Vec<Vec<FateReport>> {
        std::mem::take(&mut self.batches)
    }
}

impl FateSink for RecordingSink {
    fn report(&mut self, batch: &[FateReport]) {
        self.batches.push(batch.to_vec());
    }
}

/// Split pending resolutions into report batches.
///
/// Non-selected resolutions come first, then selected ones; within each
/// batch only the first resolution of a given text survives. Empty
/// partitions produce no batch.
pub fn batch_reports(
    pending: &[PendingResolution],
    category: &str,
    header: &str,
) -> Vec<Vec<FateReport>> {
    [false, true]
        .into_iter()
        .filter_map(|selected| {
            let mut batch: Vec<FateReport> = Vec::new();
            for p in pending.iter().filter(|p| p.kind.was_selected() == selected) {
                if batch.iter().any(|r| r.item == p.text) {
                    continue;
                }
                batch.push(FateReport {
                    item: p.text.clone(),
                    was_selected: selected,
                    category: category.to_string(),
                    header: header.to_string(),
                });
            }
            (!batch.is_empty()).then_some(batch)
        })
        .collect()
}

/// Flush pending resolutions to a sink, one call per batch.
///
/// Returns the number of reports delivered.
pub fn flush<S: FateSink + ?Sized>(
    pending: Vec<PendingResolution>,
    category: &str,
    header: &str,
    sink: &mut S,
) -> usize {
    if pending.is_empty() {
        return 0;
    }
    let mut delivered = 0;
    for batch in batch_reports(&pending, category, header) {
        delivered += batch.len();
        sink.report(&batch);
    }
    delivered
}
