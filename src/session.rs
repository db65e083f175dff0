//! Stage and category progression
//!
//! A session walks every category of the current stage, then moves to the
//! next stage, then finishes. Each category gets a fresh field backlog.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sim::{BacklogEntry, FateReport};
use crate::source::{CategoryTable, ItemSource, SourceError};

/// The three stages in session order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Positive,
    Negative,
    Needs,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [StageKind::Positive, StageKind::Negative, StageKind::Needs];

    /// Header shown above the field and attached to every fate report
    pub fn title(&self) -> &'static str {
        match self {
            StageKind::Positive => "Positive Feelings",
            StageKind::Negative => "Challenging Feelings",
            StageKind::Needs => "Current Needs",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Positive => "positive",
            StageKind::Negative => "negative",
            StageKind::Needs => "needs",
        }
    }

    /// Conventional table file name for this stage
    pub fn data_file(&self) -> &'static str {
        match self {
            StageKind::Positive => "feelings_positive.csv",
            StageKind::Negative => "feelings_negative.csv",
            StageKind::Needs => "needs.csv",
        }
    }
}

/// One stage and the table backing it
#[derive(Debug, Clone)]
pub struct Stage<S = CategoryTable> {
    pub kind: StageKind,
    pub source: S,
}

impl<S: ItemSource> Stage<S> {
    pub fn new(kind: StageKind, source: S) -> Self {
        Self { kind, source }
    }
}

/// Where the session went after a category completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    NextCategory,
    NextStage,
    Finished,
}

/// Progress through all stages
#[derive(Debug, Clone)]
pub struct Session<S = CategoryTable> {
    stages: Vec<Stage<S>>,
    stage: usize,
    category: usize,
    selections: BTreeMap<StageKind, Vec<String>>,
    finished: bool,
}

impl<S: ItemSource> Session<S> {
    pub fn new(stages: Vec<Stage<S>>) -> Self {
        let mut session = Self {
            stages,
            stage: 0,
            category: 0,
            selections: BTreeMap::new(),
            finished: false,
        };
        session.skip_empty_stages();
        session
    }

    fn skip_empty_stages(&mut self) {
        while let Some(stage) = self.stages.get(self.stage) {
            if stage.source.category_count() > 0 {
                return;
            }
            log::warn!("Stage '{}' has no categories, skipping", stage.kind.title());
            self.stage += 1;
        }
        self.finished = true;
    }

    fn current(&self) -> Option<&Stage<S>> {
        if self.finished {
            return None;
        }
        self.stages.get(self.stage)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stage_kind(&self) -> Option<StageKind> {
        self.current().map(|s| s.kind)
    }

    /// Stage title, used as the fate report header
    pub fn header(&self) -> Option<&'static str> {
        self.current().map(|s| s.kind.title())
    }

    /// Current category name
    pub fn category(&self) -> Option<&str> {
        self.current()
            .and_then(|s| s.source.categories().get(self.category))
            .map(String::as_str)
    }

    /// (stage index, category index)
    pub fn position(&self) -> (usize, usize) {
        (self.stage, self.category)
    }

    /// Labels for the current category. Empty once the session is finished.
    pub fn current_backlog(&self) -> Result<Vec<BacklogEntry>, SourceError> {
        match self.current() {
            Some(stage) => stage.source.items(self.category),
            None => Ok(Vec::new()),
        }
    }

    /// Keep the selected labels of a fate report batch for the current stage
    pub fn record(&mut self, reports: &[FateReport]) {
        let Some(kind) = self.stage_kind() else {
            return;
        };
        let selected = self.selections.entry(kind).or_default();
        for report in reports.iter().filter(|r| r.was_selected) {
            if !selected.contains(&report.item) {
                selected.push(report.item.clone());
            }
        }
    }

    /// Selected labels for one stage, in selection order
    pub fn selections(&self, kind: StageKind) -> &[String] {
        self.selections.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_selections(&self) -> &BTreeMap<StageKind, Vec<String>> {
        &self.selections
    }

    /// The current category is complete; move on
    pub fn advance(&mut self) -> SessionStep {
        let Some(stage) = self.current() else {
            return SessionStep::Finished;
        };
        if self.category + 1 < stage.source.category_count() {
            self.category += 1;
            log::info!("Next category: {:?}", self.category());
            return SessionStep::NextCategory;
        }

        self.stage += 1;
        self.category = 0;
        self.skip_empty_stages();
        if self.finished {
            log::info!("Session finished");
            SessionStep::Finished
        } else {
            log::info!("Next stage: {:?}", self.header());
            SessionStep::NextStage
        }
    }
}
