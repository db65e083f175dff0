//! Candidate labels from category tables
//!
//! A table is CSV text whose first row names the categories (columns) and
//! whose remaining rows list labels; each column is one category's backlog.

use thiserror::Error;

use crate::sim::BacklogEntry;

/// Item source failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("table needs a header row and at least one data row, found {rows} rows")]
    InsufficientData { rows: usize },
    #[error("category index {index} out of range ({count} categories)")]
    UnknownCategory { index: usize, count: usize },
    #[error("category '{0}' has no labels")]
    EmptyCategory(String),
}

/// Supplies backlogs per category
pub trait ItemSource {
    /// Category names in display order
    fn categories(&self) -> &[String];

    /// Labels for one category, in source order
    fn items(&self, index: usize) -> Result<Vec<BacklogEntry>, SourceError>;

    fn category_count(&self) -> usize {
        self.categories().len()
    }
}

/// Split CSV text into rows of trimmed cells.
///
/// Commas inside double quotes do not split; quotes are dropped. Rows with
/// no non-empty cell are skipped.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    text.lines()
        .map(|line| {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let mut cells = Vec::new();
            let mut cell = String::new();
            let mut in_quotes = false;
            for ch in line.chars() {
                match ch {
                    '"' => in_quotes = !in_quotes,
                    ',' if !in_quotes => cells.push(std::mem::take(&mut cell).trim().to_string()),
                    _ => cell.push(ch),
                }
            }
            cells.push(cell.trim().to_string());
            cells
        })
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect()
}

/// Parsed category table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    categories: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CategoryTable {
    pub fn from_csv(text: &str) -> Result<Self, SourceError> {
        let mut rows = parse_csv(text);
        if rows.len() < 2 {
            return Err(SourceError::InsufficientData { rows: rows.len() });
        }
        let categories = rows.remove(0);
        log::debug!("Parsed category table: {:?}", categories);
        Ok(Self { categories, rows })
    }
}

impl ItemSource for CategoryTable {
    fn categories(&self) -> &[String] {
        &self.categories
    }

    fn items(&self, index: usize) -> Result<Vec<BacklogEntry>, SourceError> {
        let Some(name) = self.categories.get(index) else {
            return Err(SourceError::UnknownCategory {
                index,
                count: self.categories.len(),
            });
        };
        let items: Vec<BacklogEntry> = self
            .rows
            .iter()
            .filter_map(|row| row.get(index))
            .filter(|cell| !cell.is_empty())
            .map(|cell| BacklogEntry::grouped(cell.as_str(), name.as_str()))
            .collect();
        if items.is_empty() {
            return Err(SourceError::EmptyCategory(name.clone()));
        }
        Ok(items)
    }
}
