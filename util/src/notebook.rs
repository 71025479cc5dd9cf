//! Notebook tier filtering and merging.
//!
//! A cell is a *test cell* when its first non-blank source line starts with
//! `# TEST:`. The optional `tier=<name>` token on that line sets its tier;
//! without one the cell is `public`. Unknown tier names count as `secret`.
//!
//! Both operations fail closed: a document that does not have the expected
//! notebook shape is rejected rather than passed through.

use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const TEST_MARKER: &str = "# TEST:";

#[derive(Debug, Error)]
pub enum NotebookError {
    #[error("{0} notebook is malformed: {1}")]
    Malformed(&'static str, String),
    #[error("failed to encode notebook: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellSource {
    Text(String),
    Lines(Vec<String>),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Text(String::new())
    }
}

impl CellSource {
    pub fn text(&self) -> String {
        match self {
            CellSource::Text(s) => s.clone(),
            CellSource::Lines(lines) => lines.concat(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub source: CellSource,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Cell {
    /// `Some(tier)` for a test cell, `None` otherwise.
    pub fn test_tier(&self) -> Option<Tier> {
        let text = self.source.text();
        let first = text.lines().find(|line| !line.trim().is_empty())?;
        let header = first.trim_start().strip_prefix(TEST_MARKER)?;

        let tier = header
            .split_whitespace()
            .find_map(|token| token.strip_prefix("tier="))
            .map(|value| value.parse().unwrap_or(Tier::Secret))
            .unwrap_or(Tier::Public);
        Some(tier)
    }

    pub fn is_test(&self) -> bool {
        self.test_tier().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Notebook {
    pub fn parse(raw: &[u8], which: &'static str) -> Result<Self, NotebookError> {
        serde_json::from_slice(raw).map_err(|e| NotebookError::Malformed(which, e.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, NotebookError> {
        serde_json::to_vec_pretty(self).map_err(|e| NotebookError::Encode(e.to_string()))
    }

    /// Drops every test cell whose tier is hidden. Non-test cells always stay.
    pub fn filtered(&self, hidden: &[Tier]) -> Notebook {
        let cells = self
            .cells
            .iter()
            .filter(|cell| match cell.test_tier() {
                Some(tier) => !hidden.contains(&tier),
                None => true,
            })
            .cloned()
            .collect();

        Notebook {
            cells,
            rest: self.rest.clone(),
        }
    }

    /// Student non-test cells in order, then all of the instructor's test cells in order.
    /// Test cells the student edited or added are discarded.
    pub fn merged_with(&self, instructor: &Notebook) -> Notebook {
        let mut cells: Vec<Cell> = self.cells.iter().filter(|c| !c.is_test()).cloned().collect();
        cells.extend(instructor.cells.iter().filter(|c| c.is_test()).cloned());

        Notebook {
            cells,
            rest: self.rest.clone(),
        }
    }
}

/// Notebook as a viewer may see it, with `hidden` test tiers removed.
pub fn filter_for_viewer(raw: &[u8], hidden: &[Tier]) -> Result<Vec<u8>, NotebookError> {
    Notebook::parse(raw, "viewer")?.filtered(hidden).to_bytes()
}

/// Notebook that actually gets graded: the student's work plus the authoritative tests.
pub fn merge_for_grading(student: &[u8], instructor: &[u8]) -> Result<Vec<u8>, NotebookError> {
    let student = Notebook::parse(student, "student")?;
    let instructor = Notebook::parse(instructor, "instructor")?;
    student.merged_with(&instructor).to_bytes()
}
