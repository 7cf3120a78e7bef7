//! Draft persistence contract.
//!
//! The engine writes a full snapshot of the row list and verification states
//! after every mutation, and restores it on construction so a reload does not
//! lose entered data. Storage failures are never fatal: they are logged and
//! the form degrades to "no draft recovery".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use orderpad_core::RowId;

use crate::line_item::LineItem;
use crate::verify::RowState;

/// Key under which the single in-progress order draft is stored.
pub const DRAFT_KEY: &str = "orderpad.entry.draft";

/// Full persisted form state: rows plus their verification states.
///
/// Written atomically as one value, so a reader never observes a
/// partially-mutated row list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub rows: Vec<LineItem>,
    pub states: Vec<(RowId, RowState)>,
    pub saved_at: DateTime<Utc>,
}

/// Draft store failure. Callers log it and move on.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("draft store failure: {0}")]
    Storage(String),
}

impl DraftError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Durable key-value port for draft snapshots.
///
/// Implementations live in `orderpad-infra` (SQLite for the app, in-memory
/// for tests). Last-write-wins semantics are acceptable; each write must
/// store the snapshot as a single consistent value.
pub trait DraftStore: Send + Sync {
    fn write(&self, key: &str, snapshot: &DraftSnapshot) -> Result<(), DraftError>;
    fn read(&self, key: &str) -> Result<Option<DraftSnapshot>, DraftError>;
    fn clear(&self, key: &str) -> Result<(), DraftError>;
}
