//! The order entry form: composition of store, rules, duplicate scan,
//! verification coordinator and draft persistence.
//!
//! All addressing is by [`RowId`]. Validity is recomputed on demand from the
//! live state, never cached, so it cannot go stale across mutations.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use orderpad_core::{DomainError, DomainResult, RowId};

use crate::config::EntryConfig;
use crate::draft::{DraftSnapshot, DraftStore, DRAFT_KEY};
use crate::duplicates::{find_duplicates, DuplicateHit};
use crate::line_item::{Field, LineItem, LineItemStore};
use crate::rules::{self, FieldErrors};
use crate::verify::{CheckOutcome, CheckTicket, RowState, VerificationCoordinator};

/// A finalized order line, emitted at the submit boundary.
///
/// Barcode is trimmed; price is in minor currency units (cents), the same
/// convention the order-creation API uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub barcode: String,
    pub quantity: u64,
    pub unit_price_minor: u64,
}

/// Read-only projection of one row for rendering: display position, current
/// item text, verification state and field errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub id: RowId,
    pub position: usize,
    pub item: LineItem,
    pub state: RowState,
    pub errors: FieldErrors,
}

/// The entry form engine.
pub struct OrderEntryForm {
    config: EntryConfig,
    store: LineItemStore,
    coordinator: VerificationCoordinator,
    draft: Option<Arc<dyn DraftStore>>,
}

impl OrderEntryForm {
    /// A fresh form with no draft persistence (tests, previews).
    pub fn new(config: EntryConfig) -> Self {
        let store = LineItemStore::new();
        let mut coordinator = VerificationCoordinator::new();
        for id in store.ids() {
            coordinator.register(id);
        }
        Self {
            config,
            store,
            coordinator,
            draft: None,
        }
    }

    /// A form backed by a draft store. A prior in-progress draft, if any,
    /// is restored; draft errors degrade to a fresh form.
    pub fn with_draft_store(config: EntryConfig, draft: Arc<dyn DraftStore>) -> Self {
        let mut form = match draft.read(DRAFT_KEY) {
            Ok(Some(snapshot)) => Self::from_snapshot(config, snapshot),
            Ok(None) => Self::new(config),
            Err(err) => {
                tracing::warn!("failed to load draft, starting fresh: {err}");
                Self::new(config)
            }
        };
        form.draft = Some(draft);
        form
    }

    fn from_snapshot(config: EntryConfig, snapshot: DraftSnapshot) -> Self {
        let store = LineItemStore::from_rows(snapshot.rows);
        let mut coordinator = VerificationCoordinator::new();
        // Keep only states whose row survived; a persisted Checking state is
        // downgraded inside restore().
        coordinator.restore(
            snapshot
                .states
                .into_iter()
                .filter(|(id, _)| store.position(*id).is_some()),
        );
        for id in store.ids() {
            if coordinator.state(id).is_none() {
                coordinator.register(id);
            }
        }
        Self {
            config,
            store,
            coordinator,
            draft: None,
        }
    }

    pub fn config(&self) -> &EntryConfig {
        &self.config
    }

    /// Append a new empty row, tracked as `Pending`.
    pub fn add_row(&mut self) -> RowId {
        let id = self.store.add_row();
        self.coordinator.register(id);
        self.persist();
        id
    }

    /// Remove a row and purge its verification state.
    ///
    /// Removing the last remaining row is a no-op: an order always has at
    /// least one row.
    pub fn remove_row(&mut self, id: RowId) -> bool {
        if !self.store.remove_row(id) {
            return false;
        }
        self.coordinator.forget(id);
        self.persist();
        true
    }

    /// Overwrite one field with raw user text. A barcode edit resets the
    /// row's verification state to `Pending` and supersedes any in-flight
    /// check for it.
    pub fn update_field(&mut self, id: RowId, field: Field, value: &str) -> DomainResult<()> {
        self.store.update_field(id, field, value)?;
        if field == Field::Barcode {
            self.coordinator.reset(id);
        }
        self.persist();
        Ok(())
    }

    /// The user left the barcode field: issue an existence check, unless the
    /// local shape rules fail or the row duplicates an earlier one, in which
    /// case no network call is warranted and `None` is returned.
    pub fn commit_barcode(&mut self, id: RowId) -> DomainResult<Option<CheckTicket>> {
        let item = self.store.get(id).ok_or_else(DomainError::not_found)?;
        if rules::check_barcode(&item.barcode, &self.config).is_some() {
            return Ok(None);
        }
        if self.duplicates().iter().any(|hit| hit.row == id) {
            return Ok(None);
        }
        let barcode = item.barcode.clone();
        let ticket = self.coordinator.begin_check(id, &barcode);
        self.persist();
        Ok(ticket)
    }

    /// Feed back the outcome of an issued check. Applied only when the
    /// sequence is still the latest for a still-present row; returns whether
    /// it was.
    pub fn resolve_check(&mut self, row: RowId, seq: u64, outcome: CheckOutcome) -> bool {
        let applied = self.coordinator.resolve(row, seq, outcome);
        if applied {
            self.persist();
        }
        applied
    }

    /// Duplicate scan over the live rows, in display order.
    pub fn duplicates(&self) -> Vec<DuplicateHit> {
        find_duplicates(
            self.store
                .rows()
                .iter()
                .map(|r| (r.id, r.barcode.as_str())),
        )
    }

    /// Field errors for one row: shape rules plus the duplicate overlay.
    /// A duplicate finding takes display precedence on the barcode field
    /// when no shape error is already present.
    pub fn field_errors(&self, id: RowId) -> DomainResult<FieldErrors> {
        let item = self.store.get(id).ok_or_else(DomainError::not_found)?;
        let mut errors = rules::check_row(item, &self.config);
        if errors.barcode.is_none() {
            if let Some(hit) = self.duplicates().into_iter().find(|h| h.row == id) {
                errors.barcode = Some(hit.message());
            }
        }
        Ok(errors)
    }

    pub fn row_state(&self, id: RowId) -> Option<RowState> {
        self.coordinator.state(id)
    }

    /// Rendering projection in display order.
    pub fn row_views(&self) -> Vec<RowView> {
        let duplicates = self.duplicates();
        self.store
            .rows()
            .iter()
            .enumerate()
            .map(|(position, item)| {
                let mut errors = rules::check_row(item, &self.config);
                if errors.barcode.is_none() {
                    if let Some(hit) = duplicates.iter().find(|h| h.row == item.id) {
                        errors.barcode = Some(hit.message());
                    }
                }
                RowView {
                    id: item.id,
                    position,
                    item: item.clone(),
                    state: self
                        .coordinator
                        .state(item.id)
                        .unwrap_or(RowState::Pending),
                    errors,
                }
            })
            .collect()
    }

    pub fn rows(&self) -> &[LineItem] {
        self.store.rows()
    }

    /// Aggregate submit eligibility: every row shape-clean, no duplicates
    /// anywhere, and every verification state exactly `Valid`. O(rows),
    /// recomputed on every call.
    pub fn is_valid(&self) -> bool {
        if !self.duplicates().is_empty() {
            return false;
        }
        self.store.rows().iter().all(|item| {
            rules::check_row(item, &self.config).is_clean()
                && self
                    .coordinator
                    .state(item.id)
                    .is_some_and(|s| s.is_valid())
        })
    }

    /// Emit the finalized lines and reset the form.
    ///
    /// Refused while the form is not valid. On success the row list and
    /// verification states are cleared (re-seeded with one fresh row) and the
    /// persisted draft is deleted.
    pub fn submit(&mut self) -> DomainResult<Vec<OrderLine>> {
        if !self.is_valid() {
            return Err(DomainError::invariant(
                "cannot submit while any row is incomplete, duplicated, or unverified",
            ));
        }

        let mut lines = Vec::with_capacity(self.store.len());
        for item in self.store.rows() {
            let quantity = rules::parse_quantity(&item.quantity, &self.config)
                .map_err(DomainError::validation)?;
            let unit_price_minor = rules::parse_price(&item.unit_price, &self.config)
                .map_err(DomainError::validation)?;
            lines.push(OrderLine {
                barcode: item.barcode.trim().to_string(),
                quantity,
                unit_price_minor,
            });
        }

        let fresh = self.store.clear();
        self.coordinator = VerificationCoordinator::new();
        self.coordinator.register(fresh);

        if let Some(draft) = &self.draft {
            if let Err(err) = draft.clear(DRAFT_KEY) {
                tracing::warn!("failed to clear submitted draft: {err}");
            }
        }

        Ok(lines)
    }

    fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot {
            rows: self.store.rows().to_vec(),
            states: self.coordinator.states().collect(),
            saved_at: Utc::now(),
        }
    }

    /// Write the current snapshot. Failures are logged and swallowed: draft
    /// persistence must never block or break the form.
    fn persist(&self) {
        if let Some(draft) = &self.draft {
            if let Err(err) = draft.write(DRAFT_KEY, &self.snapshot()) {
                tracing::warn!("failed to persist draft: {err}");
            }
        }
    }
}
