//! Cooperative driver connecting the entry form to the catalog lookup.
//!
//! The form itself never awaits anything; it hands out sequence-tagged check
//! tickets. The session turns each ticket into a spawned lookup bounded by
//! the configured timeout, and funnels every resolution through one channel
//! back onto the owning task, where the form's sequence gate decides whether
//! it still counts. The lookup task is never aborted; a superseded response
//! simply resolves into a no-op.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use orderpad_core::{DomainResult, RowId};
use orderpad_entry::{CheckOutcome, OrderEntryForm};

use crate::catalog::CatalogLookup;

/// Outcome of one spawned lookup, tagged with the ticket it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResolution {
    pub row: RowId,
    pub seq: u64,
    pub outcome: CheckOutcome,
}

/// Drives asynchronous existence checks for one [`OrderEntryForm`].
///
/// Single-consumer by construction: resolutions are applied only from the
/// task that owns the session, so the form never sees concurrent writers.
pub struct EntrySession {
    form: OrderEntryForm,
    catalog: Arc<dyn CatalogLookup>,
    tx: mpsc::UnboundedSender<CheckResolution>,
    rx: mpsc::UnboundedReceiver<CheckResolution>,
    in_flight: usize,
}

impl EntrySession {
    pub fn new(form: OrderEntryForm, catalog: Arc<dyn CatalogLookup>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            form,
            catalog,
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Synchronous access to the engine (edits, views, validity, submit).
    pub fn form(&self) -> &OrderEntryForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut OrderEntryForm {
        &mut self.form
    }

    /// Commit a row's barcode: if the form issues a check, spawn the lookup.
    ///
    /// Returns whether a check was dispatched. Must be called from within a
    /// tokio runtime.
    pub fn commit_barcode(&mut self, row: RowId) -> DomainResult<bool> {
        let Some(ticket) = self.form.commit_barcode(row)? else {
            return Ok(false);
        };

        let catalog = Arc::clone(&self.catalog);
        let tx = self.tx.clone();
        let timeout = Duration::from_secs(self.form.config().verify_timeout_secs);
        let (row, seq, barcode) = (ticket.row, ticket.seq, ticket.barcode);

        self.in_flight += 1;
        tokio::spawn(async move {
            let outcome =
                match tokio::time::timeout(timeout, catalog.check_exists(&barcode)).await {
                    Ok(Ok(true)) => CheckOutcome::Found,
                    Ok(Ok(false)) => CheckOutcome::NotFound,
                    Ok(Err(err)) => {
                        tracing::warn!(%row, barcode, "existence check failed: {err}");
                        CheckOutcome::TransportFailure
                    }
                    Err(_) => {
                        tracing::warn!(%row, barcode, "existence check timed out");
                        CheckOutcome::TimedOut
                    }
                };
            // Receiver dropped means the session is torn down; nothing to do.
            let _ = tx.send(CheckResolution { row, seq, outcome });
        });

        Ok(true)
    }

    /// Apply every resolution that has already arrived, without waiting.
    /// Returns how many were applied (stale ones count as processed but are
    /// dropped by the sequence gate).
    pub fn apply_ready(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(resolution) = self.rx.try_recv() {
            self.apply(resolution);
            processed += 1;
        }
        processed
    }

    /// Wait until every dispatched check has resolved and been applied.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            match self.rx.recv().await {
                Some(resolution) => self.apply(resolution),
                None => break,
            }
        }
    }

    fn apply(&mut self, resolution: CheckResolution) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.form
            .resolve_check(resolution.row, resolution.seq, resolution.outcome);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use orderpad_entry::{EntryConfig, Field, InvalidReason, OrderLine, RowState};

    use super::*;
    use crate::catalog::{LookupError, StaticCatalog};
    use crate::draft_store::{InMemoryDraftStore, SqliteDraftStore};
    use orderpad_entry::{DraftStore, DRAFT_KEY};

    /// Catalog that answers after a per-call delay, in call order.
    struct DelayedCatalog {
        answers: std::sync::Mutex<Vec<(Duration, Result<bool, ()>)>>,
    }

    impl DelayedCatalog {
        fn new(answers: Vec<(Duration, Result<bool, ()>)>) -> Self {
            Self {
                answers: std::sync::Mutex::new(answers),
            }
        }
    }

    #[async_trait]
    impl CatalogLookup for DelayedCatalog {
        async fn check_exists(&self, _barcode: &str) -> Result<bool, LookupError> {
            let (delay, answer) = self.answers.lock().unwrap().remove(0);
            tokio::time::sleep(delay).await;
            answer.map_err(|_| LookupError::Transport("connection refused".to_string()))
        }
    }

    fn session_with(catalog: Arc<dyn CatalogLookup>) -> EntrySession {
        EntrySession::new(OrderEntryForm::new(EntryConfig::default()), catalog)
    }

    fn fill_row(session: &mut EntrySession, row: RowId, barcode: &str) {
        let form = session.form_mut();
        form.update_field(row, Field::Barcode, barcode).unwrap();
        form.update_field(row, Field::Quantity, "5").unwrap();
        form.update_field(row, Field::Price, "10.00").unwrap();
    }

    #[tokio::test]
    async fn full_entry_flow_from_empty_row_to_submission() {
        let store = Arc::new(InMemoryDraftStore::new());
        let form = OrderEntryForm::with_draft_store(EntryConfig::default(), store.clone());
        let mut session =
            EntrySession::new(form, Arc::new(StaticCatalog::with_barcodes(["SKU1"])));

        let row = session.form().rows()[0].id;
        fill_row(&mut session, row, "SKU1");
        assert!(session.commit_barcode(row).unwrap());
        session.settle().await;

        assert_eq!(session.form().row_state(row), Some(RowState::Valid));
        assert!(session.form().is_valid());

        let lines = session.form_mut().submit().unwrap();
        assert_eq!(
            lines,
            vec![OrderLine {
                barcode: "SKU1".to_string(),
                quantity: 5,
                unit_price_minor: 1000,
            }]
        );
        assert!(store.read(DRAFT_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_backed_form_persists_drafts_during_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteDraftStore::at_path(dir.path().join("drafts.db")));
        let form = OrderEntryForm::with_draft_store(EntryConfig::default(), store.clone());
        let mut session =
            EntrySession::new(form, Arc::new(StaticCatalog::with_barcodes(["SKU1"])));

        let row = session.form().rows()[0].id;
        fill_row(&mut session, row, "SKU1");
        assert!(session.commit_barcode(row).unwrap());
        session.settle().await;

        assert_eq!(session.form().row_state(row), Some(RowState::Valid));
        let saved = store.read(DRAFT_KEY).unwrap().unwrap();
        assert_eq!(saved.rows[0].barcode, "SKU1");
    }

    #[tokio::test]
    async fn unknown_barcode_resolves_to_not_found() {
        let mut session = session_with(Arc::new(StaticCatalog::with_barcodes(["SKU1"])));
        let row = session.form().rows()[0].id;
        fill_row(&mut session, row, "SKU2");

        assert!(session.commit_barcode(row).unwrap());
        session.settle().await;

        assert_eq!(
            session.form().row_state(row),
            Some(RowState::Invalid(InvalidReason::NotFound))
        );
        assert!(!session.form().is_valid());
    }

    #[tokio::test]
    async fn shape_invalid_barcode_dispatches_nothing() {
        let mut session = session_with(Arc::new(StaticCatalog::new()));
        let row = session.form().rows()[0].id;
        session
            .form_mut()
            .update_field(row, Field::Barcode, "  ")
            .unwrap();

        assert!(!session.commit_barcode(row).unwrap());
        assert_eq!(session.apply_ready(), 0);
        assert_eq!(session.form().row_state(row), Some(RowState::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_for_superseded_edit_is_dropped() {
        // First check (for "A") answers `false` after 30s; the re-check (for
        // "B") answers `true` after 1s. The user edits before the first one
        // lands, so only the second outcome may count.
        let catalog = Arc::new(DelayedCatalog::new(vec![
            (Duration::from_secs(30), Ok(false)),
            (Duration::from_secs(1), Ok(true)),
        ]));
        let mut session = session_with(catalog);
        let row = session.form().rows()[0].id;

        fill_row(&mut session, row, "A");
        assert!(session.commit_barcode(row).unwrap());

        session
            .form_mut()
            .update_field(row, Field::Barcode, "B")
            .unwrap();
        assert!(session.commit_barcode(row).unwrap());

        session.settle().await;
        assert_eq!(session.form().row_state(row), Some(RowState::Valid));
    }

    #[tokio::test(start_paused = true)]
    async fn unresponsive_catalog_resolves_to_timed_out() {
        let catalog = Arc::new(DelayedCatalog::new(vec![(
            Duration::from_secs(3600),
            Ok(true),
        )]));
        let mut session = session_with(catalog);
        let row = session.form().rows()[0].id;
        fill_row(&mut session, row, "SKU1");

        assert!(session.commit_barcode(row).unwrap());
        session.settle().await;

        assert_eq!(
            session.form().row_state(row),
            Some(RowState::Invalid(InvalidReason::TimedOut))
        );
    }

    #[tokio::test]
    async fn transport_failure_resolves_to_verification_failed() {
        let catalog = Arc::new(DelayedCatalog::new(vec![(Duration::ZERO, Err(()))]));
        let mut session = session_with(catalog);
        let row = session.form().rows()[0].id;
        fill_row(&mut session, row, "SKU1");

        assert!(session.commit_barcode(row).unwrap());
        session.settle().await;

        assert_eq!(
            session.form().row_state(row),
            Some(RowState::Invalid(InvalidReason::VerificationFailed))
        );
    }

    #[tokio::test]
    async fn resolution_for_removed_row_is_a_no_op() {
        let mut session = session_with(Arc::new(StaticCatalog::with_barcodes(["SKU1"])));
        let first = session.form().rows()[0].id;
        let second = session.form_mut().add_row();
        fill_row(&mut session, first, "SKU1");

        assert!(session.commit_barcode(first).unwrap());
        assert!(session.form_mut().remove_row(first));
        session.settle().await;

        assert_eq!(session.form().row_state(first), None);
        assert_eq!(session.form().row_state(second), Some(RowState::Pending));
        assert_eq!(session.form().rows().len(), 1);
    }
}
