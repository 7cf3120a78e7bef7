//! Per-row asynchronous verification state machine.
//!
//! Each row moves through `Pending → Checking → {Valid | Invalid(reason)}`,
//! and any barcode edit drops it back to `Pending`. Checks are tagged with a
//! monotonically increasing sequence number per row; a resolution is applied
//! only when its sequence still matches the latest one issued, so a late
//! response can never overwrite the outcome of a newer edit. That gate is the
//! whole cancellation story; the transport is never asked to abort anything.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use orderpad_core::RowId;

/// Why a row failed remote verification.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// The catalog answered, and the barcode does not exist.
    NotFound,
    /// The lookup itself failed (network, server error).
    VerificationFailed,
    /// The lookup did not answer within the configured bound.
    TimedOut,
}

impl InvalidReason {
    pub fn message(&self) -> &'static str {
        match self {
            InvalidReason::NotFound => "not found",
            InvalidReason::VerificationFailed => "verification failed",
            InvalidReason::TimedOut => "timed out",
        }
    }
}

/// Verification state of one row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowState {
    /// No check has concluded for the current barcode text.
    Pending,
    /// A check is in flight.
    Checking,
    /// The latest check confirmed the barcode exists.
    Valid,
    /// The latest check concluded negatively.
    Invalid(InvalidReason),
}

impl RowState {
    pub fn is_valid(&self) -> bool {
        matches!(self, RowState::Valid)
    }
}

/// Handle for one issued existence check.
///
/// Whoever performs the lookup hands `row` and `seq` back unchanged via
/// [`VerificationCoordinator::resolve`]; the coordinator decides whether the
/// outcome is still authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckTicket {
    pub row: RowId,
    pub seq: u64,
    /// Trimmed barcode text the check was issued for.
    pub barcode: String,
}

/// Outcome of one existence check, as reported by the lookup driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Found,
    NotFound,
    TransportFailure,
    TimedOut,
}

impl CheckOutcome {
    fn into_state(self) -> RowState {
        match self {
            CheckOutcome::Found => RowState::Valid,
            CheckOutcome::NotFound => RowState::Invalid(InvalidReason::NotFound),
            CheckOutcome::TransportFailure => {
                RowState::Invalid(InvalidReason::VerificationFailed)
            }
            CheckOutcome::TimedOut => RowState::Invalid(InvalidReason::TimedOut),
        }
    }
}

/// Issues, tracks, and supersedes per-row existence checks.
///
/// Exactly one state entry exists per registered row; forgetting a row purges
/// both its state and its sequence counter, so a resolution arriving for a
/// removed row has nothing to attach to.
#[derive(Debug, Default)]
pub struct VerificationCoordinator {
    states: HashMap<RowId, RowState>,
    latest_seq: HashMap<RowId, u64>,
}

impl VerificationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly created row as `Pending`.
    pub fn register(&mut self, row: RowId) {
        self.states.insert(row, RowState::Pending);
        self.latest_seq.entry(row).or_insert(0);
    }

    /// Purge all state for a removed row. Outstanding checks for it become
    /// no-ops when they resolve.
    pub fn forget(&mut self, row: RowId) {
        self.states.remove(&row);
        self.latest_seq.remove(&row);
    }

    /// Barcode text changed: back to `Pending`, and bump the sequence so any
    /// in-flight check is superseded without being awaited.
    pub fn reset(&mut self, row: RowId) {
        if let Some(state) = self.states.get_mut(&row) {
            *state = RowState::Pending;
            *self.latest_seq.entry(row).or_insert(0) += 1;
        }
    }

    /// Issue a new check for a row, superseding any earlier one.
    ///
    /// Returns `None` for an unregistered row.
    pub fn begin_check(&mut self, row: RowId, barcode: &str) -> Option<CheckTicket> {
        let state = self.states.get_mut(&row)?;
        *state = RowState::Checking;
        let seq = self.latest_seq.entry(row).or_insert(0);
        *seq += 1;
        Some(CheckTicket {
            row,
            seq: *seq,
            barcode: barcode.trim().to_string(),
        })
    }

    /// Apply a resolution if (and only if) it carries the latest sequence
    /// number issued for a still-present row. Returns whether it was applied.
    pub fn resolve(&mut self, row: RowId, seq: u64, outcome: CheckOutcome) -> bool {
        let Some(latest) = self.latest_seq.get(&row) else {
            tracing::debug!(%row, seq, "dropping resolution for removed row");
            return false;
        };
        if *latest != seq {
            tracing::debug!(%row, seq, latest = *latest, "dropping superseded resolution");
            return false;
        }
        let Some(state) = self.states.get_mut(&row) else {
            return false;
        };
        *state = outcome.into_state();
        true
    }

    pub fn state(&self, row: RowId) -> Option<RowState> {
        self.states.get(&row).copied()
    }

    /// All tracked `(row, state)` pairs, for snapshotting.
    pub fn states(&self) -> impl Iterator<Item = (RowId, RowState)> + '_ {
        self.states.iter().map(|(id, state)| (*id, *state))
    }

    /// Rebuild from a restored draft. A persisted `Checking` state comes back
    /// as `Pending`: the request it referred to did not survive the reload.
    pub fn restore(&mut self, states: impl IntoIterator<Item = (RowId, RowState)>) {
        self.states.clear();
        self.latest_seq.clear();
        for (row, state) in states {
            let state = match state {
                RowState::Checking => RowState::Pending,
                other => other,
            };
            self.states.insert(row, state);
            self.latest_seq.insert(row, 0);
        }
    }

    pub fn tracked_rows(&self) -> usize {
        self.states.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_start_pending() {
        let mut coordinator = VerificationCoordinator::new();
        let row = RowId::new();
        coordinator.register(row);
        assert_eq!(coordinator.state(row), Some(RowState::Pending));
    }

    #[test]
    fn begin_check_moves_to_checking_and_trims_barcode() {
        let mut coordinator = VerificationCoordinator::new();
        let row = RowId::new();
        coordinator.register(row);

        let ticket = coordinator.begin_check(row, " SKU1 ").unwrap();
        assert_eq!(ticket.barcode, "SKU1");
        assert_eq!(coordinator.state(row), Some(RowState::Checking));
    }

    #[test]
    fn latest_resolution_is_applied() {
        let mut coordinator = VerificationCoordinator::new();
        let row = RowId::new();
        coordinator.register(row);

        let ticket = coordinator.begin_check(row, "A").unwrap();
        assert!(coordinator.resolve(row, ticket.seq, CheckOutcome::Found));
        assert_eq!(coordinator.state(row), Some(RowState::Valid));
    }

    #[test]
    fn stale_resolution_is_dropped_after_newer_check() {
        let mut coordinator = VerificationCoordinator::new();
        let row = RowId::new();
        coordinator.register(row);

        let first = coordinator.begin_check(row, "A").unwrap();
        let second = coordinator.begin_check(row, "B").unwrap();

        // Second check resolves first, then the stale response for "A" lands.
        assert!(coordinator.resolve(row, second.seq, CheckOutcome::Found));
        assert!(!coordinator.resolve(row, first.seq, CheckOutcome::NotFound));
        assert_eq!(coordinator.state(row), Some(RowState::Valid));
    }

    #[test]
    fn stale_resolution_is_dropped_even_when_it_arrives_before_the_newer_one() {
        let mut coordinator = VerificationCoordinator::new();
        let row = RowId::new();
        coordinator.register(row);

        let first = coordinator.begin_check(row, "A").unwrap();
        let second = coordinator.begin_check(row, "B").unwrap();

        assert!(!coordinator.resolve(row, first.seq, CheckOutcome::Found));
        assert_eq!(coordinator.state(row), Some(RowState::Checking));
        assert!(coordinator.resolve(row, second.seq, CheckOutcome::NotFound));
        assert_eq!(
            coordinator.state(row),
            Some(RowState::Invalid(InvalidReason::NotFound))
        );
    }

    #[test]
    fn edit_resets_to_pending_and_supersedes_in_flight_check() {
        let mut coordinator = VerificationCoordinator::new();
        let row = RowId::new();
        coordinator.register(row);

        let ticket = coordinator.begin_check(row, "A").unwrap();
        coordinator.reset(row);

        assert_eq!(coordinator.state(row), Some(RowState::Pending));
        assert!(!coordinator.resolve(row, ticket.seq, CheckOutcome::Found));
        assert_eq!(coordinator.state(row), Some(RowState::Pending));
    }

    #[test]
    fn resolution_for_forgotten_row_is_a_no_op() {
        let mut coordinator = VerificationCoordinator::new();
        let row = RowId::new();
        coordinator.register(row);
        let ticket = coordinator.begin_check(row, "A").unwrap();

        coordinator.forget(row);
        assert!(!coordinator.resolve(row, ticket.seq, CheckOutcome::Found));
        assert_eq!(coordinator.state(row), None);
        assert_eq!(coordinator.tracked_rows(), 0);
    }

    #[test]
    fn failure_outcomes_map_to_reasons() {
        let mut coordinator = VerificationCoordinator::new();
        let row = RowId::new();
        coordinator.register(row);

        let t = coordinator.begin_check(row, "A").unwrap();
        coordinator.resolve(row, t.seq, CheckOutcome::TransportFailure);
        assert_eq!(
            coordinator.state(row),
            Some(RowState::Invalid(InvalidReason::VerificationFailed))
        );

        let t = coordinator.begin_check(row, "A").unwrap();
        coordinator.resolve(row, t.seq, CheckOutcome::TimedOut);
        assert_eq!(
            coordinator.state(row),
            Some(RowState::Invalid(InvalidReason::TimedOut))
        );
    }

    #[test]
    fn restore_downgrades_checking_to_pending() {
        let mut coordinator = VerificationCoordinator::new();
        let (a, b, c) = (RowId::new(), RowId::new(), RowId::new());
        coordinator.restore([
            (a, RowState::Valid),
            (b, RowState::Checking),
            (c, RowState::Invalid(InvalidReason::NotFound)),
        ]);

        assert_eq!(coordinator.state(a), Some(RowState::Valid));
        assert_eq!(coordinator.state(b), Some(RowState::Pending));
        assert_eq!(
            coordinator.state(c),
            Some(RowState::Invalid(InvalidReason::NotFound))
        );
    }

    #[test]
    fn restored_rows_accept_fresh_checks() {
        let mut coordinator = VerificationCoordinator::new();
        let row = RowId::new();
        coordinator.restore([(row, RowState::Valid)]);

        let ticket = coordinator.begin_check(row, "A").unwrap();
        assert!(coordinator.resolve(row, ticket.seq, CheckOutcome::NotFound));
    }
}
