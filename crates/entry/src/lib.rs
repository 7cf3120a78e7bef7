//! `orderpad-entry` — row-based order entry validation engine.
//!
//! The engine manages an ordered list of line items (barcode, quantity, unit
//! price), runs synchronous field rules on every edit, detects duplicate
//! barcodes across rows, drives per-row asynchronous existence checks through
//! a sequence-gated coordinator, and persists an in-progress draft after
//! every mutation.
//!
//! Everything in this crate is pure and synchronous. Asynchronous work (the
//! actual catalog lookup, the draft store backend) happens behind the ports
//! in [`draft`] and in `orderpad-infra`; results re-enter the engine through
//! [`form::OrderEntryForm::resolve_check`], where the sequence gate decides
//! whether they are still authoritative.

pub mod config;
pub mod draft;
pub mod duplicates;
pub mod form;
pub mod line_item;
pub mod rules;
pub mod verify;

pub use config::EntryConfig;
pub use draft::{DraftError, DraftSnapshot, DraftStore, DRAFT_KEY};
pub use duplicates::{find_duplicates, normalize_barcode, DuplicateHit};
pub use form::{OrderEntryForm, OrderLine, RowView};
pub use line_item::{Field, LineItem, LineItemStore};
pub use rules::FieldErrors;
pub use verify::{CheckOutcome, CheckTicket, InvalidReason, RowState, VerificationCoordinator};
