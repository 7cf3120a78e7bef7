//! `orderpad-infra` — IO-facing ports and drivers for the entry engine.
//!
//! The engine in `orderpad-entry` is pure; everything that touches the
//! network or disk lives here:
//!
//! - [`catalog`]: the existence-check port and its implementations (HTTP
//!   client for the catalog service, static in-memory fake).
//! - [`draft_store`]: draft persistence backends (SQLite for the app,
//!   in-memory for tests).
//! - [`session`]: the cooperative driver that turns issued check tickets
//!   into lookup tasks and feeds resolutions back through the sequence gate.

pub mod catalog;
pub mod draft_store;
pub mod http_catalog;
pub mod session;

pub use catalog::{CatalogLookup, LookupError, StaticCatalog};
pub use draft_store::{InMemoryDraftStore, SqliteDraftStore};
pub use http_catalog::HttpCatalog;
pub use session::{CheckResolution, EntrySession};
