//! Existence-check port against the external product catalog.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

use orderpad_entry::normalize_barcode;

/// Failure of the lookup itself, as opposed to a barcode that simply does
/// not exist (which is a successful `Ok(false)` outcome).
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("catalog transport failure: {0}")]
    Transport(String),

    #[error("catalog returned status {0}")]
    Status(u16),
}

/// Asynchronous catalog lookup.
///
/// Implementations must keep "barcode not found" (`Ok(false)`) distinct from
/// transport-level failure (`Err`); the engine surfaces them differently and
/// only the latter invites a retry without editing.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn check_exists(&self, barcode: &str) -> Result<bool, LookupError>;
}

/// Fixed in-memory catalog for tests and offline development.
///
/// Membership uses the same trim + case-fold normalization as the duplicate
/// scan, so a catalog seeded with `SKU1` answers for ` sku1 ` as well.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    barcodes: HashSet<String>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_barcodes<I, S>(barcodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            barcodes: barcodes
                .into_iter()
                .map(|b| normalize_barcode(b.as_ref()))
                .collect(),
        }
    }

    pub fn insert(&mut self, barcode: &str) {
        self.barcodes.insert(normalize_barcode(barcode));
    }
}

#[async_trait]
impl CatalogLookup for StaticCatalog {
    async fn check_exists(&self, barcode: &str) -> Result<bool, LookupError> {
        Ok(self.barcodes.contains(&normalize_barcode(barcode)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_catalog_answers_with_normalization() {
        let catalog = StaticCatalog::with_barcodes(["SKU1", "SKU2"]);
        assert!(catalog.check_exists("sku1").await.unwrap());
        assert!(catalog.check_exists(" SKU2 ").await.unwrap());
        assert!(!catalog.check_exists("SKU3").await.unwrap());
    }

    #[tokio::test]
    async fn insert_extends_the_catalog() {
        let mut catalog = StaticCatalog::new();
        assert!(!catalog.check_exists("SKU9").await.unwrap());
        catalog.insert(" sku9 ");
        assert!(catalog.check_exists("SKU9").await.unwrap());
    }
}
