//! Entry limits and policies.

use serde::{Deserialize, Serialize};

/// Limits applied by the field rules and the verification driver.
///
/// All fields have serde defaults so a partial config file still loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryConfig {
    /// Maximum barcode length after trimming.
    #[serde(default = "default_max_barcode_len")]
    pub max_barcode_len: usize,

    /// Upper bound on quantity (inclusive). Quantity must also be > 0.
    #[serde(default = "default_max_quantity")]
    pub max_quantity: u64,

    /// Upper bound on unit price (inclusive), in whole currency units.
    /// Prices themselves are handled in minor units (cents).
    #[serde(default = "default_max_price")]
    pub max_price: u64,

    /// Bound on a single existence check before it resolves as timed out.
    #[serde(default = "default_verify_timeout_secs")]
    pub verify_timeout_secs: u64,
}

fn default_max_barcode_len() -> usize {
    50
}

fn default_max_quantity() -> u64 {
    999_999
}

fn default_max_price() -> u64 {
    999_999
}

fn default_verify_timeout_secs() -> u64 {
    10
}

impl EntryConfig {
    /// Price cap in minor units (cents). Saturates so a loaded config with
    /// an absurd `max_price` caps at `u64::MAX` instead of overflowing.
    pub fn max_price_minor(&self) -> u64 {
        self.max_price.saturating_mul(100)
    }
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            max_barcode_len: default_max_barcode_len(),
            max_quantity: default_max_quantity(),
            max_price: default_max_price(),
            verify_timeout_secs: default_verify_timeout_secs(),
        }
    }
}
