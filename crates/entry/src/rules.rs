//! Synchronous field rules for barcode, quantity and price.
//!
//! Pure functions, no side effects. These run on every edit; the asynchronous
//! existence check in `verify` is a separate concern and only fires on commit.

use crate::config::EntryConfig;
use crate::line_item::LineItem;

/// Per-field error messages for one row, `None` meaning the field is clean.
///
/// Derived from the rule functions (and, at the form level, the duplicate
/// scan); never mutated independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub barcode: Option<String>,
    pub quantity: Option<String>,
    pub price: Option<String>,
}

impl FieldErrors {
    pub fn is_clean(&self) -> bool {
        self.barcode.is_none() && self.quantity.is_none() && self.price.is_none()
    }
}

/// Local shape rule for a barcode: non-empty after trimming, bounded length.
///
/// Returns an error message, or `None` when the barcode is acceptable.
pub fn check_barcode(raw: &str, config: &EntryConfig) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some("barcode is required".to_string());
    }
    if trimmed.chars().count() > config.max_barcode_len {
        return Some(format!(
            "barcode must be at most {} characters",
            config.max_barcode_len
        ));
    }
    None
}

/// Parse a quantity: base-10 digits only, `0 < q <= max_quantity`.
///
/// Signs, decimals, scientific notation and any surrounding junk other than
/// whitespace are rejected.
pub fn parse_quantity(raw: &str, config: &EntryConfig) -> Result<u64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err("quantity must be a whole number".to_string());
    }
    let quantity: u64 = trimmed
        .parse()
        .map_err(|_| "quantity must be a whole number".to_string())?;
    if quantity == 0 || quantity > config.max_quantity {
        return Err(format!(
            "quantity must be between 1 and {}",
            config.max_quantity
        ));
    }
    Ok(quantity)
}

/// Parse a unit price into minor currency units (cents).
///
/// Accepts plain decimals only: digits with at most one decimal point and at
/// most two fraction digits. `0 < p <= max_price`. Scientific notation,
/// signs and repeated points are rejected.
pub fn parse_price(raw: &str, config: &EntryConfig) -> Result<u64, String> {
    const MALFORMED: &str = "price must be a plain decimal amount";

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MALFORMED.to_string());
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(MALFORMED.to_string());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(MALFORMED.to_string());
    }
    if fraction.len() > 2 {
        return Err("price allows at most two decimal places".to_string());
    }

    let whole_units: u64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| format!("price must be at most {}", config.max_price))?
    };

    let mut minor = whole_units
        .checked_mul(100)
        .ok_or_else(|| format!("price must be at most {}", config.max_price))?;
    if !fraction.is_empty() {
        let mut cents: u64 = fraction.parse().map_err(|_| MALFORMED.to_string())?;
        if fraction.len() == 1 {
            cents *= 10;
        }
        minor += cents;
    }

    if minor == 0 {
        return Err("price must be greater than zero".to_string());
    }
    if minor > config.max_price_minor() {
        return Err(format!("price must be at most {}", config.max_price));
    }
    Ok(minor)
}

/// Run all shape rules against one row.
pub fn check_row(item: &LineItem, config: &EntryConfig) -> FieldErrors {
    FieldErrors {
        barcode: check_barcode(&item.barcode, config),
        quantity: parse_quantity(&item.quantity, config).err(),
        price: parse_price(&item.unit_price, config).err(),
    }
}
