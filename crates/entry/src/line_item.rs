//! Ordered line item storage with stable per-row identity.

use serde::{Deserialize, Serialize};

use orderpad_core::{DomainError, DomainResult, RowId};

/// One order line as entered by the user.
///
/// Quantity and unit price hold the raw entered text: the rules engine has to
/// be able to report on malformed input, so malformed input must be storable.
/// Parsing to typed values happens in `rules` and at the submit boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: RowId,
    pub barcode: String,
    pub quantity: String,
    pub unit_price: String,
}

impl LineItem {
    /// A fresh row: empty barcode, quantity 1, price 0.
    pub fn empty(id: RowId) -> Self {
        Self {
            id,
            barcode: String::new(),
            quantity: "1".to_string(),
            unit_price: "0".to_string(),
        }
    }
}

/// Editable fields of a line item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Barcode,
    Quantity,
    Price,
}

/// Ordered list of line items, addressed by [`RowId`] only.
///
/// Display order is the `Vec` order; callers never address rows by position.
/// The store refuses to drop below one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItemStore {
    rows: Vec<LineItem>,
}

impl LineItemStore {
    /// A store seeded with a single empty row.
    pub fn new() -> Self {
        Self {
            rows: vec![LineItem::empty(RowId::new())],
        }
    }

    /// Rebuild a store from a restored draft. An empty draft is re-seeded
    /// with one fresh row to hold the minimum-row invariant.
    pub fn from_rows(rows: Vec<LineItem>) -> Self {
        if rows.is_empty() {
            return Self::new();
        }
        Self { rows }
    }

    /// Append a new empty row and return its identifier.
    pub fn add_row(&mut self) -> RowId {
        let id = RowId::new();
        self.rows.push(LineItem::empty(id));
        id
    }

    /// Remove a row by identifier.
    ///
    /// Returns `false` without touching the list when the row is unknown or
    /// is the last remaining one (the order can never have zero rows).
    pub fn remove_row(&mut self, id: RowId) -> bool {
        if self.rows.len() <= 1 {
            return false;
        }
        let Some(pos) = self.position(id) else {
            return false;
        };
        self.rows.remove(pos);
        true
    }

    /// Overwrite one field on one row with the given raw text.
    pub fn update_field(&mut self, id: RowId, field: Field, value: &str) -> DomainResult<()> {
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(DomainError::not_found)?;
        match field {
            Field::Barcode => row.barcode = value.to_string(),
            Field::Quantity => row.quantity = value.to_string(),
            Field::Price => row.unit_price = value.to_string(),
        }
        Ok(())
    }

    pub fn get(&self, id: RowId) -> Option<&LineItem> {
        self.rows.iter().find(|r| r.id == id)
    }

    /// Display position of a row, if present.
    pub fn position(&self, id: RowId) -> Option<usize> {
        self.rows.iter().position(|r| r.id == id)
    }

    pub fn rows(&self) -> &[LineItem] {
        &self.rows
    }

    pub fn ids(&self) -> impl Iterator<Item = RowId> + '_ {
        self.rows.iter().map(|r| r.id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drop all rows and re-seed with a single fresh one (post-submit reset).
    pub fn clear(&mut self) -> RowId {
        let id = RowId::new();
        self.rows = vec![LineItem::empty(id)];
        id
    }
}

impl Default for LineItemStore {
    fn default() -> Self {
        Self::new()
    }
}
