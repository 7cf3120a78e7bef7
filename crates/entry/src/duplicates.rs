//! Cross-row duplicate barcode detection.
//!
//! Pure scan over the live row list; invoked synchronously after every
//! barcode edit and row removal, so the result is never stale.

use orderpad_core::RowId;

/// Normalization applied before comparing barcodes: trim and case-fold.
pub fn normalize_barcode(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A row whose normalized barcode collides with an earlier row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateHit {
    pub row: RowId,
    /// Display position (0-based) of the earlier row it collides with.
    pub first_position: usize,
}

impl DuplicateHit {
    /// Human-readable message, referring to the earlier row 1-based.
    pub fn message(&self) -> String {
        format!("duplicate of row {}", self.first_position + 1)
    }
}

/// Scan `(id, barcode)` pairs in display order and report every row whose
/// normalized barcode matches an earlier row. Rows with an empty normalized
/// barcode never collide.
pub fn find_duplicates<'a, I>(rows: I) -> Vec<DuplicateHit>
where
    I: IntoIterator<Item = (RowId, &'a str)>,
{
    let mut first_seen: Vec<(String, usize)> = Vec::new();
    let mut hits = Vec::new();

    for (position, (id, barcode)) in rows.into_iter().enumerate() {
        let key = normalize_barcode(barcode);
        if key.is_empty() {
            continue;
        }
        match first_seen.iter().find(|(seen, _)| *seen == key) {
            Some((_, first_position)) => hits.push(DuplicateHit {
                row: id,
                first_position: *first_position,
            }),
            None => first_seen.push((key, position)),
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> RowId {
        RowId::new()
    }

    #[test]
    fn distinct_barcodes_produce_no_hits() {
        let (a, b) = (id(), id());
        let hits = find_duplicates([(a, "SKU1"), (b, "SKU2")]);
        assert!(hits.is_empty());
    }

    #[test]
    fn collision_is_trim_and_case_insensitive() {
        let (a, b) = (id(), id());
        let hits = find_duplicates([(a, "ABC123"), (b, " abc123 ")]);
        assert_eq!(
            hits,
            vec![DuplicateHit {
                row: b,
                first_position: 0
            }]
        );
    }

    #[test]
    fn only_later_rows_are_flagged() {
        let (a, b, c) = (id(), id(), id());
        let hits = find_duplicates([(a, "X"), (b, "X"), (c, "X")]);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].row, b);
        assert_eq!(hits[1].row, c);
        assert!(hits.iter().all(|h| h.first_position == 0));
    }

    #[test]
    fn empty_barcodes_never_collide() {
        let (a, b, c) = (id(), id(), id());
        let hits = find_duplicates([(a, ""), (b, "   "), (c, "")]);
        assert!(hits.is_empty());
    }

    #[test]
    fn editing_one_side_clears_the_conflict() {
        let (a, b) = (id(), id());
        assert_eq!(find_duplicates([(a, "ABC123"), (b, "abc123")]).len(), 1);
        assert!(find_duplicates([(a, "ABC123"), (b, "XYZ999")]).is_empty());
    }

    #[test]
    fn message_refers_to_one_based_position() {
        let hit = DuplicateHit {
            row: id(),
            first_position: 0,
        };
        assert_eq!(hit.message(), "duplicate of row 1");
    }
}
