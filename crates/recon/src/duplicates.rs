use std::collections::{BTreeSet, HashMap};

use crate::model::Table;

/// Rows whose key occurs more than once, first occurrence included.
///
/// Rows with an empty key never count as duplicates. Returns an empty set
/// when the key column is absent.
pub fn duplicate_rows(table: &Table, key_column: &str) -> BTreeSet<usize> {
    let Some(col) = table.column_index(key_column) else {
        return BTreeSet::new();
    };

    let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
    for (row, cell) in table.column_cells(col).enumerate() {
        if let Some(key) = cell.key() {
            by_key.entry(key.trim().to_string()).or_default().push(row);
        }
    }

    by_key
        .into_values()
        .filter(|rows| rows.len() > 1)
        .flatten()
        .collect()
}
