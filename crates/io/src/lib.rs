//! `batcvd-io`: spreadsheet codec for the reconciliation stages.
//!
//! Reads xlsx/xls/xlsm/ods through calamine and flat files through csv, and
//! writes multi-sheet xlsx output through rust_xlsxwriter.

pub mod csv;
pub mod error;
pub mod xlsx;

use std::path::Path;

use batcvd_recon::model::Table;

pub use error::IoError;
pub use xlsx::{read_sheet, read_sheets, write_workbook, CellMode, SheetOut};

/// True for extensions read through the CSV path.
pub fn is_delimited(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
        Some("csv" | "tsv" | "txt")
    )
}

/// Read a flat input: delimited text or one sheet of a workbook.
/// Delimited files always yield text cells; `sheet` is ignored for them.
pub fn read_table(path: &Path, sheet: Option<&str>, mode: CellMode) -> Result<Table, IoError> {
    if is_delimited(path) {
        csv::read_csv(path)
    } else {
        xlsx::read_sheet(path, sheet, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimited_extensions() {
        assert!(is_delimited(Path::new("feed.CSV")));
        assert!(is_delimited(Path::new("feed.tsv")));
        assert!(is_delimited(Path::new("dump.txt")));
        assert!(!is_delimited(Path::new("raw.xlsx")));
        assert!(!is_delimited(Path::new("noext")));
    }

    #[test]
    fn read_table_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.csv");
        std::fs::write(&path, "transaction_uid,state\nU1,captured\n").unwrap();
        let table = read_table(&path, Some("ignored"), CellMode::Typed).unwrap();
        assert_eq!(table.columns(), ["transaction_uid", "state"]);
        assert_eq!(table.len(), 1);
    }
}
