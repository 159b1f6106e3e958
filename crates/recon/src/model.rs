use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Cells + tables
// ---------------------------------------------------------------------------

/// A single spreadsheet value. `Empty` is the missing-value marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Text content, if this is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Render as a key string. `None` for empty cells and blank text.
    pub fn key(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(s) if s.trim().is_empty() => None,
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(format_number(*n)),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => f.write_str(&format_number(*n)),
        }
    }
}

/// Integers without decimals, everything else as-is.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

static EMPTY: Cell = Cell::Empty;

/// An in-memory sheet: ordered headers plus rectangular rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build from headers and rows; short rows are padded, long rows truncated.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: impl IntoIterator<Item = Vec<Cell>>,
    ) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_index_ci(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: Cell) {
        if let Some(slot) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *slot = value;
        }
    }

    /// Iterate one column top to bottom.
    pub fn column_cells(&self, col: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |r| r.get(col).unwrap_or(&EMPTY))
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    /// Append a column, or overwrite the values of an existing column of the same name.
    pub fn push_column(&mut self, name: &str, cells: Vec<Cell>) {
        debug_assert_eq!(cells.len(), self.rows.len());
        match self.column_index(name) {
            Some(idx) => {
                for (row, cell) in self.rows.iter_mut().zip(cells) {
                    row[idx] = cell;
                }
            }
            None => {
                self.columns.push(name.to_string());
                let mut cells = cells.into_iter();
                for row in &mut self.rows {
                    row.push(cells.next().unwrap_or(Cell::Empty));
                }
            }
        }
    }

    pub fn drop_column(&mut self, name: &str) {
        if let Some(idx) = self.column_index(name) {
            self.columns.remove(idx);
            for row in &mut self.rows {
                row.remove(idx);
            }
        }
    }

    /// New table with the same headers holding only the given rows, in order.
    pub fn select_rows(&self, indices: impl IntoIterator<Item = usize>) -> Table {
        let rows = indices
            .into_iter()
            .filter_map(|i| self.rows.get(i).cloned())
            .collect();
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn trim_headers(&mut self) {
        for c in &mut self.columns {
            *c = c.trim().to_string();
        }
    }

    pub fn uppercase_headers(&mut self) {
        for c in &mut self.columns {
            *c = c.trim().to_uppercase();
        }
    }

    /// Apply `f` to every text cell in place.
    pub fn map_text(&mut self, f: impl Fn(&str) -> String) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                if let Cell::Text(s) = cell {
                    *s = f(s);
                }
            }
        }
    }

    /// Apply `f` to every cell of one column in place.
    pub fn map_column(&mut self, col: usize, f: impl Fn(&Cell) -> Cell) {
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(col) {
                *cell = f(cell);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Partitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Partition {
    Bat,
    Cvd,
}

impl Partition {
    /// Value of the format discriminator for this partition.
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::Bat => "BAT",
            Self::Cvd => "CVD",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Bat => Self::Cvd,
            Self::Cvd => Self::Bat,
        }
    }

    pub fn from_discriminator(value: &str) -> Option<Self> {
        match value {
            "BAT" => Some(Self::Bat),
            "CVD" => Some(Self::Cvd),
            _ => None,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.discriminator())
    }
}

/// One day's reconciled BAT + CVD tables.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub bat: Table,
    pub cvd: Table,
}

impl Snapshot {
    pub fn get(&self, partition: Partition) -> &Table {
        match partition {
            Partition::Bat => &self.bat,
            Partition::Cvd => &self.cvd,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Header row of the summary sheet.
pub const SUMMARY_COLUMNS: [&str; 7] = [
    "SETTLE DATE",
    "Bank_MPR_Count",
    "Bank_MPR_Amount",
    "Bank_MPR_Refund_Count",
    "Bank_MPR_Refund_Amount",
    "Pending_Refund_Count",
    "Pending_Refund_Sum",
];

/// Count + sum of the amounts of one slice on one settlement date.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SliceTotals {
    pub count: usize,
    pub sum: f64,
}

/// One settlement date across the three slices. `None` = slice has no rows that day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub settle_date: String,
    pub bank_mpr_count: Option<usize>,
    pub bank_mpr_amount: Option<f64>,
    pub bank_mpr_refund_count: Option<usize>,
    pub bank_mpr_refund_amount: Option<f64>,
    pub pending_refund_count: Option<usize>,
    pub pending_refund_sum: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettlementSummary {
    pub rows: Vec<SummaryRow>,
}

impl SettlementSummary {
    pub fn get(&self, settle_date: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.settle_date == settle_date)
    }

    /// Render as the `summary_output` sheet.
    pub fn to_table(&self) -> Table {
        fn count(v: Option<usize>) -> Cell {
            v.map_or(Cell::Empty, |n| Cell::Number(n as f64))
        }
        fn amount(v: Option<f64>) -> Cell {
            v.map_or(Cell::Empty, Cell::Number)
        }

        Table::from_rows(
            SUMMARY_COLUMNS,
            self.rows.iter().map(|r| {
                vec![
                    Cell::text(r.settle_date.clone()),
                    count(r.bank_mpr_count),
                    amount(r.bank_mpr_amount),
                    count(r.bank_mpr_refund_count),
                    amount(r.bank_mpr_refund_amount),
                    count(r.pending_refund_count),
                    amount(r.pending_refund_sum),
                ]
            }),
        )
    }
}

// ---------------------------------------------------------------------------
// Stage outputs
// ---------------------------------------------------------------------------

/// Zero-based data-row indices whose track id occurs more than once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuplicateMarks {
    pub bat: BTreeSet<usize>,
    pub cvd: BTreeSet<usize>,
}

#[derive(Debug, Clone)]
pub struct CrossMatchOutput {
    pub bat: Table,
    pub cvd: Table,
    pub pending: Table,
}

#[derive(Debug, Clone)]
pub struct EnrichOutput {
    pub bat: Table,
    pub cvd: Table,
    pub summary: SettlementSummary,
    pub duplicates: DuplicateMarks,
}

#[derive(Debug, Clone)]
pub struct CarryoverOutput {
    pub bat: Table,
    pub cvd: Table,
    pub summary: SettlementSummary,
    /// Rows promoted to "System Refund" in this run, per partition.
    pub promoted: PromotionCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PromotionCounts {
    pub bat: usize,
    pub cvd: usize,
}
