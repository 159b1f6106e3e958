use std::collections::{BTreeMap, BTreeSet};

use crate::model::{SettlementSummary, SliceTotals, SummaryRow, Table};
use crate::normalize::parse_amount;

/// Column positions needed to total one slice. Either may be absent.
#[derive(Debug, Clone, Copy)]
pub struct SliceColumns {
    pub settle_date: Option<usize>,
    pub amount: Option<usize>,
}

impl SliceColumns {
    pub fn locate(table: &Table, settle_date: &str, amount: &str) -> Self {
        Self {
            settle_date: table.column_index(settle_date),
            amount: table.column_index(amount),
        }
    }
}

/// Group rows by settlement date text; count and sum the numeric amounts.
///
/// Rows with no settlement date are left out. A date whose amounts are all
/// missing still gets a group, with count 0 and sum 0.
pub fn totals_by_date(
    table: &Table,
    columns: SliceColumns,
    rows: impl IntoIterator<Item = usize>,
) -> BTreeMap<String, SliceTotals> {
    let mut groups: BTreeMap<String, SliceTotals> = BTreeMap::new();
    let Some(date_col) = columns.settle_date else {
        return groups;
    };

    for row in rows {
        let Some(date) = table.cell(row, date_col).key() else {
            continue;
        };
        let entry = groups.entry(date).or_default();
        let amount = columns
            .amount
            .and_then(|col| parse_amount(table.cell(row, col)));
        if let Some(amount) = amount {
            entry.count += 1;
            entry.sum += amount;
        }
    }

    groups
}

/// All row indices of a table.
pub fn all_rows(table: &Table) -> std::ops::Range<usize> {
    0..table.len()
}

/// Full outer merge of the three slices on settlement date.
pub fn merge_slices(
    bank: &BTreeMap<String, SliceTotals>,
    refund: &BTreeMap<String, SliceTotals>,
    pending: &BTreeMap<String, SliceTotals>,
) -> SettlementSummary {
    let dates: BTreeSet<&String> = bank.keys().chain(refund.keys()).chain(pending.keys()).collect();

    let rows = dates
        .into_iter()
        .map(|date| {
            let b = bank.get(date);
            let r = refund.get(date);
            let p = pending.get(date);
            SummaryRow {
                settle_date: date.clone(),
                bank_mpr_count: b.map(|t| t.count),
                bank_mpr_amount: b.map(|t| t.sum),
                bank_mpr_refund_count: r.map(|t| t.count),
                bank_mpr_refund_amount: r.map(|t| t.sum),
                pending_refund_count: p.map(|t| t.count),
                pending_refund_sum: p.map(|t| t.sum),
            }
        })
        .collect();

    SettlementSummary { rows }
}

/// Three-slice summary: every BAT row, every CVD row, and the pending subset
/// drawn from `pending_source`.
pub fn summarize(
    bat: &Table,
    cvd: &Table,
    pending_source: &Table,
    pending_rows: &[usize],
    settle_date: &str,
    amount: &str,
) -> SettlementSummary {
    let bank = totals_by_date(bat, SliceColumns::locate(bat, settle_date, amount), all_rows(bat));
    let refund = totals_by_date(cvd, SliceColumns::locate(cvd, settle_date, amount), all_rows(cvd));
    let pending = totals_by_date(
        pending_source,
        SliceColumns::locate(pending_source, settle_date, amount),
        pending_rows.iter().copied(),
    );
    merge_slices(&bank, &refund, &pending)
}
