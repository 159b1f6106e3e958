//! Stage 3: promote yesterday's pending rows whose cross-link key shows up in
//! today's snapshot to "System Refund", then re-summarize.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::aggregate::summarize;
use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::model::{Cell, CarryoverOutput, Partition, PromotionCounts, Snapshot, Table};
use crate::normalize::{coerce_amount_column, trim_column};
use crate::remark::{is_pending, PrefixMatch, Remark};

/// Run the carryover stage. Fails fast, producing nothing, when a required
/// column is absent from either of yesterday's sheets.
pub fn carry_over(
    yesterday: &Snapshot,
    today: &Snapshot,
    config: &ReconConfig,
) -> Result<CarryoverOutput, ReconError> {
    let cols = &config.columns;
    let remark = cols.remark.to_uppercase();
    let settle_date = cols.settle_date.to_uppercase();
    let amount = cols.amount.to_uppercase();

    let mut bat = prepare(&yesterday.bat, Partition::Bat, config)?;
    let mut cvd = prepare(&yesterday.cvd, Partition::Cvd, config)?;

    // Only BAT gets a placeholder remark; CVD must carry its own.
    if !bat.has_column(&remark) {
        debug!("yesterday's BAT sheet has no remark column; initializing to Pending");
        bat.push_column(&remark, vec![Cell::Text(Remark::Pending.to_string()); bat.len()]);
    }

    require(&bat, &config.sheets.bat, &[&settle_date, &amount])?;
    require(&cvd, &config.sheets.cvd, &[&settle_date, &amount, &remark])?;

    let today_bat = today_keys(&today.bat, Partition::Bat, config)?;
    let today_cvd = today_keys(&today.cvd, Partition::Cvd, config)?;

    let promoted = PromotionCounts {
        bat: promote(&mut bat, Partition::Bat, &today_bat, config),
        cvd: promote(&mut cvd, Partition::Cvd, &today_cvd, config),
    };

    for table in [&mut bat, &mut cvd] {
        if let Some(col) = table.column_index(&amount) {
            coerce_amount_column(table, col);
        }
    }

    let remark_col = cvd
        .column_index(&remark)
        .ok_or_else(|| ReconError::missing_column(&config.sheets.cvd, &remark))?;
    let pending_rows: Vec<usize> = cvd
        .column_cells(remark_col)
        .enumerate()
        .filter(|(_, c)| c.as_text().is_some_and(|t| is_pending(t, PrefixMatch::IgnoreCase)))
        .map(|(i, _)| i)
        .collect();

    let summary = summarize(&bat, &cvd, &cvd, &pending_rows, &settle_date, &amount);

    info!(
        promoted_bat = promoted.bat,
        promoted_cvd = promoted.cvd,
        still_pending_cvd = pending_rows.len(),
        dates = summary.rows.len(),
        "carryover complete"
    );

    Ok(CarryoverOutput {
        bat,
        cvd,
        summary,
        promoted,
    })
}

/// Uppercase headers, then trim the join key and (when present) the remark column.
fn prepare(table: &Table, partition: Partition, config: &ReconConfig) -> Result<Table, ReconError> {
    let mut table = table.clone();
    table.uppercase_headers();

    let key = config.columns.cross_link(partition).to_uppercase();
    let key_col = table
        .column_index(&key)
        .ok_or_else(|| ReconError::missing_column(config.sheets.partition(partition), &key))?;
    trim_column(&mut table, key_col);

    if let Some(col) = table.column_index(&config.columns.remark.to_uppercase()) {
        trim_column(&mut table, col);
    }
    Ok(table)
}

/// Join key of one cell: trimmed text, or `None` when missing or blank.
/// A missing key is a value like any other and matches a missing key today.
fn join_key(cell: &Cell) -> Option<String> {
    cell.key().map(|k| k.trim().to_string())
}

/// Trimmed join keys in one of today's sheets, `None` standing for missing.
fn today_keys(
    table: &Table,
    partition: Partition,
    config: &ReconConfig,
) -> Result<HashSet<Option<String>>, ReconError> {
    let key = config.columns.cross_link(partition);
    let sheet = format!("{} (today)", config.sheets.partition(partition));
    let col = table
        .columns()
        .iter()
        .position(|c| c.trim().eq_ignore_ascii_case(key))
        .ok_or_else(|| ReconError::missing_column(sheet, key.to_uppercase()))?;

    Ok(table.column_cells(col).map(join_key).collect())
}

/// Overwrite pending remarks whose join key appears today. Returns the number promoted.
fn promote(
    table: &mut Table,
    partition: Partition,
    today: &HashSet<Option<String>>,
    config: &ReconConfig,
) -> usize {
    let key = config.columns.cross_link(partition).to_uppercase();
    let remark = config.columns.remark.to_uppercase();
    let (Some(key_col), Some(remark_col)) = (table.column_index(&key), table.column_index(&remark))
    else {
        return 0;
    };

    let mut promoted = 0;
    for row in 0..table.len() {
        let matched = today.contains(&join_key(table.cell(row, key_col)));
        let pending = table
            .cell(row, remark_col)
            .as_text()
            .is_some_and(|t| is_pending(t, PrefixMatch::IgnoreCase));
        if matched && pending {
            table.set_cell(row, remark_col, Cell::Text(Remark::SystemRefund.to_string()));
            promoted += 1;
        }
    }
    debug!(%partition, promoted, "promoted pending rows");
    promoted
}

fn require(table: &Table, sheet: &str, columns: &[&str]) -> Result<(), ReconError> {
    match columns.iter().find(|c| !table.has_column(c)) {
        Some(missing) => Err(ReconError::missing_column(sheet, *missing)),
        None => Ok(()),
    }
}
