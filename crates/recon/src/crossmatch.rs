//! Stage 1: split a raw import into BAT/CVD, cross-link by track id, assign
//! remarks, and extract the pending worklist.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::model::{Cell, CrossMatchOutput, Partition, Table};
use crate::normalize::{coerce_amount_column, settle_day, strip_quotes, trim_column};
use crate::remark::{is_pending, worklist_quote, PrefixMatch, Remark};

/// Sheet label used in errors raised against the raw upload.
const RAW_SHEET: &str = "input";

/// Run the cross-match stage over a raw, all-text import.
pub fn cross_match(raw: &Table, config: &ReconConfig) -> Result<CrossMatchOutput, ReconError> {
    let cols = &config.columns;

    let mut table = raw.clone();
    strip_quotes(&mut table);
    table.trim_headers();

    let fmt_col = table
        .column_index(&cols.rec_fmt)
        .ok_or_else(|| ReconError::missing_column(RAW_SHEET, &cols.rec_fmt))?;
    if !table.has_column(&cols.track_id) {
        return Err(ReconError::missing_column(RAW_SHEET, &cols.track_id));
    }
    trim_column(&mut table, fmt_col);

    match table.column_index(&cols.amount) {
        Some(amount_col) => coerce_amount_column(&mut table, amount_col),
        None => debug!(column = %cols.amount, "amount column absent; left uncoerced"),
    }

    let (mut bat, mut cvd) = partition(&table, fmt_col);
    info!(rows = table.len(), bat = bat.len(), cvd = cvd.len(), "partitioned raw import");

    // Key sets are taken before either side gains its cross-link column.
    let bat_keys = key_set(&bat, &cols.track_id);
    let cvd_keys = key_set(&cvd, &cols.track_id);

    annotate(&mut bat, Partition::Bat, &cvd_keys, config);
    annotate(&mut cvd, Partition::Cvd, &bat_keys, config);

    let pending = pending_worklist(&bat, config);
    info!(pending = pending.len(), "built pending worklist");

    Ok(CrossMatchOutput { bat, cvd, pending })
}

/// Split rows by format discriminator. Rows with any other value are dropped.
fn partition(table: &Table, fmt_col: usize) -> (Table, Table) {
    let mut bat_rows = Vec::new();
    let mut cvd_rows = Vec::new();
    let mut dropped = 0usize;

    for (row, cell) in table.column_cells(fmt_col).enumerate() {
        match cell.as_text().and_then(Partition::from_discriminator) {
            Some(Partition::Bat) => bat_rows.push(row),
            Some(Partition::Cvd) => cvd_rows.push(row),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!(dropped, "rows with unknown format discriminator");
    }

    (table.select_rows(bat_rows), table.select_rows(cvd_rows))
}

/// Non-empty track ids present in a partition.
fn key_set(table: &Table, track_id: &str) -> HashSet<String> {
    table
        .column_index(track_id)
        .map(|col| table.column_cells(col).filter_map(|c| c.key()).collect())
        .unwrap_or_default()
}

/// Append cross-link, settle day and remark columns to one partition.
fn annotate(
    table: &mut Table,
    partition: Partition,
    opposite_keys: &HashSet<String>,
    config: &ReconConfig,
) {
    let cols = &config.columns;

    // Presence-only: the link holds the row's own key when the opposite side has it.
    let links: Vec<Cell> = match table.column_index(&cols.track_id) {
        Some(col) => table
            .column_cells(col)
            .map(|c| match c.key() {
                Some(key) if opposite_keys.contains(&key) => Cell::Text(key),
                _ => Cell::Empty,
            })
            .collect(),
        None => vec![Cell::Empty; table.len()],
    };

    let days: Option<Vec<Option<u32>>> = table.column_index(&cols.settle_date).map(|col| {
        table
            .column_cells(col)
            .map(|c| settle_day(c, &config.date_formats))
            .collect()
    });

    let remarks: Vec<Cell> = links
        .iter()
        .enumerate()
        .map(|(row, link)| {
            let day = days.as_ref().and_then(|d| d[row]);
            Cell::Text(Remark::derive(!link.is_empty(), day).to_string())
        })
        .collect();

    let linked = links.iter().filter(|c| !c.is_empty()).count();
    debug!(%partition, rows = table.len(), linked, "cross-linked partition");

    table.push_column(cols.cross_link(partition), links);
    if let Some(days) = days {
        let cells = days
            .into_iter()
            .map(|d| d.map_or(Cell::Empty, |d| Cell::Number(f64::from(d))))
            .collect();
        table.push_column(&cols.settle_day, cells);
    }
    table.push_column(&cols.remark, remarks);
}

/// Pending BAT rows projected to (remark, quoted UDF1).
pub fn pending_worklist(bat: &Table, config: &ReconConfig) -> Table {
    let cols = &config.columns;
    let mut out = Table::new([cols.remark.as_str(), cols.udf1.as_str()]);

    let Some(remark_col) = bat.column_index(&cols.remark) else {
        return out;
    };
    let udf1_col = bat.column_index(&cols.udf1);
    if udf1_col.is_none() {
        debug!(column = %cols.udf1, "UDF1 absent; worklist values will be blank");
    }

    for row in 0..bat.len() {
        let remark = bat.cell(row, remark_col);
        if !remark.as_text().is_some_and(|t| is_pending(t, PrefixMatch::Exact)) {
            continue;
        }
        let udf1 = udf1_col.and_then(|col| bat.cell(row, col).key());
        out.push_row(vec![remark.clone(), Cell::Text(worklist_quote(udf1.as_deref()))]);
    }

    out
}
