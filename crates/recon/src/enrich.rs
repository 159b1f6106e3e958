//! Stage 2: join the external state feed onto cross-matched BAT rows,
//! summarize by settlement date, and mark duplicate track ids.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::aggregate::summarize;
use crate::config::ReconConfig;
use crate::duplicates::duplicate_rows;
use crate::model::{Cell, DuplicateMarks, EnrichOutput, Snapshot, Table};
use crate::normalize::trim_column;
use crate::remark::{is_pending, PrefixMatch};

/// Run the enrichment stage. Never fails: absent columns leave derived values missing.
pub fn enrich(processed: &Snapshot, feed: &Table, config: &ReconConfig) -> EnrichOutput {
    let cols = &config.columns;

    let mut bat = processed.bat.clone();
    let mut cvd = processed.cvd.clone();
    bat.trim_headers();
    // CVD passes through; only its headers are normalized.
    cvd.trim_headers();

    let states = state_index(feed, config);
    let bat = join_state(&bat, &states, config);

    let pending_rows = pending_rows(&bat, &cols.remark);
    let summary = summarize(&bat, &cvd, &bat, &pending_rows, &cols.settle_date, &cols.amount);

    let duplicates = DuplicateMarks {
        bat: duplicate_rows(&bat, &cols.track_id),
        cvd: duplicate_rows(&cvd, &cols.track_id),
    };

    info!(
        bat = bat.len(),
        cvd = cvd.len(),
        pending = pending_rows.len(),
        dates = summary.rows.len(),
        duplicate_bat = duplicates.bat.len(),
        duplicate_cvd = duplicates.cvd.len(),
        "enrichment complete"
    );

    EnrichOutput {
        bat,
        cvd,
        summary,
        duplicates,
    }
}

/// Feed key -> every state value listed for it, in feed order.
fn state_index(feed: &Table, config: &ReconConfig) -> HashMap<String, Vec<Cell>> {
    let cols = &config.columns;
    let mut feed = feed.clone();
    feed.trim_headers();

    let mut index: HashMap<String, Vec<Cell>> = HashMap::new();
    let (Some(key_col), Some(state_col)) = (
        feed.column_index(&cols.feed_key),
        feed.column_index(&cols.feed_state),
    ) else {
        warn!(
            key = %cols.feed_key,
            state = %cols.feed_state,
            "state feed lacks its key or state column; no states joined"
        );
        return index;
    };
    trim_column(&mut feed, key_col);
    trim_column(&mut feed, state_col);

    for row in 0..feed.len() {
        if let Some(key) = feed.cell(row, key_col).key() {
            index.entry(key).or_default().push(feed.cell(row, state_col).clone());
        }
    }

    let repeated = index.values().filter(|v| v.len() > 1).count();
    if repeated > 0 {
        warn!(repeated, "state feed lists some transaction ids more than once; matching BAT rows fan out");
    }
    debug!(keys = index.len(), "indexed state feed");
    index
}

/// Left join: BAT drives, one output row per matching feed entry, unmatched rows keep state empty.
fn join_state(bat: &Table, states: &HashMap<String, Vec<Cell>>, config: &ReconConfig) -> Table {
    let cols = &config.columns;

    let mut columns: Vec<String> = bat
        .columns()
        .iter()
        .filter(|c| **c != cols.feed_state)
        .cloned()
        .collect();
    columns.push(cols.feed_state.clone());
    let state_col = bat.column_index(&cols.feed_state);
    let udf1_col = bat.column_index(&cols.udf1);
    // Position of UDF1 once a pre-existing state column is dropped.
    let udf1_out = udf1_col
        .filter(|c| Some(*c) != state_col)
        .map(|c| c - usize::from(state_col.is_some_and(|s| s < c)));

    if udf1_col.is_none() {
        warn!(column = %cols.udf1, "BAT sheet has no UDF1 column; state left empty");
    }

    let mut out = Table::new(columns);
    let mut unkeyed = 0usize;
    for (row, cells) in bat.rows().iter().enumerate() {
        let mut base: Vec<Cell> = cells
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != state_col)
            .map(|(_, c)| c.clone())
            .collect();

        let key = udf1_col.and_then(|col| bat.cell(row, col).key()).map(|k| k.trim().to_string());
        if let (Some(k), Some(slot)) = (&key, udf1_out.and_then(|col| base.get_mut(col))) {
            *slot = Cell::Text(k.clone());
        }

        match key.as_ref().and_then(|k| states.get(k)) {
            Some(matches) => {
                for state in matches {
                    let mut joined = base.clone();
                    joined.push(state.clone());
                    out.push_row(joined);
                }
            }
            None => {
                if key.is_none() {
                    unkeyed += 1;
                }
                base.push(Cell::Empty);
                out.push_row(base);
            }
        }
    }

    if unkeyed > 0 && udf1_col.is_some() {
        warn!(rows = unkeyed, "BAT rows without UDF1 cannot join the state feed");
    }
    out
}

/// BAT rows whose remark starts with "Pending" (case-sensitive).
fn pending_rows(bat: &Table, remark: &str) -> Vec<usize> {
    let Some(col) = bat.column_index(remark) else {
        debug!(column = remark, "no remark column; pending slice is empty");
        return Vec::new();
    };
    bat.column_cells(col)
        .enumerate()
        .filter(|(_, c)| c.as_text().is_some_and(|t| is_pending(t, PrefixMatch::Exact)))
        .map(|(i, _)| i)
        .collect()
}
