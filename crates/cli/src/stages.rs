//! Stage commands: read inputs, run one stage, write its workbook.
//!
//! Nothing is written unless the stage succeeds.

use std::path::{Path, PathBuf};

use serde_json::json;

use batcvd_io::{CellMode, SheetOut};
use batcvd_recon::model::SettlementSummary;
use batcvd_recon::{run, ReconConfig, Snapshot, StageInput, StageOutput};

use crate::CliError;

/// Output must be a fresh `.xlsx` path distinct from every input.
fn check_output(output: &Path, inputs: &[&Path]) -> Result<(), CliError> {
    let is_xlsx = output
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if !is_xlsx {
        return Err(CliError::usage(format!("output must be an .xlsx file: {}", output.display())));
    }
    if inputs.iter().any(|input| same_file(input, output)) {
        return Err(CliError::usage(format!("output would overwrite input {}", output.display()))
            .with_hint("write each day's result to a new file"));
    }
    Ok(())
}

/// Whether two paths name the same file. The output may not exist yet, so
/// the parent directories are resolved rather than the files themselves.
fn same_file(a: &Path, b: &Path) -> bool {
    fn resolved_parent(path: &Path) -> PathBuf {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf())
    }
    a.file_name() == b.file_name() && resolved_parent(a) == resolved_parent(b)
}

fn read_snapshot(path: &Path, config: &ReconConfig, mode: CellMode) -> Result<Snapshot, CliError> {
    let mut sheets = batcvd_io::read_sheets(path, &[config.sheets.bat.as_str(), config.sheets.cvd.as_str()], mode)?;
    let cvd = sheets.pop().unwrap_or_default();
    let bat = sheets.pop().unwrap_or_default();
    Ok(Snapshot { bat, cvd })
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;
    println!("{text}");
    Ok(())
}

fn summary_totals(summary: &SettlementSummary) -> (usize, usize) {
    let pending = summary.rows.iter().filter_map(|r| r.pending_refund_count).sum();
    (summary.rows.len(), pending)
}

// ============================================================================
// Stage 1
// ============================================================================

pub fn cmd_cross_match(
    config: &ReconConfig,
    raw: &Path,
    sheet: Option<&str>,
    output: &Path,
    json_output: bool,
) -> Result<(), CliError> {
    check_output(output, &[raw])?;

    let raw_table = batcvd_io::read_table(raw, sheet, CellMode::Text)?;
    tracing::info!(path = %raw.display(), rows = raw_table.len(), "raw upload loaded");

    let StageOutput::CrossMatch(out) = run(config, &StageInput::CrossMatch { raw: raw_table })? else {
        return Err(CliError::general("cross-match produced an unexpected result"));
    };

    batcvd_io::write_workbook(
        output,
        &[
            SheetOut::plain(&config.sheets.cvd, &out.cvd),
            SheetOut::plain(&config.sheets.bat, &out.bat),
            SheetOut::plain(&config.sheets.pending, &out.pending),
        ],
    )?;

    if json_output {
        print_json(&json!({
            "stage": "cross-match",
            "output": output.display().to_string(),
            "bat_rows": out.bat.len(),
            "cvd_rows": out.cvd.len(),
            "pending_refunds": out.pending.len(),
        }))?;
    }

    eprintln!(
        "cross-match: {} BAT, {} CVD, {} pending refunds -> {}",
        out.bat.len(),
        out.cvd.len(),
        out.pending.len(),
        output.display(),
    );
    Ok(())
}

// ============================================================================
// Stage 2
// ============================================================================

pub fn cmd_enrich(
    config: &ReconConfig,
    processed: &Path,
    feed: &Path,
    feed_sheet: Option<&str>,
    output: &Path,
    json_output: bool,
) -> Result<(), CliError> {
    check_output(output, &[processed, feed])?;
    let highlight = config.highlight_rgb()?;

    let snapshot = read_snapshot(processed, config, CellMode::Typed)?;
    let feed_table = batcvd_io::read_table(feed, feed_sheet, CellMode::Typed)?;
    tracing::info!(path = %feed.display(), rows = feed_table.len(), "state feed loaded");

    let input = StageInput::Enrich { processed: snapshot, feed: feed_table };
    let StageOutput::Enrich(out) = run(config, &input)? else {
        return Err(CliError::general("enrich produced an unexpected result"));
    };

    let summary = out.summary.to_table();
    batcvd_io::write_workbook(
        output,
        &[
            SheetOut { name: &config.sheets.bat, table: &out.bat, highlight: Some((&out.duplicates.bat, highlight)) },
            SheetOut { name: &config.sheets.cvd, table: &out.cvd, highlight: Some((&out.duplicates.cvd, highlight)) },
            SheetOut::plain(&config.sheets.summary, &summary),
        ],
    )?;

    if json_output {
        print_json(&json!({
            "stage": "enrich",
            "output": output.display().to_string(),
            "bat_rows": out.bat.len(),
            "cvd_rows": out.cvd.len(),
            "duplicates": { "bat": out.duplicates.bat.len(), "cvd": out.duplicates.cvd.len() },
            "summary": out.summary,
        }))?;
    }

    let (dates, pending) = summary_totals(&out.summary);
    eprintln!(
        "enrich: {} BAT, {} CVD, {} duplicate rows, {} settle dates, {} pending refunds -> {}",
        out.bat.len(),
        out.cvd.len(),
        out.duplicates.bat.len() + out.duplicates.cvd.len(),
        dates,
        pending,
        output.display(),
    );
    Ok(())
}

// ============================================================================
// Stage 3
// ============================================================================

pub fn cmd_carryover(
    config: &ReconConfig,
    yesterday: &Path,
    today: &Path,
    output: &Path,
    json_output: bool,
) -> Result<(), CliError> {
    check_output(output, &[yesterday, today])?;

    let input = StageInput::Carryover {
        yesterday: read_snapshot(yesterday, config, CellMode::Text)?,
        today: read_snapshot(today, config, CellMode::Text)?,
    };
    let StageOutput::Carryover(out) = run(config, &input)? else {
        return Err(CliError::general("carryover produced an unexpected result"));
    };

    let summary = out.summary.to_table();
    batcvd_io::write_workbook(
        output,
        &[
            SheetOut::plain(&config.sheets.bat, &out.bat),
            SheetOut::plain(&config.sheets.cvd, &out.cvd),
            SheetOut::plain(&config.sheets.summary, &summary),
        ],
    )?;

    if json_output {
        print_json(&json!({
            "stage": "carryover",
            "output": output.display().to_string(),
            "bat_rows": out.bat.len(),
            "cvd_rows": out.cvd.len(),
            "promoted": out.promoted,
            "summary": out.summary,
        }))?;
    }

    let (dates, pending) = summary_totals(&out.summary);
    eprintln!(
        "carryover: {} BAT + {} CVD promoted to System Refund, {} settle dates, {} still pending -> {}",
        out.promoted.bat,
        out.promoted.cvd,
        dates,
        pending,
        output.display(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_must_be_xlsx() {
        let err = check_output(Path::new("out.csv"), &[]).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_USAGE);
        assert!(check_output(Path::new("out.XLSX"), &[]).is_ok());
    }

    #[test]
    fn output_may_not_overwrite_input() {
        let input = Path::new("day.xlsx");
        let err = check_output(input, &[Path::new("feed.csv"), input]).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_USAGE);
        assert!(err.hint.is_some());
    }

    #[test]
    fn overwrite_check_resolves_relative_segments() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let input = dir.path().join("day.xlsx");
        let detour = dir.path().join("sub").join("..").join("day.xlsx");

        let err = check_output(&detour, &[&input]).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_USAGE);

        let sibling = dir.path().join("sub").join("day.xlsx");
        assert!(check_output(&sibling, &[&input]).is_ok());
    }
}
