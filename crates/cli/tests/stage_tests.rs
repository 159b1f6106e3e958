// End-to-end tests driving the `batcvd` binary through all three stages.
// Run with: cargo test -p batcvd-cli --test stage_tests

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use calamine::{open_workbook_auto, Data, Reader};

fn batcvd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_batcvd"));
    cmd.env_remove("RUST_LOG").env_remove("BATCVD_CONFIG");
    cmd
}

fn run(args: &[&str]) -> Output {
    batcvd().args(args).output().expect("spawn batcvd")
}

fn p(path: &Path) -> &str {
    path.to_str().unwrap()
}

const RAW_CSV: &str = "\
REC FMT,MERCHANT_TRACKID,DOMESTIC AMT,SETTLE DATE,UDF1
BAT,T1,100,2026-05-01,U1
BAT,T2,\"1,250.50\",2026-05-01,U2
CVD,T1,100,2026-05-01,
CVD,T9,40,2026-05-02,
";

const FEED_CSV: &str = "\
transaction_uid,state
U1,captured
U2,refund_initiated
";

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Workbook with text-only cells, one entry per sheet.
fn write_xlsx(path: &Path, sheets: &[(&str, &[&str], &[&[&str]])]) {
    let mut wb = rust_xlsxwriter::Workbook::new();
    for (name, headers, rows) in sheets {
        let ws = wb.add_worksheet();
        ws.set_name(*name).unwrap();
        for (c, h) in headers.iter().enumerate() {
            ws.write_string(0, c as u16, *h).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                if !v.is_empty() {
                    ws.write_string(r as u32 + 1, c as u16, *v).unwrap();
                }
            }
        }
    }
    wb.save(path).unwrap();
}

fn sheet_names(path: &Path) -> Vec<String> {
    open_workbook_auto(path).unwrap().sheet_names().to_vec()
}

/// One column of a sheet, rendered as text, header excluded.
fn column(path: &Path, sheet: &str, header: &str) -> Vec<String> {
    let mut wb = open_workbook_auto(path).unwrap();
    let range = wb.worksheet_range(sheet).unwrap();
    let mut rows = range.rows();
    let headers: Vec<String> = rows.next().unwrap().iter().map(|d| d.to_string()).collect();
    let idx = headers
        .iter()
        .position(|h| h == header)
        .unwrap_or_else(|| panic!("no column {header} in {headers:?}"));
    rows.map(|r| match r.get(idx) {
        Some(Data::Empty) | None => String::new(),
        Some(d) => d.to_string(),
    })
    .collect()
}

fn stdout_json(out: &Output) -> serde_json::Value {
    serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!("stdout is not JSON ({e}): {}", String::from_utf8_lossy(&out.stdout))
    })
}

// ============================================================================
// Stage 1 + 2
// ============================================================================

#[test]
fn cross_match_then_enrich() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write(dir.path(), "raw.csv", RAW_CSV);
    let feed = write(dir.path(), "feed.csv", FEED_CSV);
    let processed = dir.path().join("processed.xlsx");
    let enriched = dir.path().join("enriched.xlsx");

    let out = run(&["cross-match", p(&raw), "-o", p(&processed), "--json"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let json = stdout_json(&out);
    assert_eq!(json["bat_rows"], 2);
    assert_eq!(json["cvd_rows"], 2);
    assert_eq!(json["pending_refunds"], 1);

    assert_eq!(sheet_names(&processed), ["CVD", "BAT", "Pending Refunds"]);
    assert_eq!(column(&processed, "BAT", "Remark"), ["Auto Reversal", "Pending Refund 1"]);
    assert_eq!(column(&processed, "CVD", "Remark"), ["Auto Reversal", "Pending Refund 2"]);
    assert_eq!(column(&processed, "BAT", "Vlookup with CVD"), ["T1", ""]);
    assert_eq!(column(&processed, "Pending Refunds", "UDF1"), ["'U2',"]);

    let out = run(&["enrich", p(&processed), p(&feed), "-o", p(&enriched), "--json"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let json = stdout_json(&out);
    let rows = json["summary"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["settle_date"], "2026-05-01");
    assert_eq!(rows[0]["bank_mpr_count"], 2);
    assert_eq!(rows[0]["bank_mpr_amount"], 1350.5);
    assert_eq!(rows[0]["pending_refund_sum"], 1250.5);
    assert_eq!(rows[1]["settle_date"], "2026-05-02");
    assert!(rows[1]["bank_mpr_count"].is_null());
    assert_eq!(rows[1]["bank_mpr_refund_amount"], 40.0);

    assert_eq!(sheet_names(&enriched), ["BAT", "CVD", "summary_output"]);
    assert_eq!(column(&enriched, "BAT", "state"), ["captured", "refund_initiated"]);
    assert_eq!(column(&enriched, "summary_output", "Bank_MPR_Count"), ["2", ""]);
}

#[test]
fn human_summary_goes_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write(dir.path(), "raw.csv", RAW_CSV);
    let processed = dir.path().join("processed.xlsx");

    let out = run(&["cross-match", p(&raw), "-o", p(&processed)]);
    assert!(out.status.success());
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("2 BAT, 2 CVD, 1 pending refunds"), "stderr: {stderr}");
}

// ============================================================================
// Stage 3
// ============================================================================

#[test]
fn carryover_promotes_and_resummarizes() {
    let dir = tempfile::tempdir().unwrap();
    let yesterday = dir.path().join("yesterday.xlsx");
    let today = dir.path().join("today.xlsx");
    let carried = dir.path().join("carried.xlsx");

    write_xlsx(
        &yesterday,
        &[
            (
                "BAT",
                &["MERCHANT_TRACKID", "Vlookup with CVD", "DOMESTIC AMT", "SETTLE DATE", "Remark"],
                &[
                    &["T1", "T1", "100", "2026-05-01", "Auto Reversal"],
                    &["T2", "T2", "50", "2026-05-01", "Pending Refund 1"],
                ],
            ),
            (
                "CVD",
                &["MERCHANT_TRACKID", "Vlookup with BAT", "DOMESTIC AMT", "SETTLE DATE", "Remark"],
                &[
                    &["T1", "T1", "100", "2026-05-01", "Auto Reversal"],
                    &["T3", "T3", "40", "2026-05-02", "Pending Refund 2"],
                    &["T4", "", "10", "2026-05-02", "pending refund 2"],
                ],
            ),
        ],
    );
    write_xlsx(
        &today,
        &[
            ("BAT", &["MERCHANT_TRACKID", "Vlookup with CVD"], &[&["T2", "T2"]]),
            ("CVD", &["MERCHANT_TRACKID", "Vlookup with BAT"], &[&["T3", " T3 "]]),
        ],
    );

    let out = run(&["carryover", p(&yesterday), p(&today), "-o", p(&carried), "--json"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let json = stdout_json(&out);
    assert_eq!(json["promoted"]["bat"], 1);
    assert_eq!(json["promoted"]["cvd"], 1);

    assert_eq!(sheet_names(&carried), ["BAT", "CVD", "summary_output"]);
    assert_eq!(column(&carried, "BAT", "REMARK"), ["Auto Reversal", "System Refund"]);
    assert_eq!(
        column(&carried, "CVD", "REMARK"),
        ["Auto Reversal", "System Refund", "pending refund 2"]
    );

    let rows = json["summary"]["rows"].as_array().unwrap();
    assert_eq!(rows[1]["settle_date"], "2026-05-02");
    assert_eq!(rows[1]["pending_refund_count"], 1);
    assert_eq!(rows[1]["pending_refund_sum"], 10.0);
}

// ============================================================================
// Failure modes
// ============================================================================

#[test]
fn missing_required_column_exits_5_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write(dir.path(), "raw.csv", "MERCHANT_TRACKID,DOMESTIC AMT\nT1,100\n");
    let processed = dir.path().join("processed.xlsx");

    let out = run(&["cross-match", p(&raw), "-o", p(&processed)]);
    assert_eq!(out.status.code(), Some(5));
    assert!(!processed.exists());
    assert!(String::from_utf8_lossy(&out.stderr).contains("REC FMT"));
}

#[test]
fn carryover_without_cvd_remark_exits_5() {
    let dir = tempfile::tempdir().unwrap();
    let yesterday = dir.path().join("yesterday.xlsx");
    let carried = dir.path().join("carried.xlsx");
    write_xlsx(
        &yesterday,
        &[
            ("BAT", &["Vlookup with CVD", "DOMESTIC AMT", "SETTLE DATE"], &[]),
            ("CVD", &["Vlookup with BAT", "DOMESTIC AMT", "SETTLE DATE"], &[]),
        ],
    );

    let out = run(&["carryover", p(&yesterday), p(&yesterday), "-o", p(&carried)]);
    assert_eq!(out.status.code(), Some(5));
    assert!(!carried.exists());
}

#[test]
fn missing_sheet_exits_5() {
    let dir = tempfile::tempdir().unwrap();
    let processed = dir.path().join("processed.xlsx");
    let feed = write(dir.path(), "feed.csv", FEED_CSV);
    write_xlsx(&processed, &[("BAT", &["MERCHANT_TRACKID"], &[])]);

    let out = run(&["enrich", p(&processed), p(&feed), "-o", p(&dir.path().join("out.xlsx"))]);
    assert_eq!(out.status.code(), Some(5));
    assert!(String::from_utf8_lossy(&out.stderr).contains("CVD"));
}

#[test]
fn unreadable_input_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(&[
        "cross-match",
        p(&dir.path().join("nope.xlsx")),
        "-o",
        p(&dir.path().join("out.xlsx")),
    ]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn non_xlsx_output_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write(dir.path(), "raw.csv", RAW_CSV);
    let out = run(&["cross-match", p(&raw), "-o", p(&dir.path().join("out.csv"))]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn invalid_config_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write(dir.path(), "raw.csv", RAW_CSV);
    let config = write(dir.path(), "batcvd.toml", "highlight_color = \"red\"\n");
    let out = run(&[
        "cross-match",
        p(&raw),
        "-o",
        p(&dir.path().join("out.xlsx")),
        "--config",
        p(&config),
    ]);
    assert_eq!(out.status.code(), Some(4));
}

#[test]
fn unreadable_config_exits_3() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let out = run(&["config", "--config", p(&missing)]);
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("cannot read config"), "stderr: {stderr}");
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn config_prints_effective_toml() {
    let out = run(&["config"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("highlight_color = \"FF0000\""), "stdout: {stdout}");
    assert!(stdout.contains("[columns]"));
    assert!(stdout.contains("rec_fmt = \"REC FMT\""));
}

#[test]
fn config_file_renames_columns() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "batcvd.toml", "[columns]\ntrack_id = \"TRACK\"\n");
    let raw = write(dir.path(), "raw.csv", "REC FMT,TRACK\nBAT,A\nCVD,A\n");
    let processed = dir.path().join("processed.xlsx");

    let out = run(&["--config", p(&config), "cross-match", p(&raw), "-o", p(&processed)]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(column(&processed, "BAT", "Vlookup with CVD"), ["A"]);

    let printed = run(&["config", "--config", p(&config)]);
    assert!(String::from_utf8_lossy(&printed.stdout).contains("track_id = \"TRACK\""));
}
