//! Cleansing helpers shared by the stages. Every coercion here is lenient:
//! unparseable input becomes `None` / `Cell::Empty`, never an error.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::model::{Cell, Table};

/// Drop stray single quotes from every text cell.
pub fn strip_quotes(table: &mut Table) {
    table.map_text(|s| s.replace('\'', ""));
}

/// Trim one column's text values in place.
pub fn trim_column(table: &mut Table, col: usize) {
    table.map_column(col, |cell| match cell {
        Cell::Text(s) => Cell::Text(s.trim().to_string()),
        other => other.clone(),
    });
}

/// Numeric value of an amount cell.
pub fn parse_amount(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Text(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

/// Replace an amount column with numbers, or `Empty` where the value does not parse.
pub fn coerce_amount_column(table: &mut Table, col: usize) {
    table.map_column(col, |cell| parse_amount(cell).map_or(Cell::Empty, Cell::Number));
}

/// Parse a settlement date against each format in turn. Datetime formats
/// (containing `%H`) are parsed as datetimes and truncated to the date.
pub fn parse_settle_date(text: &str, formats: &[String]) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    formats.iter().find_map(|fmt| {
        if fmt.contains("%H") {
            NaiveDateTime::parse_from_str(text, fmt).ok().map(|dt| dt.date())
        } else {
            NaiveDate::parse_from_str(text, fmt).ok()
        }
    })
}

/// Day-of-month of a settlement date cell.
pub fn settle_day(cell: &Cell, formats: &[String]) -> Option<u32> {
    match cell {
        Cell::Text(s) => parse_settle_date(s, formats).map(|d| d.day()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconConfig;

    fn formats() -> Vec<String> {
        ReconConfig::default().date_formats
    }

    #[test]
    fn quotes_removed_everywhere() {
        let mut t = Table::from_rows(
            ["A", "B"],
            vec![vec![Cell::text("'BAT'"), Cell::text("it's")]],
        );
        strip_quotes(&mut t);
        assert_eq!(t.cell(0, 0), &Cell::text("BAT"));
        assert_eq!(t.cell(0, 1), &Cell::text("its"));
    }

    #[test]
    fn amounts_coerce_leniently() {
        assert_eq!(parse_amount(&Cell::text(" 1,250.50 ")), Some(1250.5));
        assert_eq!(parse_amount(&Cell::text("-3")), Some(-3.0));
        assert_eq!(parse_amount(&Cell::Number(7.0)), Some(7.0));
        assert_eq!(parse_amount(&Cell::text("n/a")), None);
        assert_eq!(parse_amount(&Cell::text("")), None);
        assert_eq!(parse_amount(&Cell::text("NaN")), None);
        assert_eq!(parse_amount(&Cell::Empty), None);
    }

    #[test]
    fn amount_column_rewritten() {
        let mut t = Table::from_rows(
            ["AMT"],
            vec![vec![Cell::text("10")], vec![Cell::text("x")]],
        );
        coerce_amount_column(&mut t, 0);
        assert_eq!(t.cell(0, 0), &Cell::Number(10.0));
        assert_eq!(t.cell(1, 0), &Cell::Empty);
    }

    #[test]
    fn dates_in_several_layouts() {
        let f = formats();
        let want = NaiveDate::from_ymd_opt(2026, 3, 12);
        assert_eq!(parse_settle_date("2026-03-12", &f), want);
        assert_eq!(parse_settle_date("2026-03-12 00:00:00", &f), want);
        assert_eq!(parse_settle_date("03/12/2026", &f), want);
        assert_eq!(parse_settle_date("12-Mar-2026", &f), want);
        assert_eq!(parse_settle_date("20260312", &f), want);
        assert_eq!(parse_settle_date("not a date", &f), None);
        assert_eq!(parse_settle_date("   ", &f), None);
    }

    #[test]
    fn settle_day_from_cell() {
        let f = formats();
        assert_eq!(settle_day(&Cell::text("2026-01-05"), &f), Some(5));
        assert_eq!(settle_day(&Cell::text("garbage"), &f), None);
        assert_eq!(settle_day(&Cell::Empty, &f), None);
    }
}
