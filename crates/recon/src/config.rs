use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::Partition;

/// xlsx caps worksheet names at 31 characters.
const MAX_SHEET_NAME: usize = 31;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Field names, sheet names and parsing knobs shared by all three stages.
///
/// Every section has defaults matching the legacy workbook layout, so an
/// empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconConfig {
    /// chrono formats tried in order when reading a settlement date.
    pub date_formats: Vec<String>,
    /// RGB hex fill applied to duplicate-key rows in the enrichment output.
    pub highlight_color: String,
    pub columns: ColumnNames,
    pub sheets: SheetNames,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            date_formats: [
                "%Y-%m-%d",
                "%Y-%m-%d %H:%M:%S",
                "%Y/%m/%d",
                "%m/%d/%Y",
                "%d-%b-%Y",
                "%d-%m-%Y",
                "%Y%m%d",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            highlight_color: "FF0000".into(),
            columns: ColumnNames::default(),
            sheets: SheetNames::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ColumnNames {
    pub rec_fmt: String,
    pub track_id: String,
    pub amount: String,
    pub settle_date: String,
    pub udf1: String,
    pub settle_day: String,
    /// Remark header as written by cross-match; carryover matches its uppercase form.
    pub remark: String,
    /// Cross-link column on BAT rows (the CVD track id, when present).
    pub bat_cross_link: String,
    /// Cross-link column on CVD rows (the BAT track id, when present).
    pub cvd_cross_link: String,
    pub feed_key: String,
    pub feed_state: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            rec_fmt: "REC FMT".into(),
            track_id: "MERCHANT_TRACKID".into(),
            amount: "DOMESTIC AMT".into(),
            settle_date: "SETTLE DATE".into(),
            udf1: "UDF1".into(),
            settle_day: "SETTLE DAY".into(),
            remark: "Remark".into(),
            bat_cross_link: "Vlookup with CVD".into(),
            cvd_cross_link: "Vlookup with BAT".into(),
            feed_key: "transaction_uid".into(),
            feed_state: "state".into(),
        }
    }
}

impl ColumnNames {
    /// Cross-link column carried by rows of `partition`.
    pub fn cross_link(&self, partition: Partition) -> &str {
        match partition {
            Partition::Bat => &self.bat_cross_link,
            Partition::Cvd => &self.cvd_cross_link,
        }
    }

    fn all(&self) -> [(&'static str, &str); 11] {
        [
            ("rec_fmt", self.rec_fmt.as_str()),
            ("track_id", self.track_id.as_str()),
            ("amount", self.amount.as_str()),
            ("settle_date", self.settle_date.as_str()),
            ("udf1", self.udf1.as_str()),
            ("settle_day", self.settle_day.as_str()),
            ("remark", self.remark.as_str()),
            ("bat_cross_link", self.bat_cross_link.as_str()),
            ("cvd_cross_link", self.cvd_cross_link.as_str()),
            ("feed_key", self.feed_key.as_str()),
            ("feed_state", self.feed_state.as_str()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Sheets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SheetNames {
    pub bat: String,
    pub cvd: String,
    pub pending: String,
    pub summary: String,
}

impl Default for SheetNames {
    fn default() -> Self {
        Self {
            bat: "BAT".into(),
            cvd: "CVD".into(),
            pending: "Pending Refunds".into(),
            summary: "summary_output".into(),
        }
    }
}

impl SheetNames {
    pub fn partition(&self, partition: Partition) -> &str {
        match partition {
            Partition::Bat => &self.bat,
            Partition::Cvd => &self.cvd,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    /// Parse and validate a TOML config string.
    pub fn from_toml(s: &str) -> Result<Self, ReconError> {
        let config: Self = toml::from_str(s).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ReconError> {
        toml::to_string_pretty(self).map_err(|e| ReconError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        for (key, value) in self.columns.all() {
            if value.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "columns.{key} must not be blank"
                )));
            }
        }

        // Everything except feed_key lands in the same output sheets, and
        // Stage 3 compares headers case-insensitively.
        let mut owners: HashMap<String, &str> = HashMap::new();
        for (key, value) in self.columns.all() {
            if key == "feed_key" {
                continue;
            }
            if let Some(other) = owners.insert(value.trim().to_uppercase(), key) {
                return Err(ReconError::ConfigValidation(format!(
                    "columns.{other} and columns.{key} must differ (both '{value}')"
                )));
            }
        }

        let sheets = [
            &self.sheets.bat,
            &self.sheets.cvd,
            &self.sheets.pending,
            &self.sheets.summary,
        ];
        let mut seen = HashSet::new();
        for name in sheets {
            if name.trim().is_empty() {
                return Err(ReconError::ConfigValidation("sheet names must not be blank".into()));
            }
            if name.chars().count() > MAX_SHEET_NAME {
                return Err(ReconError::ConfigValidation(format!(
                    "sheet name '{name}' exceeds {MAX_SHEET_NAME} characters"
                )));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(ReconError::ConfigValidation(format!(
                    "duplicate sheet name '{name}'"
                )));
            }
        }

        if self.date_formats.is_empty() {
            return Err(ReconError::ConfigValidation(
                "date_formats must list at least one format".into(),
            ));
        }

        self.highlight_rgb()?;
        Ok(())
    }

    /// `highlight_color` as a 24-bit RGB value.
    pub fn highlight_rgb(&self) -> Result<u32, ReconError> {
        let hex = self.highlight_color.trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ReconError::ConfigValidation(format!(
                "highlight_color '{}' is not a six-digit hex color",
                self.highlight_color
            )));
        }
        u32::from_str_radix(hex, 16)
            .map_err(|e| ReconError::ConfigValidation(format!("highlight_color: {e}")))
    }
}
