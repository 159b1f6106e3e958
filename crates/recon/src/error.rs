use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (blank column name, bad color, etc.).
    ConfigValidation(String),
    /// Missing required column in a sheet.
    MissingColumn { sheet: String, column: String },
    /// An input workbook lacks an expected sheet.
    MissingSheet { source: String, sheet: String },
    /// The config file could not be read.
    Io(String),
}

impl ReconError {
    pub fn missing_column(sheet: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            sheet: sheet.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { sheet, column } => {
                write!(f, "missing required column '{column}' in '{sheet}' sheet")
            }
            Self::MissingSheet { source, sheet } => {
                write!(f, "{source}: missing sheet '{sheet}'")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
