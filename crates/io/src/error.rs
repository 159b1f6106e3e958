use std::fmt;

#[derive(Debug)]
pub enum IoError {
    /// File could not be opened or read.
    Read { path: String, message: String },
    /// Workbook is readable but lacks a sheet the stage needs.
    MissingSheet { path: String, sheet: String },
    /// Sheet exists but holds no header row.
    EmptySheet { path: String, sheet: String },
    /// Output could not be built or saved.
    Write { path: String, message: String },
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, message } => write!(f, "cannot read {path}: {message}"),
            Self::MissingSheet { path, sheet } => write!(f, "{path}: no sheet named '{sheet}'"),
            Self::EmptySheet { path, sheet } => write!(f, "{path}: sheet '{sheet}' has no header row"),
            Self::Write { path, message } => write!(f, "cannot write {path}: {message}"),
        }
    }
}

impl std::error::Error for IoError {}
