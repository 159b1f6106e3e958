// CSV/TSV import into a header-first Table

use std::io::Read;
use std::path::Path;

use batcvd_recon::model::{Cell, Table};

use crate::error::IoError;

/// Read a delimited text file. The first record is the header row; blank
/// fields become `Cell::Empty`. A `.tsv` file is tab-separated; otherwise the
/// delimiter is whichever of `,` `;` tab `|` the header line uses most.
pub fn read_csv(path: &Path) -> Result<Table, IoError> {
    let content = read_file_as_utf8(path).map_err(|message| IoError::Read {
        path: path.display().to_string(),
        message,
    })?;
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => Some(b'\t'),
        _ => None,
    };
    parse(&content, delimiter).map_err(|message| IoError::Read {
        path: path.display().to_string(),
        message,
    })
}

/// UTF-8 first, Windows-1252 fallback for Excel-exported files.
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

fn parse(content: &str, delimiter: Option<u8>) -> Result<Table, String> {
    // Comma wins ties, including a single-column header with no separator.
    let delimiter = delimiter.unwrap_or_else(|| {
        let header = content.lines().next().unwrap_or_default();
        [b',', b';', b'\t', b'|']
            .into_iter()
            .rev()
            .max_by_key(|d| header.bytes().filter(|b| b == d).count())
            .unwrap_or(b',')
    });

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(record) => record.map_err(|e| e.to_string())?.iter().map(str::to_string).collect(),
        None => return Ok(Table::default()),
    };

    let mut table = Table::new(headers);
    for record in records {
        let record = record.map_err(|e| e.to_string())?;
        table.push_row(
            record
                .iter()
                .map(|field| if field.is_empty() { Cell::Empty } else { Cell::text(field) })
                .collect(),
        );
    }
    Ok(table)
}
