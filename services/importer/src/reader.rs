//! Upload decoding: bytes in, a header row plus string records out.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Could not read CSV headers")]
    MissingHeader,

    #[error("Invalid file type. Allowed: {allowed}")]
    UnsupportedExtension { allowed: String },

    #[error("File too large. Maximum size: {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Could not read file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not read spreadsheet: {0}")]
    Spreadsheet(String),
}

/// One data line. `line` is the 1-based position in the source file, where
/// the header occupies line 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: u64,
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    /// Rows with at least one non-blank cell.
    pub fn data_rows(&self) -> impl Iterator<Item = &RawRow> {
        self.rows.iter().filter(|r| !r.is_blank())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Spreadsheet,
}

/// Classify an upload by its extension against the allowed list.
pub fn file_kind(file_name: &str, allowed: &[String]) -> Result<FileKind, ReadError> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    let unsupported = || ReadError::UnsupportedExtension {
        allowed: allowed.join(", "),
    };

    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&extension)) {
        return Err(unsupported());
    }

    match extension.as_str() {
        "csv" | "txt" => Ok(FileKind::Csv),
        "xlsx" | "xls" | "xlsm" | "ods" => Ok(FileKind::Spreadsheet),
        _ => Err(unsupported()),
    }
}

/// Decode text, dropping a UTF-8 BOM. Input that is not valid UTF-8 is read
/// as Windows-1252, which is what spreadsheet tools export by default.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            tracing::debug!("Upload is not UTF-8, decoding as Windows-1252");
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

pub fn read_csv(bytes: &[u8]) -> Result<RawTable, ReadError> {
    let text = decode_text(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(str::to_string).collect(),
        None => return Err(ReadError::MissingHeader),
    };
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ReadError::MissingHeader);
    }

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(index as u64 + 2);
        rows.push(RawRow {
            line,
            cells: record.iter().map(str::to_string).collect(),
        });
    }

    Ok(RawTable { headers, rows })
}

/// First worksheet of an xlsx/xls/ods workbook, cells stringified.
pub fn read_spreadsheet(bytes: &[u8]) -> Result<RawTable, ReadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ReadError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ReadError::Spreadsheet("workbook has no sheets".to_string()))?
        .map_err(|e| ReadError::Spreadsheet(e.to_string()))?;

    let mut lines = range.rows();
    let headers: Vec<String> = lines
        .next()
        .ok_or(ReadError::MissingHeader)?
        .iter()
        .map(cell_text)
        .collect();

    let rows = lines
        .enumerate()
        .map(|(index, cells)| RawRow {
            line: index as u64 + 2,
            cells: cells.iter().map(cell_text).collect(),
        })
        .collect();

    Ok(RawTable { headers, rows })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => datetime.date().format("%Y-%m-%d").to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) => s.split('T').next().unwrap_or(s).to_string(),
        other => other.to_string(),
    }
}

/// Size and extension checks, then dispatch on the file kind.
pub fn read_upload(
    file_name: &str,
    bytes: &[u8],
    max_size: usize,
    allowed: &[String],
) -> Result<RawTable, ReadError> {
    if bytes.len() > max_size {
        return Err(ReadError::TooLarge {
            size: bytes.len(),
            max: max_size,
        });
    }
    match file_kind(file_name, allowed)? {
        FileKind::Csv => read_csv(bytes),
        FileKind::Spreadsheet => read_spreadsheet(bytes),
    }
}
