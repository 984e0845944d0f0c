//! Upload parsing: delimited text or spreadsheet binary to [`StoreRecord`]s.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌────────────────┐
//! │ Upload bytes │────▶│  Row Parser  │────▶│ Vec<StoreRecord>│
//! │ (.csv/.xlsx) │     │ (9 columns)  │     │  (normalized)  │
//! └──────────────┘     └──────────────┘     └────────────────┘
//! ```
//!
//! Both formats share one fixed positional schema matching the published
//! template: code, name, city, region, cluster, target, achievement,
//! qualified-text, points. Row 1 is always the header and is skipped.
//!
//! Row admission: a row is kept only when both the code and the name field
//! are non-empty after trimming. Everything else is filtered silently -
//! a malformed row never fails the upload. The upload fails only on a
//! structural read/decode error or when zero rows were admitted.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::error::{ParseError, ParseResult};
use crate::models::StoreRecord;

/// Fixed header of the published upload template.
pub const TEMPLATE_HEADER: &str = "Store Code,Store Name,City,Region,Cluster Name,Total Target,Total Achievement,Qualified/Not Qualified,Total Points Earned";

/// Illustrative row shipped with the template download.
const TEMPLATE_SAMPLE_ROW: &str =
    "ST001,Store Alpha,Mumbai,West,Metro Cluster,1000000,1200000,Qualified,50000";

/// Declared format of an uploaded file, sniffed from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    /// Comma-delimited text (`.csv`).
    Csv,
    /// Spreadsheet binary (`.xlsx` / `.xls`), first worksheet only.
    Spreadsheet,
}

/// Sniff the upload format from the filename extension (case-insensitive).
///
/// Anything other than `.csv`, `.xlsx` or `.xls` is rejected outright - no
/// partial ingestion of unknown formats.
pub fn detect_format(filename: &str) -> ParseResult<UploadFormat> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => Ok(UploadFormat::Csv),
        "xlsx" | "xls" => Ok(UploadFormat::Spreadsheet),
        _ => Err(ParseError::UnsupportedFormat(if extension.is_empty() {
            filename.to_string()
        } else {
            extension
        })),
    }
}

/// Parse an uploaded file into normalized records.
///
/// Dispatches on the sniffed format, then applies the shared admission and
/// coercion rules. Returns [`ParseError::NoValidRows`] when the file decoded
/// fine but no row survived admission (e.g. a header-only template).
pub fn parse_upload(filename: &str, bytes: &[u8]) -> ParseResult<Vec<StoreRecord>> {
    let records = match detect_format(filename)? {
        UploadFormat::Csv => parse_csv_bytes(bytes)?,
        UploadFormat::Spreadsheet => parse_workbook_bytes(bytes)?,
    };

    if records.is_empty() {
        return Err(ParseError::NoValidRows);
    }
    Ok(records)
}

// =============================================================================
// CSV
// =============================================================================

/// Sniff the character set of upload bytes, normalized to the labels
/// [`decode_content`] understands.
///
/// CSV exports from older spreadsheet tools frequently arrive as Latin-1 or
/// Windows-1252 rather than UTF-8, so the charset is sniffed per upload
/// instead of assuming UTF-8.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _confidence, _) = chardet::detect(bytes);

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".into(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".into(),
        "windows-1252" | "cp1252" => "windows-1252".into(),
        _ => charset,
    }
}

/// Decode upload bytes under the sniffed charset label.
///
/// Latin-1 labels decode through ISO-8859-15, which agrees with Latin-1 on
/// every byte the template data uses. Unknown labels fall back to lossy
/// UTF-8 so a decode never rejects a file outright.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.to_string(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        _ => String::from_utf8_lossy(bytes).to_string(),
    }
}

/// Parse comma-delimited upload bytes.
///
/// Line 1 is the header and is discarded. Blank lines are skipped. Fields
/// are trimmed and stripped of surrounding double quotes before coercion.
pub fn parse_csv_bytes(bytes: &[u8]) -> ParseResult<Vec<StoreRecord>> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);

    let mut lines = content.lines();
    lines.next(); // header

    let records = lines
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let columns: Vec<String> = line
                .split(',')
                .map(|field| field.trim().trim_matches('"').to_string())
                .collect();
            record_from_columns(&columns)
        })
        .collect();

    Ok(records)
}

// =============================================================================
// Spreadsheet
// =============================================================================

/// Parse spreadsheet upload bytes (first worksheet only).
///
/// Row 0 is the header and is skipped. Every cell is coerced to a string
/// before the shared field coercion runs, so numeric cells behave exactly
/// like their CSV counterparts.
pub fn parse_workbook_bytes(bytes: &[u8]) -> ParseResult<Vec<StoreRecord>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ParseError::Structural(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::Structural("workbook has no sheets".into()))?
        .map_err(|e| ParseError::Structural(e.to_string()))?;

    let records = range
        .rows()
        .skip(1)
        .filter_map(|row| {
            let columns: Vec<String> = row.iter().map(cell_to_string).collect();
            record_from_columns(&columns)
        })
        .collect();

    Ok(records)
}

/// Coerce a worksheet cell to a trimmed string.
///
/// Whole floats render without the fractional part so a cell holding 1000
/// parses as the integer 1000 rather than "1000.0".
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

// =============================================================================
// Field Coercion
// =============================================================================

/// Map the fixed 9-column schema onto a record, or drop the row.
///
/// Returns `None` when the code or name field is empty - the caller filters
/// such rows without raising an error.
fn record_from_columns(columns: &[String]) -> Option<StoreRecord> {
    let store_code = column(columns, 0);
    let store_name = column(columns, 1);
    if store_code.is_empty() || store_name.is_empty() {
        return None;
    }

    Some(StoreRecord {
        store_code,
        store_name,
        city: column(columns, 2),
        region: column(columns, 3),
        cluster_name: column(columns, 4),
        total_target: parse_amount(&column(columns, 5)),
        total_achievement: parse_amount(&column(columns, 6)),
        qualified: parse_qualified(&column(columns, 7)),
        total_points_earned: parse_amount(&column(columns, 8)),
    })
}

fn column(columns: &[String], index: usize) -> String {
    columns.get(index).map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Parse a non-negative integer amount; missing or unparsable values become 0.
/// No decimal/fractional support - a row never fails on a bad number.
pub fn parse_amount(raw: &str) -> u64 {
    raw.trim().parse().unwrap_or(0)
}

/// Case-insensitive match against the literal "qualified"; anything else,
/// including "Not Qualified", is false.
pub fn parse_qualified(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("qualified")
}

// =============================================================================
// Template Export
// =============================================================================

/// Build the downloadable CSV template: the fixed 9-column header plus one
/// illustrative sample row.
pub fn template_csv() -> String {
    format!("{}\n{}\n", TEMPLATE_HEADER, TEMPLATE_SAMPLE_ROW)
}
