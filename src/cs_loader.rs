//! Flow Dataset Loading
//!
//! Maps raw rows (string column -> string value) onto FlowRecords and reads
//! them from CSV files with a header row. Columns that are not one of the five
//! core fields are carried through untouched as metadata.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use indexmap::IndexMap;
use log::{debug, info};

use crate::cs_interface::{FlowRecord, FlowTime, Metadata};

/// A raw dataset row, column name -> value, in column order
pub type RawRow = IndexMap<String, String>;

// naive formats tried when no explicit timestamp format is configured
const ISO_NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

// ============================================================================
// Configuration
// ============================================================================

/// Which columns hold the core flow fields
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct FlowFieldMap {
    /// Timestamp column (default: "timestamp")
    pub timestamp_key: String,

    /// Source endpoint column (default: "src")
    pub src_key: String,

    /// Destination endpoint column (default: "dst")
    pub dst_key: String,

    /// Protocol column (default: "protocol")
    pub protocol_key: String,

    /// Byte count column (default: "bytes")
    pub byte_count_key: String,

    /// chrono format string for the timestamp column
    ///
    /// When absent the value must be RFC 3339 or an ISO-8601 date-time without
    /// offset (read as UTC).
    pub timestamp_format: Option<String>,
}

impl Default for FlowFieldMap {
    fn default() -> Self {
        Self {
            timestamp_key: "timestamp".to_string(),
            src_key: "src".to_string(),
            dst_key: "dst".to_string(),
            protocol_key: "protocol".to_string(),
            byte_count_key: "bytes".to_string(),
            timestamp_format: None,
        }
    }
}

impl FlowFieldMap {
    fn is_core_field(&self, key: &str) -> bool {
        key == self.timestamp_key
            || key == self.src_key
            || key == self.dst_key
            || key == self.protocol_key
            || key == self.byte_count_key
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Problems with a single row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// Column missing from the row
    MissingField(String),

    /// Source or destination column is empty
    EmptyEndpoint(String),

    /// Timestamp could not be parsed
    InvalidTimestamp(String),

    /// Byte count is not a non-negative integer
    InvalidByteCount(String),
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowError::MissingField(key) => write!(f, "missing field '{}'", key),
            RowError::EmptyEndpoint(key) => write!(f, "empty endpoint in field '{}'", key),
            RowError::InvalidTimestamp(value) => write!(f, "invalid timestamp '{}'", value),
            RowError::InvalidByteCount(value) => write!(f, "invalid byte count '{}'", value),
        }
    }
}

impl std::error::Error for RowError {}

/// Errors that can occur while loading a flow dataset
#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),

    /// CSV structure problem (unterminated quote, column count mismatch, no header)
    MalformedCsv { line: usize, reason: String },

    /// Row parsed as CSV but is not a valid flow
    ///
    /// `row` is the file line number for CSV input, otherwise the 1-based row position.
    InvalidRow { row: usize, error: RowError },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "i/o error: {}", e),
            LoadError::MalformedCsv { line, reason } => {
                write!(f, "malformed csv at line {}: {}", line, reason)
            }
            LoadError::InvalidRow { row, error } => write!(f, "row {}: {}", row, error),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            LoadError::InvalidRow { error, .. } => Some(error),
            LoadError::MalformedCsv { .. } => None,
        }
    }
}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        LoadError::Io(e)
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

impl FlowRecord {
    /// Create a FlowRecord from a raw row
    ///
    /// The protocol is upper-cased and every non-core column is copied into
    /// the metadata in column order.
    pub fn from_row(row: &RawRow, map: &FlowFieldMap) -> Result<FlowRecord, RowError> {
        let field = |key: &str| {
            row.get(key)
                .map(|value| value.trim())
                .ok_or_else(|| RowError::MissingField(key.to_string()))
        };

        let timestamp_raw = field(&map.timestamp_key)?;
        let timestamp = parse_timestamp(timestamp_raw, map.timestamp_format.as_deref())
            .ok_or_else(|| RowError::InvalidTimestamp(timestamp_raw.to_string()))?;

        let src = field(&map.src_key)?;
        if src.is_empty() {
            return Err(RowError::EmptyEndpoint(map.src_key.clone()));
        }
        let dst = field(&map.dst_key)?;
        if dst.is_empty() {
            return Err(RowError::EmptyEndpoint(map.dst_key.clone()));
        }

        let protocol = field(&map.protocol_key)?;

        let bytes_raw = field(&map.byte_count_key)?;
        let byte_count = bytes_raw
            .parse::<u64>()
            .map_err(|_| RowError::InvalidByteCount(bytes_raw.to_string()))?;

        let metadata: Metadata = row
            .iter()
            .filter(|(key, _)| !map.is_core_field(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(FlowRecord::with_metadata(
            timestamp, src, dst, protocol, byte_count, metadata,
        ))
    }
}

/// Parse a timestamp, optionally with an explicit chrono format
///
/// Values without an offset are taken as UTC.
pub fn parse_timestamp(value: &str, format: Option<&str>) -> Option<FlowTime> {
    match format {
        Some(format) => DateTime::parse_from_str(value, format)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(value, format)
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive))
            })
            .or_else(|| {
                NaiveDate::parse_from_str(value, format)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }),
        None => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
                return Some(dt.with_timezone(&Utc));
            }
            for format in ISO_NAIVE_FORMATS {
                if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
    }
}

/// Convert raw rows into FlowRecords, lazily
pub fn iter_flow_records<'m, I>(
    rows: I,
    map: &'m FlowFieldMap,
) -> impl Iterator<Item = Result<FlowRecord, LoadError>> + 'm
where
    I: IntoIterator<Item = RawRow>,
    I::IntoIter: 'm,
{
    rows.into_iter().enumerate().map(move |(i, row)| {
        FlowRecord::from_row(&row, map).map_err(|error| LoadError::InvalidRow { row: i + 1, error })
    })
}

// ============================================================================
// CSV
// ============================================================================

/// Load flow records from a CSV file with a header row
pub fn load_csv_flows(path: impl AsRef<Path>, map: &FlowFieldMap) -> Result<Vec<FlowRecord>, LoadError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let flows = parse_csv_flows(BufReader::new(file), map)?;
    info!("loaded {} flows from {}", flows.len(), path.display());
    Ok(flows)
}

/// Read flow records from CSV text
///
/// Fields are comma separated; a field may be wrapped in double quotes, with
/// `""` standing for a literal quote, and may then span several lines. Blank
/// lines between records are skipped. Errors report the line a record starts on.
pub fn parse_csv_flows<R: BufRead>(reader: R, map: &FlowFieldMap) -> Result<Vec<FlowRecord>, LoadError> {
    let mut header: Option<Vec<String>> = None;
    let mut flows = Vec::new();
    let mut lines = reader.lines().enumerate();

    while let Some((i, line)) = lines.next() {
        let mut record = line?;
        let line_no = i + 1;
        if record.trim().is_empty() {
            continue;
        }

        let fields = loop {
            match split_csv_line(&record) {
                Ok(fields) => break fields,
                Err(reason) => match lines.next() {
                    // still inside a quoted field, pull in the next line
                    Some((_, next)) => {
                        record.push('\n');
                        record.push_str(&next?);
                    }
                    None => return Err(LoadError::MalformedCsv { line: line_no, reason }),
                },
            }
        };

        let columns = match &header {
            None => {
                // tolerate a UTF-8 BOM on the first column name
                let columns = fields
                    .into_iter()
                    .map(|name| name.trim_start_matches('\u{feff}').trim().to_string())
                    .collect();
                header = Some(columns);
                continue;
            }
            Some(columns) => columns,
        };

        if fields.len() != columns.len() {
            return Err(LoadError::MalformedCsv {
                line: line_no,
                reason: format!("expected {} fields, found {}", columns.len(), fields.len()),
            });
        }

        let row: RawRow = columns.iter().cloned().zip(fields).collect();
        let flow = FlowRecord::from_row(&row, map)
            .map_err(|error| LoadError::InvalidRow { row: line_no, error })?;
        flows.push(flow);
    }

    if header.is_none() {
        return Err(LoadError::MalformedCsv {
            line: 0,
            reason: "missing header row".to_string(),
        });
    }

    debug!("parsed {} csv rows", flows.len());
    Ok(flows)
}

fn split_csv_line(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
        } else {
            match c {
                '"' if field.is_empty() => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut field)),
                _ => field.push(c),
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}
