//! Line-oriented log record codec.
//!
//! Each record serializes to exactly one line of JSON whose first key is the
//! kind discriminator, followed by `lsn`, `prev_lsn`, `tx_id`, then the
//! kind-specific fields; page images travel as base64. The persisted log is
//! a newline-separated sequence of such lines, and the parser is the exact
//! inverse of the serializer: `parse_record(serialize_record(r)) == r` for
//! every record and `serialize_record(parse_record(s)) == s` for every
//! codec-produced line.

use crate::core::common::errors::LogError;
use crate::core::wal::log_record::LogRecord;

/// Render one record to its canonical single-line form. The output contains
/// no embedded newlines.
pub fn serialize_record(record: &LogRecord) -> Result<String, LogError> {
    serde_json::to_string(record).map_err(|e| LogError::Serialization(e.to_string()))
}

/// Parse one line into a record.
pub fn parse_record(line: &str) -> Result<LogRecord, LogError> {
    serde_json::from_str(line).map_err(|e| LogError::MalformedRecord(e.to_string()))
}

/// Parse a whole persisted log. Blank lines (including the trailing newline
/// most engines append) are skipped; a failing line is reported with its
/// 1-based position.
pub fn parse_log(text: &str) -> Result<Vec<LogRecord>, LogError> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_record(line)
            .map_err(|e| LogError::MalformedRecord(format!("line {}: {e}", idx + 1)))?;
        records.push(record);
    }
    Ok(records)
}
