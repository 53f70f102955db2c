//! CSV and JSON export of records
//!
//! Both formats carry the same fields. CSV flattens metadata into one column
//! per distinct key (sorted), after the fixed columns; JSON nests it.

use crate::output::{ExportError, ExportResult};
use crate::record::{format_timestamp, parse_timestamp, Record, ScrapeStatus};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;
use tempfile::NamedTempFile;

/// Leading CSV columns, in order
pub const CSV_FIXED_COLUMNS: [&str; 6] = ["url", "status", "title", "text", "http_code", "fetched_at"];

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Conventional file extension for the format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(ExportError::Format(format!("unknown export format: {}", other))),
        }
    }
}

/// Writes records to `writer` in the given format
///
/// Output depends only on the records and their order, so exporting the
/// same snapshot twice yields identical bytes.
pub fn export<W: Write>(records: &[Record], format: ExportFormat, writer: W) -> ExportResult<()> {
    match format {
        ExportFormat::Csv => write_csv(records, writer),
        ExportFormat::Json => write_json(records, writer),
    }
}

/// Exports records to a file, replacing it atomically
///
/// Readers of `path` see either the previous file or the complete new one.
pub fn export_to_path(records: &[Record], format: ExportFormat, path: &Path) -> ExportResult<()> {
    write_atomically(path, |writer| export(records, format, writer))?;
    tracing::info!(
        "Exported {} records as {} to {}",
        records.len(),
        format.extension(),
        path.display()
    );
    Ok(())
}

/// Writes a file through a uniquely named sibling temp file and a rename
///
/// Concurrent writers to the same path each use their own temp file; the
/// last rename wins. On failure the temp file is removed and `path` is
/// left untouched.
pub fn write_atomically<F>(path: &Path, write: F) -> ExportResult<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> ExportResult<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;

    {
        let mut writer = BufWriter::new(tmp.as_file());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| ExportError::Io(e.error))?;
    Ok(())
}

fn write_json<W: Write>(records: &[Record], mut writer: W) -> ExportResult<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn write_csv<W: Write>(records: &[Record], writer: W) -> ExportResult<()> {
    let metadata_keys: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.metadata.keys().map(String::as_str))
        .collect();

    let mut csv_writer = csv::Writer::from_writer(writer);

    let header = CSV_FIXED_COLUMNS
        .iter()
        .copied()
        .chain(metadata_keys.iter().copied());
    csv_writer.write_record(header)?;

    for record in records {
        let http_code = record.http_code.map(|c| c.to_string()).unwrap_or_default();
        let fetched_at = format_timestamp(&record.fetched_at);

        let mut row: Vec<&str> = vec![
            record.url.as_str(),
            record.status.as_str(),
            record.title.as_deref().unwrap_or(""),
            record.text.as_deref().unwrap_or(""),
            http_code.as_str(),
            fetched_at.as_str(),
        ];
        row.extend(
            metadata_keys
                .iter()
                .map(|key| record.metadata.get(*key).map(String::as_str).unwrap_or("")),
        );

        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Parses records from a JSON export
pub fn read_json<R: Read>(reader: R) -> ExportResult<Vec<Record>> {
    Ok(serde_json::from_reader(reader)?)
}

/// Parses records from a CSV export
///
/// Empty title and metadata cells are read as absent. Text is present
/// exactly for successful records, so an empty text cell on a successful
/// record reads back as empty text.
pub fn read_csv<R: Read>(reader: R) -> ExportResult<Vec<Record>> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let fixed: Vec<&str> = headers.iter().take(CSV_FIXED_COLUMNS.len()).collect();
    if fixed != CSV_FIXED_COLUMNS {
        return Err(ExportError::Format(format!(
            "unexpected CSV header: {:?}",
            fixed
        )));
    }
    let metadata_keys: Vec<&str> = headers.iter().skip(CSV_FIXED_COLUMNS.len()).collect();

    let mut records = Vec::new();
    for (line, row) in csv_reader.records().enumerate() {
        let row = row?;
        let cell = |i: usize| row.get(i).unwrap_or("");
        let row_error = |message: String| ExportError::Format(format!("row {}: {}", line + 1, message));

        let status = ScrapeStatus::from_label(cell(1))
            .ok_or_else(|| row_error(format!("unknown status {:?}", cell(1))))?;
        let http_code = match cell(4) {
            "" => None,
            code => Some(
                code.parse::<u16>()
                    .map_err(|e| row_error(format!("bad http_code {:?}: {}", code, e)))?,
            ),
        };
        let fetched_at = parse_timestamp(cell(5))
            .map_err(|e| row_error(format!("bad fetched_at {:?}: {}", cell(5), e)))?;

        let metadata: BTreeMap<String, String> = metadata_keys
            .iter()
            .enumerate()
            .map(|(i, key)| (*key, cell(CSV_FIXED_COLUMNS.len() + i)))
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        records.push(Record {
            url: cell(0).to_string(),
            status,
            title: Some(cell(2)).filter(|t| !t.is_empty()).map(str::to_string),
            text: status.is_success().then(|| cell(3).to_string()),
            metadata,
            fetched_at,
            http_code,
        });
    }

    Ok(records)
}
