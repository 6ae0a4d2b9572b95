// # Meta Log Codec
//
// CSV encoding and decoding of the meta log.
//
// ## File Format
//
// ```text
// source_date,datetime_of_processing
// 2021-04-12,2021-04-17 08:00:00
// 2021-04-13,2021-04-17 08:00:00
// ```
//
// UTF-8, comma-separated, `\n`-terminated, header first. Decoding yields the
// header and cells untouched and encoding writes them back the same way, so
// rows already in the log survive a merge byte for byte. Only new rows are
// formatted from typed values.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::meta::{MetaLog, MetaSchema, format_date, format_processed_at};

/// Serialization format of the meta log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// Comma-separated values with a header row
    #[default]
    Csv,
}

impl TableFormat {
    /// Format name as used in configuration
    pub fn name(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
        }
    }

    /// Encode a table
    pub fn encode(&self, table: &RawTable) -> Result<Vec<u8>> {
        match self {
            TableFormat::Csv => encode_csv(table),
        }
    }

    /// Decode a blob into header and cells
    pub fn decode(&self, body: &[u8]) -> Result<RawTable> {
        match self {
            TableFormat::Csv => decode_csv(body),
        }
    }
}

impl FromStr for TableFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(TableFormat::Csv),
            other => Err(Error::WrongFormat(format!(
                "'{}' (supported formats: csv)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for TableFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The meta log as stored: header and cells, verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Header cells, in file order
    pub columns: Vec<String>,
    /// Data rows, cells in header order
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// A new table holding `log`, columns in schema order
    pub fn from_log(log: &MetaLog, schema: &MetaSchema) -> Self {
        let mut table = Self {
            columns: schema.columns(),
            rows: Vec::new(),
        };
        table.append_log(log, schema);
        table
    }

    /// Append the rows of `log` after the existing rows, following the header order
    ///
    /// The header must already match `schema`.
    pub fn append_log(&mut self, log: &MetaLog, schema: &MetaSchema) {
        for entry in log.entries() {
            let row = self
                .columns
                .iter()
                .map(|column| {
                    if *column == schema.source_date_column {
                        format_date(entry.source_date)
                    } else if *column == schema.processed_at_column {
                        format_processed_at(entry.processed_at)
                    } else {
                        String::new()
                    }
                })
                .collect();
            self.rows.push(row);
        }
    }

    /// Position of `name` in the header
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Encode header and rows as they are
pub fn encode_csv(table: &RawTable) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::store(format!("Failed to flush CSV buffer: {}", e)))
}

/// Decode a CSV blob
///
/// An empty blob decodes to an empty header, which no schema matches.
/// Ragged rows are rejected by the reader.
pub fn decode_csv(body: &[u8]) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body);

    let columns = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn encodes_header_and_rows() {
        let date = NaiveDate::from_ymd_opt(2021, 4, 16).unwrap();
        let ts = NaiveDate::from_ymd_opt(2021, 4, 18)
            .unwrap()
            .and_hms_opt(7, 5, 9)
            .unwrap();
        let log = MetaLog::batch(&[date, date.succ_opt().unwrap()], ts);

        let body = encode_csv(&RawTable::from_log(&log, &MetaSchema::default())).unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "source_date,datetime_of_processing\n\
             2021-04-16,2021-04-18 07:05:09\n\
             2021-04-17,2021-04-18 07:05:09\n"
        );
    }

    #[test]
    fn empty_log_is_header_only() {
        let body = encode_csv(&RawTable::from_log(&MetaLog::new(), &MetaSchema::default())).unwrap();
        assert_eq!(body, b"source_date,datetime_of_processing\n");
    }

    #[test]
    fn existing_cells_are_written_back_verbatim() {
        let body = b"datetime_of_processing,source_date\n\
                     2021-04-11 06:30:00.123456,2021-04-10\n\
                     2021-04-12,2021-04-11\n\
                     n/a,\n";
        let mut table = decode_csv(body).unwrap();

        let ts = NaiveDate::from_ymd_opt(2021, 4, 18)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let batch = MetaLog::batch(&[NaiveDate::from_ymd_opt(2021, 4, 17).unwrap()], ts);
        table.append_log(&batch, &MetaSchema::default());

        let encoded = encode_csv(&table).unwrap();
        let mut expected = body.to_vec();
        expected.extend_from_slice(b"2021-04-18 12:00:00,2021-04-17\n");
        assert_eq!(encoded, expected);
    }

    #[test]
    fn decodes_without_trailing_newline() {
        let raw = decode_csv(b"wrong_column,datetime_of_processing\n2021-04-12,2021-04-17").unwrap();

        assert_eq!(raw.columns, vec!["wrong_column", "datetime_of_processing"]);
        assert_eq!(raw.rows, vec![vec!["2021-04-12", "2021-04-17"]]);
    }

    #[test]
    fn empty_body_has_no_columns() {
        let raw = decode_csv(b"").unwrap();
        assert!(raw.columns.is_empty());
        assert!(raw.rows.is_empty());
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let result = decode_csv(b"a,b\n1,2\n3\n");
        assert!(matches!(result, Err(Error::Csv(_))));
    }

    #[test]
    fn format_names() {
        assert_eq!("csv".parse::<TableFormat>().unwrap(), TableFormat::Csv);
        assert_eq!(" CSV ".parse::<TableFormat>().unwrap(), TableFormat::Csv);
        assert!(matches!(
            "parquet".parse::<TableFormat>(),
            Err(Error::WrongFormat(_))
        ));
    }
}
