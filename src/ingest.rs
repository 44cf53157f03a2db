//! Dataset ingestion and schema normalization.
//!
//! Uploads arrive either as delimited text or as a spreadsheet. Both are read
//! into a [`Dataset`] of raw string cells, which [`normalize`] then validates
//! against the canonical consumption schema.

use std::io::Cursor;

use calamine::{Data, DataType, Reader, open_workbook_auto_from_rs};

use crate::error::ForecastError;

/// Canonical name of the timestamp column.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Canonical name of the consumption column.
pub const CONSUMPTION_COLUMN: &str = "consumo kwh";

const CONSUMPTION_ALIASES: [&str; 2] = [CONSUMPTION_COLUMN, "consumption kwh"];
const VOLTAGE_ALIASES: [&str; 2] = ["voltaje", "voltage"];
const CURRENT_ALIASES: [&str; 2] = ["corriente", "current"];
const POWER_ALIASES: [&str; 2] = ["potencia kw", "power kw"];
const POWER_FACTOR_ALIASES: [&str; 2] = ["factor potencia", "power factor"];

/// Format of an uploaded dataset, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

impl FileFormat {
    /// Detect the format from a file name.
    pub fn from_filename(name: &str) -> Result<Self, ForecastError> {
        let lower = name.trim().to_lowercase();
        match lower.rsplit_once('.').map(|(_, ext)| ext) {
            Some("csv") => Ok(Self::Csv),
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => Ok(Self::Spreadsheet),
            _ => Err(ForecastError::UnsupportedFormat(name.to_string())),
        }
    }
}

/// A table of raw string cells as read from an upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A dataset whose headers are normalized and whose required columns exist.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDataset {
    dataset: Dataset,
    timestamp_idx: usize,
    consumption_idx: usize,
    voltage_idx: Option<usize>,
    current_idx: Option<usize>,
    power_idx: Option<usize>,
    power_factor_idx: Option<usize>,
}

impl NormalizedDataset {
    pub fn headers(&self) -> &[String] {
        self.dataset.headers()
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Iterate over rows as [`RawRow`] views.
    pub fn rows(&self) -> impl Iterator<Item = RawRow<'_>> + '_ {
        self.dataset.rows().iter().map(move |cells| RawRow {
            cells,
            columns: self,
        })
    }
}

/// Borrowed view of one row of a [`NormalizedDataset`].
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    cells: &'a [String],
    columns: &'a NormalizedDataset,
}

impl<'a> RawRow<'a> {
    fn cell(&self, idx: usize) -> &'a str {
        self.cells.get(idx).map(|s| s.trim()).unwrap_or("")
    }

    fn optional(&self, idx: Option<usize>) -> Option<&'a str> {
        idx.map(|i| self.cell(i)).filter(|s| !s.is_empty())
    }

    pub fn timestamp(&self) -> &'a str {
        self.cell(self.columns.timestamp_idx)
    }

    pub fn consumption(&self) -> &'a str {
        self.cell(self.columns.consumption_idx)
    }

    pub fn voltage(&self) -> Option<&'a str> {
        self.optional(self.columns.voltage_idx)
    }

    pub fn current(&self) -> Option<&'a str> {
        self.optional(self.columns.current_idx)
    }

    pub fn power(&self) -> Option<&'a str> {
        self.optional(self.columns.power_idx)
    }

    pub fn power_factor(&self) -> Option<&'a str> {
        self.optional(self.columns.power_factor_idx)
    }
}

/// Normalize a header label: strip a byte-order mark, trim, lowercase.
pub fn normalize_label(label: &str) -> String {
    label.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Normalize column labels and check the required columns are present.
///
/// Returns a transformed copy; `dataset` is left untouched.
pub fn normalize(dataset: &Dataset) -> Result<NormalizedDataset, ForecastError> {
    let headers: Vec<String> = dataset.headers().iter().map(|h| normalize_label(h)).collect();

    let find = |aliases: &[&str]| {
        headers
            .iter()
            .position(|h| aliases.iter().any(|alias| h == alias))
    };

    let timestamp_idx = find(&[TIMESTAMP_COLUMN]);
    let consumption_idx = find(&CONSUMPTION_ALIASES);

    let (timestamp_idx, consumption_idx) = match (timestamp_idx, consumption_idx) {
        (Some(t), Some(c)) => (t, c),
        (t, c) => {
            let mut missing = Vec::new();
            if t.is_none() {
                missing.push(TIMESTAMP_COLUMN.to_string());
            }
            if c.is_none() {
                missing.push(CONSUMPTION_COLUMN.to_string());
            }
            return Err(ForecastError::Schema { missing });
        }
    };

    Ok(NormalizedDataset {
        voltage_idx: find(&VOLTAGE_ALIASES),
        current_idx: find(&CURRENT_ALIASES),
        power_idx: find(&POWER_ALIASES),
        power_factor_idx: find(&POWER_FACTOR_ALIASES),
        dataset: Dataset::new(headers, dataset.rows().to_vec()),
        timestamp_idx,
        consumption_idx,
    })
}

/// Read an upload into a [`Dataset`], choosing the reader by file name.
pub fn read_dataset(filename: &str, bytes: &[u8]) -> Result<Dataset, ForecastError> {
    match FileFormat::from_filename(filename)? {
        FileFormat::Csv => read_csv(bytes),
        FileFormat::Spreadsheet => read_spreadsheet(bytes),
    }
}

/// Read delimited text with a header row.
pub fn read_csv(bytes: &[u8]) -> Result<Dataset, ForecastError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| ForecastError::Read(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ForecastError::Read(e.to_string()))?;
        // Trailing blank lines in exported files.
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Dataset::new(headers, rows))
}

/// Read the first worksheet of a spreadsheet; its first row is the header.
pub fn read_spreadsheet(bytes: &[u8]) -> Result<Dataset, ForecastError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ForecastError::Read(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ForecastError::Read("workbook has no worksheets".to_string()))?
        .map_err(|e| ForecastError::Read(e.to_string()))?;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|row| row.iter().map(cell_to_string).collect())
        .unwrap_or_default();

    let rows = rows
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();

    Ok(Dataset::new(headers, rows))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| cell.to_string()),
        _ => cell.to_string(),
    }
}
