//! Feature extraction for consumption forecasting
//!
//! Converts normalized consumption rows into typed records and the
//! (hour-of-day, day-of-week) feature vectors the regressor is trained on.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::ingest::{CONSUMPTION_COLUMN, NormalizedDataset, TIMESTAMP_COLUMN};

/// Naive timestamp layouts accepted besides RFC 3339.
///
/// Slash dates are month-first; day-first only matches when the leading
/// field cannot be a month.
const DATETIME_FORMATS: [&str; 10] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Date-only layouts, read as midnight. Same month-first order.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y"];

/// A single parsed consumption reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    /// Wall-clock time of the reading, as written in the source file
    pub timestamp: NaiveDateTime,
    pub consumption_kwh: f64,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub power_kw: Option<f64>,
    pub power_factor: Option<f64>,
}

/// Model input for one hour slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureVector {
    /// 0-23
    pub hour_of_day: u32,
    /// 0=Monday, 6=Sunday
    pub day_of_week: u32,
}

impl FeatureVector {
    /// Number of features
    pub const NUM_FEATURES: usize = 2;

    pub fn new(hour_of_day: u32, day_of_week: u32) -> Self {
        Self {
            hour_of_day,
            day_of_week,
        }
    }

    /// Derive the features of a timestamp.
    pub fn from_timestamp(timestamp: &NaiveDateTime) -> Self {
        Self {
            hour_of_day: timestamp.hour(),
            day_of_week: timestamp.weekday().num_days_from_monday(),
        }
    }

    /// Convert features to a row for the ML model
    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.hour_of_day as f64, self.day_of_week as f64]
    }

    /// Feature names for debugging/logging
    pub fn feature_names() -> [&'static str; Self::NUM_FEATURES] {
        ["hour_of_day", "day_of_week"]
    }
}

/// Parse a timestamp cell into its wall-clock value.
///
/// Offset-carrying timestamps keep the hour as written rather than being
/// shifted to UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Extracts typed records and model features from normalized datasets
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor
    pub fn new() -> Self {
        Self
    }

    /// Parse every row of the dataset.
    ///
    /// The whole batch is rejected on the first unparseable timestamp or
    /// consumption value; rows are never silently dropped. Row numbers in
    /// errors are 1-based and exclude the header.
    pub fn parse_records(
        &self,
        dataset: &NormalizedDataset,
    ) -> Result<Vec<ConsumptionRecord>, ForecastError> {
        dataset
            .rows()
            .enumerate()
            .map(|(i, row)| {
                let timestamp =
                    parse_timestamp(row.timestamp()).ok_or_else(|| ForecastError::Parse {
                        column: TIMESTAMP_COLUMN.to_string(),
                        row: i + 1,
                        value: row.timestamp().to_string(),
                    })?;

                let consumption_kwh =
                    parse_float(row.consumption()).ok_or_else(|| ForecastError::Parse {
                        column: CONSUMPTION_COLUMN.to_string(),
                        row: i + 1,
                        value: row.consumption().to_string(),
                    })?;

                Ok(ConsumptionRecord {
                    timestamp,
                    consumption_kwh,
                    voltage: row.voltage().and_then(parse_float),
                    current: row.current().and_then(parse_float),
                    power_kw: row.power().and_then(parse_float),
                    power_factor: row.power_factor().and_then(parse_float),
                })
            })
            .collect()
    }

    /// Derive the parallel (features, target) series from parsed records.
    pub fn extract(&self, records: &[ConsumptionRecord]) -> (Vec<FeatureVector>, Vec<f64>) {
        records
            .iter()
            .map(|r| (FeatureVector::from_timestamp(&r.timestamp), r.consumption_kwh))
            .unzip()
    }

    /// Parse and extract in one step.
    pub fn prepare(
        &self,
        dataset: &NormalizedDataset,
    ) -> Result<(Vec<FeatureVector>, Vec<f64>), ForecastError> {
        let records = self.parse_records(dataset)?;
        Ok(self.extract(&records))
    }

    /// Feature rows for hours 0..23, all on the same day of week.
    pub fn day_profile(&self, day_of_week: u32) -> Vec<FeatureVector> {
        (0..24).map(|hour| FeatureVector::new(hour, day_of_week)).collect()
    }
}
