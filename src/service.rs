//! Upload analysis: read, fit, forecast and advise in one pass.

use serde::Serialize;

use crate::advisory::generate_advisories;
use crate::error::ForecastError;
use crate::ingest::{normalize, read_dataset};
use crate::ml::{ConsumptionForecaster, FeatureExtractor};
use crate::traits::Clock;

/// Status reported after a successful upload.
pub const TRAINING_COMPLETED: &str = "Entrenamiento completado";

/// Result of analyzing one uploaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReport {
    pub filename: String,
    /// Predicted consumption for hours 0..23 of today
    pub prediccion_24h: Vec<f64>,
    pub recomendaciones: Vec<String>,
    pub status: String,
}

/// Fit `forecaster` on an uploaded file and report forecast and advisories.
///
/// Any failure aborts the whole report. A failed fit leaves the forecaster
/// in the state it had before the call.
pub fn analyze_upload(
    filename: &str,
    bytes: &[u8],
    forecaster: &mut ConsumptionForecaster,
    clock: &dyn Clock,
) -> Result<UploadReport, ForecastError> {
    let dataset = read_dataset(filename, bytes)?;
    tracing::debug!("Read {} rows from {}", dataset.len(), filename);

    let normalized = normalize(&dataset)?;
    let records = FeatureExtractor::new().parse_records(&normalized)?;

    forecaster.fit_records(&records)?;
    let prediccion_24h = forecaster.forecast_next_24h(clock)?;
    let recomendaciones = generate_advisories(&records)?;

    tracing::info!(
        "Analyzed {}: {} rows, forecast for {} hours",
        filename,
        records.len(),
        prediccion_24h.len()
    );

    Ok(UploadReport {
        filename: filename.to_string(),
        prediccion_24h,
        recomendaciones,
        status: TRAINING_COMPLETED.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{FORECAST_HOURS, ModelBuilder};
    use crate::traits::MockClock;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn clock() -> MockClock {
        MockClock::new(Utc.with_ymd_and_hms(2024, 6, 19, 12, 0, 0).unwrap())
    }

    fn forecaster(dir: &tempfile::TempDir) -> ConsumptionForecaster {
        ConsumptionForecaster::new(dir.path().join("modelo.bin"))
            .with_builder(ModelBuilder::new().n_trees(10))
    }

    #[test]
    fn test_csv_upload_produces_full_report() {
        let dir = tempdir().unwrap();
        let mut forecaster = forecaster(&dir);
        let csv = "Timestamp,Consumo kWh,Voltaje\n\
                   2024-06-17 08:00,1.0,229\n\
                   2024-06-17 19:00,4.5,231\n\
                   2024-06-18 19:00,5.0,230\n";

        let report = analyze_upload("lecturas.csv", csv.as_bytes(), &mut forecaster, &clock()).unwrap();

        assert_eq!(report.filename, "lecturas.csv");
        assert_eq!(report.prediccion_24h.len(), FORECAST_HOURS);
        assert_eq!(report.recomendaciones.len(), 3);
        assert!(report.recomendaciones[0].contains("19:00"));
        assert_eq!(report.status, TRAINING_COMPLETED);
        assert!(forecaster.is_fitted());
    }

    #[test]
    fn test_unsupported_format_rejected() {
        let dir = tempdir().unwrap();
        let mut forecaster = forecaster(&dir);

        let result = analyze_upload("notas.txt", b"hola", &mut forecaster, &clock());

        assert!(matches!(result, Err(ForecastError::UnsupportedFormat(_))));
        assert!(!forecaster.is_fitted());
    }

    #[test]
    fn test_missing_column_aborts_report() {
        let dir = tempdir().unwrap();
        let mut forecaster = forecaster(&dir);
        let csv = "Fecha,Consumo kWh\n2024-06-17 08:00,1.0\n";

        match analyze_upload("x.csv", csv.as_bytes(), &mut forecaster, &clock()) {
            Err(ForecastError::Schema { missing }) => assert_eq!(missing, vec!["timestamp"]),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_header_only_upload_fails() {
        let dir = tempdir().unwrap();
        let mut forecaster = forecaster(&dir);

        let result = analyze_upload("x.csv", b"timestamp,consumo kwh\n", &mut forecaster, &clock());

        assert!(result.is_err());
        assert!(!forecaster.is_fitted());
    }
}
