//! Descriptive statistics and usage advisories for an uploaded dataset.

use chrono::Timelike;
use serde::Serialize;

use crate::error::ForecastError;
use crate::ml::ConsumptionRecord;

/// Static conservation tip appended to every advisory.
pub const STANDBY_TIP: &str =
    "Recomendación: Desconecta dispositivos en 'Stand-by' durante la noche.";

/// Summary statistics the advisories are rendered from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionStats {
    /// Arithmetic mean of consumption over all rows
    pub mean_kwh: f64,
    /// Hour of day with the highest mean consumption
    pub peak_hour: u32,
    /// Mean consumption at `peak_hour`
    pub peak_mean_kwh: f64,
    pub sample_count: usize,
}

/// Compute mean consumption and peak hour.
///
/// Ties for the peak go to the lowest hour.
pub fn calculate_stats(records: &[ConsumptionRecord]) -> Result<ConsumptionStats, ForecastError> {
    if records.is_empty() {
        return Err(ForecastError::EmptyDataset);
    }

    let n = records.len();
    let mean_kwh = records.iter().map(|r| r.consumption_kwh).sum::<f64>() / n as f64;

    let mut sums = [0.0f64; 24];
    let mut counts = [0usize; 24];
    for record in records {
        let hour = record.timestamp.hour() as usize;
        sums[hour] += record.consumption_kwh;
        counts[hour] += 1;
    }

    let mut peak: Option<(u32, f64)> = None;
    for hour in 0..24 {
        if counts[hour] == 0 {
            continue;
        }
        let hour_mean = sums[hour] / counts[hour] as f64;
        if peak.is_none_or(|(_, best)| hour_mean > best) {
            peak = Some((hour as u32, hour_mean));
        }
    }
    let (peak_hour, peak_mean_kwh) = peak.ok_or(ForecastError::EmptyDataset)?;

    Ok(ConsumptionStats {
        mean_kwh,
        peak_hour,
        peak_mean_kwh,
        sample_count: n,
    })
}

/// Render the three advisory strings for a set of statistics.
pub fn render_advisories(stats: &ConsumptionStats) -> Vec<String> {
    vec![
        format!(
            "Tu pico de consumo es a las {}:00. Evita usar la secadora a esa hora.",
            stats.peak_hour
        ),
        format!(
            "Tu consumo promedio es {:.2} kWh. ¡Buen trabajo!",
            stats.mean_kwh
        ),
        STANDBY_TIP.to_string(),
    ]
}

/// Compute statistics and render advisories in one step.
pub fn generate_advisories(records: &[ConsumptionRecord]) -> Result<Vec<String>, ForecastError> {
    let stats = calculate_stats(records)?;
    tracing::debug!(
        "Advisory stats: mean={:.3} kWh, peak hour {} ({:.3} kWh)",
        stats.mean_kwh,
        stats.peak_hour,
        stats.peak_mean_kwh
    );
    Ok(render_advisories(&stats))
}
