//! Machine Learning module for consumption forecasting
//!
//! This module fits a random forest over (hour-of-day, day-of-week) features
//! for each uploaded dataset and forecasts the consumption of the 24 hours
//! of the current day.

pub mod features;
pub mod model;
pub mod persistence;

use std::path::{Path, PathBuf};

use chrono::Datelike;

use crate::error::ForecastError;
use crate::ingest::{Dataset, normalize};
use crate::traits::Clock;

pub use features::{ConsumptionRecord, FeatureExtractor, FeatureVector};
pub use model::{ModelBuilder, TrainedModel};
pub use persistence::{PersistedModel, PersistenceError};

/// Number of hourly points in a forecast.
pub const FORECAST_HOURS: usize = 24;

/// Lifecycle of a [`ConsumptionForecaster`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecasterState {
    /// No model in memory; an artifact on disk does not count until loaded
    Unfitted,
    /// A model was fitted or loaded by this instance
    Fitted,
}

/// Owns the fit/predict lifecycle of the consumption model
pub struct ConsumptionForecaster {
    /// Trained ML model (if available)
    model: Option<TrainedModel>,
    /// Feature extractor for building inputs
    feature_extractor: FeatureExtractor,
    /// Forest hyper-parameters
    builder: ModelBuilder,
    /// Canonical artifact location
    model_path: PathBuf,
}

impl ConsumptionForecaster {
    /// Create an unfitted forecaster persisting to `model_path`
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model: None,
            feature_extractor: FeatureExtractor::new(),
            builder: ModelBuilder::new(),
            model_path: model_path.into(),
        }
    }

    /// Replace the default forest hyper-parameters
    pub fn with_builder(mut self, builder: ModelBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn state(&self) -> ForecasterState {
        if self.model.is_some() {
            ForecasterState::Fitted
        } else {
            ForecasterState::Unfitted
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.state() == ForecasterState::Fitted
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// The model currently held in memory
    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    /// Normalize, extract features, fit and persist.
    ///
    /// On any failure the previous in-memory state is kept.
    pub fn fit(&mut self, dataset: &Dataset) -> Result<(), ForecastError> {
        let normalized = normalize(dataset)?;
        let records = self.feature_extractor.parse_records(&normalized)?;
        self.fit_records(&records)
    }

    /// Fit and persist from already parsed records.
    pub fn fit_records(&mut self, records: &[ConsumptionRecord]) -> Result<(), ForecastError> {
        let (features, targets) = self.feature_extractor.extract(records);
        if targets.is_empty() {
            return Err(ForecastError::Training(
                "dataset has no consumption values to train on".to_string(),
            ));
        }

        let model = self.builder.train(&features, &targets)?;
        tracing::info!(
            "Trained {} on features {:?}",
            model.info(),
            FeatureVector::feature_names()
        );

        let persisted = PersistedModel::new(model);
        persisted
            .save(&self.model_path)
            .map_err(|e| ForecastError::Persistence(e.to_string()))?;
        tracing::debug!("Model saved to {}", self.model_path.display());

        self.model = Some(persisted.model);
        Ok(())
    }

    /// Load the persisted artifact, transitioning to FITTED.
    pub fn load(&mut self) -> Result<(), ForecastError> {
        let persisted =
            PersistedModel::load(&self.model_path).map_err(|e| ForecastError::CorruptModel {
                path: self.model_path.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!("Loaded {}", persisted.summary());
        self.model = Some(persisted.model);
        Ok(())
    }

    /// Predict consumption for hours 0..23 of the current day of week.
    ///
    /// All 24 rows share the weekday observed at call time; the horizon does
    /// not roll over midnight. Index `i` is the prediction for hour `i`.
    pub fn forecast_next_24h(&self, clock: &dyn Clock) -> Result<Vec<f64>, ForecastError> {
        let model = self.model.as_ref().ok_or(ForecastError::NotFitted)?;

        let day_of_week = clock.now_local().weekday().num_days_from_monday();
        let rows = self.feature_extractor.day_profile(day_of_week);

        let predictions = model.predict_batch(&rows)?;
        debug_assert_eq!(predictions.len(), FORECAST_HOURS);
        Ok(predictions)
    }
}
