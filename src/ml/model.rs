//! ML model wrapper for the random forest regressor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use super::features::FeatureVector;
use crate::error::ForecastError;

/// Fitted forest over dense `f64` features and targets.
pub type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// A trained ML model for consumption prediction
#[derive(Serialize, Deserialize)]
pub struct TrainedModel {
    /// The underlying forest
    forest: Forest,
    /// Training mean squared error
    pub training_mse: f64,
    /// Number of samples used for training
    pub training_samples: usize,
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Seed the forest was grown with
    pub seed: u64,
    /// Timestamp when model was created
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedModel")
            .field("training_mse", &self.training_mse)
            .field("training_samples", &self.training_samples)
            .field("n_trees", &self.n_trees)
            .field("seed", &self.seed)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl TrainedModel {
    /// Predict consumption for each feature vector, in order
    pub fn predict_batch(&self, features: &[FeatureVector]) -> Result<Vec<f64>, ForecastError> {
        if features.is_empty() {
            return Ok(Vec::new());
        }

        let x = to_matrix(features);
        self.forest
            .predict(&x)
            .map_err(|e| ForecastError::Training(format!("prediction failed: {}", e)))
    }

    /// Get model information as a string
    pub fn info(&self) -> String {
        format!(
            "TrainedModel(trees={}, samples={}, train_mse={:.4}, created={})",
            self.n_trees,
            self.training_samples,
            self.training_mse,
            self.created_at.format("%Y-%m-%d %H:%M")
        )
    }
}

/// Builder for training a model
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    n_trees: usize,
    seed: u64,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
        }
    }
}

impl ModelBuilder {
    /// Create a new model builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of trees
    pub fn n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    /// Set the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Train a model on the provided data
    pub fn train(
        &self,
        features: &[FeatureVector],
        targets: &[f64],
    ) -> Result<TrainedModel, ForecastError> {
        if features.is_empty() || targets.is_empty() {
            return Err(ForecastError::Training(
                "no training samples".to_string(),
            ));
        }

        if features.len() != targets.len() {
            return Err(ForecastError::Training(format!(
                "feature and target lengths mismatch: {} vs {}",
                features.len(),
                targets.len()
            )));
        }

        let x = to_matrix(features);
        let y = targets.to_vec();

        // Every split considers both features.
        let params = RandomForestRegressorParameters {
            n_trees: self.n_trees as _,
            m: Some(FeatureVector::NUM_FEATURES),
            seed: self.seed,
            ..Default::default()
        };

        let forest = Forest::fit(&x, &y, params)
            .map_err(|e| ForecastError::Training(format!("model fitting error: {}", e)))?;

        let predictions = forest
            .predict(&x)
            .map_err(|e| ForecastError::Training(format!("prediction failed: {}", e)))?;
        let mse = calculate_mse(&predictions, targets);

        Ok(TrainedModel {
            forest,
            training_mse: mse,
            training_samples: features.len(),
            n_trees: self.n_trees,
            seed: self.seed,
            created_at: Utc::now(),
        })
    }
}

fn to_matrix(features: &[FeatureVector]) -> DenseMatrix<f64> {
    let rows: Vec<Vec<f64>> = features.iter().map(FeatureVector::to_vec).collect();
    DenseMatrix::from_2d_vec(&rows)
}

/// Calculate mean squared error
fn calculate_mse(predictions: &[f64], targets: &[f64]) -> f64 {
    if predictions.is_empty() || predictions.len() != targets.len() {
        return f64::MAX;
    }

    let sum_sq_error: f64 = predictions
        .iter()
        .zip(targets.iter())
        .map(|(p, t)| (p - t).powi(2))
        .sum();

    sum_sq_error / predictions.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A week of hourly readings where consumption depends only on the hour.
    fn weekly_samples() -> (Vec<FeatureVector>, Vec<f64>) {
        (0..7u32)
            .flat_map(|day| (0..24u32).map(move |hour| FeatureVector::new(hour, day)))
            .map(|fv| {
                let target = if fv.hour_of_day == 19 { 5.0 } else { 1.0 };
                (fv, target)
            })
            .unzip()
    }

    #[test]
    fn test_model_builder_default() {
        let builder = ModelBuilder::default();
        assert_eq!(builder.n_trees, 100);
        assert_eq!(builder.seed, 42);
    }

    #[test]
    fn test_model_builder_customization() {
        let builder = ModelBuilder::new().n_trees(10).seed(7);
        assert_eq!(builder.n_trees, 10);
        assert_eq!(builder.seed, 7);
    }

    #[test]
    fn test_train_empty_data() {
        let result = ModelBuilder::new().train(&[], &[]);
        assert!(matches!(result, Err(ForecastError::Training(_))));
    }

    #[test]
    fn test_train_mismatched_lengths() {
        let (features, _) = weekly_samples();
        let result = ModelBuilder::new().train(&features, &[1.0; 5]);
        assert!(matches!(result, Err(ForecastError::Training(_))));
    }

    #[test]
    fn test_train_success() {
        let (features, targets) = weekly_samples();
        let model = ModelBuilder::new().train(&features, &targets).unwrap();

        assert_eq!(model.training_samples, 168);
        assert_eq!(model.n_trees, 100);
        assert!(model.training_mse >= 0.0);
    }

    #[test]
    fn test_train_single_sample() {
        let model = ModelBuilder::new()
            .train(&[FeatureVector::new(10, 2)], &[3.5])
            .unwrap();

        let predictions = model.predict_batch(&[FeatureVector::new(10, 2)]).unwrap();
        assert!((predictions[0] - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_model_learns_peak_hour() {
        let (features, targets) = weekly_samples();
        let model = ModelBuilder::new().train(&features, &targets).unwrap();

        let day: Vec<FeatureVector> = (0..24).map(|h| FeatureVector::new(h, 2)).collect();
        let predictions = model.predict_batch(&day).unwrap();

        assert_eq!(predictions.len(), 24);
        let peak = predictions
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(h, _)| h)
            .unwrap();
        assert_eq!(peak, 19);
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (features, targets) = weekly_samples();
        let a = ModelBuilder::new().train(&features, &targets).unwrap();
        let b = ModelBuilder::new().train(&features, &targets).unwrap();

        let samples = [FeatureVector::new(19, 0), FeatureVector::new(3, 6)];
        assert_eq!(a.predict_batch(&samples).unwrap(), b.predict_batch(&samples).unwrap());
    }

    #[test]
    fn test_predict_batch_empty() {
        let model = ModelBuilder::new()
            .train(&[FeatureVector::new(0, 0)], &[1.0])
            .unwrap();
        assert!(model.predict_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_calculate_mse() {
        let predictions = vec![10.0, 20.0, 30.0];
        let targets = vec![12.0, 18.0, 32.0];

        let mse = calculate_mse(&predictions, &targets);

        // MSE = ((10-12)^2 + (20-18)^2 + (30-32)^2) / 3 = 4
        assert!((mse - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_model_info() {
        let model = ModelBuilder::new()
            .n_trees(5)
            .train(&[FeatureVector::new(1, 1), FeatureVector::new(2, 1)], &[1.0, 2.0])
            .unwrap();

        let info = model.info();
        assert!(info.contains("trees=5"));
        assert!(info.contains("samples=2"));
    }
}
