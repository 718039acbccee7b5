//! Request flow for a single demand prediction.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::encoder::EncodingError;
use crate::features::{self, FeatureRecord};
use crate::humidity;
use crate::model::ModelError;
use crate::observation::{ObservationError, RawObservation};
use crate::persistence::Artifacts;
use crate::traits::{CategoryEncoder, DemandModel};

/// Placeholder stock figure shown under every prediction. Not computed.
pub const AVAILABLE_BIKE_COUNT: u32 = 50;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ObservationError),
    #[error("Encoding failed: {0}")]
    Encoding(#[from] EncodingError),
    #[error("Prediction failed: {0}")]
    Model(#[from] ModelError),
}

/// Model output for one submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    pub value: f64,
}

impl PredictionResult {
    /// The prediction truncated toward zero.
    pub fn demand(&self) -> i64 {
        self.value.trunc() as i64
    }

    /// Output lines shown to the user, in display order.
    pub fn display_lines(&self) -> [String; 2] {
        [
            format!("Predicted Bike Demand: {}", self.demand()),
            format!("Available Bike Count : {}", AVAILABLE_BIKE_COUNT),
        ]
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [demand, available] = self.display_lines();
        write!(f, "{}\n{}", demand, available)
    }
}

/// Turns raw observations into predictions using injected artifacts.
#[derive(Clone)]
pub struct DemandPredictor {
    encoder: Arc<dyn CategoryEncoder>,
    model: Arc<dyn DemandModel>,
}

impl DemandPredictor {
    pub fn new(encoder: Arc<dyn CategoryEncoder>, model: Arc<dyn DemandModel>) -> Self {
        Self { encoder, model }
    }

    pub fn from_artifacts(artifacts: Artifacts) -> Self {
        Self::new(Arc::new(artifacts.encoder), Arc::new(artifacts.model))
    }

    pub fn model_summary(&self) -> String {
        self.model.describe()
    }

    /// Derive humidity and assemble the feature record without predicting.
    pub fn features(&self, raw: &RawObservation) -> Result<FeatureRecord, PredictionError> {
        raw.validate()?;

        let absolute_humidity = humidity::estimate(raw.temperature, raw.dew_point);
        let record = features::assemble(raw, absolute_humidity, self.encoder.as_ref())?;

        tracing::debug!(columns = ?record.names(), "Assembled feature record");
        Ok(record)
    }

    pub fn predict(&self, raw: &RawObservation) -> Result<PredictionResult, PredictionError> {
        let record = self.features(raw)?;
        let value = self.model.predict(&record)?;

        tracing::info!(date = %raw.date, hour = raw.hour, prediction = value, "Predicted demand");
        Ok(PredictionResult { value })
    }
}

impl fmt::Debug for DemandPredictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemandPredictor")
            .field("encoder_columns", &self.encoder.feature_names_out().len())
            .field("model", &self.model.describe())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::encoder::{EncodedFeature, OneHotEncoder};
    use crate::traits::MockDemandModel;

    fn predictor(model: MockDemandModel) -> DemandPredictor {
        let encoder = OneHotEncoder::new(vec![
            EncodedFeature::new("Seasons", &["Autumn", "Spring", "Summer", "Winter"]),
            EncodedFeature::new("Holiday", &["Holiday", "No Holiday"]),
            EncodedFeature::new("Functioning_Day", &["No", "Yes"]),
        ]);
        DemandPredictor::new(Arc::new(encoder), Arc::new(model))
    }

    fn observation() -> RawObservation {
        let mut raw = RawObservation::with_defaults(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        raw.temperature = 25.0;
        raw.dew_point = 10.0;
        raw
    }

    #[test]
    fn test_demand_truncates_toward_zero() {
        assert_eq!(PredictionResult { value: 812.97 }.demand(), 812);
        assert_eq!(PredictionResult { value: -3.7 }.demand(), -3);
        assert_eq!(PredictionResult { value: 0.4 }.demand(), 0);
    }

    #[test]
    fn test_display_lines() {
        let result = PredictionResult { value: 1204.6 };
        assert_eq!(
            result.display_lines(),
            [
                "Predicted Bike Demand: 1204".to_string(),
                "Available Bike Count : 50".to_string()
            ]
        );
        assert_eq!(
            result.to_string(),
            "Predicted Bike Demand: 1204\nAvailable Bike Count : 50"
        );
    }

    #[test]
    fn test_predict_feeds_derived_humidity_to_model() {
        let model = MockDemandModel::returning(77.0);
        let predictor = predictor(model.clone());

        let result = predictor.predict(&observation()).unwrap();
        assert_eq!(result.demand(), 77);

        let received = model.received();
        assert_eq!(received.len(), 1);
        let humidity = received[0].get("Absolute_Humidity").unwrap();
        assert!((humidity - 0.881813746136055).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_input_never_reaches_model() {
        let model = MockDemandModel::returning(1.0);
        let predictor = predictor(model.clone());

        let mut raw = observation();
        raw.hour = 30;

        let err = predictor.predict(&raw).unwrap_err();
        assert_eq!(
            err,
            PredictionError::Validation(ObservationError::HourOutOfRange(30))
        );
        assert_eq!(model.call_count(), 0);
    }

    #[test]
    fn test_debug_shows_summary() {
        let predictor = predictor(MockDemandModel::returning(5.0));
        let debug = format!("{:?}", predictor);
        assert!(debug.contains("encoder_columns: 8"));
        assert!(debug.contains("MockDemandModel"));
    }
}
