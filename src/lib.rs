//! Bike Demand Library
//!
//! This module exposes the prediction flow (humidity derivation, feature
//! assembly, encoder and model artifacts) for the binary and for testing.

pub mod config;
pub mod encoder;
pub mod features;
pub mod humidity;
pub mod model;
pub mod observation;
pub mod persistence;
pub mod predictor;
pub mod traits;

// Web-only modules
#[cfg(feature = "server")]
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use encoder::{DropPolicy, EncodedFeature, EncodingError, OneHotEncoder, UnknownPolicy};
pub use features::{CATEGORICAL_FIELDS, FeatureRecord, NUMERIC_COLUMNS, assemble};
pub use model::{Aggregation, FittedModel, LinearModel, ModelError, RegressionTree, TreeEnsemble};
pub use observation::{FunctioningDay, Holiday, ObservationError, RawObservation, Season};
pub use persistence::{ArtifactFile, Artifacts, PersistenceError};
pub use predictor::{AVAILABLE_BIKE_COUNT, DemandPredictor, PredictionError, PredictionResult};
pub use traits::{CategoryEncoder, Clock, DemandModel, MockClock, MockDemandModel, SystemClock};
