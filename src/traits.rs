//! Seams between the request flow and its collaborators.
//!
//! This module provides traits for:
//! - `Clock`: Abstracting time access for deterministic testing
//! - `CategoryEncoder`: A fitted categorical encoder
//! - `DemandModel`: A fitted demand predictor

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::encoder::EncodingError;
use crate::features::FeatureRecord;
use crate::model::ModelError;

// ==================== Clock Trait ====================

/// Trait for abstracting time access.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Get the current time in the local timezone.
    fn now_local(&self) -> DateTime<Local>;

    /// Today's date in the local timezone, used to prefill the form.
    fn today(&self) -> NaiveDate {
        self.now_local().date_naive()
    }
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Mock clock for testing with controllable time.
#[derive(Debug, Clone)]
pub struct MockClock {
    utc_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a new mock clock set to the given UTC time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            utc_time: Arc::new(Mutex::new(time)),
        }
    }

    /// Set the mock clock to a new time.
    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.utc_time.lock().unwrap() = time;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.utc_time.lock().unwrap()
    }

    fn now_local(&self) -> DateTime<Local> {
        self.now_utc().with_timezone(&Local)
    }

    fn today(&self) -> NaiveDate {
        self.now_utc().date_naive()
    }
}

// ==================== Model Artifact Traits ====================

/// A fitted encoder turning categorical fields into indicator columns.
pub trait CategoryEncoder: Send + Sync {
    /// Output column names in fitted order.
    fn feature_names_out(&self) -> Vec<String>;

    /// Encode one row given as `(field, level)` pairs.
    ///
    /// The returned values line up with `feature_names_out`.
    fn transform(&self, frame: &[(&str, &str)]) -> Result<Vec<f64>, EncodingError>;
}

/// A fitted model predicting demand from an assembled feature record.
pub trait DemandModel: Send + Sync {
    fn predict(&self, record: &FeatureRecord) -> Result<f64, ModelError>;

    /// One-line summary for logs.
    fn describe(&self) -> String;
}

/// Mock model for testing that returns a fixed value and records its inputs.
#[derive(Debug, Clone, Default)]
pub struct MockDemandModel {
    value: f64,
    records: Arc<Mutex<Vec<FeatureRecord>>>,
}

impl MockDemandModel {
    /// Create a mock that always predicts `value`.
    pub fn returning(value: f64) -> Self {
        Self {
            value,
            records: Arc::default(),
        }
    }

    /// Every record passed to `predict`, oldest first.
    pub fn received(&self) -> Vec<FeatureRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Get the count of predictions served.
    pub fn call_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl DemandModel for MockDemandModel {
    fn predict(&self, record: &FeatureRecord) -> Result<f64, ModelError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(self.value)
    }

    fn describe(&self) -> String {
        format!("MockDemandModel(value={})", self.value)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_system_clock_returns_current_time() {
        let clock = SystemClock;
        let before = Utc::now();
        let clock_time = clock.now_utc();
        let after = Utc::now();

        assert!(clock_time >= before);
        assert!(clock_time <= after);
    }

    #[test]
    fn test_mock_clock_today() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 6, 15, 14, 30, 0).unwrap();
        let clock = MockClock::new(fixed_time);

        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());

        clock.set_time(Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
    }

    #[test]
    fn test_mock_model_records_inputs() {
        let model = MockDemandModel::returning(321.9);
        let record = FeatureRecord::from_columns(vec![("Hour".to_string(), 7.0)]);

        assert_eq!(model.call_count(), 0);
        assert_eq!(model.predict(&record).unwrap(), 321.9);
        assert_eq!(model.call_count(), 1);
        assert_eq!(model.received()[0], record);
        assert!(model.describe().contains("321.9"));
    }
}
