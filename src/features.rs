//! Feature assembly for demand predictions
//!
//! Converts a raw form submission into the ordered feature record the demand
//! model was fit against.

use chrono::{Datelike, NaiveTime, Timelike};

use crate::encoder::EncodingError;
use crate::observation::RawObservation;
use crate::traits::CategoryEncoder;

/// Numeric columns, in the order the model expects them.
pub const NUMERIC_COLUMNS: [&str; 15] = [
    "Hour",
    "Temperature",
    "Humidity",
    "Wind_speed",
    "Visibility",
    "Solar_Radiation",
    "Rainfall",
    "Snowfall",
    "Absolute_Humidity",
    "Date_year",
    "Date_month",
    "Date_day",
    "Date_hour",
    "Date_minute",
    "Date_second",
];

/// Categorical fields handed to the encoder, in frame order.
pub const CATEGORICAL_FIELDS: [&str; 3] = ["Seasons", "Holiday", "Functioning_Day"];

/// Ordered mapping of column name to value for a single prediction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureRecord {
    columns: Vec<(String, f64)>,
}

impl FeatureRecord {
    pub fn from_columns(columns: Vec<(String, f64)>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in order.
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Column values in order.
    pub fn values(&self) -> Vec<f64> {
        self.columns.iter().map(|(_, value)| *value).collect()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

/// Build the feature record for one observation.
///
/// `Date_hour`, `Date_minute` and `Date_second` come from the date at
/// midnight, not from `raw.hour`; the model was fit on that layout.
pub fn assemble(
    raw: &RawObservation,
    derived_humidity: f64,
    encoder: &dyn CategoryEncoder,
) -> Result<FeatureRecord, EncodingError> {
    let timestamp = raw.date.and_time(NaiveTime::MIN);

    let numeric = [
        raw.hour as f64,
        raw.temperature,
        raw.humidity_pct as f64,
        raw.wind_speed,
        raw.visibility,
        raw.solar_radiation,
        raw.rainfall,
        raw.snowfall,
        derived_humidity,
        timestamp.year() as f64,
        timestamp.month() as f64,
        timestamp.day() as f64,
        timestamp.hour() as f64,
        timestamp.minute() as f64,
        timestamp.second() as f64,
    ];

    let frame = [
        (CATEGORICAL_FIELDS[0], raw.season.label()),
        (CATEGORICAL_FIELDS[1], raw.holiday.label()),
        (CATEGORICAL_FIELDS[2], raw.functioning_day.label()),
    ];
    let encoded = encoder.transform(&frame)?;
    let encoded_names = encoder.feature_names_out();

    if encoded.len() != encoded_names.len() {
        return Err(EncodingError::WidthMismatch {
            names: encoded_names.len(),
            values: encoded.len(),
        });
    }

    let mut columns = Vec::with_capacity(NUMERIC_COLUMNS.len() + encoded.len());
    columns.extend(
        NUMERIC_COLUMNS
            .iter()
            .zip(numeric)
            .map(|(name, value)| (name.to_string(), value)),
    );
    columns.extend(encoded_names.into_iter().zip(encoded));

    Ok(FeatureRecord::from_columns(columns))
}
