//! Raw form inputs for a single prediction request.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors raised when a submitted observation is malformed or out of range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    #[error("Hour must be between 0 and 23, got {0}")]
    HourOutOfRange(u32),
    #[error("Humidity must be between 0 and 100, got {0}")]
    HumidityOutOfRange(u32),
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
    #[error("Unknown {field} option: {value:?}")]
    UnknownOption { field: &'static str, value: String },
    #[error("{field} must be a number, got {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("Date must be formatted yyyy-mm-dd, got {0:?}")]
    InvalidDate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Season {
    #[default]
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Autumn];

    pub fn label(&self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Holiday {
    #[default]
    #[serde(rename = "No Holiday")]
    NoHoliday,
    Holiday,
}

impl Holiday {
    pub const ALL: [Holiday; 2] = [Holiday::NoHoliday, Holiday::Holiday];

    pub fn label(&self) -> &'static str {
        match self {
            Holiday::NoHoliday => "No Holiday",
            Holiday::Holiday => "Holiday",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FunctioningDay {
    #[default]
    Yes,
    No,
}

impl FunctioningDay {
    pub const ALL: [FunctioningDay; 2] = [FunctioningDay::Yes, FunctioningDay::No];

    pub fn label(&self) -> &'static str {
        match self {
            FunctioningDay::Yes => "Yes",
            FunctioningDay::No => "No",
        }
    }
}

/// Implements `Display`, case-insensitive `FromStr` and a `Deserialize` that
/// goes through `FromStr`, so every front end accepts the same spellings.
macro_rules! label_parsing {
    ($ty:ident, $field:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $ty {
            type Err = ObservationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $ty::ALL
                    .into_iter()
                    .find(|option| option.label().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| ObservationError::UnknownOption {
                        field: $field,
                        value: s.to_string(),
                    })
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

label_parsing!(Season, "season");
label_parsing!(Holiday, "holiday");
label_parsing!(FunctioningDay, "functioning day");

/// One submission of the prediction form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub date: NaiveDate,
    pub hour: u32,
    /// °C
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity_pct: u32,
    /// m/s
    pub wind_speed: f64,
    /// 10 m units
    pub visibility: f64,
    /// °C
    pub dew_point: f64,
    /// MJ/m2
    pub solar_radiation: f64,
    /// mm
    pub rainfall: f64,
    /// cm
    pub snowfall: f64,
    pub season: Season,
    pub holiday: Holiday,
    pub functioning_day: FunctioningDay,
}

impl RawObservation {
    /// Observation with every field at its form default for the given date.
    pub fn with_defaults(date: NaiveDate) -> Self {
        Self {
            date,
            hour: 0,
            temperature: 0.0,
            humidity_pct: 0,
            wind_speed: 0.0,
            visibility: 0.0,
            dew_point: 0.0,
            solar_radiation: 0.0,
            rainfall: 0.0,
            snowfall: 0.0,
            season: Season::default(),
            holiday: Holiday::default(),
            functioning_day: FunctioningDay::default(),
        }
    }

    /// Check the ranges the input widgets enforce.
    pub fn validate(&self) -> Result<(), ObservationError> {
        if self.hour > 23 {
            return Err(ObservationError::HourOutOfRange(self.hour));
        }
        if self.humidity_pct > 100 {
            return Err(ObservationError::HumidityOutOfRange(self.humidity_pct));
        }

        let numeric = [
            ("temperature", self.temperature),
            ("wind speed", self.wind_speed),
            ("visibility", self.visibility),
            ("dew point", self.dew_point),
            ("solar radiation", self.solar_radiation),
            ("rainfall", self.rainfall),
            ("snowfall", self.snowfall),
        ];
        if let Some(&(field, _)) = numeric.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ObservationError::NonFinite { field });
        }

        Ok(())
    }
}
