//! Fitted one-hot encoder for the categorical form fields.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::traits::CategoryEncoder;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodingError {
    #[error("Category {level:?} was not seen for field {field} during fitting")]
    UnknownCategory { field: String, level: String },
    #[error("Field {0} is missing from the categorical frame")]
    MissingField(String),
    #[error("Encoder produced {values} values for {names} column names")]
    WidthMismatch { names: usize, values: usize },
}

/// Which fitted level, if any, is dropped from the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    #[default]
    None,
    First,
    IfBinary,
}

/// What to do with a level the encoder was not fit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPolicy {
    #[default]
    Error,
    /// Emit an all-zero group for the field
    Ignore,
}

/// One input field and the levels it was fit on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedFeature {
    pub name: String,
    pub categories: Vec<String>,
}

impl EncodedFeature {
    pub fn new(name: &str, categories: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub features: Vec<EncodedFeature>,
    #[serde(default)]
    pub drop: DropPolicy,
    #[serde(default)]
    pub handle_unknown: UnknownPolicy,
}

impl OneHotEncoder {
    pub fn new(features: Vec<EncodedFeature>) -> Self {
        Self {
            features,
            drop: DropPolicy::None,
            handle_unknown: UnknownPolicy::Error,
        }
    }

    pub fn with_drop(mut self, drop: DropPolicy) -> Self {
        self.drop = drop;
        self
    }

    pub fn with_handle_unknown(mut self, policy: UnknownPolicy) -> Self {
        self.handle_unknown = policy;
        self
    }

    /// Index of the dropped level for a feature, if any.
    fn dropped_index(&self, feature: &EncodedFeature) -> Option<usize> {
        match self.drop {
            DropPolicy::None => None,
            DropPolicy::First => Some(0),
            DropPolicy::IfBinary if feature.categories.len() == 2 => Some(0),
            DropPolicy::IfBinary => None,
        }
    }

    /// Levels of a feature that produce a column.
    fn kept_levels<'a>(&self, feature: &'a EncodedFeature) -> impl Iterator<Item = (usize, &'a str)> {
        let dropped = self.dropped_index(feature);
        feature
            .categories
            .iter()
            .enumerate()
            .filter(move |(idx, _)| Some(*idx) != dropped)
            .map(|(idx, level)| (idx, level.as_str()))
    }

    /// Number of output columns.
    pub fn width(&self) -> usize {
        self.features
            .iter()
            .map(|feature| self.kept_levels(feature).count())
            .sum()
    }
}

impl CategoryEncoder for OneHotEncoder {
    fn feature_names_out(&self) -> Vec<String> {
        self.features
            .iter()
            .flat_map(|feature| {
                self.kept_levels(feature)
                    .map(move |(_, level)| format!("{}_{}", feature.name, level))
            })
            .collect()
    }

    fn transform(&self, frame: &[(&str, &str)]) -> Result<Vec<f64>, EncodingError> {
        let mut encoded = Vec::with_capacity(self.width());

        for feature in &self.features {
            let (_, level) = frame
                .iter()
                .find(|(field, _)| *field == feature.name)
                .ok_or_else(|| EncodingError::MissingField(feature.name.clone()))?;

            let position = feature.categories.iter().position(|c| c == level);
            if position.is_none() && self.handle_unknown == UnknownPolicy::Error {
                return Err(EncodingError::UnknownCategory {
                    field: feature.name.clone(),
                    level: level.to_string(),
                });
            }

            encoded.extend(
                self.kept_levels(feature)
                    .map(|(idx, _)| if Some(idx) == position { 1.0 } else { 0.0 }),
            );
        }

        Ok(encoded)
    }
}
