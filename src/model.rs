//! Fitted demand models: linear regression and tree ensembles

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::FeatureRecord;
use crate::traits::DemandModel;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Model expects {expected} columns, record has {found}")]
    WidthMismatch { expected: usize, found: usize },
    #[error("Column {position} should be {expected:?}, record has {found:?}")]
    ColumnMismatch {
        position: usize,
        expected: String,
        found: String,
    },
    #[error("Model has {coefficients} coefficients for {features} feature names")]
    CoefficientCount { coefficients: usize, features: usize },
    #[error("Tree {tree} is malformed: {reason}")]
    MalformedTree { tree: usize, reason: String },
    #[error("Tree ensemble has no trees")]
    EmptyEnsemble,
    #[error("Model produced a non-finite prediction: {0}")]
    NonFinite(f64),
}

/// Check that a record carries exactly the columns a model was fit on.
fn check_columns(feature_names: &[String], record: &FeatureRecord) -> Result<(), ModelError> {
    if feature_names.len() != record.len() {
        return Err(ModelError::WidthMismatch {
            expected: feature_names.len(),
            found: record.len(),
        });
    }

    for (position, (expected, (found, _))) in feature_names.iter().zip(record.iter()).enumerate() {
        if expected != found {
            return Err(ModelError::ColumnMismatch {
                position,
                expected: expected.clone(),
                found: found.to_string(),
            });
        }
    }

    Ok(())
}

fn finite(value: f64) -> Result<f64, ModelError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::NonFinite(value))
    }
}

// ==================== Linear Regression ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.coefficients.len() != self.feature_names.len() {
            return Err(ModelError::CoefficientCount {
                coefficients: self.coefficients.len(),
                features: self.feature_names.len(),
            });
        }
        Ok(())
    }

    pub fn predict(&self, record: &FeatureRecord) -> Result<f64, ModelError> {
        self.validate()?;
        check_columns(&self.feature_names, record)?;

        let dot: f64 = self
            .coefficients
            .iter()
            .zip(record.iter())
            .map(|(coef, (_, value))| coef * value)
            .sum();

        finite(self.intercept + dot)
    }
}

// ==================== Tree Ensemble ====================

/// A regression tree in flat array layout.
///
/// Node `i` is a leaf when `children_left[i] < 0`. Internal nodes send a
/// sample left when `values[feature[i]] <= threshold[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl RegressionTree {
    /// A tree with a single leaf.
    pub fn leaf(value: f64) -> Self {
        Self {
            children_left: vec![-1],
            children_right: vec![-1],
            feature: vec![-2],
            threshold: vec![-2.0],
            value: vec![value],
        }
    }

    pub fn node_count(&self) -> usize {
        self.value.len()
    }

    fn validate(&self, tree: usize, n_features: usize) -> Result<(), ModelError> {
        let malformed = |reason: String| ModelError::MalformedTree { tree, reason };
        let n = self.node_count();

        if n == 0 {
            return Err(malformed("no nodes".to_string()));
        }
        if [
            self.children_left.len(),
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
        ]
        .iter()
        .any(|&len| len != n)
        {
            return Err(malformed("node arrays differ in length".to_string()));
        }

        for node in 0..n {
            let left = self.children_left[node];
            if left < 0 {
                continue;
            }
            let right = self.children_right[node];
            if left as usize >= n || right < 0 || right as usize >= n {
                return Err(malformed(format!("node {} has an out-of-range child", node)));
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(malformed(format!(
                    "node {} splits on unknown feature {}",
                    node, feature
                )));
            }
        }

        Ok(())
    }

    /// Walk the tree for one sample. Assumes `validate` passed.
    fn evaluate(&self, tree: usize, values: &[f64]) -> Result<f64, ModelError> {
        let mut node = 0usize;

        // A well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..self.node_count() {
            let left = self.children_left[node];
            if left < 0 {
                return Ok(self.value[node]);
            }
            let x = values[self.feature[node] as usize];
            node = if x <= self.threshold[node] {
                left as usize
            } else {
                self.children_right[node] as usize
            };
        }

        Err(ModelError::MalformedTree {
            tree,
            reason: "cycle detected".to_string(),
        })
    }
}

/// How per-tree outputs are combined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Aggregation {
    /// Random forest: average of tree outputs
    Mean,
    /// Gradient boosting: `base_score + learning_rate * sum`
    Sum { learning_rate: f64, base_score: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub feature_names: Vec<String>,
    pub trees: Vec<RegressionTree>,
    pub aggregation: Aggregation,
}

impl TreeEnsemble {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::EmptyEnsemble);
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(idx, self.feature_names.len())?;
        }
        Ok(())
    }

    pub fn predict(&self, record: &FeatureRecord) -> Result<f64, ModelError> {
        self.validate()?;
        check_columns(&self.feature_names, record)?;

        let values = record.values();
        let mut total = 0.0;
        for (idx, tree) in self.trees.iter().enumerate() {
            total += tree.evaluate(idx, &values)?;
        }

        let prediction = match self.aggregation {
            Aggregation::Mean => total / self.trees.len() as f64,
            Aggregation::Sum {
                learning_rate,
                base_score,
            } => base_score + learning_rate * total,
        };

        finite(prediction)
    }
}

// ==================== Persisted Model ====================

/// Any model the service can load from an artifact file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedModel {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
}

impl FittedModel {
    pub fn feature_names(&self) -> &[String] {
        match self {
            FittedModel::Linear(m) => &m.feature_names,
            FittedModel::TreeEnsemble(m) => &m.feature_names,
        }
    }

    /// Structural checks run once when the artifact is loaded.
    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            FittedModel::Linear(m) => m.validate(),
            FittedModel::TreeEnsemble(m) => m.validate(),
        }
    }
}

impl DemandModel for FittedModel {
    fn predict(&self, record: &FeatureRecord) -> Result<f64, ModelError> {
        match self {
            FittedModel::Linear(m) => m.predict(record),
            FittedModel::TreeEnsemble(m) => m.predict(record),
        }
    }

    fn describe(&self) -> String {
        match self {
            FittedModel::Linear(m) => format!(
                "LinearModel(features={}, intercept={:.3})",
                m.feature_names.len(),
                m.intercept
            ),
            FittedModel::TreeEnsemble(m) => format!(
                "TreeEnsemble(features={}, trees={}, aggregation={})",
                m.feature_names.len(),
                m.trees.len(),
                match m.aggregation {
                    Aggregation::Mean => "mean",
                    Aggregation::Sum { .. } => "sum",
                }
            ),
        }
    }
}
