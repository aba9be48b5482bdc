//! Serialized classifier artifact.
//!
//! The artifact is a JSON document produced offline by the training job:
//!
//! ```json
//! {
//!   "feature_names": ["Pclass", "Sex", "Age"],
//!   "encodings": { "Sex": { "male": 0.0, "female": 1.0 } },
//!   "fill_values": [3.0, 0.0, 28.0],
//!   "model": {
//!     "type": "tree_ensemble",
//!     "trees": [ { "nodes": [
//!       { "feature": 1, "threshold": 0.5, "left": 1, "right": 2 },
//!       { "value": 0 },
//!       { "value": 1 }
//!     ] } ]
//!   }
//! }
//! ```
//!
//! `model.type` is either `tree_ensemble` (majority vote over decision
//! trees) or `logistic` (`weights` + `bias`, class 1 when the decision
//! value is non-negative).
//!
//! Missing cells arrive as NaN. They are replaced by `fill_values` when the
//! artifact provides them; otherwise a NaN goes to the right child of a
//! split and contributes nothing to a logistic decision value.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;

use super::dataset::Table;
use super::CheckError;

#[derive(Debug, Clone, Deserialize)]
pub struct Classifier {
    pub feature_names: Vec<String>,
    /// Column name -> category -> numeric code.
    #[serde(default)]
    pub encodings: HashMap<String, HashMap<String, f64>>,
    /// Per-feature replacement for missing values. Empty means no imputation.
    #[serde(default)]
    pub fill_values: Vec<f64>,
    pub model: Model,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Model {
    TreeEnsemble { trees: Vec<Tree> },
    Logistic { weights: Vec<f64>, bias: f64 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: i64,
    },
}

impl Classifier {
    /// Reads and validates an artifact from disk.
    pub fn load(path: &Path) -> Result<Self, CheckError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CheckError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CheckError> {
        let classifier: Classifier = serde_json::from_str(raw)?;
        classifier.validate()?;
        Ok(classifier)
    }

    fn validate(&self) -> Result<(), CheckError> {
        let n = self.feature_names.len();
        if n == 0 {
            return Err(CheckError::Artifact("feature_names is empty".into()));
        }
        if !self.fill_values.is_empty() && self.fill_values.len() != n {
            return Err(CheckError::Artifact(format!(
                "fill_values has {} entries, expected {}",
                self.fill_values.len(),
                n
            )));
        }

        match &self.model {
            Model::TreeEnsemble { trees } => {
                if trees.is_empty() {
                    return Err(CheckError::Artifact("tree ensemble has no trees".into()));
                }
                for (t, tree) in trees.iter().enumerate() {
                    tree.validate(n)
                        .map_err(|msg| CheckError::Artifact(format!("tree {}: {}", t, msg)))?;
                }
            }
            Model::Logistic { weights, .. } => {
                if weights.len() != n {
                    return Err(CheckError::Artifact(format!(
                        "logistic model has {} weights, expected {}",
                        weights.len(),
                        n
                    )));
                }
            }
        }
        Ok(())
    }

    /// Builds the feature matrix for `table`, looking columns up by name.
    pub fn features(&self, table: &Table) -> Result<Vec<Vec<f64>>, CheckError> {
        let columns = self
            .feature_names
            .iter()
            .map(|name| {
                table
                    .column_index(name)
                    .ok_or_else(|| CheckError::MissingColumn(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut matrix = Vec::with_capacity(table.len());
        for (r, row) in table.rows().iter().enumerate() {
            let mut x = Vec::with_capacity(columns.len());
            for (f, &c) in columns.iter().enumerate() {
                let name = &self.feature_names[f];
                let value = self.encode(name, &row[c]).ok_or_else(|| CheckError::Csv {
                    line: table.line(r),
                    message: format!("column '{}': cannot read '{}' as a number", name, row[c]),
                })?;
                x.push(value);
            }
            matrix.push(x);
        }
        Ok(matrix)
    }

    fn encode(&self, column: &str, cell: &str) -> Option<f64> {
        let cell = cell.trim();
        if cell.is_empty() {
            return Some(f64::NAN);
        }
        if let Some(codes) = self.encodings.get(column) {
            return Some(codes.get(cell).copied().unwrap_or(f64::NAN));
        }
        cell.parse::<f64>().ok()
    }

    /// Predicts one label per feature row.
    pub fn predict(&self, matrix: &[Vec<f64>]) -> Vec<i64> {
        matrix.iter().map(|x| self.predict_one(x)).collect()
    }

    pub fn predict_one(&self, x: &[f64]) -> i64 {
        let filled;
        let x = if self.fill_values.is_empty() {
            x
        } else {
            filled = x
                .iter()
                .zip(&self.fill_values)
                .map(|(&v, &fill)| if v.is_nan() { fill } else { v })
                .collect::<Vec<_>>();
            filled.as_slice()
        };

        match &self.model {
            Model::TreeEnsemble { trees } => {
                let mut votes: BTreeMap<i64, usize> = BTreeMap::new();
                for tree in trees {
                    *votes.entry(tree.predict(x)).or_default() += 1;
                }
                // Ties go to the smallest label.
                let mut best = (0, 0);
                for (label, count) in votes {
                    if count > best.1 {
                        best = (label, count);
                    }
                }
                best.0
            }
            Model::Logistic { weights, bias } => {
                let z: f64 = weights
                    .iter()
                    .zip(x)
                    .filter(|(_, v)| !v.is_nan())
                    .map(|(w, v)| w * v)
                    .sum::<f64>()
                    + bias;
                i64::from(z >= 0.0)
            }
        }
    }
}

impl Tree {
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("no nodes".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = *node
            {
                if feature >= n_features {
                    return Err(format!("node {} uses unknown feature {}", i, feature));
                }
                // Children must come after their parent, which rules out cycles.
                for child in [left, right] {
                    if child <= i || child >= self.nodes.len() {
                        return Err(format!("node {} has invalid child {}", i, child));
                    }
                }
            }
        }
        Ok(())
    }

    fn predict(&self, x: &[f64]) -> i64 {
        let mut i = 0;
        loop {
            match self.nodes[i] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if x[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEX_TREE: &str = r#"{
        "feature_names": ["Sex", "Age"],
        "encodings": { "Sex": { "male": 0, "female": 1 } },
        "model": { "type": "tree_ensemble", "trees": [
            { "nodes": [
                { "feature": 0, "threshold": 0.5, "left": 1, "right": 2 },
                { "value": 0 },
                { "value": 1 }
            ] }
        ] }
    }"#;

    #[test]
    fn test_tree_prediction() {
        let c = Classifier::from_json(SEX_TREE).unwrap();
        assert_eq!(c.predict_one(&[0.0, 30.0]), 0);
        assert_eq!(c.predict_one(&[1.0, 30.0]), 1);
        // NaN fails the <= test and goes right.
        assert_eq!(c.predict_one(&[f64::NAN, 30.0]), 1);
    }

    #[test]
    fn test_majority_vote() {
        let json = r#"{
            "feature_names": ["x"],
            "model": { "type": "tree_ensemble", "trees": [
                { "nodes": [ { "value": 1 } ] },
                { "nodes": [ { "value": 0 } ] },
                { "nodes": [ { "feature": 0, "threshold": 5.0, "left": 1, "right": 2 },
                             { "value": 0 }, { "value": 1 } ] }
            ] }
        }"#;
        let c = Classifier::from_json(json).unwrap();
        assert_eq!(c.predict_one(&[10.0]), 1);
        assert_eq!(c.predict_one(&[1.0]), 0);
    }

    #[test]
    fn test_logistic_with_fill_values() {
        let json = r#"{
            "feature_names": ["a", "b"],
            "fill_values": [0.0, 4.0],
            "model": { "type": "logistic", "weights": [1.0, -1.0], "bias": 0.5 }
        }"#;
        let c = Classifier::from_json(json).unwrap();
        assert_eq!(c.predict_one(&[3.0, 1.0]), 1);
        assert_eq!(c.predict_one(&[0.0, 1.0]), 0);
        // b is filled with 4.0: 2.0 - 4.0 + 0.5 < 0
        assert_eq!(c.predict_one(&[2.0, f64::NAN]), 0);
    }

    #[test]
    fn test_rejects_malformed_artifacts() {
        let bad_feature = r#"{
            "feature_names": ["x"],
            "model": { "type": "tree_ensemble", "trees": [
                { "nodes": [ { "feature": 3, "threshold": 0, "left": 1, "right": 2 },
                             { "value": 0 }, { "value": 1 } ] } ] }
        }"#;
        assert!(matches!(
            Classifier::from_json(bad_feature),
            Err(CheckError::Artifact(_))
        ));

        let cycle = r#"{
            "feature_names": ["x"],
            "model": { "type": "tree_ensemble", "trees": [
                { "nodes": [ { "feature": 0, "threshold": 0, "left": 0, "right": 1 },
                             { "value": 1 } ] } ] }
        }"#;
        assert!(Classifier::from_json(cycle).is_err());

        let weights = r#"{
            "feature_names": ["x", "y"],
            "model": { "type": "logistic", "weights": [1.0], "bias": 0 }
        }"#;
        assert!(Classifier::from_json(weights).is_err());

        assert!(matches!(
            Classifier::from_json("{not json"),
            Err(CheckError::Json(_))
        ));
    }

    #[test]
    fn test_features_by_name() {
        let c = Classifier::from_json(SEX_TREE).unwrap();
        let table = Table::parse("Age,Survived,Sex\n22,0,male\n,1,female\n5,1,unknown\n").unwrap();
        let m = c.features(&table).unwrap();
        assert_eq!(m[0], vec![0.0, 22.0]);
        assert_eq!(m[1][0], 1.0);
        assert!(m[1][1].is_nan());
        assert!(m[2][0].is_nan());
    }

    #[test]
    fn test_unreadable_feature_reports_source_line() {
        let c = Classifier::from_json(SEX_TREE).unwrap();
        let table = Table::parse("Age,Survived,Sex\n22,0,male\n\n\nold,1,female\n").unwrap();
        assert!(matches!(
            c.features(&table),
            Err(CheckError::Csv { line: 5, .. })
        ));
    }

    #[test]
    fn test_missing_feature_column() {
        let c = Classifier::from_json(SEX_TREE).unwrap();
        let table = Table::parse("Age,Survived\n22,0\n").unwrap();
        assert!(matches!(
            c.features(&table),
            Err(CheckError::MissingColumn(name)) if name == "Sex"
        ));
    }
}
