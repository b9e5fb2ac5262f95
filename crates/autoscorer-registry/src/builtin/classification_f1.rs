//! Built-in `classification_f1` scorer: macro-averaged F1 over `gt.csv`
//! versus `pred.csv`.

use super::csv_table::{assert_same_ids, read_id_value_csv};
use crate::scorer::Scorer;
use autoscorer_core::{ErrorBlock, ErrorCode, Stage};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub struct ClassificationF1;

impl Scorer for ClassificationF1 {
    fn name(&self) -> &str {
        "classification_f1"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn score(
        &self,
        workspace_path: &Path,
        _params: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<autoscorer_core::ScoreResult, ErrorBlock> {
        let gt = read_id_value_csv(&workspace_path.join("input/gt.csv"))?;
        let pred = read_id_value_csv(&workspace_path.join("output/pred.csv"))?;
        assert_same_ids(&gt, &pred)?;

        let f1_macro = macro_f1(&gt, &pred);

        let mut metrics = std::collections::HashMap::new();
        metrics.insert("f1_macro".to_string(), f1_macro);

        Ok(autoscorer_core::ScoreResult::success(
            autoscorer_core::Summary {
                score: f1_macro,
                rank: None,
                pass: None,
                message: None,
            },
            metrics,
            autoscorer_core::Versioning {
                scorer: self.name().to_string(),
                version: self.version().to_string(),
                algorithm: Some("macro-f1".to_string()),
                timestamp: Utc::now().to_rfc3339(),
            },
        ))
    }
}

fn macro_f1(gt: &BTreeMap<String, String>, pred: &BTreeMap<String, String>) -> f64 {
    let labels: BTreeSet<&str> = gt.values().map(String::as_str).collect();
    if labels.is_empty() {
        return 0.0;
    }

    let mut sum = 0.0;
    for label in &labels {
        let mut tp = 0u64;
        let mut fp = 0u64;
        let mut fn_ = 0u64;
        for (id, gt_label) in gt {
            let pred_label = pred.get(id).map(String::as_str).unwrap_or_default();
            let gt_is = gt_label == label;
            let pred_is = pred_label == *label;
            match (gt_is, pred_is) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }
        let precision = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
        let recall = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        sum += f1;
    }
    sum / labels.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_workspace(dir: &Path, gt: &str, pred: &str) {
        fs::create_dir_all(dir.join("input")).unwrap();
        fs::create_dir_all(dir.join("output")).unwrap();
        fs::write(dir.join("input/gt.csv"), gt).unwrap();
        fs::write(dir.join("output/pred.csv"), pred).unwrap();
    }

    #[test]
    fn perfect_predictions_score_one() {
        let dir = tempdir().unwrap();
        write_workspace(dir.path(), "id,label\n1,cat\n2,dog\n", "id,label\n1,cat\n2,dog\n");
        let result = ClassificationF1.score(dir.path(), &serde_json::Map::new()).unwrap();
        assert_eq!(result.summary.unwrap().score, 1.0);
        assert_eq!(result.metrics["f1_macro"], 1.0);
    }

    #[test]
    fn partial_predictions_score_one_third() {
        let dir = tempdir().unwrap();
        write_workspace(dir.path(), "id,label\n1,cat\n2,dog\n", "id,label\n1,cat\n2,cat\n");
        let result = ClassificationF1.score(dir.path(), &serde_json::Map::new()).unwrap();
        let score = result.summary.unwrap().score;
        assert!((score - 0.333).abs() < 0.001, "got {score}");
    }

    #[test]
    fn missing_pred_file_is_missing_file_error() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("input")).unwrap();
        fs::write(dir.path().join("input/gt.csv"), "id,label\n1,cat\n").unwrap();
        let err = ClassificationF1.score(dir.path(), &serde_json::Map::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingFile);
        assert_eq!(err.stage, Stage::Scoring);
    }

    #[test]
    fn id_set_mismatch_errors() {
        let dir = tempdir().unwrap();
        write_workspace(
            dir.path(),
            "id,label\n1,cat\n2,dog\n3,cat\n",
            "id,label\n1,cat\n2,dog\n",
        );
        let err = ClassificationF1.score(dir.path(), &serde_json::Map::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::Mismatch);
    }
}
