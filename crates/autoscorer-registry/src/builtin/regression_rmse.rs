//! Built-in `regression_rmse` scorer: root-mean-square error over `gt.csv`
//! versus `pred.csv`.

use super::csv_table::{assert_same_ids, read_id_value_csv};
use crate::scorer::Scorer;
use autoscorer_core::{ErrorBlock, ErrorCode, Stage};
use chrono::Utc;
use std::path::Path;

pub struct RegressionRmse;

impl Scorer for RegressionRmse {
    fn name(&self) -> &str {
        "regression_rmse"
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

        if gt.is_empty() {
            return Err(ErrorBlock::new(ErrorCode::Mismatch, Stage::Scoring, "no rows to score"));
        }

        let mut sum_sq = 0.0;
        for (id, gt_raw) in &gt {
            let gt_value: f64 = gt_raw
                .parse()
                .map_err(|_| ErrorBlock::new(ErrorCode::ParseError, Stage::Scoring, format!("gt value for id {id} is not numeric: {gt_raw:?}")))?;
            let pred_raw = &pred[id];
            let pred_value: f64 = pred_raw
                .parse()
                .map_err(|_| ErrorBlock::new(ErrorCode::ParseError, Stage::Scoring, format!("pred value for id {id} is not numeric: {pred_raw:?}")))?;
            sum_sq += (pred_value - gt_value).powi(2);
        }
        let rmse = (sum_sq / gt.len() as f64).sqrt();

        let mut metrics = std::collections::HashMap::new();
        metrics.insert("rmse".to_string(), rmse);

        Ok(autoscorer_core::ScoreResult::success(
            autoscorer_core::Summary {
                score: rmse,
                rank: None,
                pass: None,
                message: None,
            },
            metrics,
            autoscorer_core::Versioning {
                scorer: self.name().to_string(),
                version: self.version().to_string(),
                algorithm: Some("rmse".to_string()),
                timestamp: Utc::now().to_rfc3339(),
            },
        ))
    }
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
    fn rmse_matches_worked_example() {
        let dir = tempdir().unwrap();
        write_workspace(
            dir.path(),
            "id,value\n1,1.0\n2,3.0\n",
            "id,value\n1,2.0\n2,2.0\n",
        );
        let result = RegressionRmse.score(dir.path(), &serde_json::Map::new()).unwrap();
        assert_eq!(result.metrics["rmse"], 1.0);
    }

    #[test]
    fn perfect_predictions_score_zero() {
        let dir = tempdir().unwrap();
        write_workspace(dir.path(), "id,value\n1,1.0\n", "id,value\n1,1.0\n");
        let result = RegressionRmse.score(dir.path(), &serde_json::Map::new()).unwrap();
        assert_eq!(result.metrics["rmse"], 0.0);
    }

    #[test]
    fn non_numeric_value_is_parse_error() {
        let dir = tempdir().unwrap();
        write_workspace(dir.path(), "id,value\n1,abc\n", "id,value\n1,1.0\n");
        let err = RegressionRmse.score(dir.path(), &serde_json::Map::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseError);
    }
}
