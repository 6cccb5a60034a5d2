use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::evaluation::EvaluationRecord;
use crate::prompt_opt::mean_rouge_l;

pub const REPORT_FILE: &str = "dashboard_report.json";
pub const HISTORY_FILE: &str = "metrics_history.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_answers: usize,
    pub mean_rouge_l: f64,
    pub recall_at_k: Option<f32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    pub metrics: DashboardMetrics,
    pub anomalies: Vec<DashboardMetrics>,
    /// Stage name -> elapsed milliseconds
    pub stage_timings: BTreeMap<String, f64>,
}

pub struct Dashboard {
    output_dir: PathBuf,
    anomaly_threshold: f32,
}

impl Dashboard {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            anomaly_threshold: 0.1,
        }
    }

    pub fn with_anomaly_threshold(mut self, threshold: f32) -> Self {
        self.anomaly_threshold = threshold;
        self
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.output_dir.join(HISTORY_FILE)
    }

    pub fn aggregate(records: &[EvaluationRecord], recall_at_k: Option<f32>) -> DashboardMetrics {
        DashboardMetrics {
            total_answers: records.len(),
            mean_rouge_l: mean_rouge_l(records),
            recall_at_k,
            timestamp: Utc::now(),
        }
    }

    /// Previous runs, oldest first. Unreadable lines are skipped.
    pub async fn load_history(&self) -> Result<Vec<DashboardMetrics>> {
        let path = self.history_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .context(format!("Failed to read metrics history {}", path.display()))?;

        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| match serde_json::from_str(l) {
                Ok(m) => Some(m),
                Err(e) => {
                    warn!("Skipping malformed history line: {}", e);
                    None
                }
            })
            .collect())
    }

    async fn append_history(&self, metrics: &DashboardMetrics) -> Result<()> {
        let mut line = serde_json::to_string(metrics)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path())
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Entries whose recall@k fell by more than the threshold since the
    /// last earlier entry that has a recall value
    pub fn detect_anomalies(&self, history: &[DashboardMetrics]) -> Vec<DashboardMetrics> {
        let mut anomalies = Vec::new();
        let mut last_recall: Option<f32> = None;
        for entry in history {
            let Some(curr) = entry.recall_at_k else {
                continue;
            };
            if let Some(prev) = last_recall {
                if prev - curr > self.anomaly_threshold {
                    anomalies.push(entry.clone());
                }
            }
            last_recall = Some(curr);
        }

        if !anomalies.is_empty() {
            warn!(count = anomalies.len(), "Metric anomalies detected");
        }
        anomalies
    }

    /// Aggregates this run, appends it to the history and writes the report
    pub async fn run(
        &self,
        records: &[EvaluationRecord],
        recall_at_k: Option<f32>,
        stage_timings: BTreeMap<String, f64>,
    ) -> Result<DashboardReport> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .context("Failed to create dashboard directory")?;

        let metrics = Self::aggregate(records, recall_at_k);
        info!(
            total_answers = metrics.total_answers,
            mean_rouge_l = metrics.mean_rouge_l,
            recall_at_k = ?metrics.recall_at_k,
            "Aggregated metrics"
        );

        let mut history = self.load_history().await?;
        history.push(metrics.clone());
        self.append_history(&metrics).await?;

        let report = DashboardReport {
            anomalies: self.detect_anomalies(&history),
            metrics,
            stage_timings,
        };

        tokio::fs::write(self.report_path(), serde_json::to_string_pretty(&report)?)
            .await
            .context("Failed to write dashboard report")?;
        info!(path = %self.report_path().display(), "Dashboard report saved");

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::AutomaticScores;
    use uuid::Uuid;

    fn metrics(recall: Option<f32>) -> DashboardMetrics {
        DashboardMetrics {
            total_answers: 1,
            mean_rouge_l: 0.5,
            recall_at_k: recall,
            timestamp: Utc::now(),
        }
    }

    fn record(rouge: Option<f32>) -> EvaluationRecord {
        EvaluationRecord {
            id: Uuid::new_v4(),
            query: "q".to_string(),
            answer: "a".to_string(),
            reference: None,
            automatic: rouge.map(|rouge_l| AutomaticScores {
                rouge_l,
                bertscore: None,
            }),
            judge_feedback: String::new(),
            human_review: "pending".to_string(),
            context_documents: Vec::new(),
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn test_aggregate_counts_missing_scores_as_zero() {
        let m = Dashboard::aggregate(&[record(Some(0.8)), record(None)], Some(0.9));
        assert_eq!(m.total_answers, 2);
        assert!((m.mean_rouge_l - 0.4).abs() < 1e-6);
        assert_eq!(m.recall_at_k, Some(0.9));

        assert_eq!(Dashboard::aggregate(&[], None).mean_rouge_l, 0.0);
    }

    #[test]
    fn test_detect_recall_drops() {
        let dashboard = Dashboard::new("unused");
        let history = vec![
            metrics(Some(0.9)),
            metrics(Some(0.85)),
            metrics(Some(0.6)),
            metrics(None),
            metrics(Some(0.1)),
        ];
        let anomalies = dashboard.detect_anomalies(&history);

        assert_eq!(anomalies.len(), 2);
        assert_eq!(anomalies[0].recall_at_k, Some(0.6));
        assert_eq!(anomalies[1].recall_at_k, Some(0.1));
    }

    #[test]
    fn test_drop_across_missing_recall_is_flagged() {
        let dashboard = Dashboard::new("unused");
        let history = vec![metrics(Some(0.6)), metrics(None), metrics(None), metrics(Some(0.1))];
        let anomalies = dashboard.detect_anomalies(&history);

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].recall_at_k, Some(0.1));

        let steady = vec![metrics(Some(0.6)), metrics(None), metrics(Some(0.55))];
        assert!(dashboard.detect_anomalies(&steady).is_empty());
    }

    #[tokio::test]
    async fn test_run_appends_history_and_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = Dashboard::new(dir.path().join("dashboard"));

        let first = dashboard.run(&[record(Some(1.0))], Some(0.95), BTreeMap::new()).await.unwrap();
        assert!(first.anomalies.is_empty());

        let mut timings = BTreeMap::new();
        timings.insert("ingest".to_string(), 12.5);
        let second = dashboard.run(&[record(Some(0.2))], Some(0.5), timings).await.unwrap();

        assert_eq!(second.anomalies.len(), 1);
        assert_eq!(dashboard.load_history().await.unwrap().len(), 2);

        let saved: DashboardReport =
            serde_json::from_str(&std::fs::read_to_string(dashboard.report_path()).unwrap()).unwrap();
        assert_eq!(saved.stage_timings.get("ingest"), Some(&12.5));
        assert_eq!(saved.metrics.recall_at_k, Some(0.5));
    }
}
