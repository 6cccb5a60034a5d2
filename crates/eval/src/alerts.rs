use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dashboard::DashboardReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Anomaly,
    LowRecall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

pub struct AlertSystem {
    recall_floor: f32,
}

impl Default for AlertSystem {
    fn default() -> Self {
        Self::new(0.7)
    }
}

impl AlertSystem {
    pub fn new(recall_floor: f32) -> Self {
        Self { recall_floor }
    }

    /// One alert per anomaly, plus one when recall@k is under the floor
    pub fn run(&self, report: &DashboardReport) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = report
            .anomalies
            .iter()
            .map(|a| Alert {
                kind: AlertKind::Anomaly,
                message: format!(
                    "Anomalia detectada em {}: recall@k = {:?}",
                    a.timestamp.to_rfc3339(),
                    a.recall_at_k
                ),
            })
            .collect();

        if let Some(recall) = report.metrics.recall_at_k {
            if recall < self.recall_floor {
                alerts.push(Alert {
                    kind: AlertKind::LowRecall,
                    message: format!("Alerta: Recall@k abaixo do limiar! Valor atual: {:.2}", recall),
                });
            }
        }

        for alert in &alerts {
            warn!(kind = ?alert.kind, "{}", alert.message);
        }
        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::DashboardMetrics;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn report(recall: Option<f32>, anomalies: usize) -> DashboardReport {
        let metrics = DashboardMetrics {
            total_answers: 3,
            mean_rouge_l: 0.4,
            recall_at_k: recall,
            timestamp: Utc::now(),
        };
        DashboardReport {
            anomalies: vec![metrics.clone(); anomalies],
            metrics,
            stage_timings: BTreeMap::new(),
        }
    }

    #[test]
    fn test_low_recall_alert() {
        let alerts = AlertSystem::default().run(&report(Some(0.42), 0));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::LowRecall);
        assert!(alerts[0].message.ends_with("0.42"));
    }

    #[test]
    fn test_anomalies_and_healthy_runs() {
        let alerts = AlertSystem::default().run(&report(Some(0.9), 2));
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.kind == AlertKind::Anomaly));

        assert!(AlertSystem::default().run(&report(None, 0)).is_empty());
        assert!(AlertSystem::new(0.5).run(&report(Some(0.6), 0)).is_empty());
    }
}
