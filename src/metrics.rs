use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::generator::{ActionKind, Phase};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationMetrics {
    pub total_requests: u64,
    pub succeeded: u64,
    pub throttled: u64,
    pub rejected: u64,
    pub flagged: u64,
    pub failed: u64,
    pub since: u64,
}

impl Default for GenerationMetrics {
    fn default() -> Self {
        Self {
            total_requests: 0,
            succeeded: 0,
            throttled: 0,
            rejected: 0,
            flagged: 0,
            failed: 0,
            since: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

impl GenerationMetrics {
    fn record(&mut self, phase: Phase) {
        self.total_requests += 1;
        match phase {
            Phase::Done => self.succeeded += 1,
            Phase::Throttled => self.throttled += 1,
            Phase::Rejected => self.rejected += 1,
            Phase::Flagged => self.flagged += 1,
            Phase::Failed => self.failed += 1,
            _ => {}
        }
    }
}

/// Process-wide counters of generation outcomes, keyed by action kind.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    by_kind: Arc<RwLock<HashMap<ActionKind, GenerationMetrics>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, kind: ActionKind, phase: Phase) {
        let mut metrics = self.by_kind.write().await;
        metrics.entry(kind).or_default().record(phase);
    }

    pub async fn get(&self, kind: ActionKind) -> Option<GenerationMetrics> {
        let metrics = self.by_kind.read().await;
        metrics.get(&kind).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<ActionKind, GenerationMetrics> {
        self.by_kind.read().await.clone()
    }

    pub async fn global(&self) -> GenerationMetrics {
        let metrics = self.by_kind.read().await;
        let mut global = GenerationMetrics::default();

        for m in metrics.values() {
            global.total_requests += m.total_requests;
            global.succeeded += m.succeeded;
            global.throttled += m.throttled;
            global.rejected += m.rejected;
            global.flagged += m.flagged;
            global.failed += m.failed;
        }

        global
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_outcomes_per_kind() {
        let metrics = MetricsCollector::new();
        metrics.record(ActionKind::Text, Phase::Done).await;
        metrics.record(ActionKind::Text, Phase::Flagged).await;
        metrics.record(ActionKind::Image, Phase::Throttled).await;

        let text = metrics.get(ActionKind::Text).await.unwrap();
        assert_eq!(text.total_requests, 2);
        assert_eq!(text.succeeded, 1);
        assert_eq!(text.flagged, 1);

        let global = metrics.global().await;
        assert_eq!(global.total_requests, 3);
        assert_eq!(global.throttled, 1);
        assert!(metrics.get(ActionKind::Style).await.is_none());
    }
}
