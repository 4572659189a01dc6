//! Append-only decision log
//!
//! Pure recorder: entries are created once per evaluation and never updated
//! or deleted. The dashboard's Logs and Audit screens consume these records
//! verbatim, so the entry carries everything needed to reconstruct "why this
//! decision": triggered rules, every counterparty considered with its
//! disqualifying reason, and the final routing outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::common::errors::Result;
use crate::common::types::{FinalAction, OrchestrationResult};
use crate::routing::EvaluatedCounterparty;
use crate::rules::TriggeredRule;

/// One evaluation's full audit trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    pub proposal_id: String,
    pub timestamp: DateTime<Utc>,
    /// Rules that fired, in evaluation order
    pub triggered_rules: Vec<TriggeredRule>,
    pub final_action: FinalAction,
    /// Every counterparty considered during routing (empty when rules
    /// stopped the proposal first)
    pub evaluated_counterparties: Vec<EvaluatedCounterparty>,
    pub selected_counterparty_id: Option<String>,
    pub orchestration_result: OrchestrationResult,
    pub execution_time_ms: u64,
}

/// Destination for decision log entries.
///
/// Recording is a side effect, not a gate: implementations must report
/// failures so they can be alerted on, but the caller never lets a sink
/// failure change the business outcome.
#[async_trait]
pub trait DecisionSink: Send + Sync {
    async fn record(&self, entry: DecisionLogEntry) -> Result<()>;
}

/// In-process append-only log
#[derive(Debug, Default)]
pub struct InMemoryDecisionLog {
    entries: Mutex<Vec<DecisionLogEntry>>,
}

impl InMemoryDecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded entries, oldest first
    pub async fn entries(&self) -> Vec<DecisionLogEntry> {
        self.entries.lock().await.clone()
    }

    /// Entries for one proposal, oldest first
    pub async fn entries_for(&self, proposal_id: &str) -> Vec<DecisionLogEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.proposal_id == proposal_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl DecisionSink for InMemoryDecisionLog {
    async fn record(&self, entry: DecisionLogEntry) -> Result<()> {
        self.entries.lock().await.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(proposal_id: &str, action: FinalAction) -> DecisionLogEntry {
        DecisionLogEntry {
            proposal_id: proposal_id.into(),
            timestamp: Utc::now(),
            triggered_rules: vec![],
            final_action: action,
            evaluated_counterparties: vec![],
            selected_counterparty_id: None,
            orchestration_result: OrchestrationResult::RejectedByRules,
            execution_time_ms: 3,
        }
    }

    #[tokio::test]
    async fn records_append_in_order() {
        let log = InMemoryDecisionLog::new();
        log.record(entry("p1", FinalAction::Reject)).await.unwrap();
        log.record(entry("p2", FinalAction::Approve)).await.unwrap();
        log.record(entry("p1", FinalAction::Approve)).await.unwrap();

        let all = log.entries().await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].proposal_id, "p1");
        assert_eq!(all[1].proposal_id, "p2");

        let p1 = log.entries_for("p1").await;
        assert_eq!(p1.len(), 2);
        assert_eq!(p1[0].final_action, FinalAction::Reject);
        assert_eq!(p1[1].final_action, FinalAction::Approve);
    }

    #[tokio::test]
    async fn entry_serializes_for_the_dashboard() {
        let json = serde_json::to_value(entry("p1", FinalAction::ManualReview)).unwrap();
        assert_eq!(json["proposal_id"], "p1");
        assert_eq!(json["final_action"], "manual_review");
        assert_eq!(json["orchestration_result"], "rejected_by_rules");
        assert!(json["selected_counterparty_id"].is_null());
    }
}
