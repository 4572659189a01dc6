//! Decision engine orchestration
//!
//! One `decide` call runs the full pipeline for a proposal:
//!
//! ```text
//! evaluate ──► approved? ──► route ──► reserve ──► record ──► report
//!                 │            ▲          │
//!                 │            └──────────┘ lost race / timeout:
//!                 │              exclude counterparty, route again
//!                 └─ rejected / manual review: record and report
//! ```
//!
//! Reservation is the last step with external durable effect; everything
//! before it is pure and can be re-run or cancelled without cleanup. The
//! decision log write happens after the business outcome is settled, and a
//! sink failure is surfaced on the report without changing that outcome.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::audit::{DecisionLogEntry, DecisionSink};
use crate::common::errors::{EngineError, Result};
use crate::common::timing::ExecutionTimer;
use crate::common::types::{FinalAction, OrchestrationResult, Proposal};
use crate::config::{EngineConfig, EngineSettings};
use crate::ledger::{CapacityLedger, Reservation};
use crate::routing::{route, CapacitySnapshot, EvaluatedCounterparty};
use crate::rules::{evaluate, Adjustments, TriggeredRule};

/// Whether the audit trace reached the decision log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditStatus {
    /// Entry persisted
    Recorded,
    /// Sink failed; the business outcome stands, the outage is alertable
    Failed { reason: String },
    /// Dry run: previews leave no trace
    Skipped,
}

/// Synchronous result of one engine invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReport {
    pub proposal_id: String,
    pub final_action: FinalAction,
    pub adjustments: Adjustments,
    pub triggered_rules: Vec<TriggeredRule>,
    pub evaluated_counterparties: Vec<EvaluatedCounterparty>,
    pub selected_counterparty_id: Option<String>,
    pub orchestration_result: OrchestrationResult,
    /// Committed reservation when a counterparty was selected (absent on
    /// dry runs)
    pub reservation: Option<Reservation>,
    pub execution_time_ms: u64,
    pub audit: AuditStatus,
}

/// Orchestrates evaluation, routing, capacity reservation and audit logging
pub struct DecisionEngine {
    ledger: Arc<dyn CapacityLedger>,
    sink: Arc<dyn DecisionSink>,
    settings: EngineSettings,
}

impl DecisionEngine {
    pub fn new(ledger: Arc<dyn CapacityLedger>, sink: Arc<dyn DecisionSink>) -> Self {
        Self {
            ledger,
            sink,
            settings: EngineSettings::default(),
        }
    }

    /// Override the default runtime settings
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Decide a proposal and commit its side effects (capacity reservation,
    /// decision log entry).
    #[instrument(skip(self, proposal, config), fields(proposal_id = %proposal.id))]
    pub async fn decide(
        &self,
        proposal: &Proposal,
        config: &EngineConfig,
        operating_day: NaiveDate,
    ) -> Result<DecisionReport> {
        self.run(proposal, config, operating_day, false).await
    }

    /// What-if evaluation: runs the same pipeline but reserves nothing and
    /// records nothing.
    #[instrument(skip(self, proposal, config), fields(proposal_id = %proposal.id))]
    pub async fn preview(
        &self,
        proposal: &Proposal,
        config: &EngineConfig,
        operating_day: NaiveDate,
    ) -> Result<DecisionReport> {
        self.run(proposal, config, operating_day, true).await
    }

    async fn run(
        &self,
        proposal: &Proposal,
        config: &EngineConfig,
        operating_day: NaiveDate,
        dry_run: bool,
    ) -> Result<DecisionReport> {
        let timer = ExecutionTimer::start();

        let evaluation = evaluate(proposal, &config.rules);

        let (evaluated, selected, orchestration_result, reservation) = if evaluation.is_approved()
        {
            self.route_and_reserve(proposal, config, operating_day, dry_run)
                .await
        } else {
            // rules stopped the proposal before routing
            (vec![], None, OrchestrationResult::RejectedByRules, None)
        };

        let execution_time_ms = timer.elapsed_ms();

        info!(
            proposal_id = %proposal.id,
            final_action = %evaluation.final_action,
            orchestration_result = %orchestration_result,
            selected = selected.as_deref().unwrap_or("none"),
            execution_time_ms,
            dry_run,
            "proposal decided"
        );

        let audit = if dry_run {
            AuditStatus::Skipped
        } else {
            let entry = DecisionLogEntry {
                proposal_id: proposal.id.clone(),
                timestamp: Utc::now(),
                triggered_rules: evaluation.triggered_rules.clone(),
                final_action: evaluation.final_action,
                evaluated_counterparties: evaluated.clone(),
                selected_counterparty_id: selected.clone(),
                orchestration_result,
                execution_time_ms,
            };
            match self.sink.record(entry).await {
                Ok(()) => AuditStatus::Recorded,
                Err(e) => {
                    warn!(proposal_id = %proposal.id, error = %e, "decision log write failed");
                    AuditStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        };

        Ok(DecisionReport {
            proposal_id: proposal.id.clone(),
            final_action: evaluation.final_action,
            adjustments: evaluation.adjustments,
            triggered_rules: evaluation.triggered_rules,
            evaluated_counterparties: evaluated,
            selected_counterparty_id: selected,
            orchestration_result,
            reservation,
            execution_time_ms,
            audit,
        })
    }

    /// Route, then reserve; on a lost race or reservation timeout, exclude
    /// the exhausted counterparty and route again, up to the configured
    /// number of attempts.
    async fn route_and_reserve(
        &self,
        proposal: &Proposal,
        config: &EngineConfig,
        operating_day: NaiveDate,
        dry_run: bool,
    ) -> (
        Vec<EvaluatedCounterparty>,
        Option<String>,
        OrchestrationResult,
        Option<Reservation>,
    ) {
        let amount = proposal.requested_amount().unwrap_or(Decimal::ZERO);
        let mut exclusions: HashSet<String> = HashSet::new();

        let mut attempts = 0;
        loop {
            attempts += 1;

            let snapshot = self.capacity_snapshot(operating_day).await;
            let routing = route(
                proposal,
                &config.counterparties,
                &config.arrangements,
                &snapshot,
                &exclusions,
            );

            let Some(selection) = routing.selected else {
                return (
                    routing.evaluated,
                    None,
                    OrchestrationResult::NoEligibleCounterparty,
                    None,
                );
            };

            if dry_run {
                // speculative call: report the selection, touch nothing
                return (
                    routing.evaluated,
                    Some(selection.counterparty_id),
                    OrchestrationResult::Success,
                    None,
                );
            }

            match self
                .reserve_with_retry(&selection.counterparty_id, operating_day, amount, proposal)
                .await
            {
                Ok(reservation) if reservation.ok => {
                    return (
                        routing.evaluated,
                        Some(selection.counterparty_id),
                        OrchestrationResult::Success,
                        Some(reservation),
                    );
                }
                Ok(_) => {
                    // capacity race lost; not an error
                    info!(
                        proposal_id = %proposal.id,
                        counterparty_id = %selection.counterparty_id,
                        "reservation lost capacity race, re-routing"
                    );
                    exclusions.insert(selection.counterparty_id);
                }
                Err(e) => {
                    warn!(
                        proposal_id = %proposal.id,
                        counterparty_id = %selection.counterparty_id,
                        error = %e,
                        "reservation unavailable, re-routing"
                    );
                    exclusions.insert(selection.counterparty_id);
                }
            }

            if attempts >= self.settings.max_route_attempts {
                // exhausted the routing budget; rerun the eligibility pass
                // once more so the audit trail shows the final state
                let snapshot = self.capacity_snapshot(operating_day).await;
                let routing = route(
                    proposal,
                    &config.counterparties,
                    &config.arrangements,
                    &snapshot,
                    &exclusions,
                );
                return (
                    routing.evaluated,
                    None,
                    OrchestrationResult::NoEligibleCounterparty,
                    None,
                );
            }
        }
    }

    /// Capacity view for routing. A snapshot failure degrades to an empty
    /// snapshot: routing turns optimistic, and the reserve step stays the
    /// authoritative capacity check.
    async fn capacity_snapshot(&self, operating_day: NaiveDate) -> CapacitySnapshot {
        match self.ledger.snapshot(operating_day).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "capacity snapshot unavailable, routing without it");
                CapacitySnapshot::new(operating_day)
            }
        }
    }

    /// One reservation attempt: bounded timeout, transient failures retried
    /// with backoff. A timeout is reported as unavailability, not a fatal
    /// error; the caller moves on to the next-ranked candidate.
    async fn reserve_with_retry(
        &self,
        counterparty_id: &str,
        operating_day: NaiveDate,
        amount: Decimal,
        proposal: &Proposal,
    ) -> Result<Reservation> {
        let timeout = Duration::from_millis(self.settings.reserve_timeout_ms);
        let backoff = Duration::from_millis(self.settings.reserve_retry_backoff_ms);
        let mut retries = 0;

        loop {
            let attempt = self
                .ledger
                .reserve(counterparty_id, operating_day, amount, &proposal.id);

            match tokio::time::timeout(timeout, attempt).await {
                Ok(Ok(reservation)) => return Ok(reservation),
                Ok(Err(e)) if e.is_transient() && retries < self.settings.max_reserve_retries => {
                    retries += 1;
                    warn!(
                        %counterparty_id,
                        proposal_id = %proposal.id,
                        retry = retries,
                        error = %e,
                        "transient ledger failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(EngineError::Timeout(format!(
                        "reservation against '{}' exceeded {}ms",
                        counterparty_id, self.settings.reserve_timeout_ms
                    )))
                }
            }
        }
    }
}
