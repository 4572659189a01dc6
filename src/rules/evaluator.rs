//! Rule evaluation against a proposal
//!
//! Pure and deterministic: given the same proposal and the same immutable
//! rule snapshot it always produces the same triggered sequence and the same
//! final action. No clock, no randomness, no I/O.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::types::{FinalAction, Proposal};
use crate::rules::types::{BusinessRule, RuleAction};

/// One rule that matched during evaluation, in trigger order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredRule {
    pub rule_id: String,
    pub rule_name: String,
    pub action: RuleAction,
    pub priority: i32,
}

/// Cumulative annotations collected from non-terminal rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Adjustments {
    /// Overridden interest rate; when several rules adjust it, the last
    /// triggered in priority order wins
    pub new_rate: Option<Decimal>,
    /// Overridden credit limit, same composition as `new_rate`
    pub new_limit: Option<Decimal>,
    /// Extra documents demanded before formalization
    pub required_documents: Vec<String>,
    /// Back-office flags
    pub flags: Vec<String>,
}

impl Adjustments {
    pub fn is_empty(&self) -> bool {
        self.new_rate.is_none()
            && self.new_limit.is_none()
            && self.required_documents.is_empty()
            && self.flags.is_empty()
    }
}

/// Result of evaluating a proposal against a rule snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub final_action: FinalAction,
    /// Every matched rule, in evaluation order
    pub triggered_rules: Vec<TriggeredRule>,
    pub adjustments: Adjustments,
}

impl Evaluation {
    pub fn is_approved(&self) -> bool {
        self.final_action == FinalAction::Approve
    }
}

/// Evaluate a proposal against an immutable rule snapshot.
///
/// Active rules run in ascending `priority` order (rule id breaks ties, so
/// the sequence is stable). The first terminal action (`approve`/`reject`)
/// wins and stops processing; `manual_review` and the adjustment actions are
/// cumulative. If no terminal rule fires and nothing demanded review, the
/// proposal is approved: an empty active rule set must not block intake.
pub fn evaluate(proposal: &Proposal, rules: &[BusinessRule]) -> Evaluation {
    let mut active: Vec<&BusinessRule> = rules.iter().filter(|r| r.is_active).collect();
    active.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

    let mut triggered = Vec::new();
    let mut adjustments = Adjustments::default();
    let mut wants_review = false;
    let mut terminal: Option<FinalAction> = None;

    for rule in active {
        if !rule.triggers(proposal) {
            continue;
        }

        debug!(
            proposal_id = %proposal.id,
            rule_id = %rule.id,
            rule_name = %rule.name,
            "rule triggered"
        );

        triggered.push(TriggeredRule {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            action: rule.action.clone(),
            priority: rule.priority,
        });

        match &rule.action {
            RuleAction::Approve | RuleAction::Reject => {
                terminal = rule.action.terminal_action();
                break;
            }
            RuleAction::ManualReview => wants_review = true,
            RuleAction::AdjustRate { new_rate } => adjustments.new_rate = Some(*new_rate),
            RuleAction::AdjustLimit { new_limit } => adjustments.new_limit = Some(*new_limit),
            RuleAction::RequireDocument { document } => {
                if !adjustments.required_documents.contains(document) {
                    adjustments.required_documents.push(document.clone());
                }
            }
            RuleAction::Flag { label } => {
                if !adjustments.flags.contains(label) {
                    adjustments.flags.push(label.clone());
                }
            }
        }
    }

    let final_action = terminal.unwrap_or(if wants_review {
        FinalAction::ManualReview
    } else {
        FinalAction::Approve
    });

    Evaluation {
        final_action,
        triggered_rules: triggered,
        adjustments,
    }
}
