//! Counterparty selection for approved proposals
//!
//! Routing is a pure function over the proposal, the counterparty profiles,
//! the arrangement rules and a capacity snapshot. It never touches the live
//! ledger, so it can be invoked speculatively (preview/what-if) and re-run
//! with an exclusion set after a lost reservation race.
//!
//! The "evaluate all counterparties, then pick" shape is kept as two
//! independently testable passes: an eligibility pass that records every
//! counterparty with its first failing constraint, and a selection pass
//! that orders the survivors by successive sort keys.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

use crate::common::types::{OrchestrationResult, Proposal};
use crate::routing::counterparty::{
    CapacitySnapshot, Counterparty, IneligibilityReason, ProposalAttributes,
};
use crate::rules::{OrchestrationRule, RouteBy};

/// One counterparty's outcome in the eligibility pass, kept for the audit
/// trail regardless of the final selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedCounterparty {
    pub counterparty_id: String,
    pub fidc_name: String,
    pub eligible: bool,
    /// First failing constraint when ineligible
    pub disqualified_by: Option<IneligibilityReason>,
}

/// The counterparty the router picked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedCounterparty {
    pub counterparty_id: String,
    pub fidc_name: String,
    pub purchase_discount_percentage: Decimal,
}

/// Full routing outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routing {
    pub selected: Option<SelectedCounterparty>,
    /// Every counterparty considered, in registry order
    pub evaluated: Vec<EvaluatedCounterparty>,
    pub result: OrchestrationResult,
    /// Which arrangement governed the attempt
    pub arrangement_id: String,
    pub route_by: RouteBy,
}

/// Select a counterparty for an approved proposal.
///
/// `exclusions` names counterparties to treat as capacity-exhausted for this
/// attempt: the caller adds a counterparty there after losing a reservation
/// race against it, then routes again.
pub fn route(
    proposal: &Proposal,
    counterparties: &[Counterparty],
    arrangements: &[OrchestrationRule],
    snapshot: &CapacitySnapshot,
    exclusions: &HashSet<String>,
) -> Routing {
    let arrangement = applicable_arrangement(proposal, arrangements);
    debug!(
        proposal_id = %proposal.id,
        arrangement_id = %arrangement.id,
        route_by = %arrangement.route_by,
        "routing proposal"
    );

    let attrs = ProposalAttributes {
        borrower_age: proposal.borrower_age(),
        requested_amount: proposal.requested_amount(),
        credit_score: proposal.credit_score(),
    };

    let (evaluated, eligible) = eligibility_pass(counterparties, &attrs, snapshot, exclusions);
    let selected = selection_pass(eligible, &arrangement, snapshot);

    let result = if selected.is_some() {
        OrchestrationResult::Success
    } else {
        OrchestrationResult::NoEligibleCounterparty
    };

    debug!(
        proposal_id = %proposal.id,
        selected = selected.as_ref().map(|s| s.counterparty_id.as_str()).unwrap_or("none"),
        %result,
        "routing finished"
    );

    Routing {
        selected,
        evaluated,
        result,
        arrangement_id: arrangement.id,
        route_by: arrangement.route_by,
    }
}

/// Highest-priority active arrangement whose scope covers the proposal;
/// arrangement id breaks priority ties, the implicit speed arrangement is
/// the fallback.
fn applicable_arrangement(
    proposal: &Proposal,
    arrangements: &[OrchestrationRule],
) -> OrchestrationRule {
    arrangements
        .iter()
        .filter(|a| a.is_active && a.matches_scope(proposal))
        .min_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)))
        .cloned()
        .unwrap_or_else(OrchestrationRule::default_arrangement)
}

/// Filter pass: record every counterparty with its eligibility verdict and,
/// when ineligible, the first failing constraint.
fn eligibility_pass<'a>(
    counterparties: &'a [Counterparty],
    attrs: &ProposalAttributes,
    snapshot: &CapacitySnapshot,
    exclusions: &HashSet<String>,
) -> (Vec<EvaluatedCounterparty>, Vec<&'a Counterparty>) {
    let mut evaluated = Vec::with_capacity(counterparties.len());
    let mut eligible = Vec::new();

    for counterparty in counterparties {
        let disqualified_by = if exclusions.contains(&counterparty.id) {
            // exhausted by a lost reservation race earlier in this decision
            Some(IneligibilityReason::InsufficientDailyCapacity)
        } else {
            counterparty.disqualify(attrs, snapshot.remaining_for(counterparty))
        };

        if disqualified_by.is_none() {
            eligible.push(counterparty);
        }

        evaluated.push(EvaluatedCounterparty {
            counterparty_id: counterparty.id.clone(),
            fidc_name: counterparty.fidc_name.clone(),
            eligible: disqualified_by.is_none(),
            disqualified_by,
        });
    }

    (evaluated, eligible)
}

/// Score pass: narrow by the arrangement's preference list, then order by
/// successive sort keys and take the first candidate.
///
/// `speed` keeps counterparty priority as the primary signal; `discount`
/// and `capacity` reorder by their own key first, with priority and then
/// counterparty id as stable tie-breaks.
fn selection_pass(
    eligible: Vec<&Counterparty>,
    arrangement: &OrchestrationRule,
    snapshot: &CapacitySnapshot,
) -> Option<SelectedCounterparty> {
    if eligible.is_empty() {
        return None;
    }

    let mut candidates = match &arrangement.preferred_fidcs {
        Some(preferred) if !preferred.is_empty() => {
            let narrowed: Vec<&Counterparty> = eligible
                .iter()
                .copied()
                .filter(|c| preferred.contains(&c.id))
                .collect();
            if narrowed.is_empty() {
                // explicit preference found nothing eligible; fall back
                eligible
            } else {
                narrowed
            }
        }
        _ => eligible,
    };

    candidates.sort_by(|a, b| {
        strategy_ordering(arrangement.route_by, a, b, snapshot)
            .then_with(|| a.priority.cmp(&b.priority))
            .then_with(|| a.id.cmp(&b.id))
    });

    candidates.first().map(|c| SelectedCounterparty {
        counterparty_id: c.id.clone(),
        fidc_name: c.fidc_name.clone(),
        purchase_discount_percentage: c.purchase_discount_percentage,
    })
}

fn strategy_ordering(
    route_by: RouteBy,
    a: &Counterparty,
    b: &Counterparty,
    snapshot: &CapacitySnapshot,
) -> Ordering {
    match route_by {
        RouteBy::Speed => Ordering::Equal,
        RouteBy::Discount => b
            .purchase_discount_percentage
            .cmp(&a.purchase_discount_percentage),
        RouteBy::Capacity => {
            // most remaining first; uncapped outranks any finite remainder
            match (snapshot.remaining_for(a), snapshot.remaining_for(b)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(ra), Some(rb)) => rb.cmp(&ra),
            }
        }
    }
}
