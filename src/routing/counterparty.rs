//! Funding counterparty (FIDC) profiles, eligibility windows and
//! point-in-time capacity consumption

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::errors::{EngineError, Result};

/// First constraint a counterparty failed during routing.
///
/// Constraints are checked in a fixed order so the recorded reason is
/// deterministic for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibilityReason {
    Inactive,
    NotAcceptingNewOperations,
    BorrowerAgeOutsideWindow,
    AmountOutsideWindow,
    CreditScoreBelowMinimum,
    InsufficientDailyCapacity,
}

impl std::fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            IneligibilityReason::Inactive => "counterparty inactive",
            IneligibilityReason::NotAcceptingNewOperations => "not accepting new operations",
            IneligibilityReason::BorrowerAgeOutsideWindow => "borrower age outside window",
            IneligibilityReason::AmountOutsideWindow => "operation amount outside window",
            IneligibilityReason::CreditScoreBelowMinimum => "credit score below minimum",
            IneligibilityReason::InsufficientDailyCapacity => "insufficient daily capacity",
        };
        write!(f, "{}", text)
    }
}

/// Attributes of the proposal that counterparty eligibility looks at
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalAttributes {
    pub borrower_age: Option<Decimal>,
    pub requested_amount: Option<Decimal>,
    pub credit_score: Option<Decimal>,
}

/// A funding counterparty that may purchase the receivable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counterparty {
    pub id: String,
    pub fidc_name: String,
    pub is_active: bool,
    pub accepts_new_operations: bool,
    /// Inclusive age window; an unset bound is unbounded on that side
    #[serde(default)]
    pub min_borrower_age: Option<Decimal>,
    #[serde(default)]
    pub max_borrower_age: Option<Decimal>,
    /// Inclusive operation amount window
    #[serde(default)]
    pub min_operation_amount: Option<Decimal>,
    #[serde(default)]
    pub max_operation_amount: Option<Decimal>,
    #[serde(default)]
    pub min_credit_score: Option<Decimal>,
    /// Lower wins ties
    pub priority: i32,
    /// Currency volume accepted per operating day; unset = uncapped
    #[serde(default)]
    pub daily_capacity: Option<Decimal>,
    /// Percentage retained when purchasing the receivable
    pub purchase_discount_percentage: Decimal,
}

impl Counterparty {
    /// Configuration-time validation of window and capacity invariants
    pub fn validate(&self) -> Result<()> {
        self.check_window(
            "borrower age",
            self.min_borrower_age,
            self.max_borrower_age,
        )?;
        self.check_window(
            "operation amount",
            self.min_operation_amount,
            self.max_operation_amount,
        )?;
        if let Some(capacity) = self.daily_capacity {
            if capacity.is_sign_negative() {
                return Err(self.config_error("daily_capacity cannot be negative"));
            }
        }
        if self.purchase_discount_percentage.is_sign_negative()
            || self.purchase_discount_percentage > Decimal::ONE_HUNDRED
        {
            return Err(self.config_error("purchase discount must be within [0, 100]"));
        }
        Ok(())
    }

    /// First constraint this counterparty fails for the proposal, if any.
    ///
    /// `remaining_capacity` is the counterparty's unreserved volume for the
    /// operating day, `None` when uncapped. A proposal attribute that is
    /// missing fails any window that constrains it.
    pub fn disqualify(
        &self,
        attrs: &ProposalAttributes,
        remaining_capacity: Option<Decimal>,
    ) -> Option<IneligibilityReason> {
        if !self.is_active {
            return Some(IneligibilityReason::Inactive);
        }
        if !self.accepts_new_operations {
            return Some(IneligibilityReason::NotAcceptingNewOperations);
        }
        if !within_window(
            attrs.borrower_age,
            self.min_borrower_age,
            self.max_borrower_age,
        ) {
            return Some(IneligibilityReason::BorrowerAgeOutsideWindow);
        }
        if !within_window(
            attrs.requested_amount,
            self.min_operation_amount,
            self.max_operation_amount,
        ) {
            return Some(IneligibilityReason::AmountOutsideWindow);
        }
        if let Some(minimum) = self.min_credit_score {
            match attrs.credit_score {
                Some(score) if score >= minimum => {}
                _ => return Some(IneligibilityReason::CreditScoreBelowMinimum),
            }
        }
        if let (Some(remaining), Some(amount)) = (remaining_capacity, attrs.requested_amount) {
            if remaining < amount {
                return Some(IneligibilityReason::InsufficientDailyCapacity);
            }
        }
        None
    }

    fn check_window(&self, label: &str, min: Option<Decimal>, max: Option<Decimal>) -> Result<()> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(self.config_error(&format!("{} window is inverted", label)));
            }
        }
        Ok(())
    }

    fn config_error(&self, msg: &str) -> EngineError {
        EngineError::Configuration(format!(
            "counterparty '{}' ({}): {}",
            self.fidc_name, self.id, msg
        ))
    }
}

/// Inclusive window check; an attribute the proposal lacks fails any
/// constrained window
fn within_window(value: Option<Decimal>, min: Option<Decimal>, max: Option<Decimal>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    if let Some(lo) = min {
        if value < lo {
            return false;
        }
    }
    if let Some(hi) = max {
        if value > hi {
            return false;
        }
    }
    true
}

/// Immutable set of counterparty profiles for one evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterpartyRegistry {
    counterparties: Vec<Counterparty>,
}

impl CounterpartyRegistry {
    pub fn new(counterparties: Vec<Counterparty>) -> Self {
        Self { counterparties }
    }

    pub fn get(&self, id: &str) -> Option<&Counterparty> {
        self.counterparties.iter().find(|c| c.id == id)
    }

    /// Daily capacity of a counterparty; `None` when unknown or uncapped
    pub fn daily_capacity_of(&self, id: &str) -> Option<Decimal> {
        self.get(id).and_then(|c| c.daily_capacity)
    }

    pub fn all(&self) -> &[Counterparty] {
        &self.counterparties
    }

    pub fn is_empty(&self) -> bool {
        self.counterparties.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counterparties.len()
    }

    /// Validate every profile at configuration time
    pub fn validate(&self) -> Result<()> {
        for counterparty in &self.counterparties {
            counterparty.validate()?;
        }
        Ok(())
    }
}

/// Point-in-time view of capacity consumption for one operating day.
///
/// Produced by the capacity ledger and consumed read-only by the router, so
/// routing stays side-effect free and can run speculatively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    pub operating_day: NaiveDate,
    /// Reserved volume per counterparty id; absent means nothing reserved yet
    used: HashMap<String, Decimal>,
}

impl CapacitySnapshot {
    pub fn new(operating_day: NaiveDate) -> Self {
        Self {
            operating_day,
            used: HashMap::new(),
        }
    }

    /// Builder-style helper for tests and previews
    pub fn with_used(mut self, counterparty_id: impl Into<String>, amount: Decimal) -> Self {
        self.record_used(counterparty_id, amount);
        self
    }

    pub fn record_used(&mut self, counterparty_id: impl Into<String>, amount: Decimal) {
        self.used.insert(counterparty_id.into(), amount);
    }

    pub fn used_for(&self, counterparty_id: &str) -> Decimal {
        self.used
            .get(counterparty_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Remaining daily capacity for a counterparty; `None` when uncapped.
    /// Never negative, even if the ledger over-reports consumption.
    pub fn remaining_for(&self, counterparty: &Counterparty) -> Option<Decimal> {
        counterparty.daily_capacity.map(|capacity| {
            let remaining = capacity - self.used_for(&counterparty.id);
            remaining.max(Decimal::ZERO)
        })
    }
}
