//! Typed representation of business rules and routing arrangements
//!
//! Rules and arrangements are edited through generic dashboard forms and
//! stored loosely typed; this module is where shape is re-imposed. All
//! validation happens at configuration save/load time via [`BusinessRule::validate`]
//! and friends, so the evaluator never type-checks at runtime.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, Result};
use crate::common::types::{FieldValue, FinalAction, Proposal};

/// Business area a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Eligibility,
    CreditLimit,
    InterestRate,
    Margin,
    Documentation,
    Scoring,
    AntiFraud,
}

/// Comparison operator applied to a proposal field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
    In,
    Between,
}

impl Operator {
    /// Whether this operator compares against a list of values
    pub fn wants_many(&self) -> bool {
        matches!(self, Operator::In | Operator::Between)
    }

    /// Evaluate this operator against a resolved field value.
    ///
    /// Semantics follow the evaluation contract: `between` is inclusive on
    /// both bounds, numeric operators coerce and fail closed on non-numeric
    /// input, and a shape mismatch is a non-match, never an error.
    pub fn matches(&self, actual: &FieldValue, expected: &RuleValue) -> bool {
        match self {
            Operator::Equals => match expected.scalar() {
                Some(v) => actual.loosely_equals(v),
                None => false,
            },
            Operator::NotEquals => match expected.scalar() {
                Some(v) => !actual.loosely_equals(v),
                None => false,
            },
            Operator::GreaterThan => numeric_cmp(actual, expected, |a, b| a > b),
            Operator::LessThan => numeric_cmp(actual, expected, |a, b| a < b),
            Operator::GreaterOrEqual => numeric_cmp(actual, expected, |a, b| a >= b),
            Operator::LessOrEqual => numeric_cmp(actual, expected, |a, b| a <= b),
            Operator::Contains => match (actual, expected.scalar()) {
                // substring over text fields
                (FieldValue::Text(haystack), Some(FieldValue::Text(needle))) => {
                    haystack.contains(needle.as_str())
                }
                // membership when the field itself is a list
                (FieldValue::List(items), Some(needle)) => {
                    items.iter().any(|item| item.loosely_equals(needle))
                }
                _ => false,
            },
            Operator::In => match expected.many() {
                Some(set) => set.iter().any(|candidate| actual.loosely_equals(candidate)),
                None => false,
            },
            Operator::Between => {
                let Some((low, high)) = expected.pair() else {
                    return false;
                };
                match (actual.as_decimal(), low.as_decimal(), high.as_decimal()) {
                    (Some(v), Some(lo), Some(hi)) => lo <= v && v <= hi,
                    // text bounds (ISO dates) compare lexicographically
                    _ => match (actual.as_text(), low.as_text(), high.as_text()) {
                        (Some(v), Some(lo), Some(hi)) => lo <= v && v <= hi,
                        _ => false,
                    },
                }
            }
        }
    }
}

fn numeric_cmp(
    actual: &FieldValue,
    expected: &RuleValue,
    cmp: impl Fn(Decimal, Decimal) -> bool,
) -> bool {
    let actual = actual.as_decimal();
    let expected = expected.scalar().and_then(|v| v.as_decimal());
    match (actual, expected) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

/// Comparison value attached to a rule: a scalar, or a list for `in`/`between`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Many(Vec<FieldValue>),
    Scalar(FieldValue),
}

impl RuleValue {
    pub fn scalar(&self) -> Option<&FieldValue> {
        match self {
            RuleValue::Scalar(v) => Some(v),
            RuleValue::Many(_) => None,
        }
    }

    pub fn many(&self) -> Option<&[FieldValue]> {
        match self {
            RuleValue::Many(items) => Some(items),
            RuleValue::Scalar(_) => None,
        }
    }

    /// The `[low, high]` pair of a `between` value
    pub fn pair(&self) -> Option<(&FieldValue, &FieldValue)> {
        match self {
            RuleValue::Many(items) if items.len() == 2 => Some((&items[0], &items[1])),
            _ => None,
        }
    }
}

/// Action taken when a rule matches
///
/// Tagged representation so malformed actions are rejected when the record
/// is saved, not when a proposal is evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Terminal: approve the proposal and stop evaluating
    Approve,
    /// Terminal: reject the proposal and stop evaluating
    Reject,
    /// Cumulative: send to manual review unless a terminal rule decides first
    ManualReview,
    /// Cumulative: override the operation interest rate
    AdjustRate { new_rate: Decimal },
    /// Cumulative: override the credit limit
    AdjustLimit { new_limit: Decimal },
    /// Cumulative: demand an extra document before formalization
    RequireDocument { document: String },
    /// Cumulative: mark the proposal for the back office
    Flag { label: String },
}

impl RuleAction {
    /// Terminal actions stop rule processing
    pub fn is_terminal(&self) -> bool {
        matches!(self, RuleAction::Approve | RuleAction::Reject)
    }

    /// The final action this rule forces, if terminal
    pub fn terminal_action(&self) -> Option<FinalAction> {
        match self {
            RuleAction::Approve => Some(FinalAction::Approve),
            RuleAction::Reject => Some(FinalAction::Reject),
            _ => None,
        }
    }
}

/// A single configurable business rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRule {
    pub id: String,
    pub name: String,
    pub category: RuleCategory,
    /// Dotted path into the proposal payload
    pub field: String,
    pub operator: Operator,
    pub value: RuleValue,
    pub action: RuleAction,
    /// Lower evaluates first
    pub priority: i32,
    pub is_active: bool,
}

impl BusinessRule {
    /// Validate shape at configuration time.
    ///
    /// Checks operator/value arity and `between` bound ordering so the
    /// evaluator can trust every rule it is handed.
    pub fn validate(&self) -> Result<()> {
        if self.field.trim().is_empty() {
            return Err(self.config_error("field path is empty"));
        }

        match self.operator {
            Operator::Between => {
                let Some((low, high)) = self.value.pair() else {
                    return Err(self.config_error("between requires a [low, high] pair"));
                };
                match (low.as_decimal(), high.as_decimal()) {
                    (Some(lo), Some(hi)) => {
                        if lo > hi {
                            return Err(self.config_error("between bounds are inverted"));
                        }
                    }
                    (None, None) => {
                        // lexicographic bounds (date ranges); both sides must be text
                        if low.as_text().is_none() || high.as_text().is_none() {
                            return Err(
                                self.config_error("between bounds must both be numeric or text")
                            );
                        }
                    }
                    _ => {
                        return Err(self.config_error("between bounds have mixed types"));
                    }
                }
            }
            Operator::In => {
                match self.value.many() {
                    Some(items) if !items.is_empty() => {}
                    _ => return Err(self.config_error("in requires a non-empty value set")),
                }
            }
            _ => {
                if self.value.scalar().is_none() {
                    return Err(self.config_error("operator requires a scalar value"));
                }
            }
        }

        if let RuleAction::AdjustRate { new_rate } = &self.action {
            if new_rate.is_sign_negative() {
                return Err(self.config_error("adjusted rate cannot be negative"));
            }
        }
        if let RuleAction::AdjustLimit { new_limit } = &self.action {
            if new_limit.is_sign_negative() {
                return Err(self.config_error("adjusted limit cannot be negative"));
            }
        }

        Ok(())
    }

    /// Whether this rule's condition holds for the given proposal.
    ///
    /// A missing field is always a non-match; no operator is defined over
    /// absence.
    pub fn condition_holds(&self, proposal: &Proposal) -> Option<bool> {
        proposal
            .resolve(&self.field)
            .map(|actual| self.operator.matches(&actual, &self.value))
    }

    /// Whether this rule fires its action against the proposal.
    ///
    /// Reject rules are knockout requirements: the condition states what an
    /// eligible proposal must satisfy, and the rejection fires when the
    /// field resolves but the condition fails (a malformed numeric field
    /// fails coercion and therefore fails the requirement, so the check fails
    /// closed). Every other action fires when the condition matches. An
    /// absent field never fires anything.
    pub fn triggers(&self, proposal: &Proposal) -> bool {
        let Some(holds) = self.condition_holds(proposal) else {
            return false;
        };
        match self.action {
            RuleAction::Reject => !holds,
            _ => holds,
        }
    }

    fn config_error(&self, msg: &str) -> EngineError {
        EngineError::Configuration(format!("rule '{}' ({}): {}", self.name, self.id, msg))
    }
}

/// Routing strategy applied among eligible counterparties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteBy {
    /// Highest purchase discount first (more revenue per receivable)
    Discount,
    /// First eligible by counterparty priority, no reordering
    Speed,
    /// Most remaining daily capacity first (load-balance)
    Capacity,
}

impl std::fmt::Display for RouteBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteBy::Discount => write!(f, "discount"),
            RouteBy::Speed => write!(f, "speed"),
            RouteBy::Capacity => write!(f, "capacity"),
        }
    }
}

/// A scoped routing arrangement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationRule {
    pub id: String,
    pub rule_name: String,
    pub is_active: bool,
    /// System rules are seeded defaults, immutable through the normal edit path
    #[serde(default)]
    pub is_system_rule: bool,
    /// Restricts the arrangement to proposals of one convenio
    #[serde(default)]
    pub convenio_id: Option<String>,
    /// Restricts the arrangement to proposals of one SCD partner
    #[serde(default)]
    pub scd_partner: Option<String>,
    pub route_by: RouteBy,
    /// Ordered preference list; when it intersects the eligible set, the
    /// intersection replaces the candidate set
    #[serde(default)]
    pub preferred_fidcs: Option<Vec<String>>,
    /// Lower wins when several arrangements match the same proposal
    pub priority: i32,
}

impl OrchestrationRule {
    /// Whether this arrangement's scope covers the proposal.
    /// An unset scope dimension matches everything.
    pub fn matches_scope(&self, proposal: &Proposal) -> bool {
        if let Some(convenio) = &self.convenio_id {
            if proposal.convenio_id().as_deref() != Some(convenio.as_str()) {
                return false;
            }
        }
        if let Some(partner) = &self.scd_partner {
            if proposal.scd_partner().as_deref() != Some(partner.as_str()) {
                return false;
            }
        }
        true
    }

    /// Implicit arrangement used when nothing matches: route by speed,
    /// no preference list.
    pub fn default_arrangement() -> Self {
        Self {
            id: "default".to_string(),
            rule_name: "default".to_string(),
            is_active: true,
            is_system_rule: true,
            convenio_id: None,
            scd_partner: None,
            route_by: RouteBy::Speed,
            preferred_fidcs: None,
            priority: i32::MAX,
        }
    }

    /// Configuration-time validation
    pub fn validate(&self) -> Result<()> {
        if self.rule_name.trim().is_empty() {
            return Err(EngineError::Configuration(format!(
                "arrangement '{}': rule_name is empty",
                self.id
            )));
        }
        if let Some(preferred) = &self.preferred_fidcs {
            if preferred.is_empty() {
                return Err(EngineError::Configuration(format!(
                    "arrangement '{}': preferred_fidcs present but empty",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn rule(operator: Operator, value: RuleValue) -> BusinessRule {
        BusinessRule {
            id: "r1".into(),
            name: "test rule".into(),
            category: RuleCategory::Eligibility,
            field: "borrower_age".into(),
            operator,
            value,
            action: RuleAction::Reject,
            priority: 1,
            is_active: true,
        }
    }

    fn num(n: Decimal) -> FieldValue {
        FieldValue::Number(n)
    }

    #[test]
    fn between_is_inclusive_on_both_bounds() {
        let value = RuleValue::Many(vec![num(dec!(18)), num(dec!(70))]);
        assert!(Operator::Between.matches(&num(dec!(18)), &value));
        assert!(Operator::Between.matches(&num(dec!(70)), &value));
        assert!(Operator::Between.matches(&num(dec!(35)), &value));
        assert!(!Operator::Between.matches(&num(dec!(17.9)), &value));
        assert!(!Operator::Between.matches(&num(dec!(70.1)), &value));
    }

    #[test]
    fn between_over_iso_dates_compares_lexicographically() {
        let value = RuleValue::Many(vec![
            FieldValue::Text("2024-01-01".into()),
            FieldValue::Text("2024-12-31".into()),
        ]);
        assert!(Operator::Between.matches(&FieldValue::Text("2024-06-15".into()), &value));
        assert!(!Operator::Between.matches(&FieldValue::Text("2025-01-01".into()), &value));
    }

    #[test]
    fn numeric_operators_fail_closed_on_non_numeric_input() {
        let value = RuleValue::Scalar(num(dec!(1000)));
        assert!(!Operator::GreaterThan.matches(&FieldValue::Text("abc".into()), &value));
        assert!(!Operator::LessOrEqual.matches(&FieldValue::Bool(true), &value));
        // numeric text coerces
        assert!(Operator::GreaterThan.matches(&FieldValue::Text("1200".into()), &value));
    }

    #[test]
    fn in_and_contains_membership() {
        let set = RuleValue::Many(vec![
            FieldValue::Text("mobile".into()),
            FieldValue::Text("web".into()),
        ]);
        assert!(Operator::In.matches(&FieldValue::Text("mobile".into()), &set));
        assert!(!Operator::In.matches(&FieldValue::Text("branch".into()), &set));

        let needle = RuleValue::Scalar(FieldValue::Text("cpf".into()));
        assert!(Operator::Contains.matches(
            &FieldValue::List(vec![
                FieldValue::Text("rg".into()),
                FieldValue::Text("cpf".into())
            ]),
            &needle
        ));
        assert!(Operator::Contains.matches(&FieldValue::Text("rg,cpf,proof".into()), &needle));
        assert!(!Operator::Contains.matches(&FieldValue::Text("rg".into()), &needle));
    }

    #[test]
    fn validation_rejects_arity_mismatches() {
        // between with a scalar
        let bad = rule(Operator::Between, RuleValue::Scalar(num(dec!(18))));
        assert!(bad.validate().is_err());

        // between with inverted bounds
        let inverted = rule(
            Operator::Between,
            RuleValue::Many(vec![num(dec!(70)), num(dec!(18))]),
        );
        assert!(inverted.validate().is_err());

        // in with empty set
        let empty = rule(Operator::In, RuleValue::Many(vec![]));
        assert!(empty.validate().is_err());

        // scalar operator with a list
        let list = rule(Operator::Equals, RuleValue::Many(vec![num(dec!(1))]));
        assert!(list.validate().is_err());

        // well-formed
        let ok = rule(
            Operator::Between,
            RuleValue::Many(vec![num(dec!(18)), num(dec!(70))]),
        );
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn missing_field_never_triggers() {
        let r = BusinessRule {
            field: "borrower.monthly_income".into(),
            ..rule(
                Operator::GreaterOrEqual,
                RuleValue::Scalar(num(dec!(1000))),
            )
        };
        let proposal = Proposal::from_value(json!({"id": "p1", "borrower_age": 30})).unwrap();
        assert_eq!(r.condition_holds(&proposal), None);
        // not even for a reject (knockout) rule
        assert!(!r.triggers(&proposal));
    }

    #[test]
    fn reject_rules_fire_on_violated_requirement() {
        // requirement: age within [18, 70]; outside the window knocks out
        let r = rule(
            Operator::Between,
            RuleValue::Many(vec![num(dec!(18)), num(dec!(70))]),
        );
        let aged = |age: i64| Proposal::from_value(json!({"id": "p", "borrower_age": age})).unwrap();
        assert!(r.triggers(&aged(75)));
        assert!(!r.triggers(&aged(30)));
        // inclusive bounds satisfy the requirement
        assert!(!r.triggers(&aged(18)));
        assert!(!r.triggers(&aged(70)));
    }

    #[test]
    fn non_terminal_rules_fire_on_match() {
        let r = BusinessRule {
            action: RuleAction::Flag {
                label: "high amount".into(),
            },
            field: "requested_amount".into(),
            ..rule(Operator::GreaterThan, RuleValue::Scalar(num(dec!(50000))))
        };
        let p = |amount: i64| {
            Proposal::from_value(json!({"id": "p", "requested_amount": amount})).unwrap()
        };
        assert!(r.triggers(&p(60000)));
        assert!(!r.triggers(&p(1000)));
    }

    #[test]
    fn arrangement_scope_matching() {
        let proposal = Proposal::from_value(json!({
            "id": "p1",
            "convenio_id": "gov-sp",
            "scd_partner": "scd-alpha"
        }))
        .unwrap();

        let mut arrangement = OrchestrationRule::default_arrangement();
        assert!(arrangement.matches_scope(&proposal));

        arrangement.convenio_id = Some("gov-sp".into());
        assert!(arrangement.matches_scope(&proposal));

        arrangement.scd_partner = Some("scd-beta".into());
        assert!(!arrangement.matches_scope(&proposal));
    }

    #[test]
    fn rule_action_serde_is_tagged() {
        let action: RuleAction =
            serde_json::from_value(json!({"type": "adjust_rate", "new_rate": "2.5"})).unwrap();
        assert_eq!(
            action,
            RuleAction::AdjustRate {
                new_rate: dec!(2.5)
            }
        );
        assert!(serde_json::from_value::<RuleAction>(json!({"type": "explode"})).is_err());
    }
}
