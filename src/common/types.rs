//! Unified types shared across the evaluation and routing stages

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::{EngineError, Result};

/// Well-known proposal field: requested operation amount
pub const FIELD_REQUESTED_AMOUNT: &str = "requested_amount";
/// Well-known proposal field: borrower age in years
pub const FIELD_BORROWER_AGE: &str = "borrower_age";
/// Well-known proposal field: borrower credit score
pub const FIELD_CREDIT_SCORE: &str = "borrower_credit_score";
/// Well-known proposal field: employer/convenio identifier
pub const FIELD_CONVENIO_ID: &str = "convenio_id";
/// Well-known proposal field: SCD partner identifier
pub const FIELD_SCD_PARTNER: &str = "scd_partner";

/// Terminal outcome of a rule evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalAction {
    Approve,
    Reject,
    ManualReview,
}

impl std::fmt::Display for FinalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinalAction::Approve => write!(f, "approve"),
            FinalAction::Reject => write!(f, "reject"),
            FinalAction::ManualReview => write!(f, "manual_review"),
        }
    }
}

/// Outcome of the counterparty routing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationResult {
    /// A counterparty was selected
    Success,
    /// Every counterparty was filtered out; valid terminal state, not an error
    NoEligibleCounterparty,
    /// Rule evaluation stopped the proposal before routing
    RejectedByRules,
}

impl std::fmt::Display for OrchestrationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestrationResult::Success => write!(f, "success"),
            OrchestrationResult::NoEligibleCounterparty => write!(f, "no_eligible_counterparty"),
            OrchestrationResult::RejectedByRules => write!(f, "rejected_by_rules"),
        }
    }
}

/// A value resolved from a proposal field
///
/// Proposals carry numeric, string, boolean and date-typed fields. Dates
/// travel as ISO-8601 text, which compares correctly as plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(Decimal),
    Text(String),
    Bool(bool),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Coerce to a comparable numeric value.
    ///
    /// Numeric text is parsed; anything else is `None` so numeric operators
    /// fail closed instead of erroring mid-evaluation.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => Decimal::from_str(s.trim()).ok(),
            _ => None,
        }
    }

    /// Textual form used for equality and substring comparisons
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn from_json(value: &serde_json::Value) -> Option<FieldValue> {
        match value {
            serde_json::Value::Number(n) => decimal_from_json_number(n).map(FieldValue::Number),
            serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(*b)),
            serde_json::Value::Array(items) => Some(FieldValue::List(
                items.iter().filter_map(FieldValue::from_json).collect(),
            )),
            _ => None,
        }
    }

    /// Loose equality: numbers compare numerically even when one side is
    /// numeric text, everything else compares structurally.
    pub fn loosely_equals(&self, other: &FieldValue) -> bool {
        if let (Some(a), Some(b)) = (self.as_decimal(), other.as_decimal()) {
            return a == b;
        }
        match (self, other) {
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::List(a), FieldValue::List(b)) => a == b,
            _ => false,
        }
    }
}

fn decimal_from_json_number(n: &serde_json::Number) -> Option<Decimal> {
    // from_str keeps exact decimal digits; from_scientific covers 1e5-style
    // literals that JSON permits
    Decimal::from_str(&n.to_string())
        .or_else(|_| Decimal::from_scientific(&n.to_string()))
        .ok()
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// A credit proposal under evaluation
///
/// The engine does not own the proposal schema; the payload is an opaque
/// keyed bag (the record store's proposal entity) resolved via dotted-path
/// lookup. Missing or malformed fields degrade to non-match, never to an
/// evaluation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposal identifier, also the idempotency key for capacity reservation
    pub id: String,
    /// Raw proposal payload
    pub fields: serde_json::Value,
}

impl Proposal {
    /// Build a proposal from a raw record-store payload.
    ///
    /// The payload must be a JSON object carrying an `id` (or `proposal_id`)
    /// key; everything else is opaque to the engine.
    pub fn from_value(payload: serde_json::Value) -> Result<Self> {
        let obj = payload
            .as_object()
            .ok_or_else(|| EngineError::InvalidProposal("payload is not an object".into()))?;

        let id = obj
            .get("id")
            .or_else(|| obj.get("proposal_id"))
            .and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| EngineError::InvalidProposal("missing id/proposal_id".into()))?;

        Ok(Self {
            id,
            fields: payload,
        })
    }

    /// Resolve a dotted path ("borrower.age") into the payload
    pub fn resolve(&self, path: &str) -> Option<FieldValue> {
        let mut current = &self.fields;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        FieldValue::from_json(current)
    }

    /// Resolve a dotted path and coerce to a number
    pub fn resolve_decimal(&self, path: &str) -> Option<Decimal> {
        self.resolve(path).and_then(|v| v.as_decimal())
    }

    /// Requested operation amount
    pub fn requested_amount(&self) -> Option<Decimal> {
        self.resolve_decimal(FIELD_REQUESTED_AMOUNT)
    }

    /// Borrower age in years
    pub fn borrower_age(&self) -> Option<Decimal> {
        self.resolve_decimal(FIELD_BORROWER_AGE)
    }

    /// Borrower credit score
    pub fn credit_score(&self) -> Option<Decimal> {
        self.resolve_decimal(FIELD_CREDIT_SCORE)
    }

    /// Employer/convenio identifier, if the proposal carries one
    pub fn convenio_id(&self) -> Option<String> {
        self.resolve(FIELD_CONVENIO_ID).map(|v| v.to_string())
    }

    /// SCD partner identifier, if the proposal carries one
    pub fn scd_partner(&self) -> Option<String> {
        self.resolve(FIELD_SCD_PARTNER).map(|v| v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn proposal() -> Proposal {
        Proposal::from_value(json!({
            "id": "prop-1",
            "requested_amount": 1500.50,
            "borrower_age": 42,
            "borrower": { "name": "Ana", "score": 710 },
            "channel": "mobile",
            "documents": ["rg", "cpf"],
            "amount_as_text": "2500.00"
        }))
        .unwrap()
    }

    #[test]
    fn resolves_top_level_and_nested_paths() {
        let p = proposal();
        assert_eq!(p.resolve_decimal("borrower_age"), Some(dec!(42)));
        assert_eq!(p.resolve_decimal("borrower.score"), Some(dec!(710)));
        assert_eq!(
            p.resolve("channel"),
            Some(FieldValue::Text("mobile".into()))
        );
    }

    #[test]
    fn missing_path_resolves_to_none() {
        let p = proposal();
        assert_eq!(p.resolve("borrower.income"), None);
        assert_eq!(p.resolve("nonexistent"), None);
    }

    #[test]
    fn numeric_coercion_parses_text_and_fails_closed() {
        let p = proposal();
        assert_eq!(p.resolve_decimal("amount_as_text"), Some(dec!(2500.00)));
        // a plain string is not a number
        assert_eq!(p.resolve_decimal("channel"), None);
        // neither is a list
        assert_eq!(p.resolve_decimal("documents"), None);
    }

    #[test]
    fn exact_decimal_amounts() {
        let p = proposal();
        assert_eq!(p.requested_amount(), Some(dec!(1500.50)));
    }

    #[test]
    fn rejects_non_object_payloads() {
        assert!(Proposal::from_value(json!([1, 2, 3])).is_err());
        assert!(Proposal::from_value(json!({"name": "no id"})).is_err());
    }

    #[test]
    fn accepts_numeric_ids() {
        let p = Proposal::from_value(json!({"proposal_id": 9912})).unwrap();
        assert_eq!(p.id, "9912");
    }

    #[test]
    fn loose_equality_bridges_numeric_text() {
        assert!(FieldValue::Number(dec!(10)).loosely_equals(&FieldValue::Text("10".into())));
        assert!(!FieldValue::Text("abc".into()).loosely_equals(&FieldValue::Number(dec!(1))));
    }
}
