//! Credit Decision Engine Library
//!
//! A Rust library that decides consumer-credit proposals: rule-based
//! eligibility evaluation, FIDC counterparty routing, atomic daily capacity
//! reservation and an append-only decision log.

pub mod audit;
pub mod common;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod routing;
pub mod rules;

// Re-export commonly used types
pub use common::errors::{EngineError, Result};
pub use common::timing::ExecutionTimer;
pub use common::types::{FieldValue, FinalAction, OrchestrationResult, Proposal};
pub use config::{load_config, parse_toml, EngineConfig, EngineSettings};
pub use engine::{AuditStatus, DecisionEngine, DecisionReport};

// Rule model and evaluation
pub use rules::{
    evaluate, Adjustments, BusinessRule, Evaluation, Operator, OrchestrationRule, RouteBy,
    RuleAction, RuleCategory, RuleValue, TriggeredRule,
};

// Routing and capacity
pub use audit::{DecisionLogEntry, DecisionSink, InMemoryDecisionLog};
pub use ledger::{BoxedCapacityLedger, CapacityLedger, InMemoryCapacityLedger, Reservation};
pub use routing::{
    route, CapacitySnapshot, Counterparty, CounterpartyRegistry, EvaluatedCounterparty,
    IneligibilityReason, Routing, SelectedCounterparty,
};
