//! Business rules: typed model and evaluation
//!
//! # Architecture
//!
//! ```text
//! Proposal ──► evaluate(proposal, rules)
//!                 │ active rules, ascending priority
//!                 │ reject = knockout requirement, others fire on match
//!                 ▼
//!              Evaluation { final_action, triggered_rules, adjustments }
//! ```
//!
//! Rule shape is validated when configuration is saved/loaded
//! ([`BusinessRule::validate`]); evaluation itself never fails.

mod evaluator;
mod types;

pub use evaluator::{evaluate, Adjustments, Evaluation, TriggeredRule};
pub use types::{
    BusinessRule, Operator, OrchestrationRule, RouteBy, RuleAction, RuleCategory, RuleValue,
};
