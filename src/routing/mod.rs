//! Counterparty registry and routing/selection
//!
//! The eligibility pass and the selection pass are separate functions over
//! immutable inputs; the only mutable capacity state lives in the ledger.

mod counterparty;
mod router;

pub use counterparty::{
    CapacitySnapshot, Counterparty, CounterpartyRegistry, IneligibilityReason, ProposalAttributes,
};
pub use router::{route, EvaluatedCounterparty, Routing, SelectedCounterparty};
