//! Configuration types
//!
//! The surrounding dashboard edits rules, counterparties and arrangements
//! through generic forms; everything arriving here is re-validated before
//! the engine will evaluate with it, so evaluation itself never has to
//! defend against malformed configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::common::errors::{EngineError, Result};
use crate::routing::{Counterparty, CounterpartyRegistry};
use crate::rules::{BusinessRule, OrchestrationRule};

/// Full engine configuration: one immutable snapshot per evaluation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Business rules, evaluated in ascending priority order
    #[serde(default)]
    pub rules: Vec<BusinessRule>,
    /// Funding counterparties available for routing
    #[serde(default)]
    pub counterparties: Vec<Counterparty>,
    /// Routing arrangements
    #[serde(default)]
    pub arrangements: Vec<OrchestrationRule>,
    /// Runtime settings
    #[serde(default)]
    pub settings: EngineSettings,
}

impl EngineConfig {
    /// Validate every record at load/save time.
    ///
    /// Checks each rule/counterparty/arrangement invariant plus id
    /// uniqueness across each collection.
    pub fn validate(&self) -> Result<()> {
        let mut rule_ids = HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !rule_ids.insert(&rule.id) {
                return Err(EngineError::Configuration(format!(
                    "duplicate rule id '{}'",
                    rule.id
                )));
            }
        }

        let mut counterparty_ids = HashSet::new();
        for counterparty in &self.counterparties {
            counterparty.validate()?;
            if !counterparty_ids.insert(&counterparty.id) {
                return Err(EngineError::Configuration(format!(
                    "duplicate counterparty id '{}'",
                    counterparty.id
                )));
            }
        }

        let mut arrangement_ids = HashSet::new();
        for arrangement in &self.arrangements {
            arrangement.validate()?;
            if !arrangement_ids.insert(&arrangement.id) {
                return Err(EngineError::Configuration(format!(
                    "duplicate arrangement id '{}'",
                    arrangement.id
                )));
            }
            if let Some(preferred) = &arrangement.preferred_fidcs {
                for fidc in preferred {
                    if !self.counterparties.iter().any(|c| &c.id == fidc) {
                        return Err(EngineError::Configuration(format!(
                            "arrangement '{}' prefers unknown counterparty '{}'",
                            arrangement.id, fidc
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Registry view over the configured counterparties
    pub fn registry(&self) -> Arc<CounterpartyRegistry> {
        Arc::new(CounterpartyRegistry::new(self.counterparties.clone()))
    }
}

/// Runtime settings for the decision engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Bounded timeout for one ledger reservation call, in milliseconds
    #[serde(default = "default_reserve_timeout")]
    pub reserve_timeout_ms: u64,
    /// How many route→reserve rounds to run before giving up on a proposal
    #[serde(default = "default_max_route_attempts")]
    pub max_route_attempts: u32,
    /// Retries of a transient ledger failure within one reservation attempt
    #[serde(default = "default_max_reserve_retries")]
    pub max_reserve_retries: u32,
    /// Backoff between transient-failure retries, in milliseconds
    #[serde(default = "default_reserve_retry_backoff")]
    pub reserve_retry_backoff_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            reserve_timeout_ms: default_reserve_timeout(),
            max_route_attempts: default_max_route_attempts(),
            max_reserve_retries: default_max_reserve_retries(),
            reserve_retry_backoff_ms: default_reserve_retry_backoff(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reserve_timeout() -> u64 {
    2000
}

fn default_max_route_attempts() -> u32 {
    3
}

fn default_max_reserve_retries() -> u32 {
    2
}

fn default_reserve_retry_backoff() -> u64 {
    100
}
