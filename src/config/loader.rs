//! Configuration loader

use config::{Config, Environment, File, FileFormat};
use std::path::Path;

use super::types::EngineConfig;
use crate::common::errors::{EngineError, Result};

/// Load and validate configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with ENGINE__)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<EngineConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("ENGINE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    let engine_config: EngineConfig = config
        .try_deserialize()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    engine_config.validate()?;
    Ok(engine_config)
}

/// Parse and validate configuration from a TOML string
pub fn parse_toml(toml: &str) -> Result<EngineConfig> {
    let config = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    let engine_config: EngineConfig = config
        .try_deserialize()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    engine_config.validate()?;
    Ok(engine_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Operator, RouteBy, RuleAction};
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
        [settings]
        log_level = "debug"
        reserve_timeout_ms = 500

        [[rules]]
        id = "score-floor"
        name = "minimum credit score"
        category = "scoring"
        field = "borrower_credit_score"
        operator = "greater_or_equal"
        value = 400
        priority = 1
        is_active = true

        [rules.action]
        type = "reject"

        [[counterparties]]
        id = "fidc-a"
        fidc_name = "FIDC Alpha"
        is_active = true
        accepts_new_operations = true
        min_borrower_age = 18
        max_borrower_age = 70
        priority = 1
        daily_capacity = 100000
        purchase_discount_percentage = 10.5

        [[arrangements]]
        id = "arr-1"
        rule_name = "gov-sp preferred"
        is_active = true
        convenio_id = "gov-sp"
        route_by = "discount"
        preferred_fidcs = ["fidc-a"]
        priority = 1
    "#;

    #[test]
    fn parses_full_toml_configuration() {
        let config = parse_toml(SAMPLE).unwrap();

        assert_eq!(config.settings.log_level, "debug");
        assert_eq!(config.settings.reserve_timeout_ms, 500);
        // unspecified settings fall back to defaults
        assert_eq!(config.settings.max_route_attempts, 3);

        assert_eq!(config.rules.len(), 1);
        let rule = &config.rules[0];
        assert_eq!(rule.operator, Operator::GreaterOrEqual);
        assert_eq!(rule.action, RuleAction::Reject);

        assert_eq!(config.counterparties.len(), 1);
        let fidc = &config.counterparties[0];
        assert_eq!(fidc.daily_capacity, Some(dec!(100000)));
        assert_eq!(fidc.purchase_discount_percentage, dec!(10.5));
        assert_eq!(fidc.min_credit_score, None);

        assert_eq!(config.arrangements.len(), 1);
        assert_eq!(config.arrangements[0].route_by, RouteBy::Discount);
    }

    #[test]
    fn malformed_rules_are_rejected_at_load_time() {
        // between with a scalar value must not survive loading
        let bad = r#"
            [[rules]]
            id = "age-window"
            name = "age window"
            category = "eligibility"
            field = "borrower_age"
            operator = "between"
            value = 18
            priority = 1
            is_active = true

            [rules.action]
            type = "reject"
        "#;
        let err = parse_toml(bad).unwrap_err();
        assert!(matches!(
            err,
            crate::common::errors::EngineError::Configuration(_)
        ));
    }

    #[test]
    fn empty_configuration_is_valid() {
        let config = parse_toml("").unwrap();
        assert!(config.rules.is_empty());
        assert!(config.counterparties.is_empty());
        assert_eq!(config.settings.log_level, "info");
    }
}
