//! Common test utilities and fixtures

use credit_decision_engine::{
    parse_toml, Counterparty, EngineConfig, Proposal,
};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

/// A full configuration as the dashboard would persist it: knockout rules,
/// three counterparties with different windows and capacities, and a scoped
/// arrangement.
pub static STANDARD_CONFIG: Lazy<EngineConfig> = Lazy::new(|| {
    parse_toml(
        r#"
        [settings]
        reserve_timeout_ms = 1000
        max_route_attempts = 3

        [[rules]]
        id = "age-window"
        name = "borrower age window"
        category = "eligibility"
        field = "borrower_age"
        operator = "between"
        value = [18, 70]
        priority = 1
        is_active = true

        [rules.action]
        type = "reject"

        [[rules]]
        id = "score-floor"
        name = "minimum credit score"
        category = "scoring"
        field = "borrower_credit_score"
        operator = "greater_or_equal"
        value = 400
        priority = 2
        is_active = true

        [rules.action]
        type = "reject"

        [[rules]]
        id = "large-amount-flag"
        name = "large operation flag"
        category = "anti_fraud"
        field = "requested_amount"
        operator = "greater_than"
        value = 30000
        priority = 10
        is_active = true

        [rules.action]
        type = "flag"
        label = "large_operation"

        [[counterparties]]
        id = "fidc-a"
        fidc_name = "FIDC Alpha"
        is_active = true
        accepts_new_operations = true
        min_borrower_age = 18
        max_borrower_age = 70
        min_operation_amount = 100
        max_operation_amount = 50000
        priority = 1
        daily_capacity = 1000
        purchase_discount_percentage = 10

        [[counterparties]]
        id = "fidc-b"
        fidc_name = "FIDC Beta"
        is_active = true
        accepts_new_operations = true
        min_borrower_age = 18
        max_borrower_age = 70
        min_operation_amount = 100
        max_operation_amount = 50000
        priority = 2
        daily_capacity = 1000
        purchase_discount_percentage = 15

        [[counterparties]]
        id = "fidc-c"
        fidc_name = "FIDC Gamma"
        is_active = true
        accepts_new_operations = true
        min_borrower_age = 25
        max_borrower_age = 60
        min_credit_score = 700
        priority = 3
        purchase_discount_percentage = 12

        [[arrangements]]
        id = "arr-discount"
        rule_name = "route by discount"
        is_active = true
        route_by = "discount"
        priority = 1
        "#,
    )
    .expect("standard test configuration must validate")
});

/// Create a sample proposal for testing
pub fn sample_proposal(id: &str, age: i64, amount: Decimal) -> Proposal {
    Proposal::from_value(json!({
        "id": id,
        "borrower_age": age,
        "requested_amount": amount,
        "borrower_credit_score": 650,
        "convenio_id": "gov-sp",
        "channel": "mobile"
    }))
    .expect("sample proposal payload is well-formed")
}

/// A counterparty profile built in code, for tests that tweak single fields
pub fn sample_counterparty(id: &str, priority: i32) -> Counterparty {
    Counterparty {
        id: id.into(),
        fidc_name: format!("FIDC {}", id.to_uppercase()),
        is_active: true,
        accepts_new_operations: true,
        min_borrower_age: Some(dec!(18)),
        max_borrower_age: Some(dec!(70)),
        min_operation_amount: Some(dec!(100)),
        max_operation_amount: Some(dec!(50000)),
        min_credit_score: None,
        priority,
        daily_capacity: Some(dec!(1000)),
        purchase_discount_percentage: dec!(10),
    }
}
