//! Property-based coverage for the pure parts of the client: backoff delay
//! growth and variable mapping.

use external_task_client::variables::{
    DefaultVariableMapper, TypedValue, VariableMapper, VariableValue,
};
use proptest::prelude::*;
use serde_json::json;

/// Reimplements the backoff schedule closed-form to compare against the
/// observable contract: capped exponential growth from the initial interval.
fn expected_delay_ms(init_ms: u64, factor: f64, max_ms: u64, level: u32) -> u64 {
    let raw = init_ms as f64 * factor.powi(level as i32);
    raw.min(max_ms as f64) as u64
}

proptest! {
    /// Property: backoff delays never shrink as the level grows and never
    /// exceed the cap.
    #[test]
    fn backoff_delays_are_nondecreasing_and_capped(
        init_ms in 1u64..5_000,
        level in 0u32..20,
        max_ms in 5_000u64..120_000,
    ) {
        let current = expected_delay_ms(init_ms, 2.0, max_ms, level);
        let next = expected_delay_ms(init_ms, 2.0, max_ms, level + 1);
        prop_assert!(next >= current);
        prop_assert!(current <= max_ms);
        prop_assert!(current >= init_ms.min(max_ms));
    }

    /// Property: every string survives the wire round trip unchanged.
    #[test]
    fn string_variables_round_trip(value in ".*") {
        let mapper = DefaultVariableMapper;
        let typed = TypedValue::String(value.clone());
        let wire = mapper.to_wire(&typed);
        prop_assert_eq!(wire.type_name.as_str(), "String");
        prop_assert_eq!(mapper.from_wire("v", &wire).unwrap(), typed);
    }

    /// Property: every i64 survives the wire round trip unchanged.
    #[test]
    fn integer_variables_round_trip(value in any::<i64>()) {
        let mapper = DefaultVariableMapper;
        let wire = mapper.to_wire(&TypedValue::Integer(value));
        prop_assert_eq!(mapper.from_wire("v", &wire).unwrap(), TypedValue::Integer(value));
    }

    /// Property: booleans survive the wire round trip unchanged.
    #[test]
    fn boolean_variables_round_trip(value in any::<bool>()) {
        let mapper = DefaultVariableMapper;
        let wire = mapper.to_wire(&TypedValue::Boolean(value));
        prop_assert_eq!(mapper.from_wire("v", &wire).unwrap(), TypedValue::Boolean(value));
    }

    /// Property: unsupported type names always fail, and the error carries
    /// the variable's name.
    #[test]
    fn unknown_type_names_are_rejected(type_name in "[A-Z][a-z]{2,10}") {
        prop_assume!(!matches!(
            type_name.as_str(),
            "Null" | "Boolean" | "Integer" | "Long" | "Short" | "Double" | "String" | "Date" | "Json"
        ));
        let mapper = DefaultVariableMapper;
        let result = mapper.from_wire("payload", &VariableValue::new(type_name, json!(1)));
        prop_assert!(result.is_err());
        prop_assert!(result.unwrap_err().to_string().contains("payload"));
    }
}
