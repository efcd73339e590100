//! Standard registry tests.

use campaigner::capability::registry::DEFAULT_MAX_CALLS;
use campaigner::capability::{
    CapabilityDescriptor, CapabilityName, CapabilityRegistry, RegistryError,
};

fn standard() -> CapabilityRegistry {
    let result = CapabilityRegistry::standard();
    assert!(result.is_ok());
    match result {
        Ok(registry) => registry,
        Err(err) => panic!("standard registry should build: {err}"),
    }
}

#[test]
fn standard_registry_lists_five_capabilities_in_order() {
    let registry = standard();
    let names: Vec<&str> = registry
        .descriptors()
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    assert_eq!(names, vec!["data", "performance", "creative", "chart", "research"]);
}

#[test]
fn every_capability_is_limited_to_one_call() {
    let registry = standard();
    assert_eq!(DEFAULT_MAX_CALLS, 1);
    assert!(registry
        .descriptors()
        .iter()
        .all(|d| d.max_calls_per_request == 1));
}

#[test]
fn specialist_schemas_name_their_payload_key() {
    let registry = standard();
    for name in [
        CapabilityName::Performance,
        CapabilityName::Creative,
        CapabilityName::Research,
    ] {
        let descriptor = registry.get(name.as_str()).expect("registered");
        assert!(
            descriptor.output_schema["properties"]
                .get(name.payload_key())
                .is_some(),
            "{name} schema should declare {}",
            name.payload_key()
        );
    }
}

#[test]
fn unknown_lookup_fails() {
    let registry = standard();
    assert!(matches!(
        registry.get("forecast"),
        Err(RegistryError::UnknownCapability(name)) if name == "forecast"
    ));
}

#[test]
fn duplicate_registration_is_rejected() {
    let descriptor = CapabilityDescriptor::new(
        CapabilityName::Data,
        "data",
        serde_json::json!({}),
        serde_json::json!({}),
    );
    let builder = CapabilityRegistry::builder()
        .register(descriptor.clone())
        .expect("first registration");
    assert!(matches!(
        builder.register(descriptor),
        Err(RegistryError::DuplicateCapability(_))
    ));
}

#[test]
fn registry_serializes_for_listing() {
    let registry = standard();
    let json = serde_json::to_value(registry.descriptors()).expect("serialize");
    assert_eq!(json[0]["name"], "data");
    assert_eq!(json[3]["name"], "chart");
    assert_eq!(json[3]["max_calls_per_request"], 1);
}
