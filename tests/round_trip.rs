//! Round-trip consistency through the live validator.

use serde_json::{json, Value};

use live_validator::live::RequestResponsePair;
use live_validator::validation::IssueCode;
use live_validator::LiveValidator;

mod common;
use common::{widget_put_pair, Corpus};

fn pair(response_body: Value) -> RequestResponsePair {
    let mut pair = widget_put_pair(200, json!({"Content-Type": "application/json"}), response_body);
    pair["liveRequest"]["body"] = json!({
        "location": "westus",
        "properties": {"state": "A", "size": 3}
    });
    serde_json::from_value(pair).unwrap()
}

async fn validator(enabled: bool) -> LiveValidator {
    let corpus = Corpus::with_compute_spec();
    let mut config = corpus.config();
    config.round_trip.enabled = enabled;
    let mut validator = LiveValidator::new(config);
    validator.initialize().await;
    validator
}

#[tokio::test]
async fn test_disabled_round_trip_is_runtime_exception() {
    let validator = validator(false).await;
    let result = validator
        .validate_round_trip(&pair(json!({"location": "westus"})))
        .await;
    assert_eq!(result.is_successful(), None);
    assert_eq!(
        result.runtime_exception().map(|e| e.code.as_str()),
        Some("ROUNDTRIP_VALIDATION_ERROR")
    );
}

#[tokio::test]
async fn test_documented_changes_pass() {
    let validator = validator(true).await;
    let result = validator
        .validate_round_trip(&pair(json!({
            "id": "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Compute/widgets/w1",
            "location": "westus",
            "properties": {"state": "B", "size": 3, "provisioningState": "Succeeded"}
        })))
        .await;
    assert_eq!(result.is_successful(), Some(true));
    assert_eq!(result.operation_info.operation_id, "Widgets_CreateOrUpdate");
}

#[tokio::test]
async fn test_undocumented_changes_are_reported() {
    let validator = validator(true).await;
    let result = validator
        .validate_round_trip(&pair(json!({
            "location": "westus",
            "properties": {"state": "A", "size": 4, "color": "red"}
        })))
        .await;

    let mut found: Vec<_> = result
        .issues()
        .iter()
        .map(|i| (i.code, i.paths_in_payload[0].clone()))
        .collect();
    found.sort_by(|a, b| a.1.cmp(&b.1));
    assert_eq!(
        found,
        vec![
            (IssueCode::RoundtripAdditionalProperty, "/properties/color".to_string()),
            (IssueCode::RoundtripInconsistentProperty, "/properties/size".to_string()),
        ]
    );
    assert!(result.issues()[0].source.url.ends_with("compute.json"));
}

#[tokio::test]
async fn test_missing_property_is_reported() {
    let validator = validator(true).await;
    let result = validator
        .validate_round_trip(&pair(json!({"properties": {"state": "A", "size": 3}})))
        .await;
    let codes: Vec<_> = result.issues().iter().map(|i| i.code).collect();
    assert_eq!(codes, vec![IssueCode::RoundtripMissingProperty]);
    assert_eq!(result.issues()[0].json_paths_in_payload, vec!["$.location"]);
}
