use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use medivault_api::{app, AppState, Metrics};
use medivault_core::{CoreError, CoreResult, InteractionLookup, InteractionRecord, Severity};
use medivault_interactions::pair_key;
use medivault_store::app_config::CorsConfig;
use medivault_store::{FailurePoint, MemoryPrescriptionStore};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Answers from a fixed table keyed by canonical pair.
struct TableLookup {
    table: HashMap<String, Severity>,
    down: bool,
}

impl TableLookup {
    fn new(rows: &[(&str, &str, Severity)]) -> Self {
        Self {
            table: rows.iter().map(|(a, b, s)| (pair_key(a, b), *s)).collect(),
            down: false,
        }
    }

    fn down() -> Self {
        Self {
            table: HashMap::new(),
            down: true,
        }
    }
}

#[async_trait]
impl InteractionLookup for TableLookup {
    async fn check(&self, subject: &str, references: &[String]) -> CoreResult<Vec<InteractionRecord>> {
        if self.down {
            return Err(CoreError::LookupFailed("knowledge base timed out".to_string()));
        }
        Ok(references
            .iter()
            .map(|reference| {
                let severity = self
                    .table
                    .get(&pair_key(subject, reference))
                    .copied()
                    .unwrap_or(Severity::Unknown);
                InteractionRecord {
                    counterpart: Some(reference.clone()),
                    severity,
                    summary: format!("{} with {}", subject, reference),
                    description: String::new(),
                    action: "Consult healthcare provider".to_string(),
                    citations: Vec::new(),
                }
            })
            .collect())
    }
}

fn router(store: Arc<MemoryPrescriptionStore>, lookup: TableLookup) -> Router {
    let metrics = Arc::new(Metrics::new().unwrap());
    app(AppState::new(
        store,
        Arc::new(lookup),
        4,
        metrics,
        CorsConfig::default(),
    ))
}

fn warfarin_table() -> TableLookup {
    TableLookup::new(&[
        ("Warfarin", "Aspirin", Severity::High),
        ("Warfarin", "Ibuprofen", Severity::Medium),
        ("Ibuprofen", "Aspirin", Severity::Low),
    ])
}

async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

fn save_body(medications: Value) -> Value {
    json!({
        "patient_id": 1,
        "doctor_id": 1,
        "s3_image_url": "s3://medivault-uploads/rx/1.png",
        "entities": {
            "medications": medications,
            "conditions": ["Hypertension"],
            "allergies": [{"allergen": "Penicillin", "severity": "high"}]
        }
    })
}

#[tokio::test]
async fn test_save_single_medication() {
    let store = Arc::new(MemoryPrescriptionStore::new());
    let (status, body) = send(
        router(store.clone(), TableLookup::new(&[])),
        "POST",
        "/ai/save-prescription",
        Some(save_body(json!([{"name": "Aspirin", "dosage": "100mg", "frequency": "Once daily"}]))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["medicines_saved"], 1);
    assert_eq!(body["interactions"], json!([]));
    assert_eq!(body["fhir_bundle_saved"], true);
    assert_eq!(body["warnings"], json!([]));
    assert_eq!(store.prescription_count(), 1);
    assert_eq!(store.link_count(), 1);
}

#[tokio::test]
async fn test_save_reports_significant_interactions() {
    let store = Arc::new(MemoryPrescriptionStore::new());
    let (status, body) = send(
        router(store.clone(), warfarin_table()),
        "POST",
        "/ai/save-prescription",
        Some(save_body(json!([
            {"name": "Warfarin"},
            {"name": "Ibuprofen"},
            {"name": "Aspirin"}
        ]))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["medicines_saved"], 3);
    let interactions = body["interactions"].as_array().unwrap();
    assert_eq!(interactions.len(), 2);
    let severities: Vec<&str> = interactions
        .iter()
        .map(|i| i["severity"].as_str().unwrap())
        .collect();
    assert_eq!(severities, vec!["medium", "high"]);
    assert_eq!(store.link_count(), 3);
}

#[tokio::test]
async fn test_missing_patient_is_rejected_without_writes() {
    let store = Arc::new(MemoryPrescriptionStore::new());
    let mut body = save_body(json!([{"name": "Aspirin"}]));
    body.as_object_mut().unwrap().remove("patient_id");

    let (status, response) = send(
        router(store.clone(), TableLookup::new(&[])),
        "POST",
        "/ai/save-prescription",
        Some(body),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["ok"], false);
    assert_eq!(response["error"], "Missing required field: patient_id");
    assert_eq!(store.prescription_count(), 0);
    assert_eq!(store.medicine_count(), 0);
    assert_eq!(store.link_count(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let store = Arc::new(MemoryPrescriptionStore::new());
    let request = Request::builder()
        .method("POST")
        .uri("/ai/save-prescription")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = router(store.clone(), TableLookup::new(&[]))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.prescription_count(), 0);
}

#[tokio::test]
async fn test_storage_failure_returns_500_and_rolls_back() {
    let store = Arc::new(MemoryPrescriptionStore::new());
    store.inject_failure(FailurePoint::LinkInsert(2));

    let (status, body) = send(
        router(store.clone(), warfarin_table()),
        "POST",
        "/ai/save-prescription",
        Some(save_body(json!([
            {"name": "Warfarin"},
            {"name": "Ibuprofen"},
            {"name": "Aspirin"}
        ]))),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["ok"], false);
    assert_eq!(store.prescription_count(), 0);
    assert_eq!(store.medicine_count(), 0);
    assert_eq!(store.link_count(), 0);
}

#[tokio::test]
async fn test_enrichment_failures_become_warnings() {
    let store = Arc::new(MemoryPrescriptionStore::new());
    store.inject_failure(FailurePoint::BundleUpdate);

    let (status, body) = send(
        router(store.clone(), TableLookup::down()),
        "POST",
        "/ai/save-prescription",
        Some(save_body(json!([{"name": "Warfarin"}, {"name": "Aspirin"}]))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["fhir_bundle_saved"], false);
    let warnings = body["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0]
        .as_str()
        .unwrap()
        .starts_with("Interaction check failed for Aspirin + Warfarin"));
    assert!(warnings[1].as_str().unwrap().starts_with("Failed to save FHIR bundle"));
    assert_eq!(store.prescription_count(), 1);
    assert_eq!(store.link_count(), 2);
}

#[tokio::test]
async fn test_check_interaction() {
    let store = Arc::new(MemoryPrescriptionStore::new());
    let (status, body) = send(
        router(store, warfarin_table()),
        "POST",
        "/ai/check-interaction",
        Some(json!({"new_medication": " Aspirin ", "existing_medications": ["Warfarin"]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_med"], "Aspirin");
    assert_eq!(body["current_meds"], json!(["Warfarin"]));
    assert_eq!(body["interactions"][0]["severity"], "high");
}

#[tokio::test]
async fn test_check_interaction_validation() {
    let store = Arc::new(MemoryPrescriptionStore::new());

    let (status, body) = send(
        router(store.clone(), TableLookup::new(&[])),
        "POST",
        "/ai/check-interaction",
        Some(json!({"current_meds": ["Warfarin"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "new_med (or new_medication) is required");

    let (status, body) = send(
        router(store, TableLookup::new(&[])),
        "POST",
        "/ai/check-interaction",
        Some(json!({"new_med": "Aspirin", "current_meds": "Warfarin"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "current_meds (or existing_medications) must be a list");
}

#[tokio::test]
async fn test_check_interaction_upstream_failure_reports_unknown() {
    let store = Arc::new(MemoryPrescriptionStore::new());
    let (status, body) = send(
        router(store, TableLookup::down()),
        "POST",
        "/ai/check-interaction",
        Some(json!({"new_med": "Aspirin", "current_meds": ["Warfarin"]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    let interactions = body["interactions"].as_array().unwrap();
    assert_eq!(interactions.len(), 1);
    assert_eq!(interactions[0]["severity"], "unknown");
    assert_eq!(
        interactions[0]["summary"],
        "Error accessing Knowledge Base: knowledge base timed out"
    );
    assert_eq!(interactions[0]["action"], "Consult healthcare provider");
}

#[tokio::test]
async fn test_emergency_summary() {
    let store = Arc::new(MemoryPrescriptionStore::new());
    let (status, body) = send(
        router(store, TableLookup::new(&[])),
        "POST",
        "/ai/emergency-summary",
        Some(json!({
            "patient_id": "p-42",
            "vault_entities": {
                "allergies": [{"name": "Sulfa", "severity": "high"}],
                "medications": [{"name": "Metformin", "dosage": "500mg"}]
            }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["emergency_bundle"]["key_risks"], json!(["Allergic to Sulfa"]));
    assert_eq!(body["emergency_bundle"]["current_meds"][0]["dosage"], "500mg");
    assert_eq!(
        body["short_text"],
        "Patient ID: p-42. Allergies: Sulfa. Current medications: Metformin."
    );
}

#[tokio::test]
async fn test_health_reflects_store() {
    let store = Arc::new(MemoryPrescriptionStore::new());
    let (status, body) = send(router(store.clone(), TableLookup::new(&[])), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": true}));

    store.inject_failure(FailurePoint::Connect);
    let (status, body) = send(router(store, TableLookup::new(&[])), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_metrics_count_saves_and_rejections() {
    let store = Arc::new(MemoryPrescriptionStore::new());
    let router = router(store, TableLookup::new(&[]));

    send(
        router.clone(),
        "POST",
        "/ai/save-prescription",
        Some(save_body(json!([{"name": "Aspirin"}]))),
    )
    .await;
    send(router.clone(), "POST", "/ai/save-prescription", Some(json!({"doctor_id": 1}))).await;

    let (status, body) = send(router, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("medivault_prescriptions_saved_total 1"));
    assert!(text.contains(r#"medivault_save_rejections_total{reason="validation"} 1"#));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let store = Arc::new(MemoryPrescriptionStore::new());
    let (status, body) = send(router(store, TableLookup::new(&[])), "GET", "/ai/nope", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"ok": false, "error": "Endpoint not found"}));
}
