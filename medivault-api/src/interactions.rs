use axum::{extract::rejection::JsonRejection, extract::State, Json};
use medivault_core::{CoreError, InteractionRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckInteractionRequest {
    #[serde(default, alias = "new_medication")]
    pub new_med: Option<String>,
    /// Kept loose so a non-list value gets a precise error instead of a decode failure.
    #[serde(default, alias = "existing_medications")]
    pub current_meds: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct CheckInteractionResponse {
    pub ok: bool,
    pub new_med: String,
    pub current_meds: Vec<String>,
    pub interactions: Vec<InteractionRecord>,
}

fn medication_names(value: Option<Value>) -> Result<Vec<String>, AppError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()),
        Some(_) => Err(AppError::ValidationError(
            "current_meds (or existing_medications) must be a list".to_string(),
        )),
    }
}

/// POST /ai/check-interaction
/// Ask the interaction lookup about one new medication against the current list
pub async fn check_interaction(
    State(state): State<AppState>,
    payload: Result<Json<CheckInteractionRequest>, JsonRejection>,
) -> Result<Json<CheckInteractionResponse>, AppError> {
    let Json(req) = payload?;

    let new_med = req.new_med.as_deref().map(str::trim).unwrap_or_default().to_string();
    if new_med.is_empty() {
        return Err(AppError::ValidationError(
            "new_med (or new_medication) is required".to_string(),
        ));
    }
    let current_meds = medication_names(req.current_meds)?;

    // An unreachable provider is reported as an `unknown` finding, not as a failed call.
    let interactions = match state.lookup.check(&new_med, &current_meds).await {
        Ok(records) => records,
        Err(CoreError::LookupFailed(reason)) => {
            tracing::warn!("Interaction lookup for {} failed: {}", new_med, reason);
            vec![InteractionRecord::unknown(
                format!("Error accessing Knowledge Base: {}", reason),
                "KB service unavailable",
            )]
        }
        Err(e) => return Err(AppError::from_core(e)),
    };

    Ok(Json(CheckInteractionResponse {
        ok: true,
        new_med,
        current_meds,
        interactions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_both_field_spellings() {
        let req: CheckInteractionRequest = serde_json::from_value(json!({
            "new_medication": "Ibuprofen",
            "existing_medications": ["Warfarin"]
        }))
        .unwrap();
        assert_eq!(req.new_med.as_deref(), Some("Ibuprofen"));
        assert_eq!(medication_names(req.current_meds).unwrap(), vec!["Warfarin"]);
    }

    #[test]
    fn test_non_string_entries_are_stringified() {
        let names = medication_names(Some(json!(["Aspirin", 42]))).unwrap();
        assert_eq!(names, vec!["Aspirin".to_string(), "42".to_string()]);
    }

    #[test]
    fn test_scalar_meds_field_is_rejected() {
        assert!(medication_names(Some(json!("Warfarin"))).is_err());
    }
}
