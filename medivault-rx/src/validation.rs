use medivault_core::{CoreError, CoreResult, MedicationLine};
use serde_json::Value;

use crate::models::{MedicationInput, SavePrescriptionRequest};

/// A request that passed validation. Nothing has touched storage yet.
#[derive(Debug, Clone)]
pub struct ValidatedSave {
    pub patient_id: i64,
    pub prescriber_id: i64,
    pub source_image_ref: String,
    pub lines: Vec<MedicationLine>,
    pub conditions: Vec<Value>,
    pub allergies: Vec<Value>,
}

fn missing(field: &str) -> CoreError {
    CoreError::ValidationFailed(format!("Missing required field: {}", field))
}

fn positive_id(value: Option<i64>, field: &str) -> CoreResult<i64> {
    match value {
        None => Err(missing(field)),
        Some(id) if id <= 0 => Err(CoreError::ValidationFailed(format!(
            "{} must be a positive integer",
            field
        ))),
        Some(id) => Ok(id),
    }
}

fn to_line(index: usize, med: MedicationInput) -> CoreResult<MedicationLine> {
    let name = med.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(CoreError::ValidationFailed(format!(
            "entities.medications[{}].name is required",
            index
        )));
    }

    Ok(MedicationLine {
        name: name.to_string(),
        dosage: med.dosage.unwrap_or_default(),
        frequency: med.frequency.unwrap_or_default(),
        duration: med.duration.unwrap_or_default(),
        route: med.route,
        notes: med.notes,
    })
}

/// Check required fields and normalise medication lines.
///
/// An empty medication list is accepted; conditions and allergies are optional.
pub fn validate(request: SavePrescriptionRequest) -> CoreResult<ValidatedSave> {
    let patient_id = positive_id(request.patient_id, "patient_id")?;
    let prescriber_id = positive_id(request.prescriber_id, "doctor_id")?;
    let source_image_ref = request.source_image_ref.ok_or_else(|| missing("s3_image_url"))?;
    let entities = request.entities.ok_or_else(|| missing("entities"))?;

    let lines = entities
        .medications
        .into_iter()
        .enumerate()
        .map(|(i, med)| to_line(i, med))
        .collect::<CoreResult<Vec<_>>>()?;

    Ok(ValidatedSave {
        patient_id,
        prescriber_id,
        source_image_ref,
        lines,
        conditions: entities.conditions,
        allergies: entities.allergies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntitiesInput;

    fn request() -> SavePrescriptionRequest {
        SavePrescriptionRequest {
            patient_id: Some(1),
            prescriber_id: Some(1),
            source_image_ref: Some("s3://bucket/rx.png".to_string()),
            entities: Some(EntitiesInput {
                medications: vec![MedicationInput::named("  Aspirin ")],
                ..EntitiesInput::default()
            }),
        }
    }

    fn message(err: CoreError) -> String {
        match err {
            CoreError::ValidationFailed(msg) => msg,
            other => panic!("expected a validation error, got {other}"),
        }
    }

    #[test]
    fn test_valid_request_normalises_lines() {
        let validated = validate(request()).unwrap();
        assert_eq!(validated.lines, vec![MedicationLine::new("Aspirin")]);
        assert_eq!(validated.lines[0].dosage, "");
    }

    #[test]
    fn test_missing_patient_id() {
        let mut req = request();
        req.patient_id = None;
        assert_eq!(message(validate(req).unwrap_err()), "Missing required field: patient_id");
    }

    #[test]
    fn test_non_positive_prescriber_id() {
        let mut req = request();
        req.prescriber_id = Some(0);
        assert_eq!(
            message(validate(req).unwrap_err()),
            "doctor_id must be a positive integer"
        );
    }

    #[test]
    fn test_missing_entities_and_image() {
        let mut req = request();
        req.source_image_ref = None;
        assert_eq!(message(validate(req).unwrap_err()), "Missing required field: s3_image_url");

        let mut req = request();
        req.entities = None;
        assert_eq!(message(validate(req).unwrap_err()), "Missing required field: entities");
    }

    #[test]
    fn test_blank_medication_name() {
        let mut req = request();
        req.entities = Some(EntitiesInput {
            medications: vec![MedicationInput::named("Aspirin"), MedicationInput::named("   ")],
            ..EntitiesInput::default()
        });
        assert_eq!(
            message(validate(req).unwrap_err()),
            "entities.medications[1].name is required"
        );
    }

    #[test]
    fn test_empty_medication_list_is_allowed() {
        let mut req = request();
        req.entities = Some(EntitiesInput::default());
        assert!(validate(req).unwrap().lines.is_empty());
    }
}
