pub mod prescription;
pub mod interaction;
pub mod repository;

pub use interaction::{Citation, InteractionLookup, InteractionRecord, Severity};
pub use prescription::{MedicationLine, PrescriptionHeader, StoredPrescription, AI_SOURCE};
pub use repository::PrescriptionStore;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Bundle build failed at `{field}`: {reason}")]
    BundleBuildFailed { field: String, reason: String },
    #[error("Interaction lookup failed: {0}")]
    LookupFailed(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl CoreError {
    pub fn bundle(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BundleBuildFailed {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
