use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

/// Save workflow counters, registered on a private registry.
pub struct Metrics {
    registry: Registry,
    prescriptions_saved: IntCounter,
    save_rejections: IntCounterVec,
    enrichment_warnings: IntCounter,
    pairs_checked: IntCounter,
}

impl Metrics {
    /// # Errors
    ///
    /// Returns an error when Prometheus rejects metric registration.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let prescriptions_saved = IntCounter::new(
            "medivault_prescriptions_saved_total",
            "Prescriptions persisted",
        )?;
        let save_rejections = IntCounterVec::new(
            Opts::new(
                "medivault_save_rejections_total",
                "Save calls that failed before or during persistence",
            ),
            &["reason"],
        )?;
        let enrichment_warnings = IntCounter::new(
            "medivault_enrichment_warnings_total",
            "Non-fatal enrichment problems attached to successful saves",
        )?;
        let pairs_checked = IntCounter::new(
            "medivault_interaction_pairs_checked_total",
            "Medication pairs sent to the interaction lookup",
        )?;

        registry.register(Box::new(prescriptions_saved.clone()))?;
        registry.register(Box::new(save_rejections.clone()))?;
        registry.register(Box::new(enrichment_warnings.clone()))?;
        registry.register(Box::new(pairs_checked.clone()))?;

        Ok(Self {
            registry,
            prescriptions_saved,
            save_rejections,
            enrichment_warnings,
            pairs_checked,
        })
    }

    pub fn record_saved(&self, warnings: usize, pairs: usize) {
        self.prescriptions_saved.inc();
        self.enrichment_warnings.inc_by(warnings as u64);
        self.pairs_checked.inc_by(pairs as u64);
    }

    pub fn record_rejection(&self, reason: &str) {
        self.save_rejections.with_label_values(&[reason]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
