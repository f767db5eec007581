//! Keyword rules that turn a retrieved evidence passage into a structured finding.

use medivault_core::Severity;

const HIGH_MARKERS: &[&str] = &["contraindicated", "fatal", "severe", "critical", "life-threaten"];
const MEDIUM_MARKERS: &[&str] = &["caution", "monitor", "moderate", "significant"];
const LOW_MARKERS: &[&str] = &["minor", "mild", "low"];

const SUMMARY_MAX_CHARS: usize = 200;

pub fn infer_severity(text: &str) -> Severity {
    let lower = text.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if contains_any(HIGH_MARKERS) {
        Severity::High
    } else if contains_any(MEDIUM_MARKERS) {
        Severity::Medium
    } else if contains_any(LOW_MARKERS) {
        Severity::Low
    } else {
        Severity::Unknown
    }
}

/// First sentence of the passage, capped at 200 characters.
pub fn extract_summary(text: &str) -> String {
    let sentence = text.split('.').next().unwrap_or_default().trim();
    if sentence.chars().count() > SUMMARY_MAX_CHARS {
        let mut summary = truncate_chars(sentence, SUMMARY_MAX_CHARS);
        summary.push_str("...");
        summary
    } else {
        sentence.to_string()
    }
}

pub fn extract_action(text: &str) -> String {
    let lower = text.to_lowercase();
    let action = if lower.contains("avoid") || lower.contains("contraindicated") {
        "Do not use together"
    } else if lower.contains("monitor") {
        "Use with caution; monitor patient closely"
    } else if lower.contains("dose") || lower.contains("adjust") {
        "Dosage adjustment may be needed"
    } else {
        "Consult healthcare provider"
    };
    action.to_string()
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
