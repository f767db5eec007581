//! Simplified terminology tables. Lookups are case-insensitive.

pub const SNOMED_SYSTEM: &str = "http://snomed.info/sct";
pub const RXNORM_SYSTEM: &str = "http://www.nlm.nih.gov/research/umls/rxnorm";
pub const LOINC_SYSTEM: &str = "http://loinc.org";

/// SNOMED CT code for "oral route", used when the route is not recognised.
pub const ORAL_ROUTE_CODE: &str = "26643006";

/// RxNorm placeholder meaning "no code known".
pub const UNKNOWN_RXNORM_CODE: &str = "0";

pub fn route_code(route: &str) -> &'static str {
    match route.trim().to_lowercase().as_str() {
        "oral" => ORAL_ROUTE_CODE,
        "intravenous" => "47625008",
        "intramuscular" => "78421000",
        "subcutaneous" => "34206005",
        "topical" | "transdermal" => "404820008",
        "inhalation" => "447694001",
        "sublingual" => "37839007",
        _ => ORAL_ROUTE_CODE,
    }
}

pub fn rxnorm_code(substance: &str) -> &'static str {
    match substance.trim().to_lowercase().as_str() {
        "ibuprofen" => "5640",
        "aspirin" => "5271",
        "paracetamol" | "acetaminophen" => "1649",
        "metformin" => "6809",
        "lisinopril" => "21600",
        "atorvastatin" => "83367",
        _ => UNKNOWN_RXNORM_CODE,
    }
}
