use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// What the model believes the photographed subject is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    Crop,
    Livestock,
    Fruit,
    Multiple,
    Unclear,
}

impl SubjectType {
    /// Coercing parser: anything outside the closed set reads as `Unclear`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "crop" => Self::Crop,
            "livestock" => Self::Livestock,
            "fruit" => Self::Fruit,
            "multiple" => Self::Multiple,
            _ => Self::Unclear,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crop => "crop",
            Self::Livestock => "livestock",
            Self::Fruit => "fruit",
            Self::Multiple => "multiple",
            Self::Unclear => "unclear",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Moderate,
    High,
}

impl ConfidenceLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "moderate" => Self::Moderate,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }

    pub fn label_key(&self) -> &'static str {
        match self {
            Self::Low => "diagnosis.confidence.low",
            Self::Moderate => "diagnosis.confidence.moderate",
            Self::High => "diagnosis.confidence.high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
    Critical,
}

impl Severity {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "moderate" => Self::Moderate,
            "severe" => Self::Severe,
            "critical" => Self::Critical,
            _ => Self::Mild,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
            Self::Critical => "critical",
        }
    }

    pub fn label_key(&self) -> &'static str {
        match self {
            Self::Mild => "diagnosis.severity.mild",
            Self::Moderate => "diagnosis.severity.moderate",
            Self::Severe => "diagnosis.severity.severe",
            Self::Critical => "diagnosis.severity.critical",
        }
    }
}

/// The analysis payload as the gateway returns it, before the client attaches
/// its own metadata. Field names on the wire are camelCase.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub subject_type: SubjectType,
    pub species: String,
    pub symptoms: Vec<String>,
    pub disease_name: String,
    pub alternatives: Vec<String>,
    pub confidence_level: ConfidenceLevel,
    pub confidence_percent: f64,
    pub causes: Vec<String>,
    pub severity: Severity,
    pub severity_reason: String,
    pub treatments: Vec<String>,
    pub prevention: Vec<String>,
    pub urgency_advice: String,
    pub needs_professional: bool,
    pub farmer_summary: String,
}

impl AnalysisReport {
    /// Coercing reader for model output. The proxy passes the gateway's JSON
    /// through untouched, so this is where shape drift gets absorbed: unknown
    /// enum strings fall back to a declared variant, the percent clamps into
    /// [0, 100], missing lists become empty.
    pub fn from_value(value: &Value) -> Self {
        let obj = value.as_object().cloned().unwrap_or_default();
        Self {
            subject_type: SubjectType::parse(&text(&obj, "subjectType")),
            species: text(&obj, "species"),
            symptoms: items(&obj, "symptoms"),
            disease_name: text(&obj, "diseaseName"),
            alternatives: items(&obj, "alternatives"),
            confidence_level: ConfidenceLevel::parse(&text(&obj, "confidenceLevel")),
            confidence_percent: percent(&obj, "confidencePercent"),
            causes: items(&obj, "causes"),
            severity: Severity::parse(&text(&obj, "severity")),
            severity_reason: text(&obj, "severityReason"),
            treatments: items(&obj, "treatments"),
            prevention: items(&obj, "prevention"),
            urgency_advice: text(&obj, "urgencyAdvice"),
            needs_professional: obj
                .get("needsProfessional")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            farmer_summary: text(&obj, "farmerSummary"),
        }
    }
}

/// One completed diagnosis: the gateway's report plus the client-generated
/// id, capture timestamp, and local image reference. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    pub id: String,
    pub timestamp: String,
    pub image_url: String,
    #[serde(flatten)]
    pub report: AnalysisReport,
}

impl DiagnosisResult {
    pub fn assemble(payload: &Value, image_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: now_utc_iso(),
            image_url: image_url.into(),
            report: AnalysisReport::from_value(payload),
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let obj = value.as_object().cloned().unwrap_or_default();
        Self {
            id: text(&obj, "id"),
            timestamp: text(&obj, "timestamp"),
            image_url: text(&obj, "imageUrl"),
            report: AnalysisReport::from_value(value),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn text(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn items(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn percent(obj: &Map<String, Value>, key: &str) -> f64 {
    obj.get(key)
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::json;

    use super::{AnalysisReport, ConfidenceLevel, DiagnosisResult, Severity, SubjectType};

    fn sample_payload() -> serde_json::Value {
        json!({
            "subjectType": "crop",
            "species": "Maize",
            "symptoms": ["Brown leaf spots", "Wilting lower leaves"],
            "diseaseName": "Northern Leaf Blight",
            "alternatives": ["Gray Leaf Spot"],
            "confidenceLevel": "high",
            "confidencePercent": 88,
            "causes": ["Fungal infection"],
            "severity": "severe",
            "severityReason": "Lesions cover most of the canopy.",
            "treatments": ["Apply a protectant fungicide"],
            "prevention": ["Rotate crops", "Plant resistant varieties"],
            "urgencyAdvice": "Treat within the week.",
            "needsProfessional": true,
            "farmerSummary": "Your maize has a fungal leaf disease."
        })
    }

    #[test]
    fn report_reads_every_field() {
        let report = AnalysisReport::from_value(&sample_payload());
        assert_eq!(report.subject_type, SubjectType::Crop);
        assert_eq!(report.species, "Maize");
        assert_eq!(report.symptoms.len(), 2);
        assert_eq!(report.disease_name, "Northern Leaf Blight");
        assert_eq!(report.confidence_level, ConfidenceLevel::High);
        assert_eq!(report.confidence_percent, 88.0);
        assert_eq!(report.severity, Severity::Severe);
        assert!(report.needs_professional);
        assert_eq!(report.prevention.len(), 2);
    }

    #[test]
    fn unknown_enum_strings_coerce_to_fallbacks() {
        let payload = json!({
            "subjectType": "spaceship",
            "confidenceLevel": "certain",
            "severity": "apocalyptic",
        });
        let report = AnalysisReport::from_value(&payload);
        assert_eq!(report.subject_type, SubjectType::Unclear);
        assert_eq!(report.confidence_level, ConfidenceLevel::Low);
        assert_eq!(report.severity, Severity::Mild);
    }

    #[test]
    fn missing_fields_read_as_empty_defaults() {
        let report = AnalysisReport::from_value(&json!({}));
        assert_eq!(report.species, "");
        assert!(report.symptoms.is_empty());
        assert!(report.treatments.is_empty());
        assert_eq!(report.confidence_percent, 0.0);
        assert!(!report.needs_professional);
    }

    #[test]
    fn confidence_percent_clamps_into_range() {
        let high = AnalysisReport::from_value(&json!({"confidencePercent": 180}));
        assert_eq!(high.confidence_percent, 100.0);
        let low = AnalysisReport::from_value(&json!({"confidencePercent": -3}));
        assert_eq!(low.confidence_percent, 0.0);
    }

    #[test]
    fn assemble_attaches_fresh_metadata() -> anyhow::Result<()> {
        let result = DiagnosisResult::assemble(&sample_payload(), "images/abc123.png");
        assert_eq!(result.id.len(), 36);
        assert_eq!(result.image_url, "images/abc123.png");
        DateTime::parse_from_rfc3339(&result.timestamp)?;
        assert_eq!(result.report.disease_name, "Northern Leaf Blight");
        Ok(())
    }

    #[test]
    fn wire_names_are_camel_case() {
        let result = DiagnosisResult::assemble(&sample_payload(), "ref");
        let value = result.to_value();
        assert!(value.get("imageUrl").is_some());
        assert!(value.get("subjectType").is_some());
        assert!(value.get("diseaseName").is_some());
        assert!(value.get("needsProfessional").is_some());
        assert_eq!(value["severity"], json!("severe"));
        assert_eq!(value["confidenceLevel"], json!("high"));
    }

    #[test]
    fn value_roundtrip_preserves_the_record() {
        let original = DiagnosisResult::assemble(&sample_payload(), "ref");
        let reloaded = DiagnosisResult::from_value(&original.to_value());
        assert_eq!(reloaded, original);
    }
}
