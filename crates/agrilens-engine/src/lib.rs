use std::collections::BTreeMap;
use std::env;

use agrilens_contracts::diagnosis::{
    AnalysisReport, ConfidenceLevel, Severity, SubjectType,
};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

const DEFAULT_API_BASE: &str = "https://ai.gateway.lovable.dev/v1";
const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

pub const SYSTEM_PROMPT: &str = r#"You are an advanced Agricultural AI Assistant specializing in crop health, plant pathology, livestock health, and farm management.

Analyze the uploaded image and return a JSON object with exactly these fields (no markdown, no extra text, just valid JSON):

{
  "subjectType": "crop" | "livestock" | "fruit" | "multiple" | "unclear",
  "species": "string - specific species or type identified",
  "symptoms": ["array of visible symptoms described clearly"],
  "diseaseName": "most likely disease or condition name",
  "alternatives": ["1-3 alternative possible conditions"],
  "confidenceLevel": "low" | "moderate" | "high",
  "confidencePercent": number between 0 and 100,
  "causes": ["possible causes like fungal infection, pest damage, nutrient deficiency etc"],
  "severity": "mild" | "moderate" | "severe" | "critical",
  "severityReason": "brief explanation of severity classification",
  "treatments": ["practical, affordable treatment steps suitable for small-scale farmers"],
  "prevention": ["long-term prevention tips"],
  "urgencyAdvice": "clear advice on whether professional help is needed",
  "needsProfessional": boolean,
  "farmerSummary": "simple, jargon-free 2-3 sentence summary a farmer with basic education can understand"
}

Important guidelines:
- Keep language simple and practical
- Recommend affordable solutions suitable for rural farming environments
- If the image is unclear or not agricultural, still return valid JSON with subjectType "unclear" and appropriate messaging
- Be honest about confidence levels
- Always encourage consulting a professional for serious conditions"#;

const USER_INSTRUCTION: &str = "Please analyze this agricultural image and provide a complete diagnosis following your instructions. Return only valid JSON.";

/// Normalized analyze request: the base64 payload plus an optional MIME type
/// that defaults to JPEG on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeRequest {
    pub image_base64: String,
    pub mime_type: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(image_base64: impl Into<String>, mime_type: Option<String>) -> Self {
        Self {
            image_base64: image_base64.into(),
            mime_type,
        }
    }

    pub fn from_body(body: &Value) -> Result<Self, GatewayFailure> {
        let image = body
            .get("image")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(GatewayFailure::MissingImage)?;
        let mime_type = body
            .get("mimeType")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Self::new(image, mime_type))
    }

    pub fn to_body(&self) -> Value {
        json!({
            "image": self.image_base64,
            "mimeType": self.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE),
        })
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.image_base64)
    }
}

/// Everything that can go wrong between receiving an analyze request and
/// handing back a diagnosis object, each class carrying its HTTP mapping and
/// user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayFailure {
    MissingImage,
    RateLimited,
    QuotaExceeded,
    MissingApiKey,
    Upstream { status: u16, detail: String },
    EmptyContent,
    Parse(String),
    Transport(String),
}

impl GatewayFailure {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingImage => 400,
            Self::RateLimited => 429,
            Self::QuotaExceeded => 402,
            _ => 500,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::MissingImage => "No image provided".to_string(),
            Self::RateLimited => {
                "AI service is busy. Please try again in a moment.".to_string()
            }
            Self::QuotaExceeded => {
                "AI usage limit reached. Please try again later.".to_string()
            }
            Self::MissingApiKey => "AGRILENS_API_KEY is not configured".to_string(),
            Self::Upstream { status, .. } => format!("AI gateway returned {status}"),
            Self::EmptyContent => "No content in AI response".to_string(),
            Self::Parse(_) => "Failed to parse diagnosis result".to_string(),
            Self::Transport(message) => message.clone(),
        }
    }
}

impl std::fmt::Display for GatewayFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upstream { status, detail } if !detail.is_empty() => {
                write!(f, "AI gateway returned {status}: {detail}")
            }
            Self::Parse(detail) if !detail.is_empty() => {
                write!(f, "failed to parse diagnosis result: {detail}")
            }
            other => write!(f, "{}", other.user_message()),
        }
    }
}

impl std::error::Error for GatewayFailure {}

pub trait DiagnosisProvider: Send + Sync {
    fn name(&self) -> &str;
    fn analyze(&self, request: &AnalyzeRequest) -> Result<Value, GatewayFailure>;
}

#[derive(Default)]
pub struct DiagnosisProviderRegistry {
    providers: BTreeMap<String, Box<dyn DiagnosisProvider>>,
}

impl DiagnosisProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: DiagnosisProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Box::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<&dyn DiagnosisProvider> {
        self.providers.get(name).map(|provider| provider.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub fn default_provider_registry() -> DiagnosisProviderRegistry {
    let mut registry = DiagnosisProviderRegistry::new();
    registry.register(DryrunProvider);
    registry.register(GatewayProvider::new());
    registry
}

/// Live provider: one chat-completion round trip to an OpenAI-compatible
/// gateway, image attached as a data URL.
pub struct GatewayProvider {
    api_base: String,
    model: String,
    http: HttpClient,
}

impl GatewayProvider {
    pub fn new() -> Self {
        Self {
            api_base: env::var("AGRILENS_API_BASE")
                .ok()
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: non_empty_env("AGRILENS_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            http: HttpClient::new(),
        }
    }

    fn api_key() -> Option<String> {
        non_empty_env("AGRILENS_API_KEY").or_else(|| non_empty_env("GATEWAY_API_KEY"))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

impl Default for GatewayProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosisProvider for GatewayProvider {
    fn name(&self) -> &str {
        "gateway"
    }

    fn analyze(&self, request: &AnalyzeRequest) -> Result<Value, GatewayFailure> {
        let Some(api_key) = Self::api_key() else {
            return Err(GatewayFailure::MissingApiKey);
        };

        let payload = build_gateway_payload(&self.model, request);
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .map_err(|err| GatewayFailure::Transport(format!("gateway request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                429 => GatewayFailure::RateLimited,
                402 => GatewayFailure::QuotaExceeded,
                code => GatewayFailure::Upstream {
                    status: code,
                    detail: truncate_text(&response.text().unwrap_or_default(), 512),
                },
            });
        }

        let body: Value = response.json().map_err(|err| {
            GatewayFailure::Transport(format!("gateway returned invalid JSON: {err}"))
        })?;
        parse_gateway_response(&body)
    }
}

pub fn build_gateway_payload(model: &str, request: &AnalyzeRequest) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            {
                "role": "user",
                "content": [
                    {
                        "type": "image_url",
                        "image_url": { "url": request.data_url() },
                    },
                    { "type": "text", "text": USER_INSTRUCTION },
                ],
            },
        ],
    })
}

/// Pull the diagnosis object out of a chat-completion response body.
pub fn parse_gateway_response(body: &Value) -> Result<Value, GatewayFailure> {
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .filter(|value| !value.trim().is_empty())
        .ok_or(GatewayFailure::EmptyContent)?;

    let fragment = extract_json_object(content)
        .ok_or_else(|| GatewayFailure::Parse("no JSON object in model output".to_string()))?;
    serde_json::from_str(fragment).map_err(|err| GatewayFailure::Parse(err.to_string()))
}

/// First complete top-level JSON object in free text. The scan is string- and
/// escape-aware, so brace characters inside string values don't truncate the
/// match, and markdown fences or surrounding prose are skipped naturally.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&content[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// The full proxy contract as a pure function: normalize the request, run the
/// provider, and map every outcome to its documented status and body. The
/// success body is the provider's object untouched.
pub fn handle_analyze(provider: &dyn DiagnosisProvider, body: &Value) -> (u16, Value) {
    let request = match AnalyzeRequest::from_body(body) {
        Ok(request) => request,
        Err(failure) => return failure_response(&failure),
    };
    match provider.analyze(&request) {
        Ok(report) => (200, report),
        Err(failure) => failure_response(&failure),
    }
}

pub fn failure_response(failure: &GatewayFailure) -> (u16, Value) {
    (
        failure.status_code(),
        json!({ "error": failure.user_message() }),
    )
}

/// Offline provider with a small bank of canned diagnoses, picked
/// deterministically from the image payload so repeated scans of the same
/// file agree.
pub struct DryrunProvider;

impl DiagnosisProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn analyze(&self, request: &AnalyzeRequest) -> Result<Value, GatewayFailure> {
        let mut hasher = Sha256::new();
        hasher.update(request.image_base64.as_bytes());
        let digest = hasher.finalize();
        let bank = canned_reports();
        let report = &bank[digest[0] as usize % bank.len()];
        serde_json::to_value(report).map_err(|err| GatewayFailure::Parse(err.to_string()))
    }
}

fn canned_reports() -> Vec<AnalysisReport> {
    vec![
        AnalysisReport {
            subject_type: SubjectType::Crop,
            species: "Maize (Zea mays)".to_string(),
            symptoms: vec![
                "Long gray-green lesions along the leaf blades".to_string(),
                "Lower leaves drying out from the tip inward".to_string(),
            ],
            disease_name: "Northern Leaf Blight".to_string(),
            alternatives: vec!["Gray Leaf Spot".to_string(), "Common Rust".to_string()],
            confidence_level: ConfidenceLevel::High,
            confidence_percent: 88.0,
            causes: vec![
                "Fungal infection (Exserohilum turcicum)".to_string(),
                "Prolonged leaf wetness and warm weather".to_string(),
            ],
            severity: Severity::Severe,
            severity_reason: "Lesions have spread to the upper canopy before grain fill."
                .to_string(),
            treatments: vec![
                "Apply a locally available protectant fungicide such as mancozeb".to_string(),
                "Remove and burn heavily infected leaves".to_string(),
            ],
            prevention: vec![
                "Rotate maize with legumes for at least one season".to_string(),
                "Plant resistant varieties where available".to_string(),
            ],
            urgency_advice: "Treat within the week; consult an extension officer if it keeps spreading.".to_string(),
            needs_professional: false,
            farmer_summary: "Your maize has a fungal leaf disease called Northern Leaf Blight. Spraying a fungicide now and rotating crops next season should bring it under control.".to_string(),
        },
        AnalysisReport {
            subject_type: SubjectType::Fruit,
            species: "Tomato (Solanum lycopersicum)".to_string(),
            symptoms: vec![
                "Dark concentric rings on older leaves".to_string(),
                "Yellow halo around leaf spots".to_string(),
            ],
            disease_name: "Early Blight".to_string(),
            alternatives: vec!["Septoria Leaf Spot".to_string()],
            confidence_level: ConfidenceLevel::Moderate,
            confidence_percent: 64.0,
            causes: vec![
                "Fungal infection (Alternaria solani)".to_string(),
                "Splashing water spreading spores from the soil".to_string(),
            ],
            severity: Severity::Moderate,
            severity_reason: "Spots are limited to the lower third of the plant.".to_string(),
            treatments: vec![
                "Remove spotted lower leaves and destroy them".to_string(),
                "Spray a copper-based fungicide every 7-10 days".to_string(),
            ],
            prevention: vec![
                "Mulch around plants to stop soil splash".to_string(),
                "Water at the base, not over the leaves".to_string(),
            ],
            urgency_advice: "Manageable on your own; act before the rainy season peaks.".to_string(),
            needs_professional: false,
            farmer_summary: "Your tomatoes show early blight, a common fungus. Pick off the spotted leaves, mulch the soil, and spray copper fungicide to stop it spreading.".to_string(),
        },
        AnalysisReport {
            subject_type: SubjectType::Livestock,
            species: "Goat".to_string(),
            symptoms: vec![
                "Limping on the front left foot".to_string(),
                "Swollen, foul-smelling tissue between the claws".to_string(),
            ],
            disease_name: "Foot Rot".to_string(),
            alternatives: vec!["Foot Abscess".to_string(), "Laminitis".to_string()],
            confidence_level: ConfidenceLevel::Moderate,
            confidence_percent: 58.0,
            causes: vec![
                "Bacterial infection in wet, muddy pens".to_string(),
                "Untrimmed hooves trapping moisture".to_string(),
            ],
            severity: Severity::Critical,
            severity_reason: "The animal is refusing to bear weight and may stop feeding."
                .to_string(),
            treatments: vec![
                "Trim the hoof and clean with a zinc sulfate foot bath".to_string(),
                "Keep the animal on dry ground until healed".to_string(),
            ],
            prevention: vec![
                "Trim hooves every few months".to_string(),
                "Drain or bed wet areas of the pen".to_string(),
            ],
            urgency_advice: "See a veterinary officer promptly; untreated foot rot can become permanent.".to_string(),
            needs_professional: true,
            farmer_summary: "Your goat likely has foot rot, an infection from wet ground. Clean and trim the hoof, keep it dry, and have a vet check it soon.".to_string(),
        },
    ]
}

pub fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
