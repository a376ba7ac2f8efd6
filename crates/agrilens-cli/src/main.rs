use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use agrilens_contracts::diagnosis::{DiagnosisResult, Severity};
use agrilens_contracts::events::{EventFields, EventLog};
use agrilens_contracts::history::HistoryLog;
use agrilens_contracts::i18n::{load_language, save_language, Language, Translator};
use agrilens_contracts::store::StateStore;
use agrilens_engine::{
    default_provider_registry, handle_analyze, non_empty_env, AnalyzeRequest, DiagnosisProvider,
    GatewayFailure,
};
use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "agrilens", version, about = "Photograph a crop or animal, get an AI diagnosis")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    /// Display language for this invocation (en, tw, ee)
    #[arg(long, global = true)]
    lang: Option<String>,
    /// Override the state directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze an image and store the diagnosis
    Scan(ScanArgs),
    /// Run the analyze proxy over HTTP
    Serve(ServeArgs),
    /// Browse past diagnoses
    History(HistoryArgs),
    /// Show or change the display language
    Lang(LangArgs),
}

#[derive(Debug, Parser)]
struct ScanArgs {
    /// Path to the photo to analyze
    image: PathBuf,
    /// Diagnosis provider (gateway, dryrun)
    #[arg(long)]
    provider: Option<String>,
    /// Route the request through a running proxy instead of calling the gateway directly
    #[arg(long)]
    endpoint: Option<String>,
    /// Skip the scanning progress messages
    #[arg(long)]
    no_progress: bool,
}

#[derive(Debug, Parser)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8787")]
    addr: String,
    /// Diagnosis provider backing the proxy (gateway, dryrun)
    #[arg(long)]
    provider: Option<String>,
}

#[derive(Debug, Parser)]
struct HistoryArgs {
    #[command(subcommand)]
    action: Option<HistoryAction>,
}

#[derive(Debug, Subcommand)]
enum HistoryAction {
    /// List stored diagnoses, newest first
    List {
        /// Substring filter on disease name or species
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one diagnosis in full
    Show { id: String },
    /// Delete the whole history
    Clear,
}

#[derive(Debug, Parser)]
struct LangArgs {
    /// Language code to switch to; omit to show the current selection
    code: Option<String>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("agrilens error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir.clone())?;
    let mut store = StateStore::new(data_dir.join("state.json"));

    let language = match cli.lang.as_deref() {
        Some(code) => Language::parse(code)
            .ok_or_else(|| anyhow!("unknown language '{code}' (expected one of: en, tw, ee)"))?,
        None => load_language(&mut store),
    };
    let translator = Translator::new(language);

    match cli.command {
        None => {
            print!("{}", render_landing(&translator));
            Ok(0)
        }
        Some(Command::Scan(args)) => run_scan(args, &data_dir, store, &translator),
        Some(Command::Serve(args)) => run_serve(args, &data_dir),
        Some(Command::History(args)) => run_history(args, &data_dir, store, &translator),
        Some(Command::Lang(args)) => run_lang(args, store),
    }
}

fn resolve_data_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    let dir = flag
        .or_else(|| non_empty_env("AGRILENS_DATA_DIR").map(PathBuf::from))
        .or_else(|| dirs::data_dir().map(|base| base.join("agrilens")))
        .unwrap_or_else(|| PathBuf::from(".agrilens"));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create data dir {}", dir.display()))?;
    Ok(dir)
}

// ---------------------------------------------------------------------------
// Scan workflow
// ---------------------------------------------------------------------------

/// The scan workflow stages. Failure during analysis falls back to the
/// preview stage so the captured image is not lost; reset lands on upload
/// from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanStage {
    Upload,
    Preview,
    Scanning,
    Results,
}

#[derive(Debug)]
struct ScanFlow {
    stage: ScanStage,
}

impl ScanFlow {
    fn new() -> Self {
        Self {
            stage: ScanStage::Upload,
        }
    }

    fn stage(&self) -> ScanStage {
        self.stage
    }

    fn accept_image(&mut self) {
        if self.stage == ScanStage::Upload {
            self.stage = ScanStage::Preview;
        }
    }

    fn begin_analysis(&mut self) {
        if self.stage == ScanStage::Preview {
            self.stage = ScanStage::Scanning;
        }
    }

    fn complete(&mut self) {
        if self.stage == ScanStage::Scanning {
            self.stage = ScanStage::Results;
        }
    }

    fn fail(&mut self) {
        if self.stage == ScanStage::Scanning {
            self.stage = ScanStage::Preview;
        }
    }

    fn reset(&mut self) {
        self.stage = ScanStage::Upload;
    }
}

fn run_scan(
    args: ScanArgs,
    data_dir: &Path,
    store: StateStore,
    translator: &Translator,
) -> Result<i32> {
    let mut flow = ScanFlow::new();
    let events = EventLog::new(data_dir.join("events.jsonl"), Uuid::new_v4().to_string());
    events.emit(
        "scan_started",
        fields(json!({ "image": args.image.to_string_lossy() })),
    )?;

    let bytes = fs::read(&args.image)
        .with_context(|| format!("failed reading {}", args.image.display()))?;
    let Some(mime) = detect_image_mime(&bytes, &args.image) else {
        println!(
            "{}: {}",
            translator.tr("scan.invalid_file"),
            translator.tr("scan.invalid_file_desc")
        );
        events.emit(
            "image_rejected",
            fields(json!({ "image": args.image.to_string_lossy() })),
        )?;
        return Ok(2);
    };
    flow.accept_image();
    events.emit(
        "image_accepted",
        fields(json!({ "mime_type": mime, "bytes": bytes.len() })),
    )?;

    println!("{}", render_preview(&args.image, &bytes, mime, translator));

    let image_ref = store_image_copy(data_dir, &bytes, mime)?;
    let request = AnalyzeRequest::new(BASE64.encode(&bytes), Some(mime.to_string()));

    let registry = default_provider_registry();
    let remote;
    let provider: &dyn DiagnosisProvider = if let Some(endpoint) = &args.endpoint {
        remote = RemoteProvider::new(endpoint);
        &remote
    } else {
        let name = args.provider.as_deref().unwrap_or("gateway");
        registry.get(name).ok_or_else(|| {
            anyhow!(
                "unknown provider '{name}' (available: {})",
                registry.names().join(", ")
            )
        })?
    };

    flow.begin_analysis();
    events.emit(
        "gateway_request",
        fields(json!({ "provider": provider.name(), "mime_type": mime })),
    )?;

    let outcome = run_with_scanning_animation(translator, !args.no_progress, || {
        provider.analyze(&request)
    });

    match outcome {
        Err(failure) => {
            flow.fail();
            events.emit(
                "analysis_failed",
                fields(json!({
                    "error": failure.to_string(),
                    "status": failure.status_code(),
                })),
            )?;
            println!();
            println!(
                "{}: {}",
                translator.tr("scan.analysis_failed"),
                failure.user_message()
            );
            println!(
                "{} · {}",
                translator.tr("scan.retake"),
                translator.tr("scan.analyze")
            );
            debug_assert_eq!(flow.stage(), ScanStage::Preview);
            Ok(1)
        }
        Ok(report) => {
            if !args.no_progress {
                println!("[100%] {}", translator.tr("scanning.complete"));
            }
            let result = DiagnosisResult::assemble(&report, image_ref);
            let mut history = HistoryLog::new(store);
            history.record(&result)?;
            flow.complete();
            events.emit(
                "analysis_completed",
                fields(json!({
                    "id": result.id,
                    "disease_name": result.report.disease_name,
                })),
            )?;
            println!();
            print!("{}", render_diagnosis(&result, translator));
            println!();
            println!("{}", translator.tr("scan.scan_another"));
            flow.reset();
            Ok(0)
        }
    }
}

/// MIME type from the file bytes, falling back to the extension. `None`
/// means the input is not an image we accept.
fn detect_image_mime(bytes: &[u8], path: &Path) -> Option<&'static str> {
    if let Ok(format) = image::guess_format(bytes) {
        return Some(format.to_mime_type());
    }
    mime_for_path(path)
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())?
        .to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        _ => "jpg",
    }
}

/// Keep a copy of the scanned image under the data dir so history entries
/// can point at it after the original file moves.
fn store_image_copy(data_dir: &Path, bytes: &[u8], mime: &str) -> Result<String> {
    let digest = Sha256::digest(bytes);
    let name = format!(
        "{}.{}",
        hex::encode(&digest[..4]),
        extension_for_mime(mime)
    );
    let images_dir = data_dir.join("images");
    fs::create_dir_all(&images_dir)?;
    let path = images_dir.join(name);
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path.to_string_lossy().to_string())
}

/// Cycle the localized scanning messages on a ticker thread while the
/// analysis call blocks. The simulated percentage holds at 95 until the
/// gateway answers.
fn run_with_scanning_animation<F>(
    translator: &Translator,
    show_progress: bool,
    job: F,
) -> Result<Value, GatewayFailure>
where
    F: FnOnce() -> Result<Value, GatewayFailure>,
{
    if !show_progress {
        return job();
    }

    let stop = Arc::new(AtomicBool::new(false));
    let ticker_stop = stop.clone();
    let messages: Vec<String> = translator
        .scanning_messages()
        .iter()
        .map(|message| message.to_string())
        .collect();
    let ticker = thread::spawn(move || {
        let started = Instant::now();
        let mut step = 0usize;
        while !ticker_stop.load(Ordering::SeqCst) {
            let percent = simulated_progress(started.elapsed());
            println!("[{percent:>3}%] {}", messages[step % messages.len()]);
            step += 1;
            thread::sleep(Duration::from_millis(400));
        }
    });

    let outcome = job();
    stop.store(true, Ordering::SeqCst);
    let _ = ticker.join();
    outcome
}

fn simulated_progress(elapsed: Duration) -> u64 {
    ((elapsed.as_millis() as u64 / 400 + 1) * 9).min(95)
}

// ---------------------------------------------------------------------------
// Remote provider: client → proxy → gateway
// ---------------------------------------------------------------------------

struct RemoteProvider {
    endpoint: String,
    http: HttpClient,
}

impl RemoteProvider {
    fn new(endpoint: &str) -> Self {
        let trimmed = endpoint.trim().trim_end_matches('/');
        let endpoint = if trimmed.ends_with("/analyze") {
            trimmed.to_string()
        } else {
            format!("{trimmed}/analyze")
        };
        Self {
            endpoint,
            http: HttpClient::new(),
        }
    }
}

impl DiagnosisProvider for RemoteProvider {
    fn name(&self) -> &str {
        "remote"
    }

    fn analyze(&self, request: &AnalyzeRequest) -> Result<Value, GatewayFailure> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&request.to_body())
            .send()
            .map_err(|err| GatewayFailure::Transport(format!("proxy request failed: {err}")))?;

        let status = response.status().as_u16();
        let body: Value = response.json().map_err(|err| {
            GatewayFailure::Transport(format!("proxy returned invalid JSON: {err}"))
        })?;
        if (200..300).contains(&status) {
            return Ok(body);
        }

        let detail = body["error"].as_str().unwrap_or_default().to_string();
        Err(match status {
            400 => GatewayFailure::MissingImage,
            429 => GatewayFailure::RateLimited,
            402 => GatewayFailure::QuotaExceeded,
            code => GatewayFailure::Upstream {
                status: code,
                detail,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Serve: the analyze proxy over HTTP
// ---------------------------------------------------------------------------

fn run_serve(args: ServeArgs, data_dir: &Path) -> Result<i32> {
    let registry = default_provider_registry();
    let name = args.provider.as_deref().unwrap_or("gateway");
    let Some(provider) = registry.get(name) else {
        bail!(
            "unknown provider '{name}' (available: {})",
            registry.names().join(", ")
        );
    };

    let events = EventLog::new(data_dir.join("events.jsonl"), Uuid::new_v4().to_string());
    let server = tiny_http::Server::http(args.addr.as_str())
        .map_err(|err| anyhow!("failed to bind {}: {err}", args.addr))?;
    events.emit(
        "serve_started",
        fields(json!({ "addr": args.addr, "provider": provider.name() })),
    )?;
    println!("agrilens proxy listening on http://{}", args.addr);

    for request in server.incoming_requests() {
        if let Err(err) = handle_http_request(request, provider, &events) {
            eprintln!("agrilens serve error: {err:#}");
        }
    }
    Ok(0)
}

fn handle_http_request(
    mut request: tiny_http::Request,
    provider: &dyn DiagnosisProvider,
    events: &EventLog,
) -> Result<()> {
    use tiny_http::Method;

    if request.method() == &Method::Options {
        let mut response = tiny_http::Response::empty(200);
        for header in cors_headers() {
            response.add_header(header);
        }
        request.respond(response)?;
        return Ok(());
    }

    let path = request.url().split('?').next().unwrap_or("").to_string();
    if request.method() == &Method::Post && path.trim_end_matches('/') == "/analyze" {
        let mut raw = String::new();
        request.as_reader().read_to_string(&mut raw)?;
        let (status, body) = match serde_json::from_str::<Value>(&raw) {
            Ok(parsed) => handle_analyze(provider, &parsed),
            Err(err) => (500, json!({ "error": format!("invalid request body: {err}") })),
        };
        events.emit(
            "request_handled",
            fields(json!({ "path": path, "status": status })),
        )?;
        return respond_json(request, status, &body);
    }

    events.emit(
        "request_handled",
        fields(json!({ "path": path, "status": 404 })),
    )?;
    respond_json(request, 404, &json!({ "error": "Not found" }))
}

fn respond_json(request: tiny_http::Request, status: u16, body: &Value) -> Result<()> {
    let mut response =
        tiny_http::Response::from_string(body.to_string()).with_status_code(status);
    for header in cors_headers() {
        response.add_header(header);
    }
    response.add_header(header("Content-Type", "application/json"));
    request.respond(response)?;
    Ok(())
}

fn cors_headers() -> Vec<tiny_http::Header> {
    vec![
        header("Access-Control-Allow-Origin", "*"),
        header(
            "Access-Control-Allow-Headers",
            "authorization, x-client-info, apikey, content-type",
        ),
    ]
}

fn header(name: &str, value: &str) -> tiny_http::Header {
    tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("static header")
}

// ---------------------------------------------------------------------------
// History browser
// ---------------------------------------------------------------------------

fn run_history(
    args: HistoryArgs,
    data_dir: &Path,
    store: StateStore,
    translator: &Translator,
) -> Result<i32> {
    let mut history = HistoryLog::new(store);
    let action = args.action.unwrap_or(HistoryAction::List { search: None });

    match action {
        HistoryAction::List { search } => {
            let entries = match search.as_deref() {
                Some(query) => history.search(query),
                None => history.entries(),
            };
            print!("{}", render_history_list(&entries, translator));
            Ok(0)
        }
        HistoryAction::Show { id } => match history.find(&id) {
            Some(entry) => {
                print!("{}", render_diagnosis(&entry, translator));
                println!();
                println!("{}", translator.tr("history.back"));
                Ok(0)
            }
            None => {
                eprintln!("no diagnosis with id {id}");
                Ok(1)
            }
        },
        HistoryAction::Clear => {
            history.clear()?;
            let events =
                EventLog::new(data_dir.join("events.jsonl"), Uuid::new_v4().to_string());
            events.emit("history_cleared", EventFields::new())?;
            println!(
                "{} — 0 {}",
                translator.tr("history.title"),
                translator.tr("history.count")
            );
            Ok(0)
        }
    }
}

fn run_lang(args: LangArgs, mut store: StateStore) -> Result<i32> {
    match args.code {
        None => {
            let current = load_language(&mut store);
            println!("{} ({})", current.code(), current.native_name());
            let available = Language::all()
                .iter()
                .map(|language| format!("{} ({})", language.code(), language.native_name()))
                .collect::<Vec<String>>()
                .join(", ");
            println!("available: {available}");
            Ok(0)
        }
        Some(code) => match Language::parse(&code) {
            Some(language) => {
                save_language(&mut store, language)?;
                println!("{} ({})", language.code(), language.native_name());
                Ok(0)
            }
            None => {
                eprintln!("unknown language '{code}' (expected one of: en, tw, ee)");
                Ok(2)
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

const FEATURE_KEYS: [(&str, &str); 6] = [
    ("feature.snap.title", "feature.snap.desc"),
    ("feature.disease.title", "feature.disease.desc"),
    ("feature.treatment.title", "feature.treatment.desc"),
    ("feature.pest.title", "feature.pest.desc"),
    ("feature.weather.title", "feature.weather.desc"),
    ("feature.severity.title", "feature.severity.desc"),
];

fn render_landing(translator: &Translator) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", translator.tr("hero.badge")));
    out.push_str(&format!(
        "{} {}\n",
        translator.tr("hero.title1"),
        translator.tr("hero.title2")
    ));
    out.push_str(&format!("{}\n\n", translator.tr("hero.subtitle")));

    out.push_str(&format!("{}\n", translator.tr("features.heading")));
    out.push_str(&format!("{}\n", translator.tr("features.subheading")));
    for (title_key, desc_key) in FEATURE_KEYS {
        out.push_str(&format!(
            "  • {} — {}\n",
            translator.tr(title_key),
            translator.tr(desc_key)
        ));
    }
    out.push('\n');

    out.push_str(&format!("{}\n", translator.tr("cta.heading")));
    out.push_str(&format!(
        "  {}: agrilens scan <image>\n",
        translator.tr("cta.button")
    ));
    out.push_str(&format!(
        "  {}: agrilens history\n",
        translator.tr("hero.history")
    ));
    out
}

fn render_preview(path: &Path, bytes: &[u8], mime: &str, translator: &Translator) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} — {}\n",
        translator.tr("scan.preview_title"),
        translator.tr("scan.preview_subtitle")
    ));
    out.push_str(&format!("  {}\n", path.display()));
    let dims = image::load_from_memory(bytes)
        .map(|img| format!("{}x{}", img.width(), img.height()))
        .unwrap_or_else(|_| "?".to_string());
    out.push_str(&format!("  {mime}, {dims}, {} bytes", bytes.len()));
    out
}

fn severity_badge(severity: Severity, translator: &Translator) -> String {
    format!("[{}]", translator.tr(severity.label_key()))
}

fn confidence_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * 20.0).round() as usize;
    format!("{}{}", "#".repeat(filled), "-".repeat(20 - filled))
}

fn render_diagnosis(result: &DiagnosisResult, translator: &Translator) -> String {
    let report = &result.report;
    let mut out = String::new();

    out.push_str(&format!(
        "{} [{}] {}\n",
        severity_badge(report.severity, translator),
        report.subject_type.as_str(),
        report.species
    ));
    out.push_str(&format!("{}\n", report.disease_name));
    out.push_str(&format!(
        "{}  {} {}%\n",
        translator.tr(report.confidence_level.label_key()),
        confidence_bar(report.confidence_percent),
        report.confidence_percent
    ));

    out.push_str(&format!("\n{}\n", translator.tr("diagnosis.what_means")));
    out.push_str(&format!("  {}\n", report.farmer_summary));

    if report.needs_professional {
        out.push_str(&format!("\n{}\n", translator.tr("diagnosis.professional")));
        out.push_str(&format!("  {}\n", report.urgency_advice));
    }

    let sections: [(&str, &Vec<String>); 4] = [
        ("diagnosis.symptoms", &report.symptoms),
        ("diagnosis.causes", &report.causes),
        ("diagnosis.treatment", &report.treatments),
        ("diagnosis.prevention", &report.prevention),
    ];
    for (key, items) in sections {
        out.push_str(&format!("\n{}\n", translator.tr(key)));
        for item in items {
            out.push_str(&format!("  • {item}\n"));
        }
    }
    out
}

fn render_history_list(entries: &[DiagnosisResult], translator: &Translator) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", translator.tr("history.title")));
    out.push_str(&format!("{} {}\n", entries.len(), translator.tr("history.count")));

    if entries.is_empty() {
        out.push_str(&format!(
            "\n{}\n{}\n",
            translator.tr("history.empty_title"),
            translator.tr("history.empty_desc")
        ));
        return out;
    }

    out.push('\n');
    for entry in entries {
        let date = entry.timestamp.get(..10).unwrap_or(&entry.timestamp);
        out.push_str(&format!(
            "{} {:>5}%  {} — {}  ({date})  {}\n",
            severity_badge(entry.report.severity, translator),
            entry.report.confidence_percent,
            entry.report.disease_name,
            entry.report.species,
            entry.id
        ));
    }
    out
}

fn fields(value: Value) -> EventFields {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;

    use agrilens_contracts::diagnosis::{DiagnosisResult, Severity};
    use agrilens_contracts::history::HistoryLog;
    use agrilens_contracts::i18n::{Language, Translator};
    use agrilens_contracts::store::StateStore;
    use agrilens_engine::{AnalyzeRequest, DiagnosisProvider, DryrunProvider};
    use serde_json::json;

    use super::{
        confidence_bar, detect_image_mime, extension_for_mime, render_diagnosis,
        render_history_list, render_landing, severity_badge, simulated_progress, store_image_copy,
        ScanFlow, ScanStage,
    };

    fn translator() -> Translator {
        Translator::new(Language::En)
    }

    fn sample_result() -> DiagnosisResult {
        DiagnosisResult::assemble(
            &json!({
                "subjectType": "crop",
                "species": "Maize",
                "symptoms": ["Brown lesions"],
                "diseaseName": "Northern Leaf Blight",
                "alternatives": [],
                "confidenceLevel": "high",
                "confidencePercent": 88,
                "causes": ["Fungal infection"],
                "severity": "severe",
                "severityReason": "Spread to upper canopy",
                "treatments": ["Apply fungicide"],
                "prevention": ["Rotate crops"],
                "urgencyAdvice": "Treat this week.",
                "needsProfessional": true,
                "farmerSummary": "A fungal leaf disease."
            }),
            "images/abc.png",
        )
    }

    #[test]
    fn stage_machine_walks_the_happy_path() {
        let mut flow = ScanFlow::new();
        assert_eq!(flow.stage(), ScanStage::Upload);
        flow.accept_image();
        assert_eq!(flow.stage(), ScanStage::Preview);
        flow.begin_analysis();
        assert_eq!(flow.stage(), ScanStage::Scanning);
        flow.complete();
        assert_eq!(flow.stage(), ScanStage::Results);
    }

    #[test]
    fn analysis_failure_returns_to_preview() {
        let mut flow = ScanFlow::new();
        flow.accept_image();
        flow.begin_analysis();
        flow.fail();
        assert_eq!(flow.stage(), ScanStage::Preview);
    }

    #[test]
    fn reset_lands_on_upload_from_every_stage() {
        for advance in 0..4usize {
            let mut flow = ScanFlow::new();
            if advance > 0 {
                flow.accept_image();
            }
            if advance > 1 {
                flow.begin_analysis();
            }
            if advance > 2 {
                flow.complete();
            }
            flow.reset();
            assert_eq!(flow.stage(), ScanStage::Upload);
        }
    }

    #[test]
    fn out_of_order_transitions_do_not_move_the_stage() {
        let mut flow = ScanFlow::new();
        flow.begin_analysis();
        assert_eq!(flow.stage(), ScanStage::Upload);
        flow.complete();
        assert_eq!(flow.stage(), ScanStage::Upload);
        flow.fail();
        assert_eq!(flow.stage(), ScanStage::Upload);
    }

    fn png_bytes() -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::new_rgb8(2, 2)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .expect("encode png");
        buffer.into_inner()
    }

    #[test]
    fn mime_detection_sniffs_bytes_first() {
        let bytes = png_bytes();
        assert_eq!(
            detect_image_mime(&bytes, Path::new("photo.dat")),
            Some("image/png")
        );
    }

    #[test]
    fn mime_detection_falls_back_to_the_extension() {
        assert_eq!(
            detect_image_mime(b"not an image", Path::new("photo.jpg")),
            Some("image/jpeg")
        );
        assert_eq!(detect_image_mime(b"not an image", Path::new("notes.txt")), None);
        assert_eq!(detect_image_mime(b"not an image", Path::new("no_ext")), None);
    }

    #[test]
    fn extensions_follow_the_mime_type() {
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/unknown"), "jpg");
    }

    #[test]
    fn rendering_is_idempotent() {
        let result = sample_result();
        let translator = translator();
        assert_eq!(
            render_diagnosis(&result, &translator),
            render_diagnosis(&result, &translator)
        );
        let entries = vec![result];
        assert_eq!(
            render_history_list(&entries, &translator),
            render_history_list(&entries, &translator)
        );
    }

    #[test]
    fn diagnosis_rendering_carries_every_section() {
        let rendered = render_diagnosis(&sample_result(), &translator());
        for expected in [
            "[Severe]",
            "Northern Leaf Blight",
            "High Confidence",
            "What This Means for You",
            "Professional Help Recommended",
            "Visible Symptoms",
            "Possible Causes",
            "Treatment Recommendations",
            "Prevention Tips",
            "• Apply fungicide",
        ] {
            assert!(rendered.contains(expected), "missing {expected}");
        }
    }

    #[test]
    fn badges_render_a_known_style_for_every_severity() {
        let translator = translator();
        let mut seen = std::collections::BTreeSet::new();
        for severity in [
            Severity::Mild,
            Severity::Moderate,
            Severity::Severe,
            Severity::Critical,
        ] {
            let badge = severity_badge(severity, &translator);
            assert!(badge.starts_with('[') && badge.ends_with(']'));
            seen.insert(badge);
        }
        assert_eq!(seen.len(), 4);
        let coerced = severity_badge(Severity::parse("nonsense"), &translator);
        assert_eq!(coerced, "[Mild]");
    }

    #[test]
    fn confidence_bar_stays_inside_its_bounds() {
        assert_eq!(confidence_bar(0.0), "-".repeat(20));
        assert_eq!(confidence_bar(100.0), "#".repeat(20));
        assert_eq!(confidence_bar(50.0), format!("{}{}", "#".repeat(10), "-".repeat(10)));
        assert_eq!(confidence_bar(250.0), "#".repeat(20));
    }

    #[test]
    fn empty_history_renders_the_empty_state() {
        let rendered = render_history_list(&[], &translator());
        assert!(rendered.contains("No Diagnoses Yet"));
        assert!(rendered.contains("0 past analyses"));
    }

    #[test]
    fn landing_renders_hero_and_features() {
        let rendered = render_landing(&translator());
        assert!(rendered.contains("AI-Powered Agricultural Assistant"));
        assert!(rendered.contains("Snap & Diagnose"));
        assert!(rendered.contains("agrilens scan"));

        let localized = render_landing(&Translator::new(Language::Tw));
        assert!(localized.contains("AI Afuom Boafo"));
    }

    #[test]
    fn simulated_progress_ramps_and_holds_at_95() {
        use std::time::Duration;
        assert!(simulated_progress(Duration::from_millis(0)) >= 9);
        assert_eq!(simulated_progress(Duration::from_secs(60)), 95);
    }

    #[test]
    fn dryrun_scan_lands_in_history() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let bytes = png_bytes();
        let image_ref = store_image_copy(temp.path(), &bytes, "image/png")?;
        assert!(Path::new(&image_ref).exists());
        assert!(image_ref.ends_with(".png"));

        let provider = DryrunProvider;
        let report = provider
            .analyze(&AnalyzeRequest::new("cGF5bG9hZA==", Some("image/png".to_string())))
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;

        let result = DiagnosisResult::assemble(&report, image_ref);
        let mut history = HistoryLog::new(StateStore::new(temp.path().join("state.json")));
        history.record(&result)?;

        let entries = history.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, result.id);
        assert!(!entries[0].report.disease_name.is_empty());
        Ok(())
    }
}
