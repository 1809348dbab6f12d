//! Request protocol and the dispatcher behind it.
//!
//! Messages are newline-delimited JSON: `{id, method, params}` in,
//! `{id, result}` or `{id, error: {code, message}}` out. At most one
//! extraction or fill pass runs at a time.

use crate::extraction::source::LiveDocument;
use crate::extraction::Extractor;
use crate::injection::browser::BrowserWizard;
use crate::injection::{FillReport, Injector};
use crate::renderer::{open_page, Renderer};
use crate::store::{RecordStore, SettingsStore};
use crate::translate::Translator;
use anyhow::{bail, Context, Result};
use model_relay::{FillResponse, ModelRecord, RelayError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Message shown when extraction finds no title.
pub const TITLE_NOT_FOUND: &str = "Could not find model title on this page.";

/// Navigation bound for opening a page.
const NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Protocol methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Harvest a record from a source page and save it.
    Extract,
    /// Replay a record into a target wizard.
    Fill,
    Status,
}

impl Method {
    /// Parse a method name string into a Method enum.
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "extract" => Ok(Self::Extract),
            "fill" => Ok(Self::Fill),
            "status" => Ok(Self::Status),
            _ => bail!("unknown method: {s}"),
        }
    }
}

/// A parsed protocol request.
#[derive(Debug)]
pub struct Request {
    pub id: String,
    pub method: Method,
    pub params: Value,
}

/// Parse a JSON request line into (id, method, params).
pub fn parse_request(json: &str) -> Result<Request> {
    let v: Value = serde_json::from_str(json)?;

    let id = match v.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "unknown".to_string(),
    };

    let method_str = v
        .get("method")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("missing 'method' field"))?;

    let method = Method::from_str(method_str)?;

    let params = v.get("params").cloned().unwrap_or(Value::Object(Default::default()));

    Ok(Request { id, method, params })
}

/// Format a successful response as JSON string (newline-terminated).
pub fn format_response(id: &str, result: Value) -> String {
    let resp = json!({
        "id": id,
        "result": result,
    });
    format!("{resp}\n")
}

/// Format an error response as JSON string (newline-terminated).
pub fn format_error(id: &str, code: &str, message: &str) -> String {
    let resp = json!({
        "id": id,
        "error": {
            "code": code,
            "message": message,
        },
    });
    format!("{resp}\n")
}

#[derive(Debug, Deserialize)]
struct ExtractParams {
    url: String,
}

#[derive(Debug, Deserialize)]
struct FillParams {
    url: String,
    #[serde(default)]
    record: Option<ModelRecord>,
}

/// Result of an extract request.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractOutcome {
    pub ok: bool,
    /// Whether the record was persisted.
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub record: ModelRecord,
}

/// Status response.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResult {
    pub version: String,
    pub uptime_s: u64,
    pub busy: bool,
    pub active_contexts: usize,
    pub clip_title: Option<String>,
}

/// Routes requests to the Extractor and the Injector.
pub struct Dispatcher {
    renderer: Arc<dyn Renderer>,
    records: Arc<dyn RecordStore>,
    settings: Arc<dyn SettingsStore>,
    translator: Arc<dyn Translator>,
    extractor: Extractor,
    injector: Injector,
    /// Reuse an open tab for the page instead of opening one.
    attach: bool,
    /// Leave the filled tab open for the user to finish.
    keep_fill_tab: bool,
    pass: Mutex<()>,
    shutdown: CancellationToken,
    started: Instant,
}

impl Dispatcher {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        records: Arc<dyn RecordStore>,
        settings: Arc<dyn SettingsStore>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            renderer,
            records,
            settings,
            translator,
            extractor: Extractor::default(),
            injector: Injector::default(),
            attach: false,
            keep_fill_tab: false,
            pass: Mutex::new(()),
            shutdown: CancellationToken::new(),
            started: Instant::now(),
        }
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_injector(mut self, injector: Injector) -> Self {
        self.injector = injector;
        self
    }

    /// Prefer adopting an already open tab.
    pub fn attach_tabs(mut self, attach: bool) -> Self {
        self.attach = attach;
        self
    }

    pub fn keep_fill_tab(mut self, keep: bool) -> Self {
        self.keep_fill_tab = keep;
        self
    }

    /// Token whose cancellation abandons the pass in flight.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// Extract from `url` and persist the record when it has a title.
    pub async fn extract(&self, url: &str) -> Result<ExtractOutcome> {
        let _pass = self.pass.lock().await;
        let cancel = self.shutdown.child_token();
        let settings = self.settings.load_settings()?;

        let ctx = open_page(self.renderer.as_ref(), url, self.attach, NAVIGATION_TIMEOUT_MS)
            .await
            .with_context(|| format!("failed to open {url}"))?;
        let result = {
            let doc = LiveDocument::new(ctx.as_ref());
            self.extractor
                .extract(&doc, self.translator.as_ref(), &settings, &cancel)
                .await
        };
        if let Err(e) = ctx.close().await {
            warn!("failed to close source tab: {e:#}");
        }
        let record = result?;

        if record.title.is_empty() {
            warn!("{TITLE_NOT_FOUND}");
            return Ok(ExtractOutcome {
                ok: false,
                saved: false,
                error: Some(TITLE_NOT_FOUND.to_string()),
                record,
            });
        }
        self.records.save(&record)?;
        info!("copied '{}'", record.title);
        Ok(ExtractOutcome {
            ok: true,
            saved: true,
            error: None,
            record,
        })
    }

    /// Fill the wizard at `url` with `record`, or with the saved record.
    pub async fn fill(&self, url: &str, record: Option<ModelRecord>) -> Result<FillReport> {
        let record = match record {
            Some(r) => r.finalize(),
            None => self
                .records
                .load()?
                .ok_or_else(|| anyhow::anyhow!("nothing copied yet, run `relay copy` first"))?,
        };
        record.validate()?;

        let _pass = self.pass.lock().await;
        let cancel = self.shutdown.child_token();

        let ctx = open_page(self.renderer.as_ref(), url, self.attach, NAVIGATION_TIMEOUT_MS)
            .await
            .with_context(|| format!("failed to open {url}"))?;
        let result = {
            let page = BrowserWizard::new(ctx.as_ref());
            self.injector.fill(&page, &record, &cancel).await
        };
        if !self.keep_fill_tab {
            if let Err(e) = ctx.close().await {
                warn!("failed to close target tab: {e:#}");
            }
        }
        result
    }

    pub fn status(&self) -> StatusResult {
        let clip_title = match self.records.load() {
            Ok(rec) => rec.map(|r| r.title),
            Err(e) => {
                warn!("could not read saved clip: {e:#}");
                None
            }
        };
        StatusResult {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_s: self.started.elapsed().as_secs(),
            busy: self.pass.try_lock().is_err(),
            active_contexts: self.renderer.active_contexts(),
            clip_title,
        }
    }

    /// Handle one request line and produce one response line.
    pub async fn handle_line(&self, line: &str) -> String {
        match parse_request(line) {
            Ok(req) => self.handle(req).await,
            Err(e) => format_error("unknown", "E_INVALID_REQUEST", &format!("{e:#}")),
        }
    }

    pub async fn handle(&self, req: Request) -> String {
        match req.method {
            Method::Status => match serde_json::to_value(self.status()) {
                Ok(v) => format_response(&req.id, v),
                Err(e) => format_error(&req.id, "E_INTERNAL", &e.to_string()),
            },
            Method::Extract => {
                let params: ExtractParams = match serde_json::from_value(req.params) {
                    Ok(p) => p,
                    Err(e) => return format_error(&req.id, "E_INVALID_PARAMS", &e.to_string()),
                };
                match self.extract(&params.url).await {
                    Ok(outcome) => match serde_json::to_value(&outcome) {
                        Ok(v) => format_response(&req.id, v),
                        Err(e) => format_error(&req.id, "E_INTERNAL", &e.to_string()),
                    },
                    Err(e) => format_error(&req.id, error_code(&e), &format!("{e:#}")),
                }
            }
            Method::Fill => {
                let params: FillParams = match serde_json::from_value(req.params) {
                    Ok(p) => p,
                    Err(e) => return format_error(&req.id, "E_INVALID_PARAMS", &e.to_string()),
                };
                format_response(&req.id, fill_result(self.fill(&params.url, params.record).await))
            }
        }
    }
}

/// `{ok, error?}` for a fill, with the report attached on success.
pub fn fill_result(result: Result<FillReport>) -> Value {
    match result {
        Ok(report) => {
            let mut value = json!(FillResponse::ok());
            value["report"] = json!(report);
            value
        }
        Err(e) => json!(FillResponse::failed(format!("{e:#}"))),
    }
}

/// Protocol error code of a failed pass.
pub fn error_code(e: &anyhow::Error) -> &'static str {
    match e.downcast_ref::<RelayError>() {
        Some(RelayError::TitleNotFound) => "E_TITLE_NOT_FOUND",
        Some(RelayError::Step2Timeout { .. }) => "E_STEP2_TIMEOUT",
        Some(RelayError::Cancelled) => "E_CANCELLED",
        Some(RelayError::InvalidRecord(_)) => "E_INVALID_RECORD",
        Some(RelayError::Store(_)) => "E_STORE",
        Some(RelayError::Browser(_)) => "E_BROWSER",
        Some(RelayError::Translation(_)) => "E_TRANSLATION",
        None => "E_PASS_FAILED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::NoopRenderer;
    use crate::store::SqliteStore;
    use crate::translate::NoopTranslator;

    fn dispatcher() -> (Dispatcher, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let d = Dispatcher::new(
            Arc::new(NoopRenderer),
            store.clone(),
            store.clone(),
            Arc::new(NoopTranslator),
        );
        (d, store)
    }

    #[test]
    fn test_parse_extract_request() {
        let json = r#"{"id": "r1", "method": "extract", "params": {"url": "https://civitai.com/models/1"}}"#;
        let req = parse_request(json).unwrap();
        assert_eq!(req.id, "r1");
        assert_eq!(req.method, Method::Extract);
        assert_eq!(req.params["url"], "https://civitai.com/models/1");
    }

    #[test]
    fn test_numeric_id_and_missing_params() {
        let req = parse_request(r#"{"id": 7, "method": "status"}"#).unwrap();
        assert_eq!(req.id, "7");
        assert!(req.params.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_parse_unknown_method() {
        let json = r#"{"id": "x", "method": "map", "params": {}}"#;
        assert!(parse_request(json).is_err());
    }

    #[test]
    fn test_format_error() {
        let resp = format_error("r2", "E_INVALID_PARAMS", "missing url");
        let parsed: Value = serde_json::from_str(resp.trim()).unwrap();
        assert_eq!(parsed["id"], "r2");
        assert_eq!(parsed["error"]["code"], "E_INVALID_PARAMS");
    }

    #[test]
    fn test_fill_result_shapes() {
        let err = fill_result(Err(RelayError::Step2Timeout { timeout_ms: 15000 }.into()));
        assert_eq!(err["ok"], false);
        assert!(err["error"].as_str().unwrap().contains("15000ms"));

        let code = error_code(&RelayError::Cancelled.into());
        assert_eq!(code, "E_CANCELLED");
    }

    #[tokio::test]
    async fn test_status_reports_clip() {
        let (d, store) = dispatcher();
        store
            .save(&ModelRecord {
                title: "Cat Ears".into(),
                ..ModelRecord::default()
            })
            .unwrap();
        let resp = d.handle_line(r#"{"id":"s","method":"status"}"#).await;
        let parsed: Value = serde_json::from_str(resp.trim()).unwrap();
        assert_eq!(parsed["result"]["clip_title"], "Cat Ears");
        assert_eq!(parsed["result"]["busy"], false);
    }

    #[tokio::test]
    async fn test_fill_without_clip_answers_not_ok() {
        let (d, _) = dispatcher();
        let resp = d
            .handle_line(r#"{"id":"f","method":"fill","params":{"url":"https://yodayo.com/models/new"}}"#)
            .await;
        let parsed: Value = serde_json::from_str(resp.trim()).unwrap();
        assert_eq!(parsed["result"]["ok"], false);
        assert!(parsed["result"]["error"].as_str().unwrap().contains("relay copy"));
    }

    #[tokio::test]
    async fn test_extract_without_browser_is_an_error_response() {
        let (d, _) = dispatcher();
        let resp = d
            .handle_line(r#"{"id":"e","method":"extract","params":{"url":"https://civitai.com/models/1"}}"#)
            .await;
        let parsed: Value = serde_json::from_str(resp.trim()).unwrap();
        assert_eq!(parsed["error"]["code"], "E_BROWSER");
    }

    #[tokio::test]
    async fn test_bad_params_and_bad_json() {
        let (d, _) = dispatcher();
        let resp = d.handle_line(r#"{"id":"e","method":"extract","params":{}}"#).await;
        assert!(resp.contains("E_INVALID_PARAMS"));
        let resp = d.handle_line("not json").await;
        assert!(resp.contains("E_INVALID_REQUEST"));
    }
}
