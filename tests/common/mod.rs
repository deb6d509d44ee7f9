#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;

use invoice_intake::config::Config;
use invoice_intake::models::BatchStats;
use invoice_intake::notify::Notifier;
use invoice_intake::recognizer::{RecognizeError, Recognizer, Record};
use invoice_intake::validate::FileType;
use invoice_intake::Intake;

/// Recognizer driven by per-path scripts of outcomes. Paths without a script
/// (or whose script has run out) succeed.
pub struct ScriptedRecognizer {
    scripts: Mutex<HashMap<PathBuf, VecDeque<Result<(), String>>>>,
    calls: Mutex<Vec<(PathBuf, tokio::time::Instant)>>,
    latency: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new(latency: Duration) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Queue outcomes for `path`: `Err(msg)` fails that attempt with `msg`.
    pub fn script(self, path: &str, outcomes: Vec<Result<(), &str>>) -> Self {
        let outcomes = outcomes
            .into_iter()
            .map(|o| o.map_err(|e| e.to_string()))
            .collect();
        self.scripts
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), outcomes);
        self
    }

    pub fn attempts_for(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == Path::new(path))
            .count()
    }

    pub fn call_times_for(&self, path: &str) -> Vec<tokio::time::Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == Path::new(path))
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(&self, path: &Path) -> Result<Record, RecognizeError> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), tokio::time::Instant::now()));

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;

        let outcome = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|script| script.pop_front())
            .unwrap_or(Ok(()));

        self.active.fetch_sub(1, Ordering::SeqCst);

        outcome.map_err(RecognizeError::from).map(|()| Record {
            path: path.to_path_buf(),
            file_type: FileType::from_path(path).unwrap_or(FileType::Jpeg),
            fields: json!({ "InvoiceNum": "00000001" }),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Refresh,
    Summary(BatchStats),
    Rejected(usize),
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().unwrap().clone()
    }

    pub fn summaries(&self) -> Vec<BatchStats> {
        self.events()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Summary(stats) => Some(stats),
                _ => None,
            })
            .collect()
    }

    pub fn refresh_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|n| **n == Notification::Refresh)
            .count()
    }

    pub fn rejected(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Rejected(count) => Some(count),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn refresh_after_batch(&self) {
        self.events.lock().unwrap().push(Notification::Refresh);
    }

    fn batch_summary(&self, stats: BatchStats) {
        self.events.lock().unwrap().push(Notification::Summary(stats));
    }

    fn rejected_paths(&self, count: usize) {
        self.events.lock().unwrap().push(Notification::Rejected(count));
    }
}

/// A running intake wired to a scripted recognizer and a recording notifier.
pub struct TestIntake {
    pub intake: Intake,
    pub recognizer: Arc<ScriptedRecognizer>,
    pub notifier: Arc<RecordingNotifier>,
    pub shutdown: watch::Sender<bool>,
}

pub fn spawn_intake(recognizer: ScriptedRecognizer) -> TestIntake {
    spawn_intake_with(Config::default(), recognizer)
}

pub fn spawn_intake_with(config: Config, recognizer: ScriptedRecognizer) -> TestIntake {
    let recognizer = Arc::new(recognizer);
    let notifier = Arc::new(RecordingNotifier::default());
    let (shutdown, shutdown_rx) = watch::channel(false);

    let intake = invoice_intake::build_intake(
        &config,
        recognizer.clone(),
        notifier.clone(),
        shutdown_rx,
    );

    TestIntake {
        intake,
        recognizer,
        notifier,
        shutdown,
    }
}

pub fn paths(raw: &[&str]) -> Vec<PathBuf> {
    raw.iter().map(PathBuf::from).collect()
}

/// Stand-in for the OCR vendor: answers the token endpoint with a fixed token
/// and the invoice endpoint with the configured status and body.
pub struct FakeOcr {
    pub addr: SocketAddr,
    pub token_requests: Arc<AtomicUsize>,
    pub ocr_requests: Arc<AtomicUsize>,
}

impl FakeOcr {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

#[derive(Clone)]
struct FakeOcrState {
    token_requests: Arc<AtomicUsize>,
    ocr_requests: Arc<AtomicUsize>,
    ocr_status: StatusCode,
    ocr_body: &'static str,
}

pub async fn spawn_fake_ocr(ocr_status: u16, ocr_body: &'static str) -> FakeOcr {
    let state = FakeOcrState {
        token_requests: Arc::new(AtomicUsize::new(0)),
        ocr_requests: Arc::new(AtomicUsize::new(0)),
        ocr_status: StatusCode::from_u16(ocr_status).expect("Invalid status code"),
        ocr_body,
    };

    let app = Router::new()
        .route("/oauth/2.0/token", post(token))
        .route("/rest/2.0/ocr/v1/vat_invoice", post(vat_invoice))
        .with_state(state.clone());

    // Bind to random port
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake OCR server");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("Fake OCR server failed");
    });

    FakeOcr {
        addr,
        token_requests: state.token_requests,
        ocr_requests: state.ocr_requests,
    }
}

async fn token(State(state): State<FakeOcrState>) -> Json<serde_json::Value> {
    state.token_requests.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "access_token": "test-token", "expires_in": 2592000 }))
}

async fn vat_invoice(State(state): State<FakeOcrState>) -> impl IntoResponse {
    state.ocr_requests.fetch_add(1, Ordering::SeqCst);
    (
        state.ocr_status,
        [(header::CONTENT_TYPE, "application/json")],
        state.ocr_body,
    )
}
