//! Test Helper Utilities
//!
//! Mock reply endpoint and an observer that records everything it is told.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use replyscope::cloud::glyphs::BitmapGlyphs;
use replyscope::cloud::WordCloud;
use replyscope_common::config::{ApiConfig, CloudConfig, PngCompression};
use replyscope_common::events::{PipelineObserver, RunState};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const REPLY_ROUTE: &str = "/api/v3/search/getreply";

/// How the mock answers a given page
#[derive(Debug, Clone)]
pub enum PageFailure {
    /// Non-success HTTP status
    Status(u16),
    /// HTTP 200 with a non-zero application code
    Code(i64),
    /// HTTP 200 with a body that is not JSON
    Garbage,
}

/// One request as seen by the mock
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub uid: String,
    pub page_number: u32,
    pub page_size: u32,
    pub mode: String,
}

struct MockState {
    pages: Vec<Vec<Value>>,
    failures: HashMap<u32, PageFailure>,
    requests: Mutex<Vec<SeenRequest>>,
}

/// Local HTTP server standing in for the reply endpoint
pub struct MockReplyServer {
    base_url: String,
    state: Arc<MockState>,
}

impl MockReplyServer {
    /// Serve `pages` in order; the last page is flagged as the end
    pub async fn start(pages: Vec<Vec<Value>>) -> Self {
        Self::start_with_failures(pages, HashMap::new()).await
    }

    pub async fn start_with_failures(
        pages: Vec<Vec<Value>>,
        failures: HashMap<u32, PageFailure>,
    ) -> Self {
        let state = Arc::new(MockState {
            pages,
            failures,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route(REPLY_ROUTE, get(serve_page))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}{REPLY_ROUTE}"),
            state,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn page_numbers(&self) -> Vec<u32> {
        self.requests().iter().map(|r| r.page_number).collect()
    }

    /// Fetch settings pointing at this server, without the polite delay
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            base_url: self.base_url.clone(),
            page_delay_ms: 0,
            request_timeout_secs: 5,
            ..ApiConfig::default()
        }
    }
}

async fn serve_page(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let seen = SeenRequest {
        uid: params.get("uid").cloned().unwrap_or_default(),
        page_number: params.get("pn").and_then(|v| v.parse().ok()).unwrap_or(0),
        page_size: params.get("ps").and_then(|v| v.parse().ok()).unwrap_or(0),
        mode: params.get("mode").cloned().unwrap_or_default(),
    };
    let page_number = seen.page_number;
    state.requests.lock().unwrap().push(seen);

    match state.failures.get(&page_number) {
        Some(PageFailure::Status(status)) => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, "upstream unavailable").into_response();
        }
        Some(PageFailure::Code(code)) => {
            return Json(json!({"code": code, "message": "rate limited", "data": null}))
                .into_response();
        }
        Some(PageFailure::Garbage) => {
            return (StatusCode::OK, "<html>not json</html>").into_response();
        }
        None => {}
    }

    let index = page_number.saturating_sub(1) as usize;
    let replies = state.pages.get(index).cloned().unwrap_or_default();
    let is_end = index + 1 >= state.pages.len();

    Json(json!({
        "code": 0,
        "data": {
            "replies": replies,
            "cursor": {"is_end": is_end, "all_count": state.pages.iter().map(Vec::len).sum::<usize>()}
        }
    }))
    .into_response()
}

/// `count` reply records numbered from `first_id`
pub fn reply_records(first_id: u64, count: usize) -> Vec<Value> {
    (0..count as u64)
        .map(|i| {
            let rpid = first_id + i;
            json!({
                "rpid": rpid,
                "message": format!("reply {rpid} about rust and tokio [doge]"),
                "time": 1_700_000_000 + rpid,
                "dyn": {"oid": rpid.to_string(), "type": 1}
            })
        })
        .collect()
}

/// Split `total` records into pages of at most `page_size`
pub fn paged_records(total: usize, page_size: usize) -> Vec<Vec<Value>> {
    let all = reply_records(1, total);
    all.chunks(page_size).map(<[Value]>::to_vec).collect()
}

/// Canvas small enough to keep rendering fast
pub fn small_cloud_config() -> CloudConfig {
    CloudConfig {
        width: 320,
        height: 160,
        min_font_size: 8,
        max_font_size: 48,
        compression: PngCompression::Fast,
        ..CloudConfig::default()
    }
}

/// Renderer on the small canvas with the built-in glyphs, independent of
/// installed fonts
pub fn bitmap_cloud() -> WordCloud {
    WordCloud::with_glyphs(small_cloud_config(), Box::new(BitmapGlyphs)).unwrap()
}

/// Everything an observer was told, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Log(String),
    Progress(String),
    State(RunState, RunState),
}

#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Observed> {
        self.seen.lock().unwrap().clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Observed::Log(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn progress_lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Observed::Progress(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<RunState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Observed::State(_, new) => Some(new),
                _ => None,
            })
            .collect()
    }
}

impl PipelineObserver for RecordingObserver {
    fn log(&self, _run_id: Uuid, message: &str) {
        self.seen.lock().unwrap().push(Observed::Log(message.to_string()));
    }

    fn progress(&self, _run_id: Uuid, message: &str) {
        self.seen
            .lock()
            .unwrap()
            .push(Observed::Progress(message.to_string()));
    }

    fn state_changed(&self, _run_id: Uuid, old: RunState, new: RunState) {
        self.seen.lock().unwrap().push(Observed::State(old, new));
    }
}
