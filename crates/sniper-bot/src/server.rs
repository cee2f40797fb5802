//! 신호 수신(ping) 서버.
//!
//! # 엔드포인트
//!
//! - `GET /ping?text=...` - 신호 1건 수신
//! - `POST /ping` - 신호 1건 수신 (본문 `{"text": "..."}`는 선택)
//! - `GET /status` - 마지막 신호와 최근 10건
//! - `GET /` - 사용법 안내
//!
//! 엔진과 공유하는 상태는 [`SignalCounter`]뿐입니다.

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
};

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sniper_core::SignalCounter;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::Result;

/// 보관할 최근 신호 수
const MAX_PAYLOADS: usize = 50;

/// `/status`에 노출할 최근 신호 수
const STATUS_PAYLOADS: usize = 10;

const NO_TEXT: &str = "No text provided";

// ==================== 요청/응답 타입 ====================

/// GET 쿼리
#[derive(Debug, Default, Deserialize)]
pub struct PingQuery {
    pub text: Option<String>,
}

/// POST 본문
#[derive(Debug, Default, Deserialize)]
pub struct PingBody {
    pub text: Option<String>,
}

/// 신호 수신 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub count: u64,
    pub message: String,
}

/// 수신 기록 1건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingPayload {
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

/// 상태 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingStatus {
    pub last_ping: Option<DateTime<Utc>>,
    pub count: u64,
    pub last_text: Option<String>,
    pub recent_payloads: Vec<PingPayload>,
}

// ==================== 상태 ====================

#[derive(Debug, Default)]
struct PingLog {
    last_ping: Option<DateTime<Utc>>,
    last_text: Option<String>,
    payloads: VecDeque<PingPayload>,
}

/// 서버 공유 상태
#[derive(Debug)]
pub struct PingState {
    signals: SignalCounter,
    log: Mutex<PingLog>,
}

impl PingState {
    pub fn new(signals: SignalCounter) -> Self {
        Self {
            signals,
            log: Mutex::new(PingLog::default()),
        }
    }

    pub fn signals(&self) -> &SignalCounter {
        &self.signals
    }

    /// 신호 1건 기록 후 카운터 증가
    pub fn record(&self, text: Option<String>) -> PingResponse {
        let text = text.filter(|t| !t.is_empty());
        let now = Utc::now();

        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(text) = &text {
            log.last_text = Some(text.clone());
        }
        let text = text.unwrap_or_else(|| NO_TEXT.to_string());

        log.last_ping = Some(now);
        log.payloads.push_back(PingPayload {
            timestamp: now,
            text: text.clone(),
        });
        while log.payloads.len() > MAX_PAYLOADS {
            log.payloads.pop_front();
        }
        let count = self.signals.increment();
        drop(log);

        info!(count, text = %text, "신호 수신");

        PingResponse {
            status: "success".to_string(),
            timestamp: now,
            count,
            message: format!("Received: {}", text),
        }
    }

    /// 현재 상태
    pub fn status(&self) -> PingStatus {
        let log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = log.payloads.len().saturating_sub(STATUS_PAYLOADS);
        PingStatus {
            last_ping: log.last_ping,
            count: self.signals.current(),
            last_text: log.last_text.clone(),
            recent_payloads: log.payloads.iter().skip(skip).cloned().collect(),
        }
    }

    /// 보관 중인 기록 수
    pub fn stored_payloads(&self) -> usize {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .payloads
            .len()
    }
}

// ==================== 핸들러 ====================

async fn ping_get(
    State(state): State<Arc<PingState>>,
    Query(query): Query<PingQuery>,
) -> Json<PingResponse> {
    Json(state.record(query.text))
}

/// 본문이 없거나 JSON이 아니어도 신호로 처리합니다.
async fn ping_post(State(state): State<Arc<PingState>>, body: Bytes) -> Json<PingResponse> {
    let text = serde_json::from_slice::<PingBody>(&body)
        .ok()
        .and_then(|b| b.text);
    Json(state.record(text))
}

async fn status(State(state): State<Arc<PingState>>) -> Json<PingStatus> {
    Json(state.status())
}

async fn home() -> Html<&'static str> {
    Html(
        r#"<h1>SniperX Ping Server</h1>
<p>Send POST requests to /ping with an optional JSON payload:</p>
<pre>{"text": "your message here"}</pre>
<p>or GET /ping?text=your+message</p>
<p><a href="/status">Check Status</a></p>
"#,
    )
}

/// 라우터 생성
pub fn router(state: Arc<PingState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/ping", get(ping_get).post(ping_post))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 서버 실행. `shutdown`이 취소되면 진행 중인 요청을 마치고 종료합니다.
pub async fn serve(
    addr: SocketAddr,
    state: Arc<PingState>,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "신호 수신 서버 시작");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("신호 수신 서버 종료");
    Ok(())
}
