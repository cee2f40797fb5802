//! Polymarket CLOB 호가 클라이언트.
//!
//! 인증 없는 공개 엔드포인트 `GET {base}/book?token_id=...`만 사용합니다.
//! 응답의 `bids`/`asks` 외 필드는 사용하지 않습니다.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use sniper_core::{BookSource, OrderBook, ProviderError};
use tracing::debug;

/// Polymarket CLOB 기본 URL
pub const DEFAULT_BASE_URL: &str = "https://clob.polymarket.com";

/// 기본 요청 타임아웃
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// 클라이언트
// ============================================================================

/// Polymarket 호가 클라이언트.
#[derive(Debug, Clone)]
pub struct PolymarketClient {
    client: Client,
    base_url: String,
}

impl PolymarketClient {
    /// 새 클라이언트 생성.
    ///
    /// 모든 요청은 `timeout` 안에 끝나지 않으면 [`ProviderError::Network`]로 실패합니다.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// 기본 URL/타임아웃으로 생성.
    pub fn with_defaults() -> Result<Self, ProviderError> {
        Self::new(DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 원시 호가 JSON 조회.
    pub async fn fetch_raw_book(&self, token_id: &str) -> Result<Value, ProviderError> {
        let url = format!("{}/book", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("token_id", token_id)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Network(format!("요청 타임아웃: {}", e))
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Api(format!(
                "Polymarket API Error ({}): {}",
                status, error_text
            )));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if !body.is_object() {
            return Err(ProviderError::Parse(format!(
                "호가 응답이 객체가 아님: {}",
                body
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl BookSource for PolymarketClient {
    async fn fetch_book(&self, token_id: &str) -> Result<OrderBook, ProviderError> {
        let body = self.fetch_raw_book(token_id).await?;
        let book = OrderBook::from_json(token_id, &body);

        debug!(
            token_id = %token_id,
            bids = book.bids.len(),
            asks = book.asks.len(),
            best_bid = ?book.best_bid().map(|l| l.price),
            best_ask = ?book.best_ask().map(|l| l.price),
            "호가 조회 완료"
        );
        Ok(book)
    }
}
