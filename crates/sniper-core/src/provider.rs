//! 호가 데이터 제공자 추상화.
//!
//! 엔진은 특정 거래소에 의존하지 않고 [`BookSource`] trait만 사용합니다.
//! 조회 실패는 "이번 주기에 데이터 없음"으로 취급되며 치명적이지 않습니다.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::OrderBook;

/// 호가 조회 에러.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// API 에러 (비정상 HTTP 상태)
    #[error("API 에러: {0}")]
    Api(String),

    /// 응답 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 데이터 없음
    #[error("데이터 없음: {0}")]
    Unavailable(String),
}

/// 호가 데이터 제공자 trait.
///
/// 구현체는 자체 타임아웃으로 호출 시간을 제한해야 합니다.
#[async_trait]
pub trait BookSource: Send + Sync {
    /// 토큰 ID의 현재 호가창 조회.
    async fn fetch_book(&self, token_id: &str) -> Result<OrderBook, ProviderError>;
}

#[async_trait]
impl<T: BookSource + ?Sized> BookSource for Arc<T> {
    async fn fetch_book(&self, token_id: &str) -> Result<OrderBook, ProviderError> {
        (**self).fetch_book(token_id).await
    }
}
