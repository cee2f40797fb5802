//! 에러 타입 정의.

use sniper_core::ProviderError;
use sniper_execution::{LedgerError, LiquidationError, StoreError};
use thiserror::Error;

/// 봇 에러 타입
#[derive(Debug, Error)]
pub enum BotError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 원장 에러
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// 원장 저장소 에러
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 호가 데이터 에러
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// 청산 에러
    #[error(transparent)]
    Liquidation(#[from] LiquidationError),

    /// 입출력 에러 (서버 바인딩 등)
    #[error("입출력 에러: {0}")]
    Io(#[from] std::io::Error),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, BotError>;
