//! SniperX 핵심 도메인.
//!
//! 이 crate는 다음을 제공합니다:
//! - 호가창/체결/포지션/거래 기록 도메인 타입
//! - 호가 데이터 제공자 추상화 ([`BookSource`])
//! - 외부 신호 카운터 ([`SignalCounter`])
//!
//! 실행 로직(체결 시뮬레이션, 원장, 청산 타이머)은 `sniper-execution`에 있습니다.

pub mod domain;
pub mod provider;
pub mod signal;

pub use domain::{
    BookLevel, Fill, Instrument, OrderBook, Position, PositionRecord, TradeKind, TradeRecord,
};
pub use provider::{BookSource, ProviderError};
pub use signal::{SignalCounter, SignalCursor};
