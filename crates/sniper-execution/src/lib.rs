//! SniperX 실행 계층.
//!
//! 이 crate는 다음을 제공합니다:
//! - 호가창 체결 시뮬레이션 ([`simulate_buy`], [`simulate_sell`])
//! - 잔고/포지션 원장 ([`Ledger`])과 영속화 ([`JsonFileStore`], [`MemoryStore`])
//! - 거래 기록 ([`JsonLinesRecorder`], [`MemoryRecorder`])
//! - 종목별 청산 타이머 ([`LiquidationTimer`])
//! - 신호 → 매수 → 타이머 → 청산을 묶는 매매 엔진 ([`Engine`])

pub mod engine;
pub mod fill;
pub mod ledger;
pub mod recorder;
pub mod timer;

pub use engine::{Engine, EngineConfig, Liquidation, LiquidationError, TickReport};
pub use fill::{simulate_buy, simulate_sell, BuyPlan, SellPlan};
pub use ledger::{
    JsonFileStore, Ledger, LedgerError, LedgerState, LedgerStore, MemoryStore, SellOutcome,
    StoreError,
};
pub use recorder::{JsonLinesRecorder, MemoryRecorder, RecorderError, TradeRecorder};
pub use timer::{LiquidationTimer, SignalOutcome, TimerState, UntrackedPositionPolicy};
