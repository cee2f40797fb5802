//! SniperX 봇.
//!
//! - [`config`]: 설정 파일/환경변수 로드
//! - [`server`]: 신호 수신(ping) HTTP 서버
//! - [`daemon`]: 서버와 엔진 루프 실행
//! - [`stats`]: 엔진 실행 통계
//! - [`report`]: CLI 출력 포맷

pub mod config;
pub mod daemon;
pub mod error;
pub mod report;
pub mod server;
pub mod stats;

pub use config::{BotConfig, RuntimeConfig, TradingConfig};
pub use error::{BotError, Result};
pub use stats::CycleStats;
