//! SniperX 호가 데이터 커넥터.
//!
//! [`sniper_core::BookSource`] 구현체를 제공합니다.
//!
//! - [`PolymarketClient`]: Polymarket CLOB REST API (`GET /book`)

pub mod connector;

pub use connector::polymarket::{PolymarketClient, DEFAULT_BASE_URL};
