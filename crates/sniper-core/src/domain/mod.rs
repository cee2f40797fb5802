//! 도메인 타입.

mod book;
mod fill;
mod instrument;
mod position;
mod trade;

pub use book::{BookLevel, OrderBook};
pub use fill::Fill;
pub use instrument::Instrument;
pub use position::{Position, PositionRecord};
pub use trade::{TradeKind, TradeRecord};
