//! 호가창(OrderBook) 도메인 타입.
//!
//! 거래소 응답의 가격/잔량은 문자열 또는 숫자로 올 수 있습니다.
//! [`OrderBook::from_json`]은 파싱할 수 없거나 양수가 아닌 레벨을 조용히 버립니다.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// 호가 레벨 (가격, 잔량).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    /// 가격
    pub price: Decimal,
    /// 잔량
    pub size: Decimal,
}

impl BookLevel {
    /// 새 호가 레벨 생성.
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    /// 가격과 잔량이 모두 양수인지 확인.
    pub fn is_usable(&self) -> bool {
        self.price > Decimal::ZERO && self.size > Decimal::ZERO
    }

    /// 레벨 총액 (가격 × 잔량).
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }

    /// 원시 JSON 레벨 파싱.
    ///
    /// `{"price": "0.52", "size": "100"}` 형태를 기대하며,
    /// 값이 없거나 파싱 불가/양수가 아니면 `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let price = value.get("price").and_then(parse_decimal)?;
        let size = value.get("size").and_then(parse_decimal)?;
        let level = Self::new(price, size);
        level.is_usable().then_some(level)
    }
}

/// 호가창 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    /// 토큰(자산) ID
    pub asset_id: String,
    /// 매수 호가
    pub bids: Vec<BookLevel>,
    /// 매도 호가
    pub asks: Vec<BookLevel>,
    /// 수신 시각
    pub timestamp: DateTime<Utc>,
}

impl OrderBook {
    /// 레벨 목록으로 호가창 생성.
    pub fn new(asset_id: impl Into<String>, bids: Vec<BookLevel>, asks: Vec<BookLevel>) -> Self {
        Self {
            asset_id: asset_id.into(),
            bids,
            asks,
            timestamp: Utc::now(),
        }
    }

    /// 거래소 JSON 응답에서 호가창 생성.
    ///
    /// `bids`/`asks` 배열이 없으면 빈 목록으로 취급합니다.
    pub fn from_json(asset_id: impl Into<String>, body: &Value) -> Self {
        let asset_id = asset_id.into();
        let bids = parse_side(body.get("bids"));
        let asks = parse_side(body.get("asks"));
        Self::new(asset_id, bids, asks)
    }

    /// 최우선 매수 호가 (가장 높은 bid).
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.iter().max_by(|a, b| a.price.cmp(&b.price))
    }

    /// 최우선 매도 호가 (가장 낮은 ask).
    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.iter().min_by(|a, b| a.price.cmp(&b.price))
    }

    /// 스프레드 (best ask - best bid).
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }

    /// 양쪽 모두 비어 있는지 확인.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

fn parse_side(levels: Option<&Value>) -> Vec<BookLevel> {
    let Some(Value::Array(items)) = levels else {
        return Vec::new();
    };

    let parsed: Vec<BookLevel> = items.iter().filter_map(BookLevel::from_json).collect();
    if parsed.len() < items.len() {
        debug!(
            dropped = items.len() - parsed.len(),
            "잘못된 호가 레벨 제외"
        );
    }
    parsed
}

fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .ok()
                .or_else(|| Decimal::from_scientific(s).ok())
        }
        Value::Number(n) => {
            let repr = n.to_string();
            Decimal::from_str(&repr)
                .ok()
                .or_else(|| Decimal::from_scientific(&repr).ok())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_json_string_levels() {
        let body = json!({
            "bids": [{"price": "0.48", "size": "120"}],
            "asks": [{"price": "0.52", "size": "80.5"}]
        });

        let book = OrderBook::from_json("token", &body);
        assert_eq!(book.bids, vec![BookLevel::new(dec!(0.48), dec!(120))]);
        assert_eq!(book.asks, vec![BookLevel::new(dec!(0.52), dec!(80.5))]);
        assert_eq!(book.spread(), Some(dec!(0.04)));
    }

    #[test]
    fn test_from_json_drops_malformed_levels() {
        let body = json!({
            "bids": [
                {"price": "abc", "size": "10"},
                {"price": "0.40", "size": "0"},
                {"price": 0.45, "size": 30},
                {"size": "5"},
                "garbage"
            ],
            "asks": [{"price": "-0.1", "size": "5"}]
        });

        let book = OrderBook::from_json("token", &body);
        assert_eq!(book.bids, vec![BookLevel::new(dec!(0.45), dec!(30))]);
        assert!(book.asks.is_empty());
    }

    #[test]
    fn test_from_json_missing_sides() {
        let book = OrderBook::from_json("token", &json!({"market": "x"}));
        assert!(book.is_empty());
        assert_eq!(book.spread(), None);
    }

    #[test]
    fn test_best_levels_unsorted_input() {
        let book = OrderBook::new(
            "token",
            vec![
                BookLevel::new(dec!(0.41), dec!(1)),
                BookLevel::new(dec!(0.47), dec!(1)),
            ],
            vec![
                BookLevel::new(dec!(0.60), dec!(1)),
                BookLevel::new(dec!(0.55), dec!(1)),
            ],
        );
        assert_eq!(book.best_bid().map(|l| l.price), Some(dec!(0.47)));
        assert_eq!(book.best_ask().map(|l| l.price), Some(dec!(0.55)));
    }
}
