//! 거래 기록 (감사 로그).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 거래 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeKind {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeKind::Buy => write!(f, "BUY"),
            TradeKind::Sell => write!(f, "SELL"),
        }
    }
}

/// 원장 변경 1건에 대한 불변 기록.
///
/// 성공한 매수/매도마다 정확히 한 번 생성되며 이후 수정/삭제되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// 기록 ID
    pub id: Uuid,
    /// 체결 시각
    pub timestamp: DateTime<Utc>,
    /// 거래 방향
    pub kind: TradeKind,
    /// 종목 키
    pub instrument: String,
    /// 수량
    #[serde(with = "rust_decimal::serde::str")]
    pub shares: Decimal,
    /// 매수 비용 또는 매도 대금
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    /// 주당 가격 (amount / shares)
    #[serde(with = "rust_decimal::serde::str")]
    pub price_per_share: Decimal,
    /// 거래 후 잔고
    #[serde(with = "rust_decimal::serde::str")]
    pub balance_after: Decimal,
    /// 실현 손익 (매도만)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::str_option"
    )]
    pub profit_loss: Option<Decimal>,
}

impl TradeRecord {
    /// 매수 기록 생성.
    pub fn buy(
        instrument: impl Into<String>,
        shares: Decimal,
        amount: Decimal,
        balance_after: Decimal,
    ) -> Self {
        Self::build(TradeKind::Buy, instrument, shares, amount, balance_after, None)
    }

    /// 매도 기록 생성.
    pub fn sell(
        instrument: impl Into<String>,
        shares: Decimal,
        amount: Decimal,
        balance_after: Decimal,
        profit_loss: Decimal,
    ) -> Self {
        Self::build(
            TradeKind::Sell,
            instrument,
            shares,
            amount,
            balance_after,
            Some(profit_loss),
        )
    }

    fn build(
        kind: TradeKind,
        instrument: impl Into<String>,
        shares: Decimal,
        amount: Decimal,
        balance_after: Decimal,
        profit_loss: Option<Decimal>,
    ) -> Self {
        let price_per_share = amount.checked_div(shares).unwrap_or(Decimal::ZERO);

        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            instrument: instrument.into(),
            shares,
            amount,
            price_per_share,
            balance_after,
            profit_loss,
        }
    }
}
