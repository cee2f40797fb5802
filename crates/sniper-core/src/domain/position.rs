//! 포지션 (보유 수량 + 원가).
//!
//! 평균 단가는 저장 값이 아니라 파생 값입니다. 모든 변경 경로에서
//! `total_invested / shares`로 다시 계산되며 외부에서 직접 설정할 수 없습니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 종목별 보유 포지션.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PositionRecord", into = "PositionRecord")]
pub struct Position {
    shares: Decimal,
    total_invested: Decimal,
    avg_cost: Decimal,
}

/// 영속화용 포지션 표현.
///
/// `avg_cost`는 사람이 읽기 위해 기록되지만 로드 시 무시되고 다시 계산됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRecord {
    #[serde(with = "rust_decimal::serde::str")]
    pub shares: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_invested: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub avg_cost: Option<Decimal>,
}

impl Position {
    /// 빈 포지션 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 수량과 투자 원금으로 포지션 생성.
    ///
    /// 음수 값이거나 수량 0에 원금이 남아 있으면 `None`.
    pub fn from_parts(shares: Decimal, total_invested: Decimal) -> Option<Self> {
        if shares < Decimal::ZERO || total_invested < Decimal::ZERO {
            return None;
        }
        if shares.is_zero() && !total_invested.is_zero() {
            return None;
        }
        Some(Self {
            shares,
            total_invested,
            avg_cost: average_cost(shares, total_invested)?,
        })
    }

    /// 보유 수량
    pub fn shares(&self) -> Decimal {
        self.shares
    }

    /// 보유 수량에 귀속된 누적 원가
    pub fn total_invested(&self) -> Decimal {
        self.total_invested
    }

    /// 평균 단가 (수량이 0이면 0)
    pub fn avg_cost(&self) -> Decimal {
        self.avg_cost
    }

    /// 보유 중인지 확인 (수량 > 0).
    pub fn is_open(&self) -> bool {
        self.shares > Decimal::ZERO
    }

    /// 매수 반영.
    ///
    /// 누적 수량/원가 또는 평균 단가가 `Decimal` 범위를 넘으면
    /// 포지션을 바꾸지 않고 `false`를 반환합니다.
    #[must_use]
    pub fn apply_buy(&mut self, shares: Decimal, cost: Decimal) -> bool {
        let next = self.shares.checked_add(shares).and_then(|next_shares| {
            let next_invested = self.total_invested.checked_add(cost)?;
            let next_avg = average_cost(next_shares, next_invested)?;
            Some((next_shares, next_invested, next_avg))
        });

        match next {
            Some((shares, total_invested, avg_cost)) => {
                self.shares = shares;
                self.total_invested = total_invested;
                self.avg_cost = avg_cost;
                true
            }
            None => false,
        }
    }

    /// 매도 반영. 매도 수량에 비례 배분된 원가를 반환합니다.
    ///
    /// 호출자는 `shares <= self.shares()`를 보장해야 합니다.
    pub fn apply_sell(&mut self, shares: Decimal) -> Decimal {
        let invested_in_sold = if self.shares.is_zero() {
            Decimal::ZERO
        } else if shares >= self.shares {
            self.total_invested
        } else {
            shares / self.shares * self.total_invested
        };

        self.shares -= shares.min(self.shares);
        self.total_invested -= invested_in_sold;
        if self.shares.is_zero() {
            self.total_invested = Decimal::ZERO;
        }
        self.avg_cost = average_cost(self.shares, self.total_invested).unwrap_or(self.avg_cost);
        invested_in_sold
    }

    /// `avg_cost * shares`와 `total_invested`의 차이가 허용 오차 이내인지 확인.
    pub fn is_consistent(&self, tolerance: Decimal) -> bool {
        if self.shares.is_zero() {
            return self.total_invested.is_zero() && self.avg_cost.is_zero();
        }
        (self.avg_cost * self.shares - self.total_invested).abs() <= tolerance
    }

}

/// 평균 단가 (수량 0이면 0, 나눗셈 오버플로 시 `None`)
fn average_cost(shares: Decimal, total_invested: Decimal) -> Option<Decimal> {
    if shares > Decimal::ZERO {
        total_invested.checked_div(shares)
    } else {
        Some(Decimal::ZERO)
    }
}

impl TryFrom<PositionRecord> for Position {
    type Error = String;

    fn try_from(record: PositionRecord) -> Result<Self, Self::Error> {
        Position::from_parts(record.shares, record.total_invested).ok_or_else(|| {
            format!(
                "잘못된 포지션: shares={}, total_invested={}",
                record.shares, record.total_invested
            )
        })
    }
}

impl From<Position> for PositionRecord {
    fn from(position: Position) -> Self {
        Self {
            shares: position.shares,
            total_invested: position.total_invested,
            avg_cost: Some(position.avg_cost),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_buy_recomputes_avg_cost() {
        let mut position = Position::new();
        assert!(position.apply_buy(dec!(10), dec!(5)));
        assert_eq!(position.avg_cost(), dec!(0.5));

        assert!(position.apply_buy(dec!(10), dec!(7)));
        assert_eq!(position.shares(), dec!(20));
        assert_eq!(position.total_invested(), dec!(12));
        assert_eq!(position.avg_cost(), dec!(0.6));
    }

    #[test]
    fn test_partial_sell_allocates_proportionally() {
        let mut position = Position::new();
        assert!(position.apply_buy(dec!(20), dec!(12)));

        let invested_in_sold = position.apply_sell(dec!(5));
        assert_eq!(invested_in_sold, dec!(3));
        assert_eq!(position.shares(), dec!(15));
        assert_eq!(position.total_invested(), dec!(9));
        assert_eq!(position.avg_cost(), dec!(0.6));
    }

    #[test]
    fn test_full_sell_zeroes_position() {
        let mut position = Position::new();
        assert!(position.apply_buy(dec!(3), dec!(1)));

        let invested_in_sold = position.apply_sell(dec!(3));
        assert_eq!(invested_in_sold, dec!(1));
        assert!(!position.is_open());
        assert_eq!(position.total_invested(), Decimal::ZERO);
        assert_eq!(position.avg_cost(), Decimal::ZERO);
        assert!(position.is_consistent(Decimal::ZERO));
    }

    #[test]
    fn test_from_parts_rejects_invalid() {
        assert!(Position::from_parts(dec!(-1), dec!(0)).is_none());
        assert!(Position::from_parts(dec!(0), dec!(2)).is_none());
        assert!(Position::from_parts(dec!(0), dec!(0)).is_some());
    }

    #[test]
    fn test_deserialize_ignores_stored_avg_cost() {
        let json = r#"{"shares":"4","total_invested":"2","avg_cost":"9.99"}"#;
        let position: Position = serde_json::from_str(json).unwrap();
        assert_eq!(position.avg_cost(), dec!(0.5));
    }

    #[test]
    fn test_deserialize_rejects_negative_shares() {
        let json = r#"{"shares":"-4","total_invested":"2"}"#;
        assert!(serde_json::from_str::<Position>(json).is_err());
    }

    #[test]
    fn test_buy_overflow_leaves_position_unchanged() {
        let mut position = Position::new();
        assert!(position.apply_buy(Decimal::MAX, dec!(1)));
        assert!(!position.apply_buy(dec!(1), dec!(1)));
        assert_eq!(position.shares(), Decimal::MAX);
        assert_eq!(position.total_invested(), dec!(1));
    }
}
