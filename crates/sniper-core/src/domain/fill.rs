use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 단일 호가 레벨에 대한 가상 체결.
///
/// 체결 시뮬레이터가 생성하고 엔진이 즉시 소비합니다. 단독으로 저장되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// 체결 가격
    pub price: Decimal,
    /// 체결 수량
    pub quantity: Decimal,
    /// 체결 금액
    pub notional: Decimal,
}

impl Fill {
    /// 가격 × 수량으로 체결 금액을 계산하여 생성.
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self {
            price,
            quantity,
            notional: price * quantity,
        }
    }
}
