//! 호가창 기반 체결 시뮬레이터.
//!
//! 시장가 주문을 호가 레벨 순서대로 소진하며 부분 체결 목록을 계산합니다.
//!
//! - 매수: 예산 제약, ask 레벨 오름차순 (최우선 가격부터)
//! - 매도: 수량 제약, bid 레벨 내림차순 (최우선 가격부터)
//!
//! 순수 함수이며 상태가 없습니다. 가격/잔량이 양수가 아닌 레벨은 건너뛰고,
//! 사용할 레벨이 없으면 빈 결과를 반환합니다 (에러 아님).

use rust_decimal::Decimal;
use sniper_core::{BookLevel, Fill};
use tracing::warn;

/// 매수 체결 계획.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuyPlan {
    /// 레벨별 체결 (가격 오름차순)
    pub fills: Vec<Fill>,
    /// 총 매수 수량
    pub total_shares: Decimal,
    /// 총 비용 (예산 이하)
    pub total_cost: Decimal,
}

impl BuyPlan {
    /// 체결이 하나도 없는지 확인.
    pub fn is_empty(&self) -> bool {
        self.fills.is_empty() || self.total_shares.is_zero()
    }

    /// 평균 체결가
    pub fn average_price(&self) -> Option<Decimal> {
        (!self.total_shares.is_zero()).then(|| self.total_cost / self.total_shares)
    }
}

/// 매도 체결 계획.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SellPlan {
    /// 레벨별 체결 (가격 내림차순)
    pub fills: Vec<Fill>,
    /// 총 매도 대금
    pub total_proceeds: Decimal,
    /// 실제 체결 수량 (요청 수량 이하)
    pub filled_quantity: Decimal,
    /// 요청 수량
    pub requested_quantity: Decimal,
}

impl SellPlan {
    /// 체결이 하나도 없는지 확인.
    pub fn is_empty(&self) -> bool {
        self.fills.is_empty() || self.filled_quantity.is_zero()
    }

    /// 요청 수량 전부 체결 여부
    pub fn is_complete(&self) -> bool {
        !self.is_empty() && self.filled_quantity >= self.requested_quantity
    }

    /// 호가 부족으로 체결되지 못한 수량
    pub fn shortfall(&self) -> Decimal {
        (self.requested_quantity - self.filled_quantity).max(Decimal::ZERO)
    }
}

/// 예산 내 매수 시뮬레이션.
///
/// 각 레벨에서 `min(잔량, 남은 예산 / 가격)`만큼 체결합니다.
/// 예산이 레벨 안에서 소진되면 해당 체결 금액은 남은 예산과 정확히 같으므로
/// 총 비용은 항상 예산 이하입니다.
pub fn simulate_buy(budget: Decimal, asks: &[BookLevel]) -> BuyPlan {
    let mut plan = BuyPlan::default();
    if budget <= Decimal::ZERO {
        return plan;
    }

    let mut levels: Vec<BookLevel> = asks.iter().copied().filter(BookLevel::is_usable).collect();
    levels.sort_by(|a, b| a.price.cmp(&b.price));

    let mut remaining = budget;
    for level in levels {
        if remaining <= Decimal::ZERO {
            break;
        }

        let fill = match level.price.checked_mul(level.size) {
            Some(cost) if cost <= remaining => Fill::new(level.price, level.size),
            _ => {
                // 예산이 이 레벨 안에서 소진됨
                let Some(quantity) = remaining.checked_div(level.price) else {
                    continue;
                };
                Fill {
                    price: level.price,
                    quantity,
                    notional: remaining,
                }
            }
        };

        if fill.quantity <= Decimal::ZERO {
            continue;
        }

        let (Some(total_shares), Some(total_cost)) = (
            plan.total_shares.checked_add(fill.quantity),
            plan.total_cost.checked_add(fill.notional),
        ) else {
            warn!(price = %fill.price, quantity = %fill.quantity, "매수 누적값 오버플로, 이후 레벨 무시");
            break;
        };

        remaining -= fill.notional;
        plan.total_shares = total_shares;
        plan.total_cost = total_cost;
        plan.fills.push(fill);
    }

    plan
}

/// 지정 수량 매도 시뮬레이션.
///
/// 호가 잔량이 부족하면 `filled_quantity < quantity`인 부분 체결 결과를 반환합니다.
/// 부족분 처리 정책은 호출자(엔진)가 결정합니다.
pub fn simulate_sell(quantity: Decimal, bids: &[BookLevel]) -> SellPlan {
    let mut plan = SellPlan {
        requested_quantity: quantity.max(Decimal::ZERO),
        ..Default::default()
    };
    if quantity <= Decimal::ZERO {
        return plan;
    }

    let mut levels: Vec<BookLevel> = bids.iter().copied().filter(BookLevel::is_usable).collect();
    levels.sort_by(|a, b| b.price.cmp(&a.price));

    let mut remaining = quantity;
    for level in levels {
        if remaining <= Decimal::ZERO {
            break;
        }

        let shares_at_level = level.size.min(remaining);
        let Some(proceeds) = level.price.checked_mul(shares_at_level) else {
            continue;
        };

        let (Some(filled_quantity), Some(total_proceeds)) = (
            plan.filled_quantity.checked_add(shares_at_level),
            plan.total_proceeds.checked_add(proceeds),
        ) else {
            warn!(price = %level.price, quantity = %shares_at_level, "매도 누적값 오버플로, 이후 레벨 무시");
            break;
        };

        remaining -= shares_at_level;
        plan.filled_quantity = filled_quantity;
        plan.total_proceeds = total_proceeds;
        plan.fills.push(Fill {
            price: level.price,
            quantity: shares_at_level,
            notional: proceeds,
        });
    }

    plan
}
