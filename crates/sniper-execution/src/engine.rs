//! 매매 엔진 (오케스트레이터).
//!
//! 고정 주기 틱마다 다음을 수행합니다:
//!
//! 1. 신호 카운터가 증가했으면 설정된 종목마다 호가를 조회하고
//!    - 보유 중이면 청산 타이머 재설정
//!    - 미보유면 `min(투자금, 잔고)`로 매수 시뮬레이션 후 원장 반영, 타이머 설정
//! 2. 신호와 무관하게 만료된 타이머의 포지션을 강제 청산
//!
//! 원장이 "보유 여부"의 유일한 기준입니다.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use rust_decimal::Decimal;
use sniper_core::{BookSource, Instrument, ProviderError, SignalCounter, SignalCursor};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    fill::{simulate_buy, simulate_sell},
    ledger::{Ledger, LedgerError},
    timer::{LiquidationTimer, SignalOutcome, UntrackedPositionPolicy},
};

// ==================== 설정 ====================

/// 엔진 설정.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 추적 종목
    pub instruments: Vec<Instrument>,
    /// 신호당 투자 금액 (잔고가 더 적으면 잔고)
    pub investment: Decimal,
    /// 청산 대기 시간
    pub sell_timeout: Duration,
    /// 타이머 없는 보유 포지션 처리 정책
    pub untracked_policy: UntrackedPositionPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instruments: Vec::new(),
            investment: Decimal::ZERO,
            sell_timeout: Duration::from_secs(100),
            untracked_policy: UntrackedPositionPolicy::default(),
        }
    }
}

// ==================== 결과 ====================

/// 청산 에러.
#[derive(Debug, Error)]
pub enum LiquidationError {
    #[error("설정되지 않은 종목: {0}")]
    UnknownInstrument(String),

    #[error("청산할 포지션 없음: {0}")]
    NoPosition(String),

    #[error("호가 조회 실패: {0}")]
    Unavailable(#[from] ProviderError),

    #[error("매수 호가 없음: {0}")]
    NoLiquidity(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// 청산 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct Liquidation {
    /// 종목 키
    pub instrument: String,
    /// 매도 수량
    pub shares_sold: Decimal,
    /// 호가 부족으로 남은 수량
    pub shares_remaining: Decimal,
    /// 매도 대금
    pub proceeds: Decimal,
    /// 실현 손익
    pub profit_loss: Decimal,
    /// 매도 후 잔고
    pub balance_after: Decimal,
}

impl Liquidation {
    /// 전량 매도 여부
    pub fn is_complete(&self) -> bool {
        self.shares_remaining.is_zero()
    }
}

/// 틱 처리 요약.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// 이번 틱에 관측된 새 신호 수
    pub signals: u64,
    /// 매수한 종목
    pub bought: Vec<String>,
    /// 타이머를 재설정한 종목
    pub reset: Vec<String>,
    /// 타이머 없던 보유 포지션에 새로 설정한 종목
    pub armed_untracked: Vec<String>,
    /// 전량 청산한 종목
    pub liquidated: Vec<String>,
    /// 일부만 청산한 종목
    pub partially_liquidated: Vec<String>,
    /// 실패 (종목 키, 사유)
    pub failures: Vec<(String, String)>,
}

impl TickReport {
    /// 아무 일도 없었는지 확인.
    pub fn is_idle(&self) -> bool {
        self.signals == 0
            && self.bought.is_empty()
            && self.reset.is_empty()
            && self.armed_untracked.is_empty()
            && self.liquidated.is_empty()
            && self.partially_liquidated.is_empty()
            && self.failures.is_empty()
    }
}

// ==================== 엔진 ====================

/// 매매 엔진.
pub struct Engine {
    config: EngineConfig,
    instruments: HashMap<String, Instrument>,
    ledger: Arc<Ledger>,
    source: Arc<dyn BookSource>,
    timer: LiquidationTimer,
    signals: SignalCounter,
    cursor: SignalCursor,
}

impl Engine {
    /// 새 엔진 생성.
    ///
    /// 신호 관측은 카운터의 현재 값부터 시작합니다 (이전 신호는 무시).
    pub fn new(
        config: EngineConfig,
        ledger: Arc<Ledger>,
        source: Arc<dyn BookSource>,
        signals: SignalCounter,
    ) -> Self {
        let instruments = config
            .instruments
            .iter()
            .map(|i| (i.key().to_string(), i.clone()))
            .collect();
        let timer = LiquidationTimer::new(config.sell_timeout);
        let cursor = SignalCursor::starting_at(signals.current());

        Self {
            config,
            instruments,
            ledger,
            source,
            timer,
            signals,
            cursor,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn timer(&self) -> &LiquidationTimer {
        &self.timer
    }

    /// 만료까지 남은 시간
    pub fn remaining(&self, instrument: &str, now: Instant) -> Option<Duration> {
        self.timer.remaining(instrument, now)
    }

    /// 시작 시 보유 중인 설정 종목에 타이머 설정 (`Rearm` 정책에서만).
    ///
    /// 새로 설정된 종목 키를 반환합니다.
    pub fn arm_held_positions(&mut self, now: Instant) -> Vec<String> {
        if self.config.untracked_policy == UntrackedPositionPolicy::Ignore {
            let held: Vec<&str> = self
                .config
                .instruments
                .iter()
                .map(Instrument::key)
                .filter(|key| self.ledger.has_position(key))
                .collect();
            if !held.is_empty() {
                warn!(
                    instruments = ?held,
                    "보유 포지션에 청산 타이머를 설정하지 않습니다 (untracked_position_policy=ignore)"
                );
            }
            return Vec::new();
        }

        let mut armed = Vec::new();
        for instrument in &self.config.instruments {
            let key = instrument.key();
            if self.ledger.has_position(key) && self.timer.arm(key, now) {
                info!(instrument = %key, timeout_secs = self.timer.timeout().as_secs(), "기존 보유 포지션 청산 타이머 설정");
                armed.push(key.to_string());
            }
        }
        armed
    }

    /// 틱 1회 처리.
    pub async fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        if let Some(count) = self.cursor.advance(&self.signals) {
            report.signals = count;
            info!(signals = count, total = self.cursor.last_seen(), "신호 수신");

            let instruments = self.config.instruments.clone();
            for instrument in &instruments {
                self.handle_signal(instrument, now, &mut report).await;
            }
        }

        self.check_expiry(now, &mut report).await;
        report
    }

    async fn handle_signal(&mut self, instrument: &Instrument, now: Instant, report: &mut TickReport) {
        let key = instrument.key();

        let book = match self.source.fetch_book(&instrument.token_id).await {
            Ok(book) => book,
            Err(e) => {
                warn!(instrument = %key, error = %e, "호가 조회 실패, 이번 신호 건너뜀");
                report.failures.push((key.to_string(), e.to_string()));
                return;
            }
        };

        let holding = self.ledger.has_position(key);
        if holding {
            match self
                .timer
                .on_signal(key, true, self.config.untracked_policy, now)
            {
                SignalOutcome::Reset => {
                    info!(instrument = %key, timeout_secs = self.timer.timeout().as_secs(), "청산 타이머 재설정");
                    report.reset.push(key.to_string());
                }
                SignalOutcome::Armed => {
                    info!(instrument = %key, "타이머 없던 보유 포지션에 청산 타이머 설정");
                    report.armed_untracked.push(key.to_string());
                }
                SignalOutcome::Ignored => {
                    debug!(instrument = %key, "보유 포지션, 타이머 없음 (ignore 정책)");
                }
            }
            return;
        }

        let investment = self.config.investment.min(self.ledger.get_balance());
        let plan = simulate_buy(investment, &book.asks);
        if plan.is_empty() {
            warn!(instrument = %key, investment = %investment, "매수 불가 (유동성 또는 잔고 없음)");
            report
                .failures
                .push((key.to_string(), "매수 가능한 호가 없음".to_string()));
            return;
        }

        for fill in &plan.fills {
            debug!(
                instrument = %key,
                price = %fill.price,
                quantity = %fill.quantity,
                notional = %fill.notional,
                "매수 체결"
            );
        }

        match self.ledger.buy(key, plan.total_shares, plan.total_cost) {
            Ok(balance_after) => {
                info!(
                    instrument = %key,
                    shares = %plan.total_shares,
                    cost = %plan.total_cost,
                    avg_price = ?plan.average_price(),
                    levels = plan.fills.len(),
                    balance = %balance_after,
                    "매수 실행"
                );
                self.timer.arm(key, now);
                report.bought.push(key.to_string());
            }
            Err(e) => {
                if e.is_rejection() {
                    warn!(instrument = %key, error = %e, "매수 거부");
                } else {
                    error!(instrument = %key, error = %e, "매수 실패");
                }
                report.failures.push((key.to_string(), e.to_string()));
            }
        }
    }

    async fn check_expiry(&mut self, now: Instant, report: &mut TickReport) {
        for key in self.timer.expired(now) {
            if !self.ledger.has_position(&key) {
                debug!(instrument = %key, "만료된 타이머에 포지션 없음, 해제");
                self.timer.disarm(&key);
                continue;
            }

            info!(instrument = %key, "청산 타이머 만료, 강제 청산");
            match self.liquidate(&key).await {
                Ok(liquidation) if liquidation.is_complete() => {
                    self.timer.disarm(&key);
                    report.liquidated.push(key);
                }
                Ok(liquidation) => {
                    warn!(
                        instrument = %key,
                        remaining = %liquidation.shares_remaining,
                        "호가 부족으로 일부만 청산, 다음 틱에 재시도"
                    );
                    report.partially_liquidated.push(key);
                }
                Err(e) => {
                    warn!(instrument = %key, error = %e, "청산 실패, 다음 틱에 재시도");
                    report.failures.push((key, e.to_string()));
                }
            }
        }
    }

    /// 즉시 전량 청산 (수동 청산용). 성공 여부와 무관하게 타이머 상태는 원장 기준으로 정리됩니다.
    pub async fn liquidate_now(&mut self, instrument: &str) -> Result<Liquidation, LiquidationError> {
        let result = self.liquidate(instrument).await;
        if !self.ledger.has_position(instrument) {
            self.timer.disarm(instrument);
        }
        result
    }

    async fn liquidate(&self, key: &str) -> Result<Liquidation, LiquidationError> {
        let instrument = self
            .instruments
            .get(key)
            .ok_or_else(|| LiquidationError::UnknownInstrument(key.to_string()))?;

        let position = self
            .ledger
            .get_position(key)
            .filter(|p| p.is_open())
            .ok_or_else(|| LiquidationError::NoPosition(key.to_string()))?;

        let book = self.source.fetch_book(&instrument.token_id).await?;
        let plan = simulate_sell(position.shares(), &book.bids);
        if plan.is_empty() {
            return Err(LiquidationError::NoLiquidity(key.to_string()));
        }

        for fill in &plan.fills {
            debug!(
                instrument = %key,
                price = %fill.price,
                quantity = %fill.quantity,
                notional = %fill.notional,
                "매도 체결"
            );
        }

        let outcome = self
            .ledger
            .sell(key, plan.filled_quantity, plan.total_proceeds)?;

        info!(
            instrument = %key,
            shares = %plan.filled_quantity,
            proceeds = %plan.total_proceeds,
            profit_loss = %outcome.profit_loss,
            balance = %outcome.balance_after,
            "청산 실행"
        );

        Ok(Liquidation {
            instrument: key.to_string(),
            shares_sold: plan.filled_quantity,
            shares_remaining: plan.shortfall(),
            proceeds: plan.total_proceeds,
            profit_loss: outcome.profit_loss,
            balance_after: outcome.balance_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_tick_report_idle() {
        let mut report = TickReport::default();
        assert!(report.is_idle());
        report.signals = 1;
        assert!(!report.is_idle());
    }

    #[test]
    fn test_liquidation_completeness() {
        let liquidation = Liquidation {
            instrument: "x".to_string(),
            shares_sold: dec!(3),
            shares_remaining: dec!(7),
            proceeds: dec!(2.1),
            profit_loss: dec!(0.6),
            balance_after: dec!(20),
        };
        assert!(!liquidation.is_complete());
    }
}
