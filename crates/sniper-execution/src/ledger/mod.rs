//! 포지션 원장.
//!
//! 잔고와 종목별 포지션을 소유하는 시스템 기록(system of record)입니다.
//!
//! 모든 변경은 하나의 뮤텍스 아래에서 다음 순서로 수행됩니다:
//!
//! 1. 사전 조건 검사 (실패 시 상태 변경 없음)
//! 2. 상태 복제본에 변경 적용
//! 3. 저장소에 영속화
//! 4. 메모리 상태 교체 (커밋)
//! 5. 거래 기록 추가
//!
//! 영속화에 실패하면 메모리 상태는 마지막 커밋 상태로 유지되고
//! 원장은 정지되어 이후 모든 변경이 [`LedgerError::Halted`]로 거부됩니다.

pub mod store;

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sniper_core::{Position, TradeRecord};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::recorder::TradeRecorder;

pub use store::{JsonFileStore, LedgerStore, MemoryStore, StoreError};

// ==================== 상태 ====================

/// 영속화되는 원장 상태.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    /// 현금 잔고
    #[serde(with = "rust_decimal::serde::str")]
    balance: Decimal,
    /// 종목 키 → 포지션
    #[serde(default)]
    positions: BTreeMap<String, Position>,
}

impl LedgerState {
    /// 포지션 없이 잔고만 가진 상태 생성.
    pub fn new(balance: Decimal) -> Self {
        Self {
            balance,
            positions: BTreeMap::new(),
        }
    }

    /// 현금 잔고
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// 전체 포지션 (수량 0인 항목 포함)
    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    /// 종목 포지션
    pub fn position(&self, instrument: &str) -> Option<&Position> {
        self.positions.get(instrument)
    }

    /// 보유 수량이 있는 종목 키 목록
    pub fn held_instruments(&self) -> Vec<String> {
        self.positions
            .iter()
            .filter(|(_, p)| p.is_open())
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub(crate) fn position_entry(&mut self, instrument: &str) -> &mut Position {
        self.positions.entry(instrument.to_string()).or_default()
    }

    /// 로드된 상태 검증.
    pub fn validate(&self) -> Result<(), String> {
        if self.balance < Decimal::ZERO {
            return Err(format!("음수 잔고: {}", self.balance));
        }
        Ok(())
    }
}

// ==================== 에러 ====================

/// 원장 에러.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// 잔고 부족
    #[error("잔고 부족: 필요 {required}, 보유 {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    /// 포지션 없음
    #[error("포지션 없음: {instrument}")]
    NoPosition { instrument: String },

    /// 보유 수량 부족
    #[error("보유 수량 부족 ({instrument}): 요청 {requested}, 보유 {held}")]
    InsufficientShares {
        instrument: String,
        requested: Decimal,
        held: Decimal,
    },

    /// 잘못된 수량/금액
    #[error("잘못된 수량/금액: shares={shares}, amount={amount}")]
    InvalidQuantity { shares: Decimal, amount: Decimal },

    /// 영속화 실패 (이 에러 이후 원장 정지)
    #[error("원장 저장 실패: {0}")]
    Storage(#[from] StoreError),

    /// 이전 영속화 실패로 원장이 정지됨
    #[error("원장이 정지됨 (이전 저장 실패)")]
    Halted,
}

impl LedgerError {
    /// 상태 변경 없이 거부된 사전 조건 실패인지 확인.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::InsufficientBalance { .. }
                | LedgerError::NoPosition { .. }
                | LedgerError::InsufficientShares { .. }
                | LedgerError::InvalidQuantity { .. }
        )
    }
}

/// 매도 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellOutcome {
    /// 매도 후 잔고
    pub balance_after: Decimal,
    /// 실현 손익 (매도 대금 - 매도분 원가)
    pub profit_loss: Decimal,
    /// 매도 수량에 배분된 원가
    pub invested_in_sold: Decimal,
}

// ==================== 원장 ====================

struct LedgerInner {
    state: LedgerState,
    store: Box<dyn LedgerStore>,
    recorder: Box<dyn TradeRecorder>,
    halted: bool,
}

/// 포지션 원장.
///
/// 프로세스당 하나를 만들어 `Arc`로 공유합니다.
pub struct Ledger {
    inner: Mutex<LedgerInner>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Ledger")
            .field("state", &inner.state)
            .field("halted", &inner.halted)
            .finish()
    }
}

impl Ledger {
    /// 저장소에서 원장을 엽니다.
    ///
    /// 저장된 상태가 없으면 `initial_balance`로 새 상태를 만들어 즉시 저장합니다.
    pub fn open(
        mut store: Box<dyn LedgerStore>,
        recorder: Box<dyn TradeRecorder>,
        initial_balance: Decimal,
    ) -> Result<Self, LedgerError> {
        let state = match store.load()? {
            Some(state) => {
                info!(
                    balance = %state.balance(),
                    positions = state.positions().len(),
                    "원장 로드 완료"
                );
                state
            }
            None => {
                if initial_balance < Decimal::ZERO {
                    return Err(LedgerError::InvalidQuantity {
                        shares: Decimal::ZERO,
                        amount: initial_balance,
                    });
                }
                let state = LedgerState::new(initial_balance);
                store.save(&state)?;
                info!(balance = %initial_balance, "새 원장 생성");
                state
            }
        };

        Ok(Self {
            inner: Mutex::new(LedgerInner {
                state,
                store,
                recorder,
                halted: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 현재 잔고
    pub fn get_balance(&self) -> Decimal {
        self.lock().state.balance()
    }

    /// 종목 포지션 (없으면 `None`)
    pub fn get_position(&self, instrument: &str) -> Option<Position> {
        self.lock().state.position(instrument).cloned()
    }

    /// 보유 수량이 0보다 큰지 확인.
    pub fn has_position(&self, instrument: &str) -> bool {
        self.lock()
            .state
            .position(instrument)
            .is_some_and(Position::is_open)
    }

    /// 전체 상태 스냅샷
    pub fn snapshot(&self) -> LedgerState {
        self.lock().state.clone()
    }

    /// 정지 여부
    pub fn is_halted(&self) -> bool {
        self.lock().halted
    }

    /// 매수 반영.
    ///
    /// `total_cost`가 잔고를 초과하면 상태 변경 없이 [`LedgerError::InsufficientBalance`].
    /// 성공 시 매수 후 잔고를 반환합니다.
    pub fn buy(
        &self,
        instrument: &str,
        shares: Decimal,
        total_cost: Decimal,
    ) -> Result<Decimal, LedgerError> {
        if shares <= Decimal::ZERO || total_cost <= Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity {
                shares,
                amount: total_cost,
            });
        }

        let mut inner = self.lock();
        if inner.halted {
            return Err(LedgerError::Halted);
        }

        let available = inner.state.balance();
        if total_cost > available {
            return Err(LedgerError::InsufficientBalance {
                required: total_cost,
                available,
            });
        }

        let mut next = inner.state.clone();
        next.balance -= total_cost;
        if !next.position_entry(instrument).apply_buy(shares, total_cost) {
            return Err(LedgerError::InvalidQuantity {
                shares,
                amount: total_cost,
            });
        }
        let balance_after = next.balance();

        inner.commit(next)?;
        inner.record(&TradeRecord::buy(instrument, shares, total_cost, balance_after));

        info!(
            instrument = %instrument,
            shares = %shares,
            cost = %total_cost,
            balance = %balance_after,
            "매수 반영"
        );
        Ok(balance_after)
    }

    /// 매도 반영.
    ///
    /// 포지션이 없으면 [`LedgerError::NoPosition`], 보유 수량을 초과하면
    /// [`LedgerError::InsufficientShares`]이며 둘 다 상태를 변경하지 않습니다.
    pub fn sell(
        &self,
        instrument: &str,
        shares: Decimal,
        total_proceeds: Decimal,
    ) -> Result<SellOutcome, LedgerError> {
        if shares <= Decimal::ZERO || total_proceeds < Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity {
                shares,
                amount: total_proceeds,
            });
        }

        let mut inner = self.lock();
        if inner.halted {
            return Err(LedgerError::Halted);
        }

        let held = match inner.state.position(instrument) {
            Some(position) => position.shares(),
            None => {
                return Err(LedgerError::NoPosition {
                    instrument: instrument.to_string(),
                })
            }
        };
        if shares > held {
            return Err(LedgerError::InsufficientShares {
                instrument: instrument.to_string(),
                requested: shares,
                held,
            });
        }

        let Some(balance_after) = inner.state.balance().checked_add(total_proceeds) else {
            return Err(LedgerError::InvalidQuantity {
                shares,
                amount: total_proceeds,
            });
        };

        let mut next = inner.state.clone();
        let invested_in_sold = next.position_entry(instrument).apply_sell(shares);
        next.balance = balance_after;

        let outcome = SellOutcome {
            balance_after: next.balance(),
            profit_loss: total_proceeds - invested_in_sold,
            invested_in_sold,
        };

        inner.commit(next)?;
        inner.record(&TradeRecord::sell(
            instrument,
            shares,
            total_proceeds,
            outcome.balance_after,
            outcome.profit_loss,
        ));

        info!(
            instrument = %instrument,
            shares = %shares,
            proceeds = %total_proceeds,
            profit_loss = %outcome.profit_loss,
            balance = %outcome.balance_after,
            "매도 반영"
        );
        Ok(outcome)
    }
}

impl LedgerInner {
    /// 영속화 후 메모리 상태 교체. 실패 시 원장 정지.
    fn commit(&mut self, next: LedgerState) -> Result<(), LedgerError> {
        if let Err(e) = self.store.save(&next) {
            self.halted = true;
            error!(error = %e, "원장 저장 실패, 원장을 정지합니다");
            return Err(LedgerError::Storage(e));
        }
        self.state = next;
        Ok(())
    }

    fn record(&mut self, record: &TradeRecord) {
        if let Err(e) = self.recorder.record(record) {
            error!(
                error = %e,
                kind = %record.kind,
                instrument = %record.instrument,
                "거래 기록 추가 실패 (원장 변경은 유지)"
            );
        }
    }
}

impl Drop for Ledger {
    fn drop(&mut self) {
        if self.lock().halted {
            warn!("정지된 원장 종료: 마지막 커밋 상태만 저장되어 있습니다");
        }
    }
}
