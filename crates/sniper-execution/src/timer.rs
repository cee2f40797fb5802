//! 청산 타이머.
//!
//! 종목별 상태 머신입니다.
//!
//! ```text
//! Unarmed ──매수 성공──▶ Armed(armed_at) ──만료──▶ (청산 시도)
//!    ▲                    │  ▲                        │
//!    │                    └──┘ 신호 (보유 중): 재설정   │
//!    └──────────────── 청산 성공 ◀────────────────────┘
//! ```
//!
//! 청산에 실패하면 `armed_at`을 유지한 채 Armed로 남아 다음 틱에 재시도합니다.
//! 모든 메서드는 `now`를 명시적으로 받으므로 시간 진행 없이 테스트할 수 있습니다.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// 보유 중이지만 타이머가 없는 포지션 처리 정책.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UntrackedPositionPolicy {
    /// 타이머를 새로 설정
    #[default]
    Rearm,
    /// 타이머 없이 방치 (자동 청산 없음)
    Ignore,
}

/// 종목 타이머 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Unarmed,
    Armed { armed_at: Instant },
}

/// 신호 처리 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// 기존 타이머 재설정
    Reset,
    /// 타이머가 없던 보유 포지션에 새로 설정
    Armed,
    /// 변경 없음
    Ignored,
}

/// 종목별 청산 타이머.
#[derive(Debug, Clone)]
pub struct LiquidationTimer {
    timeout: Duration,
    armed: HashMap<String, Instant>,
}

impl LiquidationTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            armed: HashMap::new(),
        }
    }

    /// 청산 대기 시간
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 타이머 설정. 이미 설정되어 있으면 기존 시각을 유지합니다.
    ///
    /// 새로 설정되었으면 `true`.
    pub fn arm(&mut self, instrument: &str, now: Instant) -> bool {
        if self.armed.contains_key(instrument) {
            return false;
        }
        self.armed.insert(instrument.to_string(), now);
        debug!(instrument = %instrument, "청산 타이머 설정");
        true
    }

    /// 타이머 재설정 (설정 여부와 무관하게 `now`로).
    pub fn reset(&mut self, instrument: &str, now: Instant) {
        self.armed.insert(instrument.to_string(), now);
        debug!(instrument = %instrument, "청산 타이머 재설정");
    }

    /// 타이머 해제. 설정되어 있었으면 `true`.
    pub fn disarm(&mut self, instrument: &str) -> bool {
        self.armed.remove(instrument).is_some()
    }

    pub fn is_armed(&self, instrument: &str) -> bool {
        self.armed.contains_key(instrument)
    }

    pub fn armed_at(&self, instrument: &str) -> Option<Instant> {
        self.armed.get(instrument).copied()
    }

    pub fn state(&self, instrument: &str) -> TimerState {
        match self.armed_at(instrument) {
            Some(armed_at) => TimerState::Armed { armed_at },
            None => TimerState::Unarmed,
        }
    }

    /// 만료까지 남은 시간 (0에서 포화). 미설정이면 `None`.
    pub fn remaining(&self, instrument: &str, now: Instant) -> Option<Duration> {
        self.armed_at(instrument)
            .map(|armed_at| self.timeout.saturating_sub(now.saturating_duration_since(armed_at)))
    }

    /// 경과 비율 (0.0 ~ 1.0). 미설정이면 `None`.
    pub fn progress(&self, instrument: &str, now: Instant) -> Option<f64> {
        let armed_at = self.armed_at(instrument)?;
        if self.timeout.is_zero() {
            return Some(1.0);
        }
        let elapsed = now.saturating_duration_since(armed_at).as_secs_f64();
        Some((elapsed / self.timeout.as_secs_f64()).min(1.0))
    }

    /// 만료 여부 (`now - armed_at >= timeout`).
    pub fn is_expired(&self, instrument: &str, now: Instant) -> bool {
        self.armed_at(instrument)
            .is_some_and(|armed_at| now.saturating_duration_since(armed_at) >= self.timeout)
    }

    /// 만료된 종목 목록 (키 순 정렬). 상태를 변경하지 않습니다.
    pub fn expired(&self, now: Instant) -> Vec<String> {
        let mut keys: Vec<String> = self
            .armed
            .iter()
            .filter(|(_, armed_at)| now.saturating_duration_since(**armed_at) >= self.timeout)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// 설정된 종목 목록 (키 순 정렬)
    pub fn armed_instruments(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.armed.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// 외부 신호 처리.
    ///
    /// - 보유 없음: 변경 없음
    /// - 보유 + 설정됨: 재설정
    /// - 보유 + 미설정: 정책에 따라 설정 또는 무시
    pub fn on_signal(
        &mut self,
        instrument: &str,
        holding: bool,
        policy: UntrackedPositionPolicy,
        now: Instant,
    ) -> SignalOutcome {
        if !holding {
            return SignalOutcome::Ignored;
        }

        if self.is_armed(instrument) {
            self.reset(instrument, now);
            return SignalOutcome::Reset;
        }

        match policy {
            UntrackedPositionPolicy::Rearm => {
                self.arm(instrument, now);
                SignalOutcome::Armed
            }
            UntrackedPositionPolicy::Ignore => SignalOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(100);

    #[test]
    fn test_signal_extends_deadline() {
        let t0 = Instant::now();
        let mut timer = LiquidationTimer::new(TIMEOUT);
        timer.arm("x", t0);

        let outcome = timer.on_signal(
            "x",
            true,
            UntrackedPositionPolicy::Rearm,
            t0 + Duration::from_secs(40),
        );
        assert_eq!(outcome, SignalOutcome::Reset);

        assert!(!timer.is_expired("x", t0 + Duration::from_secs(100)));
        assert!(!timer.is_expired("x", t0 + Duration::from_secs(139)));
        assert!(timer.is_expired("x", t0 + Duration::from_secs(140)));
    }

    #[test]
    fn test_arm_keeps_existing_time() {
        let t0 = Instant::now();
        let mut timer = LiquidationTimer::new(TIMEOUT);
        assert!(timer.arm("x", t0));
        assert!(!timer.arm("x", t0 + Duration::from_secs(50)));
        assert_eq!(timer.armed_at("x"), Some(t0));
    }

    #[test]
    fn test_expiry_evaluation_is_idempotent() {
        let t0 = Instant::now();
        let mut timer = LiquidationTimer::new(TIMEOUT);
        timer.arm("b", t0);
        timer.arm("a", t0);
        timer.arm("c", t0 + Duration::from_secs(50));

        let now = t0 + Duration::from_secs(120);
        let first = timer.expired(now);
        let second = timer.expired(now);

        assert_eq!(first, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(first, second);
        assert_eq!(timer.armed_at("a"), Some(t0));
    }

    #[test]
    fn test_untracked_policy() {
        let t0 = Instant::now();

        let mut timer = LiquidationTimer::new(TIMEOUT);
        assert_eq!(
            timer.on_signal("x", true, UntrackedPositionPolicy::Ignore, t0),
            SignalOutcome::Ignored
        );
        assert!(!timer.is_armed("x"));

        assert_eq!(
            timer.on_signal("x", true, UntrackedPositionPolicy::Rearm, t0),
            SignalOutcome::Armed
        );
        assert_eq!(timer.state("x"), TimerState::Armed { armed_at: t0 });

        assert_eq!(
            timer.on_signal("y", false, UntrackedPositionPolicy::Rearm, t0),
            SignalOutcome::Ignored
        );
    }

    #[test]
    fn test_remaining_and_progress() {
        let t0 = Instant::now();
        let mut timer = LiquidationTimer::new(TIMEOUT);
        assert_eq!(timer.remaining("x", t0), None);

        timer.arm("x", t0);
        let now = t0 + Duration::from_secs(25);
        assert_eq!(timer.remaining("x", now), Some(Duration::from_secs(75)));
        assert_eq!(timer.progress("x", now), Some(0.25));

        let late = t0 + Duration::from_secs(500);
        assert_eq!(timer.remaining("x", late), Some(Duration::ZERO));
        assert_eq!(timer.progress("x", late), Some(1.0));
    }

    #[test]
    fn test_disarm() {
        let t0 = Instant::now();
        let mut timer = LiquidationTimer::new(TIMEOUT);
        timer.arm("x", t0);
        assert!(timer.disarm("x"));
        assert!(!timer.disarm("x"));
        assert_eq!(timer.state("x"), TimerState::Unarmed);
    }

    #[test]
    fn test_policy_deserializes_lowercase() {
        let policy: UntrackedPositionPolicy = serde_json::from_str("\"ignore\"").unwrap();
        assert_eq!(policy, UntrackedPositionPolicy::Ignore);
    }
}
