//! 엔진 실행 통계.

use std::time::{Duration, Instant};

use serde::Serialize;
use sniper_execution::TickReport;

/// 누적 실행 통계
#[derive(Debug, Clone, Serialize)]
pub struct CycleStats {
    /// 처리한 틱 수
    pub ticks: u64,
    /// 관측한 신호 수
    pub signals: u64,
    /// 매수 횟수
    pub buys: usize,
    /// 타이머 재설정 횟수
    pub resets: usize,
    /// 타이머 없던 포지션에 새로 설정한 횟수
    pub armed_untracked: usize,
    /// 전량 청산 횟수
    pub liquidations: usize,
    /// 부분 청산 횟수
    pub partial_liquidations: usize,
    /// 실패 횟수
    pub failures: usize,
    #[serde(skip)]
    started: Instant,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self {
            ticks: 0,
            signals: 0,
            buys: 0,
            resets: 0,
            armed_untracked: 0,
            liquidations: 0,
            partial_liquidations: 0,
            failures: 0,
            started: Instant::now(),
        }
    }
}

impl CycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 틱 결과 누적
    pub fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.signals += report.signals;
        self.buys += report.bought.len();
        self.resets += report.reset.len();
        self.armed_untracked += report.armed_untracked.len();
        self.liquidations += report.liquidated.len();
        self.partial_liquidations += report.partially_liquidated.len();
        self.failures += report.failures.len();
    }

    /// 실행 시간
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            ticks = self.ticks,
            signals = self.signals,
            buys = self.buys,
            resets = self.resets,
            armed_untracked = self.armed_untracked,
            liquidations = self.liquidations,
            partial_liquidations = self.partial_liquidations,
            failures = self.failures,
            elapsed = format!("{:.1}s", self.elapsed().as_secs_f64()),
            "엔진 통계"
        );
    }
}
