//! 외부 신호 카운터.
//!
//! 신호 수신기(별도 태스크)와 엔진 루프 사이의 유일한 공유 상태입니다.
//! 수신기는 [`SignalCounter::increment`]만, 엔진은 [`SignalCursor`]로 증가 여부만 확인합니다.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// 단조 증가 신호 카운터.
#[derive(Debug, Clone, Default)]
pub struct SignalCounter {
    count: Arc<AtomicU64>,
}

impl SignalCounter {
    /// 0에서 시작하는 카운터 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 신호 1건 기록. 증가 후 값을 반환합니다.
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// 현재 값
    pub fn current(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

/// 엔진 쪽 관측 위치.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalCursor {
    last_seen: u64,
}

impl SignalCursor {
    /// 지정 값부터 관측 시작.
    pub fn starting_at(last_seen: u64) -> Self {
        Self { last_seen }
    }

    /// 마지막 관측 이후 새 신호 수. 새 신호가 있으면 관측 위치를 갱신합니다.
    pub fn advance(&mut self, counter: &SignalCounter) -> Option<u64> {
        let current = counter.current();
        if current > self.last_seen {
            let delta = current - self.last_seen;
            self.last_seen = current;
            Some(delta)
        } else {
            None
        }
    }

    /// 마지막 관측 값
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_reports_new_signals_once() {
        let counter = SignalCounter::new();
        let mut cursor = SignalCursor::default();
        assert_eq!(cursor.advance(&counter), None);

        counter.increment();
        counter.increment();
        assert_eq!(cursor.advance(&counter), Some(2));
        assert_eq!(cursor.advance(&counter), None);
        assert_eq!(cursor.last_seen(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let counter = SignalCounter::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    counter.increment();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(counter.current(), 800);
    }
}
