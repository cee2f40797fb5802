//! 원장 동시 호출 테스트
//!
//! 여러 스레드가 하나의 원장을 공유할 때 잔고/수량 검사와 반영이
//! 원자적으로 이루어지는지 검증합니다.

use std::sync::{Arc, Barrier};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sniper_core::TradeKind;
use sniper_execution::{Ledger, LedgerError, MemoryRecorder, MemoryStore};

const THREADS: usize = 8;

fn shared_ledger(balance: Decimal) -> (Arc<Ledger>, MemoryRecorder) {
    let recorder = MemoryRecorder::new();
    let ledger = Ledger::open(
        Box::new(MemoryStore::new()),
        Box::new(recorder.clone()),
        balance,
    )
    .unwrap();
    (Arc::new(ledger), recorder)
}

/// 모든 스레드가 동시에 출발하도록 맞춘 뒤 `op`를 실행합니다.
fn race<T, F>(ledger: &Arc<Ledger>, op: F) -> Vec<T>
where
    T: Send,
    F: Fn(&Ledger, usize) -> T + Sync,
{
    let barrier = Barrier::new(THREADS);
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let barrier = &barrier;
                let op = &op;
                let ledger = Arc::clone(ledger);
                scope.spawn(move || {
                    barrier.wait();
                    op(&ledger, i)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn test_concurrent_buys_never_overdraw() {
    let (ledger, recorder) = shared_ledger(dec!(10));

    let results = race(&ledger, |ledger, i| {
        ledger.buy(&format!("token-{i}"), dec!(6), dec!(3))
    });

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 3);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { .. })
        ));
    }

    assert_eq!(ledger.get_balance(), dec!(1));
    assert!(ledger.get_balance() >= Decimal::ZERO);

    let records = recorder.records();
    assert_eq!(records.len(), successes);
    assert!(records.iter().all(|r| r.kind == TradeKind::Buy));

    // 기록된 매수 후 잔고는 모두 달라야 함 (직렬화된 반영)
    let mut balances: Vec<_> = records.iter().map(|r| r.balance_after).collect();
    balances.sort();
    assert_eq!(balances, vec![dec!(1), dec!(4), dec!(7)]);
}

#[test]
fn test_concurrent_buys_on_same_instrument_accumulate() {
    let (ledger, recorder) = shared_ledger(dec!(100));

    let results = race(&ledger, |ledger, _| ledger.buy("elon-tweets", dec!(2), dec!(1)));

    assert!(results.iter().all(Result::is_ok));
    let position = ledger.get_position("elon-tweets").unwrap();
    assert_eq!(position.shares(), dec!(16));
    assert_eq!(position.total_invested(), dec!(8));
    assert_eq!(position.avg_cost(), dec!(0.5));
    assert_eq!(ledger.get_balance(), dec!(92));
    assert_eq!(recorder.records().len(), THREADS);
}

#[test]
fn test_concurrent_sells_never_oversell() {
    let (ledger, recorder) = shared_ledger(dec!(30));
    ledger.buy("elon-tweets", dec!(8), dec!(4)).unwrap();

    let results = race(&ledger, |ledger, _| ledger.sell("elon-tweets", dec!(3), dec!(1.2)));

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 2);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientShares { .. })
        ));
    }

    let position = ledger.get_position("elon-tweets").unwrap();
    assert_eq!(position.shares(), dec!(2));
    assert_eq!(position.total_invested(), dec!(1));
    assert_eq!(ledger.get_balance(), dec!(28.4));
    assert_eq!(recorder.records().len(), 1 + successes);
}
