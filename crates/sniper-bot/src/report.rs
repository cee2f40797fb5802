//! CLI 출력 포맷.

use std::fmt::Write;

use rust_decimal::Decimal;
use sniper_execution::{LedgerState, Liquidation};

/// 원장 상태 표
pub fn render_status(state: &LedgerState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "잔고: ${:.2}", state.balance());

    let open: Vec<_> = state
        .positions()
        .iter()
        .filter(|(_, p)| p.is_open())
        .collect();

    if open.is_empty() {
        let _ = writeln!(out, "보유 포지션 없음");
        return out;
    }

    let _ = writeln!(out, "{:-<72}", "");
    let _ = writeln!(
        out,
        "  {:<30} {:>12} {:>12} {:>10}",
        "종목", "수량", "투자금", "평균단가"
    );
    let _ = writeln!(out, "{:-<72}", "");
    let mut invested = Decimal::ZERO;
    for (key, position) in open {
        invested += position.total_invested();
        let _ = writeln!(
            out,
            "  {:<30} {:>12.2} {:>12.2} {:>10.3}",
            key,
            position.shares(),
            position.total_invested(),
            position.avg_cost()
        );
    }
    let _ = writeln!(out, "{:-<72}", "");
    let _ = writeln!(out, "총 투자금: ${:.2}", invested);
    out
}

/// 청산 결과
pub fn render_liquidation(liquidation: &Liquidation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "청산 완료: {}", liquidation.instrument);
    let _ = writeln!(out, "  매도 수량: {:.2}", liquidation.shares_sold);
    if !liquidation.is_complete() {
        let _ = writeln!(
            out,
            "  미체결 수량: {:.2} (호가 부족)",
            liquidation.shares_remaining
        );
    }
    let _ = writeln!(out, "  매도 대금: ${:.2}", liquidation.proceeds);
    let _ = writeln!(out, "  손익: ${:+.2}", liquidation.profit_loss);
    let _ = writeln!(out, "  잔고: ${:.2}", liquidation.balance_after);
    out
}
