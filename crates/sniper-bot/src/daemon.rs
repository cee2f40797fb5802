//! 데몬 실행.
//!
//! 신호 수신 서버와 엔진 루프를 함께 띄우고 종료 토큰이 취소되면 둘 다 정리합니다.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use sniper_core::SignalCounter;
use sniper_exchange::PolymarketClient;
use sniper_execution::{Engine, JsonFileStore, JsonLinesRecorder, Ledger};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    config::{BotConfig, RuntimeConfig},
    server::{self, PingState},
    stats::CycleStats,
    Result,
};

/// 통계/대기 상태 로그 주기
const SUMMARY_INTERVAL: Duration = Duration::from_secs(60);

/// 원장 열기 (잠금 파일 획득 포함)
pub fn open_ledger(runtime: &RuntimeConfig) -> Result<Arc<Ledger>> {
    let store = JsonFileStore::open(&runtime.ledger_path)?;
    let recorder = JsonLinesRecorder::new(&runtime.trade_log_path);
    let ledger = Ledger::open(Box::new(store), Box::new(recorder), runtime.initial_balance)?;
    Ok(Arc::new(ledger))
}

/// 엔진 생성
pub fn build_engine(
    config: &BotConfig,
    ledger: Arc<Ledger>,
    signals: SignalCounter,
) -> Result<Engine> {
    let client = PolymarketClient::new(&config.runtime.book_url, config.runtime.http_timeout)?;
    Ok(Engine::new(
        config.engine_config(),
        ledger,
        Arc::new(client),
        signals,
    ))
}

/// 엔진 루프.
///
/// 고정 주기로 틱을 처리하며, 틱이 밀리면 건너뜁니다.
pub async fn run_engine(
    mut engine: Engine,
    tick_interval: Duration,
    shutdown: CancellationToken,
) -> CycleStats {
    let mut stats = CycleStats::new();

    let armed = engine.arm_held_positions(Instant::now());
    if !armed.is_empty() {
        info!(instruments = ?armed, "기존 보유 포지션 청산 타이머 설정 완료");
    }

    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut summary = tokio::time::interval(SUMMARY_INTERVAL);
    summary.set_missed_tick_behavior(MissedTickBehavior::Skip);
    summary.tick().await;

    info!(
        tick_ms = tick_interval.as_millis() as u64,
        balance = %engine.ledger().get_balance(),
        "엔진 시작, 신호 대기 중"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("엔진 종료 신호 수신");
                break;
            }
            _ = ticker.tick() => {
                let report = engine.tick(Instant::now()).await;
                stats.record(&report);

                if engine.ledger().is_halted() {
                    error!("원장이 정지되어 엔진을 종료합니다");
                    shutdown.cancel();
                    break;
                }
            }
            _ = summary.tick() => {
                log_countdowns(&engine);
                stats.log_summary("엔진 실행 중");
            }
        }
    }

    stats.log_summary("엔진 종료");
    stats
}

fn log_countdowns(engine: &Engine) {
    let now = Instant::now();
    for key in engine.timer().armed_instruments() {
        let remaining = engine.remaining(&key, now).unwrap_or_default();
        let progress = engine.timer().progress(&key, now).unwrap_or_default();
        info!(
            instrument = %key,
            remaining_secs = remaining.as_secs(),
            progress = format!("{:.0}%", progress * 100.0),
            "청산 대기"
        );
    }
}

/// 데몬 실행: 신호 수신 서버 + 엔진 루프
pub async fn run(config: BotConfig, shutdown: CancellationToken) -> Result<()> {
    let ledger = open_ledger(&config.runtime)?;
    let signals = SignalCounter::new();
    let engine = build_engine(&config, ledger.clone(), signals.clone())?;

    let ping_state = Arc::new(PingState::new(signals));
    let server_shutdown = shutdown.clone();
    let addr = config.runtime.ping_addr;
    let server = tokio::spawn(async move {
        let result = server::serve(addr, ping_state, server_shutdown.clone()).await;
        if let Err(e) = &result {
            error!(error = %e, "신호 수신 서버 실패");
            server_shutdown.cancel();
        }
        result
    });

    let stats = run_engine(engine, config.runtime.tick_interval, shutdown.clone()).await;

    shutdown.cancel();
    match server.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "신호 수신 서버 태스크 비정상 종료"),
    }

    info!(
        balance = %ledger.get_balance(),
        signals = stats.signals,
        "SniperX 종료"
    );
    Ok(())
}
