//! SniperX CLI.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sniper_bot::{daemon, report, BotConfig};
use sniper_core::SignalCounter;
use sniper_execution::JsonFileStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sniperx")]
#[command(about = "SniperX signal-driven paper trading bot", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 데몬 실행 (신호 수신 서버 + 엔진)
    ///
    /// 실행 중에는 원장 파일 옆에 `<원장>.lock` 잠금 파일이 생깁니다.
    /// 강제 종료로 남은 잠금은 기록된 PID의 프로세스가 없으면 다음 실행 시 회수되며,
    /// 회수되지 않으면 실행 중인 sniperx가 없는지 확인한 뒤 직접 삭제하세요.
    Run,

    /// 잔고와 보유 포지션 출력
    Status,

    /// 포지션 즉시 전량 청산
    Liquidate {
        /// 종목 키 (slug 또는 토큰 ID)
        instrument: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "sniper_bot={},sniper_execution={},sniper_exchange={},sniper_core={},tower_http=warn",
                    cli.log_level, cli.log_level, cli.log_level, cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BotConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run => {
            info!("SniperX 시작");
            let shutdown = CancellationToken::new();
            tokio::spawn(shutdown_signal(shutdown.clone()));
            daemon::run(config, shutdown).await?;
        }
        Commands::Status => match JsonFileStore::peek(&config.runtime.ledger_path)? {
            Some(state) => print!("{}", report::render_status(&state)),
            None => println!(
                "원장 없음: {} (첫 실행 시 초기 잔고 ${:.2}로 생성)",
                config.runtime.ledger_path.display(),
                config.runtime.initial_balance
            ),
        },
        Commands::Liquidate { instrument } => {
            // 토큰 ID로 지정해도 원장 키로 변환
            let key = config
                .trading
                .instruments
                .iter()
                .find(|i| i.token_id == instrument)
                .map(|i| i.key().to_string())
                .unwrap_or(instrument);

            let ledger = daemon::open_ledger(&config.runtime)?;
            let mut engine = daemon::build_engine(&config, ledger, SignalCounter::new())?;
            let liquidation = engine.liquidate_now(&key).await?;
            print!("{}", report::render_liquidation(&liquidation));
        }
    }

    Ok(())
}

/// Ctrl+C / SIGTERM 대기 후 종료 토큰 취소
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Ctrl+C 핸들러 설치 실패");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "SIGTERM 핸들러 설치 실패");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
        _ = shutdown.cancelled() => {
            return;
        }
    }

    shutdown.cancel();
}
