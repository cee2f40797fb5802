//! 설정 모듈.
//!
//! - 매매 파라미터: JSON 파일 (`config.json`)
//! - 런타임 파라미터: 환경변수 (`.env` 지원)
//!
//! 설정 파일이 없거나 읽을 수 없으면 경고 후 기본값으로 동작합니다.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use rust_decimal::Decimal;
use serde_json::Value;
use sniper_core::Instrument;
use sniper_exchange::DEFAULT_BASE_URL;
use sniper_execution::{EngineConfig, UntrackedPositionPolicy};
use tracing::{info, warn};

use crate::{error::BotError, Result};

/// 설정 파일이 없을 때 사용하는 기본 토큰
pub const DEFAULT_TOKEN_ID: &str =
    "90044929278592762736809672799012603596750177679616629362026647999260321317755";

/// 기본 청산 대기 시간 (초)
pub const DEFAULT_SELL_TIMEOUT_SECS: u64 = 100;

/// 봇 전체 설정
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// 매매 설정
    pub trading: TradingConfig,
    /// 런타임 설정
    pub runtime: RuntimeConfig,
}

/// 매매 설정 (설정 파일)
#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfig {
    /// 추적 종목
    pub instruments: Vec<Instrument>,
    /// 신호당 투자 금액
    pub investment: Decimal,
    /// 청산 대기 시간
    pub sell_timeout: Duration,
    /// 타이머 없는 보유 포지션 처리 정책
    pub untracked_policy: UntrackedPositionPolicy,
}

/// 런타임 설정 (환경변수)
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// 원장 파일 경로
    pub ledger_path: PathBuf,
    /// 거래 기록 파일 경로
    pub trade_log_path: PathBuf,
    /// 원장이 없을 때 초기 잔고
    pub initial_balance: Decimal,
    /// 신호 수신 서버 주소
    pub ping_addr: SocketAddr,
    /// 호가 API 기본 URL
    pub book_url: String,
    /// 호가 요청 타임아웃
    pub http_timeout: Duration,
    /// 엔진 틱 주기
    pub tick_interval: Duration,
}

impl BotConfig {
    /// 설정 파일과 환경변수에서 설정 로드
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let trading = TradingConfig::load(path.as_ref());
        let runtime = RuntimeConfig::from_env()?;

        info!(
            instruments = trading.instruments.len(),
            investment = %trading.investment,
            sell_timeout_secs = trading.sell_timeout.as_secs(),
            policy = ?trading.untracked_policy,
            ledger = %runtime.ledger_path.display(),
            "설정 로드 완료"
        );
        Ok(Self { trading, runtime })
    }

    /// 엔진 설정 생성
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            instruments: self.trading.instruments.clone(),
            investment: self.trading.investment,
            sell_timeout: self.trading.sell_timeout,
            untracked_policy: self.trading.untracked_policy,
        }
    }
}

// ==================== 매매 설정 ====================

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            instruments: default_instruments(),
            investment: Decimal::ZERO,
            sell_timeout: Duration::from_secs(DEFAULT_SELL_TIMEOUT_SECS),
            untracked_policy: UntrackedPositionPolicy::default(),
        }
    }
}

impl TradingConfig {
    /// 설정 파일 로드. 파일이 없거나 잘못되었으면 기본값.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "설정 파일 없음, 기본값 사용");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "설정 파일 읽기 실패, 기본값 사용");
                return Self::default();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(value) => Self::from_json(&value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "설정 파일 파싱 실패, 기본값 사용");
                Self::default()
            }
        }
    }

    /// JSON 값에서 설정 생성.
    ///
    /// 종목 목록은 `tokens: [{id, slug?}]`, 없으면 `token_ids: [..]`, 둘 다 없으면 기본 토큰.
    pub fn from_json(value: &Value) -> Self {
        let defaults = Self::default();

        let instruments = normalize_tokens(value);

        let investment = match value.get("investment") {
            None | Some(Value::Null) => defaults.investment,
            Some(v) => match parse_decimal(v) {
                Some(amount) if amount >= Decimal::ZERO => amount,
                _ => {
                    warn!(investment = %v, "잘못된 investment 값, 0으로 처리");
                    Decimal::ZERO
                }
            },
        };

        let sell_timeout = match value.get("sell_timeout") {
            None | Some(Value::Null) => defaults.sell_timeout,
            Some(v) => match v.as_u64() {
                Some(secs) => Duration::from_secs(secs),
                None => {
                    warn!(sell_timeout = %v, "잘못된 sell_timeout 값, 기본값 사용");
                    defaults.sell_timeout
                }
            },
        };

        let untracked_policy = match value.get("untracked_position_policy") {
            None | Some(Value::Null) => defaults.untracked_policy,
            Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|_| {
                warn!(policy = %v, "잘못된 untracked_position_policy 값, 기본값(rearm) 사용");
                defaults.untracked_policy
            }),
        };

        Self {
            instruments,
            investment,
            sell_timeout,
            untracked_policy,
        }
    }
}

fn default_instruments() -> Vec<Instrument> {
    vec![Instrument::new(DEFAULT_TOKEN_ID, None)]
}

fn normalize_tokens(value: &Value) -> Vec<Instrument> {
    if let Some(Value::Array(tokens)) = value.get("tokens") {
        let instruments: Vec<Instrument> = tokens
            .iter()
            .filter_map(|t| {
                let id = token_id(t.get("id")?)?;
                let slug = t.get("slug").and_then(Value::as_str).map(str::to_string);
                Some(Instrument::new(id, slug))
            })
            .collect();
        if !tokens.is_empty() {
            return instruments;
        }
    }

    if let Some(Value::Array(ids)) = value.get("token_ids") {
        if !ids.is_empty() {
            return ids
                .iter()
                .filter_map(token_id)
                .map(|id| Instrument::new(id, None))
                .collect();
        }
    }

    default_instruments()
}

fn token_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn parse_decimal(value: &Value) -> Option<Decimal> {
    let repr = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&repr)
        .ok()
        .or_else(|| Decimal::from_scientific(&repr).ok())
}

// ==================== 런타임 설정 ====================

impl RuntimeConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        let ping_addr_raw = env_var_string("SNIPER_PING_ADDR", "0.0.0.0:5000");
        let ping_addr = ping_addr_raw.parse::<SocketAddr>().map_err(|e| {
            BotError::Config(format!("SNIPER_PING_ADDR 파싱 실패 ({}): {}", ping_addr_raw, e))
        })?;

        let initial_balance: Decimal = env_var_parse("SNIPER_INITIAL_BALANCE", Decimal::from(30));
        if initial_balance < Decimal::ZERO {
            return Err(BotError::Config(format!(
                "SNIPER_INITIAL_BALANCE는 음수일 수 없습니다: {}",
                initial_balance
            )));
        }

        Ok(Self {
            ledger_path: env_var_string("SNIPER_LEDGER_PATH", "balance.json").into(),
            trade_log_path: env_var_string("SNIPER_TRADE_LOG_PATH", "trades.jsonl").into(),
            initial_balance,
            ping_addr,
            book_url: env_var_string("SNIPER_BOOK_URL", DEFAULT_BASE_URL),
            http_timeout: Duration::from_secs(env_var_parse("SNIPER_HTTP_TIMEOUT_SECS", 10)),
            tick_interval: Duration::from_millis(
                env_var_parse::<u64>("SNIPER_TICK_INTERVAL_MS", 200).max(1),
            ),
        })
    }
}

/// 환경변수에서 값 파싱 (실패 시 기본값)
fn env_var_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// 환경변수 문자열 (비어 있으면 기본값)
fn env_var_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
