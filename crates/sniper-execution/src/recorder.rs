//! 거래 기록기 (추가 전용 감사 로그).
//!
//! 원장은 변경이 커밋될 때마다 [`TradeRecorder::record`]를 한 번 호출합니다.
//! 기록은 외부 소비용이며 엔진이 다시 읽지 않습니다.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use sniper_core::TradeRecord;
use thiserror::Error;

/// 기록 에러.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("거래 기록 쓰기 실패 ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("거래 기록 직렬화 실패: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 거래 기록기 trait.
pub trait TradeRecorder: Send {
    /// 기록 1건 추가.
    fn record(&mut self, record: &TradeRecord) -> Result<(), RecorderError>;
}

/// JSON Lines 파일 기록기.
///
/// 한 줄에 하나의 JSON 객체를 추가합니다.
#[derive(Debug, Clone)]
pub struct JsonLinesRecorder {
    path: PathBuf,
}

impl JsonLinesRecorder {
    /// 새 기록기 생성. 파일은 첫 기록 시 생성됩니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 기록 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TradeRecorder for JsonLinesRecorder {
    fn record(&mut self, record: &TradeRecord) -> Result<(), RecorderError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let io_err = |source| RecorderError::Io {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        Ok(())
    }
}

/// 메모리 기록기.
///
/// 복제본끼리 같은 기록 목록을 공유하므로 원장에 넘긴 뒤에도 조회할 수 있습니다.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    records: Arc<Mutex<Vec<TradeRecord>>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기록 목록 복사본
    pub fn records(&self) -> Vec<TradeRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TradeRecorder for MemoryRecorder {
    fn record(&mut self, record: &TradeRecord) -> Result<(), RecorderError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use sniper_core::TradeKind;

    use super::*;

    #[test]
    fn test_json_lines_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.jsonl");
        let mut recorder = JsonLinesRecorder::new(&path);

        recorder
            .record(&TradeRecord::buy("x", dec!(10), dec!(5), dec!(25)))
            .unwrap();
        recorder
            .record(&TradeRecord::sell("x", dec!(10), dec!(7), dec!(32), dec!(2)))
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: TradeRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.kind, TradeKind::Sell);
        assert_eq!(second.instrument, "x");
    }

    #[test]
    fn test_memory_recorder_shares_records() {
        let recorder = MemoryRecorder::new();
        let mut handle = recorder.clone();
        handle
            .record(&TradeRecord::buy("x", dec!(1), dec!(1), dec!(0)))
            .unwrap();
        assert_eq!(recorder.records().len(), 1);
    }
}
