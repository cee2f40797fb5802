//! 원장 영속화.
//!
//! - [`JsonFileStore`]: JSON 파일 (임시 파일 기록 후 rename으로 교체)
//! - [`MemoryStore`]: 테스트/시뮬레이션용 메모리 저장소
//!
//! 파일 저장소는 수명 동안 `<원장 파일>.lock`을 점유하여
//! 같은 원장을 여는 두 번째 프로세스를 거부합니다.

use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, warn};

use super::LedgerState;

/// 저장소 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 파일 입출력 에러
    #[error("원장 파일 입출력 실패 ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 원장 파일 손상
    #[error("원장 파일 손상 ({path}): {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// 다른 프로세스가 원장을 사용 중
    #[error("원장이 다른 프로세스에서 사용 중: {lock_path} (해당 프로세스가 없으면 잠금 파일을 삭제하세요)")]
    Locked { lock_path: PathBuf },
}

/// 원장 저장소 trait.
pub trait LedgerStore: Send {
    /// 저장된 상태 로드. 저장된 상태가 없으면 `None`.
    fn load(&mut self) -> Result<Option<LedgerState>, StoreError>;

    /// 상태 저장. 성공 시 상태가 내구성 있게 기록되어야 합니다.
    fn save(&mut self, state: &LedgerState) -> Result<(), StoreError>;
}

// ==================== JSON 파일 저장소 ====================

/// JSON 파일 원장 저장소.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileStore {
    /// 원장 파일을 열고 잠금 파일을 생성합니다.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let lock_path = sibling_with_suffix(&path, "lock");

        match create_lock(&lock_path) {
            Err(StoreError::Locked { .. }) if lock_is_stale(&lock_path) => {
                warn!(lock_path = %lock_path.display(), "종료된 프로세스의 원장 잠금 파일 회수");
                fs::remove_file(&lock_path).map_err(io_err(&lock_path))?;
                create_lock(&lock_path)?
            }
            result => result?,
        }

        debug!(path = %path.display(), "원장 파일 잠금 획득");
        Ok(Self { path, lock_path })
    }

    /// 잠금 없이 원장 파일 읽기 (조회 전용).
    pub fn peek(path: impl AsRef<Path>) -> Result<Option<LedgerState>, StoreError> {
        read_state(path.as_ref())
    }

    /// 원장 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&mut self) -> Result<Option<LedgerState>, StoreError> {
        read_state(&self.path)
    }

    fn save(&mut self, state: &LedgerState) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(state).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let tmp_path = sibling_with_suffix(&self.path, "tmp");
        let mut tmp = File::create(&tmp_path).map_err(io_err(&tmp_path))?;
        tmp.write_all(&json).map_err(io_err(&tmp_path))?;
        tmp.sync_all().map_err(io_err(&tmp_path))?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path).map_err(io_err(&self.path))?;
        Ok(())
    }
}

impl Drop for JsonFileStore {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            warn!(lock_path = %self.lock_path.display(), error = %e, "원장 잠금 파일 삭제 실패");
        }
    }
}

/// 잠금 파일 생성 후 현재 PID 기록.
fn create_lock(lock_path: &Path) -> Result<(), StoreError> {
    let mut lock = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(lock_path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => StoreError::Locked {
                lock_path: lock_path.to_path_buf(),
            },
            _ => StoreError::Io {
                path: lock_path.to_path_buf(),
                source: e,
            },
        })?;
    if let Err(e) = writeln!(lock, "{}", std::process::id()).and_then(|()| lock.sync_all()) {
        let _ = fs::remove_file(lock_path);
        return Err(io_err(lock_path)(e));
    }
    Ok(())
}

/// 잠금 파일의 PID가 더 이상 실행 중이 아닌지 확인.
///
/// PID를 읽을 수 없거나 생존 여부를 알 수 없으면 유효한 잠금으로 봅니다.
fn lock_is_stale(lock_path: &Path) -> bool {
    let Ok(content) = fs::read_to_string(lock_path) else {
        return false;
    };
    match content.trim().parse::<u32>() {
        Ok(pid) => pid != std::process::id() && process_exited(pid),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
fn process_exited(pid: u32) -> bool {
    !Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_exited(_pid: u32) -> bool {
    false
}

fn read_state(path: &Path) -> Result<Option<LedgerState>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let state: LedgerState =
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    state.validate().map_err(|reason| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason,
    })?;

    Ok(Some(state))
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io { path, source }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

// ==================== 메모리 저장소 ====================

/// 메모리 원장 저장소.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Option<LedgerState>,
    saves: usize,
}

impl MemoryStore {
    /// 빈 저장소 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 초기 상태를 가진 저장소 생성.
    pub fn with_state(state: LedgerState) -> Self {
        Self {
            state: Some(state),
            saves: 0,
        }
    }

    /// 저장 횟수
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl LedgerStore for MemoryStore {
    fn load(&mut self) -> Result<Option<LedgerState>, StoreError> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &LedgerState) -> Result<(), StoreError> {
        self.state = Some(state.clone());
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::open(dir.path().join("balance.json")).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balance.json");
        let mut store = JsonFileStore::open(&path).unwrap();

        let mut state = LedgerState::new(dec!(30));
        assert!(state.position_entry("x").apply_buy(dec!(10), dec!(5)));
        store.save(&state).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(!dir.path().join("balance.json.tmp").exists());
    }

    #[test]
    fn test_second_open_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balance.json");

        let first = JsonFileStore::open(&path).unwrap();
        let second = JsonFileStore::open(&path);
        assert!(matches!(second, Err(StoreError::Locked { .. })));

        drop(first);
        assert!(JsonFileStore::open(&path).is_ok());
    }

    #[test]
    fn test_lock_records_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balance.json");

        let _store = JsonFileStore::open(&path).unwrap();

        let content = fs::read_to_string(dir.path().join("balance.json.lock")).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_lock_of_exited_process_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balance.json");
        let lock_path = dir.path().join("balance.json.lock");
        fs::write(&lock_path, format!("{}\n", u32::MAX)).unwrap();

        let store = JsonFileStore::open(&path).unwrap();

        let content = fs::read_to_string(&lock_path).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
        drop(store);
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_unreadable_lock_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balance.json");
        let lock_path = dir.path().join("balance.json.lock");
        fs::write(&lock_path, "not-a-pid").unwrap();

        assert!(matches!(
            JsonFileStore::open(&path),
            Err(StoreError::Locked { .. })
        ));
        assert!(lock_path.exists());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balance.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = JsonFileStore::open(&path).unwrap();
        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_negative_balance_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balance.json");
        fs::write(&path, r#"{"balance": "-1", "positions": {}}"#).unwrap();

        assert!(matches!(
            JsonFileStore::peek(&path),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_empty_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balance.json");
        fs::write(&path, "\n").unwrap();

        assert!(JsonFileStore::peek(&path).unwrap().is_none());
    }
}
