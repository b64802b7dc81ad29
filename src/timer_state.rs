use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime;

/// タイマー状態の保存先ファイル名。
pub const TIMER_STATE_FILE_NAME: &str = "timer-state.json";

/// 再起動を跨いで保持するタイマーの状態。
///
/// `start_time`はエポックミリ秒。停止中は`None`。
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub running: bool,
    pub start_time: Option<i64>,
}

impl TimerState {
    pub fn running_since(start: DateTime<Utc>) -> Self {
        Self {
            running: true,
            start_time: Some(start.timestamp_millis()),
        }
    }

    pub fn idle() -> Self {
        Self::default()
    }

    /// 計測中であれば開始時刻を返す。
    ///
    /// `running`が立っていても開始時刻が無い、または範囲外の場合は停止中として扱う。
    pub fn resumable_start(&self) -> Option<DateTime<Utc>> {
        if !self.running {
            return None;
        }
        self.start_time.and_then(datetime::from_millis)
    }
}

/// タイマー状態を永続化するためのtrait。
#[cfg_attr(test, mockall::automock)]
pub trait TimerStateStore {
    /// 保存されている状態を読み込む。保存されていない場合は`None`を返す。
    fn load(&self) -> Result<Option<TimerState>>;

    fn save(&self, state: &TimerState) -> Result<()>;
}

/// タイマー状態をエントリーとは別のJSONファイルに保存する。
#[derive(Clone, Debug)]
pub struct JsonTimerStateStore {
    path: PathBuf,
}

impl JsonTimerStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(TIMER_STATE_FILE_NAME))
    }
}

impl TimerStateStore for JsonTimerStateStore {
    fn load(&self) -> Result<Option<TimerState>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        let state = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        Ok(Some(state))
    }

    fn save(&self, state: &TimerState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_string(state).context("Failed to serialize timer state")?;
        fs::write(&self.path, body)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        Ok(())
    }
}
