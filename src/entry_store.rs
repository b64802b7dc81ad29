use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, error, info};

use crate::entry::Entry;
use crate::error::StoreError;

/// エントリーの保存先ドキュメントのファイル名。
pub const ENTRIES_FILE_NAME: &str = "time-entries.json";

/// 保存処理の結果。
///
/// 保存の失敗は呼び出し側で警告として表示できるよう、エラーではなく値として返す。
#[derive(Clone, Debug, PartialEq)]
pub struct SaveOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SaveOutcome {
    pub fn saved() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// エントリー一覧を永続化するためのtrait。
///
/// 一覧全体を1つのドキュメントとして読み書きする。
#[cfg_attr(test, mockall::automock)]
pub trait EntryRepository {
    /// 保存されている全エントリーを読み込む。
    ///
    /// ドキュメントが存在しない場合は空の一覧を返す。
    fn load(&self) -> Result<Vec<Entry>, StoreError>;

    /// 全エントリーでドキュメントを上書きする。
    fn save(&self, entries: &[Entry]) -> SaveOutcome;

    /// 保存先のパスを返す。表示用。
    fn storage_path(&self) -> PathBuf;
}

/// エントリー一覧を整形済みJSONファイルとして保存するリポジトリ。
///
/// # Examples
///
/// ```
/// let store = JsonFileStore::in_dir(&data_dir);
/// let entries = store.load()?;
/// ```
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// 保存先のファイルパスを指定して`JsonFileStore`を返す。
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// データディレクトリ直下の`time-entries.json`を保存先とする`JsonFileStore`を返す。
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(ENTRIES_FILE_NAME))
    }

    /// 一時ファイルへ書き出してからリネームする。
    ///
    /// 書き込みに失敗した場合、既存のドキュメントはそのまま残る。
    fn write_document(&self, entries: &[Entry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let body = serde_json::to_string_pretty(entries).context("Failed to serialize entries")?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, body)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to move {} to {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}

impl EntryRepository for JsonFileStore {
    fn load(&self) -> Result<Vec<Entry>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("No entries file at {}, starting empty", self.path.display());
                return Ok(vec![]);
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let entries: Vec<Entry> =
            serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
        debug!("Loaded {} entries from {}", entries.len(), self.path.display());

        Ok(entries)
    }

    fn save(&self, entries: &[Entry]) -> SaveOutcome {
        match self.write_document(entries) {
            Ok(()) => {
                debug!("Saved {} entries to {}", entries.len(), self.path.display());
                SaveOutcome::saved()
            }
            Err(err) => {
                error!("Error saving entries: {:#}", err);
                SaveOutcome::failed(format!("{:#}", err))
            }
        }
    }

    fn storage_path(&self) -> PathBuf {
        self.path.clone()
    }
}
