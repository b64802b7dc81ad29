use std::path::PathBuf;

use anyhow::Result;
use log::{debug, info, warn};

use crate::entries::{EntryCollection, Summary};
use crate::entry::Entry;
use crate::entry_store::{EntryRepository, SaveOutcome};
use crate::error::{FormError, StoreError};
use crate::form::{EntryForm, FormMode};
use crate::prompt::Prompt;
use crate::timer::{Timer, TimerDraft};
use crate::timer_state::TimerStateStore;

pub const DELETE_CONFIRMATION: &str = "Are you sure you want to delete this entry?";

/// フォーム送信の結果。
#[derive(Clone, Debug, PartialEq)]
pub struct Submitted {
    pub id: String,
    pub mode: FormMode,
    pub outcome: SaveOutcome,
}

/// タイマーの切り替え結果。
#[derive(Clone, Debug, PartialEq)]
pub enum TimerToggle {
    Started,
    Stopped(TimerDraft),
}

/// エントリー一覧・入力フォーム・タイマーをまとめて保持するセッション。
///
/// 変更操作の後は必ず一覧全体を保存する。保存に失敗してもメモリ上の変更は戻さず、
/// 次に保存が成功するまで`is_dirty`が`true`になる。
pub struct Session<R: EntryRepository, S: TimerStateStore> {
    repository: R,
    entries: EntryCollection,
    form: EntryForm,
    timer: Timer<S>,
    dirty: bool,
}

impl<R: EntryRepository, S: TimerStateStore> Session<R, S> {
    /// 保存済みのエントリーとタイマー状態を読み込んでセッションを開始する。
    ///
    /// エントリーが読み込めない場合はエラーを返す。
    pub fn open(repository: R, timer_store: S) -> Result<Self, StoreError> {
        let entries = repository.load()?;
        info!("Loaded {} time entries", entries.len());

        Ok(Self {
            repository,
            entries: EntryCollection::new(entries),
            form: EntryForm::new(),
            timer: Timer::restore(timer_store),
            dirty: false,
        })
    }

    pub fn entries(&self) -> &[Entry] {
        self.entries.as_slice()
    }

    pub fn find(&self, id: &str) -> Option<&Entry> {
        self.entries.find(id)
    }

    pub fn summary(&self) -> Summary {
        self.entries.aggregate()
    }

    pub fn storage_path(&self) -> PathBuf {
        self.repository.storage_path()
    }

    pub fn form(&self) -> &EntryForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut EntryForm {
        &mut self.form
    }

    pub fn timer(&self) -> &Timer<S> {
        &self.timer
    }

    /// 直近の保存に失敗し、メモリ上の一覧がディスクと食い違っているかどうか。
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// フォームの内容でエントリーを追加または更新し、保存する。
    ///
    /// 更新対象が既に無い場合は何も変更しない。保存の成否に関わらずフォームはリセットする。
    pub fn submit(&mut self) -> Result<Submitted, FormError> {
        let entry = self.form.build_entry()?;
        let id = entry.id.clone();
        let mode = self.form.mode();

        match mode {
            FormMode::Update => {
                if !self.entries.update(&id, entry) {
                    debug!("Entry {} no longer exists, nothing to update", id);
                }
            }
            FormMode::Add => self.entries.add(entry),
        }

        let outcome = self.persist();
        self.form.reset();

        Ok(Submitted { id, mode, outcome })
    }

    /// 既存のエントリーをフォームに読み込み、編集を始める。
    ///
    /// 該当が無い場合は`false`を返す。
    pub fn edit(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.find(id) else {
            return false;
        };
        self.form.populate(entry);
        true
    }

    pub fn cancel_edit(&mut self) {
        self.form.reset();
    }

    /// 確認の上でエントリーを削除し、保存する。
    ///
    /// 確認が得られなかった場合は何もせず`None`を返す。
    pub fn delete<P>(&mut self, id: &str, prompt: &mut P) -> Result<Option<SaveOutcome>>
    where
        P: Prompt + ?Sized,
    {
        if !prompt.confirm(DELETE_CONFIRMATION)? {
            debug!("Deletion of {} cancelled", id);
            return Ok(None);
        }

        if self.entries.remove(id) {
            info!("Deleted entry {}", id);
        }
        Ok(Some(self.persist()))
    }

    pub fn start_timer(&mut self) -> bool {
        self.timer.start()
    }

    /// タイマーを停止し、下書きをフォームに流し込む。保存はしない。
    pub fn stop_timer(&mut self) -> Option<TimerDraft> {
        let draft = self.timer.stop()?;
        self.form.fill_from_timer(&draft);
        Some(draft)
    }

    pub fn toggle_timer(&mut self) -> TimerToggle {
        match self.stop_timer() {
            Some(draft) => TimerToggle::Stopped(draft),
            None => {
                self.start_timer();
                TimerToggle::Started
            }
        }
    }

    fn persist(&mut self) -> SaveOutcome {
        let outcome = self.repository.save(self.entries.as_slice());
        self.dirty = !outcome.success;
        if let Some(err) = &outcome.error {
            warn!("Entries changed in memory but not saved: {}", err);
        }
        outcome
    }
}
