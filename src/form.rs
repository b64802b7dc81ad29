use chrono::{NaiveDate, NaiveTime};

use crate::datetime;
use crate::entry::{clock_time, Entry};
use crate::error::FormError;
use crate::timer::TimerDraft;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// フォームが新規追加と更新のどちらで送信されるか。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Update,
}

impl FormMode {
    pub fn title(self) -> &'static str {
        match self {
            FormMode::Add => "Add Time Entry",
            FormMode::Update => "Edit Time Entry",
        }
    }

    pub fn submit_label(self) -> &'static str {
        match self {
            FormMode::Add => "Add Entry",
            FormMode::Update => "Update Entry",
        }
    }
}

/// エントリーの入力フォーム。
///
/// 入力値は文字列のまま保持し、送信時に`Entry`へ変換する。
/// 開始・終了時刻が両方入力されると時間を自動計算するが、
/// 時間を直接入力した後はフォームをリセットするまで自動計算しない。
#[derive(Clone, Debug, PartialEq)]
pub struct EntryForm {
    date: String,
    start_time: String,
    end_time: String,
    duration: String,
    description: String,
    editing_entry_id: Option<String>,
    auto_duration: bool,
}

impl Default for EntryForm {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryForm {
    /// 日付に今日を設定した空のフォームを返す。
    pub fn new() -> Self {
        Self {
            date: datetime::today().format(DATE_FORMAT).to_string(),
            start_time: String::new(),
            end_time: String::new(),
            duration: String::new(),
            description: String::new(),
            editing_entry_id: None,
            auto_duration: true,
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn start_time(&self) -> &str {
        &self.start_time
    }

    pub fn end_time(&self) -> &str {
        &self.end_time
    }

    pub fn duration(&self) -> &str {
        &self.duration
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn editing_entry_id(&self) -> Option<&str> {
        self.editing_entry_id.as_deref()
    }

    pub fn is_auto_duration(&self) -> bool {
        self.auto_duration
    }

    pub fn mode(&self) -> FormMode {
        if self.editing_entry_id.is_some() {
            FormMode::Update
        } else {
            FormMode::Add
        }
    }

    pub fn set_date(&mut self, value: impl Into<String>) {
        self.date = value.into();
    }

    pub fn set_start_time(&mut self, value: impl Into<String>) {
        self.start_time = value.into();
        self.recalculate_duration();
    }

    pub fn set_end_time(&mut self, value: impl Into<String>) {
        self.end_time = value.into();
        self.recalculate_duration();
    }

    /// 時間を直接入力する。
    ///
    /// 空でない値が入力された時点で自動計算を止める。
    pub fn set_duration(&mut self, value: impl Into<String>) {
        self.duration = value.into();
        if !self.duration.is_empty() {
            self.auto_duration = false;
        }
    }

    pub fn set_description(&mut self, value: impl Into<String>) {
        self.description = value.into();
    }

    /// 既存のエントリーを編集するために全項目を埋める。
    pub fn populate(&mut self, entry: &Entry) {
        self.editing_entry_id = Some(entry.id.clone());
        self.date = entry.date.format(DATE_FORMAT).to_string();
        self.start_time = format_time(entry.start_time);
        self.end_time = format_time(entry.end_time);
        self.duration = entry.duration.to_string();
        self.description = entry.description.clone();
    }

    /// タイマーの下書きで日付・時刻・時間を埋める。説明と編集対象はそのまま。
    pub fn fill_from_timer(&mut self, draft: &TimerDraft) {
        self.date = draft.date.format(DATE_FORMAT).to_string();
        self.start_time = format_time(Some(draft.start_time));
        self.end_time = format_time(Some(draft.end_time));
        self.duration = format!("{:.2}", draft.duration);
    }

    /// 編集対象を解除し、初期状態に戻す。時間の自動計算も再開する。
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// 入力値からエントリーを組み立てる。
    ///
    /// 時間は先頭の数値部分だけを読み、`8.5h`は8.5とする。空または数値で始まらない場合は0。
    pub fn build_entry(&self) -> Result<Entry, FormError> {
        let date = parse_date(&self.date)?;
        let start_time = parse_optional_time(&self.start_time)?;
        let end_time = parse_optional_time(&self.end_time)?;

        let duration = parse_leading_hours(&self.duration)
            .filter(|d| d.is_finite())
            .unwrap_or(0.0);
        if duration < 0.0 {
            return Err(FormError::NegativeDuration(duration));
        }

        Ok(Entry {
            id: self
                .editing_entry_id
                .clone()
                .unwrap_or_else(Entry::new_id),
            date,
            start_time,
            end_time,
            duration,
            description: self.description.trim().to_string(),
        })
    }

    fn recalculate_duration(&mut self) {
        if !self.auto_duration {
            return;
        }
        if let Some(hours) = calculate_duration(&self.start_time, &self.end_time) {
            self.duration = format!("{:.2}", hours);
        }
    }
}

/// 開始・終了時刻の差を時間単位で返す。
///
/// 終了が開始より前の場合は日を跨いだものとして24時間を足す。
/// どちらかが空または不正な場合は`None`。
pub fn calculate_duration(start_time: &str, end_time: &str) -> Option<f64> {
    let start = clock_time::parse(start_time.trim())?;
    let end = clock_time::parse(end_time.trim())?;

    let mut diff_ms = (end - start).num_milliseconds();
    if diff_ms < 0 {
        diff_ms += 24 * 60 * 60 * 1000;
    }

    Some(diff_ms as f64 / 3_600_000.0)
}

/// 文字列の先頭から数値として読める最長の部分を時間として返す。
fn parse_leading_hours(value: &str) -> Option<f64> {
    let value = value.trim_start();
    (1..=value.len())
        .rev()
        .filter(|end| value.is_char_boundary(*end))
        .find_map(|end| value[..end].parse::<f64>().ok())
}

fn parse_date(value: &str) -> Result<NaiveDate, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FormError::MissingDate);
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| FormError::InvalidDate(value.to_string()))
}

fn parse_optional_time(value: &str) -> Result<Option<NaiveTime>, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    clock_time::parse(value)
        .map(Some)
        .ok_or_else(|| FormError::InvalidTime(value.to_string()))
}

fn format_time(time: Option<NaiveTime>) -> String {
    time.map(clock_time::format).unwrap_or_default()
}
