use std::io::Write;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use log::{debug, info};

use crate::console::{self, OutputFormat};
use crate::entry::clock_time;
use crate::entry_store::{EntryRepository, SaveOutcome};
use crate::form::{EntryForm, FormMode, DATE_FORMAT};
use crate::prompt::{AssumeYes, Prompt};
use crate::session::{Session, Submitted};
use crate::timer_state::TimerStateStore;

/// エントリーの各項目を指定する引数。
#[derive(Debug, Default, clap::Args)]
pub struct EntryFields {
    #[clap(
        short = 'd',
        long = "date",
        help = "Sets the date in the format YYYY-MM-DD",
        parse(try_from_str = parse_date),
    )]
    date: Option<NaiveDate>,

    #[clap(
        short = 's',
        long = "start",
        help = "Sets the start time in the format HH:MM",
        parse(try_from_str = parse_time),
    )]
    start: Option<NaiveTime>,

    #[clap(
        short = 'e',
        long = "end",
        help = "Sets the end time in the format HH:MM",
        parse(try_from_str = parse_time),
    )]
    end: Option<NaiveTime>,

    #[clap(
        short = 'u',
        long = "duration",
        help = "Sets the duration in hours, overriding the start/end calculation",
        parse(try_from_str = parse_hours),
    )]
    duration: Option<f64>,

    #[clap(short = 'm', long = "description", help = "Sets the description")]
    description: Option<String>,
}

impl EntryFields {
    /// 指定された項目だけをフォームに反映する。
    ///
    /// 時間の直接指定を先に反映し、開始・終了時刻からの自動計算で上書きされないようにする。
    fn apply(&self, form: &mut EntryForm) {
        if let Some(duration) = self.duration {
            form.set_duration(duration.to_string());
        }
        if let Some(date) = self.date {
            form.set_date(date.format(DATE_FORMAT).to_string());
        }
        if let Some(start) = self.start {
            form.set_start_time(clock_time::format(start));
        }
        if let Some(end) = self.end {
            form.set_end_time(clock_time::format(end));
        }
        if let Some(description) = &self.description {
            form.set_description(description.as_str());
        }
    }
}

/// `add`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct AddArgs {
    #[clap(flatten)]
    fields: EntryFields,
}

/// `edit`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct EditArgs {
    #[clap(help = "Id of the entry to edit")]
    id: String,

    #[clap(flatten)]
    fields: EntryFields,
}

/// `delete`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct DeleteArgs {
    #[clap(help = "Id of the entry to delete")]
    id: String,

    #[clap(short = 'y', long = "yes", help = "Deletes without asking for confirmation")]
    yes: bool,
}

/// `list`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct ListArgs {
    #[clap(
        short = 'f',
        long = "format",
        arg_enum,
        default_value = "plain",
        help = "Output format"
    )]
    format: OutputFormat,
}

/// エントリーを操作するサブコマンドの処理を行う。
pub struct EntryCommand<'a, R: EntryRepository, S: TimerStateStore, W: Write> {
    session: &'a mut Session<R, S>,
    writer: &'a mut W,
}

impl<'a, R: EntryRepository, S: TimerStateStore, W: Write> EntryCommand<'a, R, S, W> {
    /// 新しい`EntryCommand`を返す。
    ///
    /// # Arguments
    /// * `session` - エントリー一覧を保持するセッション
    /// * `writer` - 結果の出力先
    pub fn new(session: &'a mut Session<R, S>, writer: &'a mut W) -> Self {
        Self { session, writer }
    }

    /// `add`サブコマンドの処理を行う。
    ///
    /// 日付が指定されていない場合は今日の日付を利用する。
    pub fn add(&mut self, args: AddArgs) -> Result<()> {
        self.session.cancel_edit();
        args.fields.apply(self.session.form_mut());
        self.submit()
    }

    /// `edit`サブコマンドの処理を行う。
    ///
    /// 既存のエントリーをフォームに読み込み、指定された項目だけを変更して保存する。
    pub fn edit(&mut self, args: EditArgs) -> Result<()> {
        if !self.session.edit(&args.id) {
            bail!("No time entry with id {}", args.id);
        }
        args.fields.apply(self.session.form_mut());
        self.submit()
    }

    /// `delete`サブコマンドの処理を行う。
    ///
    /// `--yes`が無い場合は`prompt`で確認する。
    pub fn delete<P: Prompt + ?Sized>(&mut self, args: DeleteArgs, prompt: &mut P) -> Result<()> {
        if self.session.find(&args.id).is_none() {
            writeln!(self.writer, "No time entry with id {}; nothing deleted", args.id)
                .context("Failed to write result")?;
            return Ok(());
        }

        let outcome = if args.yes {
            self.session.delete(&args.id, &mut AssumeYes)?
        } else {
            self.session.delete(&args.id, prompt)?
        };
        match outcome {
            Some(outcome) => {
                writeln!(self.writer, "Deleted entry {}", args.id)
                    .context("Failed to write result")?;
                self.report_save(&outcome)
            }
            None => writeln!(self.writer, "Kept entry {}", args.id)
                .context("Failed to write result"),
        }
    }

    /// `list`サブコマンドの処理を行う。日付の新しい順に表示する。
    pub fn list(&mut self, args: ListArgs) -> Result<()> {
        let summary = self.session.summary();
        let mut presenter = console::presenter(args.format, self.writer);
        presenter.show_entries(self.session.entries())?;
        presenter.show_summary(&summary)
    }

    /// `summary`サブコマンドの処理を行う。
    pub fn summary(&mut self) -> Result<()> {
        writeln!(
            self.writer,
            "{}",
            console::format_summary(&self.session.summary())
        )
        .context("Failed to write summary")
    }

    /// `path`サブコマンドの処理を行う。
    pub fn path(&mut self) -> Result<()> {
        writeln!(self.writer, "{}", self.session.storage_path().display())
            .context("Failed to write storage path")
    }

    /// フォームの内容を送信し、結果を表示する。
    pub fn submit(&mut self) -> Result<()> {
        let form = self.session.form();
        debug!(
            "{}: id={:?} date={} start={} end={} duration={} (auto: {}) description={:?}",
            form.mode().title(),
            form.editing_entry_id(),
            form.date(),
            form.start_time(),
            form.end_time(),
            form.duration(),
            form.is_auto_duration(),
            form.description()
        );

        let Submitted { id, mode, outcome } = self
            .session
            .submit()
            .context("Invalid time entry")?;
        info!("{} {}", mode.submit_label(), id);

        let verb = match mode {
            FormMode::Add => "Added",
            FormMode::Update => "Updated",
        };
        writeln!(self.writer, "{} entry {}", verb, id).context("Failed to write result")?;
        self.report_save(&outcome)
    }

    // 保存の失敗はメモリ上の変更を残したまま警告だけ表示する。
    fn report_save(&mut self, outcome: &SaveOutcome) -> Result<()> {
        if outcome.success {
            return Ok(());
        }
        writeln!(
            self.writer,
            "Failed to save time entries: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        )
        .context("Failed to write result")
    }
}

/// 日付をパースする。
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .with_context(|| format!("Failed to parse date: {}", s))
}

/// 時刻をパースする。
fn parse_time(s: &str) -> Result<NaiveTime> {
    clock_time::parse(s).with_context(|| format!("Failed to parse time: {}", s))
}

/// 時間をパースする。負の値はエラーとする。
fn parse_hours(s: &str) -> Result<f64> {
    let hours: f64 = s
        .parse()
        .with_context(|| format!("Failed to parse hours: {}", s))?;
    if !hours.is_finite() || hours < 0.0 {
        bail!("Hours must be a non-negative number: {}", s);
    }
    Ok(hours)
}
