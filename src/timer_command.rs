use std::io::Write;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use log::{debug, info};

use crate::console;
use crate::entry_command::EntryCommand;
use crate::entry_store::EntryRepository;
use crate::prompt::Prompt;
use crate::session::{Session, TimerToggle};
use crate::timer::TimerDraft;
use crate::timer_state::TimerStateStore;

/// `timer`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct TimerArgs {
    #[clap(subcommand)]
    pub action: TimerAction,
}

/// タイマーの操作。
#[derive(Debug, clap::Subcommand)]
pub enum TimerAction {
    /// Starts the timer
    Start,
    /// Asks for the description, then stops the timer and saves the elapsed time as an entry
    Stop(StopArgs),
    /// Shows whether the timer is running and the elapsed time
    Status,
    /// Starts the timer if it is idle, otherwise stops it
    Toggle(StopArgs),
    /// Shows the elapsed time, refreshed every second, until Ctrl-C
    Watch,
}

/// `timer stop`サブコマンドの引数。
#[derive(Debug, Default, clap::Args)]
pub struct StopArgs {
    #[clap(short = 'm', long = "description", help = "Sets the description")]
    description: Option<String>,

    #[clap(short = 'y', long = "yes", help = "Saves the entry without asking")]
    yes: bool,
}

/// 停止時に保存するかどうかと、エントリーの説明。
struct StopPlan {
    description: String,
    save: bool,
}

impl StopPlan {
    fn discard() -> Self {
        Self {
            description: String::new(),
            save: false,
        }
    }
}

/// タイマーを操作するサブコマンドの処理を行う。
pub struct TimerCommand<'a, R: EntryRepository, S: TimerStateStore, W: Write> {
    session: &'a mut Session<R, S>,
    writer: &'a mut W,
}

impl<'a, R: EntryRepository, S: TimerStateStore, W: Write> TimerCommand<'a, R, S, W> {
    /// 新しい`TimerCommand`を返す。
    pub fn new(session: &'a mut Session<R, S>, writer: &'a mut W) -> Self {
        Self { session, writer }
    }

    /// `timer start`サブコマンドの処理を行う。既に計測中の場合は何もしない。
    pub fn start(&mut self) -> Result<()> {
        if self.session.start_timer() {
            let started_at = self.session.timer().started_at();
            writeln!(self.writer, "Timer started at {}", format_clock(started_at))
                .context("Failed to write result")?;
        } else {
            writeln!(
                self.writer,
                "Timer already running since {} ({})",
                format_clock(self.session.timer().started_at()),
                self.session.timer().display()
            )
            .context("Failed to write result")?;
        }
        Ok(())
    }

    /// `timer stop`サブコマンドの処理を行う。
    ///
    /// 説明の入力と保存の確認を済ませてからタイマーを止める。入力の途中で中断された場合、
    /// タイマーは計測中のまま残る。保存しなかった場合、下書きは破棄する。
    pub fn stop<P: Prompt + ?Sized>(&mut self, args: StopArgs, prompt: &mut P) -> Result<()> {
        if !self.session.timer().is_running() {
            writeln!(self.writer, "Timer is not running").context("Failed to write result")?;
            return Ok(());
        }

        let plan = self.plan_stop(args, prompt)?;
        match self.session.stop_timer() {
            Some(draft) => self.finish_stop(&draft, plan),
            None => Ok(()),
        }
    }

    /// `timer toggle`サブコマンドの処理を行う。停止中なら開始し、計測中なら停止する。
    pub fn toggle<P: Prompt + ?Sized>(&mut self, args: StopArgs, prompt: &mut P) -> Result<()> {
        let plan = if self.session.timer().is_running() {
            self.plan_stop(args, prompt)?
        } else {
            StopPlan::discard()
        };

        match self.session.toggle_timer() {
            TimerToggle::Started => {
                let started_at = self.session.timer().started_at();
                writeln!(self.writer, "Timer started at {}", format_clock(started_at))
                    .context("Failed to write result")
            }
            TimerToggle::Stopped(draft) => self.finish_stop(&draft, plan),
        }
    }

    // タイマーを止める前に説明と保存の可否を集める。
    fn plan_stop<P>(&mut self, args: StopArgs, prompt: &mut P) -> Result<StopPlan>
    where
        P: Prompt + ?Sized,
    {
        writeln!(
            self.writer,
            "Stopping timer started at {} ({})",
            format_clock(self.session.timer().started_at()),
            self.session.timer().display()
        )
        .context("Failed to write result")?;

        let description = match args.description {
            Some(description) => description,
            None => prompt.ask("Description")?,
        };
        let save = args.yes || prompt.confirm("Save this entry?")?;

        Ok(StopPlan { description, save })
    }

    fn finish_stop(&mut self, draft: &TimerDraft, plan: StopPlan) -> Result<()> {
        writeln!(self.writer, "Timer stopped: {}", describe_draft(draft))
            .context("Failed to write result")?;
        self.session.form_mut().set_description(plan.description);

        if !plan.save {
            debug!("Timer draft discarded");
            self.session.cancel_edit();
            writeln!(self.writer, "Entry not saved").context("Failed to write result")?;
            return Ok(());
        }

        EntryCommand::new(&mut *self.session, &mut *self.writer).submit()
    }

    /// `timer status`サブコマンドの処理を行う。
    pub fn status(&mut self) -> Result<()> {
        let timer = self.session.timer();
        let written = if timer.is_running() {
            writeln!(
                self.writer,
                "Running since {}, elapsed {}",
                format_clock(timer.started_at()),
                timer.display()
            )
        } else {
            writeln!(self.writer, "Timer is not running")
        };
        written.context("Failed to write result")
    }

    /// `timer watch`サブコマンドの処理を行う。
    ///
    /// Ctrl-Cを受け取るまで1秒ごとに経過時間を表示する。タイマーは止めない。
    pub async fn watch(&mut self) -> Result<()> {
        if !self.session.timer().is_running() {
            writeln!(self.writer, "Timer is not running").context("Failed to write result")?;
            return Ok(());
        }

        if !self.session.timer().is_ticking() {
            bail!("Timer display is not being refreshed");
        }

        let mut display = self.session.timer().subscribe();
        info!("Watching timer, press Ctrl-C to quit");
        loop {
            let elapsed = display.borrow_and_update().clone();
            write!(self.writer, "\r{}", elapsed).context("Failed to write elapsed time")?;
            self.writer.flush().context("Failed to flush output")?;

            tokio::select! {
                changed = display.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        writeln!(self.writer).context("Failed to write result")?;

        Ok(())
    }
}

fn format_clock(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn describe_draft(draft: &TimerDraft) -> String {
    format!(
        "{} {} ~ {} ({:.2}h)",
        console::format_date(draft.date),
        draft.start_time.format("%H:%M"),
        draft.end_time.format("%H:%M"),
        draft.duration
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use mockall::predicate::eq;
    use rstest::rstest;
    use tempfile::TempDir;

    use super::{StopArgs, TimerCommand};
    use crate::datetime::mock_clock;
    use crate::entry_store::{EntryRepository, JsonFileStore};
    use crate::prompt::MockPrompt;
    use crate::session::Session;
    use crate::timer_state::{JsonTimerStateStore, TimerState, TimerStateStore};

    type FileSession = Session<JsonFileStore, JsonTimerStateStore>;

    fn file_session(dir: &TempDir) -> FileSession {
        Session::open(
            JsonFileStore::in_dir(dir.path()),
            JsonTimerStateStore::in_dir(dir.path()),
        )
        .unwrap()
    }

    /// 開始するとタイマー状態が保存され、次のセッションで計測中になることを確認する。
    #[test]
    fn test_start_persists_running_state() {
        let dir = TempDir::new().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 4, 10, 9, 0, 0).unwrap();
        mock_clock::set(start);
        let mut session = file_session(&dir);
        let mut output = Vec::new();

        TimerCommand::new(&mut session, &mut output).start().unwrap();
        TimerCommand::new(&mut session, &mut output).start().unwrap();

        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].starts_with("Timer started at "));
        assert!(lines[1].starts_with("Timer already running since "));
        assert_eq!(
            JsonTimerStateStore::in_dir(dir.path()).load().unwrap(),
            Some(TimerState::running_since(start))
        );
        drop(session);
        assert!(file_session(&dir).timer().is_running());
        mock_clock::clear();
    }

    /// 再起動を挟んで停止し、経過時間のエントリーが保存されることを確認する。
    #[rstest]
    #[case::with_flags(Some("incident"), true)]
    #[case::interactive(None, false)]
    fn test_stop_saves_entry_after_restart(#[case] description: Option<&str>, #[case] yes: bool) {
        let dir = TempDir::new().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 4, 10, 9, 0, 0).unwrap();
        mock_clock::set(t0);
        TimerCommand::new(&mut file_session(&dir), &mut Vec::new())
            .start()
            .unwrap();

        mock_clock::set(t0 + Duration::minutes(150));
        let mut session = file_session(&dir);
        let mut prompt = MockPrompt::new();
        prompt
            .expect_ask()
            .with(eq("Description"))
            .times(if description.is_some() { 0 } else { 1 })
            .returning(|_| Ok("incident".to_string()));
        prompt
            .expect_confirm()
            .times(if yes { 0 } else { 1 })
            .returning(|_| Ok(true));
        let mut output = Vec::new();

        TimerCommand::new(&mut session, &mut output)
            .stop(
                StopArgs {
                    description: description.map(str::to_string),
                    yes,
                },
                &mut prompt,
            )
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("(2.50h)"));
        assert!(output.contains("Added entry "));
        let saved = JsonFileStore::in_dir(dir.path()).load().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].duration, 2.5);
        assert_eq!(saved[0].description, "incident");
        assert_eq!(
            JsonTimerStateStore::in_dir(dir.path()).load().unwrap(),
            Some(TimerState::idle())
        );
        mock_clock::clear();
    }

    /// 保存を拒否した場合はエントリーを作らないことを確認する。
    #[test]
    fn test_stop_declined() {
        let dir = TempDir::new().unwrap();
        let mut session = file_session(&dir);
        let mut prompt = MockPrompt::new();
        prompt.expect_confirm().times(1).returning(|_| Ok(false));
        let mut output = Vec::new();

        TimerCommand::new(&mut session, &mut output).start().unwrap();
        TimerCommand::new(&mut session, &mut output)
            .stop(
                StopArgs {
                    description: Some("scratch".to_string()),
                    yes: false,
                },
                &mut prompt,
            )
            .unwrap();

        assert!(String::from_utf8(output).unwrap().ends_with("Entry not saved\n"));
        assert!(session.entries().is_empty());
        assert!(!session.timer().is_running());
        assert_eq!(session.form().duration(), "");
    }

    /// 切り替えで開始と停止が交互に行われることを確認する。
    #[test]
    fn test_toggle() {
        let dir = TempDir::new().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 4, 10, 9, 0, 0).unwrap();
        mock_clock::set(start);
        let mut session = file_session(&dir);
        let mut prompt = MockPrompt::new();
        prompt.expect_ask().never();
        prompt.expect_confirm().never();
        let mut output = Vec::new();
        let args = || StopArgs {
            description: Some("triage".to_string()),
            yes: true,
        };

        TimerCommand::new(&mut session, &mut output)
            .toggle(args(), &mut prompt)
            .unwrap();
        assert!(session.timer().is_running());
        mock_clock::set(start + Duration::minutes(30));
        TimerCommand::new(&mut session, &mut output)
            .toggle(args(), &mut prompt)
            .unwrap();

        assert!(!session.timer().is_running());
        assert_eq!(session.entries().len(), 1);
        assert_eq!(session.entries()[0].duration, 0.5);
        assert_eq!(session.entries()[0].description, "triage");
        mock_clock::clear();
    }

    /// 入力が中断された場合はタイマーが計測中のまま残ることを確認する。
    #[rstest]
    #[case::description(None)]
    #[case::confirmation(Some("deploy"))]
    fn test_stop_interrupted_keeps_timer_running(#[case] description: Option<&str>) {
        let dir = TempDir::new().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 4, 10, 9, 0, 0).unwrap();
        mock_clock::set(start);
        let mut session = file_session(&dir);
        TimerCommand::new(&mut session, &mut Vec::new())
            .start()
            .unwrap();
        let mut prompt = MockPrompt::new();
        prompt
            .expect_ask()
            .returning(|_| Err(anyhow::anyhow!("stdin closed")));
        prompt
            .expect_confirm()
            .returning(|_| Err(anyhow::anyhow!("interrupted")));

        mock_clock::set(start + Duration::minutes(45));
        let result = TimerCommand::new(&mut session, &mut Vec::new()).stop(
            StopArgs {
                description: description.map(str::to_string),
                yes: false,
            },
            &mut prompt,
        );

        assert!(result.is_err());
        assert!(session.timer().is_running());
        assert!(session.entries().is_empty());
        assert_eq!(
            JsonTimerStateStore::in_dir(dir.path()).load().unwrap(),
            Some(TimerState::running_since(start))
        );
        mock_clock::clear();
    }

    #[test]
    fn test_stop_when_idle() {
        let dir = TempDir::new().unwrap();
        let mut session = file_session(&dir);
        let mut prompt = MockPrompt::new();
        prompt.expect_ask().never();
        prompt.expect_confirm().never();
        let mut output = Vec::new();

        TimerCommand::new(&mut session, &mut output)
            .stop(StopArgs::default(), &mut prompt)
            .unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "Timer is not running\n");
    }

    #[test]
    fn test_status() {
        let dir = TempDir::new().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 4, 10, 9, 0, 0).unwrap();
        mock_clock::set(start);
        let mut session = file_session(&dir);
        let mut output = Vec::new();

        TimerCommand::new(&mut session, &mut output).status().unwrap();
        TimerCommand::new(&mut session, &mut output).start().unwrap();
        mock_clock::set(start + Duration::seconds(3725));
        TimerCommand::new(&mut session, &mut output).status().unwrap();

        let output = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "Timer is not running");
        assert!(lines[2].ends_with("elapsed 01:02:05"));
        mock_clock::clear();
    }

    #[tokio::test]
    async fn test_watch_when_idle() {
        let dir = TempDir::new().unwrap();
        let mut session = file_session(&dir);
        let mut output = Vec::new();

        TimerCommand::new(&mut session, &mut output)
            .watch()
            .await
            .unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "Timer is not running\n");
    }
}
