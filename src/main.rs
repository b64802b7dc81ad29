use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

mod config;
mod console;
mod datetime;
mod entries;
mod entry;
mod entry_command;
mod entry_store;
mod error;
mod form;
mod prompt;
mod session;
mod timer;
mod timer_command;
mod timer_state;

use config::Config;
use entry_command::{AddArgs, DeleteArgs, EditArgs, EntryCommand, ListArgs};
use entry_store::JsonFileStore;
use prompt::ConsolePrompt;
use session::Session;
use timer_command::{TimerAction, TimerArgs, TimerCommand};
use timer_state::JsonTimerStateStore;

/// 作業時間を記録するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ clocknote add -s 09:00 -e 17:30 -m "release prep"
/// $ clocknote timer start
/// $ clocknote timer stop
/// $ clocknote list
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(short = 'v', long = "verbose", global = true, help = "Shows debug logs")]
    verbose: bool,

    #[clap(
        long = "data-dir",
        global = true,
        help = "Directory holding time-entries.json and timer-state.json"
    )]
    data_dir: Option<PathBuf>,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Adds a time entry
    Add(AddArgs),
    /// Edits a time entry; only the given fields change
    Edit(EditArgs),
    /// Deletes a time entry after confirmation
    Delete(DeleteArgs),
    /// Lists time entries, newest first
    List(ListArgs),
    /// Shows the number of entries and total hours
    Summary,
    /// Shows where the entries are stored
    Path,
    /// Starts, stops or shows the timer
    Timer(TimerArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("Failed to load configuration")?;
    setup_logger(log_level(args.verbose, &config))?;

    let data_dir = config.resolve_data_dir(args.data_dir.as_deref())?;
    log::debug!("Using data directory {}", data_dir.display());

    let mut session = Session::open(
        JsonFileStore::in_dir(&data_dir),
        JsonTimerStateStore::in_dir(&data_dir),
    )
    .context("Failed to load time entries")?;

    let mut stdout = io::stdout();
    let mut prompt_out = io::stdout();
    let mut prompt = ConsolePrompt::new(io::stdin().lock(), &mut prompt_out);

    match args.subcommand {
        SubCommands::Add(add) => EntryCommand::new(&mut session, &mut stdout).add(add)?,
        SubCommands::Edit(edit) => EntryCommand::new(&mut session, &mut stdout).edit(edit)?,
        SubCommands::Delete(delete) => {
            EntryCommand::new(&mut session, &mut stdout).delete(delete, &mut prompt)?
        }
        SubCommands::List(list) => EntryCommand::new(&mut session, &mut stdout).list(list)?,
        SubCommands::Summary => EntryCommand::new(&mut session, &mut stdout).summary()?,
        SubCommands::Path => EntryCommand::new(&mut session, &mut stdout).path()?,
        SubCommands::Timer(timer) => {
            let mut command = TimerCommand::new(&mut session, &mut stdout);
            match timer.action {
                TimerAction::Start => command.start()?,
                TimerAction::Stop(stop) => command.stop(stop, &mut prompt)?,
                TimerAction::Toggle(toggle) => command.toggle(toggle, &mut prompt)?,
                TimerAction::Status => command.status()?,
                TimerAction::Watch => command.watch().await?,
            }
        }
    }

    if session.is_dirty() {
        log::warn!(
            "Changes were not written to {}",
            session.storage_path().display()
        );
    }

    Ok(())
}

/// ログの出力レベルを決める。
///
/// `--verbose`が指定された場合は`debug`、それ以外は設定ファイルの値、無ければ`warn`。
fn log_level(verbose: bool, config: &Config) -> LevelFilter {
    if verbose {
        return LevelFilter::Debug;
    }
    config
        .log_level
        .as_deref()
        .and_then(|level| level.parse().ok())
        .unwrap_or(LevelFilter::Warn)
}

/// 標準エラー出力へのロガーを設定する。
fn setup_logger(level: LevelFilter) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::BrightBlack);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} {:<5} [{}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(io::stderr())
        .apply()
        .context("Failed to set up logger")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use log::LevelFilter;
    use rstest::rstest;

    use super::{log_level, Args, SubCommands};
    use crate::config::Config;

    #[rstest]
    #[case::verbose(true, Some("error"), LevelFilter::Debug)]
    #[case::config(false, Some("info"), LevelFilter::Info)]
    #[case::invalid(false, Some("loud"), LevelFilter::Warn)]
    #[case::default(false, None, LevelFilter::Warn)]
    fn test_log_level(
        #[case] verbose: bool,
        #[case] configured: Option<&str>,
        #[case] expected: LevelFilter,
    ) {
        let config = Config {
            data_dir: None,
            log_level: configured.map(str::to_string),
        };

        assert_eq!(log_level(verbose, &config), expected);
    }

    /// 不正な日付・時刻・時間は引数の解析時に拒否されることを確認する。
    #[rstest]
    #[case::date(&["clocknote", "add", "-d", "2024-13-01"])]
    #[case::time(&["clocknote", "add", "-s", "9am"])]
    #[case::negative_hours(&["clocknote", "add", "-u", "-1"])]
    #[case::format(&["clocknote", "list", "-f", "pdf"])]
    fn test_rejects_invalid_arguments(#[case] argv: &[&str]) {
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[rstest]
    #[case::add(&["clocknote", "add", "-d", "2024-03-01", "-s", "09:00", "-e", "17:30", "-m", "release"])]
    #[case::edit(&["clocknote", "edit", "abc", "-u", "1.5"])]
    #[case::delete(&["clocknote", "delete", "abc", "--yes"])]
    #[case::list(&["clocknote", "list", "-f", "html"])]
    #[case::timer(&["clocknote", "--data-dir", "/tmp/clocknote", "timer", "stop", "-m", "x", "-y"])]
    fn test_accepts_arguments(#[case] argv: &[&str]) {
        assert!(Args::try_parse_from(argv).is_ok());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["clocknote", "summary", "-v"]).unwrap();

        assert!(args.verbose);
        assert!(matches!(args.subcommand, SubCommands::Summary));
    }
}
