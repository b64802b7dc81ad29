use std::io::Write;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};

use crate::entries::Summary;
use crate::entry::{clock_time, Entry};

/// エントリー一覧を表示するためのtrait。
pub trait EntryPresenter {
    /// エントリー一覧を表示する。一覧は渡された順に表示する。
    ///
    /// # Arguments
    ///
    /// * `entries` - 表示するエントリー
    fn show_entries(&mut self, entries: &[Entry]) -> Result<()>;

    /// 件数と合計時間を表示する。
    fn show_summary(&mut self, summary: &Summary) -> Result<()>;
}

/// 一覧の表示形式。
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ArgEnum)]
pub enum OutputFormat {
    Plain,
    Markdown,
    Html,
}

/// 表示形式に応じた`EntryPresenter`を返す。
pub fn presenter<'a, W: Write>(
    format: OutputFormat,
    writer: &'a mut W,
) -> Box<dyn EntryPresenter + 'a> {
    match format {
        OutputFormat::Plain => Box::new(ConsoleTable::new(writer)),
        OutputFormat::Markdown => Box::new(ConsoleMarkdownList::new(writer)),
        OutputFormat::Html => Box::new(HtmlTable::new(writer)),
    }
}

/// エントリーを表形式で表示する。
pub struct ConsoleTable<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleTable<'a, W> {
    /// 新しい`ConsoleTable`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> EntryPresenter for ConsoleTable<'a, W> {
    fn show_entries(&mut self, entries: &[Entry]) -> Result<()> {
        if entries.is_empty() {
            writeln!(
                self.writer,
                "No time entries yet. Add your first entry with `clocknote add`!"
            )
            .context("Failed to write empty state")?;
            return Ok(());
        }

        let id_width = entries
            .iter()
            .map(|entry| sanitize_text(&entry.id).chars().count())
            .max()
            .unwrap_or(0)
            .max(2);
        writeln!(
            self.writer,
            "{:<id_width$}  {:<17}  {:>5}  {:>5}  {:>6}  DESCRIPTION",
            "ID", "DATE", "START", "END", "HOURS",
        )
        .context("Failed to write table header")?;

        for entry in entries {
            writeln!(
                self.writer,
                "{:<id_width$}  {:<17}  {:>5}  {:>5}  {:>6.2}  {}",
                sanitize_text(&entry.id),
                format_date(entry.date),
                format_time(entry.start_time),
                format_time(entry.end_time),
                entry.duration,
                sanitize_text(&entry.description),
            )
            .with_context(|| format!("Failed to write time entry: {}", entry.id))?;
        }

        Ok(())
    }

    fn show_summary(&mut self, summary: &Summary) -> Result<()> {
        writeln!(self.writer, "{}", format_summary(summary)).context("Failed to write summary")
    }
}

/// エントリーをMarkdownのlist形式で表示する。
///
/// 説明は`escape_markdown`を通す。
pub struct ConsoleMarkdownList<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleMarkdownList<'a, W> {
    /// 新しい`ConsoleMarkdownList`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> EntryPresenter for ConsoleMarkdownList<'a, W> {
    fn show_entries(&mut self, entries: &[Entry]) -> Result<()> {
        for entry in entries {
            writeln!(
                self.writer,
                "- {} {} ~ {} ({:.2}h): {}",
                entry.date.format("%Y-%m-%d"),
                format_time(entry.start_time),
                format_time(entry.end_time),
                entry.duration,
                escape_markdown(&entry.description),
            )
            .with_context(|| format!("Failed to write time entry: {}", entry.id))?;
        }

        Ok(())
    }

    fn show_summary(&mut self, summary: &Summary) -> Result<()> {
        writeln!(self.writer, "\n**{}**", format_summary(summary))
            .context("Failed to write summary")
    }
}

/// エントリーをHTMLのtableとして出力する。
///
/// 利用者が入力した文字列は全て`escape_html`を通す。
pub struct HtmlTable<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> HtmlTable<'a, W> {
    /// 新しい`HtmlTable`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

impl<'a, W: Write> EntryPresenter for HtmlTable<'a, W> {
    fn show_entries(&mut self, entries: &[Entry]) -> Result<()> {
        writeln!(
            self.writer,
            "<table class=\"entries\">\n  <thead>\n    <tr><th>Date</th><th>Start</th><th>End</th><th>Hours</th><th>Description</th></tr>\n  </thead>\n  <tbody>"
        )
        .context("Failed to write table header")?;

        if entries.is_empty() {
            writeln!(
                self.writer,
                "    <tr class=\"empty-state\"><td colspan=\"5\">No time entries yet. Add your first entry above!</td></tr>"
            )
            .context("Failed to write empty state")?;
        }

        for entry in entries {
            writeln!(
                self.writer,
                "    <tr data-id=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td><td>{}</td></tr>",
                escape_html(&entry.id),
                format_date(entry.date),
                format_time(entry.start_time),
                format_time(entry.end_time),
                entry.duration,
                escape_html(&entry.description),
            )
            .with_context(|| format!("Failed to write time entry: {}", entry.id))?;
        }

        writeln!(self.writer, "  </tbody>\n</table>").context("Failed to write table footer")
    }

    fn show_summary(&mut self, summary: &Summary) -> Result<()> {
        writeln!(
            self.writer,
            "<p class=\"stats\"><span>{}</span> <span>{}</span></p>",
            format_count(summary.count),
            format_hours(summary.total_duration_hours),
        )
        .context("Failed to write summary")
    }
}

/// HTMLとして解釈されないように文字列をエスケープする。
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Markdownの中に埋め込む文字列をエスケープする。
///
/// 強調やリンクになる記号をバックスラッシュでエスケープした上で、HTMLとして解釈されないよう
/// `escape_html`を通す。
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '`' | '*' | '_' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escape_html(&sanitize_text(&escaped))
}

/// 端末の制御文字として解釈されないように文字列を無害化する。
///
/// 制御文字は`\u{1b}`のようなエスケープ表記に置き換える。
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_control() {
                c.escape_default().to_string()
            } else {
                c.to_string()
            }
        })
        .collect()
}

/// 日付を`Mon, Jan 15, 2024`の形式にする。
pub fn format_date(date: NaiveDate) -> String {
    date.format("%a, %b %-d, %Y").to_string()
}

/// 時刻を`HH:MM`形式にする。未入力の場合は`-`。
pub fn format_time(time: Option<NaiveTime>) -> String {
    time.map(|t| t.format(clock_time::FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_count(count: usize) -> String {
    format!("{} {}", count, if count == 1 { "entry" } else { "entries" })
}

pub fn format_hours(hours: f64) -> String {
    format!("{:.2} hours", hours)
}

pub fn format_summary(summary: &Summary) -> String {
    format!(
        "{} / {}",
        format_count(summary.count),
        format_hours(summary.total_duration_hours)
    )
}
