use std::io::{BufRead, Write};

use anyhow::{Context, Result};

/// ユーザーに確認や入力を求めるためのtrait。
#[cfg_attr(test, mockall::automock)]
pub trait Prompt {
    /// はい/いいえで確認する。
    fn confirm(&mut self, message: &str) -> Result<bool>;

    /// 1行の入力を求める。末尾の改行は取り除く。
    fn ask(&mut self, label: &str) -> Result<String>;
}

/// 標準入出力で対話する`Prompt`。
pub struct ConsolePrompt<'a, R: BufRead, W: Write> {
    reader: R,
    writer: &'a mut W,
}

impl<'a, R: BufRead, W: Write> ConsolePrompt<'a, R, W> {
    /// 新しい`ConsolePrompt`を返す。
    pub fn new(reader: R, writer: &'a mut W) -> Self {
        Self { reader, writer }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .context("Failed to read from input")?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl<'a, R: BufRead, W: Write> Prompt for ConsolePrompt<'a, R, W> {
    // `y`または`yes`のみを了承として扱う。入力が無い場合は拒否。
    fn confirm(&mut self, message: &str) -> Result<bool> {
        write!(self.writer, "{} [y/N] ", message).context("Failed to write prompt")?;
        self.writer.flush().context("Failed to flush prompt")?;

        let answer = self.read_line()?;
        Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }

    fn ask(&mut self, label: &str) -> Result<String> {
        write!(self.writer, "{}: ", label).context("Failed to write prompt")?;
        self.writer.flush().context("Failed to flush prompt")?;

        self.read_line()
    }
}

/// 確認を全て了承する`Prompt`。`--yes`指定時に使う。
pub struct AssumeYes;

impl Prompt for AssumeYes {
    fn confirm(&mut self, _message: &str) -> Result<bool> {
        Ok(true)
    }

    fn ask(&mut self, _label: &str) -> Result<String> {
        Ok(String::new())
    }
}
