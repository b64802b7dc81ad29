use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const APP_DIR_NAME: &str = "clocknote";
pub const DATA_DIR_ENV: &str = "CLOCKNOTE_DATA_DIR";

/// 設定ファイル`config.toml`の内容。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// エントリーとタイマー状態を保存するディレクトリ。
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// `error`, `warn`, `info`, `debug`, `trace`のいずれか。
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Cannot determine config directory")?
            .join(APP_DIR_NAME)
            .join("config.toml"))
    }

    /// 設定ファイルを読み込む。存在しない場合はデフォルト値を返す。
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        Ok(config)
    }

    /// データディレクトリを決める。
    ///
    /// コマンドライン引数、環境変数`CLOCKNOTE_DATA_DIR`、設定ファイル、
    /// OS標準のデータディレクトリの順に優先する。
    pub fn resolve_data_dir(&self, cli_override: Option<&Path>) -> Result<PathBuf> {
        let from_env = env::var_os(DATA_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        self.resolve_data_dir_with(cli_override, from_env)
    }

    fn resolve_data_dir_with(
        &self,
        cli_override: Option<&Path>,
        from_env: Option<PathBuf>,
    ) -> Result<PathBuf> {
        if let Some(dir) = cli_override {
            return Ok(dir.to_path_buf());
        }
        if let Some(dir) = from_env.or_else(|| self.data_dir.clone()) {
            return Ok(dir);
        }
        Ok(dirs::data_dir()
            .context("Cannot determine data directory")?
            .join(APP_DIR_NAME))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use rstest::rstest;
    use tempfile::TempDir;

    use super::Config;

    #[test]
    fn test_load_missing_is_default() {
        let dir = TempDir::new().unwrap();

        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "data_dir = \"/srv/clocknote\"\nlog_level = \"debug\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/clocknote")));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "data_dir = [").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    /// 引数、環境変数、設定ファイルの順に優先されることを確認する。
    #[rstest]
    #[case::cli(Some("/cli"), Some("/env"), Some("/file"), "/cli")]
    #[case::env(None, Some("/env"), Some("/file"), "/env")]
    #[case::file(None, None, Some("/file"), "/file")]
    fn test_resolve_data_dir(
        #[case] cli: Option<&str>,
        #[case] env: Option<&str>,
        #[case] file: Option<&str>,
        #[case] expected: &str,
    ) {
        let config = Config {
            data_dir: file.map(PathBuf::from),
            log_level: None,
        };

        let resolved = config
            .resolve_data_dir_with(cli.map(Path::new), env.map(PathBuf::from))
            .unwrap();

        assert_eq!(resolved, PathBuf::from(expected));
    }
}
