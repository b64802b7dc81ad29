use std::path::PathBuf;

/// 保存先ドキュメントの読み込みに失敗した場合のエラー。
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// フォームの入力値からエントリーを組み立てられない場合のエラー。
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("Date is required")]
    MissingDate,
    #[error("Invalid date (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),
    #[error("Invalid time (expected HH:MM): {0}")]
    InvalidTime(String),
    #[error("Duration must not be negative: {0}")]
    NegativeDuration(f64),
}
