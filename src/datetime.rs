use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

/// 現在時刻を取得する。
///
/// タイマーの開始・停止時刻は全てこの関数を経由して取得する。
#[cfg(not(test))]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Localタイムゾーンでの今日の日付を取得する。
pub fn today() -> NaiveDate {
    now().with_timezone(&Local).date_naive()
}

/// エポックミリ秒を`DateTime<Utc>`に変換する。
///
/// 範囲外の値の場合は`None`を返す。
pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// テスト時に利用するモック時計。
///
/// スレッドごとに時刻を保持するため、テスト同士で干渉しない。
#[cfg(test)]
pub mod mock_clock {
    use std::cell::RefCell;

    use chrono::Duration;

    use super::DateTime;
    use super::Utc;

    thread_local! {
        static MOCK_TIME: RefCell<Option<DateTime<Utc>>> = RefCell::new(None);
    }

    /// モック時刻を取得する。未設定の場合は実時刻を返す。
    pub fn now() -> DateTime<Utc> {
        MOCK_TIME.with(|cell| cell.borrow().unwrap_or_else(Utc::now))
    }

    /// モック時刻を設定する。
    pub fn set(time: DateTime<Utc>) {
        MOCK_TIME.with(|cell| *cell.borrow_mut() = Some(time));
    }

    /// モック時刻を指定した時間だけ進める。
    ///
    /// モック時刻が未設定の場合は実時刻を起点にする。
    pub fn advance(by: Duration) {
        let next = now() + by;
        set(next);
    }

    /// 設定したモック時刻をクリアする。
    pub fn clear() {
        MOCK_TIME.with(|cell| *cell.borrow_mut() = None);
    }
}

#[cfg(test)]
pub use mock_clock::now;
