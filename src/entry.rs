use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 1件の作業記録。
///
/// `duration`は時間単位で、`start_time`/`end_time`との整合性は検証しない。
/// 手入力で上書きされた場合は一致しないことがある。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub date: NaiveDate,
    #[serde(default, with = "clock_time")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "clock_time")]
    pub end_time: Option<NaiveTime>,
    pub duration: f64,
    pub description: String,
}

impl Entry {
    /// 新しいエントリー用のIDを生成する。
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// 時刻を`HH:MM`形式で読み書きする。
///
/// 秒を持つ時刻は`HH:MM:SS`(小数秒があればその桁も)で書き出し、読み込んだ値をそのまま保つ。
pub mod clock_time {
    use chrono::{NaiveTime, Timelike};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    const FORMAT_WITH_SECONDS: &str = "%H:%M:%S%.f";

    /// `HH:MM`、`HH:MM:SS`または小数秒付きの`HH:MM:SS.fff`形式の文字列をパースする。
    pub fn parse(s: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(s, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(s, FORMAT_WITH_SECONDS))
            .ok()
    }

    /// 秒以下が0であれば`HH:MM`、そうでなければ秒以下まで含めて文字列にする。
    pub fn format(time: NaiveTime) -> String {
        if time.second() == 0 && time.nanosecond() == 0 {
            time.format(FORMAT).to_string()
        } else {
            time.format(FORMAT_WITH_SECONDS).to_string()
        }
    }

    pub fn serialize<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(time) => serializer.serialize_str(&format(*time)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => parse(s)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid time of day: {}", s))),
        }
    }
}
