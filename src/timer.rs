use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Timelike, Utc};
use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::datetime;
use crate::timer_state::{TimerState, TimerStateStore};

/// 表示を更新する間隔。
///
/// 経過時間は常に開始時刻から計算し直すため、表示の更新頻度でしかない。
pub const TICK_PERIOD: StdDuration = StdDuration::from_secs(1);

pub const IDLE_DISPLAY: &str = "00:00:00";

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// タイマー停止時に作られるエントリーの下書き。
///
/// フォームに流し込むだけで、保存はしない。
#[derive(Clone, Debug, PartialEq)]
pub struct TimerDraft {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration: f64,
}

impl TimerDraft {
    /// 開始・終了時刻から下書きを作る。
    ///
    /// 日付と時刻はLocalタイムゾーンで、時刻は分単位に切り捨てる。
    /// 時間は小数第2位に丸める。
    pub fn from_span(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let local_start = start.with_timezone(&Local);
        let local_end = end.with_timezone(&Local);

        Self {
            date: local_start.date_naive(),
            start_time: truncate_to_minute(local_start.time()),
            end_time: truncate_to_minute(local_end.time()),
            duration: round_hours(elapsed_hours(end - start)),
        }
    }
}

/// 開始・停止を切り替えるストップウォッチ。
///
/// 状態が変わる度に`TimerStateStore`へ保存し、次回起動時に計測を再開できるようにする。
pub struct Timer<S: TimerStateStore> {
    store: S,
    started_at: Option<DateTime<Utc>>,
    ticker: Option<JoinHandle<()>>,
    display: Arc<watch::Sender<String>>,
}

impl<S: TimerStateStore> Timer<S> {
    /// 停止状態の`Timer`を返す。
    pub fn new(store: S) -> Self {
        let (display, _) = watch::channel(IDLE_DISPLAY.to_string());
        Self {
            store,
            started_at: None,
            ticker: None,
            display: Arc::new(display),
        }
    }

    /// 保存されている状態を読み込み、計測中であれば再開した`Timer`を返す。
    ///
    /// 読み込みに失敗した場合は停止状態として扱う。
    pub fn restore(store: S) -> Self {
        let saved = match store.load() {
            Ok(saved) => saved,
            Err(err) => {
                error!("Error loading timer state: {:#}", err);
                None
            }
        };

        let mut timer = Self::new(store);
        if let Some(start) = saved.as_ref().and_then(TimerState::resumable_start) {
            timer.resume_from(start);
        }
        timer
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// 表示更新の定期処理が動いているかどうか。
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    /// 計測を開始する。
    ///
    /// 既に計測中の場合は何もせず`false`を返す。
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            debug!("Timer already running");
            return false;
        }

        let start = datetime::now();
        self.started_at = Some(start);
        self.schedule_tick(start);
        self.persist(TimerState::running_since(start));
        info!("Timer started at {}", start);
        true
    }

    /// 計測を停止し、経過時間からエントリーの下書きを返す。
    ///
    /// 停止中に呼ばれた場合は何もせず`None`を返す。
    pub fn stop(&mut self) -> Option<TimerDraft> {
        let start = self.started_at.take()?;
        let end = datetime::now();

        self.cancel_tick();
        self.display.send_replace(IDLE_DISPLAY.to_string());
        self.persist(TimerState::idle());

        let draft = TimerDraft::from_span(start, end);
        info!("Timer stopped after {:.2} hours", draft.duration);
        Some(draft)
    }

    /// 経過時間を返す。停止中は`None`。
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| datetime::now() - start)
    }

    /// 経過時間を`HH:MM:SS`形式で返す。停止中は`00:00:00`。
    pub fn display(&self) -> String {
        self.elapsed()
            .map(format_elapsed)
            .unwrap_or_else(|| IDLE_DISPLAY.to_string())
    }

    /// 毎秒更新される表示文字列を購読する。
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.display.subscribe()
    }

    fn resume_from(&mut self, start: DateTime<Utc>) {
        self.started_at = Some(start);
        self.schedule_tick(start);
        info!("Resumed timer started at {}", start);
    }

    fn schedule_tick(&mut self, start: DateTime<Utc>) {
        if self.ticker.is_some() {
            return;
        }
        self.display.send_replace(format_elapsed(datetime::now() - start));

        let Ok(handle) = Handle::try_current() else {
            debug!("No async runtime, display refresh disabled");
            return;
        };
        let display = Arc::clone(&self.display);
        self.ticker = Some(handle.spawn(async move {
            let mut interval = tokio::time::interval(TICK_PERIOD);
            loop {
                interval.tick().await;
                display.send_replace(format_elapsed(datetime::now() - start));
            }
        }));
    }

    fn cancel_tick(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn persist(&self, state: TimerState) {
        if let Err(err) = self.store.save(&state) {
            warn!("Error saving timer state: {:#}", err);
        }
    }
}

impl<S: TimerStateStore> Drop for Timer<S> {
    fn drop(&mut self) {
        self.cancel_tick();
    }
}

/// 経過時間を`HH:MM:SS`形式にする。秒未満は切り捨てる。
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_seconds = elapsed.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60
    )
}

/// 経過時間を時間単位の小数にする。負の値は0とする。
pub fn elapsed_hours(elapsed: Duration) -> f64 {
    elapsed.num_milliseconds().max(0) as f64 / MILLIS_PER_HOUR
}

/// 小数第2位に丸める。
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}
