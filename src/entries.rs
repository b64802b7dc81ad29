use crate::entry::Entry;

/// エントリー一覧の集計結果。
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub total_duration_hours: f64,
}

/// メモリ上のエントリー一覧。
///
/// 追加・更新の後は常に日付の降順に並べ替える。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntryCollection {
    entries: Vec<Entry>,
}

impl EntryCollection {
    /// 読み込み済みのエントリーから`EntryCollection`を返す。
    ///
    /// 保存されている並び順をそのまま保持する。
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// エントリーを末尾に追加し、並べ替える。
    pub fn add(&mut self, entry: Entry) {
        self.entries.push(entry);
        self.sort_descending_by_date();
    }

    /// `id`が一致するエントリーを置き換え、並べ替える。
    ///
    /// `id`は元の値を保持する。該当が無い場合は何もせず`false`を返す。
    pub fn update(&mut self, id: &str, entry: Entry) -> bool {
        let Some(slot) = self.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        *slot = Entry {
            id: id.to_string(),
            ..entry
        };
        self.sort_descending_by_date();
        true
    }

    /// `id`が一致するエントリーを取り除く。該当が無い場合は`false`を返す。
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// 日付の新しい順に並べ替える。同じ日付の間では元の順序を保つ。
    pub fn sort_descending_by_date(&mut self) {
        self.entries.sort_by(|a, b| b.date.cmp(&a.date));
    }

    /// 件数と合計時間を集計する。
    pub fn aggregate(&self) -> Summary {
        Summary {
            count: self.entries.len(),
            total_duration_hours: self.entries.iter().map(|e| e.duration).sum(),
        }
    }

    pub fn find(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn as_slice(&self) -> &[Entry] {
        &self.entries
    }
}
