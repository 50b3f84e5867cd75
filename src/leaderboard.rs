use crate::storage::{load_json, save_json, SaveStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_MAX_ENTRIES: usize = 10;

/// A single finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceRecord {
    pub player_name: String,
    pub total_time: f32,
    /// `None` when the run finished without completing a timed lap.
    pub best_lap_time: Option<f32>,
    pub recorded_at: DateTime<Utc>,
}

impl RaceRecord {
    pub fn new(player_name: impl Into<String>, total_time: f32, best_lap_time: Option<f32>) -> Self {
        Self { player_name: player_name.into(), total_time, best_lap_time, recorded_at: Utc::now() }
    }
}

/// Best runs, fastest first, never longer than `max_entries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LeaderboardRepr", into = "LeaderboardRepr")]
pub struct Leaderboard {
    max_entries: usize,
    entries: Vec<RaceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardRepr {
    #[serde(default = "default_max_entries")]
    max_entries: usize,
    #[serde(default)]
    entries: Vec<RaceRecord>,
}

const fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl From<LeaderboardRepr> for Leaderboard {
    fn from(value: LeaderboardRepr) -> Self {
        let mut board = Leaderboard { max_entries: value.max_entries, entries: value.entries };
        board.normalize();
        board
    }
}

impl From<Leaderboard> for LeaderboardRepr {
    fn from(value: Leaderboard) -> Self {
        Self { max_entries: value.max_entries, entries: value.entries }
    }
}

impl Default for Leaderboard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl Leaderboard {
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries, entries: Vec::new() }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn entries(&self) -> &[RaceRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn best(&self) -> Option<&RaceRecord> {
        self.entries.first()
    }

    pub fn worst(&self) -> Option<&RaceRecord> {
        self.entries.last()
    }

    pub fn is_qualifying_time(&self, total_time: f32) -> bool {
        if self.entries.len() < self.max_entries {
            return true;
        }
        match self.worst() {
            Some(worst) => total_time < worst.total_time,
            None => false,
        }
    }

    /// Inserts `record` in time order and trims the board. Returns whether the record is still
    /// on the board afterwards.
    pub fn add_time(&mut self, record: RaceRecord) -> bool {
        let position = self.entries.partition_point(|entry| entry.total_time <= record.total_time);
        self.entries.insert(position, record);
        self.entries.truncate(self.max_entries);
        position < self.max_entries
    }

    fn normalize(&mut self) {
        self.entries.sort_by(|a, b| a.total_time.total_cmp(&b.total_time));
        self.entries.truncate(self.max_entries);
    }

    /// Loads the board stored in `slot`, or an empty one. The board takes `max_entries` from the
    /// caller, so a smaller configured size drops the slowest stored records.
    pub fn load(store: &dyn SaveStore, slot: &str, max_entries: usize) -> Self {
        let mut board = load_json::<Leaderboard>(store, slot).unwrap_or_else(|| Leaderboard::new(max_entries));
        if board.max_entries != max_entries {
            debug!(slot, stored = board.max_entries, configured = max_entries, "resizing stored leaderboard");
            board.max_entries = max_entries;
            board.entries.truncate(max_entries);
        }
        board
    }

    pub fn exists(store: &dyn SaveStore, slot: &str) -> bool {
        store.exists(slot)
    }

    pub fn save(&self, store: &mut dyn SaveStore, slot: &str) -> Result<()> {
        save_json(store, slot, self)
    }
}

/// Formats seconds as `MM:SS.mmm`.
pub fn format_race_time(seconds: f32) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let minutes = (seconds / 60.0).floor();
    let remainder = seconds - minutes * 60.0;
    format!("{:02}:{:06.3}", minutes as u32, remainder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySaveStore;

    fn record(time: f32) -> RaceRecord {
        RaceRecord::new("Player1", time, Some(time / 3.0))
    }

    fn times(board: &Leaderboard) -> Vec<f32> {
        board.entries().iter().map(|entry| entry.total_time).collect()
    }

    #[test]
    fn insert_into_full_board_drops_worst() {
        let mut board = Leaderboard::new(2);
        assert!(board.add_time(record(60.0)));
        assert!(board.add_time(record(50.0)));

        assert!(board.is_qualifying_time(55.0));
        assert!(board.add_time(record(55.0)));
        assert_eq!(times(&board), vec![50.0, 55.0]);
    }

    #[test]
    fn slower_time_does_not_qualify_on_full_board() {
        let mut board = Leaderboard::new(2);
        board.add_time(record(50.0));
        board.add_time(record(60.0));
        assert!(!board.is_qualifying_time(60.0));
        assert!(!board.is_qualifying_time(75.0));
        assert!(!board.add_time(record(75.0)));
        assert_eq!(times(&board), vec![50.0, 60.0]);
    }

    #[test]
    fn any_time_qualifies_until_full() {
        let mut board = Leaderboard::new(3);
        for time in [500.0, 0.5, 42.0] {
            assert!(board.is_qualifying_time(time));
            assert!(board.add_time(record(time)));
        }
        assert_eq!(times(&board), vec![0.5, 42.0, 500.0]);
        assert!(!board.is_qualifying_time(600.0));
    }

    #[test]
    fn ties_keep_earlier_record_first() {
        let mut board = Leaderboard::new(2);
        board.add_time(RaceRecord::new("first", 30.0, None));
        board.add_time(RaceRecord::new("second", 40.0, None));
        assert!(!board.add_time(RaceRecord::new("late", 40.0, None)));
        assert_eq!(board.entries()[1].player_name, "second");
    }

    #[test]
    fn stays_sorted_and_bounded_across_many_inserts() {
        let mut board = Leaderboard::new(5);
        for i in 0..40 {
            let time = ((i * 37) % 23) as f32 + 10.0;
            board.add_time(record(time));
            assert!(board.len() <= 5);
            assert!(board.entries().windows(2).all(|pair| pair[0].total_time <= pair[1].total_time));
        }
    }

    #[test]
    fn zero_capacity_board_rejects_everything() {
        let mut board = Leaderboard::new(0);
        assert!(!board.is_qualifying_time(1.0));
        assert!(!board.add_time(record(1.0)));
        assert!(board.is_empty());
    }

    #[test]
    fn missing_slot_loads_empty_board() {
        let store = MemorySaveStore::new();
        let board = Leaderboard::load(&store, "nothing", 7);
        assert!(board.is_empty());
        assert_eq!(board.max_entries(), 7);
        assert!(!Leaderboard::exists(&store, "nothing"));
    }

    #[test]
    fn stored_board_round_trips() {
        let mut store = MemorySaveStore::new();
        let mut board = Leaderboard::new(4);
        board.add_time(RaceRecord::new("A", 61.25, Some(20.5)));
        board.add_time(RaceRecord::new("B", 58.0, None));
        board.save(&mut store, "board").expect("save board");

        let loaded = Leaderboard::load(&store, "board", 4);
        assert_eq!(loaded, board);
        assert_eq!(loaded.entries()[0].best_lap_time, None);
    }

    #[test]
    fn configured_size_overrides_stored_size() {
        let mut store = MemorySaveStore::new();
        let mut board = Leaderboard::new(10);
        for time in [30.0, 10.0, 20.0] {
            board.add_time(record(time));
        }
        board.save(&mut store, "board").expect("save board");

        let smaller = Leaderboard::load(&store, "board", 2);
        assert_eq!(smaller.max_entries(), 2);
        assert_eq!(times(&smaller), vec![10.0, 20.0]);
        assert!(!smaller.is_qualifying_time(25.0));

        let larger = Leaderboard::load(&store, "board", 20);
        assert_eq!(larger.max_entries(), 20);
        assert_eq!(larger.len(), 3);
        assert!(larger.is_qualifying_time(99.0));
    }

    #[test]
    fn unsorted_file_is_normalized_on_load() {
        let mut store = MemorySaveStore::new();
        let json = r#"{
            "maxEntries": 2,
            "entries": [
                {"playerName": "slow", "totalTime": 90.0, "bestLapTime": 30.0, "recordedAt": "2024-01-01T00:00:00Z"},
                {"playerName": "fast", "totalTime": 45.0, "bestLapTime": null, "recordedAt": "2024-01-02T00:00:00Z"},
                {"playerName": "mid", "totalTime": 60.0, "bestLapTime": 20.0, "recordedAt": "2024-01-03T00:00:00Z"}
            ]
        }"#;
        store.save("board", json.as_bytes()).expect("save raw");
        let board = Leaderboard::load(&store, "board", 10);
        let names: Vec<&str> = board.entries().iter().map(|entry| entry.player_name.as_str()).collect();
        assert_eq!(names, vec!["fast", "mid"]);
    }

    #[test]
    fn persisted_shape_uses_camel_case() {
        let mut store = MemorySaveStore::new();
        let mut board = Leaderboard::new(1);
        board.add_time(RaceRecord::new("A", 12.0, Some(4.0)));
        board.save(&mut store, "board").expect("save");
        let raw = String::from_utf8(store.load("board").expect("slot")).expect("utf8");
        for key in ["maxEntries", "entries", "playerName", "totalTime", "bestLapTime", "recordedAt"] {
            assert!(raw.contains(key), "missing key {key} in {raw}");
        }
    }

    #[test]
    fn formats_minutes_seconds_millis() {
        assert_eq!(format_race_time(0.0), "00:00.000");
        assert_eq!(format_race_time(75.5), "01:15.500");
        assert_eq!(format_race_time(9.25), "00:09.250");
        assert_eq!(format_race_time(-3.0), "00:00.000");
    }
}
