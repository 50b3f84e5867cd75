use crate::events::RaceEvent;
use crate::leaderboard::{format_race_time, Leaderboard};
use crate::race::RaceSettings;
use crate::storage::SaveStore;
use anyhow::Result;
use std::any::Any;
use std::collections::VecDeque;
use tracing::{info, warn};

const DEFAULT_EVENT_LOG_CAPACITY: usize = 64;
const HUD_LINE_CAPACITY: usize = 32;

/// Read-only view handed to observers while events are dispatched.
pub struct ObserverContext<'a> {
    pub store: &'a dyn SaveStore,
    pub settings: &'a RaceSettings,
    pub total_laps: u32,
}

/// Subscriber for race notifications and per-frame vehicle telemetry.
pub trait RaceObserver: Any {
    fn name(&self) -> &'static str;

    fn on_events(&mut self, _ctx: &ObserverContext<'_>, _events: &[RaceEvent]) -> Result<()> {
        Ok(())
    }

    fn on_telemetry(&mut self, _speed: f32, _gear: i32) {}

    fn as_any(&self) -> &dyn Any;
}

#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn RaceObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Box<dyn RaceObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.observers.iter().map(|observer| observer.name()).collect()
    }

    pub fn get<T: RaceObserver>(&self) -> Option<&T> {
        self.observers.iter().find_map(|observer| observer.as_any().downcast_ref::<T>())
    }

    pub fn dispatch_events(&mut self, ctx: &ObserverContext<'_>, events: &[RaceEvent]) {
        if events.is_empty() {
            return;
        }
        for observer in &mut self.observers {
            let name = observer.name();
            if let Err(err) = observer.on_events(ctx, events) {
                warn!(observer = name, "event hook failed: {err:?}");
            }
        }
    }

    pub fn dispatch_telemetry(&mut self, speed: f32, gear: i32) {
        for observer in &mut self.observers {
            observer.on_telemetry(speed, gear);
        }
    }
}

/// Text HUD: lap counter, finish banner and record notices, written to the log.
#[derive(Debug, Default)]
pub struct HudLog {
    lines: VecDeque<String>,
    speed: f32,
    gear: i32,
}

impl HudLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent lines, oldest first. Only the last `HUD_LINE_CAPACITY` are kept.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn gear(&self) -> i32 {
        self.gear
    }

    fn show(&mut self, line: String) {
        info!(target: "hud", "{line}");
        if self.lines.len() == HUD_LINE_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}

impl RaceObserver for HudLog {
    fn name(&self) -> &'static str {
        "hud"
    }

    fn on_events(&mut self, ctx: &ObserverContext<'_>, events: &[RaceEvent]) -> Result<()> {
        for event in events {
            match event {
                RaceEvent::RaceStarted { .. } => self.show("GO!".to_string()),
                RaceEvent::LapUpdated { lap, .. } if *lap <= ctx.total_laps => {
                    self.show(format!("Lap {lap}/{}", ctx.total_laps));
                }
                RaceEvent::LapUpdated { .. } => {}
                RaceEvent::RaceFinished { total_time, best_lap } => {
                    let best = best_lap.map(format_race_time).unwrap_or_else(|| "--:--.---".to_string());
                    self.show(format!("Finished in {} (best lap {best})", format_race_time(*total_time)));
                }
                RaceEvent::NewLeaderboardRecord { made_top } => {
                    if *made_top {
                        self.show("New leaderboard record!".to_string());
                    }
                }
                RaceEvent::GhostSpawned { best_time, .. } => {
                    self.show(format!("Racing ghost {}", format_race_time(*best_time)));
                }
                RaceEvent::GhostSaved { .. } => self.show("New best ghost saved".to_string()),
            }
        }
        Ok(())
    }

    fn on_telemetry(&mut self, speed: f32, gear: i32) {
        self.speed = speed;
        self.gear = gear;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Formats a board as numbered rows, fastest first.
pub fn leaderboard_rows(board: &Leaderboard) -> Vec<String> {
    board
        .entries()
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let best = record.best_lap_time.map(format_race_time).unwrap_or_else(|| "--:--.---".to_string());
            format!(
                "{:>2}. {:<16} {}  best lap {}  {}",
                index + 1,
                record.player_name,
                format_race_time(record.total_time),
                best,
                record.recorded_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect()
}

/// Loads and prints the stored leaderboard whenever a race finishes.
#[derive(Debug, Default)]
pub struct LeaderboardDisplay {
    last_table: Vec<String>,
    shown: usize,
}

impl LeaderboardDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_table(&self) -> &[String] {
        &self.last_table
    }

    pub fn times_shown(&self) -> usize {
        self.shown
    }
}

impl RaceObserver for LeaderboardDisplay {
    fn name(&self) -> &'static str {
        "leaderboard"
    }

    fn on_events(&mut self, ctx: &ObserverContext<'_>, events: &[RaceEvent]) -> Result<()> {
        if !events.iter().any(|event| matches!(event, RaceEvent::RaceFinished { .. })) {
            return Ok(());
        }
        let slot = ctx.settings.leaderboard_slot.as_str();
        let board = Leaderboard::load(ctx.store, slot, ctx.settings.max_entries);
        self.last_table = leaderboard_rows(&board);
        self.shown += 1;
        if self.last_table.is_empty() {
            info!(target: "leaderboard", "no recorded times yet");
        }
        for row in &self.last_table {
            info!(target: "leaderboard", "{row}");
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Keeps the most recent events for inspection.
#[derive(Debug)]
pub struct EventLog {
    events: VecDeque<RaceEvent>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LOG_CAPACITY)
    }
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { events: VecDeque::with_capacity(capacity.min(1_024)), capacity }
    }

    pub fn recent(&self) -> impl Iterator<Item = &RaceEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl RaceObserver for EventLog {
    fn name(&self) -> &'static str {
        "event_log"
    }

    fn on_events(&mut self, _ctx: &ObserverContext<'_>, events: &[RaceEvent]) -> Result<()> {
        for event in events {
            if self.events.len() == self.capacity {
                self.events.pop_front();
            }
            self.events.push_back(event.clone());
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::RaceRecord;
    use crate::storage::MemorySaveStore;

    fn context<'a>(store: &'a MemorySaveStore, settings: &'a RaceSettings) -> ObserverContext<'a> {
        ObserverContext { store, settings, total_laps: 2 }
    }

    #[test]
    fn hud_shows_laps_up_to_total() {
        let store = MemorySaveStore::new();
        let settings = RaceSettings::default();
        let mut hud = HudLog::new();
        let events = [
            RaceEvent::RaceStarted { world_time: 0.0 },
            RaceEvent::LapUpdated { lap: 1, world_time: 0.0 },
            RaceEvent::LapUpdated { lap: 2, world_time: 10.0 },
            RaceEvent::LapUpdated { lap: 3, world_time: 20.0 },
            RaceEvent::RaceFinished { total_time: 20.0, best_lap: Some(10.0) },
        ];
        hud.on_events(&context(&store, &settings), &events).expect("hud");
        assert_eq!(
            hud.lines().collect::<Vec<_>>(),
            vec!["GO!", "Lap 1/2", "Lap 2/2", "Finished in 00:20.000 (best lap 00:10.000)"]
        );
        hud.on_telemetry(12.5, 3);
        assert_eq!((hud.speed(), hud.gear()), (12.5, 3));
    }

    #[test]
    fn hud_keeps_only_recent_lines() {
        let store = MemorySaveStore::new();
        let settings = RaceSettings::default();
        let mut hud = HudLog::new();
        let ctx = ObserverContext { store: &store, settings: &settings, total_laps: 500 };
        let laps: Vec<RaceEvent> =
            (1..=100).map(|lap| RaceEvent::LapUpdated { lap, world_time: lap as f32 }).collect();
        hud.on_events(&ctx, &laps).expect("hud");
        let lines: Vec<&str> = hud.lines().collect();
        assert_eq!(lines.len(), HUD_LINE_CAPACITY);
        assert_eq!(lines.first().copied(), Some("Lap 69/500"));
        assert_eq!(lines.last().copied(), Some("Lap 100/500"));
    }

    #[test]
    fn leaderboard_display_reads_store_on_finish() {
        let mut store = MemorySaveStore::new();
        let settings = RaceSettings::default();
        let mut board = Leaderboard::new(settings.max_entries);
        board.add_time(RaceRecord::new("Ana", 61.5, Some(20.25)));
        board.add_time(RaceRecord::new("Bo", 59.0, None));
        board.save(&mut store, &settings.leaderboard_slot).expect("save");

        let mut display = LeaderboardDisplay::new();
        display
            .on_events(&context(&store, &settings), &[RaceEvent::LapUpdated { lap: 1, world_time: 0.0 }])
            .expect("ignored");
        assert_eq!(display.times_shown(), 0);

        let finished = [RaceEvent::RaceFinished { total_time: 61.5, best_lap: Some(20.25) }];
        display.on_events(&context(&store, &settings), &finished).expect("display");
        assert_eq!(display.times_shown(), 1);
        let table = display.last_table();
        assert_eq!(table.len(), 2);
        assert!(table[0].contains("Bo") && table[0].contains("00:59.000") && table[0].contains("--:--.---"));
        assert!(table[1].contains("Ana") && table[1].contains("00:20.250"));
    }

    #[test]
    fn event_log_is_bounded() {
        let store = MemorySaveStore::new();
        let settings = RaceSettings::default();
        let mut log = EventLog::new(3);
        let events: Vec<RaceEvent> =
            (1..=5).map(|lap| RaceEvent::LapUpdated { lap, world_time: lap as f32 }).collect();
        log.on_events(&context(&store, &settings), &events).expect("log");
        let laps: Vec<u32> = log
            .recent()
            .filter_map(|event| match event {
                RaceEvent::LapUpdated { lap, .. } => Some(*lap),
                _ => None,
            })
            .collect();
        assert_eq!(laps, vec![3, 4, 5]);
    }

    #[test]
    fn observer_set_dispatches_and_downcasts() {
        let store = MemorySaveStore::new();
        let settings = RaceSettings::default();
        let mut set = ObserverSet::new();
        set.register(Box::new(HudLog::new()));
        set.register(Box::new(EventLog::default()));
        assert_eq!(set.names(), vec!["hud", "event_log"]);

        set.dispatch_events(&context(&store, &settings), &[RaceEvent::RaceStarted { world_time: 1.0 }]);
        set.dispatch_telemetry(3.0, 1);
        assert_eq!(set.get::<EventLog>().map(EventLog::len), Some(1));
        assert_eq!(set.get::<HudLog>().map(HudLog::gear), Some(1));
        assert!(set.get::<LeaderboardDisplay>().is_none());
    }
}
