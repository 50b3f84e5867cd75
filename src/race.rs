use crate::config::AppConfig;
use crate::events::{EventBus, RaceEvent};
use crate::ghost::{save_ghost_if_best, GhostFrame, GhostPlayer, GhostRecord, GhostRecorder, GhostSaveOutcome};
use crate::leaderboard::{format_race_time, Leaderboard, RaceRecord};
use crate::storage::SaveStore;
use crate::time::Time;
use crate::track::{GateId, TrackLayout};
use crate::vehicle::Vehicle;
use crate::world::{EntityHandle, WorldHost};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacePhase {
    NotStarted,
    Running,
    Finished,
}

impl fmt::Display for RacePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RacePhase::NotStarted => "not started",
            RacePhase::Running => "running",
            RacePhase::Finished => "finished",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RaceError {
    #[error("cannot {operation} while the race is {phase}")]
    InvalidTransition { operation: &'static str, phase: RacePhase },
}

/// Race-relevant knobs pulled out of [`AppConfig`].
#[derive(Debug, Clone)]
pub struct RaceSettings {
    pub player_name: String,
    pub record_interval: f32,
    pub ghost_slot: String,
    pub leaderboard_slot: String,
    pub max_entries: usize,
}

impl RaceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            player_name: config.race.player_name.clone(),
            record_interval: config.ghost.record_interval,
            ghost_slot: config.ghost.slot.clone(),
            leaderboard_slot: config.leaderboard.slot.clone(),
            max_entries: config.leaderboard.max_entries,
        }
    }
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Collaborators borrowed for the duration of one controller call.
pub struct RaceHost<'a> {
    pub vehicle: Option<&'a mut dyn Vehicle>,
    pub world: &'a mut dyn WorldHost,
}

impl<'a> RaceHost<'a> {
    pub fn new(vehicle: Option<&'a mut dyn Vehicle>, world: &'a mut dyn WorldHost) -> Self {
        Self { vehicle, world }
    }
}

/// Summary of a finished attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceResult {
    pub total_time: f32,
    pub best_lap: Option<f32>,
    pub lap_times: Vec<f32>,
    /// `Some(made_top)` when the time qualified for the leaderboard.
    pub leaderboard: Option<bool>,
    pub ghost: Option<GhostSaveOutcome>,
}

struct GhostPlayback {
    entity: EntityHandle,
    player: GhostPlayer,
}

/// Owns one time-trial attempt: lap counting, timing, ghost recording and playback, and the
/// leaderboard/ghost writes on finish.
pub struct RaceController {
    settings: RaceSettings,
    track: TrackLayout,
    store: Box<dyn SaveStore>,
    clock: Time,
    phase: RacePhase,
    current_lap: u32,
    lap_times: Vec<f32>,
    race_start_time: f32,
    last_lap_start_time: f32,
    target_gate: Option<GateId>,
    recorder: GhostRecorder,
    ghost: Option<GhostPlayback>,
    events: EventBus,
    result: Option<RaceResult>,
}

impl RaceController {
    pub fn new(settings: RaceSettings, track: TrackLayout, store: Box<dyn SaveStore>) -> Self {
        let recorder = GhostRecorder::new(settings.record_interval);
        Self {
            settings,
            track,
            store,
            clock: Time::new(),
            phase: RacePhase::NotStarted,
            current_lap: 0,
            lap_times: Vec::new(),
            race_start_time: 0.0,
            last_lap_start_time: 0.0,
            target_gate: None,
            recorder,
            ghost: None,
            events: EventBus::default(),
            result: None,
        }
    }

    pub fn settings(&self) -> &RaceSettings {
        &self.settings
    }

    pub fn track(&self) -> &TrackLayout {
        &self.track
    }

    pub fn store(&self) -> &dyn SaveStore {
        self.store.as_ref()
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn now(&self) -> f32 {
        self.clock.elapsed_seconds()
    }

    pub fn current_lap(&self) -> u32 {
        self.current_lap
    }

    pub fn total_laps(&self) -> u32 {
        self.track.total_laps
    }

    pub fn lap_times(&self) -> &[f32] {
        &self.lap_times
    }

    pub fn best_lap(&self) -> Option<f32> {
        self.lap_times.iter().copied().reduce(f32::min)
    }

    /// Seconds since the start line while running, the final time once finished.
    pub fn race_time(&self) -> f32 {
        match self.phase {
            RacePhase::NotStarted => 0.0,
            RacePhase::Running => self.now() - self.race_start_time,
            RacePhase::Finished => self.result.as_ref().map(|result| result.total_time).unwrap_or(0.0),
        }
    }

    pub fn target_gate(&self) -> Option<GateId> {
        self.target_gate
    }

    pub fn recorded_frames(&self) -> &[GhostFrame] {
        self.recorder.frames()
    }

    pub fn ghost_entity(&self) -> Option<EntityHandle> {
        self.ghost.as_ref().map(|ghost| ghost.entity)
    }

    pub fn ghost_player(&self) -> Option<&GhostPlayer> {
        self.ghost.as_ref().map(|ghost| &ghost.player)
    }

    pub fn result(&self) -> Option<&RaceResult> {
        self.result.as_ref()
    }

    pub fn pending_events(&self) -> &[RaceEvent] {
        self.events.pending()
    }

    pub fn drain_events(&mut self) -> Vec<RaceEvent> {
        self.events.drain()
    }

    /// Per-frame update: advances the clock, samples the vehicle while running and moves the
    /// ghost entity along its recorded track.
    pub fn tick(&mut self, delta: f32, host: &mut RaceHost<'_>) {
        self.clock.tick(delta);
        let delta = self.clock.delta_seconds();
        if self.phase == RacePhase::Running {
            if let Some(vehicle) = host.vehicle.as_deref() {
                let race_time = self.now() - self.race_start_time;
                self.recorder.tick(delta, race_time, vehicle.transform());
            }
        }
        let vanished = match &mut self.ghost {
            Some(ghost) => {
                let pose = ghost.player.advance(delta);
                !host.world.set_entity_transform(ghost.entity, pose)
            }
            None => false,
        };
        if vanished {
            warn!("ghost entity vanished, stopping playback");
            self.ghost = None;
        }
    }

    pub fn start_race(&mut self, host: &mut RaceHost<'_>) -> Result<(), RaceError> {
        self.expect_phase(RacePhase::NotStarted, "start the race")?;
        let now = self.now();
        self.target_gate = self.track.next_marker(self.track.finish_line().id);
        self.phase = RacePhase::Running;
        self.race_start_time = now;
        self.last_lap_start_time = now;
        self.lap_times.clear();
        self.current_lap = 0;
        self.result = None;

        self.recorder.reset();
        if let Some(vehicle) = host.vehicle.as_deref_mut() {
            self.recorder.capture(0.0, vehicle.transform());
            vehicle.set_input_enabled(true);
        }
        self.spawn_ghost(&mut *host.world);

        info!(track = %self.track.name, laps = self.track.total_laps, world_time = now, "race started");
        self.events.push(RaceEvent::RaceStarted { world_time: now });
        self.increment_lap(host);
        Ok(())
    }

    /// Counts a pass of the finish line.
    pub fn on_gate_crossed(&mut self, host: &mut RaceHost<'_>) -> Result<(), RaceError> {
        self.expect_phase(RacePhase::Running, "count a lap")?;
        self.increment_lap(host);
        Ok(())
    }

    /// Gate sequencing: only the current target counts, and only the finish line counts a lap.
    /// Returns whether `gate` was the target.
    pub fn on_gate_passed(&mut self, gate: GateId, host: &mut RaceHost<'_>) -> Result<bool, RaceError> {
        self.expect_phase(RacePhase::Running, "pass a gate")?;
        if self.target_gate != Some(gate) {
            return Ok(false);
        }
        self.target_gate = self.track.next_marker(gate);
        debug!(gate, next = ?self.target_gate, "gate passed");
        if self.track.is_finish_line(gate) {
            self.increment_lap(host);
        }
        Ok(true)
    }

    pub fn handle_race_finished(&mut self, host: &mut RaceHost<'_>) -> Result<&RaceResult, RaceError> {
        self.expect_phase(RacePhase::Running, "finish the race")?;
        self.finish(host);
        self.result.as_ref().ok_or(RaceError::InvalidTransition { operation: "finish the race", phase: self.phase })
    }

    /// Back to `NotStarted`, removing any ghost from the world. Pending events are kept.
    pub fn reset(&mut self, host: &mut RaceHost<'_>) {
        if let Some(ghost) = self.ghost.take() {
            host.world.despawn(ghost.entity);
        }
        if let Some(vehicle) = host.vehicle.as_deref_mut() {
            vehicle.set_input_enabled(false);
        }
        self.phase = RacePhase::NotStarted;
        self.current_lap = 0;
        self.lap_times.clear();
        self.race_start_time = 0.0;
        self.last_lap_start_time = 0.0;
        self.target_gate = None;
        self.recorder.reset();
        self.result = None;
    }

    /// Applies the input state a freshly possessed vehicle should have.
    pub fn sync_vehicle_input(&self, vehicle: &mut dyn Vehicle) {
        vehicle.set_input_enabled(self.phase == RacePhase::Running);
    }

    fn expect_phase(&self, expected: RacePhase, operation: &'static str) -> Result<(), RaceError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(RaceError::InvalidTransition { operation, phase: self.phase })
        }
    }

    fn increment_lap(&mut self, host: &mut RaceHost<'_>) {
        let now = self.now();
        if self.current_lap > 0 {
            let lap_time = now - self.last_lap_start_time;
            info!(lap = self.current_lap, lap_time = %format_race_time(lap_time), "lap complete");
            self.lap_times.push(lap_time);
        }
        self.last_lap_start_time = now;
        self.current_lap += 1;
        self.events.push(RaceEvent::LapUpdated { lap: self.current_lap, world_time: now });
        if self.current_lap > self.track.total_laps {
            self.finish(host);
        }
    }

    fn finish(&mut self, host: &mut RaceHost<'_>) {
        let total_time = self.now() - self.race_start_time;
        let best_lap = self.best_lap();
        let timed = total_time > 0.0;
        if !timed {
            warn!(total_time, "race finished without elapsed time, skipping leaderboard and ghost");
        }
        let leaderboard = if timed { self.save_leaderboard_time(total_time, best_lap) } else { None };
        if let Some(vehicle) = host.vehicle.as_deref_mut() {
            vehicle.set_input_enabled(false);
        }
        let frames = self.recorder.take_frames();
        let ghost = if timed { self.save_ghost(total_time, &frames) } else { None };
        self.phase = RacePhase::Finished;
        info!(
            total = %format_race_time(total_time),
            best_lap = %best_lap.map(format_race_time).unwrap_or_else(|| "--".to_string()),
            "race finished"
        );
        self.result = Some(RaceResult { total_time, best_lap, lap_times: self.lap_times.clone(), leaderboard, ghost });
        self.events.push(RaceEvent::RaceFinished { total_time, best_lap });
    }

    fn save_leaderboard_time(&mut self, total_time: f32, best_lap: Option<f32>) -> Option<bool> {
        let slot = self.settings.leaderboard_slot.as_str();
        let mut board = Leaderboard::load(self.store.as_ref(), slot, self.settings.max_entries);
        if !board.is_qualifying_time(total_time) {
            debug!(total_time, "time does not qualify for the leaderboard");
            return None;
        }
        let made_top = board.add_time(RaceRecord::new(self.settings.player_name.clone(), total_time, best_lap));
        if let Err(err) = board.save(self.store.as_mut(), slot) {
            error!("Failed to save leaderboard: {err:?}");
        }
        self.events.push(RaceEvent::NewLeaderboardRecord { made_top });
        Some(made_top)
    }

    fn save_ghost(&mut self, total_time: f32, frames: &[GhostFrame]) -> Option<GhostSaveOutcome> {
        let slot = self.settings.ghost_slot.as_str();
        match save_ghost_if_best(self.store.as_mut(), slot, total_time, frames) {
            Ok(outcome) => {
                match outcome {
                    GhostSaveOutcome::Saved { best_time, frames } => {
                        info!(best = %format_race_time(best_time), frames, "new best ghost saved");
                        self.events.push(RaceEvent::GhostSaved { best_time, frames });
                    }
                    GhostSaveOutcome::NotFaster { best_time } => {
                        debug!(best = %format_race_time(best_time), "ghost kept, run was not faster");
                    }
                    GhostSaveOutcome::TooFewFrames => {
                        warn!(frames = frames.len(), "run too short to keep as a ghost");
                    }
                }
                Some(outcome)
            }
            Err(err) => {
                error!("Failed to save ghost: {err:?}");
                None
            }
        }
    }

    fn spawn_ghost(&mut self, world: &mut dyn WorldHost) {
        if let Some(previous) = self.ghost.take() {
            world.despawn(previous.entity);
        }
        let Some(record) = GhostRecord::load(self.store.as_ref(), &self.settings.ghost_slot) else {
            return;
        };
        if !record.has_best_time() {
            debug!("stored ghost has no best time, skipping playback");
            return;
        }
        let best_time = record.best_time;
        let record_frames = record.frames.len();
        let Some(player) = GhostPlayer::new(Arc::from(record.frames)) else {
            warn!(frames = record_frames, "stored ghost track is not playable, skipping playback");
            return;
        };
        let spawn = world.find_spawn_point().unwrap_or_default();
        let entity = world.spawn_ghost_entity(spawn);
        world.set_entity_transform(entity, player.initial_transform());
        info!(entity = entity.index(), best = %format_race_time(best_time), "ghost car spawned");
        self.events.push(RaceEvent::GhostSpawned { entity, best_time });
        self.ghost = Some(GhostPlayback { entity, player });
    }
}
