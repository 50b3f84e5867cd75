use crate::storage::{load_json, save_json, SaveStore};
use crate::transform::Transform;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_RECORD_INTERVAL: f32 = 0.1;
const MIN_RECORD_INTERVAL: f32 = 0.001;

/// One timestamped sample of a recorded run; `time` is seconds since the race started.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GhostFrame {
    pub time: f32,
    pub transform: Transform,
}

/// The persisted best run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GhostRecord {
    pub best_time: f32,
    #[serde(default)]
    pub frames: Vec<GhostFrame>,
}

impl GhostRecord {
    pub fn load(store: &dyn SaveStore, slot: &str) -> Option<Self> {
        load_json::<GhostRecord>(store, slot)
    }

    pub fn save(&self, store: &mut dyn SaveStore, slot: &str) -> Result<()> {
        save_json(store, slot, self)
    }

    /// True when there is a stored best time to beat.
    pub fn has_best_time(&self) -> bool {
        self.best_time > 0.0
    }

    pub fn is_playable(&self) -> bool {
        self.frames.len() >= 2
    }
}

/// Outcome of [`save_ghost_if_best`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GhostSaveOutcome {
    Saved { best_time: f32, frames: usize },
    NotFaster { best_time: f32 },
    TooFewFrames,
}

/// Persists `frames` as the canonical ghost when no ghost is stored yet or `total_time` beats it.
pub fn save_ghost_if_best(
    store: &mut dyn SaveStore,
    slot: &str,
    total_time: f32,
    frames: &[GhostFrame],
) -> Result<GhostSaveOutcome> {
    if frames.len() < 2 {
        return Ok(GhostSaveOutcome::TooFewFrames);
    }
    if let Some(existing) = GhostRecord::load(store, slot) {
        if existing.has_best_time() && total_time >= existing.best_time {
            return Ok(GhostSaveOutcome::NotFaster { best_time: existing.best_time });
        }
    }
    let record = GhostRecord { best_time: total_time, frames: frames.to_vec() };
    record.save(store, slot)?;
    Ok(GhostSaveOutcome::Saved { best_time: total_time, frames: frames.len() })
}

/// Fixed-interval sampler for the controlled vehicle.
#[derive(Debug, Clone)]
pub struct GhostRecorder {
    interval: f32,
    accumulator: f32,
    frames: Vec<GhostFrame>,
}

impl Default for GhostRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_INTERVAL)
    }
}

impl GhostRecorder {
    pub fn new(interval: f32) -> Self {
        let interval = if interval.is_finite() { interval.max(MIN_RECORD_INTERVAL) } else { DEFAULT_RECORD_INTERVAL };
        Self { interval, accumulator: 0.0, frames: Vec::new() }
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }

    pub fn frames(&self) -> &[GhostFrame] {
        &self.frames
    }

    pub fn reset(&mut self) {
        self.frames.clear();
        self.accumulator = 0.0;
    }

    /// Adds a frame regardless of the interval, e.g. the pose at the start line.
    pub fn capture(&mut self, race_time: f32, transform: Transform) -> bool {
        if let Some(last) = self.frames.last() {
            if race_time <= last.time {
                return false;
            }
        }
        self.frames.push(GhostFrame { time: race_time, transform });
        true
    }

    /// Advances the accumulator by `delta` and samples once it reaches the interval.
    pub fn tick(&mut self, delta: f32, race_time: f32, transform: Transform) -> bool {
        self.accumulator += delta;
        if self.accumulator < self.interval {
            return false;
        }
        self.accumulator = 0.0;
        self.capture(race_time, transform)
    }

    pub fn take_frames(&mut self) -> Vec<GhostFrame> {
        self.accumulator = 0.0;
        std::mem::take(&mut self.frames)
    }
}

/// Replays a recorded track by interpolating between the frames around the playback time.
#[derive(Debug, Clone)]
pub struct GhostPlayer {
    frames: Arc<[GhostFrame]>,
    playback_time: f32,
    cursor: usize,
}

impl GhostPlayer {
    /// Returns `None` for tracks that cannot be interpolated: fewer than two frames, or frame
    /// times that go backwards or are not numbers.
    pub fn new(frames: Arc<[GhostFrame]>) -> Option<Self> {
        if frames.len() < 2 {
            return None;
        }
        if !frames.windows(2).all(|pair| pair[0].time <= pair[1].time) {
            return None;
        }
        Some(Self { frames, playback_time: 0.0, cursor: 0 })
    }

    pub fn frames(&self) -> &[GhostFrame] {
        &self.frames
    }

    pub fn playback_time(&self) -> f32 {
        self.playback_time
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn duration(&self) -> f32 {
        self.frames[self.frames.len() - 1].time
    }

    pub fn is_finished(&self) -> bool {
        self.playback_time >= self.duration()
    }

    pub fn initial_transform(&self) -> Transform {
        self.frames[0].transform
    }

    /// Advances playback by `delta` seconds and returns the ghost's transform.
    pub fn advance(&mut self, delta: f32) -> Transform {
        if delta.is_finite() && delta > 0.0 {
            self.playback_time += delta;
        }
        self.transform()
    }

    pub fn transform(&mut self) -> Transform {
        let last = self.frames.len() - 1;
        while self.cursor < last - 1 && self.frames[self.cursor + 1].time <= self.playback_time {
            self.cursor += 1;
        }
        let a = &self.frames[self.cursor];
        let b = &self.frames[self.cursor + 1];
        if self.cursor == last - 1 && self.playback_time >= b.time {
            return b.transform;
        }
        let span = b.time - a.time;
        let alpha = if span > 0.0 { (self.playback_time - a.time) / span } else { 0.0 };
        Transform::blend(&a.transform, &b.transform, alpha)
    }
}
