use crate::autopilot::Autopilot;
use crate::config::AppConfig;
use crate::leaderboard::{format_race_time, Leaderboard};
use crate::race::{RacePhase, RaceResult};
use crate::session::TimeTrialSession;
use crate::storage::FileSaveStore;
use crate::track::{TrackError, TrackLayout};
use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

pub fn demo_track(config: &AppConfig) -> Result<TrackLayout, TrackError> {
    TrackLayout::circuit(
        "Demo Ring",
        config.race.total_laps,
        config.demo.track_radius,
        config.demo.gate_count,
        config.demo.gate_radius,
    )
}

/// Drives `config.demo.runs` headless attempts against the save directory. Each attempt races
/// the best ghost stored by the earlier ones.
pub fn run_demo(config: &AppConfig) -> Result<Vec<RaceResult>> {
    let step = config.demo.fixed_step;
    if !(step > 0.0) {
        bail!("demo.fixed_step must be positive, got {step}");
    }
    let mut rng = StdRng::seed_from_u64(config.demo.seed);
    let mut results = Vec::new();
    for run in 1..=config.demo.runs {
        let variation = config.demo.pace_variation.max(0.0);
        let pace = if variation > 0.0 { 1.0 - rng.gen_range(0.0..variation) } else { 1.0 };
        let autopilot = Autopilot::with_throttle(pace);
        info!(run, pace, "starting attempt");

        let store = FileSaveStore::new(&config.storage.save_dir);
        let mut session = TimeTrialSession::new(config, demo_track(config)?, Box::new(store)).with_default_observers();
        session.start_race()?;
        let max_steps = (config.demo.max_race_seconds / step).ceil() as u64;
        let mut steps = 0u64;
        while session.phase() == RacePhase::Running && steps < max_steps {
            session.apply_autopilot(&autopilot);
            session.tick(step);
            steps += 1;
        }
        if session.phase() == RacePhase::Running {
            warn!(run, "attempt hit the time limit, abandoning without saving");
            session.shutdown();
            continue;
        }
        if let Some(result) = session.controller().result() {
            info!(
                run,
                total = %format_race_time(result.total_time),
                laps = result.lap_times.len(),
                "attempt complete"
            );
            results.push(result.clone());
        }
        session.shutdown();
    }
    Ok(results)
}

/// Stored leaderboard for the configured save directory.
pub fn stored_leaderboard(config: &AppConfig) -> Leaderboard {
    let store = FileSaveStore::new(&config.storage.save_dir);
    Leaderboard::load(&store, &config.leaderboard.slot, config.leaderboard.max_entries)
}
