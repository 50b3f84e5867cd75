use crate::ghost::DEFAULT_RECORD_INTERVAL;
use crate::leaderboard::DEFAULT_MAX_ENTRIES;
use crate::storage::{GHOST_SLOT, LEADERBOARD_SLOT};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct RaceConfig {
    #[serde(default = "RaceConfig::default_player_name")]
    pub player_name: String,
    #[serde(default = "RaceConfig::default_total_laps")]
    pub total_laps: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhostConfig {
    #[serde(default = "GhostConfig::default_record_interval")]
    pub record_interval: f32,
    #[serde(default = "GhostConfig::default_slot")]
    pub slot: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardConfig {
    #[serde(default = "LeaderboardConfig::default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "LeaderboardConfig::default_slot")]
    pub slot: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_save_dir")]
    pub save_dir: PathBuf,
}

/// Tuning for the vehicle pawn and the kinematic reference vehicle.
#[derive(Debug, Clone, Deserialize)]
pub struct VehicleConfig {
    #[serde(default = "VehicleConfig::default_max_torque")]
    pub max_torque: f32,
    #[serde(default = "VehicleConfig::default_mass")]
    pub mass: f32,
    #[serde(default = "VehicleConfig::default_max_speed")]
    pub max_speed: f32,
    #[serde(default = "VehicleConfig::default_brake_deceleration")]
    pub brake_deceleration: f32,
    #[serde(default = "VehicleConfig::default_drag")]
    pub drag: f32,
    /// Maximum front wheel angle in radians.
    #[serde(default = "VehicleConfig::default_steering_limit")]
    pub steering_limit: f32,
    #[serde(default = "VehicleConfig::default_wheelbase")]
    pub wheelbase: f32,
    #[serde(default = "VehicleConfig::default_gear_count")]
    pub gear_count: u32,
    #[serde(default = "VehicleConfig::default_boost_torque_multiplier")]
    pub boost_torque_multiplier: f32,
    #[serde(default = "VehicleConfig::default_boost_drain_per_second")]
    pub boost_drain_per_second: f32,
    #[serde(default = "VehicleConfig::default_boost_capacity")]
    pub boost_capacity: f32,
    #[serde(default = "VehicleConfig::default_boost_capacity")]
    pub initial_boost: f32,
    #[serde(default = "VehicleConfig::default_flip_check_interval")]
    pub flip_check_interval: f32,
    #[serde(default = "VehicleConfig::default_flip_check_min_dot")]
    pub flip_check_min_dot: f32,
    #[serde(default = "VehicleConfig::default_reset_lift")]
    pub reset_lift: f32,
}

/// Headless driver settings: track geometry, attempt count and autopilot pace.
#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "DemoConfig::default_runs")]
    pub runs: u32,
    #[serde(default = "DemoConfig::default_seed")]
    pub seed: u64,
    #[serde(default = "DemoConfig::default_fixed_step")]
    pub fixed_step: f32,
    #[serde(default = "DemoConfig::default_max_race_seconds")]
    pub max_race_seconds: f32,
    #[serde(default = "DemoConfig::default_track_radius")]
    pub track_radius: f32,
    #[serde(default = "DemoConfig::default_gate_count")]
    pub gate_count: u32,
    #[serde(default = "DemoConfig::default_gate_radius")]
    pub gate_radius: f32,
    /// Upper bound of the random throttle reduction applied per attempt.
    #[serde(default = "DemoConfig::default_pace_variation")]
    pub pace_variation: f32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub race: RaceConfig,
    #[serde(default)]
    pub ghost: GhostConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub vehicle: VehicleConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub total_laps: Option<u32>,
    pub player_name: Option<String>,
    pub save_dir: Option<PathBuf>,
    pub runs: Option<u32>,
    pub seed: Option<u64>,
}

impl RaceConfig {
    fn default_player_name() -> String {
        "Player1".to_string()
    }

    const fn default_total_laps() -> u32 {
        3
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self { player_name: Self::default_player_name(), total_laps: Self::default_total_laps() }
    }
}

impl GhostConfig {
    const fn default_record_interval() -> f32 {
        DEFAULT_RECORD_INTERVAL
    }

    fn default_slot() -> String {
        GHOST_SLOT.to_string()
    }
}

impl Default for GhostConfig {
    fn default() -> Self {
        Self { record_interval: Self::default_record_interval(), slot: Self::default_slot() }
    }
}

impl LeaderboardConfig {
    const fn default_max_entries() -> usize {
        DEFAULT_MAX_ENTRIES
    }

    fn default_slot() -> String {
        LEADERBOARD_SLOT.to_string()
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self { max_entries: Self::default_max_entries(), slot: Self::default_slot() }
    }
}

impl StorageConfig {
    fn default_save_dir() -> PathBuf {
        PathBuf::from("saves")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { save_dir: Self::default_save_dir() }
    }
}

impl VehicleConfig {
    const fn default_max_torque() -> f32 {
        750.0
    }

    const fn default_mass() -> f32 {
        75.0
    }

    const fn default_max_speed() -> f32 {
        45.0
    }

    const fn default_brake_deceleration() -> f32 {
        25.0
    }

    const fn default_drag() -> f32 {
        0.05
    }

    const fn default_steering_limit() -> f32 {
        0.6
    }

    const fn default_wheelbase() -> f32 {
        2.7
    }

    const fn default_gear_count() -> u32 {
        6
    }

    const fn default_boost_torque_multiplier() -> f32 {
        1.5
    }

    const fn default_boost_drain_per_second() -> f32 {
        20.0
    }

    const fn default_boost_capacity() -> f32 {
        100.0
    }

    const fn default_flip_check_interval() -> f32 {
        3.0
    }

    const fn default_flip_check_min_dot() -> f32 {
        -0.2
    }

    const fn default_reset_lift() -> f32 {
        0.5
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            max_torque: Self::default_max_torque(),
            mass: Self::default_mass(),
            max_speed: Self::default_max_speed(),
            brake_deceleration: Self::default_brake_deceleration(),
            drag: Self::default_drag(),
            steering_limit: Self::default_steering_limit(),
            wheelbase: Self::default_wheelbase(),
            gear_count: Self::default_gear_count(),
            boost_torque_multiplier: Self::default_boost_torque_multiplier(),
            boost_drain_per_second: Self::default_boost_drain_per_second(),
            boost_capacity: Self::default_boost_capacity(),
            initial_boost: Self::default_boost_capacity(),
            flip_check_interval: Self::default_flip_check_interval(),
            flip_check_min_dot: Self::default_flip_check_min_dot(),
            reset_lift: Self::default_reset_lift(),
        }
    }
}

impl DemoConfig {
    const fn default_runs() -> u32 {
        3
    }

    const fn default_seed() -> u64 {
        7
    }

    const fn default_fixed_step() -> f32 {
        1.0 / 60.0
    }

    const fn default_max_race_seconds() -> f32 {
        600.0
    }

    const fn default_track_radius() -> f32 {
        120.0
    }

    const fn default_gate_count() -> u32 {
        8
    }

    const fn default_gate_radius() -> f32 {
        12.0
    }

    const fn default_pace_variation() -> f32 {
        0.15
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            runs: Self::default_runs(),
            seed: Self::default_seed(),
            fixed_step: Self::default_fixed_step(),
            max_race_seconds: Self::default_max_race_seconds(),
            track_radius: Self::default_track_radius(),
            gate_count: Self::default_gate_count(),
            gate_radius: Self::default_gate_radius(),
            pace_variation: Self::default_pace_variation(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg: AppConfig = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        cfg.validate().with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(cfg)
    }

    /// Rejects values a race cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.race.total_laps == 0 {
            bail!("race.total_laps must be at least 1");
        }
        if self.race.player_name.trim().is_empty() {
            bail!("race.player_name must not be empty");
        }
        Ok(())
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(laps) = overrides.total_laps {
            self.race.total_laps = laps;
        }
        if let Some(name) = &overrides.player_name {
            self.race.player_name = name.clone();
        }
        if let Some(dir) = &overrides.save_dir {
            self.storage.save_dir = dir.clone();
        }
        if let Some(runs) = overrides.runs {
            self.demo.runs = runs;
        }
        if let Some(seed) = overrides.seed {
            self.demo.seed = seed;
        }
    }
}

impl AppConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.applied_fields().is_empty()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.total_laps.is_some() {
            fields.push("laps");
        }
        if self.player_name.is_some() {
            fields.push("player");
        }
        if self.save_dir.is_some() {
            fields.push("save_dir");
        }
        if self.runs.is_some() {
            fields.push("runs");
        }
        if self.seed.is_some() {
            fields.push("seed");
        }
        fields
    }
}
