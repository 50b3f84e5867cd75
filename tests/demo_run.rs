use time_trial::config::AppConfig;
use time_trial::demo::{demo_track, run_demo, stored_leaderboard};
use time_trial::ghost::{GhostRecord, GhostSaveOutcome};
use time_trial::storage::{FileSaveStore, SaveStore, GHOST_SLOT, LEADERBOARD_SLOT};

fn demo_config(save_dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.save_dir = save_dir.to_path_buf();
    config.race.total_laps = 1;
    config.demo.runs = 2;
    config.demo.track_radius = 60.0;
    config.demo.gate_count = 6;
    config.demo.gate_radius = 8.0;
    config.demo.pace_variation = 0.1;
    config
}

#[test]
fn headless_runs_fill_leaderboard_and_keep_fastest_ghost() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let config = demo_config(temp_dir.path());
    assert_eq!(demo_track(&config).expect("track").gates().len(), 6);

    let results = run_demo(&config).expect("demo runs");
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|result| result.lap_times.len() == 1));
    assert!(matches!(results[0].ghost, Some(GhostSaveOutcome::Saved { .. })));

    let board = stored_leaderboard(&config);
    assert_eq!(board.len(), 2);
    let times: Vec<f32> = board.entries().iter().map(|entry| entry.total_time).collect();
    assert!(times[0] <= times[1]);

    let store = FileSaveStore::new(temp_dir.path());
    let ghost = GhostRecord::load(&store, GHOST_SLOT).expect("ghost stored");
    assert_eq!(ghost.best_time, times[0]);
    assert!(ghost.is_playable());
}

#[test]
fn non_positive_step_is_rejected() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut config = demo_config(temp_dir.path());
    config.demo.fixed_step = 0.0;
    assert!(run_demo(&config).is_err());
    assert!(stored_leaderboard(&config).is_empty());
}

#[test]
fn attempt_over_the_time_limit_is_not_saved() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut config = demo_config(temp_dir.path());
    config.demo.runs = 1;
    config.demo.max_race_seconds = 1.0;

    let results = run_demo(&config).expect("demo runs");
    assert!(results.is_empty());
    let store = FileSaveStore::new(temp_dir.path());
    assert!(!store.exists(LEADERBOARD_SLOT));
    assert!(!store.exists(GHOST_SLOT));
}

#[test]
fn track_without_gates_is_an_error() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut config = demo_config(temp_dir.path());
    config.demo.gate_count = 0;
    assert!(demo_track(&config).is_err());
    assert!(run_demo(&config).is_err());
}
