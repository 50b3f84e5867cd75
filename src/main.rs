use time_trial::cli::CliOverrides;
use time_trial::config::AppConfig;
use time_trial::demo::{run_demo, stored_leaderboard};
use time_trial::observers::leaderboard_rows;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
}

fn main() {
    init_tracing();
    let cli = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    let mut config = AppConfig::load_or_default(cli.config_path());
    let overrides = cli.into_config_overrides();
    if !overrides.is_empty() {
        info!(fields = ?overrides.applied_fields(), "applying command line overrides");
    }
    config.apply_overrides(&overrides);

    if let Err(err) = run_demo(&config) {
        error!("Application error: {err:?}");
        std::process::exit(1);
    }

    println!("Leaderboard ({})", config.storage.save_dir.display());
    let rows = leaderboard_rows(&stored_leaderboard(&config));
    if rows.is_empty() {
        println!("  no recorded times");
    }
    for row in rows {
        println!("  {row}");
    }
}
