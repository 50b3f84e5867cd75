use crate::config::AppConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "config/time_trial.json";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    config_path: Option<PathBuf>,
    laps: Option<u32>,
    player: Option<String>,
    save_dir: Option<PathBuf>,
    runs: Option<u32>,
    seed: Option<u64>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. Flags take the form --name value.");
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config_path = Some(PathBuf::from(value)),
                "laps" => {
                    let laps = value.parse::<u32>().with_context(|| format!("Invalid laps '{value}'"))?;
                    if laps == 0 {
                        bail!("Invalid laps '0'. A race needs at least one lap.");
                    }
                    overrides.laps = Some(laps);
                }
                "player" => {
                    if value.trim().is_empty() {
                        bail!("Player name must not be empty");
                    }
                    overrides.player = Some(value);
                }
                "save-dir" => overrides.save_dir = Some(PathBuf::from(value)),
                "runs" => {
                    overrides.runs = Some(value.parse::<u32>().with_context(|| format!("Invalid runs '{value}'"))?);
                }
                "seed" => {
                    overrides.seed = Some(value.parse::<u64>().with_context(|| format!("Invalid seed '{value}'"))?);
                }
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --config, --laps, --player, --save-dir, --runs, --seed."
                ),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn into_config_overrides(self) -> AppConfigOverrides {
        AppConfigOverrides {
            total_laps: self.laps,
            player_name: self.player,
            save_dir: self.save_dir,
            runs: self.runs,
            seed: self.seed,
        }
    }
}
