use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const LEADERBOARD_SLOT: &str = "TimeTrialLeaderboard";
pub const GHOST_SLOT: &str = "TimeTrialGhost";

/// Slot-addressed persistence. Loads never fail: a slot that cannot be read is reported as absent.
pub trait SaveStore {
    fn exists(&self, slot: &str) -> bool;
    fn load(&self, slot: &str) -> Option<Vec<u8>>;
    fn save(&mut self, slot: &str, bytes: &[u8]) -> Result<()>;
}

/// Stores every slot as `<root>/<slot>.json`.
#[derive(Debug, Clone)]
pub struct FileSaveStore {
    root: PathBuf,
}

impl FileSaveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, slot: &str) -> PathBuf {
        let mut file_name = slot.trim().to_string();
        if file_name.is_empty() {
            file_name.push_str("slot");
        }
        let sanitized = file_name
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' { ch } else { '_' })
            .collect::<String>();
        self.root.join(format!("{sanitized}.json"))
    }
}

impl SaveStore for FileSaveStore {
    fn exists(&self, slot: &str) -> bool {
        self.path_for(slot).is_file()
    }

    fn load(&self, slot: &str) -> Option<Vec<u8>> {
        let path = self.path_for(slot);
        if !path.is_file() {
            return None;
        }
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!(slot, path = %path.display(), "save slot unreadable, treating as absent: {err}");
                None
            }
        }
    }

    fn save(&mut self, slot: &str, bytes: &[u8]) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)
                .with_context(|| format!("Creating save directory {}", self.root.display()))?;
        }
        let path = self.path_for(slot);
        fs::write(&path, bytes).with_context(|| format!("Writing save slot {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySaveStore {
    slots: HashMap<String, Vec<u8>>,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl SaveStore for MemorySaveStore {
    fn exists(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }

    fn load(&self, slot: &str) -> Option<Vec<u8>> {
        self.slots.get(slot).cloned()
    }

    fn save(&mut self, slot: &str, bytes: &[u8]) -> Result<()> {
        self.slots.insert(slot.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Reads and decodes a slot. Missing, unreadable and malformed slots all yield `None`.
pub fn load_json<T: DeserializeOwned>(store: &dyn SaveStore, slot: &str) -> Option<T> {
    let bytes = store.load(slot)?;
    match serde_json::from_slice::<T>(&bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(slot, "save slot could not be parsed, treating as absent: {err}");
            None
        }
    }
}

pub fn save_json<T: Serialize>(store: &mut dyn SaveStore, slot: &str, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).with_context(|| format!("Encoding save slot {slot}"))?;
    store.save(slot, &json)
}
