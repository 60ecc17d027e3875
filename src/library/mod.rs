//! The voice library: categories of entries plus their cooldown state.
//!
//! A category is loaded from one JSON file and owns everything the selector
//! needs — the ordered entry list, the error/correction policy, and the
//! cooldown store. Reloading a category swaps the entry list atomically while
//! cooldown state carries over by entry id.

mod cooldown;
mod entry;
mod selector;

pub use cooldown::{CooldownStore, RECENT_LIMIT};
pub use entry::VoiceEntry;
pub use selector::{pick_random, pick_time_announcement, TimePick};

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

const ENABLE_LOGS: bool = true;
use crate::{log_error, log_info};

const DEFAULT_CORRECTION_DELAY_MS: u64 = 1500;

/// The stock categories and the media folder each resolves clips against.
pub const STOCK_CATEGORIES: [(&str, &str); 4] = [
    ("Idle", "Index"),
    ("DoubleClick", "Index"),
    ("System", "Index"),
    ("TimeAnnounce", "TimeAnnounce"),
];

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("failed to read category file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse category file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk shape of one category file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    pub description: String,
    pub error_rate: f64,
    pub correction_delay_ms: u64,
    pub entries: Vec<VoiceEntry>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            description: String::new(),
            error_rate: 0.0,
            correction_delay_ms: DEFAULT_CORRECTION_DELAY_MS,
            entries: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct VoiceCategory {
    name: String,
    media_dir: PathBuf,
    pub description: String,
    pub error_rate: f64,
    pub correction_delay_ms: u64,
    entries: Vec<VoiceEntry>,
    cooldown: CooldownStore,
}

impl VoiceCategory {
    pub fn empty(name: impl Into<String>, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            media_dir: media_dir.into(),
            description: String::new(),
            error_rate: 0.0,
            correction_delay_ms: DEFAULT_CORRECTION_DELAY_MS,
            entries: Vec::new(),
            cooldown: CooldownStore::default(),
        }
    }

    pub fn from_config(
        name: impl Into<String>,
        media_dir: impl Into<PathBuf>,
        config: CategoryConfig,
    ) -> Self {
        let mut category = Self::empty(name, media_dir);
        category.apply(config);
        category
    }

    /// Load a category from its JSON file. A missing file is not an error:
    /// the category simply starts empty and every selection declines.
    pub fn load(
        name: impl Into<String>,
        media_dir: impl Into<PathBuf>,
        json_path: &Path,
    ) -> Result<Self, LibraryError> {
        let mut category = Self::empty(name, media_dir);
        if !json_path.exists() {
            log_info!(
                "category file {} missing; {} starts empty",
                json_path.display(),
                category.name
            );
            return Ok(category);
        }
        let raw = fs::read_to_string(json_path).map_err(|source| LibraryError::Io {
            path: json_path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| LibraryError::Parse {
            path: json_path.to_path_buf(),
            source,
        })?;
        category.apply(config);
        Ok(category)
    }

    fn apply(&mut self, config: CategoryConfig) {
        self.description = config.description;
        self.error_rate = config.error_rate;
        self.correction_delay_ms = config.correction_delay_ms;
        self.entries = config.entries;
    }

    /// Swap in a new entry list; cooldown state is preserved for ids that
    /// still exist and dropped for the rest.
    pub fn reload(&mut self, config: CategoryConfig) {
        self.apply(config);
        let keep: HashSet<&str> = self.entries.iter().map(|entry| entry.id.as_str()).collect();
        self.cooldown.retain_ids(&keep);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[VoiceEntry] {
        &self.entries
    }

    pub fn cooldown(&self) -> &CooldownStore {
        &self.cooldown
    }

    pub fn entry(&self, id: &str) -> Option<&VoiceEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn entries_by_trigger(&self, tag: &str) -> Vec<&VoiceEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.matches_trigger(tag))
            .collect()
    }

    pub fn mark_played(&mut self, id: &str, now: DateTime<Utc>) {
        let Some(entry) = self.entries.iter().find(|entry| entry.id == id) else {
            return;
        };
        self.cooldown.mark_played(entry, now);
    }

    pub fn reset_daily(&mut self) {
        self.cooldown.reset_daily();
    }

    pub fn resolve_media(&self, filename: &str) -> PathBuf {
        self.media_dir.join(filename)
    }
}

#[derive(Debug, Default)]
pub struct VoiceLibrary {
    categories: HashMap<String, VoiceCategory>,
}

impl VoiceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the stock categories from `<assets>/Library/<name>.json`, with
    /// clips under `<assets>/Audio/<folder>`. Parse failures surface in the
    /// operator log and leave that category empty; nothing here is fatal.
    pub fn load(assets_dir: &Path) -> Self {
        let audio_dir = assets_dir.join("Audio");
        let library_dir = assets_dir.join("Library");

        let mut library = Self::new();
        for (name, folder) in STOCK_CATEGORIES {
            let json_path = library_dir.join(format!("{}.json", name.to_lowercase()));
            let media_dir = audio_dir.join(folder);
            let category = match VoiceCategory::load(name, &media_dir, &json_path) {
                Ok(category) => {
                    log_info!("category {name}: {} entries", category.entries().len());
                    category
                }
                Err(err) => {
                    log_error!("failed to load category {name}: {err:#}");
                    VoiceCategory::empty(name, &media_dir)
                }
            };
            library.insert(category);
        }
        library
    }

    pub fn insert(&mut self, category: VoiceCategory) {
        self.categories.insert(category.name().to_string(), category);
    }

    pub fn category(&self, name: &str) -> Option<&VoiceCategory> {
        self.categories.get(name)
    }

    pub fn category_mut(&mut self, name: &str) -> Option<&mut VoiceCategory> {
        self.categories.get_mut(name)
    }

    /// Returns false when the category does not exist.
    pub fn reload_category(&mut self, name: &str, config: CategoryConfig) -> bool {
        match self.categories.get_mut(name) {
            Some(category) => {
                category.reload(config);
                true
            }
            None => false,
        }
    }

    pub fn reset_daily(&mut self) {
        for category in self.categories.values_mut() {
            category.reset_daily();
        }
    }
}
