use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::home_advantage::HomeAdvantageModel;
use crate::model_params::RebuildParams;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonState {
    #[serde(default)]
    pub last_built: Option<NaiveDate>,
    #[serde(default)]
    pub ratings: BTreeMap<u32, f64>,
    #[serde(default)]
    pub home_model: HomeAdvantageModel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    seasons: BTreeMap<String, SeasonState>,
}

#[derive(Debug, Clone, Default)]
pub struct RatingStore {
    seasons: BTreeMap<String, SeasonState>,
    path: Option<PathBuf>,
}

impl RatingStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Missing or unreadable files start an empty store.
    pub fn load(path: &Path) -> Self {
        let seasons = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<StoreFile>(&raw) {
                Ok(file) => file.seasons,
                Err(err) => {
                    warn!(path = %path.display(), %err, "rating state unreadable, starting empty");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self {
            seasons,
            path: Some(path.to_path_buf()),
        }
    }

    pub fn season(&self, key: &str) -> Option<&SeasonState> {
        self.seasons.get(key)
    }

    pub fn season_or_default(&self, key: &str) -> SeasonState {
        self.seasons.get(key).cloned().unwrap_or_default()
    }

    /// Replaces the checkpoint for `key`. A file-backed store only takes the
    /// new checkpoint once the file write succeeded.
    pub fn commit_season(&mut self, key: &str, state: SeasonState) -> Result<()> {
        let mut seasons = self.seasons.clone();
        seasons.insert(key.to_string(), state);
        self.write(&seasons)?;
        self.seasons = seasons;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        self.write(&self.seasons)
    }

    fn write(&self, seasons: &BTreeMap<String, SeasonState>) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let file = StoreFile {
            seasons: seasons.clone(),
        };
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&file).context("serialize rating state")?;
        fs::write(&tmp, json).context("write rating state")?;
        fs::rename(&tmp, path).context("swap rating state")?;
        Ok(())
    }
}

/// Seasons start in September and are keyed by both calendar years,
/// e.g. `"20242025"`.
pub fn season_key(day: NaiveDate, cfg: &RebuildParams) -> String {
    let start_year = season_start_year(day, cfg);
    format!("{}{}", start_year, start_year + 1)
}

fn season_start_year(day: NaiveDate, cfg: &RebuildParams) -> i32 {
    if day.month() >= cfg.season_start_month {
        day.year()
    } else {
        day.year() - 1
    }
}

pub fn season_open_estimate(day: NaiveDate, cfg: &RebuildParams) -> NaiveDate {
    let year = season_start_year(day, cfg);
    NaiveDate::from_ymd_opt(year, cfg.season_open_month, cfg.season_open_day)
        .or_else(|| NaiveDate::from_ymd_opt(year, 10, 1))
        .unwrap_or(day)
}
