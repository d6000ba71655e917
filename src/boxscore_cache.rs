use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::source::GameSource;

/// Raw boxscore payloads keyed by game id, kept between runs.
///
/// `new_fetches` counts network fetches made during this run only and is
/// never written to disk.
#[derive(Debug, Default)]
pub struct BoxscoreCache {
    entries: HashMap<String, Value>,
    new_fetches: usize,
    path: Option<PathBuf>,
}

impl BoxscoreCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str::<HashMap<String, Value>>(&raw).unwrap_or_else(|err| {
                warn!(path = %path.display(), %err, "boxscore cache unreadable, starting empty");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self {
            entries,
            new_fetches: 0,
            path: Some(path.to_path_buf()),
        }
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).ok();
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string(&self.entries).context("serialize boxscore cache")?;
        fs::write(&tmp, json).context("write boxscore cache")?;
        fs::rename(&tmp, path).context("swap boxscore cache")?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn new_fetches(&self) -> usize {
        self.new_fetches
    }

    pub fn insert(&mut self, game_id: u64, boxscore: Value) {
        self.entries.insert(game_id.to_string(), boxscore);
    }

    /// Fetch failures and the per-run cap both read as "no boxscore".
    pub fn get_or_fetch(
        &mut self,
        game_id: u64,
        source: &dyn GameSource,
        max_new_fetches: usize,
    ) -> Option<&Value> {
        let key = game_id.to_string();
        if !self.entries.contains_key(&key) {
            if self.new_fetches >= max_new_fetches {
                debug!(game_id, "boxscore fetch cap reached");
                return None;
            }
            match source.boxscore(game_id) {
                Ok(boxscore) => {
                    self.entries.insert(key.clone(), boxscore);
                    self.new_fetches += 1;
                }
                Err(err) => {
                    debug!(game_id, %err, "boxscore unavailable");
                    return None;
                }
            }
        }
        self.entries.get(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SnapshotSource;
    use serde_json::json;

    #[test]
    fn cap_limits_new_fetches_but_not_hits() {
        let source = SnapshotSource::new(Vec::new())
            .with_boxscore(1, json!({"id": 1}))
            .with_boxscore(2, json!({"id": 2}));
        let mut cache = BoxscoreCache::in_memory();
        assert!(cache.get_or_fetch(1, &source, 1).is_some());
        assert!(cache.get_or_fetch(2, &source, 1).is_none());
        assert!(cache.get_or_fetch(1, &source, 1).is_some());
        assert_eq!(cache.new_fetches(), 1);
        assert_eq!(source.boxscore_fetches(), 1);
    }

    #[test]
    fn missing_boxscore_is_none_and_not_counted() {
        let source = SnapshotSource::new(Vec::new());
        let mut cache = BoxscoreCache::in_memory();
        assert!(cache.get_or_fetch(9, &source, 10).is_none());
        assert_eq!(cache.new_fetches(), 0);
    }

    #[test]
    fn saved_file_holds_only_payloads() {
        let dir = std::env::temp_dir().join(format!("rink_picks_box_{}", std::process::id()));
        let path = dir.join("boxscore_cache.json");
        let source = SnapshotSource::new(Vec::new()).with_boxscore(7, json!({"id": 7}));
        let mut cache = BoxscoreCache::load(&path);
        cache.get_or_fetch(7, &source, 5);
        cache.save().unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, json!({"7": {"id": 7}}));
        let reloaded = BoxscoreCache::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.new_fetches(), 0);
        let _ = fs::remove_dir_all(dir);
    }
}
