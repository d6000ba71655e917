use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::schema::parse_game_basic;

/// Where schedules, results and boxscores come from.
///
/// Implementations own their retry policy; an `Err` here means the data is
/// unavailable for this run.
pub trait GameSource {
    fn schedule_for_date(&self, day: NaiveDate) -> Result<Vec<Value>>;

    fn scores_for_date(&self, day: NaiveDate) -> Result<Vec<Value>>;

    /// Every game dated within `[start, end]`, each game id once.
    fn games_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Value>>;

    fn boxscore(&self, game_id: u64) -> Result<Value>;

    fn goalie_leaders(&self) -> Result<Value>;
}

#[derive(Debug, Default)]
pub struct SnapshotSource {
    games: Vec<Value>,
    boxscores: HashMap<u64, Value>,
    goalie_leaders: Option<Value>,
    range_fetches: Cell<usize>,
    boxscore_fetches: Cell<usize>,
}

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    games: Vec<Value>,
    #[serde(default)]
    boxscores: HashMap<String, Value>,
    #[serde(default)]
    goalie_leaders: Option<Value>,
}

impl SnapshotSource {
    pub fn new(games: Vec<Value>) -> Self {
        Self {
            games,
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read snapshot {}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: SnapshotFile = serde_json::from_str(raw).context("invalid snapshot json")?;
        let boxscores = file
            .boxscores
            .into_iter()
            .filter_map(|(id, v)| id.trim().parse::<u64>().ok().map(|id| (id, v)))
            .collect();
        Ok(Self {
            games: file.games,
            boxscores,
            goalie_leaders: file.goalie_leaders,
            ..Self::default()
        })
    }

    pub fn with_boxscore(mut self, game_id: u64, boxscore: Value) -> Self {
        self.boxscores.insert(game_id, boxscore);
        self
    }

    pub fn push_game(&mut self, game: Value) {
        self.games.push(game);
    }

    pub fn range_fetches(&self) -> usize {
        self.range_fetches.get()
    }

    pub fn boxscore_fetches(&self) -> usize {
        self.boxscore_fetches.get()
    }

    fn games_on(&self, day: NaiveDate) -> Vec<Value> {
        self.games
            .iter()
            .filter(|g| parse_game_basic(g).date == Some(day))
            .cloned()
            .collect()
    }
}

impl GameSource for SnapshotSource {
    fn schedule_for_date(&self, day: NaiveDate) -> Result<Vec<Value>> {
        Ok(self.games_on(day))
    }

    fn scores_for_date(&self, day: NaiveDate) -> Result<Vec<Value>> {
        Ok(self.games_on(day))
    }

    fn games_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Value>> {
        self.range_fetches.set(self.range_fetches.get() + 1);
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for game in &self.games {
            let basic = parse_game_basic(game);
            let Some(day) = basic.date else { continue };
            if day < start || day > end {
                continue;
            }
            if let Some(id) = basic.game_id {
                if !seen.insert(id) {
                    continue;
                }
            }
            out.push(game.clone());
        }
        Ok(out)
    }

    fn boxscore(&self, game_id: u64) -> Result<Value> {
        self.boxscore_fetches.set(self.boxscore_fetches.get() + 1);
        self.boxscores
            .get(&game_id)
            .cloned()
            .ok_or_else(|| anyhow!("no boxscore for game {game_id}"))
    }

    fn goalie_leaders(&self) -> Result<Value> {
        self.goalie_leaders
            .clone()
            .ok_or_else(|| anyhow!("no goalie leaderboard in snapshot"))
    }
}
