use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Every tunable knob of the rating and pick model.
///
/// Built once per run (defaults, optionally overridden from a JSON file) and
/// passed by reference; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub elo: EloParams,
    pub home: HomeAdvParams,
    pub form: FormParams,
    pub goalie: GoalieParams,
    pub rebuild: RebuildParams,
    pub picks: PickParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EloParams {
    pub base_rating: f64,
    pub scale: f64,
    // Goal differential beyond this adds nothing (empty-net noise).
    pub mov_goal_cap: i32,
    pub k_oct_nov: f64,
    pub k_dec: f64,
    pub k_jan_feb: f64,
    pub k_mar_apr: f64,
    pub k_other: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeAdvParams {
    pub base: f64,
    pub min: f64,
    pub max: f64,
    pub learn_rate: f64,
    /// Pseudo-count for `n / (n + smoothing)`.
    pub smoothing: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormParams {
    pub log_window_days: i64,
    /// Oldest to newest; the last entry applies to the most recent game.
    pub recency_weights: Vec<f64>,
    pub residual_to_points: f64,
    pub gd_to_points: f64,
    pub max_points: f64,
    pub split_min_games: usize,
    pub back_to_back_penalty: f64,
    pub one_rest_penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalieParams {
    pub league_avg_sv: f64,
    pub pts_per_010_sv: f64,
    pub max_points: f64,
    pub season_full_weight_gp: f64,
    pub recent_full_weight_starts: f64,
    pub recent_starts: usize,
    pub lookback_days: i64,
    pub max_new_boxscores_per_run: usize,
    pub starter_min_toi_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebuildParams {
    /// Cold-start lookback cap.
    pub max_rebuild_days: i64,
    pub season_start_month: u32,
    pub season_open_month: u32,
    pub season_open_day: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickParams {
    pub prob_shrink: f64,
    pub per_day: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            elo: EloParams::default(),
            home: HomeAdvParams::default(),
            form: FormParams::default(),
            goalie: GoalieParams::default(),
            rebuild: RebuildParams::default(),
            picks: PickParams::default(),
        }
    }
}

impl Default for EloParams {
    fn default() -> Self {
        Self {
            base_rating: 1500.0,
            scale: 400.0,
            mov_goal_cap: 3,
            k_oct_nov: 28.0,
            k_dec: 24.0,
            k_jan_feb: 20.0,
            k_mar_apr: 18.0,
            k_other: 16.0,
        }
    }
}

impl Default for HomeAdvParams {
    fn default() -> Self {
        Self {
            base: 55.0,
            min: 25.0,
            max: 85.0,
            learn_rate: 160.0,
            smoothing: 18.0,
        }
    }
}

impl Default for FormParams {
    fn default() -> Self {
        Self {
            log_window_days: 60,
            recency_weights: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0],
            residual_to_points: 150.0,
            gd_to_points: 6.0,
            max_points: 40.0,
            split_min_games: 5,
            back_to_back_penalty: 15.0,
            one_rest_penalty: 5.0,
        }
    }
}

impl Default for GoalieParams {
    fn default() -> Self {
        Self {
            league_avg_sv: 0.905,
            pts_per_010_sv: 10.0,
            max_points: 25.0,
            season_full_weight_gp: 15.0,
            recent_full_weight_starts: 3.0,
            recent_starts: 5,
            lookback_days: 35,
            max_new_boxscores_per_run: 120,
            starter_min_toi_minutes: 30.0,
        }
    }
}

impl Default for RebuildParams {
    fn default() -> Self {
        Self {
            max_rebuild_days: 180,
            season_start_month: 9,
            season_open_month: 10,
            season_open_day: 1,
        }
    }
}

impl Default for PickParams {
    fn default() -> Self {
        Self {
            prob_shrink: 0.85,
            per_day: 3,
        }
    }
}

impl FormParams {
    pub fn window(&self) -> usize {
        self.recency_weights.len()
    }
}

impl ModelParams {
    /// Loads overrides from `path` when given. A missing or malformed file
    /// falls back to the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        let Ok(raw) = fs::read_to_string(path) else {
            warn!(path = %path.display(), "model params file unreadable, using defaults");
            return Self::default();
        };
        match serde_json::from_str::<ModelParams>(&raw) {
            Ok(params) => params,
            Err(err) => {
                warn!(path = %path.display(), %err, "model params file invalid, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self).context("serialize model params")?;
        fs::write(&tmp, json).context("write model params")?;
        fs::rename(&tmp, path).context("swap model params")?;
        Ok(())
    }
}
