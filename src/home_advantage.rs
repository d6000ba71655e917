use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model_params::HomeAdvParams;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HomeAdvantageStat {
    #[serde(default)]
    pub res_sum: f64,
    #[serde(default)]
    pub n: u32,
}

impl HomeAdvantageStat {
    pub fn average_residual(&self) -> f64 {
        if self.n > 0 {
            self.res_sum / self.n as f64
        } else {
            0.0
        }
    }

    pub fn value(&self, cfg: &HomeAdvParams) -> f64 {
        let n = self.n as f64;
        let strength = if self.n > 0 { n / (n + cfg.smoothing) } else { 0.0 };
        let learned = cfg.base + self.average_residual() * cfg.learn_rate * strength;
        learned.clamp(cfg.min, cfg.max)
    }

    fn record(&mut self, residual: f64) {
        if !residual.is_finite() {
            return;
        }
        self.res_sum += residual;
        self.n += 1;
    }
}

/// Team-specific home advantage, shrunk toward the league base until a team
/// has enough home games to speak for itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HomeAdvantageModel {
    stats: BTreeMap<u32, HomeAdvantageStat>,
}

impl HomeAdvantageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stat(&self, team_id: u32) -> HomeAdvantageStat {
        self.stats.get(&team_id).copied().unwrap_or_default()
    }

    pub fn value_for(&self, team_id: u32, cfg: &HomeAdvParams) -> f64 {
        self.stat(team_id).value(cfg)
    }

    /// `residual` is actual minus expected from the home side, where expected
    /// used the value this model returned before the call.
    pub fn record_home_game(&mut self, team_id: u32, residual: f64) {
        self.stats.entry(team_id).or_default().record(residual);
    }
}
