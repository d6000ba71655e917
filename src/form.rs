use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model_params::FormParams;
use crate::rebuild::{TeamGameLogEntry, TeamLogs};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SplitSummary {
    pub n: usize,
    pub res_avg: f64,
    pub gd_avg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSummary {
    /// Full days off before `today`; 0 means a back-to-back.
    pub rest_days: i64,
    pub all: SplitSummary,
    pub home: SplitSummary,
    pub away: SplitSummary,
}

/// Averages `vals` using the trailing `vals.len()` entries of `weights`, so
/// the newest value always gets the heaviest weight.
pub fn weighted_avg(vals: &[f64], weights: &[f64]) -> f64 {
    if vals.is_empty() {
        return 0.0;
    }
    let w = &weights[weights.len().saturating_sub(vals.len())..];
    let num: f64 = vals.iter().zip(w).map(|(v, wi)| v * wi).sum();
    let den: f64 = w.iter().take(vals.len()).sum();
    if den != 0.0 { num / den } else { 0.0 }
}

fn summarize(games: &[&TeamGameLogEntry], weights: &[f64]) -> SplitSummary {
    if games.is_empty() {
        return SplitSummary::default();
    }
    let res: Vec<f64> = games.iter().map(|g| g.residual).collect();
    let gd: Vec<f64> = games.iter().map(|g| g.goal_diff as f64).collect();
    SplitSummary {
        n: games.len(),
        res_avg: weighted_avg(&res, weights),
        gd_avg: weighted_avg(&gd, weights),
    }
}

pub fn compute_form_and_rest(
    today: NaiveDate,
    logs: &TeamLogs,
    cfg: &FormParams,
) -> BTreeMap<u32, FormSummary> {
    let mut out = BTreeMap::new();
    for (team_id, games) in logs {
        let mut sorted: Vec<&TeamGameLogEntry> = games.iter().collect();
        sorted.sort_by_key(|g| g.date);
        let recent = &sorted[sorted.len().saturating_sub(cfg.window())..];
        let Some(last) = recent.last() else {
            continue;
        };

        let home: Vec<&TeamGameLogEntry> = recent.iter().copied().filter(|g| g.is_home).collect();
        let away: Vec<&TeamGameLogEntry> = recent.iter().copied().filter(|g| !g.is_home).collect();

        out.insert(
            *team_id,
            FormSummary {
                rest_days: (today - last.date).num_days() - 1,
                all: summarize(recent, &cfg.recency_weights),
                home: summarize(&home, &cfg.recency_weights),
                away: summarize(&away, &cfg.recency_weights),
            },
        );
    }
    out
}

/// Opponent-adjusted form in rating points. Uses the venue split once it has
/// enough games, otherwise the overall bucket.
pub fn form_points(form: Option<&FormSummary>, is_home: bool, cfg: &FormParams) -> f64 {
    let Some(form) = form else {
        return 0.0;
    };
    let split = if is_home { &form.home } else { &form.away };
    let used = if split.n >= cfg.split_min_games {
        split
    } else {
        &form.all
    };
    let pts = used.res_avg * cfg.residual_to_points + used.gd_avg * cfg.gd_to_points;
    pts.clamp(-cfg.max_points, cfg.max_points)
}

pub fn fatigue_points(rest_days: Option<i64>, cfg: &FormParams) -> f64 {
    match rest_days {
        None => 0.0,
        Some(d) if d <= 0 => -cfg.back_to_back_penalty,
        Some(1) => -cfg.one_rest_penalty,
        Some(_) => 0.0,
    }
}
