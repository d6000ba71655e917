use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::elo::expected_home;
use crate::form::{FormSummary, fatigue_points, form_points};
use crate::home_advantage::HomeAdvantageModel;
use crate::model_params::ModelParams;
use crate::schema::{GameBasic, parse_game_basic};
use crate::source::GameSource;

/// Step-by-step build-up of the final probability, in the picked side's terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WhyBreakdown {
    pub base: f64,
    pub home_ice_pp: f64,
    pub form_pp: f64,
    pub fatigue_pp: f64,
    #[serde(rename = "final")]
    pub final_prob: f64,
}

impl WhyBreakdown {
    pub fn mirrored(&self) -> Self {
        Self {
            base: 1.0 - self.base,
            home_ice_pp: -self.home_ice_pp,
            form_pp: -self.form_pp,
            fatigue_pp: -self.fatigue_pp,
            final_prob: 1.0 - self.final_prob,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    #[serde(rename = "gamePk")]
    pub game_id: Option<u64>,
    pub home_id: u32,
    pub away_id: u32,
    pub home_name: String,
    pub away_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_abbrev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_abbrev: Option<String>,
    pub home_elo: f64,
    pub away_elo: f64,
    pub pick_id: u32,
    pub pick_name: String,
    pub win_prob: f64,
    pub factors: String,
    pub why: WhyBreakdown,
    pub form_home: String,
    pub form_away: String,
    pub fat_home: String,
    pub fat_away: String,
    pub home_adv: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goalie_home: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goalie_away: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct PickContext<'a> {
    pub ratings: &'a BTreeMap<u32, f64>,
    pub form: &'a BTreeMap<u32, FormSummary>,
    pub home_model: &'a HomeAdvantageModel,
    pub params: &'a ModelParams,
}

pub fn prob_shrink(p: f64, params: &ModelParams) -> f64 {
    (0.5 + (p - 0.5) * params.picks.prob_shrink).clamp(0.0, 1.0)
}

#[allow(clippy::too_many_arguments)]
pub fn why_breakdown_home(
    r_home: f64,
    r_away: f64,
    form_h: f64,
    form_a: f64,
    fat_h: f64,
    fat_a: f64,
    home_adv: f64,
    params: &ModelParams,
) -> WhyBreakdown {
    let elo = &params.elo;
    let p = |rh: f64, ra: f64, h: f64| prob_shrink(expected_home(rh, ra, h, elo), params);

    let p_base = p(r_home, r_away, 0.0);
    let p_home_ice = p(r_home, r_away, home_adv);
    let p_form = p(r_home + form_h, r_away + form_a, home_adv);
    let p_final = p(r_home + form_h + fat_h, r_away + form_a + fat_a, home_adv);

    WhyBreakdown {
        base: p_base,
        home_ice_pp: (p_home_ice - p_base) * 100.0,
        form_pp: (p_form - p_home_ice) * 100.0,
        fatigue_pp: (p_final - p_form) * 100.0,
        final_prob: p_final,
    }
}

/// Prediction for one scheduled game; `None` when either team id is missing.
pub fn pick_for_game(game: &GameBasic, ctx: &PickContext<'_>) -> Option<Pick> {
    let home_id = game.home.id?;
    let away_id = game.away.id?;
    let params = ctx.params;
    let base = params.elo.base_rating;

    let home_rt = ctx.ratings.get(&home_id).copied().unwrap_or(base);
    let away_rt = ctx.ratings.get(&away_id).copied().unwrap_or(base);
    let home_adv = ctx.home_model.value_for(home_id, &params.home);

    let fh = ctx.form.get(&home_id);
    let fa = ctx.form.get(&away_id);
    let form_home = form_points(fh, true, &params.form);
    let form_away = form_points(fa, false, &params.form);
    let fat_home = fatigue_points(fh.map(|f| f.rest_days), &params.form);
    let fat_away = fatigue_points(fa.map(|f| f.rest_days), &params.form);

    let why_home = why_breakdown_home(
        home_rt, away_rt, form_home, form_away, fat_home, fat_away, home_adv, params,
    );
    let p_home = why_home.final_prob;

    let home_name = team_label(game.home.name.as_deref(), home_id);
    let away_name = team_label(game.away.name.as_deref(), away_id);

    let (pick_id, pick_name, win_prob, why, factors) = if p_home >= 0.5 {
        (
            home_id,
            home_name.clone(),
            p_home,
            why_home,
            format!(
                "HomeAdv {home_adv:.0} + wOppAdj form {form_home:+.0}/{form_away:+.0} + Rest {fat_home:+.0}/{fat_away:+.0}"
            ),
        )
    } else {
        (
            away_id,
            away_name.clone(),
            1.0 - p_home,
            why_home.mirrored(),
            format!(
                "Road pick vs HomeAdv {home_adv:.0} + wOppAdj form {form_away:+.0}/{form_home:+.0} + Rest {fat_away:+.0}/{fat_home:+.0}"
            ),
        )
    };

    Some(Pick {
        game_id: game.game_id,
        home_id,
        away_id,
        home_name,
        away_name,
        home_abbrev: game.home.abbrev.clone(),
        away_abbrev: game.away.abbrev.clone(),
        home_elo: home_rt,
        away_elo: away_rt,
        pick_id,
        pick_name,
        win_prob,
        factors,
        why,
        form_home: format!("{form_home:+.0}"),
        form_away: format!("{form_away:+.0}"),
        fat_home: format!("{fat_home:+.0}"),
        fat_away: format!("{fat_away:+.0}"),
        home_adv,
        goalie_home: None,
        goalie_away: None,
    })
}

fn team_label(name: Option<&str>, id: u32) -> String {
    name.map(str::to_string)
        .unwrap_or_else(|| format!("Team {id}"))
}

pub fn rank_picks(mut picks: Vec<Pick>, limit: usize) -> Vec<Pick> {
    picks.sort_by(|a, b| b.win_prob.total_cmp(&a.win_prob));
    picks.truncate(limit);
    picks
}

pub fn top_picks_for_date(
    day: NaiveDate,
    source: &dyn GameSource,
    ctx: &PickContext<'_>,
) -> Result<Vec<Pick>> {
    let games = source
        .schedule_for_date(day)
        .with_context(|| format!("fetch schedule for {day}"))?;
    let picks: Vec<Pick> = games
        .iter()
        .map(parse_game_basic)
        .filter_map(|g| pick_for_game(&g, ctx))
        .collect();
    debug!(%day, scheduled = games.len(), candidates = picks.len(), "picks evaluated");
    Ok(rank_picks(picks, ctx.params.picks.per_day))
}
