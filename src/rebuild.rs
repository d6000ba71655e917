use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

use crate::elo::{outcome_score, update_ratings};
use crate::home_advantage::HomeAdvantageModel;
use crate::model_params::ModelParams;
use crate::rating_store::{RatingStore, SeasonState, season_key, season_open_estimate};
use crate::schema::GameOutcome;
use crate::source::GameSource;

#[derive(Debug, Clone, PartialEq)]
pub struct TeamGameLogEntry {
    pub date: NaiveDate,
    pub is_home: bool,
    /// Actual minus expected outcome score for this team.
    pub residual: f64,
    pub goal_diff: i32,
}

pub type TeamLogs = BTreeMap<u32, Vec<TeamGameLogEntry>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Cached,
    Updated { finals: usize },
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Cached => write!(f, "cached"),
            BuildStatus::Updated { finals } => write!(f, "updated {finals} finals"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RebuildOutcome {
    pub season: String,
    pub ratings: BTreeMap<u32, f64>,
    pub home_model: HomeAdvantageModel,
    /// Only games from this pass inside the trailing log window.
    pub logs: TeamLogs,
    pub status: BuildStatus,
}

pub fn rebuild_start(state: &SeasonState, target: NaiveDate, params: &ModelParams) -> NaiveDate {
    match state.last_built {
        Some(last) => last + Duration::days(1),
        None => {
            let open = season_open_estimate(target, &params.rebuild);
            open.max(target - Duration::days(params.rebuild.max_rebuild_days))
        }
    }
}

/// Brings the season containing `target` up to date and checkpoints it.
///
/// Nothing is committed unless every game in the window was fetched.
pub fn rebuild_ratings_to(
    target: NaiveDate,
    store: &mut RatingStore,
    source: &dyn GameSource,
    params: &ModelParams,
) -> Result<RebuildOutcome> {
    let season = season_key(target, &params.rebuild);
    let mut state = store.season_or_default(&season);
    let start = rebuild_start(&state, target, params);

    if start > target {
        debug!(%season, %target, "ratings already built");
        return Ok(RebuildOutcome {
            season,
            ratings: state.ratings,
            home_model: state.home_model,
            logs: TeamLogs::new(),
            status: BuildStatus::Cached,
        });
    }

    let games = source
        .games_in_range(start, target)
        .with_context(|| format!("fetch games {start}..={target}"))?;
    let fetched = games.len();
    let mut outcomes: Vec<GameOutcome> = games
        .iter()
        .filter_map(GameOutcome::from_game)
        .filter(|g| g.date >= start && g.date <= target)
        .collect();
    outcomes.sort_by(|a, b| a.date.cmp(&b.date).then(a.game_id.cmp(&b.game_id)));
    debug!(fetched, decided = outcomes.len(), "games in rebuild window");

    let log_start = target - Duration::days(params.form.log_window_days);
    let logs = replay_games(&mut state, &outcomes, log_start, params);
    state.last_built = Some(target);
    store
        .commit_season(&season, state.clone())
        .context("persist rating state")?;

    let status = BuildStatus::Updated {
        finals: outcomes.len(),
    };
    info!(%season, %start, %target, %status, teams = state.ratings.len(), "ratings rebuilt");
    Ok(RebuildOutcome {
        season,
        ratings: state.ratings,
        home_model: state.home_model,
        logs,
        status,
    })
}

/// Applies `games` in the given order to `state`, returning the log entries
/// dated on or after `log_start`. Callers sort by date first.
pub fn replay_games(
    state: &mut SeasonState,
    games: &[GameOutcome],
    log_start: NaiveDate,
    params: &ModelParams,
) -> TeamLogs {
    let base = params.elo.base_rating;
    let mut logs = TeamLogs::new();

    for game in games {
        let r_home = *state.ratings.entry(game.home_id).or_insert(base);
        let r_away = *state.ratings.entry(game.away_id).or_insert(base);

        let home_adv = state.home_model.value_for(game.home_id, &params.home);
        let s_home = outcome_score(game.home_won(), game.kind);
        let up = update_ratings(
            r_home,
            r_away,
            s_home,
            game.goal_diff(),
            game.date,
            home_adv,
            &params.elo,
        );
        let residual_home = s_home - up.expected_home;
        state.home_model.record_home_game(game.home_id, residual_home);

        if game.date >= log_start {
            logs.entry(game.home_id).or_default().push(TeamGameLogEntry {
                date: game.date,
                is_home: true,
                residual: residual_home,
                goal_diff: game.goal_diff(),
            });
            logs.entry(game.away_id).or_default().push(TeamGameLogEntry {
                date: game.date,
                is_home: false,
                residual: -residual_home,
                goal_diff: -game.goal_diff(),
            });
        }

        state.ratings.insert(game.home_id, up.home);
        state.ratings.insert(game.away_id, up.away);
    }

    logs
}
