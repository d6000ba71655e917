use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::boxscore_cache::BoxscoreCache;
use crate::config::RunConfig;
use crate::form::compute_form_and_rest;
use crate::goalies::{
    GoalieAdjustment, GoalieProfile, confirmed_starter, parse_goalie_leaders, team_goalie_adjustment,
};
use crate::model_params::ModelParams;
use crate::picks::{Pick, PickContext, top_picks_for_date};
use crate::rating_store::RatingStore;
use crate::rebuild::{BuildStatus, rebuild_ratings_to};
use crate::schema::TeamSide;
use crate::source::GameSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPicks {
    pub picks: Vec<Pick>,
    pub build_note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunNotes {
    pub prob_shrink: f64,
    pub max_rebuild_days: i64,
    pub form: String,
    pub home_adv: String,
    pub home_adv_bounds: [f64; 2],
}

impl RunNotes {
    fn from_params(params: &ModelParams) -> Self {
        Self {
            prob_shrink: params.picks.prob_shrink,
            max_rebuild_days: params.rebuild.max_rebuild_days,
            form: format!(
                "opponent-adjusted residuals (last {}) with recency weights; home/away splits when n>={}",
                params.form.window(),
                params.form.split_min_games
            ),
            home_adv: "team-specific learned home advantage from season home residuals (smoothed + bounded)"
                .to_string(),
            home_adv_bounds: [params.home.min, params.home.max],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PicksFile {
    pub generated_at: String,
    pub dates: Vec<String>,
    pub by_date: BTreeMap<String, DayPicks>,
    pub notes: RunNotes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    Written {
        path: PathBuf,
        dates: usize,
        status: BuildStatus,
    },
    /// The rebuild failed and the earlier picks file was left in place.
    KeptPrevious { reason: String },
}

pub fn run_batch(
    cfg: &RunConfig,
    params: &ModelParams,
    source: &dyn GameSource,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    let today = cfg.today.unwrap_or_else(|| now.date_naive());
    let mut store = RatingStore::load(&cfg.state_path);
    let mut cache = BoxscoreCache::load(&cfg.boxscore_cache_path);

    let built = build_picks(
        today,
        cfg.days,
        &mut store,
        &mut cache,
        source,
        params,
        cfg.goalie_notes,
        now,
    );
    let (file, status) = match built {
        Ok(out) => out,
        Err(err) if err.is::<RebuildFailed>() => {
            if cfg.fallback_to_previous && cfg.picks_path.exists() {
                warn!(error = %format!("{err:#}"), "rebuild failed, keeping previous picks");
                return Ok(RunReport::KeptPrevious {
                    reason: format!("{err:#}"),
                });
            }
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    write_picks_file(&cfg.picks_path, &file)?;
    if let Err(err) = cache.save() {
        warn!(error = %format!("{err:#}"), "boxscore cache not saved");
    }
    info!(
        path = %cfg.picks_path.display(),
        days = file.dates.len(),
        %status,
        new_boxscores = cache.new_fetches(),
        "picks written"
    );
    Ok(RunReport::Written {
        path: cfg.picks_path.clone(),
        dates: file.dates.len(),
        status,
    })
}

/// Marks an error raised while rebuilding ratings, the only stage the
/// previous-output fallback applies to.
#[derive(Debug)]
pub struct RebuildFailed;

impl std::fmt::Display for RebuildFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rating rebuild failed")
    }
}

impl std::error::Error for RebuildFailed {}

#[allow(clippy::too_many_arguments)]
pub fn build_picks(
    today: NaiveDate,
    days: usize,
    store: &mut RatingStore,
    cache: &mut BoxscoreCache,
    source: &dyn GameSource,
    params: &ModelParams,
    goalie_notes: bool,
    now: DateTime<Utc>,
) -> Result<(PicksFile, BuildStatus)> {
    let dates: Vec<NaiveDate> = (0..days as i64).map(|i| today + Duration::days(i)).collect();
    let ratings_day = today - Duration::days(1);

    let rebuilt = rebuild_ratings_to(ratings_day, store, source, params)
        .map_err(|err| err.context(RebuildFailed))?;
    let form = compute_form_and_rest(today, &rebuilt.logs, &params.form);
    let ctx = PickContext {
        ratings: &rebuilt.ratings,
        form: &form,
        home_model: &rebuilt.home_model,
        params,
    };
    let build_note = rebuilt.status.to_string();

    let mut by_date = BTreeMap::new();
    for day in &dates {
        let mut picks = top_picks_for_date(*day, source, &ctx)?;
        if goalie_notes && *day == today {
            annotate_goalies(&mut picks, today, cache, source, params);
        }
        by_date.insert(
            day.to_string(),
            DayPicks {
                picks,
                build_note: build_note.clone(),
            },
        );
    }

    let file = PicksFile {
        generated_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        dates: dates.iter().map(NaiveDate::to_string).collect(),
        by_date,
        notes: RunNotes::from_params(params),
    };
    Ok((file, rebuilt.status))
}

// Informational only: the goalie numbers never touch win_prob.
fn annotate_goalies(
    picks: &mut [Pick],
    today: NaiveDate,
    cache: &mut BoxscoreCache,
    source: &dyn GameSource,
    params: &ModelParams,
) {
    let profiles: BTreeMap<u64, GoalieProfile> = match source.goalie_leaders() {
        Ok(payload) => parse_goalie_leaders(&payload),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "goalie leaderboard unavailable");
            BTreeMap::new()
        }
    };
    if profiles.is_empty() {
        return;
    }
    for pick in picks.iter_mut() {
        // Pre-game boxscores stay out of the cache the recent-start scan reads.
        let lineup = pick.game_id.and_then(|id| match source.boxscore(id) {
            Ok(boxscore) => Some(boxscore),
            Err(err) => {
                debug!(game_id = id, %err, "no lineup yet");
                None
            }
        });
        let mut note = |team_id: u32, abbrev: Option<&str>, side: TeamSide| {
            let abbrev = abbrev?;
            let starter = lineup.as_ref().and_then(|b| confirmed_starter(b, side));
            team_goalie_adjustment(
                team_id,
                abbrev,
                starter,
                today,
                &profiles,
                cache,
                source,
                &params.goalie,
            )
            .map(|adj| goalie_note(&adj))
        };
        pick.goalie_home = note(pick.home_id, pick.home_abbrev.as_deref(), TeamSide::Home);
        pick.goalie_away = note(pick.away_id, pick.away_abbrev.as_deref(), TeamSide::Away);
    }
}

fn goalie_note(adj: &GoalieAdjustment) -> String {
    let who = if adj.confirmed { "starter" } else { "probable" };
    match adj.recent_sv {
        Some(sv) => format!(
            "G{} {who} {:+.1} pts (recent {:.3} over {} starts)",
            adj.player_id, adj.points, sv, adj.recent_starts
        ),
        None => format!("G{} {who} {:+.1} pts (season)", adj.player_id, adj.points),
    }
}

pub fn write_picks_file(path: &Path, file: &PicksFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(file).context("serialize picks")?;
    fs::write(&tmp, json).context("write picks")?;
    fs::rename(&tmp, path).context("swap picks")?;
    Ok(())
}
