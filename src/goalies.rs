//! Goalie quality as a bounded rating-point adjustment.
//!
//! Computed per run but not part of the pick probability; see `run` for the
//! informational wiring.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::boxscore_cache::BoxscoreCache;
use crate::model_params::GoalieParams;
use crate::schema::{
    GoalieLine, TeamSide, boxscore_goalies, goalie_leader_rows, parse_game_basic, toi_minutes,
};
use crate::source::GameSource;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalieProfile {
    pub player_id: u64,
    pub team_abbrev: String,
    pub save_pctg: f64,
    pub games_played: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecentStarts {
    pub starts: usize,
    pub shots: i64,
    pub saves: i64,
}

impl RecentStarts {
    pub fn save_pctg(&self) -> Option<f64> {
        if self.starts == 0 || self.shots <= 0 {
            return None;
        }
        Some(self.saves as f64 / self.shots as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalieAdjustment {
    pub player_id: u64,
    pub confirmed: bool,
    pub points: f64,
    pub recent_starts: usize,
    pub recent_sv: Option<f64>,
}

pub fn parse_goalie_leaders(payload: &Value) -> BTreeMap<u64, GoalieProfile> {
    goalie_leader_rows(payload)
        .into_iter()
        .map(|row| {
            (
                row.player_id,
                GoalieProfile {
                    player_id: row.player_id,
                    team_abbrev: row.team_abbrev,
                    save_pctg: row.save_pctg,
                    games_played: row.games_played,
                },
            )
        })
        .collect()
}

/// The team's busiest goalie; ties go to the better save percentage.
pub fn probable_goalie<'a>(
    team_abbrev: &str,
    profiles: &'a BTreeMap<u64, GoalieProfile>,
) -> Option<&'a GoalieProfile> {
    profiles
        .values()
        .filter(|g| g.team_abbrev.eq_ignore_ascii_case(team_abbrev))
        .max_by(|a, b| {
            a.games_played
                .cmp(&b.games_played)
                .then(a.save_pctg.total_cmp(&b.save_pctg))
        })
}

pub fn confirmed_starter(boxscore: &Value, side: TeamSide) -> Option<u64> {
    boxscore_goalies(boxscore, side)?
        .into_iter()
        .find(|g| g.starter == Some(true))
        .map(|g| g.player_id)
}

fn sv_to_points(save_pctg: f64, shrink: f64, cfg: &GoalieParams) -> f64 {
    let pts = ((save_pctg - cfg.league_avg_sv) / 0.010) * cfg.pts_per_010_sv * shrink;
    pts.clamp(-cfg.max_points, cfg.max_points)
}

pub fn season_adjustment_points(goalie: Option<&GoalieProfile>, cfg: &GoalieParams) -> f64 {
    let Some(goalie) = goalie else {
        return 0.0;
    };
    let shrink = (goalie.games_played as f64 / cfg.season_full_weight_gp).clamp(0.0, 1.0);
    sv_to_points(goalie.save_pctg, shrink, cfg)
}

/// Recent form replaces the season number once there is any, ramping in over
/// the first few starts.
pub fn blended_adjustment_points(
    goalie: Option<&GoalieProfile>,
    recent: &RecentStarts,
    cfg: &GoalieParams,
) -> f64 {
    let Some(recent_sv) = recent.save_pctg() else {
        return season_adjustment_points(goalie, cfg);
    };
    let shrink = (recent.starts as f64 / cfg.recent_full_weight_starts).clamp(0.0, 1.0);
    sv_to_points(recent_sv, shrink, cfg)
}

fn counts_as_start(line: &GoalieLine, cfg: &GoalieParams) -> bool {
    match line.starter {
        Some(flag) => flag,
        None => match line.toi.as_deref().map(toi_minutes) {
            Some(Some(minutes)) => minutes >= cfg.starter_min_toi_minutes,
            // No usable TOI: give the line the benefit of the doubt.
            _ => true,
        },
    }
}

/// Walks back from the day before `today` collecting `goalie_id`'s starts
/// for `team_id`. Lookup failures count as no data.
pub fn recent_starts(
    goalie_id: u64,
    team_id: u32,
    today: NaiveDate,
    cache: &mut BoxscoreCache,
    source: &dyn GameSource,
    cfg: &GoalieParams,
) -> RecentStarts {
    let mut acc = RecentStarts::default();
    let earliest = today - Duration::days(cfg.lookback_days);
    let mut day = today - Duration::days(1);

    while day >= earliest && acc.starts < cfg.recent_starts {
        let games = match source.scores_for_date(day) {
            Ok(games) => games,
            Err(err) => {
                debug!(%day, %err, "score lookup failed");
                Vec::new()
            }
        };
        for game in &games {
            let basic = parse_game_basic(game);
            let (Some(side), Some(game_id)) = (basic.side_of(team_id), basic.game_id) else {
                continue;
            };
            let Some(boxscore) =
                cache.get_or_fetch(game_id, source, cfg.max_new_boxscores_per_run)
            else {
                continue;
            };
            let Some(lines) = boxscore_goalies(boxscore, side) else {
                continue;
            };
            let Some(line) = lines.iter().find(|l| l.player_id == goalie_id) else {
                continue;
            };
            let (Some(shots), Some(goals)) = (line.shots_against, line.goals_against) else {
                continue;
            };
            if shots <= 0 || !counts_as_start(line, cfg) {
                continue;
            }
            acc.shots += shots;
            acc.saves += shots - goals;
            acc.starts += 1;
            if acc.starts >= cfg.recent_starts {
                break;
            }
        }
        day -= Duration::days(1);
    }
    acc
}

/// Blended adjustment for the team's goalie: the confirmed `starter` when the
/// game boxscore names one, else the probable goalie from the leaderboard.
#[allow(clippy::too_many_arguments)]
pub fn team_goalie_adjustment(
    team_id: u32,
    team_abbrev: &str,
    starter: Option<u64>,
    today: NaiveDate,
    profiles: &BTreeMap<u64, GoalieProfile>,
    cache: &mut BoxscoreCache,
    source: &dyn GameSource,
    cfg: &GoalieParams,
) -> Option<GoalieAdjustment> {
    let (player_id, profile) = match starter {
        Some(id) => (id, profiles.get(&id)),
        None => {
            let goalie = probable_goalie(team_abbrev, profiles)?;
            (goalie.player_id, Some(goalie))
        }
    };
    let recent = recent_starts(player_id, team_id, today, cache, source, cfg);
    Some(GoalieAdjustment {
        player_id,
        confirmed: starter.is_some(),
        points: blended_adjustment_points(profile, &recent, cfg),
        recent_starts: recent.starts,
        recent_sv: recent.save_pctg(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: u64, team: &str, sv: f64, gp: u32) -> GoalieProfile {
        GoalieProfile {
            player_id: id,
            team_abbrev: team.to_string(),
            save_pctg: sv,
            games_played: gp,
        }
    }

    #[test]
    fn season_points_shrink_by_games_played() {
        let cfg = GoalieParams::default();
        let full = profile(1, "BOS", 0.915, 30);
        assert!((season_adjustment_points(Some(&full), &cfg) - 10.0).abs() < 1e-9);
        let early = profile(1, "BOS", 0.915, 3);
        assert!((season_adjustment_points(Some(&early), &cfg) - 2.0).abs() < 1e-9);
        assert_eq!(season_adjustment_points(None, &cfg), 0.0);
    }

    #[test]
    fn season_points_are_capped() {
        let cfg = GoalieParams::default();
        assert_eq!(season_adjustment_points(Some(&profile(1, "X", 0.960, 40)), &cfg), 25.0);
        assert_eq!(season_adjustment_points(Some(&profile(1, "X", 0.850, 40)), &cfg), -25.0);
    }

    #[test]
    fn recent_data_replaces_season_with_ramp() {
        let cfg = GoalieParams::default();
        let g = profile(1, "BOS", 0.925, 30);
        let none = RecentStarts::default();
        assert!((blended_adjustment_points(Some(&g), &none, &cfg) - 20.0).abs() < 1e-9);

        let two = RecentStarts { starts: 2, shots: 60, saves: 54 };
        // 0.900 sv, 2/3 ramp
        let want = ((0.9 - 0.905) / 0.010) * 10.0 * (2.0 / 3.0);
        assert!((blended_adjustment_points(Some(&g), &two, &cfg) - want).abs() < 1e-9);
    }

    #[test]
    fn probable_goalie_prefers_games_then_save_pct() {
        let profiles = BTreeMap::from([
            (1, profile(1, "BOS", 0.910, 20)),
            (2, profile(2, "BOS", 0.930, 12)),
            (3, profile(3, "BOS", 0.915, 20)),
            (4, profile(4, "TOR", 0.950, 40)),
        ]);
        assert_eq!(probable_goalie("BOS", &profiles).map(|g| g.player_id), Some(3));
        assert!(probable_goalie("MTL", &profiles).is_none());
    }

    #[test]
    fn start_inference_from_toi() {
        let cfg = GoalieParams::default();
        let line = |starter, toi: Option<&str>| GoalieLine {
            player_id: 1,
            starter,
            toi: toi.map(str::to_string),
            shots_against: Some(30),
            goals_against: Some(2),
        };
        assert!(counts_as_start(&line(Some(true), Some("10:00")), &cfg));
        assert!(!counts_as_start(&line(Some(false), Some("60:00")), &cfg));
        assert!(counts_as_start(&line(None, Some("31:10")), &cfg));
        assert!(!counts_as_start(&line(None, Some("12:00")), &cfg));
        assert!(counts_as_start(&line(None, None), &cfg));
        assert!(counts_as_start(&line(None, Some("??")), &cfg));
    }

    #[test]
    fn confirmed_starter_reads_flagged_line() {
        let boxscore = serde_json::json!({
            "playerByGameStats": {
                "homeTeam": {"goalies": [
                    {"playerId": 31, "starter": false},
                    {"playerId": 35, "starter": true}
                ]},
                "awayTeam": {"goalies": [
                    {"playerId": 40},
                    {"playerId": 41, "starter": false}
                ]}
            }
        });
        assert_eq!(confirmed_starter(&boxscore, TeamSide::Home), Some(35));
        assert_eq!(confirmed_starter(&boxscore, TeamSide::Away), None);
        assert_eq!(confirmed_starter(&serde_json::json!({}), TeamSide::Home), None);
    }
}
