//! Mapping from loosely structured NHL web API payloads to typed records.
//!
//! Every accepted field name is listed in an alias table below, tried in
//! order. A record that lacks a required field maps to `None` and the caller
//! skips it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::elo::FinishKind;

const GAME_ID_KEYS: &[&str] = &["id", "gamePk"];
const GAME_DATE_KEYS: &[&str] = &[
    "gameDate",
    "gameDateUTC",
    "date",
    "startTimeUTC",
    "startTime",
];
const GAME_STATE_KEYS: &[&str] = &["gameState", "status", "detailedState"];
const TEAM_NAME_KEYS: &[&str] = &["name", "placeName", "commonName"];
const TEAM_ABBREV_KEYS: &[&str] = &["abbrev", "triCode", "teamAbbrev"];
const FINAL_STATES: &[&str] = &["FINAL", "OFF", "GAME OVER"];

const LEADER_ROW_KEYS: &[&str] = &["goalies", "data", "results"];
const LEADER_ID_KEYS: &[&str] = &["playerId", "id", "player_id"];
const LEADER_TEAM_KEYS: &[&str] = &["teamAbbrev", "team", "team_abbrev"];
const LEADER_SV_KEYS: &[&str] = &["savePctg", "save_pctg"];
const LEADER_GP_KEYS: &[&str] = &["gamesPlayed", "gp", "games"];

const GOALIE_TOI_KEYS: &[&str] = &["toi", "timeOnIce"];
const GOALIE_SHOTS_KEYS: &[&str] = &["shotsAgainst", "shots", "shotsAgainstTotal"];
const GOALIE_GOALS_KEYS: &[&str] = &["goalsAgainst", "goals", "goalsAgainstTotal"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: Option<u32>,
    pub name: Option<String>,
    pub abbrev: Option<String>,
    pub score: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameBasic {
    pub game_id: Option<u64>,
    pub date: Option<NaiveDate>,
    pub state: String,
    pub home: TeamRef,
    pub away: TeamRef,
}

impl GameBasic {
    pub fn side_of(&self, team_id: u32) -> Option<TeamSide> {
        if self.home.id == Some(team_id) {
            Some(TeamSide::Home)
        } else if self.away.id == Some(team_id) {
            Some(TeamSide::Away)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamSide {
    Home,
    Away,
}

impl TeamSide {
    fn boxscore_key(self) -> &'static str {
        match self {
            TeamSide::Home => "homeTeam",
            TeamSide::Away => "awayTeam",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameOutcome {
    pub game_id: Option<u64>,
    pub date: NaiveDate,
    pub home_id: u32,
    pub away_id: u32,
    pub home_goals: i32,
    pub away_goals: i32,
    pub kind: FinishKind,
}

impl GameOutcome {
    /// `None` for anything not usable as a rating input: unfinished games,
    /// missing date/score/team, or a tied score.
    pub fn from_game(game: &Value) -> Option<Self> {
        if !is_final(game) {
            return None;
        }
        let basic = parse_game_basic(game);
        let date = basic.date?;
        let (home_goals, away_goals) = final_score(game)?;
        if home_goals == away_goals {
            return None;
        }
        Some(Self {
            game_id: basic.game_id,
            date,
            home_id: basic.home.id?,
            away_id: basic.away.id?,
            home_goals,
            away_goals,
            kind: final_kind(game),
        })
    }

    pub fn home_won(&self) -> bool {
        self.home_goals > self.away_goals
    }

    /// Signed from the home side.
    pub fn goal_diff(&self) -> i32 {
        self.home_goals - self.away_goals
    }
}

pub fn parse_game_basic(game: &Value) -> GameBasic {
    let home = game.get("homeTeam").map(parse_team).unwrap_or_default();
    let away = game.get("awayTeam").map(parse_team).unwrap_or_default();
    GameBasic {
        game_id: pick_u64(game, GAME_ID_KEYS),
        date: pick_string(game, GAME_DATE_KEYS).and_then(|s| parse_day(&s)),
        state: pick_string(game, GAME_STATE_KEYS).unwrap_or_default(),
        home,
        away,
    }
}

fn parse_team(value: &Value) -> TeamRef {
    TeamRef {
        id: pick_u32(value, &["id"]),
        name: pick_string(value, TEAM_NAME_KEYS),
        abbrev: pick_string(value, TEAM_ABBREV_KEYS),
        score: pick_i64(value, &["score"]).and_then(|s| i32::try_from(s).ok()),
    }
}

pub fn is_final(game: &Value) -> bool {
    let state = pick_string(game, GAME_STATE_KEYS)
        .unwrap_or_default()
        .to_uppercase();
    FINAL_STATES.contains(&state.as_str()) || state.contains("FINAL")
}

/// Regulation unless the payload says otherwise.
pub fn final_kind(game: &Value) -> FinishKind {
    let hint = game
        .get("gameOutcome")
        .and_then(|o| o.get("lastPeriodType"))
        .and_then(Value::as_str)
        .or_else(|| {
            game.get("periodDescriptor")
                .and_then(|p| p.get("periodType"))
                .and_then(Value::as_str)
        });
    match hint.map(str::to_uppercase) {
        Some(h) if h.contains("SO") => FinishKind::Shootout,
        Some(h) if h.contains("OT") => FinishKind::Overtime,
        _ => FinishKind::Regulation,
    }
}

pub fn final_score(game: &Value) -> Option<(i32, i32)> {
    let home = pick_i64(game.get("homeTeam")?, &["score"])?;
    let away = pick_i64(game.get("awayTeam")?, &["score"])?;
    Some((i32::try_from(home).ok()?, i32::try_from(away).ok()?))
}

pub fn week_days(payload: &Value) -> Vec<(NaiveDate, Vec<Value>)> {
    let Some(days) = payload.get("gameWeek").and_then(Value::as_array) else {
        return Vec::new();
    };
    days.iter()
        .filter_map(|d| {
            let day = d.get("date").and_then(Value::as_str).and_then(parse_day)?;
            let games = d
                .get("games")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            Some((day, games))
        })
        .collect()
}

pub fn schedule_games_for_date(payload: &Value, day: NaiveDate) -> Vec<Value> {
    week_days(payload)
        .into_iter()
        .filter(|(d, _)| *d == day)
        .flat_map(|(_, games)| games)
        .collect()
}

pub fn score_games(payload: &Value) -> Vec<Value> {
    payload
        .get("games")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderRow {
    pub player_id: u64,
    pub team_abbrev: String,
    pub save_pctg: f64,
    pub games_played: u32,
}

pub fn goalie_leader_rows(payload: &Value) -> Vec<LeaderRow> {
    let rows = LEADER_ROW_KEYS
        .iter()
        .find_map(|k| payload.get(*k))
        .map(flatten_rows)
        .unwrap_or_else(|| category_rows(payload));
    rows.iter().filter_map(parse_leader_row).collect()
}

// Rows may arrive as a list, or as a map of category -> list.
fn flatten_rows(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map
            .values()
            .filter_map(Value::as_array)
            .flat_map(|items| items.iter().cloned())
            .collect(),
        _ => Vec::new(),
    }
}

// The live endpoint keys its lists by category at the top level.
fn category_rows(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Object(_) => flatten_rows(payload),
        _ => Vec::new(),
    }
}

fn parse_leader_row(row: &Value) -> Option<LeaderRow> {
    Some(LeaderRow {
        player_id: pick_u64(row, LEADER_ID_KEYS)?,
        team_abbrev: pick_string(row, LEADER_TEAM_KEYS)?,
        save_pctg: pick_f64(row, LEADER_SV_KEYS)?,
        games_played: pick_u32(row, LEADER_GP_KEYS).unwrap_or(0),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalieLine {
    pub player_id: u64,
    pub starter: Option<bool>,
    pub toi: Option<String>,
    pub shots_against: Option<i64>,
    pub goals_against: Option<i64>,
}

pub fn boxscore_goalies(boxscore: &Value, side: TeamSide) -> Option<Vec<GoalieLine>> {
    let list = boxscore
        .get("playerByGameStats")?
        .get(side.boxscore_key())?
        .get("goalies")?
        .as_array()?;
    Some(
        list.iter()
            .filter_map(|g| {
                Some(GoalieLine {
                    player_id: pick_u64(g, &["playerId"])?,
                    starter: g.get("starter").and_then(Value::as_bool),
                    toi: pick_string(g, GOALIE_TOI_KEYS),
                    shots_against: pick_i64(g, GOALIE_SHOTS_KEYS),
                    goals_against: pick_i64(g, GOALIE_GOALS_KEYS),
                })
            })
            .collect(),
    )
}

/// `"mm:ss"` to fractional minutes.
pub fn toi_minutes(raw: &str) -> Option<f64> {
    let (mm, ss) = raw.trim().split_once(':')?;
    let mm = mm.trim().parse::<u32>().ok()?;
    let ss = ss.trim().parse::<u32>().ok()?;
    Some(mm as f64 + ss as f64 / 60.0)
}

pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .find_map(as_string)
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        // Localised names: {"default": "Boston"}
        Value::Object(map) => map.get("default").and_then(as_string),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn pick_i64(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().filter_map(|k| value.get(*k)).find_map(|v| {
        v.as_i64()
            .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
    })
}

fn pick_u64(value: &Value, keys: &[&str]) -> Option<u64> {
    pick_i64(value, keys).and_then(|n| u64::try_from(n).ok())
}

fn pick_u32(value: &Value, keys: &[&str]) -> Option<u32> {
    pick_i64(value, keys).and_then(|n| u32::try_from(n).ok())
}

fn pick_f64(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| value.get(*k)).find_map(|v| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
            .filter(|f| f.is_finite())
    })
}
