use std::env;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::nhl_api::DEFAULT_BASE_URL;

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub state_path: PathBuf,
    pub boxscore_cache_path: PathBuf,
    pub picks_path: PathBuf,
    pub days: usize,
    pub today: Option<NaiveDate>,
    pub fallback_to_previous: bool,
    pub goalie_notes: bool,
    pub model_params_path: Option<PathBuf>,
    pub api_base: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("docs/data/state.json"),
            boxscore_cache_path: PathBuf::from("docs/data/boxscore_cache.json"),
            picks_path: PathBuf::from("docs/data/picks.json"),
            days: 8,
            today: None,
            fallback_to_previous: true,
            goalie_notes: false,
            model_params_path: None,
            api_base: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl RunConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            state_path: opt_env("PICKS_STATE_PATH").map(PathBuf::from).unwrap_or(d.state_path),
            boxscore_cache_path: opt_env("PICKS_BOXSCORE_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(d.boxscore_cache_path),
            picks_path: opt_env("PICKS_OUTPUT_PATH").map(PathBuf::from).unwrap_or(d.picks_path),
            days: opt_env("PICKS_DAYS")
                .and_then(|val| val.trim().parse::<usize>().ok())
                .unwrap_or(d.days)
                .clamp(1, 14),
            today: opt_env("PICKS_TODAY").and_then(|val| parse_date(&val)),
            fallback_to_previous: opt_env("PICKS_FALLBACK_TO_PREVIOUS")
                .map(|val| parse_flag(&val))
                .unwrap_or(d.fallback_to_previous),
            goalie_notes: opt_env("PICKS_GOALIE_NOTES")
                .map(|val| parse_flag(&val))
                .unwrap_or(d.goalie_notes),
            model_params_path: opt_env("PICKS_MODEL_PARAMS").map(PathBuf::from),
            api_base: opt_env("NHL_API_BASE").unwrap_or(d.api_base),
        }
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|val| {
        if val.trim().is_empty() {
            None
        } else {
            Some(val)
        }
    })
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
