use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::{Duration as ChronoDuration, NaiveDate};
use serde_json::Value;
use tracing::debug;

use crate::http_client::{RetryPolicy, get_json_with_retry, http_client};
use crate::schema::{parse_game_basic, schedule_games_for_date, score_games, week_days};
use crate::source::GameSource;

pub const DEFAULT_BASE_URL: &str = "https://api-web.nhle.com/v1";

pub const MAX_RANGE_PAGES: usize = 200;

const PAGE_PAUSE_MS: u64 = 150;

#[derive(Debug, Clone)]
pub struct NhlClient {
    base_url: String,
    policy: RetryPolicy,
    page_pause: Duration,
}

impl Default for NhlClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl NhlClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            policy: RetryPolicy::default(),
            page_pause: Duration::from_millis(PAGE_PAUSE_MS),
        }
    }

    fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let client = http_client()?;
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(%url, "GET");
        get_json_with_retry(client, &url, query, &self.policy)
    }
}

impl GameSource for NhlClient {
    fn schedule_for_date(&self, day: NaiveDate) -> Result<Vec<Value>> {
        let payload = self.get(&format!("schedule/{day}"), &[])?;
        Ok(schedule_games_for_date(&payload, day))
    }

    fn scores_for_date(&self, day: NaiveDate) -> Result<Vec<Value>> {
        let payload = self.get(&format!("score/{day}"), &[])?;
        Ok(score_games(&payload))
    }

    fn games_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Value>> {
        collect_weekly_games(start, end, |cur| {
            let payload = self.get(&format!("schedule/{cur}"), &[])?;
            thread::sleep(self.page_pause);
            Ok(payload)
        })
    }

    fn boxscore(&self, game_id: u64) -> Result<Value> {
        self.get(&format!("gamecenter/{game_id}/boxscore"), &[])
    }

    fn goalie_leaders(&self) -> Result<Value> {
        self.get(
            "goalie-stats-leaders/current",
            &[("categories", "savePctg,gamesPlayed"), ("limit", "-1")],
        )
    }
}

/// Walks weekly schedule pages from `start` until `end` is covered, keeping
/// each game id once. Fails rather than return a partial range when the page
/// budget runs out.
pub fn collect_weekly_games<F>(start: NaiveDate, end: NaiveDate, mut fetch_week: F) -> Result<Vec<Value>>
where
    F: FnMut(NaiveDate) -> Result<Value>,
{
    let mut out = Vec::new();
    let mut seen: HashSet<u64> = HashSet::new();
    let mut cur = start;

    for _ in 0..MAX_RANGE_PAGES {
        if cur > end {
            return Ok(out);
        }
        let payload = fetch_week(cur)?;
        let days = week_days(&payload);
        let Some(max_day) = days.iter().map(|(d, _)| *d).max() else {
            cur += ChronoDuration::days(7);
            continue;
        };

        for (day, games) in days {
            if day < start || day > end {
                continue;
            }
            for game in games {
                let Some(id) = parse_game_basic(&game).game_id else {
                    continue;
                };
                if seen.insert(id) {
                    out.push(game);
                }
            }
        }
        cur = max_day.max(cur) + ChronoDuration::days(1);
    }

    if cur > end {
        return Ok(out);
    }
    bail!("schedule range {start}..={end} needs more than {MAX_RANGE_PAGES} pages")
}
