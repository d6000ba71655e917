use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde_json::json;

use rink_picks::boxscore_cache::BoxscoreCache;
use rink_picks::goalies::{
    parse_goalie_leaders, probable_goalie, recent_starts, team_goalie_adjustment,
};
use rink_picks::model_params::GoalieParams;
use rink_picks::source::{GameSource, SnapshotSource};

const BOS_GOALIE: u64 = 8480280;
const BOS: u32 = 6;

fn snapshot() -> SnapshotSource {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("snapshot.json");
    let raw = fs::read_to_string(path).expect("snapshot fixture should be readable");
    SnapshotSource::from_json(&raw).expect("snapshot fixture should parse")
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 11, 29).unwrap()
}

#[test]
fn scan_sums_recent_starts_from_boxscores() {
    let source = snapshot();
    let mut cache = BoxscoreCache::in_memory();
    let cfg = GoalieParams::default();

    let recent = recent_starts(BOS_GOALIE, BOS, today(), &mut cache, &source, &cfg);
    // Only the last four game days carry boxscores in the snapshot.
    assert_eq!(recent.starts, 4);
    assert_eq!(recent.shots, 122);
    assert_eq!(recent.saves, 113);
    assert_eq!(cache.new_fetches(), 4);
    assert!(source.boxscore_fetches() > 4);
}

#[test]
fn fetch_cap_stops_the_scan_early() {
    let source = snapshot();
    let mut cache = BoxscoreCache::in_memory();
    let cfg = GoalieParams {
        max_new_boxscores_per_run: 2,
        ..GoalieParams::default()
    };

    let recent = recent_starts(BOS_GOALIE, BOS, today(), &mut cache, &source, &cfg);
    assert_eq!(recent.starts, 2);
    assert_eq!(recent.shots, 61);
    assert_eq!(recent.saves, 60);
    assert_eq!(source.boxscore_fetches(), 2);
}

#[test]
fn cached_boxscores_do_not_count_against_the_cap() {
    let source = snapshot();
    let mut cache = BoxscoreCache::in_memory();
    for id in [2024020044_u64, 2024020046, 2024020048, 2024020050] {
        cache.insert(id, source.boxscore(id).unwrap());
    }
    let before = source.boxscore_fetches();
    let cfg = GoalieParams {
        max_new_boxscores_per_run: 0,
        ..GoalieParams::default()
    };

    let recent = recent_starts(BOS_GOALIE, BOS, today(), &mut cache, &source, &cfg);
    assert_eq!(recent.starts, 4);
    assert_eq!(cache.new_fetches(), 0);
    assert_eq!(source.boxscore_fetches(), before);
}

#[test]
fn lookback_window_bounds_the_scan() {
    let source = snapshot();
    let mut cache = BoxscoreCache::in_memory();
    let cfg = GoalieParams {
        lookback_days: 3,
        ..GoalieParams::default()
    };

    let recent = recent_starts(BOS_GOALIE, BOS, today(), &mut cache, &source, &cfg);
    assert_eq!(recent.starts, 1);
    assert_eq!(recent.shots, 29);
}

#[test]
fn relief_appearance_is_not_a_start() {
    let game = json!({
        "id": 9, "gameDate": "2024-11-28", "gameState": "OFF",
        "homeTeam": {"id": BOS, "score": 2}, "awayTeam": {"id": 10, "score": 5}
    });
    let boxscore = json!({
        "playerByGameStats": {
            "homeTeam": {"goalies": [
                {"playerId": 1, "toi": "40:00", "shotsAgainst": 20, "goalsAgainst": 5},
                {"playerId": BOS_GOALIE, "toi": "20:00", "shotsAgainst": 8, "goalsAgainst": 0}
            ]},
            "awayTeam": {"goalies": []}
        }
    });
    let source = SnapshotSource::new(vec![game]).with_boxscore(9, boxscore);
    let mut cache = BoxscoreCache::in_memory();
    let cfg = GoalieParams {
        lookback_days: 2,
        ..GoalieParams::default()
    };

    let relief = recent_starts(BOS_GOALIE, BOS, today(), &mut cache, &source, &cfg);
    assert_eq!(relief.starts, 0);
    assert_eq!(relief.save_pctg(), None);

    let starter = recent_starts(1, BOS, today(), &mut cache, &source, &cfg);
    assert_eq!(starter.starts, 1);
    assert_eq!(starter.saves, 15);
}

#[test]
fn team_adjustment_uses_leaderboard_and_recent_form() {
    let source = snapshot();
    let profiles = parse_goalie_leaders(&source.goalie_leaders().unwrap());
    assert_eq!(profiles.len(), 4);
    assert_eq!(
        probable_goalie("bos", &profiles).map(|g| g.player_id),
        Some(BOS_GOALIE)
    );

    let cfg = GoalieParams::default();
    let mut cache = BoxscoreCache::in_memory();
    let adj = team_goalie_adjustment(BOS, "BOS", None, today(), &profiles, &mut cache, &source, &cfg)
        .expect("boston has a goalie");
    assert_eq!(adj.player_id, BOS_GOALIE);
    assert!(!adj.confirmed);
    assert_eq!(adj.recent_starts, 4);
    let sv = adj.recent_sv.unwrap();
    assert!((sv - 113.0 / 122.0).abs() < 1e-12);
    let expected = ((sv - 0.905) / 0.010 * 10.0).clamp(-25.0, 25.0);
    assert!((adj.points - expected).abs() < 1e-9);
}

#[test]
fn unknown_team_has_no_adjustment() {
    let source = snapshot();
    let profiles = parse_goalie_leaders(&source.goalie_leaders().unwrap());
    let mut cache = BoxscoreCache::in_memory();
    let adj = team_goalie_adjustment(
        99,
        "XXX",
        None,
        today(),
        &profiles,
        &mut cache,
        &source,
        &GoalieParams::default(),
    );
    assert!(adj.is_none());
}

#[test]
fn confirmed_starter_overrides_probable_goalie() {
    let source = snapshot();
    let profiles = parse_goalie_leaders(&source.goalie_leaders().unwrap());
    let cfg = GoalieParams::default();
    let mut cache = BoxscoreCache::in_memory();

    // Backup with no leaderboard row and no recent starts: neutral points.
    let adj = team_goalie_adjustment(
        BOS,
        "BOS",
        Some(8470000),
        today(),
        &profiles,
        &mut cache,
        &source,
        &cfg,
    )
    .expect("a named starter always yields an adjustment");
    assert_eq!(adj.player_id, 8470000);
    assert!(adj.confirmed);
    assert_eq!(adj.recent_starts, 0);
    assert_eq!(adj.points, 0.0);
}
