use std::collections::BTreeMap;

use chrono::NaiveDate;
use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::Value;
use std::hint::black_box;

use rink_picks::form::compute_form_and_rest;
use rink_picks::model_params::ModelParams;
use rink_picks::picks::{PickContext, pick_for_game, rank_picks};
use rink_picks::rating_store::SeasonState;
use rink_picks::rebuild::replay_games;
use rink_picks::schema::{GameOutcome, parse_game_basic};

fn snapshot_games() -> Vec<Value> {
    let raw: Value = serde_json::from_str(SNAPSHOT_JSON).expect("valid fixture json");
    raw.get("games")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn outcomes() -> Vec<GameOutcome> {
    snapshot_games()
        .iter()
        .filter_map(GameOutcome::from_game)
        .collect()
}

fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn bench_outcome_parse(c: &mut Criterion) {
    let games = snapshot_games();
    c.bench_function("outcome_parse", |b| {
        b.iter(|| {
            let n = black_box(&games)
                .iter()
                .filter_map(GameOutcome::from_game)
                .count();
            black_box(n);
        })
    });
}

fn bench_season_replay(c: &mut Criterion) {
    let params = ModelParams::default();
    let games = outcomes();
    c.bench_function("season_replay", |b| {
        b.iter(|| {
            let mut state = SeasonState::default();
            let logs = replay_games(&mut state, black_box(&games), day(10, 1), &params);
            black_box((state.ratings.len(), logs.len()));
        })
    });
}

fn bench_form_and_picks(c: &mut Criterion) {
    let params = ModelParams::default();
    let mut state = SeasonState::default();
    let logs = replay_games(&mut state, &outcomes(), day(10, 1), &params);
    let upcoming: Vec<_> = snapshot_games()
        .iter()
        .map(parse_game_basic)
        .filter(|g| g.state == "FUT")
        .collect();

    c.bench_function("form_summary", |b| {
        b.iter(|| {
            let form = compute_form_and_rest(day(11, 30), black_box(&logs), &params.form);
            black_box(form.len());
        })
    });

    let form = compute_form_and_rest(day(11, 30), &logs, &params.form);
    let empty = BTreeMap::new();
    let ctx = PickContext {
        ratings: &state.ratings,
        form: &form,
        home_model: &state.home_model,
        params: &params,
    };
    let cold = PickContext {
        form: &empty,
        ..ctx
    };
    c.bench_function("pick_ranking", |b| {
        b.iter(|| {
            let picks: Vec<_> = black_box(&upcoming)
                .iter()
                .flat_map(|g| [pick_for_game(g, &ctx), pick_for_game(g, &cold)])
                .flatten()
                .collect();
            black_box(rank_picks(picks, params.picks.per_day).len());
        })
    });
}

criterion_group!(
    perf,
    bench_outcome_parse,
    bench_season_replay,
    bench_form_and_picks
);
criterion_main!(perf);

static SNAPSHOT_JSON: &str = include_str!("../tests/fixtures/snapshot.json");
