use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

use rink_picks::boxscore_cache::BoxscoreCache;
use rink_picks::config::parse_date;
use rink_picks::logging::init_logging;
use rink_picks::model_params::ModelParams;
use rink_picks::rating_store::RatingStore;
use rink_picks::run::build_picks;
use rink_picks::source::SnapshotSource;

// Offline run over a recorded snapshot: no network, no files written.
fn main() -> Result<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/snapshot.json"));
    let today = match args.next() {
        Some(raw) => parse_date(&raw).context("date must be YYYY-MM-DD")?,
        None => Utc::now().date_naive(),
    };
    let params_path = std::env::var("PICKS_MODEL_PARAMS").ok().map(PathBuf::from);
    let params = ModelParams::load_or_default(params_path.as_deref());

    let source = SnapshotSource::from_file(&path)?;
    let mut store = RatingStore::in_memory();
    let mut cache = BoxscoreCache::in_memory();
    let (file, status) = build_picks(
        today,
        1,
        &mut store,
        &mut cache,
        &source,
        &params,
        true,
        Utc::now(),
    )?;

    println!("Ratings: {status}");
    for (day, entry) in &file.by_date {
        println!("{day}");
        if entry.picks.is_empty() {
            println!("  no games");
        }
        for pick in &entry.picks {
            println!(
                "  {} @ {}: {} {:.1}%",
                pick.away_name,
                pick.home_name,
                pick.pick_name,
                pick.win_prob * 100.0
            );
            println!(
                "    base {:.1}% | home {:+.1} pp | form {:+.1} pp | rest {:+.1} pp",
                pick.why.base * 100.0,
                pick.why.home_ice_pp,
                pick.why.form_pp,
                pick.why.fatigue_pp
            );
            println!("    {}", pick.factors);
            for note in [&pick.goalie_home, &pick.goalie_away].into_iter().flatten() {
                println!("    goalie: {note}");
            }
        }
    }
    Ok(())
}
