use anyhow::Result;
use chrono::Utc;
use tracing::info;

use rink_picks::config::RunConfig;
use rink_picks::logging::init_logging;
use rink_picks::model_params::ModelParams;
use rink_picks::nhl_api::NhlClient;
use rink_picks::run::{RunReport, run_batch};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_logging();

    let cfg = RunConfig::from_env();
    let params = ModelParams::load_or_default(cfg.model_params_path.as_deref());
    let client = NhlClient::new(&cfg.api_base);

    match run_batch(&cfg, &params, &client, Utc::now())? {
        RunReport::Written { path, dates, status } => {
            info!(%status, "done");
            println!("Wrote {} with {} days", path.display(), dates);
        }
        RunReport::KeptPrevious { reason } => {
            println!("WARN: rebuild failed ({reason}); keeping previous picks");
        }
    }
    Ok(())
}
