pub mod boxscore_cache;
pub mod config;
pub mod elo;
pub mod form;
pub mod goalies;
pub mod home_advantage;
pub mod http_client;
pub mod logging;
pub mod model_params;
pub mod nhl_api;
pub mod picks;
pub mod rating_store;
pub mod rebuild;
pub mod run;
pub mod schema;
pub mod source;
