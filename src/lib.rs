pub mod annotations;
pub mod collector;
pub mod config;
pub mod error;
pub mod fake_feed;
pub mod html;
pub mod http_client;
pub mod market_value;
pub mod player_cache;
pub mod service;
pub mod state;
