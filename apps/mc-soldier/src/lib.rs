//! Soldier-side pieces that talk to the commander over HTTP.

pub mod auth_client;

pub use auth_client::HttpExchange;
