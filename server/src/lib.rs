pub mod auth;
pub mod certificates;
pub mod checkin;
pub mod config;
pub mod handlers;
pub mod mail;
pub mod models;
pub mod pdf;
pub mod routes;
pub mod state;
pub mod store;
pub mod tickets;
pub mod utils;

pub use config::Config;
pub use state::AppState;
