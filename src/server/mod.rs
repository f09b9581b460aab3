//! HTTP server: index page, MJPEG stream, snapshot and stats

pub mod config;
mod listener;
pub mod mjpeg;
mod page;
mod routes;

pub use config::ServerConfig;
pub use listener::StreamServer;
pub use routes::{SNAPSHOT_PATH, STATS_PATH};
