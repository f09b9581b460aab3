//! Live object detection with an MJPEG stream and spoken summaries
//!
//! A camera feeds a frame pipeline that runs an object detector on a subset
//! of frames, draws the results, and publishes JPEG frames to any number of
//! HTTP clients. A separate announcer periodically reads and clears the set
//! of currently visible objects and speaks a summary like
//! `"2 person, 1 chair"`.
//!
//! ```no_run
//! use seesay::{config::AppConfig, service};
//!
//! # async fn example() -> seesay::Result<()> {
//! let config = AppConfig::load(None)?;
//! service::run_until(config, async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await
//! # }
//! ```

pub mod announce;
pub mod camera;
pub mod config;
pub mod detect;
pub mod error;
pub mod pipeline;
pub mod publish;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod speech;
pub mod state;
pub mod stats;

pub use error::{Error, Result};
