// ghstats library.
// Fetches GitHub repository, package and donation stats and rotates them on a display.

pub mod app;
pub mod cache;
pub mod config;
pub mod display;
pub mod donations;
pub mod error;
pub mod github;
pub mod logging;
pub mod metrics;
pub mod scrape;

pub use app::App;
pub use config::Config;
pub use error::{Result, StatsError};
