// Error types for ghstats.
// Covers GitHub/HTTP failures, cache and config IO, and display errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("HTTP request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("github_token is required in the config file (or set GITHUB_TOKEN)")]
    MissingToken,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(
        "Config not found; created {} from the example template. Edit it with your GitHub token and repositories.",
        .0.display()
    )]
    ConfigCreated(PathBuf),

    #[error("Display error: {0}")]
    Display(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, StatsError>;
