// GitHub API module.
// Provides the client, fetchers and types for the GitHub REST API.

pub mod client;
pub mod packages;
pub mod repos;
pub mod types;

pub use client::GitHubClient;
pub use packages::PackageFetcher;
pub use repos::RepoFetcher;
pub use types::*;
