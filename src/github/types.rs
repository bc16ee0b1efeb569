// GitHub API response types and the records built from them.
// API structs are lenient: every field has a default so partial payloads parse.

use serde::{Deserialize, Serialize};

/// Repository payload from `/repos/{owner}/{repo}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RepositoryResponse {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub watchers_count: u64,
    pub open_issues_count: u64,
    pub language: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub pushed_at: Option<String>,
    pub default_branch: Option<String>,
    pub size: u64,
    pub archived: bool,
    pub private: bool,
}

/// Entry from `/repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommitResponse {
    pub sha: String,
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommitDetail {
    pub message: String,
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommitAuthor {
    pub name: String,
    pub date: String,
}

/// Payload from `/repos/{owner}/{repo}/releases/latest`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReleaseResponse {
    pub tag_name: String,
    pub name: Option<String>,
    pub published_at: Option<String>,
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_count: u64,
}

/// Entry from `/users/{owner}/packages/{type}/{name}/versions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageVersion {
    pub id: u64,
    pub name: String,
    pub created_at: String,
    pub download_count: Option<u64>,
    pub package_file: Option<PackageFile>,
}

impl PackageVersion {
    /// Download count from whichever field the registry populated.
    pub fn downloads(&self) -> u64 {
        self.download_count
            .filter(|&d| d > 0)
            .or_else(|| self.package_file.as_ref().and_then(|f| f.download_count))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageFile {
    pub download_count: Option<u64>,
}

/// Latest commit summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastCommit {
    /// Abbreviated (7 character) SHA.
    pub sha: String,
    /// First line of the commit message.
    pub message: String,
    pub date: String,
    pub author: String,
}

/// Consolidated statistics for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepoStats {
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub open_issues: u64,
    pub language: String,
    pub created_at: String,
    pub updated_at: String,
    pub pushed_at: String,
    pub default_branch: String,
    pub size: u64,
    pub archived: bool,
    pub private: bool,
    pub contributors_count: u64,
    pub last_commit: Option<LastCommit>,
    pub latest_version: Option<String>,
    pub release_name: Option<String>,
    pub release_date: Option<String>,
    pub release_downloads: u64,
}

impl From<RepositoryResponse> for RepoStats {
    fn from(repo: RepositoryResponse) -> Self {
        Self {
            name: repo.name,
            full_name: repo.full_name,
            description: repo.description.unwrap_or_default(),
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            watchers: repo.watchers_count,
            open_issues: repo.open_issues_count,
            language: repo.language.unwrap_or_else(|| "N/A".to_string()),
            created_at: repo.created_at.unwrap_or_default(),
            updated_at: repo.updated_at.unwrap_or_default(),
            pushed_at: repo.pushed_at.unwrap_or_default(),
            default_branch: repo.default_branch.unwrap_or_else(|| "main".to_string()),
            size: repo.size,
            archived: repo.archived,
            private: repo.private,
            ..Self::default()
        }
    }
}

/// Result of fetching one repository inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoOutcome {
    Fetched(Box<RepoStats>),
    Failed { error: String },
}

impl RepoOutcome {
    pub fn stats(&self) -> Option<&RepoStats> {
        match self {
            RepoOutcome::Fetched(stats) => Some(stats.as_ref()),
            RepoOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RepoOutcome::Fetched(_) => None,
            RepoOutcome::Failed { error } => Some(error),
        }
    }
}

/// A GitHub Packages package to track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub owner: String,
    pub name: String,
    /// container, npm, maven, nuget, rubygems
    pub package_type: String,
}

impl PackageSpec {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        package_type: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            package_type: package_type.into(),
        }
    }

    /// Identifier used in batch results: `owner/name`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn is_container(&self) -> bool {
        self.package_type.eq_ignore_ascii_case("container")
    }
}

/// Download statistics for one package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageDownloads {
    pub total_downloads: u64,
    pub latest_version: Option<String>,
    pub latest_version_downloads: u64,
    pub version_count: usize,
    /// Set when the figure is missing or a best-effort source came up empty.
    pub error: Option<String>,
}

impl PackageDownloads {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Rate limit information from response headers.
#[derive(Debug, Clone)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    /// Reset time as a Unix timestamp.
    pub reset: u64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            limit: 5000,
            remaining: 5000,
            reset: 0,
        }
    }
}
