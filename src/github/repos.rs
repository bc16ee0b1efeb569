// Repository statistics fetcher.
// Combines repo, contributors, commits and release endpoints into one record.

use std::time::Duration;

use crate::config::split_owner_name;
use crate::error::Result;

use super::client::GitHubClient;
use super::types::{
    CommitResponse, LastCommit, ReleaseResponse, RepoOutcome, RepoStats, RepositoryResponse,
};

/// Pause between repositories in a batch.
pub const BATCH_DELAY: Duration = Duration::from_millis(100);

/// Fetches consolidated per-repository statistics.
pub struct RepoFetcher {
    client: GitHubClient,
}

impl RepoFetcher {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    /// Get comprehensive statistics for one repository.
    ///
    /// Only the base repository call can fail the whole record; contributor,
    /// commit and release lookups fall back to empty values.
    pub async fn get_repo_stats(&mut self, owner: &str, repo: &str) -> Result<RepoStats> {
        let info: RepositoryResponse = self
            .client
            .get_json(&format!("/repos/{}/{}", owner, repo), true)
            .await?;
        let mut stats = RepoStats::from(info);

        stats.contributors_count = self.contributors_count(owner, repo).await;
        stats.last_commit = self.latest_commit(owner, repo).await;

        // Releases skip the cache so download counts stay fresh.
        match self
            .client
            .get_json::<ReleaseResponse>(&format!("/repos/{}/{}/releases/latest", owner, repo), false)
            .await
        {
            Ok(release) => {
                stats.release_downloads = release.assets.iter().map(|a| a.download_count).sum();
                if !release.assets.is_empty() {
                    let asset_info: Vec<String> = release
                        .assets
                        .iter()
                        .map(|a| format!("{}: {}", a.name, a.download_count))
                        .collect();
                    tracing::debug!(
                        "Latest release '{}' assets: {}",
                        release.tag_name,
                        asset_info.join(", ")
                    );
                }
                stats.latest_version = Some(release.tag_name);
                stats.release_name = release.name;
                stats.release_date = release.published_at;
            }
            Err(e) => {
                tracing::debug!("No latest release for {}/{}: {}", owner, repo, e);
                stats.latest_version = None;
                stats.release_downloads = 0;
            }
        }

        Ok(stats)
    }

    async fn contributors_count(&mut self, owner: &str, repo: &str) -> u64 {
        match self
            .client
            .get_value(&format!("/repos/{}/{}/contributors", owner, repo), true)
            .await
        {
            Ok(serde_json::Value::Array(contributors)) => contributors.len() as u64,
            Ok(_) => 0,
            Err(e) => {
                tracing::debug!("Contributors lookup failed for {}/{}: {}", owner, repo, e);
                0
            }
        }
    }

    async fn latest_commit(&mut self, owner: &str, repo: &str) -> Option<LastCommit> {
        let commits: Vec<CommitResponse> = match self
            .client
            .get_json(&format!("/repos/{}/{}/commits?per_page=1", owner, repo), true)
            .await
        {
            Ok(commits) => commits,
            Err(e) => {
                tracing::debug!("Commit lookup failed for {}/{}: {}", owner, repo, e);
                return None;
            }
        };

        let latest = commits.into_iter().next()?;
        let author = latest.commit.author.unwrap_or_default();
        Some(LastCommit {
            sha: latest.sha.chars().take(7).collect(),
            message: latest
                .commit
                .message
                .lines()
                .next()
                .unwrap_or_default()
                .to_string(),
            date: author.date,
            author: author.name,
        })
    }

    /// Fetch a list of `owner/name` repositories sequentially.
    ///
    /// Malformed identifiers are skipped. A failing repository is recorded as
    /// [`RepoOutcome::Failed`] and the batch continues.
    pub async fn get_multiple_repos(&mut self, repositories: &[String]) -> Vec<(String, RepoOutcome)> {
        let mut results = Vec::with_capacity(repositories.len());

        for (i, repo_path) in repositories.iter().enumerate() {
            let Some((owner, repo)) = split_owner_name(repo_path) else {
                tracing::warn!("Skipping malformed repository '{}'", repo_path);
                continue;
            };

            if i > 0 {
                tokio::time::sleep(BATCH_DELAY).await;
            }

            let outcome = match self.get_repo_stats(owner, repo).await {
                Ok(stats) => RepoOutcome::Fetched(Box::new(stats)),
                Err(e) => {
                    tracing::warn!("Failed to fetch {}: {}", repo_path, e);
                    RepoOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            results.push((repo_path.clone(), outcome));
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::cache::TtlCache;

    fn fetcher_for(server: &MockServer) -> RepoFetcher {
        let client =
            GitHubClient::new("t", server.uri(), Arc::new(TtlCache::disabled()), "api_").unwrap();
        RepoFetcher::new(client)
    }

    async fn mount_repo(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/repos/octocat/Hello-World"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Hello-World",
                "full_name": "octocat/Hello-World",
                "description": null,
                "stargazers_count": 1000,
                "forks_count": 50,
                "watchers_count": 1000,
                "open_issues_count": 3,
                "language": "Rust",
                "pushed_at": "2026-10-12T08:00:00Z",
                "updated_at": "2026-10-12T09:00:00Z",
                "size": 12,
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_full_record() {
        let server = MockServer::start().await;
        mount_repo(&server).await;
        Mock::given(path("/repos/octocat/Hello-World/contributors"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}, {}, {}])))
            .mount(&server)
            .await;
        Mock::given(path("/repos/octocat/Hello-World/commits"))
            .and(query_param("per_page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "sha": "7fd1a60b01f91b314f59955a4e4d4e80d8edf11d",
                "commit": {
                    "message": "Merge pull request #6\n\nlong body",
                    "author": {"name": "The Octocat", "date": "2026-10-12T08:00:00Z"}
                }
            }])))
            .mount(&server)
            .await;
        Mock::given(path("/repos/octocat/Hello-World/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tag_name": "v1.2.0",
                "name": "Spring",
                "published_at": "2026-10-01T00:00:00Z",
                "assets": [
                    {"name": "a.tar.gz", "download_count": 10},
                    {"name": "b.zip", "download_count": 5}
                ]
            })))
            .mount(&server)
            .await;

        let mut fetcher = fetcher_for(&server);
        let stats = fetcher.get_repo_stats("octocat", "Hello-World").await.unwrap();

        assert_eq!(stats.stars, 1000);
        assert_eq!(stats.forks, 50);
        assert_eq!(stats.open_issues, 3);
        assert_eq!(stats.description, "");
        assert_eq!(stats.default_branch, "main");
        assert_eq!(stats.contributors_count, 3);
        let commit = stats.last_commit.unwrap();
        assert_eq!(commit.sha, "7fd1a60");
        assert_eq!(commit.message, "Merge pull request #6");
        assert_eq!(commit.author, "The Octocat");
        assert_eq!(stats.latest_version.as_deref(), Some("v1.2.0"));
        assert_eq!(stats.release_downloads, 15);
    }

    #[tokio::test]
    async fn test_secondary_failures_are_swallowed() {
        let server = MockServer::start().await;
        mount_repo(&server).await;
        // Contributors, commits and releases are unmocked and return 404.

        let mut fetcher = fetcher_for(&server);
        let stats = fetcher.get_repo_stats("octocat", "Hello-World").await.unwrap();

        assert_eq!(stats.contributors_count, 0);
        assert_eq!(stats.last_commit, None);
        assert_eq!(stats.latest_version, None);
        assert_eq!(stats.release_downloads, 0);
    }

    #[tokio::test]
    async fn test_base_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(path("/repos/octocat/gone"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut fetcher = fetcher_for(&server);
        assert!(fetcher.get_repo_stats("octocat", "gone").await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_identifiers_are_skipped() {
        let server = MockServer::start().await;
        let mut fetcher = fetcher_for(&server);

        let results = fetcher
            .get_multiple_repos(&["nope".to_string(), "a/b/c".to_string()])
            .await;
        assert!(results.is_empty());
    }
}
