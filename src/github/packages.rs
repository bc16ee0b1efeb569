// GitHub Packages download statistics.
// Sums per-version download counts, scraping the package page for containers.

use crate::error::Result;
use crate::scrape::{self, PageFetcher};

use super::client::GitHubClient;
use super::repos::BATCH_DELAY;
use super::types::{PackageDownloads, PackageSpec, PackageVersion};

/// Fetches download counts for GitHub Packages.
pub struct PackageFetcher {
    client: GitHubClient,
    pages: Option<PageFetcher>,
    web_base: String,
}

impl PackageFetcher {
    /// `pages` is the container page scraper; `None` disables scraping.
    pub fn new(client: GitHubClient, pages: Option<PageFetcher>, web_base: impl Into<String>) -> Self {
        Self {
            client,
            pages,
            web_base: web_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn package_endpoint(owner: &str, name: &str, package_type: &str) -> String {
        format!("/users/{}/packages/{}/{}", owner, package_type, name)
    }

    /// Public page of a container package.
    pub fn container_page_url(&self, owner: &str, name: &str) -> String {
        format!(
            "{}/users/{}/packages/container/package/{}",
            self.web_base, owner, name
        )
    }

    /// All versions of a package; empty on failure.
    pub async fn get_package_versions(
        &mut self,
        owner: &str,
        name: &str,
        package_type: &str,
    ) -> Vec<PackageVersion> {
        let endpoint = format!("{}/versions", Self::package_endpoint(owner, name, package_type));
        match self.client.get_json(&endpoint, true).await {
            Ok(versions) => versions,
            Err(e) => {
                tracing::debug!("Version listing failed for {}/{}: {}", owner, name, e);
                Vec::new()
            }
        }
    }

    /// Download statistics for one package. Never fails; problems land in `error`.
    pub async fn get_package_downloads(
        &mut self,
        owner: &str,
        name: &str,
        package_type: &str,
    ) -> PackageDownloads {
        let spec = PackageSpec::new(owner, name, package_type);
        let result = if spec.is_container() {
            Ok(self.container_downloads(&spec).await)
        } else {
            self.registry_downloads(&spec).await
        };

        result.unwrap_or_else(|e| PackageDownloads::failed(e.to_string()))
    }

    /// The container registry API has no download counts, so the public page is scraped.
    async fn container_downloads(&mut self, spec: &PackageSpec) -> PackageDownloads {
        let versions = self
            .get_package_versions(&spec.owner, &spec.name, &spec.package_type)
            .await;
        let latest = versions.iter().max_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut stats = PackageDownloads {
            latest_version: latest.map(|v| v.name.clone()),
            version_count: versions.len(),
            ..PackageDownloads::default()
        };

        let Some(pages) = &self.pages else {
            stats.error = Some("Package page scraping disabled".to_string());
            return stats;
        };

        let url = self.container_page_url(&spec.owner, &spec.name);
        match pages.fetch(&url).await {
            Ok(html) => match scrape::extract_download_count(&html) {
                Some(count) => stats.total_downloads = count,
                None => {
                    stats.error = Some(
                        "Could not find a download count on the package page".to_string(),
                    );
                }
            },
            Err(e) => stats.error = Some(e.to_string()),
        }

        stats
    }

    async fn registry_downloads(&mut self, spec: &PackageSpec) -> Result<PackageDownloads> {
        let info_endpoint = Self::package_endpoint(&spec.owner, &spec.name, &spec.package_type);
        let _info: serde_json::Value = self.client.get_json(&info_endpoint, true).await?;

        let versions = self
            .get_package_versions(&spec.owner, &spec.name, &spec.package_type)
            .await;

        let mut stats = PackageDownloads {
            version_count: versions.len(),
            ..PackageDownloads::default()
        };
        let mut latest_created: Option<String> = None;

        for version in &versions {
            if version.id == 0 {
                continue;
            }
            let endpoint = format!("{}/versions/{}", info_endpoint, version.id);
            let detail: PackageVersion = match self.client.get_json(&endpoint, true).await {
                Ok(detail) => detail,
                Err(e) => {
                    tracing::debug!("Version {} of {} failed: {}", version.id, spec.key(), e);
                    continue;
                }
            };

            let downloads = detail.downloads();
            if downloads == 0 {
                continue;
            }
            stats.total_downloads += downloads;

            let newer = latest_created
                .as_deref()
                .is_none_or(|created| version.created_at.as_str() > created);
            if newer {
                latest_created = Some(version.created_at.clone());
                stats.latest_version = Some(if detail.name.is_empty() {
                    version.name.clone()
                } else {
                    detail.name.clone()
                });
                stats.latest_version_downloads = downloads;
            }
        }

        Ok(stats)
    }

    /// Fetch several packages sequentially, isolating failures per package.
    pub async fn get_multiple_packages(
        &mut self,
        packages: &[PackageSpec],
    ) -> Vec<(String, PackageDownloads)> {
        let mut results = Vec::with_capacity(packages.len());

        for (i, spec) in packages.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(BATCH_DELAY).await;
            }

            let stats = self
                .get_package_downloads(&spec.owner, &spec.name, &spec.package_type)
                .await;
            if let Some(error) = &stats.error {
                tracing::info!("Package {}: {}", spec.key(), error);
            }
            results.push((spec.key(), stats));
        }

        results
    }
}
