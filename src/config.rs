// Configuration loading.
// Parses the YAML config file into typed settings with documented defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, StatsError};
use crate::github::PackageSpec;
use crate::github::client::GITHUB_API_BASE;

/// Template written when the config file does not exist yet.
pub const EXAMPLE_CONFIG: &str = include_str!("../config.yaml.example");

/// Default config file path.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Which display surface renders the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayType {
    #[default]
    Terminal,
    CharacterLcd,
    #[serde(alias = "fullscreen")]
    Gui,
}

/// What to show when rotation is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Summary,
    PerRepo,
}

/// How registry downloads and release asset downloads are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadPolicy {
    /// Use the registry figure; fall back to release downloads when it is zero.
    #[default]
    PreferRegistry,
    /// Add registry and release downloads together.
    Combine,
}

/// A `github_packages` entry: `"owner/name"` or a full object.
///
/// Anything else still deserializes so one bad entry cannot fail the load.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PackageEntry {
    Path(String),
    Spec {
        #[serde(default)]
        owner: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(rename = "type", default)]
        package_type: Option<String>,
    },
    Invalid(serde_yaml::Value),
}

fn default_package_type() -> String {
    "container".to_string()
}

impl PackageEntry {
    /// Resolve into a spec, or `None` for a malformed or incomplete entry.
    pub fn to_spec(&self) -> Option<PackageSpec> {
        match self {
            PackageEntry::Path(path) => {
                let (owner, name) = split_owner_name(path)?;
                Some(PackageSpec::new(owner, name, default_package_type()))
            }
            PackageEntry::Spec {
                owner,
                name,
                package_type,
            } => {
                let owner = owner.as_deref().filter(|o| !o.is_empty())?;
                let name = name.as_deref().filter(|n| !n.is_empty())?;
                let package_type = package_type.clone().unwrap_or_else(default_package_type);
                Some(PackageSpec::new(owner, name, package_type))
            }
            PackageEntry::Invalid(_) => None,
        }
    }
}

/// Split `"owner/name"` into its two parts.
pub fn split_owner_name(path: &str) -> Option<(&str, &str)> {
    let mut parts = path.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
            Some((owner, name))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaypalConfig {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuyMeACoffeeConfig {
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DonationsConfig {
    pub enabled: bool,
    pub paypal: PaypalConfig,
    pub buymeacoffee: BuyMeACoffeeConfig,
}

/// Per-surface display options. Each surface reads the keys it understands.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub width: Option<usize>,
    pub height: Option<usize>,
    /// Character LCD device node.
    pub device: Option<PathBuf>,
    /// Full-screen dashboard uses the alternate screen.
    pub fullscreen: bool,
    pub bg_color: Option<String>,
    pub text_color: Option<String>,
    pub accent_color: Option<String>,
    pub show_rotation_indicator: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            device: None,
            fullscreen: true,
            bg_color: None,
            text_color: None,
            accent_color: None,
            show_rotation_indicator: true,
        }
    }
}

/// Base URLs of the external services.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub github_api: String,
    pub github_web: String,
    pub paypal_api: String,
    pub buymeacoffee_web: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            github_api: GITHUB_API_BASE.to_string(),
            github_web: "https://github.com".to_string(),
            paypal_api: "https://api.paypal.com".to_string(),
            buymeacoffee_web: "https://www.buymeacoffee.com".to_string(),
        }
    }
}

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github_token: String,
    pub repositories: Vec<String>,
    pub github_packages: Vec<PackageEntry>,
    pub donations: DonationsConfig,
    pub cache_dir: PathBuf,
    pub cache_enabled: bool,
    pub cache_duration_minutes: u64,
    pub refresh_interval_minutes: u64,
    pub rotation_enabled: bool,
    pub rotation_interval_seconds: u64,
    pub show_summary_first: bool,
    pub view_mode: ViewMode,
    pub display_type: DisplayType,
    pub display_settings: DisplaySettings,
    pub download_policy: DownloadPolicy,
    pub scrape_package_pages: bool,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_token: String::new(),
            repositories: Vec::new(),
            github_packages: Vec::new(),
            donations: DonationsConfig::default(),
            cache_dir: PathBuf::from(".cache"),
            cache_enabled: true,
            cache_duration_minutes: 10,
            refresh_interval_minutes: 15,
            rotation_enabled: true,
            rotation_interval_seconds: 10,
            show_summary_first: true,
            view_mode: ViewMode::Summary,
            display_type: DisplayType::Terminal,
            display_settings: DisplaySettings::default(),
            download_policy: DownloadPolicy::PreferRegistry,
            scrape_package_pages: true,
            log_level: "info".to_string(),
            log_file: None,
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Load the config file, bootstrapping it from the bundled example when absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, EXAMPLE_CONFIG)?;
            return Err(StatsError::ConfigCreated(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;
        config.resolve_token(std::env::var("GITHUB_TOKEN").ok())?;
        Ok(config)
    }

    /// Parse config text without touching the environment.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Fill an empty token from `env_token`; fail if neither is set.
    pub fn resolve_token(&mut self, env_token: Option<String>) -> Result<()> {
        if self.github_token.trim().is_empty() {
            match env_token.filter(|t| !t.trim().is_empty()) {
                Some(token) => self.github_token = token,
                None => return Err(StatsError::MissingToken),
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.refresh_interval_minutes == 0 {
            return Err(StatsError::Config(
                "refresh_interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.rotation_interval_seconds == 0 {
            return Err(StatsError::Config(
                "rotation_interval_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_minutes * 60)
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_seconds)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_duration_minutes * 60)
    }

    /// Configured packages, skipping malformed entries.
    pub fn package_specs(&self) -> Vec<PackageSpec> {
        self.github_packages
            .iter()
            .filter_map(|entry| {
                let spec = entry.to_spec();
                if spec.is_none() {
                    tracing::warn!("Ignoring malformed github_packages entry: {:?}", entry);
                }
                spec
            })
            .collect()
    }
}
