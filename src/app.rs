// Orchestrator and main event loop.
// Refreshes data on a timer, publishes snapshots and rotates the display.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::cache::TtlCache;
use crate::config::{Config, DownloadPolicy, ViewMode};
use crate::display::Display;
use crate::donations::DonationsFetcher;
use crate::error::{Result, StatsError};
use crate::github::{GitHubClient, PackageFetcher, PackageSpec, RepoFetcher, RepoOutcome};
use crate::metrics::{
    AggregateSummary, RepoMetrics, aggregate_metrics, calculate_repo_metrics, format_relative_time,
    prepare_display_lines, prepare_summary_lines,
};
use crate::scrape::PageFetcher;

pub const NO_REPOSITORIES: &str = "No repositories configured. Check config.yaml";
pub const FETCH_FAILED: &str = "Failed to fetch repository data";
pub const NO_DATA: &str = "No repository data available.";

/// How often the foreground checks an interactive display for quit keys.
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Orchestrator state, published for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Fetching,
    Rendering,
}

/// Condition that replaces the normal views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Unconfigured,
    FetchFailed,
}

/// Immutable result of one refresh. Replaced wholesale, never edited in place.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub repos: Vec<(String, RepoMetrics)>,
    pub summary: Option<AggregateSummary>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub notice: Option<Notice>,
}

impl Snapshot {
    pub fn unconfigured() -> Self {
        Self {
            notice: Some(Notice::Unconfigured),
            ..Self::default()
        }
    }

    pub fn failed() -> Self {
        Self {
            notice: Some(Notice::FetchFailed),
            ..Self::default()
        }
    }

    /// No repository data at all.
    pub fn is_empty(&self) -> bool {
        self.repos.is_empty() && self.summary.is_none()
    }
}

/// Reconcile registry and release downloads under `policy`. Zero becomes `None`.
pub fn resolve_downloads(policy: DownloadPolicy, registry: u64, releases: u64) -> Option<u64> {
    let total = match policy {
        DownloadPolicy::PreferRegistry if registry > 0 => {
            tracing::info!(registry, releases, "Using package registry downloads");
            registry
        }
        DownloadPolicy::PreferRegistry if releases > 0 => {
            tracing::info!(releases, "Using release downloads");
            releases
        }
        DownloadPolicy::PreferRegistry => {
            tracing::info!("No package or release downloads found");
            0
        }
        DownloadPolicy::Combine => {
            tracing::info!(registry, releases, "Combining registry and release downloads");
            registry + releases
        }
    };
    (total > 0).then_some(total)
}

/// The fetch side: repository stats, then packages, then donations, then aggregation.
pub struct Pipeline {
    repos: RepoFetcher,
    packages: Option<PackageFetcher>,
    donations: Option<DonationsFetcher>,
    repositories: Vec<String>,
    package_specs: Vec<PackageSpec>,
    policy: DownloadPolicy,
}

impl Pipeline {
    pub fn from_config(config: &Config, cache: Arc<TtlCache>) -> Result<Self> {
        let api = &config.endpoints.github_api;
        let repos = RepoFetcher::new(GitHubClient::new(
            &config.github_token,
            api.as_str(),
            Arc::clone(&cache),
            "api_",
        )?);

        let package_specs = config.package_specs();
        let packages = if package_specs.is_empty() {
            None
        } else {
            let client =
                GitHubClient::new(&config.github_token, api.as_str(), cache, "gh_packages_")?;
            let pages = if config.scrape_package_pages {
                Some(PageFetcher::new()?)
            } else {
                None
            };
            Some(PackageFetcher::new(
                client,
                pages,
                config.endpoints.github_web.as_str(),
            ))
        };

        let donations = if config.donations.enabled {
            Some(DonationsFetcher::new(&config.donations, &config.endpoints)?)
        } else {
            None
        };

        Ok(Self {
            repos,
            packages,
            donations,
            repositories: config.repositories.clone(),
            package_specs,
            policy: config.download_policy,
        })
    }

    /// Run the whole pipeline and build a fresh snapshot as of `now`.
    ///
    /// Fails only when repositories are configured and none of them could be fetched.
    pub async fn fetch(&mut self, now: DateTime<Utc>) -> Result<Snapshot> {
        if self.repositories.is_empty() {
            return Ok(Snapshot::unconfigured());
        }

        tracing::info!(count = self.repositories.len(), "Fetching repository statistics");
        let outcomes = self.repos.get_multiple_repos(&self.repositories).await;
        let rate = self.repos.client().rate_limit();
        tracing::debug!(remaining = rate.remaining, limit = rate.limit, "GitHub rate limit");

        let mut repos = Vec::with_capacity(outcomes.len());
        let mut first_error = None;
        for (path, outcome) in outcomes {
            match outcome {
                RepoOutcome::Fetched(stats) => {
                    repos.push((path, calculate_repo_metrics(&stats, now)));
                }
                RepoOutcome::Failed { error } => {
                    first_error.get_or_insert(error);
                }
            }
        }

        if repos.is_empty() {
            let reason = first_error.unwrap_or_else(|| "no valid repositories".to_string());
            return Err(StatsError::Other(format!("{}: {}", FETCH_FAILED, reason)));
        }

        let package_downloads = self.package_downloads(&repos).await;
        let donations = match &self.donations {
            Some(fetcher) => Some(fetcher.get_all_donations().await),
            None => None,
        };

        let summary = aggregate_metrics(&repos, package_downloads, donations.as_ref());
        Ok(Snapshot {
            repos,
            summary: Some(summary),
            fetched_at: Some(now),
            notice: None,
        })
    }

    async fn package_downloads(&mut self, repos: &[(String, RepoMetrics)]) -> Option<u64> {
        let packages = self.packages.as_mut()?;

        let mut registry = 0;
        for (key, stats) in packages.get_multiple_packages(&self.package_specs).await {
            if stats.error.is_none() && stats.total_downloads > 0 {
                tracing::info!("Package {}: {} downloads", key, stats.total_downloads);
                registry += stats.total_downloads;
            }
        }

        let releases = repos
            .iter()
            .map(|(_, metrics)| metrics.stats.release_downloads)
            .sum();

        resolve_downloads(self.policy, registry, releases)
    }
}

/// What a render pass put on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Summary,
    Repo(String),
    Empty(&'static str),
    Error(String),
}

fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

/// The render side: owns the display and the rotation index.
pub struct Renderer {
    display: Box<dyn Display>,
    index: usize,
    show_summary_first: bool,
    rotation_enabled: bool,
    view_mode: ViewMode,
}

impl Renderer {
    pub fn new(display: Box<dyn Display>, config: &Config) -> Self {
        Self {
            display,
            index: 0,
            show_summary_first: config.show_summary_first,
            rotation_enabled: config.rotation_enabled,
            view_mode: config.view_mode,
        }
    }

    /// Rotation slot shown by the next render.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_interactive(&self) -> bool {
        self.display.is_interactive()
    }

    pub fn poll_quit(&mut self) -> Result<bool> {
        self.display.poll_quit()
    }

    pub fn close(&mut self) -> Result<()> {
        self.display.close()
    }

    /// Render exactly one view of `snapshot`. Display failures become an error view.
    pub fn render(&mut self, snapshot: &Snapshot) -> Rendered {
        match self.render_view(snapshot) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::error!("Render failed: {}", e);
                let message = e.to_string();
                if let Err(e) = self.show_error("Display error", &message) {
                    tracing::error!("Could not show error view: {}", e);
                }
                Rendered::Error(message)
            }
        }
    }

    fn render_view(&mut self, snapshot: &Snapshot) -> Result<Rendered> {
        match snapshot.notice {
            Some(Notice::Unconfigured) => {
                self.show_empty(
                    NO_REPOSITORIES,
                    &["No repositories", "configured.", "Check config.yaml", ""],
                )?;
                return Ok(Rendered::Empty(NO_REPOSITORIES));
            }
            Some(Notice::FetchFailed) => {
                self.show_error("Error", FETCH_FAILED)?;
                return Ok(Rendered::Error(FETCH_FAILED.to_string()));
            }
            None => {}
        }

        if snapshot.is_empty() {
            self.show_empty(NO_DATA, &["No repository", "data available.", "", ""])?;
            return Ok(Rendered::Empty(NO_DATA));
        }

        if !self.rotation_enabled {
            return self.render_fixed(snapshot);
        }

        let summary_slot = usize::from(self.show_summary_first && snapshot.summary.is_some());
        let total = snapshot.repos.len() + summary_slot;
        if total == 0 {
            return self.render_fixed(snapshot);
        }

        let index = self.index % total;
        let rendered = match &snapshot.summary {
            Some(summary) if summary_slot == 1 && index == 0 => {
                self.show_summary(summary)?;
                Rendered::Summary
            }
            _ => {
                let (path, repo) = &snapshot.repos[index - summary_slot];
                self.show_repo(repo)?;
                Rendered::Repo(path.clone())
            }
        };
        tracing::debug!(index, total, ?rendered, "rotated");

        if total > 1
            && let Some(rich) = self.display.as_rich()
        {
            rich.update_rotation_index(index, total)?;
        }
        self.index = (index + 1) % total;

        Ok(rendered)
    }

    /// No rotation: `view_mode` picks the summary or the first repository.
    fn render_fixed(&mut self, snapshot: &Snapshot) -> Result<Rendered> {
        let first = snapshot.repos.first();
        match (self.view_mode, &snapshot.summary, first) {
            (ViewMode::PerRepo, _, Some((path, repo))) | (ViewMode::Summary, None, Some((path, repo))) => {
                self.show_repo(repo)?;
                Ok(Rendered::Repo(path.clone()))
            }
            (_, Some(summary), _) => {
                self.show_summary(summary)?;
                Ok(Rendered::Summary)
            }
            (_, None, None) => {
                self.show_empty(NO_DATA, &["No repository", "data available.", "", ""])?;
                Ok(Rendered::Empty(NO_DATA))
            }
        }
    }

    fn show_summary(&mut self, summary: &AggregateSummary) -> Result<()> {
        if let Some(rich) = self.display.as_rich() {
            return rich.update_summary(summary);
        }
        let lines = prepare_summary_lines(summary, self.display.width());
        self.display.update(&lines)
    }

    fn show_repo(&mut self, repo: &RepoMetrics) -> Result<()> {
        if let Some(rich) = self.display.as_rich() {
            return rich.update_repo(repo);
        }
        let lines = prepare_display_lines(repo, self.display.width());
        self.display.update(&lines)
    }

    fn show_error(&mut self, title: &str, message: &str) -> Result<()> {
        if let Some(rich) = self.display.as_rich() {
            return rich.show_error(title, message);
        }
        self.display
            .update(&owned(&["Error occurred:", message, "Check logs", ""]))
    }

    fn show_empty(&mut self, message: &str, lines: &[&str]) -> Result<()> {
        if let Some(rich) = self.display.as_rich() {
            return rich.show_empty(message);
        }
        self.display.update(&owned(lines))
    }
}

/// The running dashboard.
pub struct App {
    pipeline: Pipeline,
    renderer: Renderer,
    refresh_interval: Duration,
    rotation_interval: Option<Duration>,
    phase: Arc<watch::Sender<Phase>>,
}

impl App {
    pub fn new(config: &Config, display: Box<dyn Display>) -> Result<Self> {
        let cache = Arc::new(TtlCache::new(
            &config.cache_dir,
            config.cache_enabled,
            config.cache_ttl(),
        ));
        let pipeline = Pipeline::from_config(config, cache)?;
        let renderer = Renderer::new(display, config);
        Ok(Self::from_parts(config, pipeline, renderer))
    }

    pub fn from_parts(config: &Config, pipeline: Pipeline, renderer: Renderer) -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        Self {
            pipeline,
            renderer,
            refresh_interval: config.refresh_interval(),
            rotation_interval: config.rotation_enabled.then(|| config.rotation_interval()),
            phase: Arc::new(phase),
        }
    }

    /// Observe phase transitions.
    pub fn phases(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Run until Ctrl+C, SIGTERM or a quit key on an interactive display.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `stop` resolves or the display asks to quit.
    pub async fn run_until<F>(self, stop: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let App {
            mut pipeline,
            renderer,
            refresh_interval,
            rotation_interval,
            phase,
        } = self;

        tracing::info!(
            refresh_secs = refresh_interval.as_secs(),
            rotation_secs = rotation_interval.map(|d| d.as_secs()),
            "GitHub stats display starting"
        );

        let renderer = Arc::new(Mutex::new(renderer));
        let (snapshot_tx, mut snapshot_rx) = watch::channel(Arc::new(Snapshot::default()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Startup cycle before any timer fires.
        refresh(&mut pipeline, &snapshot_tx, &phase).await;
        let initial = snapshot_rx.borrow_and_update().clone();
        render(&renderer, &initial, &phase).await;

        let refresh_task = tokio::spawn(refresh_loop(
            pipeline,
            snapshot_tx,
            refresh_interval,
            shutdown_rx.clone(),
            Arc::clone(&phase),
        ));
        let render_task = tokio::spawn(render_loop(
            Arc::clone(&renderer),
            snapshot_rx,
            rotation_interval,
            shutdown_rx,
            Arc::clone(&phase),
        ));

        let outcome = tokio::select! {
            _ = stop => Ok(()),
            quit = wait_for_quit(&renderer) => quit,
        };

        tracing::info!("Shutting down");
        let _ = shutdown_tx.send(true);
        // An in-flight fetch finishes (or times out) before the refresh task exits.
        if let Err(e) = refresh_task.await {
            tracing::warn!("Refresh task ended abnormally: {}", e);
        }
        if let Err(e) = render_task.await {
            tracing::warn!("Render task ended abnormally: {}", e);
        }

        renderer.lock().await.close()?;
        outcome
    }
}

async fn refresh(
    pipeline: &mut Pipeline,
    snapshots: &watch::Sender<Arc<Snapshot>>,
    phase: &watch::Sender<Phase>,
) {
    phase.send_replace(Phase::Fetching);
    match pipeline.fetch(Utc::now()).await {
        Ok(snapshot) => {
            snapshots.send_replace(Arc::new(snapshot));
        }
        Err(e) => {
            tracing::error!("Error fetching data: {}", e);
            // Keep serving stale data when there is some.
            let kept = snapshots.borrow().fetched_at;
            match kept {
                Some(fetched_at) => tracing::warn!(
                    "Keeping data fetched {}",
                    format_relative_time(Some(fetched_at), Utc::now())
                ),
                None => {
                    snapshots.send_replace(Arc::new(Snapshot::failed()));
                }
            }
        }
    }
    phase.send_replace(Phase::Idle);
}

async fn render(renderer: &Mutex<Renderer>, snapshot: &Snapshot, phase: &watch::Sender<Phase>) {
    phase.send_replace(Phase::Rendering);
    renderer.lock().await.render(snapshot);
    phase.send_replace(Phase::Idle);
}

fn timer(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn refresh_loop(
    mut pipeline: Pipeline,
    snapshots: watch::Sender<Arc<Snapshot>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    phase: Arc<watch::Sender<Phase>>,
) {
    let mut ticker = timer(period);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        refresh(&mut pipeline, &snapshots, &phase).await;
    }
    tracing::debug!("refresh loop stopped");
}

/// Renders on every rotation tick and whenever a new snapshot is published.
/// A snapshot render restarts the rotation period so that view gets a full slot.
async fn render_loop(
    renderer: Arc<Mutex<Renderer>>,
    mut snapshots: watch::Receiver<Arc<Snapshot>>,
    rotation: Option<Duration>,
    mut shutdown: watch::Receiver<bool>,
    phase: Arc<watch::Sender<Phase>>,
) {
    let mut ticker = rotation.map(timer);
    loop {
        let published = tokio::select! {
            _ = shutdown.changed() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                true
            }
            _ = next_tick(&mut ticker) => false,
        };
        let snapshot = snapshots.borrow_and_update().clone();
        render(&renderer, &snapshot, &phase).await;
        if published && let Some(ticker) = ticker.as_mut() {
            ticker.reset();
        }
    }
    tracing::debug!("render loop stopped");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Resolves when an interactive display reports a quit key; never for the others.
async fn wait_for_quit(renderer: &Mutex<Renderer>) -> Result<()> {
    if !renderer.lock().await.is_interactive() {
        return std::future::pending().await;
    }
    let mut poll = tokio::time::interval(INPUT_POLL);
    loop {
        poll.tick().await;
        if renderer.lock().await.poll_quit()? {
            return Ok(());
        }
    }
}

/// Ctrl+C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::display::RichDisplay;
    use crate::github::RepoStats;

    #[derive(Debug, Clone, PartialEq)]
    enum Frame {
        Lines(Vec<String>),
        Summary,
        Repo(String),
        Error(String),
        Empty(String),
        Rotation(usize, usize),
    }

    /// Records what the renderer sends it.
    struct Recorder {
        frames: Arc<StdMutex<Vec<Frame>>>,
        rich: bool,
        fail: bool,
    }

    impl Recorder {
        fn new(rich: bool) -> (Self, Arc<StdMutex<Vec<Frame>>>) {
            let frames = Arc::new(StdMutex::new(Vec::new()));
            let recorder = Self {
                frames: Arc::clone(&frames),
                rich,
                fail: false,
            };
            (recorder, frames)
        }

        fn push(&self, frame: Frame) {
            self.frames.lock().unwrap().push(frame);
        }
    }

    impl Display for Recorder {
        fn width(&self) -> usize {
            20
        }

        fn height(&self) -> usize {
            4
        }

        fn clear(&mut self) -> Result<()> {
            Ok(())
        }

        fn write_line(&mut self, _line: usize, _text: &str) -> Result<()> {
            Ok(())
        }

        fn update(&mut self, lines: &[String]) -> Result<()> {
            if self.fail {
                self.fail = false;
                return Err(StatsError::Display("device unplugged".to_string()));
            }
            self.push(Frame::Lines(lines.to_vec()));
            Ok(())
        }

        fn as_rich(&mut self) -> Option<&mut dyn RichDisplay> {
            if self.rich { Some(self) } else { None }
        }
    }

    impl RichDisplay for Recorder {
        fn update_summary(&mut self, _summary: &AggregateSummary) -> Result<()> {
            self.push(Frame::Summary);
            Ok(())
        }

        fn update_repo(&mut self, repo: &RepoMetrics) -> Result<()> {
            self.push(Frame::Repo(repo.stats.name.clone()));
            Ok(())
        }

        fn show_error(&mut self, _title: &str, message: &str) -> Result<()> {
            self.push(Frame::Error(message.to_string()));
            Ok(())
        }

        fn show_empty(&mut self, message: &str) -> Result<()> {
            self.push(Frame::Empty(message.to_string()));
            Ok(())
        }

        fn update_rotation_index(&mut self, index: usize, total: usize) -> Result<()> {
            self.push(Frame::Rotation(index, total));
            Ok(())
        }
    }

    fn snapshot(names: &[&str]) -> Snapshot {
        let now = Utc::now();
        let repos: Vec<(String, RepoMetrics)> = names
            .iter()
            .map(|name| {
                let stats = RepoStats {
                    name: name.to_string(),
                    full_name: format!("octocat/{}", name),
                    stars: 10,
                    pushed_at: (now - ChronoDuration::days(1)).to_rfc3339(),
                    ..RepoStats::default()
                };
                (format!("octocat/{}", name), calculate_repo_metrics(&stats, now))
            })
            .collect();
        let summary = aggregate_metrics(&repos, None, None);
        Snapshot {
            repos,
            summary: Some(summary),
            fetched_at: Some(now),
            notice: None,
        }
    }

    fn renderer(display: Recorder, tweak: impl FnOnce(&mut Config)) -> Renderer {
        let mut config = Config::default();
        tweak(&mut config);
        Renderer::new(Box::new(display), &config)
    }

    #[test]
    fn test_rotation_order_with_summary_first() {
        let (display, _) = Recorder::new(false);
        let mut renderer = renderer(display, |_| {});
        let snapshot = snapshot(&["a", "b"]);

        let shown: Vec<Rendered> = (0..4).map(|_| renderer.render(&snapshot)).collect();
        assert_eq!(
            shown,
            vec![
                Rendered::Summary,
                Rendered::Repo("octocat/a".to_string()),
                Rendered::Repo("octocat/b".to_string()),
                Rendered::Summary,
            ]
        );
    }

    #[test]
    fn test_rotation_without_summary() {
        let (display, _) = Recorder::new(false);
        let mut renderer = renderer(display, |c| c.show_summary_first = false);
        let snapshot = snapshot(&["a", "b"]);

        let shown: Vec<Rendered> = (0..3).map(|_| renderer.render(&snapshot)).collect();
        assert_eq!(shown[0], Rendered::Repo("octocat/a".to_string()));
        assert_eq!(shown[1], Rendered::Repo("octocat/b".to_string()));
        assert_eq!(shown[2], Rendered::Repo("octocat/a".to_string()));
    }

    #[test]
    fn test_rotation_index_survives_smaller_snapshot() {
        let (display, _) = Recorder::new(false);
        let mut renderer = renderer(display, |_| {});
        let big = snapshot(&["a", "b", "c"]);
        for _ in 0..3 {
            renderer.render(&big);
        }
        assert_eq!(renderer.index(), 3);

        let small = snapshot(&["a"]);
        assert_eq!(renderer.render(&small), Rendered::Repo("octocat/a".to_string()));
        assert_eq!(renderer.render(&small), Rendered::Summary);
    }

    #[test]
    fn test_rich_display_gets_rotation_index() {
        let (display, frames) = Recorder::new(true);
        let mut renderer = renderer(display, |_| {});
        let snapshot = snapshot(&["a"]);

        renderer.render(&snapshot);
        renderer.render(&snapshot);

        let frames = frames.lock().unwrap().clone();
        assert_eq!(
            frames,
            vec![
                Frame::Summary,
                Frame::Rotation(0, 2),
                Frame::Repo("a".to_string()),
                Frame::Rotation(1, 2),
            ]
        );
    }

    #[test]
    fn test_single_item_has_no_rotation_indicator() {
        let (display, frames) = Recorder::new(true);
        let mut renderer = renderer(display, |c| c.show_summary_first = false);
        renderer.render(&snapshot(&["only"]));
        assert_eq!(frames.lock().unwrap().clone(), vec![Frame::Repo("only".to_string())]);
    }

    #[test]
    fn test_fixed_view_modes() {
        let (display, _) = Recorder::new(false);
        let mut summary_mode = renderer(display, |c| c.rotation_enabled = false);
        let snapshot = snapshot(&["a", "b"]);
        assert_eq!(summary_mode.render(&snapshot), Rendered::Summary);
        assert_eq!(summary_mode.render(&snapshot), Rendered::Summary);

        let (display, _) = Recorder::new(false);
        let mut repo_mode = renderer(display, |c| {
            c.rotation_enabled = false;
            c.view_mode = ViewMode::PerRepo;
        });
        assert_eq!(repo_mode.render(&snapshot), Rendered::Repo("octocat/a".to_string()));
    }

    #[test]
    fn test_notice_views_on_line_display() {
        let (display, frames) = Recorder::new(false);
        let mut renderer = renderer(display, |_| {});

        assert_eq!(
            renderer.render(&Snapshot::unconfigured()),
            Rendered::Empty(NO_REPOSITORIES)
        );
        assert_eq!(
            renderer.render(&Snapshot::failed()),
            Rendered::Error(FETCH_FAILED.to_string())
        );
        assert_eq!(renderer.render(&Snapshot::default()), Rendered::Empty(NO_DATA));

        let frames = frames.lock().unwrap().clone();
        assert_eq!(
            frames[0],
            Frame::Lines(owned(&["No repositories", "configured.", "Check config.yaml", ""]))
        );
        assert_eq!(
            frames[1],
            Frame::Lines(owned(&["Error occurred:", FETCH_FAILED, "Check logs", ""]))
        );
    }

    #[test]
    fn test_notice_views_on_rich_display() {
        let (display, frames) = Recorder::new(true);
        let mut renderer = renderer(display, |_| {});
        renderer.render(&Snapshot::unconfigured());
        renderer.render(&Snapshot::failed());

        let frames = frames.lock().unwrap().clone();
        assert_eq!(frames[0], Frame::Empty(NO_REPOSITORIES.to_string()));
        assert_eq!(frames[1], Frame::Error(FETCH_FAILED.to_string()));
    }

    #[test]
    fn test_render_failure_becomes_error_view() {
        let (mut display, frames) = Recorder::new(false);
        display.fail = true;
        let mut renderer = renderer(display, |_| {});

        let rendered = renderer.render(&snapshot(&["a"]));
        assert!(matches!(rendered, Rendered::Error(msg) if msg.contains("device unplugged")));

        let frames = frames.lock().unwrap().clone();
        assert!(matches!(&frames[0], Frame::Lines(lines) if lines[0] == "Error occurred:"));
    }

    #[test]
    fn test_resolve_downloads() {
        assert_eq!(resolve_downloads(DownloadPolicy::PreferRegistry, 100, 7), Some(100));
        assert_eq!(resolve_downloads(DownloadPolicy::PreferRegistry, 0, 7), Some(7));
        assert_eq!(resolve_downloads(DownloadPolicy::PreferRegistry, 0, 0), None);
        assert_eq!(resolve_downloads(DownloadPolicy::Combine, 100, 7), Some(107));
        assert_eq!(resolve_downloads(DownloadPolicy::Combine, 0, 0), None);
    }

    fn config_for(server: &MockServer) -> Config {
        let mut config = Config {
            github_token: "test-token".to_string(),
            repositories: vec!["octocat/Hello-World".to_string()],
            cache_enabled: false,
            ..Config::default()
        };
        config.endpoints.github_api = server.uri();
        config.endpoints.github_web = server.uri();
        config
    }

    async fn mount_hello_world(server: &MockServer, release_downloads: u64) {
        let pushed = (Utc::now() - ChronoDuration::days(2)).to_rfc3339();
        Mock::given(path("/repos/octocat/Hello-World"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Hello-World",
                "full_name": "octocat/Hello-World",
                "stargazers_count": 1000,
                "forks_count": 50,
                "open_issues_count": 3,
                "pushed_at": pushed,
            })))
            .mount(server)
            .await;
        Mock::given(path("/repos/octocat/Hello-World/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tag_name": "v1.0.0",
                "name": "First",
                "assets": [{"download_count": release_downloads}]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_pipeline_builds_summary() {
        let server = MockServer::start().await;
        mount_hello_world(&server, 0).await;

        let config = config_for(&server);
        let mut pipeline = Pipeline::from_config(&config, Arc::new(TtlCache::disabled())).unwrap();
        let snapshot = pipeline.fetch(Utc::now()).await.unwrap();

        let summary = snapshot.summary.unwrap();
        assert_eq!(summary.total_stars_formatted, "1.0K");
        assert_eq!(summary.activity_ratio(), "1/1");
        assert_eq!(summary.most_starred.unwrap().name, "Hello-World");
        assert_eq!(summary.total_downloads, None);
        assert_eq!(snapshot.repos.len(), 1);
    }

    #[tokio::test]
    async fn test_pipeline_unconfigured() {
        let server = MockServer::start().await;
        let mut config = config_for(&server);
        config.repositories.clear();

        let mut pipeline = Pipeline::from_config(&config, Arc::new(TtlCache::disabled())).unwrap();
        let snapshot = pipeline.fetch(Utc::now()).await.unwrap();
        assert_eq!(snapshot.notice, Some(Notice::Unconfigured));
    }

    #[tokio::test]
    async fn test_pipeline_all_failed_is_error() {
        let server = MockServer::start().await;
        let config = config_for(&server);

        let mut pipeline = Pipeline::from_config(&config, Arc::new(TtlCache::disabled())).unwrap();
        let err = pipeline.fetch(Utc::now()).await.unwrap_err();
        assert!(err.to_string().contains(FETCH_FAILED));
    }

    #[tokio::test]
    async fn test_pipeline_download_policies() {
        let server = MockServer::start().await;
        mount_hello_world(&server, 25).await;
        Mock::given(path("/users/octocat/packages/container/app/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(path("/users/octocat/packages/container/package/app"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<b>400 downloads</b>"))
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.github_packages = vec![crate::config::PackageEntry::Path("octocat/app".to_string())];

        let mut prefer = Pipeline::from_config(&config, Arc::new(TtlCache::disabled())).unwrap();
        let snapshot = prefer.fetch(Utc::now()).await.unwrap();
        assert_eq!(snapshot.summary.unwrap().total_downloads, Some(400));

        config.download_policy = DownloadPolicy::Combine;
        let mut combine = Pipeline::from_config(&config, Arc::new(TtlCache::disabled())).unwrap();
        let snapshot = combine.fetch(Utc::now()).await.unwrap();
        assert_eq!(snapshot.summary.unwrap().total_downloads, Some(425));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_snapshot_restarts_rotation_period() {
        let (display, frames) = Recorder::new(false);
        let renderer = Arc::new(Mutex::new(renderer(display, |_| {})));
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(snapshot(&["a", "b"])));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (phase, _) = watch::channel(Phase::Idle);

        let task = tokio::spawn(render_loop(
            Arc::clone(&renderer),
            snapshot_rx,
            Some(Duration::from_secs(10)),
            shutdown_rx,
            Arc::new(phase),
        ));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(frames.lock().unwrap().is_empty());

        snapshot_tx.send_replace(Arc::new(snapshot(&["a", "b"])));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(frames.lock().unwrap().len(), 1);

        // The tick originally due at 10s moved to 16s.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(frames.lock().unwrap().len(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(frames.lock().unwrap().len(), 2);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_until_renders_startup_view() {
        let server = MockServer::start().await;
        mount_hello_world(&server, 0).await;

        let mut config = config_for(&server);
        config.rotation_enabled = false;
        let (display, frames) = Recorder::new(true);
        let app = App::new(&config, Box::new(display)).unwrap();
        let phases = app.phases();

        app.run_until(tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();

        assert_eq!(frames.lock().unwrap().first(), Some(&Frame::Summary));
        assert_eq!(*phases.borrow(), Phase::Idle);
    }
}
