// Full-screen dashboard.
// Renders summary and per-repository cards with ratatui.

use std::io::{self, Stdout};
use std::str::FromStr;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::CrosstermBackend;
use ratatui::{TerminalOptions, Viewport, prelude::*, widgets::*};

use super::{Display, RichDisplay};
use crate::config::DisplaySettings;
use crate::error::Result;
use crate::metrics::{
    AggregateSummary, RepoMetrics, format_datetime, format_number, parse_iso_datetime,
    truncate_text,
};

/// Rows used when the dashboard runs inline instead of full-screen.
const INLINE_HEIGHT: u16 = 16;

/// What the dashboard is currently showing.
#[derive(Debug, Clone)]
enum View {
    Lines(Vec<String>),
    Summary(Box<AggregateSummary>),
    Repo(Box<RepoMetrics>),
    Error { title: String, message: String },
    Empty(String),
}

#[derive(Debug, Clone, Copy)]
struct Theme {
    bg: Color,
    text: Color,
    accent: Color,
}

fn parse_color(value: Option<&str>, fallback: Color) -> Color {
    value
        .and_then(|v| Color::from_str(v).ok())
        .unwrap_or(fallback)
}

impl Theme {
    fn from_settings(settings: &DisplaySettings) -> Self {
        Self {
            bg: parse_color(settings.bg_color.as_deref(), Color::Rgb(0x0a, 0x0e, 0x27)),
            text: parse_color(settings.text_color.as_deref(), Color::White),
            accent: parse_color(settings.accent_color.as_deref(), Color::Rgb(0x00, 0xd4, 0xff)),
        }
    }
}

/// Header and footer state shared by every view.
#[derive(Debug, Clone, Copy)]
struct Chrome {
    theme: Theme,
    rotation: Option<(usize, usize)>,
    show_rotation_indicator: bool,
}

/// `q`, `Esc` and Ctrl+C quit the dashboard.
fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

pub struct Dashboard<B: Backend> {
    terminal: Terminal<B>,
    view: View,
    chrome: Chrome,
    owns_terminal: bool,
    alternate_screen: bool,
}

impl Dashboard<CrosstermBackend<Stdout>> {
    /// Take over the real terminal. Raw mode stays on until [`Display::close`].
    pub fn open(settings: &DisplaySettings) -> Result<Self> {
        enable_raw_mode()?;
        let terminal = match Self::setup_terminal(settings.fullscreen) {
            Ok(terminal) => terminal,
            Err(e) => {
                let _ = disable_raw_mode();
                return Err(e);
            }
        };

        let mut dashboard = Self::new(terminal, settings);
        dashboard.owns_terminal = true;
        dashboard.alternate_screen = settings.fullscreen;
        dashboard.terminal.hide_cursor()?;
        Ok(dashboard)
    }

    fn setup_terminal(fullscreen: bool) -> Result<Terminal<CrosstermBackend<Stdout>>> {
        let mut stdout = io::stdout();
        let viewport = if fullscreen {
            execute!(stdout, EnterAlternateScreen)?;
            Viewport::Fullscreen
        } else {
            Viewport::Inline(INLINE_HEIGHT)
        };
        Ok(Terminal::with_options(
            CrosstermBackend::new(stdout),
            TerminalOptions { viewport },
        )?)
    }
}

impl<B: Backend> Dashboard<B> {
    /// Wrap an existing terminal; input and terminal modes are left alone.
    pub fn new(terminal: Terminal<B>, settings: &DisplaySettings) -> Self {
        Self {
            terminal,
            view: View::Empty("Loading...".to_string()),
            chrome: Chrome {
                theme: Theme::from_settings(settings),
                rotation: None,
                show_rotation_indicator: settings.show_rotation_indicator,
            },
            owns_terminal: false,
            alternate_screen: false,
        }
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    fn draw(&mut self) -> Result<()> {
        let view = &self.view;
        let chrome = &self.chrome;
        self.terminal.draw(|frame| render(frame, view, chrome))?;
        Ok(())
    }

    fn show(&mut self, view: View) -> Result<()> {
        self.view = view;
        self.draw()
    }

    /// Leave raw mode and the alternate screen if we entered them.
    fn restore(&mut self) -> Result<()> {
        if !self.owns_terminal {
            return Ok(());
        }
        self.owns_terminal = false;
        disable_raw_mode()?;
        if self.alternate_screen {
            execute!(io::stdout(), LeaveAlternateScreen)?;
        }
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl<B: Backend> Drop for Dashboard<B> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!("Failed to restore terminal: {}", e);
        }
    }
}

impl<B: Backend + Send> Display for Dashboard<B> {
    fn width(&self) -> usize {
        self.terminal.size().map(|s| s.width as usize).unwrap_or(0)
    }

    fn height(&self) -> usize {
        self.terminal.size().map(|s| s.height as usize).unwrap_or(0)
    }

    fn clear(&mut self) -> Result<()> {
        self.view = View::Lines(Vec::new());
        self.terminal.clear()?;
        Ok(())
    }

    fn write_line(&mut self, line: usize, text: &str) -> Result<()> {
        let mut lines = match &self.view {
            View::Lines(lines) => lines.clone(),
            _ => Vec::new(),
        };
        if lines.len() <= line {
            lines.resize(line + 1, String::new());
        }
        lines[line] = text.to_string();
        self.show(View::Lines(lines))
    }

    fn update(&mut self, lines: &[String]) -> Result<()> {
        self.show(View::Lines(lines.to_vec()))
    }

    fn close(&mut self) -> Result<()> {
        self.restore()
    }

    fn is_interactive(&self) -> bool {
        self.owns_terminal
    }

    fn poll_quit(&mut self) -> Result<bool> {
        if !self.owns_terminal {
            return Ok(false);
        }
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if is_quit_key(&key) => return Ok(true),
                Event::Resize(_, _) => self.draw()?,
                _ => {}
            }
        }
        Ok(false)
    }

    fn as_rich(&mut self) -> Option<&mut dyn RichDisplay> {
        Some(self)
    }
}

impl<B: Backend> RichDisplay for Dashboard<B> {
    fn update_summary(&mut self, summary: &AggregateSummary) -> Result<()> {
        self.show(View::Summary(Box::new(summary.clone())))
    }

    fn update_repo(&mut self, repo: &RepoMetrics) -> Result<()> {
        self.show(View::Repo(Box::new(repo.clone())))
    }

    fn show_error(&mut self, title: &str, message: &str) -> Result<()> {
        self.show(View::Error {
            title: title.to_string(),
            message: message.to_string(),
        })
    }

    fn show_empty(&mut self, message: &str) -> Result<()> {
        self.show(View::Empty(message.to_string()))
    }

    fn update_rotation_index(&mut self, index: usize, total: usize) -> Result<()> {
        self.chrome.rotation = Some((index, total));
        self.draw()
    }
}

fn render(frame: &mut Frame, view: &View, chrome: &Chrome) {
    let area = frame.area();
    let theme = chrome.theme;
    frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), area);

    let [header, body, footer] = Layout::vertical([
        Constraint::Length(3), // Title bar
        Constraint::Min(1),    // View
        Constraint::Length(1), // Status bar
    ])
    .areas(area);

    draw_header(frame, view, chrome, header);

    match view {
        View::Lines(lines) => draw_lines(frame, lines, theme, body),
        View::Summary(summary) => draw_summary(frame, summary, theme, body),
        View::Repo(repo) => draw_repo(frame, repo, theme, body),
        View::Error { title, message } => draw_error(frame, title, message, body),
        View::Empty(message) => draw_empty(frame, message, body),
    }

    draw_status_bar(frame, chrome, footer);
}

fn view_title(view: &View) -> String {
    match view {
        View::Summary(_) => "Summary".to_string(),
        View::Repo(repo) => repo.stats.full_name.clone(),
        View::Error { .. } => "Error".to_string(),
        View::Lines(_) | View::Empty(_) => String::new(),
    }
}

/// Dots marking the current rotation slot, e.g. `○ ● ○`.
fn rotation_dots(index: usize, total: usize) -> String {
    (0..total)
        .map(|i| if i == index { "●" } else { "○" })
        .collect::<Vec<_>>()
        .join(" ")
}

fn draw_header(frame: &mut Frame, view: &View, chrome: &Chrome, area: Rect) {
    let theme = chrome.theme;
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" GitHub Stats ")
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let title = Paragraph::new(Span::styled(
        view_title(view),
        Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
    ));
    frame.render_widget(title, inner);

    if chrome.show_rotation_indicator
        && let Some((index, total)) = chrome.rotation
        && total > 1
    {
        let dots = Paragraph::new(Span::styled(
            rotation_dots(index, total),
            Style::default().fg(theme.accent),
        ))
        .alignment(Alignment::Right);
        frame.render_widget(dots, inner);
    }
}

fn stat_card(frame: &mut Frame, area: Rect, label: &str, value: &str, theme: Theme) {
    let block = Block::bordered()
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} ", label))
        .title_style(Style::default().fg(theme.text));
    let value = Paragraph::new(Span::styled(
        value.to_string(),
        Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .block(block);
    frame.render_widget(value, area);
}

fn card_row(frame: &mut Frame, area: Rect, cards: &[(&str, String)], theme: Theme) {
    if cards.is_empty() {
        return;
    }
    let constraints = vec![Constraint::Ratio(1, cards.len() as u32); cards.len()];
    let slots = Layout::horizontal(constraints).split(area);
    for (slot, (label, value)) in slots.iter().zip(cards) {
        stat_card(frame, *slot, label, value, theme);
    }
}

fn detail_line<'a>(label: &'a str, value: String, theme: Theme) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{:<16}", label), Style::default().fg(Color::DarkGray)),
        Span::styled(value, Style::default().fg(theme.text)),
    ])
}

fn draw_summary(frame: &mut Frame, summary: &AggregateSummary, theme: Theme, area: Rect) {
    let [top, middle, details] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    card_row(
        frame,
        top,
        &[
            ("Stars", summary.total_stars_formatted.clone()),
            ("Forks", summary.total_forks_formatted.clone()),
            ("Open Issues", format_number(summary.total_open_issues)),
            ("Active", summary.activity_ratio()),
        ],
        theme,
    );

    let mut highlights = vec![(
        "Most Starred",
        match &summary.most_starred {
            Some(top) => format!("{} ★{}", top.name, format_number(top.stars)),
            None => "No repos found".to_string(),
        },
    )];
    if let Some(downloads) = &summary.total_downloads_formatted {
        highlights.push(("Downloads", downloads.clone()));
    }
    if let Some(donations) = &summary.total_donations_formatted {
        highlights.push(("Donations", donations.clone()));
    }
    card_row(frame, middle, &highlights, theme);

    let lines = vec![
        detail_line("Repositories", summary.total_repos.to_string(), theme),
        detail_line(
            "Release DLs",
            format_number(summary.total_release_downloads),
            theme,
        ),
    ];
    frame.render_widget(Paragraph::new(lines).block(Block::default().padding(Padding::horizontal(1))), details);
}

fn draw_repo(frame: &mut Frame, repo: &RepoMetrics, theme: Theme, area: Rect) {
    let stats = &repo.stats;
    let [about, cards, details] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let description = if stats.description.is_empty() {
        "No description"
    } else {
        stats.description.as_str()
    };
    let about_text = vec![
        Line::from(Span::styled(
            stats.name.clone(),
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            truncate_text(description, about.width.saturating_sub(2) as usize),
            Style::default().fg(theme.text),
        )),
    ];
    frame.render_widget(Paragraph::new(about_text).block(Block::default().padding(Padding::horizontal(1))), about);

    card_row(
        frame,
        cards,
        &[
            ("Stars", repo.stars_formatted.clone()),
            ("Forks", repo.forks_formatted.clone()),
            ("Issues", format_number(stats.open_issues)),
            ("Language", stats.language.clone()),
        ],
        theme,
    );

    let commit = match &stats.last_commit {
        Some(commit) => format!(
            "{} {} ({})",
            commit.sha,
            truncate_text(&commit.message, 48),
            repo.last_commit_relative
        ),
        None => repo.last_commit_relative.clone(),
    };
    let release = match &stats.release_name {
        Some(name) => format!(
            "{} ({} downloads, {})",
            name,
            format_number(stats.release_downloads),
            format_datetime(stats.release_date.as_deref().and_then(parse_iso_datetime))
        ),
        None => "None".to_string(),
    };
    let activity = if repo.is_active { "Active" } else { "Inactive" };

    let lines = vec![
        detail_line("Last commit", commit, theme),
        detail_line("Updated", repo.last_updated_relative.clone(), theme),
        detail_line("Latest release", release, theme),
        detail_line("Contributors", stats.contributors_count.to_string(), theme),
        detail_line("Branch", stats.default_branch.clone(), theme),
        detail_line("Status", activity.to_string(), theme),
    ];
    frame.render_widget(Paragraph::new(lines).block(Block::default().padding(Padding::horizontal(1))), details);
}

fn draw_lines(frame: &mut Frame, lines: &[String], theme: Theme, area: Rect) {
    let text: Vec<Line> = lines
        .iter()
        .map(|l| Line::from(Span::styled(l.clone(), Style::default().fg(theme.text))))
        .collect();
    frame.render_widget(Paragraph::new(text).block(Block::default().padding(Padding::horizontal(1))), area);
}

fn draw_error(frame: &mut Frame, title: &str, message: &str, area: Rect) {
    let block = Block::bordered()
        .border_style(Style::default().fg(Color::Red))
        .title(format!(" {} ", title));
    let text = Paragraph::new(message.to_string())
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Red))
        .wrap(Wrap { trim: true })
        .block(block);
    frame.render_widget(text, area);
}

fn draw_empty(frame: &mut Frame, message: &str, area: Rect) {
    let text = Paragraph::new(message.to_string())
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true });
    frame.render_widget(text, area);
}

fn draw_status_bar(frame: &mut Frame, chrome: &Chrome, area: Rect) {
    let mut hints = vec![
        Span::raw(" q/Esc "),
        Span::styled("Quit", Style::default().fg(Color::DarkGray)),
    ];
    if let Some((index, total)) = chrome.rotation {
        hints.push(Span::styled(
            format!("  View {}/{}", index + 1, total),
            Style::default().fg(Color::DarkGray),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}
