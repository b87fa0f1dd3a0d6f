use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use notify_rust::{Notification, Urgency};
use ratatui::{prelude::*, widgets::*};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Type Aliases & Constants
// ============================================================================

type Result<T> = std::result::Result<T, PomoError>;

const TICK_RATE: Duration = Duration::from_millis(16);
const STATUS_TTL: Duration = Duration::from_secs(4);
const EXPORT_FILE: &str = "pomodoro_task_list";
const MAX_TASK_NAME: usize = 120;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Clone)]
#[command(version, about = "🍅 pomotask - a terminal Pomodoro timer with a task checklist")]
struct Args {
    /// Countdown hours (overrides the 25-minute default)
    #[arg(short = 'H', long, value_parser = parse_non_negative)]
    hours: Option<f64>,
    /// Countdown minutes
    #[arg(short, long, value_parser = parse_non_negative)]
    minutes: Option<f64>,
    /// Countdown seconds
    #[arg(short, long, value_parser = parse_non_negative)]
    seconds: Option<f64>,
    /// File the task list is exported to
    #[arg(long, default_value = EXPORT_FILE)]
    export_path: PathBuf,
    /// Disable desktop notifications
    #[arg(long)]
    no_notify: bool,
    /// Write logs to this file (logging is off without it)
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Log filter, e.g. "info" or "pomotask=debug"
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_non_negative(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("{s:?} is not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err("value must be a non-negative number".into());
    }
    Ok(value)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
enum PomoError {
    #[error("task name must be between 1 and {MAX_TASK_NAME} characters (got {len})")]
    InvalidTaskName { len: usize },

    #[error("{field} must be a non-negative number (got {input:?})")]
    InvalidNumber { field: &'static str, input: String },

    #[error("task list is empty")]
    EmptyList,

    #[error("failed to write {path}: {source}")]
    Export {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid log level {0:?}")]
    LogLevel(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Data Models
// ============================================================================

#[derive(Clone, Copy, PartialEq, Debug)]
enum SettingsField {
    Hours,
    Minutes,
    Seconds,
}

impl SettingsField {
    fn label(self) -> &'static str {
        match self {
            Self::Hours => "hours",
            Self::Minutes => "minutes",
            Self::Seconds => "seconds",
        }
    }

    fn next(self) -> Self {
        match self {
            Self::Hours => Self::Minutes,
            Self::Minutes => Self::Seconds,
            Self::Seconds => Self::Hours,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Hours => Self::Seconds,
            Self::Minutes => Self::Hours,
            Self::Seconds => Self::Minutes,
        }
    }
}

#[derive(Clone, Debug)]
struct Settings {
    hours: f64,
    minutes: f64,
    seconds: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hours: 0.0,
            minutes: 25.0,
            seconds: 0.0,
        }
    }
}

impl Settings {
    fn duration_seconds(&self) -> f64 {
        self.hours * 3600.0 + self.minutes * 60.0 + self.seconds
    }

    fn get(&self, field: SettingsField) -> f64 {
        match field {
            SettingsField::Hours => self.hours,
            SettingsField::Minutes => self.minutes,
            SettingsField::Seconds => self.seconds,
        }
    }

    fn set(&mut self, field: SettingsField, input: &str) -> Result<()> {
        let value: f64 = input.trim().parse().map_err(|_| PomoError::InvalidNumber {
            field: field.label(),
            input: input.to_string(),
        })?;
        if !value.is_finite() || value < 0.0 {
            return Err(PomoError::InvalidNumber {
                field: field.label(),
                input: input.to_string(),
            });
        }
        match field {
            SettingsField::Hours => self.hours = value,
            SettingsField::Minutes => self.minutes = value,
            SettingsField::Seconds => self.seconds = value,
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum TimerEvent {
    Completed,
}

#[derive(Debug)]
struct CountdownTimer {
    remaining: f64,
    configured: f64,
    running: bool,
    last_tick: Option<Instant>,
}

impl CountdownTimer {
    fn new(configured: f64) -> Self {
        Self {
            remaining: configured,
            configured,
            running: false,
            last_tick: None,
        }
    }

    fn configure(&mut self, secs: f64) -> Result<()> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(PomoError::InvalidNumber {
                field: "duration",
                input: secs.to_string(),
            });
        }
        self.configured = secs;
        Ok(())
    }

    // Pause semantics: a stopped timer keeps its remaining time, and the
    // configured duration is only reloaded after the countdown ran to zero.
    fn start(&mut self, now: Instant) {
        if self.running {
            return;
        }
        if self.remaining <= 0.0 {
            self.remaining = self.configured;
        }
        self.last_tick = Some(now);
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn reset(&mut self) {
        self.remaining = self.configured;
    }

    fn tick(&mut self, now: Instant) -> Option<TimerEvent> {
        if !self.running {
            return None;
        }
        let last = self.last_tick?;
        self.remaining -= now.duration_since(last).as_secs_f64();
        self.last_tick = Some(now);
        if self.remaining <= 0.0 {
            // Clamp to exactly zero and report completion exactly once.
            self.remaining = 0.0;
            self.running = false;
            return Some(TimerEvent::Completed);
        }
        None
    }

    fn progress_ratio(&self) -> f64 {
        if self.configured <= 0.0 {
            return 0.0;
        }
        (1.0 - self.remaining / self.configured).clamp(0.0, 1.0)
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
struct Task {
    id: u64,
    #[serde(rename = "task_name")]
    name: String,
    done: bool,
}

#[derive(Default, Debug)]
struct TaskList {
    // Monotonic counter; ids are never reused, even after removals.
    next_id: u64,
    tasks: Vec<Task>,
}

impl TaskList {
    fn add(&mut self, name: &str) -> Result<Task> {
        let name = name.trim();
        let len = name.chars().count();
        if len == 0 || len > MAX_TASK_NAME {
            return Err(PomoError::InvalidTaskName { len });
        }
        self.next_id += 1;
        let task = Task {
            id: self.next_id,
            name: name.to_string(),
            done: false,
        };
        self.tasks.push(task.clone());
        Ok(task)
    }

    fn remove_last(&mut self) -> Result<Task> {
        self.tasks.pop().ok_or(PomoError::EmptyList)
    }

    fn finish_next(&mut self) -> Option<&Task> {
        let task = self.tasks.iter_mut().find(|t| !t.done)?;
        task.done = true;
        Some(&*task)
    }

    fn export(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.tasks)?;
        fs::write(path, json).map_err(|source| PomoError::Export {
            path: path.display().to_string(),
            source,
        })
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }
}

// ============================================================================
// Application State
// ============================================================================

#[derive(Clone, Copy, PartialEq, Debug)]
enum View {
    Dashboard,
    Settings,
    Help,
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum StatusLevel {
    Info,
    Error,
}

#[derive(Debug)]
struct StatusMessage {
    text: String,
    level: StatusLevel,
    posted: Instant,
}

struct App {
    settings: Settings,
    timer: CountdownTimer,
    tasks: TaskList,
    view: View,
    prompt_open: bool,
    prompt_input: String,
    prompt_error: Option<String>,
    settings_field: SettingsField,
    settings_editing: bool,
    settings_input: String,
    settings_error: Option<String>,
    status: Option<StatusMessage>,
    export_path: PathBuf,
    notifications: bool,
}

impl App {
    fn new(settings: Settings, export_path: PathBuf, notifications: bool) -> Self {
        let timer = CountdownTimer::new(settings.duration_seconds());
        Self {
            settings,
            timer,
            tasks: TaskList::default(),
            view: View::Dashboard,
            prompt_open: false,
            prompt_input: String::new(),
            prompt_error: None,
            settings_field: SettingsField::Hours,
            settings_editing: false,
            settings_input: String::new(),
            settings_error: None,
            status: None,
            export_path,
            notifications,
        }
    }

    fn post_status(&mut self, text: impl Into<String>, level: StatusLevel) {
        self.status = Some(StatusMessage {
            text: text.into(),
            level,
            posted: Instant::now(),
        });
    }

    fn open_task_prompt(&mut self) {
        self.view = View::Dashboard;
        self.prompt_open = true;
        self.prompt_input.clear();
        self.prompt_error = None;
    }

    fn close_task_prompt(&mut self) {
        self.prompt_open = false;
        self.prompt_input.clear();
        self.prompt_error = None;
    }

    fn submit_task(&mut self) {
        let input = self.prompt_input.clone();
        match self.tasks.add(&input) {
            Ok(task) => {
                info!(id = task.id, name = %task.name, "task added");
                self.post_status(format!("Added \"{}\"", task.name), StatusLevel::Info);
                self.close_task_prompt();
            }
            // Keep the prompt open so the name can be fixed in place.
            Err(err) => self.prompt_error = Some(err.to_string()),
        }
    }

    fn remove_last_task(&mut self) {
        match self.tasks.remove_last() {
            Ok(task) => {
                info!(id = task.id, name = %task.name, "task removed");
                self.post_status(format!("Removed \"{}\"", task.name), StatusLevel::Info);
            }
            Err(_) => debug!("remove requested on an empty task list"),
        }
    }

    fn finish_next_task(&mut self) {
        let finished = self.tasks.finish_next().map(|t| (t.id, t.name.clone()));
        if let Some((id, name)) = finished {
            info!(id, name = %name, "task finished");
            self.post_status(format!("Finished \"{name}\""), StatusLevel::Info);
        }
    }

    fn export_tasks(&mut self) {
        match self.tasks.export(&self.export_path) {
            Ok(()) => {
                info!(
                    path = %self.export_path.display(),
                    count = self.tasks.len(),
                    "tasks exported"
                );
                self.post_status(
                    format!(
                        "Exported {} tasks to {}",
                        self.tasks.len(),
                        self.export_path.display()
                    ),
                    StatusLevel::Info,
                );
            }
            Err(err) => {
                warn!(error = %err, "export failed");
                self.post_status(format!("Export failed: {err}"), StatusLevel::Error);
            }
        }
    }

    fn toggle_timer(&mut self, now: Instant) {
        if self.timer.running {
            self.timer.stop();
            debug!(remaining = self.timer.remaining, "timer stopped");
        } else {
            self.timer.start(now);
            debug!(remaining = self.timer.remaining, "timer started");
        }
    }

    fn reset_timer(&mut self) {
        self.timer.reset();
        debug!(remaining = self.timer.remaining, "timer reset");
    }

    fn open_settings_edit(&mut self) {
        self.settings_input = format_value(self.settings.get(self.settings_field));
        self.settings_editing = true;
        self.settings_error = None;
    }

    fn cancel_settings_edit(&mut self) {
        self.settings_editing = false;
        self.settings_input.clear();
        self.settings_error = None;
    }

    fn apply_settings_edit(&mut self) {
        let input = self.settings_input.clone();
        match self.settings.set(self.settings_field, &input) {
            Ok(()) => {
                // The configured duration always follows the settings.
                if let Err(err) = self.timer.configure(self.settings.duration_seconds()) {
                    self.settings_error = Some(err.to_string());
                    return;
                }
                info!(
                    field = self.settings_field.label(),
                    duration = self.timer.configured,
                    "settings updated"
                );
                self.cancel_settings_edit();
            }
            // Invalid input keeps the editor open and mutates nothing.
            Err(err) => self.settings_error = Some(err.to_string()),
        }
    }

    fn on_tick(&mut self, now: Instant) {
        if let Some(status) = &self.status {
            if now.duration_since(status.posted) >= STATUS_TTL {
                self.status = None;
            }
        }

        if let Some(TimerEvent::Completed) = self.timer.tick(now) {
            info!("countdown completed");
            let finished = self.tasks.finish_next().map(|t| t.name.clone());
            if self.notifications {
                notify_completion(finished.as_deref());
            }
            let text = match &finished {
                Some(name) => format!("Time's up! Finished \"{name}\""),
                None => "Time's up!".to_string(),
            };
            self.post_status(text, StatusLevel::Info);
        }
    }
}

// ============================================================================
// Event Handlers
// ============================================================================

fn handle_input(key: event::KeyEvent, app: &mut App) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if app.prompt_open {
        handle_task_prompt(key, app);
        return false;
    }

    if app.view == View::Settings && app.settings_editing {
        handle_settings_edit(key, app);
        return false;
    }

    match app.view {
        View::Settings => handle_settings_view(key, app),
        View::Help => handle_help_view(key, app),
        View::Dashboard => handle_dashboard_view(key, app),
    }
}

fn handle_task_prompt(key: event::KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Char(c) => app.prompt_input.push(c),
        KeyCode::Backspace => {
            app.prompt_input.pop();
        }
        KeyCode::Enter => app.submit_task(),
        KeyCode::Esc => app.close_task_prompt(),
        _ => {}
    }
}

fn handle_settings_edit(key: event::KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Char(c) => app.settings_input.push(c),
        KeyCode::Backspace => {
            app.settings_input.pop();
        }
        KeyCode::Enter => app.apply_settings_edit(),
        KeyCode::Esc => app.cancel_settings_edit(),
        _ => {}
    }
}

fn handle_dashboard_view(key: event::KeyEvent, app: &mut App) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        _ => handle_action_key(key, app),
    }
    false
}

fn handle_settings_view(key: event::KeyEvent, app: &mut App) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Esc => app.view = View::Dashboard,
        KeyCode::Up | KeyCode::Char('k') => app.settings_field = app.settings_field.prev(),
        KeyCode::Down | KeyCode::Char('j') => app.settings_field = app.settings_field.next(),
        KeyCode::Enter => app.open_settings_edit(),
        _ => handle_action_key(key, app),
    }
    false
}

fn handle_help_view(key: event::KeyEvent, app: &mut App) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Esc => app.view = View::Dashboard,
        _ => handle_action_key(key, app),
    }
    false
}

// Action keys shared by every view, mirroring the app-wide binding table.
fn handle_action_key(key: event::KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Char('a') => app.open_task_prompt(),
        KeyCode::Char('r') => app.remove_last_task(),
        KeyCode::Char('f') => app.finish_next_task(),
        KeyCode::Char('e') => app.export_tasks(),
        KeyCode::Char('d') => app.view = View::Dashboard,
        KeyCode::Char('s') => app.view = View::Settings,
        KeyCode::Char('h') | KeyCode::Char('?') => app.view = View::Help,
        KeyCode::Char(' ') => app.toggle_timer(Instant::now()),
        KeyCode::Char('R') => app.reset_timer(),
        _ => {}
    }
}

// ============================================================================
// UI Rendering
// ============================================================================

fn render_ui(f: &mut Frame, app: &App) {
    match app.view {
        View::Dashboard => render_dashboard(f, app),
        View::Settings => render_settings(f, app),
        View::Help => render_help(f),
    }

    if app.prompt_open {
        render_task_prompt(f, app);
    }
}

fn render_dashboard(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(9),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(f.size());

    // Header
    let header = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            " 🍅 POMOTASK ",
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        ));
    f.render_widget(header, chunks[0]);

    // Timer
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(chunks[1]);

    f.render_widget(
        Paragraph::new(format_clock(app.timer.remaining))
            .style(
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center),
        sections[1],
    );

    let run_status = if app.timer.running {
        Span::styled(
            "▶ RUNNING",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(
            "⏸ STOPPED",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    };
    f.render_widget(
        Paragraph::new(Line::from(run_status)).alignment(Alignment::Center),
        sections[2],
    );

    let now = chrono::Local::now();
    f.render_widget(
        Paragraph::new(now.format("%A, %B %d, %Y  %I:%M %p").to_string())
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center),
        sections[3],
    );

    f.render_widget(
        Gauge::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            )
            .gauge_style(Style::default().fg(Color::LightRed).bg(Color::Black))
            .percent((app.timer.progress_ratio() * 100.0) as u16),
        sections[5],
    );

    if let Some(status) = &app.status {
        let color = match status.level {
            StatusLevel::Info => Color::Green,
            StatusLevel::Error => Color::Red,
        };
        f.render_widget(
            Paragraph::new(status.text.as_str())
                .style(Style::default().fg(color))
                .alignment(Alignment::Center),
            sections[6],
        );
    }

    // Task list
    let mut lines = Vec::new();
    if app.tasks.tasks.is_empty() {
        lines.push(Line::from(Span::styled(
            "  No tasks yet! Press 'a' to add one.",
            Style::default().fg(Color::Gray),
        )));
    } else {
        for task in &app.tasks.tasks {
            let (marker, style) = if task.done {
                (
                    "[x]",
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::CROSSED_OUT),
                )
            } else {
                ("[ ]", Style::default().fg(Color::White))
            };
            lines.push(Line::from(vec![
                Span::styled(format!("  {marker} "), Style::default().fg(Color::Cyan)),
                Span::styled(task.name.clone(), style),
            ]));
        }
    }
    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(format!(" Tasks ({}) ", app.tasks.len()))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Cyan)),
        ),
        chunks[2],
    );

    // Controls
    let controls = vec![
        Line::from(vec![
            span_key("Space"),
            Span::raw(" Start/Stop  •  "),
            span_key("R"),
            Span::raw(" Reset  •  "),
            span_key("a"),
            Span::raw(" Add  •  "),
            span_key("r"),
            Span::raw(" Remove  •  "),
            span_key("f"),
            Span::raw(" Finish"),
        ]),
        Line::from(vec![
            span_key("e"),
            Span::raw(" Export  •  "),
            span_key("s"),
            Span::raw(" Settings  •  "),
            span_key("h"),
            Span::raw(" Help  •  "),
            span_key("q"),
            Span::raw(" Quit"),
        ]),
    ];
    f.render_widget(
        Paragraph::new(controls)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray)),
        chunks[3],
    );
}

fn span_key(text: &str) -> Span<'_> {
    Span::styled(
        text,
        Style::default()
            .fg(Color::LightRed)
            .add_modifier(Modifier::BOLD),
    )
}

fn render_settings(f: &mut Frame, app: &App) {
    let area = centered_rect(60, 70, f.size());

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "⚙  SETTINGS",
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "  ↑↓/jk: Navigate  •  Enter: Edit  •  Esc: Back",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )),
        Line::from(""),
    ];

    for field in [
        SettingsField::Hours,
        SettingsField::Minutes,
        SettingsField::Seconds,
    ] {
        let selected = app.settings_field == field;
        let editing = selected && app.settings_editing;

        lines.push(Line::from(""));

        if editing {
            lines.push(Line::from(vec![
                Span::styled(
                    "  > ",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    field.label(),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ),
            ]));
            lines.push(Line::from(vec![
                Span::raw("    "),
                Span::styled(
                    app.settings_input.clone(),
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                ),
                Span::styled("█", Style::default().fg(Color::Green)),
            ]));
        } else {
            let (prefix, label_style, value_style) = if selected {
                (
                    "  > ",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                )
            } else {
                (
                    "    ",
                    Style::default().fg(Color::Gray),
                    Style::default().fg(Color::DarkGray),
                )
            };
            lines.push(Line::from(vec![
                Span::styled(prefix, label_style),
                Span::styled(field.label(), label_style),
            ]));
            lines.push(Line::from(vec![
                Span::raw("    "),
                Span::styled(format_value(app.settings.get(field)), value_style),
            ]));
        }
    }

    lines.push(Line::from(""));
    if let Some(err) = &app.settings_error {
        lines.push(Line::from(Span::styled(
            format!("  ✗ {err}"),
            Style::default().fg(Color::Red),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            format!(
                "  Countdown: {}",
                format_clock(app.settings.duration_seconds())
            ),
            Style::default().fg(Color::Gray),
        )));
    }

    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" Settings ")
                .title_alignment(Alignment::Center)
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Cyan)),
        ),
        area,
    );
}

fn render_help(f: &mut Frame) {
    let area = centered_rect(70, 80, f.size());

    let help_text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "This is a Pomodoro app",
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from("  Set a countdown, collect tasks, execute and log them."),
        Line::from("  When the countdown ends, the next unfinished task is checked off."),
        Line::from(""),
        Line::from("  Timer:"),
        help_line("Space", "Start / stop the countdown"),
        help_line("R", "Reset to the configured duration"),
        Line::from(""),
        Line::from("  Tasks:"),
        help_line("a", "Add a task"),
        help_line("r", "Remove the most recent task"),
        help_line("f", "Finish the next open task"),
        help_line("e", "Export the task list to JSON"),
        Line::from(""),
        Line::from("  Navigation:"),
        help_line("d", "Dashboard"),
        help_line("s", "Settings"),
        help_line("h / ?", "Help"),
        help_line("q / Esc", "Quit / go back"),
        help_line("Ctrl+C", "Force quit"),
    ];

    f.render_widget(
        Paragraph::new(help_text).block(
            Block::default()
                .title(" Help ")
                .title_alignment(Alignment::Center)
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Cyan)),
        ),
        area,
    );
}

fn help_line<'a>(key: &'a str, desc: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::raw("    "),
        Span::styled(
            key,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  {desc}")),
    ])
}

fn render_task_prompt(f: &mut Frame, app: &App) {
    let area = centered_rect(60, 30, f.size());
    f.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Create a task",
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(
                app.prompt_input.clone(),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::styled("█", Style::default().fg(Color::Green)),
        ]),
        Line::from(""),
    ];

    if let Some(err) = &app.prompt_error {
        lines.push(Line::from(Span::styled(
            format!("  ✗ {err}"),
            Style::default().fg(Color::Red),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "  Enter: Save  •  Esc: Cancel",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" Add Task ")
                .title_alignment(Alignment::Center)
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Yellow)),
        ),
        area,
    );
}

fn centered_rect(w: u16, h: u16, r: Rect) -> Rect {
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h) / 2),
            Constraint::Percentage(h),
            Constraint::Percentage((100 - h) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w) / 2),
            Constraint::Percentage(w),
            Constraint::Percentage((100 - w) / 2),
        ])
        .split(v[1])[1]
}

// ============================================================================
// Utilities
// ============================================================================

fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (minutes, secs) = (total / 60, total % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as u64)
    } else {
        format!("{v:.2}")
    }
}

fn notify_completion(finished: Option<&str>) {
    let body = match finished {
        Some(name) => format!("Next task marked done: {name}"),
        None => "The countdown has finished.".to_string(),
    };
    if let Err(err) = Notification::new()
        .summary("Time's up! 🍅")
        .body(&body)
        .appname("pomotask")
        .icon("alarm-clock")
        .urgency(Urgency::Normal)
        .show()
    {
        debug!(error = %err, "desktop notification failed");
    }
}

fn init_tracing(level: &str, path: &Path) -> Result<()> {
    let filter =
        EnvFilter::try_new(level).map_err(|_| PomoError::LogLevel(level.to_string()))?;
    let file = fs::File::create(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.log_file {
        init_tracing(&args.log_level, path)?;
    }

    // Any explicit duration flag replaces the whole 25-minute default;
    // unset parts count as zero.
    let settings = if args.hours.is_some() || args.minutes.is_some() || args.seconds.is_some() {
        Settings {
            hours: args.hours.unwrap_or(0.0),
            minutes: args.minutes.unwrap_or(0.0),
            seconds: args.seconds.unwrap_or(0.0),
        }
    } else {
        Settings::default()
    };

    info!(
        duration = settings.duration_seconds(),
        export = %args.export_path.display(),
        "starting pomotask"
    );

    let mut app = App::new(settings, args.export_path, !args.no_notify);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    res
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| render_ui(f, app))?;

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if handle_input(key, app) {
                    info!("quit requested");
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            app.on_tick(Instant::now());
            last_tick = Instant::now();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn at(base: Instant, secs: f64) -> Instant {
        base + Duration::from_secs_f64(secs)
    }

    fn test_app(settings: Settings, export_path: PathBuf) -> App {
        App::new(settings, export_path, false)
    }

    // ------------------------------------------------------------------ timer

    #[test]
    fn tick_subtracts_the_measured_elapsed_delta() {
        let t0 = Instant::now();
        let mut timer = CountdownTimer::new(60.0);
        timer.start(t0);

        assert!(timer.tick(at(t0, 1.5)).is_none());
        assert!(timer.tick(at(t0, 4.0)).is_none());

        assert!((timer.remaining - 56.0).abs() < 1e-6);
        assert!(timer.running);
    }

    #[test]
    fn completion_clamps_to_zero_and_fires_once() {
        let t0 = Instant::now();
        let mut timer = CountdownTimer::new(10.0);
        timer.start(t0);

        assert!(timer.tick(at(t0, 4.0)).is_none());
        assert_eq!(timer.tick(at(t0, 12.0)), Some(TimerEvent::Completed));
        assert_eq!(timer.remaining, 0.0);
        assert!(!timer.running);

        // Later ticks must not re-fire or go negative.
        assert!(timer.tick(at(t0, 13.0)).is_none());
        assert_eq!(timer.remaining, 0.0);
    }

    #[test]
    fn stop_preserves_remaining_and_start_resumes() {
        let t0 = Instant::now();
        let mut timer = CountdownTimer::new(60.0);
        timer.start(t0);
        timer.tick(at(t0, 5.0));
        timer.stop();

        // Ticks while stopped change nothing.
        assert!(timer.tick(at(t0, 20.0)).is_none());
        assert!((timer.remaining - 55.0).abs() < 1e-6);

        // Resuming picks up from the paused value, not the full duration.
        timer.start(at(t0, 20.0));
        timer.tick(at(t0, 21.0));
        assert!((timer.remaining - 54.0).abs() < 1e-6);
    }

    #[test]
    fn reset_is_idempotent_and_keeps_the_running_flag() {
        let t0 = Instant::now();
        let mut timer = CountdownTimer::new(30.0);
        timer.start(t0);
        timer.tick(at(t0, 5.0));

        for _ in 0..3 {
            timer.reset();
            assert_eq!(timer.remaining, 30.0);
            assert!(timer.running);
        }

        timer.stop();
        timer.reset();
        assert_eq!(timer.remaining, 30.0);
        assert!(!timer.running);
    }

    #[test]
    fn start_after_completion_reloads_the_configured_duration() {
        let t0 = Instant::now();
        let mut timer = CountdownTimer::new(5.0);
        timer.start(t0);
        assert_eq!(timer.tick(at(t0, 6.0)), Some(TimerEvent::Completed));

        timer.start(at(t0, 10.0));
        assert_eq!(timer.remaining, 5.0);
        assert!(timer.running);
    }

    #[test]
    fn start_while_running_is_a_noop() {
        let t0 = Instant::now();
        let mut timer = CountdownTimer::new(60.0);
        timer.start(t0);
        timer.tick(at(t0, 10.0));

        timer.start(at(t0, 10.0));
        assert!((timer.remaining - 50.0).abs() < 1e-6);
        assert!(timer.running);
    }

    #[test]
    fn configure_rejects_bad_durations_and_keeps_remaining() {
        let mut timer = CountdownTimer::new(60.0);
        assert!(matches!(
            timer.configure(-1.0),
            Err(PomoError::InvalidNumber { .. })
        ));
        assert!(timer.configure(f64::NAN).is_err());
        assert_eq!(timer.configured, 60.0);

        timer.configure(90.0).expect("valid duration");
        assert_eq!(timer.configured, 90.0);
        assert_eq!(timer.remaining, 60.0);
    }

    #[test]
    fn progress_ratio_is_clamped() {
        let t0 = Instant::now();
        let mut timer = CountdownTimer::new(10.0);
        assert_eq!(timer.progress_ratio(), 0.0);

        timer.start(t0);
        timer.tick(at(t0, 5.0));
        assert!((timer.progress_ratio() - 0.5).abs() < 1e-6);

        timer.tick(at(t0, 20.0));
        assert_eq!(timer.progress_ratio(), 1.0);

        let empty = CountdownTimer::new(0.0);
        assert_eq!(empty.progress_ratio(), 0.0);
    }

    // ------------------------------------------------------------------ tasks

    #[test]
    fn add_validates_name_bounds() {
        let mut list = TaskList::default();

        assert!(matches!(
            list.add(""),
            Err(PomoError::InvalidTaskName { len: 0 })
        ));
        assert!(list.add("   ").is_err());
        assert!(list.add(&"x".repeat(121)).is_err());
        assert_eq!(list.len(), 0);

        assert!(list.add("x").is_ok());
        assert!(list.add(&"x".repeat(120)).is_ok());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn add_trims_surrounding_whitespace() {
        let mut list = TaskList::default();
        let task = list.add("  Write report  ").expect("valid name");
        assert_eq!(task.name, "Write report");
        assert!(!task.done);
    }

    #[test]
    fn remove_last_returns_the_newest_task() {
        let mut list = TaskList::default();
        list.add("X").expect("valid name");
        list.add("Y").expect("valid name");

        let removed = list.remove_last().expect("non-empty list");
        assert_eq!(removed.name, "Y");
        assert_eq!(list.tasks.len(), 1);
        assert_eq!(list.tasks[0].name, "X");
    }

    #[test]
    fn remove_last_on_an_empty_list_fails() {
        let mut list = TaskList::default();
        assert!(matches!(list.remove_last(), Err(PomoError::EmptyList)));
    }

    #[test]
    fn ids_are_never_reused_after_a_removal() {
        let mut list = TaskList::default();
        assert_eq!(list.add("A").expect("valid name").id, 1);
        assert_eq!(list.add("B").expect("valid name").id, 2);
        list.remove_last().expect("non-empty list");
        assert_eq!(list.add("C").expect("valid name").id, 3);
    }

    #[test]
    fn finish_next_marks_tasks_in_insertion_order() {
        let mut list = TaskList::default();
        list.add("A").expect("valid name");
        list.add("B").expect("valid name");
        list.add("C").expect("valid name");
        list.tasks[2].done = true;

        assert_eq!(list.finish_next().map(|t| t.name.clone()), Some("A".into()));
        assert!(list.tasks[0].done);
        assert!(!list.tasks[1].done);
        assert!(list.tasks[2].done);

        assert_eq!(list.finish_next().map(|t| t.name.clone()), Some("B".into()));
        assert!(list.finish_next().is_none());
    }

    #[test]
    fn finish_next_on_an_empty_list_is_a_noop() {
        let mut list = TaskList::default();
        assert!(list.finish_next().is_none());
    }

    #[test]
    fn export_writes_task_name_records() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(EXPORT_FILE);

        let mut list = TaskList::default();
        list.add("Write report").expect("valid name");
        list.export(&path).expect("export succeeds");

        let raw = fs::read_to_string(&path).expect("export file exists");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("valid JSON");
        assert_eq!(value[0]["task_name"], "Write report");
        assert_eq!(value[0]["done"], false);
    }

    #[test]
    fn export_round_trip_reconstructs_the_list() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(EXPORT_FILE);

        let mut list = TaskList::default();
        list.add("Write report").expect("valid name");
        list.add("Review notes").expect("valid name");
        list.finish_next();
        list.export(&path).expect("export succeeds");

        let raw = fs::read_to_string(&path).expect("export file exists");
        let restored: Vec<Task> = serde_json::from_str(&raw).expect("valid JSON");
        assert_eq!(restored, list.tasks);
    }

    #[test]
    fn export_overwrites_the_previous_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(EXPORT_FILE);

        let mut list = TaskList::default();
        list.add("A").expect("valid name");
        list.add("B").expect("valid name");
        list.export(&path).expect("export succeeds");

        list.remove_last().expect("non-empty list");
        list.export(&path).expect("export succeeds");

        let raw = fs::read_to_string(&path).expect("export file exists");
        let restored: Vec<Task> = serde_json::from_str(&raw).expect("valid JSON");
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].name, "A");
    }

    #[test]
    fn export_into_a_missing_directory_fails() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("missing").join(EXPORT_FILE);

        let mut list = TaskList::default();
        list.add("A").expect("valid name");
        assert!(matches!(list.export(&path), Err(PomoError::Export { .. })));
    }

    // --------------------------------------------------------------- settings

    #[test]
    fn settings_default_to_twenty_five_minutes() {
        let settings = Settings::default();
        assert_eq!(settings.duration_seconds(), 1500.0);
    }

    #[test]
    fn settings_reject_non_numeric_input() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.set(SettingsField::Hours, "abc"),
            Err(PomoError::InvalidNumber { field: "hours", .. })
        ));
        assert_eq!(settings.duration_seconds(), 1500.0);
    }

    #[test]
    fn settings_reject_negative_input() {
        let mut settings = Settings::default();
        assert!(settings.set(SettingsField::Minutes, "-5").is_err());
        assert_eq!(settings.minutes, 25.0);
    }

    #[test]
    fn settings_accept_decimal_input() {
        let mut settings = Settings::default();
        settings
            .set(SettingsField::Minutes, "1.5")
            .expect("valid input");
        settings
            .set(SettingsField::Seconds, " 30 ")
            .expect("valid input");
        assert_eq!(settings.duration_seconds(), 120.0);
    }

    #[test]
    fn duration_combines_all_fields() {
        let settings = Settings {
            hours: 1.0,
            minutes: 30.0,
            seconds: 15.0,
        };
        assert_eq!(settings.duration_seconds(), 5415.0);
    }

    // ------------------------------------------------------------- formatting

    #[test]
    fn clock_formats_hours_minutes_seconds() {
        assert_eq!(format_clock(0.0), "00:00:00");
        assert_eq!(format_clock(1500.0), "00:25:00");
        assert_eq!(format_clock(3725.0), "01:02:05");
    }

    #[test]
    fn clock_rounds_fractional_seconds() {
        assert_eq!(format_clock(59.6), "00:01:00");
        assert_eq!(format_clock(0.4), "00:00:00");
    }

    #[test]
    fn clock_widens_past_ninety_nine_hours() {
        assert_eq!(format_clock(360_000.0), "100:00:00");
    }

    #[test]
    fn clock_clamps_negative_input() {
        assert_eq!(format_clock(-5.0), "00:00:00");
    }

    // -------------------------------------------------------------------- cli

    #[test]
    fn non_negative_parser_accepts_zero_and_decimals() {
        assert_eq!(parse_non_negative("0"), Ok(0.0));
        assert_eq!(parse_non_negative(" 1.5 "), Ok(1.5));
    }

    #[test]
    fn non_negative_parser_rejects_junk() {
        assert!(parse_non_negative("abc").is_err());
        assert!(parse_non_negative("-1").is_err());
        assert!(parse_non_negative("inf").is_err());
    }

    // -------------------------------------------------------------------- app

    #[test]
    fn completion_marks_the_next_task_done() {
        let dir = TempDir::new().expect("temp dir");
        let settings = Settings {
            hours: 0.0,
            minutes: 0.0,
            seconds: 2.0,
        };
        let mut app = test_app(settings, dir.path().join(EXPORT_FILE));
        app.tasks.add("first").expect("valid name");
        app.tasks.add("second").expect("valid name");

        let t0 = Instant::now();
        app.timer.start(t0);
        app.on_tick(at(t0, 3.0));

        assert!(app.tasks.tasks[0].done);
        assert!(!app.tasks.tasks[1].done);
        assert!(!app.timer.running);
        assert!(app
            .status
            .as_ref()
            .is_some_and(|s| s.text.contains("Time's up")));
    }

    #[test]
    fn completion_with_no_open_tasks_still_posts_a_status() {
        let dir = TempDir::new().expect("temp dir");
        let settings = Settings {
            hours: 0.0,
            minutes: 0.0,
            seconds: 1.0,
        };
        let mut app = test_app(settings, dir.path().join(EXPORT_FILE));

        let t0 = Instant::now();
        app.timer.start(t0);
        app.on_tick(at(t0, 2.0));

        assert!(app.status.is_some());
    }

    #[test]
    fn submit_task_keeps_the_prompt_open_on_invalid_names() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = test_app(Settings::default(), dir.path().join(EXPORT_FILE));

        app.open_task_prompt();
        app.submit_task();
        assert!(app.prompt_open);
        assert!(app.prompt_error.is_some());
        assert_eq!(app.tasks.len(), 0);

        app.prompt_input = "Write tests".to_string();
        app.submit_task();
        assert!(!app.prompt_open);
        assert_eq!(app.tasks.len(), 1);
    }

    #[test]
    fn apply_settings_edit_reconfigures_the_timer() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = test_app(Settings::default(), dir.path().join(EXPORT_FILE));

        app.view = View::Settings;
        app.settings_field = SettingsField::Minutes;
        app.open_settings_edit();
        app.settings_input = "1".to_string();
        app.apply_settings_edit();

        assert!(!app.settings_editing);
        assert_eq!(app.timer.configured, 60.0);
        // The running countdown is untouched until a start or reset.
        assert_eq!(app.timer.remaining, 1500.0);
    }

    #[test]
    fn invalid_settings_input_keeps_the_editor_open() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = test_app(Settings::default(), dir.path().join(EXPORT_FILE));

        app.view = View::Settings;
        app.open_settings_edit();
        app.settings_input = "not a number".to_string();
        app.apply_settings_edit();

        assert!(app.settings_editing);
        assert!(app.settings_error.is_some());
        assert_eq!(app.timer.configured, 1500.0);
    }

    #[test]
    fn export_failure_posts_an_error_status() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = test_app(
            Settings::default(),
            dir.path().join("missing").join(EXPORT_FILE),
        );
        app.tasks.add("A").expect("valid name");

        app.export_tasks();
        assert!(app
            .status
            .as_ref()
            .is_some_and(|s| s.level == StatusLevel::Error));
    }

    #[test]
    fn export_success_posts_an_info_status() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(EXPORT_FILE);
        let mut app = test_app(Settings::default(), path.clone());
        app.tasks.add("A").expect("valid name");

        app.export_tasks();
        assert!(app
            .status
            .as_ref()
            .is_some_and(|s| s.level == StatusLevel::Info));
        assert!(path.exists());
    }

    #[test]
    fn remove_on_an_empty_list_is_silent_at_the_app_level() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = test_app(Settings::default(), dir.path().join(EXPORT_FILE));

        app.remove_last_task();
        assert!(app.status.is_none());
    }

    #[test]
    fn quit_keys_are_honored_per_view() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = test_app(Settings::default(), dir.path().join(EXPORT_FILE));

        let quit = event::KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(handle_input(quit, &mut app));

        app.view = View::Help;
        let esc = event::KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert!(!handle_input(esc, &mut app));
        assert_eq!(app.view, View::Dashboard);

        let ctrl_c = event::KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(handle_input(ctrl_c, &mut app));
    }

    #[test]
    fn add_key_opens_the_prompt_from_any_view() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = test_app(Settings::default(), dir.path().join(EXPORT_FILE));
        app.view = View::Settings;

        let add = event::KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        handle_input(add, &mut app);

        assert_eq!(app.view, View::Dashboard);
        assert!(app.prompt_open);
    }

    #[test]
    fn prompt_input_captures_typed_characters() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = test_app(Settings::default(), dir.path().join(EXPORT_FILE));
        app.open_task_prompt();

        for c in "hi".chars() {
            let key = event::KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
            handle_input(key, &mut app);
        }
        let back = event::KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE);
        handle_input(back, &mut app);

        assert_eq!(app.prompt_input, "h");
    }
}
