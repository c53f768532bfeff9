use crate::config::AppConfig;
use crate::monitor::{FileEvent, FileMonitor};
use crate::ui::components::ChangeTreeView;
use crate::ui::Ui;
use crate::workspace::{DiffRange, WorkspaceManager};
use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::time::Duration;

const REFRESH_DEBOUNCE: Duration = Duration::from_millis(200);

pub struct ChangeApp {
    workspace: WorkspaceManager,
    view: ChangeTreeView,
    ui: Ui,
    config: AppConfig,
    monitor: Option<FileMonitor>,
    state: AppState,
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    should_quit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Normal,
    Command,
    Commit,
}

/// What the main loop should do after a key press.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    None,
    Quit,
    Refresh,
    Swap,
    SetRange(DiffRange),
    Commit(String),
}

impl ChangeApp {
    pub fn new(config: AppConfig, workspace: WorkspaceManager) -> Result<Self> {
        tracing::info!("ChangeApp::new for {:?}", workspace.project_dir());

        let monitor = if config.general.auto_refresh && workspace.is_git_repo() {
            match FileMonitor::new(&workspace.workdir()) {
                Ok(monitor) => Some(monitor),
                Err(e) => {
                    tracing::warn!("File monitor unavailable, auto refresh disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        tracing::info!("Terminal ready");

        Ok(Self {
            workspace,
            view: ChangeTreeView::new(),
            ui: Ui::new(),
            config,
            monitor,
            state: AppState::Normal,
            terminal,
            should_quit: false,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("App::run started");
        self.apply(Action::Refresh).await;

        let mut events = EventStream::new();

        while !self.should_quit {
            self.draw()?;

            tokio::select! {
                maybe_event = events.next() => match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        tracing::debug!("Key event: {:?}", key.code);
                        let action = self.handle_key_event(key);
                        self.apply(action).await;
                    }
                    Some(Ok(Event::Resize(width, height))) => {
                        tracing::debug!("Terminal resized to {}x{}", width, height);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => tracing::error!("Event stream error: {}", e),
                    None => self.should_quit = true,
                },
                Some(event) = next_file_event(&mut self.monitor) => {
                    tracing::debug!("Working copy changed at {:?}", event.path);
                    // Let a burst of writes settle into one refresh.
                    tokio::time::sleep(REFRESH_DEBOUNCE).await;
                    if let Some(monitor) = self.monitor.as_mut() {
                        monitor.try_drain();
                    }
                    self.apply(Action::Refresh).await;
                }
            }
        }

        self.cleanup()?;
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        let Self {
            terminal,
            ui,
            workspace,
            view,
            state,
            config,
            ..
        } = self;
        terminal.draw(|frame| ui.draw(frame, workspace, view, state, config))?;
        Ok(())
    }

    /// Runs an action; failures end up in the error popup, not in `run`.
    async fn apply(&mut self, action: Action) {
        let result = match action {
            Action::None => Ok(()),
            Action::Quit => {
                self.should_quit = true;
                Ok(())
            }
            Action::Refresh => self.workspace.refresh().await,
            Action::Swap => self.workspace.swap_range().await,
            Action::SetRange(range) => self.workspace.set_range(range).await,
            Action::Commit(message) => {
                let message = self.config.git.render_commit_message(&message);
                match self.workspace.commit(&message).await {
                    Ok(id) => {
                        self.ui.show_info(&format!("Committed {}", &id[..id.len().min(8)]));
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
        };

        if let Err(e) = result {
            tracing::error!("{:#}", e);
            self.ui.show_error(&format!("{e:#}"));
        }
        self.view.clamp(self.workspace.tree());
    }

    fn handle_key_event(&mut self, key: KeyEvent) -> Action {
        self.ui.clear_info();
        match self.state {
            AppState::Normal => self.handle_normal_mode(key),
            AppState::Command => self.handle_command_mode(key),
            AppState::Commit => self.handle_commit_mode(key),
        }
    }

    fn handle_normal_mode(&mut self, key: KeyEvent) -> Action {
        // Any key dismisses an error.
        if self.ui.has_error() {
            self.ui.close_popups();
            return Action::None;
        }

        let keys = &self.config.keybindings;
        let tree = self.workspace.tree();

        match (key.code, key.modifiers) {
            _ if is_quit_key(&key) => return Action::Quit,
            (KeyCode::Esc, _) => self.ui.close_popups(),
            (KeyCode::Char('j') | KeyCode::Down, _) => self.view.select_next(tree),
            (KeyCode::Char('k') | KeyCode::Up, _) => self.view.select_prev(),
            (KeyCode::Char('g') | KeyCode::Home, _) => self.view.select_first(),
            (KeyCode::Char('G') | KeyCode::End, _) => self.view.select_last(tree),
            (KeyCode::Enter | KeyCode::Char(' '), _) => self.view.toggle_selected(tree),
            (KeyCode::Char('e'), _) => self.view.expand_all(),
            (KeyCode::Char('E'), _) => self.view.collapse_all(tree),
            (KeyCode::Char('?'), _) => self.ui.toggle_help(),
            (KeyCode::Char(':'), _) => self.state = AppState::Command,
            (KeyCode::Char(c), _) if c == keys.refresh => return Action::Refresh,
            (KeyCode::Char(c), _) if c == keys.swap_range => return Action::Swap,
            (KeyCode::Char(c), _) if c == keys.commit => {
                if self.workspace.range().is_committable() {
                    self.ui.commit_dialog_mut().open(self.workspace.changes().len());
                    self.state = AppState::Commit;
                } else {
                    self.ui.show_error(&format!(
                        "Commits are only possible for HEAD → workspace, not {}",
                        self.workspace.range()
                    ));
                }
            }
            _ => {}
        }
        Action::None
    }

    fn handle_command_mode(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Esc => {
                self.state = AppState::Normal;
                self.ui.clear_command();
            }
            KeyCode::Enter => {
                let command = self.ui.get_command();
                self.state = AppState::Normal;
                self.ui.clear_command();
                return match parse_command(&command) {
                    Ok(action) => action,
                    Err(message) => {
                        self.ui.show_error(&message);
                        Action::None
                    }
                };
            }
            KeyCode::Backspace => self.ui.command_backspace(),
            KeyCode::Char(c) => self.ui.command_push(c),
            _ => {}
        }
        Action::None
    }

    fn handle_commit_mode(&mut self, key: KeyEvent) -> Action {
        let dialog = self.ui.commit_dialog_mut();
        match key.code {
            KeyCode::Esc => {
                dialog.close();
                self.state = AppState::Normal;
            }
            KeyCode::Enter => {
                let message = dialog.message().to_string();
                dialog.close();
                self.state = AppState::Normal;
                return Action::Commit(message);
            }
            KeyCode::Backspace => dialog.backspace(),
            KeyCode::Char(c) => dialog.push(c),
            _ => {}
        }
        Action::None
    }

    fn cleanup(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ChangeApp {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// `q`, `Ctrl+Q` and `Ctrl+C` leave the normal mode.
fn is_quit_key(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

async fn next_file_event(monitor: &mut Option<FileMonitor>) -> Option<FileEvent> {
    match monitor {
        Some(monitor) => monitor.next_event().await,
        None => std::future::pending().await,
    }
}

/// Parses a `:` command line.
pub fn parse_command(command: &str) -> Result<Action, String> {
    let parts: Vec<&str> = command.split_whitespace().collect();
    let Some((&name, args)) = parts.split_first() else {
        return Ok(Action::None);
    };

    match (name, args) {
        ("q" | "quit", _) => Ok(Action::Quit),
        ("refresh", _) => Ok(Action::Refresh),
        ("swap", _) => Ok(Action::Swap),
        ("diff", [left, right]) => Ok(Action::SetRange(DiffRange::new(left, right))),
        ("diff", [right]) => Ok(Action::SetRange(DiffRange::new("head", right))),
        ("diff", _) => Err("Usage: diff <left> <right>".to_string()),
        ("commit", []) => Err("Usage: commit <message>".to_string()),
        ("commit", words) => Ok(Action::Commit(words.join(" "))),
        _ => Err(format!("Unknown command: {name}")),
    }
}
