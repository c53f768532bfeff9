pub mod widgets;
pub mod components;

use crate::app::AppState;
use crate::change::ChangeStatus;
use crate::config::{AppConfig, KeybindingsConfig};
use crate::tree::common_directory;
use crate::workspace::WorkspaceManager;
use components::{ChangeTreeView, CommitDialog};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

pub struct Ui {
    command_buffer: String,
    error_message: Option<String>,
    info_message: Option<String>,
    show_help: bool,
    commit_dialog: CommitDialog,
}

impl Ui {
    pub fn new() -> Self {
        Self {
            command_buffer: String::new(),
            error_message: None,
            info_message: None,
            show_help: false,
            commit_dialog: CommitDialog::new(),
        }
    }

    pub fn draw(
        &self,
        frame: &mut Frame,
        workspace: &WorkspaceManager,
        view: &ChangeTreeView,
        state: &AppState,
        config: &AppConfig,
    ) {
        let size = frame.area();
        let palette = widgets::Palette::for_theme(&config.appearance.theme);

        // Main layout: header, body, footer
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Header
                Constraint::Min(3),    // Body
                Constraint::Length(1), // Footer
            ])
            .split(size);

        self.draw_header(frame, chunks[0], workspace, &palette);
        self.draw_tree(frame, chunks[1], workspace, view, config, &palette);
        self.draw_footer(frame, chunks[2], state, &config.keybindings, &palette);

        if matches!(state, AppState::Command) {
            self.draw_command_line(frame);
        }

        if self.commit_dialog.is_open() {
            self.draw_commit_dialog(frame);
        }

        if let Some(ref error) = self.error_message {
            self.draw_error(frame, error);
        }

        if self.show_help {
            self.draw_help(frame, &config.keybindings);
        }
    }

    fn draw_header(
        &self,
        frame: &mut Frame,
        area: Rect,
        workspace: &WorkspaceManager,
        palette: &widgets::Palette,
    ) {
        let changes = workspace.changes();
        let branch = workspace
            .branch()
            .map(|b| b.name.clone())
            .unwrap_or_else(|| "-".to_string());
        let last_commit = workspace
            .branch()
            .and_then(|b| b.last_commit.as_ref())
            .map(|c| {
                let summary = c.message.first().map(String::as_str).unwrap_or("");
                format!(" @ {} {} ({}, {})", &c.hash[..c.hash.len().min(8)], summary, c.author, c.date)
            })
            .unwrap_or_default();

        let mut header_text = vec![
            Span::raw("[Project: "),
            Span::styled(workspace.project_name(), Style::default().fg(Color::Cyan)),
            Span::raw("] [Branch: "),
            Span::styled(branch, Style::default().fg(Color::Green)),
            Span::raw(last_commit),
            Span::raw("] ["),
            Span::styled(workspace.range().to_string(), Style::default().fg(Color::Yellow)),
            Span::raw("] "),
        ];

        for (status, color) in [
            (ChangeStatus::Modified, Color::Yellow),
            (ChangeStatus::Untracked, Color::Green),
            (ChangeStatus::Deleted, Color::Red),
        ] {
            header_text.push(Span::styled(
                format!("{}{} ", status.short(), changes.count(status)),
                Style::default().fg(color),
            ));
        }

        if let Some(dir) = common_directory(workspace.tree()) {
            header_text.push(Span::raw(format!("[in: {dir}]")));
        }

        let header = Paragraph::new(Line::from(header_text))
            .style(Style::default().bg(palette.bar));

        frame.render_widget(header, area);
    }

    fn draw_tree(
        &self,
        frame: &mut Frame,
        area: Rect,
        workspace: &WorkspaceManager,
        view: &ChangeTreeView,
        config: &AppConfig,
        palette: &widgets::Palette,
    ) {
        let rows = view.visible_rows(workspace.tree());
        let title = if workspace.is_git_repo() {
            format!("Changes ({})", workspace.changes().len())
        } else {
            "Not a git repository".to_string()
        };

        let widget = widgets::ChangeTreeWidget::new(&rows, &config.appearance.colors)
            .selected(view.selected())
            .show_markers(config.appearance.show_markers)
            .selection_color(palette.selection)
            .title(title);

        frame.render_widget(widget, area);
    }

    fn draw_footer(
        &self,
        frame: &mut Frame,
        area: Rect,
        state: &AppState,
        keys: &KeybindingsConfig,
        palette: &widgets::Palette,
    ) {
        let footer = Paragraph::new(Line::from(footer_spans(
            state,
            keys,
            self.info_message.as_deref(),
        )))
        .style(Style::default().bg(palette.bar));

        frame.render_widget(footer, area);
    }

    fn draw_command_line(&self, frame: &mut Frame) {
        let area = centered_rect(60, 3, frame.area());

        let block = Block::default()
            .title("Command")
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Yellow));

        let input = Paragraph::new(format!(":{}", self.command_buffer))
            .block(block)
            .style(Style::default());

        frame.render_widget(Clear, area);
        frame.render_widget(input, area);
    }

    fn draw_commit_dialog(&self, frame: &mut Frame) {
        let area = centered_rect(60, 5, frame.area());

        let block = Block::default()
            .title(format!("Commit {} files (Enter to commit, Esc to cancel)", self.commit_dialog.file_count()))
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Green));

        let input = Paragraph::new(format!("{}▏", self.commit_dialog.message()))
            .block(block)
            .wrap(ratatui::widgets::Wrap { trim: false });

        frame.render_widget(Clear, area);
        frame.render_widget(input, area);
    }

    fn draw_error(&self, frame: &mut Frame, message: &str) {
        let area = centered_rect(50, 5, frame.area());

        let block = Block::default()
            .title("Error (Esc to dismiss)")
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Red));

        let text = Paragraph::new(message)
            .block(block)
            .wrap(ratatui::widgets::Wrap { trim: true });

        frame.render_widget(Clear, area);
        frame.render_widget(text, area);
    }

    fn draw_help(&self, frame: &mut Frame, keys: &KeybindingsConfig) {
        let area = centered_rect(60, 20, frame.area());

        let block = Block::default()
            .title("Help")
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Cyan));

        let text = Paragraph::new(help_lines(keys).join("\n"))
            .block(block)
            .style(Style::default());

        frame.render_widget(Clear, area);
        frame.render_widget(text, area);
    }

    pub fn command_push(&mut self, c: char) {
        self.command_buffer.push(c);
    }

    pub fn command_backspace(&mut self) {
        self.command_buffer.pop();
    }

    pub fn get_command(&self) -> String {
        self.command_buffer.clone()
    }

    pub fn clear_command(&mut self) {
        self.command_buffer.clear();
    }

    pub fn show_error(&mut self, message: &str) {
        self.error_message = Some(message.to_string());
    }

    pub fn has_error(&self) -> bool {
        self.error_message.is_some()
    }

    pub fn show_info(&mut self, message: &str) {
        self.info_message = Some(message.to_string());
    }

    /// Info lines last until the next key press.
    pub fn clear_info(&mut self) {
        self.info_message = None;
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn close_popups(&mut self) {
        self.show_help = false;
        self.error_message = None;
    }

    pub fn commit_dialog_mut(&mut self) -> &mut CommitDialog {
        &mut self.commit_dialog
    }
}

fn footer_spans(
    state: &AppState,
    keys: &KeybindingsConfig,
    info: Option<&str>,
) -> Vec<Span<'static>> {
    let mode_text = match state {
        AppState::Normal => "NORMAL",
        AppState::Command => "COMMAND",
        AppState::Commit => "COMMIT",
    };
    let key = |k: String| Span::styled(k, Style::default().fg(Color::Yellow));

    let mut spans = vec![
        Span::raw("["),
        key("q".to_string()),
        Span::raw(" Quit] ["),
        key(keys.refresh.to_string()),
        Span::raw(" Refresh] ["),
        key(keys.swap_range.to_string()),
        Span::raw(" Swap] ["),
        key(keys.commit.to_string()),
        Span::raw(" Commit] ["),
        key("?".to_string()),
        Span::raw(" Help] [Mode: "),
        Span::styled(mode_text, Style::default().fg(Color::Cyan)),
        Span::raw("]"),
    ];

    if let Some(info) = info {
        spans.push(Span::styled(format!(" {info}"), Style::default().fg(Color::Green)));
    }
    spans
}

fn help_lines(keys: &KeybindingsConfig) -> Vec<String> {
    let mut lines: Vec<String> = [
        "Navigation:",
        "  j/k, ↓/↑     - Move selection",
        "  g/G          - First / last row",
        "  Enter/Space  - Expand or collapse directory",
        "  e/E          - Expand / collapse all",
        "",
        "Changes:",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    lines.push(format!("  {:<12} - Refresh", keys.refresh));
    lines.push(format!("  {:<12} - Swap diff direction", keys.swap_range));
    lines.push(format!("  {:<12} - Commit working copy", keys.commit));

    lines.extend(
        [
            "",
            "Commands (:):",
            "  diff <left> <right>, swap, refresh,",
            "  commit <message>, quit",
            "",
            "q, Ctrl+Q, Ctrl+C quit. Press Esc to close help",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    lines
}

fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height),
            Constraint::Fill(1),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_is_centered() {
        let area = centered_rect(50, 4, Rect::new(0, 0, 100, 40));
        assert_eq!(area.height, 4);
        assert_eq!(area.width, 50);
        assert_eq!(area.x, 25);
        assert_eq!(area.y, 18);
    }

    #[test]
    fn escape_closes_help_and_errors() {
        let mut ui = Ui::new();
        ui.toggle_help();
        ui.show_error("boom");
        assert!(ui.has_error());
        ui.close_popups();
        assert!(!ui.has_error());
        assert!(!ui.show_help);
    }

    fn text(spans: &[Span]) -> String {
        spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn footer_and_help_follow_configured_keys() {
        let keys = KeybindingsConfig {
            refresh: 'R',
            swap_range: 'x',
            commit: 'w',
        };

        let footer = text(&footer_spans(&AppState::Normal, &keys, None));
        assert!(footer.contains("[R Refresh] [x Swap] [w Commit]"), "{footer}");
        assert!(footer.ends_with("[Mode: NORMAL]"));

        let help = help_lines(&keys);
        assert!(help.contains(&"  R            - Refresh".to_string()));
        assert!(help.contains(&"  x            - Swap diff direction".to_string()));
        assert!(help.contains(&"  w            - Commit working copy".to_string()));
    }

    #[test]
    fn info_message_is_shown_until_cleared() {
        let keys = AppConfig::default().keybindings;
        let mut ui = Ui::new();
        ui.show_info("Committed abc12345");

        let footer = text(&footer_spans(&AppState::Normal, &keys, ui.info_message.as_deref()));
        assert!(footer.ends_with(" Committed abc12345"));

        ui.clear_info();
        assert_eq!(ui.info_message, None);
    }
}
