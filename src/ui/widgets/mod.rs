use crate::change::ChangeStatus;
use crate::config::StatusColors;
use crate::tree::StatusMarker;
use crate::ui::components::TreeRow;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use unicode_width::UnicodeWidthStr;

pub struct ChangeTreeWidget<'a> {
    rows: &'a [TreeRow],
    selected: usize,
    colors: &'a StatusColors,
    show_markers: bool,
    selection: Color,
    title: String,
}

impl<'a> ChangeTreeWidget<'a> {
    pub fn new(rows: &'a [TreeRow], colors: &'a StatusColors) -> Self {
        Self {
            rows,
            selected: 0,
            colors,
            show_markers: true,
            selection: Color::DarkGray,
            title: "Changes".to_string(),
        }
    }

    pub fn selected(mut self, selected: usize) -> Self {
        self.selected = selected;
        self
    }

    pub fn show_markers(mut self, show: bool) -> Self {
        self.show_markers = show;
        self
    }

    pub fn selection_color(mut self, color: Color) -> Self {
        self.selection = color;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

impl Widget for ChangeTreeWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(self.title.as_str());

        let inner = block.inner(area);
        block.render(area, buf);

        if inner.width == 0 || inner.height == 0 {
            return;
        }

        if self.rows.is_empty() {
            let empty = Line::styled("No changes", Style::default().fg(Color::DarkGray));
            buf.set_line(inner.x, inner.y, &empty, inner.width);
            return;
        }

        let height = inner.height as usize;
        let offset = (self.selected + 1).saturating_sub(height);

        for (i, row) in self.rows.iter().skip(offset).take(height).enumerate() {
            let y = inner.y + i as u16;
            let mut line = row_line(row, self.colors, self.show_markers, inner.width as usize);
            if offset + i == self.selected {
                line = line.patch_style(Style::default().bg(self.selection));
                buf.set_style(Rect::new(inner.x, y, inner.width, 1), Style::default().bg(self.selection));
            }
            buf.set_line(inner.x, y, &line, inner.width);
        }
    }
}

/// Background colours picked by `appearance.theme`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub bar: Color,
    pub selection: Color,
}

impl Palette {
    pub fn for_theme(theme: &str) -> Self {
        match theme.to_ascii_lowercase().as_str() {
            "light" => Self {
                bar: Color::Gray,
                selection: Color::LightBlue,
            },
            "dark" => Self::dark(),
            other => {
                tracing::debug!("Unknown theme {:?}, using dark", other);
                Self::dark()
            }
        }
    }

    fn dark() -> Self {
        Self {
            bar: Color::DarkGray,
            selection: Color::DarkGray,
        }
    }
}

pub fn parse_color(name: &str) -> Color {
    name.parse().unwrap_or(Color::White)
}

pub fn status_color(status: ChangeStatus, colors: &StatusColors) -> Color {
    match status {
        ChangeStatus::Deleted => parse_color(&colors.deleted),
        ChangeStatus::Modified => parse_color(&colors.modified),
        ChangeStatus::Untracked => parse_color(&colors.untracked),
    }
}

/// Directory rows get a fold arrow; file rows get status colour and a
/// right-aligned marker.
pub fn row_line(row: &TreeRow, colors: &StatusColors, show_markers: bool, width: usize) -> Line<'static> {
    let indent = "  ".repeat(row.depth);

    let Some(status) = row.status else {
        let arrow = if row.expanded { "▼ " } else { "▶ " };
        return Line::from(vec![
            Span::raw(indent),
            Span::styled(arrow, Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("{}/", row.title),
                Style::default()
                    .fg(parse_color(&colors.directory))
                    .add_modifier(Modifier::BOLD),
            ),
        ]);
    };

    let marker = StatusMarker::for_status(status);
    let mut name_style = Style::default().fg(status_color(status, colors));
    if marker.strikethrough {
        name_style = name_style.add_modifier(Modifier::CROSSED_OUT);
    }

    let prefix = format!("{indent}  ");
    let mut spans = vec![
        Span::raw(prefix.clone()),
        Span::styled(row.title.clone(), name_style),
    ];

    if show_markers {
        let used = prefix.width() + row.title.width();
        let label = marker.label;
        let padding = width.saturating_sub(used + label.width()).max(1);
        spans.push(Span::raw(" ".repeat(padding)));
        spans.push(Span::styled(label, Style::default().fg(Color::DarkGray)));
    }

    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use pretty_assertions::assert_eq;

    fn row(title: &str, status: Option<ChangeStatus>) -> TreeRow {
        TreeRow {
            depth: 1,
            path: format!("dir/{title}"),
            title: title.to_string(),
            is_leaf: status.is_some(),
            expanded: status.is_none(),
            status,
        }
    }

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn deleted_files_are_struck_through() {
        let colors = AppConfig::default().appearance.colors;
        let line = row_line(&row("old.rs", Some(ChangeStatus::Deleted)), &colors, true, 30);

        assert!(line.spans[1].style.add_modifier.contains(Modifier::CROSSED_OUT));
        assert_eq!(line.spans[1].style.fg, Some(Color::Red));
        assert!(text(&line).ends_with("Deleted"));
        assert_eq!(text(&line).width(), 30);
    }

    #[test]
    fn modified_and_untracked_carry_markers_only() {
        let colors = AppConfig::default().appearance.colors;
        for (status, label) in [
            (ChangeStatus::Modified, "Modified"),
            (ChangeStatus::Untracked, "Untracked"),
        ] {
            let line = row_line(&row("a.rs", Some(status)), &colors, true, 40);
            assert!(!line.spans[1].style.add_modifier.contains(Modifier::CROSSED_OUT));
            assert!(text(&line).ends_with(label));
        }
    }

    #[test]
    fn markers_can_be_hidden() {
        let colors = AppConfig::default().appearance.colors;
        let line = row_line(&row("a.rs", Some(ChangeStatus::Modified)), &colors, false, 40);
        assert_eq!(text(&line), "    a.rs");
    }

    #[test]
    fn directories_have_no_marker() {
        let colors = AppConfig::default().appearance.colors;
        let line = row_line(&row("src", None), &colors, true, 40);
        assert_eq!(text(&line), "  ▼ src/");
    }

    #[test]
    fn unknown_colors_fall_back() {
        assert_eq!(parse_color("not-a-colour"), Color::White);
        assert_eq!(parse_color("green"), Color::Green);
    }

    #[test]
    fn renders_selected_row_into_buffer() {
        let colors = AppConfig::default().appearance.colors;
        let rows = vec![row("src", None), row("a.rs", Some(ChangeStatus::Modified))];
        let area = Rect::new(0, 0, 30, 4);
        let mut buf = Buffer::empty(area);

        ChangeTreeWidget::new(&rows, &colors)
            .selected(1)
            .render(area, &mut buf);

        assert_eq!(buf[(1, 2)].bg, Color::DarkGray);
        assert_eq!(buf[(5, 2)].symbol(), "a");
    }

    #[test]
    fn theme_picks_selection_background() {
        let colors = AppConfig::default().appearance.colors;
        let rows = vec![row("a.rs", Some(ChangeStatus::Modified))];
        let area = Rect::new(0, 0, 30, 3);
        let mut buf = Buffer::empty(area);

        let palette = Palette::for_theme("Light");
        ChangeTreeWidget::new(&rows, &colors)
            .selection_color(palette.selection)
            .render(area, &mut buf);

        assert_eq!(buf[(1, 1)].bg, Color::LightBlue);
        assert_eq!(Palette::for_theme("dark").bar, Color::DarkGray);
        assert_eq!(Palette::for_theme("solarized"), Palette::for_theme("dark"));
    }
}
