//! Login view: username and masked password form.

use ratatui::layout::Rect;
use ratatui::style::Modifier;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::{AppState, LoginField};
use crate::theme;
use crate::ui::centered_rect;

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let form = &app.login;
    let popup = centered_rect(50, 50, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::accent())
        .title(" Log in ")
        .title_style(theme::accent_bold());
    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let masked = "*".repeat(form.password.chars().count());
    let mut lines = vec![
        Line::from(""),
        field_line("Username", &form.username, form.focus == LoginField::Username),
        Line::from(""),
        field_line("Password", &masked, form.focus == LoginField::Password),
        Line::from(""),
    ];

    if form.submitting {
        lines.push(Line::from(Span::styled("  Logging in...", theme::warning())));
    } else {
        lines.push(Line::from(Span::styled(
            "  [Tab]switch field [Enter]log in",
            theme::muted(),
        )));
    }

    f.render_widget(Paragraph::new(lines), inner);
}

fn field_line<'a>(label: &'a str, value: &'a str, focused: bool) -> Line<'a> {
    let (label_style, cursor) = if focused {
        (theme::accent_bold(), "_")
    } else {
        (theme::muted(), "")
    };
    Line::from(vec![
        Span::styled(format!("  {label:>8}: "), label_style),
        Span::styled(value, theme::text().add_modifier(Modifier::BOLD)),
        Span::styled(cursor, theme::accent()),
    ])
}
