//! Keyboard input dispatch: global keys, then overlays, then view handlers.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::{AppState, Overlay, TableKind, View};

pub fn handle_key(app: &mut AppState, key: KeyEvent) {
    // Only handle key press events (Windows sends both Press and Release).
    if key.kind != KeyEventKind::Press {
        return;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.running = false;
        return;
    }

    // 1. Overlays consume input first.
    if app.overlay == Overlay::ErrorHistory {
        handle_error_overlay(app, key);
        return;
    }

    // 2. The login form takes printable keys as text.
    if app.active_view == View::Login {
        handle_login_key(app, key);
        return;
    }

    // 3. Global keys.
    match key.code {
        KeyCode::Char('q') => {
            app.running = false;
            return;
        }
        KeyCode::Char(c @ '1'..='9') => {
            if let Some(view) = c.to_digit(10).and_then(|n| View::from_number(n as usize)) {
                app.switch_view(view);
            }
            return;
        }
        KeyCode::Tab => {
            app.switch_view(app.active_view.next());
            return;
        }
        KeyCode::BackTab => {
            app.switch_view(app.active_view.prev());
            return;
        }
        KeyCode::Char('e') => {
            app.overlay = Overlay::ErrorHistory;
            app.error_scroll = 0;
            return;
        }
        KeyCode::Char('L') => {
            app.logout();
            return;
        }
        KeyCode::Char('?') | KeyCode::F(1) => {
            app.switch_view(View::Help);
            return;
        }
        _ => {}
    }

    // 4. View-specific keys.
    match app.active_view {
        View::Filter => handle_filter_key(app, key),
        View::Dashboard => handle_dashboard_key(app, key),
        View::Login | View::Help => {}
    }
}

fn handle_error_overlay(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('e') => {
            app.overlay = Overlay::None;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            if app.error_scroll + 1 < app.error_history.len() {
                app.error_scroll += 1;
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.error_scroll = app.error_scroll.saturating_sub(1);
        }
        _ => {}
    }
}

fn handle_login_key(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.running = false,
        KeyCode::Enter => app.submit_login(),
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            app.login.toggle_focus();
        }
        KeyCode::F(1) => app.switch_view(View::Help),
        KeyCode::Backspace => {
            app.login.focused_mut().pop();
        }
        KeyCode::Char(c) if !app.login.submitting => {
            app.login.focused_mut().push(c);
        }
        _ => {}
    }
}

fn handle_filter_key(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.move_filter_cursor(true),
        KeyCode::Char('k') | KeyCode::Up => app.move_filter_cursor(false),
        KeyCode::Char('h') | KeyCode::Left => app.cycle_strategy(false),
        KeyCode::Char('l') | KeyCode::Right => app.cycle_strategy(true),
        KeyCode::Enter => app.open_selected(),
        KeyCode::Char('r') => app.refresh_summaries(),
        _ => {}
    }
}

fn handle_dashboard_key(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Char(']') => app.cycle_tab(true),
        KeyCode::Char('[') => app.cycle_tab(false),
        KeyCode::Char('x') => app.close_current_tab(),
        KeyCode::Char('o') => app.set_table(TableKind::Overview),
        KeyCode::Char('t') => app.set_table(TableKind::Trades),
        KeyCode::Char('s') => app.set_table(TableKind::Signals),
        KeyCode::Char('n') | KeyCode::Right => app.next_page(),
        KeyCode::Char('p') | KeyCode::Left => app.previous_page(),
        KeyCode::Char('r') => {
            // Re-selecting retries a failed fetch and is a no-op otherwise.
            if let Some(id) = app.session.cache.current() {
                app.open_backtest(id);
            }
        }
        _ => {}
    }
}
