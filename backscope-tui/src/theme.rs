//! Parrot/neon theme tokens for the Backscope TUI.
//!
//! # Color Palette
//! - **Accent**: Electric cyan (focus, highlights, titles)
//! - **Positive**: Neon green (gains, long entries, covers)
//! - **Negative**: Hot pink (losses, shorts, errors)
//! - **Warning**: Neon orange (alerts, pending work)
//! - **Neutral**: Cool purple (secondary info)
//! - **Muted**: Steel blue (hints, axes, disabled text)

use ratatui::style::{Color, Modifier, Style};

use backscope_core::chart::{MarkerColor, MarkerShape, PaletteColor};
use backscope_core::model::Action;

pub const BACKGROUND: Color = Color::Rgb(18, 18, 20);
pub const ACCENT: Color = Color::Rgb(0, 255, 255);
pub const POSITIVE: Color = Color::Rgb(0, 255, 128);
pub const NEGATIVE: Color = Color::Rgb(255, 20, 147);
pub const WARNING: Color = Color::Rgb(255, 140, 0);
pub const NEUTRAL: Color = Color::Rgb(147, 112, 219);
pub const MUTED: Color = Color::Rgb(100, 149, 237);
pub const TEXT_PRIMARY: Color = Color::White;
pub const TEXT_SECONDARY: Color = Color::Rgb(170, 170, 170);

pub fn accent() -> Style {
    Style::default().fg(ACCENT)
}

pub fn accent_bold() -> Style {
    accent().add_modifier(Modifier::BOLD)
}

pub fn positive() -> Style {
    Style::default().fg(POSITIVE)
}

pub fn negative() -> Style {
    Style::default().fg(NEGATIVE)
}

pub fn warning() -> Style {
    Style::default().fg(WARNING)
}

pub fn neutral() -> Style {
    Style::default().fg(NEUTRAL)
}

pub fn muted() -> Style {
    Style::default().fg(MUTED)
}

pub fn text() -> Style {
    Style::default().fg(TEXT_PRIMARY)
}

pub fn header() -> Style {
    Style::default().fg(TEXT_SECONDARY).add_modifier(Modifier::BOLD)
}

pub fn selected_row() -> Style {
    Style::default()
        .bg(NEUTRAL)
        .fg(TEXT_PRIMARY)
        .add_modifier(Modifier::BOLD)
}

pub fn panel_border(active: bool) -> Style {
    if active {
        accent()
    } else {
        muted()
    }
}

pub fn panel_title(active: bool) -> Style {
    if active {
        accent_bold()
    } else {
        muted()
    }
}

/// PnL-style coloring: non-negative is a gain.
pub fn pnl_color(value: f64) -> Color {
    if value >= 0.0 {
        POSITIVE
    } else {
        NEGATIVE
    }
}

/// Terminal color for a ticker palette slot.
pub fn palette_color(color: PaletteColor) -> Color {
    match color {
        PaletteColor::White => Color::White,
        PaletteColor::Gray => Color::Gray,
        PaletteColor::Red => Color::Red,
        PaletteColor::Orange => Color::Rgb(255, 165, 0),
        PaletteColor::Purple => Color::Rgb(160, 32, 240),
        PaletteColor::Cyan => Color::Cyan,
        PaletteColor::Magenta => Color::Magenta,
    }
}

pub fn marker_color(color: MarkerColor) -> Color {
    match color {
        MarkerColor::Green => POSITIVE,
        MarkerColor::Red => NEGATIVE,
        MarkerColor::Yellow => Color::Yellow,
    }
}

pub fn marker_glyph(shape: MarkerShape) -> &'static str {
    match shape {
        MarkerShape::UpArrow => "▲",
        MarkerShape::DownArrow => "▼",
        MarkerShape::Circle => "●",
    }
}

/// Color for an action label in the trade and signal tables.
pub fn action_color(action: &Action) -> Color {
    match action {
        Action::Long | Action::Cover => POSITIVE,
        Action::Short | Action::Sell => NEGATIVE,
        Action::Other(_) => TEXT_SECONDARY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pnl_color_sign() {
        assert_eq!(pnl_color(100.0), POSITIVE);
        assert_eq!(pnl_color(-50.0), NEGATIVE);
        assert_eq!(pnl_color(0.0), POSITIVE);
    }

    #[test]
    fn action_colors_agree_with_markers() {
        assert_eq!(action_color(&Action::Long), marker_color(MarkerColor::Green));
        assert_eq!(action_color(&Action::Sell), marker_color(MarkerColor::Red));
        assert_eq!(action_color(&Action::Other("HOLD".into())), TEXT_SECONDARY);
    }

    #[test]
    fn glyphs_are_distinct() {
        let glyphs = [
            marker_glyph(MarkerShape::UpArrow),
            marker_glyph(MarkerShape::DownArrow),
            marker_glyph(MarkerShape::Circle),
        ];
        assert_ne!(glyphs[0], glyphs[1]);
        assert_ne!(glyphs[1], glyphs[2]);
    }

    #[test]
    fn panel_styles_follow_focus() {
        assert_eq!(panel_border(true), accent());
        assert_eq!(panel_border(false), muted());
        assert_eq!(panel_title(true), accent_bold());
    }
}
