use std::str::FromStr;

use ratatui::style::{Color, Modifier, Style};
use termchat_core::{Filter, ThemeState};

// ── Formwork: warm olive-tinted blacks ──────────────────────────────
pub const FORM: Color = Color::Rgb(14, 13, 11);
pub const FORM_RAISED: Color = Color::Rgb(20, 20, 18);

// ── Ash: structural greys ──────────────────────────────────────────
pub const ASH: Color = Color::Rgb(42, 42, 40);
pub const ASH_MID: Color = Color::Rgb(74, 74, 68);

// ── Chalk: text hierarchy ──────────────────────────────────────────
pub const CHALK_DIM: Color = Color::Rgb(122, 122, 112);
pub const CHALK_MID: Color = Color::Rgb(200, 196, 184);
pub const CHALK: Color = Color::Rgb(232, 228, 208);

// ── Accent colors ──────────────────────────────────────────────────
pub const SODIUM: Color = Color::Rgb(232, 163, 60);
pub const LICHEN: Color = Color::Rgb(138, 158, 108);

pub const STATUS_SEP: &str = " · ";

// ── Style helpers ──────────────────────────────────────────────────

/// `user@system` part of a prompt
pub fn prompt_user() -> Style {
    Style::default().fg(LICHEN).add_modifier(Modifier::BOLD)
}

/// `:path$` part of a prompt
pub fn prompt_path() -> Style {
    Style::default().fg(SODIUM)
}

/// Alias in the history pane
pub fn history_alias() -> Style {
    Style::default().fg(LICHEN)
}

/// Message body in the history pane
pub fn history_text() -> Style {
    Style::default().fg(CHALK_MID)
}

/// History pane border and title
pub fn history_border() -> Style {
    Style::default().fg(ASH)
}

pub fn history_title() -> Style {
    Style::default().fg(CHALK_DIM)
}

/// Help bar key labels
pub fn help_key() -> Style {
    Style::default().fg(SODIUM).add_modifier(Modifier::BOLD)
}

/// Help bar descriptions
pub fn help_desc() -> Style {
    Style::default().fg(ASH_MID)
}

/// "termchat" title in status bar
pub fn app_title() -> Style {
    Style::default().fg(SODIUM).add_modifier(Modifier::BOLD)
}

/// Status bar separator ( · )
pub fn status_separator() -> Style {
    Style::default().fg(ASH_MID)
}

pub fn status_text() -> Style {
    Style::default().fg(CHALK_DIM)
}

/// Status bar and help bar background
pub fn bar_bg() -> Style {
    Style::default().bg(FORM_RAISED)
}

/// Whole-frame background
pub fn base_bg() -> Style {
    Style::default().bg(FORM)
}

// ── Terminal pane: driven by ThemeState ────────────────────────────

/// Parse a CSS-style color (`navy`, `#102030`). Unknown names fall back to `None`.
pub fn parse_color(s: &str) -> Option<Color> {
    Color::from_str(s.trim()).ok()
}

/// Base style of the interactive pane.
pub fn terminal_pane(state: &ThemeState, focused: bool) -> Style {
    let bg = state.background.as_deref().and_then(parse_color).unwrap_or(FORM);
    let fg = state.foreground.as_deref().and_then(parse_color).unwrap_or(CHALK);
    let style = Style::default()
        .bg(filtered(bg, state.filter))
        .fg(filtered(fg, state.filter));
    if focused {
        style
    } else {
        style.add_modifier(Modifier::DIM)
    }
}

/// Border of the interactive pane; highlights when focused.
pub fn terminal_border(focused: bool) -> Style {
    if focused {
        Style::default().fg(SODIUM)
    } else {
        Style::default().fg(ASH)
    }
}

/// Apply the light/dark filter. Only RGB and basic named colors are blended;
/// indexed colors pass through.
pub fn filtered(color: Color, filter: Filter) -> Color {
    let Some((r, g, b)) = rgb(color) else {
        return color;
    };
    match filter {
        Filter::None => color,
        Filter::Light => Color::Rgb(blend(r, 255, 0.6), blend(g, 255, 0.6), blend(b, 255, 0.6)),
        Filter::Dark => Color::Rgb(blend(r, 0, 0.5), blend(g, 0, 0.5), blend(b, 0, 0.5)),
    }
}

fn blend(from: u8, to: u8, amount: f32) -> u8 {
    (from as f32 + (to as f32 - from as f32) * amount).round() as u8
}

fn rgb(color: Color) -> Option<(u8, u8, u8)> {
    Some(match color {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Black => (0, 0, 0),
        Color::White => (255, 255, 255),
        Color::Red => (205, 0, 0),
        Color::Green => (0, 205, 0),
        Color::Blue => (0, 0, 238),
        Color::Yellow => (205, 205, 0),
        Color::Gray => (229, 229, 229),
        Color::DarkGray => (127, 127, 127),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_css_colors() {
        assert_eq!(parse_color("#ff0000"), Some(Color::Rgb(255, 0, 0)));
        assert_eq!(parse_color(" red "), Some(Color::Red));
        assert_eq!(parse_color("not-a-color"), None);
    }

    #[test]
    fn pane_uses_theme_state() {
        let state = ThemeState {
            background: Some("#000000".into()),
            foreground: Some("white".into()),
            filter: Filter::None,
        };
        let style = terminal_pane(&state, true);
        assert_eq!(style.bg, Some(Color::Rgb(0, 0, 0)));
        assert_eq!(style.fg, Some(Color::White));
    }

    #[test]
    fn unknown_color_falls_back() {
        let state = ThemeState {
            background: Some("nonsense".into()),
            ..Default::default()
        };
        assert_eq!(terminal_pane(&state, true).bg, Some(FORM));
    }

    #[test]
    fn filters_blend() {
        assert_eq!(filtered(Color::Rgb(0, 0, 0), Filter::Light), Color::Rgb(153, 153, 153));
        assert_eq!(filtered(Color::Rgb(200, 100, 50), Filter::Dark), Color::Rgb(100, 50, 25));
        assert_eq!(filtered(Color::Indexed(42), Filter::Dark), Color::Indexed(42));
        assert_eq!(filtered(CHALK, Filter::None), CHALK);
    }

    #[test]
    fn defocus_dims() {
        let style = terminal_pane(&ThemeState::default(), false);
        assert!(style.add_modifier.contains(Modifier::DIM));
    }
}
