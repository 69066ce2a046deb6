use serde::{Deserialize, Serialize};

/// Global light/dark filter over the output pane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    #[default]
    None,
    Light,
    Dark,
}

impl Filter {
    /// `lightmode` / `darkmode`
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.trim() {
            "lightmode" | "light" => Some(Filter::Light),
            "darkmode" | "dark" => Some(Filter::Dark),
            _ => None,
        }
    }
}

/// Visual state of the terminal, owned by one `Terminal` and handed to the
/// renderer instead of being mutated ambiently.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeState {
    /// CSS-style color string (`"navy"`, `"#102030"`).
    pub background: Option<String>,
    pub foreground: Option<String>,
    pub filter: Filter,
}

impl ThemeState {
    /// Second toggle of the same mode reverts to no filter.
    pub fn toggle(&mut self, mode: Filter) {
        self.filter = if self.filter == mode {
            Filter::None
        } else {
            mode
        };
    }
}
