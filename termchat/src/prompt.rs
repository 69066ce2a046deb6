use serde::{Deserialize, Serialize};

/// Rendered line break inside a transcript.
pub const BREAK: &str = "<br>";

/// Default prompt symbol (`user@system:path$`).
pub const DEFAULT_SYMBOL: &str = "$";

/// Client-local shell state. `cd` mutates `path`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: String,
    pub system: String,
    pub path: String,
    pub prompt_symbol: String,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            user: "guest".into(),
            system: "termchat".into(),
            path: "~".into(),
            prompt_symbol: DEFAULT_SYMBOL.into(),
        }
    }
}

impl Session {
    pub fn prompt(&self) -> String {
        render_prompt(&self.user, &self.system, &self.path, &self.prompt_symbol)
    }

    /// Append a segment to the current path.
    pub fn enter(&mut self, segment: &str) {
        let segment = segment.trim_matches('/');
        if segment.is_empty() {
            return;
        }
        if !self.path.ends_with('/') {
            self.path.push('/');
        }
        self.path.push_str(segment);
    }
}

/// `user@system:path$ `
pub fn render_prompt(user: &str, system: &str, path: &str, symbol: &str) -> String {
    format!("{user}@{system}:{path}{symbol} ")
}

/// Escape a typed character so the transcript stays markup-safe.
pub fn escape_char(c: char) -> std::borrow::Cow<'static, str> {
    match c {
        '<' => "&lt;".into(),
        '>' => "&gt;".into(),
        '&' => "&amp;".into(),
        other => other.to_string().into(),
    }
}

/// Escape a whole string (used for command output that echoes user text).
pub fn escape(s: &str) -> String {
    s.chars().map(escape_char).collect()
}

/// Inverse of [`escape`]. Also maps rendered breaks back to newlines.
pub fn decode(s: &str) -> String {
    s.replace(BREAK, "\n")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Byte length of a trailing entity (`&lt;` etc.), if the text ends with one.
pub(crate) fn trailing_entity_len(s: &str) -> Option<usize> {
    ["&lt;", "&gt;", "&amp;"]
        .iter()
        .find(|e| s.ends_with(*e))
        .map(|e| e.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_format() {
        assert_eq!(render_prompt("bob", "box", "~/a", "$"), "bob@box:~/a$ ");
        assert_eq!(Session::default().prompt(), "guest@termchat:~$ ");
    }

    #[test]
    fn enter_appends_segments() {
        let mut s = Session::default();
        s.enter("foo");
        s.enter("/bar/");
        s.enter("");
        assert_eq!(s.path, "~/foo/bar");
    }

    #[test]
    fn escape_roundtrip_markup() {
        let raw = "a <b> & c";
        let escaped = escape(raw);
        assert_eq!(escaped, "a &lt;b&gt; &amp; c");
        assert_eq!(decode(&escaped), raw);
    }

    #[test]
    fn trailing_entity() {
        assert_eq!(trailing_entity_len("x&lt;"), Some(4));
        assert_eq!(trailing_entity_len("x&amp;"), Some(5));
        assert_eq!(trailing_entity_len("x;"), None);
    }
}
