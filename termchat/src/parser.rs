use crate::prompt::{BREAK, decode};

/// Command name that asks the parser for the literal typed line.
pub const DECODED: &str = "decoded";

/// How a command keyword is matched against the current line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// First whitespace-separated token must equal the keyword.
    #[default]
    Token,
    /// Keyword anywhere in the line, even inside another word ("cd" in "abcd").
    /// Kept for compatibility with the original widget.
    Substring,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Parsed {
    /// Trailing argument with the keyword removed.
    Argument(String),
    /// Keyword present, no argument requested.
    Present,
    /// Literal typed line (for [`DECODED`]).
    Decoded(String),
}

impl Parsed {
    pub fn into_argument(self) -> Option<String> {
        match self {
            Parsed::Argument(a) | Parsed::Decoded(a) => Some(a),
            Parsed::Present => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ArgParser {
    pub mode: MatchMode,
}

impl ArgParser {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    /// The most recently submitted line of `text`, still rendered.
    ///
    /// `None` unless `text` ends exactly on `prompt`: mid-line or mid-render
    /// states are never parsed.
    pub fn current_line<'a>(&self, text: &'a str, prompt: &str) -> Option<&'a str> {
        if prompt.is_empty() {
            return None;
        }
        let body = text.strip_suffix(prompt)?;
        let start = body.rfind(prompt).map(|i| i + prompt.len()).unwrap_or(0);
        let segment = &body[start..];
        // first rendered row only; later rows are command output
        Some(segment.split(BREAK).next().unwrap_or_default())
    }

    pub fn parse(
        &self,
        text: &str,
        prompt: &str,
        command: &str,
        wants_argument: bool,
    ) -> Option<Parsed> {
        let line = decode(self.current_line(text, prompt)?);
        let line = line.trim();
        if command == DECODED {
            return Some(Parsed::Decoded(line.to_string()));
        }
        self.parse_line(line, command, wants_argument)
    }

    /// Match `command` against an already decoded, trimmed line.
    pub fn parse_line(&self, line: &str, command: &str, wants_argument: bool) -> Option<Parsed> {
        if command.is_empty() {
            return None;
        }
        match self.mode {
            MatchMode::Substring => {
                if !line.contains(command) {
                    return None;
                }
                if !wants_argument {
                    return Some(Parsed::Present);
                }
                let arg = line.replacen(command, "", 1);
                non_empty(arg.trim())
            }
            MatchMode::Token => {
                let rest = line.strip_prefix(command)?;
                if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
                    return None;
                }
                if !wants_argument {
                    return Some(Parsed::Present);
                }
                non_empty(rest.trim())
            }
        }
    }

    /// Keyword present on the current line.
    pub fn present(&self, text: &str, prompt: &str, command: &str) -> bool {
        matches!(self.parse(text, prompt, command, false), Some(Parsed::Present))
    }

    /// Trailing argument of `command` on the current line.
    pub fn argument(&self, text: &str, prompt: &str, command: &str) -> Option<String> {
        self.parse(text, prompt, command, true)
            .and_then(Parsed::into_argument)
    }

    /// Whether a plain decoded line names `command` under this mode.
    pub fn names(&self, line: &str, command: &str) -> bool {
        match self.mode {
            MatchMode::Substring => line.contains(command),
            MatchMode::Token => line.split_whitespace().next() == Some(command),
        }
    }
}

fn non_empty(arg: &str) -> Option<Parsed> {
    if arg.is_empty() {
        None
    } else {
        Some(Parsed::Argument(arg.to_string()))
    }
}
