use std::sync::Arc;

use crate::parser::{ArgParser, DECODED, Parsed};
use crate::prompt::{BREAK, Session, escape};
use crate::theme::{Filter, ThemeState};

/// Name of the fixed newline stage. Always runs first and cannot be removed.
pub const LINEBREAK: &str = "linebreak";

/// Keyword that wipes the interactive transcript.
pub const CLEAR: &str = "clear";

/// Commands listed by `help` (command, description).
pub const HELP_ROWS: &[(&str, &str)] = &[
    ("echo <text>", "Print text"),
    ("help", "Show this list"),
    ("color <css-color>", "Set the terminal background"),
    ("text <css-color>", "Set the terminal text color"),
    ("theme lightmode|darkmode", "Toggle a light or dark filter"),
    ("cd <dir>", "Enter a directory (your messages are posted there)"),
    ("clear", "Clear the terminal"),
];

/// Mutable state a command may touch while rewriting a line.
pub struct CommandContext<'a> {
    pub session: &'a mut Session,
    pub theme: &'a mut ThemeState,
    pub parser: ArgParser,
    /// The submitted line, decoded. Fixed before the chain runs so that
    /// output appended by one command is never read as input by the next.
    pub line: Option<String>,
    /// Set by `cd`; the interpreter suppresses the echoed line when true.
    pub dir_changed: bool,
}

impl<'a> CommandContext<'a> {
    pub fn new(session: &'a mut Session, theme: &'a mut ThemeState, parser: ArgParser) -> Self {
        Self {
            session,
            theme,
            parser,
            line: None,
            dir_changed: false,
        }
    }

    pub fn with_line(mut self, line: Option<String>) -> Self {
        self.line = line;
        self
    }

    pub fn prompt(&self) -> String {
        self.session.prompt()
    }

    /// Keyword present on the submitted line. `text` is the transcript so far,
    /// used only when no line was captured.
    pub fn present(&self, text: &str, command: &str) -> bool {
        match &self.line {
            Some(line) => matches!(
                self.parser.parse_line(line, command, false),
                Some(Parsed::Present)
            ),
            None => self.parser.present(text, &self.prompt(), command),
        }
    }

    pub fn argument(&self, text: &str, command: &str) -> Option<String> {
        match &self.line {
            Some(line) => self
                .parser
                .parse_line(line, command, true)
                .and_then(Parsed::into_argument),
            None => self.parser.argument(text, &self.prompt(), command),
        }
    }
}

/// A line transform. Must return the input unchanged when it does not apply.
pub trait Command: Send + Sync + 'static {
    fn apply(&self, text: &str, ctx: &mut CommandContext<'_>) -> String;
}

/// Adapter so plain closures can sit in the table.
struct FnCommand<F>(F);

impl<F> Command for FnCommand<F>
where
    F: Fn(&str, &mut CommandContext<'_>) -> String + Send + Sync + 'static,
{
    fn apply(&self, text: &str, ctx: &mut CommandContext<'_>) -> String {
        (self.0)(text, ctx)
    }
}

/// Ordered command table. Insertion order is execution order.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    entries: Vec<(String, Arc<dyn Command>)>,
}

impl CommandRegistry {
    /// Empty table: the interpreter becomes a pass-through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table minus `excluded`.
    pub fn builtin(excluded: &[&str]) -> Self {
        let mut registry = Self::new()
            .with("echo", Echo)
            .with("help", Help)
            .with("color", PaneColor::Background)
            .with("text", PaneColor::Foreground)
            .with("theme", Theme)
            .with("cd", Cd);
        for name in excluded {
            registry.remove_command(name);
        }
        registry
    }

    pub fn with(mut self, name: &str, command: impl Command) -> Self {
        self.add_command(name, command);
        self
    }

    /// Insert a command. An existing entry of the same name is replaced in place.
    pub fn add_command(&mut self, name: &str, command: impl Command) {
        self.add_arc(name, Arc::new(command));
    }

    pub fn add_fn<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&str, &mut CommandContext<'_>) -> String + Send + Sync + 'static,
    {
        self.add_command(name, FnCommand(f));
    }

    pub fn add_arc(&mut self, name: &str, command: Arc<dyn Command>) {
        if name == LINEBREAK || name.trim().is_empty() {
            tracing::warn!(name, "refusing to register reserved command name");
            return;
        }
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = command,
            None => self.entries.push((name.to_string(), command)),
        }
    }

    /// Returns whether an entry was removed.
    pub fn remove_command(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| n != name);
        self.entries.len() != before
    }

    pub fn list_command_names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Run every command in order, threading the text through. The submitted
    /// line is captured from `text` first unless the caller already set it.
    pub fn run(&self, text: String, ctx: &mut CommandContext<'_>) -> String {
        if ctx.line.is_none() {
            ctx.line = match ctx.parser.parse(&text, &ctx.prompt(), DECODED, false) {
                Some(Parsed::Decoded(line)) => Some(line),
                _ => None,
            };
        }
        self.entries
            .iter()
            .fold(text, |acc, (_, command)| command.apply(&acc, ctx))
    }
}

/// Replace every raw newline with a rendered break and a fresh prompt.
pub fn linebreak(text: &str, prompt: &str) -> String {
    text.replace('\n', &format!("{BREAK}{prompt}"))
}

/// Text printed by `help`, rows joined with rendered breaks.
pub fn help_text() -> String {
    let width = HELP_ROWS.iter().map(|(c, _)| c.len()).max().unwrap_or(0);
    let mut rows = vec!["Commands:".to_string()];
    rows.extend(
        HELP_ROWS
            .iter()
            .map(|(cmd, desc)| escape(&format!("  {cmd:<width$}  {desc}"))),
    );
    rows.join(BREAK)
}

pub struct Echo;

impl Command for Echo {
    fn apply(&self, text: &str, ctx: &mut CommandContext<'_>) -> String {
        match ctx.argument(text, "echo") {
            Some(arg) => format!("{text}{}{BREAK}{}", escape(&arg), ctx.prompt()),
            None => text.to_string(),
        }
    }
}

pub struct Help;

impl Command for Help {
    fn apply(&self, text: &str, ctx: &mut CommandContext<'_>) -> String {
        if ctx.present(text, "help") {
            format!("{text}{}{BREAK}{}", help_text(), ctx.prompt())
        } else {
            text.to_string()
        }
    }
}

/// `color` and `text`: restyle the pane, leave the line alone.
pub enum PaneColor {
    Background,
    Foreground,
}

impl Command for PaneColor {
    fn apply(&self, text: &str, ctx: &mut CommandContext<'_>) -> String {
        let keyword = match self {
            PaneColor::Background => "color",
            PaneColor::Foreground => "text",
        };
        if let Some(color) = ctx.argument(text, keyword) {
            tracing::info!(keyword, %color, "pane color changed");
            match self {
                PaneColor::Background => ctx.theme.background = Some(color),
                PaneColor::Foreground => ctx.theme.foreground = Some(color),
            }
        }
        text.to_string()
    }
}

pub struct Theme;

impl Command for Theme {
    fn apply(&self, text: &str, ctx: &mut CommandContext<'_>) -> String {
        if let Some(mode) = ctx
            .argument(text, "theme")
            .as_deref()
            .and_then(Filter::from_keyword)
        {
            ctx.theme.toggle(mode);
            tracing::info!(filter = ?ctx.theme.filter, "theme toggled");
        }
        text.to_string()
    }
}

pub struct Cd;

impl Command for Cd {
    fn apply(&self, text: &str, ctx: &mut CommandContext<'_>) -> String {
        if let Some(segment) = ctx.argument(text, "cd") {
            ctx.session.enter(&segment);
            ctx.dir_changed = true;
            tracing::info!(path = %ctx.session.path, "directory changed");
        }
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MatchMode;

    fn run(registry: &CommandRegistry, line: &str) -> (String, Session, ThemeState, bool) {
        let mut session = Session::default();
        let mut theme = ThemeState::default();
        let prompt = session.prompt();
        let text = format!("{prompt}{line}{BREAK}{prompt}");
        let mut ctx = CommandContext::new(&mut session, &mut theme, ArgParser::default());
        let out = registry.run(text, &mut ctx);
        let dir_changed = ctx.dir_changed;
        (out, session, theme, dir_changed)
    }

    #[test]
    fn builtin_order() {
        assert_eq!(
            CommandRegistry::builtin(&[]).list_command_names(),
            vec!["echo", "help", "color", "text", "theme", "cd"]
        );
    }

    #[test]
    fn exclusion_list() {
        let r = CommandRegistry::builtin(&["help", "theme"]);
        assert_eq!(r.list_command_names(), vec!["echo", "color", "text", "cd"]);
    }

    #[test]
    fn add_replaces_in_place() {
        let mut r = CommandRegistry::builtin(&[]);
        r.add_fn("help", |t: &str, _: &mut CommandContext<'_>| t.to_uppercase());
        assert_eq!(r.list_command_names()[1], "help");
        assert_eq!(r.len(), 6);
    }

    #[test]
    fn linebreak_is_reserved() {
        let mut r = CommandRegistry::new();
        r.add_fn(LINEBREAK, |t: &str, _: &mut CommandContext<'_>| t.to_string());
        assert!(r.is_empty());
    }

    #[test]
    fn remove_reports_presence() {
        let mut r = CommandRegistry::builtin(&[]);
        assert!(r.remove_command("cd"));
        assert!(!r.remove_command("cd"));
        assert!(!r.contains("cd"));
    }

    #[test]
    fn linebreak_adds_prompt() {
        assert_eq!(linebreak("a\nb\n", "$ "), "a<br>$ b<br>$ ");
    }

    #[test]
    fn echo_renders_below_fresh_prompt() {
        let (out, ..) = run(&CommandRegistry::builtin(&[]), "echo hello world");
        let p = Session::default().prompt();
        assert_eq!(
            out,
            format!("{p}echo hello world{BREAK}{p}hello world{BREAK}{p}")
        );
    }

    #[test]
    fn echo_without_argument_is_noop() {
        let (out, ..) = run(&CommandRegistry::builtin(&[]), "echo");
        let p = Session::default().prompt();
        assert_eq!(out, format!("{p}echo{BREAK}{p}"));
    }

    #[test]
    fn help_appends_dialog() {
        let (out, ..) = run(&CommandRegistry::builtin(&[]), "help");
        assert!(out.contains("Commands:"));
        assert!(out.contains("cd &lt;dir&gt;"));
        assert!(out.ends_with(&Session::default().prompt()));
    }

    #[test]
    fn color_and_text_are_side_effects_only() {
        let r = CommandRegistry::builtin(&[]);
        let (out, _, theme, _) = run(&r, "color navy");
        assert_eq!(theme.background.as_deref(), Some("navy"));
        let p = Session::default().prompt();
        assert_eq!(out, format!("{p}color navy{BREAK}{p}"));

        let (_, _, theme, _) = run(&r, "text #ffcc00");
        assert_eq!(theme.foreground.as_deref(), Some("#ffcc00"));
    }

    #[test]
    fn color_without_argument_changes_nothing() {
        let (_, _, theme, _) = run(&CommandRegistry::builtin(&[]), "color");
        assert_eq!(theme, ThemeState::default());
    }

    #[test]
    fn theme_toggles_filter() {
        let (_, _, theme, _) = run(&CommandRegistry::builtin(&[]), "theme darkmode");
        assert_eq!(theme.filter, Filter::Dark);
        let (_, _, theme, _) = run(&CommandRegistry::builtin(&[]), "theme sepia");
        assert_eq!(theme.filter, Filter::None);
    }

    #[test]
    fn cd_mutates_session_and_flags() {
        let (_, session, _, dir_changed) = run(&CommandRegistry::builtin(&[]), "cd foo");
        assert_eq!(session.path, "~/foo");
        assert!(dir_changed);
    }

    #[test]
    fn commands_after_cd_still_see_submitted_line() {
        let mut r = CommandRegistry::builtin(&[]);
        r.add_fn("after", |t: &str, ctx: &mut CommandContext<'_>| {
            assert_eq!(ctx.line.as_deref(), Some("cd x"));
            assert_eq!(ctx.argument(t, "cd").as_deref(), Some("x"));
            t.to_string()
        });
        let (_, session, ..) = run(&r, "cd x");
        assert_eq!(session.path, "~/x");
    }

    #[test]
    fn echo_output_is_not_reinterpreted() {
        let r = CommandRegistry::builtin(&[]);
        let p = Session::default().prompt();

        let (out, session, _, dir_changed) = run(&r, "echo cd x");
        assert_eq!(session.path, "~");
        assert!(!dir_changed);
        assert_eq!(out, format!("{p}echo cd x{BREAK}{p}cd x{BREAK}{p}"));

        let (_, _, theme, _) = run(&r, "echo color red");
        assert_eq!(theme, ThemeState::default());

        let (out, ..) = run(&r, "echo help");
        assert!(!out.contains("Commands:"));
    }

    #[test]
    fn preset_line_wins_over_transcript() {
        let mut session = Session::default();
        let mut theme = ThemeState::default();
        let p = session.prompt();
        let text = format!("{p}cd a{BREAK}{p}");
        let mut ctx = CommandContext::new(&mut session, &mut theme, ArgParser::default())
            .with_line(Some("cd b".into()));
        CommandRegistry::builtin(&[]).run(text, &mut ctx);
        assert_eq!(session.path, "~/b");
    }

    #[test]
    fn substring_quirk_reaches_commands() {
        let mut session = Session::default();
        let mut theme = ThemeState::default();
        let p = session.prompt();
        let text = format!("{p}abcd{BREAK}{p}");
        let mut ctx =
            CommandContext::new(&mut session, &mut theme, ArgParser::new(MatchMode::Substring));
        CommandRegistry::builtin(&[]).run(text, &mut ctx);
        assert!(ctx.dir_changed);
        assert_eq!(session.path, "~/ab");
    }
}
