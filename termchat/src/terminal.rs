use std::sync::Arc;

use crate::command::{CLEAR, CommandContext, CommandRegistry, LINEBREAK, linebreak};
use crate::message::NewMessage;
use crate::parser::{ArgParser, DECODED, MatchMode, Parsed};
use crate::prompt::{BREAK, Session, escape_char, trailing_entity_len};
use crate::store::{MessageStore, RetryPolicy, spawn_delivery};
use crate::theme::ThemeState;

/// Key input, already decoded by the front end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keystroke {
    Char(char),
    Enter,
    Backspace,
    /// Modifiers and anything else that does not edit the buffer.
    Other,
}

/// Result of one processed input trigger.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Plain chat line handed to the store, if any.
    pub message: Option<NewMessage>,
    /// The detached post. Nothing waits on it; tests may.
    pub delivery: Option<tokio::task::JoinHandle<()>>,
}

/// Interactive shell: input buffer, command chain and prompt transcript.
pub struct Terminal {
    session: Session,
    theme: ThemeState,
    registry: CommandRegistry,
    parser: ArgParser,
    stdin: String,
    stdout: String,
    /// Buffer length after the last processed trigger.
    last_len: Option<usize>,
    /// Start of the line currently being typed; backspace stops here.
    input_start: usize,
    focused: bool,
    store: Option<Arc<dyn MessageStore>>,
    retry: RetryPolicy,
}

impl Terminal {
    pub fn new(session: Session, registry: CommandRegistry) -> Self {
        Self {
            session,
            theme: ThemeState::default(),
            registry,
            parser: ArgParser::default(),
            stdin: String::new(),
            stdout: String::new(),
            last_len: None,
            input_start: 0,
            focused: false,
            store: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.parser = ArgParser::new(mode);
        self
    }

    /// Plain chat lines are posted to `store`, fire-and-forget.
    pub fn with_store(mut self, store: Arc<dyn MessageStore>, retry: RetryPolicy) -> Self {
        self.store = Some(store);
        self.retry = retry;
        self
    }

    /// Render the first prompt and take focus.
    pub fn initialize(&mut self) {
        self.reset_to_prompt();
        self.focused = true;
    }

    /// Wipe the interactive transcript and render a fresh prompt.
    pub fn clear(&mut self) {
        self.reset_to_prompt();
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn defocus(&mut self) {
        self.focused = false;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn add_command<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&str, &mut CommandContext<'_>) -> String + Send + Sync + 'static,
    {
        self.registry.add_fn(name, f);
    }

    pub fn remove_command(&mut self, name: &str) -> bool {
        self.registry.remove_command(name)
    }

    pub fn list_command_names(&self) -> Vec<String> {
        self.registry.list_command_names()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn theme(&self) -> &ThemeState {
        &self.theme
    }

    pub fn stdin(&self) -> &str {
        &self.stdin
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Rendered rows of the interactive transcript.
    pub fn rows(&self) -> impl Iterator<Item = &str> {
        self.stdout.split(BREAK)
    }

    /// Edit the input buffer, then run the interpreter.
    pub fn handle_key(&mut self, key: Keystroke) -> Option<Outcome> {
        match key {
            Keystroke::Char(c) if !c.is_control() => self.stdin.push_str(&escape_char(c)),
            Keystroke::Enter => self.stdin.push('\n'),
            Keystroke::Backspace if self.stdin.len() > self.input_start => {
                match trailing_entity_len(&self.stdin[self.input_start..]) {
                    Some(n) => self.stdin.truncate(self.stdin.len() - n),
                    None => {
                        self.stdin.pop();
                    }
                }
            }
            _ => {}
        }
        self.process()
    }

    /// Run the input pipeline over the buffer.
    ///
    /// Returns `None` when the buffer length is unchanged since the last
    /// processed trigger (modifier presses and the like).
    pub fn process(&mut self) -> Option<Outcome> {
        if self.last_len == Some(self.stdin.len()) {
            return None;
        }
        let prompt = self.session.prompt();
        let mut text = linebreak(&self.stdin, &prompt);
        let mut submitted = None;
        let mut dir_changed = false;
        // the chain only runs when a line was submitted; plain typing passes through
        if self.stdin.contains('\n') {
            submitted = match self.parser.parse(&text, &prompt, DECODED, false) {
                Some(Parsed::Decoded(line)) => Some(line),
                _ => None,
            };
            let mut ctx = CommandContext::new(&mut self.session, &mut self.theme, self.parser)
                .with_line(submitted.clone());
            text = self.registry.run(text, &mut ctx);
            dir_changed = ctx.dir_changed;
        }

        let cleared = submitted
            .as_deref()
            .is_some_and(|line| self.parser.names(line, CLEAR));
        if cleared {
            text = self.session.prompt();
        } else if dir_changed {
            text = drop_current_line(&text, &prompt);
            text.push_str(&self.session.prompt());
        }

        self.stdin = text.clone();
        self.stdout = text;
        self.last_len = Some(self.stdin.len());
        if submitted.is_some() {
            self.input_start = self.stdin.len();
        }

        let message = submitted
            .filter(|line| !line.is_empty() && !self.names_command(line))
            .map(|content| {
                NewMessage::new(self.session.user.clone(), content, self.session.path.clone())
            });
        let delivery = match (&message, &self.store) {
            (Some(msg), Some(store)) => {
                tracing::debug!(alias = %msg.alias, at = %msg.at, "posting message");
                spawn_delivery(Arc::clone(store), msg.clone(), self.retry.clone())
            }
            _ => None,
        };
        Some(Outcome { message, delivery })
    }

    /// Whether a typed line names a command and so must not be posted.
    fn names_command(&self, line: &str) -> bool {
        [CLEAR, LINEBREAK]
            .into_iter()
            .map(str::to_string)
            .chain(self.registry.list_command_names())
            .any(|name| self.parser.names(line, &name))
    }

    fn reset_to_prompt(&mut self) {
        self.stdin = self.session.prompt();
        self.stdout = self.stdin.clone();
        self.last_len = Some(self.stdin.len());
        self.input_start = self.stdin.len();
    }
}

/// Everything before the prompt that introduced the most recent line.
fn drop_current_line(text: &str, prompt: &str) -> String {
    let body = text.strip_suffix(prompt).unwrap_or(text);
    match body.rfind(prompt) {
        Some(i) => body[..i].to_string(),
        None => String::new(),
    }
}
