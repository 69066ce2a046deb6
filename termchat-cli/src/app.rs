use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use termchat_core::{Keystroke, Outcome, SharedHistory, Terminal};

/// Front-end state: the interactive shell plus a local copy of the polled history.
pub struct App {
    pub terminal: Terminal,
    history: SharedHistory,
    /// Last history snapshot, refreshed on tick.
    pub history_label: String,
    pub history_lines: Vec<String>,
    /// Server shown in the status bar.
    pub server: String,
    pub dirty: bool,
    pub running: bool,
}

impl App {
    pub fn new(terminal: Terminal, history: SharedHistory, server: impl Into<String>) -> Self {
        let mut app = Self {
            terminal,
            history,
            history_label: String::new(),
            history_lines: Vec::new(),
            server: server.into(),
            dirty: true,
            running: true,
        };
        app.refresh_history();
        app
    }

    /// Copy new history lines out of the shared transcript. Marks dirty only
    /// when the rendered count changed.
    pub fn refresh_history(&mut self) -> bool {
        let Ok(transcript) = self.history.lock() else {
            return false;
        };
        if transcript.len() == self.history_lines.len() && transcript.label() == self.history_label {
            return false;
        }
        self.history_label = transcript.label().to_string();
        self.history_lines = transcript.lines().to_vec();
        self.dirty = true;
        true
    }

    pub fn on_focus(&mut self, gained: bool) {
        if gained {
            self.terminal.focus();
        } else {
            self.terminal.defocus();
        }
        self.dirty = true;
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Option<Outcome> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => {
                self.running = false;
                return None;
            }
            KeyCode::Char('l') if ctrl => {
                self.terminal.clear();
                self.dirty = true;
                return None;
            }
            KeyCode::Esc => {
                self.terminal.defocus();
                self.dirty = true;
                return None;
            }
            _ => {}
        }
        if !self.terminal.is_focused() {
            self.terminal.focus();
            self.dirty = true;
        }
        let outcome = self.terminal.handle_key(keystroke(key));
        if outcome.is_some() {
            self.dirty = true;
        }
        outcome
    }
}

fn keystroke(key: KeyEvent) -> Keystroke {
    if key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
    {
        return Keystroke::Other;
    }
    match key.code {
        KeyCode::Char(c) => Keystroke::Char(c),
        KeyCode::Enter => Keystroke::Enter,
        KeyCode::Backspace => Keystroke::Backspace,
        _ => Keystroke::Other,
    }
}
