//! Terminal-style chat client core.
//!
//! A [`Terminal`] turns keystrokes into a prompt transcript and runs each
//! submitted line through an ordered [`CommandRegistry`]; plain lines are
//! posted to a [`MessageStore`]. A [`Synchronizer`] polls the same store and
//! appends unseen messages to a read-only history transcript.

pub mod command;
pub mod config;
pub mod message;
pub mod parser;
pub mod prompt;
pub mod store;
pub mod sync;
pub mod terminal;
pub mod theme;

// Re-exports
pub use command::{Command, CommandContext, CommandRegistry};
pub use config::{ChatConfig, ConfigError};
pub use message::{Message, NewMessage};
pub use parser::{ArgParser, MatchMode, Parsed};
pub use prompt::{BREAK, Session, render_prompt};
pub use store::{HttpStore, MemoryStore, MessageStore, RetryPolicy, StoreError};
pub use sync::{HistoryTranscript, SharedHistory, SyncConfig, SyncHandle, Synchronizer};
pub use terminal::{Keystroke, Outcome, Terminal};
pub use theme::{Filter, ThemeState};
