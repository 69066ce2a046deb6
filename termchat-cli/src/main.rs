mod app;
mod event;
mod theme;
mod ui;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use crossterm::event::Event as TermEvent;
use ratatui::DefaultTerminal;
use termchat_core::*;
use tokio::sync::mpsc;

use app::App;
use event::AppEvent;

#[derive(Parser)]
#[command(name = "termchat", version, about = "Terminal-style chat client")]
struct Args {
    /// Base URL of the message server
    #[arg(long, env = "TERMCHAT_SERVER")]
    server: Option<String>,

    /// User name shown in the prompt and posted as alias
    #[arg(long, env = "TERMCHAT_USER")]
    user: Option<String>,

    /// System name shown in the prompt
    #[arg(long)]
    system: Option<String>,

    /// Seconds between history polls
    #[arg(long)]
    interval: Option<u64>,

    /// How many recent messages to fetch per poll
    #[arg(long)]
    depth: Option<usize>,

    /// Use an in-process store instead of the server
    #[arg(long)]
    offline: bool,

    /// Match commands anywhere in the line instead of by leading token
    #[arg(long)]
    substring_match: bool,

    /// Leave a built-in command out (repeatable, or comma separated)
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Write the resolved settings to ~/.termchat/config.json
    #[arg(long)]
    save_config: bool,
}

impl Args {
    fn apply(&self, config: &mut ChatConfig) {
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if let Some(user) = &self.user {
            config.session.user = user.clone();
        }
        if let Some(system) = &self.system {
            config.session.system = system.clone();
        }
        if let Some(interval) = self.interval {
            config.poll_interval_secs = interval;
        }
        if let Some(depth) = self.depth {
            config.history_depth = depth;
        }
        if self.substring_match {
            config.match_mode = MatchMode::Substring;
        }
        if !self.exclude.is_empty() {
            config.excluded_commands = self.exclude.clone();
        }
    }
}

fn cleanup_terminal() {
    let _ = crossterm::execute!(std::io::stdout(), crossterm::event::DisableFocusChange);
    ratatui::restore();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up file-based tracing (logs go to ~/.termchat/termchat.log)
    {
        let log_dir = ChatConfig::dir();
        std::fs::create_dir_all(&log_dir).ok();
        let log_file = std::fs::File::create(log_dir.join("termchat.log"))?;

        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::try_from_env("TERMCHAT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(log_file)
            .with_ansi(false)
            .init();
    }

    let args = Args::parse();

    let mut config = ChatConfig::load().unwrap_or_default();
    args.apply(&mut config);
    if args.save_config {
        config.save()?;
    }

    let store: Arc<dyn MessageStore> = if args.offline {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(HttpStore::new(&config.server_url)?)
    };
    let server_label = if args.offline {
        "offline".to_string()
    } else {
        config.server_url.clone()
    };
    tracing::info!(server = %server_label, user = %config.session.user, "starting");

    let sync = Synchronizer::start(Arc::clone(&store), config.sync_config());

    let registry = CommandRegistry::builtin(&config.excluded());
    let mut terminal = Terminal::new(config.session.clone(), registry)
        .with_match_mode(config.match_mode)
        .with_store(store, config.retry.clone());
    terminal.initialize();
    let app = App::new(terminal, sync.transcript(), server_label);

    // Install panic hook that restores the terminal
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        cleanup_terminal();
        default_hook(info);
    }));

    let screen = ratatui::init();
    crossterm::execute!(std::io::stdout(), crossterm::event::EnableFocusChange)?;

    let result = run_app(screen, app).await;

    cleanup_terminal();
    sync.shutdown().await;

    result
}

async fn run_app(mut screen: DefaultTerminal, mut app: App) -> anyhow::Result<()> {
    let (app_tx, mut app_rx) = mpsc::unbounded_channel::<AppEvent>();

    // Stop flag for the event reader thread
    let stop = Arc::new(AtomicBool::new(false));

    // Spawn terminal event reader using poll() with timeout so it can stop
    let term_tx = app_tx.clone();
    let stop_reader = Arc::clone(&stop);
    tokio::task::spawn_blocking(move || {
        while !stop_reader.load(Ordering::Relaxed) {
            if crossterm::event::poll(std::time::Duration::from_millis(50)).unwrap_or(false) {
                match crossterm::event::read() {
                    Ok(ev) => {
                        if term_tx.send(AppEvent::Terminal(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    });

    // Tick timer: picks up history appended by the poller
    let tick_tx = app_tx.clone();
    let stop_tick = Arc::clone(&stop);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(100));
        loop {
            interval.tick().await;
            if stop_tick.load(Ordering::Relaxed) {
                break;
            }
            if tick_tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });

    // SIGTERM handler for graceful shutdown
    let sigterm_tx = app_tx.clone();
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut sig) = signal(SignalKind::terminate()) {
            sig.recv().await;
            let _ = sigterm_tx.send(AppEvent::Quit);
        }
    });

    while app.running {
        // Draw only when dirty
        if app.dirty {
            screen.draw(|frame| ui::draw(frame, &app))?;
            app.dirty = false;
        }

        let Some(event) = app_rx.recv().await else {
            break;
        };

        match event {
            AppEvent::Terminal(TermEvent::Key(key)) => {
                if let Some(outcome) = app.on_key(key)
                    && let Some(message) = outcome.message
                {
                    tracing::debug!(content = %message.content, "submitted");
                }
            }
            AppEvent::Terminal(TermEvent::FocusGained) => app.on_focus(true),
            AppEvent::Terminal(TermEvent::FocusLost) => app.on_focus(false),
            AppEvent::Terminal(TermEvent::Resize(..)) => app.dirty = true,
            AppEvent::Terminal(_) => {}
            AppEvent::Tick => {
                app.refresh_history();
            }
            AppEvent::Quit => app.running = false,
        }
    }

    stop.store(true, Ordering::Relaxed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "termchat",
            "--server",
            "http://chat.local",
            "--user",
            "bob",
            "--interval",
            "3",
            "--substring-match",
            "--exclude",
            "theme,cd",
        ]);
        let mut config = ChatConfig::default();
        args.apply(&mut config);
        assert_eq!(config.server_url, "http://chat.local");
        assert_eq!(config.session.user, "bob");
        assert_eq!(config.session.system, "termchat");
        assert_eq!(config.poll_interval_secs, 3);
        assert_eq!(config.match_mode, MatchMode::Substring);
        assert_eq!(config.excluded(), vec!["theme", "cd"]);
    }

    #[test]
    fn absent_flags_keep_config() {
        let args = Args::parse_from(["termchat", "--offline"]);
        let mut config = ChatConfig::default();
        config.history_depth = 42;
        let before = config.clone();
        // env may carry TERMCHAT_SERVER / TERMCHAT_USER in a dev shell
        if args.server.is_none() && args.user.is_none() {
            args.apply(&mut config);
            assert_eq!(config, before);
        }
        assert!(args.offline);
    }
}
