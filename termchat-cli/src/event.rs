use crossterm::event::Event as TermEvent;

/// Unified event type for the main loop.
pub enum AppEvent {
    Terminal(TermEvent),
    /// Redraw check for the polled history pane.
    Tick,
    Quit,
}
