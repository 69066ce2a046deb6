use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::message::{Message, unescape_underscores};
use crate::prompt::DEFAULT_SYMBOL;
use crate::store::{DEFAULT_DEPTH, MessageStore, StoreError};

/// Read-only history pane. Lines are only ever appended, one per message, in store order.
#[derive(Clone, Debug, Default)]
pub struct HistoryTranscript {
    label: String,
    lines: Vec<String>,
}

impl HistoryTranscript {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            lines: Vec::new(),
        }
    }

    /// Location label shown above the pane.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of rendered messages.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub type SharedHistory = Arc<Mutex<HistoryTranscript>>;

/// `alias@at: $ content`, with url-safe underscores turned back into spaces.
pub fn render_history_line(message: &Message, symbol: &str) -> String {
    format!(
        "{}@{}: {} {}",
        message.alias,
        message.at,
        symbol,
        unescape_underscores(&message.content)
    )
}

/// Append the part of `logs` not yet rendered. Returns how many lines were added.
///
/// Assumes the log is append-only: a shorter log than what is already rendered
/// adds nothing.
pub fn merge(transcript: &mut HistoryTranscript, logs: &[Message], symbol: &str) -> usize {
    let before = transcript.len();
    if logs.len() < before {
        tracing::debug!(rendered = before, fetched = logs.len(), "store log shrank, ignoring");
    }
    while logs.len() > transcript.len() {
        let next = &logs[transcript.len()];
        transcript.lines.push(render_history_line(next, symbol));
    }
    transcript.len() - before
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub interval: Duration,
    /// Messages requested per fetch.
    pub depth: usize,
    pub prompt_symbol: String,
    pub location: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            depth: DEFAULT_DEPTH,
            prompt_symbol: DEFAULT_SYMBOL.into(),
            location: "~".into(),
        }
    }
}

/// Polls the store and merges new messages into the history transcript.
pub struct Synchronizer {
    store: Arc<dyn MessageStore>,
    config: SyncConfig,
    transcript: SharedHistory,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn MessageStore>, config: SyncConfig) -> Self {
        let transcript = Arc::new(Mutex::new(HistoryTranscript::new(config.location.clone())));
        Self {
            store,
            config,
            transcript,
        }
    }

    /// Construct and start polling right away.
    pub fn start(store: Arc<dyn MessageStore>, config: SyncConfig) -> SyncHandle {
        Arc::new(Self::new(store, config)).spawn()
    }

    pub fn transcript(&self) -> SharedHistory {
        Arc::clone(&self.transcript)
    }

    pub fn rendered(&self) -> usize {
        self.transcript.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// One fetch and merge. The rendered count is read under the lock after
    /// the fetch completes, so overlapping ticks never duplicate or reorder.
    pub async fn tick(&self) -> Result<usize, StoreError> {
        let logs = self.store.fetch_recent(self.config.depth).await?;
        let mut transcript = self.transcript.lock().unwrap_or_else(|e| e.into_inner());
        Ok(merge(&mut transcript, &logs, &self.config.prompt_symbol))
    }

    /// Poll on `config.interval` until the returned handle is stopped or dropped.
    ///
    /// Every tick runs its fetch in its own task: a slow fetch does not hold
    /// back the next tick. Failed fetches are retried on the next tick.
    pub fn spawn(self: Arc<Self>) -> SyncHandle {
        let cancel = CancellationToken::new();
        let sync = Arc::clone(&self);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sync.config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let sync = Arc::clone(&sync);
                let token = token.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        result = sync.tick() => match result {
                            Ok(0) => {}
                            Ok(appended) => tracing::debug!(
                                appended,
                                rendered = sync.rendered(),
                                location = %sync.config.location,
                                "history merged"
                            ),
                            Err(e) => tracing::debug!(error = %e, "history fetch failed"),
                        },
                    }
                });
            }
            tracing::debug!("synchronizer stopped");
        });
        SyncHandle {
            cancel,
            task: Some(task),
            sync: self,
        }
    }
}

/// Handle to a running synchronizer. Dropping it stops polling.
pub struct SyncHandle {
    cancel: CancellationToken,
    task: Option<tokio::task::JoinHandle<()>>,
    sync: Arc<Synchronizer>,
}

impl SyncHandle {
    /// Stop polling and abandon any fetch still in flight.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn transcript(&self) -> SharedHistory {
        self.sync.transcript()
    }

    pub fn rendered(&self) -> usize {
        self.sync.rendered()
    }

    /// Stop and wait for the polling loop to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::message::NewMessage;
    use crate::store::MemoryStore;

    fn msg(n: i64, content: &str) -> Message {
        Message {
            time: Utc.timestamp_opt(1_700_000_000 + n, 0).unwrap(),
            alias: format!("user{n}"),
            content: content.into(),
            at: "~".into(),
        }
    }

    fn log(n: usize) -> Vec<Message> {
        (1..=n as i64).map(|i| msg(i, &format!("m{i}"))).collect()
    }

    /// Let spawned tasks run to their next await point.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn renders_alias_location_and_content() {
        let m = Message {
            time: Utc::now(),
            alias: "bob_1".into(),
            content: "hi_there".into(),
            at: "team_x".into(),
        };
        assert_eq!(render_history_line(&m, "$"), "bob_1@team_x: $ hi there");
    }

    #[test]
    fn merge_is_append_only_and_idempotent() {
        let mut t = HistoryTranscript::new("~");
        assert_eq!(merge(&mut t, &log(3), "$"), 3);
        assert_eq!(merge(&mut t, &log(3), "$"), 0);
        assert_eq!(t.len(), 3);

        assert_eq!(merge(&mut t, &log(5), "$"), 2);
        assert_eq!(t.lines()[3], "user4@~: $ m4");
        assert_eq!(t.lines()[4], "user5@~: $ m5");
    }

    #[test]
    fn shrinking_log_appends_nothing() {
        let mut t = HistoryTranscript::new("~");
        merge(&mut t, &log(4), "$");
        assert_eq!(merge(&mut t, &log(2), "$"), 0);
        assert_eq!(t.len(), 4);
    }

    #[tokio::test]
    async fn tick_merges_store_contents() {
        let store = Arc::new(MemoryStore::new());
        store.append(&NewMessage::new("bob_1", "hi_there", "team_x")).await.unwrap();
        let sync = Synchronizer::new(store, SyncConfig::default());
        assert_eq!(sync.tick().await.unwrap(), 1);
        assert_eq!(sync.tick().await.unwrap(), 0);
        let t = sync.transcript();
        assert_eq!(t.lock().unwrap().lines()[0], "bob_1@team_x: $ hi there");
    }

    #[tokio::test]
    async fn full_depth_window_stops_growing() {
        // a full window has the same length as what is rendered, so nothing new is merged
        let store = Arc::new(MemoryStore::new());
        for i in 0..3 {
            store.append(&NewMessage::new("a", format!("m{i}"), "~")).await.unwrap();
        }
        let sync = Synchronizer::new(store.clone(), SyncConfig {
            depth: 3,
            ..Default::default()
        });
        assert_eq!(sync.tick().await.unwrap(), 3);
        store.append(&NewMessage::new("a", "m3", "~")).await.unwrap();
        assert_eq!(sync.tick().await.unwrap(), 0);
        assert_eq!(sync.rendered(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_every_interval() {
        let store = Arc::new(MemoryStore::new());
        store.append(&NewMessage::new("a", "one", "~")).await.unwrap();
        store.append(&NewMessage::new("b", "two", "~")).await.unwrap();

        let handle = Synchronizer::start(
            store.clone(),
            SyncConfig {
                interval: Duration::from_millis(1000),
                location: "lobby".into(),
                ..Default::default()
            },
        );
        assert_eq!(handle.transcript().lock().unwrap().label(), "lobby");

        // tick 1 fires on construction
        settle().await;
        assert_eq!(handle.rendered(), 2);

        // tick 2: store unchanged
        tokio::time::advance(Duration::from_millis(1000)).await;
        settle().await;
        assert_eq!(handle.rendered(), 2);

        // tick 3: one new message
        store.append(&NewMessage::new("c", "three", "~")).await.unwrap();
        tokio::time::advance(Duration::from_millis(1000)).await;
        settle().await;
        assert_eq!(handle.rendered(), 3);
        assert_eq!(handle.transcript().lock().unwrap().lines()[2], "c@~: $ three");

        handle.shutdown().await;
    }

    /// First fetch is slow and returns a stale log; later fetches are current.
    struct SlowFirst {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MessageStore for SlowFirst {
        async fn append(&self, _: &NewMessage) -> Result<(), StoreError> {
            Ok(())
        }

        async fn fetch_recent(&self, _: usize) -> Result<Vec<Message>, StoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(2500)).await;
                return Ok(log(2));
            }
            Ok(log(3))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn late_stale_response_never_reorders() {
        let handle = Synchronizer::start(
            Arc::new(SlowFirst {
                calls: AtomicUsize::new(0),
            }),
            SyncConfig::default(),
        );
        settle().await;
        assert_eq!(handle.rendered(), 0);

        tokio::time::advance(Duration::from_millis(1000)).await;
        settle().await;
        assert_eq!(handle.rendered(), 3);

        // the slow first fetch lands now with only 2 entries
        tokio::time::advance(Duration::from_millis(1600)).await;
        settle().await;
        let t = handle.transcript();
        let lines = t.lock().unwrap().lines().to_vec();
        assert_eq!(lines, vec!["user1@~: $ m1", "user2@~: $ m2", "user3@~: $ m3"]);
    }

    struct FailTwice {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MessageStore for FailTwice {
        async fn append(&self, _: &NewMessage) -> Result<(), StoreError> {
            Ok(())
        }

        async fn fetch_recent(&self, _: usize) -> Result<Vec<Message>, StoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(StoreError::Status(502));
            }
            Ok(log(2))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_retries_next_tick() {
        let handle = Synchronizer::start(
            Arc::new(FailTwice {
                calls: AtomicUsize::new(0),
            }),
            SyncConfig::default(),
        );
        settle().await;
        assert_eq!(handle.rendered(), 0);
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(handle.rendered(), 0);
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(handle.rendered(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_polling() {
        let store = Arc::new(MemoryStore::new());
        let handle = Synchronizer::start(store.clone(), SyncConfig::default());
        settle().await;
        handle.stop();
        assert!(handle.is_stopped());

        store.append(&NewMessage::new("a", "late", "~")).await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(handle.rendered(), 0);
    }
}
