use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Message, NewMessage, url_safe};

/// Default number of messages fetched per poll.
pub const DEFAULT_DEPTH: usize = 500;

/// Per-request timeout for [`HttpStore`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("bad server url: {0}")]
    Url(String),
}

/// Client side of the message store.
///
/// No authentication: any caller may post under any alias.
#[async_trait::async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Append a message. The store assigns its `time`.
    async fn append(&self, message: &NewMessage) -> Result<(), StoreError>;

    /// Up to `limit` most recent messages, oldest first.
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Message>, StoreError>;
}

// ─── HTTP ───

/// Store backed by the chat server's HTTP endpoints.
///
/// - `GET {base}/send/{alias}/{content}/{at}`
/// - `GET {base}/messages/{limit}`
pub struct HttpStore {
    client: reqwest::Client,
    base: reqwest::Url,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// `timeout` bounds each whole request, so a stalled poll ends instead of
    /// piling up behind later ticks.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let base = reqwest::Url::parse(base_url).map_err(|e| StoreError::Url(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Url(format!("{base_url} cannot be a base")));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Url(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// URL used by `append`, exposed for logging and tests.
    pub fn append_url(&self, message: &NewMessage) -> Result<reqwest::Url, StoreError> {
        self.endpoint(&[
            "send",
            &url_safe(&message.alias),
            &url_safe(&message.content),
            &url_safe(&message.at),
        ])
    }
}

/// `fetch_recent` accepts either an array or a keyed object of messages.
#[derive(Deserialize)]
#[serde(untagged)]
enum MessageLog {
    List(Vec<Message>),
    Keyed(BTreeMap<String, Message>),
}

impl MessageLog {
    fn into_sorted(self) -> Vec<Message> {
        let mut messages = match self {
            MessageLog::List(v) => v,
            MessageLog::Keyed(m) => m.into_values().collect(),
        };
        // stable: equal timestamps keep server order
        messages.sort_by(|a, b| a.time.cmp(&b.time));
        messages
    }
}

#[async_trait::async_trait]
impl MessageStore for HttpStore {
    async fn append(&self, message: &NewMessage) -> Result<(), StoreError> {
        let url = self.append_url(message)?;
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(StoreError::Status(resp.status().as_u16()));
        }
        Ok(())
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        let url = self.endpoint(&["messages", &limit.to_string()])?;
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(StoreError::Status(resp.status().as_u16()));
        }
        let bytes = resp.bytes().await?;
        let log: MessageLog = serde_json::from_slice(&bytes)?;
        Ok(log.into_sorted())
    }
}

// ─── In-memory ───

/// In-process store. Assigns strictly increasing times at write, like the server.
#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: &NewMessage) -> Result<(), StoreError> {
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        let time = match messages.last() {
            Some(last) if last.time >= now => last.time + TimeDelta::microseconds(1),
            _ => now,
        };
        messages.push(message.clone().stamp(time));
        Ok(())
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        let skip = messages.len().saturating_sub(limit);
        Ok(messages[skip..].to_vec())
    }
}

// ─── Delivery ───

/// How many times a failed post is attempted, and the pause between attempts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    /// Single attempt: failed posts are dropped.
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Post `message`, retrying per `policy`. Returns the last error if every attempt failed.
pub async fn deliver(
    store: &dyn MessageStore,
    message: &NewMessage,
    policy: &RetryPolicy,
) -> Result<(), StoreError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match store.append(message).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                tracing::debug!(attempt, error = %e, "post failed, retrying");
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Fire-and-forget post. Failures are logged, never surfaced.
///
/// Returns `None` when called outside a tokio runtime (the message is dropped).
pub fn spawn_delivery(
    store: Arc<dyn MessageStore>,
    message: NewMessage,
    policy: RetryPolicy,
) -> Option<tokio::task::JoinHandle<()>> {
    let handle = match tokio::runtime::Handle::try_current() {
        Ok(h) => h,
        Err(_) => {
            tracing::warn!(alias = %message.alias, "no runtime, message dropped");
            return None;
        }
    };
    Some(handle.spawn(async move {
        if let Err(e) = deliver(store.as_ref(), &message, &policy).await {
            tracing::warn!(alias = %message.alias, at = %message.at, error = %e, "failed to post message");
        }
    }))
}
