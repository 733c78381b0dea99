//! Live change feeds over the backend's Phoenix-channel websocket
//!
//! A subscription joins one channel scoped to a table (optionally filtered),
//! then forwards every row-change event to the caller's handler as it
//! arrives. There is no local buffering and no reconnection policy: feed
//! lifecycle belongs to the backend, and a dropped connection simply ends
//! the feed. Callers that need debouncing do it themselves.

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::errors::FlowError;
use crate::logger::{self, LogTag};

/// Phoenix heartbeat cadence keeping the socket alive
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// How long a graceful unsubscribe waits for the reader task to wind down
const LEAVE_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// PUBLIC TYPES
// =============================================================================

/// Kind of row change delivered by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// One row change: the event type plus the row before and after,
/// exactly as the backend reports them
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Caller-supplied handler invoked inline for every change event
pub type ChangeHandler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Description of one channel subscription
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    /// Channel topic, unique per open feed
    pub topic: String,
    pub table: String,
    /// "*" for all events, or one of INSERT/UPDATE/DELETE
    pub event: String,
    /// Optional row filter, e.g. `department=eq.cardiology`
    pub filter: Option<String>,
}

impl SubscribeRequest {
    pub fn all_events(topic: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            table: table.into(),
            event: "*".to_string(),
            filter: None,
        }
    }

    pub fn updates_only(topic: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            event: "UPDATE".to_string(),
            ..Self::all_events(topic, table)
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Handle to an open feed. `unsubscribe` leaves the channel gracefully;
/// dropping the handle tears the reader task down immediately.
pub struct RealtimeSubscription {
    topic: String,
    leave_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RealtimeSubscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Leave the channel and wait (briefly) for the feed to close
    pub async fn unsubscribe(mut self) {
        if let Some(tx) = self.leave_tx.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(LEAVE_TIMEOUT, &mut self.task).await;
        logger::debug(
            LogTag::Realtime,
            &format!("Unsubscribed from {}", self.topic),
        );
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        if let Some(tx) = self.leave_tx.take() {
            let _ = tx.send(());
        }
        self.task.abort();
    }
}

// =============================================================================
// WIRE FRAMES
// =============================================================================

#[derive(Serialize)]
struct OutgoingFrame<'a> {
    topic: &'a str,
    event: &'a str,
    payload: Value,
    #[serde(rename = "ref")]
    reference: String,
}

#[derive(Deserialize)]
struct IncomingFrame {
    #[serde(default)]
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
}

/// Render the `phx_join` frame carrying the channel's
/// `postgres_changes` subscription config
fn encode_join(request: &SubscribeRequest) -> Result<String, serde_json::Error> {
    let mut changes = json!({
        "event": request.event,
        "schema": "public",
        "table": request.table,
    });
    if let Some(filter) = &request.filter {
        changes["filter"] = json!(filter);
    }
    let join = OutgoingFrame {
        topic: &request.topic,
        event: "phx_join",
        payload: json!({ "config": { "postgres_changes": [changes] } }),
        reference: "1".to_string(),
    };
    serde_json::to_string(&join)
}

/// `postgres_changes` payload shape: `{"data": {...}, "ids": [...]}`
#[derive(Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    table: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

// =============================================================================
// SUBSCRIPTION LIFECYCLE
// =============================================================================

/// Connect, join the channel and spawn the reader task
pub(crate) async fn open_subscription(
    endpoint: &str,
    request: SubscribeRequest,
    handler: ChangeHandler,
) -> Result<RealtimeSubscription, FlowError> {
    let (stream, _) = connect_async(endpoint)
        .await
        .map_err(|e| FlowError::realtime(format!("websocket connect failed: {}", e)))?;
    let (mut write, mut read) = stream.split();

    let frame = encode_join(&request)?;
    write
        .send(Message::Text(frame))
        .await
        .map_err(|e| FlowError::realtime(format!("channel join failed: {}", e)))?;

    logger::info(
        LogTag::Realtime,
        &format!(
            "Subscribed to {} (table={}, event={})",
            request.topic, request.table, request.event
        ),
    );

    let (leave_tx, mut leave_rx) = oneshot::channel::<()>();
    let topic = request.topic.clone();
    let task_topic = request.topic;

    let task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await; // consume the immediate first tick
        let mut next_reference: u64 = 2;

        loop {
            tokio::select! {
                _ = &mut leave_rx => {
                    let leave = OutgoingFrame {
                        topic: &task_topic,
                        event: "phx_leave",
                        payload: json!({}),
                        reference: next_reference.to_string(),
                    };
                    if let Ok(frame) = serde_json::to_string(&leave) {
                        let _ = write.send(Message::Text(frame)).await;
                    }
                    break;
                }
                _ = heartbeat.tick() => {
                    let beat = OutgoingFrame {
                        topic: "phoenix",
                        event: "heartbeat",
                        payload: json!({}),
                        reference: next_reference.to_string(),
                    };
                    next_reference += 1;
                    let frame = match serde_json::to_string(&beat) {
                        Ok(frame) => frame,
                        Err(_) => continue,
                    };
                    if write.send(Message::Text(frame)).await.is_err() {
                        logger::warning(
                            LogTag::Realtime,
                            &format!("Heartbeat send failed, feed {} closed", task_topic),
                        );
                        break;
                    }
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(event) = decode_frame(&text) {
                                (handler.as_ref())(event);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            logger::info(
                                LogTag::Realtime,
                                &format!("Feed {} closed by the backend", task_topic),
                            );
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            logger::warning(
                                LogTag::Realtime,
                                &format!("Feed {} error: {}", task_topic, e),
                            );
                            break;
                        }
                    }
                }
            }
        }
    });

    Ok(RealtimeSubscription {
        topic,
        leave_tx: Some(leave_tx),
        task,
    })
}

/// Decode one websocket frame into a change event, if it carries one
fn decode_frame(text: &str) -> Option<ChangeEvent> {
    let frame: IncomingFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            logger::debug(
                LogTag::Realtime,
                &format!("Undecodable frame ignored: {}", e),
            );
            return None;
        }
    };

    match frame.event.as_str() {
        "postgres_changes" => {
            // Change detail lives under payload.data
            let data = frame.payload.get("data").cloned().unwrap_or(frame.payload);
            let change: ChangeData = match serde_json::from_value(data) {
                Ok(change) => change,
                Err(e) => {
                    logger::warning(
                        LogTag::Realtime,
                        &format!("Malformed change event on {}: {}", frame.topic, e),
                    );
                    return None;
                }
            };
            let kind = ChangeKind::parse(&change.kind)?;
            Some(ChangeEvent {
                kind,
                table: change.table,
                old: change.old_record,
                new: change.record,
            })
        }
        "phx_reply" => {
            let status = frame
                .payload
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or("unknown");
            if status == "error" {
                logger::warning(
                    LogTag::Realtime,
                    &format!("Channel {} reply: {}", frame.topic, frame.payload),
                );
            }
            None
        }
        _ => None,
    }
}
