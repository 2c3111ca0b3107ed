//! Row-change push feed.
//!
//! The backend streams table changes over a Phoenix-channel websocket. Each
//! [`Subscription`] owns one socket joined to one channel; changed rows are
//! forwarded as they arrive. There is no replay and no reconnection: when the
//! socket drops, [`Subscription::next`] returns `None`.

use std::time::Duration;

use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, interval_at, timeout},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::{BackendClient, DbError, DbResult};

const HEARTBEAT_EVERY: Duration = Duration::from_secs(25);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_BUFFER: usize = 64;
const JOIN_REF: &str = "1";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert,
    Update,
    Delete,
    Any,
}

impl ChangeEvent {
    fn as_str(self) -> &'static str {
        match self {
            ChangeEvent::Insert => "INSERT",
            ChangeEvent::Update => "UPDATE",
            ChangeEvent::Delete => "DELETE",
            ChangeEvent::Any => "*",
        }
    }
}

/// Which changes a subscription receives.
#[derive(Clone, Debug)]
pub struct ChangeFilter {
    pub channel: String,
    pub event: ChangeEvent,
    pub table: String,
    /// Row filter in `column=eq.value` form.
    pub filter: Option<String>,
}

impl ChangeFilter {
    pub fn new(channel: impl Into<String>, event: ChangeEvent, table: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            event,
            table: table.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn topic(&self) -> String {
        format!("realtime:{}", self.channel)
    }

    fn join_payload(&self, access_token: &str) -> Value {
        let mut change = json!({
            "event": self.event.as_str(),
            "schema": "public",
            "table": self.table,
        });
        if let Some(filter) = &self.filter {
            change["filter"] = Value::String(filter.clone());
        }
        json!({
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [change],
            },
            "access_token": access_token,
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct PhoenixMessage {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    join_ref: Option<String>,
}

impl PhoenixMessage {
    fn new(topic: &str, event: &str, payload: Value, reference: u64) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    fn encode(&self) -> DbResult<Message> {
        Ok(Message::Text(serde_json::to_string(self)?))
    }
}

/// Live change feed for rows of type `T`.
///
/// Call [`Subscription::unsubscribe`] to leave the channel and close the
/// socket. Dropping the subscription stops the background task as well.
pub struct Subscription<T> {
    events: Option<mpsc::Receiver<T>>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl<T> Subscription<T> {
    /// A subscription with no feed behind it; `next` returns `None` at once.
    pub fn inert() -> Self {
        Self {
            events: None,
            stop: None,
            task: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Next changed row, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<T> {
        match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => None,
        }
    }

    pub async fn unsubscribe(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl BackendClient {
    /// Join a change channel and start forwarding matching rows.
    pub async fn subscribe<T>(&self, filter: ChangeFilter) -> DbResult<Subscription<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = realtime_url(self.base_url(), self.api_key());
        let (socket, _) = connect_async(url.as_str()).await.map_err(realtime_error)?;
        let (mut sink, mut stream) = socket.split();

        let topic = filter.topic();
        let join = PhoenixMessage {
            topic: topic.clone(),
            event: "phx_join".into(),
            payload: filter.join_payload(self.bearer()),
            reference: Some(JOIN_REF.into()),
            join_ref: Some(JOIN_REF.into()),
        };
        sink.send(join.encode()?).await.map_err(realtime_error)?;
        timeout(JOIN_TIMEOUT, await_join(&mut stream, &topic))
            .await
            .map_err(|_| DbError::Realtime(format!("join of {topic} timed out")))??;
        debug!(%topic, table = %filter.table, "realtime channel joined");

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(forward_changes(sink, stream, topic, events_tx, stop_rx));
        Ok(Subscription {
            events: Some(events_rx),
            stop: Some(stop_tx),
            task: Some(task),
        })
    }
}

async fn await_join(stream: &mut SplitStream<Socket>, topic: &str) -> DbResult<()> {
    while let Some(frame) = stream.next().await {
        let Message::Text(text) = frame.map_err(realtime_error)? else {
            continue;
        };
        let Ok(message) = serde_json::from_str::<PhoenixMessage>(&text) else {
            continue;
        };
        if message.topic != topic || message.event != "phx_reply" {
            continue;
        }
        let status = message
            .payload
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if status == "ok" {
            return Ok(());
        }
        let response = message.payload.get("response").cloned().unwrap_or_default();
        return Err(DbError::Realtime(format!("join of {topic} rejected: {response}")));
    }
    Err(DbError::Realtime(format!("socket closed before {topic} was joined")))
}

async fn forward_changes<T>(
    mut sink: SplitSink<Socket, Message>,
    mut stream: SplitStream<Socket>,
    topic: String,
    events: mpsc::Sender<T>,
    mut stop: oneshot::Receiver<()>,
) where
    T: DeserializeOwned + Send + 'static,
{
    let mut heartbeat = interval_at(Instant::now() + HEARTBEAT_EVERY, HEARTBEAT_EVERY);
    let mut next_ref: u64 = 1;
    loop {
        tokio::select! {
            _ = &mut stop => {
                next_ref += 1;
                let mut leave = PhoenixMessage::new(&topic, "phx_leave", json!({}), next_ref);
                leave.join_ref = Some(JOIN_REF.into());
                if let Ok(frame) = leave.encode() {
                    let _ = sink.send(frame).await;
                }
                let _ = sink.close().await;
                debug!(%topic, "realtime channel left");
                break;
            }
            _ = heartbeat.tick() => {
                next_ref += 1;
                let beat = PhoenixMessage::new("phoenix", "heartbeat", json!({}), next_ref);
                let sent = match beat.encode() {
                    Ok(frame) => sink.send(frame).await.is_ok(),
                    Err(_) => false,
                };
                if !sent {
                    warn!(%topic, "realtime heartbeat failed");
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let Some(record) = change_record(&text, &topic) else {
                        continue;
                    };
                    match serde_json::from_value::<T>(record) {
                        Ok(row) => {
                            if events.send(row).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => warn!(%topic, %err, "skipping undecodable change"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(%topic, %err, "realtime socket error");
                    break;
                }
            },
        }
    }
}

fn change_record(text: &str, topic: &str) -> Option<Value> {
    let message: PhoenixMessage = serde_json::from_str(text).ok()?;
    if message.topic != topic || message.event != "postgres_changes" {
        return None;
    }
    message.payload.get("data")?.get("record").cloned()
}

fn realtime_url(base_url: &str, api_key: &str) -> String {
    let socket_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_url.to_string()
    };
    format!("{socket_base}/realtime/v1/websocket?apikey={api_key}&vsn=1.0.0")
}

fn realtime_error(err: impl std::fmt::Display) -> DbError {
    DbError::Realtime(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_url_follows_the_http_scheme() {
        assert_eq!(
            realtime_url("https://abc.example.co", "anon"),
            "wss://abc.example.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
        assert_eq!(
            realtime_url("http://127.0.0.1:5400", "anon"),
            "ws://127.0.0.1:5400/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn join_payload_carries_the_row_filter() {
        let filter = ChangeFilter::new("order-FT-1", ChangeEvent::Update, "orders")
            .with_filter("ref=eq.FT-1");
        let payload = filter.join_payload("token");
        let change = &payload["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "UPDATE");
        assert_eq!(change["table"], "orders");
        assert_eq!(change["filter"], "ref=eq.FT-1");
        assert_eq!(filter.topic(), "realtime:order-FT-1");
    }

    #[test]
    fn only_changes_on_our_topic_are_forwarded() {
        let change = r#"{"topic":"realtime:orders-insert","event":"postgres_changes","payload":{"data":{"type":"INSERT","record":{"ref":"FT-9"}}},"ref":null}"#;
        assert_eq!(
            change_record(change, "realtime:orders-insert"),
            Some(json!({"ref": "FT-9"}))
        );
        assert_eq!(change_record(change, "realtime:quotes-insert"), None);
        let reply = r#"{"topic":"realtime:orders-insert","event":"phx_reply","payload":{"status":"ok"},"ref":"1"}"#;
        assert_eq!(change_record(reply, "realtime:orders-insert"), None);
    }
}
