use futures::{SinkExt, StreamExt};
use platform_db::{BackendClient, BackendSettings, ChangeEvent, ChangeFilter, DbError};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
};
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};

#[derive(Debug, Deserialize, PartialEq)]
struct OrderChange {
    #[serde(rename = "ref")]
    reference: String,
    status: String,
}

async fn next_message(socket: &mut WebSocketStream<TcpStream>) -> Option<Value> {
    while let Some(frame) = socket.next().await {
        if let Ok(Message::Text(text)) = frame {
            let message: Value = serde_json::from_str(&text).ok()?;
            if message["event"] != "heartbeat" {
                return Some(message);
            }
        }
    }
    None
}

async fn send(socket: &mut WebSocketStream<TcpStream>, message: Value) {
    socket
        .send(Message::Text(message.to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn forwards_matching_rows_until_unsubscribed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (join_tx, join_rx) = oneshot::channel::<Value>();
    let (leave_tx, leave_rx) = oneshot::channel::<Value>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();
        let join = next_message(&mut socket).await.unwrap();
        let topic = join["topic"].clone();
        send(
            &mut socket,
            json!({"topic": topic, "event": "phx_reply", "payload": {"status": "ok", "response": {}}, "ref": join["ref"]}),
        )
        .await;
        let _ = join_tx.send(join);

        send(
            &mut socket,
            json!({"topic": "realtime:other", "event": "postgres_changes", "payload": {"data": {"record": {"ref": "FT-0", "status": "Received"}}}, "ref": null}),
        )
        .await;
        send(
            &mut socket,
            json!({"topic": topic, "event": "postgres_changes", "payload": {"data": {"type": "UPDATE", "record": {"ref": "FT-7", "status": "Complete"}}}, "ref": null}),
        )
        .await;

        while let Some(message) = next_message(&mut socket).await {
            if message["event"] == "phx_leave" {
                let _ = leave_tx.send(message);
                break;
            }
        }
    });

    let client = BackendClient::connect(&BackendSettings::new(
        format!("http://{addr}"),
        "service-key",
        "anon-key",
    ))
    .unwrap();
    let filter =
        ChangeFilter::new("order-FT-7", ChangeEvent::Update, "orders").with_filter("ref=eq.FT-7");
    let mut subscription = client.subscribe::<OrderChange>(filter).await.unwrap();
    assert!(subscription.is_live());

    let join = join_rx.await.unwrap();
    assert_eq!(join["topic"], "realtime:order-FT-7");
    assert_eq!(join["payload"]["access_token"], "service-key");
    assert_eq!(
        join["payload"]["config"]["postgres_changes"][0]["filter"],
        "ref=eq.FT-7"
    );

    let change = subscription.next().await.unwrap();
    assert_eq!(
        change,
        OrderChange {
            reference: "FT-7".into(),
            status: "Complete".into()
        }
    );

    subscription.unsubscribe().await;
    let leave = leave_rx.await.unwrap();
    assert_eq!(leave["topic"], "realtime:order-FT-7");
}

#[tokio::test]
async fn rejected_join_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();
        let join = next_message(&mut socket).await.unwrap();
        send(
            &mut socket,
            json!({"topic": join["topic"], "event": "phx_reply", "payload": {"status": "error", "response": {"reason": "unauthorized"}}, "ref": join["ref"]}),
        )
        .await;
    });

    let client = BackendClient::connect(&BackendSettings::new(
        format!("http://{addr}"),
        "service-key",
        "anon-key",
    ))
    .unwrap();
    let result = client
        .subscribe::<OrderChange>(ChangeFilter::new("quotes-insert", ChangeEvent::Insert, "quotes"))
        .await;
    assert!(matches!(result, Err(DbError::Realtime(message)) if message.contains("rejected")));
}
