//! End-to-end tests: real websocket clients talking to a running hub.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::config::HubSettings;
use crate::hub::{BroadcastHub, HubConfig};
use crate::transport::{ClientMessage, serve};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn subscribe(ws: &mut Client, topic: &str) {
    let msg = ClientMessage::Subscribe {
        topic: topic.to_string(),
    };
    ws.send(WsMessage::Text(serde_json::to_string(&msg).unwrap().into()))
        .await
        .unwrap();
}

async fn next_text(ws: &mut Client) -> Option<String> {
    match tokio::time::timeout(Duration::from_millis(300), ws.next()).await {
        Ok(Some(Ok(WsMessage::Text(text)))) => Some(text.as_str().to_string()),
        _ => None,
    }
}

#[tokio::test]
async fn integration_news_and_sports_fan_out() {
    let hub = BroadcastHub::new(HubConfig::default());
    hub.run();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(serve(listener, hub.clone(), HubSettings::default()));

    let (mut news, _) = connect_async(url.as_str()).await.expect("client A connect");
    let (mut sports, _) = connect_async(url.as_str()).await.expect("client B connect");
    subscribe(&mut news, "news").await;
    subscribe(&mut sports, "sports").await;

    tokio::time::timeout(Duration::from_secs(2), async {
        while hub.count_peers().await.unwrap() != 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("clients never registered");
    tokio::time::sleep(Duration::from_millis(100)).await;

    hub.broadcast_json("news", &json!({"payload": "A"}))
        .await
        .unwrap();
    hub.broadcast_json("sports", &json!({"payload": "B"}))
        .await
        .unwrap();

    assert_eq!(next_text(&mut news).await.as_deref(), Some(r#"{"payload":"A"}"#));
    assert_eq!(next_text(&mut sports).await.as_deref(), Some(r#"{"payload":"B"}"#));
    assert_eq!(next_text(&mut news).await, None);
    assert_eq!(next_text(&mut sports).await, None);

    news.close(None).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), async {
        while hub.count_peers().await.unwrap() != 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("closed client was not unregistered");

    hub.broadcast_json("news", &json!({"payload": "C"}))
        .await
        .unwrap();
    assert_eq!(next_text(&mut sports).await, None);
}
