//! CLI for wshub
//!
//! Subcommands:
//! - `serve`: run the broadcast hub behind a websocket server
//! - `listen`: connect to a server, subscribe to topics and print events

use std::time::Duration;

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info};
use url::Url;

use wshub::config::{Settings, load_config};
use wshub::hub::BroadcastHub;
use wshub::transport::{ClientMessage, start_websocket_server};
use wshub::utils::{HubError, logging, signal};

const HEARTBEAT_TOPIC: &str = "heartbeat";

#[derive(Parser)]
#[command(name = "wshub")]
enum Command {
    /// Start the broadcast hub and its websocket server
    Serve,
    /// Subscribe to topics on a running server and print what arrives
    Listen {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Topic to subscribe to; repeat for several
        #[arg(long = "topic", default_value = "*")]
        topics: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    logging::init(&config.log.level);

    let result = match cmd {
        Command::Serve => run_server(config).await,
        Command::Listen { url, topics } => run_listener(&url, &topics).await,
    };
    if let Err(e) = result {
        error!("wshub failed: {}", e);
        std::process::exit(1);
    }
}

async fn run_server(config: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let hub = BroadcastHub::new(config.hub.hub_config());
    hub.run();

    if config.hub.heartbeat_secs > 0 {
        tokio::spawn(heartbeat(
            hub.clone(),
            Duration::from_secs(config.hub.heartbeat_secs),
        ));
    }

    tokio::select! {
        res = start_websocket_server(addr, hub, config.hub.clone()) => {
            res?;
            error!("WebSocket server exited unexpectedly.");
        }
        sig = signal::wait() => {
            info!(signal = %sig?, "Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

/// Broadcasts the current time on the heartbeat topic until the hub stops.
async fn heartbeat(hub: BroadcastHub, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let beat = json!({ "time": chrono::Utc::now().to_rfc3339() });
        match hub.broadcast_json(HEARTBEAT_TOPIC, &beat).await {
            Ok(()) => {}
            // only if the control-loop task itself was aborted
            Err(HubError::Stopped) => break,
            Err(e) => error!("heartbeat failed: {}", e),
        }
    }
}

async fn run_listener(url: &str, topics: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let url = Url::parse(url)?;
    let (mut ws_stream, _response) = connect_async(url.as_str()).await?;
    info!(%url, "connected");

    for topic in topics {
        let subscribe = ClientMessage::Subscribe {
            topic: topic.clone(),
        };
        ws_stream
            .send(WsMessage::Text(serde_json::to_string(&subscribe)?.into()))
            .await?;
    }

    while let Some(frame) = ws_stream.next().await {
        match frame? {
            WsMessage::Text(text) => println!("{}", text.as_str()),
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    info!("server closed the connection");
    Ok(())
}
