//! End-to-end tests over WebSocket: a simulated bridge feeds request
//! events, a display surface reads the result.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use stream_capturer::{Host, HostOptions, Server, StreamRecord, StreamType, SurfaceClient};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use uuid::Uuid;

// ============================================================================
// Helpers
// ============================================================================

/// Tab the simulated browser reports as closed.
const CLOSED_TAB: u64 = 99;

/// Tab whose lookup fails with a generic browser error.
const BROKEN_TAB: u64 = 98;

async fn start_host() -> Result<(Arc<Host>, Arc<Server>)> {
    let host = Arc::new(
        Host::builder()
            .options(HostOptions::ephemeral().with_lookup_timeout(Duration::from_secs(2)))
            .build()
            .await?,
    );
    let server = host.serve().await?;
    Ok((host, server))
}

/// Simulated browser extension.
struct Bridge {
    outgoing: mpsc::UnboundedSender<String>,
    badge: watch::Receiver<String>,
}

impl Bridge {
    async fn connect(ws_url: &str) -> Result<Self> {
        let (mut ws, _) = connect_async(ws_url).await?;
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
        let (badge_tx, badge) = watch::channel(String::new());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = ws.next() => {
                        let Some(Ok(WsMessage::Text(text))) = frame else { break };
                        let Ok(request) = serde_json::from_str::<Value>(&text) else { continue };
                        let reply = answer(&request, &badge_tx);
                        if ws.send(WsMessage::Text(reply.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    event = outgoing_rx.recv() => {
                        let Some(event) = event else { break };
                        if ws.send(WsMessage::Text(event.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self { outgoing, badge })
    }

    fn request_sent(&self, url: &str, tab_id: u64) -> Result<()> {
        let event = json!({
            "id": Uuid::new_v4(),
            "type": "event",
            "method": "network.beforeRequestSent",
            "params": {
                "requestId": Uuid::new_v4().to_string(),
                "url": url,
                "method": "GET",
                "tabId": tab_id
            }
        });
        self.outgoing.send(event.to_string())?;
        Ok(())
    }

    async fn wait_for_badge(&mut self, expected: &str) -> Result<()> {
        tokio::time::timeout(
            Duration::from_secs(5),
            self.badge.wait_for(|text| text == expected),
        )
        .await
        .with_context(|| format!("badge never became {expected:?}"))??;
        Ok(())
    }
}

/// Answers a host command the way the extension does.
fn answer(request: &Value, badge: &watch::Sender<String>) -> Value {
    let id = request["id"].clone();
    let params = &request["params"];

    match request["method"].as_str() {
        Some("tabs.get") if params["tabId"].as_u64() == Some(CLOSED_TAB) => json!({
            "id": id,
            "type": "error",
            "error": "no such tab",
            "message": format!("No tab with id: {CLOSED_TAB}")
        }),
        Some("tabs.get") if params["tabId"].as_u64() == Some(BROKEN_TAB) => json!({
            "id": id,
            "type": "error",
            "error": "unknown error"
        }),
        Some("tabs.get") => json!({
            "id": id,
            "type": "success",
            "result": {
                "url": format!("https://videos.example.com/watch/{}", params["tabId"]),
                "title": "Example Video"
            }
        }),
        Some("action.setBadgeText") => {
            badge.send_replace(params["text"].as_str().unwrap_or_default().to_string());
            json!({ "id": id, "type": "success", "result": null })
        }
        _ => json!({ "id": id, "type": "error", "error": "unknown command" }),
    }
}

/// Polls `getStreams` until `count` records are listed.
async fn wait_for_streams(client: &mut SurfaceClient, count: usize) -> Result<Vec<StreamRecord>> {
    for _ in 0..100 {
        let streams = client.streams().await?;
        if streams.len() >= count {
            return Ok(streams);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    bail!("expected {count} streams")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_bridge_event_reaches_surface() -> Result<()> {
    let (_host, server) = start_host().await?;
    let mut surface = SurfaceClient::connect(&server.ws_url()).await?;
    let mut bridge = Bridge::connect(&server.ws_url()).await?;

    assert!(surface.toggle_capture(true).await?);
    bridge.request_sent("https://cdn.example.com/live/master.m3u8?token=abc", 3)?;

    let streams = wait_for_streams(&mut surface, 1).await?;
    let record = &streams[0];
    assert_eq!(record.url, "https://cdn.example.com/live/master.m3u8?token=abc");
    assert_eq!(record.stream_type, StreamType::MasterM3u8);
    assert_eq!(record.source.tab_id.as_u32(), 3);
    assert_eq!(
        record.source.tab_url.as_deref(),
        Some("https://videos.example.com/watch/3")
    );
    assert_eq!(record.title_or_unknown(), "Example Video");

    bridge.wait_for_badge("1").await?;
    assert_eq!(surface.state().await?.badge, "1");

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_disabled_capture_ignores_events() -> Result<()> {
    let (host, server) = start_host().await?;
    let mut surface = SurfaceClient::connect(&server.ws_url()).await?;
    let bridge = Bridge::connect(&server.ws_url()).await?;

    bridge.request_sent("https://cdn.example.com/master.m3u8", 1)?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(surface.streams().await?.is_empty());
    assert!(host.state().is_empty());
    assert!(!surface.state().await?.is_capturing);

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_segments_counted_duplicates_dropped() -> Result<()> {
    let (_host, server) = start_host().await?;
    let mut surface = SurfaceClient::connect(&server.ws_url()).await?;
    let mut bridge = Bridge::connect(&server.ws_url()).await?;

    surface.toggle_capture(true).await?;
    bridge.request_sent("https://cdn.example.com/v/index.m3u8?t=1", 1)?;
    bridge.request_sent("https://cdn.example.com/v/index.m3u8?t=2", 1)?;
    bridge.request_sent("https://cdn.example.com/v/seg-001.ts", 1)?;
    bridge.request_sent("https://example.com/app.js", 1)?;

    bridge.wait_for_badge("2").await?;

    let streams = surface.streams().await?;
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].stream_type, StreamType::VariantM3u8);

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_closed_tab_drops_event() -> Result<()> {
    let (_host, server) = start_host().await?;
    let mut surface = SurfaceClient::connect(&server.ws_url()).await?;
    let bridge = Bridge::connect(&server.ws_url()).await?;

    surface.toggle_capture(true).await?;
    bridge.request_sent("https://cdn.example.com/gone/master.m3u8", CLOSED_TAB)?;
    bridge.request_sent("https://abc.workers.dev/stream", 4)?;

    let streams = wait_for_streams(&mut surface, 1).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let streams_later = surface.streams().await?;

    assert_eq!(streams.len(), 1);
    assert_eq!(streams_later.len(), 1);
    assert_eq!(streams_later[0].stream_type, StreamType::CloudflareWorkers);

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_failed_tab_lookup_drops_event() -> Result<()> {
    let (_host, server) = start_host().await?;
    let mut surface = SurfaceClient::connect(&server.ws_url()).await?;
    let bridge = Bridge::connect(&server.ws_url()).await?;

    surface.toggle_capture(true).await?;
    bridge.request_sent("https://cdn.example.com/broken/master.m3u8", BROKEN_TAB)?;
    bridge.request_sent("https://cdn.example.com/fine/master.mpd", 5)?;

    wait_for_streams(&mut surface, 1).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let streams = surface.streams().await?;

    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].url, "https://cdn.example.com/fine/master.mpd");
    assert_eq!(surface.state().await?.badge, "1");

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_event_burst_keeps_every_stream() -> Result<()> {
    const BURST: usize = 300;

    let (host, server) = start_host().await?;
    let mut surface = SurfaceClient::connect(&server.ws_url()).await?;
    let mut bridge = Bridge::connect(&server.ws_url()).await?;

    surface.toggle_capture(true).await?;
    for i in 0..BURST {
        bridge.request_sent(&format!("https://cdn.example.com/burst/seg-{i}.ts"), 1)?;
    }

    bridge.wait_for_badge(&BURST.to_string()).await?;
    assert_eq!(host.state().len(), BURST);

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_disable_keeps_list_clear_empties_it() -> Result<()> {
    let (_host, server) = start_host().await?;
    let mut surface = SurfaceClient::connect(&server.ws_url()).await?;
    let mut bridge = Bridge::connect(&server.ws_url()).await?;

    surface.toggle_capture(true).await?;
    bridge.request_sent("https://cdn.example.com/a/master.m3u8", 1)?;
    wait_for_streams(&mut surface, 1).await?;
    bridge.wait_for_badge("1").await?;

    assert!(!surface.toggle_capture(false).await?);
    bridge.wait_for_badge("").await?;
    assert_eq!(surface.streams().await?.len(), 1);

    surface.clear().await?;
    assert!(surface.streams().await?.is_empty());

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_unknown_action_gets_error_reply() -> Result<()> {
    let (_host, server) = start_host().await?;
    let (mut ws, _) = connect_async(server.ws_url()).await?;

    let id = Uuid::new_v4();
    let message = json!({ "id": id, "type": "message", "action": "videoDetected" });
    ws.send(WsMessage::Text(message.to_string().into())).await?;

    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await?
        .context("connection closed")??;
    let WsMessage::Text(text) = frame else {
        bail!("expected text frame");
    };
    let reply: Value = serde_json::from_str(&text)?;

    assert_eq!(reply["id"], id.to_string());
    assert_eq!(reply["type"], "reply");
    assert_eq!(reply["success"], false);
    assert_eq!(reply["error"], "Unknown action: videoDetected");

    server.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_proxy_failure_reported_to_surface() -> Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let host = Arc::new(
        Host::builder()
            .options(HostOptions::ephemeral())
            .proxy_endpoint(format!("http://127.0.0.1:{port}/api/proxy-url"))
            .build()
            .await?,
    );
    let server = host.serve().await?;
    let mut surface = SurfaceClient::connect(&server.ws_url()).await?;

    let err = surface
        .send_to_proxy("https://cdn.example.com/master.m3u8")
        .await
        .expect_err("proxy is down");
    assert!(err.to_string().contains("Cannot connect to proxy server"));

    server.shutdown();
    Ok(())
}
