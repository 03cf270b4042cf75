//! TestClient - WebSocket client for the presence protocol

use std::time::Duration;

use anyhow::{bail, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestClient {
    write: futures_util::stream::SplitSink<WsStream, Message>,
    read: futures_util::stream::SplitStream<WsStream>,
}

impl TestClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(url).await?;
        let (write, read) = ws_stream.split();
        Ok(Self { write, read })
    }

    /// Send an arbitrary JSON message
    pub async fn send_json(&mut self, msg: &Value) -> Result<()> {
        self.send_raw(&msg.to_string()).await
    }

    /// Send a raw text frame
    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.write.send(Message::Text(text.to_string().into())).await?;
        Ok(())
    }

    pub async fn join(&mut self, space_id: &str, token: &str) -> Result<()> {
        self.send_json(&json!({
            "type": "join",
            "payload": {"spaceId": space_id, "token": token}
        }))
        .await
    }

    pub async fn move_to(&mut self, x: i64, y: i64) -> Result<()> {
        self.send_json(&json!({"type": "move", "payload": {"x": x, "y": y}}))
            .await
    }

    pub async fn leave(&mut self) -> Result<()> {
        self.send_json(&json!({"type": "leave"})).await
    }

    /// Receive the next message as JSON
    pub async fn recv_json(&mut self) -> Result<Value> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(serde_json::from_str(&text)?);
                }
                Some(Ok(Message::Close(_))) | None => {
                    bail!("WebSocket closed");
                }
                Some(Err(e)) => bail!("WebSocket error: {}", e),
                _ => continue,
            }
        }
    }

    pub async fn recv_json_timeout(&mut self, timeout: Duration) -> Result<Value> {
        match tokio::time::timeout(timeout, self.recv_json()).await {
            Ok(result) => result,
            Err(_) => bail!("Timeout waiting for WebSocket message"),
        }
    }

    /// Next message, which must be of `msg_type`
    pub async fn expect_next(&mut self, msg_type: &str) -> Result<Value> {
        let msg = self.recv_json_timeout(Duration::from_secs(5)).await?;
        if msg["type"] != msg_type {
            bail!("expected '{}', got {}", msg_type, msg);
        }
        Ok(msg)
    }

    /// Wait for a message of a specific type, skipping others
    pub async fn expect(&mut self, msg_type: &str) -> Result<Value> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                bail!("Timeout waiting for message type '{}'", msg_type);
            }

            let msg = self.recv_json_timeout(remaining).await?;
            if msg["type"] == msg_type {
                return Ok(msg);
            }
        }
    }

    /// Collect whatever arrives within a short quiet window
    pub async fn drain(&mut self) -> Vec<Value> {
        let mut messages = Vec::new();
        while let Ok(Ok(msg)) =
            tokio::time::timeout(Duration::from_millis(150), self.recv_json()).await
        {
            messages.push(msg);
        }
        messages
    }

    pub async fn close(&mut self) -> Result<()> {
        self.write.close().await?;
        Ok(())
    }
}

/// Messages of one type from a batch
pub fn of_type<'a>(messages: &'a [Value], msg_type: &str) -> Vec<&'a Value> {
    messages.iter().filter(|m| m["type"] == msg_type).collect()
}
