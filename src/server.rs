//! WebSocket transport.
//!
//! Each accepted socket gets a connection id, an outbox registered with the
//! hub, and two halves: a writer task draining the outbox and a reader loop
//! forwarding decoded frames. The hub hears about the connection closing
//! once the reader stops.

use crate::error::ChainError;
use crate::hub::{HubHandle, Outbound};
use crate::protocol::ClientMessage;
use crate::session::ConnectionId;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

pub struct Server {
    listener: TcpListener,
    hub: HubHandle,
    next_connection: u64,
}

impl Server {
    /// Bind the listening socket. Use port 0 to let the OS pick one.
    pub async fn bind(addr: &str, hub: HubHandle) -> Result<Self, ChainError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ChainError::NetworkError(format!("failed to bind {}: {}", addr, e)))?;

        Ok(Server {
            listener,
            hub,
            next_connection: 1,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ChainError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the hub goes away.
    pub async fn run(mut self) -> Result<(), ChainError> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            let connection = ConnectionId::new(self.next_connection);
            self.next_connection += 1;

            let hub = self.hub.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, connection, hub).await {
                    debug!(connection = %connection, peer = %peer, error = %e, "connection ended with error");
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    connection: ConnectionId,
    hub: HubHandle,
) -> Result<(), ChainError> {
    let ws = accept_async(stream).await?;
    info!(connection = %connection, peer = %peer, "websocket handshake complete");

    let (mut sink, mut source) = ws.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<Outbound>();
    hub.connect(connection, outbox)?;

    let writer = tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            let text = match message.encode() {
                Ok(text) => text,
                Err(e) => {
                    error!(connection = %connection, kind = message.kind(), error = %e, "failed to encode message");
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!(connection = %connection, error = %e, "write failed; stopping writer");
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = source.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    if hub.malformed(connection, "binary frame is not valid UTF-8").is_err() {
                        break;
                    }
                    continue;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(connection = %connection, error = %e, "read failed");
                break;
            }
        };

        let forwarded = match ClientMessage::decode(&text) {
            Ok(message) => hub.inbound(connection, message),
            Err(e) => hub.malformed(connection, e.to_string()),
        };
        if let Err(e) = forwarded {
            warn!(connection = %connection, error = %e, "dropping connection");
            break;
        }
    }

    let disconnected = hub.disconnect(connection);
    // The writer stops once the hub drops this connection's outbox.
    let _ = writer.await;
    disconnected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{Hub, HubSettings};
    use std::time::Duration;
    use tokio_tungstenite::connect_async;

    #[tokio::test]
    async fn test_connection_closes_when_hub_stops() {
        let (hub, hub_task) = Hub::new(HubSettings::default()).spawn();
        let server = Server::bind("127.0.0.1:0", hub.clone()).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        let join = ClientMessage::Join {
            user_id: "alice".to_string(),
            timestamp: None,
        };
        client.send(Message::Text(join.encode().unwrap())).await.unwrap();
        assert!(matches!(client.next().await, Some(Ok(Message::Text(_)))));

        hub_task.abort();
        let _ = hub_task.await;
        assert!(matches!(hub.status().await, Err(ChainError::HubUnavailable)));

        let mine = ClientMessage::MineBlock {
            user_id: "alice".to_string(),
        };
        let _ = client.send(Message::Text(mine.encode().unwrap())).await;

        let closed = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match client.next().await {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "server kept the connection open after the hub stopped");
    }
}
