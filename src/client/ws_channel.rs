use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::client::{EventHandler, HandlerRegistry, MessageChannel};
use crate::error::{AppError, WebSocketError};
use crate::relay::{ClientEvent, EventKind, ServerEvent};
use crate::Result;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// [`MessageChannel`] over a websocket connection to a relay server.
pub struct WsChannel {
    url: Url,
    id: Arc<RwLock<Option<Uuid>>>,
    handlers: HandlerRegistry,
    tx: Option<mpsc::UnboundedSender<Message>>,
    send_task: Option<JoinHandle<()>>,
    receive_task: Option<JoinHandle<()>>,
}

impl WsChannel {
    pub fn new(server_url: &str) -> Result<Self> {
        let url = Url::parse(server_url).map_err(|e| {
            AppError::ValidationError(format!("Invalid server url {}: {}", server_url, e))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(AppError::ValidationError(format!(
                "Unsupported scheme {} in {}",
                url.scheme(),
                server_url
            )));
        }

        Ok(Self {
            url,
            id: Arc::new(RwLock::new(None)),
            handlers: HandlerRegistry::new(),
            tx: None,
            send_task: None,
            receive_task: None,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// The relay announces the connection id in its first frame.
async fn wait_for_id(reader: &mut WsReader) -> Result<Uuid> {
    while let Some(frame) = reader.next().await {
        match frame? {
            Message::Text(text) => {
                return match serde_json::from_str::<ServerEvent>(&text)? {
                    ServerEvent::Connected { id } => Ok(id),
                    other => Err(WebSocketError::InvalidFormat(format!(
                        "Expected connected event, got {:?}",
                        other.kind()
                    ))
                    .into()),
                };
            }
            Message::Close(reason) => {
                return Err(WebSocketError::ConnectionError(format!(
                    "Closed before handshake completed: {:?}",
                    reason
                ))
                .into());
            }
            _ => continue,
        }
    }

    Err(WebSocketError::ConnectionError("Stream ended before handshake completed".to_string()).into())
}

#[async_trait]
impl MessageChannel for WsChannel {
    async fn connect(&mut self) -> Result<Uuid> {
        if let Some(id) = *self.id.read().await {
            return Ok(id);
        }

        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (ws_sink, mut ws_reader) = ws_stream.split();
        let id = wait_for_id(&mut ws_reader).await?;
        *self.id.write().await = Some(id);
        info!("Connected to {} as {}", self.url, id);

        let (tx, rx) = mpsc::unbounded_channel();

        // Forward queued frames to the socket
        let send_task = tokio::spawn(async move {
            let mut ws_sink = ws_sink;
            let mut rx = rx;

            while let Some(message) = rx.recv().await {
                if let Err(e) = ws_sink.send(message).await {
                    error!("Error sending WebSocket message: {}", e);
                    break;
                }
            }

            if let Err(e) = ws_sink.close().await {
                debug!("Error closing WebSocket connection: {}", e);
            }
        });

        let handlers = self.handlers.clone();
        let id_slot = self.id.clone();
        let receive_task = tokio::spawn(async move {
            while let Some(frame) = ws_reader.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            let kind = event.kind();
                            if !handlers.dispatch(event).await {
                                debug!("No handler for {:?} on {}", kind, id);
                            }
                        }
                        Err(e) => warn!("Ignoring unrecognised frame on {}: {}", id, e),
                    },
                    Ok(Message::Close(reason)) => {
                        info!("Server closed connection {}: {:?}", id, reason);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Error receiving WebSocket message on {}: {}", id, e);
                        break;
                    }
                }
            }
            *id_slot.write().await = None;
            // Nothing more will arrive; let listeners see the channel close
            handlers.clear().await;
        });

        self.tx = Some(tx);
        self.send_task = Some(send_task);
        self.receive_task = Some(receive_task);

        self.handlers.dispatch(ServerEvent::Connected { id }).await;
        Ok(id)
    }

    async fn emit(&self, event: ClientEvent) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(WebSocketError::NotConnected)?;
        let text = serde_json::to_string(&event)?;
        tx.send(Message::Text(text))
            .map_err(|e| WebSocketError::SendError(e.to_string()))?;
        Ok(())
    }

    async fn on(&self, kind: EventKind, handler: EventHandler) {
        self.handlers.set(kind, handler).await;
    }

    async fn off(&self, kind: EventKind) {
        self.handlers.remove(kind).await;
    }

    async fn id(&self) -> Option<Uuid> {
        *self.id.read().await
    }

    async fn disconnect(&mut self) -> Result<()> {
        // Dropping the sender lets the writer flush and send a close frame
        drop(self.tx.take());
        if let Some(task) = self.send_task.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, task).await.is_err() {
                warn!("Timed out closing connection to {}", self.url);
            }
        }
        if let Some(task) = self.receive_task.take() {
            task.abort();
        }

        self.handlers.clear().await;

        if let Some(id) = self.id.write().await.take() {
            info!("Disconnected {} from {}", id, self.url);
        }
        Ok(())
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        if let Some(task) = self.send_task.take() {
            task.abort();
        }
        if let Some(task) = self.receive_task.take() {
            task.abort();
        }
    }
}
