use std::sync::Arc;
use std::time::{Duration, Instant};
use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::HeartbeatConfig;
use crate::relay::{RelayServer, ServerEvent};
use crate::AppState;

/// WebSocket connection handler
/// This upgrades the HTTP connection to a WebSocket connection
pub async fn websocket_route(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> std::result::Result<HttpResponse, Error> {
    let peer_addr = req.peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    info!("New WebSocket connection request from: {}", peer_addr);

    ws::start(
        WebSocketSession::new(state.relay.clone(), peer_addr, &state.config.heartbeat),
        &req,
        stream,
    )
}

/// One websocket client bound to the relay.
pub struct WebSocketSession {
    relay: Arc<RelayServer>,
    peer_addr: String,
    id: Option<Uuid>,
    last_heartbeat: Instant,
    heartbeat_interval: Duration,
    client_timeout: Duration,
}

impl WebSocketSession {
    pub fn new(relay: Arc<RelayServer>, peer_addr: String, heartbeat: &HeartbeatConfig) -> Self {
        Self {
            relay,
            peer_addr,
            id: None,
            last_heartbeat: Instant::now(),
            heartbeat_interval: Duration::from_secs(heartbeat.interval_secs),
            client_timeout: Duration::from_secs(heartbeat.timeout_secs),
        }
    }

    /// Hands a text frame to the relay. `ctx.wait` keeps frames from one
    /// connection in arrival order.
    fn relay_text(&mut self, text: String, ctx: &mut <Self as Actor>::Context) {
        let Some(id) = self.id else {
            warn!("Frame from {} before registration, dropping", self.peer_addr);
            return;
        };

        let relay = self.relay.clone();
        ctx.wait(async move { relay.handle_text(id, &text).await }.into_actor(self));
    }

    fn start_heartbeat(&self, ctx: &mut <Self as Actor>::Context) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > act.client_timeout {
                warn!("Heartbeat timeout for {} (id: {:?}), disconnecting", act.peer_addr, act.id);
                ctx.stop();
                return;
            }

            ctx.ping(b"");
        });
    }
}

impl Actor for WebSocketSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, rx) = mpsc::unbounded_channel();
        ctx.add_stream(UnboundedReceiverStream::new(rx));

        let relay = self.relay.clone();
        ctx.wait(
            async move { relay.on_connect(tx).await }
                .into_actor(self)
                .map(|id, act, _ctx| {
                    act.id = Some(id);
                    info!("WebSocket connection established with {} (id: {})", act.peer_addr, id);
                }),
        );

        self.start_heartbeat(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(id) = self.id.take() {
            let relay = self.relay.clone();
            actix_rt::spawn(async move {
                relay.on_disconnect(id).await;
            });
        }
        info!("WebSocket connection closed with {}", self.peer_addr);
    }
}

/// Events relayed to this connection by the room registry
impl StreamHandler<ServerEvent> for WebSocketSession {
    fn handle(&mut self, event: ServerEvent, ctx: &mut Self::Context) {
        match serde_json::to_string(&event) {
            Ok(json_str) => ctx.text(json_str),
            Err(e) => error!("Failed to serialize server event: {}", e),
        }
    }
}

/// Frames received from the client
impl StreamHandler<std::result::Result<ws::Message, ws::ProtocolError>> for WebSocketSession {
    fn handle(&mut self, msg: std::result::Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        self.last_heartbeat = Instant::now();

        match msg {
            Ok(ws::Message::Ping(msg)) => {
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Text(text)) => {
                self.relay_text(text.to_string(), ctx);
            }
            Ok(ws::Message::Binary(bin)) => match String::from_utf8(bin.to_vec()) {
                Ok(text) => self.relay_text(text, ctx),
                Err(e) => warn!("Ignoring non UTF-8 binary frame from {}: {}", self.peer_addr, e),
            },
            Ok(ws::Message::Close(reason)) => {
                info!("WebSocket closed from {}: {:?}", self.peer_addr, reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                error!("Error handling WebSocket message from {}: {}", self.peer_addr, e);
                ctx.stop();
            }
        }
    }
}
