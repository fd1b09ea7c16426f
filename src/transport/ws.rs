//! WebSocket transport: one `TcpListener::accept` loop, one spawned task
//! per connection, `SplitSink`/`SplitStream` halves each driven by their
//! own loop — the writer draining the session's mpsc receiver, the
//! reader decoding and dispatching one frame at a time until the socket
//! closes or errors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use crate::config::ServerConfig;
use crate::delta::DeltaTracker;
use crate::dispatch::dispatch_inbound;
use crate::error::{DispatchError, ServerError};
use crate::message::{self, wall_clock_millis, InboundMessage, OutboundMessage, RoomJoinedData, WeaponCrateEventData};
use crate::room::{RoomId, RoomRegistry};
use crate::schema::SchemaRegistry;
use crate::scheduler::broadcast_player_left;
use crate::session::SessionManager;
use crate::sim::player::PlayerId;

pub async fn run(
    addr: &str,
    registry: Arc<RwLock<RoomRegistry>>,
    sessions: Arc<SessionManager>,
    schemas: Arc<SchemaRegistry>,
    config: Arc<ServerConfig>,
    trackers: Arc<Mutex<HashMap<RoomId, DeltaTracker>>>,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr).await.map_err(|e| ServerError::BindFailure(e.to_string()))?;
    let next_player_id = Arc::new(AtomicU64::new(1));

    log::trace!("websocket transport listening on {addr}");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("accept failed: {e}");
                continue;
            }
        };

        let registry = Arc::clone(&registry);
        let sessions = Arc::clone(&sessions);
        let schemas = Arc::clone(&schemas);
        let config = Arc::clone(&config);
        let trackers = Arc::clone(&trackers);
        let player_id = next_player_id.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(s) => s,
                Err(e) => {
                    log::warn!("websocket handshake failed for {peer}: {e}");
                    return;
                }
            };
            let (mut sink, mut stream) = ws_stream.split();

            let mut receiver = sessions.register(player_id);
            let now = Instant::now();
            let room_id = registry.write().expect("room registry lock poisoned").join_waiting_pool(
                player_id,
                &config,
                now,
            );

            let writer = tokio::spawn(async move {
                while let Some(bytes) = receiver.recv().await {
                    if sink.send(Message::Binary(bytes.into())).await.is_err() {
                        break;
                    }
                }
            });

            if let Some(room_id) = room_id {
                let (members, crates) = {
                    let guard = registry.read().expect("room registry lock poisoned");
                    match guard.room(room_id) {
                        Some(room) => (
                            room.members.clone(),
                            room.world
                                .crates
                                .values()
                                .map(|c| WeaponCrateEventData { id: c.id, position: c.position.into(), kind: c.kind })
                                .collect::<Vec<_>>(),
                        ),
                        None => (Vec::new(), Vec::new()),
                    }
                };
                for member in &members {
                    let bytes = OutboundMessage::RoomJoined(RoomJoinedData { player_id: *member, room_id })
                        .encode(wall_clock_millis());
                    sessions.send(*member, bytes);
                }
                // Every joiner needs to learn the room's already-seeded
                // crates, not just the ones spawned after they connected.
                if !crates.is_empty() {
                    let bytes = OutboundMessage::WeaponSpawned(crates).encode(wall_clock_millis());
                    sessions.send(player_id, bytes);
                }
            }

            while let Some(frame) = stream.next().await {
                let raw = match frame {
                    Ok(Message::Binary(bytes)) => bytes.to_vec(),
                    Ok(Message::Text(text)) => text.as_bytes().to_vec(),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        log::trace!("connection for player {player_id} errored: {e}");
                        break;
                    }
                };

                handle_frame(&raw, player_id, &registry, &sessions, &schemas, &config);
            }

            writer.abort();
            sessions.remove(player_id);
            let mut guard = registry.write().expect("room registry lock poisoned");
            if let Some(room_id) = guard.remove_player(player_id) {
                if let Some(tracker) = trackers.lock().expect("delta tracker map lock poisoned").get_mut(&room_id) {
                    tracker.forget(player_id);
                }
                if let Some(room) = guard.room_mut(room_id) {
                    room.match_controller.end(crate::match_controller::EndReason::Disconnect);
                    broadcast_player_left(&sessions, &room.members, player_id);
                }
            }
        });
    }
}

fn handle_frame(
    raw: &[u8],
    player_id: PlayerId,
    registry: &Arc<RwLock<RoomRegistry>>,
    sessions: &SessionManager,
    schemas: &SchemaRegistry,
    config: &ServerConfig,
) {
    let envelope = match message::parse_envelope(raw) {
        Ok(e) => e,
        Err(_) => {
            log::trace!("player {player_id} sent an unparsable frame, dropping");
            return;
        }
    };

    let schema_name = format!("{}-data", envelope.type_);
    if let Err(e) = schemas.validate(&schema_name, &envelope.data) {
        log::trace!("player {player_id} message failed schema validation: {e}");
        return;
    }

    let decoded = match InboundMessage::decode(&envelope.type_, envelope.data) {
        Ok(m) => m,
        Err(DispatchError::UnknownMessageType(t)) => {
            log::trace!("player {player_id} sent unknown message type `{t}`");
            return;
        }
        Err(_) => return,
    };

    let now = Instant::now();
    let mut guard = registry.write().expect("room registry lock poisoned");
    let Some(room_id) = guard.room_of(player_id) else { return };
    let events = dispatch_inbound(&mut guard, player_id, decoded, envelope.timestamp, config, now);
    let Some(room) = guard.room(room_id) else { return };
    crate::scheduler::route_events(sessions, &room.members, events, now);
}
