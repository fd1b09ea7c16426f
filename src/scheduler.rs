//! Tick scheduling: the simulation runs on its own OS thread driven by
//! `std::sync::mpsc::Receiver::recv_timeout` rather than a
//! `tokio::time::interval`, so a busy tokio runtime can never dilate the
//! fixed-cadence tick the way an async sleep could. Broadcast and the
//! match timer have no such sensitivity and use `tokio::time::interval`
//! the ordinary way.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::config::ServerConfig;
use crate::delta::DeltaTracker;
use crate::event::{OutboundEvent, Recipient};
use crate::match_controller::EndReason;
use crate::message::{wall_clock_millis, MatchEndedData, MatchTimerData, OutboundMessage, PlayerLeftData};
use crate::room::{Room, RoomId, RoomRegistry};
use crate::session::SessionManager;

pub struct Scheduler {
    shutdown: mpsc::Sender<()>,
    sim_thread: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawns the simulation thread and returns a handle that stops it on
    /// drop. The broadcast and match-timer loops are spawned separately as
    /// tokio tasks by the caller (`server.rs`) since they need the runtime.
    pub fn start_simulation(
        registry: Arc<RwLock<RoomRegistry>>,
        session_manager: Arc<SessionManager>,
        config: Arc<ServerConfig>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let tick = config.simulation_tick;

        let sim_thread = thread::spawn(move || {
            loop {
                match shutdown_rx.recv_timeout(tick) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                let now = Instant::now();
                let dt = tick.as_secs_f64();
                let mut guard = registry.write().expect("room registry lock poisoned");
                for room in guard.rooms_mut() {
                    if !room.match_controller.is_running() {
                        continue;
                    }
                    let events = room.world.tick(dt, now, &config);
                    route_events(&session_manager, &room.members, events, now);

                    // A kill can reach the target the same tick it lands; waiting for
                    // the 1s match-timer poll would let the match accept extra input
                    // past the intended end point, so check right after ticking too.
                    check_and_announce_match_end(&session_manager, room, now);
                }
            }
        });

        Self { shutdown: shutdown_tx, sim_thread: Some(sim_thread) }
    }

    pub fn shutdown(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.sim_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Routes each event to its recipient set. `OutboundMessage::encode` needs
/// a wall-clock timestamp; `Instant` has no epoch and the timestamp is only
/// informational to clients, so wall-clock millis is used directly rather
/// than deriving one from `now` relative to process start.
pub(crate) fn route_events(session_manager: &SessionManager, members: &[u64], events: Vec<OutboundEvent>, _now: Instant) {
    let timestamp = wall_clock_millis();
    for event in events {
        let bytes = event.message.encode(timestamp);
        match event.recipient {
            Recipient::Room => session_manager.send_all(members.iter(), &bytes),
            Recipient::RoomExcept(origin) => {
                session_manager.send_all(members.iter().filter(|id| **id != origin), &bytes)
            }
            Recipient::Single(target) => session_manager.send(target, bytes),
        }
    }
}

/// One iteration of the broadcast loop: builds and routes a snapshot/delta
/// message per running room. Called from a `tokio::time::interval` task in
/// `server.rs`. `trackers` is shared with the transport layer so a
/// disconnecting client's delta view can be forgotten from the same map
/// the broadcast loop reads.
pub fn run_broadcast_tick(
    registry: &Arc<RwLock<RoomRegistry>>,
    session_manager: &SessionManager,
    config: &ServerConfig,
    trackers: &Mutex<HashMap<RoomId, DeltaTracker>>,
) {
    let now = Instant::now();
    let guard = registry.read().expect("room registry lock poisoned");
    let mut trackers = trackers.lock().expect("delta tracker map lock poisoned");
    for room in guard.rooms() {
        if !room.match_controller.is_running() {
            continue;
        }
        let tracker = trackers.entry(room.id).or_default();
        if let Some(message) = tracker.build_message(room, config, now) {
            let bytes = message.encode(wall_clock_millis());
            session_manager.send_all(room.members.iter(), &bytes);
        }
    }
    trackers.retain(|id, _| guard.room(*id).is_some());
}

/// One iteration of the match-timer loop: advances and, on end, announces
/// every running room's match timer / end condition.
pub fn run_match_timer_tick(registry: &Arc<RwLock<RoomRegistry>>, session_manager: &SessionManager) {
    let now = Instant::now();
    let mut guard = registry.write().expect("room registry lock poisoned");
    for room in guard.rooms_mut() {
        if !room.match_controller.is_running() {
            continue;
        }

        // Kill-target endings are usually already caught by the simulation
        // thread right after the kill lands; this still covers time-limit
        // endings, which are inherently tied to this cadence.
        if check_and_announce_match_end(session_manager, room, now) {
            continue;
        }

        let message = OutboundMessage::MatchTimer(MatchTimerData {
            remaining_seconds: room.match_controller.remaining_seconds(now),
        });
        let bytes = message.encode(wall_clock_millis());
        session_manager.send_all(room.members.iter(), &bytes);
    }
}

/// Checks whether `room`'s match should end now and, if so, transitions the
/// controller and announces `match:ended` to its members. Returns whether
/// the match ended on this call. Idempotent: once a room has ended, the
/// controller's state gate makes every later call a no-op.
fn check_and_announce_match_end(session_manager: &SessionManager, room: &mut Room, now: Instant) -> bool {
    let kills = room.kill_counts();
    let Some(reason) = room.match_controller.check_end_conditions(now, &kills) else {
        return false;
    };
    let message = OutboundMessage::MatchEnded(match_ended_data(reason, &kills));
    let bytes = message.encode(wall_clock_millis());
    session_manager.send_all(room.members.iter(), &bytes);
    true
}

fn match_ended_data(reason: EndReason, kills: &HashMap<u64, u32>) -> MatchEndedData {
    let top = kills.values().copied().max().unwrap_or(0);
    let winners = kills.iter().filter(|(_, &k)| k == top).map(|(id, _)| *id).collect();
    MatchEndedData { reason: reason.as_str(), winners, final_scores: kills.clone() }
}

/// Announces a player's departure to the room they were in, used by the
/// transport layer on disconnect.
pub fn broadcast_player_left(session_manager: &SessionManager, members: &[u64], player_id: u64) {
    let message = OutboundMessage::PlayerLeft(PlayerLeftData { player_id });
    let bytes = message.encode(wall_clock_millis());
    session_manager.send_all(members.iter(), &bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_ended_data_picks_highest_scorer_as_winner() {
        let mut kills = HashMap::new();
        kills.insert(1u64, 20);
        kills.insert(2u64, 14);
        let data = match_ended_data(EndReason::KillTarget, &kills);
        assert_eq!(data.winners, vec![1]);
        assert_eq!(data.reason, "kill_target");
    }
}
