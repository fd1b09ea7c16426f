//! Client session table: a `RwLock<HashMap<PlayerId, Sender>>` that every
//! outbound path reads to route bytes, with a single writer side touched
//! only on connect/disconnect. The channel is bounded with `try_send`
//! rather than unbounded, giving enqueue-or-drop backpressure rather than
//! unbounded buffering of a slow client.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::sim::player::PlayerId;

pub struct SessionManager {
    sessions: RwLock<HashMap<PlayerId, Sender<Vec<u8>>>>,
    queue_capacity: usize,
}

impl SessionManager {
    pub fn new(queue_capacity: usize) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), queue_capacity }
    }

    pub fn register(&self, player_id: PlayerId) -> Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.sessions.write().expect("session table lock poisoned").insert(player_id, tx);
        rx
    }

    pub fn remove(&self, player_id: PlayerId) {
        self.sessions.write().expect("session table lock poisoned").remove(&player_id);
    }

    /// Enqueues or drops: a full queue means the client is too slow, not
    /// that the server should block or grow the queue without bound.
    pub fn send(&self, player_id: PlayerId, bytes: Vec<u8>) {
        let sessions = self.sessions.read().expect("session table lock poisoned");
        if let Some(sender) = sessions.get(&player_id)
            && let Err(e) = sender.try_send(bytes)
        {
            log::warn!("dropping outbound message for player {player_id}: {e}");
        }
    }

    pub fn send_all<'a>(&self, player_ids: impl Iterator<Item = &'a PlayerId>, bytes: &[u8]) {
        let sessions = self.sessions.read().expect("session table lock poisoned");
        for player_id in player_ids {
            if let Some(sender) = sessions.get(player_id)
                && let Err(e) = sender.try_send(bytes.to_vec())
            {
                log::warn!("dropping outbound message for player {player_id}: {e}");
            }
        }
    }

    pub fn is_connected(&self, player_id: PlayerId) -> bool {
        self.sessions.read().expect("session table lock poisoned").contains_key(&player_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let manager = SessionManager::new(1);
        let mut rx = manager.register(1);
        manager.send(1, b"first".to_vec());
        manager.send(1, b"second".to_vec());

        assert_eq!(rx.try_recv().unwrap(), b"first");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_to_unregistered_player_is_a_no_op() {
        let manager = SessionManager::new(8);
        manager.send(42, b"hello".to_vec());
    }
}
