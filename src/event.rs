//! Explicit output events instead of callbacks: both the world simulation
//! (tick-driven events: death, respawn, crate respawn, reload completion)
//! and event dispatch (action-driven events: shoot, melee, pickup) return
//! `Vec<OutboundEvent>`; the session/room layer is the only thing that
//! knows how to route a `Recipient` onto real connections.

use crate::message::OutboundMessage;
use crate::sim::player::PlayerId;

#[derive(Debug, Clone)]
pub enum Recipient {
    /// Broadcast to every player currently in the room.
    Room,
    /// Broadcast to the room except the named player.
    RoomExcept(PlayerId),
    /// A single player, regardless of room membership.
    ///
    /// `hit:confirmed` uses this unconditionally — always delivered to
    /// the attacker regardless of room membership.
    Single(PlayerId),
}

#[derive(Debug, Clone)]
pub struct OutboundEvent {
    pub recipient: Recipient,
    pub message: OutboundMessage,
}

impl OutboundEvent {
    pub fn room(message: OutboundMessage) -> Self {
        Self { recipient: Recipient::Room, message }
    }

    pub fn room_except(origin: PlayerId, message: OutboundMessage) -> Self {
        Self { recipient: Recipient::RoomExcept(origin), message }
    }

    pub fn single(target: PlayerId, message: OutboundMessage) -> Self {
        Self { recipient: Recipient::Single(target), message }
    }
}
