//! Room lifecycle: a waiting pool feeds rooms at quorum, each room owns
//! one `World` and one `MatchController`, membership is strictly isolated
//! — no event from one room's dispatch or tick ever reaches another
//! room's sessions.
//!
//! The whole registry sits behind a single `RwLock`: the simulation tick
//! and dispatch take the write side, the broadcast task takes the read
//! side, at room-sized granularity rather than one lock per session.

use std::collections::HashMap;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::match_controller::MatchController;
use crate::sim::player::PlayerId;
use crate::sim::weapon::WeaponKind;
use crate::sim::world::World;

pub type RoomId = u64;

pub struct Room {
    pub id: RoomId,
    pub members: Vec<PlayerId>,
    pub world: World,
    pub match_controller: MatchController,
    next_crate_id: u64,
}

impl Room {
    fn new(id: RoomId, config: &ServerConfig) -> Self {
        let mut room = Self {
            id,
            members: Vec::new(),
            world: World::new(),
            match_controller: MatchController::new(config.kill_target, config.match_duration),
            next_crate_id: 1,
        };
        room.seed_crates(config);
        room
    }

    fn seed_crates(&mut self, config: &ServerConfig) {
        let kinds = [WeaponKind::Shotgun, WeaponKind::Rifle];
        let spacing = config.arena_width / (kinds.len() as f64 + 1.0);
        for (i, kind) in kinds.into_iter().enumerate() {
            let id = self.next_crate_id;
            self.next_crate_id += 1;
            let position = crate::sim::player::Vec2::new(spacing * (i as f64 + 1.0), config.arena_height / 2.0);
            self.world.spawn_crate(id, position, kind);
        }
    }

    pub fn kill_counts(&self) -> HashMap<PlayerId, u32> {
        self.world.players.values().map(|p| (p.id, p.stats.kills)).collect()
    }
}

pub struct RoomRegistry {
    waiting: Vec<PlayerId>,
    rooms: HashMap<RoomId, Room>,
    player_room: HashMap<PlayerId, RoomId>,
    next_room_id: RoomId,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self { waiting: Vec::new(), rooms: HashMap::new(), player_room: HashMap::new(), next_room_id: 1 }
    }

    /// Adds a player to the waiting pool, creating and filling a room once
    /// `match_quorum` players are available. Returns the room id a player
    /// ended up in, if quorum was reached as a result of this join.
    pub fn join_waiting_pool(
        &mut self,
        player_id: PlayerId,
        config: &ServerConfig,
        now: Instant,
    ) -> Option<RoomId> {
        self.waiting.push(player_id);
        if self.waiting.len() < config.match_quorum {
            return None;
        }

        let room_id = self.next_room_id;
        self.next_room_id += 1;
        let mut room = Room::new(room_id, config);

        let taken: Vec<PlayerId> = self.waiting.drain(..config.match_quorum).collect();
        for id in &taken {
            room.world.spawn_player(*id, config, now);
            room.members.push(*id);
            self.player_room.insert(*id, room_id);
        }
        room.match_controller.start(now);

        self.rooms.insert(room_id, room);
        Some(room_id)
    }

    pub fn room_of(&self, player_id: PlayerId) -> Option<RoomId> {
        self.player_room.get(&player_id).copied()
    }

    pub fn room(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    pub fn room_mut(&mut self, room_id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&room_id)
    }

    pub fn rooms_mut(&mut self) -> impl Iterator<Item = &mut Room> {
        self.rooms.values_mut()
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Removes a player from whatever room or waiting pool holds them.
    /// Empties the room's membership and, if the room becomes empty,
    /// destroys it outright.
    pub fn remove_player(&mut self, player_id: PlayerId) -> Option<RoomId> {
        self.waiting.retain(|id| *id != player_id);

        let room_id = self.player_room.remove(&player_id)?;
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.members.retain(|id| *id != player_id);
            room.world.remove_player(player_id);
            if room.members.is_empty() {
                self.rooms.remove(&room_id);
            }
        }
        Some(room_id)
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_created_at_quorum() {
        let cfg = ServerConfig::test_defaults();
        let mut registry = RoomRegistry::new();
        let now = Instant::now();
        assert!(registry.join_waiting_pool(1, &cfg, now).is_none());
        let room_id = registry.join_waiting_pool(2, &cfg, now).expect("quorum reached");
        assert_eq!(registry.room_of(1), Some(room_id));
        assert_eq!(registry.room_of(2), Some(room_id));
        assert_eq!(registry.room(room_id).unwrap().members.len(), 2);
    }

    #[test]
    fn empty_room_is_destroyed() {
        let cfg = ServerConfig::test_defaults();
        let mut registry = RoomRegistry::new();
        let now = Instant::now();
        registry.join_waiting_pool(1, &cfg, now);
        let room_id = registry.join_waiting_pool(2, &cfg, now).unwrap();
        registry.remove_player(1);
        assert!(registry.room(room_id).is_some());
        registry.remove_player(2);
        assert!(registry.room(room_id).is_none());
    }

    #[test]
    fn rooms_are_isolated() {
        let cfg = ServerConfig::test_defaults();
        let mut registry = RoomRegistry::new();
        let now = Instant::now();
        registry.join_waiting_pool(1, &cfg, now);
        let room_a = registry.join_waiting_pool(2, &cfg, now).unwrap();
        registry.join_waiting_pool(3, &cfg, now);
        let room_b = registry.join_waiting_pool(4, &cfg, now).unwrap();
        assert_ne!(room_a, room_b);
        assert!(!registry.room(room_a).unwrap().members.contains(&3));
        assert!(!registry.room(room_b).unwrap().members.contains(&1));
    }
}
