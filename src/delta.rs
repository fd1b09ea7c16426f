//! Per-client delta tracking: every broadcast tick decides, per room,
//! whether to send a full `state:snapshot` (first broadcast, or the
//! periodic keyframe) or a `state:delta` built by diffing against the
//! last view sent to that room. Fields that moved less than their
//! significance threshold are omitted; a delta with nothing in it is
//! suppressed outright rather than sent empty.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::config::ServerConfig;
use crate::message::{
    OutboundMessage, PlayerDeltaData, PlayerStateData, ProjectileStateData, StateDeltaData,
    StateSnapshotData, WeaponCrateStateData,
};
use crate::room::Room;
use crate::sim::player::{PlayerId, PlayerSnapshot};
use crate::sim::projectile::ProjectileId;

pub struct DeltaTracker {
    last_sent: HashMap<PlayerId, PlayerSnapshot>,
    last_projectile_ids: HashSet<ProjectileId>,
    last_full_snapshot_at: Option<Instant>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self { last_sent: HashMap::new(), last_projectile_ids: HashSet::new(), last_full_snapshot_at: None }
    }

    /// Returns `None` when there is nothing worth sending this tick
    /// (empty-delta suppression).
    pub fn build_message(&mut self, room: &Room, config: &ServerConfig, now: Instant) -> Option<OutboundMessage> {
        let last_processed_sequence: HashMap<PlayerId, u64> =
            room.world.players.values().map(|p| (p.id, p.input.sequence)).collect();
        let corrected_players: Vec<PlayerId> = room
            .world
            .players
            .values()
            .filter(|p| p.was_corrected_within(now, config.correction_window))
            .map(|p| p.id)
            .collect();

        let needs_keyframe = match self.last_full_snapshot_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= config.snapshot_interval,
        };

        if needs_keyframe {
            self.last_full_snapshot_at = Some(now);
            for player in room.world.players.values() {
                self.last_sent.insert(player.id, PlayerSnapshot::of(player, now));
            }
            self.last_projectile_ids = room.world.projectiles.keys().copied().collect();

            return Some(OutboundMessage::StateSnapshot(StateSnapshotData {
                players: room.world.players.values().map(|p| player_state_data(p, now)).collect(),
                projectiles: room.world.projectiles.values().map(projectile_state_data).collect(),
                weapon_crates: room.world.crates.values().map(crate_state_data).collect(),
                last_processed_sequence,
                corrected_players,
            }));
        }

        let mut players = Vec::new();
        for player in room.world.players.values() {
            let current = PlayerSnapshot::of(player, now);
            let previous = self.last_sent.get(&player.id).copied();
            if let Some(delta) = diff_player(previous, current, config) {
                players.push(delta);
            }
            self.last_sent.insert(player.id, current);
        }

        let current_ids: HashSet<ProjectileId> = room.world.projectiles.keys().copied().collect();
        let projectiles_added: Vec<ProjectileStateData> = room
            .world
            .projectiles
            .values()
            .filter(|p| !self.last_projectile_ids.contains(&p.id))
            .map(projectile_state_data)
            .collect();
        let projectiles_removed: Vec<ProjectileId> =
            self.last_projectile_ids.difference(&current_ids).copied().collect();
        self.last_projectile_ids = current_ids;

        if players.is_empty() && projectiles_added.is_empty() && projectiles_removed.is_empty() {
            return None;
        }

        Some(OutboundMessage::StateDelta(StateDeltaData {
            players,
            projectiles_added,
            projectiles_removed,
            last_processed_sequence,
            corrected_players,
        }))
    }

    /// Forgets a departed player so a later reconnect under the same id
    /// gets a clean keyframe comparison rather than a stale snapshot.
    pub fn forget(&mut self, player_id: PlayerId) {
        self.last_sent.remove(&player_id);
    }
}

impl Default for DeltaTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn diff_player(previous: Option<PlayerSnapshot>, current: PlayerSnapshot, config: &ServerConfig) -> Option<PlayerDeltaData> {
    let Some(previous) = previous else {
        return Some(PlayerDeltaData {
            id: current.id,
            position: Some(current.position.into()),
            velocity: Some(current.velocity.into()),
            aim_angle: Some(current.aim_angle),
            health: Some(current.health),
            kills: Some(current.kills),
            deaths: Some(current.deaths),
            xp: Some(current.xp),
            rolling: Some(current.rolling),
            invulnerable: Some(current.invulnerable),
            regenerating: Some(current.regenerating),
        });
    };

    let position = (current.position.distance(previous.position) > config.pos_eps).then_some(current.position.into());
    let velocity =
        (current.velocity.distance(previous.velocity) > config.vel_eps).then_some(current.velocity.into());
    let aim_angle = ((current.aim_angle - previous.aim_angle).abs() > config.aim_eps).then_some(current.aim_angle);
    let health = (current.health != previous.health).then_some(current.health);
    let kills = (current.kills != previous.kills).then_some(current.kills);
    let deaths = (current.deaths != previous.deaths).then_some(current.deaths);
    let xp = (current.xp != previous.xp).then_some(current.xp);
    let rolling = (current.rolling != previous.rolling).then_some(current.rolling);
    let invulnerable = (current.invulnerable != previous.invulnerable).then_some(current.invulnerable);
    let regenerating = (current.regenerating != previous.regenerating).then_some(current.regenerating);

    let nothing_changed = position.is_none()
        && velocity.is_none()
        && aim_angle.is_none()
        && health.is_none()
        && kills.is_none()
        && deaths.is_none()
        && xp.is_none()
        && rolling.is_none()
        && invulnerable.is_none()
        && regenerating.is_none();
    if nothing_changed {
        return None;
    }

    Some(PlayerDeltaData {
        id: current.id,
        position,
        velocity,
        aim_angle,
        health,
        kills,
        deaths,
        xp,
        rolling,
        invulnerable,
        regenerating,
    })
}

fn player_state_data(player: &crate::sim::player::Player, now: Instant) -> PlayerStateData {
    PlayerStateData {
        id: player.id,
        position: player.position.into(),
        velocity: player.velocity.into(),
        aim_angle: player.aim_angle,
        health: player.health,
        alive: player.alive,
        kills: player.stats.kills,
        deaths: player.stats.deaths,
        xp: player.stats.xp,
        rolling: player.roll.rolling,
        invulnerable: player.is_invulnerable(now),
        regenerating: player.regenerating,
    }
}

fn projectile_state_data(projectile: &crate::sim::projectile::Projectile) -> ProjectileStateData {
    ProjectileStateData {
        id: projectile.id,
        owner_id: projectile.owner_id,
        kind: projectile.kind,
        position: projectile.position.into(),
        velocity: projectile.velocity.into(),
    }
}

fn crate_state_data(weapon_crate: &crate::sim::weapon::WeaponCrate) -> WeaponCrateStateData {
    WeaponCrateStateData {
        id: weapon_crate.id,
        position: weapon_crate.position.into(),
        kind: weapon_crate.kind,
        available: weapon_crate.available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::RoomRegistry;

    fn room_with_two_players() -> (RoomRegistry, crate::room::RoomId, ServerConfig, Instant) {
        let cfg = ServerConfig::test_defaults();
        let mut registry = RoomRegistry::new();
        let now = Instant::now();
        registry.join_waiting_pool(1, &cfg, now);
        let room_id = registry.join_waiting_pool(2, &cfg, now).unwrap();
        (registry, room_id, cfg, now)
    }

    #[test]
    fn first_broadcast_is_a_full_snapshot() {
        let (registry, room_id, cfg, now) = room_with_two_players();
        let mut tracker = DeltaTracker::new();
        let message = tracker.build_message(registry.room(room_id).unwrap(), &cfg, now).unwrap();
        assert!(matches!(message, OutboundMessage::StateSnapshot(_)));
    }

    #[test]
    fn unchanged_state_suppresses_the_next_delta() {
        let (registry, room_id, cfg, now) = room_with_two_players();
        let mut tracker = DeltaTracker::new();
        tracker.build_message(registry.room(room_id).unwrap(), &cfg, now).unwrap();

        let later = now + std::time::Duration::from_millis(16);
        let message = tracker.build_message(registry.room(room_id).unwrap(), &cfg, later);
        assert!(message.is_none());
    }

    #[test]
    fn moved_player_produces_a_delta() {
        let (mut registry, room_id, cfg, now) = room_with_two_players();
        let mut tracker = DeltaTracker::new();
        tracker.build_message(registry.room(room_id).unwrap(), &cfg, now).unwrap();

        let later = now + std::time::Duration::from_millis(16);
        registry.room_mut(room_id).unwrap().world.players.get_mut(&1).unwrap().position.x += 10.0;
        let message = tracker.build_message(registry.room(room_id).unwrap(), &cfg, later).unwrap();
        match message {
            OutboundMessage::StateDelta(delta) => {
                assert_eq!(delta.players.len(), 1);
                assert_eq!(delta.players[0].id, 1);
            }
            _ => panic!("expected a delta"),
        }
    }
}
