//! Event dispatch: gates every decoded inbound message on match state,
//! then routes it to the owning room's `World`. Schema validation already
//! happened at the session boundary by the time a message reaches here —
//! this layer only enforces the per-message-type preconditions (player
//! alive, weapon ready, and so on) that `World`'s action methods
//! themselves return as `DispatchError`.

use std::time::Instant;

use crate::config::ServerConfig;
use crate::error::DispatchError;
use crate::event::OutboundEvent;
use crate::message::{wall_clock_millis, InboundMessage, OutboundMessage, ShootFailedData};
use crate::room::RoomRegistry;
use crate::sim::player::PlayerId;

/// Dispatches one already-decoded inbound message for `player_id`.
/// `client_timestamp_millis` is the envelope's own `timestamp` field
/// (wall-clock millis at the moment the client sent it), used to sample
/// RTT on `input:state` messages. Returns whatever `OutboundEvent`s the
/// action produced; an empty vec means the message was gated out or
/// failed silently (logged, never closes the session).
pub fn dispatch_inbound(
    registry: &mut RoomRegistry,
    player_id: PlayerId,
    message: InboundMessage,
    client_timestamp_millis: i64,
    config: &ServerConfig,
    now: Instant,
) -> Vec<OutboundEvent> {
    let Some(room_id) = registry.room_of(player_id) else {
        log::trace!("dispatch: player {player_id} has no room, dropping message");
        return Vec::new();
    };
    let Some(room) = registry.room_mut(room_id) else {
        return Vec::new();
    };

    if !room.match_controller.is_running() {
        let err = DispatchError::MatchEnded;
        log::trace!("dispatch: action from {player_id} rejected: {err}");
        return Vec::new();
    }

    let result = match message {
        InboundMessage::InputState(data) => {
            if let Some(player) = room.world.players.get_mut(&player_id) {
                player.input.up = data.up;
                player.input.down = data.down;
                player.input.left = data.left;
                player.input.right = data.right;
                player.input.aim_angle = data.aim_angle;
                player.input.is_sprinting = data.is_sprinting;
                player.input.sequence = data.sequence;

                let rtt_millis = (wall_clock_millis() - client_timestamp_millis).max(0) as f64;
                player.ping.sample(rtt_millis);
            }
            Ok(Vec::new())
        }
        InboundMessage::Shoot(data) => room.world.shoot(player_id, data.aim_angle, now, config),
        InboundMessage::Reload(_) => room.world.reload(player_id, now, config),
        InboundMessage::MeleeAttack(data) => room.world.melee_attack(player_id, data.aim_angle, config, now),
        InboundMessage::Roll(_) => room.world.roll(player_id, ROLL_COOLDOWN, ROLL_INVULNERABILITY, now),
        InboundMessage::PickupAttempt(data) => room.world.pickup_attempt(player_id, data.crate_id, config, now),
    };

    match result {
        Ok(events) => events,
        Err(DispatchError::OutOfAmmo) => vec![shoot_failed(player_id, "out_of_ammo")],
        Err(DispatchError::StillReloading) => vec![shoot_failed(player_id, "still_reloading")],
        Err(DispatchError::WeaponOnCooldown) => vec![shoot_failed(player_id, "weapon_on_cooldown")],
        Err(other) => {
            log::trace!("dispatch: action from {player_id} rejected: {other}");
            Vec::new()
        }
    }
}

fn shoot_failed(player_id: PlayerId, reason: &'static str) -> OutboundEvent {
    OutboundEvent::single(player_id, OutboundMessage::ShootFailed(ShootFailedData { reason }))
}

// Roll cooldown/invulnerability are movement-kit constants, not weapon
// balance, so they live here rather than in `WeaponProfile`.
const ROLL_COOLDOWN: std::time::Duration = std::time::Duration::from_millis(800);
const ROLL_INVULNERABILITY: std::time::Duration = std::time::Duration::from_millis(350);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{InputStateData, PickupAttemptData, ShootData};

    fn setup() -> (RoomRegistry, ServerConfig, Instant) {
        let cfg = ServerConfig::test_defaults();
        let mut registry = RoomRegistry::new();
        let now = Instant::now();
        registry.join_waiting_pool(1, &cfg, now);
        registry.join_waiting_pool(2, &cfg, now);
        (registry, cfg, now)
    }

    #[test]
    fn input_state_samples_ping_from_the_envelope_timestamp() {
        let (mut registry, cfg, now) = setup();
        let client_sent_at = wall_clock_millis() - 40;
        dispatch_inbound(
            &mut registry,
            1,
            InboundMessage::InputState(InputStateData {
                up: false,
                down: false,
                left: false,
                right: false,
                aim_angle: 0.0,
                is_sprinting: false,
                sequence: 1,
            }),
            client_sent_at,
            &cfg,
            now,
        );
        let room_id = registry.room_of(1).unwrap();
        let ping = registry.room(room_id).unwrap().world.players[&1].ping;
        assert!(ping.smoothed_rtt_millis >= 40.0);
    }

    #[test]
    fn shoot_emits_projectile_spawn_and_weapon_state() {
        let (mut registry, cfg, now) = setup();
        let events = dispatch_inbound(
            &mut registry,
            1,
            InboundMessage::Shoot(ShootData { aim_angle: 0.0 }),
            0,
            &cfg,
            now,
        );
        assert!(events.iter().any(|e| matches!(e.message, OutboundMessage::ProjectileSpawn(_))));
        assert!(events.iter().any(|e| matches!(e.message, OutboundMessage::WeaponState(_))));
    }

    #[test]
    fn messages_from_players_without_a_room_are_dropped() {
        let (mut registry, cfg, now) = setup();
        let events = dispatch_inbound(
            &mut registry,
            999,
            InboundMessage::Shoot(ShootData { aim_angle: 0.0 }),
            0,
            &cfg,
            now,
        );
        assert!(events.is_empty());
    }

    #[test]
    fn pickup_out_of_range_is_dropped_silently() {
        let (mut registry, cfg, now) = setup();
        let events = dispatch_inbound(
            &mut registry,
            1,
            InboundMessage::PickupAttempt(PickupAttemptData { crate_id: 1 }),
            0,
            &cfg,
            now,
        );
        assert!(events.is_empty());
    }
}
