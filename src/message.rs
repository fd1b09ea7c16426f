//! Typed discriminated message records: ad-hoc map payloads are replaced
//! with concrete structs per message type, validated once against the
//! schema registry at the boundary and never touched as a bare
//! `serde_json::Value` again. The wire envelope stays generic: `{type,
//! timestamp, data}`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;
use crate::sim::player::PlayerId;
use crate::sim::weapon::WeaponKind;

/// Canonical name for every inbound message type, used both for schema
/// lookup (`<type>-data`) and for the `type` field on the wire.
pub mod types {
    pub const INPUT_STATE: &str = "input:state";
    pub const PLAYER_SHOOT: &str = "player:shoot";
    pub const PLAYER_RELOAD: &str = "player:reload";
    pub const PLAYER_MELEE_ATTACK: &str = "player:melee_attack";
    pub const PLAYER_ROLL: &str = "player:roll";
    pub const WEAPON_PICKUP_ATTEMPT: &str = "weapon:pickup_attempt";

    pub const STATE_SNAPSHOT: &str = "state:snapshot";
    pub const STATE_DELTA: &str = "state:delta";
    pub const PROJECTILE_SPAWN: &str = "projectile:spawn";
    pub const PROJECTILE_DESTROY: &str = "projectile:destroy";
    pub const PLAYER_DAMAGED: &str = "player:damaged";
    pub const HIT_CONFIRMED: &str = "hit:confirmed";
    pub const PLAYER_DEATH: &str = "player:death";
    pub const PLAYER_KILL_CREDIT: &str = "player:kill_credit";
    pub const PLAYER_RESPAWN: &str = "player:respawn";
    pub const WEAPON_STATE: &str = "weapon:state";
    pub const WEAPON_SPAWNED: &str = "weapon:spawned";
    pub const WEAPON_RESPAWNED: &str = "weapon:respawned";
    pub const ROLL_START: &str = "roll:start";
    pub const ROLL_END: &str = "roll:end";
    pub const MELEE_HIT: &str = "melee:hit";
    pub const MATCH_TIMER: &str = "match:timer";
    pub const MATCH_ENDED: &str = "match:ended";
    pub const ROOM_JOINED: &str = "room:joined";
    pub const PLAYER_LEFT: &str = "player:left";
    pub const SHOOT_FAILED: &str = "shoot:failed";
}

/// The raw envelope shared by both directions: `{type, timestamp, data}`.
/// Parsed once at the transport boundary; `data` stays a `Value` until
/// the schema registry has had a chance to look at it.
pub struct RawEnvelope {
    pub type_: String,
    pub timestamp: i64,
    pub data: Value,
}

pub fn parse_envelope(raw: &[u8]) -> Result<RawEnvelope, DispatchError> {
    let value: Value = serde_json::from_slice(raw).map_err(|_| DispatchError::ParseFailure)?;
    let type_ = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DispatchError::ParseFailure)?
        .to_string();
    let timestamp = value.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
    let data = value.get("data").cloned().unwrap_or(Value::Null);
    Ok(RawEnvelope { type_, timestamp, data })
}

/// Wall-clock milliseconds for the envelope's `timestamp` field. `Instant`
/// has no epoch, so anything that needs to stamp an outbound message goes
/// through this rather than `Instant::now()`.
pub fn wall_clock_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn envelope(type_: &str, timestamp: i64, data: Value) -> Vec<u8> {
    serde_json::json!({
        "type": type_,
        "timestamp": timestamp,
        "data": data,
    })
    .to_string()
    .into_bytes()
}

// ---------------------------------------------------------------- inbound

#[derive(Debug, Clone, Deserialize)]
pub struct InputStateData {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    #[serde(rename = "aimAngle")]
    pub aim_angle: f64,
    #[serde(rename = "isSprinting")]
    pub is_sprinting: bool,
    pub sequence: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShootData {
    #[serde(rename = "aimAngle")]
    pub aim_angle: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReloadData {}

#[derive(Debug, Clone, Deserialize)]
pub struct MeleeAttackData {
    #[serde(rename = "aimAngle")]
    pub aim_angle: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RollData {}

#[derive(Debug, Clone, Deserialize)]
pub struct PickupAttemptData {
    #[serde(rename = "crateId")]
    pub crate_id: u64,
}

#[derive(Debug, Clone)]
pub enum InboundMessage {
    InputState(InputStateData),
    Shoot(ShootData),
    Reload(ReloadData),
    MeleeAttack(MeleeAttackData),
    Roll(RollData),
    PickupAttempt(PickupAttemptData),
}

impl InboundMessage {
    /// Maps a wire `type` string plus the already schema-validated `data`
    /// value into a concrete struct. Unknown types are rejected here too
    /// (defense in depth — dispatch also rejects via the schema registry).
    pub fn decode(type_: &str, data: Value) -> Result<Self, DispatchError> {
        let decode_err = |_| DispatchError::ParseFailure;
        match type_ {
            types::INPUT_STATE => Ok(InboundMessage::InputState(
                serde_json::from_value(data).map_err(decode_err)?,
            )),
            types::PLAYER_SHOOT => Ok(InboundMessage::Shoot(
                serde_json::from_value(data).map_err(decode_err)?,
            )),
            types::PLAYER_RELOAD => Ok(InboundMessage::Reload(
                serde_json::from_value(data).map_err(decode_err)?,
            )),
            types::PLAYER_MELEE_ATTACK => Ok(InboundMessage::MeleeAttack(
                serde_json::from_value(data).map_err(decode_err)?,
            )),
            types::PLAYER_ROLL => Ok(InboundMessage::Roll(
                serde_json::from_value(data).map_err(decode_err)?,
            )),
            types::WEAPON_PICKUP_ATTEMPT => Ok(InboundMessage::PickupAttempt(
                serde_json::from_value(data).map_err(decode_err)?,
            )),
            other => Err(DispatchError::UnknownMessageType(other.to_string())),
        }
    }
}

// --------------------------------------------------------------- outbound

#[derive(Debug, Clone, Serialize)]
pub struct PlayerStateData {
    pub id: PlayerId,
    pub position: (f64, f64),
    pub velocity: (f64, f64),
    #[serde(rename = "aimAngle")]
    pub aim_angle: f64,
    pub health: i32,
    pub alive: bool,
    pub kills: u32,
    pub deaths: u32,
    pub xp: u32,
    pub rolling: bool,
    pub invulnerable: bool,
    pub regenerating: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectileStateData {
    pub id: u64,
    #[serde(rename = "ownerId")]
    pub owner_id: PlayerId,
    pub kind: WeaponKind,
    pub position: (f64, f64),
    pub velocity: (f64, f64),
}

#[derive(Debug, Clone, Serialize)]
pub struct WeaponCrateStateData {
    pub id: u64,
    pub position: (f64, f64),
    pub kind: WeaponKind,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshotData {
    pub players: Vec<PlayerStateData>,
    pub projectiles: Vec<ProjectileStateData>,
    #[serde(rename = "weaponCrates")]
    pub weapon_crates: Vec<WeaponCrateStateData>,
    #[serde(rename = "lastProcessedSequence")]
    pub last_processed_sequence: HashMap<PlayerId, u64>,
    #[serde(rename = "correctedPlayers", skip_serializing_if = "Vec::is_empty")]
    pub corrected_players: Vec<PlayerId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerDeltaData {
    pub id: PlayerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<(f64, f64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<(f64, f64)>,
    #[serde(rename = "aimAngle", skip_serializing_if = "Option::is_none")]
    pub aim_angle: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kills: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deaths: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xp: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolling: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invulnerable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regenerating: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StateDeltaData {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub players: Vec<PlayerDeltaData>,
    #[serde(rename = "projectilesAdded", skip_serializing_if = "Vec::is_empty")]
    pub projectiles_added: Vec<ProjectileStateData>,
    #[serde(rename = "projectilesRemoved", skip_serializing_if = "Vec::is_empty")]
    pub projectiles_removed: Vec<u64>,
    #[serde(rename = "lastProcessedSequence")]
    pub last_processed_sequence: HashMap<PlayerId, u64>,
    #[serde(rename = "correctedPlayers", skip_serializing_if = "Vec::is_empty")]
    pub corrected_players: Vec<PlayerId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectileSpawnData {
    pub id: u64,
    #[serde(rename = "ownerId")]
    pub owner_id: PlayerId,
    pub kind: WeaponKind,
    pub position: (f64, f64),
    pub velocity: (f64, f64),
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectileDestroyData {
    pub id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerDamagedData {
    #[serde(rename = "victimId")]
    pub victim_id: PlayerId,
    #[serde(rename = "attackerId")]
    pub attacker_id: PlayerId,
    pub damage: i32,
    #[serde(rename = "newHealth")]
    pub new_health: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct HitConfirmedData {
    #[serde(rename = "victimId")]
    pub victim_id: PlayerId,
    pub damage: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerDeathData {
    #[serde(rename = "victimId")]
    pub victim_id: PlayerId,
    #[serde(rename = "attackerId")]
    pub attacker_id: PlayerId,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerKillCreditData {
    #[serde(rename = "killerId")]
    pub killer_id: PlayerId,
    #[serde(rename = "victimId")]
    pub victim_id: PlayerId,
    #[serde(rename = "killerKills")]
    pub killer_kills: u32,
    #[serde(rename = "killerXP")]
    pub killer_xp: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerRespawnData {
    pub id: PlayerId,
    pub position: (f64, f64),
}

#[derive(Debug, Clone, Serialize)]
pub struct WeaponStateData {
    pub kind: WeaponKind,
    #[serde(rename = "currentAmmo")]
    pub current_ammo: u32,
    #[serde(rename = "magazineSize")]
    pub magazine_size: u32,
    pub reloading: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeaponCrateEventData {
    pub id: u64,
    pub position: (f64, f64),
    pub kind: WeaponKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeaponPickupConfirmedData {
    #[serde(rename = "playerId")]
    pub player_id: PlayerId,
    #[serde(rename = "crateId")]
    pub crate_id: u64,
    pub kind: WeaponKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct RollStartData {
    pub id: PlayerId,
    pub direction: (f64, f64),
}

#[derive(Debug, Clone, Serialize)]
pub struct RollEndData {
    pub id: PlayerId,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeleeHitData {
    #[serde(rename = "attackerId")]
    pub attacker_id: PlayerId,
    #[serde(rename = "victimIds")]
    pub victim_ids: Vec<PlayerId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchTimerData {
    #[serde(rename = "remainingSeconds")]
    pub remaining_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchEndedData {
    pub reason: &'static str,
    pub winners: Vec<PlayerId>,
    #[serde(rename = "finalScores")]
    pub final_scores: HashMap<PlayerId, u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomJoinedData {
    #[serde(rename = "playerId")]
    pub player_id: PlayerId,
    #[serde(rename = "roomId")]
    pub room_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerLeftData {
    #[serde(rename = "playerId")]
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShootFailedData {
    pub reason: &'static str,
}

/// Every outbound event is one of these. `type_name`/`into_envelope` are
/// the only place that needs to know the wire string for a given variant.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    StateSnapshot(StateSnapshotData),
    StateDelta(StateDeltaData),
    ProjectileSpawn(ProjectileSpawnData),
    ProjectileDestroy(ProjectileDestroyData),
    PlayerDamaged(PlayerDamagedData),
    HitConfirmed(HitConfirmedData),
    PlayerDeath(PlayerDeathData),
    PlayerKillCredit(PlayerKillCreditData),
    PlayerRespawn(PlayerRespawnData),
    WeaponState(WeaponStateData),
    WeaponSpawned(Vec<WeaponCrateEventData>),
    WeaponRespawned(WeaponCrateEventData),
    WeaponPickupConfirmed(WeaponPickupConfirmedData),
    RollStart(RollStartData),
    RollEnd(RollEndData),
    MeleeHit(MeleeHitData),
    MatchTimer(MatchTimerData),
    MatchEnded(MatchEndedData),
    RoomJoined(RoomJoinedData),
    PlayerLeft(PlayerLeftData),
    ShootFailed(ShootFailedData),
}

impl OutboundMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundMessage::StateSnapshot(_) => types::STATE_SNAPSHOT,
            OutboundMessage::StateDelta(_) => types::STATE_DELTA,
            OutboundMessage::ProjectileSpawn(_) => types::PROJECTILE_SPAWN,
            OutboundMessage::ProjectileDestroy(_) => types::PROJECTILE_DESTROY,
            OutboundMessage::PlayerDamaged(_) => types::PLAYER_DAMAGED,
            OutboundMessage::HitConfirmed(_) => types::HIT_CONFIRMED,
            OutboundMessage::PlayerDeath(_) => types::PLAYER_DEATH,
            OutboundMessage::PlayerKillCredit(_) => types::PLAYER_KILL_CREDIT,
            OutboundMessage::PlayerRespawn(_) => types::PLAYER_RESPAWN,
            OutboundMessage::WeaponState(_) => types::WEAPON_STATE,
            OutboundMessage::WeaponSpawned(_) => types::WEAPON_SPAWNED,
            OutboundMessage::WeaponRespawned(_) => types::WEAPON_RESPAWNED,
            OutboundMessage::WeaponPickupConfirmed(_) => types::WEAPON_STATE,
            OutboundMessage::RollStart(_) => types::ROLL_START,
            OutboundMessage::RollEnd(_) => types::ROLL_END,
            OutboundMessage::MeleeHit(_) => types::MELEE_HIT,
            OutboundMessage::MatchTimer(_) => types::MATCH_TIMER,
            OutboundMessage::MatchEnded(_) => types::MATCH_ENDED,
            OutboundMessage::RoomJoined(_) => types::ROOM_JOINED,
            OutboundMessage::PlayerLeft(_) => types::PLAYER_LEFT,
            OutboundMessage::ShootFailed(_) => types::SHOOT_FAILED,
        }
    }

    /// `weapon:pickup_confirmed` shares no struct with `weapon:state` but
    /// was folded into the same `Serialize` derive target above; give it
    /// its real wire name here instead of misreporting `weapon:state`.
    pub fn wire_type_name(&self) -> &'static str {
        match self {
            OutboundMessage::WeaponPickupConfirmed(_) => "weapon:pickup_confirmed",
            other => other.type_name(),
        }
    }

    pub fn encode(&self, timestamp: i64) -> Vec<u8> {
        let data = serde_json::to_value(self).expect("outbound messages are always serializable");
        envelope(self.wire_type_name(), timestamp, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_input_state_envelope() {
        let raw = br#"{"type":"input:state","timestamp":0,"data":{"up":true,"down":false,"left":false,"right":false,"aimAngle":0.0,"isSprinting":false,"sequence":1}}"#;
        let parsed = parse_envelope(raw).unwrap();
        assert_eq!(parsed.type_, types::INPUT_STATE);
        let decoded = InboundMessage::decode(&parsed.type_, parsed.data).unwrap();
        match decoded {
            InboundMessage::InputState(data) => {
                assert!(data.up);
                assert_eq!(data.sequence, 1);
            }
            _ => panic!("expected InputState"),
        }
    }

    #[test]
    fn unknown_inbound_type_is_rejected() {
        let raw = br#"{"type":"bogus","timestamp":0,"data":{}}"#;
        let parsed = parse_envelope(raw).unwrap();
        let err = InboundMessage::decode(&parsed.type_, parsed.data).unwrap_err();
        matches!(err, DispatchError::UnknownMessageType(_));
    }

    #[test]
    fn outbound_encode_uses_canonical_field_names() {
        let msg = OutboundMessage::MatchTimer(MatchTimerData { remaining_seconds: 42 });
        let bytes = msg.encode(0);
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["data"]["remainingSeconds"], 42);
        assert_eq!(value["type"], types::MATCH_TIMER);
    }
}
