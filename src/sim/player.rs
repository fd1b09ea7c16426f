//! Player entity. All mutation flows through `World` — this module
//! defines the record shape and its own small invariants and owns no
//! lock of its own; the world holds one `RwLock` around the whole table
//! instead of a mutex per entity.

use std::time::Instant;

use crate::sim::weapon::WeaponState;

pub type PlayerId = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn clamp_to(self, width: f64, height: f64) -> Vec2 {
        Vec2::new(self.x.clamp(0.0, width), self.y.clamp(0.0, height))
    }
}

impl From<Vec2> for (f64, f64) {
    fn from(v: Vec2) -> Self {
        (v.x, v.y)
    }
}

/// Direction flags + aim + sprint, echoed back with the sequence number
/// the client tagged it with.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub aim_angle: f64,
    pub is_sprinting: bool,
    pub sequence: u64,
}

impl InputSnapshot {
    pub fn direction(self) -> Vec2 {
        let mut dir = Vec2::ZERO;
        if self.up {
            dir.y -= 1.0;
        }
        if self.down {
            dir.y += 1.0;
        }
        if self.left {
            dir.x -= 1.0;
        }
        if self.right {
            dir.x += 1.0;
        }
        let len = (dir.x * dir.x + dir.y * dir.y).sqrt();
        if len > f64::EPSILON { Vec2::new(dir.x / len, dir.y / len) } else { Vec2::ZERO }
    }

    pub fn has_movement(self) -> bool {
        self.up || self.down || self.left || self.right
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RollState {
    pub rolling: bool,
    pub direction: Vec2,
    pub started_at: Instant,
    pub next_eligible_at: Instant,
    pub invulnerable_until: Instant,
}

impl RollState {
    pub fn idle(now: Instant) -> Self {
        Self {
            rolling: false,
            direction: Vec2::ZERO,
            started_at: now,
            next_eligible_at: now,
            invulnerable_until: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerStats {
    pub kills: u32,
    pub deaths: u32,
    pub xp: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct PingTracker {
    pub rtt_millis: f64,
    pub smoothed_rtt_millis: f64,
}

impl Default for PingTracker {
    fn default() -> Self {
        Self { rtt_millis: 0.0, smoothed_rtt_millis: 0.0 }
    }
}

impl PingTracker {
    const SMOOTHING: f64 = 0.125;

    /// Exponential moving average over the raw RTT sample, using the same
    /// smoothing constant TCP's RTT estimator uses.
    pub fn sample(&mut self, rtt_millis: f64) {
        self.rtt_millis = rtt_millis;
        if self.smoothed_rtt_millis == 0.0 {
            self.smoothed_rtt_millis = rtt_millis;
        } else {
            self.smoothed_rtt_millis +=
                Self::SMOOTHING * (rtt_millis - self.smoothed_rtt_millis);
        }
    }
}

pub struct Player {
    pub id: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub aim_angle: f64,
    pub health: i32,
    pub alive: bool,
    pub stats: PlayerStats,
    pub input: InputSnapshot,
    pub roll: RollState,
    pub regenerating: bool,
    pub weapon: WeaponState,
    pub ping: PingTracker,
    pub last_correction_at: Option<Instant>,
    pub respawn_at: Option<Instant>,
}

impl Player {
    pub fn new(id: PlayerId, spawn: Vec2, max_health: i32, weapon: WeaponState, now: Instant) -> Self {
        Self {
            id,
            position: spawn,
            velocity: Vec2::ZERO,
            aim_angle: 0.0,
            health: max_health,
            alive: true,
            stats: PlayerStats::default(),
            input: InputSnapshot::default(),
            roll: RollState::idle(now),
            regenerating: false,
            weapon,
            ping: PingTracker::default(),
            last_correction_at: None,
            respawn_at: None,
        }
    }

    pub fn is_invulnerable(&self, now: Instant) -> bool {
        now < self.roll.invulnerable_until
    }

    pub fn was_corrected_within(&self, now: Instant, window: std::time::Duration) -> bool {
        match self.last_correction_at {
            Some(at) => now.saturating_duration_since(at) <= window,
            None => false,
        }
    }
}

/// Internal bookkeeping snapshot used by the delta tracker to diff
/// consecutive ticks — not the wire format (see `message::PlayerStateData`
/// for that).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
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

impl PlayerSnapshot {
    pub fn of(player: &Player, now: Instant) -> Self {
        Self {
            id: player.id,
            position: player.position,
            velocity: player.velocity,
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_normalizes_diagonal_input() {
        let input = InputSnapshot { up: true, right: true, ..Default::default() };
        let dir = input.direction();
        assert!((dir.x * dir.x + dir.y * dir.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_input_has_zero_direction() {
        let input = InputSnapshot::default();
        assert_eq!(input.direction(), Vec2::ZERO);
    }

    #[test]
    fn ping_tracker_smooths_towards_samples() {
        let mut ping = PingTracker::default();
        ping.sample(100.0);
        assert_eq!(ping.smoothed_rtt_millis, 100.0);
        ping.sample(50.0);
        assert!(ping.smoothed_rtt_millis < 100.0 && ping.smoothed_rtt_millis > 50.0);
    }
}
