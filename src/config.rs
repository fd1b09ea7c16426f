//! Construction-time configuration. Nothing in this module reads a file or
//! an environment variable — loading config is an external concern; this
//! type only carries the values once the embedder has obtained them.

use std::{collections::HashMap, path::PathBuf, time::Duration};

use crate::sim::weapon::{WeaponKind, WeaponProfile};

/// Arena bounds, tick cadences, match constants and delta thresholds.
///
/// All fields are plain values rather than environment lookups so the core
/// stays testable: unit tests build a `ServerConfig` directly with whatever
/// cadence suits the assertion (e.g. a 50ms match timer).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub arena_width: f64,
    pub arena_height: f64,

    pub simulation_tick: Duration,
    pub broadcast_tick: Duration,
    pub match_timer_tick: Duration,

    pub max_health: i32,
    pub respawn_delay: Duration,
    pub spawn_invulnerability: Duration,

    pub room_capacity: usize,
    pub match_quorum: usize,
    pub kill_target: u32,
    pub match_duration: Duration,
    pub xp_per_kill: u32,

    pub pickup_radius: f64,
    pub crate_respawn_delay: Duration,

    pub pos_eps: f64,
    pub vel_eps: f64,
    pub aim_eps: f64,
    pub snapshot_interval: Duration,
    pub correction_window: Duration,

    pub outbound_queue_capacity: usize,

    pub schema_dir: PathBuf,

    pub weapons: HashMap<WeaponKind, WeaponProfile>,
}

impl ServerConfig {
    /// Reasonable defaults for tests and local runs; every field is
    /// intentionally public so integration tests can override the handful
    /// they care about without reconstructing the whole struct by hand.
    pub fn test_defaults() -> Self {
        let mut weapons = HashMap::new();
        weapons.insert(WeaponKind::Pistol, WeaponProfile::default_for(WeaponKind::Pistol));
        weapons.insert(WeaponKind::Shotgun, WeaponProfile::default_for(WeaponKind::Shotgun));
        weapons.insert(WeaponKind::Rifle, WeaponProfile::default_for(WeaponKind::Rifle));

        Self {
            arena_width: 100.0,
            arena_height: 100.0,

            simulation_tick: Duration::from_millis(16),
            broadcast_tick: Duration::from_millis(50),
            match_timer_tick: Duration::from_millis(1000),

            max_health: 100,
            respawn_delay: Duration::from_millis(3000),
            spawn_invulnerability: Duration::from_millis(2000),

            room_capacity: 2,
            match_quorum: 2,
            kill_target: 20,
            match_duration: Duration::from_secs(300),
            xp_per_kill: 10,

            pickup_radius: 1.5,
            crate_respawn_delay: Duration::from_secs(15),

            pos_eps: 0.1,
            vel_eps: 0.1,
            aim_eps: 0.01,
            snapshot_interval: Duration::from_millis(1000),
            correction_window: Duration::from_millis(100),

            outbound_queue_capacity: 256,

            schema_dir: PathBuf::from("schemas"),

            weapons,
        }
    }

    /// `None` means the embedder built a `ServerConfig` without a profile
    /// for this kind; call sites log and skip the action rather than
    /// unwrap, since an incomplete `weapons` map is a configuration mistake
    /// an embedder can make, not a condition the simulation should crash on.
    pub fn weapon_profile(&self, kind: WeaponKind) -> Option<&WeaponProfile> {
        self.weapons.get(&kind)
    }
}
