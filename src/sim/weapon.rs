//! Weapon state and weapon crates. The core treats weapons as opaque
//! parameterized behaviors: `WeaponProfile` carries the balance numbers
//! and is supplied entirely through `ServerConfig`; nothing in this
//! module hardcodes damage, fire rate or magazine size for a given kind.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::sim::player::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Pistol,
    Shotgun,
    Rifle,
}

/// Opaque-to-the-core balance numbers. Concrete values live in
/// `ServerConfig`, never in this struct's `Default` impl — `default_for`
/// below only exists to give tests and examples a starting point and is
/// explicitly not meant to be taken as real balance.
#[derive(Debug, Clone, Copy)]
pub struct WeaponProfile {
    pub magazine_size: u32,
    pub reload_duration: Duration,
    pub cooldown: Duration,
    pub damage: i32,
    pub projectile_speed: f64,
    pub projectile_range: f64,
    pub projectiles_per_shot: u32,
    pub melee_arc_radians: f64,
    pub melee_range: f64,
    pub recoil_per_shot: f64,
}

impl WeaponProfile {
    pub fn default_for(kind: WeaponKind) -> Self {
        match kind {
            WeaponKind::Pistol => WeaponProfile {
                magazine_size: 12,
                reload_duration: Duration::from_millis(1200),
                cooldown: Duration::from_millis(200),
                damage: 12,
                projectile_speed: 40.0,
                projectile_range: 30.0,
                projectiles_per_shot: 1,
                melee_arc_radians: std::f64::consts::FRAC_PI_3,
                melee_range: 1.5,
                recoil_per_shot: 0.02,
            },
            WeaponKind::Shotgun => WeaponProfile {
                magazine_size: 6,
                reload_duration: Duration::from_millis(2000),
                cooldown: Duration::from_millis(700),
                damage: 8,
                projectile_speed: 35.0,
                projectile_range: 12.0,
                projectiles_per_shot: 6,
                melee_arc_radians: std::f64::consts::FRAC_PI_3,
                melee_range: 1.5,
                recoil_per_shot: 0.08,
            },
            WeaponKind::Rifle => WeaponProfile {
                magazine_size: 30,
                reload_duration: Duration::from_millis(1800),
                cooldown: Duration::from_millis(90),
                damage: 10,
                projectile_speed: 55.0,
                projectile_range: 45.0,
                projectiles_per_shot: 1,
                melee_arc_radians: std::f64::consts::FRAC_PI_3,
                melee_range: 1.5,
                recoil_per_shot: 0.015,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WeaponState {
    pub kind: WeaponKind,
    pub current_ammo: u32,
    pub magazine_size: u32,
    pub reloading: bool,
    pub reload_ends_at: Option<Instant>,
    pub last_fired_at: Option<Instant>,
    pub recoil: f64,
}

impl WeaponState {
    pub fn new(kind: WeaponKind, profile: &WeaponProfile) -> Self {
        Self {
            kind,
            current_ammo: profile.magazine_size,
            magazine_size: profile.magazine_size,
            reloading: false,
            reload_ends_at: None,
            last_fired_at: None,
            recoil: 0.0,
        }
    }

    pub fn cooldown_elapsed(&self, now: Instant, profile: &WeaponProfile) -> bool {
        match self.last_fired_at {
            Some(last) => now.saturating_duration_since(last) >= profile.cooldown,
            None => true,
        }
    }

    pub fn can_shoot(&self, now: Instant, profile: &WeaponProfile) -> bool {
        !self.reloading && self.current_ammo > 0 && self.cooldown_elapsed(now, profile)
    }

    pub fn fire(&mut self, now: Instant, profile: &WeaponProfile) {
        self.current_ammo = self.current_ammo.saturating_sub(1);
        self.last_fired_at = Some(now);
        self.recoil += profile.recoil_per_shot;
    }

    pub fn begin_reload(&mut self, now: Instant, profile: &WeaponProfile) {
        self.reloading = true;
        self.reload_ends_at = Some(now + profile.reload_duration);
    }

    /// Step 2 of the simulation tick: complete any reload whose deadline
    /// has passed. Returns true if a completion happened, so the caller
    /// knows to emit `weapon:state`.
    pub fn complete_reload_if_due(&mut self, now: Instant) -> bool {
        match self.reload_ends_at {
            Some(ends_at) if now >= ends_at => {
                self.current_ammo = self.magazine_size;
                self.reloading = false;
                self.reload_ends_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.current_ammo >= self.magazine_size
    }

    pub fn replace(&mut self, kind: WeaponKind, profile: &WeaponProfile) {
        *self = WeaponState::new(kind, profile);
    }
}

pub type WeaponCrateId = u64;

#[derive(Debug, Clone)]
pub struct WeaponCrate {
    pub id: WeaponCrateId,
    pub position: Vec2,
    pub kind: WeaponKind,
    pub available: bool,
    pub next_respawn_at: Option<Instant>,
}

impl WeaponCrate {
    pub fn new(id: WeaponCrateId, position: Vec2, kind: WeaponKind) -> Self {
        Self { id, position, kind, available: true, next_respawn_at: None }
    }

    pub fn pick_up(&mut self, now: Instant, respawn_delay: Duration) {
        self.available = false;
        self.next_respawn_at = Some(now + respawn_delay);
    }

    /// Step 9 of the simulation tick: crates past their respawn deadline
    /// become available again.
    pub fn respawn_if_due(&mut self, now: Instant) -> bool {
        if !self.available
            && let Some(at) = self.next_respawn_at
            && now >= at
        {
            self.available = true;
            self.next_respawn_at = None;
            true
        } else {
            false
        }
    }

    pub fn within_pickup_range(&self, position: Vec2, radius: f64) -> bool {
        self.available && self.position.distance(position) <= radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_completes_only_once_due() {
        let profile = WeaponProfile::default_for(WeaponKind::Pistol);
        let mut weapon = WeaponState::new(WeaponKind::Pistol, &profile);
        let now = Instant::now();
        weapon.current_ammo = 0;
        weapon.begin_reload(now, &profile);
        assert!(!weapon.complete_reload_if_due(now));
        assert!(weapon.complete_reload_if_due(now + profile.reload_duration));
        assert!(weapon.is_full());
        assert!(!weapon.reloading);
    }

    #[test]
    fn crate_becomes_available_after_respawn_delay() {
        let now = Instant::now();
        let mut crate_ = WeaponCrate::new(1, Vec2::ZERO, WeaponKind::Rifle);
        crate_.pick_up(now, Duration::from_secs(5));
        assert!(!crate_.available);
        assert!(!crate_.respawn_if_due(now));
        assert!(crate_.respawn_if_due(now + Duration::from_secs(5)));
        assert!(crate_.available);
    }
}
