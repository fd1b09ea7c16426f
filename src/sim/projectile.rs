//! Projectile lifecycle: spawned on shoot, advanced each tick, destroyed
//! on arena exit / collision / TTL.

use crate::sim::player::{PlayerId, Vec2};
use crate::sim::weapon::WeaponKind;

pub type ProjectileId = u64;

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: ProjectileId,
    pub owner_id: PlayerId,
    pub kind: WeaponKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub active: bool,
    pub spawn_tick: u64,
    pub range: f64,
    pub traveled: f64,
}

impl Projectile {
    pub fn new(
        id: ProjectileId,
        owner_id: PlayerId,
        kind: WeaponKind,
        position: Vec2,
        velocity: Vec2,
        range: f64,
        spawn_tick: u64,
    ) -> Self {
        Self { id, owner_id, kind, position, velocity, active: true, spawn_tick, range, traveled: 0.0 }
    }

    /// Step 5 of the simulation tick: advance and check arena/range exit.
    pub fn advance(&mut self, dt: f64, arena_width: f64, arena_height: f64) {
        if !self.active {
            return;
        }
        let step = Vec2::new(self.velocity.x * dt, self.velocity.y * dt);
        self.position = Vec2::new(self.position.x + step.x, self.position.y + step.y);
        self.traveled += (step.x * step.x + step.y * step.y).sqrt();

        let out_of_arena = self.position.x < 0.0
            || self.position.x > arena_width
            || self.position.y < 0.0
            || self.position.y > arena_height;
        if out_of_arena || self.traveled >= self.range {
            self.active = false;
        }
    }
}
