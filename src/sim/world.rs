//! World Simulation. Owns the authoritative Player / Projectile /
//! WeaponCrate tables exclusively; every mutation, whether tick-driven or
//! action-driven, goes through a `World` method. A single
//! `RwLock<RoomRegistry>` around the owning room is the concurrency
//! boundary: single-writer simulation thread, concurrent readers for
//! broadcast.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::ServerConfig;
use crate::error::DispatchError;
use crate::event::OutboundEvent;
use crate::message::{
    HitConfirmedData, MeleeHitData, OutboundMessage, PlayerDamagedData, PlayerDeathData,
    PlayerKillCreditData, PlayerRespawnData, ProjectileDestroyData, ProjectileSpawnData,
    RollEndData, RollStartData, WeaponCrateEventData, WeaponPickupConfirmedData, WeaponStateData,
};
use crate::sim::player::{Player, PlayerId, Vec2};
use crate::sim::projectile::{Projectile, ProjectileId};
use crate::sim::weapon::{WeaponCrate, WeaponCrateId, WeaponKind, WeaponState};

pub struct World {
    pub players: HashMap<PlayerId, Player>,
    pub projectiles: HashMap<ProjectileId, Projectile>,
    pub crates: HashMap<WeaponCrateId, WeaponCrate>,
    next_projectile_id: ProjectileId,
    tick_count: u64,
}

impl World {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            projectiles: HashMap::new(),
            crates: HashMap::new(),
            next_projectile_id: 1,
            tick_count: 0,
        }
    }

    pub fn spawn_player(&mut self, id: PlayerId, config: &ServerConfig, now: Instant) {
        let Some(profile) = config.weapon_profile(WeaponKind::Pistol) else {
            log::error!("spawn_player: no weapon profile for {:?}, skipping spawn of {id}", WeaponKind::Pistol);
            return;
        };
        let spawn = self.pick_spawn_point(config);
        let weapon = WeaponState::new(WeaponKind::Pistol, profile);
        self.players.insert(id, Player::new(id, spawn, config.max_health, weapon, now));
    }

    pub fn remove_player(&mut self, id: PlayerId) {
        self.players.remove(&id);
    }

    pub fn spawn_crate(&mut self, id: WeaponCrateId, position: Vec2, kind: WeaponKind) {
        self.crates.insert(id, WeaponCrate::new(id, position, kind));
    }

    fn pick_spawn_point(&self, config: &ServerConfig) -> Vec2 {
        let mut rng = rand::rng();
        Vec2::new(
            rng.random_range(0.0..config.arena_width),
            rng.random_range(0.0..config.arena_height),
        )
    }

    // ---------------------------------------------------------- tick --

    /// Runs the ten ordered simulation steps and returns every tick-driven
    /// outbound event. Per-player faults are logged and skipped — the
    /// tick itself never aborts.
    pub fn tick(&mut self, dt: f64, now: Instant, config: &ServerConfig) -> Vec<OutboundEvent> {
        self.tick_count += 1;
        let mut events = Vec::new();

        // 2. reload completions
        for player in self.players.values_mut() {
            if player.weapon.complete_reload_if_due(now) {
                events.push(OutboundEvent::single(
                    player.id,
                    OutboundMessage::WeaponState(WeaponStateData {
                        kind: player.weapon.kind,
                        current_ammo: player.weapon.current_ammo,
                        magazine_size: player.weapon.magazine_size,
                        reloading: player.weapon.reloading,
                    }),
                ));
            }
        }

        // 3. roll end
        for player in self.players.values_mut() {
            if player.roll.rolling && now >= player.roll.invulnerable_until {
                player.roll.rolling = false;
                events.push(OutboundEvent::room(OutboundMessage::RollEnd(RollEndData {
                    id: player.id,
                })));
            }
        }

        // 4. movement integration
        for player in self.players.values_mut() {
            integrate_movement(player, dt, config, now);
        }

        // 5. projectile advance
        for projectile in self.projectiles.values_mut() {
            projectile.advance(dt, config.arena_width, config.arena_height);
        }

        // 6. collisions (projectile vs player)
        let collisions = self.resolve_projectile_collisions(now, config);
        for (victim_id, attacker_id, damage) in collisions {
            events.extend(self.apply_damage(victim_id, attacker_id, damage, config, now));
        }

        for projectile in self.projectiles.values().filter(|p| !p.active) {
            events.push(OutboundEvent::room(OutboundMessage::ProjectileDestroy(ProjectileDestroyData {
                id: projectile.id,
            })));
        }

        // 9. crate respawns
        for weapon_crate in self.crates.values_mut() {
            if weapon_crate.respawn_if_due(now) {
                events.push(OutboundEvent::room(OutboundMessage::WeaponRespawned(
                    WeaponCrateEventData {
                        id: weapon_crate.id,
                        position: weapon_crate.position.into(),
                        kind: weapon_crate.kind,
                    },
                )));
            }
        }

        // 8. respawn (deaths handled inline with damage above schedule a
        // respawn_at; this pass resolves any deadline that has elapsed)
        let due: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| !p.alive && p.respawn_at.is_some_and(|at| now >= at))
            .map(|p| p.id)
            .collect();
        for id in due {
            self.respawn_player(id, config, now);
            if let Some(player) = self.players.get(&id) {
                events.push(OutboundEvent::room(OutboundMessage::PlayerRespawn(
                    PlayerRespawnData { id, position: player.position.into() },
                )));
            }
        }

        // 10. sanitize
        self.sanitize_floats(config);

        // drop dead projectiles from the table entirely so they never
        // reappear in a later state message
        self.projectiles.retain(|_, p| p.active);

        events
    }

    fn resolve_projectile_collisions(
        &mut self,
        now: Instant,
        config: &ServerConfig,
    ) -> Vec<(PlayerId, PlayerId, i32)> {
        let mut hits = Vec::new();
        for projectile in self.projectiles.values_mut() {
            if !projectile.active {
                continue;
            }
            for player in self.players.values() {
                if player.id == projectile.owner_id || !player.alive || player.is_invulnerable(now) {
                    continue;
                }
                if player.position.distance(projectile.position) <= PLAYER_RADIUS {
                    let Some(profile) = config.weapon_profile(projectile.kind) else {
                        log::warn!(
                            "resolve_projectile_collisions: no weapon profile for {:?}, dropping projectile {} without damage",
                            projectile.kind, projectile.id
                        );
                        projectile.active = false;
                        break;
                    };
                    hits.push((player.id, projectile.owner_id, profile.damage));
                    projectile.active = false;
                    break;
                }
            }
        }
        hits
    }

    /// Shared death/damage bookkeeping used by both projectile collisions
    /// and melee hits.
    fn apply_damage(
        &mut self,
        victim_id: PlayerId,
        attacker_id: PlayerId,
        damage: i32,
        config: &ServerConfig,
        now: Instant,
    ) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        let Some(victim) = self.players.get_mut(&victim_id) else {
            log::warn!("apply_damage: missing victim {victim_id}, skipping");
            return events;
        };
        if !victim.alive {
            return events;
        }
        victim.health = (victim.health - damage).max(0);
        let new_health = victim.health;
        events.push(OutboundEvent::room(OutboundMessage::PlayerDamaged(PlayerDamagedData {
            victim_id,
            attacker_id,
            damage,
            new_health,
        })));
        events.push(OutboundEvent::single(
            attacker_id,
            OutboundMessage::HitConfirmed(HitConfirmedData { victim_id, damage }),
        ));

        if new_health == 0 {
            victim.alive = false;
            victim.stats.deaths += 1;
            victim.respawn_at = Some(now + config.respawn_delay);
            events.push(OutboundEvent::room(OutboundMessage::PlayerDeath(PlayerDeathData {
                victim_id,
                attacker_id,
            })));

            if let Some(attacker) = self.players.get_mut(&attacker_id) {
                attacker.stats.kills += 1;
                attacker.stats.xp += config.xp_per_kill;
                events.push(OutboundEvent::room(OutboundMessage::PlayerKillCredit(
                    PlayerKillCreditData {
                        killer_id: attacker_id,
                        victim_id,
                        killer_kills: attacker.stats.kills,
                        killer_xp: attacker.stats.xp,
                    },
                )));
            }
        }

        events
    }

    fn respawn_player(&mut self, id: PlayerId, config: &ServerConfig, now: Instant) {
        let spawn = self.pick_spawn_point(config);
        if let Some(player) = self.players.get_mut(&id) {
            player.position = spawn;
            player.velocity = Vec2::ZERO;
            player.health = config.max_health;
            player.alive = true;
            player.respawn_at = None;
            player.roll.invulnerable_until = now + config.spawn_invulnerability;
        }
    }

    fn sanitize_floats(&mut self, config: &ServerConfig) {
        for player in self.players.values_mut() {
            if !player.position.is_finite() {
                log::warn!("sanitizing non-finite position for player {}", player.id);
                player.position = player.position.clamp_to(config.arena_width, config.arena_height);
                if !player.position.is_finite() {
                    player.position = Vec2::ZERO;
                }
            }
            if !player.velocity.is_finite() {
                log::warn!("sanitizing non-finite velocity for player {}", player.id);
                player.velocity = Vec2::ZERO;
            }
            if !player.aim_angle.is_finite() {
                log::warn!("sanitizing non-finite aim angle for player {}", player.id);
                player.aim_angle = 0.0;
            }
        }
    }

    // ------------------------------------------------- action handlers --

    /// `player:shoot`. Gate (match running, schema valid) is the caller's
    /// responsibility; this enforces the weapon-level preconditions
    /// (reloading / ammo / cooldown) and mutates state.
    pub fn shoot(
        &mut self,
        shooter_id: PlayerId,
        aim_angle: f64,
        now: Instant,
        config: &ServerConfig,
    ) -> Result<Vec<OutboundEvent>, DispatchError> {
        let Some(shooter) = self.players.get_mut(&shooter_id) else {
            return Err(DispatchError::UnknownRoom);
        };
        if !shooter.alive {
            return Err(DispatchError::PlayerDead);
        }
        let Some(profile) = config.weapon_profile(shooter.weapon.kind).copied() else {
            return Err(DispatchError::WeaponMisconfigured(format!("{:?}", shooter.weapon.kind)));
        };
        if shooter.weapon.reloading {
            return Err(DispatchError::StillReloading);
        }
        if shooter.weapon.current_ammo == 0 {
            return Err(DispatchError::OutOfAmmo);
        }
        if !shooter.weapon.cooldown_elapsed(now, &profile) {
            return Err(DispatchError::WeaponOnCooldown);
        }

        shooter.aim_angle = aim_angle;
        shooter.weapon.fire(now, &profile);
        let origin = shooter.position;
        let kind = shooter.weapon.kind;
        let current_ammo = shooter.weapon.current_ammo;
        let magazine_size = shooter.weapon.magazine_size;
        let reloading = shooter.weapon.reloading;

        let mut events = Vec::new();
        let spread = if profile.projectiles_per_shot > 1 { 0.12 } else { 0.0 };
        for i in 0..profile.projectiles_per_shot {
            let offset = if profile.projectiles_per_shot > 1 {
                spread * (i as f64 - (profile.projectiles_per_shot as f64 - 1.0) / 2.0)
            } else {
                0.0
            };
            let angle = aim_angle + offset;
            let velocity = Vec2::new(angle.cos() * profile.projectile_speed, angle.sin() * profile.projectile_speed);
            let id = self.next_projectile_id;
            self.next_projectile_id += 1;
            self.projectiles.insert(
                id,
                Projectile::new(id, shooter_id, kind, origin, velocity, profile.projectile_range, self.tick_count),
            );
            events.push(OutboundEvent::room(OutboundMessage::ProjectileSpawn(ProjectileSpawnData {
                id,
                owner_id: shooter_id,
                kind,
                position: origin.into(),
                velocity: velocity.into(),
            })));
        }

        events.push(OutboundEvent::single(
            shooter_id,
            OutboundMessage::WeaponState(WeaponStateData { kind, current_ammo, magazine_size, reloading }),
        ));

        Ok(events)
    }

    /// `player:reload`.
    pub fn reload(&mut self, player_id: PlayerId, now: Instant, config: &ServerConfig) -> Result<Vec<OutboundEvent>, DispatchError> {
        let Some(player) = self.players.get_mut(&player_id) else {
            return Err(DispatchError::UnknownRoom);
        };
        if player.weapon.is_full() {
            return Err(DispatchError::MagazineFull);
        }
        let Some(profile) = config.weapon_profile(player.weapon.kind).copied() else {
            return Err(DispatchError::WeaponMisconfigured(format!("{:?}", player.weapon.kind)));
        };
        player.weapon.begin_reload(now, &profile);
        Ok(vec![OutboundEvent::single(
            player_id,
            OutboundMessage::WeaponState(WeaponStateData {
                kind: player.weapon.kind,
                current_ammo: player.weapon.current_ammo,
                magazine_size: player.weapon.magazine_size,
                reloading: true,
            }),
        )])
    }

    /// `player:melee_attack`: arc query from attacker to victims within
    /// weapon arc and range; always emits `melee:hit` for animation even
    /// with zero victims.
    pub fn melee_attack(
        &mut self,
        attacker_id: PlayerId,
        aim_angle: f64,
        config: &ServerConfig,
        now: Instant,
    ) -> Result<Vec<OutboundEvent>, DispatchError> {
        let Some(attacker) = self.players.get(&attacker_id) else {
            return Err(DispatchError::UnknownRoom);
        };
        if !attacker.alive {
            return Err(DispatchError::PlayerDead);
        }
        let Some(profile) = config.weapon_profile(attacker.weapon.kind).copied() else {
            return Err(DispatchError::WeaponMisconfigured(format!("{:?}", attacker.weapon.kind)));
        };
        let origin = attacker.position;

        let victim_ids: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.id != attacker_id && p.alive && !p.is_invulnerable(now))
            .filter(|p| within_arc(origin, aim_angle, profile.melee_range, profile.melee_arc_radians, p.position))
            .map(|p| p.id)
            .collect();

        let mut events = vec![OutboundEvent::room(OutboundMessage::MeleeHit(MeleeHitData {
            attacker_id,
            victim_ids: victim_ids.clone(),
        }))];

        for victim_id in victim_ids {
            events.extend(self.apply_damage(victim_id, attacker_id, profile.damage, config, now));
        }

        Ok(events)
    }

    /// `player:roll`: direction is WASD if any pressed, else aim angle.
    pub fn roll(
        &mut self,
        player_id: PlayerId,
        roll_cooldown: Duration,
        invulnerability: Duration,
        now: Instant,
    ) -> Result<Vec<OutboundEvent>, DispatchError> {
        let Some(player) = self.players.get_mut(&player_id) else {
            return Err(DispatchError::UnknownRoom);
        };
        if !player.alive {
            return Err(DispatchError::PlayerDead);
        }
        if now < player.roll.next_eligible_at {
            return Err(DispatchError::RollOnCooldown);
        }

        let direction = if player.input.has_movement() {
            player.input.direction()
        } else {
            Vec2::new(player.aim_angle.cos(), player.aim_angle.sin())
        };

        player.roll.rolling = true;
        player.roll.direction = direction;
        player.roll.started_at = now;
        player.roll.next_eligible_at = now + roll_cooldown;
        player.roll.invulnerable_until = now + invulnerability;

        Ok(vec![OutboundEvent::room(OutboundMessage::RollStart(RollStartData {
            id: player_id,
            direction: direction.into(),
        }))])
    }

    /// `weapon:pickup_attempt`.
    pub fn pickup_attempt(
        &mut self,
        player_id: PlayerId,
        crate_id: WeaponCrateId,
        config: &ServerConfig,
        now: Instant,
    ) -> Result<Vec<OutboundEvent>, DispatchError> {
        let Some(player) = self.players.get(&player_id) else {
            return Err(DispatchError::UnknownRoom);
        };
        if !player.alive {
            return Err(DispatchError::PlayerDead);
        }
        let position = player.position;

        let Some(weapon_crate) = self.crates.get_mut(&crate_id) else {
            return Err(DispatchError::CrateUnavailable);
        };
        if !weapon_crate.available {
            return Err(DispatchError::CrateUnavailable);
        }
        if !weapon_crate.within_pickup_range(position, config.pickup_radius) {
            return Err(DispatchError::OutOfPickupRange);
        }

        let kind = weapon_crate.kind;
        let Some(profile) = config.weapon_profile(kind) else {
            return Err(DispatchError::WeaponMisconfigured(format!("{kind:?}")));
        };
        weapon_crate.pick_up(now, config.crate_respawn_delay);

        let player = self.players.get_mut(&player_id).expect("checked above");
        player.weapon.replace(kind, profile);

        Ok(vec![
            OutboundEvent::room(OutboundMessage::WeaponPickupConfirmed(WeaponPickupConfirmedData {
                player_id,
                crate_id,
                kind,
            })),
            OutboundEvent::single(
                player_id,
                OutboundMessage::WeaponState(WeaponStateData {
                    kind,
                    current_ammo: player.weapon.current_ammo,
                    magazine_size: player.weapon.magazine_size,
                    reloading: false,
                }),
            ),
        ])
    }

}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

const PLAYER_RADIUS: f64 = 0.6;

fn integrate_movement(player: &mut Player, dt: f64, config: &ServerConfig, now: Instant) {
    const BASE_SPEED: f64 = 6.0;
    const SPRINT_MULTIPLIER: f64 = 1.6;
    const ROLL_SPEED: f64 = 10.0;
    const ACCEL: f64 = 40.0;

    if player.roll.rolling && now < player.roll.invulnerable_until {
        player.velocity = Vec2::new(player.roll.direction.x * ROLL_SPEED, player.roll.direction.y * ROLL_SPEED);
    } else {
        let dir = player.input.direction();
        let max_speed = if player.input.is_sprinting { BASE_SPEED * SPRINT_MULTIPLIER } else { BASE_SPEED };
        let target = Vec2::new(dir.x * max_speed, dir.y * max_speed);
        player.velocity = Vec2::new(
            step_towards(player.velocity.x, target.x, ACCEL * dt),
            step_towards(player.velocity.y, target.y, ACCEL * dt),
        );
    }

    player.position = Vec2::new(
        player.position.x + player.velocity.x * dt,
        player.position.y + player.velocity.y * dt,
    )
    .clamp_to(config.arena_width, config.arena_height);

    player.aim_angle = player.input.aim_angle;
}

fn step_towards(current: f64, target: f64, max_delta: f64) -> f64 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + max_delta * (target - current).signum()
    }
}

fn within_arc(origin: Vec2, facing: f64, range: f64, arc: f64, target: Vec2) -> bool {
    let delta = Vec2::new(target.x - origin.x, target.y - origin.y);
    let distance = (delta.x * delta.x + delta.y * delta.y).sqrt();
    if distance > range {
        return false;
    }
    let angle_to_target = delta.y.atan2(delta.x);
    let mut diff = angle_to_target - facing;
    while diff > std::f64::consts::PI {
        diff -= std::f64::consts::TAU;
    }
    while diff < -std::f64::consts::PI {
        diff += std::f64::consts::TAU;
    }
    diff.abs() <= arc / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig::test_defaults()
    }

    #[test]
    fn shoot_decrements_ammo_and_spawns_projectile() {
        let mut world = World::new();
        let now = Instant::now();
        let cfg = config();
        world.spawn_player(1, &cfg, now);
        world.spawn_player(2, &cfg, now);

        let before_ammo = world.players[&1].weapon.current_ammo;
        let events = world.shoot(1, 0.0, now, &cfg).unwrap();
        assert_eq!(world.players[&1].weapon.current_ammo, before_ammo - 1);
        assert_eq!(world.projectiles.len(), 1);
        assert!(events.iter().any(|e| matches!(e.message, OutboundMessage::ProjectileSpawn(_))));
    }

    #[test]
    fn shoot_fails_while_reloading() {
        let mut world = World::new();
        let now = Instant::now();
        let cfg = config();
        world.spawn_player(1, &cfg, now);
        world.players.get_mut(&1).unwrap().weapon.current_ammo = 0;
        world.reload(1, now, &cfg).unwrap();
        let err = world.shoot(1, 0.0, now, &cfg).unwrap_err();
        assert!(matches!(err, DispatchError::StillReloading));
    }

    #[test]
    fn death_awards_kill_credit_and_schedules_respawn() {
        let mut world = World::new();
        let now = Instant::now();
        let cfg = config();
        world.spawn_player(1, &cfg, now);
        world.spawn_player(2, &cfg, now);
        world.players.get_mut(&2).unwrap().health = 1;

        let events = world.apply_damage(2, 1, 50, &cfg, now);
        assert!(!world.players[&2].alive);
        assert_eq!(world.players[&1].stats.kills, 1);
        assert!(events.iter().any(|e| matches!(e.message, OutboundMessage::PlayerDeath(_))));
        assert!(events.iter().any(|e| matches!(e.message, OutboundMessage::PlayerKillCredit(_))));
    }

    #[test]
    fn respawn_happens_after_delay_via_tick() {
        let mut world = World::new();
        let now = Instant::now();
        let cfg = config();
        world.spawn_player(1, &cfg, now);
        world.spawn_player(2, &cfg, now);
        world.players.get_mut(&2).unwrap().health = 1;
        world.apply_damage(2, 1, 50, &cfg, now);
        assert!(!world.players[&2].alive);

        world.tick(0.016, now, &cfg);
        assert!(!world.players[&2].alive);

        let later = now + cfg.respawn_delay + Duration::from_millis(1);
        let events = world.tick(0.016, later, &cfg);
        assert!(world.players[&2].alive);
        assert_eq!(world.players[&2].health, cfg.max_health);
        assert!(events.iter().any(|e| matches!(e.message, OutboundMessage::PlayerRespawn(_))));
    }

    #[test]
    fn pickup_requires_proximity_and_availability() {
        let mut world = World::new();
        let now = Instant::now();
        let cfg = config();
        world.spawn_player(1, &cfg, now);
        world.players.get_mut(&1).unwrap().position = Vec2::new(0.0, 0.0);
        world.spawn_crate(1, Vec2::new(50.0, 50.0), WeaponKind::Rifle);

        let err = world.pickup_attempt(1, 1, &cfg, now).unwrap_err();
        assert!(matches!(err, DispatchError::OutOfPickupRange));

        world.players.get_mut(&1).unwrap().position = Vec2::new(50.0, 50.0);
        world.pickup_attempt(1, 1, &cfg, now).unwrap();
        assert_eq!(world.players[&1].weapon.kind, WeaponKind::Rifle);
        assert!(!world.crates[&1].available);

        let err = world.pickup_attempt(1, 1, &cfg, now).unwrap_err();
        assert!(matches!(err, DispatchError::CrateUnavailable));
    }

    #[test]
    fn melee_hit_always_emits_even_with_no_victims() {
        let mut world = World::new();
        let now = Instant::now();
        let cfg = config();
        world.spawn_player(1, &cfg, now);
        let events = world.melee_attack(1, 0.0, &cfg, now).unwrap();
        assert!(matches!(events[0].message, OutboundMessage::MeleeHit(_)));
    }

    #[test]
    fn positions_stay_within_arena_bounds() {
        let mut world = World::new();
        let now = Instant::now();
        let cfg = config();
        world.spawn_player(1, &cfg, now);
        let player = world.players.get_mut(&1).unwrap();
        player.position = Vec2::new(-50.0, -50.0);
        player.velocity = Vec2::new(-100.0, -100.0);
        world.tick(0.016, now, &cfg);
        let player = &world.players[&1];
        assert!(player.position.x >= 0.0 && player.position.x <= cfg.arena_width);
        assert!(player.position.y >= 0.0 && player.position.y <= cfg.arena_height);
    }
}
