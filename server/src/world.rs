//! Entity registry and per-entity behaviour.
//!
//! The world owns every entity, grouped by [`Category`], the collision bodies that mirror
//! them and the players they belong to. While an entity's hook runs it is taken out of the
//! registry, which lets the hook borrow both the entity and the rest of the world mutably.
//! Anything that needs a deferred effect receives the scheduler explicitly.

use crate::collision::{CollisionResult, CollisionWorld};
use crate::components::{Health, HealthChange, Locomotion, Shooter, SimpleMovement};
use crate::entity::{Category, Entity, EntityKind, PickupKind, PickupSpawner, Tag};
use crate::events::GameEvent;
use crate::map::Map;
use crate::player::{ColorPool, Player};
use crate::scheduler::{Scheduler, TaskHandle};
use crate::tuning::Tuning;
use crate::weapons::{Pellet, Volley, Weapon, WeaponKind};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::math::Vec2;
use shared::{AvatarRecord, Command, EntityId, PlayerId, ProjectileRecord, ScoreRow, Snapshot};
use std::collections::{BTreeMap, HashMap};

/// Deferred work queued on the simulation scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldTask {
    RoundEnd,
    Respawn(EntityId),
    SpawnPickup(EntityId),
}

pub struct World {
    entities: HashMap<EntityId, Entity>,
    groups: [Vec<EntityId>; Category::COUNT],
    collision: CollisionWorld,
    players: BTreeMap<PlayerId, Player>,
    colors: ColorPool,
    map: Map,
    tuning: Tuning,
    events: Vec<GameEvent>,
    to_delete: Vec<EntityId>,
    pickup_manager: Option<EntityId>,
    rng: StdRng,
    now: f64,
}

impl World {
    pub fn new(tuning: Tuning, seed: Option<u64>) -> Self {
        let map = Map::fallback(tuning.sample_walls.clone());
        Self {
            entities: HashMap::new(),
            groups: Default::default(),
            collision: CollisionWorld::new(),
            players: BTreeMap::new(),
            colors: ColorPool::default(),
            map,
            tuning,
            events: Vec::new(),
            to_delete: Vec::new(),
            pickup_manager: None,
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
            now: 0.0,
        }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Simulation time seen by hooks and scheduled tasks.
    pub fn set_now(&mut self, now: f64) {
        self.now = now;
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn set_map(&mut self, map: Map) {
        self.map = map;
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn collision(&self) -> &CollisionWorld {
        &self.collision
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn group(&self, category: Category) -> &[EntityId] {
        &self.groups[category.index()]
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn avatar_of(&self, player: PlayerId) -> Option<&Entity> {
        self.players
            .get(&player)
            .and_then(|p| p.avatar)
            .and_then(|id| self.entities.get(&id))
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Runs `f` with the entity taken out of the registry.
    fn with_entity<R>(&mut self, id: EntityId, f: impl FnOnce(&mut Self, &mut Entity) -> R) -> Option<R> {
        let mut entity = self.entities.remove(&id)?;
        let result = f(self, &mut entity);
        self.entities.insert(id, entity);
        Some(result)
    }

    // Registration

    /// Registers the entity in its group and runs its init hook.
    pub fn create_entity(&mut self, mut entity: Entity) -> EntityId {
        let id = entity.id;
        if let EntityKind::Avatar { .. } = entity.kind {
            self.equip_weapon(&mut entity, Weapon::pistol());
        }
        self.groups[entity.category().index()].push(id);
        self.entities.insert(id, entity);
        id
    }

    /// Marks the entity for removal at the end of the current step. Marking it again is
    /// harmless.
    pub fn remove_entity(&mut self, id: EntityId) {
        self.to_delete.push(id);
    }

    /// Removes every marked entity and runs its cleanup. Returns the number removed.
    pub fn flush_deletions(&mut self, scheduler: &mut Scheduler<WorldTask>) -> usize {
        let mut removed = 0;
        for id in std::mem::take(&mut self.to_delete) {
            let Some(entity) = self.entities.remove(&id) else {
                continue;
            };
            self.groups[entity.category().index()].retain(|e| *e != id);
            self.cleanup(scheduler, entity);
            removed += 1;
        }
        removed
    }

    fn cleanup(&mut self, scheduler: &mut Scheduler<WorldTask>, entity: Entity) {
        for handle in &entity.schedules {
            scheduler.disable(*handle);
        }
        if let EntityKind::PickupManager(spawner) = &entity.kind {
            if let Some(handle) = spawner.next_task {
                scheduler.disable(handle);
            }
            if self.pickup_manager == Some(entity.id) {
                self.pickup_manager = None;
            }
        }
        if let Some(body) = entity.body {
            self.collision.remove(body);
        }
    }

    /// Drops every entity and body; players survive with their avatar unset.
    pub fn clear_entities(&mut self) {
        self.entities.clear();
        for group in &mut self.groups {
            group.clear();
        }
        self.collision = CollisionWorld::new();
        self.to_delete.clear();
        self.pickup_manager = None;
        for player in self.players.values_mut() {
            player.avatar = None;
        }
    }

    /// Forgets players that left during the round and zeroes everyone's score.
    pub fn reset_players(&mut self) {
        let inactive: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| !p.active)
            .map(|p| p.id)
            .collect();
        for id in inactive {
            if let Some(player) = self.players.remove(&id) {
                self.colors.give_back(player.color);
            }
        }
        for player in self.players.values_mut() {
            player.kills = 0;
            player.deaths = 0;
        }
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    // Prefabs

    pub fn spawn_wall(&mut self, outline: &[[f32; 2]]) -> EntityId {
        let mut wall = Entity::new(EntityKind::Wall, Vec2::ZERO);
        wall.body = Some(self.collision.create_polygon(wall.id, 0.0, 0.0, outline));
        self.create_entity(wall)
    }

    pub fn spawn_walls(&mut self) -> usize {
        let walls = self.map.walls.clone();
        for outline in &walls {
            self.spawn_wall(outline);
        }
        walls.len()
    }

    pub fn spawn_avatar(&mut self, player: PlayerId, position: Vec2) -> EntityId {
        let tuning = &self.tuning;
        let mut avatar = Entity::new(EntityKind::Avatar { player }, position);
        avatar.components.movement = Some(SimpleMovement::new(
            tuning.player_speed,
            tuning.player_sprint_mult,
            tuning.player_walk_mult,
        ));
        avatar.components.health = Some(Health::new(tuning.player_health));
        avatar.components.shooter = Some(Shooter::new());
        avatar.body = Some(self.collision.create_circle(
            avatar.id,
            position.x,
            position.y,
            tuning.player_width,
        ));
        self.create_entity(avatar)
    }

    fn spawn_bullet(&mut self, shooter: &Entity, aim: Vec2, pellet: &Pellet) -> EntityId {
        let locomotion = Locomotion::new(pellet.speed, aim, pellet.spread, &mut self.rng);
        let mut bullet = Entity::new(
            EntityKind::Bullet {
                shooter: shooter.id,
                shooter_player: shooter.player(),
                damage: pellet.damage,
            },
            shooter.position,
        );
        bullet.components.locomotion = Some(locomotion);
        let body = self.collision.create_circle(
            bullet.id,
            shooter.position.x,
            shooter.position.y,
            pellet.width,
        );
        self.collision.add_ignore(body, shooter.id);
        bullet.body = Some(body);
        self.create_entity(bullet)
    }

    pub fn spawn_pickup(&mut self, kind: PickupKind, position: Vec2) -> EntityId {
        let mut pickup = Entity::new(EntityKind::Pickup(kind), position);
        pickup.body = Some(self.collision.create_circle(
            pickup.id,
            position.x,
            position.y,
            self.tuning.pickup_radius,
        ));
        self.create_entity(pickup)
    }

    pub fn spawn_pickup_manager(&mut self) -> EntityId {
        let manager = Entity::new(EntityKind::PickupManager(PickupSpawner::default()), Vec2::ZERO);
        let id = self.create_entity(manager);
        self.pickup_manager = Some(id);
        id
    }

    pub fn pickup_manager(&self) -> Option<EntityId> {
        self.pickup_manager
    }

    pub fn random_spawn_point(&mut self) -> Vec2 {
        self.map.random_spawn_point(&mut self.rng)
    }

    // Players

    /// Registers a new player and gives them an avatar.
    pub fn add_player(&mut self, id: PlayerId, nick: String) -> &Player {
        let color = self.colors.take(&mut self.rng);
        self.players.insert(id, Player::new(id, nick, color));
        self.give_avatar(id);
        info!("Player {} joined", id);
        self.emit(GameEvent::PlayerJoined { player: id });
        &self.players[&id]
    }

    /// Gives a returning player a fresh avatar. Their score is kept.
    pub fn restore_player(&mut self, id: PlayerId) -> Option<&Player> {
        let previous = self.players.get(&id)?.avatar;
        if let Some(avatar) = previous {
            self.remove_entity(avatar);
        }
        self.give_avatar(id);
        info!("Player {} rejoined", id);
        self.emit(GameEvent::PlayerRejoined { player: id });
        self.players.get(&id)
    }

    /// Kills and removes the player's avatar and marks them inactive. The record lingers
    /// until the next reset so a reconnect keeps the score.
    pub fn remove_player(&mut self, scheduler: &mut Scheduler<WorldTask>, id: PlayerId) -> Option<&Player> {
        let avatar = self.players.get(&id)?.avatar;
        if let Some(avatar) = avatar {
            self.with_entity(avatar, |world, entity| {
                if entity.is_alive() {
                    world.on_death(scheduler, entity);
                }
            });
            self.remove_entity(avatar);
        }
        if let Some(player) = self.players.get_mut(&id) {
            player.active = false;
            player.avatar = None;
        }
        info!("Player {} disconnected", id);
        self.emit(GameEvent::PlayerDisconnected { player: id });
        self.players.get(&id)
    }

    fn give_avatar(&mut self, player: PlayerId) -> EntityId {
        let position = self.random_spawn_point();
        let avatar = self.spawn_avatar(player, position);
        if let Some(record) = self.players.get_mut(&player) {
            record.avatar = Some(avatar);
            record.active = true;
        }
        avatar
    }

    /// New avatars for players carried over from the previous round.
    pub fn respawn_avatars(&mut self, scheduler: &mut Scheduler<WorldTask>) {
        let ids: Vec<PlayerId> = self.players.keys().copied().collect();
        for id in ids {
            let avatar = self.give_avatar(id);
            // Pushes the current health to the player's HUD.
            self.with_entity(avatar, |world, entity| {
                world.change_health(scheduler, entity, |health| health.heal(1.0));
            });
        }
    }

    pub fn score_data(&self) -> Vec<ScoreRow> {
        self.players
            .values()
            .filter(|p| p.active)
            .map(Player::score_row)
            .collect()
    }

    /// Most kills wins; ties go to fewer deaths, then to whoever joined first.
    pub fn winner(&self) -> String {
        let mut best: Option<&Player> = None;
        for player in self.players.values() {
            let better = match best {
                None => true,
                Some(b) => player.kills > b.kills || (player.kills == b.kills && player.deaths < b.deaths),
            };
            if better {
                best = Some(player);
            }
        }
        match best {
            Some(player) => format!("'{}'", player.nick),
            None => "No one!".to_string(),
        }
    }

    /// Applies a player intent to their avatar. Only call between steps.
    pub fn apply_command(&mut self, player: PlayerId, command: Command, start: bool) -> bool {
        let Some(avatar) = self.players.get(&player).and_then(|p| p.avatar) else {
            return false;
        };
        self.with_entity(avatar, |world, entity| {
            if let Some(movement) = entity.components.movement.as_mut() {
                match command {
                    Command::Up => movement.up = start,
                    Command::Down => movement.down = start,
                    Command::Left => movement.left = start,
                    Command::Right => movement.right = start,
                    Command::Sprint => movement.sprinting = start,
                    Command::Walk => movement.walking = start,
                    Command::Fire => {}
                }
            }
            if command == Command::Fire {
                if start {
                    world.shoot_start(entity);
                } else if let Some(shooter) = entity.components.shooter.as_mut() {
                    shooter.shoot_end();
                }
            }
        })
        .is_some()
    }

    // Combat

    fn shoot_start(&mut self, entity: &mut Entity) {
        if !entity.is_alive() {
            return;
        }
        let volley = match entity.components.shooter.as_mut() {
            Some(shooter) => shooter.shoot_start(self.now, &self.tuning),
            None => None,
        };
        if let Some(volley) = volley {
            self.fire_volley(entity, volley);
        }
    }

    fn fire_volley(&mut self, shooter: &mut Entity, volley: Volley) {
        let Some(aim) = shooter.components.shooter.as_ref().map(Shooter::aim) else {
            return;
        };
        for pellet in &volley.pellets {
            self.spawn_bullet(shooter, aim, pellet);
        }
        if let (Some(player), Some(component)) = (shooter.player(), shooter.components.shooter.as_ref()) {
            let status = component.weapon().status(&self.tuning);
            self.emit(GameEvent::ShotFired {
                player,
                weapon: volley.weapon,
                status,
            });
        }
        if volley.depleted {
            self.equip_weapon(shooter, Weapon::pistol());
        }
    }

    fn equip_weapon(&mut self, entity: &mut Entity, weapon: Weapon) {
        let Some(shooter) = entity.components.shooter.as_mut() else {
            return;
        };
        let kind = weapon.kind();
        let status = weapon.status(&self.tuning);
        shooter.equip(weapon);
        if let Some(player) = entity.player() {
            self.emit(GameEvent::WeaponEquipped {
                player,
                weapon: kind,
                status,
            });
        }
    }

    /// Mutates the entity's health, reporting it and handling a death.
    fn change_health(
        &mut self,
        scheduler: &mut Scheduler<WorldTask>,
        entity: &mut Entity,
        change: impl FnOnce(&mut Health) -> HealthChange,
    ) -> Option<HealthChange> {
        let result = change(entity.components.health.as_mut()?);
        if let Some(player) = entity.player() {
            self.emit(GameEvent::HealthChanged {
                player,
                avatar: entity.id,
                old: result.old,
                new: result.new,
            });
        }
        if result.died {
            self.on_death(scheduler, entity);
        }
        Some(result)
    }

    fn on_death(&mut self, scheduler: &mut Scheduler<WorldTask>, entity: &mut Entity) {
        if let Some(player) = entity.player() {
            let deaths = self.players.get_mut(&player).map_or(0, |p| {
                p.deaths += 1;
                p.deaths
            });
            self.emit(GameEvent::AvatarDied {
                player,
                avatar: entity.id,
                deaths,
            });
        }
        if let Some(body) = entity.body {
            self.collision.set_active(body, false);
        }
        let handle = scheduler.queue(
            self.now + self.tuning.respawn_delay,
            WorldTask::Respawn(entity.id),
            0,
        );
        entity.schedules.push(handle);
        debug!("Avatar {} died, respawn at {:.0}", entity.id, self.now + self.tuning.respawn_delay);
    }

    fn respawn(&mut self, scheduler: &mut Scheduler<WorldTask>, entity: &mut Entity) {
        if let Some(player) = entity.player() {
            self.emit(GameEvent::AvatarRespawned {
                player,
                avatar: entity.id,
            });
        }
        if let Some(body) = entity.body {
            self.collision.set_active(body, true);
        }
        self.change_health(scheduler, entity, Health::restore);
        entity.position = self.random_spawn_point();
        let has_pistol = entity
            .components
            .shooter
            .as_ref()
            .map_or(true, |s| s.has_weapon(WeaponKind::Pistol));
        if !has_pistol {
            self.equip_weapon(entity, Weapon::pistol());
        }
        for handle in entity.schedules.drain(..) {
            scheduler.disable(handle);
        }
    }

    // Pickups

    /// Spawns a random pickup unless the map is full, and queues the next spawn.
    pub fn spawn_next_pickup(&mut self, scheduler: &mut Scheduler<WorldTask>, manager: EntityId) {
        let Some(Entity {
            kind: EntityKind::PickupManager(spawner),
            ..
        }) = self.entities.get(&manager)
        else {
            return;
        };
        let pickups = spawner.pickups;
        let previous = spawner.next_task;
        if pickups >= self.tuning.max_pickups {
            return;
        }

        let next_spawn = self.now + self.tuning.pickup_spawn_delay(pickups);
        let kind = PickupKind::from_roll(self.rng.gen());
        let position = self.random_spawn_point();
        self.spawn_pickup(kind, position);
        debug!("Spawned {:?} pickup at ({:.0}, {:.0})", kind, position.x, position.y);

        if let Some(handle) = previous {
            scheduler.disable(handle);
        }
        let handle = scheduler.queue(next_spawn, WorldTask::SpawnPickup(manager), 0);
        let now = self.now;
        if let Some(spawner) = self.spawner_mut(manager) {
            spawner.pickups += 1;
            spawner.last_spawn = now;
            spawner.next_spawn = next_spawn;
            spawner.next_task = Some(handle);
        }
    }

    fn spawner_mut(&mut self, manager: EntityId) -> Option<&mut PickupSpawner> {
        match self.entities.get_mut(&manager) {
            Some(Entity {
                kind: EntityKind::PickupManager(spawner),
                ..
            }) => Some(spawner),
            _ => None,
        }
    }

    /// A pickup left the map; the next spawn may come sooner.
    fn on_pickup_taken(&mut self, scheduler: &mut Scheduler<WorldTask>) {
        let Some(manager) = self.pickup_manager else {
            return;
        };
        let Some(pickups) = self.spawner_mut(manager).map(|spawner| {
            spawner.pickups = spawner.pickups.saturating_sub(1);
            spawner.pickups
        }) else {
            return;
        };
        let spawn_at = self.now + self.tuning.pickup_spawn_delay(pickups);
        let Some(spawner) = self.spawner_mut(manager) else {
            return;
        };
        // A spawn that found the map full leaves nothing queued.
        let pending = spawner.next_task.is_some_and(|h| scheduler.is_enabled(h));
        if spawn_at < spawner.next_spawn || !pending {
            if let Some(handle) = spawner.next_task {
                scheduler.disable(handle);
            }
            spawner.next_spawn = spawn_at;
            spawner.next_task = Some(scheduler.queue(spawn_at, WorldTask::SpawnPickup(manager), 0));
        }
    }

    fn touch_pickup(
        &mut self,
        scheduler: &mut Scheduler<WorldTask>,
        pickup: &mut Entity,
        kind: PickupKind,
        avatar: &mut Entity,
    ) {
        match kind.weapon() {
            None => {
                if avatar.components.health.as_ref().is_some_and(Health::is_injured) {
                    self.take_pickup(scheduler, pickup, kind, avatar.id);
                    let heal = self.tuning.medkit_heal;
                    self.change_health(scheduler, avatar, |health| health.heal(heal));
                }
            }
            Some(weapon) => {
                let Some(shooter) = avatar.components.shooter.as_mut() else {
                    return;
                };
                if !shooter.has_weapon(weapon) {
                    self.take_pickup(scheduler, pickup, kind, avatar.id);
                    let fresh = Weapon::new(weapon, &self.tuning);
                    self.equip_weapon(avatar, fresh);
                } else if !shooter.weapon().is_full(&self.tuning) {
                    shooter.weapon_mut().refill(&self.tuning);
                    let status = shooter.weapon().status(&self.tuning);
                    self.take_pickup(scheduler, pickup, kind, avatar.id);
                    if let Some(player) = avatar.player() {
                        self.emit(GameEvent::AmmoChanged { player, status });
                    }
                }
            }
        }
    }

    fn take_pickup(&mut self, scheduler: &mut Scheduler<WorldTask>, pickup: &mut Entity, kind: PickupKind, taker: EntityId) {
        if let Some(body) = pickup.body {
            self.collision.set_active(body, false);
        }
        self.emit(GameEvent::PickupTaken {
            taker,
            pickup: pickup.id,
            kind,
        });
        self.on_pickup_taken(scheduler);
        self.remove_entity(pickup.id);
    }

    // Step phases

    pub fn run_task(&mut self, scheduler: &mut Scheduler<WorldTask>, task: WorldTask) {
        match task {
            WorldTask::RoundEnd => {
                let winner = self.winner();
                info!("Round ended, winner: {}", winner);
                self.emit(GameEvent::RoundEnded { winner });
            }
            WorldTask::Respawn(avatar) => {
                self.with_entity(avatar, |world, entity| world.respawn(scheduler, entity));
            }
            WorldTask::SpawnPickup(manager) => self.spawn_next_pickup(scheduler, manager),
        }
    }

    /// Per-tick update of one group. Entities appended while iterating are updated too.
    pub fn update_group(&mut self, category: Category, delta: f32) {
        let mut index = 0;
        while index < self.groups[category.index()].len() {
            let id = self.groups[category.index()][index];
            index += 1;
            self.with_entity(id, |world, entity| world.update_entity(entity, delta));
        }
    }

    fn update_entity(&mut self, entity: &mut Entity, delta: f32) {
        match entity.kind {
            EntityKind::Avatar { .. } => {
                if entity.is_alive() {
                    let components = &mut entity.components;
                    if let Some(movement) = components.movement.as_mut() {
                        movement.update(&mut entity.position, delta);
                    }
                    let volley = match components.shooter.as_mut() {
                        Some(shooter) => shooter.update(components.movement.as_ref(), self.now, &self.tuning),
                        None => None,
                    };
                    if let Some(volley) = volley {
                        self.fire_volley(entity, volley);
                    }
                }
                let padding = self.tuning.player_border_padding;
                let (x, y) = self.map.contain_within_borders(entity.position.x, entity.position.y, padding);
                entity.position = Vec2::new(x, y);
            }
            EntityKind::Bullet { .. } => {
                if let Some(locomotion) = entity.components.locomotion.as_mut() {
                    locomotion.update(&mut entity.position, delta);
                }
            }
            _ => {}
        }
    }

    /// Post-update hooks, then bodies follow their entities.
    pub fn post_update_group(&mut self, category: Category) {
        for index in 0..self.groups[category.index()].len() {
            let id = self.groups[category.index()][index];
            let Some(entity) = self.entities.get(&id) else {
                continue;
            };
            if let EntityKind::Bullet { .. } = entity.kind {
                if !self.map.is_within_borders(entity.position.x, entity.position.y, 0.0) {
                    self.to_delete.push(id);
                }
            }
            if let Some(body) = entity.body {
                self.collision.set_position(body, entity.position.x, entity.position.y);
            }
        }
    }

    pub fn refresh_collisions(&mut self) {
        self.collision.update();
    }

    /// Lets every active body in the group react to what it overlaps. The active flag is
    /// re-read before each pair, so a callback that deactivates a body takes effect within
    /// the same pass.
    pub fn resolve_collisions(&mut self, scheduler: &mut Scheduler<WorldTask>, category: Category) {
        let mut index = 0;
        while index < self.groups[category.index()].len() {
            let id = self.groups[category.index()][index];
            index += 1;
            self.with_entity(id, |world, entity| {
                let Some(body) = entity.body else {
                    return;
                };
                if !world.collision.is_active(body) {
                    return;
                }
                for other in world.collision.potentials(body) {
                    if !world.collision.is_active(body) {
                        break;
                    }
                    let Some(other_body) = world.collision.body(other) else {
                        continue;
                    };
                    let ignored = world
                        .collision
                        .body(body)
                        .is_some_and(|b| b.ignores(other_body.owner));
                    if !other_body.active || ignored {
                        continue;
                    }
                    let owner = other_body.owner;
                    if let Some(result) = world.collision.collides(body, other) {
                        world.on_collide(scheduler, entity, owner, result);
                    }
                }
            });
        }
    }

    fn on_collide(
        &mut self,
        scheduler: &mut Scheduler<WorldTask>,
        entity: &mut Entity,
        other: EntityId,
        result: CollisionResult,
    ) {
        let Some(other_entity) = self.entities.get(&other) else {
            return;
        };
        let other_is_avatar = other_entity.has_tag(Tag::Avatar);
        let other_is_wall = other_entity.has_tag(Tag::Wall);

        match entity.kind {
            EntityKind::Avatar { .. } => {
                if other_is_wall {
                    entity.position.x -= result.overlap * result.overlap_x;
                    entity.position.y -= result.overlap * result.overlap_y;
                }
            }
            EntityKind::Bullet {
                shooter_player,
                damage,
                ..
            } => {
                if other_is_avatar {
                    if let Some(body) = entity.body {
                        self.collision.set_active(body, false);
                    }
                    let change = self.with_entity(other, |world, victim| {
                        world.change_health(scheduler, victim, |health| health.hurt(damage))
                    });
                    if change.flatten().is_some_and(|c| c.died) {
                        if let Some(player) = shooter_player.and_then(|p| self.players.get_mut(&p)) {
                            player.kills += 1;
                            // A shooter who left has no scoreboard row to update.
                            if player.active {
                                let (player, kills) = (player.id, player.kills);
                                self.emit(GameEvent::KillScored { player, kills });
                            }
                        }
                    }
                    self.remove_entity(entity.id);
                }
                if other_is_wall {
                    if let Some(body) = entity.body {
                        self.collision.set_active(body, false);
                    }
                    self.remove_entity(entity.id);
                }
            }
            EntityKind::Pickup(kind) => {
                if other_is_avatar {
                    self.with_entity(other, |world, avatar| {
                        world.touch_pickup(scheduler, entity, kind, avatar);
                    });
                }
            }
            _ => {}
        }
    }

    /// Render snapshot of the current state. Dead avatars are left out.
    pub fn snapshot(&self, tick: u64, time: f64) -> Snapshot {
        let mut snapshot = Snapshot::new(tick, time);
        for id in self.group(Category::Avatar) {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            if !entity.is_alive() {
                continue;
            }
            let color = entity
                .player()
                .and_then(|p| self.players.get(&p))
                .map(|p| p.color)
                .unwrap_or_default();
            snapshot.avatars.insert(
                *id,
                AvatarRecord {
                    x: entity.position.x,
                    y: entity.position.y,
                    color,
                },
            );
        }
        for id in self.group(Category::Projectile) {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            snapshot.projectiles.insert(
                *id,
                ProjectileRecord {
                    x: entity.position.x,
                    y: entity.position.y,
                    image: entity.image(),
                },
            );
        }
        snapshot
    }

    /// Pending respawn or other entity-owned tasks.
    pub fn schedules_of(&self, id: EntityId) -> &[TaskHandle] {
        self.entities
            .get(&id)
            .map(|e| e.schedules.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::Polygon;

    fn open_world() -> World {
        let tuning = Tuning {
            sample_walls: Vec::new(),
            ..Tuning::default()
        };
        World::new(tuning, Some(7))
    }

    fn place(world: &mut World, id: EntityId, x: f32, y: f32) {
        let entity = world.entity_mut(id).unwrap();
        entity.position = Vec2::new(x, y);
        let body = entity.body.unwrap();
        world.collision.set_position(body, x, y);
    }

    #[test]
    fn test_avatar_starts_with_pistol() {
        let mut world = open_world();
        world.add_player(1, "ann".to_string());
        let avatar = world.avatar_of(1).unwrap();
        assert!(avatar.components.shooter.as_ref().unwrap().has_weapon(WeaponKind::Pistol));

        let events = world.drain_events();
        assert!(matches!(events[0], GameEvent::WeaponEquipped { player: 1, weapon: WeaponKind::Pistol, .. }));
        assert!(matches!(events[1], GameEvent::PlayerJoined { player: 1 }));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut world = open_world();
        let mut scheduler = Scheduler::new();
        let wall: Polygon = vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]];
        let id = world.spawn_wall(&wall);
        assert_eq!(world.group(Category::Wall).len(), 1);
        assert_eq!(world.collision().len(), 1);

        world.remove_entity(id);
        world.remove_entity(id);
        assert_eq!(world.flush_deletions(&mut scheduler), 1);
        assert!(world.group(Category::Wall).is_empty());
        assert!(world.collision().is_empty());
        assert_eq!(world.flush_deletions(&mut scheduler), 0);
    }

    #[test]
    fn test_bullet_kills_and_credits_shooter() {
        let mut world = open_world();
        let mut scheduler = Scheduler::new();
        world.add_player(1, "shooter".to_string());
        world.add_player(2, "victim".to_string());
        let shooter = world.avatar_of(1).unwrap().id;
        let victim = world.avatar_of(2).unwrap().id;
        place(&mut world, shooter, -100.0, 0.0);
        place(&mut world, victim, 100.0, 0.0);
        world.entity_mut(victim).unwrap().components.health.as_mut().unwrap().hurt(90.0);
        world.drain_events();

        // A bullet sitting on the victim.
        let bullet = world.with_entity(shooter, |w, e| {
            let pellet = Pellet { speed: 0.0, damage: 25.0, width: 4.0, spread: 0.0 };
            w.spawn_bullet(e, Vec2::new(1.0, 0.0), &pellet)
        }).unwrap();
        place(&mut world, bullet, 100.0, 0.0);

        world.refresh_collisions();
        world.resolve_collisions(&mut scheduler, Category::Projectile);
        assert_eq!(world.flush_deletions(&mut scheduler), 1);
        assert!(world.entity(bullet).is_none());

        assert!(!world.entity(victim).unwrap().is_alive());
        assert!(!world.collision().is_active(world.entity(victim).unwrap().body.unwrap()));
        assert_eq!(world.player(1).unwrap().kills, 1);
        assert_eq!(world.player(2).unwrap().deaths, 1);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(world.schedules_of(victim).len(), 1);

        let events = world.drain_events();
        assert!(events.contains(&GameEvent::KillScored { player: 1, kills: 1 }));
        assert!(events.iter().any(|e| matches!(e, GameEvent::AvatarDied { player: 2, deaths: 1, .. })));
    }

    #[test]
    fn test_kill_by_departed_shooter_is_not_announced() {
        let mut world = open_world();
        let mut scheduler = Scheduler::new();
        world.add_player(1, "shooter".to_string());
        world.add_player(2, "victim".to_string());
        let shooter = world.avatar_of(1).unwrap().id;
        let victim = world.avatar_of(2).unwrap().id;
        place(&mut world, shooter, -100.0, 0.0);
        place(&mut world, victim, 100.0, 0.0);
        world.entity_mut(victim).unwrap().components.health.as_mut().unwrap().hurt(90.0);

        let bullet = world.with_entity(shooter, |w, e| {
            let pellet = Pellet { speed: 0.0, damage: 25.0, width: 4.0, spread: 0.0 };
            w.spawn_bullet(e, Vec2::new(1.0, 0.0), &pellet)
        }).unwrap();
        place(&mut world, bullet, 100.0, 0.0);

        // The shooter disconnects while the bullet is in flight.
        world.remove_player(&mut scheduler, 1);
        world.flush_deletions(&mut scheduler);
        world.drain_events();

        world.refresh_collisions();
        world.resolve_collisions(&mut scheduler, Category::Projectile);
        world.flush_deletions(&mut scheduler);
        assert!(!world.entity(victim).unwrap().is_alive());
        assert_eq!(world.player(1).unwrap().kills, 1);

        let events = world.drain_events();
        assert!(!events.iter().any(|e| matches!(e, GameEvent::KillScored { .. })));
        assert!(events.iter().any(|e| matches!(e, GameEvent::AvatarDied { player: 2, .. })));
    }

    #[test]
    fn test_bullet_never_hits_its_shooter() {
        let mut world = open_world();
        let mut scheduler = Scheduler::new();
        world.add_player(1, "solo".to_string());
        let avatar = world.avatar_of(1).unwrap().id;
        place(&mut world, avatar, 0.0, 0.0);
        world.set_now(1000.0);
        world.apply_command(1, Command::Fire, true);
        assert_eq!(world.group(Category::Projectile).len(), 1);

        world.refresh_collisions();
        world.resolve_collisions(&mut scheduler, Category::Projectile);
        assert_eq!(world.flush_deletions(&mut scheduler), 0);
        let health = world.entity(avatar).unwrap().components.health.as_ref().unwrap().current();
        assert_eq!(health, 100.0);
    }

    #[test]
    fn test_medkit_only_taken_when_injured() {
        let mut world = open_world();
        let mut scheduler = Scheduler::new();
        world.add_player(1, "ann".to_string());
        let avatar = world.avatar_of(1).unwrap().id;
        place(&mut world, avatar, 0.0, 0.0);
        let medkit = world.spawn_pickup(PickupKind::Medkit, Vec2::ZERO);

        world.refresh_collisions();
        world.resolve_collisions(&mut scheduler, Category::Projectile);
        assert_eq!(world.flush_deletions(&mut scheduler), 0);

        world.entity_mut(avatar).unwrap().components.health.as_mut().unwrap().hurt(50.0);
        world.resolve_collisions(&mut scheduler, Category::Projectile);
        assert_eq!(world.flush_deletions(&mut scheduler), 1);
        assert!(world.entity(medkit).is_none());
        let health = world.entity(avatar).unwrap().components.health.as_ref().unwrap().current();
        assert_eq!(health, 100.0);
    }

    #[test]
    fn test_weapon_pickup_equips_then_refills() {
        let mut world = open_world();
        let mut scheduler = Scheduler::new();
        world.add_player(1, "ann".to_string());
        let avatar = world.avatar_of(1).unwrap().id;
        place(&mut world, avatar, 0.0, 0.0);

        world.spawn_pickup(PickupKind::Shotgun, Vec2::ZERO);
        world.refresh_collisions();
        world.resolve_collisions(&mut scheduler, Category::Projectile);
        assert_eq!(world.flush_deletions(&mut scheduler), 1);
        let shooter = world.entity(avatar).unwrap().components.shooter.as_ref().unwrap();
        assert!(shooter.has_weapon(WeaponKind::Shotgun));

        // Full magazine: a second shotgun stays on the ground.
        world.spawn_pickup(PickupKind::Shotgun, Vec2::ZERO);
        world.refresh_collisions();
        world.resolve_collisions(&mut scheduler, Category::Projectile);
        assert_eq!(world.flush_deletions(&mut scheduler), 0);

        world.set_now(5000.0);
        world.apply_command(1, Command::Fire, true);
        assert_eq!(world.group(Category::Projectile).len(), 1 + 7);
        world.drain_events();

        world.refresh_collisions();
        world.resolve_collisions(&mut scheduler, Category::Projectile);
        world.flush_deletions(&mut scheduler);
        let shooter = world.entity(avatar).unwrap().components.shooter.as_ref().unwrap();
        assert_eq!(shooter.weapon().ammo(), 8);
        assert!(world
            .drain_events()
            .contains(&GameEvent::AmmoChanged { player: 1, status: "Shotgun 8/8".to_string() }));
    }

    #[test]
    fn test_avatar_pushed_out_of_wall() {
        let mut world = open_world();
        let mut scheduler = Scheduler::new();
        world.spawn_wall(&[[0.0, -100.0], [100.0, -100.0], [100.0, 100.0], [0.0, 100.0]]);
        world.add_player(1, "ann".to_string());
        let avatar = world.avatar_of(1).unwrap().id;
        // Radius 24, centre 10 units left of the wall face.
        place(&mut world, avatar, -10.0, 0.0);

        world.refresh_collisions();
        world.resolve_collisions(&mut scheduler, Category::Avatar);
        let position = world.entity(avatar).unwrap().position;
        assert!((position.x - -24.0).abs() < 1e-3, "x = {}", position.x);
        assert!(position.y.abs() < 1e-3);
    }

    #[test]
    fn test_bullet_outside_borders_is_removed() {
        let mut world = open_world();
        let mut scheduler = Scheduler::new();
        world.add_player(1, "ann".to_string());
        let avatar = world.avatar_of(1).unwrap().id;
        place(&mut world, avatar, 955.0, 0.0);
        world.apply_command(1, Command::Fire, true);
        let bullet = world.group(Category::Projectile)[0];
        world.entity_mut(bullet).unwrap().position = Vec2::new(2000.0, 0.0);

        world.post_update_group(Category::Projectile);
        assert_eq!(world.flush_deletions(&mut scheduler), 1);
    }

    #[test]
    fn test_winner_rules() {
        let mut world = open_world();
        assert_eq!(world.winner(), "No one!");
        world.add_player(1, "first".to_string());
        world.add_player(2, "second".to_string());
        assert_eq!(world.winner(), "'first'");

        world.players.get_mut(&2).unwrap().kills = 2;
        world.players.get_mut(&1).unwrap().kills = 2;
        world.players.get_mut(&1).unwrap().deaths = 1;
        assert_eq!(world.winner(), "'second'");
    }

    #[test]
    fn test_remove_player_kills_avatar_and_keeps_record() {
        let mut world = open_world();
        let mut scheduler = Scheduler::new();
        world.add_player(1, "ann".to_string());
        world.remove_player(&mut scheduler, 1);
        assert_eq!(world.flush_deletions(&mut scheduler), 1);

        let player = world.player(1).unwrap();
        assert!(!player.active);
        assert_eq!(player.deaths, 1);
        assert!(world.score_data().is_empty());
        // Respawn task was cancelled with the avatar.
        assert_eq!(scheduler.pending(), 0);

        world.reset_players();
        assert!(world.player(1).is_none());
    }

    #[test]
    fn test_pickup_spawning_respects_cap_and_reschedules() {
        let tuning = Tuning {
            sample_walls: Vec::new(),
            max_pickups: 2,
            ..Tuning::default()
        };
        let mut world = World::new(tuning, Some(3));
        let mut scheduler = Scheduler::new();
        let manager = world.spawn_pickup_manager();

        world.spawn_next_pickup(&mut scheduler, manager);
        world.spawn_next_pickup(&mut scheduler, manager);
        world.spawn_next_pickup(&mut scheduler, manager);
        assert_eq!(world.group(Category::Projectile).len(), 2);
        assert_eq!(scheduler.pending(), 1);

        // The queued spawn finds the map full and does nothing.
        world.set_now(60_000.0);
        scheduler.process(60_000.0, |s, task| world.run_task(s, task));
        assert_eq!(scheduler.pending(), 0);

        // Taking one brings spawning back.
        world.on_pickup_taken(&mut scheduler);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.next_due(), Some(60_000.0 + 3000.0));
    }

    #[test]
    fn test_pickup_spawn_records_spawn_time() {
        let tuning = Tuning {
            sample_walls: Vec::new(),
            max_pickups: 2,
            ..Tuning::default()
        };
        let mut world = World::new(tuning, Some(5));
        let mut scheduler = Scheduler::new();
        let manager = world.spawn_pickup_manager();

        world.set_now(1234.0);
        world.spawn_next_pickup(&mut scheduler, manager);
        let spawner = world.spawner_mut(manager).unwrap();
        assert_eq!(spawner.pickups, 1);
        assert_eq!(spawner.last_spawn, 1234.0);
        assert!(spawner.next_spawn > 1234.0);
        assert!(spawner.next_task.is_some());
    }
}
