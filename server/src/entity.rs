use crate::collision::BodyHandle;
use crate::components::Components;
use crate::scheduler::TaskHandle;
use crate::weapons::WeaponKind;
use shared::math::Vec2;
use shared::{EntityId, Image, PlayerId};
use std::collections::HashSet;

/// Group an entity is filed under. Only avatars and projectiles are stepped each tick;
/// walls never move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Avatar,
    Wall,
    Projectile,
    /// Entities that only act when a scheduled task tells them to.
    Special,
}

impl Category {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Labels other entities react to in collision callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Avatar,
    Wall,
    Projectile,
    Pickup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickupKind {
    Medkit,
    Smg,
    Shotgun,
}

impl PickupKind {
    pub fn image(self) -> Image {
        match self {
            PickupKind::Medkit => Image::Medkit,
            PickupKind::Smg => Image::Smg,
            PickupKind::Shotgun => Image::Shotgun,
        }
    }

    /// The weapon handed out, if any.
    pub fn weapon(self) -> Option<WeaponKind> {
        match self {
            PickupKind::Medkit => None,
            PickupKind::Smg => Some(WeaponKind::Smg),
            PickupKind::Shotgun => Some(WeaponKind::Shotgun),
        }
    }

    /// Roughly one third each.
    pub fn from_roll(roll: f32) -> Self {
        if roll < 0.33 {
            PickupKind::Smg
        } else if roll < 0.66 {
            PickupKind::Shotgun
        } else {
            PickupKind::Medkit
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PickupSpawner {
    /// Pickups currently lying on the map.
    pub pickups: u32,
    pub last_spawn: f64,
    pub next_spawn: f64,
    pub next_task: Option<TaskHandle>,
}

/// What an entity is. Drives its update, collision and cleanup behaviour.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Avatar {
        player: PlayerId,
    },
    Wall,
    Bullet {
        shooter: EntityId,
        shooter_player: Option<PlayerId>,
        damage: f32,
    },
    Pickup(PickupKind),
    PickupManager(PickupSpawner),
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub position: Vec2,
    pub kind: EntityKind,
    pub components: Components,
    pub tags: HashSet<Tag>,
    pub body: Option<BodyHandle>,
    /// Pending tasks owned by this entity, disabled when it respawns or is removed.
    pub schedules: Vec<TaskHandle>,
}

impl Entity {
    pub fn new(kind: EntityKind, position: Vec2) -> Self {
        let tags = match &kind {
            EntityKind::Avatar { .. } => HashSet::from([Tag::Avatar]),
            EntityKind::Wall => HashSet::from([Tag::Wall]),
            EntityKind::Bullet { .. } => HashSet::from([Tag::Projectile]),
            EntityKind::Pickup(_) => HashSet::from([Tag::Pickup]),
            EntityKind::PickupManager(_) => HashSet::new(),
        };
        Self {
            id: EntityId::next(),
            position,
            kind,
            components: Components::default(),
            tags,
            body: None,
            schedules: Vec::new(),
        }
    }

    pub fn category(&self) -> Category {
        match self.kind {
            EntityKind::Avatar { .. } => Category::Avatar,
            EntityKind::Wall => Category::Wall,
            EntityKind::Bullet { .. } | EntityKind::Pickup(_) => Category::Projectile,
            EntityKind::PickupManager(_) => Category::Special,
        }
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn image(&self) -> Option<Image> {
        match self.kind {
            EntityKind::Pickup(kind) => Some(kind.image()),
            _ => None,
        }
    }

    pub fn player(&self) -> Option<PlayerId> {
        match self.kind {
            EntityKind::Avatar { player } => Some(player),
            _ => None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.components.is_alive()
    }
}
