//! Render snapshots: the compact, immutable per-tick capture of world state that the
//! server broadcasts and clients reconstruct motion from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a simulated entity.
///
/// Ids are handed out from a process-wide counter, so they increase monotonically and are
/// never reused while the process lives, even across rounds or separate simulations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn next() -> Self {
        EntityId(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a connected player. Assigned by the transport layer on join.
pub type PlayerId = u32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Sprite hint for projectile-category entities that are not plain bullets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Image {
    Medkit,
    Smg,
    Shotgun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarRecord {
    pub x: f32,
    pub y: f32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileRecord {
    pub x: f32,
    pub y: f32,
    pub image: Option<Image>,
}

/// One timestamped capture of positional world state.
///
/// Produced exactly once per simulation tick and never mutated afterwards; buffers share
/// snapshots behind an `Arc` so a reader on another task can never observe a partial write.
/// `time` is simulation time in milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub time: f64,
    pub avatars: BTreeMap<EntityId, AvatarRecord>,
    pub projectiles: BTreeMap<EntityId, ProjectileRecord>,
}

impl Snapshot {
    pub fn new(tick: u64, time: f64) -> Self {
        Self {
            tick,
            time,
            avatars: BTreeMap::new(),
            projectiles: BTreeMap::new(),
        }
    }

    /// A snapshot with every category present but empty.
    pub fn empty() -> Self {
        Self::new(0, 0.0)
    }

    pub fn entity_count(&self) -> usize {
        self.avatars.len() + self.projectiles.len()
    }

    pub fn avatar_x(&self, id: EntityId) -> Option<f32> {
        self.avatars.get(&id).map(|a| a.x)
    }

    pub fn avatar_y(&self, id: EntityId) -> Option<f32> {
        self.avatars.get(&id).map(|a| a.y)
    }

    pub fn projectile_x(&self, id: EntityId) -> Option<f32> {
        self.projectiles.get(&id).map(|p| p.x)
    }

    pub fn projectile_y(&self, id: EntityId) -> Option<f32> {
        self.projectiles.get(&id).map(|p| p.y)
    }
}
