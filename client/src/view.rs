//! Composes one frame from whatever the active render strategy can resolve.
//!
//! Drawing itself is left to the caller; a [`Frame`] is the list of sprites with resolved
//! positions.

use crate::strategy::RenderStrategy;
use shared::{Color, EntityId, Image, Snapshot, SnapshotHistory};

#[derive(Debug, Clone, PartialEq)]
pub enum SpriteKind {
    Avatar { color: Color },
    Projectile { image: Option<Image> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub kind: SpriteKind,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub tick: u64,
    pub sprites: Vec<Sprite>,
}

impl Frame {
    pub fn avatars(&self) -> impl Iterator<Item = &Sprite> {
        self.sprites
            .iter()
            .filter(|s| matches!(s.kind, SpriteKind::Avatar { .. }))
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &Sprite> {
        self.sprites
            .iter()
            .filter(|s| matches!(s.kind, SpriteKind::Projectile { .. }))
    }
}

/// Prepares `strategy` for `server_now` and resolves every drawable entity of its primary
/// snapshot. `None` means there is nothing new to draw.
pub fn compose(
    strategy: &mut dyn RenderStrategy,
    history: &SnapshotHistory,
    server_now: f64,
) -> Option<Frame> {
    strategy.prepare(history, server_now);
    let primary = strategy.primary_snapshot()?;
    let mut frame = Frame {
        tick: primary.tick,
        sprites: Vec::with_capacity(primary.entity_count()),
    };

    for (id, avatar) in &primary.avatars {
        let id = *id;
        if !strategy.should_draw(&|s: &Snapshot| s.avatars.contains_key(&id)) {
            continue;
        }
        frame.sprites.push(Sprite {
            id,
            x: strategy.field(&|s: &Snapshot| s.avatar_x(id)),
            y: strategy.field(&|s: &Snapshot| s.avatar_y(id)),
            kind: SpriteKind::Avatar {
                color: avatar.color,
            },
        });
    }

    for (id, projectile) in &primary.projectiles {
        let id = *id;
        if !strategy.should_draw(&|s: &Snapshot| s.projectiles.contains_key(&id)) {
            continue;
        }
        frame.sprites.push(Sprite {
            id,
            x: strategy.field(&|s: &Snapshot| s.projectile_x(id)),
            y: strategy.field(&|s: &Snapshot| s.projectile_y(id)),
            kind: SpriteKind::Projectile {
                image: projectile.image,
            },
        });
    }

    Some(frame)
}
