//! Things that happened inside a step. The world queues them in order; whoever drives the
//! simulation drains them afterwards and decides who needs to hear about it.

use crate::entity::PickupKind;
use crate::weapons::WeaponKind;
use shared::{EntityId, PlayerId};

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    HealthChanged {
        player: PlayerId,
        avatar: EntityId,
        old: f32,
        new: f32,
    },
    ShotFired {
        player: PlayerId,
        weapon: WeaponKind,
        /// HUD ammo line after the shot.
        status: String,
    },
    WeaponEquipped {
        player: PlayerId,
        weapon: WeaponKind,
        status: String,
    },
    AmmoChanged {
        player: PlayerId,
        status: String,
    },
    AvatarDied {
        player: PlayerId,
        avatar: EntityId,
        deaths: u32,
    },
    AvatarRespawned {
        player: PlayerId,
        avatar: EntityId,
    },
    KillScored {
        player: PlayerId,
        kills: u32,
    },
    PickupTaken {
        taker: EntityId,
        pickup: EntityId,
        kind: PickupKind,
    },
    RoundStarted {
        duration_secs: f64,
    },
    RoundEnded {
        winner: String,
    },
    PlayerJoined {
        player: PlayerId,
    },
    PlayerRejoined {
        player: PlayerId,
    },
    PlayerDisconnected {
        player: PlayerId,
    },
}
