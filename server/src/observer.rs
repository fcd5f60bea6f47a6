//! Turns simulation events into outbound messages.
//!
//! Messages are not sent straight away: they are queued in an [`Outbox`] and flushed once
//! per tick, so every recipient gets at most one datagram per tick, bundled when more than
//! one message is pending.

use crate::events::GameEvent;
use crate::game::Simulation;
use log::debug;
use shared::{Packet, PlayerId, ScoreColumn};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct Outbox {
    broadcast: Vec<Packet>,
    unicast: BTreeMap<PlayerId, Vec<Packet>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_broadcast(&mut self, packet: Packet) {
        self.broadcast.push(packet);
    }

    pub fn queue_unicast(&mut self, player: PlayerId, packet: Packet) {
        self.unicast.entry(player).or_default().push(packet);
    }

    pub fn is_empty(&self) -> bool {
        self.broadcast.is_empty() && self.unicast.values().all(Vec::is_empty)
    }

    /// Builds one packet per recipient out of everything queued, broadcasts first, and
    /// empties the outbox. Unicasts for players not in `recipients` are dropped.
    pub fn flush(&mut self, recipients: &[PlayerId]) -> Vec<(PlayerId, Packet)> {
        let broadcast = std::mem::take(&mut self.broadcast);
        let mut unicast = std::mem::take(&mut self.unicast);
        recipients
            .iter()
            .filter_map(|id| {
                let mut messages = broadcast.clone();
                messages.extend(unicast.remove(id).unwrap_or_default());
                Packet::bundle(messages).map(|packet| (*id, packet))
            })
            .collect()
    }
}

/// Maps each [`GameEvent`] to the messages the affected clients need.
#[derive(Debug, Clone)]
pub struct GameObserver {
    /// Seconds between a round ending and the next one starting.
    round_linger: f64,
}

impl GameObserver {
    pub fn new(round_linger: f64) -> Self {
        Self { round_linger }
    }

    pub fn observe(&self, sim: &Simulation, event: &GameEvent, outbox: &mut Outbox) {
        match event {
            GameEvent::HealthChanged { player, new, .. } => {
                outbox.queue_unicast(*player, Packet::PlayerInfo { health: *new });
            }
            GameEvent::ShotFired {
                player,
                weapon,
                status,
            } => {
                outbox.queue_broadcast(Packet::PlaySound {
                    sound: weapon.shot_sound(),
                });
                outbox.queue_unicast(*player, Packet::UpdateAmmo { status: status.clone() });
            }
            GameEvent::WeaponEquipped { player, status, .. } | GameEvent::AmmoChanged { player, status } => {
                outbox.queue_unicast(*player, Packet::UpdateAmmo { status: status.clone() });
            }
            GameEvent::AvatarDied { player, deaths, .. } => {
                outbox.queue_broadcast(Packet::ScoreUpdateRow {
                    id: *player,
                    column: ScoreColumn::Deaths,
                    value: *deaths,
                });
            }
            GameEvent::KillScored { player, kills } => {
                outbox.queue_broadcast(Packet::ScoreUpdateRow {
                    id: *player,
                    column: ScoreColumn::Kills,
                    value: *kills,
                });
            }
            GameEvent::RoundStarted { duration_secs } => {
                let map = sim.world().map();
                outbox.queue_broadcast(Packet::GameRoundStart {
                    duration_secs: *duration_secs,
                });
                outbox.queue_broadcast(Packet::ScoreFullUpdate { rows: sim.score_data() });
                outbox.queue_broadcast(Packet::Map {
                    walls: map.walls.clone(),
                    map_name: map.name.clone(),
                });
            }
            GameEvent::RoundEnded { winner } => {
                outbox.queue_broadcast(Packet::GameRoundEnd {
                    next_round_in_secs: self.round_linger,
                    winner: winner.clone(),
                });
            }
            GameEvent::PlayerJoined { player } | GameEvent::PlayerRejoined { player } => {
                if let Some(record) = sim.player(*player) {
                    outbox.queue_broadcast(Packet::ScoreNewRow(record.score_row()));
                }
            }
            GameEvent::PlayerDisconnected { player } => {
                outbox.queue_broadcast(Packet::ScoreRemoveRow { id: *player });
            }
            GameEvent::AvatarRespawned { .. } | GameEvent::PickupTaken { .. } => {
                debug!("{:?}", event);
            }
        }
    }
}
