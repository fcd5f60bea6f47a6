//! Client-side view of the match: everything the server told us besides positions.

use crate::clock::ServerClock;
use log::{debug, info, warn};
use shared::{
    Color, EntityId, Packet, PlayerId, Polygon, ScoreColumn, ScoreRow, Snapshot, SnapshotHistory,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Connecting,
    Playing,
    /// The round is over; the next starts at `next_round_at` (local ms).
    RoundOver { winner: String, next_round_at: f64 },
    Ended { reason: String },
}

pub struct Session {
    pub state: SessionState,
    pub player_id: Option<PlayerId>,
    pub avatar: Option<EntityId>,
    pub color: Option<Color>,
    pub health: f32,
    pub ammo: String,
    pub scores: BTreeMap<PlayerId, ScoreRow>,
    pub map_name: String,
    pub walls: Vec<Polygon>,
    /// Local ms at which the current round ends.
    pub round_ends_at: f64,
    pub last_sound: Option<String>,
    pub history: SnapshotHistory,
    pub clock: ServerClock,
}

impl Session {
    pub fn new(history: SnapshotHistory) -> Self {
        Self {
            state: SessionState::Connecting,
            player_id: None,
            avatar: None,
            color: None,
            health: 100.0,
            ammo: String::new(),
            scores: BTreeMap::new(),
            map_name: String::new(),
            walls: Vec::new(),
            round_ends_at: 0.0,
            last_sound: None,
            history,
            clock: ServerClock::default(),
        }
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self.state, SessionState::Connecting | SessionState::Ended { .. })
    }

    /// Applies one packet received at local time `now`. Bundles are unpacked in order.
    pub fn handle(&mut self, packet: Packet, now: f64) {
        match packet {
            Packet::Bundle(messages) => {
                for message in messages {
                    self.handle(message, now);
                }
            }
            Packet::Snapshot(snapshot) => self.stash(snapshot),
            Packet::Pong {
                client_time,
                server_time,
            } => {
                self.clock.on_pong(client_time, server_time, now);
                debug!(
                    "Latency {:.1}ms, offset {:.1}ms",
                    self.clock.latency(),
                    self.clock.offset()
                );
            }
            Packet::Welcome {
                player_id,
                avatar,
                color,
                round_time_left_ms,
                walls,
                map_name,
            } => {
                info!("Joined as player {} on '{}'", player_id, map_name);
                self.player_id = Some(player_id);
                self.avatar = avatar;
                self.color = Some(color);
                self.round_ends_at = now + round_time_left_ms;
                self.walls = walls;
                self.map_name = map_name;
                self.state = SessionState::Playing;
            }
            Packet::GameRoundStart { duration_secs } => {
                info!("Round started, {}s", duration_secs);
                self.history.clear();
                self.scores.clear();
                self.round_ends_at = now + duration_secs * 1000.0;
                self.state = SessionState::Playing;
            }
            Packet::GameRoundEnd {
                next_round_in_secs,
                winner,
            } => {
                info!("Round over, winner: {}", winner);
                self.state = SessionState::RoundOver {
                    winner,
                    next_round_at: now + next_round_in_secs * 1000.0,
                };
            }
            Packet::ScoreNewRow(row) => {
                self.scores.insert(row.id, row);
            }
            Packet::ScoreRemoveRow { id } => {
                self.scores.remove(&id);
            }
            Packet::ScoreUpdateRow { id, column, value } => match self.scores.get_mut(&id) {
                Some(row) => match column {
                    ScoreColumn::Kills => row.kills = value,
                    ScoreColumn::Deaths => row.deaths = value,
                },
                None => warn!("Score update for unknown player {}", id),
            },
            Packet::ScoreFullUpdate { rows } => {
                for row in rows {
                    self.scores.insert(row.id, row);
                }
            }
            Packet::PlayerInfo { health } => self.health = health,
            Packet::UpdateAmmo { status } => self.ammo = status,
            Packet::PlaySound { sound } => self.last_sound = Some(sound),
            Packet::Map { walls, map_name } => {
                self.walls = walls;
                self.map_name = map_name;
            }
            Packet::SessionEnd { reason } => {
                warn!("Session ended: {}", reason);
                self.player_id = None;
                self.state = SessionState::Ended { reason };
            }
            other => warn!("Unexpected {} from server", other.kind()),
        }
    }

    fn stash(&mut self, snapshot: Snapshot) {
        let tick = snapshot.tick;
        if !self.history.stash(snapshot) {
            debug!("Dropped expired snapshot {}", tick);
        }
    }

    /// Scoreboard sorted by kills, then fewer deaths.
    pub fn scoreboard(&self) -> Vec<&ScoreRow> {
        let mut rows: Vec<&ScoreRow> = self.scores.values().collect();
        rows.sort_by(|a, b| b.kills.cmp(&a.kills).then(a.deaths.cmp(&b.deaths)));
        rows
    }

    /// Seconds left in the round at local time `now`.
    pub fn round_time_left(&self, now: f64) -> f64 {
        ((self.round_ends_at - now) / 1000.0).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: PlayerId, nick: &str) -> ScoreRow {
        ScoreRow {
            id,
            nick: nick.to_string(),
            kills: 0,
            deaths: 0,
        }
    }

    fn session() -> Session {
        Session::new(SnapshotHistory::new(Some(10), None))
    }

    #[test]
    fn test_welcome_starts_playing() {
        let mut session = session();
        assert!(!session.is_connected());
        session.handle(
            Packet::Welcome {
                player_id: 4,
                avatar: Some(EntityId(9)),
                color: Color::new(0, 0, 255),
                round_time_left_ms: 30_000.0,
                walls: vec![vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]],
                map_name: "shack".to_string(),
            },
            1000.0,
        );
        assert!(session.is_connected());
        assert_eq!(session.player_id, Some(4));
        assert_eq!(session.map_name, "shack");
        assert_eq!(session.round_time_left(1000.0), 30.0);
    }

    #[test]
    fn test_bundle_is_applied_in_order() {
        let mut session = session();
        let bundle = Packet::Bundle(vec![
            Packet::ScoreFullUpdate {
                rows: vec![row(1, "ann"), row(2, "bob")],
            },
            Packet::ScoreUpdateRow {
                id: 2,
                column: ScoreColumn::Kills,
                value: 3,
            },
            Packet::ScoreRemoveRow { id: 1 },
            Packet::Snapshot(Snapshot::new(7, 140.0)),
            Packet::PlayerInfo { health: 75.0 },
            Packet::UpdateAmmo {
                status: "SMG1 44/45".to_string(),
            },
        ]);
        session.handle(bundle, 0.0);

        assert_eq!(session.scores.len(), 1);
        assert_eq!(session.scoreboard()[0].kills, 3);
        assert_eq!(session.history.head().map(|s| s.tick), Some(7));
        assert_eq!(session.health, 75.0);
        assert_eq!(session.ammo, "SMG1 44/45");
    }

    #[test]
    fn test_round_end_and_restart() {
        let mut session = session();
        session.handle(Packet::Snapshot(Snapshot::new(1, 20.0)), 0.0);
        session.handle(
            Packet::GameRoundEnd {
                next_round_in_secs: 10.0,
                winner: "'ann'".to_string(),
            },
            500.0,
        );
        assert_eq!(
            session.state,
            SessionState::RoundOver {
                winner: "'ann'".to_string(),
                next_round_at: 10_500.0
            }
        );

        session.handle(Packet::GameRoundStart { duration_secs: 60.0 }, 11_000.0);
        assert_eq!(session.state, SessionState::Playing);
        assert!(session.history.is_empty());
    }

    #[test]
    fn test_session_end() {
        let mut session = session();
        session.handle(
            Packet::SessionEnd {
                reason: "Nickname is already taken!".to_string(),
            },
            0.0,
        );
        assert!(matches!(session.state, SessionState::Ended { .. }));
        assert!(!session.is_connected());
    }
}
