//! Message contract between the authoritative server and its clients.
//!
//! Every datagram carries exactly one [`Packet`]. The enum discriminant is the type tag, so
//! messages are self-describing and a [`Packet::Bundle`] may carry any mix of them in any
//! order.

use crate::snapshot::{Color, EntityId, PlayerId, Snapshot};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_NICKNAME_LEN: usize = 16;
/// Receive buffer size for a single datagram.
pub const MAX_PACKET_SIZE: usize = 65_507;

/// Edge-triggered player intents. Each arrives with `start` = pressed / released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Up,
    Down,
    Left,
    Right,
    Sprint,
    Walk,
    Fire,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Up,
        Command::Down,
        Command::Left,
        Command::Right,
        Command::Sprint,
        Command::Walk,
        Command::Fire,
    ];
}

/// One scoreboard line: player id, nickname, kills, deaths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub id: PlayerId,
    pub nick: String,
    pub kills: u32,
    pub deaths: u32,
}

/// Column addressed by [`Packet::ScoreUpdateRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreColumn {
    Kills,
    Deaths,
}

pub type Polygon = Vec<[f32; 2]>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    // Client -> server
    JoinRequest {
        version: u32,
        nickname: String,
    },
    Command {
        command: Command,
        start: bool,
    },
    Ping {
        client_time: f64,
    },
    Leave,

    // Server -> client
    Welcome {
        player_id: PlayerId,
        avatar: Option<EntityId>,
        color: Color,
        round_time_left_ms: f64,
        walls: Vec<Polygon>,
        map_name: String,
    },
    Snapshot(Snapshot),
    Bundle(Vec<Packet>),
    GameRoundStart {
        duration_secs: f64,
    },
    GameRoundEnd {
        next_round_in_secs: f64,
        winner: String,
    },
    ScoreNewRow(ScoreRow),
    ScoreRemoveRow {
        id: PlayerId,
    },
    ScoreUpdateRow {
        id: PlayerId,
        column: ScoreColumn,
        value: u32,
    },
    ScoreFullUpdate {
        rows: Vec<ScoreRow>,
    },
    PlayerInfo {
        health: f32,
    },
    UpdateAmmo {
        status: String,
    },
    PlaySound {
        sound: String,
    },
    Map {
        walls: Vec<Polygon>,
        map_name: String,
    },
    Pong {
        client_time: f64,
        server_time: f64,
    },
    SessionEnd {
        reason: String,
    },
}

impl Packet {
    /// Stable name of the message kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::JoinRequest { .. } => "joinRequest",
            Packet::Command { .. } => "command",
            Packet::Ping { .. } => "ping",
            Packet::Leave => "leave",
            Packet::Welcome { .. } => "welcome",
            Packet::Snapshot(_) => "snapshot",
            Packet::Bundle(_) => "bundle",
            Packet::GameRoundStart { .. } => "gameRoundStart",
            Packet::GameRoundEnd { .. } => "gameRoundEnd",
            Packet::ScoreNewRow(_) => "scoreNewRow",
            Packet::ScoreRemoveRow { .. } => "scoreRemoveRow",
            Packet::ScoreUpdateRow { .. } => "scoreUpdateRow",
            Packet::ScoreFullUpdate { .. } => "scoreFullUpdate",
            Packet::PlayerInfo { .. } => "playerInfo",
            Packet::UpdateAmmo { .. } => "updateAmmo",
            Packet::PlaySound { .. } => "playSound",
            Packet::Map { .. } => "map",
            Packet::Pong { .. } => "pong",
            Packet::SessionEnd { .. } => "sessionEnd",
        }
    }

    /// Wraps several messages into one. A single message is passed through unwrapped, and
    /// nested bundles are flattened so a bundle never contains another bundle.
    pub fn bundle(messages: Vec<Packet>) -> Option<Packet> {
        let mut flat = Vec::with_capacity(messages.len());
        for message in messages {
            match message {
                Packet::Bundle(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Packet::Bundle(flat)),
        }
    }

    /// Iterates the individual messages, unpacking a bundle.
    pub fn into_messages(self) -> Vec<Packet> {
        match self {
            Packet::Bundle(inner) => inner.into_iter().flat_map(Packet::into_messages).collect(),
            other => vec![other],
        }
    }
}

pub fn encode(packet: &Packet) -> bincode::Result<Vec<u8>> {
    bincode::serialize(packet)
}

pub fn decode(bytes: &[u8]) -> bincode::Result<Packet> {
    bincode::deserialize(bytes)
}

/// Nicknames must be 1..=16 printable characters after trimming.
pub fn validate_nickname(nickname: &str) -> Result<String, String> {
    let trimmed = nickname.trim();
    if trimmed.is_empty() {
        return Err("Nickname cannot be empty".to_string());
    }
    if trimmed.chars().count() > MAX_NICKNAME_LEN {
        return Err(format!(
            "Nickname cannot be longer than {} characters",
            MAX_NICKNAME_LEN
        ));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err("Nickname contains invalid characters".to_string());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{AvatarRecord, Image, ProjectileRecord};

    #[test]
    fn test_packet_serialization_join() {
        let packet = Packet::JoinRequest {
            version: PROTOCOL_VERSION,
            nickname: "ferda".to_string(),
        };
        let decoded = decode(&encode(&packet).unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_packet_serialization_snapshot() {
        let mut snapshot = Snapshot::new(42, 1_600_000_000_123.0);
        snapshot.avatars.insert(
            EntityId(1),
            AvatarRecord {
                x: 100.0,
                y: -200.0,
                color: Color::new(10, 20, 30),
            },
        );
        snapshot.projectiles.insert(
            EntityId(2),
            ProjectileRecord {
                x: 5.5,
                y: 6.5,
                image: None,
            },
        );
        snapshot.projectiles.insert(
            EntityId(3),
            ProjectileRecord {
                x: 0.0,
                y: 0.0,
                image: Some(Image::Shotgun),
            },
        );

        let bytes = encode(&Packet::Snapshot(snapshot.clone())).unwrap();
        match decode(&bytes).unwrap() {
            Packet::Snapshot(decoded) => {
                assert_eq!(decoded.tick, 42);
                assert_eq!(decoded.time, 1_600_000_000_123.0);
                assert_eq!(decoded.avatars, snapshot.avatars);
                assert_eq!(decoded.projectiles, snapshot.projectiles);
            }
            other => panic!("Wrong packet type after deserialization: {}", other.kind()),
        }
    }

    #[test]
    fn test_bundle_flattens_and_unwraps() {
        assert!(Packet::bundle(vec![]).is_none());

        let single = Packet::bundle(vec![Packet::Leave]).unwrap();
        assert_eq!(single, Packet::Leave);

        let nested = Packet::bundle(vec![
            Packet::PlayerInfo { health: 10.0 },
            Packet::Bundle(vec![
                Packet::PlaySound {
                    sound: "pistol_shot".to_string(),
                },
                Packet::UpdateAmmo {
                    status: "Pistol".to_string(),
                },
            ]),
        ])
        .unwrap();

        match &nested {
            Packet::Bundle(inner) => {
                assert_eq!(inner.len(), 3);
                assert!(inner.iter().all(|p| !matches!(p, Packet::Bundle(_))));
                assert_eq!(inner[1].kind(), "playSound");
            }
            other => panic!("expected bundle, got {}", other.kind()),
        }

        assert_eq!(nested.into_messages().len(), 3);
    }

    #[test]
    fn test_bundle_roundtrip_keeps_order() {
        let bundle = Packet::Bundle(vec![
            Packet::ScoreRemoveRow { id: 3 },
            Packet::ScoreUpdateRow {
                id: 1,
                column: ScoreColumn::Kills,
                value: 4,
            },
            Packet::GameRoundStart {
                duration_secs: 180.0,
            },
        ]);
        let decoded = decode(&encode(&bundle).unwrap()).unwrap();
        assert_eq!(decoded, bundle);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode(&[0xff, 0xff, 0xff, 0xff, 0x01]).is_err());
    }

    #[test]
    fn test_validate_nickname() {
        assert_eq!(validate_nickname("  neo ").unwrap(), "neo");
        assert!(validate_nickname("   ").is_err());
        assert!(validate_nickname("abcdefghijklmnopq").is_err());
        assert!(validate_nickname("abcdefghijklmnop").is_ok());
        assert!(validate_nickname("bad\nname").is_err());
    }
}
