//! Types shared by the arena server and its clients: entity identities, render snapshots, the
//! snapshot history buffer, the wire protocol and a handful of math and clock helpers.

pub mod history;
pub mod math;
pub mod protocol;
pub mod snapshot;
pub mod time;

pub use history::{Bounds, SnapshotHistory};
pub use math::{clamp, extrapolate, lerp, Vec2};
pub use protocol::{
    decode, encode, validate_nickname, Command, Packet, Polygon, ScoreColumn, ScoreRow,
    MAX_NICKNAME_LEN, MAX_PACKET_SIZE, PROTOCOL_VERSION,
};
pub use snapshot::{AvatarRecord, Color, EntityId, Image, PlayerId, ProjectileRecord, Snapshot};
pub use time::unix_millis;

/// Fixed simulation interval in milliseconds (50 Hz).
pub const TICK_INTERVAL_MS: f64 = 20.0;
