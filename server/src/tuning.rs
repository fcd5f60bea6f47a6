//! Gameplay constants. Every value can be overridden from a JSON file; keys missing from the
//! file, at any nesting level, keep their defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::protocol::Polygon;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponTuning {
    pub damage: f32,
    /// Minimum time between shots in ms.
    pub fire_rate: f64,
    /// Rounds per full magazine. Zero means infinite.
    pub capacity: u32,
    /// Maximum angular deviation in degrees, either side.
    pub spread: f32,
    pub bullet_width: f32,
    /// Units per ms.
    pub bullet_speed: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotgunTuning {
    #[serde(flatten)]
    pub weapon: WeaponTuning,
    pub pellets_high_spread: u32,
    pub pellets_low_spread: u32,
    pub spread_low: f32,
}

impl Default for ShotgunTuning {
    fn default() -> Self {
        Self {
            weapon: WeaponTuning {
                damage: 20.0,
                fire_rate: 850.0,
                capacity: 8,
                spread: 15.0,
                bullet_width: 9.0,
                bullet_speed: 1.8,
            },
            pellets_high_spread: 4,
            pellets_low_spread: 3,
            spread_low: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Seconds.
    pub round_length: f64,
    /// Seconds between round end and the reset.
    pub round_linger: f64,
    /// Seconds until the next pickup spawns, indexed by the current pickup count.
    pub pickup_spawn_rate: Vec<f64>,
    pub max_pickups: u32,
    pub pickup_radius: f32,
    pub medkit_heal: f32,

    pub player_health: f32,
    pub player_width: f32,
    /// Units per ms.
    pub player_speed: f32,
    pub player_sprint_mult: f32,
    pub player_walk_mult: f32,
    /// Avatars are kept this far inside the map borders.
    pub player_border_padding: f32,
    /// Ms from death to respawn.
    pub respawn_delay: f64,

    pub pistol: WeaponTuning,
    pub smg: WeaponTuning,
    pub shotgun: ShotgunTuning,

    /// Walls of the built-in map used when no map file can be loaded.
    pub sample_walls: Vec<Polygon>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            round_length: 180.0,
            round_linger: 10.0,
            pickup_spawn_rate: vec![3.0, 3.0, 6.0, 12.0, 20.0, 30.0, 60.0],
            max_pickups: 7,
            pickup_radius: 24.0,
            medkit_heal: 80.0,

            player_health: 100.0,
            player_width: 24.0,
            player_speed: 0.25 * 1.5,
            player_sprint_mult: 1.0,
            player_walk_mult: 0.5,
            player_border_padding: 24.0,
            respawn_delay: 3000.0,

            pistol: WeaponTuning {
                damage: 25.0,
                fire_rate: 20.0,
                capacity: 0,
                spread: 1.0,
                bullet_width: 12.0,
                bullet_speed: 1.9,
            },
            smg: WeaponTuning {
                damage: 25.0,
                fire_rate: 75.0,
                capacity: 45,
                spread: 3.0,
                bullet_width: 10.0,
                bullet_speed: 2.15,
            },
            shotgun: ShotgunTuning::default(),

            sample_walls: vec![
                vec![[520.0, 100.0], [640.0, 380.0], [620.0, 390.0], [500.0, 110.0]],
                vec![[-960.0, 0.0], [-760.0, 0.0], [-830.0, 100.0], [-900.0, 160.0], [-960.0, 180.0]],
                vec![[-260.0, -400.0], [340.0, -400.0], [340.0, -360.0], [-260.0, -360.0]],
                vec![[275.0, -250.0], [300.0, -250.0], [300.0, -90.0], [275.0, -90.0]],
                vec![[-60.0, -115.0], [220.0, -115.0], [220.0, -90.0], [-60.0, -90.0]],
                vec![[-260.0, -280.0], [-235.0, -280.0], [-235.0, -160.0], [-260.0, -160.0]],
            ],
        }
    }
}

impl Tuning {
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::from_json(&contents)?)
    }

    /// Parses a possibly partial tuning document, layering it over the defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let overrides: Value = serde_json::from_str(json)?;
        let mut merged = serde_json::to_value(Self::default())?;
        merge(&mut merged, overrides);
        serde_json::from_value(merged)
    }

    /// Delay in ms before the next pickup spawn when `pickups` are already on the map. Counts
    /// past the end of the table reuse its last entry.
    pub fn pickup_spawn_delay(&self, pickups: u32) -> f64 {
        let secs = self
            .pickup_spawn_rate
            .get(pickups as usize)
            .or_else(|| self.pickup_spawn_rate.last())
            .copied()
            .unwrap_or(60.0);
        secs * 1000.0
    }
}

fn merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pickup_spawn_delay_table() {
        let tuning = Tuning::default();
        assert_eq!(tuning.pickup_spawn_delay(0), 3000.0);
        assert_eq!(tuning.pickup_spawn_delay(2), 6000.0);
        assert_eq!(tuning.pickup_spawn_delay(6), 60_000.0);
        assert_eq!(tuning.pickup_spawn_delay(50), 60_000.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"round_length": 60, "smg": {"capacity": 10}, "shotgun": {"damage": 5, "spread_low": 1}}"#;
        let tuning = Tuning::from_json(json).unwrap();
        assert_eq!(tuning.round_length, 60.0);
        assert_eq!(tuning.round_linger, 10.0);
        assert_eq!(tuning.smg.capacity, 10);
        assert_eq!(tuning.smg.fire_rate, 75.0);
        assert_eq!(tuning.shotgun.weapon.damage, 5.0);
        assert_eq!(tuning.shotgun.weapon.fire_rate, 850.0);
        assert_eq!(tuning.shotgun.spread_low, 1.0);
        assert_eq!(tuning.shotgun.pellets_high_spread, 4);
    }

    #[test]
    fn test_arrays_are_replaced_not_merged() {
        let tuning = Tuning::from_json(r#"{"pickup_spawn_rate": [1]}"#).unwrap();
        assert_eq!(tuning.pickup_spawn_rate, vec![1.0]);
        assert_eq!(tuning.pickup_spawn_delay(3), 1000.0);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(Tuning::from_json("{not json").is_err());
        assert!(Tuning::from_json(r#"{"max_pickups": "many"}"#).is_err());
    }

    #[test]
    fn test_default_roundtrip() {
        let tuning = Tuning::default();
        let json = serde_json::to_string(&tuning).unwrap();
        let parsed: Tuning = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tuning);
    }
}
