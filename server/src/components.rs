//! Behaviour attached to entities.
//!
//! The set of component kinds is closed, so an entity carries them as a struct of optional
//! fields rather than a keyed map. Each component only mutates its own state and its
//! owner's position; anything that reaches other entities is returned to the world as a
//! value (a [`HealthChange`], a [`Volley`]) and acted on there.

use crate::tuning::Tuning;
use crate::weapons::{Volley, Weapon, WeaponKind};
use rand::Rng;
use shared::math::Vec2;

/// Diagonal input is scaled by this so that moving diagonally is not faster.
const DIAGONAL_SCALE: f32 = 0.707;

/// Eight-directional player-driven movement.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleMovement {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub sprinting: bool,
    pub walking: bool,
    speed: f32,
    sprint_mult: f32,
    walk_mult: f32,
    direction: Vec2,
    velocity: Vec2,
}

impl SimpleMovement {
    pub fn new(speed: f32, sprint_mult: f32, walk_mult: f32) -> Self {
        Self {
            up: false,
            down: false,
            left: false,
            right: false,
            sprinting: false,
            walking: false,
            speed,
            sprint_mult,
            walk_mult,
            direction: Vec2::ZERO,
            velocity: Vec2::ZERO,
        }
    }

    fn refresh_direction(&mut self) {
        let x = self.right as i32 as f32 - self.left as i32 as f32;
        let y = self.down as i32 as f32 - self.up as i32 as f32;
        self.direction = if x != 0.0 && y != 0.0 {
            Vec2::new(x * DIAGONAL_SCALE, y * DIAGONAL_SCALE)
        } else {
            Vec2::new(x, y)
        };
    }

    /// Sprint takes precedence over walk.
    pub fn multiplier(&self) -> f32 {
        if self.sprinting {
            self.sprint_mult
        } else if self.walking {
            self.walk_mult
        } else {
            1.0
        }
    }

    /// Advances the owner's position by `delta` ms.
    pub fn update(&mut self, position: &mut Vec2, delta: f32) {
        self.refresh_direction();
        self.velocity = self.direction * (self.multiplier() * self.speed);
        *position += self.velocity * delta;
    }

    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }
}

/// Fire-and-forget straight-line motion.
#[derive(Debug, Clone, PartialEq)]
pub struct Locomotion {
    speed: f32,
    direction: Vec2,
}

impl Locomotion {
    /// `spread` is the maximum deviation in degrees; the actual deviation is drawn uniformly
    /// from `[-spread, spread]` once, at construction.
    pub fn new<R: Rng + ?Sized>(speed: f32, direction: Vec2, spread: f32, rng: &mut R) -> Self {
        let direction = if spread > 0.0 {
            let deviation = (rng.gen::<f32>() * spread * 2.0 - spread).to_radians();
            Vec2::from_angle(direction.to_angle() + deviation)
        } else {
            direction
        };
        Self { speed, direction }
    }

    pub fn update(&mut self, position: &mut Vec2, delta: f32) {
        *position += self.direction * (self.speed * delta);
    }

    pub fn direction(&self) -> Vec2 {
        self.direction
    }
}

/// Result of a health mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthChange {
    pub old: f32,
    pub new: f32,
    /// This change took the owner from alive to dead.
    pub died: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Health {
    max: f32,
    current: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { max, current: max }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Applies `amount` and clamps into `[0, max]`.
    pub fn delta(&mut self, amount: f32) -> HealthChange {
        let old = self.current;
        self.current = (self.current + amount).clamp(0.0, self.max);
        HealthChange {
            old,
            new: self.current,
            died: old > 0.0 && self.current <= 0.0,
        }
    }

    pub fn hurt(&mut self, amount: f32) -> HealthChange {
        self.delta(-amount.abs())
    }

    pub fn heal(&mut self, amount: f32) -> HealthChange {
        self.delta(amount.abs())
    }

    pub fn restore(&mut self) -> HealthChange {
        self.delta(self.max - self.current)
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn is_injured(&self) -> bool {
        self.current < self.max
    }
}

/// Aims along the last non-zero movement direction and owns exactly one weapon.
#[derive(Debug, Clone, PartialEq)]
pub struct Shooter {
    aim: Vec2,
    weapon: Weapon,
}

impl Default for Shooter {
    fn default() -> Self {
        Self::new()
    }
}

impl Shooter {
    pub fn new() -> Self {
        Self {
            aim: Vec2::new(1.0, 0.0),
            weapon: Weapon::pistol(),
        }
    }

    pub fn aim(&self) -> Vec2 {
        self.aim
    }

    pub fn weapon(&self) -> &Weapon {
        &self.weapon
    }

    pub fn weapon_mut(&mut self) -> &mut Weapon {
        &mut self.weapon
    }

    pub fn has_weapon(&self, kind: WeaponKind) -> bool {
        self.weapon.kind() == kind
    }

    /// Replaces the weapon, returning the previous one.
    pub fn equip(&mut self, weapon: Weapon) -> Weapon {
        std::mem::replace(&mut self.weapon, weapon)
    }

    /// Tracks aim from movement and lets automatic weapons fire.
    pub fn update(&mut self, movement: Option<&SimpleMovement>, now: f64, tuning: &Tuning) -> Option<Volley> {
        if let Some(direction) = movement.map(SimpleMovement::direction) {
            if direction != Vec2::ZERO {
                self.aim = direction;
            }
        }
        self.weapon.think(now, tuning)
    }

    pub fn shoot_start(&mut self, now: f64, tuning: &Tuning) -> Option<Volley> {
        self.weapon.pull_trigger(now, tuning)
    }

    pub fn shoot_end(&mut self) {
        self.weapon.release_trigger();
    }
}

/// Fixed schema of components an entity may carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Components {
    pub movement: Option<SimpleMovement>,
    pub locomotion: Option<Locomotion>,
    pub health: Option<Health>,
    pub shooter: Option<Shooter>,
}

impl Components {
    pub fn is_alive(&self) -> bool {
        self.health.as_ref().map_or(true, Health::is_alive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_movement_straight_and_diagonal() {
        let mut movement = SimpleMovement::new(0.5, 2.0, 0.5);
        let mut pos = Vec2::ZERO;

        movement.right = true;
        movement.update(&mut pos, 20.0);
        assert_approx_eq!(pos.x, 10.0);
        assert_approx_eq!(pos.y, 0.0);

        movement.down = true;
        movement.update(&mut pos, 20.0);
        assert_approx_eq!(pos.x, 10.0 + 10.0 * 0.707);
        assert_approx_eq!(pos.y, 10.0 * 0.707);
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let mut movement = SimpleMovement::new(1.0, 1.0, 1.0);
        let mut pos = Vec2::ZERO;
        movement.left = true;
        movement.right = true;
        movement.update(&mut pos, 100.0);
        assert_eq!(pos, Vec2::ZERO);
        assert_eq!(movement.direction(), Vec2::ZERO);
    }

    #[test]
    fn test_sprint_beats_walk() {
        let mut movement = SimpleMovement::new(1.0, 2.0, 0.5);
        movement.walking = true;
        assert_eq!(movement.multiplier(), 0.5);
        movement.sprinting = true;
        assert_eq!(movement.multiplier(), 2.0);
        movement.walking = false;
        movement.sprinting = false;
        assert_eq!(movement.multiplier(), 1.0);
    }

    #[test]
    fn test_locomotion_without_spread() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut locomotion = Locomotion::new(2.0, Vec2::new(0.0, -1.0), 0.0, &mut rng);
        let mut pos = Vec2::new(5.0, 5.0);
        locomotion.update(&mut pos, 10.0);
        assert_approx_eq!(pos.x, 5.0);
        assert_approx_eq!(pos.y, -15.0);
    }

    #[test]
    fn test_locomotion_spread_stays_within_cone() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let locomotion = Locomotion::new(1.0, Vec2::new(1.0, 0.0), 15.0, &mut rng);
            let angle = locomotion.direction().to_angle().to_degrees();
            assert!(angle.abs() <= 15.0 + 1e-3, "angle {}", angle);
            assert_approx_eq!(locomotion.direction().length(), 1.0);
        }
    }

    #[test]
    fn test_health_clamps_and_reports_death_once() {
        let mut health = Health::new(100.0);
        assert!(!health.is_injured());

        let change = health.hurt(30.0);
        assert_eq!(change.old, 100.0);
        assert_eq!(change.new, 70.0);
        assert!(!change.died);
        assert!(health.is_injured());

        let change = health.heal(500.0);
        assert_eq!(change.new, 100.0);

        let change = health.hurt(250.0);
        assert_eq!(change.new, 0.0);
        assert!(change.died);
        assert!(!health.is_alive());

        // Already dead: no second death.
        assert!(!health.hurt(10.0).died);

        let change = health.restore();
        assert_eq!(change.new, 100.0);
        assert!(health.is_alive());
    }

    #[test]
    fn test_hurt_and_heal_ignore_sign() {
        let mut health = Health::new(100.0);
        health.hurt(-20.0);
        assert_eq!(health.current(), 80.0);
        health.heal(-10.0);
        assert_eq!(health.current(), 90.0);
    }

    #[test]
    fn test_shooter_keeps_last_aim() {
        let tuning = Tuning::default();
        let mut shooter = Shooter::new();
        let mut movement = SimpleMovement::new(1.0, 1.0, 1.0);
        let mut pos = Vec2::ZERO;

        movement.up = true;
        movement.update(&mut pos, 1.0);
        shooter.update(Some(&movement), 0.0, &tuning);
        assert_eq!(shooter.aim(), Vec2::new(0.0, -1.0));

        movement.up = false;
        movement.update(&mut pos, 1.0);
        shooter.update(Some(&movement), 0.0, &tuning);
        assert_eq!(shooter.aim(), Vec2::new(0.0, -1.0));
    }

    #[test]
    fn test_shooter_equip_returns_previous() {
        let tuning = Tuning::default();
        let mut shooter = Shooter::new();
        assert!(shooter.has_weapon(WeaponKind::Pistol));
        let old = shooter.equip(Weapon::new(WeaponKind::Smg, &tuning));
        assert_eq!(old.kind(), WeaponKind::Pistol);
        assert!(shooter.has_weapon(WeaponKind::Smg));
    }
}
