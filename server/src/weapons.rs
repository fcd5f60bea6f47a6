//! Weapons owned by a shooter component.
//!
//! A weapon never touches the world itself. Trigger handling returns a [`Volley`] describing
//! the pellets to spawn; the world turns it into bullet entities, fires the matching events
//! and swaps a depleted weapon back to the pistol.

use crate::tuning::{Tuning, WeaponTuning};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    Pistol,
    Smg,
    Shotgun,
}

impl WeaponKind {
    pub fn code(self) -> &'static str {
        match self {
            WeaponKind::Pistol => "pistol",
            WeaponKind::Smg => "smg1",
            WeaponKind::Shotgun => "shotgun",
        }
    }

    /// Name of the sound clients play when this weapon fires.
    pub fn shot_sound(self) -> String {
        format!("{}_shot", self.code())
    }

    /// Full magazine size; `None` for infinite ammunition.
    pub fn capacity(self, tuning: &Tuning) -> Option<u32> {
        match self {
            WeaponKind::Pistol => None,
            WeaponKind::Smg => Some(tuning.smg.capacity),
            WeaponKind::Shotgun => Some(tuning.shotgun.weapon.capacity),
        }
    }
}

/// Ballistics of one projectile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pellet {
    pub speed: f32,
    pub damage: f32,
    pub width: f32,
    /// Degrees either side of the aim direction.
    pub spread: f32,
}

impl Pellet {
    fn from_tuning(weapon: &WeaponTuning, spread: f32) -> Self {
        Self {
            speed: weapon.bullet_speed,
            damage: weapon.damage,
            width: weapon.bullet_width,
            spread,
        }
    }
}

/// One trigger pull worth of projectiles.
#[derive(Debug, Clone, PartialEq)]
pub struct Volley {
    pub weapon: WeaponKind,
    pub pellets: Vec<Pellet>,
    /// The magazine is empty after this volley.
    pub depleted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Weapon {
    kind: WeaponKind,
    ammo: u32,
    last_attack: f64,
    trigger_held: bool,
}

impl Weapon {
    pub fn new(kind: WeaponKind, tuning: &Tuning) -> Self {
        Self {
            kind,
            ammo: kind.capacity(tuning).unwrap_or(0),
            last_attack: f64::NEG_INFINITY,
            trigger_held: false,
        }
    }

    pub fn pistol() -> Self {
        Self {
            kind: WeaponKind::Pistol,
            ammo: 0,
            last_attack: f64::NEG_INFINITY,
            trigger_held: false,
        }
    }

    pub fn kind(&self) -> WeaponKind {
        self.kind
    }

    pub fn ammo(&self) -> u32 {
        self.ammo
    }

    pub fn is_full(&self, tuning: &Tuning) -> bool {
        self.kind.capacity(tuning).map_or(true, |cap| self.ammo >= cap)
    }

    pub fn refill(&mut self, tuning: &Tuning) {
        if let Some(cap) = self.kind.capacity(tuning) {
            self.ammo = cap;
        }
    }

    /// Line shown in the client HUD.
    pub fn status(&self, tuning: &Tuning) -> String {
        match self.kind {
            WeaponKind::Pistol => "Pistol \u{221e}/\u{221e}".to_string(),
            WeaponKind::Smg => format!("SMG1 {}/{}", self.ammo, tuning.smg.capacity),
            WeaponKind::Shotgun => {
                format!("Shotgun {}/{}", self.ammo, tuning.shotgun.weapon.capacity)
            }
        }
    }

    fn fire_rate(&self, tuning: &Tuning) -> f64 {
        match self.kind {
            WeaponKind::Pistol => 0.0,
            WeaponKind::Smg => tuning.smg.fire_rate,
            WeaponKind::Shotgun => tuning.shotgun.weapon.fire_rate,
        }
    }

    pub fn can_shoot(&self, now: f64, tuning: &Tuning) -> bool {
        match self.kind {
            WeaponKind::Pistol => true,
            _ => self.last_attack + self.fire_rate(tuning) <= now && self.ammo > 0,
        }
    }

    /// Semi-automatic weapons fire here; the SMG only starts holding the trigger.
    pub fn pull_trigger(&mut self, now: f64, tuning: &Tuning) -> Option<Volley> {
        match self.kind {
            WeaponKind::Pistol => Some(self.volley(tuning)),
            WeaponKind::Smg => {
                self.trigger_held = true;
                None
            }
            WeaponKind::Shotgun => self.fire_limited(now, tuning),
        }
    }

    pub fn release_trigger(&mut self) {
        self.trigger_held = false;
    }

    pub fn is_trigger_held(&self) -> bool {
        self.trigger_held
    }

    /// Per-tick hook; automatic weapons fire while the trigger is held.
    pub fn think(&mut self, now: f64, tuning: &Tuning) -> Option<Volley> {
        match self.kind {
            WeaponKind::Smg if self.trigger_held => self.fire_limited(now, tuning),
            _ => None,
        }
    }

    fn fire_limited(&mut self, now: f64, tuning: &Tuning) -> Option<Volley> {
        if !self.can_shoot(now, tuning) {
            return None;
        }
        self.ammo -= 1;
        self.last_attack = now;
        Some(self.volley(tuning))
    }

    fn volley(&self, tuning: &Tuning) -> Volley {
        let pellets = match self.kind {
            WeaponKind::Pistol => vec![Pellet::from_tuning(&tuning.pistol, tuning.pistol.spread)],
            WeaponKind::Smg => vec![Pellet::from_tuning(&tuning.smg, tuning.smg.spread)],
            WeaponKind::Shotgun => {
                let shotgun = &tuning.shotgun;
                let low = Pellet::from_tuning(&shotgun.weapon, shotgun.spread_low);
                let high = Pellet::from_tuning(&shotgun.weapon, shotgun.weapon.spread);
                std::iter::repeat(low)
                    .take(shotgun.pellets_low_spread as usize)
                    .chain(std::iter::repeat(high).take(shotgun.pellets_high_spread as usize))
                    .collect()
            }
        };
        Volley {
            weapon: self.kind,
            pellets,
            depleted: self.kind != WeaponKind::Pistol && self.ammo == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pistol_fires_every_pull() {
        let tuning = Tuning::default();
        let mut pistol = Weapon::pistol();
        for _ in 0..100 {
            let volley = pistol.pull_trigger(0.0, &tuning).unwrap();
            assert_eq!(volley.pellets.len(), 1);
            assert!(!volley.depleted);
        }
        assert!(pistol.think(0.0, &tuning).is_none());
        assert_eq!(pistol.status(&tuning), "Pistol \u{221e}/\u{221e}");
    }

    #[test]
    fn test_smg_is_automatic_and_rate_limited() {
        let tuning = Tuning::default();
        let mut smg = Weapon::new(WeaponKind::Smg, &tuning);
        assert_eq!(smg.ammo(), 45);

        assert!(smg.pull_trigger(1000.0, &tuning).is_none());
        assert!(smg.is_trigger_held());

        assert!(smg.think(1000.0, &tuning).is_some());
        // 75ms fire rate.
        assert!(smg.think(1050.0, &tuning).is_none());
        assert!(smg.think(1075.0, &tuning).is_some());
        assert_eq!(smg.ammo(), 43);
        assert_eq!(smg.status(&tuning), "SMG1 43/45");

        smg.release_trigger();
        assert!(smg.think(5000.0, &tuning).is_none());
    }

    #[test]
    fn test_smg_reports_depletion_on_last_round() {
        let tuning = Tuning::default();
        let mut smg = Weapon::new(WeaponKind::Smg, &tuning);
        smg.pull_trigger(0.0, &tuning);

        let mut now = 0.0;
        let mut last = None;
        while let Some(volley) = smg.think(now, &tuning) {
            last = Some(volley);
            now += 100.0;
        }
        assert!(last.unwrap().depleted);
        assert_eq!(smg.ammo(), 0);
        assert!(!smg.can_shoot(now + 1000.0, &tuning));
    }

    #[test]
    fn test_shotgun_volley() {
        let tuning = Tuning::default();
        let mut shotgun = Weapon::new(WeaponKind::Shotgun, &tuning);

        let volley = shotgun.pull_trigger(0.0, &tuning).unwrap();
        assert_eq!(volley.pellets.len(), 7);
        assert_eq!(volley.pellets.iter().filter(|p| p.spread == 3.0).count(), 3);
        assert_eq!(volley.pellets.iter().filter(|p| p.spread == 15.0).count(), 4);
        assert!(volley.pellets.iter().all(|p| p.damage == 20.0));

        // 850ms between shots.
        assert!(shotgun.pull_trigger(500.0, &tuning).is_none());
        assert!(shotgun.pull_trigger(850.0, &tuning).is_some());
        assert_eq!(shotgun.ammo(), 6);
    }

    #[test]
    fn test_refill_and_full() {
        let tuning = Tuning::default();
        let mut shotgun = Weapon::new(WeaponKind::Shotgun, &tuning);
        assert!(shotgun.is_full(&tuning));
        shotgun.pull_trigger(0.0, &tuning);
        assert!(!shotgun.is_full(&tuning));
        shotgun.refill(&tuning);
        assert_eq!(shotgun.ammo(), 8);
        assert!(Weapon::pistol().is_full(&tuning));
    }

    #[test]
    fn test_shot_sound_names() {
        assert_eq!(WeaponKind::Pistol.shot_sound(), "pistol_shot");
        assert_eq!(WeaponKind::Smg.shot_sound(), "smg1_shot");
        assert_eq!(WeaponKind::Shotgun.shot_sound(), "shotgun_shot");
    }
}
