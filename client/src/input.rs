//! Client input management with change detection

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Command, Packet};

/// Which intents are currently held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
    pub walk: bool,
    pub fire: bool,
}

impl Controls {
    pub fn get(&self, command: Command) -> bool {
        match command {
            Command::Up => self.up,
            Command::Down => self.down,
            Command::Left => self.left,
            Command::Right => self.right,
            Command::Sprint => self.sprint,
            Command::Walk => self.walk,
            Command::Fire => self.fire,
        }
    }
}

/// Turns held-key state into edge-triggered command packets: one packet when an intent
/// starts, one when it ends, nothing while it is held.
#[derive(Debug, Default)]
pub struct InputManager {
    previous: Controls,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, controls: &Controls) -> Vec<Packet> {
        let packets = Command::ALL
            .iter()
            .filter(|command| controls.get(**command) != self.previous.get(**command))
            .map(|command| Packet::Command {
                command: *command,
                start: controls.get(*command),
            })
            .collect();
        self.previous = *controls;
        packets
    }

    /// Forgets held state, e.g. after the server dropped our avatar.
    pub fn reset(&mut self) {
        self.previous = Controls::default();
    }
}

/// Wanders in random directions and fires in bursts.
pub struct Bot {
    rng: StdRng,
    controls: Controls,
    next_change: f64,
}

impl Bot {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            controls: Controls::default(),
            next_change: 0.0,
        }
    }

    /// Controls to hold at local time `now` (ms).
    pub fn update(&mut self, now: f64) -> Controls {
        if now >= self.next_change {
            let vertical = self.rng.gen_range(0..3);
            let horizontal = self.rng.gen_range(0..3);
            self.controls = Controls {
                up: vertical == 1,
                down: vertical == 2,
                left: horizontal == 1,
                right: horizontal == 2,
                sprint: self.rng.gen_bool(0.2),
                walk: false,
                fire: self.rng.gen_bool(0.5),
            };
            self.next_change = now + self.rng.gen_range(300.0..1500.0);
        }
        self.controls
    }
}
