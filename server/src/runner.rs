//! Drives a [`Simulation`] in wall-clock time: fixed-step catch-up, round lifecycle, joins
//! and per-tick transmission.

use crate::events::GameEvent;
use crate::game::Simulation;
use crate::map::Map;
use crate::observer::{GameObserver, Outbox};
use crate::tuning::Tuning;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shared::{validate_nickname, Packet, PlayerId};
use std::collections::BTreeSet;
use std::path::PathBuf;

pub const DEFAULT_MAP_ROTATION: [&str; 7] = [
    "vietcong",
    "shack",
    "mountainSide",
    "grasslands",
    "claustrophobia",
    "industrial",
    "stage",
];

/// Steps due after [`FixedStep::advance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advance {
    pub steps: u32,
    /// Ms dropped because more than the catch-up cap was due.
    pub skipped: f64,
}

/// Converts elapsed wall-clock time into a whole number of fixed steps.
#[derive(Debug, Clone)]
pub struct FixedStep {
    interval: f64,
    accumulator: f64,
    max_catch_up: u32,
}

impl FixedStep {
    pub fn new(interval: f64, max_catch_up: u32) -> Self {
        Self {
            interval,
            accumulator: 0.0,
            max_catch_up: max_catch_up.max(1),
        }
    }

    /// Adds `elapsed` ms and returns how many steps are due. When more than `max_catch_up`
    /// steps are due, only that many run and the rest of the backlog is reported as skipped.
    pub fn advance(&mut self, elapsed: f64) -> Advance {
        if elapsed > 0.0 {
            self.accumulator += elapsed;
        }
        let due = (self.accumulator / self.interval).floor();
        if due > self.max_catch_up as f64 {
            let skipped = self.accumulator - self.max_catch_up as f64 * self.interval;
            warn!("Fell behind by {} steps, skipping {:.1}ms", due, skipped);
            self.accumulator = 0.0;
            return Advance {
                steps: self.max_catch_up,
                skipped,
            };
        }
        self.accumulator -= due * self.interval;
        Advance {
            steps: due as u32,
            skipped: 0.0,
        }
    }

    /// Ms until the next step is due.
    pub fn until_next(&self) -> f64 {
        (self.interval - self.accumulator).max(0.0)
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

/// Picks the next map at random, never the same one twice in a row unless it is the only one.
#[derive(Debug, Clone)]
pub struct MapRotation {
    names: Vec<String>,
    last: Option<String>,
}

impl MapRotation {
    pub fn new(names: Vec<String>) -> Self {
        Self { names, last: None }
    }

    pub fn pick(&mut self, rng: &mut StdRng) -> Option<String> {
        let candidates: Vec<&String> = match &self.last {
            Some(last) if self.names.len() > 1 => {
                self.names.iter().filter(|name| *name != last).collect()
            }
            _ => self.names.iter().collect(),
        };
        let picked = candidates.choose(rng).map(|name| (*name).clone())?;
        self.last = Some(picked.clone());
        Some(picked)
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

impl Default for MapRotation {
    fn default() -> Self {
        Self::new(DEFAULT_MAP_ROTATION.iter().map(|name| name.to_string()).collect())
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Ms per step.
    pub tick_interval: f64,
    pub round_length: f64,
    pub round_linger: f64,
    pub max_catch_up: u32,
    pub maps_dir: Option<PathBuf>,
    pub maps: Vec<String>,
}

impl RunnerConfig {
    pub fn from_tuning(tuning: &Tuning, tick_interval: f64) -> Self {
        Self {
            tick_interval,
            round_length: tuning.round_length,
            round_linger: tuning.round_linger,
            max_catch_up: 10,
            maps_dir: None,
            maps: DEFAULT_MAP_ROTATION.iter().map(|name| name.to_string()).collect(),
        }
    }
}

/// Where the runner is in the round lifecycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundPhase {
    /// Nobody has joined yet, or everyone left before the last reset.
    Idle,
    Running,
    /// The round ended; the world keeps running until the reset at `until` (ms).
    Lingering { until: f64 },
}

/// Result of a join attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Accepted { player: PlayerId, welcome: Packet },
    Rejected { reason: String },
}

pub struct GameRunner {
    sim: Simulation,
    observer: GameObserver,
    outbox: Outbox,
    stepper: FixedStep,
    rotation: MapRotation,
    config: RunnerConfig,
    rng: StdRng,
    phase: RoundPhase,
    /// Players with a live connection.
    subscribers: BTreeSet<PlayerId>,
    next_player_id: PlayerId,
    last_update: f64,
    round: u32,
}

impl GameRunner {
    pub fn new(tuning: Tuning, config: RunnerConfig) -> Self {
        let sim = Simulation::new(tuning, config.tick_interval);
        Self::with_simulation(sim, config, StdRng::from_entropy())
    }

    pub fn with_seed(tuning: Tuning, config: RunnerConfig, seed: u64) -> Self {
        let sim = Simulation::with_seed(tuning, config.tick_interval, seed);
        Self::with_simulation(sim, config, StdRng::seed_from_u64(seed))
    }

    fn with_simulation(sim: Simulation, config: RunnerConfig, rng: StdRng) -> Self {
        Self {
            sim,
            observer: GameObserver::new(config.round_linger),
            outbox: Outbox::new(),
            stepper: FixedStep::new(config.tick_interval, config.max_catch_up),
            rotation: MapRotation::new(config.maps.clone()),
            config,
            rng,
            phase: RoundPhase::Idle,
            subscribers: BTreeSet::new(),
            next_player_id: 1,
            last_update: 0.0,
            round: 0,
        }
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn subscribers(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.subscribers.iter().copied()
    }

    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.is_empty()
    }

    /// Ms until the runner next has work to do.
    pub fn until_next_step(&self) -> f64 {
        self.stepper.until_next()
    }

    /// Loads `name` from the maps directory, falling back to the built-in map.
    fn load_map(&self, name: &str) -> Map {
        let fallback = || Map::fallback(self.sim.world().tuning().sample_walls.clone());
        match &self.config.maps_dir {
            Some(dir) => Map::load(dir, name).unwrap_or_else(|e| {
                error!("Failed to load map '{}': {}, using the default map", name, e);
                fallback()
            }),
            None => fallback(),
        }
    }

    fn start_round(&mut self, now: f64) {
        self.round += 1;
        let map = match self.rotation.pick(&mut self.rng) {
            Some(name) => self.load_map(&name),
            None => Map::fallback(self.sim.world().tuning().sample_walls.clone()),
        };
        info!("Starting round {}", self.round);
        self.sim.start(self.config.round_length, now, map);
        self.stepper.reset();
        self.last_update = now;
        self.phase = RoundPhase::Running;
    }

    /// Validates the nickname and admits the player, starting a round if none is running.
    /// A nickname matching a departed player of this round restores that player's score.
    pub fn join(&mut self, nickname: &str, now: f64) -> JoinOutcome {
        let nick = match validate_nickname(nickname) {
            Ok(nick) => nick,
            Err(reason) => return JoinOutcome::Rejected { reason },
        };
        let existing = self
            .sim
            .world()
            .players()
            .find(|player| player.nick == nick)
            .map(|player| (player.id, player.active));
        if let Some((_, true)) = existing {
            return JoinOutcome::Rejected {
                reason: "Nickname is already taken!".to_string(),
            };
        }

        if self.phase == RoundPhase::Idle {
            self.start_round(now);
        }

        let player = match existing {
            Some((id, _)) => {
                self.sim.restore_player(id);
                id
            }
            None => {
                let id = self.next_player_id;
                self.next_player_id += 1;
                self.sim.add_player(id, nick);
                id
            }
        };
        self.subscribers.insert(player);
        self.outbox.queue_unicast(
            player,
            Packet::ScoreFullUpdate {
                rows: self.sim.score_data(),
            },
        );

        JoinOutcome::Accepted {
            player,
            welcome: self.welcome(player, now),
        }
    }

    fn welcome(&self, player: PlayerId, now: f64) -> Packet {
        let map = self.sim.world().map();
        let record = self.sim.player(player);
        Packet::Welcome {
            player_id: player,
            avatar: record.and_then(|p| p.avatar),
            color: record.map(|p| p.color).unwrap_or_default(),
            round_time_left_ms: self.sim.round_time_left(now),
            walls: map.walls.clone(),
            map_name: map.name.clone(),
        }
    }

    /// Handles a packet from an admitted player. Returns an immediate reply, if any.
    pub fn handle_packet(&mut self, player: PlayerId, packet: Packet, now: f64) -> Option<Packet> {
        match packet {
            Packet::Ping { client_time } => Some(Packet::Pong {
                client_time,
                server_time: now,
            }),
            Packet::Command { command, start } => {
                if !self.sim.apply_command(player, command, start) {
                    debug!("Ignored {:?} from player {} without avatar", command, player);
                }
                None
            }
            Packet::Leave => {
                self.leave(player);
                None
            }
            other => {
                warn!("Unexpected {} from player {}", other.kind(), player);
                None
            }
        }
    }

    pub fn leave(&mut self, player: PlayerId) {
        if self.subscribers.remove(&player) {
            self.sim.remove_player(player);
        }
    }

    /// Runs every step due by wall-clock `now` and returns the datagrams to send, in order.
    pub fn update(&mut self, now: f64) -> Vec<(PlayerId, Packet)> {
        let mut outgoing = Vec::new();
        if self.phase == RoundPhase::Idle {
            return outgoing;
        }

        let advance = self.stepper.advance(now - self.last_update);
        self.last_update = now;
        // Keeps simulation time on the wall clock after a stall.
        self.sim.skip(advance.skipped);
        let recipients: Vec<PlayerId> = self.subscribers.iter().copied().collect();

        for _ in 0..advance.steps {
            self.sim.do_step(self.stepper.interval());
            for event in self.sim.drain_events() {
                self.observer.observe(&self.sim, &event, &mut self.outbox);
                if let GameEvent::RoundEnded { .. } = event {
                    self.phase = RoundPhase::Lingering {
                        until: now + self.config.round_linger * 1000.0,
                    };
                }
            }
            if let Some(snapshot) = self.sim.latest_snapshot() {
                self.outbox.queue_broadcast(Packet::Snapshot((*snapshot).clone()));
            }
            outgoing.extend(self.outbox.flush(&recipients));
        }

        if let RoundPhase::Lingering { until } = self.phase {
            if now >= until {
                self.sim.reset();
                self.phase = RoundPhase::Idle;
                if self.has_subscribers() {
                    info!("Starting the next round right away");
                    self.start_round(now);
                }
            }
        }
        outgoing
    }
}
