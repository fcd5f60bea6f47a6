use crate::entity::Category;
use crate::events::GameEvent;
use crate::map::Map;
use crate::player::Player;
use crate::scheduler::Scheduler;
use crate::tuning::Tuning;
use crate::world::{World, WorldTask};
use log::{debug, info};
use shared::{Command, PlayerId, ScoreRow, Snapshot, SnapshotHistory};
use std::sync::Arc;

/// Snapshots kept by the server; the network layer only ever needs the newest.
const SNAPSHOT_CAPACITY: usize = 20;
const SNAPSHOT_MAX_AGE: f64 = 99_999.0;

/// Groups that take part in the per-tick update and collision passes, in order.
const ACTIVE_GROUPS: [Category; 2] = [Category::Avatar, Category::Projectile];

/// The authoritative simulation: a world advanced in fixed steps, its scheduler and the
/// history of snapshots it produced.
pub struct Simulation {
    scheduler: Scheduler<WorldTask>,
    world: World,
    snapshots: SnapshotHistory,
    ticks: u64,
    /// Sum of every step's delta.
    elapsed_regular: f64,
    /// `ticks * tick_interval`.
    elapsed_precise: f64,
    /// Time jumped over by [`Simulation::skip`].
    skipped: f64,
    start_time: f64,
    tick_interval: f64,
    round_duration: f64,
}

impl Simulation {
    pub fn new(tuning: Tuning, tick_interval: f64) -> Self {
        Self::with_world(World::new(tuning, None), tick_interval)
    }

    /// Deterministic spawn points and spreads, for tests and replays.
    pub fn with_seed(tuning: Tuning, tick_interval: f64, seed: u64) -> Self {
        Self::with_world(World::new(tuning, Some(seed)), tick_interval)
    }

    fn with_world(world: World, tick_interval: f64) -> Self {
        Self {
            scheduler: Scheduler::new(),
            world,
            snapshots: SnapshotHistory::new(Some(SNAPSHOT_CAPACITY), Some(SNAPSHOT_MAX_AGE)),
            ticks: 0,
            elapsed_regular: 0.0,
            elapsed_precise: 0.0,
            skipped: 0.0,
            start_time: 0.0,
            tick_interval,
            round_duration: 0.0,
        }
    }

    /// Begins a round on `map` at wall-clock `start_time` (ms).
    pub fn start(&mut self, round_duration_secs: f64, start_time: f64, map: Map) {
        info!("Playing on map '{}'", map.name);
        self.start_time = start_time;
        self.ticks = 0;
        self.elapsed_precise = 0.0;
        self.elapsed_regular = 0.0;
        self.skipped = 0.0;
        self.round_duration = round_duration_secs;
        self.world.set_map(map);
        self.world.set_now(self.now());

        let walls = self.world.spawn_walls();
        debug!("Created {} walls", walls);
        let manager = self.world.spawn_pickup_manager();
        self.world.spawn_next_pickup(&mut self.scheduler, manager);
        self.scheduler.queue(
            self.now() + round_duration_secs * 1000.0,
            WorldTask::RoundEnd,
            0,
        );

        self.world.respawn_avatars(&mut self.scheduler);
        self.world.emit(GameEvent::RoundStarted {
            duration_secs: round_duration_secs,
        });
        info!("Round of {}s started", round_duration_secs);
    }

    /// Wipes the round: queued tasks, snapshots, entities, departed players and scores.
    pub fn reset(&mut self) {
        self.scheduler.clean();
        self.snapshots.clear();
        self.world.clear_entities();
        self.world.clear_events();
        self.world.reset_players();
        info!("Simulation reset");
    }

    /// Advances the world by `delta` ms.
    pub fn do_step(&mut self, delta: f64) {
        let now = self.now();
        self.world.set_now(now);
        let world = &mut self.world;
        self.scheduler.process(now, |scheduler, task| world.run_task(scheduler, task));

        for category in ACTIVE_GROUPS {
            self.world.update_group(category, delta as f32);
        }
        for category in ACTIVE_GROUPS {
            self.world.post_update_group(category);
        }

        self.world.refresh_collisions();
        for category in ACTIVE_GROUPS {
            self.world.resolve_collisions(&mut self.scheduler, category);
        }

        self.world.flush_deletions(&mut self.scheduler);

        self.ticks += 1;
        self.elapsed_precise = self.ticks as f64 * self.tick_interval;
        self.elapsed_regular += delta;

        let snapshot = self.world.snapshot(self.ticks, self.now());
        self.snapshots.stash(snapshot);
    }

    /// Current simulation time in ms since the epoch.
    pub fn now(&self) -> f64 {
        self.start_time + self.elapsed_regular + self.skipped
    }

    /// Moves the clock forward by `ms` without stepping the world. Tasks that fall due in
    /// the gap run on the next step.
    pub fn skip(&mut self, ms: f64) {
        if ms > 0.0 {
            self.skipped += ms;
        }
    }

    pub fn elapsed_regular(&self) -> f64 {
        self.elapsed_regular
    }

    /// Elapsed time free of float accumulation drift, for displays.
    pub fn elapsed_precise(&self) -> f64 {
        self.elapsed_precise
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn tick_interval(&self) -> f64 {
        self.tick_interval
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn round_time_left(&self, now: f64) -> f64 {
        (self.start_time + self.round_duration * 1000.0 - now).max(0.0)
    }

    pub fn latest_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshots.head().cloned()
    }

    pub fn snapshots(&self) -> &SnapshotHistory {
        &self.snapshots
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn scheduler(&self) -> &Scheduler<WorldTask> {
        &self.scheduler
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.world.drain_events()
    }

    pub fn add_player(&mut self, id: PlayerId, nick: String) -> &Player {
        self.world.set_now(self.now());
        self.world.add_player(id, nick)
    }

    pub fn restore_player(&mut self, id: PlayerId) -> Option<&Player> {
        self.world.set_now(self.now());
        self.world.restore_player(id)
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<&Player> {
        self.world.set_now(self.now());
        self.world.remove_player(&mut self.scheduler, id)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.world.player(id)
    }

    /// Applies a decoded intent. Call between steps only.
    pub fn apply_command(&mut self, player: PlayerId, command: Command, start: bool) -> bool {
        self.world.set_now(self.now());
        self.world.apply_command(player, command, start)
    }

    pub fn score_data(&self) -> Vec<ScoreRow> {
        self.world.score_data()
    }

    pub fn winner(&self) -> String {
        self.world.winner()
    }
}
