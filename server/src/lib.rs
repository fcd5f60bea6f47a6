//! # Arena Server Library
//!
//! The authoritative half of a top-down arena shooter. The server owns the only real copy of
//! the world, advances it in fixed steps and broadcasts a render snapshot after every step.
//! Clients only send intents (movement keys, trigger) and render what the server tells them.
//!
//! ## Simulation
//!
//! ### World (`world`, `entity`, `components`, `weapons`)
//! Entities are grouped by category and carry a closed set of optional components:
//! movement, locomotion, health and a shooter. Each tick every avatar and projectile is
//! updated, then post-updated, then checked for collisions. Removals requested during a tick
//! are deferred to the end of it, so hooks never observe half-removed entities.
//!
//! ### Collisions (`collision`)
//! Circles and convex polygons with an AABB broad phase and SAT narrow phase. Each
//! body can ignore specific entities, which keeps bullets from hitting their shooter.
//!
//! ### Scheduler (`scheduler`)
//! Time-ordered tasks with priorities and cancellable handles. Drives round end, respawns
//! and pickup spawns. Tasks due at the same time run by priority, then in queue order.
//!
//! ### Simulation (`game`)
//! Ties the world, the scheduler and a bounded snapshot history together and keeps two
//! clocks: the sum of step deltas and `ticks * tick_interval`.
//!
//! ## Serving
//!
//! ### Runner (`runner`)
//! Converts wall-clock time into fixed steps with bounded catch-up, starts a round on the
//! first join, lingers after a round ends and restarts while anyone is connected. Maps come
//! from a rotation that never repeats the previous map.
//!
//! ### Observer (`observer`)
//! Maps game events onto protocol messages queued per recipient and flushed once per step.
//!
//! ### Network (`network`, `client_manager`)
//! UDP transport with separate receive, send and timeout tasks around a single game loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::runner::{GameRunner, RunnerConfig};
//! use server::tuning::Tuning;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tuning = Tuning::default();
//!     let config = RunnerConfig::from_tuning(&tuning, 20.0);
//!     let runner = GameRunner::new(tuning, config);
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         runner,
//!         Duration::from_millis(20),
//!         16,
//!         Duration::from_secs(5),
//!     )
//!     .await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod collision;
pub mod components;
pub mod entity;
pub mod events;
pub mod game;
pub mod map;
pub mod network;
pub mod observer;
pub mod player;
pub mod runner;
pub mod scheduler;
pub mod tuning;
pub mod weapons;
pub mod world;
