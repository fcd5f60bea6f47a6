//! # Arena Client Library
//!
//! The client never simulates the world. It sends intents to the authoritative server,
//! buffers the snapshots it receives and, once per frame, asks a render strategy where every
//! entity should be drawn.
//!
//! ## Render Strategies
//!
//! Snapshots arrive at the server tick rate, late, jittered and sometimes out of order.
//! Three interchangeable strategies turn that stream into continuous positions:
//!
//! - **Snapshot**: draws the newest snapshot as received. Cheapest, and it stutters.
//! - **Extrapolation**: projects positions forward from the two newest snapshots.
//! - **Interpolation**: renders a fixed delay in the past, between two known snapshots,
//!   degrading to extrapolation when the buffer runs dry.
//!
//! Each strategy sizes the snapshot history it needs and picks its mode again every frame.
//!
//! ## Module Organization
//!
//! ### Strategy Module (`strategy`)
//! The [`strategy::RenderStrategy`] trait and its three implementations.
//!
//! ### View Module (`view`)
//! Composes a frame: iterates the primary snapshot, asks whether each entity can be drawn
//! and resolves its coordinates.
//!
//! ### Clock Module (`clock`)
//! Estimates server time from ping/pong round trips; strategies are queried in server time.
//!
//! ### Session Module (`session`)
//! Applies every non-positional message: welcome, scores, health, ammo, round changes.
//!
//! ### Input Module (`input`)
//! Edge-triggered command packets, plus a wandering bot for headless testing.
//!
//! ### Network Module (`network`)
//! The UDP client loop tying everything together.
//!
//! ## Usage Example
//!
//! ```rust
//! use client::strategy::StrategyKind;
//! use client::view::compose;
//! use shared::{Snapshot, SnapshotHistory};
//!
//! let mut strategy = StrategyKind::Interpolation.build(100.0);
//! let mut history = SnapshotHistory::default();
//! strategy.configure_history(&mut history);
//!
//! history.stash(Snapshot::new(1, 1_000.0));
//! history.stash(Snapshot::new(2, 1_020.0));
//!
//! let frame = compose(strategy.as_mut(), &history, 1_110.0);
//! assert!(frame.is_some());
//! ```

pub mod clock;
pub mod input;
pub mod network;
pub mod session;
pub mod strategy;
pub mod view;
