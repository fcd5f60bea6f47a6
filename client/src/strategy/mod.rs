//! Render strategies: how the client turns a sparse, jittery stream of snapshots into a
//! position for every entity on every frame.
//!
//! The call sequence per frame is fixed:
//!
//! 1. [`RenderStrategy::prepare`] once, with the buffered history and the estimated server
//!    time. This fixes the frame's time parameter and picks the relevant snapshots.
//! 2. [`RenderStrategy::primary_snapshot`] to get the entity set to iterate. Entities missing
//!    from it are not drawn this frame.
//! 3. Per entity, [`RenderStrategy::should_draw`] and then [`RenderStrategy::field`] for each
//!    coordinate.
//!
//! Field accessors return `None` when the entity is absent from a snapshot. Strategies never
//! fail; when nothing can be resolved they report `0.0`.

mod extrapolation;
mod interpolation;
mod snapshot;

pub use extrapolation::ExtrapolationStrategy;
pub use interpolation::InterpolationStrategy;
pub use snapshot::SnapshotStrategy;

use clap::ValueEnum;
use shared::{Snapshot, SnapshotHistory};
use std::sync::Arc;

/// Reads one numeric field of one entity, `None` if the entity is not in the snapshot.
pub type FieldAccessor<'a> = &'a dyn Fn(&Snapshot) -> Option<f32>;

/// Tells whether an entity exists in a snapshot.
pub type ExistenceCheck<'a> = &'a dyn Fn(&Snapshot) -> bool;

pub trait RenderStrategy {
    /// Selects the snapshots relevant at `server_now` (ms). Called once per frame.
    fn prepare(&mut self, history: &SnapshotHistory, server_now: f64);

    /// The snapshot whose entities should be drawn this frame.
    fn primary_snapshot(&mut self) -> Option<Arc<Snapshot>>;

    fn should_draw(&self, exists: ExistenceCheck) -> bool;

    fn field(&self, accessor: FieldAccessor) -> f32;

    /// Sets the history bounds this strategy needs. Called once at setup.
    fn configure_history(&self, history: &mut SnapshotHistory);

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    Snapshot,
    Interpolation,
    Extrapolation,
}

impl StrategyKind {
    /// `delay` (ms) only matters for interpolation.
    pub fn build(self, delay: f64) -> Box<dyn RenderStrategy> {
        match self {
            StrategyKind::Snapshot => Box::new(SnapshotStrategy::new()),
            StrategyKind::Interpolation => Box::new(InterpolationStrategy::new(delay)),
            StrategyKind::Extrapolation => Box::new(ExtrapolationStrategy::new()),
        }
    }
}

/// Parametric position of `now` relative to the newer of two samples, in multiples of
/// their spacing. Zero when both samples share a timestamp.
pub(crate) fn extrapolation_t(now: f64, newer: &Snapshot, older: &Snapshot) -> f32 {
    let spacing = newer.time - older.time;
    if spacing == 0.0 {
        0.0
    } else {
        ((now - newer.time) / spacing) as f32
    }
}

/// Projects `accessor` past the newer snapshot. An entity missing from the older one is
/// shown where it is.
pub(crate) fn extrapolate_field(
    newer: &Snapshot,
    older: &Snapshot,
    t: f32,
    accessor: FieldAccessor,
) -> f32 {
    let Some(a) = accessor(newer) else {
        log::error!("Cannot read field from the newest snapshot (tick {})", newer.tick);
        return 0.0;
    };
    match accessor(older) {
        Some(b) => shared::extrapolate(b, a, t),
        None => a,
    }
}
