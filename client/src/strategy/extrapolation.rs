use super::{extrapolate_field, extrapolation_t, ExistenceCheck, FieldAccessor, RenderStrategy};
use shared::{Snapshot, SnapshotHistory};
use std::sync::Arc;

const HISTORY_CAPACITY: usize = 2;
const HISTORY_MAX_AGE: f64 = 10_000.0;

#[derive(Debug, Clone)]
enum Mode {
    /// Two snapshots: project past the newest.
    Smooth {
        newer: Arc<Snapshot>,
        older: Arc<Snapshot>,
        t: f32,
    },
    /// One snapshot: show it as it is.
    Fallback(Arc<Snapshot>),
    Impossible,
}

/// Projects every field forward from the two newest snapshots, so the picture leads the
/// stream by roughly one snapshot interval.
pub struct ExtrapolationStrategy {
    mode: Mode,
}

impl ExtrapolationStrategy {
    pub fn new() -> Self {
        Self {
            mode: Mode::Impossible,
        }
    }
}

impl Default for ExtrapolationStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderStrategy for ExtrapolationStrategy {
    fn prepare(&mut self, history: &SnapshotHistory, server_now: f64) {
        self.mode = match history.front(2) {
            [newer, older] => Mode::Smooth {
                t: extrapolation_t(server_now, newer, older),
                newer: Arc::clone(newer),
                older: Arc::clone(older),
            },
            [only] => Mode::Fallback(Arc::clone(only)),
            _ => Mode::Impossible,
        };
    }

    fn primary_snapshot(&mut self) -> Option<Arc<Snapshot>> {
        match &self.mode {
            Mode::Smooth { newer, .. } => Some(Arc::clone(newer)),
            Mode::Fallback(only) => Some(Arc::clone(only)),
            Mode::Impossible => None,
        }
    }

    /// Presence in the newest snapshot is enough; fields missing from the older one are
    /// shown unprojected.
    fn should_draw(&self, _exists: ExistenceCheck) -> bool {
        true
    }

    fn field(&self, accessor: FieldAccessor) -> f32 {
        match &self.mode {
            Mode::Smooth { newer, older, t } => extrapolate_field(newer, older, *t, accessor),
            Mode::Fallback(only) => accessor(only.as_ref()).unwrap_or(0.0),
            Mode::Impossible => 0.0,
        }
    }

    fn configure_history(&self, history: &mut SnapshotHistory) {
        history.set_capacity(Some(HISTORY_CAPACITY));
        history.set_max_age(Some(HISTORY_MAX_AGE));
    }

    fn name(&self) -> &'static str {
        "extrapolation"
    }
}
