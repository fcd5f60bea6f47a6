use super::{ExistenceCheck, FieldAccessor, RenderStrategy};
use log::trace;
use shared::{Snapshot, SnapshotHistory};
use std::sync::Arc;

/// Draws the newest snapshot as it is. Nothing is smoothed, and a snapshot is handed out
/// for drawing only once.
pub struct SnapshotStrategy {
    newest: Option<Arc<Snapshot>>,
    last_rendered: Arc<Snapshot>,
}

impl SnapshotStrategy {
    pub fn new() -> Self {
        Self {
            newest: None,
            last_rendered: Arc::new(Snapshot::empty()),
        }
    }
}

impl Default for SnapshotStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderStrategy for SnapshotStrategy {
    fn prepare(&mut self, history: &SnapshotHistory, _server_now: f64) {
        self.newest = history.head().cloned();
    }

    fn primary_snapshot(&mut self) -> Option<Arc<Snapshot>> {
        let newest = self.newest.as_ref()?;
        if Arc::ptr_eq(newest, &self.last_rendered) {
            trace!("Snapshot {} already drawn", newest.tick);
            return None;
        }
        self.last_rendered = Arc::clone(newest);
        Some(Arc::clone(newest))
    }

    /// Anything iterated from the primary snapshot can be read from it.
    fn should_draw(&self, _exists: ExistenceCheck) -> bool {
        true
    }

    fn field(&self, accessor: FieldAccessor) -> f32 {
        accessor(self.last_rendered.as_ref()).unwrap_or(0.0)
    }

    fn configure_history(&self, history: &mut SnapshotHistory) {
        history.set_capacity(Some(1));
    }

    fn name(&self) -> &'static str {
        "snapshot"
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_newest_snapshot_is_drawn_once() {
        let mut strategy = SnapshotStrategy::new();
        let mut history = SnapshotHistory::default();
        strategy.configure_history(&mut history);
        history.stash(snapshot(1, 100.0, Some(5.0)));

        strategy.prepare(&history, 1000.0);
        let primary = strategy.primary_snapshot().unwrap();
        assert_eq!(primary.tick, 1);
        assert_eq!(strategy.field(&x), 5.0);

        strategy.prepare(&history, 1020.0);
        assert!(strategy.primary_snapshot().is_none());
        assert_eq!(strategy.field(&x), 5.0);

        history.stash(snapshot(2, 120.0, Some(7.0)));
        assert_eq!(history.len(), 1);
        strategy.prepare(&history, 1040.0);
        assert_eq!(strategy.primary_snapshot().unwrap().tick, 2);
        assert_eq!(strategy.field(&x), 7.0);
    }

    #[test]
    fn test_empty_history_draws_nothing() {
        let mut strategy = SnapshotStrategy::new();
        strategy.prepare(&SnapshotHistory::default(), 0.0);
        assert!(strategy.primary_snapshot().is_none());
        assert_eq!(strategy.field(&x), 0.0);
        assert!(strategy.should_draw(&exists));
    }
}
