use super::{extrapolate_field, extrapolation_t, ExistenceCheck, FieldAccessor, RenderStrategy};
use log::debug;
use shared::{lerp, Snapshot, SnapshotHistory};
use std::sync::Arc;

const HISTORY_CAPACITY: usize = 10;
/// Kept on top of the render delay so the delayed query time never runs off the buffer.
const HISTORY_AGE_MARGIN: f64 = 200.0;

#[derive(Debug, Clone)]
enum Mode {
    /// `older.time <= render time < newer.time`.
    Interpolate {
        older: Arc<Snapshot>,
        newer: Arc<Snapshot>,
        t: f32,
    },
    /// No bracketing pair, but two snapshots to project from.
    Extrapolate {
        newer: Arc<Snapshot>,
        older: Arc<Snapshot>,
        t: f32,
    },
    Impossible,
}

/// Renders a fixed delay behind the server so that, under normal jitter, the picture is
/// always between two known states.
pub struct InterpolationStrategy {
    /// Ms behind the estimated server time.
    delay: f64,
    mode: Mode,
}

impl InterpolationStrategy {
    pub fn new(delay: f64) -> Self {
        Self {
            delay,
            mode: Mode::Impossible,
        }
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn is_interpolating(&self) -> bool {
        matches!(self.mode, Mode::Interpolate { .. })
    }
}

impl RenderStrategy for InterpolationStrategy {
    fn prepare(&mut self, history: &SnapshotHistory, server_now: f64) {
        let render_time = server_now - self.delay;
        let bounds = history.bounds(render_time);

        self.mode = match (bounds.at_or_before, bounds.after) {
            (Some(older), Some(newer)) => Mode::Interpolate {
                t: ((render_time - older.time) / (newer.time - older.time)) as f32,
                older,
                newer,
            },
            _ => match history.front(2) {
                [newer, older] => {
                    debug!("No snapshots around {:.0}, extrapolating", render_time);
                    Mode::Extrapolate {
                        t: extrapolation_t(render_time, newer, older),
                        newer: Arc::clone(newer),
                        older: Arc::clone(older),
                    }
                }
                _ => Mode::Impossible,
            },
        };
    }

    /// While interpolating, the older snapshot decides what exists at the render time.
    fn primary_snapshot(&mut self) -> Option<Arc<Snapshot>> {
        match &self.mode {
            Mode::Interpolate { older, .. } => Some(Arc::clone(older)),
            Mode::Extrapolate { newer, .. } => Some(Arc::clone(newer)),
            Mode::Impossible => None,
        }
    }

    /// Entities that appeared or vanished between the bracketing snapshots are not drawn.
    fn should_draw(&self, exists: ExistenceCheck) -> bool {
        match &self.mode {
            Mode::Interpolate { older, newer, .. } => exists(older.as_ref()) && exists(newer.as_ref()),
            Mode::Extrapolate { .. } | Mode::Impossible => true,
        }
    }

    fn field(&self, accessor: FieldAccessor) -> f32 {
        match &self.mode {
            Mode::Interpolate { older, newer, t } => {
                match (accessor(older.as_ref()), accessor(newer.as_ref())) {
                    (Some(b), Some(a)) => lerp(b, a, *t),
                    _ => 0.0,
                }
            }
            Mode::Extrapolate { newer, older, t } => extrapolate_field(newer, older, *t, accessor),
            Mode::Impossible => 0.0,
        }
    }

    fn configure_history(&self, history: &mut SnapshotHistory) {
        history.set_capacity(Some(HISTORY_CAPACITY));
        history.set_max_age(Some(self.delay + HISTORY_AGE_MARGIN));
    }

    fn name(&self) -> &'static str {
        "interpolation"
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_interpolates_between_bracketing_snapshots() {
        let history = history(&[(100.0, Some(0.0)), (200.0, Some(10.0)), (300.0, Some(30.0))]);
        let mut strategy = InterpolationStrategy::new(100.0);
        strategy.prepare(&history, 350.0);

        assert!(strategy.is_interpolating());
        assert_eq!(strategy.primary_snapshot().unwrap().time, 200.0);
        assert!(strategy.should_draw(&exists));
        assert_approx_eq!(strategy.field(&x), 20.0, 1e-4);
    }

    #[test]
    fn test_render_time_on_a_snapshot() {
        let history = history(&[(100.0, Some(0.0)), (200.0, Some(10.0))]);
        let mut strategy = InterpolationStrategy::new(100.0);
        strategy.prepare(&history, 200.0);
        assert!(strategy.is_interpolating());
        assert_approx_eq!(strategy.field(&x), 0.0, 1e-4);
    }

    #[test]
    fn test_entity_must_exist_in_both_snapshots() {
        let appeared = history(&[(100.0, None), (200.0, Some(10.0))]);
        let mut strategy = InterpolationStrategy::new(0.0);
        strategy.prepare(&appeared, 150.0);
        assert!(!strategy.should_draw(&exists));

        let vanished = history(&[(100.0, Some(0.0)), (200.0, None)]);
        strategy.prepare(&vanished, 150.0);
        assert!(!strategy.should_draw(&exists));
    }

    #[test]
    fn test_falls_back_to_extrapolation_past_newest() {
        let history = history(&[(100.0, Some(0.0)), (200.0, Some(10.0))]);
        let mut strategy = InterpolationStrategy::new(100.0);
        strategy.prepare(&history, 310.0);

        assert!(!strategy.is_interpolating());
        assert_eq!(strategy.primary_snapshot().unwrap().time, 200.0);
        assert!(strategy.should_draw(&exists));
        assert_approx_eq!(strategy.field(&x), 11.0, 1e-4);
    }

    #[test]
    fn test_single_snapshot_is_impossible() {
        let history = history(&[(100.0, Some(4.0))]);
        let mut strategy = InterpolationStrategy::new(100.0);
        strategy.prepare(&history, 500.0);
        assert!(strategy.primary_snapshot().is_none());
        assert_eq!(strategy.field(&x), 0.0);
    }

    #[test]
    fn test_configures_age_from_delay() {
        let strategy = InterpolationStrategy::new(150.0);
        let mut history = SnapshotHistory::default();
        strategy.configure_history(&mut history);
        assert_eq!(history.capacity(), Some(10));
        assert_eq!(history.max_age(), Some(350.0));
    }
}
