//! Small geometry helpers shared by the simulation and the reconciliation strategies.

pub use glam::Vec2;

/// Linear interpolation from `b` (t = 0) to `a` (t = 1).
///
/// Argument order follows the snapshot convention of newest first: `a` is the newer sample.
pub fn lerp(b: f32, a: f32, t: f32) -> f32 {
    b + (a - b) * t
}

/// Linear projection past the newer sample `a`: one full sample interval is added on top of
/// the interpolated value, so `t = 0` yields `a` and `t = 1` yields `a + (a - b)`.
pub fn extrapolate(b: f32, a: f32, t: f32) -> f32 {
    (a - b) + lerp(b, a, t)
}

pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(0.0, 10.0, 0.0), 0.0);
        assert_eq!(lerp(0.0, 10.0, 1.0), 10.0);
        assert_eq!(lerp(0.0, 10.0, 0.5), 5.0);
    }

    #[test]
    fn test_extrapolate_projects_past_newest() {
        // Samples 0 @ 100ms and 10 @ 200ms, queried at 210ms.
        assert_approx_eq!(extrapolate(0.0, 10.0, 0.1), 11.0);
        assert_approx_eq!(extrapolate(0.0, 10.0, 0.0), 10.0);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5.0, 0.0, 3.0), 3.0);
        assert_eq!(clamp(-5.0, 0.0, 3.0), 0.0);
        assert_eq!(clamp(1.5, 0.0, 3.0), 1.5);
    }
}
