//! Animation descriptors handed to the rendering engine.
//!
//! The reconciler never steps animations itself; it describes them with an
//! [`Animation`] and lets the engine's scheduler run them. [`Easing::apply`]
//! is provided for engines (and the in-memory engine) that interpolate on
//! their own.

use std::time::Duration;

use serde::Deserialize;

/// Easing functions used to map normalized animation progress.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Easing {
    /// Linear interpolation.
    Linear,
    /// Cubic ease-in/out.
    EaseInOutCubic,
    /// Damped spring with unit mass.
    Spring { tension: f32, friction: f32 },
}

impl Default for Easing {
    fn default() -> Self {
        Self::Spring {
            tension: 250.0,
            friction: 20.0,
        }
    }
}

impl Easing {
    /// Apply this easing function to normalized progress `t` in `[0, 1]`.
    ///
    /// Every easing maps 0 to 0 and 1 to 1; the spring may overshoot in
    /// between.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        if t >= 1.0 {
            return 1.0;
        }
        match self {
            Self::Linear => t,
            Self::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Self::Spring { tension, friction } => spring(tension, friction, t),
        }
    }
}

/// Displacement of a unit-mass spring released from 0 towards 1, sampled so
/// that `t == 1` corresponds to the point where the oscillation has settled.
fn spring(tension: f32, friction: f32, t: f32) -> f32 {
    let omega = tension.max(f32::EPSILON).sqrt();
    let zeta = friction / (2.0 * omega);

    if zeta < 1.0 {
        let decay = zeta * omega;
        let settle = 6.0 / decay.max(f32::EPSILON);
        let tau = t * settle;
        let damped = omega * (1.0 - zeta * zeta).sqrt();
        1.0 - (-decay * tau).exp()
            * ((damped * tau).cos() + (decay / damped) * (damped * tau).sin())
    } else {
        let settle = 8.0 / omega;
        let tau = t * settle;
        1.0 - (-omega * tau).exp() * (1.0 + omega * tau)
    }
}

/// Timing for one engine-scheduled animation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Animation {
    duration: Duration,
    easing: Easing,
    delay: Duration,
}

impl Animation {
    /// Creates an animation with no start delay.
    pub fn new(duration: Duration, easing: Easing) -> Self {
        Self {
            duration,
            easing,
            delay: Duration::ZERO,
        }
    }

    /// Returns a copy that starts after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Eased progress after `elapsed` time, counting the start delay.
    pub fn progress(&self, elapsed: Duration) -> f32 {
        let Some(running) = elapsed.checked_sub(self.delay) else {
            return 0.0;
        };
        if self.duration.is_zero() {
            return 1.0;
        }
        let t = running.as_secs_f32() / self.duration.as_secs_f32();
        self.easing.apply(t)
    }

    /// Total wall time until the animation completes.
    pub fn total(&self) -> Duration {
        self.delay + self.duration
    }
}

impl Default for Animation {
    fn default() -> Self {
        Self::new(Duration::from_millis(400), Easing::default())
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;

    #[test]
    fn test_easing_endpoints() {
        for easing in [
            Easing::Linear,
            Easing::EaseInOutCubic,
            Easing::default(),
            Easing::Spring {
                tension: 100.0,
                friction: 40.0,
            },
        ] {
            assert_approx_eq!(f32, easing.apply(0.0), 0.0, epsilon = 0.0001);
            assert_eq!(easing.apply(1.0), 1.0);
        }
    }

    #[test]
    fn test_easing_clamps_input() {
        assert_eq!(Easing::Linear.apply(-1.0), 0.0);
        assert_eq!(Easing::Linear.apply(2.0), 1.0);
    }

    #[test]
    fn test_spring_settles_near_target() {
        let value = Easing::default().apply(0.95);
        assert!((value - 1.0).abs() < 0.05, "spring not settled: {value}");
    }

    #[test]
    fn test_animation_progress_respects_delay() {
        let animation = Animation::new(Duration::from_millis(100), Easing::Linear)
            .with_delay(Duration::from_millis(50));

        assert_eq!(animation.progress(Duration::from_millis(20)), 0.0);
        assert_approx_eq!(
            f32,
            animation.progress(Duration::from_millis(100)),
            0.5,
            epsilon = 0.001
        );
        assert_eq!(animation.progress(Duration::from_millis(150)), 1.0);
        assert_eq!(animation.total(), Duration::from_millis(150));
    }

    #[test]
    fn test_easing_deserialize() {
        let easing: Easing =
            serde_json::from_str(r#"{"kind": "spring", "tension": 300, "friction": 10}"#).unwrap();
        assert_eq!(
            easing,
            Easing::Spring {
                tension: 300.0,
                friction: 10.0
            }
        );
        let linear: Easing = serde_json::from_str(r#"{"kind": "linear"}"#).unwrap();
        assert_eq!(linear, Easing::Linear);
    }
}
