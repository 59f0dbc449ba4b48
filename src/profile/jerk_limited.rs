use tracing::{debug, warn};

use crate::state::{Control, Model};
use crate::Error;

use super::{Profile, ResultWithEta};

#[cfg(test)]
#[path = "jerk_limited_tests.rs"]
mod jerk_limited_tests;

/// The maximum number of bisection steps taken when searching for the peak velocity.
const MAX_PEAK_ITERATIONS: usize = 40;

/// Distances below this are treated as exact.
const DISTANCE_EPSILON: f64 = 1e-9;

/// A constant jerk segment of a [JerkLimitedMotion].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    /// The state at the start of the segment.
    pub start: Control,

    /// The jerk applied during the segment.
    pub jerk: f64,

    /// The length of the segment in seconds.
    pub duration: f64,
}

impl Segment {
    /// Returns the state at the end of the segment.
    pub fn end(&self) -> Control {
        self.at(self.duration)
    }

    /// Returns the state `t` seconds into the segment.
    pub fn at(&self, t: f64) -> Control {
        let Control { x, v, a } = self.start;
        let j = self.jerk;
        Control::new(
            x + v * t + a * t * t / 2.0 + j * t * t * t / 6.0,
            v + a * t + j * t * t / 2.0,
            a + j * t,
        )
    }
}

/// A complete jerk limited motion, as a sequence of constant jerk segments.
#[derive(Clone, Debug, PartialEq)]
pub struct JerkLimitedMotion {
    initial: Control,
    segments: Vec<Segment>,
}

impl JerkLimitedMotion {
    /// Returns the duration of the motion in seconds.
    pub fn duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Returns the state at the end of the motion.
    pub fn end(&self) -> Control {
        self.segments
            .last()
            .map(|s| s.end())
            .unwrap_or(self.initial)
    }

    /// Returns the state `t` seconds after the start of the motion.
    ///
    /// Times beyond the end of the motion return the end state, with the acceleration of the
    /// final segment held.
    pub fn sample(&self, t: f64) -> Control {
        let mut remaining = t.max(0.0);
        for segment in self.segments.iter() {
            if remaining <= segment.duration {
                return segment.at(remaining);
            }
            remaining -= segment.duration;
        }
        self.end()
    }

    /// Returns the segments of the motion.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn new(initial: Control) -> Self {
        Self {
            initial,
            segments: Vec::new(),
        }
    }

    fn push(&mut self, jerk: f64, duration: f64) {
        if duration <= 0.0 {
            return;
        }
        let start = self.end();
        self.segments.push(Segment {
            start,
            jerk,
            duration,
        });
    }
}

/// An S-curve profile with limits on velocity, acceleration and jerk.
///
/// The acceleration follows a trapezoid in time, so the velocity curve has no corners. The
/// profile honors a nonzero initial acceleration. When the goal is too close to reach without
/// passing it, the profile first stops and then plans a new move from rest.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JerkLimitedProfile {
    max_velocity: f64,
    max_acceleration: f64,
    max_jerk: f64,
    tolerance: f64,
}

impl JerkLimitedProfile {
    /// Plans the full motion from `initial` to `goal`. The goal acceleration is zero.
    pub fn generate(&self, initial: Control, goal: Model) -> JerkLimitedMotion {
        let motion = self.plan(initial, goal, true);
        debug!(
            duration = motion.duration(),
            segments = motion.segments().len(),
            "Planned jerk limited motion"
        );
        motion
    }

    /// Returns the acceleration limit.
    pub fn max_acceleration(&self) -> f64 {
        self.max_acceleration
    }

    /// Returns the jerk limit.
    pub fn max_jerk(&self) -> f64 {
        self.max_jerk
    }

    /// Returns the velocity limit.
    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    /// Creates a new profile.
    ///
    /// ## Parameters
    ///
    /// * `max_velocity` - The velocity limit, must be positive
    /// * `max_acceleration` - The acceleration limit, must be positive
    /// * `max_jerk` - The jerk limit, must be positive
    /// * `tolerance` - The distance from the goal at which the goal is considered reached
    pub fn new(
        max_velocity: f64,
        max_acceleration: f64,
        max_jerk: f64,
        tolerance: f64,
    ) -> Result<Self, Error> {
        for (name, value) in [
            ("max_velocity", max_velocity),
            ("max_acceleration", max_acceleration),
            ("max_jerk", max_jerk),
        ] {
            if !(value > 0.0) {
                return Err(Error::InvalidProfileParameter {
                    name: name.to_string(),
                    value,
                });
            }
        }

        if !(tolerance >= 0.0) {
            return Err(Error::InvalidProfileParameter {
                name: "tolerance".to_string(),
                value: tolerance,
            });
        }

        Ok(Self {
            max_velocity,
            max_acceleration,
            max_jerk,
            tolerance,
        })
    }

    /// Appends the segments that take the velocity from the current end of `motion` to
    /// `target_velocity`, finishing with zero acceleration.
    fn change_velocity(&self, motion: &mut JerkLimitedMotion, target_velocity: f64) {
        let start = motion.end();
        let j = self.max_jerk;
        let a0 = start.a;

        // the velocity reached by bringing the acceleration straight back to zero
        let coasting = start.v + a0 * a0.abs() / (2.0 * j);
        let delta = target_velocity - coasting;
        if delta.abs() < DISTANCE_EPSILON {
            motion.push(-a0.signum() * j, a0.abs() / j);
            return;
        }

        let direction = delta.signum();
        let a0 = direction * a0;
        let dv = direction * (target_velocity - start.v);

        let peak_squared = j * dv + 0.5 * a0 * a0;
        let (peak, hold) = if peak_squared > self.max_acceleration * self.max_acceleration {
            let peak = self.max_acceleration;
            (peak, (dv - (2.0 * peak * peak - a0 * a0) / (2.0 * j)) / peak)
        } else {
            (peak_squared.sqrt(), 0.0)
        };

        motion.push(direction * j, (peak - a0) / j);
        motion.push(0.0, hold);
        motion.push(-direction * j, peak / j);
    }

    /// Returns the motion from `start` that changes velocity to `peak`, cruises for
    /// `cruise_time`, and then changes velocity to `goal_velocity`.
    fn through_peak(
        &self,
        start: &JerkLimitedMotion,
        peak: f64,
        cruise_time: f64,
        goal_velocity: f64,
    ) -> JerkLimitedMotion {
        let mut motion = start.clone();
        self.change_velocity(&mut motion, peak);
        motion.push(0.0, cruise_time);
        self.change_velocity(&mut motion, goal_velocity);
        motion
    }

    fn plan(&self, initial: Control, goal: Model, allow_replan: bool) -> JerkLimitedMotion {
        let initial = Control::new(
            initial.x,
            initial.v,
            initial
                .a
                .clamp(-self.max_acceleration, self.max_acceleration),
        );
        let start = JerkLimitedMotion::new(initial);

        let mut direct = start.clone();
        self.change_velocity(&mut direct, goal.v);
        let remaining = goal.x - direct.end().x;
        if remaining.abs() < DISTANCE_EPSILON {
            return direct;
        }

        let sigma = remaining.signum();
        let base = if sigma > 0.0 {
            initial.v.max(goal.v)
        } else {
            initial.v.min(goal.v)
        };
        let limit = sigma * self.max_velocity;

        // fast enough to cruise at the limit
        let at_limit = self.through_peak(&start, limit, 0.0, goal.v);
        let shortfall = goal.x - at_limit.end().x;
        if sigma * shortfall >= 0.0 {
            return self.through_peak(&start, limit, shortfall / limit, goal.v);
        }

        let at_base = self.through_peak(&start, base, 0.0, goal.v);
        if sigma * (goal.x - at_base.end().x) < 0.0 {
            if allow_replan {
                // the initial acceleration carries the motion past the goal; stop first
                let mut stop = start.clone();
                self.change_velocity(&mut stop, 0.0);
                let stopped = stop.end();
                let from_rest = self.plan(Control::new(stopped.x, 0.0, 0.0), goal, false);
                let mut motion = stop;
                for segment in from_rest.segments {
                    motion.push(segment.jerk, segment.duration);
                }
                return motion;
            }

            warn!(
                initial = %initial,
                goal = %goal,
                "Goal velocity cannot be reached before the goal position"
            );
            return at_base;
        }

        let mut low = base;
        let mut high = limit;
        let mut peak = base;
        for _ in 0..MAX_PEAK_ITERATIONS {
            peak = 0.5 * (low + high);
            let candidate = self.through_peak(&start, peak, 0.0, goal.v);
            let error = goal.x - candidate.end().x;
            if error.abs() < DISTANCE_EPSILON {
                break;
            }

            if sigma * error > 0.0 {
                low = peak;
            } else {
                high = peak;
            }
        }

        self.through_peak(&start, peak, 0.0, goal.v)
    }
}

impl Profile for JerkLimitedProfile {
    fn calculate_with_eta(&self, dt: f64, initial: Control, goal: Model) -> ResultWithEta {
        if initial.model().near(&goal, self.tolerance) {
            return ResultWithEta {
                state: goal.control(),
                eta_s: 0.0,
            };
        }

        let motion = self.plan(initial, goal, true);
        let duration = motion.duration();
        let state = if dt >= duration {
            goal.control()
        } else {
            motion.sample(dt)
        };

        ResultWithEta {
            state,
            eta_s: duration,
        }
    }

    fn scale(&self, s: f64) -> Self {
        Self {
            max_velocity: self.max_velocity,
            max_acceleration: s * self.max_acceleration,
            max_jerk: self.max_jerk,
            tolerance: self.tolerance,
        }
    }
}
