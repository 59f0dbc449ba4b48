use tracing::warn;

use crate::state::{Control, Model};
use crate::Error;

use super::{Profile, ResultWithEta};

#[cfg(test)]
#[path = "trapezoid_tests.rs"]
mod trapezoid_tests;

/// Slack allowed when checking the direction of a phase.
const PHASE_EPSILON: f64 = 1e-9;

/// A profile with bang-bang acceleration and a velocity limit.
///
/// The profile is solved in the phase plane. A path to the goal consists of an acceleration
/// phase towards a peak velocity, an optional cruise at the velocity limit, and a final phase
/// that brings the velocity to the goal velocity. There are two candidate paths, one that
/// peaks in the positive direction and one that peaks in the negative direction; the profile
/// follows the quickest one that is consistent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrapezoidProfile {
    max_velocity: f64,
    max_acceleration: f64,
    tolerance: f64,
}

/// A constant acceleration phase of a [TrapezoidPlan].
#[derive(Clone, Copy, Debug, PartialEq)]
struct Phase {
    acceleration: f64,
    duration: f64,
}

/// The full path from an initial state to a goal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrapezoidPlan {
    initial: Model,
    goal: Model,
    phases: [Phase; 3],
}

impl TrapezoidPlan {
    /// Returns the time needed to complete the plan.
    pub fn duration(&self) -> f64 {
        self.phases.iter().map(|p| p.duration).sum()
    }

    /// Returns the state `t` seconds after the start of the plan.
    pub fn sample(&self, t: f64) -> Control {
        if t >= self.duration() {
            return self.goal.control();
        }

        let mut x = self.initial.x;
        let mut v = self.initial.v;
        let mut remaining = t.max(0.0);
        for phase in self.phases.iter() {
            if remaining <= phase.duration {
                let a = phase.acceleration;
                return Control::new(
                    x + v * remaining + 0.5 * a * remaining * remaining,
                    v + a * remaining,
                    a,
                );
            }

            x += v * phase.duration + 0.5 * phase.acceleration * phase.duration * phase.duration;
            v += phase.acceleration * phase.duration;
            remaining -= phase.duration;
        }

        self.goal.control()
    }
}

impl TrapezoidProfile {
    /// Returns the acceleration limit.
    pub fn max_acceleration(&self) -> f64 {
        self.max_acceleration
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
    /// * `tolerance` - The distance from the goal, in both position and velocity, at which the
    ///   goal is considered reached
    pub fn new(max_velocity: f64, max_acceleration: f64, tolerance: f64) -> Result<Self, Error> {
        if !(max_velocity > 0.0) {
            return Err(Error::InvalidProfileParameter {
                name: "max_velocity".to_string(),
                value: max_velocity,
            });
        }

        if !(max_acceleration > 0.0) {
            return Err(Error::InvalidProfileParameter {
                name: "max_acceleration".to_string(),
                value: max_acceleration,
            });
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
            tolerance,
        })
    }

    /// Returns the quickest path from `initial` to `goal`, or `None` if neither candidate path
    /// is consistent.
    pub fn plan(&self, initial: Model, goal: Model) -> Option<TrapezoidPlan> {
        [1.0, -1.0]
            .iter()
            .filter_map(|s| self.candidate(*s, initial, goal))
            .min_by(|a, b| a.duration().total_cmp(&b.duration()))
    }

    /// Returns the tolerance used to decide that the goal is reached.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Builds the path that peaks in the direction `s`.
    fn candidate(&self, s: f64, initial: Model, goal: Model) -> Option<TrapezoidPlan> {
        let a = self.max_acceleration;
        let dx = goal.x - initial.x;
        let v0 = initial.v;
        let vg = goal.v;

        let peak_squared = s * a * dx + 0.5 * (v0 * v0 + vg * vg);
        if peak_squared < 0.0 {
            return None;
        }

        let peak = s * peak_squared.sqrt();
        if peak.abs() <= self.max_velocity {
            if s * (peak - v0) < -PHASE_EPSILON || s * (peak - vg) < -PHASE_EPSILON {
                return None;
            }

            return Some(TrapezoidPlan {
                initial,
                goal,
                phases: [
                    Phase {
                        acceleration: s * a,
                        duration: (s * (peak - v0)).max(0.0) / a,
                    },
                    Phase {
                        acceleration: 0.0,
                        duration: 0.0,
                    },
                    Phase {
                        acceleration: -s * a,
                        duration: (s * (peak - vg)).max(0.0) / a,
                    },
                ],
            });
        }

        // The peak is above the limit, so cruise at the limit. The initial velocity may itself
        // be beyond the limit, in which case the first phase slows down to it.
        let cruise = s * self.max_velocity;
        if s * (cruise - vg) < -PHASE_EPSILON {
            return None;
        }

        let first_acceleration = if cruise >= v0 { a } else { -a };
        let first_distance = (cruise * cruise - v0 * v0) / (2.0 * first_acceleration);
        let last_distance = (cruise * cruise - vg * vg) / (2.0 * s * a);
        let cruise_duration = (dx - first_distance - last_distance) / cruise;
        if cruise_duration < -PHASE_EPSILON {
            return None;
        }

        Some(TrapezoidPlan {
            initial,
            goal,
            phases: [
                Phase {
                    acceleration: first_acceleration,
                    duration: (cruise - v0).abs() / a,
                },
                Phase {
                    acceleration: 0.0,
                    duration: cruise_duration.max(0.0),
                },
                Phase {
                    acceleration: -s * a,
                    duration: (s * (cruise - vg)).max(0.0) / a,
                },
            ],
        })
    }
}

impl Profile for TrapezoidProfile {
    fn calculate_with_eta(&self, dt: f64, initial: Control, goal: Model) -> ResultWithEta {
        let initial = initial.model();
        if initial.near(&goal, self.tolerance) {
            return ResultWithEta {
                state: goal.control(),
                eta_s: 0.0,
            };
        }

        match self.plan(initial, goal) {
            Some(plan) => ResultWithEta {
                state: plan.sample(dt),
                eta_s: plan.duration(),
            },
            None => {
                // Only reachable for goals beyond the velocity limit; slow down.
                warn!(
                    initial = %initial,
                    goal = %goal,
                    "No feasible trapezoid path, braking"
                );
                let a = -initial.v.signum() * self.max_acceleration;
                let v = if (initial.v + a * dt).signum() == initial.v.signum() {
                    initial.v + a * dt
                } else {
                    0.0
                };
                ResultWithEta {
                    state: Control::new(initial.x + 0.5 * (initial.v + v) * dt, v, a),
                    eta_s: f64::INFINITY,
                }
            }
        }
    }

    fn scale(&self, s: f64) -> Self {
        Self {
            max_velocity: self.max_velocity,
            max_acceleration: s * self.max_acceleration,
            tolerance: self.tolerance,
        }
    }
}
