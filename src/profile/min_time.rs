use tracing::trace;

use crate::number_space::{to_number_space, NumberSpaceType, ValueSpace};
use crate::state::{Control, Model};
use crate::Error;

use super::trapezoid::TrapezoidProfile;

#[cfg(test)]
#[path = "min_time_tests.rs"]
mod min_time_tests;

/// The parameters of a [MinTimeController].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinTimeParameters {
    /// The space the controlled value lives in.
    pub space: NumberSpaceType,

    /// The velocity limit.
    pub max_velocity: f64,

    /// The acceleration that defines the switching curve.
    pub switching_acceleration: f64,

    /// The acceleration used when speeding up towards the switching curve. Should be lower than
    /// the switching acceleration so the state reaches the curve smoothly.
    pub weak_acceleration: f64,

    /// The acceleration used when braking along the switching curve. Should be higher than the
    /// switching acceleration so the state can stay on the curve.
    pub strong_acceleration: f64,

    /// The distance from the goal at which the goal is considered reached.
    pub tolerance: f64,

    /// Inside this distance from the goal the controller switches to proportional control.
    pub finish_zone: f64,

    /// The position and velocity gains used inside the finish zone.
    pub gains: [f64; 2],
}

/// A bang-bang feedback controller that follows the minimum time switching curve.
///
/// Far from the goal the state is driven towards the switching curve, the parabola in the
/// phase plane along which a constant deceleration arrives at the goal. Close to the goal a
/// proportional controller takes over to avoid chattering around the curve.
///
/// In a periodic space both directions around the circle are evaluated and the controller
/// takes the one with the lower estimated time, which accounts for the current velocity rather
/// than always taking the shortest distance.
pub struct MinTimeController {
    parameters: MinTimeParameters,
    space: Box<dyn ValueSpace>,
    estimator: TrapezoidProfile,
}

impl MinTimeController {
    /// Returns the next reference state, `dt` seconds after `measurement`, on the way to
    /// `goal`.
    ///
    /// ## Parameters
    ///
    /// * `dt` - The time step in seconds
    /// * `measurement` - The current state
    /// * `goal` - The state to reach
    pub fn calculate(&self, dt: f64, measurement: Model, goal: Model) -> Control {
        let p = &self.parameters;
        if dt <= 0.0 {
            return measurement.control();
        }

        let error = self.choose_direction(measurement, goal);
        let target = measurement.x + error;

        if error.abs() < p.tolerance && (goal.v - measurement.v).abs() < p.tolerance {
            return Control::new(goal.x, goal.v, 0.0);
        }

        let a = if error.abs() < p.finish_zone {
            let a = p.gains[0] * error + p.gains[1] * (goal.v - measurement.v);
            a.clamp(-p.strong_acceleration, p.strong_acceleration)
        } else {
            self.switching_acceleration(dt, measurement, target, goal.v)
        };

        let v = (measurement.v + a * dt).clamp(-p.max_velocity, p.max_velocity);
        let a = (v - measurement.v) / dt;
        let x = measurement.x + measurement.v * dt + 0.5 * a * dt * dt;

        trace!(error, v, a, "Min time control");
        Control::new(self.space.normalize(x), v, a)
    }

    /// Creates a new controller.
    pub fn new(parameters: MinTimeParameters) -> Result<Self, Error> {
        for (name, value) in [
            ("max_velocity", parameters.max_velocity),
            ("switching_acceleration", parameters.switching_acceleration),
            ("weak_acceleration", parameters.weak_acceleration),
            ("strong_acceleration", parameters.strong_acceleration),
        ] {
            if !(value > 0.0) {
                return Err(Error::InvalidProfileParameter {
                    name: name.to_string(),
                    value,
                });
            }
        }

        let estimator = TrapezoidProfile::new(
            parameters.max_velocity,
            parameters.switching_acceleration,
            parameters.tolerance,
        )?;

        Ok(Self {
            parameters,
            space: to_number_space(parameters.space),
            estimator,
        })
    }

    /// Returns the parameters of the controller.
    pub fn parameters(&self) -> &MinTimeParameters {
        &self.parameters
    }

    /// Returns the signed distance to the goal along the quickest direction.
    fn choose_direction(&self, measurement: Model, goal: Model) -> f64 {
        let candidates = self.space.distances(measurement.x, goal.x);
        if candidates.backward.is_none() {
            return candidates.forward;
        }

        candidates
            .iter()
            .map(|d| {
                let eta = self
                    .estimator
                    .plan(Model::new(0.0, measurement.v), Model::new(d, goal.v))
                    .map(|plan| plan.duration())
                    .unwrap_or(f64::INFINITY);
                (d, eta)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.abs().total_cmp(&b.0.abs())))
            .map(|(d, _)| d)
            .unwrap_or(goal.x - measurement.x)
    }

    /// Returns the acceleration that drives the state towards the switching curve.
    fn switching_acceleration(&self, dt: f64, measurement: Model, target: f64, goal_v: f64) -> f64 {
        let p = &self.parameters;
        let error = target - measurement.x;
        let direction = error.signum();

        let curve = direction
            * (goal_v * goal_v + 2.0 * p.switching_acceleration * error.abs()).sqrt();
        let curve = curve.clamp(-p.max_velocity, p.max_velocity);

        let gap = curve - measurement.v;
        let needed = gap / dt;
        if direction * gap > 0.0 {
            direction * p.weak_acceleration.min(direction * needed)
        } else {
            -direction * p.strong_acceleration.min(-direction * needed)
        }
    }
}
