//! Limits field relative velocity commands before they reach the setpoint generator.

use tracing::trace;

use crate::geometry::FieldRelativeVelocity;
use crate::kinodynamics::SwerveKinodynamics;
use crate::state::SwerveModel;

#[cfg(test)]
#[path = "limiter_tests.rs"]
mod limiter_tests;

/// Keeps a field relative velocity command feasible.
///
/// The command is first scaled to a speed the wheels can reach, keeping its direction. The
/// change of the cartesian velocity from the current measurement is then limited to what the
/// vehicle can do in one period without tipping over. The rotation is not limited by the second
/// step.
#[derive(Clone, Debug)]
pub struct SwerveLimiter {
    kinodynamics: SwerveKinodynamics,
    period_s: f64,
}

impl SwerveLimiter {
    /// Returns the command to send this cycle, given the current state and the desired command.
    ///
    /// ## Parameters
    ///
    /// * `current` - The measured state of the vehicle
    /// * `next` - The desired velocity
    pub fn apply(&self, current: &SwerveModel, next: FieldRelativeVelocity) -> FieldRelativeVelocity {
        let feasible = self.kinodynamics.analytic_desaturation(&next);
        self.limit_capsize(&current.velocity(), feasible)
    }

    /// Creates a limiter for the given vehicle, running every `period_s` seconds.
    pub fn new(kinodynamics: SwerveKinodynamics, period_s: f64) -> Self {
        Self {
            kinodynamics,
            period_s,
        }
    }

    fn limit_capsize(
        &self,
        current: &FieldRelativeVelocity,
        target: FieldRelativeVelocity,
    ) -> FieldRelativeVelocity {
        let dx = target.x - current.x;
        let dy = target.y - current.y;
        let change = dx.hypot(dy);
        let max_change = self.kinodynamics.max_capsize_acceleration() * self.period_s;
        if change <= max_change {
            return target;
        }

        let s = max_change / change;
        trace!(s, "Capsize limit");
        FieldRelativeVelocity::new(current.x + s * dx, current.y + s * dy, target.theta)
    }
}
