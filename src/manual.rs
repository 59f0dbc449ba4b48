//! Turns driver input into field relative velocities.
//!
//! Driver input is a [DriverVelocity] with every component in [-1, 1]. A [FieldRelativeDriver]
//! scales it to the limits of the vehicle and makes the result feasible. The heading snapping
//! drivers also steer the heading towards a goal set with [FieldRelativeDriver::snap_to], until
//! the driver asks for rotation again.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::geometry::{angle_modulus, FieldRelativeVelocity};
use crate::kinodynamics::SwerveKinodynamics;
use crate::number_space::NumberSpaceType;
use crate::profile::min_time::{MinTimeController, MinTimeParameters};
use crate::profile::trapezoid::TrapezoidProfile;
use crate::profile::{Profile, WrappedProfile};
use crate::state::{Control, Model, SwerveModel};
use crate::Error;

#[cfg(test)]
#[path = "manual_tests.rs"]
mod manual_tests;

/// The control period the heading profiles are stepped with, in seconds.
pub const NOMINAL_PERIOD_S: f64 = 0.02;

/// The proportional gain on the heading error while snapping.
const HEADING_KP: f64 = 3.5;

/// The heading error at which a snap is complete, in radians.
const HEADING_TOLERANCE: f64 = 0.01;

/// Rotation input below this magnitude does not cancel a snap.
const ROTATION_DEADBAND: f64 = 1e-3;

/// Driver input, each component in [-1, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriverVelocity {
    /// Forward, along the field x axis.
    pub x: f64,

    /// Left, along the field y axis.
    pub y: f64,

    /// Counter-clockwise rotation.
    pub theta: f64,
}

impl DriverVelocity {
    /// Clips the translation to the unit circle and the rotation to [-1, 1].
    pub fn clip(&self) -> Self {
        let norm = self.x.hypot(self.y);
        let ratio = if norm > 1.0 { 1.0 / norm } else { 1.0 };
        Self::new(self.x * ratio, self.y * ratio, self.theta.clamp(-1.0, 1.0))
    }

    /// Creates a new input.
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    /// Scales the input to the given maximum speeds.
    pub fn scale(&self, max_velocity: f64, max_omega: f64) -> FieldRelativeVelocity {
        FieldRelativeVelocity::new(
            self.x * max_velocity,
            self.y * max_velocity,
            self.theta * max_omega,
        )
    }
}

/// Turns driver input into a field relative velocity, one control cycle at a time.
pub trait FieldRelativeDriver: Send {
    /// Returns the velocity for this cycle.
    ///
    /// ## Parameters
    ///
    /// * `state` - The measured state of the vehicle
    /// * `input` - The driver input
    fn apply(&mut self, state: &SwerveModel, input: DriverVelocity) -> FieldRelativeVelocity;

    /// Clears any internal state, starting again from `state`.
    fn reset(&mut self, state: &SwerveModel);

    /// Asks for the heading to be turned to `heading`. Drivers that do not control the heading
    /// ignore this.
    fn snap_to(&mut self, _heading: f64) {}
}

/// Scales the input to the limits of the vehicle, with no heading control.
pub struct ManualFieldRelativeSpeeds {
    kinodynamics: SwerveKinodynamics,
}

impl ManualFieldRelativeSpeeds {
    /// Creates a new driver.
    pub fn new(kinodynamics: SwerveKinodynamics) -> Self {
        Self { kinodynamics }
    }
}

impl FieldRelativeDriver for ManualFieldRelativeSpeeds {
    fn apply(&mut self, _state: &SwerveModel, input: DriverVelocity) -> FieldRelativeVelocity {
        scaled_input(&self.kinodynamics, input)
    }

    fn reset(&mut self, _state: &SwerveModel) {}
}

/// Drives with heading snapping, where the heading follows a trapezoid profile towards the
/// goal plus proportional feedback on the profile error.
pub struct ManualWithProfiledHeading {
    kinodynamics: SwerveKinodynamics,
    profile: WrappedProfile<TrapezoidProfile>,
    goal: Option<f64>,
    setpoint: Control,
}

impl ManualWithProfiledHeading {
    /// Returns the heading goal, if snapping.
    pub fn goal(&self) -> Option<f64> {
        self.goal
    }

    /// Creates a new driver. The heading profile uses the full rotational speed and half of
    /// the rotational acceleration of the vehicle.
    pub fn new(kinodynamics: SwerveKinodynamics) -> Result<Self, Error> {
        let profile = TrapezoidProfile::new(
            kinodynamics.max_angular_speed(),
            0.5 * kinodynamics.max_angular_acceleration(),
            HEADING_TOLERANCE,
        )?;
        Ok(Self {
            kinodynamics,
            profile: WrappedProfile::new(profile, NumberSpaceType::angle()),
            goal: None,
            setpoint: Control::default(),
        })
    }

    /// Returns the heading reference of the most recent cycle.
    pub fn setpoint(&self) -> Control {
        self.setpoint
    }
}

impl FieldRelativeDriver for ManualWithProfiledHeading {
    fn apply(&mut self, state: &SwerveModel, input: DriverVelocity) -> FieldRelativeVelocity {
        let scaled = scaled_input(&self.kinodynamics, input);
        if input.theta.abs() > ROTATION_DEADBAND && self.goal.is_some() {
            debug!("Rotation input, leaving heading snap");
            self.goal = None;
        }

        let Some(goal) = self.goal else {
            self.setpoint = state.theta.control();
            return scaled;
        };

        self.setpoint =
            self.profile
                .calculate(NOMINAL_PERIOD_S, self.setpoint, Model::new(goal, 0.0));
        let feedback = HEADING_KP * angle_modulus(self.setpoint.x - state.theta.x);
        let max_omega = self.kinodynamics.max_angular_speed();
        let omega = (self.setpoint.v + feedback).clamp(-max_omega, max_omega);
        trace!(goal, setpoint = %self.setpoint, omega, "Profiled heading");

        self.kinodynamics
            .analytic_desaturation(&FieldRelativeVelocity::new(scaled.x, scaled.y, omega))
    }

    fn reset(&mut self, state: &SwerveModel) {
        self.goal = None;
        self.setpoint = state.theta.control();
    }

    fn snap_to(&mut self, heading: f64) {
        self.goal = Some(angle_modulus(heading));
    }
}

/// Drives with heading snapping, where the heading is controlled by a [MinTimeController].
pub struct ManualWithMinTimeHeading {
    kinodynamics: SwerveKinodynamics,
    controller: MinTimeController,
    goal: Option<f64>,
    setpoint: Control,
}

impl ManualWithMinTimeHeading {
    /// Returns the heading goal, if snapping.
    pub fn goal(&self) -> Option<f64> {
        self.goal
    }

    /// Creates a new driver. The switching curve uses half the rotational acceleration of the
    /// vehicle.
    pub fn new(kinodynamics: SwerveKinodynamics) -> Result<Self, Error> {
        let switching = 0.5 * kinodynamics.max_angular_acceleration();
        let controller = MinTimeController::new(MinTimeParameters {
            space: NumberSpaceType::angle(),
            max_velocity: kinodynamics.max_angular_speed(),
            switching_acceleration: switching,
            weak_acceleration: 0.9 * switching,
            strong_acceleration: 1.1 * switching,
            tolerance: HEADING_TOLERANCE,
            finish_zone: 0.1,
            gains: [10.0, 5.0],
        })?;
        Ok(Self {
            kinodynamics,
            controller,
            goal: None,
            setpoint: Control::default(),
        })
    }

    /// Returns the heading reference of the most recent cycle.
    pub fn setpoint(&self) -> Control {
        self.setpoint
    }
}

impl FieldRelativeDriver for ManualWithMinTimeHeading {
    fn apply(&mut self, state: &SwerveModel, input: DriverVelocity) -> FieldRelativeVelocity {
        let scaled = scaled_input(&self.kinodynamics, input);
        if input.theta.abs() > ROTATION_DEADBAND && self.goal.is_some() {
            debug!("Rotation input, leaving heading snap");
            self.goal = None;
        }

        let Some(goal) = self.goal else {
            self.setpoint = state.theta.control();
            return scaled;
        };

        self.setpoint =
            self.controller
                .calculate(NOMINAL_PERIOD_S, state.theta, Model::new(goal, 0.0));
        trace!(goal, setpoint = %self.setpoint, "Min time heading");

        self.kinodynamics.analytic_desaturation(&FieldRelativeVelocity::new(
            scaled.x,
            scaled.y,
            self.setpoint.v,
        ))
    }

    fn reset(&mut self, state: &SwerveModel) {
        self.goal = None;
        self.setpoint = state.theta.control();
    }

    fn snap_to(&mut self, heading: f64) {
        self.goal = Some(angle_modulus(heading));
    }
}

/// The manual driving strategies.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualMode {
    /// [ManualFieldRelativeSpeeds]
    #[default]
    FieldRelative,

    /// [ManualWithProfiledHeading]
    ProfiledHeading,

    /// [ManualWithMinTimeHeading]
    MinTimeHeading,
}

impl ManualMode {
    /// Creates the driver for this mode.
    pub fn build(
        &self,
        kinodynamics: SwerveKinodynamics,
    ) -> Result<Box<dyn FieldRelativeDriver>, Error> {
        Ok(match self {
            ManualMode::FieldRelative => Box::new(ManualFieldRelativeSpeeds::new(kinodynamics)),
            ManualMode::ProfiledHeading => Box::new(ManualWithProfiledHeading::new(kinodynamics)?),
            ManualMode::MinTimeHeading => Box::new(ManualWithMinTimeHeading::new(kinodynamics)?),
        })
    }
}

/// Clips the input, scales it to the speed limits, which are not simultaneously feasible, and
/// desaturates the result.
fn scaled_input(kinodynamics: &SwerveKinodynamics, input: DriverVelocity) -> FieldRelativeVelocity {
    let scaled = input.clip().scale(
        kinodynamics.max_drive_velocity(),
        kinodynamics.max_angular_speed(),
    );
    kinodynamics.analytic_desaturation(&scaled)
}
