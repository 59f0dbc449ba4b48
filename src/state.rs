//! One dimensional kinematic state, and its composition into the planar state of a vehicle.
//!
//! [Model] is the measurable part of a state: position and velocity. [Control] adds the
//! acceleration that was used to reach it. Acceleration is only ever consumed as feedforward,
//! so projecting a [Control] onto a [Model] simply drops it.

use std::fmt::Display;

use crate::geometry::{angle_modulus, FieldRelativeVelocity, Pose2d};
use crate::timing::TimedPose;

#[cfg(test)]
#[path = "state_tests.rs"]
mod state_tests;

/// Position and velocity along one axis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Model {
    /// Position
    pub x: f64,

    /// Velocity
    pub v: f64,
}

impl Model {
    /// Returns the [Control] with the same position and velocity and zero acceleration.
    pub fn control(&self) -> Control {
        Control::new(self.x, self.v, 0.0)
    }

    /// Returns `true` if both position and velocity are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.v.is_finite()
    }

    /// Returns the component-wise difference.
    pub fn minus(&self, other: &Model) -> Model {
        Model::new(self.x - other.x, self.v - other.v)
    }

    /// Scales both components.
    pub fn mult(&self, scalar: f64) -> Model {
        Model::new(self.x * scalar, self.v * scalar)
    }

    /// Returns `true` if position and velocity are each within `tolerance` of `other`.
    pub fn near(&self, other: &Model, tolerance: f64) -> bool {
        (self.x - other.x).abs() < tolerance && (self.v - other.v).abs() < tolerance
    }

    /// Creates a new model state.
    pub fn new(x: f64, v: f64) -> Self {
        Self { x, v }
    }

    /// Returns the component-wise sum.
    pub fn plus(&self, other: &Model) -> Model {
        Model::new(self.x + other.x, self.v + other.v)
    }
}

impl Display for Model {
    #[cfg_attr(test, mutants::skip)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Model [x: {:.4}, v: {:.4}]", self.x, self.v)
    }
}

/// Position, velocity and acceleration along one axis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Control {
    /// Position
    pub x: f64,

    /// Velocity
    pub v: f64,

    /// Acceleration
    pub a: f64,
}

impl Control {
    /// Returns `true` if all components are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.v.is_finite() && self.a.is_finite()
    }

    /// Drops the acceleration.
    pub fn model(&self) -> Model {
        Model::new(self.x, self.v)
    }

    /// Returns `true` if position and velocity are each within `tolerance` of `other`.
    pub fn near(&self, other: &Control, tolerance: f64) -> bool {
        self.model().near(&other.model(), tolerance)
    }

    /// Creates a new control state.
    pub fn new(x: f64, v: f64, a: f64) -> Self {
        Self { x, v, a }
    }
}

impl Display for Control {
    #[cfg_attr(test, mutants::skip)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Control [x: {:.4}, v: {:.4}, a: {:.4}]",
            self.x, self.v, self.a
        )
    }
}

/// The field-relative state of a holonomic vehicle, one [Model] per axis.
///
/// The theta axis holds the heading, which wraps; the x and y axes do not.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SwerveModel {
    /// State along the field x axis.
    pub x: Model,

    /// State along the field y axis.
    pub y: Model,

    /// Heading and rotational velocity.
    pub theta: Model,
}

impl SwerveModel {
    /// Builds the reference state described by a trajectory sample.
    ///
    /// The velocity follows the course of the path, and the rotational velocity is the
    /// heading rate per meter multiplied by the speed along the path.
    pub fn from_timed_pose(timed_pose: &TimedPose) -> Self {
        let point = &timed_pose.point;
        let velocity = timed_pose.velocity;
        let (vx, vy) = match point.course {
            Some(course) => (velocity * course.cos(), velocity * course.sin()),
            None => (0.0, 0.0),
        };
        let omega = velocity * point.heading_rate;

        Self {
            x: Model::new(point.pose.x(), vx),
            y: Model::new(point.pose.y(), vy),
            theta: Model::new(point.pose.heading(), omega),
        }
    }

    /// Creates a new state from a pose and a field-relative velocity.
    pub fn new(pose: Pose2d, velocity: FieldRelativeVelocity) -> Self {
        Self {
            x: Model::new(pose.x(), velocity.x),
            y: Model::new(pose.y(), velocity.y),
            theta: Model::new(pose.heading(), velocity.theta),
        }
    }

    /// Returns `true` if every axis is within `tolerance` of `other`, comparing headings
    /// by their shortest distance.
    pub fn near(&self, other: &SwerveModel, tolerance: f64) -> bool {
        let heading_error = angle_modulus(self.theta.x - other.theta.x);
        self.x.near(&other.x, tolerance)
            && self.y.near(&other.y, tolerance)
            && heading_error.abs() < tolerance
            && (self.theta.v - other.theta.v).abs() < tolerance
    }

    /// Returns the pose part of the state.
    pub fn pose(&self) -> Pose2d {
        Pose2d::new(self.x.x, self.y.x, self.theta.x)
    }

    /// Returns the velocity part of the state.
    pub fn velocity(&self) -> FieldRelativeVelocity {
        FieldRelativeVelocity::new(self.x.v, self.y.v, self.theta.v)
    }
}
