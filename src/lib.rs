#![warn(missing_docs)]

//! Motion planning and control for a holonomic swerve (4 wheel steering and 4 wheel drive)
//! vehicle.
//!
//! Provides the kinodynamic model of the vehicle, a setpoint generator that keeps wheel
//! commands within the actuator limits, a planner that builds time parameterized trajectories
//! through waypoints, a follower that tracks those trajectories, and a library of one
//! dimensional motion profiles.
//!
//! All computations are synchronous and allocation-light so they can run inside a fixed rate
//! control loop. Infeasible requests are scaled to the nearest feasible motion rather than
//! rejected. Errors are only returned when something is constructed from invalid parameters.

use thiserror::Error;

/// Loads the motion configuration from TOML.
pub mod config;

/// Connects motion control to the drive hardware.
pub mod drivetrain;

/// Follows timed trajectories.
pub mod follower;

/// Defines poses, twists and velocities in the plane.
pub mod geometry;

/// Defines the kinematics and the limits of a swerve vehicle.
pub mod kinodynamics;

/// Limits field relative velocity commands.
pub mod limiter;

/// Turns driver input into velocities.
pub mod manual;

/// Defines different number spaces
pub mod number_space;

/// Samples splines into paths.
pub mod path;

/// Plans trajectories through waypoints.
pub mod planner;

/// Defines one dimensional motion profiles.
pub mod profile;

/// Limits chassis speed changes to what the wheels can do.
pub mod setpoint_generator;

/// Defines the splines that paths are built from.
pub mod spline;

/// Defines the state of an axis and of the vehicle.
pub mod state;

/// Assigns times and velocities to paths.
pub mod timing;

/// Defines timed trajectories.
pub mod trajectory;

/// Defines the different errors for the swerve motion crate.
#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The output channel to the drive hardware has been closed.
    #[error("The module command channel is disconnected.")]
    CommandChannelDisconnected,

    /// The configuration could not be read.
    #[error("The configuration is invalid: {0}")]
    InvalidConfiguration(String),

    /// A timing constraint was created with an invalid value.
    #[error("The timing constraint parameter {name} has an invalid value: {value}")]
    InvalidConstraintParameter {
        /// The name of the parameter
        name: String,

        /// The value of the parameter
        value: f64,
    },

    /// A vehicle was described with an invalid value.
    #[error("The kinodynamics parameter {name} has an invalid value: {value}")]
    InvalidKinodynamicsParameter {
        /// The name of the parameter
        name: String,

        /// The value of the parameter
        value: f64,
    },

    /// A motion profile was created with an invalid limit.
    #[error("The profile parameter {name} has an invalid value: {value}")]
    InvalidProfileParameter {
        /// The name of the parameter
        name: String,

        /// The value of the parameter
        value: f64,
    },

    /// The wheel layout does not determine the motion of the chassis.
    #[error("The forward kinematics of the vehicle are singular.")]
    SingularKinematics,
}
