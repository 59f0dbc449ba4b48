//! Follows a timed trajectory with feedforward and proportional feedback.
//!
//! The follower is a small state machine. A new trajectory starts in [FollowerState::Aligning],
//! where the wheels are steered towards the initial direction of travel before the vehicle
//! moves, then switches to [FollowerState::Tracking] and finally to [FollowerState::Done] when
//! the trajectory runs out.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::drivetrain::SwerveDrive;
use crate::geometry::{angle_modulus, FieldRelativeVelocity};
use crate::state::SwerveModel;
use crate::trajectory::{Trajectory, TrajectoryTimeIterator};
use crate::Error;

#[cfg(test)]
#[path = "follower_tests.rs"]
mod follower_tests;

/// The gains and tolerances of a [TrajectoryFollower].
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct FollowerConfig {
    /// The position gain, in 1/s.
    pub kp_cartesian: f64,

    /// The heading gain, in 1/s.
    pub kp_theta: f64,

    /// The velocity gain for translation. Zero disables the velocity term.
    pub kp_cartesian_velocity: f64,

    /// The velocity gain for rotation. Zero disables the velocity term.
    pub kp_theta_velocity: f64,

    /// The control period, used to look ahead while aligning, in seconds.
    pub nominal_period_s: f64,

    /// The position error at which the vehicle counts as on the reference, in meters.
    pub position_tolerance_m: f64,

    /// The heading error at which the vehicle counts as on the reference, in radians.
    pub heading_tolerance_rad: f64,

    /// The velocity error at which the vehicle counts as on the reference, in m/s and rad/s.
    pub velocity_tolerance: f64,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            kp_cartesian: 2.4,
            kp_theta: 1.3,
            kp_cartesian_velocity: 0.0,
            kp_theta_velocity: 0.0,
            nominal_period_s: 0.02,
            position_tolerance_m: 0.05,
            heading_tolerance_rad: 0.05,
            velocity_tolerance: 0.05,
        }
    }
}

/// The states of a [TrajectoryFollower].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FollowerState {
    /// No trajectory.
    Idle,

    /// Steering the wheels before moving.
    Aligning,

    /// Following the trajectory.
    Tracking,

    /// The trajectory has ended.
    Done,
}

/// Follows a trajectory in time.
pub struct TrajectoryFollower {
    config: FollowerConfig,
    state: FollowerState,
    iter: Option<TrajectoryTimeIterator>,
    prev_time_s: Option<f64>,
    reference: Option<SwerveModel>,
}

impl TrajectoryFollower {
    /// Returns the velocity the vehicle should start with, looking one control period ahead
    /// without moving along the trajectory. Returns `None` if there is nothing to follow.
    pub fn alignment_target(&self, measured: &SwerveModel) -> Option<FieldRelativeVelocity> {
        let sample = self.iter.as_ref()?.preview(self.config.nominal_period_s)?;
        let reference = SwerveModel::from_timed_pose(&sample);
        Some(self.control(&reference, measured))
    }

    /// Returns `true` if the vehicle is within tolerance of the most recent reference.
    pub fn at_reference(&self, measured: &SwerveModel) -> bool {
        let Some(reference) = &self.reference else {
            return false;
        };
        let c = &self.config;
        let heading_error = angle_modulus(reference.theta.x - measured.theta.x);
        (reference.x.x - measured.x.x).abs() < c.position_tolerance_m
            && (reference.y.x - measured.y.x).abs() < c.position_tolerance_m
            && heading_error.abs() < c.heading_tolerance_rad
            && (reference.x.v - measured.x.v).abs() < c.velocity_tolerance
            && (reference.y.v - measured.y.v).abs() < c.velocity_tolerance
            && (reference.theta.v - measured.theta.v).abs() < c.velocity_tolerance
    }

    /// Drops the trajectory and returns to [FollowerState::Idle].
    pub fn clear(&mut self) {
        self.iter = None;
        self.prev_time_s = None;
        self.reference = None;
        self.state = FollowerState::Idle;
    }

    /// Runs one control cycle against `drive`.
    ///
    /// While aligning the wheels are steered at rest until they point the right way. While
    /// tracking the output of [TrajectoryFollower::update] is sent to the drive. Once the
    /// trajectory is done the drive is stopped. Cycles without a measured state are skipped.
    ///
    /// ## Parameters
    ///
    /// * `time_s` - The current time in seconds
    /// * `drive` - The vehicle
    pub fn execute(&mut self, time_s: f64, drive: &mut impl SwerveDrive) -> Result<(), Error> {
        if self.state == FollowerState::Idle {
            return Ok(());
        }
        if self.state == FollowerState::Done {
            return drive.stop();
        }

        let Some(measured) = drive.state() else {
            debug!("No measured state, skipping follower cycle");
            return Ok(());
        };

        match self.state {
            FollowerState::Aligning => match self.alignment_target(&measured) {
                Some(velocity) => {
                    if drive.steer_at_rest(velocity)? {
                        self.mark_aligned();
                    }
                    Ok(())
                }
                None => {
                    warn!("Nothing to align to, stopping");
                    self.state = FollowerState::Done;
                    drive.stop()
                }
            },
            _ => {
                let velocity = self.update(time_s, &measured);
                if self.state == FollowerState::Done && velocity == FieldRelativeVelocity::zero() {
                    drive.stop()
                } else {
                    drive.drive_in_field_coords(velocity)
                }
            }
        }
    }

    /// Returns `true` once the end of the trajectory has been reached.
    pub fn is_done(&self) -> bool {
        self.state == FollowerState::Done
    }

    /// Ends the alignment phase. The first update after this starts at the beginning of the
    /// trajectory.
    pub fn mark_aligned(&mut self) {
        if self.state == FollowerState::Aligning {
            debug!("Aligned, tracking");
            self.state = FollowerState::Tracking;
            self.prev_time_s = None;
        }
    }

    /// Creates a new, idle follower.
    pub fn new(config: FollowerConfig) -> Self {
        Self {
            config,
            state: FollowerState::Idle,
            iter: None,
            prev_time_s: None,
            reference: None,
        }
    }

    /// Returns the reference used in the most recent update.
    pub fn reference(&self) -> Option<&SwerveModel> {
        self.reference.as_ref()
    }

    /// Starts following `trajectory`. An empty trajectory is done immediately.
    pub fn set_trajectory(&mut self, trajectory: Trajectory) {
        self.prev_time_s = None;
        self.reference = None;
        if trajectory.is_empty() {
            debug!("Empty trajectory, nothing to follow");
            self.iter = None;
            self.state = FollowerState::Done;
        } else {
            self.iter = Some(TrajectoryTimeIterator::new(trajectory));
            self.state = FollowerState::Aligning;
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> FollowerState {
        self.state
    }

    /// Moves along the trajectory by the time elapsed since the previous update and returns the
    /// field relative velocity to drive at.
    ///
    /// The first update after alignment does not move. When there is nothing to sample the
    /// follower is done and the result is zero.
    pub fn update(&mut self, time_s: f64, measured: &SwerveModel) -> FieldRelativeVelocity {
        if self.state != FollowerState::Tracking {
            return FieldRelativeVelocity::zero();
        }

        let dt = self
            .prev_time_s
            .map(|prev| (time_s - prev).max(0.0))
            .unwrap_or(0.0);
        self.prev_time_s = Some(time_s);

        let Some(iter) = self.iter.as_mut() else {
            warn!("No trajectory to follow");
            self.state = FollowerState::Done;
            return FieldRelativeVelocity::zero();
        };
        let Some(sample) = iter.advance(dt) else {
            warn!("No trajectory sample, done");
            self.state = FollowerState::Done;
            return FieldRelativeVelocity::zero();
        };
        if iter.is_done() {
            debug!("Trajectory finished");
            self.state = FollowerState::Done;
        }

        let reference = SwerveModel::from_timed_pose(&sample);
        self.reference = Some(reference);
        self.control(&reference, measured)
    }

    fn control(&self, reference: &SwerveModel, measured: &SwerveModel) -> FieldRelativeVelocity {
        let c = &self.config;
        let feedforward = reference.velocity();

        let position = FieldRelativeVelocity::new(
            c.kp_cartesian * (reference.x.x - measured.x.x),
            c.kp_cartesian * (reference.y.x - measured.y.x),
            c.kp_theta * angle_modulus(reference.theta.x - measured.theta.x),
        );
        let velocity = FieldRelativeVelocity::new(
            c.kp_cartesian_velocity * (reference.x.v - measured.x.v),
            c.kp_cartesian_velocity * (reference.y.v - measured.y.v),
            c.kp_theta_velocity * (reference.theta.v - measured.theta.v),
        );

        feedforward.plus(&position).plus(&velocity)
    }
}
