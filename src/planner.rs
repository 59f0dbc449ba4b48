//! Plans timed trajectories through waypoints.
//!
//! Planning is cheap enough to run every control cycle. Inputs that describe no motion, or
//! motion that cannot be timed, produce an empty trajectory rather than an error, so a caller
//! that plans every cycle can treat "nothing to do" like any other plan.

use tracing::{debug, warn};

use crate::geometry::{HolonomicPose2d, Pose2d, STATIONARY_EPSILON};
use crate::path::{sample_splines, MAX_DTHETA, MAX_DX, MAX_DY};
use crate::spline::HolonomicSpline;
use crate::state::SwerveModel;
use crate::timing::{ScheduleGenerator, TimingConstraint};
use crate::trajectory::Trajectory;

#[cfg(test)]
#[path = "planner_tests.rs"]
mod planner_tests;

/// Plans trajectories under a fixed set of timing constraints.
pub struct TrajectoryPlanner {
    generator: ScheduleGenerator,
}

impl TrajectoryPlanner {
    /// Returns the constraints the planner times its trajectories with.
    pub fn constraints(&self) -> &[Box<dyn TimingConstraint>] {
        self.generator.constraints()
    }

    /// Returns a trajectory through the waypoints.
    ///
    /// ## Parameters
    ///
    /// * `waypoints` - The positions to pass through. The rotation of each pose is the course,
    ///   i.e. the direction of travel through the waypoint.
    /// * `headings` - The heading of the vehicle at each waypoint
    /// * `start_velocity` - The speed at the first waypoint
    /// * `end_velocity` - The speed at the last waypoint
    pub fn generate_trajectory(
        &self,
        waypoints: &[Pose2d],
        headings: &[f64],
        start_velocity: f64,
        end_velocity: f64,
    ) -> Trajectory {
        if waypoints.len() != headings.len() {
            warn!(
                waypoints = waypoints.len(),
                headings = headings.len(),
                "Mismatched waypoints and headings, returning an empty trajectory"
            );
            return Trajectory::default();
        }

        let waypoints = waypoints
            .iter()
            .zip(headings.iter())
            .map(|(pose, heading)| HolonomicPose2d::new(pose.x(), pose.y(), *heading, pose.heading()))
            .collect::<Vec<_>>();
        self.plan(&waypoints, start_velocity, end_velocity)
    }

    /// Returns a trajectory from a moving state to rest at `end`.
    ///
    /// The path leaves the start in the direction the vehicle is already moving, at its
    /// current speed. The speed is lowered if the constraints do not allow it.
    pub fn moving_to_rest(&self, start: &SwerveModel, end: Pose2d) -> Trajectory {
        let start_pose = start.pose();
        let chord = end.translation() - start_pose.translation();
        let to_end = chord.y.atan2(chord.x);

        let velocity = start.velocity();
        let course = velocity.angle().unwrap_or(to_end);

        let waypoints = [
            HolonomicPose2d::new(start_pose.x(), start_pose.y(), start_pose.heading(), course),
            HolonomicPose2d::new(end.x(), end.y(), end.heading(), to_end),
        ];
        self.plan(&waypoints, velocity.norm(), 0.0)
    }

    /// Creates a planner that applies the given constraints.
    pub fn new(constraints: Vec<Box<dyn TimingConstraint>>) -> Self {
        Self {
            generator: ScheduleGenerator::new(constraints),
        }
    }

    /// Returns a straight trajectory from rest at `start` to rest at `end`.
    ///
    /// ## Example
    ///
    /// ```
    /// use swerve_motion::geometry::Pose2d;
    /// use swerve_motion::kinodynamics::SwerveKinodynamics;
    /// use swerve_motion::planner::TrajectoryPlanner;
    /// use swerve_motion::timing::TimingConstraintFactory;
    ///
    /// let factory = TimingConstraintFactory::new(SwerveKinodynamics::for_test());
    /// let planner = TrajectoryPlanner::new(factory.for_test());
    ///
    /// let trajectory = planner.rest_to_rest(Pose2d::identity(), Pose2d::new(1.0, 0.0, 0.0));
    ///
    /// assert_eq!(80, trajectory.length());
    /// assert!((trajectory.duration() - 2.0).abs() < 0.01);
    /// ```
    pub fn rest_to_rest(&self, start: Pose2d, end: Pose2d) -> Trajectory {
        let chord = end.translation() - start.translation();
        let course = chord.y.atan2(chord.x);
        let waypoints = [
            HolonomicPose2d::new(start.x(), start.y(), start.heading(), course),
            HolonomicPose2d::new(end.x(), end.y(), end.heading(), course),
        ];
        self.plan(&waypoints, 0.0, 0.0)
    }

    /// Returns a trajectory through the waypoints, starting and ending at rest.
    pub fn rest_to_rest_waypoints(&self, waypoints: &[HolonomicPose2d]) -> Trajectory {
        self.plan(waypoints, 0.0, 0.0)
    }

    fn plan(&self, waypoints: &[HolonomicPose2d], start_velocity: f64, end_velocity: f64) -> Trajectory {
        if let Err(reason) = validate(waypoints, start_velocity, end_velocity) {
            warn!(reason, "Bad trajectory input, returning an empty trajectory");
            return Trajectory::default();
        }

        let splines = waypoints
            .windows(2)
            .map(|pair| HolonomicSpline::new(&pair[0], &pair[1]))
            .collect::<Vec<_>>();
        let path = sample_splines(&splines, MAX_DX, MAX_DY, MAX_DTHETA);
        let samples = path.resample(MAX_DX);

        let trajectory = self
            .generator
            .time_parameterize(&samples, start_velocity, end_velocity);
        debug!(%trajectory, "Planned trajectory");
        trajectory
    }
}

fn validate(
    waypoints: &[HolonomicPose2d],
    start_velocity: f64,
    end_velocity: f64,
) -> Result<(), &'static str> {
    if waypoints.len() < 2 {
        return Err("fewer than two waypoints");
    }
    if !(start_velocity.is_finite() && end_velocity.is_finite()) {
        return Err("non-finite velocity");
    }

    let finite = waypoints.iter().all(|w| {
        w.translation.x.is_finite()
            && w.translation.y.is_finite()
            && w.heading.is_finite()
            && w.course.is_finite()
    });
    if !finite {
        return Err("non-finite waypoint");
    }

    let coincident = waypoints
        .windows(2)
        .any(|pair| (pair[1].translation - pair[0].translation).norm() < STATIONARY_EPSILON);
    if coincident {
        return Err("coincident waypoints");
    }

    Ok(())
}
