//! Timed trajectories and a cursor for walking them in time.

use std::fmt::Display;

use crate::geometry::Pose2d;
use crate::timing::TimedPose;

#[cfg(test)]
#[path = "trajectory_tests.rs"]
mod trajectory_tests;

/// A sequence of timed poses, ordered by time.
///
/// An empty trajectory is the result of planning something that cannot be planned. It can be
/// handed around like any other trajectory; sampling it yields nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectory {
    points: Vec<TimedPose>,
}

impl Trajectory {
    /// Returns the time at which the trajectory ends, in seconds.
    pub fn duration(&self) -> f64 {
        self.points.last().map(|p| p.time).unwrap_or(0.0)
    }

    /// Returns the point at `index`.
    pub fn get_point(&self, index: usize) -> Option<&TimedPose> {
        self.points.get(index)
    }

    /// Returns `true` if the trajectory has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the pose at the end of the trajectory.
    pub fn last_pose(&self) -> Option<Pose2d> {
        self.points.last().map(|p| p.point.pose)
    }

    /// Returns the number of points.
    pub fn length(&self) -> usize {
        self.points.len()
    }

    /// Creates a trajectory from points ordered by time.
    pub fn new(points: Vec<TimedPose>) -> Self {
        Self { points }
    }

    /// Returns all points.
    pub fn points(&self) -> &[TimedPose] {
        &self.points
    }

    /// Returns the state of the trajectory at `time`.
    ///
    /// Between points the motion is interpolated at the constant acceleration of the segment.
    /// Times before the start and after the end return the first and the last point.
    ///
    /// ## Parameters
    ///
    /// * `time` - Seconds from the start of the trajectory
    pub fn sample(&self, time: f64) -> Option<TimedPose> {
        let first = self.points.first()?;
        if time <= first.time {
            return Some(*first);
        }

        let i = self.points.partition_point(|p| p.time <= time);
        if i >= self.points.len() {
            return self.points.last().copied();
        }

        let start = &self.points[i - 1];
        let end = &self.points[i];
        let dt = time - start.time;
        let velocity = start.velocity + start.acceleration * dt;
        let distance = start.distance + start.velocity * dt + 0.5 * start.acceleration * dt * dt;

        let span = end.distance - start.distance;
        let fraction = if span > 0.0 {
            ((distance - start.distance) / span).clamp(0.0, 1.0)
        } else {
            (dt / (end.time - start.time)).clamp(0.0, 1.0)
        };

        Some(TimedPose::new(
            start.point.interpolate(&end.point, fraction),
            distance,
            time,
            velocity,
            start.acceleration,
        ))
    }
}

impl Display for Trajectory {
    #[cfg_attr(test, mutants::skip)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trajectory [points: {}, duration: {:.3}]",
            self.points.len(),
            self.duration()
        )
    }
}

/// A cursor that moves through a trajectory in time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrajectoryTimeIterator {
    trajectory: Trajectory,
    time: f64,
}

impl TrajectoryTimeIterator {
    /// Moves the cursor `dt` seconds forward and returns the state there. The cursor stops at
    /// the end of the trajectory.
    pub fn advance(&mut self, dt: f64) -> Option<TimedPose> {
        self.time = (self.time + dt.max(0.0)).min(self.trajectory.duration());
        self.sample()
    }

    /// Returns `true` once the cursor has reached the end of the trajectory.
    pub fn is_done(&self) -> bool {
        self.time >= self.trajectory.duration()
    }

    /// Creates a cursor at the start of `trajectory`.
    pub fn new(trajectory: Trajectory) -> Self {
        Self {
            trajectory,
            time: 0.0,
        }
    }

    /// Returns the state `dt` seconds ahead of the cursor, without moving it.
    pub fn preview(&self, dt: f64) -> Option<TimedPose> {
        let time = (self.time + dt.max(0.0)).min(self.trajectory.duration());
        self.trajectory.sample(time)
    }

    /// Returns the time left until the end of the trajectory, in seconds.
    pub fn remaining_progress(&self) -> f64 {
        (self.trajectory.duration() - self.time).max(0.0)
    }

    /// Returns the state at the cursor.
    pub fn sample(&self) -> Option<TimedPose> {
        self.trajectory.sample(self.time)
    }

    /// Returns the time of the cursor, in seconds from the start.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Returns the trajectory the cursor moves through.
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }
}
