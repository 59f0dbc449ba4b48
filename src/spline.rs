//! Quintic splines for holonomic paths.
//!
//! The translation of the vehicle follows a quintic Hermite spline in x and y, shaped by the
//! course at each end. The heading is interpolated separately, so the vehicle can face any
//! direction while it travels.

use nalgebra::Vector2;

use crate::geometry::{angle_modulus, shortest_angle_between, HolonomicPose2d, Pose2d};

#[cfg(test)]
#[path = "spline_tests.rs"]
mod spline_tests;

/// The length of the end derivatives relative to the distance between the end points.
const DERIVATIVE_SCALE: f64 = 1.2;

/// Below this parametric speed the spline has no defined course.
const MIN_SPEED: f64 = 1e-9;

/// The coefficients of a quintic polynomial, highest power first, and its value at 1.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Quintic {
    c: [f64; 6],
    end: f64,
}

impl Quintic {
    /// Creates the quintic with the given values and first derivatives at 0 and 1, and zero
    /// second derivatives at both ends.
    fn hermite(p0: f64, p1: f64, v0: f64, v1: f64) -> Self {
        Self {
            c: [
                -6.0 * p0 - 3.0 * v0 - 3.0 * v1 + 6.0 * p1,
                15.0 * p0 + 8.0 * v0 + 7.0 * v1 - 15.0 * p1,
                -10.0 * p0 - 6.0 * v0 - 4.0 * v1 + 10.0 * p1,
                0.0,
                v0,
                p0,
            ],
            end: p1,
        }
    }

    // The sum of the coefficients is not exactly p1 in floating point, so the end is pinned.
    fn value(&self, t: f64) -> f64 {
        if t >= 1.0 {
            return self.end;
        }
        self.c.iter().fold(0.0, |acc, c| acc * t + c)
    }

    fn first_derivative(&self, t: f64) -> f64 {
        let c = &self.c;
        (((5.0 * c[0] * t + 4.0 * c[1]) * t + 3.0 * c[2]) * t + 2.0 * c[3]) * t + c[4]
    }

    fn second_derivative(&self, t: f64) -> f64 {
        let c = &self.c;
        ((20.0 * c[0] * t + 12.0 * c[1]) * t + 6.0 * c[2]) * t + 2.0 * c[3]
    }
}

/// A spline between two holonomic waypoints, parameterized by `t` in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HolonomicSpline {
    x: Quintic,
    y: Quintic,
    start_heading: f64,
    heading_change: f64,
    end_heading: f64,
}

impl HolonomicSpline {
    /// Returns the direction of travel at `t`, or `None` where the spline does not move.
    pub fn course(&self, t: f64) -> Option<f64> {
        let (dx, dy) = self.velocity(t);
        if dx.hypot(dy) < MIN_SPEED {
            None
        } else {
            Some(dy.atan2(dx))
        }
    }

    /// Returns the signed curvature at `t`, in rad/m.
    pub fn curvature(&self, t: f64) -> f64 {
        let (dx, dy) = self.velocity(t);
        let ddx = self.x.second_derivative(t);
        let ddy = self.y.second_derivative(t);
        let speed = dx.hypot(dy);
        if speed < MIN_SPEED {
            return 0.0;
        }
        (dx * ddy - dy * ddx) / (speed * speed * speed)
    }

    /// Returns the heading at `t`.
    pub fn heading(&self, t: f64) -> f64 {
        if t >= 1.0 {
            return self.end_heading;
        }
        angle_modulus(self.start_heading + self.heading_change * smoothstep(t))
    }

    /// Returns the rate of change of the heading with respect to distance travelled at `t`, in
    /// rad/m.
    pub fn heading_rate(&self, t: f64) -> f64 {
        let (dx, dy) = self.velocity(t);
        let speed = dx.hypot(dy);
        if speed < MIN_SPEED {
            return 0.0;
        }
        self.heading_change * smoothstep_derivative(t) / speed
    }

    /// Creates the spline between two waypoints.
    ///
    /// ## Parameters
    ///
    /// * `start` - The waypoint at `t = 0`
    /// * `end` - The waypoint at `t = 1`
    ///
    /// ## Example
    ///
    /// ```
    /// use swerve_motion::geometry::HolonomicPose2d;
    /// use swerve_motion::spline::HolonomicSpline;
    ///
    /// let spline = HolonomicSpline::new(
    ///     &HolonomicPose2d::new(0.0, 0.0, 0.0, 0.0),
    ///     &HolonomicPose2d::new(1.0, 0.0, 0.0, 0.0),
    /// );
    ///
    /// assert!((spline.point(0.5).x - 0.5).abs() < 1e-9);
    /// ```
    pub fn new(start: &HolonomicPose2d, end: &HolonomicPose2d) -> Self {
        let chord = (end.translation - start.translation).norm();
        let scale = DERIVATIVE_SCALE * chord;

        let x = Quintic::hermite(
            start.translation.x,
            end.translation.x,
            scale * start.course.cos(),
            scale * end.course.cos(),
        );
        let y = Quintic::hermite(
            start.translation.y,
            end.translation.y,
            scale * start.course.sin(),
            scale * end.course.sin(),
        );

        Self {
            x,
            y,
            start_heading: start.heading,
            heading_change: shortest_angle_between(start.heading, end.heading),
            end_heading: angle_modulus(end.heading),
        }
    }

    /// Returns the position at `t`.
    pub fn point(&self, t: f64) -> Vector2<f64> {
        Vector2::new(self.x.value(t), self.y.value(t))
    }

    /// Returns the position and heading at `t`.
    pub fn pose(&self, t: f64) -> Pose2d {
        let p = self.point(t);
        Pose2d::new(p.x, p.y, self.heading(t))
    }

    /// Returns the derivative of the position with respect to `t`.
    pub fn velocity(&self, t: f64) -> (f64, f64) {
        (self.x.first_derivative(t), self.y.first_derivative(t))
    }
}

fn smoothstep(t: f64) -> f64 {
    t * t * t * (10.0 + t * (-15.0 + 6.0 * t))
}

fn smoothstep_derivative(t: f64) -> f64 {
    30.0 * t * t * (1.0 - t) * (1.0 - t)
}
