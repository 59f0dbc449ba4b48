//! Planar geometry for a holonomic vehicle.
//!
//! Poses are stored as [Isometry2] values so that composition, inversion and
//! transformation follow the usual rigid body rules. Velocities exist in two
//! frames: [FieldRelativeVelocity] in the fixed field frame and [ChassisSpeeds]
//! in the frame of the vehicle body. Converting between the two requires the
//! current heading of the vehicle.

use std::f64::consts::PI;
use std::fmt::Display;

use nalgebra::{Isometry2, UnitComplex, Vector2};

#[cfg(test)]
#[path = "geometry_tests.rs"]
mod geometry_tests;

/// Velocities below this magnitude are treated as stationary.
pub const STATIONARY_EPSILON: f64 = 1e-6;

/// Wraps an angle to the range [-PI, PI).
///
/// ## Parameters
///
/// * `angle` - The angle in radians
///
/// ## Example
///
/// ```
/// use core::f64::consts::PI;
/// use swerve_motion::geometry::angle_modulus;
///
/// let value = angle_modulus(1.5 * PI);
/// assert!((value + 0.5 * PI).abs() < 1e-12);
/// ```
pub fn angle_modulus(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Returns the signed shortest rotation that takes `start` to `end`.
pub fn shortest_angle_between(start: f64, end: f64) -> f64 {
    angle_modulus(end - start)
}

/// A change in pose expressed in the frame of the starting pose.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Twist2d {
    /// Change along the x axis of the starting frame.
    pub dx: f64,

    /// Change along the y axis of the starting frame.
    pub dy: f64,

    /// Change in heading.
    pub dtheta: f64,
}

impl Twist2d {
    /// Creates a new [Twist2d].
    pub fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Self { dx, dy, dtheta }
    }
}

/// A position and heading on the field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose2d {
    isometry: Isometry2<f64>,
}

impl Pose2d {
    /// Returns the pose obtained by following `twist` from this pose along a
    /// constant curvature arc.
    pub fn exp(&self, twist: &Twist2d) -> Pose2d {
        let (sin_theta, cos_theta) = twist.dtheta.sin_cos();
        let (s, c) = if twist.dtheta.abs() < 1e-9 {
            (
                1.0 - twist.dtheta * twist.dtheta / 6.0,
                0.5 * twist.dtheta,
            )
        } else {
            (
                sin_theta / twist.dtheta,
                (1.0 - cos_theta) / twist.dtheta,
            )
        };

        let delta = Pose2d::new(
            twist.dx * s - twist.dy * c,
            twist.dx * c + twist.dy * s,
            twist.dtheta,
        );
        self.transform_by(&delta)
    }

    /// Creates a pose from an existing isometry.
    pub fn from_isometry(isometry: Isometry2<f64>) -> Self {
        Self { isometry }
    }

    /// Returns the heading of the pose in radians, in the range [-PI, PI].
    pub fn heading(&self) -> f64 {
        self.isometry.rotation.angle()
    }

    /// Returns the identity pose, located at the origin and facing along the x axis.
    pub fn identity() -> Self {
        Self {
            isometry: Isometry2::identity(),
        }
    }

    /// Linearly interpolates the translation and the heading between this pose and
    /// `end`. The heading follows the shortest rotation.
    ///
    /// ## Parameters
    ///
    /// * `end` - The pose reached when `t` is 1.0
    /// * `t` - The interpolation fraction, clamped to [0, 1]
    pub fn interpolate(&self, end: &Pose2d, t: f64) -> Pose2d {
        let t = t.clamp(0.0, 1.0);
        let translation = self.translation() + (end.translation() - self.translation()) * t;
        let heading = self.heading() + shortest_angle_between(self.heading(), end.heading()) * t;
        Pose2d::new(translation.x, translation.y, heading)
    }

    /// Returns a reference to the underlying isometry.
    pub fn isometry(&self) -> &Isometry2<f64> {
        &self.isometry
    }

    /// Returns the twist that takes this pose to `end`, i.e. the inverse of [Pose2d::exp].
    pub fn log(&self, end: &Pose2d) -> Twist2d {
        let transform = end.relative_to(self);
        let dtheta = transform.heading();
        let half_dtheta = 0.5 * dtheta;
        let cos_minus_one = dtheta.cos() - 1.0;
        let half_theta_by_tan_of_half_dtheta = if cos_minus_one.abs() < 1e-9 {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * dtheta.sin()) / cos_minus_one
        };

        let x = transform.x();
        let y = transform.y();
        Twist2d::new(
            x * half_theta_by_tan_of_half_dtheta + y * half_dtheta,
            -x * half_dtheta + y * half_theta_by_tan_of_half_dtheta,
            dtheta,
        )
    }

    /// Creates a new pose.
    ///
    /// ## Parameters
    ///
    /// * `x` - The x coordinate in meters
    /// * `y` - The y coordinate in meters
    /// * `heading` - The heading in radians
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            isometry: Isometry2::new(Vector2::new(x, y), heading),
        }
    }

    /// Expresses this pose in the frame of `other`.
    pub fn relative_to(&self, other: &Pose2d) -> Pose2d {
        Pose2d::from_isometry(other.isometry.inv_mul(&self.isometry))
    }

    /// Returns the pose reached by applying `delta`, expressed in the frame of this
    /// pose.
    pub fn transform_by(&self, delta: &Pose2d) -> Pose2d {
        Pose2d::from_isometry(self.isometry * delta.isometry)
    }

    /// Returns the translation of the pose.
    pub fn translation(&self) -> Vector2<f64> {
        self.isometry.translation.vector
    }

    /// Returns the x coordinate of the pose.
    pub fn x(&self) -> f64 {
        self.isometry.translation.vector.x
    }

    /// Returns the y coordinate of the pose.
    pub fn y(&self) -> f64 {
        self.isometry.translation.vector.y
    }
}

impl Default for Pose2d {
    fn default() -> Self {
        Self::identity()
    }
}

impl Display for Pose2d {
    #[cfg_attr(test, mutants::skip)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pose2d [x: {:.3}, y: {:.3}, heading: {:.3}]",
            self.x(),
            self.y(),
            self.heading()
        )
    }
}

/// A waypoint for a holonomic path.
///
/// The heading is the direction the vehicle faces, the course is the direction
/// the vehicle travels in. For a holonomic vehicle the two are independent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HolonomicPose2d {
    /// The position of the waypoint.
    pub translation: Vector2<f64>,

    /// The heading of the vehicle at the waypoint, in radians.
    pub heading: f64,

    /// The direction of travel through the waypoint, in radians.
    pub course: f64,
}

impl HolonomicPose2d {
    /// Creates a new waypoint.
    pub fn new(x: f64, y: f64, heading: f64, course: f64) -> Self {
        Self {
            translation: Vector2::new(x, y),
            heading,
            course,
        }
    }
}

/// A velocity expressed in the field frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FieldRelativeVelocity {
    /// Velocity along the field x axis in m/s.
    pub x: f64,

    /// Velocity along the field y axis in m/s.
    pub y: f64,

    /// Rotational velocity in rad/s.
    pub theta: f64,
}

impl FieldRelativeVelocity {
    /// Returns the direction of travel, or `None` if the translation is stationary.
    pub fn angle(&self) -> Option<f64> {
        if self.norm() < STATIONARY_EPSILON {
            None
        } else {
            Some(self.y.atan2(self.x))
        }
    }

    /// Limits the translational speed to `max_velocity` and the rotational speed to
    /// `max_omega`, independently of each other.
    pub fn clamp(&self, max_velocity: f64, max_omega: f64) -> Self {
        let norm = self.norm();
        let ratio = if norm > max_velocity {
            max_velocity / norm
        } else {
            1.0
        };
        Self::new(
            self.x * ratio,
            self.y * ratio,
            self.theta.clamp(-max_omega, max_omega),
        )
    }

    /// Returns the component-wise difference.
    pub fn minus(&self, other: &FieldRelativeVelocity) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.theta - other.theta)
    }

    /// Creates a new velocity.
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    /// Returns the translational speed.
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Returns the component-wise sum.
    pub fn plus(&self, other: &FieldRelativeVelocity) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.theta + other.theta)
    }

    /// Scales all components by `scalar`.
    pub fn times(&self, scalar: f64) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.theta * scalar)
    }

    /// Converts the velocity to the body frame of a vehicle with the given heading.
    pub fn to_chassis_speeds(&self, heading: f64) -> ChassisSpeeds {
        let body = UnitComplex::new(-heading) * Vector2::new(self.x, self.y);
        ChassisSpeeds::new(body.x, body.y, self.theta)
    }

    /// Returns the zero velocity.
    pub fn zero() -> Self {
        Self::default()
    }
}

impl Display for FieldRelativeVelocity {
    #[cfg_attr(test, mutants::skip)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FieldRelativeVelocity [x: {:.3}, y: {:.3}, theta: {:.3}]",
            self.x, self.y, self.theta
        )
    }
}

/// A velocity expressed in the body frame of the vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChassisSpeeds {
    /// Forward velocity in m/s.
    pub vx: f64,

    /// Leftward velocity in m/s.
    pub vy: f64,

    /// Counter-clockwise rotational velocity in rad/s.
    pub omega: f64,
}

impl ChassisSpeeds {
    /// Returns the body velocity that, when held for `dt` seconds, moves the vehicle
    /// along the straight line and heading change implied by `self * dt`.
    ///
    /// Holding a combined translation and rotation for a full period traces an arc,
    /// which biases the realized path sideways. This corrects for that.
    pub fn discretize(&self, dt: f64) -> ChassisSpeeds {
        if dt <= 0.0 {
            return *self;
        }

        let desired = Pose2d::new(self.vx * dt, self.vy * dt, self.omega * dt);
        let twist = Pose2d::identity().log(&desired);
        ChassisSpeeds::new(twist.dx / dt, twist.dy / dt, twist.dtheta / dt)
    }

    /// Returns the component-wise difference.
    pub fn minus(&self, other: &ChassisSpeeds) -> Self {
        Self::new(self.vx - other.vx, self.vy - other.vy, self.omega - other.omega)
    }

    /// Creates a new set of chassis speeds.
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    /// Returns the translational speed.
    pub fn norm(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    /// Returns the component-wise sum.
    pub fn plus(&self, other: &ChassisSpeeds) -> Self {
        Self::new(self.vx + other.vx, self.vy + other.vy, self.omega + other.omega)
    }

    /// Scales all components by `scalar`.
    pub fn times(&self, scalar: f64) -> Self {
        Self::new(self.vx * scalar, self.vy * scalar, self.omega * scalar)
    }

    /// Converts the velocity to the field frame, given the heading of the vehicle.
    pub fn to_field_relative(&self, heading: f64) -> FieldRelativeVelocity {
        let field = UnitComplex::new(heading) * Vector2::new(self.vx, self.vy);
        FieldRelativeVelocity::new(field.x, field.y, self.omega)
    }

    /// Inverts [ChassisSpeeds::discretize].
    pub fn undiscretize(&self, dt: f64) -> ChassisSpeeds {
        if dt <= 0.0 {
            return *self;
        }

        let twist = Twist2d::new(self.vx * dt, self.vy * dt, self.omega * dt);
        let pose = Pose2d::identity().exp(&twist);
        ChassisSpeeds::new(pose.x() / dt, pose.y() / dt, pose.heading() / dt)
    }

    /// Returns `true` if every component is within `epsilon` of zero.
    pub fn is_stationary(&self, epsilon: f64) -> bool {
        self.vx.abs() < epsilon && self.vy.abs() < epsilon && self.omega.abs() < epsilon
    }

    /// Returns the zero velocity.
    pub fn zero() -> Self {
        Self::default()
    }
}

impl Display for ChassisSpeeds {
    #[cfg_attr(test, mutants::skip)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ChassisSpeeds [vx: {:.3}, vy: {:.3}, omega: {:.3}]",
            self.vx, self.vy, self.omega
        )
    }
}
