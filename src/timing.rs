//! Assigns a speed and a time to every point of a path.
//!
//! Each [TimingConstraint] limits the speed along the path and the acceleration along the path
//! at a given point. The [ScheduleGenerator] runs a forward pass at maximum acceleration and a
//! backward pass at maximum deceleration, and keeps the lower of the two speeds at each point.

use std::fmt::Display;

use nalgebra::Vector2;
use tracing::{debug, warn};

use crate::geometry::ChassisSpeeds;
use crate::kinodynamics::SwerveKinodynamics;
use crate::path::PathPoint;
use crate::trajectory::Trajectory;
use crate::Error;

#[cfg(test)]
#[path = "timing_tests.rs"]
mod timing_tests;

/// Below this, accelerations and speeds are treated as zero when computing segment times.
const TIMING_EPSILON: f64 = 1e-9;

/// The speed along the path used where no constraint sets a limit, in m/s.
const UNCONSTRAINED_VELOCITY: f64 = 100.0;

/// The acceleration along the path used where no constraint sets a limit, in m/s^2.
const UNCONSTRAINED_ACCELERATION: f64 = 100.0;

/// A point on a path together with its place in the schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimedPose {
    /// The point on the path.
    pub point: PathPoint,

    /// The distance along the path, in meters.
    pub distance: f64,

    /// The time the point is reached, in seconds from the start of the schedule.
    pub time: f64,

    /// The speed along the path, in m/s.
    pub velocity: f64,

    /// The acceleration along the path from this point to the next, in m/s^2.
    pub acceleration: f64,
}

impl TimedPose {
    /// Creates a new timed pose.
    pub fn new(point: PathPoint, distance: f64, time: f64, velocity: f64, acceleration: f64) -> Self {
        Self {
            point,
            distance,
            time,
            velocity,
            acceleration,
        }
    }
}

impl Display for TimedPose {
    #[cfg_attr(test, mutants::skip)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TimedPose [t: {:.3}, s: {:.3}, v: {:.3}, a: {:.3}, pose: {}]",
            self.time, self.distance, self.velocity, self.acceleration, self.point.pose
        )
    }
}

/// An interval of allowed accelerations along the path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMaxAcceleration {
    /// The lowest allowed acceleration, usually negative.
    pub min: f64,

    /// The highest allowed acceleration.
    pub max: f64,
}

impl MinMaxAcceleration {
    /// No limit at all.
    pub const NO_LIMITS: MinMaxAcceleration = MinMaxAcceleration {
        min: f64::NEG_INFINITY,
        max: f64::INFINITY,
    };

    /// Returns the interval allowed by both `self` and `other`.
    pub fn intersect(&self, other: &MinMaxAcceleration) -> MinMaxAcceleration {
        MinMaxAcceleration::new(self.min.max(other.min), self.max.min(other.max))
    }

    /// Returns `true` if the interval is not empty.
    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    /// Creates a new interval.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// A limit on the motion along a path.
pub trait TimingConstraint: Send + Sync {
    /// Returns the highest allowed speed at `point`, in m/s.
    fn max_velocity(&self, point: &PathPoint) -> f64;

    /// Returns the allowed accelerations at `point` when moving at `velocity`.
    fn min_max_acceleration(&self, point: &PathPoint, velocity: f64) -> MinMaxAcceleration;
}

/// A fixed speed and acceleration limit. Deceleration is limited to the same magnitude.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantConstraint {
    max_velocity: f64,
    max_acceleration: f64,
}

impl ConstantConstraint {
    /// Creates a constraint from the drive limits of a vehicle, scaled down by the given
    /// factors.
    pub fn from_kinodynamics(
        kinodynamics: &SwerveKinodynamics,
        velocity_scale: f64,
        acceleration_scale: f64,
    ) -> Self {
        Self::new(
            kinodynamics.max_drive_velocity() * velocity_scale,
            kinodynamics.max_drive_acceleration() * acceleration_scale,
        )
    }

    /// Creates a new constraint.
    pub fn new(max_velocity: f64, max_acceleration: f64) -> Self {
        Self {
            max_velocity,
            max_acceleration,
        }
    }
}

impl TimingConstraint for ConstantConstraint {
    fn max_velocity(&self, _point: &PathPoint) -> f64 {
        self.max_velocity
    }

    fn min_max_acceleration(&self, _point: &PathPoint, _velocity: f64) -> MinMaxAcceleration {
        MinMaxAcceleration::new(-self.max_acceleration, self.max_acceleration)
    }
}

/// Limits the speed along the path so that no wheel exceeds its speed limit, taking the
/// rotation of the vehicle into account.
#[derive(Clone, Debug)]
pub struct SwerveDriveDynamicsConstraint {
    kinodynamics: SwerveKinodynamics,
}

impl SwerveDriveDynamicsConstraint {
    /// Creates a new constraint.
    pub fn new(kinodynamics: SwerveKinodynamics) -> Self {
        Self { kinodynamics }
    }
}

impl TimingConstraint for SwerveDriveDynamicsConstraint {
    fn max_velocity(&self, point: &PathPoint) -> f64 {
        let Some(course) = point.course else {
            return f64::INFINITY;
        };

        // the chassis speeds for 1 m/s along the path
        let direction = course - point.pose.heading();
        let unit = ChassisSpeeds::new(
            direction.cos(),
            direction.sin(),
            point.heading_rate,
        );
        let states = self.kinodynamics.to_module_states_without_discretization(&unit);
        let max_wheel_speed = states.max_speed();
        if max_wheel_speed < TIMING_EPSILON {
            return f64::INFINITY;
        }
        self.kinodynamics.max_drive_velocity() / max_wheel_speed
    }

    fn min_max_acceleration(&self, _point: &PathPoint, _velocity: f64) -> MinMaxAcceleration {
        MinMaxAcceleration::new(
            -self.kinodynamics.max_drive_deceleration(),
            self.kinodynamics.max_drive_acceleration(),
        )
    }
}

/// Limits the speed along the path so that the heading can keep up with the path.
///
/// The rotational limits of the vehicle are very high, so they are scaled down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YawRateConstraint {
    max_omega: f64,
    max_alpha: f64,
}

impl YawRateConstraint {
    /// Creates a new constraint.
    ///
    /// ## Parameters
    ///
    /// * `kinodynamics` - The vehicle
    /// * `scale` - The fraction of the rotational speed and acceleration limits to allow
    pub fn new(kinodynamics: &SwerveKinodynamics, scale: f64) -> Self {
        Self {
            max_omega: kinodynamics.max_angular_speed() * scale,
            max_alpha: kinodynamics.max_angular_acceleration() * scale,
        }
    }
}

impl TimingConstraint for YawRateConstraint {
    fn max_velocity(&self, point: &PathPoint) -> f64 {
        if point.course.is_none() || point.heading_rate.abs() < TIMING_EPSILON {
            return f64::INFINITY;
        }
        self.max_omega / point.heading_rate.abs()
    }

    fn min_max_acceleration(&self, point: &PathPoint, _velocity: f64) -> MinMaxAcceleration {
        if point.course.is_none() || point.heading_rate.abs() < TIMING_EPSILON {
            return MinMaxAcceleration::NO_LIMITS;
        }
        let limit = self.max_alpha / point.heading_rate.abs();
        MinMaxAcceleration::new(-limit, limit)
    }
}

/// Limits the total acceleration, centripetal plus along the path, to what the vehicle can take
/// without tipping over.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapsizeAccelerationConstraint {
    max_acceleration: f64,
}

impl CapsizeAccelerationConstraint {
    /// Creates a new constraint allowing `scale` times the tip-over acceleration of the vehicle.
    pub fn new(kinodynamics: &SwerveKinodynamics, scale: f64) -> Self {
        Self {
            max_acceleration: kinodynamics.max_capsize_acceleration() * scale,
        }
    }
}

impl TimingConstraint for CapsizeAccelerationConstraint {
    fn max_velocity(&self, point: &PathPoint) -> f64 {
        let curvature = point.curvature.abs();
        if curvature < TIMING_EPSILON {
            return f64::INFINITY;
        }
        (self.max_acceleration / curvature).sqrt()
    }

    fn min_max_acceleration(&self, point: &PathPoint, velocity: f64) -> MinMaxAcceleration {
        let centripetal = velocity * velocity * point.curvature.abs();
        let remaining = self.max_acceleration * self.max_acceleration - centripetal * centripetal;
        let along = remaining.max(0.0).sqrt();
        MinMaxAcceleration::new(-along, along)
    }
}

/// A speed limit inside a rectangle of the field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocityLimitRegionConstraint {
    min_corner: Vector2<f64>,
    max_corner: Vector2<f64>,
    limit: f64,
}

impl VelocityLimitRegionConstraint {
    /// Creates a new constraint.
    ///
    /// ## Errors
    ///
    /// Returns [Error::InvalidConstraintParameter] if the limit is negative.
    pub fn new(min_corner: Vector2<f64>, max_corner: Vector2<f64>, limit: f64) -> Result<Self, Error> {
        if !(limit >= 0.0) {
            return Err(Error::InvalidConstraintParameter {
                name: "limit".to_string(),
                value: limit,
            });
        }
        Ok(Self {
            min_corner,
            max_corner,
            limit,
        })
    }
}

impl TimingConstraint for VelocityLimitRegionConstraint {
    fn max_velocity(&self, point: &PathPoint) -> f64 {
        let p = point.pose.translation();
        let inside = p.x >= self.min_corner.x
            && p.x <= self.max_corner.x
            && p.y >= self.min_corner.y
            && p.y <= self.max_corner.y;
        if inside {
            self.limit
        } else {
            f64::INFINITY
        }
    }

    fn min_max_acceleration(&self, _point: &PathPoint, _velocity: f64) -> MinMaxAcceleration {
        MinMaxAcceleration::NO_LIMITS
    }
}

/// Limits acceleration near a point of the field.
///
/// The limit is lowest at the center and grows with the cube root of the distance, reaching
/// its highest value at the edge of the region. Outside the region there is no limit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoftRegionConstraint {
    center: Vector2<f64>,
    radius: f64,
    min: f64,
    max: f64,
}

impl SoftRegionConstraint {
    /// Creates a new constraint.
    ///
    /// ## Parameters
    ///
    /// * `center` - The center of the region
    /// * `radius` - The radius of the region
    /// * `min` - The acceleration limit at the center
    /// * `max` - The acceleration limit at the edge
    pub fn new(center: Vector2<f64>, radius: f64, min: f64, max: f64) -> Result<Self, Error> {
        if !(radius > 0.0) {
            return Err(Error::InvalidConstraintParameter {
                name: "radius".to_string(),
                value: radius,
            });
        }
        Ok(Self {
            center,
            radius,
            min,
            max,
        })
    }
}

impl TimingConstraint for SoftRegionConstraint {
    fn max_velocity(&self, _point: &PathPoint) -> f64 {
        f64::INFINITY
    }

    fn min_max_acceleration(&self, point: &PathPoint, _velocity: f64) -> MinMaxAcceleration {
        let s = (point.pose.translation() - self.center).norm() / self.radius;
        if s >= 1.0 {
            return MinMaxAcceleration::NO_LIMITS;
        }
        let limit = self.min + (self.max - self.min) * s.cbrt();
        MinMaxAcceleration::new(-limit, limit)
    }
}

/// Builds the usual sets of constraints for a vehicle.
#[derive(Clone, Debug)]
pub struct TimingConstraintFactory {
    kinodynamics: SwerveKinodynamics,
}

impl TimingConstraintFactory {
    /// The full drive limits, with the rotation slowed to a fifth of its limit.
    pub fn all_good(&self) -> Vec<Box<dyn TimingConstraint>> {
        self.scaled(1.0, 1.0, 0.2, 1.0)
    }

    /// The full drive limits, with half the rotational limits.
    pub fn fast(&self) -> Vec<Box<dyn TimingConstraint>> {
        self.scaled(1.0, 1.0, 0.5, 1.0)
    }

    /// Only the fixed drive limits, without the geometric constraints.
    pub fn for_test(&self) -> Vec<Box<dyn TimingConstraint>> {
        vec![Box::new(ConstantConstraint::from_kinodynamics(
            &self.kinodynamics,
            1.0,
            1.0,
        ))]
    }

    /// Three quarters speed, half acceleration.
    pub fn medium(&self) -> Vec<Box<dyn TimingConstraint>> {
        self.scaled(0.75, 0.5, 0.2, 0.5)
    }

    /// Creates a new factory.
    pub fn new(kinodynamics: SwerveKinodynamics) -> Self {
        Self { kinodynamics }
    }

    /// Half speed, quarter acceleration.
    pub fn slow(&self) -> Vec<Box<dyn TimingConstraint>> {
        self.scaled(0.5, 0.25, 0.1, 0.25)
    }

    fn scaled(
        &self,
        velocity_scale: f64,
        acceleration_scale: f64,
        yaw_scale: f64,
        capsize_scale: f64,
    ) -> Vec<Box<dyn TimingConstraint>> {
        let k = &self.kinodynamics;
        vec![
            Box::new(ConstantConstraint::from_kinodynamics(
                k,
                velocity_scale,
                acceleration_scale,
            )),
            Box::new(SwerveDriveDynamicsConstraint::new(k.clone())),
            Box::new(YawRateConstraint::new(k, yaw_scale)),
            Box::new(CapsizeAccelerationConstraint::new(k, capsize_scale)),
        ]
    }
}

/// Computes the schedule of a path under a set of constraints.
pub struct ScheduleGenerator {
    constraints: Vec<Box<dyn TimingConstraint>>,
}

impl ScheduleGenerator {
    /// Returns the constraints the generator applies.
    pub fn constraints(&self) -> &[Box<dyn TimingConstraint>] {
        &self.constraints
    }

    /// Creates a new generator.
    pub fn new(constraints: Vec<Box<dyn TimingConstraint>>) -> Self {
        Self { constraints }
    }

    /// Returns the fastest schedule through the samples that starts at `start_velocity`, ends at
    /// `end_velocity` and respects every constraint.
    ///
    /// The start speed is lowered if the path cannot be completed from it. Where no constraint
    /// applies, the speed and acceleration along the path are capped at 100. If the constraints
    /// cannot be met, the result is empty.
    ///
    /// ## Parameters
    ///
    /// * `samples` - Points on the path with their distance from the start, in increasing order
    /// * `start_velocity` - The speed at the first sample
    /// * `end_velocity` - The speed at the last sample
    pub fn time_parameterize(
        &self,
        samples: &[(PathPoint, f64)],
        start_velocity: f64,
        end_velocity: f64,
    ) -> Trajectory {
        match self.schedule(samples, start_velocity, end_velocity) {
            Ok(points) => {
                debug!(points = points.len(), "Timed trajectory");
                Trajectory::new(points)
            }
            Err(reason) => {
                warn!(reason, "Unable to time the path, returning an empty trajectory");
                Trajectory::default()
            }
        }
    }

    fn acceleration_limits(&self, point: &PathPoint, velocity: f64) -> MinMaxAcceleration {
        self.constraints
            .iter()
            .fold(
                MinMaxAcceleration::new(-UNCONSTRAINED_ACCELERATION, UNCONSTRAINED_ACCELERATION),
                |acc, c| acc.intersect(&c.min_max_acceleration(point, velocity)),
            )
    }

    fn max_velocity(&self, point: &PathPoint) -> f64 {
        self.constraints
            .iter()
            .fold(UNCONSTRAINED_VELOCITY, |acc, c| acc.min(c.max_velocity(point)))
    }

    fn schedule(
        &self,
        samples: &[(PathPoint, f64)],
        start_velocity: f64,
        end_velocity: f64,
    ) -> Result<Vec<TimedPose>, &'static str> {
        let n = samples.len();
        if n < 2 {
            return Err("fewer than two samples");
        }
        if !(start_velocity >= 0.0 && end_velocity >= 0.0) {
            return Err("negative boundary velocity");
        }

        let limits = samples
            .iter()
            .map(|(point, _)| self.max_velocity(point))
            .collect::<Vec<_>>();
        if limits.iter().any(|v| !(*v >= 0.0)) {
            return Err("negative velocity limit");
        }

        // forward pass, accelerating as hard as allowed
        let mut velocities = vec![0.0; n];
        velocities[0] = start_velocity.min(limits[0]);
        for i in 1..n {
            let ds = samples[i].1 - samples[i - 1].1;
            let band = self.acceleration_limits(&samples[i - 1].0, velocities[i - 1]);
            if !band.is_valid() {
                return Err("empty acceleration window");
            }
            let v2 = velocities[i - 1] * velocities[i - 1] + 2.0 * band.max * ds;
            velocities[i] = v2.max(0.0).sqrt().min(limits[i]);
        }

        // backward pass, decelerating as hard as allowed
        velocities[n - 1] = velocities[n - 1].min(end_velocity);
        for i in (0..n - 1).rev() {
            let ds = samples[i + 1].1 - samples[i].1;
            let band = self.acceleration_limits(&samples[i + 1].0, velocities[i + 1]);
            if !band.is_valid() {
                return Err("empty acceleration window");
            }
            let v2 = velocities[i + 1] * velocities[i + 1] - 2.0 * band.min * ds;
            velocities[i] = velocities[i].min(v2.max(0.0).sqrt());
        }

        if velocities.iter().any(|v| !v.is_finite()) {
            return Err("non-finite velocity");
        }

        let mut points = Vec::with_capacity(n);
        let mut time = 0.0;
        for i in 0..n - 1 {
            let (point, distance) = samples[i];
            let ds = samples[i + 1].1 - distance;
            let (v0, v1) = (velocities[i], velocities[i + 1]);
            let acceleration = if ds > TIMING_EPSILON {
                (v1 * v1 - v0 * v0) / (2.0 * ds)
            } else {
                0.0
            };
            points.push(TimedPose::new(point, distance, time, v0, acceleration));
            time += segment_time(ds, v0, v1, acceleration)?;
        }

        let (point, distance) = samples[n - 1];
        let acceleration = points.last().map(|p| p.acceleration).unwrap_or(0.0);
        points.push(TimedPose::new(
            point,
            distance,
            time,
            velocities[n - 1],
            acceleration,
        ));

        Ok(points)
    }
}

/// Returns the time taken to cover `ds` meters, going from `v0` to `v1` at constant
/// acceleration.
fn segment_time(ds: f64, v0: f64, v1: f64, acceleration: f64) -> Result<f64, &'static str> {
    if acceleration.abs() > TIMING_EPSILON {
        Ok((v1 - v0) / acceleration)
    } else if v0 > TIMING_EPSILON {
        Ok(ds / v0)
    } else if ds <= TIMING_EPSILON {
        Ok(0.0)
    } else {
        Err("stalled between samples")
    }
}
