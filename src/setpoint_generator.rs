//! Limits the change in chassis speeds between control cycles to what the wheels can deliver.
//!
//! The generator looks one step ahead only. Given the previous setpoint and the desired chassis
//! speeds it finds the largest fraction `s` of the way from the previous speeds to the desired
//! speeds that respects the tip-over limit, the steering velocity limit and the drive
//! acceleration limit of every wheel.

use std::f64::consts::{FRAC_PI_2, PI};

use tracing::trace;

use crate::geometry::{shortest_angle_between, ChassisSpeeds, STATIONARY_EPSILON};
use crate::kinodynamics::{ModuleState, ModuleStates, SwerveKinodynamics};

#[cfg(test)]
#[path = "setpoint_generator_tests.rs"]
mod setpoint_generator_tests;

/// The number of bisection steps used when solving for a wheel limit.
const MAX_ITERATIONS: usize = 10;

/// Chassis speeds together with the wheel states that realize them.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SwerveSetpoint {
    /// The speeds of the chassis, in the vehicle frame.
    pub chassis_speeds: ChassisSpeeds,

    /// The commanded wheel states.
    pub module_states: ModuleStates,
}

impl SwerveSetpoint {
    /// Creates a new setpoint.
    pub fn new(chassis_speeds: ChassisSpeeds, module_states: ModuleStates) -> Self {
        Self {
            chassis_speeds,
            module_states,
        }
    }

    /// Returns a setpoint at rest with the wheels pointing forward.
    pub fn zero() -> Self {
        Self {
            chassis_speeds: ChassisSpeeds::zero(),
            module_states: ModuleStates::all(ModuleState::new(0.0, Some(0.0))),
        }
    }
}

/// Generates feasible setpoints for a swerve vehicle.
#[derive(Clone, Debug)]
pub struct SwerveSetpointGenerator {
    kinodynamics: SwerveKinodynamics,
}

impl SwerveSetpointGenerator {
    /// Returns the next setpoint, `dt` seconds after `prev`, moving towards `desired`.
    ///
    /// The result lies on the straight line between the previous and the desired chassis speeds.
    /// If every wheel would have to turn around, the vehicle is brought to a stop first instead
    /// of steering all wheels at speed.
    ///
    /// ## Parameters
    ///
    /// * `prev` - The setpoint returned by the previous call
    /// * `desired` - The chassis speeds the caller would like to have
    /// * `dt` - The time step in seconds
    ///
    /// ## Example
    ///
    /// ```
    /// use swerve_motion::geometry::ChassisSpeeds;
    /// use swerve_motion::kinodynamics::SwerveKinodynamics;
    /// use swerve_motion::setpoint_generator::{SwerveSetpoint, SwerveSetpointGenerator};
    ///
    /// let generator = SwerveSetpointGenerator::new(SwerveKinodynamics::for_test());
    /// let next = generator.generate_setpoint(
    ///     &SwerveSetpoint::zero(),
    ///     ChassisSpeeds::new(1.0, 0.0, 0.0),
    ///     0.02,
    /// );
    ///
    /// // one step at 1 m/s^2
    /// assert!((next.chassis_speeds.vx - 0.02).abs() < 0.001);
    /// ```
    pub fn generate_setpoint(
        &self,
        prev: &SwerveSetpoint,
        desired: ChassisSpeeds,
        dt: f64,
    ) -> SwerveSetpoint {
        let k = &self.kinodynamics;
        let mut desired = k.desaturate_chassis_speeds(&desired);

        let prev_states = prev.module_states.as_array();
        let prev_vectors = self.wheel_vectors(&prev.chassis_speeds);
        let mut desired_vectors = self.wheel_vectors(&desired);

        let desired_is_stopped = desired.is_stationary(STATIONARY_EPSILON);
        let prev_is_stopped = prev.chassis_speeds.is_stationary(STATIONARY_EPSILON);

        if !desired_is_stopped
            && !prev_is_stopped
            && all_wheels_reverse(&prev_vectors, &desired_vectors)
        {
            trace!("All wheels would reverse, stopping first");
            desired = ChassisSpeeds::zero();
            desired_vectors = [(0.0, 0.0); 4];
        }

        let mut s_max = self.capsize_limit(&prev.chassis_speeds, &desired, dt);

        // Stopped wheels can be steered for free, so they do not limit s.
        let mut overrides: [Option<f64>; 4] = [None; 4];
        for i in 0..4 {
            let desired_angle = vector_angle(desired_vectors[i]);
            if prev_states[i].speed.abs() < STATIONARY_EPSILON {
                overrides[i] = desired_angle.or(prev_states[i].angle);
                continue;
            }
            if desired_angle.is_none() && desired_is_stopped {
                overrides[i] = prev_states[i].angle;
            }

            let Some(prev_angle) = vector_angle(prev_vectors[i]).or(prev_states[i].angle) else {
                continue;
            };

            let limit = k.max_steering_velocity() * dt;
            let s = bisect(s_max, |s| {
                let v = interpolate(prev_vectors[i], desired_vectors[i], s);
                match vector_angle(v) {
                    Some(angle) => steering_distance(prev_angle, angle) <= limit,
                    None => true,
                }
            });
            s_max = s_max.min(s);
        }

        let limit = k.max_drive_acceleration() * dt;
        for i in 0..4 {
            let prev_speed = norm(prev_vectors[i]);
            let s = bisect(s_max, |s| {
                let v = interpolate(prev_vectors[i], desired_vectors[i], s);
                (norm(v) - prev_speed).abs() <= limit
            });
            s_max = s_max.min(s);
        }

        let chassis_speeds = prev
            .chassis_speeds
            .plus(&desired.minus(&prev.chassis_speeds).times(s_max));
        trace!(s = s_max, %chassis_speeds, "Generated setpoint");

        let mut states = k.to_module_states(&chassis_speeds, dt).as_array();
        for i in 0..4 {
            if states[i].angle.is_none() {
                states[i].angle = overrides[i].or(prev_states[i].angle);
            }
            if let Some(prev_angle) = prev_states[i].angle {
                states[i] = states[i].optimize(prev_angle);
            }
        }

        SwerveSetpoint::new(chassis_speeds, ModuleStates::from_array(states))
    }

    /// Returns the model the generator limits against.
    pub fn kinodynamics(&self) -> &SwerveKinodynamics {
        &self.kinodynamics
    }

    /// Creates a new generator.
    pub fn new(kinodynamics: SwerveKinodynamics) -> Self {
        Self { kinodynamics }
    }

    /// Replaces `setpoint` with the next setpoint towards `desired`. See
    /// [SwerveSetpointGenerator::generate_setpoint].
    pub fn update(&self, setpoint: &mut SwerveSetpoint, desired: ChassisSpeeds, dt: f64) {
        *setpoint = self.generate_setpoint(setpoint, desired, dt);
    }

    /// Limits the change in translational velocity to the tip-over acceleration.
    fn capsize_limit(&self, prev: &ChassisSpeeds, desired: &ChassisSpeeds, dt: f64) -> f64 {
        let dv = desired.minus(prev).norm();
        if dv < STATIONARY_EPSILON {
            return 1.0;
        }
        (self.kinodynamics.max_capsize_acceleration() * dt / dv).min(1.0)
    }

    /// Returns the instantaneous velocity vector of every wheel, which is linear in the chassis
    /// speeds.
    fn wheel_vectors(&self, speeds: &ChassisSpeeds) -> [(f64, f64); 4] {
        self.kinodynamics
            .module_positions()
            .map(|(x, y)| (speeds.vx - speeds.omega * y, speeds.vy + speeds.omega * x))
    }
}

/// Returns `true` if every wheel would need to reverse its direction of travel.
fn all_wheels_reverse(prev: &[(f64, f64); 4], desired: &[(f64, f64); 4]) -> bool {
    prev.iter()
        .zip(desired.iter())
        .all(|(p, d)| match (vector_angle(*p), vector_angle(*d)) {
            (Some(from), Some(to)) => shortest_angle_between(from, to).abs() > FRAC_PI_2,
            _ => false,
        })
}

/// Returns the largest `s` in `[0, s_max]` for which `feasible` holds, assuming it holds at zero
/// and changes only once.
fn bisect(s_max: f64, feasible: impl Fn(f64) -> bool) -> f64 {
    if feasible(s_max) {
        return s_max;
    }

    let mut lo = 0.0;
    let mut hi = s_max;
    for _ in 0..MAX_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if feasible(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

fn interpolate(a: (f64, f64), b: (f64, f64), s: f64) -> (f64, f64) {
    (a.0 + s * (b.0 - a.0), a.1 + s * (b.1 - a.1))
}

fn norm(v: (f64, f64)) -> f64 {
    v.0.hypot(v.1)
}

/// The steering needed to go from `from` to `to`, allowing the wheel to reverse.
fn steering_distance(from: f64, to: f64) -> f64 {
    let d = shortest_angle_between(from, to).abs();
    if d > FRAC_PI_2 {
        PI - d
    } else {
        d
    }
}

fn vector_angle(v: (f64, f64)) -> Option<f64> {
    if norm(v) < STATIONARY_EPSILON {
        None
    } else {
        Some(v.1.atan2(v.0))
    }
}
