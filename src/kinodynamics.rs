//! The kinodynamic model of a four wheel swerve vehicle.
//!
//! The model relates the motion of the chassis to the motion of the individual wheels, and
//! defines which chassis motions are feasible given the velocity and acceleration limits of the
//! drive motors and the geometry of the vehicle. Infeasible requests are never rejected; they are
//! scaled down to the nearest feasible motion.
//!
//! The vehicle frame follows the usual convention: x points forward, y points left and positive
//! rotation is counter-clockwise.

use std::f64::consts::FRAC_PI_2;

use nalgebra::{SMatrix, SVector};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::geometry::{
    angle_modulus, shortest_angle_between, ChassisSpeeds, FieldRelativeVelocity,
    STATIONARY_EPSILON,
};
use crate::Error;

#[cfg(test)]
#[path = "kinodynamics_tests.rs"]
mod kinodynamics_tests;

/// The gravitational acceleration used for the tip-over limit, in m/s^2.
const GRAVITY: f64 = 9.8;

/// The geometry and actuator limits of a swerve vehicle.
///
/// All values are in SI units.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct SwerveKinodynamicsConfig {
    /// The distance between the left and right wheels.
    pub track_width_m: f64,

    /// The distance between the front and rear wheels.
    pub wheelbase_m: f64,

    /// The radius of the drive wheels.
    pub wheel_radius_m: f64,

    /// The maximum linear speed of a wheel.
    pub max_drive_velocity_m_s: f64,

    /// The maximum linear acceleration of a wheel.
    pub max_drive_acceleration_m_s2: f64,

    /// The maximum linear deceleration of a wheel, as a positive number.
    pub max_drive_deceleration_m_s2: f64,

    /// The maximum rotational speed of the steering axis.
    pub max_steering_velocity_rad_s: f64,

    /// The maximum rotational acceleration of the steering axis.
    pub max_steering_acceleration_rad_s2: f64,

    /// The height of the center of gravity above the floor.
    pub center_of_gravity_height_m: f64,
}

impl SwerveKinodynamicsConfig {
    /// A small, fast vehicle with high acceleration.
    pub fn get() -> Self {
        Self {
            track_width_m: 0.5,
            wheelbase_m: 0.5,
            wheel_radius_m: 0.05,
            max_drive_velocity_m_s: 5.0,
            max_drive_acceleration_m_s2: 10.0,
            max_drive_deceleration_m_s2: 20.0,
            max_steering_velocity_rad_s: 13.0,
            max_steering_acceleration_rad_s2: 20.0 * std::f64::consts::PI,
            center_of_gravity_height_m: 0.3,
        }
    }

    /// A slow vehicle, with unit velocity and acceleration, for tests.
    pub fn for_test() -> Self {
        Self {
            max_drive_velocity_m_s: 1.0,
            max_drive_acceleration_m_s2: 1.0,
            max_drive_deceleration_m_s2: 1.0,
            ..Self::get()
        }
    }

    /// Like [SwerveKinodynamicsConfig::for_test] with a higher velocity limit.
    pub fn for_test2() -> Self {
        Self {
            max_drive_velocity_m_s: 4.0,
            ..Self::for_test()
        }
    }

    /// A vehicle with limits so high they are never reached.
    pub fn unlimited() -> Self {
        Self {
            track_width_m: 0.5,
            wheelbase_m: 0.5,
            wheel_radius_m: 0.05,
            max_drive_velocity_m_s: 100.0,
            max_drive_acceleration_m_s2: 100.0,
            max_drive_deceleration_m_s2: 100.0,
            max_steering_velocity_rad_s: 100.0,
            max_steering_acceleration_rad_s2: 100.0,
            center_of_gravity_height_m: 0.01,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        for (name, value) in [
            ("track_width_m", self.track_width_m),
            ("wheelbase_m", self.wheelbase_m),
            ("wheel_radius_m", self.wheel_radius_m),
            ("max_drive_velocity_m_s", self.max_drive_velocity_m_s),
            ("max_drive_acceleration_m_s2", self.max_drive_acceleration_m_s2),
            ("max_drive_deceleration_m_s2", self.max_drive_deceleration_m_s2),
            ("max_steering_velocity_rad_s", self.max_steering_velocity_rad_s),
            (
                "max_steering_acceleration_rad_s2",
                self.max_steering_acceleration_rad_s2,
            ),
            (
                "center_of_gravity_height_m",
                self.center_of_gravity_height_m,
            ),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(Error::InvalidKinodynamicsParameter {
                    name: name.to_string(),
                    value,
                });
            }
        }

        Ok(())
    }
}

/// The speed and steering angle of a single wheel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModuleState {
    /// The linear speed of the wheel in m/s. May be negative.
    pub speed: f64,

    /// The steering angle in radians, relative to the vehicle x axis. A wheel that is not moving
    /// does not need to be steered, in which case the angle is `None`.
    pub angle: Option<f64>,
}

impl ModuleState {
    /// Creates a new module state.
    pub fn new(speed: f64, angle: Option<f64>) -> Self {
        Self { speed, angle }
    }

    /// Returns the equivalent state that requires the least steering from `current_angle`.
    ///
    /// Steering more than 90 degrees is never needed: the wheel can steer to the opposite
    /// angle and drive backwards instead.
    pub fn optimize(&self, current_angle: f64) -> ModuleState {
        match self.angle {
            Some(angle) if shortest_angle_between(current_angle, angle).abs() > FRAC_PI_2 => {
                ModuleState::new(
                    -self.speed,
                    Some(angle_modulus(angle + std::f64::consts::PI)),
                )
            }
            _ => *self,
        }
    }

    /// Returns the velocity vector of the wheel in the vehicle frame.
    pub fn velocity(&self) -> (f64, f64) {
        match self.angle {
            Some(angle) => (self.speed * angle.cos(), self.speed * angle.sin()),
            None => (0.0, 0.0),
        }
    }
}

/// The states of all four wheels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModuleStates {
    /// The front left wheel.
    pub front_left: ModuleState,

    /// The front right wheel.
    pub front_right: ModuleState,

    /// The rear left wheel.
    pub rear_left: ModuleState,

    /// The rear right wheel.
    pub rear_right: ModuleState,
}

impl ModuleStates {
    /// Returns the same state for every wheel.
    pub fn all(state: ModuleState) -> Self {
        Self::from_array([state; 4])
    }

    /// Returns the states in the order front left, front right, rear left, rear right.
    pub fn as_array(&self) -> [ModuleState; 4] {
        [
            self.front_left,
            self.front_right,
            self.rear_left,
            self.rear_right,
        ]
    }

    /// Creates the states from an array in the order front left, front right, rear left, rear
    /// right.
    pub fn from_array(states: [ModuleState; 4]) -> Self {
        let [front_left, front_right, rear_left, rear_right] = states;
        Self {
            front_left,
            front_right,
            rear_left,
            rear_right,
        }
    }

    /// Returns the largest absolute wheel speed.
    pub fn max_speed(&self) -> f64 {
        self.as_array()
            .iter()
            .map(|s| s.speed.abs())
            .fold(0.0, f64::max)
    }

    /// Returns the states with each wheel optimized against the matching angle in `current`.
    /// Wheels without a current angle are left as they are.
    pub fn optimize(&self, current: &ModuleStates) -> ModuleStates {
        let desired = self.as_array();
        let current = current.as_array();
        let mut result = desired;
        for i in 0..4 {
            if let Some(angle) = current[i].angle {
                result[i] = desired[i].optimize(angle);
            }
        }
        ModuleStates::from_array(result)
    }
}

/// The kinodynamic model of a swerve vehicle.
///
/// The model is immutable after construction and may be shared freely.
#[derive(Clone, Debug, PartialEq)]
pub struct SwerveKinodynamics {
    config: SwerveKinodynamicsConfig,

    /// The wheel contact points relative to the center of rotation, in the order front left,
    /// front right, rear left, rear right.
    module_positions: [(f64, f64); 4],

    /// The least squares solution of the wheel velocity equations.
    forward_kinematics: SMatrix<f64, 3, 8>,

    max_angular_speed: f64,
    max_angular_acceleration: f64,
    max_capsize_acceleration: f64,
}

impl SwerveKinodynamics {
    /// Limits a field relative velocity to what the wheels can achieve, by scaling translation
    /// and rotation by the same factor.
    ///
    /// The feasible region is the diamond `|v| / max_v + |omega| / max_omega <= 1`. A pure
    /// translation or a pure rotation is clamped to its own limit.
    ///
    /// ## Parameters
    ///
    /// * `velocity` - The requested velocity
    ///
    /// ## Example
    ///
    /// ```
    /// use swerve_motion::geometry::FieldRelativeVelocity;
    /// use swerve_motion::kinodynamics::SwerveKinodynamics;
    ///
    /// let k = SwerveKinodynamics::get();
    /// let result = k.analytic_desaturation(&FieldRelativeVelocity::new(6.0, 0.0, 0.0));
    /// assert!((result.x - 5.0).abs() < 1e-9);
    /// ```
    pub fn analytic_desaturation(&self, velocity: &FieldRelativeVelocity) -> FieldRelativeVelocity {
        let max_v = self.config.max_drive_velocity_m_s;
        let max_omega = self.max_angular_speed;
        let xy = velocity.norm();
        let omega = velocity.theta;

        if xy < STATIONARY_EPSILON {
            return FieldRelativeVelocity::new(
                velocity.x,
                velocity.y,
                omega.clamp(-max_omega, max_omega),
            );
        }

        if omega.abs() < STATIONARY_EPSILON {
            let ratio = if xy > max_v { max_v / xy } else { 1.0 };
            return FieldRelativeVelocity::new(velocity.x * ratio, velocity.y * ratio, omega);
        }

        let fraction = xy / max_v + omega.abs() / max_omega;
        if fraction <= 1.0 {
            return *velocity;
        }

        trace!(scale = 1.0 / fraction, "Desaturating velocity");
        velocity.times(1.0 / fraction)
    }

    /// Limits chassis speeds to what the wheels can achieve. See
    /// [SwerveKinodynamics::analytic_desaturation].
    pub fn desaturate_chassis_speeds(&self, speeds: &ChassisSpeeds) -> ChassisSpeeds {
        self.analytic_desaturation(&speeds.to_field_relative(0.0))
            .to_chassis_speeds(0.0)
    }

    /// Scales all wheel speeds by the same factor so that none exceeds the drive velocity
    /// limit.
    pub fn desaturate_wheel_speeds(&self, states: &mut ModuleStates) {
        let max_speed = states.max_speed();
        let max_v = self.config.max_drive_velocity_m_s;
        if max_speed <= max_v {
            return;
        }

        let ratio = max_v / max_speed;
        states.front_left.speed *= ratio;
        states.front_right.speed *= ratio;
        states.rear_left.speed *= ratio;
        states.rear_right.speed *= ratio;
    }

    /// Returns the configuration of the model.
    pub fn config(&self) -> &SwerveKinodynamicsConfig {
        &self.config
    }

    /// See [SwerveKinodynamicsConfig::get].
    pub fn get() -> Self {
        Self::from_preset(SwerveKinodynamicsConfig::get())
    }

    /// See [SwerveKinodynamicsConfig::for_test].
    pub fn for_test() -> Self {
        Self::from_preset(SwerveKinodynamicsConfig::for_test())
    }

    /// See [SwerveKinodynamicsConfig::for_test2].
    pub fn for_test2() -> Self {
        Self::from_preset(SwerveKinodynamicsConfig::for_test2())
    }

    /// See [SwerveKinodynamicsConfig::unlimited].
    pub fn unlimited() -> Self {
        Self::from_preset(SwerveKinodynamicsConfig::unlimited())
    }

    /// Returns the maximum rotational acceleration of the chassis, in rad/s^2.
    ///
    /// This is the rotational acceleration a square-ish chassis reaches when the wheels apply
    /// their full acceleration tangentially.
    pub fn max_angular_acceleration(&self) -> f64 {
        self.max_angular_acceleration
    }

    /// Returns the maximum rotational speed of the chassis, in rad/s, reached when the wheels
    /// spin at their maximum speed and the chassis does not translate.
    pub fn max_angular_speed(&self) -> f64 {
        self.max_angular_speed
    }

    /// Returns the lateral acceleration above which the vehicle may tip over, in m/s^2.
    pub fn max_capsize_acceleration(&self) -> f64 {
        self.max_capsize_acceleration
    }

    /// Returns the maximum linear wheel acceleration, in m/s^2.
    pub fn max_drive_acceleration(&self) -> f64 {
        self.config.max_drive_acceleration_m_s2
    }

    /// Returns the maximum linear wheel deceleration, in m/s^2, as a positive number.
    pub fn max_drive_deceleration(&self) -> f64 {
        self.config.max_drive_deceleration_m_s2
    }

    /// Returns the maximum linear wheel speed, in m/s.
    pub fn max_drive_velocity(&self) -> f64 {
        self.config.max_drive_velocity_m_s
    }

    /// Returns the maximum steering acceleration, in rad/s^2.
    pub fn max_steering_acceleration(&self) -> f64 {
        self.config.max_steering_acceleration_rad_s2
    }

    /// Returns the maximum steering speed, in rad/s.
    pub fn max_steering_velocity(&self) -> f64 {
        self.config.max_steering_velocity_rad_s
    }

    /// Returns the wheel contact points in the vehicle frame, in the order front left, front
    /// right, rear left, rear right.
    pub fn module_positions(&self) -> &[(f64, f64); 4] {
        &self.module_positions
    }

    /// Creates a new model.
    ///
    /// ## Parameters
    ///
    /// * `config` - The geometry and limits of the vehicle
    ///
    /// ## Errors
    ///
    /// Returns [Error::InvalidKinodynamicsParameter] if any value in the configuration is not
    /// positive, or [Error::SingularKinematics] if the wheel layout does not determine the chassis
    /// motion.
    pub fn new(config: SwerveKinodynamicsConfig) -> Result<Self, Error> {
        config.validate()?;

        let x = config.wheelbase_m / 2.0;
        let y = config.track_width_m / 2.0;
        let module_positions = [(x, y), (x, -y), (-x, y), (-x, -y)];

        #[rustfmt::skip]
        let inverse_kinematics = SMatrix::<f64, 8, 3>::from_row_slice(&[
            1.0, 0.0, -module_positions[0].1,
            0.0, 1.0,  module_positions[0].0,
            1.0, 0.0, -module_positions[1].1,
            0.0, 1.0,  module_positions[1].0,
            1.0, 0.0, -module_positions[2].1,
            0.0, 1.0,  module_positions[2].0,
            1.0, 0.0, -module_positions[3].1,
            0.0, 1.0,  module_positions[3].0,
        ]);
        let transposed = inverse_kinematics.transpose();
        let normal = (transposed * inverse_kinematics)
            .try_inverse()
            .ok_or(Error::SingularKinematics)?;
        let forward_kinematics = normal * transposed;

        let radius = x.hypot(y);
        let max_angular_speed = config.max_drive_velocity_m_s / radius;
        let max_angular_acceleration = 12.0 * config.max_drive_acceleration_m_s2 * radius
            / (config.track_width_m * config.track_width_m
                + config.wheelbase_m * config.wheelbase_m);
        let max_capsize_acceleration = GRAVITY * x.min(y) / config.center_of_gravity_height_m;

        Ok(Self {
            config,
            module_positions,
            forward_kinematics,
            max_angular_speed,
            max_angular_acceleration,
            max_capsize_acceleration,
        })
    }

    /// Limits a field relative velocity, giving priority to rotation.
    ///
    /// The rotation is clamped to the rotational limit and the translation is reduced to
    /// whatever the wheels have left over.
    pub fn prefer_rotation(&self, velocity: &FieldRelativeVelocity) -> FieldRelativeVelocity {
        let max_v = self.config.max_drive_velocity_m_s;
        let max_omega = self.max_angular_speed;

        let omega = velocity.theta.clamp(-max_omega, max_omega);
        let allowed = (max_v * (1.0 - omega.abs() / max_omega)).max(0.0);
        let xy = velocity.norm();
        if xy <= allowed {
            return FieldRelativeVelocity::new(velocity.x, velocity.y, omega);
        }

        let ratio = if xy > 0.0 { allowed / xy } else { 0.0 };
        FieldRelativeVelocity::new(velocity.x * ratio, velocity.y * ratio, omega)
    }

    /// Returns the chassis speeds implied by the wheel states, using the least squares solution
    /// over all four wheels.
    pub fn to_chassis_speeds(&self, states: &ModuleStates) -> ChassisSpeeds {
        let mut wheel_velocities = SVector::<f64, 8>::zeros();
        for (i, state) in states.as_array().iter().enumerate() {
            let (vx, vy) = state.velocity();
            wheel_velocities[2 * i] = vx;
            wheel_velocities[2 * i + 1] = vy;
        }

        let chassis = self.forward_kinematics * wheel_velocities;
        ChassisSpeeds::new(chassis[0], chassis[1], chassis[2])
    }

    /// Returns the chassis speeds implied by wheel states that were produced by
    /// [SwerveKinodynamics::to_module_states] with the same `dt`.
    pub fn to_chassis_speeds_with_discretization(
        &self,
        states: &ModuleStates,
        dt: f64,
    ) -> ChassisSpeeds {
        self.to_chassis_speeds(states).undiscretize(dt)
    }

    /// Returns the wheel states that realize the chassis speeds over a control period of `dt`
    /// seconds.
    ///
    /// The speeds are discretized first, so that holding the wheel states for `dt` moves the
    /// vehicle to the pose implied by the speeds. The wheel speeds are then desaturated.
    pub fn to_module_states(&self, speeds: &ChassisSpeeds, dt: f64) -> ModuleStates {
        let mut states = self.to_module_states_without_discretization(&speeds.discretize(dt));
        self.desaturate_wheel_speeds(&mut states);
        states
    }

    /// Returns the wheel states that realize the chassis speeds instantaneously.
    pub fn to_module_states_without_discretization(&self, speeds: &ChassisSpeeds) -> ModuleStates {
        let states = self.module_positions.map(|(x, y)| {
            let vx = speeds.vx - speeds.omega * y;
            let vy = speeds.vy + speeds.omega * x;
            let speed = vx.hypot(vy);
            if speed < STATIONARY_EPSILON {
                ModuleState::new(0.0, None)
            } else {
                ModuleState::new(speed, Some(vy.atan2(vx)))
            }
        });
        ModuleStates::from_array(states)
    }

    /// Returns the rotational speed of a wheel, in rad/s, for the given linear speed.
    pub fn wheel_angular_velocity(&self, speed: f64) -> f64 {
        speed / self.config.wheel_radius_m
    }

    fn from_preset(config: SwerveKinodynamicsConfig) -> Self {
        match Self::new(config) {
            Ok(k) => k,
            Err(e) => unreachable!("preset kinodynamics are valid: {}", e),
        }
    }
}
