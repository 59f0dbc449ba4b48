//! The boundary between motion control and the drive hardware.
//!
//! Motion control talks to the vehicle through the [SwerveDrive] trait. The
//! [SwerveDriveSubsystem] implements it on top of a [MeasuredStateProvider] for the measured
//! state and a channel of [ModuleCommand] values for the wheel commands. The hardware side owns
//! the receiving end of the channel.

use crossbeam_channel::Sender;
use tracing::{debug, trace};

use crate::geometry::{shortest_angle_between, ChassisSpeeds, FieldRelativeVelocity, Pose2d};
use crate::kinodynamics::{ModuleState, ModuleStates, SwerveKinodynamics};
use crate::setpoint_generator::{SwerveSetpoint, SwerveSetpointGenerator};
use crate::state::SwerveModel;
use crate::Error;

#[cfg(test)]
#[path = "drivetrain_tests.rs"]
mod drivetrain_tests;

/// The largest steering error, in radians, at which the wheels count as aligned.
pub const STEERING_TOLERANCE: f64 = 0.1;

/// A command for the wheel modules.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ModuleCommand {
    /// Drive and steer the wheels to the given states.
    Drive(ModuleStates),

    /// Steer the wheels to the given angles without driving them.
    Steer(ModuleStates),

    /// Stop the drive motors and hold the steering where it is.
    Stop,
}

/// The actuation interface of a swerve vehicle.
pub trait SwerveDrive {
    /// Drives at a velocity given in the field frame.
    fn drive_in_field_coords(&mut self, velocity: FieldRelativeVelocity) -> Result<(), Error>;

    /// Drives at a velocity given in the vehicle frame.
    fn set_chassis_speeds(&mut self, speeds: ChassisSpeeds) -> Result<(), Error>;

    /// Sends wheel states to the modules without any limiting.
    fn set_raw_module_states(&mut self, states: ModuleStates) -> Result<(), Error>;

    /// Points the wheels in the direction needed for `velocity` without moving, and returns
    /// `true` once they are pointing that way.
    fn steer_at_rest(&mut self, velocity: FieldRelativeVelocity) -> Result<bool, Error>;

    /// Stops the vehicle.
    fn stop(&mut self) -> Result<(), Error>;

    /// Returns the measured state of the vehicle, or `None` if it is not available.
    fn state(&self) -> Option<SwerveModel>;
}

/// Provides the measured state of the vehicle.
///
/// Each value is `None` while the sensor that measures it is unavailable.
pub trait MeasuredStateProvider {
    /// Returns the pose of the vehicle in the field frame.
    fn pose(&self) -> Option<Pose2d>;

    /// Returns the velocity of the vehicle in the field frame.
    fn velocity(&self) -> Option<FieldRelativeVelocity>;

    /// Returns the measured wheel states.
    fn module_states(&self) -> Option<ModuleStates>;
}

/// A [SwerveDrive] that limits every command with a [SwerveSetpointGenerator] and sends the
/// resulting wheel states over a channel.
///
/// The subsystem owns the only [SwerveSetpoint]. It changes only through the generator or
/// through [SwerveDriveSubsystem::reset_setpoint], which the commands that bypass the limits
/// (steering at rest, stopping and raw wheel states) use to record what they sent. When a
/// measurement a command depends on is unavailable, the command is skipped for that cycle.
pub struct SwerveDriveSubsystem<P: MeasuredStateProvider> {
    provider: P,
    generator: SwerveSetpointGenerator,
    setpoint: SwerveSetpoint,
    sender: Sender<ModuleCommand>,
    dt: f64,
}

impl<P: MeasuredStateProvider> SwerveDriveSubsystem<P> {
    /// Returns the model of the vehicle.
    pub fn kinodynamics(&self) -> &SwerveKinodynamics {
        self.generator.kinodynamics()
    }

    /// Creates a new subsystem.
    ///
    /// ## Parameters
    ///
    /// * `kinodynamics` - The vehicle
    /// * `provider` - The source of measurements
    /// * `sender` - The channel the wheel commands are sent on
    /// * `dt` - The control period in seconds
    pub fn new(
        kinodynamics: SwerveKinodynamics,
        provider: P,
        sender: Sender<ModuleCommand>,
        dt: f64,
    ) -> Self {
        Self {
            provider,
            generator: SwerveSetpointGenerator::new(kinodynamics),
            setpoint: SwerveSetpoint::zero(),
            sender,
            dt,
        }
    }

    /// Returns the measurement provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Replaces the setpoint, e.g. with the measured state after the vehicle was moved by
    /// something else.
    pub fn reset_setpoint(&mut self, setpoint: SwerveSetpoint) {
        self.setpoint = setpoint;
    }

    /// Returns the most recent setpoint.
    pub fn setpoint(&self) -> &SwerveSetpoint {
        &self.setpoint
    }

    fn send(&self, command: ModuleCommand) -> Result<(), Error> {
        trace!(?command, "Sending module command");
        self.sender
            .send(command)
            .map_err(|_| Error::CommandChannelDisconnected)
    }
}

impl<P: MeasuredStateProvider> SwerveDrive for SwerveDriveSubsystem<P> {
    fn drive_in_field_coords(&mut self, velocity: FieldRelativeVelocity) -> Result<(), Error> {
        let Some(pose) = self.provider.pose() else {
            debug!("No pose measurement, skipping drive command");
            return Ok(());
        };
        self.set_chassis_speeds(velocity.to_chassis_speeds(pose.heading()))
    }

    fn set_chassis_speeds(&mut self, speeds: ChassisSpeeds) -> Result<(), Error> {
        self.generator.update(&mut self.setpoint, speeds, self.dt);
        self.send(ModuleCommand::Drive(self.setpoint.module_states))
    }

    fn set_raw_module_states(&mut self, states: ModuleStates) -> Result<(), Error> {
        let speeds = self.generator.kinodynamics().to_chassis_speeds(&states);
        self.reset_setpoint(SwerveSetpoint::new(speeds, states));
        self.send(ModuleCommand::Drive(states))
    }

    fn steer_at_rest(&mut self, velocity: FieldRelativeVelocity) -> Result<bool, Error> {
        let (Some(pose), Some(measured)) = (self.provider.pose(), self.provider.module_states())
        else {
            debug!("No measurement, skipping steering command");
            return Ok(false);
        };

        let speeds = velocity.to_chassis_speeds(pose.heading());
        let desired = self
            .generator
            .kinodynamics()
            .to_module_states(&speeds, self.dt)
            .optimize(&measured)
            .as_array();
        let measured = measured.as_array();

        let mut aligned = true;
        let mut steer = [ModuleState::default(); 4];
        for i in 0..4 {
            let angle = desired[i].angle.or(measured[i].angle);
            steer[i] = ModuleState::new(0.0, angle);
            if let (Some(target), Some(actual)) = (angle, measured[i].angle) {
                aligned &= shortest_angle_between(actual, target).abs() < STEERING_TOLERANCE;
            }
        }

        let steer = ModuleStates::from_array(steer);
        self.reset_setpoint(SwerveSetpoint::new(ChassisSpeeds::zero(), steer));
        self.send(ModuleCommand::Steer(steer))?;
        Ok(aligned)
    }

    fn stop(&mut self) -> Result<(), Error> {
        let held = self
            .setpoint
            .module_states
            .as_array()
            .map(|s| ModuleState::new(0.0, s.angle));
        self.reset_setpoint(SwerveSetpoint::new(
            ChassisSpeeds::zero(),
            ModuleStates::from_array(held),
        ));
        self.send(ModuleCommand::Stop)
    }

    fn state(&self) -> Option<SwerveModel> {
        Some(SwerveModel::new(
            self.provider.pose()?,
            self.provider.velocity()?,
        ))
    }
}
