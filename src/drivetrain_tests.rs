use super::*;
use crossbeam_channel::{unbounded, Receiver};
use std::f64::consts::FRAC_PI_2;

const DT: f64 = 0.02;

struct FakeProvider {
    pose: Option<Pose2d>,
    velocity: Option<FieldRelativeVelocity>,
    module_states: Option<ModuleStates>,
}

impl FakeProvider {
    fn at_rest(heading: f64) -> Self {
        Self {
            pose: Some(Pose2d::new(1.0, 2.0, heading)),
            velocity: Some(FieldRelativeVelocity::zero()),
            module_states: Some(ModuleStates::all(ModuleState::new(0.0, Some(0.0)))),
        }
    }

    fn unavailable() -> Self {
        Self {
            pose: None,
            velocity: None,
            module_states: None,
        }
    }
}

impl MeasuredStateProvider for FakeProvider {
    fn pose(&self) -> Option<Pose2d> {
        self.pose
    }

    fn velocity(&self) -> Option<FieldRelativeVelocity> {
        self.velocity
    }

    fn module_states(&self) -> Option<ModuleStates> {
        self.module_states
    }
}

fn subsystem(
    provider: FakeProvider,
) -> (SwerveDriveSubsystem<FakeProvider>, Receiver<ModuleCommand>) {
    let (sender, receiver) = unbounded();
    let drive = SwerveDriveSubsystem::new(SwerveKinodynamics::for_test(), provider, sender, DT);
    (drive, receiver)
}

#[test]
fn when_driving_in_field_coords_should_send_limited_states() {
    let (mut drive, receiver) = subsystem(FakeProvider::at_rest(0.0));

    drive
        .drive_in_field_coords(FieldRelativeVelocity::new(1.0, 0.0, 0.0))
        .unwrap();

    let Ok(ModuleCommand::Drive(states)) = receiver.try_recv() else {
        panic!("expected a drive command");
    };
    // one cycle of acceleration at 1 m/s^2
    assert!((states.front_left.speed - 0.02).abs() < 0.001);
    assert_eq!(states, drive.setpoint().module_states);
    assert!((drive.setpoint().chassis_speeds.vx - 0.02).abs() < 0.001);
}

#[test]
fn when_the_vehicle_is_rotated_should_convert_to_the_vehicle_frame() {
    let (mut drive, _receiver) = subsystem(FakeProvider::at_rest(FRAC_PI_2));

    drive
        .drive_in_field_coords(FieldRelativeVelocity::new(1.0, 0.0, 0.0))
        .unwrap();

    // field +x is vehicle -y
    let speeds = drive.setpoint().chassis_speeds;
    assert!(speeds.vx.abs() < 1e-9);
    assert!(speeds.vy < 0.0);
}

#[test]
fn when_the_pose_is_unavailable_should_skip_the_cycle() {
    let (mut drive, receiver) = subsystem(FakeProvider::unavailable());

    drive
        .drive_in_field_coords(FieldRelativeVelocity::new(1.0, 0.0, 0.0))
        .unwrap();
    assert!(!drive
        .steer_at_rest(FieldRelativeVelocity::new(1.0, 0.0, 0.0))
        .unwrap());

    assert!(receiver.try_recv().is_err());
    assert_eq!(None, drive.state());
    assert_eq!(SwerveSetpoint::zero(), *drive.setpoint());
}

#[test]
fn when_steering_at_rest_should_report_alignment() {
    let (mut drive, receiver) = subsystem(FakeProvider::at_rest(0.0));

    // the wheels already point along x
    assert!(drive
        .steer_at_rest(FieldRelativeVelocity::new(1.0, 0.0, 0.0))
        .unwrap());

    // but not off to the side
    assert!(!drive
        .steer_at_rest(FieldRelativeVelocity::new(0.5, 1.0, 0.0))
        .unwrap());

    let _ = receiver.try_recv();
    let Ok(ModuleCommand::Steer(states)) = receiver.try_recv() else {
        panic!("expected a steer command");
    };
    for state in states.as_array() {
        assert_eq!(0.0, state.speed);
        assert!((state.angle.unwrap() - 1.0_f64.atan2(0.5)).abs() < 1e-9);
    }
    assert_eq!(ChassisSpeeds::zero(), drive.setpoint().chassis_speeds);
}

#[test]
fn when_stopping_should_hold_the_steering() {
    let (mut drive, receiver) = subsystem(FakeProvider::at_rest(0.0));
    drive
        .set_chassis_speeds(ChassisSpeeds::new(0.5, 1.0, 0.0))
        .unwrap();

    drive.stop().unwrap();

    let commands = receiver.try_iter().collect::<Vec<_>>();
    assert_eq!(Some(&ModuleCommand::Stop), commands.last());
    for state in drive.setpoint().module_states.as_array() {
        assert_eq!(0.0, state.speed);
        assert!((state.angle.unwrap() - 1.0_f64.atan2(0.5)).abs() < 1e-9);
    }
}

#[test]
fn when_setting_raw_states_should_bypass_the_limits() {
    let (mut drive, receiver) = subsystem(FakeProvider::at_rest(0.0));
    let states = ModuleStates::from_array([ModuleState::new(1.0, Some(0.0)); 4]);

    drive.set_raw_module_states(states).unwrap();

    assert_eq!(Ok(ModuleCommand::Drive(states)), receiver.try_recv());
    assert!((drive.setpoint().chassis_speeds.vx - 1.0).abs() < 1e-9);
}

#[test]
fn when_a_command_bypassed_the_limits_should_continue_from_what_was_sent() {
    let (mut drive, _receiver) = subsystem(FakeProvider::at_rest(0.0));
    let states = ModuleStates::from_array([ModuleState::new(1.0, Some(0.0)); 4]);
    drive.set_raw_module_states(states).unwrap();

    // the generator slows down from the raw 1 m/s rather than from rest
    drive.set_chassis_speeds(ChassisSpeeds::zero()).unwrap();
    assert!((drive.setpoint().chassis_speeds.vx - 0.98).abs() < 0.001);

    // after stopping, the generator starts from rest with the held steering
    drive.stop().unwrap();
    drive
        .set_chassis_speeds(ChassisSpeeds::new(1.0, 0.0, 0.0))
        .unwrap();
    assert!((drive.setpoint().chassis_speeds.vx - 0.02).abs() < 0.001);
}

#[test]
fn when_the_channel_is_closed_should_fail() {
    let (mut drive, receiver) = subsystem(FakeProvider::at_rest(0.0));
    drop(receiver);

    assert_eq!(Err(Error::CommandChannelDisconnected), drive.stop());
}

#[test]
fn when_measured_should_report_the_state() {
    let (drive, _receiver) = subsystem(FakeProvider::at_rest(0.5));

    let state = drive.state().unwrap();
    assert_eq!(1.0, state.x.x);
    assert_eq!(2.0, state.y.x);
    assert_eq!(0.5, state.theta.x);
    assert_eq!(0.0, drive.provider().velocity().unwrap().x);
}
