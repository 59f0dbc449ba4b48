use super::*;
use float_cmp::{ApproxEq, F64Margin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

const MARGIN: F64Margin = F64Margin {
    ulps: 2,
    epsilon: 1e-9,
};

fn assert_near(expected: f64, actual: f64, tolerance: f64) {
    assert!(
        (expected - actual).abs() <= tolerance,
        "expected {} but got {}",
        expected,
        actual
    );
}

fn assert_velocity(expected: (f64, f64, f64), actual: &FieldRelativeVelocity) {
    assert_near(expected.0, actual.x, 0.001);
    assert_near(expected.1, actual.y, 0.001);
    assert_near(expected.2, actual.theta, 0.001);
}

#[test]
fn test_new() {
    let k = SwerveKinodynamics::for_test();

    assert!(k.max_drive_velocity().approx_eq(1.0, MARGIN));
    assert!(k.max_drive_acceleration().approx_eq(1.0, MARGIN));
    assert_near(2.828, k.max_angular_speed(), 0.001);
    assert_near(8.485, k.max_angular_acceleration(), 0.001);
    assert_near(8.167, k.max_capsize_acceleration(), 0.001);
    assert!(k.wheel_angular_velocity(1.0).approx_eq(20.0, MARGIN));

    let positions = k.module_positions();
    assert_eq!((0.25, 0.25), positions[0]);
    assert_eq!((0.25, -0.25), positions[1]);
    assert_eq!((-0.25, 0.25), positions[2]);
    assert_eq!((-0.25, -0.25), positions[3]);
}

#[test]
fn test_new_with_wide_track() {
    let config = SwerveKinodynamicsConfig {
        track_width_m: 1.0,
        wheelbase_m: 1.0,
        ..SwerveKinodynamicsConfig::get()
    };
    let k = SwerveKinodynamics::new(config).unwrap();

    assert_near(16.333, k.max_capsize_acceleration(), 0.001);
    assert_near(7.071, k.max_angular_speed(), 0.001);
}

#[test]
fn when_creating_with_invalid_parameters_should_fail() {
    let config = SwerveKinodynamicsConfig {
        wheel_radius_m: 0.0,
        ..SwerveKinodynamicsConfig::get()
    };
    assert_eq!(
        Err(Error::InvalidKinodynamicsParameter {
            name: "wheel_radius_m".to_string(),
            value: 0.0
        }),
        SwerveKinodynamics::new(config)
    );

    let config = SwerveKinodynamicsConfig {
        max_drive_velocity_m_s: f64::NAN,
        ..SwerveKinodynamicsConfig::get()
    };
    assert!(SwerveKinodynamics::new(config).is_err());
}

#[test]
fn when_desaturating_feasible_speeds_should_not_change_them() {
    let k = SwerveKinodynamics::get();

    for v in [
        FieldRelativeVelocity::new(4.0, 0.0, 0.0),
        FieldRelativeVelocity::new(0.0, 0.0, 11.313),
        FieldRelativeVelocity::new(0.0, 0.0, 12.0),
        FieldRelativeVelocity::new(2.0, 0.0, 5.656),
        FieldRelativeVelocity::new(1.414, 1.414, 5.656),
    ] {
        assert_eq!(v, k.analytic_desaturation(&v));
    }
}

#[test]
fn when_desaturating_infeasible_speeds_should_scale_them() {
    let k = SwerveKinodynamics::get();

    assert_velocity(
        (5.0, 0.0, 0.0),
        &k.analytic_desaturation(&FieldRelativeVelocity::new(6.0, 0.0, 0.0)),
    );
    assert_velocity(
        (1.571, 1.571, 7.857),
        &k.analytic_desaturation(&FieldRelativeVelocity::new(2.828, 2.828, 14.142)),
    );
    assert_velocity(
        (2.178, 2.178, 5.430),
        &k.analytic_desaturation(&FieldRelativeVelocity::new(2.828, 2.828, 7.05)),
    );
    assert_velocity(
        (0.0, 0.0, -14.142),
        &k.analytic_desaturation(&FieldRelativeVelocity::new(0.0, 0.0, -20.0)),
    );
    assert_velocity(
        (0.123, -1.850, -8.898),
        &k.analytic_desaturation(&FieldRelativeVelocity::new(0.13, -1.95, -9.38)),
    );
}

#[test]
fn when_desaturating_chassis_speeds_should_match_field_relative() {
    let k = SwerveKinodynamics::get();
    let result = k.desaturate_chassis_speeds(&ChassisSpeeds::new(2.828, 2.828, 14.142));

    assert_near(1.571, result.vx, 0.001);
    assert_near(1.571, result.vy, 0.001);
    assert_near(7.857, result.omega, 0.001);
}

#[test]
fn when_desaturating_should_keep_the_direction_of_travel() {
    let k = SwerveKinodynamics::get();
    let mut rng = StdRng::seed_from_u64(100);

    for _ in 0..1000 {
        let v = FieldRelativeVelocity::new(
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-10.0..10.0),
            rng.gen_range(-30.0..30.0),
        );
        let result = k.analytic_desaturation(&v);

        assert!(result.norm() <= v.norm() + 1e-9);
        assert!(result.theta.abs() <= v.theta.abs() + 1e-9);
        if let (Some(before), Some(after)) = (v.angle(), result.angle()) {
            assert!(shortest_angle_between(before, after).abs() < 1e-6);
        }

        // the result is always achievable by the wheels
        let states = k.to_module_states_without_discretization(&result.to_chassis_speeds(0.0));
        assert!(states.max_speed() <= k.max_drive_velocity() + 1e-6);
    }
}

#[test]
fn when_spinning_in_place_should_drive_all_wheels_equally() {
    let k = SwerveKinodynamics::get();
    let states = k.to_module_states_without_discretization(&ChassisSpeeds::new(0.0, 0.0, -9.38));

    for state in states.as_array() {
        assert_near(3.316, state.speed, 0.001);
    }
    assert_near(-PI / 4.0, states.front_left.angle.unwrap(), 0.001);
    assert_near(-3.0 * PI / 4.0, states.front_right.angle.unwrap(), 0.001);
}

#[test]
fn when_translating_and_spinning_should_drive_wheels_differently() {
    let k = SwerveKinodynamics::get();
    let speeds = ChassisSpeeds::new(0.13, -1.95, -9.38);
    let states = k.to_module_states_without_discretization(&speeds);

    assert_near(4.957, states.front_left.speed, 0.001);
    assert_near(4.832, states.front_right.speed, 0.001);
    assert_near(2.506, states.rear_left.speed, 0.001);
    assert_near(2.250, states.rear_right.speed, 0.001);

    let recovered = k.to_chassis_speeds(&states);
    assert_near(0.13, recovered.vx, 1e-6);
    assert_near(-1.95, recovered.vy, 1e-6);
    assert_near(-9.38, recovered.omega, 1e-6);
}

#[test]
fn when_stationary_should_not_steer() {
    let k = SwerveKinodynamics::get();
    let states = k.to_module_states(&ChassisSpeeds::zero(), 0.02);

    for state in states.as_array() {
        assert_eq!(ModuleState::new(0.0, None), state);
    }
}

#[test]
fn when_round_tripping_with_discretization_should_recover_speeds() {
    let k = SwerveKinodynamics::unlimited();
    let speeds = ChassisSpeeds::new(5.0, 0.0, 25.0);

    let states = k.to_module_states(&speeds, 0.02);
    let recovered = k.to_chassis_speeds_with_discretization(&states, 0.02);

    assert_near(5.0, recovered.vx, 0.001);
    assert_near(0.0, recovered.vy, 0.001);
    assert_near(25.0, recovered.omega, 0.001);
}

#[test]
fn when_wheels_are_too_fast_should_scale_them_together() {
    let k = SwerveKinodynamics::for_test();
    let states = k.to_module_states(&ChassisSpeeds::new(2.0, 0.0, 2.0), 0.02);

    assert_near(1.0, states.max_speed(), 1e-9);
    // rotation makes the right side wheels faster than the left
    assert!(states.front_right.speed > states.front_left.speed);
}

#[test]
fn when_preferring_rotation_should_reduce_translation() {
    let k = SwerveKinodynamics::get();

    assert_velocity(
        (2.507, 0.0, 7.05),
        &k.prefer_rotation(&FieldRelativeVelocity::new(5.0, 0.0, 7.05)),
    );
    assert_velocity(
        (0.0, 0.0, 14.142),
        &k.prefer_rotation(&FieldRelativeVelocity::new(5.0, 0.0, 14.142)),
    );
    assert_velocity(
        (0.0, 0.0, -14.142),
        &k.prefer_rotation(&FieldRelativeVelocity::new(5.0, 0.0, -20.0)),
    );
    assert_velocity(
        (1.0, 0.0, 1.0),
        &k.prefer_rotation(&FieldRelativeVelocity::new(1.0, 0.0, 1.0)),
    );
}

#[test]
fn when_optimizing_a_module_should_flip_large_turns() {
    let state = ModuleState::new(1.0, Some(PI));

    let flipped = state.optimize(0.0);
    assert!(flipped.speed.approx_eq(-1.0, MARGIN));
    assert!(flipped.angle.unwrap().abs() < 1e-9);

    let kept = ModuleState::new(1.0, Some(0.5)).optimize(0.0);
    assert_eq!(ModuleState::new(1.0, Some(0.5)), kept);

    let stopped = ModuleState::new(0.0, None).optimize(1.0);
    assert_eq!(None, stopped.angle);
}

#[test]
fn when_optimizing_all_modules_should_use_the_current_angles() {
    let desired = ModuleStates::from_array([ModuleState::new(1.0, Some(PI)); 4]);
    let mut current = ModuleStates::from_array([ModuleState::new(1.0, Some(0.0)); 4]);
    current.rear_right = ModuleState::new(0.0, None);

    let result = desired.optimize(&current);

    assert!(result.front_left.speed.approx_eq(-1.0, MARGIN));
    assert!(result.rear_left.speed.approx_eq(-1.0, MARGIN));
    assert_eq!(ModuleState::new(1.0, Some(PI)), result.rear_right);
}

#[test]
fn test_all_module_states() {
    let state = ModuleState::new(0.5, Some(1.0));

    let states = ModuleStates::all(state);

    assert_eq!([state; 4], states.as_array());
    assert_eq!(0.5, states.max_speed());
}
