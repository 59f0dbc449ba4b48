use super::*;
use crate::geometry::Pose2d;
use std::fs;

const KINODYNAMICS: &str = r#"
[kinodynamics]
track_width_m = 0.5
wheelbase_m = 0.5
wheel_radius_m = 0.05
max_drive_velocity_m_s = 1.0
max_drive_acceleration_m_s2 = 1.0
max_drive_deceleration_m_s2 = 1.0
max_steering_velocity_rad_s = 13.0
max_steering_acceleration_rad_s2 = 62.8
center_of_gravity_height_m = 0.3
"#;

#[test]
fn when_only_the_vehicle_is_given_should_use_defaults() {
    let config = MotionConfig::from_toml_str(KINODYNAMICS).unwrap();

    assert_eq!(FollowerConfig::default(), config.follower);
    assert_eq!(ConstraintPreset::AllGood, config.constraints);
    assert_eq!(ManualMode::FieldRelative, config.manual_mode);
    assert_eq!(0.02, config.period_s);
    assert_eq!(0.5, config.kinodynamics.track_width_m);
    assert_eq!(62.8, config.kinodynamics.max_steering_acceleration_rad_s2);
}

#[test]
fn when_everything_is_given_should_read_it() {
    let text = format!(
        "constraints = \"slow\"\nmanual_mode = \"min_time_heading\"\nperiod_s = 0.01\n{}\n[follower]\nkp_cartesian = 3.0\nkp_theta_velocity = 0.5\n",
        KINODYNAMICS
    );

    let config = MotionConfig::from_toml_str(&text).unwrap();

    assert_eq!(ConstraintPreset::Slow, config.constraints);
    assert_eq!(ManualMode::MinTimeHeading, config.manual_mode);
    assert_eq!(0.01, config.period_s);
    assert_eq!(3.0, config.follower.kp_cartesian);
    assert_eq!(0.5, config.follower.kp_theta_velocity);
    // unset follower values keep their defaults
    assert_eq!(1.3, config.follower.kp_theta);
}

#[test]
fn when_written_and_read_back_should_be_unchanged() {
    let mut config = MotionConfig::new(SwerveKinodynamicsConfig::get());
    config.constraints = ConstraintPreset::Medium;
    config.manual_mode = ManualMode::ProfiledHeading;
    config.follower.kp_cartesian_velocity = 0.25;

    let text = config.to_toml_string().unwrap();
    let read = MotionConfig::from_toml_str(&text).unwrap();

    assert_eq!(config, read);
}

#[test]
fn when_the_text_is_not_toml_should_fail() {
    let result = MotionConfig::from_toml_str("kinodynamics = [");

    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}

#[test]
fn when_the_vehicle_is_missing_should_fail() {
    let result = MotionConfig::from_toml_str("constraints = \"fast\"\n");

    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}

#[test]
fn when_the_preset_is_unknown_should_fail() {
    let text = format!("constraints = \"ludicrous\"\n{}", KINODYNAMICS);

    assert!(matches!(
        MotionConfig::from_toml_str(&text),
        Err(Error::InvalidConfiguration(_))
    ));
}

#[test]
fn when_the_period_is_not_positive_should_fail() {
    let text = format!("period_s = 0.0\n{}", KINODYNAMICS);

    assert!(matches!(
        MotionConfig::from_toml_str(&text),
        Err(Error::InvalidConfiguration(_))
    ));
}

#[test]
fn when_the_vehicle_is_invalid_should_fail_to_build_the_model() {
    let text = KINODYNAMICS.replace("track_width_m = 0.5", "track_width_m = -0.5");
    let config = MotionConfig::from_toml_str(&text).unwrap();

    assert_eq!(
        Err(Error::InvalidKinodynamicsParameter {
            name: "track_width_m".to_string(),
            value: -0.5
        }),
        config.kinodynamics().map(|_| ())
    );
    assert!(config.planner().is_err());
}

#[test]
fn when_building_a_planner_should_use_the_preset() {
    let text = format!("constraints = \"for_test\"\n{}", KINODYNAMICS);
    let config = MotionConfig::from_toml_str(&text).unwrap();

    let trajectory = config
        .planner()
        .unwrap()
        .rest_to_rest(Pose2d::identity(), Pose2d::new(1.0, 0.0, 0.0));

    assert_eq!(80, trajectory.length());
    assert!((trajectory.duration() - 2.0).abs() < 0.01);
}

#[test]
fn when_reading_a_file_should_parse_it() {
    let path = std::env::temp_dir().join(format!("swerve_motion_config_{}.toml", std::process::id()));
    fs::write(&path, KINODYNAMICS).unwrap();

    let config = MotionConfig::from_toml_file(&path);
    fs::remove_file(&path).unwrap();

    assert_eq!(0.5, config.unwrap().kinodynamics.wheelbase_m);
}

#[test]
fn when_the_file_does_not_exist_should_fail() {
    let result = MotionConfig::from_toml_file("/this/path/does/not/exist.toml");

    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}
