use super::*;
use crate::path::PathPoint;

fn assert_near(expected: f64, actual: f64, tolerance: f64) {
    assert!(
        (expected - actual).abs() <= tolerance,
        "expected {} but got {}",
        expected,
        actual
    );
}

fn point(x: f64) -> PathPoint {
    PathPoint::new(Pose2d::new(x, 0.0, 0.0), Some(0.0), 0.0, 0.0)
}

/// Accelerates at 1 m/s^2 for a second, then cruises for a second.
fn accelerate_and_cruise() -> Trajectory {
    Trajectory::new(vec![
        TimedPose::new(point(0.0), 0.0, 0.0, 0.0, 1.0),
        TimedPose::new(point(0.5), 0.5, 1.0, 1.0, 0.0),
        TimedPose::new(point(1.5), 1.5, 2.0, 1.0, 0.0),
    ])
}

#[test]
fn when_sampling_between_points_should_use_constant_acceleration() {
    let trajectory = accelerate_and_cruise();

    let sample = trajectory.sample(0.5).unwrap();
    assert_near(0.5, sample.velocity, 1e-9);
    assert_near(0.125, sample.distance, 1e-9);
    assert_near(0.125, sample.point.pose.x(), 1e-9);
    assert_near(1.0, sample.acceleration, 1e-9);

    let sample = trajectory.sample(1.5).unwrap();
    assert_near(1.0, sample.velocity, 1e-9);
    assert_near(1.0, sample.point.pose.x(), 1e-9);
    assert_near(0.0, sample.acceleration, 1e-9);
}

#[test]
fn when_sampling_outside_the_trajectory_should_clamp() {
    let trajectory = accelerate_and_cruise();

    assert_eq!(trajectory.get_point(0).copied(), trajectory.sample(-1.0));
    assert_eq!(trajectory.get_point(2).copied(), trajectory.sample(10.0));
    assert_near(2.0, trajectory.duration(), 1e-9);
    assert_eq!(3, trajectory.length());
    assert_eq!(Some(Pose2d::new(1.5, 0.0, 0.0)), trajectory.last_pose());
}

#[test]
fn when_empty_should_sample_nothing() {
    let trajectory = Trajectory::default();

    assert!(trajectory.is_empty());
    assert_eq!(None, trajectory.sample(0.0));
    assert_eq!(0.0, trajectory.duration());
    assert_eq!(None, trajectory.last_pose());

    let mut iter = TrajectoryTimeIterator::new(trajectory);
    assert!(iter.is_done());
    assert_eq!(None, iter.advance(0.02));
}

#[test]
fn when_iterating_should_move_through_time() {
    let mut iter = TrajectoryTimeIterator::new(accelerate_and_cruise());

    assert!(!iter.is_done());
    assert_near(2.0, iter.remaining_progress(), 1e-9);

    // preview does not move the cursor
    let ahead = iter.preview(0.5).unwrap();
    assert_near(0.5, ahead.velocity, 1e-9);
    assert_eq!(0.0, iter.time());
    assert_eq!(0.0, iter.sample().unwrap().velocity);

    let sample = iter.advance(1.0).unwrap();
    assert_near(1.0, sample.velocity, 1e-9);
    assert_near(1.0, iter.remaining_progress(), 1e-9);

    let sample = iter.advance(5.0).unwrap();
    assert_near(1.5, sample.point.pose.x(), 1e-9);
    assert!(iter.is_done());
    assert_eq!(0.0, iter.remaining_progress());
    assert_eq!(3, iter.trajectory().length());
}
