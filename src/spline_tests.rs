use super::*;
use float_cmp::{ApproxEq, F64Margin};
use std::f64::consts::{FRAC_PI_2, PI};

const MARGIN: F64Margin = F64Margin {
    ulps: 2,
    epsilon: 1e-9,
};

#[test]
fn when_going_straight_should_follow_the_line() {
    let spline = HolonomicSpline::new(
        &HolonomicPose2d::new(0.0, 0.0, 0.0, 0.0),
        &HolonomicPose2d::new(2.0, 0.0, 0.0, 0.0),
    );

    for i in 0..=10 {
        let t = i as f64 / 10.0;
        assert!(spline.point(t).y.approx_eq(0.0, MARGIN));
        assert!(spline.curvature(t).approx_eq(0.0, MARGIN));
        assert!(spline.heading_rate(t).approx_eq(0.0, MARGIN));
    }
    assert!(spline.point(0.5).x.approx_eq(1.0, MARGIN));
    assert!(spline.point(1.0).x.approx_eq(2.0, MARGIN));
}

#[test]
fn when_created_should_match_the_end_courses() {
    let spline = HolonomicSpline::new(
        &HolonomicPose2d::new(0.0, 0.0, 0.0, 0.0),
        &HolonomicPose2d::new(1.0, 1.0, 0.0, FRAC_PI_2),
    );

    assert!(spline.course(0.0).unwrap().approx_eq(0.0, MARGIN));
    assert!(spline.course(1.0).unwrap().approx_eq(FRAC_PI_2, MARGIN));

    // end derivative magnitude is 1.2 times the chord
    let (dx, dy) = spline.velocity(0.0);
    assert!(dx.hypot(dy).approx_eq(1.2 * 2.0_f64.sqrt(), MARGIN));

    // turning left
    assert!(spline.curvature(0.5) > 0.0);
}

#[test]
fn when_turning_the_heading_should_use_a_smooth_step() {
    let spline = HolonomicSpline::new(
        &HolonomicPose2d::new(0.0, 0.0, 0.0, 0.0),
        &HolonomicPose2d::new(1.0, 0.0, 1.0, 0.0),
    );

    assert!(spline.heading(0.0).approx_eq(0.0, MARGIN));
    assert!(spline.heading(0.5).approx_eq(0.5, MARGIN));
    assert!(spline.heading(1.0).approx_eq(1.0, MARGIN));

    // no rotation rate at the ends
    assert!(spline.heading_rate(0.0).approx_eq(0.0, MARGIN));
    assert!(spline.heading_rate(1.0).approx_eq(0.0, MARGIN));
    assert!(spline.heading_rate(0.5) > 0.0);
}

#[test]
fn when_the_heading_crosses_pi_should_take_the_short_way() {
    let spline = HolonomicSpline::new(
        &HolonomicPose2d::new(0.0, 0.0, PI - 0.1, 0.0),
        &HolonomicPose2d::new(1.0, 0.0, -PI + 0.1, 0.0),
    );

    let mid = spline.heading(0.5);
    assert!((mid.abs() - PI).abs() < 1e-9);
    assert!(spline.heading_rate(0.5) > 0.0);
}

#[test]
fn when_the_end_points_coincide_should_have_no_course() {
    let spline = HolonomicSpline::new(
        &HolonomicPose2d::new(1.0, 1.0, 0.0, 0.0),
        &HolonomicPose2d::new(1.0, 1.0, 1.0, 0.0),
    );

    assert_eq!(None, spline.course(0.5));
    assert_eq!(0.0, spline.heading_rate(0.5));
}

#[test]
fn when_evaluated_at_the_end_should_land_exactly_on_the_end_waypoint() {
    let end = HolonomicPose2d::new(1.0, 0.3, 0.7, 0.2);
    let spline = HolonomicSpline::new(&HolonomicPose2d::new(0.1, -0.2, 0.0, 0.0), &end);

    assert_eq!(1.0, spline.point(1.0).x);
    assert_eq!(0.3, spline.point(1.0).y);
    assert_eq!(0.7, spline.heading(1.0));
}
