use super::trapezoid::TrapezoidProfile;
use super::*;
use std::f64::consts::PI;

const DT: f64 = 0.02;
const PROFILE_TOLERANCE: f64 = 0.01;
const ETA_TOLERANCE: f64 = 0.001;

fn unit_trapezoid() -> TrapezoidProfile {
    TrapezoidProfile::new(1.0, 1.0, PROFILE_TOLERANCE).unwrap()
}

fn assert_near(expected: f64, actual: f64, tolerance: f64) {
    assert!(
        (expected - actual).abs() <= tolerance,
        "expected {} but got {}",
        expected,
        actual
    );
}

#[test]
fn when_coordinating_two_axes_should_slow_the_faster_one() {
    let profile = unit_trapezoid();

    // x is moving away from its goal, y starts at rest
    let ix = Control::new(0.0, 1.0, 0.0);
    let gx = Model::new(0.0, 0.0);
    let iy = Control::new(0.0, 0.0, 0.0);
    let gy = Model::new(0.5, 0.0);

    let tx = profile.calculate_with_eta(DT, ix, gx).eta_s;
    let ty = profile.calculate_with_eta(DT, iy, gy).eta_s;
    assert_near(2.414, tx, 0.001);
    assert_near(1.414, ty, 0.001);

    let slow_eta = tx.max(ty);
    let sx = solve_for_slower_eta(&profile, DT, ix, gx, slow_eta, ETA_TOLERANCE);
    let sy = solve_for_slower_eta(&profile, DT, iy, gy, slow_eta, ETA_TOLERANCE);
    assert_eq!(1.0, sx);
    // a triangle over 0.5 takes sqrt(2 / a), so a = 2 / 2.414^2
    assert_near(0.3433, sy, 0.001);
    assert_near(
        slow_eta,
        profile.scale(sy).calculate_with_eta(DT, iy, gy).eta_s,
        ETA_TOLERANCE,
    );

    // the scaled profiles finish together
    let px = profile.scale(sx);
    let py = profile.scale(sy);
    let mut state_x = ix;
    let mut state_y = iy;
    let mut x_done = None;
    let mut y_done = None;
    let mut t = 0.0;
    for _ in 0..1000 {
        t += DT;
        state_x = px.calculate(DT, state_x, gx);
        state_y = py.calculate(DT, state_y, gy);
        if x_done.is_none() && state_x.model().near(&gx, PROFILE_TOLERANCE) {
            x_done = Some(t);
        }
        if y_done.is_none() && state_y.model().near(&gy, PROFILE_TOLERANCE) {
            y_done = Some(t);
        }
        if x_done.is_some() && y_done.is_some() {
            break;
        }
    }

    let x_done = x_done.unwrap();
    let y_done = y_done.unwrap();
    assert!((x_done - y_done).abs() <= 2.0 * DT + 1e-9);
}

#[test]
fn when_the_profile_is_already_slowest_should_not_scale() {
    let profile = unit_trapezoid();
    let s = solve_for_slower_eta(
        &profile,
        DT,
        Control::default(),
        Model::new(1.0, 0.0),
        1.0,
        ETA_TOLERANCE,
    );
    assert_eq!(1.0, s);
}

#[test]
fn when_coordinating_many_axes_should_match_the_slowest_eta() {
    let profiles = [unit_trapezoid(), unit_trapezoid(), unit_trapezoid()];
    let initials = [Control::default(), Control::default(), Control::default()];
    let goals = [
        Model::new(2.0, 0.0),
        Model::new(0.5, 0.0),
        Model::new(-1.0, 0.0),
    ];

    let (scaled, eta) = coordinate(&profiles, DT, &initials, &goals, ETA_TOLERANCE);

    assert_near(3.0, eta, 1e-9);
    for (profile, (initial, goal)) in scaled.iter().zip(initials.iter().zip(goals.iter())) {
        let scaled_eta = profile.calculate_with_eta(DT, *initial, *goal).eta_s;
        assert_near(eta, scaled_eta, 0.01);
    }
}

#[test]
fn when_wrapping_a_profile_should_cross_the_boundary() {
    let profile = WrappedProfile::new(unit_trapezoid(), NumberSpaceType::angle());

    let initial = Control::new(PI - 0.1, 0.0, 0.0);
    let goal = Model::new(-PI + 0.1, 0.0);

    let result = profile.calculate_with_eta(DT, initial, goal);

    // the short way is 0.2 rad in the positive direction
    assert!(result.state.v > 0.0);
    assert_near(2.0 * 0.2_f64.sqrt(), result.eta_s, 1e-9);

    let mut state = initial;
    for _ in 0..100 {
        state = profile.calculate(DT, state, goal);
        assert!(state.x >= -PI && state.x < PI);
    }
    assert!(state.model().near(&goal, PROFILE_TOLERANCE));
}
