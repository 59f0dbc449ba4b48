use super::*;

const DT: f64 = 0.02;

fn profile() -> TrapezoidProfile {
    TrapezoidProfile::new(1.0, 1.0, 0.01).unwrap()
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
fn when_creating_with_invalid_limits_should_fail() {
    assert_eq!(
        TrapezoidProfile::new(0.0, 1.0, 0.01),
        Err(Error::InvalidProfileParameter {
            name: "max_velocity".to_string(),
            value: 0.0
        })
    );
    assert!(TrapezoidProfile::new(1.0, -1.0, 0.01).is_err());
    assert!(TrapezoidProfile::new(1.0, 1.0, f64::NAN).is_err());
}

#[test]
fn when_moving_rest_to_rest_should_report_triangle_and_trapezoid_etas() {
    let p = profile();

    let triangle = p.calculate_with_eta(DT, Control::default(), Model::new(1.0, 0.0));
    assert_near(2.0, triangle.eta_s, 0.001);

    let trapezoid = p.calculate_with_eta(DT, Control::default(), Model::new(2.0, 0.0));
    assert_near(3.0, trapezoid.eta_s, 0.001);
}

#[test]
fn when_moving_away_from_the_goal_should_plan_to_come_back() {
    let p = profile();

    let result = p.calculate_with_eta(DT, Control::new(0.0, 1.0, 0.0), Model::new(0.0, 0.0));
    assert_near(2.414, result.eta_s, 0.001);

    // first it has to brake
    assert_near(-1.0, result.state.a, 1e-9);
    assert_near(0.98, result.state.v, 1e-9);
}

#[test]
fn when_stepping_should_arrive_at_the_eta() {
    let p = profile();
    let goal = Model::new(1.0, 0.0);

    let mut state = Control::default();
    let mut total_time = 0.0;
    for _ in 0..1000 {
        state = p.calculate(DT, state, goal);
        total_time += DT;
        if state.model().near(&goal, 0.01) {
            break;
        }
    }

    assert_near(2.0, total_time, 0.001);
}

#[test]
fn when_stepping_with_eta_should_sum_to_the_initial_estimate() {
    let p = profile();
    let cases = [
        (Control::default(), Model::new(2.0, 0.0)),
        (Control::new(0.0, 1.0, 0.0), Model::new(0.0, 0.0)),
        (Control::new(1.0, -0.5, 0.0), Model::new(-1.5, 0.0)),
        (Control::new(0.0, 0.0, 0.0), Model::new(0.3, 0.5)),
    ];

    for (initial, goal) in cases {
        let estimate = p.calculate_with_eta(DT, initial, goal).eta_s;

        let mut state = initial;
        let mut total_time = 0.0;
        for _ in 0..1000 {
            let result = p.calculate_with_eta(DT, state, goal);
            state = result.state;
            total_time += DT;
            if state.model().near(&goal, 0.01) {
                break;
            }
        }

        assert!(
            (estimate - total_time).abs() <= DT + 1e-9,
            "estimate {} total {}",
            estimate,
            total_time
        );
    }
}

#[test]
fn when_starting_near_the_goal_should_snap() {
    let p = profile();

    let result = p.calculate_with_eta(DT, Control::new(0.995, 0.005, 0.0), Model::new(1.0, 0.0));

    assert_eq!(result.state, Control::new(1.0, 0.0, 0.0));
    assert_eq!(result.eta_s, 0.0);
}

#[test]
fn when_starting_above_the_velocity_limit_should_slow_to_the_limit() {
    let p = profile();

    let plan = p
        .plan(Model::new(0.0, 2.0), Model::new(10.0, 0.0))
        .unwrap();

    let first = plan.sample(DT);
    assert_near(-1.0, first.a, 1e-9);

    let cruising = plan.sample(2.0);
    assert_near(1.0, cruising.v, 1e-9);
    assert_near(0.0, cruising.a, 1e-9);

    let end = plan.sample(plan.duration());
    assert_eq!(end, Control::new(10.0, 0.0, 0.0));
}

#[test]
fn when_scaling_should_only_change_acceleration() {
    let scaled = profile().scale(0.5);

    assert_eq!(scaled.max_velocity(), 1.0);
    assert_eq!(scaled.max_acceleration(), 0.5);
    assert_eq!(scaled.tolerance(), 0.01);

    // a 1 m triangle at half the acceleration takes sqrt(2) longer
    let eta = scaled
        .calculate_with_eta(DT, Control::default(), Model::new(1.0, 0.0))
        .eta_s;
    assert_near(2.0 * 2.0_f64.sqrt(), eta, 1e-9);
}
