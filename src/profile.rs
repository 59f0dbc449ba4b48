//! One dimensional motion profiles.
//!
//! A profile produces the next reference state on the way from an initial state to a goal,
//! subject to limits on velocity, acceleration and (for [jerk_limited::JerkLimitedProfile])
//! jerk. Profiles hold no state between calls: the result of [Profile::calculate] depends only
//! on its arguments, so a caller steps a profile by feeding the previous result back in.
//!
//! Every profile can also estimate the time it needs to reach the goal. Multiple profiles that
//! should finish together (e.g. the x, y and heading axes of a holonomic move) are coordinated
//! by slowing the faster ones down, see [solve_for_slower_eta] and [coordinate].

use crate::number_space::{to_number_space, NumberSpaceType, ValueSpace};
use crate::state::{Control, Model};

/// Defines the jerk limited (S-curve) profile.
pub mod jerk_limited;

/// Defines the minimum time feedback controller.
pub mod min_time;

/// Defines the trapezoidal profile.
pub mod trapezoid;

#[cfg(test)]
#[path = "profile_tests.rs"]
mod profile_tests;

/// The maximum number of bisection steps taken when solving for a profile scale.
const MAX_SCALE_ITERATIONS: usize = 20;

/// The next reference state of a profile, together with the estimated time to the goal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResultWithEta {
    /// The reference state at the end of the time step.
    pub state: Control,

    /// The estimated time, measured from the initial state, to reach the goal.
    pub eta_s: f64,
}

/// Defines a one dimensional motion profile.
pub trait Profile: Sized {
    /// Returns the reference state `dt` seconds after `initial`, on the way to `goal`.
    ///
    /// ## Parameters
    ///
    /// * `dt` - The time step in seconds
    /// * `initial` - The current reference state
    /// * `goal` - The state to reach
    fn calculate(&self, dt: f64, initial: Control, goal: Model) -> Control {
        self.calculate_with_eta(dt, initial, goal).state
    }

    /// Returns the reference state `dt` seconds after `initial`, and the time needed to reach
    /// `goal` from `initial`.
    fn calculate_with_eta(&self, dt: f64, initial: Control, goal: Model) -> ResultWithEta;

    /// Returns a copy of this profile with its acceleration limits multiplied by `s`.
    ///
    /// The velocity limit and the tolerance are unchanged.
    fn scale(&self, s: f64) -> Self;
}

/// Finds the acceleration scale that makes `profile` reach `goal` in `eta` seconds.
///
/// Scaling the acceleration down makes a rest-to-rest profile slower, so the scale is found by
/// bisection on [0, 1]. If the profile is already as slow as `eta` the scale is 1.0.
///
/// ## Parameters
///
/// * `profile` - The default profile
/// * `dt` - The time step used to evaluate the profile
/// * `initial` - The initial state
/// * `goal` - The goal state
/// * `eta` - The desired time to reach the goal
/// * `eta_tolerance` - The acceptable difference between the achieved and the desired eta
pub fn solve_for_slower_eta<P: Profile>(
    profile: &P,
    dt: f64,
    initial: Control,
    goal: Model,
    eta: f64,
    eta_tolerance: f64,
) -> f64 {
    let default_eta = profile.calculate_with_eta(dt, initial, goal).eta_s;
    if default_eta >= eta - eta_tolerance {
        return 1.0;
    }

    let mut low = 0.0;
    let mut high = 1.0;
    let mut s = 1.0;
    for _ in 0..MAX_SCALE_ITERATIONS {
        s = 0.5 * (low + high);
        let scaled_eta = profile.scale(s).calculate_with_eta(dt, initial, goal).eta_s;
        if (scaled_eta - eta).abs() < eta_tolerance {
            break;
        }

        if scaled_eta > eta {
            low = s;
        } else {
            high = s;
        }
    }

    s
}

/// Slows down the given profiles so they all reach their goals at the same time.
///
/// Returns the scaled profiles, in the same order as the inputs, together with the common eta.
/// The slowest profile is not changed.
///
/// ## Parameters
///
/// * `profiles` - One profile per axis
/// * `dt` - The time step used to evaluate the profiles
/// * `initials` - The initial state per axis
/// * `goals` - The goal per axis
/// * `eta_tolerance` - The acceptable difference between the achieved and the desired eta
pub fn coordinate<P: Profile>(
    profiles: &[P],
    dt: f64,
    initials: &[Control],
    goals: &[Model],
    eta_tolerance: f64,
) -> (Vec<P>, f64) {
    let slowest_eta = profiles
        .iter()
        .zip(initials.iter().zip(goals.iter()))
        .map(|(p, (i, g))| p.calculate_with_eta(dt, *i, *g).eta_s)
        .fold(0.0, f64::max);

    let scaled = profiles
        .iter()
        .zip(initials.iter().zip(goals.iter()))
        .map(|(p, (i, g))| {
            let s = solve_for_slower_eta(p, dt, *i, *g, slowest_eta, eta_tolerance);
            p.scale(s)
        })
        .collect();

    (scaled, slowest_eta)
}

/// Runs a linear profile in a periodic number space, so that the goal is always approached
/// along the shortest path.
pub struct WrappedProfile<P: Profile> {
    profile: P,
    space_type: NumberSpaceType,
    space: Box<dyn ValueSpace>,
}

impl<P: Profile> WrappedProfile<P> {
    /// Creates a new wrapped profile.
    pub fn new(profile: P, space_type: NumberSpaceType) -> Self {
        Self {
            profile,
            space_type,
            space: to_number_space(space_type),
        }
    }

    /// Returns the wrapped profile.
    pub fn inner(&self) -> &P {
        &self.profile
    }
}

impl<P: Profile> Profile for WrappedProfile<P> {
    fn calculate_with_eta(&self, dt: f64, initial: Control, goal: Model) -> ResultWithEta {
        let unwrapped_goal = Model::new(
            initial.x + self.space.shortest_distance(initial.x, goal.x),
            goal.v,
        );
        let result = self.profile.calculate_with_eta(dt, initial, unwrapped_goal);
        ResultWithEta {
            state: Control::new(
                self.space.normalize(result.state.x),
                result.state.v,
                result.state.a,
            ),
            eta_s: result.eta_s,
        }
    }

    fn scale(&self, s: f64) -> Self {
        Self::new(self.profile.scale(s), self.space_type)
    }
}
