//! Describes the space that a one dimensional value lives in, and how that space behaves at its
//! boundaries.
//!
//! A linear space runs from -infinity to +infinity, so there is exactly one way to get from one
//! value to another. A periodic space wraps around after a fixed period, so there are always two
//! ways to reach a value: forwards through the interior of the range, or backwards across the
//! wrap point. Headings and steering angles live in a periodic space with a period of 2 PI.
//!
//! Motion profiles and controllers that operate on wrapped values take a [ValueSpace] so that
//! comparisons between a measurement and a goal always use a distance, never a raw subtraction.
//! The [to_number_space()] function creates the space matching a [NumberSpaceType].

use std::f64::consts::PI;

#[cfg(test)]
#[path = "number_space_tests.rs"]
mod number_space_tests;

/// Defines the different kinds of number spaces available.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumberSpaceType {
    /// Values range from -infinity to +infinity and never wrap.
    Linear,

    /// Values range from `start` (inclusive) to `start + period` (exclusive) and wrap around.
    Periodic {
        /// The lowest value in the range
        start: f64,

        /// The size of the range
        period: f64,
    },
}

impl NumberSpaceType {
    /// Returns the periodic space for angles in the range [-PI, PI).
    pub fn angle() -> Self {
        NumberSpaceType::Periodic {
            start: -PI,
            period: 2.0 * PI,
        }
    }
}

/// The candidate signed distances from one value to another.
///
/// Held by value so that controllers can evaluate the candidates every cycle without
/// allocating.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Distances {
    /// The distance in the positive direction, or the only distance in a linear space.
    pub forward: f64,

    /// The distance in the negative direction. `None` in a linear space.
    pub backward: Option<f64>,
}

impl Distances {
    /// Iterates over the candidates, the forward distance first.
    pub fn iter(&self) -> impl Iterator<Item = f64> {
        std::iter::once(self.forward).chain(self.backward)
    }

    /// Returns the number of candidates.
    pub fn count(&self) -> usize {
        1 + usize::from(self.backward.is_some())
    }

    /// Returns a single candidate.
    pub fn one(distance: f64) -> Self {
        Self {
            forward: distance,
            backward: None,
        }
    }

    /// Returns a forward and a backward candidate.
    pub fn two(forward: f64, backward: f64) -> Self {
        Self {
            forward,
            backward: Some(backward),
        }
    }
}

/// Defines an abstraction over number spaces.
pub trait ValueSpace: Send + Sync {
    /// Returns every candidate signed distance from `start` to `end`.
    ///
    /// A linear space has a single distance. A periodic space has two: the first is the distance
    /// in the positive direction, the second the distance in the negative direction.
    ///
    /// ## Parameters
    ///
    /// * `start` - The starting value
    /// * `end` - The ending value
    ///
    /// ## Example
    ///
    /// ```
    /// use core::f64::consts::PI;
    /// use swerve_motion::number_space::{ Distances, NumberSpaceType, to_number_space };
    ///
    /// let space = to_number_space(NumberSpaceType::Linear);
    /// assert_eq!(Distances::one(1.0), space.distances(1.0, 2.0));
    ///
    /// let space = to_number_space(NumberSpaceType::angle());
    /// let distances = space.distances(0.0, 0.5 * PI);
    /// assert_eq!(2, distances.count());
    /// assert!((distances.forward - 0.5 * PI).abs() < 1e-12);
    /// assert!((distances.backward.unwrap() + 1.5 * PI).abs() < 1e-12);
    /// ```
    fn distances(&self, start: f64, end: f64) -> Distances;

    /// Returns the representation of `value` inside the range of the space.
    fn normalize(&self, value: f64) -> f64;

    /// Returns the signed distance from `start` to `end` with the smallest magnitude.
    ///
    /// ## Example
    ///
    /// ```
    /// use core::f64::consts::PI;
    /// use swerve_motion::number_space::{ NumberSpaceType, to_number_space };
    ///
    /// let space = to_number_space(NumberSpaceType::angle());
    /// let value = space.shortest_distance(0.0, 1.5 * PI);
    /// assert!((value + 0.5 * PI).abs() < 1e-12);
    /// ```
    fn shortest_distance(&self, start: f64, end: f64) -> f64;
}

/// The space of all real numbers.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearSpace {}

impl LinearSpace {
    /// Creates a new linear space.
    pub fn new() -> Self {
        Self {}
    }
}

impl ValueSpace for LinearSpace {
    fn distances(&self, start: f64, end: f64) -> Distances {
        Distances::one(end - start)
    }

    fn normalize(&self, value: f64) -> f64 {
        value
    }

    fn shortest_distance(&self, start: f64, end: f64) -> f64 {
        end - start
    }
}

/// A space that wraps around every `period`.
#[derive(Clone, Copy, Debug)]
pub struct PeriodicSpace {
    start: f64,
    period: f64,
}

impl PeriodicSpace {
    /// Creates a new periodic space.
    ///
    /// ## Parameters
    ///
    /// * `start` - The lowest value of the range
    /// * `period` - The size of the range, must be positive
    pub fn new(start: f64, period: f64) -> Self {
        Self { start, period }
    }

    /// Creates the space for angles in the range [`start`, `start` + 2 PI).
    pub fn with_two_pi_range(start: f64) -> Self {
        Self::new(start, 2.0 * PI)
    }
}

impl ValueSpace for PeriodicSpace {
    fn distances(&self, start: f64, end: f64) -> Distances {
        let forward = (end - start).rem_euclid(self.period);
        if forward == 0.0 {
            Distances::two(0.0, 0.0)
        } else {
            Distances::two(forward, forward - self.period)
        }
    }

    fn normalize(&self, value: f64) -> f64 {
        self.start + (value - self.start).rem_euclid(self.period)
    }

    fn shortest_distance(&self, start: f64, end: f64) -> f64 {
        let forward = (end - start).rem_euclid(self.period);
        if forward > 0.5 * self.period {
            forward - self.period
        } else {
            forward
        }
    }
}

/// Returns a [ValueSpace] instance for the given number space type.
///
/// ```
/// use swerve_motion::number_space::{ NumberSpaceType, to_number_space };
///
/// let space = to_number_space(NumberSpaceType::Periodic { start: 0.0, period: 10.0 });
/// assert_eq!(3.0, space.normalize(23.0));
/// assert_eq!(-2.0, space.shortest_distance(1.0, 9.0));
/// ```
pub fn to_number_space(number_space_type: NumberSpaceType) -> Box<dyn ValueSpace> {
    match number_space_type {
        NumberSpaceType::Linear => Box::new(LinearSpace::new()),
        NumberSpaceType::Periodic { start, period } => Box::new(PeriodicSpace::new(start, period)),
    }
}
