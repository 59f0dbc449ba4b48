//! Geometric paths, sampled from splines and indexed by distance.

use tracing::debug;

use crate::geometry::{shortest_angle_between, Pose2d};
use crate::spline::HolonomicSpline;

#[cfg(test)]
#[path = "path_tests.rs"]
mod path_tests;

/// The largest allowed step along x between samples, in meters.
pub const MAX_DX: f64 = 0.0127;

/// The largest allowed step along y between samples, in meters.
pub const MAX_DY: f64 = 0.0127;

/// The largest allowed heading step between samples, in radians.
pub const MAX_DTHETA: f64 = std::f64::consts::PI / 180.0;

/// The deepest the subdivision of a single spline may recurse.
const MAX_DEPTH: usize = 24;

/// A point on a path, with the differential properties of the path at that point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PathPoint {
    /// The position and heading.
    pub pose: Pose2d,

    /// The direction of travel, or `None` where the path does not translate.
    pub course: Option<f64>,

    /// The change in heading per meter travelled, in rad/m.
    pub heading_rate: f64,

    /// The curvature of the path, in rad/m.
    pub curvature: f64,
}

impl PathPoint {
    /// Returns the point a fraction `t` of the way to `end`.
    pub fn interpolate(&self, end: &PathPoint, t: f64) -> PathPoint {
        let course = match (self.course, end.course) {
            (Some(a), Some(b)) => Some(a + shortest_angle_between(a, b) * t),
            (a, b) => a.or(b),
        };
        PathPoint::new(
            self.pose.interpolate(&end.pose, t),
            course,
            self.heading_rate + (end.heading_rate - self.heading_rate) * t,
            self.curvature + (end.curvature - self.curvature) * t,
        )
    }

    /// Creates a new point.
    pub fn new(pose: Pose2d, course: Option<f64>, heading_rate: f64, curvature: f64) -> Self {
        Self {
            pose,
            course,
            heading_rate,
            curvature,
        }
    }

    /// Samples a spline at `t`.
    pub fn on_spline(spline: &HolonomicSpline, t: f64) -> Self {
        Self::new(
            spline.pose(t),
            spline.course(t),
            spline.heading_rate(t),
            spline.curvature(t),
        )
    }
}

/// A sequence of path points with the distance travelled to reach each one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    points: Vec<PathPoint>,
    distances: Vec<f64>,
}

impl Path {
    /// Returns the point `distance` meters along the path, interpolating between samples. The
    /// distance is clamped to the path.
    pub fn at_distance(&self, distance: f64) -> Option<PathPoint> {
        let last = self.points.len().checked_sub(1)?;
        if distance <= 0.0 {
            return self.points.first().copied();
        }
        if distance >= self.distances[last] {
            return self.points.last().copied();
        }

        let i = self.distances.partition_point(|d| *d <= distance);
        let (d0, d1) = (self.distances[i - 1], self.distances[i]);
        let t = if d1 > d0 { (distance - d0) / (d1 - d0) } else { 0.0 };
        Some(self.points[i - 1].interpolate(&self.points[i], t))
    }

    /// Returns the distance from the start of the path to each point.
    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    /// Returns `true` if the path has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the total translation distance of the path.
    pub fn length(&self) -> f64 {
        self.distances.last().copied().unwrap_or(0.0)
    }

    /// Creates a path through the given points.
    pub fn new(points: Vec<PathPoint>) -> Self {
        let mut distances = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, point) in points.iter().enumerate() {
            if i > 0 {
                total += (point.pose.translation() - points[i - 1].pose.translation()).norm();
            }
            distances.push(total);
        }
        Self { points, distances }
    }

    /// Returns the points of the path.
    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }

    /// Returns points evenly spaced `step` meters apart, together with their distance along the
    /// path. The last point of the path is always included.
    ///
    /// ## Example
    ///
    /// ```
    /// use swerve_motion::geometry::HolonomicPose2d;
    /// use swerve_motion::path::{sample_splines, MAX_DTHETA, MAX_DX, MAX_DY};
    /// use swerve_motion::spline::HolonomicSpline;
    ///
    /// let spline = HolonomicSpline::new(
    ///     &HolonomicPose2d::new(0.0, 0.0, 0.0, 0.0),
    ///     &HolonomicPose2d::new(1.0, 0.0, 0.0, 0.0),
    /// );
    /// let path = sample_splines(&[spline], MAX_DX, MAX_DY, MAX_DTHETA);
    ///
    /// assert_eq!(80, path.resample(MAX_DX).len());
    /// ```
    pub fn resample(&self, step: f64) -> Vec<(PathPoint, f64)> {
        let length = self.length();
        let mut result = Vec::new();
        if self.points.is_empty() || !(step > 0.0) {
            return result;
        }

        let mut i = 0;
        loop {
            let distance = i as f64 * step;
            if distance >= length {
                break;
            }
            if let Some(point) = self.at_distance(distance) {
                result.push((point, distance));
            }
            i += 1;
        }
        if let Some(last) = self.points.last() {
            result.push((*last, length));
        }
        result
    }
}

/// Samples a chain of splines into a path, subdividing each spline until consecutive samples
/// are closer than the given steps.
///
/// ## Parameters
///
/// * `splines` - The splines, each starting where the previous one ends
/// * `max_dx` - The largest step along x
/// * `max_dy` - The largest step along y
/// * `max_dtheta` - The largest heading step
pub fn sample_splines(
    splines: &[HolonomicSpline],
    max_dx: f64,
    max_dy: f64,
    max_dtheta: f64,
) -> Path {
    let mut points = Vec::new();
    for (i, spline) in splines.iter().enumerate() {
        if i == 0 {
            points.push(PathPoint::on_spline(spline, 0.0));
        }
        subdivide(spline, 0.0, 1.0, max_dx, max_dy, max_dtheta, 0, &mut points);
    }

    debug!(samples = points.len(), "Sampled splines");
    Path::new(points)
}

#[allow(clippy::too_many_arguments)]
fn subdivide(
    spline: &HolonomicSpline,
    t0: f64,
    t1: f64,
    max_dx: f64,
    max_dy: f64,
    max_dtheta: f64,
    depth: usize,
    points: &mut Vec<PathPoint>,
) {
    let start = spline.pose(t0);
    let end = spline.pose(t1);
    let delta = end.translation() - start.translation();
    let dtheta = shortest_angle_between(start.heading(), end.heading());

    let small_enough =
        delta.x.abs() <= max_dx && delta.y.abs() <= max_dy && dtheta.abs() <= max_dtheta;
    if small_enough || depth >= MAX_DEPTH {
        points.push(PathPoint::on_spline(spline, t1));
        return;
    }

    let mid = 0.5 * (t0 + t1);
    subdivide(spline, t0, mid, max_dx, max_dy, max_dtheta, depth + 1, points);
    subdivide(spline, mid, t1, max_dx, max_dy, max_dtheta, depth + 1, points);
}
