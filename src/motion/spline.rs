/*
 * Copyright (C) 2023 Open Source Robotics Foundation
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 *
*/

use super::{se2, InterpError, Motion, TimePoint};
use arrayvec::ArrayVec;
use nalgebra::Vector4;

/// Below this magnitude the leading coefficient of a cubic is treated as zero.
pub const EPS_CUBIC: f64 = 1e-12;

/// Below this magnitude the discriminant of the extrema equation is treated as
/// a double root.
pub const EPS_DISCRIMINANT: f64 = 1e-4;

/// Per-dimension cubic coefficients over a normalized parameter, together with
/// the absolute time range that the parameter maps onto.
///
/// For each dimension d, the position is
/// `p_d(t) = coeffs[d][0] + coeffs[d][1]*t + coeffs[d][2]*t^2 + coeffs[d][3]*t^3`
/// with `t in [0, 1]` spanning `time_range`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplineParams {
    pub coeffs: [Vector4<f64>; 3],
    pub time_range: (TimePoint, TimePoint),
}

impl SplineParams {
    /// Fit the cubic that passes through the given endpoint positions with the
    /// given endpoint velocities (in absolute units per second).
    pub fn from_endpoints(
        x0: se2::Position,
        x1: se2::Position,
        v0: se2::Velocity,
        v1: se2::Velocity,
        time_range: (TimePoint, TimePoint),
    ) -> Self {
        let delta_t = (time_range.1 - time_range.0).as_secs_f64();
        let mut coeffs = [Vector4::zeros(); 3];
        for dim in 0..3 {
            if delta_t <= 0.0 {
                // A degenerate time range pins the motion to its start point.
                coeffs[dim] = Vector4::new(x0[dim], 0.0, 0.0, 0.0);
                continue;
            }

            let w0 = v0[dim] * delta_t;
            let w1 = v1[dim] * delta_t;
            coeffs[dim] = Vector4::new(
                x0[dim],
                w0,
                -3.0 * x0[dim] + 3.0 * x1[dim] - 2.0 * w0 - w1,
                2.0 * x0[dim] - 2.0 * x1[dim] + w0 + w1,
            );
        }

        Self { coeffs, time_range }
    }

    fn normalized_time(&self, time: TimePoint) -> f64 {
        let delta_t = (self.time_range.1 - self.time_range.0).as_secs_f64();
        if delta_t <= 0.0 {
            return 0.0;
        }

        (time - self.time_range.0).as_secs_f64() / delta_t
    }

    pub(crate) fn evaluate(&self, dim: usize, t: f64) -> f64 {
        let c = &self.coeffs[dim];
        c[0] + t * (c[1] + t * (c[2] + t * c[3]))
    }

    pub(crate) fn evaluate_derivative(&self, dim: usize, t: f64) -> f64 {
        let c = &self.coeffs[dim];
        c[1] + t * (2.0 * c[2] + t * 3.0 * c[3])
    }

    pub(crate) fn evaluate_all(&self, t: f64) -> se2::Position {
        se2::Position::new(self.evaluate(0, t), self.evaluate(1, t), self.evaluate(2, t))
    }

    pub fn compute_position(&self, time: TimePoint) -> se2::Position {
        self.evaluate_all(self.normalized_time(time))
    }

    pub fn compute_velocity(&self, time: TimePoint) -> se2::Velocity {
        let delta_t = (self.time_range.1 - self.time_range.0).as_secs_f64();
        if delta_t <= 0.0 {
            return se2::Velocity::zeros();
        }

        let t = self.normalized_time(time);
        se2::Velocity::new(
            self.evaluate_derivative(0, t),
            self.evaluate_derivative(1, t),
            self.evaluate_derivative(2, t),
        ) / delta_t
    }
}

/// The cubic motion between two consecutive trajectory waypoints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spline {
    params: SplineParams,
}

impl Spline {
    pub fn new(wp0: &se2::Waypoint, wp1: &se2::Waypoint) -> Self {
        Self {
            params: SplineParams::from_endpoints(
                wp0.position,
                wp1.position,
                wp0.velocity,
                wp1.velocity,
                (wp0.time, wp1.time),
            ),
        }
    }

    pub fn start_time(&self) -> TimePoint {
        self.params.time_range.0
    }

    pub fn finish_time(&self) -> TimePoint {
        self.params.time_range.1
    }

    /// The position at an absolute time. Unlike the checked
    /// [`Motion`](crate::motion::Motion) implementation, this extends the
    /// polynomial beyond the segment's time range without complaint.
    pub fn position(&self, time: TimePoint) -> se2::Position {
        self.params.compute_position(time)
    }

    /// The velocity at an absolute time.
    pub fn velocity(&self, time: TimePoint) -> se2::Velocity {
        self.params.compute_velocity(time)
    }

    pub fn params(&self) -> &SplineParams {
        &self.params
    }

    /// Re-express this motion over the sub-interval `[t0, t1]`, renormalized
    /// so the new parameter spans that range. Since an affine change of
    /// parameter maps cubics to cubics, the resampled motion traces the same
    /// path as the original over the sub-interval.
    pub fn resample(&self, t0: TimePoint, t1: TimePoint) -> SplineParams {
        SplineParams::from_endpoints(
            self.position(t0),
            self.position(t1),
            self.velocity(t0),
            self.velocity(t1),
            (t0, t1),
        )
    }

    fn in_time_range(&self, time: &TimePoint) -> Result<(), InterpError> {
        if time.nanos_since_zero < self.start_time().nanos_since_zero {
            return Err(InterpError::OutOfBounds);
        }

        if self.finish_time().nanos_since_zero < time.nanos_since_zero {
            return Err(InterpError::OutOfBounds);
        }

        Ok(())
    }
}

impl Motion<se2::Position, se2::Velocity> for Spline {
    fn compute_position(&self, time: &TimePoint) -> Result<se2::Position, InterpError> {
        self.in_time_range(time)?;
        Ok(self.params.compute_position(*time))
    }

    fn compute_velocity(&self, time: &TimePoint) -> Result<se2::Velocity, InterpError> {
        self.in_time_range(time)?;
        Ok(self.params.compute_velocity(*time))
    }
}

/// Find the extreme values that a one-dimensional cubic takes over the
/// normalized range [0, 1], using [`EPS_DISCRIMINANT`] to decide when the
/// interior extrema merge into a double root.
pub fn local_extrema(coeffs: &Vector4<f64>) -> (f64, f64) {
    local_extrema_with(coeffs, EPS_DISCRIMINANT)
}

/// Same as [`local_extrema`], with a caller-chosen discriminant tolerance.
pub fn local_extrema_with(coeffs: &Vector4<f64>, discriminant_tolerance: f64) -> (f64, f64) {
    let evaluate = |t: f64| coeffs[0] + t * (coeffs[1] + t * (coeffs[2] + t * coeffs[3]));

    // The endpoint values are always candidates. Interior candidates are the
    // real roots of p'(t) = 3*a3*t^2 + 2*a2*t + a1 that fall inside the range.
    let mut candidates: ArrayVec<f64, 4> = ArrayVec::new();
    candidates.push(evaluate(0.0));
    candidates.push(evaluate(1.0));

    let mut consider = |t: f64| {
        if (0.0..=1.0).contains(&t) {
            candidates.push(evaluate(t));
        }
    };

    if coeffs[3].abs() < EPS_CUBIC {
        if coeffs[2].abs() > EPS_CUBIC {
            consider(-coeffs[1] / (2.0 * coeffs[2]));
        }
    } else {
        let discriminant = 4.0 * coeffs[2].powi(2) - 12.0 * coeffs[3] * coeffs[1];
        if discriminant.abs() < discriminant_tolerance {
            consider(-2.0 * coeffs[2] / (6.0 * coeffs[3]));
        } else if discriminant > 0.0 {
            let sqrt_d = discriminant.sqrt();
            consider((-2.0 * coeffs[2] + sqrt_d) / (6.0 * coeffs[3]));
            consider((-2.0 * coeffs[2] - sqrt_d) / (6.0 * coeffs[3]));
        }
        // A negative discriminant means the interior extrema would be
        // imaginary, so the endpoints are the only candidates.
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in candidates {
        min = min.min(value);
        max = max.max(value);
    }

    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::Duration;
    use approx::assert_relative_eq;

    fn curved_spline() -> Spline {
        let wp0 = se2::Waypoint::new(TimePoint::new(0), 0.0, 0.0, 0.0)
            .with_velocity(3.0, -2.0, 0.5);
        let wp1 = se2::Waypoint::new(TimePoint::from_secs_f64(4.0), 4.0, 5.0, 1.0)
            .with_velocity(-1.0, 2.0, 0.0);
        Spline::new(&wp0, &wp1)
    }

    #[test]
    fn test_endpoint_fidelity() {
        let spline = curved_spline();
        let p0 = spline.position(spline.start_time());
        assert_relative_eq!(p0[0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(p0[1], 0.0, epsilon = 1e-9);

        let p1 = spline.position(spline.finish_time());
        assert_relative_eq!(p1[0], 4.0, epsilon = 1e-9);
        assert_relative_eq!(p1[1], 5.0, epsilon = 1e-9);
        assert_relative_eq!(p1[2], 1.0, epsilon = 1e-9);

        let v0 = spline.velocity(spline.start_time());
        assert_relative_eq!(v0[0], 3.0, epsilon = 1e-9);
        assert_relative_eq!(v0[1], -2.0, epsilon = 1e-9);
        assert_relative_eq!(v0[2], 0.5, epsilon = 1e-9);

        let v1 = spline.velocity(spline.finish_time());
        assert_relative_eq!(v1[0], -1.0, epsilon = 1e-9);
        assert_relative_eq!(v1[1], 2.0, epsilon = 1e-9);
        assert_relative_eq!(v1[2], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_resample_traces_same_path() {
        let spline = curved_spline();
        let t0 = TimePoint::from_secs_f64(1.0);
        let t1 = TimePoint::from_secs_f64(3.0);
        let resampled = spline.resample(t0, t1);

        for i in 0..=20 {
            let time = t0 + Duration::from_secs_f64(2.0 * i as f64 / 20.0);
            let p_original = spline.position(time);
            let p_resampled = resampled.compute_position(time);
            for dim in 0..3 {
                assert_relative_eq!(p_original[dim], p_resampled[dim], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_extrema_of_line() {
        let extrema = local_extrema(&Vector4::new(1.0, 2.0, 0.0, 0.0));
        assert_relative_eq!(extrema.0, 1.0);
        assert_relative_eq!(extrema.1, 3.0);
    }

    #[test]
    fn test_extrema_of_parabola() {
        // p(t) = 2t^2 - 2t dips to -0.5 at t = 0.5
        let extrema = local_extrema(&Vector4::new(0.0, -2.0, 2.0, 0.0));
        assert_relative_eq!(extrema.0, -0.5);
        assert_relative_eq!(extrema.1, 0.0);
    }

    #[test]
    fn test_extrema_of_cubic_with_two_turning_points() {
        // p(t) = 2t^3 - 3t^2 + t has turning points inside (0, 1) that exceed
        // both endpoint values in magnitude.
        let extrema = local_extrema(&Vector4::new(0.0, 1.0, -3.0, 2.0));
        assert_relative_eq!(extrema.0, -0.09622504486493764, epsilon = 1e-9);
        assert_relative_eq!(extrema.1, 0.09622504486493764, epsilon = 1e-9);
    }

    #[test]
    fn test_extrema_of_double_root() {
        // p'(t) = 3t^2 - 3t + 0.75 has a vanishing discriminant, so only the
        // merged turning point at t = 0.5 is considered.
        let extrema = local_extrema(&Vector4::new(0.0, 0.75, -1.5, 1.0));
        assert_relative_eq!(extrema.0, 0.0);
        assert_relative_eq!(extrema.1, 0.25);
    }

    #[test]
    fn test_out_of_range_turning_points_are_ignored() {
        // p(t) = t^3 - 3t has turning points at t = -1 and t = 1; only the
        // one at t = 1 lies in range, and it matches the endpoint value.
        let extrema = local_extrema(&Vector4::new(0.0, -3.0, 0.0, 1.0));
        assert_relative_eq!(extrema.0, -2.0);
        assert_relative_eq!(extrema.1, 0.0);
    }
}
