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

use crate::motion::{spline::EPS_CUBIC, Duration, Spline, TimePoint};
use smallvec::SmallVec;

/// Imaginary parts below this magnitude are treated as numerical noise when
/// filtering eigenvalue roots down to the real line.
const EPS_IMAGINARY: f64 = 1e-7;

/// Half-width of the sampling window used to classify the sign change around
/// a root of the distance rate.
const CLASSIFY_DELTA: f64 = 1e-6;

/// Analyzes how the squared center-to-center distance between two concurrent
/// spline motions changes over their common time interval.
///
/// The planar difference of the two motions is itself a cubic in the
/// normalized parameter, so the time derivative of the squared distance,
/// `d/dt D^2 = 2 p . p'`, is a quintic whose coefficients come directly from
/// the spline coefficients. All of the root finding for approach detection
/// lives here.
pub struct DistanceDifferential {
    /// Coefficients of `d/dt D^2` as a polynomial in the normalized
    /// parameter, up to a positive scale factor.
    rate: [f64; 6],
    time_range: (TimePoint, TimePoint),
}

impl DistanceDifferential {
    pub fn new(spline_a: &Spline, spline_b: &Spline) -> Self {
        let t0 = spline_a.start_time().max(spline_b.start_time());
        let t1 = spline_a.finish_time().min(spline_b.finish_time());
        let params_a = spline_a.resample(t0, t1);
        let params_b = spline_b.resample(t0, t1);

        let mut rate = [0.0; 6];
        for dim in 0..2 {
            let c = params_a.coeffs[dim] - params_b.coeffs[dim];
            // Accumulate the coefficients of p * p', where p is the cubic
            // difference in this dimension. The common factor of 2 is
            // irrelevant to signs and roots.
            rate[0] += c[0] * c[1];
            rate[1] += c[1] * c[1] + 2.0 * c[0] * c[2];
            rate[2] += 3.0 * c[1] * c[2] + 3.0 * c[0] * c[3];
            rate[3] += 2.0 * c[2] * c[2] + 4.0 * c[1] * c[3];
            rate[4] += 5.0 * c[2] * c[3];
            rate[5] += 3.0 * c[3] * c[3];
        }

        Self {
            rate,
            time_range: (t0, t1),
        }
    }

    fn rate_at(&self, t: f64) -> f64 {
        self.rate
            .iter()
            .rev()
            .fold(0.0, |value, coeff| value * t + coeff)
    }

    fn rate_slope_at(&self, t: f64) -> f64 {
        self.rate
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(0.0, |value, (power, coeff)| value * t + power as f64 * coeff)
    }

    /// True if the two motions are getting closer together at the very start
    /// of their common interval.
    pub fn initially_approaching(&self) -> bool {
        self.rate_at(0.0) < 0.0
    }

    /// The instants strictly after the start of the common interval at which
    /// the motions transition from separating (or holding steady) to
    /// approaching, in ascending order.
    pub fn approach_times(&self) -> SmallVec<[TimePoint; 4]> {
        let mut roots = polynomial_roots(&self.rate);
        roots.sort_by(f64::total_cmp);

        let delta_t = (self.time_range.1 - self.time_range.0).as_secs_f64();
        let mut times = SmallVec::new();
        let mut previous: Option<f64> = None;
        for root in roots {
            if !(root > 0.0 && root <= 1.0) {
                continue;
            }

            if previous.is_some_and(|p| (root - p).abs() < 1e-9) {
                continue;
            }
            previous = Some(root);

            let before = self.rate_at((root - CLASSIFY_DELTA).max(0.0));
            let becomes_negative = if root + CLASSIFY_DELTA <= 1.0 {
                self.rate_at(root + CLASSIFY_DELTA) < 0.0
            } else {
                // The root sits on the boundary, so classify it by the slope
                // of the rate instead of sampling past the interval.
                self.rate_slope_at(root) < 0.0
            };

            if before >= 0.0 && becomes_negative {
                times.push(self.time_range.0 + Duration::from_secs_f64(root * delta_t));
            }
        }

        times
    }

    pub fn start_time(&self) -> TimePoint {
        self.time_range.0
    }

    pub fn finish_time(&self) -> TimePoint {
        self.time_range.1
    }
}

/// All real roots of the polynomial with the given coefficients, ordered by
/// ascending power. Degenerate leading coefficients reduce the degree, and
/// quintic through cubic degrees go through the companion-matrix eigenvalues.
fn polynomial_roots(coefficients: &[f64; 6]) -> SmallVec<[f64; 5]> {
    let mut roots = SmallVec::new();

    // Normalize for conditioning; the roots are unaffected.
    let scale = coefficients.iter().fold(0.0, |s: f64, c| s.max(c.abs()));
    if scale < EPS_CUBIC {
        return roots;
    }
    let c: Vec<f64> = coefficients.iter().map(|value| value / scale).collect();

    let degree = match c.iter().rposition(|value| value.abs() > EPS_CUBIC) {
        None | Some(0) => return roots,
        Some(degree) => degree,
    };

    if degree == 1 {
        roots.push(-c[0] / c[1]);
        return roots;
    }

    if degree == 2 {
        let radicand = c[1] * c[1] - 4.0 * c[2] * c[0];
        if radicand >= 0.0 {
            let sqrt_radicand = radicand.sqrt();
            roots.push((-c[1] - sqrt_radicand) / (2.0 * c[2]));
            roots.push((-c[1] + sqrt_radicand) / (2.0 * c[2]));
        }
        return roots;
    }

    let companion = nalgebra::DMatrix::from_fn(degree, degree, |i, j| {
        if j == degree - 1 {
            -c[i] / c[degree]
        } else if i == j + 1 {
            1.0
        } else {
            0.0
        }
    });

    for eigenvalue in companion.complex_eigenvalues().iter() {
        if eigenvalue.im.abs() < EPS_IMAGINARY {
            roots.push(eigenvalue.re);
        }
    }

    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::se2::WaypointSE2;
    use approx::assert_relative_eq;

    fn hold_at_origin(duration: f64) -> Spline {
        let wp0 = WaypointSE2::new(TimePoint::new(0), 0.0, 0.0, 0.0);
        let wp1 = WaypointSE2::new(TimePoint::from_secs_f64(duration), 0.0, 0.0, 0.0);
        Spline::new(&wp0, &wp1)
    }

    #[test]
    fn test_initially_approaching() {
        let a = hold_at_origin(10.0);
        let wp0 = WaypointSE2::new(TimePoint::new(0), 5.0, 0.0, 0.0).with_velocity(-1.0, 0.0, 0.0);
        let wp1 = WaypointSE2::new(TimePoint::from_secs_f64(10.0), -5.0, 0.0, 0.0)
            .with_velocity(-1.0, 0.0, 0.0);
        let b = Spline::new(&wp0, &wp1);

        let differential = DistanceDifferential::new(&a, &b);
        assert!(differential.initially_approaching());
        assert_relative_eq!(differential.start_time().as_secs_f64(), 0.0);
        assert_relative_eq!(differential.finish_time().as_secs_f64(), 10.0);
    }

    #[test]
    fn test_separating_pass_has_no_approach_times() {
        let a = hold_at_origin(10.0);
        let wp0 = WaypointSE2::new(TimePoint::new(0), 1.0, 0.0, 0.0).with_velocity(1.0, 0.0, 0.0);
        let wp1 = WaypointSE2::new(TimePoint::from_secs_f64(10.0), 11.0, 0.0, 0.0)
            .with_velocity(1.0, 0.0, 0.0);
        let b = Spline::new(&wp0, &wp1);

        let differential = DistanceDifferential::new(&a, &b);
        assert!(!differential.initially_approaching());
        assert!(differential.approach_times().is_empty());
    }

    #[test]
    fn test_turnaround_produces_one_approach_time() {
        // The other vehicle backs away from the origin and then comes back
        // toward it, turning around when its x-velocity crosses zero.
        let a = hold_at_origin(4.0);
        let wp0 = WaypointSE2::new(TimePoint::new(0), 2.0, 0.0, 0.0).with_velocity(1.0, 0.0, 0.0);
        let wp1 = WaypointSE2::new(TimePoint::from_secs_f64(4.0), 0.5, 0.0, 0.0)
            .with_velocity(-1.0, 0.0, 0.0);
        let b = Spline::new(&wp0, &wp1);

        let differential = DistanceDifferential::new(&a, &b);
        assert!(!differential.initially_approaching());

        let times = differential.approach_times();
        assert_eq!(times.len(), 1);

        // x'(t) = 4 - 17t + 9t^2 in normalized time, whose in-range root is
        // t = (17 - sqrt(145)) / 18.
        let expected = 4.0 * (17.0 - 145.0f64.sqrt()) / 18.0;
        assert_relative_eq!(times[0].as_secs_f64(), expected, epsilon = 1e-5);
    }
}
