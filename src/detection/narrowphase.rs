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

use crate::{
    geometry::FinalConvexShape,
    motion::{
        se2,
        spline::{local_extrema, Spline, SplineParams},
        TimePoint,
    },
    profile::Normalized,
};
use nalgebra::{Isometry2, Vector4};
use parry2d_f64::query;

/// Below this magnitude, a relative motion bound is too small to ever close a
/// positive gap, so advancement stops and reports no contact.
pub const EPS_RAY: f64 = 1e-7;

/// Settings for the continuous collision solver.
#[derive(Clone, Copy, Debug)]
pub struct CcdRequest {
    /// Shapes closer than this are considered to be in contact.
    pub distance_tolerance: f64,
    /// Upper bound on conservative-advancement steps before giving up on
    /// finding a contact.
    pub max_iterations: usize,
}

impl Default for CcdRequest {
    fn default() -> Self {
        Self {
            distance_tolerance: 1e-4,
            max_iterations: 64,
        }
    }
}

/// A rigid motion expressed over a normalized parameter in [0, 1], as consumed
/// by the continuous collision solver.
pub trait SweptMotion {
    fn pose_at(&self, t: f64) -> Isometry2<f64>;

    /// An upper bound on how quickly any point of a body with the given
    /// radius can move, in distance per unit of the normalized parameter.
    fn speed_bound(&self, body_radius: f64) -> f64;
}

/// A cubic spline motion clipped to a sub-interval of its segment.
pub struct SplineMotion {
    params: SplineParams,
}

impl SplineMotion {
    pub fn new(spline: &Spline, t0: TimePoint, t1: TimePoint) -> Self {
        Self {
            params: spline.resample(t0, t1),
        }
    }

    fn derivative_reach(&self, dim: usize) -> f64 {
        let c = &self.params.coeffs[dim];
        let derivative = Vector4::new(c[1], 2.0 * c[2], 3.0 * c[3], 0.0);
        let (min, max) = local_extrema(&derivative);
        min.abs().max(max.abs())
    }
}

impl SweptMotion for SplineMotion {
    fn pose_at(&self, t: f64) -> Isometry2<f64> {
        se2::to_isometry(&self.params.evaluate_all(t))
    }

    fn speed_bound(&self, body_radius: f64) -> f64 {
        let translational =
            (self.derivative_reach(0).powi(2) + self.derivative_reach(1).powi(2)).sqrt();
        translational + self.derivative_reach(2) * body_radius
    }
}

/// The motion of something that does not move.
pub struct StaticMotion {
    pose: Isometry2<f64>,
}

impl StaticMotion {
    pub fn new(pose: Isometry2<f64>) -> Self {
        Self { pose }
    }
}

impl SweptMotion for StaticMotion {
    fn pose_at(&self, _: f64) -> Isometry2<f64> {
        self.pose
    }

    fn speed_bound(&self, _: f64) -> f64 {
        0.0
    }
}

/// Continuous collision between two convex shapes following their respective
/// motions. Returns the fraction of the motion parameter at first contact, or
/// None if the shapes never come into contact.
///
/// This advances conservatively: at each step the shapes' current clearance is
/// divided by a bound on their combined speed, so the advancement can never
/// tunnel through a contact.
pub fn check_collision(
    shape_a: &FinalConvexShape,
    motion_a: &impl SweptMotion,
    shape_b: &FinalConvexShape,
    motion_b: &impl SweptMotion,
    request: &CcdRequest,
) -> Option<f64> {
    let speed_bound = motion_a.speed_bound(shape_a.characteristic_length())
        + motion_b.speed_bound(shape_b.characteristic_length());

    let mut t = 0.0;
    for _ in 0..request.max_iterations {
        let distance = query::distance(
            &motion_a.pose_at(t),
            shape_a.collision(),
            &motion_b.pose_at(t),
            shape_b.collision(),
        )
        .ok()?;

        if distance <= request.distance_tolerance {
            return Some(t);
        }

        if speed_bound < EPS_RAY {
            // The gap is positive and the shapes cannot move relative to each
            // other, so there will never be a contact.
            return None;
        }

        t += distance / speed_bound;
        if t > 1.0 {
            return None;
        }
    }

    None
}

/// Test whether either profile's footprint is inside the other's vicinity at
/// a single point in time, with both vehicles posed by their splines.
pub(crate) fn check_overlap(
    profile_a: &Normalized<'_>,
    spline_a: &Spline,
    profile_b: &Normalized<'_>,
    spline_b: &Spline,
    time: TimePoint,
) -> bool {
    let pose_a = se2::to_isometry(&spline_a.position(time));
    let pose_b = se2::to_isometry(&spline_b.position(time));

    let pairs = [
        (profile_a.footprint, profile_b.vicinity),
        (profile_a.vicinity, profile_b.footprint),
    ];

    for (shape_a, shape_b) in pairs {
        let (Some(shape_a), Some(shape_b)) = (shape_a, shape_b) else {
            continue;
        };

        if query::intersection_test(
            &pose_a,
            shape_a.collision(),
            &pose_b,
            shape_b.collision(),
        )
        .unwrap_or(false)
        {
            return true;
        }
    }

    false
}
