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
    motion::{spline::local_extrema, Spline},
    profile::Normalized,
};
use nalgebra::Vector2;

/// An axis-aligned box around everywhere a spline motion can reach.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vector2<f64>,
    pub max: Vector2<f64>,
}

impl BoundingBox {
    /// The tightest axis-aligned box containing the path of the spline,
    /// computed analytically from the extrema of its coefficients.
    pub fn of_spline(spline: &Spline) -> Self {
        let params = spline.params();
        let extrema_x = local_extrema(&params.coeffs[0]);
        let extrema_y = local_extrema(&params.coeffs[1]);

        Self {
            min: Vector2::new(extrema_x.0, extrema_y.0),
            max: Vector2::new(extrema_x.1, extrema_y.1),
        }
    }

    /// A box which will never overlap with any other box. Stands in for the
    /// bounds of a shape that does not exist.
    pub fn void() -> Self {
        Self {
            min: Vector2::from_element(f64::INFINITY),
            max: Vector2::from_element(f64::NEG_INFINITY),
        }
    }

    pub fn inflated_by(self, value: f64) -> Self {
        Self {
            min: self.min - Vector2::from_element(value),
            max: self.max + Vector2::from_element(value),
        }
    }

    pub fn overlap(&self, other: &BoundingBox) -> bool {
        for i in 0..2 {
            if self.max[i] < other.min[i] {
                return false;
            }

            if other.max[i] < self.min[i] {
                return false;
            }
        }

        true
    }
}

/// The bounds of everywhere a profile can reach while its vehicle moves along
/// a spline: one box inflated for the footprint and one for the vicinity.
#[derive(Clone, Copy, Debug)]
pub struct BoundingProfile {
    pub footprint: BoundingBox,
    pub vicinity: BoundingBox,
}

impl BoundingProfile {
    pub(crate) fn new(spline: &Spline, profile: &Normalized<'_>) -> Self {
        let base = BoundingBox::of_spline(spline);
        let footprint = profile
            .footprint
            .map(|shape| base.inflated_by(shape.characteristic_length()))
            .unwrap_or_else(BoundingBox::void);
        let vicinity = profile
            .vicinity
            .map(|shape| base.inflated_by(shape.characteristic_length()))
            .unwrap_or_else(BoundingBox::void);

        Self { footprint, vicinity }
    }
}
