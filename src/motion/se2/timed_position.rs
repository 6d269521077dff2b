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

use super::{Position, Velocity};
use crate::motion::{spline::Spline, Interpolation, TimePoint};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint {
    pub time: TimePoint,
    pub position: Position,
    pub velocity: Velocity,
}

impl Waypoint {
    /// Create a stationary waypoint. Use [`Waypoint::with_velocity`] to give
    /// it a instantaneous velocity.
    pub fn new(time: TimePoint, x: f64, y: f64, yaw: f64) -> Self {
        Waypoint {
            time,
            position: Position::new(x, y, yaw),
            velocity: Velocity::zeros(),
        }
    }

    pub fn with_velocity(mut self, x_dot: f64, y_dot: f64, yaw_dot: f64) -> Self {
        self.velocity = Velocity::new(x_dot, y_dot, yaw_dot);
        self
    }
}

impl Interpolation<Position, Velocity> for Waypoint {
    type Motion = Spline;

    fn interpolate(&self, up_to: &Self) -> Self::Motion {
        Spline::new(self, up_to)
    }
}
