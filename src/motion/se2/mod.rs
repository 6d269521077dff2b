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

/// A planar position with heading: (x, y, yaw)
pub type Position = nalgebra::Vector3<f64>;

/// The time derivative of a [`Position`]
pub type Velocity = nalgebra::Vector3<f64>;

pub type Vector = nalgebra::Vector2<f64>;

pub mod timed_position;
pub use timed_position::*;
pub use timed_position::Waypoint as WaypointSE2;

pub type CubicTrajectory = super::Trajectory;

/// View a position as a rigid transform for collision queries.
pub fn to_isometry(position: &Position) -> nalgebra::Isometry2<f64> {
    nalgebra::Isometry2::new(Vector::new(position[0], position[1]), position[2])
}
