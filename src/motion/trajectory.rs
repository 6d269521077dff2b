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

use super::{
    se2::{Position, Velocity, Waypoint},
    Duration, InterpError, Interpolation, Motion, Spline, TimePoint,
};
use crate::error::ThisError;

/// Where a time value falls along a trajectory.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Locate {
    /// The time lands exactly on the waypoint at this index
    OnWaypoint(usize),

    /// The time falls strictly inside the segment ending at this waypoint
    WithinSegment(usize),

    /// The time is earlier than the first waypoint
    BeforeStart,

    /// The time is later than the last waypoint
    PastFinish,
}

#[derive(ThisError, Clone, Copy, PartialEq, Eq, Debug)]
pub enum TrajectoryError {
    #[error("a trajectory requires at least 2 waypoints, but it would only have {0}")]
    InsufficientWaypoints(usize),

    #[error("a waypoint already exists at the requested time")]
    DuplicateTime,
}

/// A motion plan: at least two waypoints with strictly increasing times,
/// connected by a cubic spline across each consecutive pair.
#[derive(Clone, Debug)]
pub struct Trajectory {
    waypoints: Vec<Waypoint>,
}

impl Trajectory {
    /// Create a trajectory from its two endpoints. Fails if they share a time
    /// value.
    pub fn new(start: Waypoint, finish: Waypoint) -> Result<Self, TrajectoryError> {
        if start.time == finish.time {
            return Err(TrajectoryError::DuplicateTime);
        }

        Self::from_waypoints([start, finish])
    }

    /// A trajectory that sits on one waypoint until the given time. Holding
    /// still is incompatible with moving, so any velocity on the waypoint is
    /// discarded.
    pub fn hold(from: Waypoint, until: TimePoint) -> Result<Self, TrajectoryError> {
        let mut start = from;
        start.velocity = Velocity::zeros();
        let mut finish = start;
        finish.time = until;

        Self::new(start, finish)
    }

    /// Collect waypoints into a trajectory, ordering them by time. Waypoints
    /// that land on an already-used time collapse to the first occurrence.
    /// Fails if fewer than 2 distinct times remain.
    pub fn from_waypoints(
        waypoints: impl IntoIterator<Item = Waypoint>,
    ) -> Result<Self, TrajectoryError> {
        let mut result = Self {
            waypoints: Vec::new(),
        };
        for waypoint in waypoints {
            let _ = result.insert(waypoint);
        }

        if result.waypoints.len() < 2 {
            return Err(TrajectoryError::InsufficientWaypoints(
                result.waypoints.len(),
            ));
        }

        Ok(result)
    }

    /// Add a waypoint at its time-ordered position. If a waypoint already
    /// occupies that time, nothing changes and the existing waypoint's index
    /// comes back as the error.
    pub fn insert(&mut self, waypoint: Waypoint) -> Result<usize, usize> {
        match self.search(&waypoint.time) {
            Ok(existing) => Err(existing),
            Err(slot) => {
                self.waypoints.insert(slot, waypoint);
                Ok(slot)
            }
        }
    }

    fn search(&self, time: &TimePoint) -> Result<usize, usize> {
        self.waypoints
            .binary_search_by_key(&time.nanos_since_zero, |wp| wp.time.nanos_since_zero)
    }

    /// Figure out where the given time falls along this trajectory.
    pub fn locate(&self, time: &TimePoint) -> Locate {
        match self.search(time) {
            Ok(index) => Locate::OnWaypoint(index),
            Err(0) => Locate::BeforeStart,
            Err(slot) if slot == self.waypoints.len() => Locate::PastFinish,
            Err(slot) => Locate::WithinSegment(slot),
        }
    }

    /// The cubic motion across the segment ending at the waypoint with this
    /// index. Index 0 has no segment behind it.
    pub fn segment(&self, index: usize) -> Option<Spline> {
        if index == 0 {
            return None;
        }

        let wp0 = self.waypoints.get(index - 1)?;
        let wp1 = self.waypoints.get(index)?;
        Some(wp0.interpolate(wp1))
    }

    /// Shift the whole plan in time. The waypoints keep their relative order,
    /// so this cannot invalidate the trajectory.
    pub fn adjust_times(&mut self, by: Duration) {
        for waypoint in &mut self.waypoints {
            waypoint.time = waypoint.time + by;
        }
    }

    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    /// Trajectories always have at least two waypoints, so the first one is
    /// always there.
    pub fn initial(&self) -> &Waypoint {
        &self.waypoints[0]
    }

    pub fn finish(&self) -> &Waypoint {
        &self.waypoints[self.waypoints.len() - 1]
    }

    pub fn initial_time(&self) -> TimePoint {
        self.initial().time
    }

    pub fn finish_time(&self) -> TimePoint {
        self.finish().time
    }

    pub fn duration(&self) -> Duration {
        self.finish_time() - self.initial_time()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Waypoint> {
        self.waypoints.iter()
    }

    fn spline_for(&self, time: &TimePoint) -> Result<Spline, InterpError> {
        let index = match self.locate(time) {
            Locate::OnWaypoint(index) => index.max(1),
            Locate::WithinSegment(index) => index,
            Locate::BeforeStart | Locate::PastFinish => return Err(InterpError::OutOfBounds),
        };

        self.segment(index).ok_or(InterpError::OutOfBounds)
    }
}

/// A trajectory can be evaluated anywhere along its time range, by finding
/// the segment a time belongs to and interpolating across it. Splines are
/// cheap to build from their endpoints, so segments are derived on demand.
impl Motion<Position, Velocity> for Trajectory {
    fn compute_position(&self, time: &TimePoint) -> Result<Position, InterpError> {
        self.spline_for(time)?.compute_position(time)
    }

    fn compute_velocity(&self, time: &TimePoint) -> Result<Velocity, InterpError> {
        self.spline_for(time)?.compute_velocity(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Trajectory {
        Trajectory::from_waypoints([
            Waypoint::new(TimePoint::from_secs_f64(0.0), 0.0, 0.0, 0.0),
            Waypoint::new(TimePoint::from_secs_f64(2.0), 1.0, 0.0, 0.0),
            Waypoint::new(TimePoint::from_secs_f64(5.0), 1.0, 3.0, 0.0),
        ])
        .expect("failed to create trajectory")
    }

    #[test]
    fn test_ordering_and_insert() {
        let mut trajectory = sample();
        assert_eq!(trajectory.len(), 3);

        let insertion = trajectory.insert(Waypoint::new(
            TimePoint::from_secs_f64(1.0),
            0.5,
            0.0,
            0.0,
        ));
        assert_eq!(insertion.ok(), Some(1));

        let duplicate = trajectory.insert(Waypoint::new(
            TimePoint::from_secs_f64(2.0),
            9.0,
            9.0,
            0.0,
        ));
        assert_eq!(duplicate.err(), Some(2));

        assert_relative_eq!(trajectory.duration().as_secs_f64(), 5.0);
    }

    #[test]
    fn test_insufficient_waypoints() {
        let only_one =
            Trajectory::from_waypoints([Waypoint::new(TimePoint::new(0), 0.0, 0.0, 0.0)]);
        assert_eq!(
            only_one.err(),
            Some(TrajectoryError::InsufficientWaypoints(1))
        );

        let wp = Waypoint::new(TimePoint::new(100), 1.0, 1.0, 0.0);
        assert_eq!(
            Trajectory::new(wp, wp).err(),
            Some(TrajectoryError::DuplicateTime)
        );
    }

    #[test]
    fn test_duplicate_times_collapse_to_first() {
        let trajectory = Trajectory::from_waypoints([
            Waypoint::new(TimePoint::from_secs_f64(0.0), 1.0, 0.0, 0.0),
            Waypoint::new(TimePoint::from_secs_f64(0.0), 9.0, 9.0, 0.0),
            Waypoint::new(TimePoint::from_secs_f64(3.0), 2.0, 0.0, 0.0),
        ])
        .unwrap();

        assert_eq!(trajectory.len(), 2);
        assert_relative_eq!(trajectory.initial().position[0], 1.0);
    }

    #[test]
    fn test_locate() {
        let trajectory = sample();
        assert_eq!(
            trajectory.locate(&TimePoint::from_secs_f64(2.0)),
            Locate::OnWaypoint(1)
        );
        assert_eq!(
            trajectory.locate(&TimePoint::from_secs_f64(3.0)),
            Locate::WithinSegment(2)
        );
        assert_eq!(
            trajectory.locate(&TimePoint::from_secs_f64(-1.0)),
            Locate::BeforeStart
        );
        assert_eq!(
            trajectory.locate(&TimePoint::from_secs_f64(6.0)),
            Locate::PastFinish
        );
    }

    #[test]
    fn test_segment() {
        let trajectory = sample();
        assert!(trajectory.segment(0).is_none());
        assert!(trajectory.segment(3).is_none());

        let spline = trajectory.segment(2).expect("the segment exists");
        assert_relative_eq!(spline.start_time().as_secs_f64(), 2.0);
        assert_relative_eq!(spline.finish_time().as_secs_f64(), 5.0);
    }

    #[test]
    fn test_adjust_times() {
        let mut trajectory = sample();
        trajectory.adjust_times(Duration::from_secs_f64(10.0));
        assert_relative_eq!(trajectory.initial_time().as_secs_f64(), 10.0);
        assert_relative_eq!(trajectory.finish_time().as_secs_f64(), 15.0);
        assert_relative_eq!(trajectory.duration().as_secs_f64(), 5.0);
    }

    #[test]
    fn test_motion() {
        let trajectory = sample();

        // With zero endpoint velocities, the cubic interpolation passes
        // through the midpoint of each segment at its halfway time.
        let p = trajectory
            .compute_position(&TimePoint::from_secs_f64(1.0))
            .expect("failed to compute position");
        assert_relative_eq!(p[0], 0.5, max_relative = 1e-9);
        assert_relative_eq!(p[1], 0.0, max_relative = 1e-9);

        let v = trajectory
            .compute_velocity(&TimePoint::from_secs_f64(5.0))
            .expect("failed to compute velocity");
        assert_relative_eq!(v[0], 0.0, max_relative = 1e-9);
        assert_relative_eq!(v[1], 0.0, max_relative = 1e-9);

        let err = trajectory.compute_position(&TimePoint::from_secs_f64(5.1));
        assert_eq!(err.err(), Some(InterpError::OutOfBounds));
    }

    #[test]
    fn test_hold_stays_in_place() {
        let moving = Waypoint::new(TimePoint::new(0), 2.0, -1.0, 0.5).with_velocity(3.0, 0.0, 0.0);
        let trajectory =
            Trajectory::hold(moving, TimePoint::from_secs_f64(8.0)).expect("valid hold");

        let p = trajectory
            .compute_position(&TimePoint::from_secs_f64(4.0))
            .expect("failed to compute position");
        assert_relative_eq!(p[0], 2.0, max_relative = 1e-9);
        assert_relative_eq!(p[1], -1.0, max_relative = 1e-9);
        assert_relative_eq!(p[2], 0.5, max_relative = 1e-9);
    }
}
