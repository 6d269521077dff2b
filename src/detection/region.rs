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
    compute_time,
    narrowphase::{check_collision, CcdRequest, SplineMotion, StaticMotion},
    segment_containing, Conflict, DetectConflictError,
};
use crate::{
    geometry::FinalShape,
    motion::{se2::CubicTrajectory, TimePoint},
    Profile,
};
use nalgebra::Isometry2;

/// A stationary region of space, optionally bounded in time.
#[derive(Clone, Debug)]
pub struct Spacetime<'a> {
    pub shape: &'a FinalShape,
    pub pose: Isometry2<f64>,
    pub lower_time_bound: Option<TimePoint>,
    pub upper_time_bound: Option<TimePoint>,
}

/// Find every time that a vehicle with this profile would brush its vicinity
/// against the region while following the trajectory. Returns None when the
/// trajectory stays clear of the region (or never intersects its time
/// window).
pub fn detect(
    profile: &Profile,
    trajectory: &CubicTrajectory,
    region: &Spacetime<'_>,
) -> Result<Option<Vec<Conflict>>, DetectConflictError> {
    if trajectory.len() < 2 {
        return Err(DetectConflictError::InvalidTrajectory {
            waypoints: trajectory.len(),
        });
    }

    let profile = profile.normalized();
    let Some(vicinity) = profile.vicinity else {
        return Ok(None);
    };

    let trajectory_start_time = trajectory.initial_time();
    let trajectory_finish_time = trajectory.finish_time();

    let start_time = region
        .lower_time_bound
        .map_or(trajectory_start_time, |lower| {
            lower.max(trajectory_start_time)
        });

    let finish_time = region
        .upper_time_bound
        .map_or(trajectory_finish_time, |upper| {
            upper.min(trajectory_finish_time)
        });

    if finish_time < start_time {
        // The trajectory and the region do not overlap in time, so they can
        // never conflict.
        return Ok(None);
    }

    let begin_it = if trajectory_start_time < start_time {
        segment_containing(trajectory, &start_time)
    } else {
        1
    };

    let end_it = if finish_time < trajectory_finish_time {
        segment_containing(trajectory, &finish_time) + 1
    } else {
        trajectory.len()
    };

    let motion_region = StaticMotion::new(region.pose);
    let request = CcdRequest::default();

    let mut conflicts = Vec::new();
    for it in begin_it..end_it {
        let Some(spline) = trajectory.segment(it) else {
            continue;
        };
        let spline_start_time = spline.start_time().max(start_time);
        let spline_finish_time = spline.finish_time().min(finish_time);
        let motion = SplineMotion::new(&spline, spline_start_time, spline_finish_time);

        for piece in region.shape.convex_pieces() {
            if let Some(contact) =
                check_collision(vicinity, &motion, piece, &motion_region, &request)
            {
                conflicts.push(Conflict {
                    a_segment: it,
                    b_segment: it,
                    time: compute_time(contact, spline_start_time, spline_finish_time),
                });
            }
        }
    }

    if conflicts.is_empty() {
        return Ok(None);
    }

    Ok(Some(conflicts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::ConvexShape,
        motion::{se2::WaypointSE2, TimePoint},
    };
    use approx::assert_relative_eq;

    fn crossing_trajectory() -> CubicTrajectory {
        CubicTrajectory::from_waypoints([
            WaypointSE2::new(TimePoint::new(0), -5.0, 0.0, 0.0).with_velocity(1.0, 0.0, 0.0),
            WaypointSE2::new(TimePoint::from_secs_f64(10.0), 5.0, 0.0, 0.0)
                .with_velocity(1.0, 0.0, 0.0),
        ])
        .unwrap()
    }

    fn vehicle() -> Profile {
        Profile::with_footprint(ConvexShape::circle(0.5).finalize().unwrap())
    }

    #[test]
    fn test_trajectory_through_region() {
        let shape = FinalShape::from(ConvexShape::circle(1.0).finalize().unwrap());
        let region = Spacetime {
            shape: &shape,
            pose: Isometry2::identity(),
            lower_time_bound: None,
            upper_time_bound: None,
        };

        let conflicts = detect(&vehicle(), &crossing_trajectory(), &region)
            .unwrap()
            .expect("the trajectory passes through the region");
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].a_segment, 1);

        // The vicinity (radius 0.5) touches the region (radius 1.0) when the
        // vehicle reaches x = -1.5, which happens at t = 3.5.
        assert_relative_eq!(conflicts[0].time.as_secs_f64(), 3.5, epsilon = 0.1);
    }

    #[test]
    fn test_window_before_arrival_is_clear() {
        let shape = FinalShape::from(ConvexShape::circle(1.0).finalize().unwrap());
        let region = Spacetime {
            shape: &shape,
            pose: Isometry2::identity(),
            lower_time_bound: None,
            upper_time_bound: Some(TimePoint::from_secs_f64(2.0)),
        };

        assert_eq!(detect(&vehicle(), &crossing_trajectory(), &region).unwrap(), None);
    }

    #[test]
    fn test_window_starting_inside_region() {
        let shape = FinalShape::from(ConvexShape::circle(1.0).finalize().unwrap());
        let region = Spacetime {
            shape: &shape,
            pose: Isometry2::identity(),
            lower_time_bound: Some(TimePoint::from_secs_f64(4.0)),
            upper_time_bound: None,
        };

        let conflicts = detect(&vehicle(), &crossing_trajectory(), &region)
            .unwrap()
            .expect("the vehicle is inside the region when the window opens");

        // At t = 4 the vehicle is at x = -1, already within reach of the
        // region, so the conflict starts right at the window boundary.
        assert_relative_eq!(conflicts[0].time.as_secs_f64(), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_region_window_disjoint_from_trajectory() {
        let shape = FinalShape::from(ConvexShape::circle(1.0).finalize().unwrap());
        let region = Spacetime {
            shape: &shape,
            pose: Isometry2::identity(),
            lower_time_bound: Some(TimePoint::from_secs_f64(20.0)),
            upper_time_bound: None,
        };

        assert_eq!(detect(&vehicle(), &crossing_trajectory(), &region).unwrap(), None);
    }
}
