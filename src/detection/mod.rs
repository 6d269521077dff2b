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

pub mod bounding;
pub use bounding::{BoundingBox, BoundingProfile};

pub mod narrowphase;
pub use narrowphase::{CcdRequest, EPS_RAY};

pub mod differential;
pub use differential::DistanceDifferential;

pub mod region;
pub use region::Spacetime;

use crate::{
    error::ThisError,
    motion::{
        se2::{CubicTrajectory, WaypointSE2},
        trajectory::Locate,
        Duration, Spline, TimePoint,
    },
    profile::Normalized,
    Profile,
};
use narrowphase::{check_collision, check_overlap, SplineMotion};
use tracing::trace;

/// A moment where one vehicle's footprint overlaps with another vehicle's
/// vicinity. The segments are identified by the index of their right-hand
/// waypoint within the trajectory that was checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Conflict {
    pub a_segment: usize,
    pub b_segment: usize,
    pub time: TimePoint,
}

#[derive(ThisError, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectConflictError {
    #[error(
        "cannot check conflicts for a trajectory with [{waypoints}] waypoints; \
        trajectories must have at least 2 waypoints"
    )]
    InvalidTrajectory { waypoints: usize },

    #[error("the profile has no shape available at time [{time:?}]")]
    MissingShape { time: TimePoint },
}

/// Check whether the two vehicles will ever come into conflict with each
/// other while following their trajectories. Returns the time of the earliest
/// detected conflict, or None if the vehicles stay clear of each other.
pub fn between(
    profile_a: &Profile,
    trajectory_a: &CubicTrajectory,
    profile_b: &Profile,
    trajectory_b: &CubicTrajectory,
) -> Result<Option<TimePoint>, DetectConflictError> {
    detect(profile_a, trajectory_a, profile_b, trajectory_b, None)
}

/// Same check as [`between`], but every detected conflict is collected into
/// `conflicts` in discovery order. The earliest time that gets returned is
/// the time of the first entry.
pub fn between_all(
    profile_a: &Profile,
    trajectory_a: &CubicTrajectory,
    profile_b: &Profile,
    trajectory_b: &CubicTrajectory,
    conflicts: &mut Vec<Conflict>,
) -> Result<Option<TimePoint>, DetectConflictError> {
    conflicts.clear();
    detect(profile_a, trajectory_a, profile_b, trajectory_b, Some(conflicts))
}

fn detect(
    profile_a: &Profile,
    trajectory_a: &CubicTrajectory,
    profile_b: &Profile,
    trajectory_b: &CubicTrajectory,
    output: Option<&mut Vec<Conflict>>,
) -> Result<Option<TimePoint>, DetectConflictError> {
    if trajectory_a.len() < 2 {
        return Err(DetectConflictError::InvalidTrajectory {
            waypoints: trajectory_a.len(),
        });
    }

    if trajectory_b.len() < 2 {
        return Err(DetectConflictError::InvalidTrajectory {
            waypoints: trajectory_b.len(),
        });
    }

    let profile_a = profile_a.normalized();
    let profile_b = profile_b.normalized();

    // Without any footprint there is nothing that can invade a vicinity.
    if profile_a.footprint.is_none() && profile_b.footprint.is_none() {
        return Ok(None);
    }

    // Normalization promotes the footprint into a missing vicinity, so a
    // missing vicinity here means the profile has no geometry at all.
    if profile_a.vicinity.is_none() || profile_b.vicinity.is_none() {
        return Ok(None);
    }

    if !have_time_overlap(trajectory_a, trajectory_b) {
        return Ok(None);
    }

    let (a_it, b_it) = initial_indices(trajectory_a, trajectory_b);
    let request = CcdRequest::default();

    if close_start(&profile_a, trajectory_a, a_it, &profile_b, trajectory_b, b_it) {
        // The vehicles are already in each other's vicinity when they start,
        // so we do not consider that a conflict on its own. It only becomes a
        // conflict if they move closer to each other while they remain within
        // that proximity.
        trace!("starting in close proximity; watching for approaches");
        return Ok(detect_approach(
            &profile_a,
            trajectory_a,
            a_it,
            &profile_b,
            trajectory_b,
            b_it,
            &request,
            output,
        ));
    }

    Ok(detect_invasion(
        &profile_a,
        trajectory_a,
        a_it,
        &profile_b,
        trajectory_b,
        b_it,
        &request,
        output,
    ))
}

fn have_time_overlap(trajectory_a: &CubicTrajectory, trajectory_b: &CubicTrajectory) -> bool {
    if trajectory_b.finish_time() < trajectory_a.initial_time() {
        return false;
    }

    if trajectory_a.finish_time() < trajectory_b.initial_time() {
        return false;
    }

    true
}

/// The index of the segment (identified by its right-hand waypoint) that
/// contains the given time. The caller must already know that the time falls
/// within the trajectory's range.
fn segment_containing(trajectory: &CubicTrajectory, time: &TimePoint) -> usize {
    match trajectory.locate(time) {
        Locate::OnWaypoint(index) => index.max(1),
        Locate::WithinSegment(index) => index,
        // Time overlap was checked before seeking, so these cannot be
        // reached. Clamp to the nearest valid segment anyway.
        Locate::BeforeStart => 1,
        Locate::PastFinish => trajectory.len() - 1,
    }
}

/// Seek the starting segment of each trajectory: whichever trajectory begins
/// earlier is advanced to the segment that contains the other's start time.
fn initial_indices(
    trajectory_a: &CubicTrajectory,
    trajectory_b: &CubicTrajectory,
) -> (usize, usize) {
    let t_a0 = trajectory_a.initial_time();
    let t_b0 = trajectory_b.initial_time();

    if t_a0 < t_b0 {
        (segment_containing(trajectory_a, &t_b0), 1)
    } else if t_b0 < t_a0 {
        (1, segment_containing(trajectory_b, &t_a0))
    } else {
        (1, 1)
    }
}

/// Whether the vehicles are within each other's vicinity at the start of
/// their aligned segments.
fn close_start(
    profile_a: &Normalized<'_>,
    trajectory_a: &CubicTrajectory,
    a_it: usize,
    profile_b: &Normalized<'_>,
    trajectory_b: &CubicTrajectory,
    b_it: usize,
) -> bool {
    let (Some(spline_a), Some(spline_b)) =
        (trajectory_a.segment(a_it), trajectory_b.segment(b_it))
    else {
        return false;
    };
    let start_time = spline_a.start_time().max(spline_b.start_time());

    check_overlap(profile_a, &spline_a, profile_b, &spline_b, start_time)
}

fn compute_time(scaled: f64, start_time: TimePoint, finish_time: TimePoint) -> TimePoint {
    start_time + Duration::new((scaled * (finish_time - start_time).nanos as f64) as i64)
}

/// Detect a vehicle whose footprint enters the vicinity of the other from
/// outside of it. Advances the two segments in lock-step by finish time and
/// prunes each concurrent pair with the bounding boxes before handing it to
/// the continuous collision solver.
#[allow(clippy::too_many_arguments)]
fn detect_invasion(
    profile_a: &Normalized<'_>,
    trajectory_a: &CubicTrajectory,
    mut a_it: usize,
    profile_b: &Normalized<'_>,
    trajectory_b: &CubicTrajectory,
    mut b_it: usize,
    request: &CcdRequest,
    mut output: Option<&mut Vec<Conflict>>,
) -> Option<TimePoint> {
    // When either vehicle distinguishes its vicinity from its footprint, both
    // orderings of the footprint-in-vicinity test need to run.
    let test_complement = profile_a.needs_complement_test(profile_b);

    while a_it < trajectory_a.len() && b_it < trajectory_b.len() {
        let (Some(spline_a), Some(spline_b)) =
            (trajectory_a.segment(a_it), trajectory_b.segment(b_it))
        else {
            break;
        };

        let start_time = spline_a.start_time().max(spline_b.start_time());
        let finish_time = spline_a.finish_time().min(spline_b.finish_time());

        let bound_a = BoundingProfile::new(&spline_a, profile_a);
        let bound_b = BoundingProfile::new(&spline_b, profile_b);

        let motion_a = SplineMotion::new(&spline_a, start_time, finish_time);
        let motion_b = SplineMotion::new(&spline_b, start_time, finish_time);

        if bound_a.footprint.overlap(&bound_b.vicinity) {
            if let (Some(footprint_a), Some(vicinity_b)) =
                (profile_a.footprint, profile_b.vicinity)
            {
                if let Some(contact) =
                    check_collision(footprint_a, &motion_a, vicinity_b, &motion_b, request)
                {
                    let time = compute_time(contact, start_time, finish_time);
                    match output.as_deref_mut() {
                        None => return Some(time),
                        Some(conflicts) => conflicts.push(Conflict {
                            a_segment: a_it,
                            b_segment: b_it,
                            time,
                        }),
                    }
                }
            }
        }

        if test_complement && bound_a.vicinity.overlap(&bound_b.footprint) {
            if let (Some(vicinity_a), Some(footprint_b)) =
                (profile_a.vicinity, profile_b.footprint)
            {
                if let Some(contact) =
                    check_collision(vicinity_a, &motion_a, footprint_b, &motion_b, request)
                {
                    let time = compute_time(contact, start_time, finish_time);
                    match output.as_deref_mut() {
                        None => return Some(time),
                        Some(conflicts) => conflicts.push(Conflict {
                            a_segment: a_it,
                            b_segment: b_it,
                            time,
                        }),
                    }
                }
            }
        }

        advance(
            spline_a.finish_time(),
            spline_b.finish_time(),
            &mut a_it,
            &mut b_it,
        );
    }

    earliest(output)
}

/// Step past whichever segment finishes first, or both when they finish
/// together.
fn advance(finish_a: TimePoint, finish_b: TimePoint, a_it: &mut usize, b_it: &mut usize) {
    if finish_a < finish_b {
        *a_it += 1;
    } else if finish_b < finish_a {
        *b_it += 1;
    } else {
        *a_it += 1;
        *b_it += 1;
    }
}

fn earliest(output: Option<&mut Vec<Conflict>>) -> Option<TimePoint> {
    let conflicts = output?;
    conflicts.first().map(|conflict| conflict.time)
}

/// Detect whether vehicles that are already within each other's vicinity move
/// any closer to each other while they remain in that proximity. When they
/// separate, detection hands back off to [`detect_invasion`].
#[allow(clippy::too_many_arguments)]
fn detect_approach(
    profile_a: &Normalized<'_>,
    trajectory_a: &CubicTrajectory,
    mut a_it: usize,
    profile_b: &Normalized<'_>,
    trajectory_b: &CubicTrajectory,
    mut b_it: usize,
    request: &CcdRequest,
    mut output: Option<&mut Vec<Conflict>>,
) -> Option<TimePoint> {
    while a_it < trajectory_a.len() && b_it < trajectory_b.len() {
        let (Some(spline_a), Some(spline_b)) =
            (trajectory_a.segment(a_it), trajectory_b.segment(b_it))
        else {
            break;
        };

        let differential = DistanceDifferential::new(&spline_a, &spline_b);

        if differential.initially_approaching() {
            let time = differential.start_time();
            match output.as_deref_mut() {
                None => return Some(time),
                Some(conflicts) => conflicts.push(Conflict {
                    a_segment: a_it,
                    b_segment: b_it,
                    time,
                }),
            }
        }

        for time in differential.approach_times() {
            if !check_overlap(profile_a, &spline_a, profile_b, &spline_b, time) {
                // Neither vehicle is in the vicinity of the other anymore, so
                // from this time onward conflicts mean a fresh invasion.
                trace!("proximity ended mid-segment; switching to invasion detection");
                let sliced = (
                    slice_trajectory(time, &spline_a, trajectory_a, a_it),
                    slice_trajectory(time, &spline_b, trajectory_b, b_it),
                );
                let (Some(sliced_a), Some(sliced_b)) = sliced else {
                    // The slice time coincides with the end of a trajectory,
                    // so there is no remaining motion to check.
                    return earliest(output);
                };

                return match output.as_deref_mut() {
                    None => detect_invasion(
                        profile_a, &sliced_a, 1, profile_b, &sliced_b, 1, request, None,
                    ),
                    Some(conflicts) => {
                        let mut sliced_conflicts = Vec::new();
                        detect_invasion(
                            profile_a,
                            &sliced_a,
                            1,
                            profile_b,
                            &sliced_b,
                            1,
                            request,
                            Some(&mut sliced_conflicts),
                        );

                        // Translate the segment indices of the sliced
                        // trajectories back into the original trajectories so
                        // the refs stay meaningful for the caller.
                        for conflict in sliced_conflicts {
                            conflicts.push(Conflict {
                                a_segment: a_it + conflict.a_segment - 1,
                                b_segment: b_it + conflict.b_segment - 1,
                                time: conflict.time,
                            });
                        }

                        conflicts.first().map(|conflict| conflict.time)
                    }
                };
            }

            // One of the vehicles is still inside the vicinity of the other
            // at this approach time, so this is a conflict.
            match output.as_deref_mut() {
                None => return Some(time),
                Some(conflicts) => conflicts.push(Conflict {
                    a_segment: a_it,
                    b_segment: b_it,
                    time,
                }),
            }
        }

        let still_close = check_overlap(
            profile_a,
            &spline_a,
            profile_b,
            &spline_b,
            differential.finish_time(),
        );

        advance(
            spline_a.finish_time(),
            spline_b.finish_time(),
            &mut a_it,
            &mut b_it,
        );

        if !still_close {
            trace!("proximity ended at a segment boundary; switching to invasion detection");
            return detect_invasion(
                profile_a,
                trajectory_a,
                a_it,
                profile_b,
                trajectory_b,
                b_it,
                request,
                output,
            );
        }
    }

    earliest(output)
}

/// The remainder of a trajectory from the given time onward: a synthetic
/// leading waypoint evaluated on the spline, followed by the waypoints from
/// `index` to the end. Returns None when the remainder collapses to a single
/// waypoint, which happens when the slice time lands exactly on the final
/// waypoint.
fn slice_trajectory(
    start_time: TimePoint,
    spline: &Spline,
    trajectory: &CubicTrajectory,
    index: usize,
) -> Option<CubicTrajectory> {
    let lead = WaypointSE2 {
        time: start_time,
        position: spline.position(start_time),
        velocity: spline.velocity(start_time),
    };

    CubicTrajectory::from_waypoints(
        std::iter::once(lead).chain(trajectory.iter().skip(index).copied()),
    )
    .ok()
}
