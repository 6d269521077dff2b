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

use crate::error::ThisError;
use crate::motion::{Duration, TimePoint};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Identifies a reservable waypoint.
pub type ResourceId = u64;

/// Identifies a reservation granted by one scheduler instance.
pub type ReservationId = u64;

/// An exclusive claim on a resource over the half-open interval
/// `[start_time, start_time + duration)`, or `[start_time, infinity)` when no
/// duration was requested. Reservations are immutable once granted; the only
/// way to release one is to [`cancel`][ReservationSystem::cancel] it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    id: ReservationId,
    resource: ResourceId,
    start_time: TimePoint,
    duration: Option<Duration>,
}

impl Reservation {
    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn start_time(&self) -> TimePoint {
        self.start_time
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// When this reservation releases its resource, or None for an
    /// indefinite hold.
    pub fn end_time(&self) -> Option<TimePoint> {
        self.duration.map(|duration| self.start_time + duration)
    }
}

#[derive(ThisError, Clone, Copy, Debug, PartialEq, Eq)]
#[error("no reservation with id [{0}] exists in this scheduler")]
pub struct UnknownReservation(pub ReservationId);

/// Grants exclusive time-windowed reservations over a pool of waypoints.
///
/// Each resource keeps its reservations in a start-time-ordered timeline, so
/// admission only needs to inspect the would-be neighbors of the requested
/// interval. Two reservations on the same resource conflict iff their
/// half-open intervals overlap; intervals that merely touch are fine.
#[derive(Debug, Default)]
pub struct ReservationSystem {
    next_id: ReservationId,
    schedule: HashMap<ResourceId, BTreeMap<TimePoint, Reservation>>,
    index: HashMap<ReservationId, (ResourceId, TimePoint)>,
}

impl ReservationSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to reserve one of the requested resources, in order of
    /// preference, from `start_time` for the given duration (indefinitely if
    /// no duration is given). Returns the reservation for the first resource
    /// that can accept it, or None if every candidate conflicts with an
    /// existing reservation.
    pub fn reserve(
        &mut self,
        start_time: TimePoint,
        resources: &[ResourceId],
        duration: Option<Duration>,
    ) -> Option<Reservation> {
        for &resource in resources {
            if self.is_free(resource, start_time, duration) {
                return Some(self.make_reservation(resource, start_time, duration));
            }
        }

        debug!("rejected reservation request for {} resource(s)", resources.len());
        None
    }

    /// Release the reservation with this id.
    pub fn cancel(&mut self, id: ReservationId) -> Result<(), UnknownReservation> {
        let (resource, start_time) = self.index.remove(&id).ok_or(UnknownReservation(id))?;
        if let Some(timeline) = self.schedule.get_mut(&resource) {
            timeline.remove(&start_time);
        }

        debug!("cancelled reservation {id} on resource {resource}");
        Ok(())
    }

    fn is_free(
        &self,
        resource: ResourceId,
        start_time: TimePoint,
        duration: Option<Duration>,
    ) -> bool {
        let timeline = match self.schedule.get(&resource) {
            Some(timeline) => timeline,
            // Nothing has ever been reserved here.
            None => return true,
        };

        match duration {
            Some(duration) => {
                let end_time = start_time + duration;
                // Any reservation starting within [start, end) overlaps with
                // the request. One starting exactly at end_time only touches.
                if timeline.range(start_time..end_time).next().is_some() {
                    return false;
                }
            }
            None => {
                // An indefinite hold covers everything at or after its start.
                if timeline.range(start_time..).next().is_some() {
                    return false;
                }
            }
        }

        // The closest earlier reservation must have released the resource by
        // the requested start. Touching exactly at the start is fine.
        if let Some((_, previous)) = timeline.range(..start_time).next_back() {
            return match previous.end_time() {
                Some(previous_end) => previous_end <= start_time,
                // The previous reservation holds the resource forever.
                None => false,
            };
        }

        true
    }

    fn make_reservation(
        &mut self,
        resource: ResourceId,
        start_time: TimePoint,
        duration: Option<Duration>,
    ) -> Reservation {
        let reservation = Reservation {
            id: self.next_id,
            resource,
            start_time,
            duration,
        };
        self.next_id += 1;

        self.schedule
            .entry(resource)
            .or_default()
            .insert(start_time, reservation.clone());
        self.index.insert(reservation.id, (resource, start_time));

        debug!("granted reservation {} on resource {resource}", reservation.id);
        reservation
    }
}
