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

use crate::geometry::FinalConvexShape;

/// Describes the regions of space that a vehicle occupies.
///
/// * The footprint is the physical body of the vehicle. A profile without a
///   footprint has no physical presence and cannot invade anything.
/// * The vicinity is the region around the vehicle that other footprints
///   should stay out of. A missing vicinity is treated as equal to the
///   footprint.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Profile {
    footprint: Option<FinalConvexShape>,
    vicinity: Option<FinalConvexShape>,
}

impl Profile {
    pub fn new(
        footprint: Option<FinalConvexShape>,
        vicinity: Option<FinalConvexShape>,
    ) -> Self {
        Self { footprint, vicinity }
    }

    pub fn with_footprint(footprint: FinalConvexShape) -> Self {
        Self {
            footprint: Some(footprint),
            vicinity: None,
        }
    }

    pub fn with_vicinity(mut self, vicinity: FinalConvexShape) -> Self {
        self.vicinity = Some(vicinity);
        self
    }

    pub fn footprint(&self) -> Option<&FinalConvexShape> {
        self.footprint.as_ref()
    }

    pub fn vicinity(&self) -> Option<&FinalConvexShape> {
        self.vicinity.as_ref()
    }

    /// View of the profile with the vicinity defaulted to the footprint when
    /// it was not specified.
    pub(crate) fn normalized(&self) -> Normalized<'_> {
        Normalized {
            footprint: self.footprint.as_ref(),
            vicinity: self.vicinity.as_ref().or(self.footprint.as_ref()),
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) struct Normalized<'a> {
    pub(crate) footprint: Option<&'a FinalConvexShape>,
    pub(crate) vicinity: Option<&'a FinalConvexShape>,
}

impl<'a> Normalized<'a> {
    /// True when the footprint/vicinity distinction matters for either
    /// profile, requiring both orderings of the invasion test.
    pub(crate) fn needs_complement_test(&self, other: &Normalized<'a>) -> bool {
        self.vicinity != self.footprint || other.vicinity != other.footprint
    }
}
