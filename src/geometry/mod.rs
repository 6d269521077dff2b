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
use parry2d_f64::shape::{Ball, ConvexPolygon, Cuboid, SharedShape};

pub type Point = nalgebra::Point2<f64>;

/// The convex shapes that can describe a vehicle footprint or vicinity. All
/// shapes are expressed in the vehicle's local frame, centered on its
/// rotational axis.
#[derive(Clone, Debug, PartialEq)]
pub enum ConvexShape {
    Circle { radius: f64 },
    Box { width: f64, height: f64 },
    Polygon { vertices: Vec<Point> },
}

impl ConvexShape {
    pub fn circle(radius: f64) -> Self {
        ConvexShape::Circle { radius }
    }

    pub fn rectangle(width: f64, height: f64) -> Self {
        ConvexShape::Box { width, height }
    }

    pub fn polygon(vertices: Vec<Point>) -> Self {
        ConvexShape::Polygon { vertices }
    }

    /// Lock in the shape parameters, producing the collision geometry and the
    /// characteristic length used for bounding-box inflation.
    pub fn finalize(&self) -> Result<FinalConvexShape, InvalidShapeError> {
        let (characteristic_length, collision) = match self {
            ConvexShape::Circle { radius } => {
                if *radius <= 0.0 {
                    return Err(InvalidShapeError::NonPositiveExtent);
                }

                (*radius, SharedShape::new(Ball::new(*radius)))
            }
            ConvexShape::Box { width, height } => {
                if *width <= 0.0 || *height <= 0.0 {
                    return Err(InvalidShapeError::NonPositiveExtent);
                }

                let half_extents = nalgebra::Vector2::new(width / 2.0, height / 2.0);
                (half_extents.norm(), SharedShape::new(Cuboid::new(half_extents)))
            }
            ConvexShape::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(InvalidShapeError::InsufficientVertices(vertices.len()));
                }

                let hull = ConvexPolygon::from_convex_hull(vertices)
                    .ok_or(InvalidShapeError::DegeneratePolygon)?;
                let reach = vertices
                    .iter()
                    .map(|p| p.coords.norm())
                    .fold(0.0, f64::max);
                (reach, SharedShape::new(hull))
            }
        };

        Ok(FinalConvexShape {
            source: self.clone(),
            characteristic_length,
            collision,
        })
    }
}

/// A finalized convex shape whose parameters can no longer be mutated. It
/// carries an opaque collision handle for the narrowphase along with a
/// radius-like characteristic length that encloses the shape from its local
/// origin.
#[derive(Clone)]
pub struct FinalConvexShape {
    source: ConvexShape,
    characteristic_length: f64,
    collision: SharedShape,
}

impl FinalConvexShape {
    /// Look at the source of this shape to inspect its parameters.
    pub fn source(&self) -> &ConvexShape {
        &self.source
    }

    pub fn characteristic_length(&self) -> f64 {
        self.characteristic_length
    }

    pub(crate) fn collision(&self) -> &dyn parry2d_f64::shape::Shape {
        &*self.collision
    }
}

impl PartialEq for FinalConvexShape {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.characteristic_length == other.characteristic_length
    }
}

impl std::fmt::Debug for FinalConvexShape {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("FinalConvexShape")
            .field("source", &self.source)
            .field("characteristic_length", &self.characteristic_length)
            .finish()
    }
}

/// A finalized shape that does not need to be convex: it decomposes into one
/// or more convex pieces. Used to describe stationary spacetime regions.
#[derive(Clone, Debug, PartialEq)]
pub struct FinalShape {
    pieces: Vec<FinalConvexShape>,
}

impl FinalShape {
    pub fn new(
        shapes: impl IntoIterator<Item = ConvexShape>,
    ) -> Result<Self, InvalidShapeError> {
        let pieces = shapes
            .into_iter()
            .map(|shape| shape.finalize())
            .collect::<Result<Vec<_>, _>>()?;
        if pieces.is_empty() {
            return Err(InvalidShapeError::Empty);
        }

        Ok(Self { pieces })
    }

    pub fn convex_pieces(&self) -> &[FinalConvexShape] {
        &self.pieces
    }
}

impl From<FinalConvexShape> for FinalShape {
    fn from(piece: FinalConvexShape) -> Self {
        Self {
            pieces: vec![piece],
        }
    }
}

#[derive(ThisError, Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidShapeError {
    #[error("shape extents must be positive")]
    NonPositiveExtent,

    #[error("a polygon requires at least 3 vertices, but only {0} were given")]
    InsufficientVertices(usize),

    #[error("the polygon vertices do not span a convex area")]
    DegeneratePolygon,

    #[error("a shape requires at least one convex piece")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_finalize_circle() {
        let shape = ConvexShape::circle(0.5).finalize().unwrap();
        assert_relative_eq!(shape.characteristic_length(), 0.5);

        assert_eq!(
            ConvexShape::circle(0.0).finalize().err(),
            Some(InvalidShapeError::NonPositiveExtent)
        );
    }

    #[test]
    fn test_finalize_box() {
        let shape = ConvexShape::rectangle(2.0, 1.0).finalize().unwrap();
        assert_relative_eq!(
            shape.characteristic_length(),
            (1.0f64 + 0.25).sqrt(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_finalize_polygon() {
        let shape = ConvexShape::polygon(vec![
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(-1.0, 0.0),
            Point::new(0.0, -2.0),
        ])
        .finalize()
        .unwrap();
        assert_relative_eq!(shape.characteristic_length(), 2.0);

        assert_eq!(
            ConvexShape::polygon(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)])
                .finalize()
                .err(),
            Some(InvalidShapeError::InsufficientVertices(2))
        );
    }

    #[test]
    fn test_equality_ignores_collision_handle() {
        let a = ConvexShape::circle(0.5).finalize().unwrap();
        let b = ConvexShape::circle(0.5).finalize().unwrap();
        let c = ConvexShape::circle(0.6).finalize().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
