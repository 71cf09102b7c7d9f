//! Collision detection based on basic shapes.
//!
//! All shapes live in scaled space. Tests are pure queries and never touch the physics engine.

use super::{Angle, Position};

pub trait HasCollision {
    fn has_collision(&self, other: &dyn HasCollision) -> bool {
        match (self.shape(), other.shape()) {
            (Some(shape), Some(other_shape)) => shape.has_intersection(&other_shape),
            _ => false,
        }
    }

    /// Current footprint, or `None` while the object has no place in scaled space.
    fn shape(&self) -> Option<Shape>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    /// Rectangle centered at `position`, with its y-axis rotated by `angle`.
    Rectangle {
        position: Position,
        x_length: f64,
        y_length: f64,
        angle: Angle,
    },
    Circle {
        position: Position,
        radius: f64,
    },
}

impl Shape {
    pub fn has_intersection(&self, other: &Shape) -> bool {
        match (self, other) {
            (
                Shape::Circle { position, radius },
                Shape::Circle {
                    position: other_position,
                    radius: other_radius,
                },
            ) => position.distance(*other_position) < radius + other_radius,
            (
                Shape::Circle { position, radius },
                Shape::Rectangle {
                    position: other_position,
                    x_length,
                    y_length,
                    angle,
                },
            )
            | (
                Shape::Rectangle {
                    position: other_position,
                    x_length,
                    y_length,
                    angle,
                },
                Shape::Circle { position, radius },
            ) => {
                let local = (*position - *other_position).rotate_vector(-*angle);
                let closest = Position::new(
                    local.x().clamp(-x_length / 2.0, x_length / 2.0),
                    local.y().clamp(-y_length / 2.0, y_length / 2.0),
                );
                local.distance(closest) < *radius
            }
            (Shape::Rectangle { .. }, Shape::Rectangle { .. }) => {
                let corners = self.corners();
                let other_corners = other.corners();
                self.axes()
                    .into_iter()
                    .chain(other.axes())
                    .all(|axis| {
                        let (min, max) = project(&corners, axis);
                        let (other_min, other_max) = project(&other_corners, axis);
                        min < other_max && other_min < max
                    })
            }
        }
    }

    fn corners(&self) -> Vec<Position> {
        match self {
            Shape::Rectangle {
                position,
                x_length,
                y_length,
                angle,
            } => [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
                .into_iter()
                .map(|(sx, sy)| {
                    *position
                        + Position::new(sx * x_length / 2.0, sy * y_length / 2.0)
                            .rotate_vector(*angle)
                })
                .collect(),
            Shape::Circle { position, .. } => vec![*position],
        }
    }

    fn axes(&self) -> [Position; 2] {
        let angle = match self {
            Shape::Rectangle { angle, .. } => *angle,
            Shape::Circle { .. } => Angle::default(),
        };
        [
            Position::new(1.0, 0.0).rotate_vector(angle),
            Position::new(0.0, 1.0).rotate_vector(angle),
        ]
    }
}

fn project(points: &[Position], axis: Position) -> (f64, f64) {
    points
        .iter()
        .map(|p| p.dot(axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
            (min.min(v), max.max(v))
        })
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use rstest::rstest;

    use super::*;

    fn rectangle(x: f64, y: f64, x_length: f64, y_length: f64, angle: f64) -> Shape {
        Shape::Rectangle {
            position: Position::new(x, y),
            x_length,
            y_length,
            angle: Angle::new(angle),
        }
    }

    fn circle(x: f64, y: f64, radius: f64) -> Shape {
        Shape::Circle {
            position: Position::new(x, y),
            radius,
        }
    }

    #[rstest]
    #[case::overlapping(circle(0.0, 0.0, 1.0), circle(1.5, 0.0, 1.0), true)]
    #[case::touching(circle(0.0, 0.0, 1.0), circle(2.0, 0.0, 1.0), false)]
    #[case::apart(circle(0.0, 0.0, 1.0), circle(3.0, 0.0, 1.0), false)]
    #[case::circle_on_edge(circle(0.0, 1.5, 1.0), rectangle(0.0, 0.0, 4.0, 2.0, 0.0), true)]
    #[case::circle_near_corner(circle(2.6, 1.6, 0.5), rectangle(0.0, 0.0, 4.0, 2.0, 0.0), false)]
    #[case::circle_inside(circle(0.5, 0.2, 0.1), rectangle(0.0, 0.0, 4.0, 2.0, 0.0), true)]
    #[case::circle_beyond_end(
        circle(0.0, 2.4, 0.5),
        rectangle(0.0, 0.0, 4.0, 2.0, 0.0),
        false
    )]
    #[case::circle_at_rotated_end(
        circle(0.0, 2.4, 0.5),
        rectangle(0.0, 0.0, 4.0, 2.0, 0.5 * PI),
        true
    )]
    #[case::rectangles_overlapping(
        rectangle(0.0, 0.0, 2.0, 2.0, 0.0),
        rectangle(1.5, 0.0, 2.0, 2.0, 0.0),
        true
    )]
    #[case::rectangles_apart(
        rectangle(0.0, 0.0, 2.0, 2.0, 0.0),
        rectangle(2.5, 0.0, 2.0, 2.0, 0.0),
        false
    )]
    #[case::rotated_corner_reaches(
        rectangle(0.0, 0.0, 2.0, 2.0, 0.25 * PI),
        rectangle(2.3, 0.0, 2.0, 2.0, 0.0),
        true
    )]
    #[case::rotated_corner_misses(
        rectangle(0.0, 0.0, 2.0, 2.0, 0.25 * PI),
        rectangle(2.5, 0.0, 2.0, 2.0, 0.0),
        false
    )]
    fn test_shape_has_intersection(#[case] a: Shape, #[case] b: Shape, #[case] expected: bool) {
        assert_eq!(a.has_intersection(&b), expected);
        assert_eq!(b.has_intersection(&a), expected);
    }

    struct Fixed(Option<Shape>);

    impl HasCollision for Fixed {
        fn shape(&self) -> Option<Shape> {
            self.0
        }
    }

    #[test]
    fn test_has_collision_without_shape() {
        let placed = Fixed(Some(circle(0.0, 0.0, 1.0)));
        let unplaced = Fixed(None);
        assert!(placed.has_collision(&Fixed(Some(circle(0.5, 0.0, 1.0)))));
        assert!(!placed.has_collision(&unplaced));
        assert!(!unplaced.has_collision(&placed));
    }
}
