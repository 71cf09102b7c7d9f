//! Geometric primitives shared by the domain.
//!
//! Positions are board or screen coordinates with +y pointing up. Angles use the physics engine's
//! convention: zero faces +y and angles grow counter-clockwise.

use std::{
    f64::consts::TAU,
    ops::{Add, Mul, Neg, Sub},
};

use nalgebra::{Rotation2, Vector2};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position(Vector2<f64>);

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self(Vector2::new(x, y))
    }

    pub fn x(&self) -> f64 {
        self.0.x
    }

    pub fn y(&self) -> f64 {
        self.0.y
    }

    pub fn distance(&self, other: Self) -> f64 {
        (self.0 - other.0).norm()
    }

    /// Rotates the position as a vector around the origin.
    pub fn rotate_vector(&self, angle: Angle) -> Position {
        Self(angle.rotation() * self.0)
    }

    pub fn dot(&self, other: Position) -> f64 {
        self.0.dot(&other.0)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self(Vector2::zeros())
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<f64> for Position {
    type Output = Position;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Orientation in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Angle(f64);

impl Angle {
    pub fn new(radians: f64) -> Self {
        Self(radians)
    }

    pub fn from_deg(degrees: f64) -> Self {
        Self(degrees.to_radians())
    }

    /// Degrees in `[0, 360)`.
    pub fn to_deg(self) -> f64 {
        self.0.rem_euclid(TAU).to_degrees()
    }

    /// Unit vector the angle is facing.
    pub fn direction(self) -> Position {
        Position::new(0.0, 1.0).rotate_vector(self)
    }

    fn rotation(self) -> Rotation2<f64> {
        Rotation2::new(self.0)
    }
}

impl Neg for Angle {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl From<Angle> for f64 {
    fn from(value: Angle) -> Self {
        value.0
    }
}

impl From<Angle> for f32 {
    fn from(value: Angle) -> Self {
        value.0 as f32
    }
}

/// Speed along a wheel's rolling direction, in board units per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity(f64);

impl Velocity {
    pub fn new(velocity: f64) -> Self {
        Self(velocity)
    }
}

impl From<Velocity> for f64 {
    fn from(value: Velocity) -> Self {
        value.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    pub position: Position,
    pub angle: Angle,
}

impl Pose {
    pub const fn new(position: Position, angle: Angle) -> Self {
        Self { position, angle }
    }

    /// Pose of a point attached at `offset` in this pose's local frame.
    pub fn compose(&self, offset: Position) -> Pose {
        Pose {
            position: self.position + offset.rotate_vector(self.angle),
            angle: self.angle,
        }
    }
}
