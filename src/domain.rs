//! The domain module encapsulates the simulation itself: robots built from body parts, the
//! obstacles they push around, and the sensors measuring both, all backed by one physics world.
//!
//! Everything here is independent of rendering, input handling and configuration formats.

mod basis;
mod collision;
mod obstacle;
mod part;
mod physics;
mod robot;
mod scale;
mod touch_sensor;
mod ultrasonic_sensor;
mod world;

pub use basis::{Angle, Pose, Position, Velocity};
pub use collision::{HasCollision, Shape};
pub use obstacle::{Bottle, Color, Obstacle, ObstacleId, Wall};
pub use part::{BodyPart, Brick, Part, PartFrame, Realization, SensorValue, Size, Wheel};
pub use physics::{ColliderHandle, PhysicsWorld, RigidBodyHandle};
pub use robot::{Robot, RobotId};
pub use scale::{Scale, ScaleError, Viewport};
pub use touch_sensor::{TouchSensor, TouchSide};
pub use ultrasonic_sensor::{UltrasonicSensor, NO_ECHO};
pub use world::{SimulationError, World};
