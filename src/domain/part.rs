//! Rigid pieces a robot is assembled from.
//!
//! Parts are built in two phases. The logical definition (offset and footprint in board units)
//! is known from configuration; the collider is created by [`BodyPart::create_shape`] once the
//! run's [`Scale`] is fixed. From then on the part's pose is read back from its collider, which
//! the physics engine keeps attached to the robot's chassis.

use std::fmt;

use super::{
    physics::{ColliderKind, PhysicsWorld},
    ColliderHandle, HasCollision, Pose, Position, RigidBodyHandle, RobotId, Scale, Shape,
    SimulationError, TouchSensor, UltrasonicSensor, Velocity,
};

/// Two-phase construction state of anything that owns physics resources.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Realization<T> {
    /// Logical definition only.
    Defined,
    /// Physics resources exist.
    Realized(T),
}

impl<T> Realization<T> {
    pub fn is_realized(&self) -> bool {
        matches!(self, Realization::Realized(_))
    }

    pub fn get(&self) -> Result<&T, SimulationError> {
        match self {
            Realization::Realized(value) => Ok(value),
            Realization::Defined => Err(SimulationError::NotRealized),
        }
    }
}

/// Footprint in logical units. `width` runs along the part's local x-axis, `height` along its
/// facing direction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Physics state of a realized part.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub chassis: RigidBodyHandle,
    pub collider: ColliderHandle,
    pub scale: Scale,
    /// Scaled world pose as of the last update.
    pub pose: Pose,
}

/// State shared by every kind of part.
#[derive(Clone, Debug, PartialEq)]
pub struct PartFrame {
    robot: RobotId,
    address: String,
    offset: Position,
    size: Size,
    realization: Realization<Placement>,
}

impl PartFrame {
    pub fn new(robot: RobotId, address: impl Into<String>, offset: Position, size: Size) -> Self {
        Self {
            robot,
            address: address.into(),
            offset,
            size,
            realization: Realization::Defined,
        }
    }

    pub fn robot(&self) -> RobotId {
        self.robot
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Offset from the robot's reference point in logical units, in the robot's frame.
    pub fn offset(&self) -> Position {
        self.offset
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn placement(&self) -> Result<&Placement, SimulationError> {
        self.realization.get()
    }

    /// Where this part sits when its robot is at `reference`. Units follow `reference`.
    pub fn place(&self, reference: Pose, scale: Option<Scale>) -> Pose {
        match scale {
            Some(scale) => reference.compose(scale.scale_position(self.offset)),
            None => reference.compose(self.offset),
        }
    }

    fn create_shape(
        &mut self,
        scale: Scale,
        physics: &mut PhysicsWorld,
        chassis: RigidBodyHandle,
        sensor: bool,
    ) -> Result<(), SimulationError> {
        if self.realization.is_realized() {
            return Err(SimulationError::AlreadyRealized);
        }

        let collider = physics.insert_collider(
            chassis,
            ColliderKind::Cuboid {
                offset: scale.scale_position(self.offset),
                x_length: scale.scale(self.size.width),
                y_length: scale.scale(self.size.height),
                sensor,
            },
        );
        let chassis_pose = physics.body_pose(chassis).ok_or(SimulationError::Detached)?;
        let pose = self.place(chassis_pose, Some(scale));

        self.realization = Realization::Realized(Placement {
            chassis,
            collider,
            scale,
            pose,
        });
        Ok(())
    }

    fn update_pose(&mut self, physics: &PhysicsWorld) {
        if let Realization::Realized(placement) = &mut self.realization {
            if let Some(pose) = physics.collider_pose(placement.collider) {
                placement.pose = pose;
            }
        }
    }

    /// Forgets the collider. The caller removes it from the physics world with the chassis.
    pub(super) fn detach(&mut self) {
        self.realization = Realization::Defined;
    }
}

/// Capabilities every part offers to its robot and to the renderer.
pub trait BodyPart {
    fn frame(&self) -> &PartFrame;

    fn frame_mut(&mut self) -> &mut PartFrame;

    /// Whether the collider only reports overlaps instead of pushing other bodies.
    fn is_sensor_collider(&self) -> bool {
        false
    }

    /// Scaled world pose, available once the part is realized.
    fn pose(&self) -> Option<Pose> {
        self.frame().placement().ok().map(|placement| placement.pose)
    }

    fn create_shape(
        &mut self,
        scale: Scale,
        physics: &mut PhysicsWorld,
        chassis: RigidBodyHandle,
    ) -> Result<(), SimulationError> {
        let sensor = self.is_sensor_collider();
        self.frame_mut().create_shape(scale, physics, chassis, sensor)
    }

    fn update_pose(&mut self, physics: &PhysicsWorld) {
        self.frame_mut().update_pose(physics)
    }
}

/// The robot's body.
#[derive(Clone, Debug, PartialEq)]
pub struct Brick {
    frame: PartFrame,
}

impl Brick {
    /// Bricks carry no address.
    pub fn new(robot: RobotId, offset: Position, size: Size) -> Self {
        Self {
            frame: PartFrame::new(robot, "", offset, size),
        }
    }
}

impl BodyPart for Brick {
    fn frame(&self) -> &PartFrame {
        &self.frame
    }

    fn frame_mut(&mut self) -> &mut PartFrame {
        &mut self.frame
    }
}

/// Motor housing with a driven wheel.
#[derive(Clone, Debug, PartialEq)]
pub struct Wheel {
    frame: PartFrame,
    speed: Velocity,
}

impl Wheel {
    pub fn new(robot: RobotId, address: impl Into<String>, offset: Position, size: Size) -> Self {
        Self {
            frame: PartFrame::new(robot, address, offset, size),
            speed: Velocity::default(),
        }
    }

    pub fn speed(&self) -> Velocity {
        self.speed
    }

    pub fn set_speed(&mut self, speed: Velocity) {
        self.speed = speed;
    }
}

impl BodyPart for Wheel {
    fn frame(&self) -> &PartFrame {
        &self.frame
    }

    fn frame_mut(&mut self) -> &mut PartFrame {
        &mut self.frame
    }
}

/// Value a sensor last measured, as handed to control code.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SensorValue {
    Touch(bool),
    /// Scaled distance, `-1` when nothing was detected.
    Distance(f64),
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Touch(pressed) => write!(f, "{}", u8::from(*pressed)),
            SensorValue::Distance(distance) => write!(f, "{distance:.1}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Part {
    Brick(Brick),
    Wheel(Wheel),
    TouchSensor(TouchSensor),
    UltrasonicSensor(UltrasonicSensor),
}

impl Part {
    pub fn address(&self) -> &str {
        self.frame().address()
    }

    pub fn latest_value(&self) -> Option<SensorValue> {
        match self {
            Part::TouchSensor(sensor) => Some(SensorValue::Touch(sensor.latest_value())),
            Part::UltrasonicSensor(sensor) => Some(SensorValue::Distance(sensor.latest_value())),
            Part::Brick(_) | Part::Wheel(_) => None,
        }
    }
}

impl BodyPart for Part {
    fn frame(&self) -> &PartFrame {
        match self {
            Part::Brick(part) => part.frame(),
            Part::Wheel(part) => part.frame(),
            Part::TouchSensor(part) => part.frame(),
            Part::UltrasonicSensor(part) => part.frame(),
        }
    }

    fn frame_mut(&mut self) -> &mut PartFrame {
        match self {
            Part::Brick(part) => part.frame_mut(),
            Part::Wheel(part) => part.frame_mut(),
            Part::TouchSensor(part) => part.frame_mut(),
            Part::UltrasonicSensor(part) => part.frame_mut(),
        }
    }

    fn is_sensor_collider(&self) -> bool {
        match self {
            Part::Brick(part) => part.is_sensor_collider(),
            Part::Wheel(part) => part.is_sensor_collider(),
            Part::TouchSensor(part) => part.is_sensor_collider(),
            Part::UltrasonicSensor(part) => part.is_sensor_collider(),
        }
    }
}

impl HasCollision for PartFrame {
    fn shape(&self) -> Option<Shape> {
        self.placement().ok().map(|placement| Shape::Rectangle {
            position: placement.pose.position,
            x_length: placement.scale.scale(self.size.width),
            y_length: placement.scale.scale(self.size.height),
            angle: placement.pose.angle,
        })
    }
}
