//! Differential-drive robot assembled from body parts on a single chassis.

use nalgebra::{Matrix2, Vector2};
use tracing::{debug, warn};

use super::{
    physics::BodyKind, BodyPart, Obstacle, ObstacleId, Part, PhysicsWorld, Pose, Position,
    Realization, RigidBodyHandle, Scale, SensorValue, SimulationError, Velocity, Wheel,
};

const CHASSIS_DAMPING: f64 = 0.0;

/// Index of a robot within its world.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RobotId(pub usize);

/// Physics state of a realized robot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Chassis {
    pub body: RigidBodyHandle,
    pub scale: Scale,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Robot {
    id: RobotId,
    name: String,
    start: Pose,
    parts: Vec<Part>,
    chassis: Realization<Chassis>,
}

impl Robot {
    /// `start` is the logical pose the robot is placed at on realization and on reset.
    pub fn new(id: RobotId, name: impl Into<String>, start: Pose) -> Self {
        Self {
            id,
            name: name.into(),
            start,
            parts: vec![],
            chassis: Realization::Defined,
        }
    }

    pub fn id(&self) -> RobotId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn add_part(&mut self, part: Part) -> Result<(), SimulationError> {
        if self.chassis.is_realized() {
            return Err(SimulationError::AlreadyRealized);
        }
        if !part.address().is_empty() && self.find(part.address()).is_some() {
            return Err(SimulationError::DuplicateAddress(part.address().to_string()));
        }
        self.parts.push(part);
        Ok(())
    }

    pub fn part(&self, address: &str) -> Result<&Part, SimulationError> {
        self.find(address)
            .map(|index| &self.parts[index])
            .ok_or_else(|| SimulationError::UnknownAddress(address.to_string()))
    }

    fn part_mut(&mut self, address: &str) -> Result<&mut Part, SimulationError> {
        match self.find(address) {
            Some(index) => Ok(&mut self.parts[index]),
            None => Err(SimulationError::UnknownAddress(address.to_string())),
        }
    }

    fn find(&self, address: &str) -> Option<usize> {
        if address.is_empty() {
            return None;
        }
        self.parts.iter().position(|part| part.address() == address)
    }

    /// Scaled pose of the chassis as of the last step.
    pub fn pose(&self, physics: &PhysicsWorld) -> Option<Pose> {
        let chassis = self.chassis.get().ok()?;
        physics.body_pose(chassis.body)
    }

    /// Pose of the chassis in board units.
    pub fn logical_pose(&self, physics: &PhysicsWorld) -> Option<Pose> {
        let chassis = self.chassis.get().ok()?;
        physics.body_pose(chassis.body).map(|pose| {
            Pose::new(chassis.scale.unscale_position(pose.position), pose.angle)
        })
    }

    /// Inserts the chassis at the scaled start pose and attaches every part to it. On failure the
    /// chassis is removed again and parts attached so far are detached.
    pub fn create_shapes(&mut self, scale: Scale, physics: &mut PhysicsWorld) -> Result<(), SimulationError> {
        if self.chassis.is_realized() {
            return Err(SimulationError::AlreadyRealized);
        }

        let body = physics.insert_body(
            Pose::new(scale.scale_position(self.start.position), self.start.angle),
            BodyKind::Dynamic {
                damping: CHASSIS_DAMPING,
            },
        );
        for index in 0..self.parts.len() {
            if let Err(error) = self.parts[index].create_shape(scale, physics, body) {
                physics.remove_body(body);
                for part in self.parts[..index].iter_mut() {
                    part.frame_mut().detach();
                }
                return Err(error);
            }
        }
        self.chassis = Realization::Realized(Chassis { body, scale });

        let wheels = self.wheels().count();
        if wheels != 2 {
            warn!(robot = %self.name, wheels, "robot needs exactly two wheels to drive");
        }
        Ok(())
    }

    /// Removes the chassis with every part collider; the robot can be realized again afterwards.
    pub fn remove_shapes(&mut self, physics: &mut PhysicsWorld) {
        if let Realization::Realized(chassis) = self.chassis {
            physics.remove_body(chassis.body);
            for part in self.parts.iter_mut() {
                part.frame_mut().detach();
            }
            self.chassis = Realization::Defined;
        }
    }

    pub fn set_sensible_obstacles(&mut self, obstacles: &[ObstacleId]) {
        for part in self.parts.iter_mut() {
            if let Part::TouchSensor(sensor) = part {
                sensor.set_sensible_obstacles(obstacles.iter().copied());
            }
        }
    }

    pub fn set_motor_speed(&mut self, address: &str, speed: Velocity) -> Result<(), SimulationError> {
        match self.part_mut(address)? {
            Part::Wheel(wheel) => {
                wheel.set_speed(speed);
                Ok(())
            }
            _ => Err(SimulationError::NotAMotor(address.to_string())),
        }
    }

    pub fn latest_value(&self, address: &str) -> Result<SensorValue, SimulationError> {
        self.part(address)?
            .latest_value()
            .ok_or_else(|| SimulationError::NotASensor(address.to_string()))
    }

    /// Sets the chassis velocity from the wheel speeds. Robots without exactly two wheels at
    /// different lateral offsets are left alone.
    pub fn apply_drive(&self, physics: &mut PhysicsWorld) -> Result<(), SimulationError> {
        let chassis = *self.chassis.get()?;
        let Some(q) = self.velocity_vector() else {
            return Ok(());
        };
        let Some(pose) = physics.body_pose(chassis.body) else {
            return Err(SimulationError::Detached);
        };

        let linear = pose.angle.direction() * chassis.scale.scale(q[0]);
        physics.set_body_velocity(chassis.body, linear, q[1]);
        Ok(())
    }

    /// Forward speed in logical units per second and turn rate in radians per second.
    fn velocity_vector(&self) -> Option<Vector2<f64>> {
        let mut wheels = self.wheels();
        let (a, b) = (wheels.next()?, wheels.next()?);
        if wheels.next().is_some() {
            return None;
        }
        let (left, right) = if a.frame().offset().x() <= b.frame().offset().x() {
            (a, b)
        } else {
            (b, a)
        };
        let track_width = right.frame().offset().x() - left.frame().offset().x();
        if track_width <= 0.0 {
            return None;
        }

        let j = Matrix2::new(0.5, 0.5, -1.0 / track_width, 1.0 / track_width);
        let v = Vector2::new(f64::from(left.speed()), f64::from(right.speed()));
        Some(j * v)
    }

    fn wheels(&self) -> impl Iterator<Item = &Wheel> {
        self.parts.iter().filter_map(|part| match part {
            Part::Wheel(wheel) => Some(wheel),
            _ => None,
        })
    }

    pub fn update_pose(&mut self, physics: &PhysicsWorld) {
        for part in self.parts.iter_mut() {
            part.update_pose(physics);
        }
    }

    /// Takes a reading on every sensor. Part poses must be current.
    pub fn measure(&mut self, physics: &PhysicsWorld, obstacles: &[Obstacle]) -> Result<(), SimulationError> {
        for part in self.parts.iter_mut() {
            match part {
                Part::TouchSensor(sensor) => {
                    sensor.measure(obstacles);
                }
                Part::UltrasonicSensor(sensor) => {
                    sensor.measure(physics)?;
                }
                Part::Brick(_) | Part::Wheel(_) => {}
            }
        }
        Ok(())
    }

    pub fn clear_readings(&mut self) {
        for part in self.parts.iter_mut() {
            match part {
                Part::TouchSensor(sensor) => sensor.clear(),
                Part::UltrasonicSensor(sensor) => sensor.clear(),
                Part::Brick(_) | Part::Wheel(_) => {}
            }
        }
    }

    /// Puts the robot back at its start pose, at rest, with stopped motors and cleared readings.
    pub fn reset(&mut self, physics: &mut PhysicsWorld) -> Result<(), SimulationError> {
        let chassis = *self.chassis.get()?;
        physics.set_body_velocity(chassis.body, Position::default(), 0.0);
        physics.set_body_pose(
            chassis.body,
            Pose::new(chassis.scale.scale_position(self.start.position), self.start.angle),
        );
        for part in self.parts.iter_mut() {
            if let Part::Wheel(wheel) = part {
                wheel.set_speed(Velocity::default());
            }
        }
        self.clear_readings();
        debug!(robot = %self.name, "robot reset");
        Ok(())
    }
}
