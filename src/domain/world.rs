//! Robots and obstacles sharing one physics world.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use super::{
    BodyPart, Obstacle, ObstacleId, PhysicsWorld, Pose, Robot, RobotId, Scale, SensorValue,
    Velocity,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("physics resources have not been created yet")]
    NotRealized,
    #[error("physics resources have already been created")]
    AlreadyRealized,
    #[error("collider is no longer attached to the physics world")]
    Detached,
    #[error("unknown robot {0:?}")]
    UnknownRobot(RobotId),
    #[error("no part at address '{0}'")]
    UnknownAddress(String),
    #[error("part at address '{0}' is not a motor")]
    NotAMotor(String),
    #[error("part at address '{0}' is not a sensor")]
    NotASensor(String),
    #[error("address '{0}' is used by more than one part")]
    DuplicateAddress(String),
}

/// One sensor value as reported to control code.
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    pub robot: RobotId,
    pub address: String,
    pub value: SensorValue,
}

pub struct World {
    board_width: f64,
    board_height: f64,
    physics: PhysicsWorld,
    robots: Vec<Robot>,
    obstacles: Vec<Obstacle>,
    scale: Option<Scale>,
    ticks: u64,
}

impl World {
    /// Empty board of the given logical size, stepped by `timestep` on every tick.
    pub fn new(board_width: f64, board_height: f64, timestep: Duration) -> Self {
        Self {
            board_width,
            board_height,
            physics: PhysicsWorld::new(timestep),
            robots: vec![],
            obstacles: vec![],
            scale: None,
            ticks: 0,
        }
    }

    pub fn board_size(&self) -> (f64, f64) {
        (self.board_width, self.board_height)
    }

    pub fn scale(&self) -> Option<Scale> {
        self.scale
    }

    pub fn is_realized(&self) -> bool {
        self.scale.is_some()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn robots(&self) -> &[Robot] {
        &self.robots
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Adds a robot without parts at the logical `start` pose.
    pub fn add_robot(&mut self, name: impl Into<String>, start: Pose) -> Result<RobotId, SimulationError> {
        if self.is_realized() {
            return Err(SimulationError::AlreadyRealized);
        }
        let id = RobotId(self.robots.len());
        self.robots.push(Robot::new(id, name, start));
        Ok(id)
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) -> Result<ObstacleId, SimulationError> {
        if self.is_realized() {
            return Err(SimulationError::AlreadyRealized);
        }
        self.obstacles.push(obstacle);
        Ok(ObstacleId(self.obstacles.len() - 1))
    }

    pub fn robot(&self, id: RobotId) -> Result<&Robot, SimulationError> {
        self.robots.get(id.0).ok_or(SimulationError::UnknownRobot(id))
    }

    pub fn robot_mut(&mut self, id: RobotId) -> Result<&mut Robot, SimulationError> {
        self.robots
            .get_mut(id.0)
            .ok_or(SimulationError::UnknownRobot(id))
    }

    /// Creates every physics body for the run's scale. Touch sensors sense every obstacle. If any
    /// shape cannot be created, the ones created so far are removed and the world stays defined.
    pub fn realize(&mut self, scale: Scale) -> Result<(), SimulationError> {
        if self.is_realized() {
            return Err(SimulationError::AlreadyRealized);
        }

        let mut robots = 0;
        let mut obstacles = 0;
        if let Err(error) = self.create_shapes(scale, &mut robots, &mut obstacles) {
            for robot in self.robots[..robots].iter_mut() {
                robot.remove_shapes(&mut self.physics);
            }
            for obstacle in self.obstacles[..obstacles].iter_mut() {
                obstacle.remove_shape(&mut self.physics);
            }
            return Err(error);
        }
        info!(
            factor = scale.factor(),
            robots,
            obstacles,
            bodies = self.physics.body_count(),
            colliders = self.physics.collider_count(),
            "starting simulation with scaling"
        );

        let sensible = (0..self.obstacles.len()).map(ObstacleId).collect::<Vec<_>>();
        for robot in self.robots.iter_mut() {
            robot.set_sensible_obstacles(&sensible);
            robot.update_pose(&self.physics);
            robot.clear_readings();
        }
        self.scale = Some(scale);
        Ok(())
    }

    /// Counts the robots and obstacles realized so far in `robots` and `obstacles`.
    fn create_shapes(&mut self, scale: Scale, robots: &mut usize, obstacles: &mut usize) -> Result<(), SimulationError> {
        for robot in self.robots.iter_mut() {
            robot.create_shapes(scale, &mut self.physics)?;
            *robots += 1;
        }
        for obstacle in self.obstacles.iter_mut() {
            obstacle.create_shape(scale, &mut self.physics)?;
            *obstacles += 1;
        }
        Ok(())
    }

    /// Advances the simulation by one timestep: drive, step, poses, measurements.
    pub fn tick(&mut self) -> Result<(), SimulationError> {
        if !self.is_realized() {
            return Err(SimulationError::NotRealized);
        }

        for robot in self.robots.iter() {
            robot.apply_drive(&mut self.physics)?;
        }
        self.physics.step();

        for obstacle in self.obstacles.iter_mut() {
            obstacle.sync(&self.physics);
        }
        for robot in self.robots.iter_mut() {
            robot.update_pose(&self.physics);
        }
        for robot in self.robots.iter_mut() {
            robot.measure(&self.physics, &self.obstacles)?;
        }

        self.ticks += 1;
        Ok(())
    }

    /// Puts every obstacle and robot back at its configured pose. Readings fall back to their
    /// defaults until the next tick.
    pub fn reset(&mut self) -> Result<(), SimulationError> {
        if !self.is_realized() {
            return Err(SimulationError::NotRealized);
        }
        for obstacle in self.obstacles.iter_mut() {
            obstacle.reset(&mut self.physics)?;
        }
        for robot in self.robots.iter_mut() {
            robot.reset(&mut self.physics)?;
        }
        debug!(ticks = self.ticks, "world reset");
        Ok(())
    }

    /// Speed in logical units per second for the motor at `address`.
    pub fn set_motor_speed(&mut self, robot: RobotId, address: &str, speed: Velocity) -> Result<(), SimulationError> {
        self.robot_mut(robot)?.set_motor_speed(address, speed)
    }

    pub fn latest_value(&self, robot: RobotId, address: &str) -> Result<SensorValue, SimulationError> {
        self.robot(robot)?.latest_value(address)
    }

    /// Latest value of every sensor, robot by robot in part order.
    pub fn readings(&self) -> Vec<Reading> {
        self.robots
            .iter()
            .flat_map(|robot| {
                robot.parts().iter().filter_map(move |part| {
                    part.latest_value().map(|value| Reading {
                        robot: part.frame().robot(),
                        address: part.address().to_string(),
                        value,
                    })
                })
            })
            .collect()
    }
}
