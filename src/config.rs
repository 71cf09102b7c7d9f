//! Simulator configuration read from YAML.
//!
//! All lengths are logical board units. The configuration is loaded once in `main` and consumed
//! by [`SimulatorConfig::build_world`] and [`SimulatorConfig::viewport`].

use std::{collections::HashSet, fs, io, path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{
    Angle, Bottle, Brick, Color, Obstacle, Part, Pose, Position, Scale, ScaleError,
    SimulationError, Size, TouchSensor, TouchSide, UltrasonicSensor, Viewport, Wall, Wheel,
    World,
};

const DEFAULT_CONFIG: &str = include_str!("../config/default.yaml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{what} must be positive, got {value}")]
    NonPositive { what: String, value: f64 },
    #[error("{what} must not be negative, got {value}")]
    Negative { what: String, value: f64 },
    #[error("{what} must be a finite number, got {value}")]
    NonFinite { what: String, value: f64 },
    #[error("robot '{robot}' uses address '{address}' more than once")]
    DuplicateAddress { robot: String, address: String },
    #[error("robot '{0}' has no brick")]
    MissingBrick(String),
    #[error(transparent)]
    Scale(#[from] ScaleError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    pub board: BoardConfig,
    pub screen: ScreenConfig,
    pub exec: ExecConfig,
    pub body_part_sizes: BodyPartSizes,
    #[serde(default)]
    pub ultrasonic: UltrasonicConfig,
    #[serde(default)]
    pub robots: Vec<RobotConfig>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleConfig>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct BoardConfig {
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
    pub side_bar_width: u32,
    #[serde(default = "default_title")]
    pub title: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ExecConfig {
    pub frames_per_second: u32,
    /// WAV file the demo program plays when it starts, instead of saying "ready".
    #[serde(default)]
    pub startup_sound: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct BodyPartSizes {
    pub brick: SizeConfig,
    pub wheel: SizeConfig,
    pub touch_sensor_bar: SizeConfig,
    pub touch_sensor_bar_rear: SizeConfig,
    pub ultrasonic_sensor: SizeConfig,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct SizeConfig {
    pub width: f64,
    pub height: f64,
}

impl From<SizeConfig> for Size {
    fn from(value: SizeConfig) -> Self {
        Size::new(value.width, value.height)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct UltrasonicConfig {
    /// Distance from the sensor's center to its lens.
    pub half_height: f64,
}

impl Default for UltrasonicConfig {
    fn default() -> Self {
        Self { half_height: 22.5 }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RobotConfig {
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// Degrees, counter-clockwise from facing up the board.
    #[serde(default)]
    pub orientation: f64,
    pub parts: Vec<PartConfig>,
}

/// Part placement relative to the robot's center, with the robot facing up the board.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartConfig {
    Brick {
        x: f64,
        y: f64,
    },
    Wheel {
        address: String,
        x: f64,
        y: f64,
    },
    TouchSensor {
        address: String,
        side: SideConfig,
        x: f64,
        y: f64,
    },
    UltrasonicSensor {
        address: String,
        x: f64,
        y: f64,
    },
}

impl PartConfig {
    fn position(&self) -> (f64, f64) {
        match *self {
            PartConfig::Brick { x, y }
            | PartConfig::Wheel { x, y, .. }
            | PartConfig::TouchSensor { x, y, .. }
            | PartConfig::UltrasonicSensor { x, y, .. } => (x, y),
        }
    }

    fn address(&self) -> Option<&str> {
        match self {
            PartConfig::Brick { .. } => None,
            PartConfig::Wheel { address, .. }
            | PartConfig::TouchSensor { address, .. }
            | PartConfig::UltrasonicSensor { address, .. } => Some(address),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SideConfig {
    Left,
    Right,
    Rear,
}

impl From<SideConfig> for TouchSide {
    fn from(value: SideConfig) -> Self {
        match value {
            SideConfig::Left => TouchSide::Left,
            SideConfig::Right => TouchSide::Right,
            SideConfig::Rear => TouchSide::Rear,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObstacleConfig {
    Bottle {
        x: f64,
        y: f64,
        radius: f64,
        #[serde(default = "default_bottle_color")]
        color: [u8; 3],
    },
    Wall {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        #[serde(default = "default_wall_color")]
        color: [u8; 3],
    },
}

fn default_title() -> String {
    "Brick Simulator".to_string()
}

fn default_bottle_color() -> [u8; 3] {
    [0, 0, 255]
}

fn default_wall_color() -> [u8; 3] {
    [90, 90, 90]
}

impl SimulatorConfig {
    /// Configuration shipped with the binary.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(DEFAULT_CONFIG)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Parses and validates a configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("board width", self.board.width)?;
        positive("board height", self.board.height)?;
        positive("frames per second", self.exec.frames_per_second as f64)?;
        for (what, size) in [
            ("brick", self.body_part_sizes.brick),
            ("wheel", self.body_part_sizes.wheel),
            ("touch sensor bar", self.body_part_sizes.touch_sensor_bar),
            ("rear touch sensor bar", self.body_part_sizes.touch_sensor_bar_rear),
            ("ultrasonic sensor", self.body_part_sizes.ultrasonic_sensor),
        ] {
            positive(&format!("{what} width"), size.width)?;
            positive(&format!("{what} height"), size.height)?;
        }
        non_negative("ultrasonic half height", self.ultrasonic.half_height)?;
        self.viewport()?;

        for robot in &self.robots {
            finite("robot x", robot.x)?;
            finite("robot y", robot.y)?;
            finite("robot orientation", robot.orientation)?;
            for (x, y) in robot.parts.iter().map(PartConfig::position) {
                finite("part x", x)?;
                finite("part y", y)?;
            }
            if !robot
                .parts
                .iter()
                .any(|part| matches!(part, PartConfig::Brick { .. }))
            {
                return Err(ConfigError::MissingBrick(robot.name.clone()));
            }
            let mut addresses = HashSet::new();
            for address in robot.parts.iter().filter_map(PartConfig::address) {
                if !addresses.insert(address) {
                    return Err(ConfigError::DuplicateAddress {
                        robot: robot.name.clone(),
                        address: address.to_string(),
                    });
                }
            }
        }

        for obstacle in &self.obstacles {
            match *obstacle {
                ObstacleConfig::Bottle { x, y, radius, .. } => {
                    finite("bottle x", x)?;
                    finite("bottle y", y)?;
                    positive("bottle radius", radius)?;
                }
                ObstacleConfig::Wall {
                    x, y, width, height, ..
                } => {
                    finite("wall x", x)?;
                    finite("wall y", y)?;
                    positive("wall width", width)?;
                    positive("wall height", height)?;
                }
            }
        }
        Ok(())
    }

    /// Duration of one simulation tick.
    pub fn timestep(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.exec.frames_per_second.max(1) as f64)
    }

    /// Scale fitting the board into the screen, and the screen shrunk to the scaled board.
    pub fn viewport(&self) -> Result<(Scale, Viewport), ConfigError> {
        Ok(Scale::fit(
            self.board.width,
            self.board.height,
            Viewport::new(self.screen.width, self.screen.height, self.screen.side_bar_width),
        )?)
    }

    /// Unrealized world holding every configured robot and obstacle.
    pub fn build_world(&self) -> Result<World, ConfigError> {
        self.validate()?;

        let mut world = World::new(self.board.width, self.board.height, self.timestep());
        let sizes = &self.body_part_sizes;

        for config in &self.robots {
            let id = world.add_robot(
                config.name.clone(),
                Pose::new(
                    Position::new(config.x, config.y),
                    Angle::from_deg(config.orientation),
                ),
            )?;
            let robot = world.robot_mut(id)?;
            for part in &config.parts {
                robot.add_part(match part {
                    PartConfig::Brick { x, y } => Part::Brick(Brick::new(
                        id,
                        Position::new(*x, *y),
                        sizes.brick.into(),
                    )),
                    PartConfig::Wheel { address, x, y } => Part::Wheel(Wheel::new(
                        id,
                        address.clone(),
                        Position::new(*x, *y),
                        sizes.wheel.into(),
                    )),
                    PartConfig::TouchSensor {
                        address,
                        side,
                        x,
                        y,
                    } => Part::TouchSensor(TouchSensor::new(
                        id,
                        address.clone(),
                        Position::new(*x, *y),
                        (*side).into(),
                        match side {
                            SideConfig::Rear => sizes.touch_sensor_bar_rear.into(),
                            SideConfig::Left | SideConfig::Right => sizes.touch_sensor_bar.into(),
                        },
                    )),
                    PartConfig::UltrasonicSensor { address, x, y } => {
                        Part::UltrasonicSensor(UltrasonicSensor::new(
                            id,
                            address.clone(),
                            Position::new(*x, *y),
                            sizes.ultrasonic_sensor.into(),
                            self.ultrasonic.half_height,
                        ))
                    }
                })?;
            }
        }

        for config in &self.obstacles {
            world.add_obstacle(match *config {
                ObstacleConfig::Bottle {
                    x,
                    y,
                    radius,
                    color: [r, g, b],
                } => Obstacle::Bottle(Bottle::new(Position::new(x, y), radius, Color(r, g, b))),
                ObstacleConfig::Wall {
                    x,
                    y,
                    width,
                    height,
                    color: [r, g, b],
                } => Obstacle::Wall(Wall::new(Position::new(x, y), width, height, Color(r, g, b))),
            })?;
        }

        Ok(world)
    }
}

fn positive(what: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive {
            what: what.to_string(),
            value,
        })
    }
}

fn non_negative(what: &str, value: f64) -> Result<(), ConfigError> {
    finite(what, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative {
            what: what.to_string(),
            value,
        })
    }
}

fn finite(what: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite {
            what: what.to_string(),
            value,
        })
    }
}
