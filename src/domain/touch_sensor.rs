//! Bumper bar reporting contact with obstacles.

use std::fmt;

use super::{BodyPart, HasCollision, Obstacle, ObstacleId, PartFrame, Position, RobotId, Shape, Size};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TouchSide {
    Left,
    Right,
    Rear,
}

impl fmt::Display for TouchSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self {
            TouchSide::Left => "left",
            TouchSide::Right => "right",
            TouchSide::Rear => "rear",
        };
        f.write_str(side)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TouchSensor {
    frame: PartFrame,
    side: TouchSide,
    sensible_obstacles: Vec<ObstacleId>,
    latest: bool,
}

impl TouchSensor {
    pub fn new(
        robot: RobotId,
        address: impl Into<String>,
        offset: Position,
        side: TouchSide,
        size: Size,
    ) -> Self {
        Self {
            frame: PartFrame::new(robot, address, offset, size),
            side,
            sensible_obstacles: vec![],
            latest: Self::default_value(),
        }
    }

    pub fn side(&self) -> TouchSide {
        self.side
    }

    pub fn default_value() -> bool {
        false
    }

    pub fn set_sensible_obstacles(&mut self, obstacles: impl IntoIterator<Item = ObstacleId>) {
        self.sensible_obstacles = obstacles.into_iter().collect();
    }

    /// Whether any sensible obstacle overlaps the bar. Ids that no longer resolve are skipped.
    pub fn is_touching(&self, obstacles: &[Obstacle]) -> bool {
        self.sensible_obstacles
            .iter()
            .filter_map(|id| obstacles.get(id.0))
            .any(|obstacle| obstacle.collided_with(self))
    }

    /// Evaluates [`TouchSensor::is_touching`] and keeps the result as the latest value.
    pub fn measure(&mut self, obstacles: &[Obstacle]) -> bool {
        self.latest = self.is_touching(obstacles);
        self.latest
    }

    pub fn latest_value(&self) -> bool {
        self.latest
    }

    pub fn clear(&mut self) {
        self.latest = Self::default_value();
    }
}

impl BodyPart for TouchSensor {
    fn frame(&self) -> &PartFrame {
        &self.frame
    }

    fn frame_mut(&mut self) -> &mut PartFrame {
        &mut self.frame
    }

    fn is_sensor_collider(&self) -> bool {
        true
    }
}

impl HasCollision for TouchSensor {
    fn shape(&self) -> Option<Shape> {
        self.frame.shape()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::super::{
        physics::BodyKind, Angle, Bottle, Color, PhysicsWorld, Pose, RigidBodyHandle, Scale,
    };
    use super::*;

    struct Setup {
        physics: PhysicsWorld,
        chassis: RigidBodyHandle,
        sensor: TouchSensor,
        obstacles: Vec<Obstacle>,
    }

    /// Bar of 20x4 scaled units centered at (50, 60), one bottle of radius 5.
    fn setup(bottle_at: Position) -> Setup {
        let scale = Scale::new(1.0).unwrap();
        let mut physics = PhysicsWorld::new(Duration::from_secs_f64(1.0 / 30.0));
        let chassis = physics.insert_body(
            Pose::new(Position::new(50.0, 50.0), Angle::default()),
            BodyKind::Fixed,
        );
        let mut sensor = TouchSensor::new(
            RobotId(0),
            "ev3-ports:in1",
            Position::new(0.0, 10.0),
            TouchSide::Left,
            Size::new(20.0, 4.0),
        );
        sensor.create_shape(scale, &mut physics, chassis).unwrap();

        let mut obstacles = vec![Obstacle::Bottle(Bottle::new(bottle_at, 5.0, Color::default()))];
        for obstacle in obstacles.iter_mut() {
            obstacle.create_shape(scale, &mut physics).unwrap();
        }
        sensor.set_sensible_obstacles([ObstacleId(0)]);

        Setup {
            physics,
            chassis,
            sensor,
            obstacles,
        }
    }

    #[test]
    fn test_touch_sensor_without_obstacles() {
        let Setup {
            mut sensor,
            obstacles,
            ..
        } = setup(Position::new(50.0, 64.0));
        sensor.set_sensible_obstacles([]);
        assert!(!sensor.is_touching(&obstacles));
        assert!(!sensor.is_touching(&[]));
        assert!(!sensor.measure(&obstacles));
    }

    #[test]
    fn test_touch_sensor_overlap() {
        let Setup {
            mut sensor,
            obstacles,
            ..
        } = setup(Position::new(50.0, 64.0));
        assert!(sensor.is_touching(&obstacles));
        assert!(sensor.measure(&obstacles));
        assert!(sensor.latest_value());
    }

    #[test]
    fn test_touch_sensor_not_sticky() {
        let Setup {
            mut physics,
            chassis,
            mut sensor,
            obstacles,
        } = setup(Position::new(50.0, 64.0));
        assert!(sensor.measure(&obstacles));

        physics.set_body_pose(chassis, Pose::new(Position::new(50.0, 20.0), Angle::default()));
        physics.step();
        sensor.update_pose(&physics);
        assert!(!sensor.measure(&obstacles));
        assert!(!sensor.latest_value());
    }

    #[test]
    fn test_touch_sensor_skips_missing_obstacles() {
        let Setup {
            mut sensor,
            obstacles,
            ..
        } = setup(Position::new(50.0, 64.0));
        sensor.set_sensible_obstacles([ObstacleId(7), ObstacleId(0)]);
        assert!(sensor.is_touching(&obstacles));
        sensor.set_sensible_obstacles([ObstacleId(7)]);
        assert!(!sensor.is_touching(&obstacles));
    }

    #[test]
    fn test_touch_sensor_unrealized_reads_default() {
        let Setup { obstacles, .. } = setup(Position::new(50.0, 64.0));
        let mut sensor = TouchSensor::new(
            RobotId(0),
            "ev3-ports:in1",
            Position::new(0.0, 10.0),
            TouchSide::Rear,
            Size::new(20.0, 4.0),
        );
        sensor.set_sensible_obstacles([ObstacleId(0)]);
        assert!(!sensor.is_touching(&obstacles));
        assert_eq!(sensor.latest_value(), TouchSensor::default_value());
    }

    #[test]
    fn test_touch_sensor_clear() {
        let Setup {
            mut sensor,
            obstacles,
            ..
        } = setup(Position::new(50.0, 64.0));
        sensor.measure(&obstacles);
        sensor.clear();
        assert!(!sensor.latest_value());
    }

    #[rstest]
    #[case(TouchSide::Left, "left")]
    #[case(TouchSide::Right, "right")]
    #[case(TouchSide::Rear, "rear")]
    fn test_touch_side_display(#[case] side: TouchSide, #[case] expected: &str) {
        assert_eq!(side.to_string(), expected);
    }
}
