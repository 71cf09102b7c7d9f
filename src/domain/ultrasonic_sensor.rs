//! Distance sensor emulated by ray-casting into the physics world.

use super::{BodyPart, PartFrame, PhysicsWorld, Position, RobotId, SimulationError, Size};

/// Length of the cast ray in scaled units; covers the whole playing field.
pub const RAY_CAST_LENGTH: f64 = 1000.0;

/// Reading when nothing lies along the ray.
pub const NO_ECHO: f64 = -1.0;

#[derive(Clone, Debug, PartialEq)]
pub struct UltrasonicSensor {
    frame: PartFrame,
    half_height: f64,
    latest: f64,
}

impl UltrasonicSensor {
    /// `half_height` is the logical distance from the sensor's center to its lens.
    pub fn new(
        robot: RobotId,
        address: impl Into<String>,
        offset: Position,
        size: Size,
        half_height: f64,
    ) -> Self {
        Self {
            frame: PartFrame::new(robot, address, offset, size),
            half_height,
            latest: NO_ECHO,
        }
    }

    /// Scaled distance from the lens to the first shape the sensor faces, or [`NO_ECHO`]. Shapes
    /// closer than the lens give negative distances.
    pub fn distance(&self, physics: &PhysicsWorld) -> Result<f64, SimulationError> {
        let placement = self.frame.placement()?;
        let origin = placement.pose.position;

        Ok(
            match physics.segment_query_first(origin, self.ray_cast_point()?, Some(placement.chassis)) {
                Some(hit) => origin.distance(hit) - placement.scale.scale(self.half_height),
                None => NO_ECHO,
            },
        )
    }

    /// Far end of the cast ray, [`RAY_CAST_LENGTH`] ahead of the sensor along its facing.
    pub fn ray_cast_point(&self) -> Result<Position, SimulationError> {
        let pose = self.frame.placement()?.pose;
        let rad = f64::from(pose.angle);
        Ok(Position::new(
            pose.position.x() + RAY_CAST_LENGTH * (-rad).sin(),
            pose.position.y() + RAY_CAST_LENGTH * (-rad).cos(),
        ))
    }

    /// Evaluates [`UltrasonicSensor::distance`] and keeps the result as the latest value.
    pub fn measure(&mut self, physics: &PhysicsWorld) -> Result<f64, SimulationError> {
        self.latest = self.distance(physics)?;
        Ok(self.latest)
    }

    pub fn latest_value(&self) -> f64 {
        self.latest
    }

    pub fn clear(&mut self) {
        self.latest = NO_ECHO;
    }
}

impl BodyPart for UltrasonicSensor {
    fn frame(&self) -> &PartFrame {
        &self.frame
    }

    fn frame_mut(&mut self) -> &mut PartFrame {
        &mut self.frame
    }
}
