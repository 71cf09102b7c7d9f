//! Collidable bodies that are not part of a robot.

use super::{
    physics::{BodyKind, ColliderKind},
    Angle, HasCollision, PhysicsWorld, Pose, Position, Realization, RigidBodyHandle, Scale,
    Shape, SimulationError,
};

const BOTTLE_MASS: f64 = 5.0;
const BOTTLE_FRICTION: f64 = 0.2;
/// Stands in for floor friction in the top-down world.
const BOTTLE_DAMPING: f64 = 5.0;

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ObstacleId(pub usize);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Color(pub u8, pub u8, pub u8);

/// Physics state of a realized obstacle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObstacleBody {
    pub body: RigidBodyHandle,
    pub scale: Scale,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Obstacle {
    Bottle(Bottle),
    Wall(Wall),
}

impl Obstacle {
    pub fn create_shape(&mut self, scale: Scale, physics: &mut PhysicsWorld) -> Result<(), SimulationError> {
        match self {
            Obstacle::Bottle(bottle) => bottle.create_shape(scale, physics),
            Obstacle::Wall(wall) => wall.create_shape(scale, physics),
        }
    }

    pub fn remove_shape(&mut self, physics: &mut PhysicsWorld) {
        let realization = match self {
            Obstacle::Bottle(bottle) => &mut bottle.realization,
            Obstacle::Wall(wall) => &mut wall.realization,
        };
        if let Realization::Realized(realized) = realization {
            physics.remove_body(realized.body);
            *realization = Realization::Defined;
        }
    }

    pub fn reset(&mut self, physics: &mut PhysicsWorld) -> Result<(), SimulationError> {
        match self {
            Obstacle::Bottle(bottle) => bottle.reset(physics),
            Obstacle::Wall(wall) => wall.realization.get().map(|_| ()),
        }
    }

    /// Logical position, see [`Bottle::pos`].
    pub fn pos(&self) -> Position {
        match self {
            Obstacle::Bottle(bottle) => bottle.pos(),
            Obstacle::Wall(wall) => wall.position,
        }
    }

    /// Records the position physics settled on during the last step.
    pub fn sync(&mut self, physics: &PhysicsWorld) {
        if let Obstacle::Bottle(bottle) = self {
            bottle.sync(physics);
        }
    }

    pub fn collided_with(&self, other: &dyn HasCollision) -> bool {
        self.has_collision(other)
    }

    pub fn color(&self) -> Color {
        match self {
            Obstacle::Bottle(bottle) => bottle.color,
            Obstacle::Wall(wall) => wall.color,
        }
    }
}

impl HasCollision for Obstacle {
    fn shape(&self) -> Option<Shape> {
        match self {
            Obstacle::Bottle(bottle) => bottle.shape(),
            Obstacle::Wall(wall) => wall.shape(),
        }
    }
}

/// Free-standing round obstacle that robots can push around.
#[derive(Clone, Debug, PartialEq)]
pub struct Bottle {
    position: Position,
    radius: f64,
    color: Color,
    settled: Option<Position>,
    realization: Realization<ObstacleBody>,
}

impl Bottle {
    pub fn new(position: Position, radius: f64, color: Color) -> Self {
        Self {
            position,
            radius,
            color,
            settled: None,
            realization: Realization::Defined,
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Logical position the physics engine last settled on, or the configured position while
    /// there is none.
    pub fn pos(&self) -> Position {
        self.settled.unwrap_or(self.position)
    }

    pub fn create_shape(&mut self, scale: Scale, physics: &mut PhysicsWorld) -> Result<(), SimulationError> {
        if self.realization.is_realized() {
            return Err(SimulationError::AlreadyRealized);
        }

        let body = physics.insert_body(
            Pose::new(scale.scale_position(self.pos()), Angle::default()),
            BodyKind::Dynamic {
                damping: BOTTLE_DAMPING,
            },
        );
        physics.insert_collider(
            body,
            ColliderKind::Ball {
                radius: scale.scale(self.radius),
                mass: BOTTLE_MASS,
                friction: BOTTLE_FRICTION,
            },
        );
        self.realization = Realization::Realized(ObstacleBody { body, scale });
        Ok(())
    }

    /// Stops the bottle and puts it back where it was configured.
    pub fn reset(&mut self, physics: &mut PhysicsWorld) -> Result<(), SimulationError> {
        let realized = *self.realization.get()?;
        physics.set_body_velocity(realized.body, Position::default(), 0.0);
        physics.set_body_pose(
            realized.body,
            Pose::new(realized.scale.scale_position(self.position), Angle::default()),
        );
        self.settled = None;
        Ok(())
    }

    fn sync(&mut self, physics: &PhysicsWorld) {
        if let Realization::Realized(realized) = self.realization {
            if let Some(pose) = physics.body_pose(realized.body) {
                self.settled = Some(realized.scale.unscale_position(pose.position));
            }
        }
    }

    fn shape(&self) -> Option<Shape> {
        self.realization.get().ok().map(|realized| Shape::Circle {
            position: realized.scale.scale_position(self.pos()),
            radius: realized.scale.scale(self.radius),
        })
    }
}

/// Fixed rectangular obstacle, e.g. a board border.
#[derive(Clone, Debug, PartialEq)]
pub struct Wall {
    position: Position,
    width: f64,
    height: f64,
    color: Color,
    realization: Realization<ObstacleBody>,
}

impl Wall {
    pub fn new(position: Position, width: f64, height: f64, color: Color) -> Self {
        Self {
            position,
            width,
            height,
            color,
            realization: Realization::Defined,
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn create_shape(&mut self, scale: Scale, physics: &mut PhysicsWorld) -> Result<(), SimulationError> {
        if self.realization.is_realized() {
            return Err(SimulationError::AlreadyRealized);
        }

        let body = physics.insert_body(
            Pose::new(scale.scale_position(self.position), Angle::default()),
            BodyKind::Fixed,
        );
        physics.insert_collider(
            body,
            ColliderKind::Cuboid {
                offset: Position::default(),
                x_length: scale.scale(self.width),
                y_length: scale.scale(self.height),
                sensor: false,
            },
        );
        self.realization = Realization::Realized(ObstacleBody { body, scale });
        Ok(())
    }

    fn shape(&self) -> Option<Shape> {
        self.realization.get().ok().map(|realized| Shape::Rectangle {
            position: realized.scale.scale_position(self.position),
            x_length: realized.scale.scale(self.width),
            y_length: realized.scale.scale(self.height),
            angle: Angle::default(),
        })
    }
}
