//! Rigid-body space backing the simulation.
//!
//! The rest of the domain only relies on body and collider creation, pose and velocity access, a
//! fixed-timestep `step`, and the first shape hit along a segment. Everything engine-specific
//! stays in this module; coordinates entering and leaving it are already scaled.

use std::time::Duration;

use rapier2d::{
    math::{Isometry, Real},
    prelude::*,
};

use super::{Angle, Pose, Position};

pub use rapier2d::prelude::{ColliderHandle, RigidBodyHandle};

pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
}

/// How a body reacts to the simulation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BodyKind {
    /// Integrated by the engine; velocities decay with the given damping.
    Dynamic { damping: f64 },
    /// Never moves.
    Fixed,
}

/// Collider geometry and material, in scaled units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColliderKind {
    /// Rectangle attached at `offset` in the body's frame. Sensor colliders report overlaps to
    /// queries but never push other bodies.
    Cuboid {
        offset: Position,
        x_length: f64,
        y_length: f64,
        sensor: bool,
    },
    Ball {
        radius: f64,
        mass: f64,
        friction: f64,
    },
}

impl PhysicsWorld {
    /// Top-down world without gravity, advanced by `timestep` on every [`PhysicsWorld::step`].
    pub fn new(timestep: Duration) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = timestep.as_secs_f64() as Real;

        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, 0.0],
            integration_parameters,
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    /// Advances the world by one timestep. Queries observe the world as of the last step.
    pub fn step(&mut self) {
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    pub fn insert_body(&mut self, pose: Pose, kind: BodyKind) -> RigidBodyHandle {
        let builder = match kind {
            BodyKind::Dynamic { damping } => RigidBodyBuilder::dynamic()
                .linear_damping(damping as Real)
                .angular_damping(damping as Real),
            BodyKind::Fixed => RigidBodyBuilder::fixed(),
        };
        self.bodies.insert(builder.position(to_isometry(pose)).build())
    }

    pub fn insert_collider(&mut self, body: RigidBodyHandle, kind: ColliderKind) -> ColliderHandle {
        let collider = match kind {
            ColliderKind::Cuboid {
                offset,
                x_length,
                y_length,
                sensor,
            } => ColliderBuilder::cuboid((x_length / 2.0) as Real, (y_length / 2.0) as Real)
                .translation(vector![offset.x() as Real, offset.y() as Real])
                .sensor(sensor)
                .build(),
            ColliderKind::Ball {
                radius,
                mass,
                friction,
            } => ColliderBuilder::ball(radius as Real)
                .mass(mass as Real)
                .friction(friction as Real)
                .build(),
        };
        self.colliders
            .insert_with_parent(collider, body, &mut self.bodies)
    }

    /// Removes a body together with every collider attached to it.
    pub fn remove_body(&mut self, body: RigidBodyHandle) {
        self.bodies.remove(
            body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    pub fn body_pose(&self, body: RigidBodyHandle) -> Option<Pose> {
        self.bodies.get(body).map(|b| from_isometry(b.position()))
    }

    pub fn collider_pose(&self, collider: ColliderHandle) -> Option<Pose> {
        self.colliders.get(collider).map(|c| from_isometry(c.position()))
    }

    pub fn set_body_pose(&mut self, body: RigidBodyHandle, pose: Pose) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.set_position(to_isometry(pose), true);
        }
    }

    pub fn set_body_velocity(&mut self, body: RigidBodyHandle, linvel: Position, angvel: f64) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.set_linvel(vector![linvel.x() as Real, linvel.y() as Real], true);
            b.set_angvel(angvel as Real, true);
        }
    }

    /// First point where the segment `from -> to` enters a solid collider, ignoring every
    /// collider attached to `exclude`. Sensor colliders are transparent. A segment starting
    /// inside a collider hits at `from`.
    pub fn segment_query_first(
        &self,
        from: Position,
        to: Position,
        exclude: Option<RigidBodyHandle>,
    ) -> Option<Position> {
        let direction = to - from;
        let ray = Ray::new(
            point![from.x() as Real, from.y() as Real],
            vector![direction.x() as Real, direction.y() as Real],
        );
        let filter = match exclude {
            Some(body) => QueryFilter::default().exclude_sensors().exclude_rigid_body(body),
            None => QueryFilter::default().exclude_sensors(),
        };

        self.query_pipeline
            .cast_ray(&self.bodies, &self.colliders, &ray, 1.0, true, filter)
            .map(|(_, toi)| {
                let hit = ray.point_at(toi);
                Position::new(hit.x as f64, hit.y as f64)
            })
    }
}

fn to_isometry(pose: Pose) -> Isometry<Real> {
    Isometry::new(
        vector![pose.position.x() as Real, pose.position.y() as Real],
        f64::from(pose.angle) as Real,
    )
}

fn from_isometry(isometry: &Isometry<Real>) -> Pose {
    Pose::new(
        Position::new(
            isometry.translation.vector.x as f64,
            isometry.translation.vector.y as f64,
        ),
        Angle::new(isometry.rotation.angle() as f64),
    )
}
