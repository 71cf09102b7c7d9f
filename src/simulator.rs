//! Simulation of the robots on the board.
//!
//! The world advances by one fixed timestep per `FixedUpdate` run: wheel speeds drive the
//! chassis, the physics engine resolves collisions with obstacles, then every sensor measures.

use std::time::Duration;

use bevy::prelude::*;

use crate::resource::WorldRes;

pub struct Simulator {
    pub timestep: Duration,
}

impl Plugin for Simulator {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_duration(self.timestep))
            .add_systems(FixedUpdate, simulate);
    }
}

fn simulate(mut world: ResMut<WorldRes>) {
    if let Err(error) = world.tick() {
        warn!(%error, "simulation tick failed");
    }
}
