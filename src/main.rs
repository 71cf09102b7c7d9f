use std::{env, process::ExitCode};

use bevy::{prelude::*, window::WindowResolution};

use crate::{
    config::{ConfigError, SimulatorConfig},
    resource::{ViewRes, WorldRes},
};


mod config;
mod controller;
mod domain;
mod resource;
mod simulator;
mod sound;
mod visualizer;

fn main() -> ExitCode {
    let (config, world, view) = match load() {
        Ok(loaded) => loaded,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: config.screen.title.clone(),
                resolution: WindowResolution::new(
                    view.viewport.width as f32,
                    view.viewport.height as f32,
                ),
                resizable: false,
                ..default()
            }),
            ..default()
        }))
        .insert_resource(WorldRes::from(world))
        .insert_resource(view)
        .add_plugins(controller::Controller {
            startup_sound: config.exec.startup_sound.clone(),
        })
        .add_plugins(visualizer::Visualizer)
        .add_plugins(simulator::Simulator {
            timestep: config.timestep(),
        })
        .run();

    ExitCode::SUCCESS
}

/// Reads the configuration given as first argument, or the built-in one, and realizes its world.
fn load() -> Result<(SimulatorConfig, domain::World, ViewRes), ConfigError> {
    let config = match env::args_os().nth(1) {
        Some(path) => SimulatorConfig::load(path)?,
        None => SimulatorConfig::builtin()?,
    };
    let (scale, viewport) = config.viewport()?;
    let mut world = config.build_world()?;
    world.realize(scale)?;
    Ok((config, world, ViewRes { scale, viewport }))
}
