//! 2D visualization.
//!
//! Render coordinates are the scaled simulation coordinates: the board's origin is the window's
//! bottom-left corner and the sidebar occupies the window's right edge.

use std::collections::BTreeMap;

use bevy::{
    app::AppExit,
    prelude::*,
    sprite::{MaterialMesh2dBundle, Mesh2dHandle},
};

use crate::{
    controller::to_logical_distance,
    domain::{self, BodyPart, Obstacle, ObstacleId, Part, Pose, RobotId, SensorValue, World},
    resource::{SoundRes, ViewRes, WorldRes},
    sound::SoundCommand,
};

pub struct Visualizer;

impl Plugin for Visualizer {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, set_up)
            .add_systems(
                Update,
                (
                    handle_keyboard_input,
                    collect_sounds,
                    (update_parts, update_obstacles, update_text),
                )
                    .chain(),
            )
            .insert_resource(ClearColor(Color::rgb(0.15, 0.15, 0.17)))
            .insert_resource(Scene {
                show_text: true,
                ..default()
            });
    }
}

#[derive(Resource, Default)]
pub struct Scene {
    parts: BTreeMap<(RobotId, usize), Entity>,
    obstacles: BTreeMap<ObstacleId, Entity>,
    show_text: bool,
}

#[derive(Component)]
struct Sidebar;

const BOARD_COLOR: Color = Color::rgb(0.93, 0.93, 0.9);
const BRICK_COLOR: Color = Color::rgb(0.78, 0.78, 0.74);
const WHEEL_COLOR: Color = Color::rgb(0.1, 0.1, 0.1);
const TOUCH_SENSOR_COLOR: Color = Color::rgb(0.95, 0.6, 0.1);
const TOUCH_SENSOR_PRESSED_COLOR: Color = Color::rgb(0.9, 0.1, 0.1);
const ULTRASONIC_SENSOR_COLOR: Color = Color::rgb(0.1, 0.55, 0.55);

fn set_up(
    mut scene: ResMut<Scene>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<ColorMaterial>>,
    world: Res<WorldRes>,
    view: Res<ViewRes>,
) {
    create_camera(&view, &mut commands);
    create_board(&world, &view, &mut commands);
    for (idx, obstacle) in world.obstacles().iter().enumerate() {
        let entity = create_obstacle(obstacle, &view, &mut commands, &mut meshes, &mut materials);
        scene.obstacles.insert(ObstacleId(idx), entity);
    }
    for robot in world.robots() {
        for (idx, part) in robot.parts().iter().enumerate() {
            let entity = create_part(part, &view, &mut commands);
            scene.parts.insert((robot.id(), idx), entity);
        }
    }
    create_text(&view, &mut commands);
}

fn create_camera(view: &ViewRes, commands: &mut Commands) {
    let mut camera = Camera2dBundle::default();
    camera.transform.translation.x = view.viewport.width as f32 / 2.0;
    camera.transform.translation.y = view.viewport.height as f32 / 2.0;
    commands.spawn(camera);
}

fn create_board(world: &World, view: &ViewRes, commands: &mut Commands) {
    let (width, height) = world.board_size();
    let size = Vec2::new(
        view.scale.scale(width) as f32,
        view.scale.scale(height) as f32,
    );
    commands.spawn(SpriteBundle {
        sprite: Sprite {
            color: BOARD_COLOR,
            custom_size: Some(size),
            ..default()
        },
        transform: Transform::from_xyz(size.x / 2.0, size.y / 2.0, 0.0),
        ..default()
    });
}

fn create_obstacle(
    obstacle: &Obstacle,
    view: &ViewRes,
    commands: &mut Commands,
    meshes: &mut ResMut<Assets<Mesh>>,
    materials: &mut ResMut<Assets<ColorMaterial>>,
) -> Entity {
    let domain::Color(r, g, b) = obstacle.color();
    let color = Color::rgb_u8(r, g, b);
    let position = view.scale.scale_position(obstacle.pos());
    let transform = Transform::from_xyz(position.x() as f32, position.y() as f32, 0.5);

    match obstacle {
        Obstacle::Bottle(bottle) => commands
            .spawn(MaterialMesh2dBundle {
                mesh: Mesh2dHandle(
                    meshes.add(Circle::new(view.scale.scale(bottle.radius()) as f32)),
                ),
                material: materials.add(ColorMaterial::from(color)),
                transform,
                ..default()
            })
            .id(),
        Obstacle::Wall(wall) => commands
            .spawn(SpriteBundle {
                sprite: Sprite {
                    color,
                    custom_size: Some(Vec2::new(
                        view.scale.scale(wall.width()) as f32,
                        view.scale.scale(wall.height()) as f32,
                    )),
                    ..default()
                },
                transform,
                ..default()
            })
            .id(),
    }
}

fn create_part(part: &Part, view: &ViewRes, commands: &mut Commands) -> Entity {
    let size = part.frame().size();
    let (color, z) = match part {
        Part::Brick(_) => (BRICK_COLOR, 1.0),
        Part::Wheel(_) => (WHEEL_COLOR, 1.1),
        Part::UltrasonicSensor(_) => (ULTRASONIC_SENSOR_COLOR, 1.2),
        Part::TouchSensor(_) => (TOUCH_SENSOR_COLOR, 1.3),
    };

    commands
        .spawn(SpriteBundle {
            sprite: Sprite {
                color,
                custom_size: Some(Vec2::new(
                    view.scale.scale(size.width) as f32,
                    view.scale.scale(size.height) as f32,
                )),
                ..default()
            },
            transform: part.pose().map_or(Transform::from_xyz(0.0, 0.0, z), |pose| {
                to_transform(pose, z)
            }),
            ..default()
        })
        .id()
}

fn create_text(view: &ViewRes, commands: &mut Commands) {
    let text_style = TextStyle {
        font_size: 18.0,
        color: Color::WHITE,
        ..default()
    };
    commands.spawn((
        TextBundle::from_section("", text_style).with_style(Style {
            position_type: PositionType::Absolute,
            top: Val::Px(12.0),
            left: Val::Px((view.viewport.width - view.viewport.side_bar_width) as f32 + 12.0),
            ..default()
        }),
        Sidebar,
    ));
}

fn update_parts(
    scene: Res<Scene>,
    mut sprites: Query<(&mut Transform, &mut Sprite)>,
    world: Res<WorldRes>,
) {
    for robot in world.robots() {
        for (idx, part) in robot.parts().iter().enumerate() {
            let Some(entity) = scene.parts.get(&(robot.id(), idx)) else {
                continue;
            };
            let Ok((mut transform, mut sprite)) = sprites.get_mut(*entity) else {
                continue;
            };

            if let Some(pose) = part.pose() {
                *transform = to_transform(pose, transform.translation.z);
            }
            if let Part::TouchSensor(sensor) = part {
                sprite.color = if sensor.latest_value() {
                    TOUCH_SENSOR_PRESSED_COLOR
                } else {
                    TOUCH_SENSOR_COLOR
                };
            }
        }
    }
}

fn update_obstacles(
    scene: Res<Scene>,
    mut transforms: Query<&mut Transform>,
    world: Res<WorldRes>,
    view: Res<ViewRes>,
) {
    for (idx, obstacle) in world.obstacles().iter().enumerate() {
        if !matches!(obstacle, Obstacle::Bottle(_)) {
            continue;
        }
        let Some(entity) = scene.obstacles.get(&ObstacleId(idx)) else {
            continue;
        };
        if let Ok(mut transform) = transforms.get_mut(*entity) {
            let position = view.scale.scale_position(obstacle.pos());
            transform.translation.x = position.x() as f32;
            transform.translation.y = position.y() as f32;
        }
    }
}

fn collect_sounds(mut sound: ResMut<SoundRes>) {
    sound.collect();
}

fn update_text(
    mut text: Query<&mut Text, With<Sidebar>>,
    scene: Res<Scene>,
    world: Res<WorldRes>,
    sound: Res<SoundRes>,
) {
    let Ok(mut text) = text.get_single_mut() else {
        return;
    };
    text.sections[0].value = if scene.show_text {
        sidebar_text(&world, sound.recent())
    } else {
        String::new()
    };
}

/// Tick count, pose and sensor values per robot, then the most recent sounds.
fn sidebar_text<'a>(world: &World, sounds: impl Iterator<Item = &'a SoundCommand>) -> String {
    let readings = world.readings();
    let mut lines = vec![format!("tick: {}", world.ticks())];
    for robot in world.robots() {
        lines.push(robot.name().to_string());
        if let Some(pose) = robot.logical_pose(world.physics()) {
            lines.push(format!(
                "  position: ({:.1}, {:.1}) heading: {:.0}",
                pose.position.x(),
                pose.position.y(),
                pose.angle.to_deg()
            ));
        }
        for reading in readings.iter().filter(|reading| reading.robot == robot.id()) {
            let value = match reading.value {
                SensorValue::Touch(_) => reading.value.to_string(),
                SensorValue::Distance(distance) => {
                    let distance = world
                        .scale()
                        .map_or(distance, |scale| to_logical_distance(distance, scale));
                    format!("{distance:.1}")
                }
            };
            match robot.part(&reading.address) {
                Ok(Part::TouchSensor(sensor)) => {
                    lines.push(format!("  {} ({}): {value}", reading.address, sensor.side()))
                }
                _ => lines.push(format!("  {}: {value}", reading.address)),
            }
        }
    }

    let sounds = sounds
        .map(|command| format!("  {}", command.message))
        .collect::<Vec<_>>();
    if !sounds.is_empty() {
        lines.push(String::new());
        lines.push("Sound".to_string());
        lines.extend(sounds);
    }
    lines.join("\n")
}

fn handle_keyboard_input(
    keys: Res<ButtonInput<KeyCode>>,
    mut scene: ResMut<Scene>,
    mut world: ResMut<WorldRes>,
    mut exit: EventWriter<AppExit>,
) {
    if keys.just_pressed(KeyCode::KeyR) {
        if let Err(error) = world.reset() {
            warn!(%error, "failed to reset the world");
        }
    }

    if keys.just_pressed(KeyCode::KeyT) {
        scene.show_text = !scene.show_text;
    }

    if keys.just_pressed(KeyCode::KeyQ) {
        exit.send(AppExit);
    }
}

fn to_transform(pose: Pose, z: f32) -> Transform {
    Transform::from_xyz(pose.position.x() as f32, pose.position.y() as f32, z).with_rotation(Quat::from_rotation_z(f32::from(pose.angle)))
}
