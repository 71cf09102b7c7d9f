//! Controller driving the first robot.
//!
//! The robot is controlled by either the demo control program or the keyboard. The demo program
//! runs on its own thread, reads sensor values and sets motor powers through a [`ControlLink`],
//! and takes control if no arrow key has been pressed for a few seconds.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicI8, AtomicU32, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use bevy::{app::AppExit, prelude::*};

use crate::{
    domain::{BodyPart, Part, RobotId, Scale, SensorValue, Velocity, World, NO_ECHO},
    resource::{SoundRes, ViewRes, WorldRes},
    sound::{PlayType, Playback, SoundConnector},
};

/// Logical units per second at one percent motor power.
const POWER_TO_SPEED_FACTOR: f64 = 3.0;
const KEYBOARD_TIMEOUT: Duration = Duration::from_secs(3);
const CONTROL_PERIOD: Duration = Duration::from_millis(50);

/// State shared between the simulation and a control program.
pub struct ControlLink {
    left_power: AtomicI8,
    right_power: AtomicI8,
    touched: AtomicBool,
    /// Bits of an `f32` distance in logical units.
    distance: AtomicU32,
    stopped: AtomicBool,
}

impl Default for ControlLink {
    fn default() -> Self {
        Self {
            left_power: AtomicI8::new(0),
            right_power: AtomicI8::new(0),
            touched: AtomicBool::new(false),
            distance: AtomicU32::new((NO_ECHO as f32).to_bits()),
            stopped: AtomicBool::new(false),
        }
    }
}

impl ControlLink {
    /// Motor powers in percent, left and right.
    pub fn power(&self) -> (i8, i8) {
        (
            self.left_power.load(Ordering::Relaxed),
            self.right_power.load(Ordering::Relaxed),
        )
    }

    pub fn set_power(&self, left: i8, right: i8) {
        self.left_power
            .store(left.clamp(-100, 100), Ordering::Relaxed);
        self.right_power
            .store(right.clamp(-100, 100), Ordering::Relaxed);
    }

    pub fn touched(&self) -> bool {
        self.touched.load(Ordering::Relaxed)
    }

    /// Distance in logical units, `-1` when nothing was detected.
    pub fn distance(&self) -> f64 {
        f32::from_bits(self.distance.load(Ordering::Relaxed)) as f64
    }

    pub fn publish(&self, touched: bool, distance: f64) {
        self.touched.store(touched, Ordering::Relaxed);
        self.distance
            .store((distance as f32).to_bits(), Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

/// Motor speed in logical units per second for a power in percent.
pub fn power_to_speed(power: i8) -> Velocity {
    Velocity::new(power as f64 * POWER_TO_SPEED_FACTOR)
}

/// Ultrasonic reading in logical units. The no-echo sentinel passes unchanged.
pub fn to_logical_distance(distance: f64, scale: Scale) -> f64 {
    if distance == NO_ECHO {
        NO_ECHO
    } else {
        scale.unscale(distance)
    }
}

/// Motor powers for the pressed arrow keys, or `None` if none is pressed.
pub fn keyboard_power(up: bool, down: bool, left: bool, right: bool) -> Option<(i8, i8)> {
    if !(up || down || left || right) {
        return None;
    }
    let forward = i16::from(up) - i16::from(down);
    let turn = i16::from(right) - i16::from(left);
    let power = |value: i16| value.clamp(-100, 100) as i8;
    Some((
        power(forward * 60 + turn * 40),
        power(forward * 60 - turn * 40),
    ))
}

/// Autonomous demo: cruise, turn away from close obstacles, back off and beep on contact.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Demo {
    #[default]
    Cruise,
    /// Control periods left, the current one included.
    Reverse(u32),
    Turn(u32),
}

/// What the demo asks for during one control period.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DemoOutput {
    pub power: (i8, i8),
    pub beep: bool,
}

impl Demo {
    const CRUISE_POWER: i8 = 50;
    const TURN_POWER: i8 = 30;
    const REVERSE_PERIODS: u32 = 12;
    const TURN_PERIODS: u32 = 8;
    /// Logical distance below which the demo turns away.
    const CLEARANCE: f64 = 150.0;

    pub fn step(&mut self, touched: bool, distance: f64) -> DemoOutput {
        let mut beep = false;
        *self = match *self {
            Demo::Cruise | Demo::Turn(_) if touched => {
                beep = true;
                Demo::Reverse(Self::REVERSE_PERIODS)
            }
            Demo::Reverse(n) if n > 1 => Demo::Reverse(n - 1),
            Demo::Reverse(_) => Demo::Turn(Self::TURN_PERIODS),
            Demo::Turn(n) if n > 1 => Demo::Turn(n - 1),
            Demo::Turn(_) => Demo::Cruise,
            Demo::Cruise if (0.0..Self::CLEARANCE).contains(&distance) => Demo::Turn(1),
            Demo::Cruise => Demo::Cruise,
        };

        let power = match *self {
            Demo::Cruise => (Self::CRUISE_POWER, Self::CRUISE_POWER),
            Demo::Reverse(_) => (-Self::TURN_POWER, -Self::TURN_POWER),
            Demo::Turn(_) => (Self::TURN_POWER, -Self::TURN_POWER),
        };
        DemoOutput { power, beep }
    }
}

/// Addresses of the controlled robot's parts.
#[derive(Resource, Clone, Debug, Default, PartialEq)]
pub struct Binding {
    robot: RobotId,
    left_motor: Option<String>,
    right_motor: Option<String>,
    touch_sensors: Vec<String>,
    ultrasonic_sensor: Option<String>,
}

impl Binding {
    /// Wheels ordered by lateral offset, first touch and ultrasonic sensors found.
    pub fn new(world: &World, robot: RobotId) -> Self {
        let mut binding = Binding {
            robot,
            ..default()
        };
        let Ok(robot) = world.robot(robot) else {
            return binding;
        };

        let mut wheels = vec![];
        for part in robot.parts() {
            match part {
                Part::Wheel(wheel) => {
                    wheels.push((wheel.frame().offset().x(), part.address().to_string()))
                }
                Part::TouchSensor(_) => binding.touch_sensors.push(part.address().to_string()),
                Part::UltrasonicSensor(_) if binding.ultrasonic_sensor.is_none() => {
                    binding.ultrasonic_sensor = Some(part.address().to_string())
                }
                _ => {}
            }
        }
        if let [left, right] = wheels.as_mut_slice() {
            if left.0 > right.0 {
                std::mem::swap(left, right);
            }
            binding.left_motor = Some(left.1.clone());
            binding.right_motor = Some(right.1.clone());
        }
        binding
    }
}

#[derive(Resource)]
struct LinkRes(Arc<ControlLink>);

#[derive(Resource)]
struct SoundConnectorRes(SoundConnector);

#[derive(Resource, Default)]
struct DemoThread(Option<JoinHandle<()>>);

#[derive(Resource)]
struct StartupSound(Option<PathBuf>);

pub struct Controller {
    /// Played by the demo program when it starts.
    pub startup_sound: Option<PathBuf>,
}

impl Plugin for Controller {
    fn build(&self, app: &mut App) {
        let (connector, commands) = SoundConnector::new();

        app.insert_resource(LinkRes(Arc::new(ControlLink::default())))
            .insert_resource(SoundConnectorRes(connector))
            .insert_resource(SoundRes::from(commands))
            .insert_resource(StartupSound(self.startup_sound.clone()))
            .init_resource::<DemoThread>()
            .add_systems(Startup, spawn)
            .add_systems(Update, control)
            .add_systems(Last, shut_down);
    }
}

fn spawn(
    mut commands: Commands,
    world: Res<WorldRes>,
    link: Res<LinkRes>,
    sound: Res<SoundConnectorRes>,
    startup_sound: Res<StartupSound>,
) {
    commands.insert_resource(Binding::new(&world, RobotId(0)));

    let link = Arc::clone(&link.0);
    let sound = sound.0.clone();
    let startup_sound = startup_sound.0.clone();
    let handle = thread::spawn(move || run_demo(&link, &sound, startup_sound));
    commands.insert_resource(DemoThread(Some(handle)));
}

/// Stops the demo program and waits for it once the app is exiting.
fn shut_down(mut exits: EventReader<AppExit>, link: Res<LinkRes>, mut demo: ResMut<DemoThread>) {
    if exits.read().last().is_none() {
        return;
    }
    link.0.stop();
    if let Some(handle) = demo.0.take() {
        if handle.join().is_err() {
            warn!("demo program panicked");
        }
    }
}

fn run_demo(link: &ControlLink, sound: &SoundConnector, startup_sound: Option<PathBuf>) {
    let mut demo = Demo::default();
    match startup_sound {
        Some(path) => {
            if let Err(error) = sound.play_file(&path, PlayType::NoWaitForComplete) {
                warn!(%error, "failed to play the startup sound");
            }
        }
        None => {
            sound.speak("ready", PlayType::NoWaitForComplete);
        }
    }

    let mut beep: Option<Playback> = None;
    while !link.is_stopped() {
        let output = demo.step(link.touched(), link.distance());
        link.set_power(output.power.0, output.power.1);
        if output.beep && beep.as_ref().map_or(true, Playback::is_finished) {
            beep = Some(sound.tone(880.0, Duration::from_millis(150), PlayType::NoWaitForComplete));
        }
        thread::sleep(CONTROL_PERIOD);
    }
}

fn control(
    keys: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    mut last_key_press: Local<Option<Duration>>,
    link: Res<LinkRes>,
    binding: Option<Res<Binding>>,
    view: Res<ViewRes>,
    mut world: ResMut<WorldRes>,
) {
    let Some(binding) = binding else {
        return;
    };

    let keyboard = keyboard_power(
        keys.pressed(KeyCode::ArrowUp),
        keys.pressed(KeyCode::ArrowDown),
        keys.pressed(KeyCode::ArrowLeft),
        keys.pressed(KeyCode::ArrowRight),
    );
    if keyboard.is_some() {
        *last_key_press = Some(time.elapsed());
    }
    let keyboard_active = last_key_press
        .is_some_and(|pressed| time.elapsed() - pressed < KEYBOARD_TIMEOUT);

    let (left, right) = match keyboard {
        Some(power) => power,
        None if keyboard_active => (0, 0),
        None => link.0.power(),
    };

    for (address, power) in [(&binding.left_motor, left), (&binding.right_motor, right)] {
        if let Some(address) = address {
            if let Err(error) = world.set_motor_speed(binding.robot, address, power_to_speed(power)) {
                warn!(%error, "failed to set motor speed");
            }
        }
    }

    let touched = binding.touch_sensors.iter().any(|address| {
        world.latest_value(binding.robot, address) == Ok(SensorValue::Touch(true))
    });
    let distance = match binding
        .ultrasonic_sensor
        .as_deref()
        .map(|address| world.latest_value(binding.robot, address))
    {
        Some(Ok(SensorValue::Distance(distance))) => to_logical_distance(distance, view.scale),
        _ => NO_ECHO,
    };
    link.0.publish(touched, distance);
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::config::SimulatorConfig;

    #[rstest]
    #[case::none(false, false, false, false, None)]
    #[case::forward(true, false, false, false, Some((60, 60)))]
    #[case::backward(false, true, false, false, Some((-60, -60)))]
    #[case::left(false, false, true, false, Some((-40, 40)))]
    #[case::right(false, false, false, true, Some((40, -40)))]
    #[case::forward_right(true, false, false, true, Some((100, 20)))]
    #[case::opposite(true, true, false, false, Some((0, 0)))]
    fn test_keyboard_power(
        #[case] up: bool,
        #[case] down: bool,
        #[case] left: bool,
        #[case] right: bool,
        #[case] expected: Option<(i8, i8)>,
    ) {
        assert_eq!(keyboard_power(up, down, left, right), expected);
    }

    #[rstest]
    #[case(NO_ECHO, 3.0, NO_ECHO)]
    #[case(112.5, 3.0, 37.5)]
    #[case(-3.0, 2.0, -1.5)]
    #[case(0.0, 0.5, 0.0)]
    fn test_to_logical_distance(#[case] distance: f64, #[case] factor: f64, #[case] expected: f64) {
        assert_eq!(
            to_logical_distance(distance, Scale::new(factor).unwrap()),
            expected
        );
    }

    #[test]
    fn test_power_to_speed() {
        assert_eq!(power_to_speed(50), Velocity::new(150.0));
        assert_eq!(power_to_speed(-100), Velocity::new(-300.0));
    }

    #[test]
    fn test_control_link() {
        let link = ControlLink::default();
        assert_eq!(link.distance(), NO_ECHO);
        assert!(!link.touched());

        link.set_power(-128, 127);
        assert_eq!(link.power(), (-100, 100));

        link.publish(true, 37.5);
        assert!(link.touched());
        assert_eq!(link.distance(), 37.5);

        assert!(!link.is_stopped());
        link.stop();
        assert!(link.is_stopped());
    }

    #[test]
    fn test_exit_stops_demo_program() {
        let link = Arc::new(ControlLink::default());
        let (connector, commands) = SoundConnector::new();
        let handle = {
            let link = Arc::clone(&link);
            thread::spawn(move || run_demo(&link, &connector, None))
        };

        let mut app = App::new();
        app.add_event::<AppExit>()
            .insert_resource(LinkRes(Arc::clone(&link)))
            .insert_resource(DemoThread(Some(handle)))
            .add_systems(Last, shut_down);

        app.update();
        assert!(!link.is_stopped());
        assert!(app.world.resource::<DemoThread>().0.is_some());

        app.world.send_event(AppExit);
        app.update();
        assert!(link.is_stopped());
        assert!(app.world.resource::<DemoThread>().0.is_none());
        assert_eq!(commands.recv().unwrap().message, "saying: ready");
    }

    #[test]
    fn test_demo_program_plays_startup_sound() {
        let link = ControlLink::default();
        link.stop();
        let (connector, commands) = SoundConnector::new();
        run_demo(&link, &connector, Some(PathBuf::from("does/not/exist.wav")));
        assert_eq!(commands.try_iter().count(), 0);

        run_demo(&link, &connector, None);
        assert_eq!(commands.recv().unwrap().message, "saying: ready");
    }

    #[test]
    fn test_demo_cruises_on_open_board() {
        let mut demo = Demo::default();
        for distance in [NO_ECHO, 500.0, Demo::CLEARANCE] {
            assert_eq!(
                demo.step(false, distance),
                DemoOutput {
                    power: (50, 50),
                    beep: false,
                }
            );
        }
    }

    #[test]
    fn test_demo_turns_away_from_close_obstacle() {
        let mut demo = Demo::default();
        let output = demo.step(false, 80.0);
        assert_eq!(output.power, (30, -30));
        assert_eq!(demo, Demo::Turn(1));
        assert_eq!(demo.step(false, 80.0).power, (50, 50));
    }

    #[test]
    fn test_demo_backs_off_after_contact() {
        let mut demo = Demo::default();
        let output = demo.step(true, NO_ECHO);
        assert_eq!(
            output,
            DemoOutput {
                power: (-30, -30),
                beep: true,
            }
        );

        let mut powers = vec![output.power];
        while demo != Demo::Cruise {
            let output = demo.step(false, NO_ECHO);
            assert!(!output.beep);
            powers.push(output.power);
        }
        let reversing = powers.iter().filter(|power| **power == (-30, -30)).count();
        let turning = powers.iter().filter(|power| **power == (30, -30)).count();
        assert_eq!(
            (reversing, turning),
            (Demo::REVERSE_PERIODS as usize, Demo::TURN_PERIODS as usize)
        );
    }

    #[test]
    fn test_binding_from_builtin_config() {
        let world = SimulatorConfig::builtin().unwrap().build_world().unwrap();
        assert_eq!(
            Binding::new(&world, RobotId(0)),
            Binding {
                robot: RobotId(0),
                left_motor: Some("ev3-ports:outA".to_string()),
                right_motor: Some("ev3-ports:outD".to_string()),
                touch_sensors: vec![
                    "ev3-ports:in1".to_string(),
                    "ev3-ports:in2".to_string(),
                    "ev3-ports:in3".to_string(),
                ],
                ultrasonic_sensor: Some("ev3-ports:in4".to_string()),
            }
        );
        assert_eq!(Binding::new(&world, RobotId(4)).left_motor, None);
    }
}
