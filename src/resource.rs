//! The resource module encapsulates domain entities for use with Bevy.

use std::{
    collections::VecDeque,
    ops::{Deref, DerefMut},
};

use bevy::ecs::system::Resource;
use crossbeam::channel::Receiver;

use crate::{
    domain::{self, Scale, Viewport},
    sound::SoundCommand,
};

#[derive(Resource)]
pub struct WorldRes(domain::World);

impl Deref for WorldRes {
    type Target = domain::World;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for WorldRes {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<domain::World> for WorldRes {
    fn from(value: domain::World) -> Self {
        Self(value)
    }
}

/// Scale of the run and the window it is rendered into.
#[derive(Resource, Clone, Copy, Debug)]
pub struct ViewRes {
    pub scale: Scale,
    pub viewport: Viewport,
}

/// Sound announcements, most recent last.
#[derive(Resource)]
pub struct SoundRes {
    commands: Receiver<SoundCommand>,
    recent: VecDeque<SoundCommand>,
}

impl SoundRes {
    const RECENT: usize = 5;

    /// Moves pending announcements into the recent list.
    pub fn collect(&mut self) {
        for command in self.commands.try_iter() {
            if self.recent.len() == Self::RECENT {
                self.recent.pop_front();
            }
            self.recent.push_back(command);
        }
    }

    pub fn recent(&self) -> impl Iterator<Item = &SoundCommand> {
        self.recent.iter()
    }
}

impl From<Receiver<SoundCommand>> for SoundRes {
    fn from(value: Receiver<SoundCommand>) -> Self {
        Self {
            commands: value,
            recent: VecDeque::with_capacity(Self::RECENT),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sound::SoundKind;

    #[test]
    fn test_sound_res_keeps_most_recent() {
        let (sender, receiver) = crossbeam::channel::unbounded();
        let mut sound = SoundRes::from(receiver);
        for i in 0..7 {
            sender
                .send(SoundCommand {
                    message: format!("saying: {i}"),
                    duration: Duration::ZERO,
                    kind: SoundKind::Speak,
                })
                .unwrap();
        }
        sound.collect();
        assert_eq!(
            sound
                .recent()
                .map(|command| command.message.as_str())
                .collect::<Vec<_>>(),
            vec!["saying: 2", "saying: 3", "saying: 4", "saying: 5", "saying: 6"]
        );
    }
}
