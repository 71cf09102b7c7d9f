//! Simulated sound output of the brick.
//!
//! No audio is produced. Every request is announced as a [`SoundCommand`] for the sidebar and
//! takes as long as the real sound would, on a worker thread, so that control programs observe
//! the same blocking behavior as on the brick.

use std::{
    fs, io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use thiserror::Error;
use tracing::debug;

/// Speaking rate used to estimate how long a text takes to say.
const WORDS_PER_MINUTE: f64 = 200.0;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlayType {
    /// Return once the sound has finished.
    WaitForComplete,
    /// Return immediately.
    NoWaitForComplete,
    /// Return immediately and repeat until [`Playback::stop`] or until the playback is dropped.
    Loop,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SoundKind {
    Note,
    Speak,
    File,
}

#[derive(Error, Debug)]
pub enum SoundError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not a PCM WAV file", path.display())]
    InvalidWav { path: PathBuf },
}

/// Announcement of a sound that starts playing.
#[derive(Clone, Debug, PartialEq)]
pub struct SoundCommand {
    pub message: String,
    pub duration: Duration,
    pub kind: SoundKind,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tone {
    pub frequency: f64,
    pub duration: Duration,
    /// Silence after the tone.
    pub delay: Duration,
}

impl Tone {
    pub fn new(frequency: f64, duration: Duration, delay: Duration) -> Self {
        Self {
            frequency,
            duration,
            delay,
        }
    }
}

/// Time needed to say `text`.
pub fn speech_duration(text: &str) -> Duration {
    let words = text.split_whitespace().count() as f64;
    Duration::from_secs_f64(words / WORDS_PER_MINUTE * 60.0)
}

/// Playing time of a RIFF/WAVE file: size of the `data` chunk over the byte rate from `fmt `.
pub fn wav_duration(bytes: &[u8]) -> Option<Duration> {
    if bytes.get(..4)? != b"RIFF" || bytes.get(8..12)? != b"WAVE" {
        return None;
    }

    let mut byte_rate = None;
    let mut chunks = bytes.get(12..)?;
    while chunks.len() >= 8 {
        let size = le_u32(&chunks[4..])? as usize;
        let body = &chunks[8..];
        match &chunks[..4] {
            b"fmt " => byte_rate = body.get(8..).and_then(le_u32),
            b"data" => {
                let byte_rate = byte_rate.filter(|rate| *rate > 0)?;
                return Some(Duration::from_secs_f64(size as f64 / byte_rate as f64));
            }
            _ => {}
        }
        // Chunks are padded to an even length.
        chunks = body.get(size.checked_add(size % 2)?..)?;
    }
    None
}

fn le_u32(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(..4)?.try_into().ok()?))
}

#[derive(Clone)]
pub struct SoundConnector {
    commands: Sender<SoundCommand>,
}

impl SoundConnector {
    /// Connector and the receiving end of its announcements.
    pub fn new() -> (Self, Receiver<SoundCommand>) {
        let (commands, receiver) = unbounded();
        (Self { commands }, receiver)
    }

    /// Plays the tones one after another.
    pub fn beep(&self, tones: &[Tone], play_type: PlayType) -> Playback {
        let segments = tones
            .iter()
            .map(|tone| Segment {
                command: SoundCommand {
                    message: format!("playing note with frequency: {}", tone.frequency),
                    duration: tone.duration,
                    kind: SoundKind::Note,
                },
                pause: tone.delay,
            })
            .collect();
        self.play(segments, play_type)
    }

    pub fn tone(&self, frequency: f64, duration: Duration, play_type: PlayType) -> Playback {
        self.beep(&[Tone::new(frequency, duration, Duration::ZERO)], play_type)
    }

    pub fn speak(&self, text: &str, play_type: PlayType) -> Playback {
        let segment = Segment {
            command: SoundCommand {
                message: format!("saying: {text}"),
                duration: speech_duration(text),
                kind: SoundKind::Speak,
            },
            pause: Duration::ZERO,
        };
        self.play(vec![segment], play_type)
    }

    /// Plays a WAV file for as long as its header says it lasts.
    pub fn play_file(&self, path: impl AsRef<Path>, play_type: PlayType) -> Result<Playback, SoundError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| SoundError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let duration = wav_duration(&bytes).ok_or_else(|| SoundError::InvalidWav {
            path: path.to_path_buf(),
        })?;

        let segment = Segment {
            command: SoundCommand {
                message: format!("playing file: {}", path.display()),
                duration,
                kind: SoundKind::File,
            },
            pause: Duration::ZERO,
        };
        Ok(self.play(vec![segment], play_type))
    }

    /// A loop of segments that take no time plays once.
    fn play(&self, segments: Vec<Segment>, play_type: PlayType) -> Playback {
        let (stop_sender, stop) = bounded(1);
        let (finished_sender, finished) = bounded::<()>(0);
        let commands = self.commands.clone();
        let looped = play_type == PlayType::Loop
            && segments
                .iter()
                .any(|segment| !(segment.command.duration + segment.pause).is_zero());

        thread::spawn(move || {
            let _finished = finished_sender;
            loop {
                for segment in &segments {
                    if stop_requested(&stop, looped) {
                        return;
                    }
                    debug!(message = %segment.command.message, "sound");
                    if commands.send(segment.command.clone()).is_err() {
                        return;
                    }
                    if pause(&stop, segment.command.duration, looped)
                        || pause(&stop, segment.pause, looped)
                    {
                        return;
                    }
                }
                if !looped {
                    return;
                }
            }
        });

        let playback = Playback {
            stop: stop_sender,
            finished,
        };
        if play_type == PlayType::WaitForComplete {
            playback.wait();
        }
        playback
    }
}

struct Segment {
    command: SoundCommand,
    pause: Duration,
}

/// Whether a stop was requested, or, for loops, the playback was dropped.
fn stop_requested(stop: &Receiver<()>, looped: bool) -> bool {
    match stop.try_recv() {
        Ok(()) => true,
        Err(TryRecvError::Empty) => false,
        Err(TryRecvError::Disconnected) => looped,
    }
}

/// Waits for `duration` unless asked to stop. Returns whether playback should stop.
fn pause(stop: &Receiver<()>, duration: Duration, looped: bool) -> bool {
    if duration.is_zero() {
        return stop_requested(stop, looped);
    }
    let started = Instant::now();
    match stop.recv_timeout(duration) {
        Ok(()) => true,
        Err(RecvTimeoutError::Timeout) => false,
        Err(RecvTimeoutError::Disconnected) if looped => true,
        Err(RecvTimeoutError::Disconnected) => {
            thread::sleep(duration.saturating_sub(started.elapsed()));
            false
        }
    }
}

/// Handle on a sound being played.
pub struct Playback {
    stop: Sender<()>,
    finished: Receiver<()>,
}

impl Playback {
    /// Blocks until the sound has finished.
    pub fn wait(&self) {
        let _ = self.finished.recv();
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.finished.try_recv(), Err(TryRecvError::Empty))
    }

    /// Ends the sound early.
    pub fn stop(&self) {
        let _ = self.stop.try_send(());
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    const SHORT: Duration = Duration::from_millis(20);
    const LONG: Duration = Duration::from_secs(30);

    #[rstest]
    #[case("", 0.0)]
    #[case("hello", 0.3)]
    #[case("  the  quick brown\tfox ", 1.2)]
    fn test_speech_duration(#[case] text: &str, #[case] seconds: f64) {
        approx::assert_abs_diff_eq!(speech_duration(text).as_secs_f64(), seconds, epsilon = 1e-9);
    }

    #[test]
    fn test_beep_announces_every_tone() {
        let (connector, commands) = SoundConnector::new();
        let playback = connector.beep(
            &[
                Tone::new(440.0, SHORT, Duration::ZERO),
                Tone::new(880.0, SHORT, SHORT),
            ],
            PlayType::WaitForComplete,
        );
        assert!(playback.is_finished());
        assert_eq!(
            commands.try_iter().collect::<Vec<_>>(),
            vec![
                SoundCommand {
                    message: "playing note with frequency: 440".to_string(),
                    duration: SHORT,
                    kind: SoundKind::Note,
                },
                SoundCommand {
                    message: "playing note with frequency: 880".to_string(),
                    duration: SHORT,
                    kind: SoundKind::Note,
                },
            ]
        );
    }

    #[test]
    fn test_wait_for_complete_blocks() {
        let (connector, _commands) = SoundConnector::new();
        let started = Instant::now();
        connector.tone(440.0, 5 * SHORT, PlayType::WaitForComplete);
        assert!(started.elapsed() >= 5 * SHORT);
    }

    #[test]
    fn test_no_wait_returns_immediately() {
        let (connector, commands) = SoundConnector::new();
        let started = Instant::now();
        let playback = connector.tone(440.0, LONG, PlayType::NoWaitForComplete);
        assert!(started.elapsed() < LONG);
        assert!(!playback.is_finished());
        assert_eq!(commands.recv().unwrap().duration, LONG);

        playback.stop();
        playback.wait();
        assert!(playback.is_finished());
    }

    #[test]
    fn test_loop_repeats_until_stopped() {
        let (connector, commands) = SoundConnector::new();
        let playback = connector.speak("beep", PlayType::Loop);
        for _ in 0..3 {
            assert_eq!(commands.recv().unwrap().message, "saying: beep");
        }
        assert!(!playback.is_finished());

        playback.stop();
        playback.wait();
        assert!(playback.is_finished());
    }

    #[test]
    fn test_dropped_loop_ends() {
        let (connector, commands) = SoundConnector::new();
        drop(connector.tone(440.0, SHORT, PlayType::Loop));
        drop(connector);
        let received = commands.iter().count();
        assert!(received >= 1);
    }

    #[test]
    fn test_zero_length_loop_ends() {
        let (connector, commands) = SoundConnector::new();
        for playback in [
            connector.speak("", PlayType::Loop),
            connector.tone(440.0, Duration::ZERO, PlayType::Loop),
        ] {
            assert_eq!(
                playback.finished.recv_timeout(Duration::from_secs(2)),
                Err(RecvTimeoutError::Disconnected)
            );
        }
        assert_eq!(commands.try_iter().count(), 2);
    }

    /// Mono 16-bit PCM with `data` bytes of silence and a padded odd-sized chunk before `fmt `.
    fn wav(byte_rate: u32, data: usize) -> Vec<u8> {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend((40 + data as u32).to_le_bytes());
        bytes.extend(b"WAVE");
        bytes.extend(b"LIST");
        bytes.extend(3u32.to_le_bytes());
        bytes.extend([0u8; 4]);
        bytes.extend(b"fmt ");
        bytes.extend(16u32.to_le_bytes());
        bytes.extend(1u16.to_le_bytes());
        bytes.extend(1u16.to_le_bytes());
        bytes.extend((byte_rate / 2).to_le_bytes());
        bytes.extend(byte_rate.to_le_bytes());
        bytes.extend(2u16.to_le_bytes());
        bytes.extend(16u16.to_le_bytes());
        bytes.extend(b"data");
        bytes.extend((data as u32).to_le_bytes());
        bytes.extend(vec![0u8; data]);
        bytes
    }

    #[test]
    fn test_wav_duration() {
        assert_eq!(wav_duration(&wav(16_000, 8_000)), Some(Duration::from_millis(500)));
        assert_eq!(wav_duration(&wav(16_000, 0)), Some(Duration::ZERO));
    }

    #[test]
    fn test_wav_duration_invalid() {
        let mut avi = wav(16_000, 8);
        avi[8..12].copy_from_slice(b"AVI ");
        for bytes in [vec![], avi, wav(16_000, 8)[..48].to_vec(), wav(0, 8)] {
            assert_eq!(wav_duration(&bytes), None);
        }
    }

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("brick-simulator-{}-{name}", std::process::id()));
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_play_file() {
        let path = temp_file("hello.wav", &wav(16_000, 320));
        let (connector, commands) = SoundConnector::new();
        let playback = connector.play_file(&path, PlayType::WaitForComplete).unwrap();
        fs::remove_file(&path).unwrap();

        assert!(playback.is_finished());
        assert_eq!(
            commands.try_iter().collect::<Vec<_>>(),
            vec![SoundCommand {
                message: format!("playing file: {}", path.display()),
                duration: Duration::from_millis(20),
                kind: SoundKind::File,
            }]
        );
    }

    #[test]
    fn test_play_file_errors() {
        let (connector, commands) = SoundConnector::new();
        assert!(matches!(
            connector.play_file("does/not/exist.wav", PlayType::NoWaitForComplete),
            Err(SoundError::Io { .. })
        ));

        let path = temp_file("text.wav", b"hello");
        let result = connector.play_file(&path, PlayType::NoWaitForComplete);
        fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(SoundError::InvalidWav { path: invalid }) if invalid == path));
        assert_eq!(commands.try_iter().count(), 0);
    }
}
