//! Key input for the live loops.
//!
//! The per-frame key wait doubles as frame pacing: [`KeySource::wait_key`]
//! blocks up to the configured delay and reports at most one key.

use std::io::Read;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};

const ESC: char = '\u{1b}';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Quit,
    Sample,
    Calibrate,
    /// No key, or one without a binding.
    Idle,
}

impl Key {
    pub fn from_char(c: char) -> Self {
        match c {
            'q' | 'Q' | ESC => Key::Quit,
            's' | 'S' => Key::Sample,
            'c' | 'C' => Key::Calibrate,
            _ => Key::Idle,
        }
    }
}

pub trait KeySource {
    fn wait_key(&mut self, delay: Duration) -> Key;
}

/// A fixed key script, one character per frame; `.` means no key. Once the
/// script runs out every wait returns [`Key::Idle`]. Never sleeps.
#[derive(Clone, Debug, Default)]
pub struct ScriptedKeys {
    keys: Vec<Key>,
    pos: usize,
}

impl ScriptedKeys {
    pub fn parse(script: &str) -> Self {
        Self {
            keys: script.chars().map(Key::from_char).collect(),
            pos: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.keys.len() - self.pos
    }
}

impl KeySource for ScriptedKeys {
    fn wait_key(&mut self, _delay: Duration) -> Key {
        match self.keys.get(self.pos) {
            Some(&key) => {
                self.pos += 1;
                key
            }
            None => Key::Idle,
        }
    }
}

/// Keys typed on stdin, read by a background thread.
///
/// Stdin is line-buffered by the terminal, so keys arrive after Enter;
/// every character of the line is delivered on its own wait.
pub struct StdinKeys {
    rx: Receiver<char>,
}

impl StdinKeys {
    pub fn spawn() -> std::io::Result<Self> {
        Self::from_reader(std::io::stdin())
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> std::io::Result<Self> {
        let (tx, rx) = unbounded::<char>();
        std::thread::Builder::new()
            .name("key-reader".to_string())
            .spawn(move || {
                for byte in reader.bytes() {
                    let Ok(byte) = byte else { break };
                    let c = byte as char;
                    if c == '\n' || c == '\r' {
                        continue;
                    }
                    if tx.send(c).is_err() {
                        break;
                    }
                }
                log::debug!("key reader finished");
            })?;
        Ok(Self { rx })
    }
}

impl KeySource for StdinKeys {
    fn wait_key(&mut self, delay: Duration) -> Key {
        match self.rx.recv_timeout(delay) {
            Ok(c) => Key::from_char(c),
            Err(RecvTimeoutError::Timeout) => Key::Idle,
            Err(RecvTimeoutError::Disconnected) => {
                // Input closed: keep pacing frames.
                std::thread::sleep(delay);
                Key::Idle
            }
        }
    }
}
