//! MIDI keyboard input.
//!
//! Parses the channel-voice subset a piano keyboard produces and
//! forwards it over a channel, tagged with the source port. Hot-plug is
//! handled by a polling watcher that diffs the port list and reconnects,
//! debounced so that enumerate churn during device setup does not cause
//! a reconnect storm.

use crate::error::{Error, Result};
use crate::notes::{Dynamic, Note, PitchClass};
use crossbeam_channel::{unbounded, Receiver, Sender};
use midir::{Ignore, MidiInput, MidiInputConnection};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const CLIENT_NAME: &str = "etude-midi";

/// A parsed MIDI input message, timestamped by the backend in
/// microseconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn {
        timestamp: u64,
        channel: u8,
        note: u8,
        velocity: u8,
    },
    NoteOff {
        timestamp: u64,
        channel: u8,
        note: u8,
    },
    ControlChange {
        timestamp: u64,
        channel: u8,
        controller: u8,
        value: u8,
    },
    ProgramChange {
        timestamp: u64,
        channel: u8,
        program: u8,
    },
    /// The set of connected ports changed (emitted by the watcher).
    DevicesChanged { connected: usize },
}

impl MidiMessage {
    /// Parse a raw channel-voice message. Running status and messages
    /// outside the keyboard subset yield `None`. A note-on with zero
    /// velocity is a note-off, per the MIDI convention.
    pub fn from_bytes(timestamp: u64, bytes: &[u8]) -> Option<Self> {
        let (&status, rest) = bytes.split_first()?;
        let channel = status & 0x0f;
        match status & 0xf0 {
            0x90 => {
                let (&note, rest) = rest.split_first()?;
                let &velocity = rest.first()?;
                if velocity == 0 {
                    Some(MidiMessage::NoteOff {
                        timestamp,
                        channel,
                        note,
                    })
                } else {
                    Some(MidiMessage::NoteOn {
                        timestamp,
                        channel,
                        note,
                        velocity,
                    })
                }
            }
            0x80 => {
                let &note = rest.first()?;
                Some(MidiMessage::NoteOff {
                    timestamp,
                    channel,
                    note,
                })
            }
            0xb0 => {
                let (&controller, rest) = rest.split_first()?;
                let &value = rest.first()?;
                Some(MidiMessage::ControlChange {
                    timestamp,
                    channel,
                    controller,
                    value,
                })
            }
            0xc0 => {
                let &program = rest.first()?;
                Some(MidiMessage::ProgramChange {
                    timestamp,
                    channel,
                    program,
                })
            }
            _ => None,
        }
    }

    /// The note this message is about, if any.
    pub fn note(&self) -> Option<Note> {
        match self {
            MidiMessage::NoteOn { note, .. } | MidiMessage::NoteOff { note, .. } => {
                Some(Note::from_midi(*note))
            }
            _ => None,
        }
    }

    /// The pitch class of this message's note, octave dropped.
    pub fn pitch_class(&self) -> Option<PitchClass> {
        self.note().map(|n| n.pitch)
    }

    /// Dynamic marking nearest to this message's velocity.
    pub fn dynamic(&self) -> Option<Dynamic> {
        match self {
            MidiMessage::NoteOn { velocity, .. } => Some(Dynamic::from_velocity(*velocity)),
            _ => None,
        }
    }
}

/// An available MIDI input port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiDeviceInfo {
    pub name: String,
    pub port_index: usize,
}

/// Owns the open MIDI input connections and the message channel.
pub struct MidiInputManager {
    sender: Sender<MidiMessage>,
    connections: Vec<(String, MidiInputConnection<()>)>,
}

impl MidiInputManager {
    pub fn new() -> (Self, Receiver<MidiMessage>) {
        let (sender, receiver) = unbounded();
        (
            Self {
                sender,
                connections: Vec::new(),
            },
            receiver,
        )
    }

    fn backend() -> Result<MidiInput> {
        let mut input = MidiInput::new(CLIENT_NAME).map_err(|e| Error::Midi(e.to_string()))?;
        input.ignore(Ignore::All);
        Ok(input)
    }

    /// Enumerate the available input ports.
    pub fn list_devices(&self) -> Result<Vec<MidiDeviceInfo>> {
        let input = Self::backend()?;
        Ok(input
            .ports()
            .iter()
            .enumerate()
            .map(|(port_index, port)| MidiDeviceInfo {
                name: input
                    .port_name(port)
                    .unwrap_or_else(|_| format!("port {port_index}")),
                port_index,
            })
            .collect())
    }

    /// Names of the currently open connections.
    pub fn connected(&self) -> Vec<String> {
        self.connections.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Open every available input port. Returns whether at least one
    /// connection is open afterwards.
    pub fn connect_all(&mut self) -> bool {
        match self.list_devices() {
            Ok(devices) => {
                for device in devices {
                    if let Err(err) = self.open_by_index(device.port_index) {
                        log::warn!("could not open '{}': {err}", device.name);
                    }
                }
            }
            Err(err) => log::warn!("MIDI enumeration failed: {err}"),
        }
        !self.connections.is_empty()
    }

    /// Open one port by its enumeration index.
    pub fn open_by_index(&mut self, port_index: usize) -> Result<()> {
        let input = Self::backend()?;
        let ports = input.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| Error::Midi(format!("no MIDI input port {port_index}")))?;
        let name = input
            .port_name(port)
            .unwrap_or_else(|_| format!("port {port_index}"));

        if self.connections.iter().any(|(n, _)| n == &name) {
            return Ok(());
        }

        let sender = self.sender.clone();
        let connection = input
            .connect(
                port,
                CLIENT_NAME,
                move |timestamp, bytes, _| {
                    if let Some(msg) = MidiMessage::from_bytes(timestamp, bytes) {
                        let _ = sender.send(msg);
                    }
                },
                (),
            )
            .map_err(|e| Error::Midi(e.to_string()))?;

        log::info!("connected MIDI input '{name}'");
        self.connections.push((name, connection));
        Ok(())
    }

    /// Open the first port whose name contains `needle`.
    pub fn open_by_name(&mut self, needle: &str) -> Result<()> {
        let device = self
            .list_devices()?
            .into_iter()
            .find(|d| d.name.contains(needle))
            .ok_or_else(|| Error::Midi(format!("no MIDI input matching '{needle}'")))?;
        self.open_by_index(device.port_index)
    }

    pub fn close_all(&mut self) {
        for (name, connection) in self.connections.drain(..) {
            log::info!("closing MIDI input '{name}'");
            connection.close();
        }
    }

    /// Drop every connection and reopen whatever is present now.
    pub fn reconnect_all(&mut self) -> bool {
        self.close_all();
        self.connect_all()
    }
}

/// Spawn a thread that polls the port list and reconnects when it
/// changes. A change is applied only after `debounce` of stability.
pub fn spawn_watcher(
    manager: Arc<Mutex<MidiInputManager>>,
    poll: Duration,
    debounce: Duration,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut known: Option<BTreeSet<String>> = None;
        let mut pending: Option<(BTreeSet<String>, Instant)> = None;

        loop {
            thread::sleep(poll);

            let Ok(mut manager) = manager.lock() else {
                return;
            };
            let current: BTreeSet<String> = match manager.list_devices() {
                Ok(devices) => devices.into_iter().map(|d| d.name).collect(),
                Err(err) => {
                    log::warn!("MIDI enumeration failed: {err}");
                    continue;
                }
            };

            let known_set = known.get_or_insert_with(|| current.clone());
            if current == *known_set {
                pending = None;
                continue;
            }
            match pending.take() {
                Some((seen, since)) if seen == current => {
                    if since.elapsed() >= debounce {
                        log::info!(
                            "MIDI ports changed ({} -> {}), reconnecting",
                            known_set.len(),
                            current.len()
                        );
                        *known_set = current;
                        manager.reconnect_all();
                        let connected = manager.connections.len();
                        let _ = manager
                            .sender
                            .send(MidiMessage::DevicesChanged { connected });
                    } else {
                        pending = Some((seen, since));
                    }
                }
                _ => pending = Some((current, Instant::now())),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::PitchClass;

    #[test]
    fn test_parse_note_on() {
        let msg = MidiMessage::from_bytes(7, &[0x91, 60, 100]).unwrap();
        assert_eq!(
            msg,
            MidiMessage::NoteOn {
                timestamp: 7,
                channel: 1,
                note: 60,
                velocity: 100
            }
        );
        assert_eq!(msg.note(), Some(Note::new(PitchClass::C, 4)));
        assert_eq!(msg.pitch_class(), Some(PitchClass::C));
        assert!(msg.dynamic().is_some());
    }

    #[test]
    fn test_note_on_zero_velocity_is_note_off() {
        let msg = MidiMessage::from_bytes(0, &[0x90, 64, 0]).unwrap();
        assert_eq!(
            msg,
            MidiMessage::NoteOff {
                timestamp: 0,
                channel: 0,
                note: 64
            }
        );
    }

    #[test]
    fn test_parse_note_off() {
        let msg = MidiMessage::from_bytes(0, &[0x82, 64, 40]).unwrap();
        assert_eq!(
            msg,
            MidiMessage::NoteOff {
                timestamp: 0,
                channel: 2,
                note: 64
            }
        );
    }

    #[test]
    fn test_parse_control_and_program_change() {
        assert_eq!(
            MidiMessage::from_bytes(0, &[0xb0, 64, 127]),
            Some(MidiMessage::ControlChange {
                timestamp: 0,
                channel: 0,
                controller: 64,
                value: 127
            })
        );
        assert_eq!(
            MidiMessage::from_bytes(0, &[0xc3, 5]),
            Some(MidiMessage::ProgramChange {
                timestamp: 0,
                channel: 3,
                program: 5
            })
        );
    }

    #[test]
    fn test_unsupported_and_truncated_messages() {
        // Pitch bend is outside the keyboard subset.
        assert_eq!(MidiMessage::from_bytes(0, &[0xe0, 0, 64]), None);
        // System messages.
        assert_eq!(MidiMessage::from_bytes(0, &[0xf8]), None);
        // Truncated.
        assert_eq!(MidiMessage::from_bytes(0, &[0x90, 60]), None);
        assert_eq!(MidiMessage::from_bytes(0, &[]), None);
    }
}
