//! Commands into and events out of the player runtime.

use crate::exercise::{Exercise, Hand};
use crate::notes::Note;
use crate::scheduler::HandMode;
use crate::sink::Tone;
use std::sync::Arc;

/// Notifications emitted by the player thread. Consumers (the CLI, a UI)
/// receive these over a channel and must never block the runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    /// Playback of an exercise began.
    Started { exercise_id: String, tempo: f64 },
    /// Playback was stopped before the end.
    Stopped,
    /// The last measure finished; playback stopped on its own.
    Finished,
    /// Position advanced. `measure` and `note` are 1-based.
    Progress {
        percent: f64,
        measure: u32,
        note: u32,
    },
    /// A note of the exercise started sounding.
    NoteOn {
        hand: Hand,
        note: Note,
        fingering: u8,
    },
    /// A metronome click. `beat` is 1-based within the measure.
    MetronomeBeat { beat: u32, strong: bool },
    /// The playback tempo changed.
    TempoChanged { tempo: f64 },
    /// The active hand selection changed.
    HandModeChanged { mode: HandMode },
}

/// Requests sent to the player thread.
pub enum PlayerCommand {
    /// Start playing an exercise from the top. `tempo` defaults to the
    /// exercise's recommended tempo and is clamped to its range.
    Play {
        exercise: Arc<Exercise>,
        tempo: Option<f64>,
        hands: HandMode,
        metronome: bool,
    },
    /// Stop playback and silence everything.
    Stop,
    /// Change tempo. During playback this restarts from the beginning.
    SetTempo(f64),
    /// Change which hands sound.
    SetHandMode(HandMode),
    /// Start the standalone metronome.
    StartMetronome { tempo: f64, beats_per_measure: u32 },
    /// Stop the standalone metronome.
    StopMetronome,
    /// Sound a single tone immediately (MIDI echo, note preview).
    PlayTone(Tone),
    /// Silence every tone in flight.
    StopAllTones,
    /// Terminate the player thread.
    Shutdown,
}
