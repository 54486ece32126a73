//! Etude Core - Exercise playback engine for the Etude piano trainer.
//!
//! This crate provides the platform-independent building blocks:
//!
//! - **Notes** - Pitch classes, equal-temperament frequencies, dynamics
//! - **Timing** - Transport clock, beat time, time signatures
//! - **Exercises** - The validated exercise data model and JSON loader
//! - **Scheduler** - Eighth-note grid playback of both hands
//! - **Metronome** - Accented click generation
//! - **Runtime** - The player thread tying it all together
//! - **MIDI** - Keyboard input with hot-plug reconnection
//!
//! # Architecture
//!
//! All sound flows through the [`ToneSink`] trait; the playback logic
//! never touches an audio device directly. A [`Player`] owns a worker
//! thread that drains [`PlayerCommand`]s, ticks the scheduler and the
//! metronome against wall-clock time, and streams [`PlayerEvent`]s back
//! to the caller. Everything time-based takes an explicit `Instant`, so
//! the scheduling tests run on synthetic clocks.
//!
//! # Feature Flags
//!
//! - `native` (default) - MIDI keyboard input via midir

pub mod error;
pub mod events;
pub mod exercise;
pub mod library;
pub mod metronome;
pub mod notes;
pub mod runtime;
pub mod scheduler;
pub mod sink;
pub mod timing;

// Native-only modules (require system dependencies)
#[cfg(feature = "native")]
pub mod midi;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use events::{PlayerCommand, PlayerEvent};
pub use exercise::{Exercise, ExerciseSummary, Hand, HandPart, Measure, TempoSpec};
pub use library::ExerciseLibrary;
pub use metronome::Metronome;
pub use notes::{note_to_frequency, Dynamic, Note, PitchClass};
pub use runtime::Player;
pub use scheduler::{HandMode, PlaybackScheduler, NOTES_PER_MEASURE};
pub use sink::{NullSink, Tone, ToneHandle, ToneSink, Waveform};
pub use timing::{BeatTime, TimeSignature, TransportClock};

#[cfg(feature = "native")]
pub use midi::{MidiDeviceInfo, MidiInputManager, MidiMessage};
