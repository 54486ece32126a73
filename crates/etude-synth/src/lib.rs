//! Etude Synth - Tone synthesis and audio output for the Etude piano
//! trainer.
//!
//! Implements the `ToneSink` trait from etude-core on top of cpal. The
//! [`AudioEngine`] runs a dedicated audio thread owning the output
//! stream; tones are mixed in the stream callback from simple
//! oscillator voices with an attack/decay envelope.

pub mod engine;
pub mod voice;
pub mod waveform;

pub use engine::{AudioEngine, EngineError};
