//! The audio engine.
//!
//! cpal streams are not `Send`, so the engine spawns a dedicated audio
//! thread that owns the output stream for its whole life. The public
//! handle only holds a command channel into the mixer callback, which
//! makes it freely shareable and lets it implement [`ToneSink`].

use crate::voice::Voice;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use etude_core::{NullSink, Tone, ToneHandle, ToneSink};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

/// Overall output level applied after mixing.
const MASTER_GAIN: f32 = 0.7;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("could not query output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("could not build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("could not start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("unsupported sample format {0}")]
    Format(SampleFormat),
    #[error("audio thread terminated during startup")]
    ThreadFailed,
}

enum EngineCommand {
    Play(Tone, u64),
    StopVoice(u64),
    StopAll,
    SetMasterGain(f32),
}

/// Handle to the audio thread. Sound requests go over a channel into
/// the stream callback; dropping the handle stops the stream.
pub struct AudioEngine {
    commands: Sender<EngineCommand>,
    shutdown: Sender<()>,
    worker: Option<thread::JoinHandle<()>>,
    next_id: AtomicU64,
}

impl AudioEngine {
    /// Open the default output device and start the stream.
    pub fn open() -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<(), EngineError>>(1);

        let worker = thread::spawn(move || {
            audio_thread(cmd_rx, shutdown_rx, ready_tx);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                commands: cmd_tx,
                shutdown: shutdown_tx,
                worker: Some(worker),
                next_id: AtomicU64::new(1),
            }),
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                let _ = worker.join();
                Err(EngineError::ThreadFailed)
            }
        }
    }

    /// Open the audio engine, degrading to a silent sink when no output
    /// device is usable.
    pub fn open_or_null() -> Box<dyn ToneSink> {
        match Self::open() {
            Ok(engine) => Box::new(engine),
            Err(err) => {
                log::warn!("audio output unavailable, running silent: {err}");
                Box::new(NullSink)
            }
        }
    }

    /// Sound several tones at once, e.g. a chord.
    pub fn play_chord(&self, tones: &[Tone]) -> Vec<ToneHandle> {
        tones.iter().map(|tone| self.play(*tone)).collect()
    }

    /// Set the post-mix output level, clamped to `[0, 1]`.
    pub fn set_master_volume(&self, gain: f32) {
        let _ = self
            .commands
            .send(EngineCommand::SetMasterGain(gain.clamp(0.0, 1.0)));
    }
}

impl ToneSink for AudioEngine {
    fn play(&self, tone: Tone) -> ToneHandle {
        if tone.frequency <= 0.0 || tone.duration <= 0.0 {
            log::warn!(
                "ignoring degenerate tone ({} Hz, {} s)",
                tone.frequency,
                tone.duration
            );
            return ToneHandle::noop();
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if self.commands.send(EngineCommand::Play(tone, id)).is_err() {
            return ToneHandle::noop();
        }
        let commands = self.commands.clone();
        ToneHandle::new(move || {
            let _ = commands.send(EngineCommand::StopVoice(id));
        })
    }

    fn stop_all(&self) {
        let _ = self.commands.send(EngineCommand::StopAll);
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn audio_thread(
    commands: Receiver<EngineCommand>,
    shutdown: Receiver<()>,
    ready: Sender<Result<(), EngineError>>,
) {
    let result = open_stream(commands);
    match result {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            // Keep the stream alive until the handle is dropped.
            let _ = shutdown.recv();
            drop(stream);
        }
        Err(err) => {
            let _ = ready.send(Err(err));
        }
    }
}

fn open_stream(commands: Receiver<EngineCommand>) -> Result<cpal::Stream, EngineError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(EngineError::NoDevice)?;
    let config = device.default_output_config()?;
    log::info!(
        "audio output: {} ({} Hz, {} ch, {:?})",
        device.name().unwrap_or_else(|_| "unknown".into()),
        config.sample_rate(),
        config.channels(),
        config.sample_format()
    );

    match config.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), commands),
        SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), commands),
        SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), commands),
        other => Err(EngineError::Format(other)),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    commands: Receiver<EngineCommand>,
) -> Result<cpal::Stream, EngineError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut mixer = Mixer::new(config.sample_rate as f32, commands);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            mixer.drain_commands();
            for frame in data.chunks_mut(channels) {
                let sample = T::from_sample(mixer.next_sample());
                for out in frame.iter_mut() {
                    *out = sample;
                }
            }
        },
        |err| log::error!("audio stream error: {err}"),
        None,
    )?;
    stream.play()?;
    Ok(stream)
}

/// Runs inside the stream callback: drains commands, sums the active
/// voices and applies the master gain.
struct Mixer {
    sample_rate: f32,
    commands: Receiver<EngineCommand>,
    voices: Vec<Voice>,
    master: f32,
}

impl Mixer {
    fn new(sample_rate: f32, commands: Receiver<EngineCommand>) -> Self {
        Self {
            sample_rate,
            commands,
            voices: Vec::new(),
            master: MASTER_GAIN,
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                EngineCommand::Play(tone, id) => {
                    self.voices.push(Voice::new(id, &tone, self.sample_rate));
                }
                EngineCommand::StopVoice(id) => self.voices.retain(|v| v.id != id),
                EngineCommand::StopAll => self.voices.clear(),
                EngineCommand::SetMasterGain(gain) => self.master = gain,
            }
        }
    }

    fn next_sample(&mut self) -> f32 {
        let mixed: f32 = self.voices.iter_mut().map(Voice::next_sample).sum();
        self.voices.retain(|v| !v.is_finished());
        (mixed * self.master).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 48_000.0;

    fn mixer() -> (Sender<EngineCommand>, Mixer) {
        let (tx, rx) = unbounded();
        (tx, Mixer::new(RATE, rx))
    }

    #[test]
    fn test_mixer_sums_and_reaps_voices() {
        let (tx, mut mixer) = mixer();
        tx.send(EngineCommand::Play(Tone::new(440.0, 0.02), 1)).unwrap();
        tx.send(EngineCommand::Play(Tone::new(660.0, 0.02), 2)).unwrap();
        mixer.drain_commands();
        assert_eq!(mixer.voices.len(), 2);

        // Run past both durations; finished voices are dropped.
        for _ in 0..(RATE * 0.03) as usize {
            let s = mixer.next_sample();
            assert!(s.abs() <= 1.0);
        }
        assert!(mixer.voices.is_empty());
    }

    #[test]
    fn test_stop_voice_by_id() {
        let (tx, mut mixer) = mixer();
        tx.send(EngineCommand::Play(Tone::new(440.0, 1.0), 1)).unwrap();
        tx.send(EngineCommand::Play(Tone::new(660.0, 1.0), 2)).unwrap();
        tx.send(EngineCommand::StopVoice(1)).unwrap();
        mixer.drain_commands();
        assert_eq!(mixer.voices.len(), 1);
        assert_eq!(mixer.voices[0].id, 2);
    }

    #[test]
    fn test_stop_all_and_master_gain() {
        let (tx, mut mixer) = mixer();
        tx.send(EngineCommand::Play(Tone::new(440.0, 1.0), 1)).unwrap();
        tx.send(EngineCommand::SetMasterGain(0.0)).unwrap();
        mixer.drain_commands();
        for _ in 0..100 {
            assert_eq!(mixer.next_sample(), 0.0);
        }
        tx.send(EngineCommand::StopAll).unwrap();
        mixer.drain_commands();
        assert!(mixer.voices.is_empty());
    }
}
