//! The player runtime thread.
//!
//! A [`Player`] owns a background thread that drains commands, ticks the
//! scheduler and the metronome, and sleeps briefly. All sound goes
//! through the [`ToneSink`] handed to [`Player::spawn`]; events stream
//! back over an unbounded channel.

use crate::events::{PlayerCommand, PlayerEvent};
use crate::exercise::Exercise;
use crate::metronome::Metronome;
use crate::scheduler::{HandMode, PlaybackScheduler};
use crate::sink::{Tone, ToneSink};
use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default click cycle when playing along with an exercise.
const DEFAULT_BEATS_PER_MEASURE: u32 = 4;

/// Handle to the player thread. Dropping it shuts the thread down.
pub struct Player {
    commands: Sender<PlayerCommand>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Player {
    /// Spawn the player thread around a tone sink. Returns the handle
    /// and the event stream.
    pub fn spawn(sink: Box<dyn ToneSink>) -> (Self, Receiver<PlayerEvent>) {
        let (cmd_tx, cmd_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();

        let worker = thread::spawn(move || {
            Worker::new(sink, cmd_rx, event_tx).run();
        });

        (
            Self {
                commands: cmd_tx,
                worker: Some(worker),
            },
            event_rx,
        )
    }

    pub fn play(
        &self,
        exercise: Arc<Exercise>,
        tempo: Option<f64>,
        hands: HandMode,
        metronome: bool,
    ) -> Result<()> {
        self.send(PlayerCommand::Play {
            exercise,
            tempo,
            hands,
            metronome,
        })
    }

    pub fn stop(&self) -> Result<()> {
        self.send(PlayerCommand::Stop)
    }

    pub fn set_tempo(&self, bpm: f64) -> Result<()> {
        self.send(PlayerCommand::SetTempo(bpm))
    }

    pub fn set_hand_mode(&self, mode: HandMode) -> Result<()> {
        self.send(PlayerCommand::SetHandMode(mode))
    }

    pub fn start_metronome(&self, tempo: f64, beats_per_measure: u32) -> Result<()> {
        self.send(PlayerCommand::StartMetronome {
            tempo,
            beats_per_measure,
        })
    }

    pub fn stop_metronome(&self) -> Result<()> {
        self.send(PlayerCommand::StopMetronome)
    }

    pub fn play_tone(&self, tone: Tone) -> Result<()> {
        self.send(PlayerCommand::PlayTone(tone))
    }

    pub fn stop_all_tones(&self) -> Result<()> {
        self.send(PlayerCommand::StopAllTones)
    }

    fn send(&self, cmd: PlayerCommand) -> Result<()> {
        self.commands
            .send(cmd)
            .map_err(|_| anyhow::anyhow!("player thread is gone"))
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let _ = self.commands.send(PlayerCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct Worker {
    sink: Box<dyn ToneSink>,
    commands: Receiver<PlayerCommand>,
    events: Sender<PlayerEvent>,
    scheduler: Option<PlaybackScheduler>,
    metronome: Metronome,
    /// True while the metronome is slaved to exercise playback and
    /// should stop when the exercise does.
    metronome_linked: bool,
}

impl Worker {
    fn new(
        sink: Box<dyn ToneSink>,
        commands: Receiver<PlayerCommand>,
        events: Sender<PlayerEvent>,
    ) -> Self {
        Self {
            sink,
            commands,
            events,
            scheduler: None,
            metronome: Metronome::new(120.0, DEFAULT_BEATS_PER_MEASURE),
            metronome_linked: false,
        }
    }

    fn run(mut self) {
        log::debug!("player thread started");
        loop {
            while let Ok(cmd) = self.commands.try_recv() {
                if !self.handle_command(cmd) {
                    log::debug!("player thread shutting down");
                    self.sink.stop_all();
                    return;
                }
            }
            self.tick(Instant::now());
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn handle_command(&mut self, cmd: PlayerCommand) -> bool {
        let now = Instant::now();
        match cmd {
            PlayerCommand::Play {
                exercise,
                tempo,
                hands,
                metronome,
            } => self.start_playback(exercise, tempo, hands, metronome, now),
            PlayerCommand::Stop => self.stop_playback(now),
            PlayerCommand::SetTempo(bpm) => {
                if let Some(scheduler) = &mut self.scheduler {
                    let events = &self.events;
                    scheduler.set_tempo(bpm, now, |e| send_event(events, e));
                    if self.metronome_linked {
                        self.metronome.set_tempo(scheduler.tempo(), now);
                    }
                } else {
                    self.metronome.set_tempo(bpm, now);
                    send_event(&self.events, PlayerEvent::TempoChanged { tempo: bpm });
                }
            }
            PlayerCommand::SetHandMode(mode) => {
                if let Some(scheduler) = &mut self.scheduler {
                    let events = &self.events;
                    scheduler.set_hand_mode(mode, |e| send_event(events, e));
                } else {
                    send_event(&self.events, PlayerEvent::HandModeChanged { mode });
                }
            }
            PlayerCommand::StartMetronome {
                tempo,
                beats_per_measure,
            } => {
                self.metronome_linked = false;
                self.metronome.set_beats_per_measure(beats_per_measure, now);
                self.metronome.set_tempo(tempo, now);
                self.metronome.start(now);
            }
            PlayerCommand::StopMetronome => self.metronome.stop(now),
            PlayerCommand::PlayTone(tone) => {
                self.sink.play(tone);
            }
            PlayerCommand::StopAllTones => self.sink.stop_all(),
            PlayerCommand::Shutdown => return false,
        }
        true
    }

    fn start_playback(
        &mut self,
        exercise: Arc<Exercise>,
        tempo: Option<f64>,
        hands: HandMode,
        metronome: bool,
        now: Instant,
    ) {
        self.stop_playback(now);

        let bpm = exercise
            .tempo
            .clamp(tempo.unwrap_or(exercise.tempo.recommended));
        let beats = exercise.time_signature.beats_per_bar().round() as u32;

        let mut scheduler = PlaybackScheduler::new(exercise, bpm);
        scheduler.set_hand_mode(hands, |_| {});
        let events = &self.events;
        scheduler.start(now, |e| send_event(events, e));
        self.scheduler = Some(scheduler);

        if metronome {
            self.metronome.set_beats_per_measure(beats.max(1), now);
            self.metronome.set_tempo(bpm, now);
            self.metronome.start(now);
            self.metronome_linked = true;
        }
    }

    fn stop_playback(&mut self, now: Instant) {
        if let Some(scheduler) = &mut self.scheduler {
            let events = &self.events;
            scheduler.stop(now, |e| send_event(events, e));
        }
        self.scheduler = None;
        if self.metronome_linked {
            self.metronome.stop(now);
            self.metronome_linked = false;
        }
        self.sink.stop_all();
    }

    fn tick(&mut self, now: Instant) {
        if let Some(scheduler) = &mut self.scheduler {
            let events = &self.events;
            let in_progress = scheduler.tick(now, self.sink.as_ref(), |e| send_event(events, e));
            if !in_progress && !scheduler.is_running() {
                self.scheduler = None;
                if self.metronome_linked {
                    self.metronome.stop(now);
                    self.metronome_linked = false;
                }
            }
        }
        let events = &self.events;
        self.metronome
            .tick(now, self.sink.as_ref(), |e| send_event(events, e));
    }
}

fn send_event(events: &Sender<PlayerEvent>, event: PlayerEvent) {
    if events.send(event).is_err() {
        log::debug!("event receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::testing::ONE_MEASURE_JSON;
    use crate::sink::NullSink;

    fn exercise() -> Arc<Exercise> {
        Arc::new(Exercise::from_json(ONE_MEASURE_JSON).unwrap())
    }

    fn wait_for(rx: &Receiver<PlayerEvent>, pred: impl Fn(&PlayerEvent) -> bool) -> PlayerEvent {
        let deadline = Duration::from_secs(10);
        loop {
            let event = rx.recv_timeout(deadline).expect("player event");
            if pred(&event) {
                return event;
            }
        }
    }

    #[test]
    fn test_play_to_completion() {
        let (player, events) = Player::spawn(Box::new(NullSink));
        // 600 BPM clamps to the exercise maximum of 160, still fast
        // enough to finish one measure quickly.
        player
            .play(exercise(), Some(600.0), HandMode::Both, false)
            .unwrap();

        let started = wait_for(&events, |e| matches!(e, PlayerEvent::Started { .. }));
        assert!(matches!(
            started,
            PlayerEvent::Started { tempo, .. } if tempo == 160.0
        ));
        wait_for(&events, |e| matches!(e, PlayerEvent::Finished));
    }

    #[test]
    fn test_stop_emits_stopped() {
        let (player, events) = Player::spawn(Box::new(NullSink));
        player
            .play(exercise(), None, HandMode::Right, false)
            .unwrap();
        wait_for(&events, |e| matches!(e, PlayerEvent::Started { .. }));
        player.stop().unwrap();
        wait_for(&events, |e| matches!(e, PlayerEvent::Stopped));
    }

    #[test]
    fn test_standalone_metronome_clicks() {
        let (player, events) = Player::spawn(Box::new(NullSink));
        player.start_metronome(240.0, 3).unwrap();
        let first = wait_for(&events, |e| matches!(e, PlayerEvent::MetronomeBeat { .. }));
        assert_eq!(
            first,
            PlayerEvent::MetronomeBeat {
                beat: 1,
                strong: true
            }
        );
        // Three-beat cycle: the fourth click is strong again.
        wait_for(
            &events,
            |e| matches!(e, PlayerEvent::MetronomeBeat { beat: 3, .. }),
        );
        let next = wait_for(&events, |e| matches!(e, PlayerEvent::MetronomeBeat { .. }));
        assert_eq!(
            next,
            PlayerEvent::MetronomeBeat {
                beat: 1,
                strong: true
            }
        );
        player.stop_metronome().unwrap();
    }

    #[test]
    fn test_shutdown_on_drop() {
        let (player, _events) = Player::spawn(Box::new(NullSink));
        player.play_tone(Tone::new(440.0, 0.1)).unwrap();
        player.stop_all_tones().unwrap();
        drop(player);
    }
}
