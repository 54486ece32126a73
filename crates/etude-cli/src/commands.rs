//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use etude_core::midi::{self, MidiInputManager, MidiMessage};
use etude_core::scheduler::HandMode;
use etude_core::{
    Dynamic, Exercise, ExerciseLibrary, Hand, Note, PlayerEvent, Tone, Waveform,
};
use etude_synth::AudioEngine;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const EVENT_POLL: Duration = Duration::from_millis(100);

fn interrupted(flag: &AtomicBool) -> bool {
    flag.load(Ordering::Relaxed)
}

pub fn list(dir: &Path, lang: &str) -> Result<()> {
    let library = ExerciseLibrary::new(dir);
    let summaries = library
        .load_list()
        .with_context(|| format!("loading exercise list from {}", dir.display()))?;

    if summaries.is_empty() {
        println!("No exercises in {}", dir.display());
        return Ok(());
    }

    println!("{:<16} {:<32} {:<12} {}", "ID", "TITLE", "DIFFICULTY", "CATEGORY");
    for s in summaries {
        println!(
            "{:<16} {:<32} {:<12} {}",
            s.id,
            s.title.get(lang).unwrap_or("-"),
            s.difficulty,
            s.category
        );
    }
    Ok(())
}

pub fn info(dir: &Path, id: &str, lang: &str) -> Result<()> {
    let mut library = ExerciseLibrary::new(dir);
    let exercise = library.load_exercise(id)?;

    println!(
        "{}  ({})",
        exercise.title.get(lang).unwrap_or(exercise.id.as_str()),
        exercise.id
    );
    if !exercise.composer.is_empty() {
        println!("Composer:   {}", exercise.composer);
    }
    println!("Difficulty: {}", exercise.difficulty);
    println!("Category:   {}", exercise.category);
    println!("Key:        {}", exercise.key);
    println!(
        "Time:       {}/{}",
        exercise.time_signature.numerator, exercise.time_signature.denominator
    );
    println!(
        "Tempo:      {} BPM (range {}-{})",
        exercise.tempo.recommended, exercise.tempo.min, exercise.tempo.max
    );
    println!("Measures:   {}", exercise.total_measures());
    if !exercise.duration.is_empty() {
        println!("Duration:   {}", exercise.duration);
    }

    if let Some(description) = exercise.description.get(lang) {
        println!("\n{description}");
    }
    if let Some(objectives) = exercise.objectives.get(lang) {
        println!("\nObjectives:");
        for objective in objectives {
            println!("  - {objective}");
        }
    }
    if let Some(instructions) = exercise.instructions.get(lang) {
        println!("\nInstructions:");
        for (i, instruction) in instructions.iter().enumerate() {
            println!("  {}. {instruction}", i + 1);
        }
    }
    if let Some(notes) = exercise.practice_notes.get(lang) {
        println!("\nPractice notes:\n{notes}");
    }
    Ok(())
}

pub fn play(
    dir: &Path,
    id: &str,
    tempo: Option<f64>,
    hands: &str,
    metronome: bool,
    interrupt: &AtomicBool,
) -> Result<()> {
    let hands = HandMode::from_name(hands)
        .with_context(|| format!("unknown hand mode '{hands}' (both, right or left)"))?;
    let mut library = ExerciseLibrary::new(dir);
    let exercise = library.load_exercise(id)?;

    let (player, events) = etude_core::Player::spawn(AudioEngine::open_or_null());
    player.play(exercise, tempo, hands, metronome)?;

    run_event_loop(&events, interrupt, |event| match event {
        PlayerEvent::Started { exercise_id, tempo } => {
            println!("Playing {exercise_id} at {tempo} BPM (Ctrl-C stops)");
            false
        }
        PlayerEvent::Progress {
            percent,
            measure,
            note,
        } => {
            print!("\r  measure {measure}, note {note}  [{percent:>5.1}%]");
            use std::io::Write;
            let _ = std::io::stdout().flush();
            false
        }
        PlayerEvent::Finished => {
            println!("\nDone.");
            true
        }
        PlayerEvent::Stopped => {
            println!("\nStopped.");
            true
        }
        _ => false,
    })?;

    drop(player);
    Ok(())
}

pub fn measure(
    dir: &Path,
    id: &str,
    number: u32,
    hand: &str,
    play_tempo: Option<f64>,
    interrupt: &AtomicBool,
) -> Result<()> {
    let hand = match hand {
        "right" => Hand::Right,
        "left" => Hand::Left,
        other => bail!("unknown hand '{other}' (right or left)"),
    };
    let mut library = ExerciseLibrary::new(dir);
    let exercise = library.load_exercise(id)?;
    let measure = exercise
        .measure(hand, number)
        .with_context(|| format!("{id} has no {hand} hand measure {number}"))?;

    println!(
        "{id}, {hand} hand, measure {number} ({})",
        measure.dynamics.name()
    );
    println!("{:<6} {:<6} {:<10} {}", "SLOT", "NOTE", "FINGERING", "BEAT");
    for (i, slot) in measure.notes.iter().enumerate() {
        let (note, fingering) = match slot {
            Some(note) => (note.to_string(), measure.fingering[i].to_string()),
            None => ("rest".to_string(), "-".to_string()),
        };
        println!("{:<6} {:<6} {:<10} {}", i + 1, note, fingering, measure.timing[i]);
    }

    if let Some(tempo) = play_tempo {
        let tempo = exercise.tempo.clamp(tempo);
        play_measure_events(&exercise, hand, number, tempo, interrupt);
    }
    Ok(())
}

fn play_measure_events(
    exercise: &Exercise,
    hand: Hand,
    number: u32,
    tempo: f64,
    interrupt: &AtomicBool,
) {
    use etude_core::ToneSink;

    let sink = AudioEngine::open_or_null();
    let start = Instant::now();
    println!("\nPlaying at {tempo} BPM...");
    for (onset, tone) in exercise.measure_events(hand, number, tempo) {
        let due = start + Duration::from_secs_f64(onset);
        while Instant::now() < due {
            if interrupted(interrupt) {
                sink.stop_all();
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        sink.play(tone);
    }
    // Let the last note ring out.
    thread::sleep(Duration::from_millis(600));
}

pub fn metronome(
    tempo: f64,
    beats: u32,
    duration: Option<f64>,
    interrupt: &AtomicBool,
) -> Result<()> {
    let (player, events) = etude_core::Player::spawn(AudioEngine::open_or_null());
    player.start_metronome(tempo, beats)?;
    match duration {
        Some(secs) => println!("Metronome at {tempo} BPM, {beats} beats per measure, {secs} s"),
        None => println!("Metronome at {tempo} BPM, {beats} beats per measure (Ctrl-C stops)"),
    }

    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs_f64(secs));
    loop {
        if interrupted(interrupt) || deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        match events.recv_timeout(EVENT_POLL) {
            Ok(PlayerEvent::MetronomeBeat { beat, strong }) => {
                if strong {
                    println!("TICK  {beat}");
                } else {
                    println!("tick  {beat}");
                }
            }
            Ok(_) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    player.stop_metronome()?;
    Ok(())
}

pub fn midi(
    device: Option<&str>,
    watch: bool,
    echo: bool,
    list_only: bool,
    interrupt: &AtomicBool,
) -> Result<()> {
    let (mut manager, messages) = MidiInputManager::new();

    if list_only {
        let devices = manager.list_devices()?;
        if devices.is_empty() {
            println!("No MIDI input devices.");
        }
        for device in devices {
            println!("{:>3}  {}", device.port_index, device.name);
        }
        return Ok(());
    }

    match device {
        Some(needle) => {
            manager.open_by_name(needle)?;
            for name in manager.connected() {
                println!("Listening on '{name}'");
            }
        }
        None => {
            if manager.connect_all() {
                for name in manager.connected() {
                    println!("Listening on '{name}'");
                }
            } else if watch {
                println!("No MIDI device connected; waiting for one to appear...");
            } else {
                println!("No MIDI device connected.");
            }
        }
    }

    let manager = Arc::new(Mutex::new(manager));
    if watch {
        midi::spawn_watcher(
            Arc::clone(&manager),
            Duration::from_millis(500),
            Duration::from_millis(100),
        );
    }

    let sink = echo.then(AudioEngine::open_or_null);
    println!("Press Ctrl-C to quit.");

    loop {
        if interrupted(interrupt) {
            break;
        }
        let message = match messages.recv_timeout(EVENT_POLL) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        match &message {
            MidiMessage::NoteOn { note, velocity, .. } => {
                let parsed = Note::from_midi(*note);
                println!(
                    "note on   {parsed:<4} velocity {velocity:<3} ({})",
                    Dynamic::from_velocity(*velocity).name()
                );
                if let Some(sink) = &sink {
                    use etude_core::ToneSink;
                    sink.play(
                        Tone::new(parsed.frequency(), 0.5)
                            .with_dynamic(Dynamic::from_velocity(*velocity)),
                    );
                }
            }
            MidiMessage::NoteOff { note, .. } => {
                println!("note off  {}", Note::from_midi(*note));
            }
            MidiMessage::ControlChange {
                controller, value, ..
            } => println!("control   {controller} = {value}"),
            MidiMessage::ProgramChange { program, .. } => println!("program   {program}"),
            MidiMessage::DevicesChanged { connected } => {
                println!("devices changed ({connected} connected)");
            }
        }
    }

    if let Ok(mut manager) = manager.lock() {
        manager.close_all();
    }
    Ok(())
}

pub fn note(name: &str, duration: f64, dynamic: &str, waveform: &str) -> Result<()> {
    use etude_core::ToneSink;

    let note: Note = name.parse()?;
    let waveform = Waveform::from_name(waveform)
        .with_context(|| format!("unknown waveform '{waveform}'"))?;
    let dynamic = Dynamic::from_name(dynamic);

    println!("{note} = {:.2} Hz", note.frequency());

    let sink = AudioEngine::open_or_null();
    sink.play(
        Tone::new(note.frequency(), duration)
            .with_dynamic(dynamic)
            .with_waveform(waveform),
    );
    thread::sleep(Duration::from_secs_f64(duration + 0.1));
    Ok(())
}

/// Drain player events until the handler returns true or Ctrl-C.
fn run_event_loop(
    events: &Receiver<PlayerEvent>,
    interrupt: &AtomicBool,
    mut handle: impl FnMut(PlayerEvent) -> bool,
) -> Result<()> {
    loop {
        if interrupted(interrupt) {
            return Ok(());
        }
        match events.recv_timeout(EVENT_POLL) {
            Ok(event) => {
                if handle(event) {
                    return Ok(());
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}
