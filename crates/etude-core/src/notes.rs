//! Note names, equal-temperament frequencies and dynamic levels.
//!
//! The frequency model is standard twelve-tone equal temperament anchored
//! at A4 = 440 Hz: `freq = 440 * 2^((semitones_from_a + 12*(octave-4))/12)`.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// The 12 pitch class names in semitone order starting at C.
///
/// Indexing with `midi_note % 12` yields the name of any MIDI note.
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Reference frequency of A4 in Hz.
pub const CONCERT_A: f64 = 440.0;

/// One of the 12 pitch classes within an octave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PitchClass {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl PitchClass {
    /// All pitch classes in semitone order (C first).
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    /// Parse a pitch class name. Accepts sharp names (`C#`) and the
    /// common flat aliases (`Db`, `Eb`, `Gb`, `Ab`, `Bb`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "C" => Some(PitchClass::C),
            "C#" | "Db" => Some(PitchClass::Cs),
            "D" => Some(PitchClass::D),
            "D#" | "Eb" => Some(PitchClass::Ds),
            "E" => Some(PitchClass::E),
            "F" => Some(PitchClass::F),
            "F#" | "Gb" => Some(PitchClass::Fs),
            "G" => Some(PitchClass::G),
            "G#" | "Ab" => Some(PitchClass::Gs),
            "A" => Some(PitchClass::A),
            "A#" | "Bb" => Some(PitchClass::As),
            "B" => Some(PitchClass::B),
            _ => None,
        }
    }

    /// Pitch class of a MIDI note number (octave dropped).
    pub fn from_midi(note: u8) -> Self {
        Self::ALL[(note % 12) as usize]
    }

    /// Semitone index within the octave (C = 0 .. B = 11).
    pub fn semitone(self) -> i32 {
        self as i32
    }

    /// Semitone offset from A within the same octave (C = -9 .. B = 2).
    pub fn semitones_from_a(self) -> i32 {
        self.semitone() - 9
    }

    /// Canonical (sharp) name of this pitch class.
    pub fn name(self) -> &'static str {
        PITCH_CLASSES[self.semitone() as usize]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pitch: one of the 12 pitch classes plus an octave number.
///
/// `Note { pitch: A, octave: 4 }` is concert A at 440 Hz. Octaves follow
/// scientific pitch notation (middle C is C4, MIDI note 60).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Note {
    pub pitch: PitchClass,
    pub octave: i32,
}

impl Note {
    pub fn new(pitch: PitchClass, octave: i32) -> Self {
        Self { pitch, octave }
    }

    /// Equal-temperament frequency in Hz.
    pub fn frequency(&self) -> f64 {
        let semitones = self.pitch.semitones_from_a() + 12 * (self.octave - 4);
        CONCERT_A * 2f64.powf(semitones as f64 / 12.0)
    }

    /// Note for a MIDI note number (69 = A4).
    pub fn from_midi(note: u8) -> Self {
        Self {
            pitch: PitchClass::from_midi(note),
            octave: (note / 12) as i32 - 1,
        }
    }

    /// MIDI note number, if the note is inside the 0-127 MIDI range.
    pub fn midi(&self) -> Option<u8> {
        let n = (self.octave + 1) * 12 + self.pitch.semitone();
        u8::try_from(n).ok().filter(|&n| n <= 127)
    }
}

impl FromStr for Note {
    type Err = Error;

    /// Parse names like `"C4"`, `"F#3"`, `"Bb2"`, `"C-1"`.
    fn from_str(s: &str) -> Result<Self> {
        let split = s
            .char_indices()
            .find(|&(i, c)| c.is_ascii_digit() || (c == '-' && i > 0))
            .map(|(i, _)| i)
            .ok_or_else(|| Error::InvalidNote(s.to_string()))?;

        let (name, octave) = s.split_at(split);
        let pitch =
            PitchClass::from_name(name).ok_or_else(|| Error::InvalidNote(s.to_string()))?;
        let octave: i32 = octave
            .parse()
            .map_err(|_| Error::InvalidNote(s.to_string()))?;

        Ok(Note::new(pitch, octave))
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch, self.octave)
    }
}

/// Frequency for a note name, total over any input.
///
/// Unparsable names degrade to A4 (440 Hz) with a warning rather than
/// failing, so a stray name in an exercise never silences playback.
pub fn note_to_frequency(name: &str) -> f64 {
    match name.parse::<Note>() {
        Ok(note) => note.frequency(),
        Err(_) => {
            log::warn!("unknown note name '{}', falling back to A4", name);
            CONCERT_A
        }
    }
}

/// A named musical loudness marking mapped to a volume scalar in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Dynamic {
    Ppp,
    Pp,
    P,
    Mp,
    #[default]
    Mf,
    F,
    Ff,
    Fff,
}

impl Dynamic {
    /// Parse a marking like `"mf"`. Unknown markings fall back to `Mf`,
    /// matching the playback engine's default loudness.
    pub fn from_name(name: &str) -> Self {
        match name {
            "ppp" => Dynamic::Ppp,
            "pp" => Dynamic::Pp,
            "p" => Dynamic::P,
            "mp" => Dynamic::Mp,
            "mf" => Dynamic::Mf,
            "f" => Dynamic::F,
            "ff" => Dynamic::Ff,
            "fff" => Dynamic::Fff,
            other => {
                log::warn!("unknown dynamic marking '{}', using mf", other);
                Dynamic::Mf
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dynamic::Ppp => "ppp",
            Dynamic::Pp => "pp",
            Dynamic::P => "p",
            Dynamic::Mp => "mp",
            Dynamic::Mf => "mf",
            Dynamic::F => "f",
            Dynamic::Ff => "ff",
            Dynamic::Fff => "fff",
        }
    }

    /// Volume scalar for this marking.
    pub fn volume(self) -> f32 {
        match self {
            Dynamic::Ppp => 0.1,
            Dynamic::Pp => 0.2,
            Dynamic::P => 0.3,
            Dynamic::Mp => 0.45,
            Dynamic::Mf => 0.6,
            Dynamic::F => 0.75,
            Dynamic::Ff => 0.9,
            Dynamic::Fff => 1.0,
        }
    }

    /// Nearest dynamic for a MIDI velocity (0-127), by volume scalar.
    pub fn from_velocity(velocity: u8) -> Self {
        let v = velocity as f32 / 127.0;
        *[
            Dynamic::Ppp,
            Dynamic::Pp,
            Dynamic::P,
            Dynamic::Mp,
            Dynamic::Mf,
            Dynamic::F,
            Dynamic::Ff,
            Dynamic::Fff,
        ]
        .iter()
        .min_by(|a, b| {
            (a.volume() - v)
                .abs()
                .partial_cmp(&(b.volume() - v).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(&Dynamic::Mf)
    }
}

impl fmt::Display for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_is_exactly_440() {
        let a4 = Note::new(PitchClass::A, 4);
        assert_eq!(a4.frequency(), 440.0);
        assert_eq!(note_to_frequency("A4"), 440.0);
    }

    #[test]
    fn test_octave_doubles_frequency() {
        for pitch in PitchClass::ALL {
            for octave in 0..7 {
                let low = Note::new(pitch, octave).frequency();
                let high = Note::new(pitch, octave + 1).frequency();
                assert!(
                    (high - 2.0 * low).abs() < 1e-9,
                    "{}{} -> {}{}",
                    pitch,
                    octave,
                    pitch,
                    octave + 1
                );
            }
        }
    }

    #[test]
    fn test_frequency_monotonic_in_semitones() {
        let mut last = 0.0;
        for octave in 1..7 {
            for pitch in PitchClass::ALL {
                let freq = Note::new(pitch, octave).frequency();
                assert!(freq > last, "{}{} not above previous", pitch, octave);
                last = freq;
            }
        }
    }

    #[test]
    fn test_known_frequencies() {
        // Middle C and the C above it.
        let c4 = Note::new(PitchClass::C, 4).frequency();
        assert!((c4 - 261.6256).abs() < 0.001);
        let c5 = Note::new(PitchClass::C, 5).frequency();
        assert!((c5 - 523.2511).abs() < 0.001);
    }

    #[test]
    fn test_parse_note_names() {
        assert_eq!("C4".parse::<Note>().unwrap(), Note::new(PitchClass::C, 4));
        assert_eq!("F#3".parse::<Note>().unwrap(), Note::new(PitchClass::Fs, 3));
        assert_eq!("Bb2".parse::<Note>().unwrap(), Note::new(PitchClass::As, 2));
        assert_eq!("C-1".parse::<Note>().unwrap(), Note::new(PitchClass::C, -1));
        assert!("H4".parse::<Note>().is_err());
        assert!("C".parse::<Note>().is_err());
        assert!("".parse::<Note>().is_err());
    }

    #[test]
    fn test_unknown_note_falls_back_to_a4() {
        assert_eq!(note_to_frequency("X9"), 440.0);
        assert_eq!(note_to_frequency(""), 440.0);
    }

    #[test]
    fn test_midi_round_trip() {
        assert_eq!(Note::from_midi(60), Note::new(PitchClass::C, 4));
        assert_eq!(Note::from_midi(69), Note::new(PitchClass::A, 4));
        assert_eq!(Note::from_midi(69).midi(), Some(69));
        assert_eq!(Note::new(PitchClass::C, 4).midi(), Some(60));
        assert_eq!(Note::new(PitchClass::C, 12).midi(), None);
    }

    #[test]
    fn test_note_display() {
        assert_eq!(Note::from_midi(48).to_string(), "C3");
        assert_eq!(Note::from_midi(61).to_string(), "C#4");
    }

    #[test]
    fn test_dynamics_volume_table() {
        assert_eq!(Dynamic::from_name("ppp").volume(), 0.1);
        assert_eq!(Dynamic::from_name("mf").volume(), 0.6);
        assert_eq!(Dynamic::from_name("fff").volume(), 1.0);
        // Unknown markings degrade to mf.
        assert_eq!(Dynamic::from_name("sfz"), Dynamic::Mf);
    }

    #[test]
    fn test_dynamic_from_velocity() {
        assert_eq!(Dynamic::from_velocity(127), Dynamic::Fff);
        assert_eq!(Dynamic::from_velocity(0), Dynamic::Ppp);
        assert_eq!(Dynamic::from_velocity(76), Dynamic::Mf);
    }
}
