//! The exercise data model.
//!
//! Exercises are loaded wholesale from JSON at selection time and are
//! immutable afterwards. Parsing validates the structural invariants up
//! front (equal-length note/fingering/timing arrays, fingering digits in
//! range) so that playback never indexes out of bounds.

use crate::error::{Error, Result};
use crate::notes::{Dynamic, Note};
use crate::sink::Tone;
use crate::timing::TimeSignature;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Which hand a part belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hand {
    Right,
    Left,
}

impl Hand {
    pub fn name(self) -> &'static str {
        match self {
            Hand::Right => "right",
            Hand::Left => "left",
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Language-keyed text, e.g. `{"fr": "...", "en": "..."}`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct LocalizedText(pub HashMap<String, String>);

impl LocalizedText {
    /// Text for a language, falling back to any available one.
    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0
            .get(lang)
            .or_else(|| self.0.values().next())
            .map(String::as_str)
    }
}

/// Language-keyed string lists. A plain string value is accepted and
/// treated as a one-element list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalizedList(pub HashMap<String, Vec<String>>);

impl LocalizedList {
    pub fn get(&self, lang: &str) -> Option<&[String]> {
        self.0
            .get(lang)
            .or_else(|| self.0.values().next())
            .map(Vec::as_slice)
    }
}

impl<'de> Deserialize<'de> for LocalizedList {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(String),
            Many(Vec<String>),
        }

        let raw: HashMap<String, OneOrMany> = HashMap::deserialize(deserializer)?;
        Ok(LocalizedList(
            raw.into_iter()
                .map(|(lang, v)| {
                    let list = match v {
                        OneOrMany::One(s) => vec![s],
                        OneOrMany::Many(v) => v,
                    };
                    (lang, list)
                })
                .collect(),
        ))
    }
}

/// Recommended tempo plus the allowed practice range, in BPM.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TempoSpec {
    pub recommended: f64,
    pub min: f64,
    pub max: f64,
    pub unit: String,
}

impl Default for TempoSpec {
    fn default() -> Self {
        Self {
            recommended: 72.0,
            min: 60.0,
            max: 120.0,
            unit: "bpm".to_string(),
        }
    }
}

impl TempoSpec {
    /// Clamp a requested tempo into the exercise's practice range.
    pub fn clamp(&self, bpm: f64) -> f64 {
        bpm.clamp(self.min, self.max)
    }
}

/// One measure of one hand: parallel notes/fingering/timing plus a
/// single dynamic marking for the measure.
#[derive(Clone, Debug, PartialEq)]
pub struct Measure {
    /// 1-based measure number.
    pub number: u32,
    /// Note per slot; `None` is a rest.
    pub notes: Vec<Option<Note>>,
    /// Fingering digit (1-5) per slot; 0 for rests.
    pub fingering: Vec<u8>,
    /// Beat offset of each slot within the measure.
    pub timing: Vec<f64>,
    /// Dynamic marking for the whole measure.
    pub dynamics: Dynamic,
}

/// One hand's sequence of measures.
#[derive(Clone, Debug, PartialEq)]
pub struct HandPart {
    pub measures: Vec<Measure>,
}

impl HandPart {
    /// Find a measure by its 1-based number.
    pub fn measure(&self, number: u32) -> Option<&Measure> {
        self.measures.iter().find(|m| m.number == number)
    }
}

/// A two-hand exercise plus its descriptive metadata.
#[derive(Clone, Debug)]
pub struct Exercise {
    pub id: String,
    pub title: LocalizedText,
    pub composer: String,
    pub difficulty: String,
    pub category: String,
    /// Suggested practice length, free-form prose like "5-10 minutes".
    pub duration: String,
    pub tempo: TempoSpec,
    pub time_signature: TimeSignature,
    pub key: String,
    pub description: LocalizedText,
    pub objectives: LocalizedList,
    pub instructions: LocalizedList,
    pub practice_notes: LocalizedText,
    pub right_hand: HandPart,
    pub left_hand: HandPart,
    pub tags: Vec<String>,
}

/// Entry of the exercise list file used to populate a selection control.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSummary {
    pub id: String,
    #[serde(default)]
    pub title: LocalizedText,
    #[serde(default)]
    pub composer: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

// Wire-format structs: the on-disk schema is camelCase JSON with string
// notes and a per-measure dynamics marking, converted and validated into
// the typed model above.

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExerciseFile {
    id: String,
    #[serde(default)]
    title: LocalizedText,
    #[serde(default)]
    composer: String,
    #[serde(default)]
    difficulty: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    duration: String,
    #[serde(default)]
    tempo: TempoSpec,
    #[serde(default)]
    time_signature: Option<String>,
    #[serde(default)]
    key: String,
    #[serde(default)]
    description: LocalizedText,
    #[serde(default)]
    objectives: LocalizedList,
    #[serde(default)]
    instructions: LocalizedList,
    #[serde(default)]
    practice_notes: LocalizedText,
    right_hand: HandPartFile,
    left_hand: HandPartFile,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct HandPartFile {
    measures: Vec<MeasureFile>,
}

#[derive(Deserialize)]
struct MeasureFile {
    measure: u32,
    notes: Vec<Option<String>>,
    #[serde(default)]
    fingering: Vec<u8>,
    #[serde(default)]
    timing: Vec<f64>,
    #[serde(default)]
    dynamics: Option<String>,
}

impl Exercise {
    /// Parse and validate an exercise from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ExerciseFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidExercise(e.to_string()))?;
        Self::from_file(file)
    }

    fn from_file(file: ExerciseFile) -> Result<Self> {
        let time_signature = match file.time_signature {
            Some(s) => s.parse()?,
            None => TimeSignature::default(),
        };

        if file.tempo.min > file.tempo.max {
            return Err(Error::InvalidExercise(format!(
                "tempo range is inverted ({} > {})",
                file.tempo.min, file.tempo.max
            )));
        }

        let right_hand = convert_hand(Hand::Right, file.right_hand)?;
        let left_hand = convert_hand(Hand::Left, file.left_hand)?;

        Ok(Exercise {
            id: file.id,
            title: file.title,
            composer: file.composer,
            difficulty: file.difficulty,
            category: file.category,
            duration: file.duration,
            tempo: file.tempo,
            time_signature,
            key: file.key,
            description: file.description,
            objectives: file.objectives,
            instructions: file.instructions,
            practice_notes: file.practice_notes,
            right_hand,
            left_hand,
            tags: file.tags,
        })
    }

    pub fn hand(&self, hand: Hand) -> &HandPart {
        match hand {
            Hand::Right => &self.right_hand,
            Hand::Left => &self.left_hand,
        }
    }

    /// Total measure count, the longer of the two hands.
    pub fn total_measures(&self) -> usize {
        self.right_hand.measures.len().max(self.left_hand.measures.len())
    }

    /// Measure of a hand by 1-based number.
    pub fn measure(&self, hand: Hand, number: u32) -> Option<&Measure> {
        self.hand(hand).measure(number)
    }

    /// Expand one measure of one hand into `(onset_seconds, tone)` pairs
    /// at the given tempo, honoring the measure's timing array. Rests
    /// produce no tone.
    pub fn measure_events(&self, hand: Hand, number: u32, bpm: f64) -> Vec<(f64, Tone)> {
        let Some(measure) = self.measure(hand, number) else {
            return Vec::new();
        };
        let beat_duration = 60.0 / bpm;

        measure
            .notes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let note = slot.as_ref()?;
                let onset = measure.timing.get(i).copied().unwrap_or(i as f64 * 0.5)
                    * beat_duration;
                let tone =
                    Tone::new(note.frequency(), 0.5).with_dynamic(measure.dynamics);
                Some((onset, tone))
            })
            .collect()
    }
}

fn convert_hand(hand: Hand, file: HandPartFile) -> Result<HandPart> {
    if file.measures.is_empty() {
        return Err(Error::InvalidExercise(format!(
            "{hand} hand has no measures"
        )));
    }

    let measures = file
        .measures
        .into_iter()
        .map(|m| convert_measure(hand, m))
        .collect::<Result<Vec<_>>>()?;

    Ok(HandPart { measures })
}

fn convert_measure(hand: Hand, file: MeasureFile) -> Result<Measure> {
    let slots = file.notes.len();
    if file.fingering.len() != slots || file.timing.len() != slots {
        return Err(Error::InvalidExercise(format!(
            "{hand} hand measure {}: notes/fingering/timing lengths differ \
             ({slots}/{}/{})",
            file.measure,
            file.fingering.len(),
            file.timing.len()
        )));
    }

    let mut notes = Vec::with_capacity(slots);
    for (i, slot) in file.notes.into_iter().enumerate() {
        let note = match slot.as_deref() {
            None | Some("") => None,
            Some(name) => Some(name.parse::<Note>().map_err(|_| {
                Error::InvalidExercise(format!(
                    "{hand} hand measure {} slot {}: bad note '{}'",
                    file.measure,
                    i + 1,
                    name
                ))
            })?),
        };

        if note.is_some() {
            let digit = file.fingering[i];
            if !(1..=5).contains(&digit) {
                return Err(Error::InvalidExercise(format!(
                    "{hand} hand measure {} slot {}: fingering {} outside 1-5",
                    file.measure,
                    i + 1,
                    digit
                )));
            }
        }

        notes.push(note);
    }

    Ok(Measure {
        number: file.measure,
        notes,
        fingering: file.fingering,
        timing: file.timing,
        dynamics: Dynamic::from_name(file.dynamics.as_deref().unwrap_or("mf")),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    /// A minimal valid single-measure exercise used across test modules.
    pub const ONE_MEASURE_JSON: &str = r#"{
        "id": "test-01",
        "title": {"en": "Test exercise"},
        "composer": "Nobody",
        "tempo": {"recommended": 120, "min": 60, "max": 160, "unit": "bpm"},
        "timeSignature": "4/4",
        "rightHand": {"measures": [{
            "measure": 1,
            "notes": ["C4", "E4", "F4", "G4", "A4", "G4", "F4", "E4"],
            "fingering": [1, 2, 3, 4, 5, 4, 3, 2],
            "timing": [0, 0.5, 1, 1.5, 2, 2.5, 3, 3.5],
            "dynamics": "mf"
        }]},
        "leftHand": {"measures": [{
            "measure": 1,
            "notes": ["C3", "E3", "F3", "G3", "A3", "G3", "F3", "E3"],
            "fingering": [5, 4, 3, 2, 1, 2, 3, 4],
            "timing": [0, 0.5, 1, 1.5, 2, 2.5, 3, 3.5],
            "dynamics": "p"
        }]}
    }"#;
}
