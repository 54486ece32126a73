//! On-disk exercise library.
//!
//! A library is a directory holding an `exercise-list.json` index plus one
//! `<id>.json` file per exercise. Exercises are parsed once and cached.

use crate::error::{Error, Result};
use crate::exercise::{Exercise, ExerciseSummary};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LIST_FILE: &str = "exercise-list.json";

/// The index file wraps its entries in an `exercises` key.
#[derive(Deserialize)]
struct ExerciseList {
    exercises: Vec<ExerciseSummary>,
}

pub struct ExerciseLibrary {
    dir: PathBuf,
    cache: HashMap<String, Arc<Exercise>>,
    current: Option<Arc<Exercise>>,
}

impl ExerciseLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: HashMap::new(),
            current: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the index file listing the available exercises.
    pub fn load_list(&self) -> Result<Vec<ExerciseSummary>> {
        let path = self.dir.join(LIST_FILE);
        let text = read_file(&path)?;
        let list: ExerciseList =
            serde_json::from_str(&text).map_err(|source| Error::Json { path, source })?;
        Ok(list.exercises)
    }

    /// Load an exercise by id, parsing and validating it on first use.
    /// The loaded exercise becomes the current one.
    pub fn load_exercise(&mut self, id: &str) -> Result<Arc<Exercise>> {
        if let Some(cached) = self.cache.get(id) {
            let ex = Arc::clone(cached);
            self.current = Some(Arc::clone(&ex));
            return Ok(ex);
        }

        let path = self.dir.join(format!("{id}.json"));
        if !path.is_file() {
            return Err(Error::ExerciseNotFound(id.to_string()));
        }
        let text = read_file(&path)?;
        let exercise = Arc::new(Exercise::from_json(&text)?);
        log::info!(
            "loaded exercise '{}' ({} measures)",
            exercise.id,
            exercise.total_measures()
        );

        self.cache.insert(id.to_string(), Arc::clone(&exercise));
        self.current = Some(Arc::clone(&exercise));
        Ok(exercise)
    }

    /// An already-loaded exercise, without touching the filesystem.
    pub fn get(&self, id: &str) -> Option<Arc<Exercise>> {
        self.cache.get(id).cloned()
    }

    pub fn current(&self) -> Option<Arc<Exercise>> {
        self.current.clone()
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}
