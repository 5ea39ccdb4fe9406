use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::DictionaryError;

static DICTIONARY_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/dictionaries");

/// One English/Japanese word pair
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Word {
    pub english: String,
    pub japanese: String,
}

impl Word {
    pub fn new(english: impl Into<String>, japanese: impl Into<String>) -> Self {
        Self {
            english: english.into(),
            japanese: japanese.into(),
        }
    }
}

/// A named pool of words
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Dictionary {
    pub name: String,
    pub words: Vec<Word>,
}

/// Which side of the word pair a search term is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SearchMode {
    English,
    Japanese,
}

impl Dictionary {
    /// Parse a dictionary from its JSON form; `origin` names the source in errors
    pub fn from_json(origin: &str, json: &str) -> Result<Self, DictionaryError> {
        let dictionary: Dictionary =
            serde_json::from_str(json).map_err(|source| DictionaryError::Parse {
                origin: origin.to_string(),
                source,
            })?;

        if dictionary.words.is_empty() {
            return Err(DictionaryError::Empty {
                name: dictionary.name,
            });
        }
        Ok(dictionary)
    }

    /// Words matching `term`. An empty term matches everything; English
    /// matching ignores case.
    pub fn search(&self, term: &str, mode: SearchMode) -> Vec<&Word> {
        if term.is_empty() {
            return self.words.iter().collect();
        }

        match mode {
            SearchMode::English => {
                let term = term.to_lowercase();
                self.words
                    .iter()
                    .filter(|word| word.english.to_lowercase().contains(&term))
                    .collect()
            }
            SearchMode::Japanese => self
                .words
                .iter()
                .filter(|word| word.japanese.contains(term))
                .collect(),
        }
    }

    /// Case-insensitive lookup by English spelling
    pub fn find(&self, english: &str) -> Option<&Word> {
        let english = english.trim().to_lowercase();
        self.words
            .iter()
            .find(|word| word.english.to_lowercase() == english)
    }
}

/// The dictionaries bundled with the binary, in file order
pub fn builtin() -> Result<Vec<Dictionary>, DictionaryError> {
    let mut files: Vec<_> = DICTIONARY_DIR
        .files()
        .filter(|file| file.path().extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort_by(|a, b| a.path().cmp(b.path()));

    files
        .into_iter()
        .map(|file| {
            let origin = file.path().display().to_string();
            let contents = file.contents_utf8().ok_or_else(|| DictionaryError::Parse {
                origin: origin.clone(),
                source: serde::de::Error::custom("file is not valid UTF-8"),
            })?;
            Dictionary::from_json(&origin, contents)
        })
        .collect()
}

/// A bundled dictionary by name, ignoring case
pub fn builtin_named(name: &str) -> Result<Dictionary, DictionaryError> {
    builtin()?
        .into_iter()
        .find(|dictionary| dictionary.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| DictionaryError::NotFound(name.to_string()))
}

/// Read a dictionary from a JSON file on disk
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Dictionary, DictionaryError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| DictionaryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Dictionary::from_json(&path.display().to_string(), &contents)
}
