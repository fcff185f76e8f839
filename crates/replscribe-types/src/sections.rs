//! Ordered section maps.

use serde::{Deserialize, Serialize};

/// One keyed block of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub key: String,
    pub text: String,
}

/// Insertion-ordered mapping from section key to text.
///
/// Used both for input source text and for the captured transcripts, which
/// keep the input's keys and order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sections {
    entries: Vec<Section>,
}

impl Sections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        let key = key.into();
        let text = text.into();
        match self.entries.iter_mut().find(|s| s.key == key) {
            Some(existing) => existing.text = text,
            None => self.entries.push(Section { key, text }),
        }
    }

    /// Add a section after all others. Refuses a key that is already present.
    pub fn append(&mut self, key: impl Into<String>, text: impl Into<String>) -> Result<(), String> {
        let key = key.into();
        if self.contains_key(&key) {
            return Err(key);
        }
        self.entries.push(Section {
            key,
            text: text.into(),
        });
        Ok(())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|s| s.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|s| s.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|s| (s.key.as_str(), s.text.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Sections {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut sections = Sections::new();
        for (key, text) in iter {
            sections.insert(key, text);
        }
        sections
    }
}

impl From<Vec<Section>> for Sections {
    fn from(entries: Vec<Section>) -> Self {
        entries.into_iter().map(|s| (s.key, s.text)).collect()
    }
}
