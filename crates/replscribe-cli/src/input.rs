//! Section file reading and transcript writing.

use anyhow::{Context, Result};
use replscribe_types::Sections;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Key given to a plain-text input file.
pub const SINGLE_SECTION_KEY: &str = "1";

/// Read sections from `path`.
///
/// A `.json` file holds an array of `{"key", "text"}` objects; anything else
/// is one section keyed [`SINGLE_SECTION_KEY`].
pub fn read_sections(path: &Path) -> Result<Sections> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {:?}", path))?;

    if path.extension().is_some_and(|e| e == "json") {
        let sections: Sections = serde_json::from_str(&content)
            .with_context(|| format!("Invalid section file {:?}", path))?;
        return Ok(sections);
    }

    Ok([(SINGLE_SECTION_KEY, content)].into_iter().collect())
}

#[derive(Serialize)]
struct TranscriptEntry<'a> {
    key: &'a str,
    transcript: &'a str,
}

/// Write `transcripts` as a JSON array of `{"key", "transcript"}` objects.
pub fn write_transcripts(transcripts: &Sections, mut out: impl Write) -> Result<()> {
    let entries: Vec<TranscriptEntry<'_>> = transcripts
        .iter()
        .map(|(key, transcript)| TranscriptEntry { key, transcript })
        .collect();
    serde_json::to_writer_pretty(&mut out, &entries)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
