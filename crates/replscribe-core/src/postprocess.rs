//! Cleanup of captured transcripts.

use regex::Regex;

/// Echo artifact the PTY leaves in front of carriage returns.
///
/// Removed literally; other carriage returns are left alone.
pub const ECHO_ARTIFACT: &str = " \r";

/// Remove every [`ECHO_ARTIFACT`] from `text`.
pub fn remove_echo_artifact(text: &str) -> String {
    text.replace(ECHO_ARTIFACT, "")
}

/// Split on `\n`, `\r\n` and lone `\r`. A trailing terminator does not
/// produce an empty last line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Drops trailing blank lines and prompt remnants from transcripts.
#[derive(Debug, Clone)]
pub struct PromptTrimmer {
    line: Regex,
}

impl PromptTrimmer {
    pub fn new(trim_pattern: &str) -> Result<Self, regex::Error> {
        let line = Regex::new(&format!(r"^\s*(?:{})\s*$|^\s*$", trim_pattern))?;
        Ok(Self { line })
    }

    /// Remove trailing lines that are blank or match the trim pattern, then
    /// rejoin the rest with `line_ending`. Applying it twice changes nothing.
    pub fn strip(&self, text: &str, line_ending: &str) -> String {
        let mut lines = split_lines(text);
        while lines.last().is_some_and(|last| self.line.is_match(last)) {
            lines.pop();
        }
        lines.join(line_ending)
    }
}

/// One-shot form of [`PromptTrimmer::strip`].
pub fn strip_trailing_prompts(
    text: &str,
    trim_pattern: &str,
    line_ending: &str,
) -> Result<String, regex::Error> {
    Ok(PromptTrimmer::new(trim_pattern)?.strip(text, line_ending))
}

/// Remove all matches of `pattern`.
pub fn strip_pattern(text: &str, pattern: &Regex) -> String {
    pattern.replace_all(text, "").into_owned()
}
