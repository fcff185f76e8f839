//! Prompt detection over a stream of process output.
//!
//! This module provides:
//! - [`PromptMatcher`]: the compiled set of patterns to wait for
//! - [`OutputStream`]: buffered output fed by a reader thread, with
//!   "read until match or timeout" semantics
//!
//! Output is buffered as raw bytes so multi-byte characters split across
//! reads are never mangled; text is decoded only once a match fixes the
//! boundaries.

use regex::bytes::{Regex, RegexBuilder};
use replscribe_types::{ProfileError, ReplProfile, Timeout};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::trace;

/// One message from the reader side of a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    Data(Vec<u8>),
    /// The process closed its output.
    Eof,
    /// Reading failed for a reason other than hangup.
    Fault(String),
}

/// A successful wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMatch {
    /// Output preceding the match.
    pub pre: String,
    /// The matched prompt text.
    pub matched: String,
    /// Index of the pattern that matched.
    pub pattern_index: usize,
}

/// Why a wait ended without a match.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    #[error("timed out, received '{received}'")]
    TimedOut { received: String },

    #[error("end of stream, received '{received}'")]
    EndOfStream { received: String },

    #[error("process fault: {0}")]
    Fault(String),
}

/// Compiled prompt patterns.
#[derive(Debug, Clone)]
pub struct PromptMatcher {
    patterns: Vec<String>,
    regexes: Vec<Regex>,
}

/// Location of the winning match in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl PromptMatcher {
    /// Patterns matched as exact text.
    pub fn literal(patterns: Vec<String>) -> Result<Self, regex::Error> {
        let escaped: Vec<String> = patterns.iter().map(|p| regex::escape(p)).collect();
        Self::compile(patterns, &escaped)
    }

    /// Patterns matched as regular expressions (`.` also matches newlines).
    pub fn regex(patterns: Vec<String>) -> Result<Self, regex::Error> {
        let sources = patterns.clone();
        Self::compile(patterns, &sources)
    }

    fn compile(patterns: Vec<String>, sources: &[String]) -> Result<Self, regex::Error> {
        let regexes = sources
            .iter()
            .map(|s| RegexBuilder::new(s).dot_matches_new_line(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns, regexes })
    }

    /// Matcher for the prompts expected after every line.
    pub fn for_prompts(profile: &ReplProfile) -> Result<Self, ProfileError> {
        let terms = profile.search_terms();
        let compiled = if profile.uses_regex() {
            Self::regex(terms)
        } else {
            Self::literal(terms)
        };
        compiled.map_err(|source| ProfileError::InvalidPattern {
            profile: profile.name.clone(),
            field: "prompt_regex",
            source,
        })
    }

    /// Matcher for the first prompt after spawn: `initial_prompt` when set,
    /// otherwise the regular prompts.
    pub fn for_initial_prompt(profile: &ReplProfile) -> Result<Self, ProfileError> {
        match &profile.initial_prompt {
            Some(initial) => Self::regex(vec![initial.clone()]).map_err(|source| {
                ProfileError::InvalidPattern {
                    profile: profile.name.clone(),
                    field: "initial_prompt",
                    source,
                }
            }),
            None => Self::for_prompts(profile),
        }
    }

    /// Source patterns, for diagnostics.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Earliest match in `haystack`; ties go to the lower pattern index.
    pub fn find(&self, haystack: &[u8]) -> Option<Found> {
        let mut best: Option<Found> = None;
        for (index, regex) in self.regexes.iter().enumerate() {
            if let Some(m) = regex.find(haystack) {
                if best.is_none_or(|b| m.start() < b.start) {
                    best = Some(Found {
                        index,
                        start: m.start(),
                        end: m.end(),
                    });
                }
            }
        }
        best
    }
}

#[derive(Debug)]
enum StreamEnd {
    Eof,
    Fault(String),
}

/// Output of a process, buffered until a prompt is matched.
#[derive(Debug)]
pub struct OutputStream {
    rx: mpsc::UnboundedReceiver<OutputChunk>,
    buffer: Vec<u8>,
    end: Option<StreamEnd>,
}

impl OutputStream {
    pub fn new(rx: mpsc::UnboundedReceiver<OutputChunk>) -> Self {
        Self {
            rx,
            buffer: Vec::new(),
            end: None,
        }
    }

    /// A stream plus the sender that feeds it.
    pub fn channel() -> (mpsc::UnboundedSender<OutputChunk>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    /// Output received but not yet consumed by a match.
    pub fn pending(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }

    /// Wait until `matcher` matches buffered output.
    ///
    /// Already-buffered output is searched before waiting, including after
    /// the stream has ended. Output after the match stays buffered.
    pub async fn read_until(
        &mut self,
        matcher: &PromptMatcher,
        timeout: Timeout,
    ) -> Result<PromptMatch, WaitError> {
        let deadline = timeout.duration().map(|d| Instant::now() + d);

        loop {
            if let Some(found) = matcher.find(&self.buffer) {
                return Ok(self.take(found));
            }

            match &self.end {
                Some(StreamEnd::Eof) => {
                    let received = self.pending();
                    self.buffer.clear();
                    return Err(WaitError::EndOfStream { received });
                }
                Some(StreamEnd::Fault(message)) => return Err(WaitError::Fault(message.clone())),
                None => {}
            }

            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        return Err(WaitError::TimedOut {
                            received: self.pending(),
                        })
                    }
                },
                None => self.rx.recv().await,
            };

            match next {
                Some(OutputChunk::Data(bytes)) => {
                    trace!(
                        target: "replscribe::matcher",
                        "Output ({} bytes): {}",
                        bytes.len(),
                        String::from_utf8_lossy(&bytes)
                    );
                    self.buffer.extend_from_slice(&bytes);
                }
                Some(OutputChunk::Eof) | None => self.end = Some(StreamEnd::Eof),
                Some(OutputChunk::Fault(message)) => self.end = Some(StreamEnd::Fault(message)),
            }
        }
    }

    fn take(&mut self, found: Found) -> PromptMatch {
        let pre = String::from_utf8_lossy(&self.buffer[..found.start]).into_owned();
        let matched = String::from_utf8_lossy(&self.buffer[found.start..found.end]).into_owned();
        self.buffer.drain(..found.end);
        PromptMatch {
            pre,
            matched,
            pattern_index: found.index,
        }
    }
}

/// Per-character dump of `text`, one `chr NN: CODE` line per character.
pub fn char_dump(text: &str) -> String {
    text.chars()
        .enumerate()
        .map(|(i, c)| format!("chr {:02}: {}\n", i, c as u32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_literal_patterns_are_escaped() {
        let matcher = PromptMatcher::literal(terms(&["\n...", "\n>>>"])).unwrap();
        assert!(matcher.find(b"abc").is_none());
        let found = matcher.find(b"x\n>>> ").unwrap();
        assert_eq!((found.index, found.start, found.end), (1, 1, 5));
    }

    #[test]
    fn test_earliest_match_wins() {
        let matcher = PromptMatcher::literal(terms(&["\n>>>", "\n..."])).unwrap();
        let found = matcher.find(b"a\n... b\n>>> ").unwrap();
        assert_eq!(found.index, 1);
        assert_eq!(found.start, 1);
    }

    #[test]
    fn test_tie_goes_to_first_pattern() {
        let matcher = PromptMatcher::regex(terms(&["\n>", "\n>>"])).unwrap();
        let found = matcher.find(b"\n>> ").unwrap();
        assert_eq!(found.index, 0);
    }

    #[test]
    fn test_for_initial_prompt_falls_back_to_prompts() {
        let profile = ReplProfile::new("py", "python");
        let matcher = PromptMatcher::for_initial_prompt(&profile).unwrap();
        assert_eq!(matcher.patterns(), &["\n>>>", "\n..."]);

        let profile = ReplProfile {
            initial_prompt: Some("^>>".into()),
            ..profile
        };
        let matcher = PromptMatcher::for_initial_prompt(&profile).unwrap();
        assert_eq!(matcher.patterns(), &["^>>"]);
        assert!(matcher.find(b"x>>").is_none());
        assert!(matcher.find(b">> ").is_some());
    }

    #[test]
    fn test_invalid_regex_is_configuration_error() {
        let profile = ReplProfile {
            prompt_regex: Some("[".into()),
            ..ReplProfile::new("bad", "sh")
        };
        assert!(matches!(
            PromptMatcher::for_prompts(&profile),
            Err(ProfileError::InvalidPattern { field: "prompt_regex", .. })
        ));
    }

    #[test]
    fn test_char_dump() {
        assert_eq!(char_dump("a\r"), "chr 00: 97\nchr 01: 13\n");
        assert_eq!(char_dump(""), "");
    }

    #[tokio::test]
    async fn test_read_until_across_chunks() {
        let (tx, mut stream) = OutputStream::channel();
        let matcher = PromptMatcher::literal(terms(&["\n>>>"])).unwrap();

        tx.send(OutputChunk::Data(b"2\n>".to_vec())).unwrap();
        tx.send(OutputChunk::Data(b">> rest".to_vec())).unwrap();

        let m = stream.read_until(&matcher, Timeout::secs(1)).await.unwrap();
        assert_eq!(m.pre, "2");
        assert_eq!(m.matched, "\n>>>");
        assert_eq!(stream.pending(), " rest");
    }

    #[tokio::test]
    async fn test_read_until_times_out_with_received_text() {
        let (tx, mut stream) = OutputStream::channel();
        let matcher = PromptMatcher::literal(terms(&["\n>>>"])).unwrap();
        tx.send(OutputChunk::Data(b"partial".to_vec())).unwrap();

        let err = stream
            .read_until(&matcher, Timeout::millis(50))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            WaitError::TimedOut {
                received: "partial".into()
            }
        );
    }

    #[tokio::test]
    async fn test_buffer_searched_before_eof() {
        let (tx, mut stream) = OutputStream::channel();
        let matcher = PromptMatcher::literal(terms(&["\n$"])).unwrap();
        tx.send(OutputChunk::Data(b"out\n$ tail".to_vec())).unwrap();
        tx.send(OutputChunk::Eof).unwrap();

        let m = stream.read_until(&matcher, Timeout::secs(1)).await.unwrap();
        assert_eq!(m.pre, "out");

        let err = stream.read_until(&matcher, Timeout::secs(1)).await.unwrap_err();
        assert_eq!(
            err,
            WaitError::EndOfStream {
                received: " tail".into()
            }
        );
    }

    #[tokio::test]
    async fn test_dropped_sender_is_eof() {
        let (tx, mut stream) = OutputStream::channel();
        drop(tx);
        let matcher = PromptMatcher::literal(terms(&["\n>>>"])).unwrap();
        let err = stream.read_until(&matcher, Timeout::Never).await.unwrap_err();
        assert!(matches!(err, WaitError::EndOfStream { .. }));
    }

    #[tokio::test]
    async fn test_fault_reported() {
        let (tx, mut stream) = OutputStream::channel();
        tx.send(OutputChunk::Fault("boom".into())).unwrap();
        let matcher = PromptMatcher::literal(terms(&["\n>>>"])).unwrap();
        let err = stream.read_until(&matcher, Timeout::secs(1)).await.unwrap_err();
        assert_eq!(err, WaitError::Fault("boom".into()));
    }
}
