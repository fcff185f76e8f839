//! Common test utilities for integration tests.

#![allow(dead_code)]

use replscribe_core::{
    CloseWarning, OutputChunk, OutputStream, ProcessSession, PromptMatch, PromptMatcher,
    ReplChannel, Result, RunSummary, SectionDriver, WaitError,
};
use replscribe_types::{ReplProfile, Sections, Timeout};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

/// What the scripted interpreter does with one input line.
pub enum Reply {
    /// Print this text.
    Output(String),
    /// Print nothing.
    Silent,
    /// Print this text, then close the output.
    Exit(String),
    /// Fail the output stream with this message.
    Fault(String),
}

type Responder = Box<dyn FnMut(&str) -> Reply + Send>;

/// An in-process interpreter driven by a responder closure.
pub struct ScriptedRepl {
    stream: OutputStream,
    tx: Option<UnboundedSender<OutputChunk>>,
    respond: Responder,
    partial: String,
    sent: Arc<Mutex<Vec<String>>>,
    exit_code: Option<u32>,
    close_warning: Option<String>,
}

impl ScriptedRepl {
    /// Prints `banner` at start and answers each line with `respond`.
    pub fn new(banner: &str, respond: impl FnMut(&str) -> Reply + Send + 'static) -> Self {
        let (tx, stream) = OutputStream::channel();
        if !banner.is_empty() {
            tx.send(OutputChunk::Data(banner.as_bytes().to_vec())).unwrap();
        }
        Self {
            stream,
            tx: Some(tx),
            respond: Box::new(respond),
            partial: String::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            exit_code: Some(0),
            close_warning: None,
        }
    }

    /// Exit code reported by `close`.
    pub fn with_exit_code(mut self, code: Option<u32>) -> Self {
        self.exit_code = code;
        self
    }

    /// Make `close` report that termination could not be confirmed.
    pub fn with_close_warning(mut self, reason: &str) -> Self {
        self.close_warning = Some(reason.to_string());
        self
    }

    /// Shared log of every line received.
    pub fn sent_lines(&self) -> Arc<Mutex<Vec<String>>> {
        self.sent.clone()
    }

    fn emit(&self, text: &str) {
        if let Some(tx) = &self.tx {
            // split in two to exercise matching across chunks
            let mid = text.char_indices().nth(text.chars().count() / 2).map_or(0, |(i, _)| i);
            let (a, b) = text.split_at(mid);
            for part in [a, b] {
                if !part.is_empty() {
                    let _ = tx.send(OutputChunk::Data(part.as_bytes().to_vec()));
                }
            }
        }
    }
}

impl ReplChannel for ScriptedRepl {
    async fn read_until(
        &mut self,
        matcher: &PromptMatcher,
        timeout: Timeout,
    ) -> std::result::Result<PromptMatch, WaitError> {
        self.stream.read_until(matcher, timeout).await
    }

    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        if self.tx.is_none() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "interpreter has exited",
            ));
        }
        self.partial.push_str(&String::from_utf8_lossy(data));
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            let line = line.trim_end_matches('\n').to_string();
            self.sent.lock().unwrap().push(line.clone());
            match (self.respond)(&line) {
                Reply::Output(text) => self.emit(&text),
                Reply::Silent => {}
                Reply::Fault(message) => {
                    if let Some(tx) = &self.tx {
                        let _ = tx.send(OutputChunk::Fault(message));
                    }
                }
                Reply::Exit(text) => {
                    self.emit(&text);
                    if let Some(tx) = self.tx.take() {
                        let _ = tx.send(OutputChunk::Eof);
                    }
                }
            }
        }
        Ok(())
    }

    async fn close(self) -> std::result::Result<Option<u32>, CloseWarning> {
        match self.close_warning {
            Some(reason) => Err(CloseWarning::new(Some(4242), reason)),
            None => Ok(self.exit_code),
        }
    }
}

/// Responder behaving like `python -i` on a PTY: echoes the line, prints the
/// result of `a+b` sums, then a fresh `>>> ` prompt.
pub fn python_like(line: &str) -> Reply {
    let result = match line.split_once('+') {
        Some((a, b)) => match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
            (Ok(a), Ok(b)) => format!("{}\r\n", a + b),
            _ => String::new(),
        },
        None => String::new(),
    };
    Reply::Output(format!("{}\r\n{}>>> ", line, result))
}

/// Profile matching [`python_like`].
pub fn python_profile() -> ReplProfile {
    ReplProfile {
        initial_prompt: Some(">>>".into()),
        line_timeout: Timeout::secs(2),
        initial_prompt_timeout: Timeout::secs(2),
        ..ReplProfile::new("python", "python")
    }
}

pub fn sections(items: &[(&str, &str)]) -> Sections {
    items.iter().copied().collect()
}

/// Run `sections` through `repl`, collecting raw transcripts.
pub async fn drive(
    profile: &ReplProfile,
    repl: ScriptedRepl,
    input: &Sections,
) -> Result<(Sections, RunSummary)> {
    let session = ProcessSession::with_channel(profile, repl)?;
    let mut raw = Sections::new();
    let summary = SectionDriver::new(profile)?
        .drive(session, input, |key, text| raw.insert(key, text))
        .await?;
    Ok((raw, summary))
}

/// Like [`drive`], with trailing prompts stripped.
pub async fn drive_final(
    profile: &ReplProfile,
    repl: ScriptedRepl,
    input: &Sections,
) -> Result<Sections> {
    let trimmer = replscribe_core::trimmer(profile)?;
    let (raw, _) = drive(profile, repl, input).await?;
    Ok(raw
        .iter()
        .map(|(k, v)| (k.to_string(), trimmer.strip(v, &profile.line_ending)))
        .collect())
}
