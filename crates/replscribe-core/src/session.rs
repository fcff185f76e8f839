//! One interpreter session: prompt synchronization and line sending.

use crate::matcher::{char_dump, PromptMatch, PromptMatcher, WaitError};
use crate::process::{PtyChannel, ReplChannel};
use crate::{CloseWarning, ReplError, Result};
use replscribe_types::{ReplProfile, Timeout};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// A live interpreter plus the patterns that delimit its output.
pub struct ProcessSession<C = PtyChannel> {
    channel: C,
    initial: PromptMatcher,
    prompts: PromptMatcher,
    line_ending: String,
}

impl ProcessSession<PtyChannel> {
    /// Start the profile's interpreter on a PTY.
    pub fn spawn(
        profile: &ReplProfile,
        working_directory: &Path,
        env: &HashMap<String, String>,
    ) -> Result<Self> {
        let (initial, prompts) = matchers(profile)?;
        let channel = PtyChannel::spawn(&profile.argv(), working_directory, env)?;
        Ok(Self {
            channel,
            initial,
            prompts,
            line_ending: profile.line_ending.clone(),
        })
    }
}

impl<C: ReplChannel> ProcessSession<C> {
    /// Wrap an already running interpreter.
    pub fn with_channel(profile: &ReplProfile, channel: C) -> Result<Self> {
        let (initial, prompts) = matchers(profile)?;
        Ok(Self {
            channel,
            initial,
            prompts,
            line_ending: profile.line_ending.clone(),
        })
    }

    /// Patterns watched for after each line.
    pub fn search_terms(&self) -> &[String] {
        self.prompts.patterns()
    }

    /// Wait for the banner / first prompt.
    pub async fn await_initial_prompt(&mut self, timeout: Timeout) -> Result<PromptMatch> {
        debug!(target: "replscribe::process", "Capturing initial prompt...");
        match self.channel.read_until(&self.initial, timeout).await {
            Ok(m) => {
                debug!(target: "replscribe::process", "Initial prompt captured: {:?}", m.matched);
                Ok(m)
            }
            Err(WaitError::TimedOut { received }) => Err(ReplError::InitialPromptTimeout {
                timeout,
                char_dump: char_dump(&received),
                received,
                patterns: self.initial.patterns().to_vec(),
            }),
            Err(WaitError::EndOfStream { received }) => Err(ReplError::EndOfStream {
                section: "<initial prompt>".to_string(),
                received,
            }),
            Err(WaitError::Fault(message)) => Err(ReplError::Process(message)),
        }
    }

    /// Wait for any of the search terms.
    pub async fn await_prompt(
        &mut self,
        timeout: Timeout,
    ) -> std::result::Result<PromptMatch, WaitError> {
        self.channel.read_until(&self.prompts, timeout).await
    }

    /// Send `line` (trailing whitespace trimmed) followed by the line ending.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut data = line.trim_end().to_string();
        data.push_str(&self.line_ending);
        self.channel
            .write_all(data.as_bytes())
            .await
            .map_err(|e| ReplError::Process(format!("failed to send line: {}", e)))
    }

    /// End the session. No sends are possible afterwards.
    pub async fn close(self) -> std::result::Result<Option<u32>, CloseWarning> {
        self.channel.close().await
    }
}

fn matchers(profile: &ReplProfile) -> Result<(PromptMatcher, PromptMatcher)> {
    Ok((
        PromptMatcher::for_initial_prompt(profile)?,
        PromptMatcher::for_prompts(profile)?,
    ))
}
