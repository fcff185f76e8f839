//! Section driver: feeds sections to an interpreter and cuts its output into
//! one transcript per section.
//!
//! The run is strictly sequential. Each line is sent, then the driver waits
//! for the next prompt before doing anything else. Output that ends with a
//! prompt match is carried into the next line's (or section's) transcript, so
//! nothing between two prompts is lost.

use crate::matcher::{char_dump, WaitError};
use crate::postprocess::{remove_echo_artifact, strip_pattern, PromptTrimmer};
use crate::process::ReplChannel;
use crate::{ProcessSession, ReplError, Result};
use regex::Regex;
use replscribe_types::{ProfileError, PromptVars, ReplProfile, Sections};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn, Instrument, Span};

/// Key of the synthetic section that records interpreter variables.
pub const SAVE_VARS_KEY: &str = "save-vars";

/// Run-time settings that are not part of a profile.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Working directory for the interpreter (default: current directory).
    pub working_directory: Option<PathBuf>,
    /// Base environment (default: a copy of this process's environment).
    pub base_env: Option<HashMap<String, String>>,
    /// Prompt variables overriding the profile's defaults.
    pub prompt_vars: PromptVars,
    /// Append a section that dumps the interpreter's variables to this path.
    pub save_vars: Option<PathBuf>,
}

impl RunOptions {
    fn working_directory(&self) -> Result<PathBuf> {
        match &self.working_directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    fn base_env(&self) -> HashMap<String, String> {
        self.base_env.clone().unwrap_or_else(|| {
            // variables that are not valid unicode are left out
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect()
        })
    }
}

/// What a finished run reports besides its transcripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of sections emitted.
    pub sections: usize,
    /// Exit code, when the interpreter exited on its own.
    pub exit_code: Option<u32>,
    /// Whether the interpreter ended its output early (only with `ignore_errors`).
    pub ended_early: bool,
}

/// Drives one interpreter run over an ordered set of sections.
pub struct SectionDriver<'a> {
    profile: &'a ReplProfile,
    strip: Option<Regex>,
    span: Span,
}

impl<'a> SectionDriver<'a> {
    /// Driver logging into a `transcribe` span tagged with the profile name.
    pub fn new(profile: &'a ReplProfile) -> Result<Self> {
        let span = tracing::info_span!(target: "replscribe::driver", "transcribe", profile = %profile.name);
        Self::with_span(profile, span)
    }

    /// Driver logging into `span`.
    pub fn with_span(profile: &'a ReplProfile, span: Span) -> Result<Self> {
        profile.validate()?;
        let strip = profile
            .strip_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|source| ProfileError::InvalidPattern {
                profile: profile.name.clone(),
                field: "strip_pattern",
                source,
            })?;
        Ok(Self {
            profile,
            strip,
            span,
        })
    }

    /// Spawn the interpreter and run every section through it.
    ///
    /// `emit` receives each section's raw transcript as soon as the section
    /// is complete, in input order.
    pub async fn run<F>(&self, sections: &Sections, options: &RunOptions, emit: F) -> Result<RunSummary>
    where
        F: FnMut(&str, &str),
    {
        self.run_inner(sections, options, emit)
            .instrument(self.span.clone())
            .await
    }

    /// Run every section through an already started session.
    pub async fn drive<C, F>(&self, session: ProcessSession<C>, sections: &Sections, emit: F) -> Result<RunSummary>
    where
        C: ReplChannel,
        F: FnMut(&str, &str),
    {
        self.drive_inner(session, sections, emit)
            .instrument(self.span.clone())
            .await
    }

    async fn run_inner<F>(&self, sections: &Sections, options: &RunOptions, emit: F) -> Result<RunSummary>
    where
        F: FnMut(&str, &str),
    {
        let sections = self.with_save_vars(sections, options)?;
        let workdir = options.working_directory()?;
        let env = self
            .profile
            .env_overlay(&options.base_env(), &options.prompt_vars);
        for (key, _) in options.prompt_vars.entries() {
            if let Some(value) = env.get(key) {
                debug!(target: "replscribe::driver", "{} is {:?}", key, value);
            }
        }

        debug!(
            target: "replscribe::driver",
            "About to spawn '{}' in {:?}",
            self.profile.command,
            workdir
        );
        let session = ProcessSession::spawn(self.profile, &workdir, &env)?;
        self.drive_inner(session, &sections, emit).await
    }

    async fn drive_inner<C, F>(
        &self,
        mut session: ProcessSession<C>,
        sections: &Sections,
        mut emit: F,
    ) -> Result<RunSummary>
    where
        C: ReplChannel,
        F: FnMut(&str, &str),
    {
        let profile = self.profile;

        let initial = session
            .await_initial_prompt(profile.initial_prompt_timeout)
            .await?;
        let mut carry = initial.pre + &initial.matched;
        debug!(target: "replscribe::driver", "Preamble: {:?}", carry);

        let mut ended_early = false;
        let mut last_transcript = String::new();
        let mut emitted = 0;

        for (key, text) in sections.iter() {
            let mut transcript = std::mem::take(&mut carry);
            let sent_nothing = ended_early;

            if ended_early {
                debug!(target: "replscribe::driver", "Process already ended, not sending section {}", key);
            } else {
                for line in profile.build_lines(text) {
                    transcript.push_str(&carry);
                    carry.clear();

                    debug!(target: "replscribe::driver", "Sending {:?}", line);
                    session.send_line(&line).await?;

                    match session.await_prompt(profile.line_timeout).await {
                        Ok(m) => {
                            debug!(target: "replscribe::driver", "Received {:?}", m.pre);
                            transcript.push_str(&remove_echo_artifact(&m.pre));
                            carry = m.matched;
                        }
                        Err(WaitError::EndOfStream { received }) => {
                            debug!(target: "replscribe::driver", "EOF occurred in section {}", key);
                            if !profile.ignore_errors {
                                return Err(ReplError::EndOfStream {
                                    section: key.to_string(),
                                    received,
                                });
                            }
                            transcript.push_str(&remove_echo_artifact(&received));
                            ended_early = true;
                            break;
                        }
                        Err(WaitError::TimedOut { received }) => {
                            return Err(ReplError::PromptTimeout {
                                timeout: profile.line_timeout,
                                char_dump: char_dump(&received),
                                received,
                                patterns: session.search_terms().to_vec(),
                            });
                        }
                        Err(WaitError::Fault(message)) => return Err(ReplError::Process(message)),
                    }
                }
            }

            if let Some(strip) = &self.strip {
                transcript = strip_pattern(&transcript, strip);
            }

            debug!(target: "replscribe::driver", "Section {} complete", key);
            emit(key, &transcript);
            emitted += 1;
            // sections after an early end hold nothing worth reporting
            if !sent_nothing {
                last_transcript = transcript;
            }
        }

        let exit_code = match session.close().await {
            Ok(code) => code,
            Err(warning) => {
                warn!(target: "replscribe::driver", "{}", warning);
                None
            }
        };

        if profile.check_return_code {
            if let Some(code) = exit_code.filter(|c| *c != 0) {
                return Err(ReplError::NonZeroExit {
                    code,
                    transcript: last_transcript,
                });
            }
        }

        info!(
            target: "replscribe::driver",
            "Transcribed {} sections (exit code {:?})",
            emitted,
            exit_code
        );
        Ok(RunSummary {
            sections: emitted,
            exit_code,
            ended_early,
        })
    }

    fn with_save_vars(&self, sections: &Sections, options: &RunOptions) -> Result<Sections> {
        let mut sections = sections.clone();
        if let Some(path) = &options.save_vars {
            let text = self.profile.save_vars_section(path)?;
            debug!(target: "replscribe::driver", "Recording variables to {:?}", path);
            sections
                .append(SAVE_VARS_KEY, text)
                .map_err(|key| ProfileError::ReservedSectionKey { key })?;
        }
        Ok(sections)
    }
}

/// Run `sections` through the profile's interpreter and return finished
/// transcripts, with trailing prompts stripped.
pub async fn transcribe(
    profile: &ReplProfile,
    sections: &Sections,
    options: &RunOptions,
) -> Result<Sections> {
    let trimmer = trimmer(profile)?;
    let mut transcripts = Sections::new();
    SectionDriver::new(profile)?
        .run(sections, options, |key, raw| {
            transcripts.insert(key, trimmer.strip(raw, &profile.line_ending));
        })
        .await?;
    Ok(transcripts)
}

/// Trailing-prompt trimmer for `profile`.
pub fn trimmer(profile: &ReplProfile) -> Result<PromptTrimmer> {
    PromptTrimmer::new(&profile.trim_prompt).map_err(|source| {
        ReplError::Configuration(ProfileError::InvalidPattern {
            profile: profile.name.clone(),
            field: "trim_prompt",
            source,
        })
    })
}
