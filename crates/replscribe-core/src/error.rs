//! Error types for replscribe.

use replscribe_types::{ProfileError, Timeout};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ProfileError),

    #[error("Failed to spawn '{command}': {message}")]
    Spawn { command: String, message: String },

    #[error(
        "Failed at matching initial prompt within {timeout}. Received '{received}', tried to match with {patterns:?}\n\
         Exact characters received:\n{char_dump}\
         A longer initial_prompt_timeout may be needed, or the initial_prompt pattern may be wrong."
    )]
    InitialPromptTimeout {
        timeout: Timeout,
        received: String,
        char_dump: String,
        patterns: Vec<String>,
    },

    #[error(
        "Failed at matching prompt within {timeout}. Received '{received}', tried to match with {patterns:?}\n\
         Exact characters received:\n{char_dump}\
         Something may have gone wrong, or a longer line_timeout may be needed."
    )]
    PromptTimeout {
        timeout: Timeout,
        received: String,
        char_dump: String,
        patterns: Vec<String>,
    },

    #[error("Process exited before the expected prompt (section '{section}'). Received '{received}'")]
    EndOfStream { section: String, received: String },

    #[error("Process error: {0}")]
    Process(String),

    #[error("Process exited with code {code}. Last transcript:\n{transcript}")]
    NonZeroExit { code: u32, transcript: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// The process could not be confirmed as terminated. Never fatal.
#[derive(Error, Debug)]
#[error("Process {pid} may not have closed: {reason}")]
pub struct CloseWarning {
    pub pid: String,
    pub reason: String,
}

impl CloseWarning {
    pub fn new(pid: Option<u32>, reason: impl Into<String>) -> Self {
        Self {
            pid: pid.map_or_else(|| "?".to_string(), |p| p.to_string()),
            reason: reason.into(),
        }
    }
}
