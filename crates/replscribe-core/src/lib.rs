//! Core REPL session driving for replscribe.

mod driver;
mod error;
mod matcher;
mod postprocess;
mod process;
mod session;

pub use driver::{transcribe, trimmer, RunOptions, RunSummary, SectionDriver, SAVE_VARS_KEY};
pub use error::{CloseWarning, ReplError};
pub use matcher::{char_dump, Found, OutputChunk, OutputStream, PromptMatch, PromptMatcher, WaitError};
pub use postprocess::{
    remove_echo_artifact, split_lines, strip_pattern, strip_trailing_prompts, PromptTrimmer,
    ECHO_ARTIFACT,
};
pub use process::{PtyChannel, ReplChannel};
pub use session::ProcessSession;

/// Result type for replscribe operations.
pub type Result<T> = std::result::Result<T, ReplError>;
