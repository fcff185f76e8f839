//! Shared types for replscribe: interpreter profiles and section maps.

mod builtin;
mod error;
mod profile;
mod sections;
mod timeout;

pub use builtin::{builtin_profile, builtin_profiles};
pub use error::ProfileError;
pub use profile::{LineSplit, PromptVars, ReplProfile, SAVE_VARS_SLOT};
pub use sections::{Section, Sections};
pub use timeout::Timeout;
