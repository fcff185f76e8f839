//! Profile validation errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile '{profile}' has no command")]
    EmptyCommand { profile: String },

    #[error("Profile '{profile}' defines no prompt to match")]
    NoPrompts { profile: String },

    #[error("Profile '{profile}': invalid {field} pattern: {source}")]
    InvalidPattern {
        profile: String,
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Profile '{profile}' cannot record variables: no save_vars_command is set")]
    SaveVarsUnavailable { profile: String },

    #[error("Profile '{profile}': save_vars_command must contain exactly one {{path}} slot, found {found}")]
    SaveVarsSlot { profile: String, found: usize },

    #[error("Section key '{key}' is reserved for the variable dump; rename that section or drop --save-vars")]
    ReservedSectionKey { key: String },

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),
}
