//! User configuration: extra working-directory default and interpreter
//! profiles that add to or replace the builtins.

use anyhow::{Context, Result};
use replscribe_types::{builtin_profiles, ProfileError, ReplProfile};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Working directory for interpreters when `--workdir` is not given.
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    /// Profiles keyed by name. A profile named like a builtin replaces it.
    #[serde(default)]
    pub profiles: BTreeMap<String, ReplProfile>,
}

/// `$XDG_CONFIG_HOME/replscribe/config.toml` (or the platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("replscribe").join("config.toml"))
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {:?}", path))
    }

    /// Load config from the default location, or fall back to defaults.
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }

    fn parse(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        for (key, profile) in config.profiles.iter_mut() {
            if profile.name.is_empty() {
                profile.name = key.clone();
            }
            profile.validate()?;
        }
        Ok(config)
    }

    /// Every available profile: configured ones first, then the builtins
    /// they do not replace.
    pub fn all_profiles(&self) -> Vec<ReplProfile> {
        let mut profiles: Vec<ReplProfile> = self.profiles.values().cloned().collect();
        for builtin in builtin_profiles() {
            if !profiles.iter().any(|p| p.name == builtin.name) {
                profiles.push(builtin.clone());
            }
        }
        profiles
    }

    /// Look up a profile by name or alias.
    pub fn profile(&self, name: &str) -> Result<ReplProfile, ProfileError> {
        self.all_profiles()
            .into_iter()
            .find(|p| p.answers_to(name))
            .ok_or_else(|| ProfileError::UnknownProfile(name.to_string()))
    }

    /// First profile that accepts `input`'s file extension.
    pub fn profile_for_input(&self, input: &Path) -> Option<ReplProfile> {
        let extension = format!(".{}", input.extension()?.to_str()?);
        self.all_profiles()
            .into_iter()
            .find(|p| p.input_extensions.iter().any(|e| *e == extension))
    }
}
