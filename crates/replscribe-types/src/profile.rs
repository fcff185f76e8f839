//! Interpreter profiles.
//!
//! A [`ReplProfile`] describes everything the driver needs to know about one
//! kind of interpreter: how to start it, which prompts to wait for, how long
//! to wait, and how to cut section text into lines.

use crate::{ProfileError, Timeout};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Placeholder replaced by the output path in a save-vars command.
pub const SAVE_VARS_SLOT: &str = "{path}";

/// How section text is cut into the lines sent to the interpreter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSplit {
    /// One line per physical line, plus a trailing empty line.
    #[default]
    Default,
    /// Indented lines continue the preceding non-indented line.
    IndentedContinuation,
}

/// The four prompt-style environment variables a profile (or a run) may set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptVars {
    #[serde(rename = "PS1", skip_serializing_if = "Option::is_none")]
    pub ps1: Option<String>,
    #[serde(rename = "PS2", skip_serializing_if = "Option::is_none")]
    pub ps2: Option<String>,
    #[serde(rename = "PS3", skip_serializing_if = "Option::is_none")]
    pub ps3: Option<String>,
    #[serde(rename = "PS4", skip_serializing_if = "Option::is_none")]
    pub ps4: Option<String>,
}

impl PromptVars {
    /// Variable names paired with their values, in PS1..PS4 order.
    pub fn entries(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("PS1", self.ps1.as_deref()),
            ("PS2", self.ps2.as_deref()),
            ("PS3", self.ps3.as_deref()),
            ("PS4", self.ps4.as_deref()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.entries().iter().all(|(_, v)| v.is_none())
    }
}

/// Configuration for one kind of interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplProfile {
    /// Lookup name.
    pub name: String,
    /// Alternative lookup names.
    pub aliases: Vec<String>,
    /// Program and whitespace-separated arguments.
    pub command: String,
    /// Literal prompts, used when neither `prompt` nor `prompt_regex` is set.
    pub prompts: Vec<String>,
    /// Single literal prompt, takes precedence over `prompts`.
    pub prompt: Option<String>,
    /// Prompt regular expression, takes precedence over everything else.
    pub prompt_regex: Option<String>,
    /// Regular expression for the banner/first prompt after spawn.
    pub initial_prompt: Option<String>,
    pub initial_prompt_timeout: Timeout,
    pub line_timeout: Timeout,
    pub line_ending: String,
    /// Regular expression for prompt remnants trimmed from finished transcripts.
    pub trim_prompt: String,
    /// Regular expression removed from every transcript before it is emitted.
    pub strip_pattern: Option<String>,
    /// Default prompt variables set in the child's environment.
    pub prompt_env: PromptVars,
    pub ignore_errors: bool,
    pub check_return_code: bool,
    pub allow_match_without_newline: bool,
    /// Command dumping the interpreter's variables to `{path}`.
    pub save_vars_command: Option<String>,
    pub line_split: LineSplit,
    /// Language tag for downstream highlighting.
    pub output_lexer: Option<String>,
    pub input_extensions: Vec<String>,
    pub output_extension: Option<String>,
}

impl Default for ReplProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            aliases: Vec::new(),
            command: String::new(),
            prompts: vec![">>>".to_string(), "...".to_string()],
            prompt: None,
            prompt_regex: None,
            initial_prompt: None,
            initial_prompt_timeout: Timeout::secs(5),
            line_timeout: Timeout::secs(10),
            line_ending: "\n".to_string(),
            trim_prompt: ">>>".to_string(),
            strip_pattern: None,
            prompt_env: PromptVars::default(),
            ignore_errors: false,
            check_return_code: true,
            allow_match_without_newline: false,
            save_vars_command: None,
            line_split: LineSplit::Default,
            output_lexer: None,
            input_extensions: Vec::new(),
            output_extension: None,
        }
    }
}

impl ReplProfile {
    /// Create a profile with default prompts and timeouts.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            ..Self::default()
        }
    }

    /// Whether `name` is this profile's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<&str> {
        self.command.split_whitespace().collect()
    }

    /// Prompt patterns after applying precedence (regex > single > list).
    fn prompt_patterns(&self) -> Vec<&str> {
        if let Some(regex) = &self.prompt_regex {
            vec![regex.as_str()]
        } else if let Some(prompt) = &self.prompt {
            vec![prompt.as_str()]
        } else {
            self.prompts.iter().map(String::as_str).collect()
        }
    }

    /// Whether search terms are regular expressions rather than literals.
    pub fn uses_regex(&self) -> bool {
        self.prompt_regex.is_some()
    }

    /// Patterns to watch for after each line.
    ///
    /// Each prompt is preceded by the line ending; with
    /// `allow_match_without_newline` the bare prompts follow in the same order.
    pub fn search_terms(&self) -> Vec<String> {
        let prompts = self.prompt_patterns();
        let mut terms: Vec<String> = prompts
            .iter()
            .map(|p| format!("{}{}", self.line_ending, p))
            .collect();
        if self.allow_match_without_newline {
            terms.extend(prompts.iter().map(|p| p.to_string()));
        }
        terms
    }

    /// Cut a section's text into the lines sent to the interpreter.
    pub fn build_lines(&self, section_text: &str) -> Vec<String> {
        match self.line_split {
            LineSplit::Default => {
                let mut lines: Vec<String> = section_text.lines().map(str::to_string).collect();
                lines.push(String::new());
                lines
            }
            LineSplit::IndentedContinuation => {
                indented_continuation_lines(section_text, &self.line_ending)
            }
        }
    }

    /// `base` with the prompt variables applied.
    ///
    /// A run-time override beats the profile's default, which beats whatever
    /// `base` already holds.
    pub fn env_overlay(
        &self,
        base: &HashMap<String, String>,
        overrides: &PromptVars,
    ) -> HashMap<String, String> {
        let mut env = base.clone();
        for ((key, explicit), (_, default)) in
            overrides.entries().into_iter().zip(self.prompt_env.entries())
        {
            if let Some(value) = explicit.or(default) {
                env.insert(key.to_string(), value.to_string());
            }
        }
        env
    }

    /// The save-vars command with its slot filled by `path`.
    pub fn save_vars_section(&self, path: &Path) -> Result<String, ProfileError> {
        let template = self
            .save_vars_command
            .as_deref()
            .ok_or_else(|| ProfileError::SaveVarsUnavailable {
                profile: self.name.clone(),
            })?;
        check_slot(&self.name, template)?;
        Ok(template.replace(SAVE_VARS_SLOT, &path.display().to_string()))
    }

    /// Check the profile is usable before spawning anything.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.argv().is_empty() {
            return Err(ProfileError::EmptyCommand {
                profile: self.name.clone(),
            });
        }
        if self.prompt_patterns().iter().all(|p| p.is_empty()) {
            return Err(ProfileError::NoPrompts {
                profile: self.name.clone(),
            });
        }

        let patterns = [
            ("prompt_regex", self.prompt_regex.as_deref()),
            ("initial_prompt", self.initial_prompt.as_deref()),
            ("trim_prompt", Some(self.trim_prompt.as_str())),
            ("strip_pattern", self.strip_pattern.as_deref()),
        ];
        for (field, pattern) in patterns {
            if let Some(pattern) = pattern {
                Regex::new(pattern).map_err(|source| ProfileError::InvalidPattern {
                    profile: self.name.clone(),
                    field,
                    source,
                })?;
            }
        }

        if let Some(template) = &self.save_vars_command {
            check_slot(&self.name, template)?;
        }
        Ok(())
    }
}

fn check_slot(profile: &str, template: &str) -> Result<(), ProfileError> {
    let found = template.matches(SAVE_VARS_SLOT).count();
    if found != 1 {
        return Err(ProfileError::SaveVarsSlot {
            profile: profile.to_string(),
            found,
        });
    }
    Ok(())
}

fn indented_continuation_lines(text: &str, line_ending: &str) -> Vec<String> {
    let mut logical = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let indented = line.chars().next().is_some_and(char::is_whitespace);
        if indented {
            current.push(line);
        } else {
            if !current.is_empty() {
                logical.push(current.join(line_ending));
            }
            current = vec![line];
        }
    }
    logical.push(current.join(line_ending));
    logical
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn python_like() -> ReplProfile {
        ReplProfile::new("py", "python")
    }

    #[test]
    fn test_search_terms_prefix_line_ending() {
        let profile = python_like();
        assert_eq!(profile.search_terms(), vec!["\n>>>", "\n..."]);
    }

    #[test]
    fn test_search_terms_without_newline_appends_bare() {
        let profile = ReplProfile {
            allow_match_without_newline: true,
            ..python_like()
        };
        assert_eq!(profile.search_terms(), vec!["\n>>>", "\n...", ">>>", "..."]);
    }

    #[test]
    fn test_search_terms_precedence() {
        let single = ReplProfile {
            prompt: Some("user=> ".into()),
            ..python_like()
        };
        assert_eq!(single.search_terms(), vec!["\nuser=> "]);
        assert!(!single.uses_regex());

        let regex = ReplProfile {
            prompt: Some("user=> ".into()),
            prompt_regex: Some(r"\d*[#$]".into()),
            ..python_like()
        };
        assert_eq!(regex.search_terms(), vec!["\n\\d*[#$]"]);
        assert!(regex.uses_regex());
    }

    #[test]
    fn test_default_split_adds_blank_line() {
        let profile = python_like();
        assert_eq!(profile.build_lines("a = 1\nb = 2"), vec!["a = 1", "b = 2", ""]);
        assert_eq!(profile.build_lines("1+1\n"), vec!["1+1", ""]);
        assert_eq!(profile.build_lines(""), vec![""]);
    }

    #[test]
    fn test_indented_split() {
        let profile = ReplProfile {
            line_split: LineSplit::IndentedContinuation,
            ..python_like()
        };
        assert_eq!(
            profile.build_lines("(defn f [x]\n  (+ x 1))\nfoo"),
            vec!["(defn f [x]\n  (+ x 1))", "foo"]
        );
    }

    #[test]
    fn test_indented_split_flat_lines() {
        let profile = ReplProfile {
            line_split: LineSplit::IndentedContinuation,
            line_ending: "\r\n".into(),
            ..python_like()
        };
        assert_eq!(profile.build_lines("a\nb\n\tc\n d"), vec!["a", "b\r\n\tc\r\n d"]);
    }

    #[test]
    fn test_env_overlay_precedence() {
        let profile = ReplProfile {
            prompt_env: PromptVars {
                ps1: Some("$ ".into()),
                ps2: Some("> ".into()),
                ..PromptVars::default()
            },
            ..python_like()
        };
        let mut base = HashMap::new();
        base.insert("PS1".to_string(), "base1".to_string());
        base.insert("PS3".to_string(), "base3".to_string());
        base.insert("HOME".to_string(), "/home/x".to_string());

        let overrides = PromptVars {
            ps2: Some("cont ".into()),
            ..PromptVars::default()
        };
        let env = profile.env_overlay(&base, &overrides);

        assert_eq!(env["PS1"], "$ ");
        assert_eq!(env["PS2"], "cont ");
        assert_eq!(env["PS3"], "base3");
        assert!(!env.contains_key("PS4"));
        assert_eq!(env["HOME"], "/home/x");
        // base is a copy
        assert_eq!(base["PS1"], "base1");
    }

    #[test]
    fn test_save_vars_section() {
        let profile = ReplProfile {
            save_vars_command: Some("dump(\"{path}\")".into()),
            ..python_like()
        };
        let text = profile.save_vars_section(&PathBuf::from("/tmp/v.json")).unwrap();
        assert_eq!(text, "dump(\"/tmp/v.json\")");

        let err = python_like().save_vars_section(Path::new("x")).unwrap_err();
        assert!(matches!(err, ProfileError::SaveVarsUnavailable { .. }));
    }

    #[test]
    fn test_validate() {
        assert!(python_like().validate().is_ok());

        let empty = ReplProfile::new("x", "  ");
        assert!(matches!(empty.validate(), Err(ProfileError::EmptyCommand { .. })));

        let bad = ReplProfile {
            prompt_regex: Some("(".into()),
            ..python_like()
        };
        assert!(matches!(
            bad.validate(),
            Err(ProfileError::InvalidPattern { field: "prompt_regex", .. })
        ));

        let two_slots = ReplProfile {
            save_vars_command: Some("{path} {path}".into()),
            ..python_like()
        };
        assert!(matches!(
            two_slots.validate(),
            Err(ProfileError::SaveVarsSlot { found: 2, .. })
        ));
    }

    #[test]
    fn test_profile_from_toml() {
        let profile: ReplProfile = toml::from_str(
            r#"
            name = "bash"
            command = "bash --norc -i"
            prompt_regex = '\d*[#$]'
            line_timeout = "none"
            line_split = "indented_continuation"

            [prompt_env]
            PS1 = "$ "
            "#,
        )
        .unwrap();

        assert_eq!(profile.argv(), vec!["bash", "--norc", "-i"]);
        assert_eq!(profile.line_timeout, Timeout::Never);
        assert_eq!(profile.initial_prompt_timeout, Timeout::secs(5));
        assert_eq!(profile.prompt_env.ps1.as_deref(), Some("$ "));
        assert_eq!(profile.line_split, LineSplit::IndentedContinuation);
    }
}
