//! Profiles for common interpreters.

use crate::{LineSplit, ProfileError, PromptVars, ReplProfile, Timeout};
use once_cell::sync::Lazy;

const PYTHON_SAVE_VARS: &str = r#"
import json
replscribe__vars_file = open("{path}", "w")
replscribe__x = {}
for replscribe__k, replscribe__v in list(locals().items()):
    replscribe__x[replscribe__k] = str(replscribe__v)

json.dump(replscribe__x, replscribe__vars_file)
replscribe__vars_file.close()
"#;

const R_SAVE_VARS: &str = r#"
if ("rjson" %in% installed.packages()) {
    library(rjson)
    replscribe__json_file <- file("{path}", "w")
    writeLines(toJSON(as.list(environment())), replscribe__json_file)
    close(replscribe__json_file)
} else {
   cat("Can't automatically save environment to JSON since rjson package not installed.")
}
"#;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn python() -> ReplProfile {
    ReplProfile {
        aliases: strings(&["pycon", "pyrepl"]),
        check_return_code: false,
        initial_prompt: Some(">>>".into()),
        output_lexer: Some("pycon".into()),
        input_extensions: strings(&[".txt", ".py"]),
        output_extension: Some(".pycon".into()),
        save_vars_command: Some(PYTHON_SAVE_VARS.into()),
        ..ReplProfile::new("python", "python")
    }
}

fn ipython() -> ReplProfile {
    ReplProfile {
        name: "ipython".into(),
        aliases: Vec::new(),
        command: "ipython --classic".into(),
        ..python()
    }
}

fn irb() -> ReplProfile {
    ReplProfile {
        aliases: strings(&["rbrepl"]),
        check_return_code: false,
        initial_prompt: Some("^>>".into()),
        prompts: strings(&[">>", "?>"]),
        trim_prompt: ">>".into(),
        output_lexer: Some("irb".into()),
        input_extensions: strings(&[".txt", ".rb"]),
        output_extension: Some(".rbcon".into()),
        ..ReplProfile::new("irb", "irb --simple-prompt")
    }
}

fn r() -> ReplProfile {
    ReplProfile {
        aliases: strings(&["rint"]),
        check_return_code: false,
        prompt_regex: Some(r"(\x1b[^m]*m)?(>|\+)\s*".into()),
        initial_prompt: Some(r"(\x1b[^>])?>\s*".into()),
        trim_prompt: ">".into(),
        // cursor-control noise printed ahead of the first prompt on macOS
        strip_pattern: Some(r"(\x1b[^h]+h)".into()),
        input_extensions: strings(&[".txt", ".r", ".R"]),
        output_extension: Some(".Rout".into()),
        save_vars_command: Some(R_SAVE_VARS.into()),
        ..ReplProfile::new("r", "R --quiet --vanilla")
    }
}

fn rhino() -> ReplProfile {
    ReplProfile {
        aliases: strings(&["jsint", "rhinoint"]),
        prompts: strings(&["js>", "  >"]),
        trim_prompt: "js>".into(),
        initial_prompt_timeout: Timeout::secs(60),
        input_extensions: strings(&[".js", ".txt"]),
        output_extension: Some(".jscon".into()),
        ..ReplProfile::new("rhino", "rhino")
    }
}

fn php() -> ReplProfile {
    ReplProfile {
        aliases: strings(&["phpint"]),
        check_return_code: false,
        prompts: strings(&["php > "]),
        trim_prompt: "php > ".into(),
        input_extensions: strings(&[".php", ".txt"]),
        output_extension: Some(".txt".into()),
        ..ReplProfile::new("php", "php -a")
    }
}

fn bash() -> ReplProfile {
    ReplProfile {
        aliases: strings(&["shint", "bashint"]),
        prompt_regex: Some(r"\d*[#$]".into()),
        initial_prompt: Some(r"\d*[#$]".into()),
        trim_prompt: r"\d*[#$]".into(),
        prompt_env: PromptVars {
            ps1: Some("$ ".into()),
            ..PromptVars::default()
        },
        output_lexer: Some("console".into()),
        input_extensions: strings(&[".txt", ".sh"]),
        output_extension: Some(".sh-session".into()),
        ..ReplProfile::new("bash", "bash --norc -i")
    }
}

fn ksh() -> ReplProfile {
    ReplProfile {
        aliases: strings(&["kshint"]),
        initial_prompt: Some(r"^\s*\d*(#|\$)\s+".into()),
        prompt_regex: Some(r"\d*(#|\$)".into()),
        trim_prompt: r"\d*(\$|#)".into(),
        prompt_env: PromptVars {
            ps1: Some("$ ".into()),
            ..PromptVars::default()
        },
        input_extensions: strings(&[".txt", ".sh"]),
        output_extension: Some(".sh-session".into()),
        ..ReplProfile::new("ksh", "ksh -i")
    }
}

fn clojure() -> ReplProfile {
    ReplProfile {
        aliases: strings(&["clj", "cljint"]),
        check_return_code: false,
        initial_prompt_timeout: Timeout::secs(15),
        prompt: Some("user=> ".into()),
        trim_prompt: "user=>".into(),
        line_split: LineSplit::IndentedContinuation,
        input_extensions: strings(&[".clj", ".txt"]),
        output_extension: Some(".txt".into()),
        ..ReplProfile::new("clojure", "clojure -r")
    }
}

static BUILTINS: Lazy<Vec<ReplProfile>> = Lazy::new(|| {
    vec![
        python(),
        ipython(),
        irb(),
        r(),
        rhino(),
        php(),
        bash(),
        ksh(),
        clojure(),
    ]
});

/// Every builtin profile.
pub fn builtin_profiles() -> &'static [ReplProfile] {
    &BUILTINS
}

/// Look up a builtin profile by name or alias.
pub fn builtin_profile(name: &str) -> Result<ReplProfile, ProfileError> {
    BUILTINS
        .iter()
        .find(|p| p.answers_to(name))
        .cloned()
        .ok_or_else(|| ProfileError::UnknownProfile(name.to_string()))
}
