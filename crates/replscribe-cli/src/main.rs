//! replscribe - run code sections through an interactive interpreter and
//! capture what a user would have seen at the terminal.

use anyhow::{bail, Context, Result};
use clap::Parser;
use replscribe_cli::{config, input, logging};
use replscribe_core::{transcribe, RunOptions, SectionDriver};
use replscribe_types::{PromptVars, ReplProfile, Sections};
use std::path::PathBuf;

use config::Config;
use logging::{LogConfig, LogFormat};

/// Capture interpreter transcripts for documentation examples.
#[derive(Parser, Debug)]
#[command(name = "replscribe")]
#[command(about = "Run code sections through an interpreter on a PTY and capture transcripts")]
#[command(version)]
struct Cli {
    /// Section file: a .json array of {"key", "text"} objects, or any other
    /// file as a single section
    #[arg(value_name = "INPUT", required_unless_present = "list_profiles")]
    input: Option<PathBuf>,

    /// Interpreter profile name or alias (default: chosen from the input extension)
    #[arg(short, long, value_name = "NAME")]
    profile: Option<String>,

    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write transcripts here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Working directory for the interpreter
    #[arg(short = 'C', long, value_name = "DIR")]
    workdir: Option<PathBuf>,

    /// Override the PS1 prompt variable
    #[arg(long, value_name = "PROMPT")]
    ps1: Option<String>,

    /// Override the PS2 prompt variable
    #[arg(long, value_name = "PROMPT")]
    ps2: Option<String>,

    /// Override the PS3 prompt variable
    #[arg(long, value_name = "PROMPT")]
    ps3: Option<String>,

    /// Override the PS4 prompt variable
    #[arg(long, value_name = "PROMPT")]
    ps4: Option<String>,

    /// Have the interpreter dump its variables to this file after the last section
    #[arg(long, value_name = "FILE")]
    save_vars: Option<PathBuf>,

    /// Keep trailing prompts in the transcripts
    #[arg(long)]
    raw: bool,

    /// List available profiles and exit
    #[arg(long)]
    list_profiles: bool,

    /// Enable verbose logging (INFO level for all targets)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging (every line sent and received)
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "driver=debug" or "process=trace").
    /// Can be specified multiple times. Targets are prefixed with "replscribe::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        &cli.log_overrides,
        cli.log_format,
    )
    .map_err(anyhow::Error::msg)?;
    logging::init(&log_config);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tracing::debug!(
        target: "replscribe::startup",
        "Loaded configuration ({} configured profiles)",
        config.profiles.len()
    );

    if cli.list_profiles {
        list_profiles(&config);
        return Ok(());
    }

    let Some(input_path) = cli.input.as_deref() else {
        bail!("No input file given");
    };

    let profile = select_profile(&cli, &config)?;
    tracing::info!(
        target: "replscribe::startup",
        "Using profile '{}' ({})",
        profile.name,
        profile.command
    );

    let sections = input::read_sections(input_path)?;
    tracing::info!(
        target: "replscribe::startup",
        "Read {} sections from {:?}",
        sections.len(),
        input_path
    );

    let options = RunOptions {
        working_directory: cli.workdir.clone().or_else(|| config.workdir.clone()),
        base_env: None,
        prompt_vars: PromptVars {
            ps1: cli.ps1.clone(),
            ps2: cli.ps2.clone(),
            ps3: cli.ps3.clone(),
            ps4: cli.ps4.clone(),
        },
        save_vars: cli.save_vars.clone(),
    };

    let transcripts = run(&profile, &sections, &options, cli.raw)
        .await
        .with_context(|| format!("Failed to transcribe {:?} with profile '{}'", input_path, profile.name))?;

    match &cli.output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file {:?}", path))?;
            input::write_transcripts(&transcripts, std::io::BufWriter::new(file))?;
            tracing::info!(target: "replscribe::startup", "Wrote transcripts to {:?}", path);
        }
        None => input::write_transcripts(&transcripts, std::io::stdout().lock())?,
    }

    Ok(())
}

async fn run(
    profile: &ReplProfile,
    sections: &Sections,
    options: &RunOptions,
    raw: bool,
) -> replscribe_core::Result<Sections> {
    if !raw {
        return transcribe(profile, sections, options).await;
    }
    let mut transcripts = Sections::new();
    SectionDriver::new(profile)?
        .run(sections, options, |key, text| transcripts.insert(key, text))
        .await?;
    Ok(transcripts)
}

fn select_profile(cli: &Cli, config: &Config) -> Result<ReplProfile> {
    if let Some(name) = &cli.profile {
        return Ok(config.profile(name)?);
    }
    let Some(input) = cli.input.as_deref() else {
        bail!("No input file given");
    };
    config.profile_for_input(input).with_context(|| {
        format!(
            "No profile accepts {:?}; pass --profile (see --list-profiles)",
            input
        )
    })
}

fn list_profiles(config: &Config) {
    for profile in config.all_profiles() {
        let aliases = if profile.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", profile.aliases.join(", "))
        };
        println!("{:<10} {}{}", profile.name, profile.command, aliases);
    }
}
