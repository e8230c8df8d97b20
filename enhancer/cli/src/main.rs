//! Prompt Enhancer CLI
//!
//! Sends one idea through the enhancement pipeline and streams the rewritten
//! prompt to stdout as it is generated. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Enhance with the default profile (OpenAI-compatible backend)
//! OPENAI_API_KEY=sk-... prompt-enhancer "a todo app for my team"
//!
//! # Pick a profile and a local Ollama model
//! prompt-enhancer --backend ollama -m llama3.2 -p portfolio "A photography portfolio"
//!
//! # Read the idea from stdin
//! echo "Sell shoes online" | prompt-enhancer -p ecommerce
//!
//! # List profiles
//! prompt-enhancer --list-profiles
//! ```
//!
//! # Exit Status
//!
//! - `0`: enhancement settled
//! - `1`: enhancement failed
//! - `2`: invalid input or configuration

mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use enhancer_core::{
    default_profile, load_config, load_config_from_path, profiles, BackendKind, ConfigOverrides,
    EnhancementProducer, EnhancementSession, EnhancerConfigFile, LlmBackend, StreamState,
};

use crate::render::Renderer;

/// Exit status for input or configuration problems
const EXIT_INVALID: u8 = 2;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "prompt-enhancer")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The idea to enhance (read from stdin when omitted)
    #[arg(value_name = "IDEA")]
    idea: Vec<String>,

    /// Profile key (portfolio, ecommerce, startup, improve, clearer)
    #[arg(short = 'p', long, default_value = "")]
    profile: String,

    /// Configuration file path
    #[arg(short = 'c', long, env = "ENHANCER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend kind (openai, ollama)
    #[arg(long, value_name = "KIND")]
    backend: Option<BackendKind>,

    /// Model name
    #[arg(short = 'm', long)]
    model: Option<String>,

    /// Request timeout in seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "ENHANCER_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// List the available profiles and exit
    #[arg(long)]
    list_profiles: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            backend: self.backend,
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Why the input was refused
#[derive(Debug, PartialEq, Eq)]
enum InputProblem {
    Blank,
    TooLong { chars: usize, max: usize },
}

impl std::fmt::Display for InputProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => write!(f, "nothing to enhance: the idea is empty"),
            Self::TooLong { chars, max } => {
                write!(f, "idea is {chars} characters long; the limit is {max}")
            }
        }
    }
}

/// Check the idea against the input surface limits
fn check_input(idea: &str, max_chars: usize) -> Result<(), InputProblem> {
    if idea.trim().is_empty() {
        return Err(InputProblem::Blank);
    }
    let chars = idea.chars().count();
    if chars > max_chars {
        return Err(InputProblem::TooLong {
            chars,
            max: max_chars,
        });
    }
    Ok(())
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "prompt_enhancer={level},enhancer_core={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn print_profiles() {
    for profile in profiles() {
        println!("{:<10} {}", profile.key, profile.label);
    }
    println!("{:<10} {} (used when no profile is given)", "", default_profile().label);
}

fn load(args: &Args) -> Result<EnhancerConfigFile> {
    let mut config = match args.config {
        Some(ref path) => {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            load_config_from_path(Some(path.clone()))
        }
        None => load_config(),
    }
    .context("Failed to load configuration")?;

    args.overrides().apply(&mut config);
    config.validate().context("Invalid command-line options")?;

    info!(
        source = %config.source(),
        backend = %config.backend_kind,
        model = config.effective_model(),
        "Configuration loaded"
    );
    Ok(config)
}

async fn read_idea(args: &Args) -> Result<String> {
    if !args.idea.is_empty() {
        return Ok(args.idea.join(" "));
    }
    let mut idea = String::new();
    tokio::io::stdin()
        .read_to_string(&mut idea)
        .await
        .context("Failed to read idea from stdin")?;
    Ok(idea.trim_end_matches(['\r', '\n']).to_string())
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return Ok(ExitCode::from(EXIT_INVALID));
        }
    };

    let idea = read_idea(&args).await?;
    if let Err(problem) = check_input(&idea, config.max_input_chars) {
        eprintln!("error: {problem}");
        return Ok(ExitCode::from(EXIT_INVALID));
    }

    let backend_config = config.backend_config();
    let backend = backend_config.build();
    if backend.health_check().await {
        debug!(kind = backend_config.kind(), backend = backend.name(), "Backend ready");
    } else {
        warn!(
            kind = backend_config.kind(),
            backend = backend.name(),
            "Backend not reachable - enhancement will likely fail"
        );
    }

    let producer = EnhancementProducer::new(backend, config.producer_config());
    let session = EnhancementSession::new(producer, config.session_config());

    let updates = session.subscribe();
    if session.enhance(&idea, &args.profile).is_none() {
        // check_input already rejected blank ideas
        return Ok(ExitCode::from(EXIT_INVALID));
    }

    let mut renderer = Renderer::new(std::io::stdout().lock());
    let last = render::follow(updates, &mut renderer)
        .await
        .context("Failed to write output")?;

    Ok(match last.state {
        StreamState::Settled => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args.log_level);

    if args.list_profiles {
        print_profiles();
        return ExitCode::SUCCESS;
    }

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
