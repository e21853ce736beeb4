//! The `agentkit` binary: offline extraction and retrying structured generation.

use agentkit_extraction::prelude::*;
use agentkit_provider::{ModelSettings, PromptTemplate, Provider, build_generator, load_dotenv};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the structured payload from model output (file or stdin)
    Extract {
        /// Read from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
        /// Which fenced block to use; negative counts from the end
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        index: isize,
        /// Decode strategy: strict, relaxed or tolerant
        #[arg(long, default_value = "tolerant")]
        strategy: DecodeStrategy,
        /// JSON Schema file to validate against
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Ask a model for structured output, retrying until it complies
    Run {
        /// System prompt template file
        #[arg(long)]
        system: PathBuf,
        /// User input
        #[arg(long)]
        input: String,
        /// Template variable as NAME=VALUE (repeatable)
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
        /// Provider tag (overrides AGENTKIT_PROVIDER)
        #[arg(long)]
        provider: Option<Provider>,
        /// Model identifier (overrides AGENTKIT_MODEL)
        #[arg(long)]
        model: Option<String>,
        /// JSON Schema file to validate against
        #[arg(long)]
        schema: Option<PathBuf>,
        /// Attempt budget
        #[arg(long, default_value_t = 3)]
        max_attempts: usize,
        /// Per-attempt generation timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Tell the model what was wrong before retrying
        #[arg(long)]
        feedback: bool,
    },
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))
}

fn load_schema(path: &Path) -> Result<SchemaDescriptor> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading schema {}", path.display()))?;
    let value = serde_json::from_str(&raw).with_context(|| format!("parsing schema {}", path.display()))?;
    Ok(SchemaDescriptor::from_json_schema(value)?)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Extract {
            file,
            index,
            strategy,
            schema,
        } => run_extract(file.as_deref(), index, strategy, schema.as_deref()),
        Commands::Run {
            system,
            input,
            vars,
            provider,
            model,
            schema,
            max_attempts,
            timeout_secs,
            feedback,
        } => {
            load_dotenv()?;
            let mut settings = ModelSettings::from_env()?;
            if let Some(provider) = provider {
                settings = settings.with_provider(provider);
            }
            if let Some(model) = model {
                settings = settings.with_model(model);
            }

            let mut retry = RetryConfig::default().with_max_attempts(max_attempts);
            if let Some(secs) = timeout_secs {
                retry = retry.with_attempt_timeout(Duration::from_secs(secs));
            }
            if feedback {
                retry = retry.with_feedback(FeedbackPolicy::AppendHint);
            }

            let template = PromptTemplate::load(&system)?;
            let vars: HashMap<String, String> = vars.into_iter().collect();
            let conversation = vec![template.system_message(&vars)?, Message::user(input)];

            let mut extract = ExtractConfig::default();
            if let Some(path) = schema {
                extract = extract.schema(load_schema(&path)?);
            }

            run_generation(&settings, extract, retry, &conversation).await
        }
    }
}

fn run_extract(
    file: Option<&Path>,
    index: isize,
    strategy: DecodeStrategy,
    schema: Option<&Path>,
) -> Result<ExitCode> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            buf
        }
    };

    let mut config = ExtractConfig::default().selection_index(index).strategy(strategy);
    if let Some(path) = schema {
        config = config.schema(load_schema(path)?);
    }

    match StructuredOutputExtractor::with_config(config).extract(&text) {
        Ok(extracted) => {
            println!("{}", serde_json::to_string_pretty(extracted.value())?);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            eprintln!("error: {failure}");
            if let ExtractionFailure::SchemaMismatch { errors, .. } = &failure {
                for error in errors {
                    eprintln!("  - {error}");
                }
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_generation(
    settings: &ModelSettings,
    extract: ExtractConfig,
    retry: RetryConfig,
    conversation: &[Message],
) -> Result<ExitCode> {
    let generator = build_generator(settings)?;
    let controller = RetryingGenerationController::with_config(generator, extract, retry);

    match controller.run(conversation).await {
        Ok(success) => {
            tracing::info!(
                attempts = success.attempts,
                input_tokens = success.metrics.estimated_input_tokens,
                output_tokens = success.metrics.estimated_output_tokens,
                wall_ms = u64::try_from(success.metrics.wall_time.as_millis()).unwrap_or(u64::MAX),
                "Structured output extracted"
            );
            println!("{}", serde_json::to_string_pretty(success.value.value())?);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            eprintln!("error: {failure}");
            for record in failure.history() {
                eprintln!("  attempt {}: {}", record.attempt_number, record.failure);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
