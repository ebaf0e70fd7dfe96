//! `pediflow` command-line front end.
//!
//! Wires the library from configuration, runs one pipeline, conversation or
//! bare validation, and prints the result as pretty JSON on stdout. Logs go
//! to stderr.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info};

use pediflow::config::PediflowConfig;
use pediflow::conversation::ConversationSystem;
use pediflow::core::RunContext;
use pediflow::events::LoggingEventSink;
use pediflow::executor::TaskExecutor;
use pediflow::gateway::{CircuitBreaker, CompletionGateway, GuardedGateway, OpenAiGateway, RateLimiter};
use pediflow::observability::init_tracing;
use pediflow::pipeline::{PipelineCoordinator, PipelineRegistry, MEDICAL_ANALYSIS};
use pediflow::validation::MedicalValidator;

#[derive(Parser)]
#[command(name = "pediflow")]
#[command(author, version, about = "Pediatric health record analysis with LLM pipelines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file. Environment variables override its values.
    #[arg(long, global = true, env = "PEDIFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter directive, e.g. "pediflow=debug"
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a pipeline over text or a JSON record
    Run {
        /// Registered pipeline id
        #[arg(long, default_value = MEDICAL_ANALYSIS)]
        pipeline: String,

        /// Patient age in months
        #[arg(long)]
        age: Option<f64>,

        /// Input; read from stdin when omitted
        text: Option<String>,
    },

    /// Run a multi-agent conversation over text
    Converse {
        /// Conversation topic
        #[arg(long)]
        topic: Option<String>,

        /// Input; read from stdin when omitted
        text: Option<String>,
    },

    /// Check a JSON record against the validation ruleset only
    Validate {
        /// JSON object of measurements; read from stdin when omitted
        json: Option<String>,

        /// Patient age in months
        #[arg(long)]
        age: Option<f64>,
    },

    /// List the registered pipelines
    Pipelines,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging = config.logging.with_level(level);
    }
    init_tracing(&config.logging)?;

    match cli.command {
        Command::Run { pipeline, age, text } => {
            let input = parse_input(&read_input(text)?);
            let mut context = RunContext::new();
            if let Some(months) = age {
                context = context.with_patient_age(months);
            }
            let coordinator = PipelineCoordinator::new(TaskExecutor::new(gateway(&config)?))
                .with_events(Arc::new(LoggingEventSink::debug()));
            info!(pipeline = %pipeline, "Running pipeline");
            let result = coordinator.run_pipeline(&pipeline, input, context).await?;
            print_json(&result)
        }
        Command::Converse { topic, text } => {
            let input = read_input(text)?;
            let system = ConversationSystem::new(gateway(&config)?)
                .with_events(Arc::new(LoggingEventSink::debug()));
            let session = system.start_conversation(input, topic.as_deref()).await;
            print_json(&session)
        }
        Command::Validate { json, age } => {
            let raw = read_input(json)?;
            let values: Value = serde_json::from_str(&raw).context("input is not valid JSON")?;
            if !values.is_object() {
                bail!("expected a JSON object of measurements");
            }
            print_json(&MedicalValidator::new().validate_value(&values, age))
        }
        Command::Pipelines => print_json(&PipelineRegistry::with_defaults().ids()),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<PediflowConfig> {
    let mut config = match path {
        Some(path) => PediflowConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => PediflowConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

/// The OpenAI-compatible gateway behind the shared limiter and breaker.
fn gateway(config: &PediflowConfig) -> Result<Arc<dyn CompletionGateway>> {
    if !config.gateway.is_configured() {
        bail!("no API key configured; set PEDIFLOW_API_KEY or OPENAI_API_KEY");
    }
    let inner = OpenAiGateway::new(&config.gateway)?;
    debug!(endpoint = inner.endpoint(), model = %config.gateway.model, "Gateway configured");
    let limiter = Arc::new(RateLimiter::new(config.rate_limit.min_interval()));
    let breaker = Arc::new(CircuitBreaker::new(
        config.circuit_breaker.failure_threshold,
        config.circuit_breaker.cooldown(),
    ));
    Ok(Arc::new(GuardedGateway::new(Arc::new(inner), limiter, breaker)))
}

fn read_input(arg: Option<String>) -> Result<String> {
    let text = match arg {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };
    let text = text.trim();
    if text.is_empty() {
        bail!("no input given");
    }
    Ok(text.to_string())
}

/// JSON objects are passed through as records; anything else is text.
fn parse_input(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::String(text.to_string()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
