//! # Affine CLI Entry Point
//!
//! Runs JavaScript on a dedicated, large-stack engine thread.
//!
//! ## Usage
//!
//! ```bash
//! # Evaluate an expression (outputs raw JSON)
//! affine eval '[1, 2, 3].map(x => x * 2)'
//!
//! # Run a script for its side effects
//! affine run -s script.js
//!
//! # Run a script, then call one of its functions
//! affine run -s script.js --call add --args '[2, 3]'
//!
//! # Give the engine thread a 64 MiB stack for deeply recursive scripts
//! affine --stack-size-mb 64 run -s deep.js --call recurse --args '[10000]'
//! ```
//!
//! The engine stack size comes from `--stack-size-mb`, then the
//! `AFFINE_STACK_SIZE` environment variable (in bytes), then the 16 MiB
//! default. Script recursion depth scales with it: one call per 4 KiB of
//! stack, so 4096 calls by default and 16384 at 64 MiB.

use affine_dispatch::DispatcherConfig;
use affine_engine::{ScriptEngine, DEFAULT_ENGINE_THREAD_NAME};
use anyhow::{Context, Result};
use argh::FromArgs;
use serde_json::Value as JsonValue;

/// Environment variable holding the engine stack size in bytes.
const STACK_SIZE_ENV: &str = "AFFINE_STACK_SIZE";

#[derive(FromArgs)]
/// Affine - run JavaScript on a dedicated engine thread
struct Cli {
    /// stack size of the engine thread in MiB
    ///
    /// Overrides the AFFINE_STACK_SIZE environment variable.
    #[argh(option, long = "stack-size-mb")]
    stack_size_mb: Option<usize>,

    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Eval(EvalArgs),
    Run(RunArgs),
}

/// Arguments for evaluating a single expression.
///
/// The result is printed as raw JSON to stdout so it can be piped into other
/// tools (e.g. `jq`). Errors go to stderr with a non-zero exit code.
#[derive(FromArgs)]
#[argh(subcommand, name = "eval")]
/// evaluate a JavaScript expression and print the result as JSON
struct EvalArgs {
    /// the expression or script to evaluate
    #[argh(positional)]
    expr: String,
}

/// Arguments for running a script file.
#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
/// run a JavaScript file, optionally calling one of its functions
struct RunArgs {
    /// path to the JavaScript file to run
    #[argh(option, short = 's')]
    script: String,

    /// global function to call after the script has run
    ///
    /// The function's return value is printed as JSON.
    #[argh(option, long = "call")]
    call: Option<String>,

    /// JSON array of arguments for --call
    ///
    /// Defaults to `[]`.
    #[argh(option, long = "args", default = "\"[]\".into()")]
    args: String,
}

/// Picks the engine stack size: flag, then environment, then default.
fn resolve_stack_size(flag_mb: Option<usize>, env_bytes: Option<String>) -> Result<Option<usize>> {
    if let Some(mb) = flag_mb {
        let bytes = mb
            .checked_mul(1024 * 1024)
            .with_context(|| format!("Stack size of {} MiB is too large", mb))?;
        return Ok(Some(bytes));
    }

    match env_bytes {
        Some(raw) => {
            let bytes = raw.trim().parse::<usize>().with_context(|| {
                format!("Invalid {}: '{}' is not a byte count", STACK_SIZE_ENV, raw)
            })?;
            Ok(Some(bytes))
        }
        None => Ok(None),
    }
}

/// Parses the `--args` value, which must be a JSON array.
fn parse_call_args(raw: &str) -> Result<Vec<JsonValue>> {
    let value: JsonValue = serde_json::from_str(raw)
        .with_context(|| format!("Invalid JSON in --args: {}", raw))?;

    match value {
        JsonValue::Array(items) => Ok(items),
        other => anyhow::bail!("--args must be a JSON array, got: {}", other),
    }
}

fn engine_config(stack_size: Option<usize>) -> DispatcherConfig {
    let config = DispatcherConfig::new().with_thread_name(DEFAULT_ENGINE_THREAD_NAME);
    match stack_size {
        Some(bytes) => config.with_stack_size(bytes),
        None => config,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Initialize tracing only for `run`; `eval` keeps its output clean for
    // piping. Logs go to stderr so stdout stays pure JSON.
    if matches!(cli.command, Commands::Run(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let stack_size = resolve_stack_size(cli.stack_size_mb, std::env::var(STACK_SIZE_ENV).ok())?;
    let engine = ScriptEngine::with_config(engine_config(stack_size))?;

    match cli.command {
        Commands::Eval(args) => {
            let result = engine.evaluate_async(args.expr).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Commands::Run(args) => {
            tracing::info!("Running script: {}", args.script);
            engine
                .execute_file(&args.script)
                .with_context(|| format!("Failed to run {}", args.script))?;

            if let Some(function) = args.call {
                let call_args = parse_call_args(&args.args)?;
                tracing::info!("Calling {} with {} argument(s)", function, call_args.len());

                let result = engine.call_function_async(function, call_args).await?;
                println!("{}", serde_json::to_string(&result)?);
            }

            tracing::debug!("Engine stats: {:?}", engine.stats());
        }
    }

    engine.dispose();
    Ok(())
}
