//! Torq CLI - Command-line interface for the Torq language
//!
//! Provides subcommands for parsing, lowering, formatting and running Torq
//! programs, and for spawning an actor and asking it questions.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use torq::interpreter::{Evaluator, Generator, evaluate_expr, format, parse};
use torq::runtime::{ActorBuilder, ActorSystem, ActorSystemConfig, RequestClient, TokioExecutor};

#[derive(Parser)]
#[command(name = "torq")]
#[command(about = "Dataflow language with an actor runtime", long_about = None)]
struct Cli {
    /// Actor system configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a file and print its syntax tree
    Parse {
        /// Source file
        file: PathBuf,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the kernel statements a file lowers to
    Kernel {
        /// Source file
        file: PathBuf,
    },

    /// Run a program
    Eval {
        /// Source file
        file: PathBuf,

        /// Evaluate as an expression and bind its value to this name
        #[arg(long)]
        result: Option<String>,

        /// Evaluation budget in milliseconds
        #[arg(long)]
        max_time_ms: Option<u64>,
    },

    /// Print a file in canonical form
    Format {
        /// Source file
        file: PathBuf,
    },

    /// Spawn the actor a file defines and ask it each message in turn
    Actor {
        /// Actor source file
        file: PathBuf,

        /// Construction argument, as a Torq expression
        #[arg(long = "arg")]
        args: Vec<String>,

        /// Message to ask, as a Torq expression
        #[arg(long = "ask")]
        asks: Vec<String>,
    },

    /// Write the default actor system configuration
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ActorSystemConfig::load(path)?,
        None => ActorSystemConfig::default(),
    };

    match cli.command {
        Commands::Parse { file, json } => {
            let node = parse(&read_source(&file)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&node)?);
            } else {
                println!("{:#?}", node);
            }
        }

        Commands::Kernel { file } => {
            let node = parse(&read_source(&file)?)?;
            let stmt = Generator::new().generate_stmt(&node)?;
            println!("{}", stmt);
        }

        Commands::Eval {
            file,
            result,
            max_time_ms,
        } => {
            let source = read_source(&file)?;
            let runtime = tokio::runtime::Runtime::new()?;
            let executor = Arc::new(TokioExecutor::new(runtime.handle().clone()));
            let max_time = max_time_ms.unwrap_or(config.max_evaluation_time_ms);
            let system = ActorSystem::new(config, executor);

            let mut evaluator = Evaluator::builder()
                .actor_system(system)
                .max_time(Duration::from_millis(max_time));
            if let Some(name) = &result {
                evaluator = evaluator.result(name);
            }
            let performed = evaluator.source(&source).parse()?.generate()?.perform()?;
            match (&result, performed.result()) {
                (Some(name), Some(value)) => println!("{} = {}", name, value),
                (Some(name), None) => println!("{} is unbound", name),
                (None, _) => {
                    for entry in performed.env().entries() {
                        if let Some(value) = entry.var.value() {
                            println!("{} = {}", entry.ident, value);
                        }
                    }
                }
            }
            println!("({:?})", performed.elapsed());
        }

        Commands::Format { file } => {
            let node = parse(&read_source(&file)?)?;
            print!("{}", format(&node));
        }

        Commands::Actor { file, args, asks } => {
            let source = read_source(&file)?;
            let args = args
                .iter()
                .map(|arg| evaluate_expr(arg).with_context(|| format!("argument `{}`", arg)))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let messages = asks
                .iter()
                .map(|ask| evaluate_expr(ask).with_context(|| format!("message `{}`", ask)))
                .collect::<anyhow::Result<Vec<_>>>()?;
            if messages.is_empty() {
                bail!("nothing to ask; pass at least one --ask");
            }

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(async move {
                let executor = Arc::new(TokioExecutor::current()?);
                let system = ActorSystem::new(config, executor);
                let actor = ActorBuilder::new(&system)
                    .source(&source)
                    .parse()?
                    .rewrite()?
                    .generate()?
                    .construct()?
                    .configure(args)?
                    .spawn()
                    .into_actor_ref();
                println!("Spawned {}", actor.address());

                let client = RequestClient::new(&system);
                for message in messages {
                    let answer = client.ask(&actor, message.clone()).await?;
                    println!("{} -> {}", message, answer);
                }
                anyhow::Ok(())
            })?;
        }

        Commands::InitConfig { path } => {
            config.save(&path)?;
            println!("Wrote configuration to {}", path.display());
        }
    }

    Ok(())
}
