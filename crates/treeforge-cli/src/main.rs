mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_COMPOSE_ERROR, EXIT_FAILURE, EXIT_LOCK_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "treeforge",
    version,
    about = "Assemble and serialize pipeline manifests for OS image builds"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the pipelines a compose file assembles into.
    Inspect {
        /// Path to compose TOML file.
        #[arg(default_value = "compose.toml")]
        compose: PathBuf,
    },
    /// Show what every pipeline needs from outside the manifest.
    Deps {
        /// Path to compose TOML file.
        #[arg(default_value = "compose.toml")]
        compose: PathBuf,
    },
    /// Resolve all package sets and write the lock file.
    Lock {
        /// Path to compose TOML file.
        #[arg(default_value = "compose.toml")]
        compose: PathBuf,
        /// Lock file to write. Defaults to compose.lock next to the compose file.
        #[arg(long)]
        lock: Option<PathBuf>,
        /// Resolver to query.
        #[arg(long, default_value = "mock")]
        resolver: String,
    },
    /// Serialize the manifest for the build engine.
    Serialize {
        /// Path to compose TOML file.
        #[arg(default_value = "compose.toml")]
        compose: PathBuf,
        /// Lock file to resolve from. Defaults to compose.lock next to the compose file.
        #[arg(long)]
        lock: Option<PathBuf>,
        /// Resolver to query ("lock" or "mock").
        #[arg(long, default_value = "lock")]
        resolver: String,
        /// Write the manifest to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("TREEFORGE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;

    let result = match cli.command {
        Commands::Inspect { compose } => commands::inspect::run(&compose, json_output),
        Commands::Deps { compose } => commands::deps::run(&compose, json_output),
        Commands::Lock {
            compose,
            lock,
            resolver,
        } => commands::lock::run(&compose, lock.as_deref(), &resolver, json_output),
        Commands::Serialize {
            compose,
            lock,
            resolver,
            output,
        } => commands::serialize::run(
            &compose,
            lock.as_deref(),
            &resolver,
            output.as_deref(),
            json_output,
        ),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("compose error:") {
                EXIT_COMPOSE_ERROR
            } else if msg.starts_with("lock error:") || msg.starts_with("resolve error:") {
                EXIT_LOCK_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
