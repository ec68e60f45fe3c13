//! Hook entry points for the task-document enrichment pipeline.
//!
//! Each subcommand reads one event from stdin. Hook commands always exit 0:
//! a defect here must never block the host's workflow, so errors are only
//! reported through diagnostics.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use task_enricher::enrich;
use task_enricher::finalize;
use task_enricher::initialize;
use task_enricher::io::config::{DEFAULT_CONFIG_PATH, EnricherConfig, LoggingConfig, load_config};
use task_enricher::io::event::{HookEvent, read_stdin};
use task_enricher::io::tokenizer::build_counter;
use task_enricher::logging;
use task_enricher::pass::{PassContext, StageOutcome};
use task_enricher::pre_write;
use task_enricher::repair::repair_file;

#[derive(Parser)]
#[command(
    name = "task-enricher",
    version,
    about = "Repair and enrich shared task documents from tool hooks"
)]
struct Cli {
    /// Config file (TOML). Missing files fall back to defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate content before it is written; prints the (possibly rewritten) event.
    PreWrite,
    /// Initialize a document carrying the initialization marker.
    Init,
    /// Resolve placeholders in the documents a session touched.
    Enrich,
    /// Compute token accounting for phase compressions.
    Finalize,
    /// Repair stored documents in place.
    Repair {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = setup(&cli);
    let code = match cli.command {
        Command::PreWrite => {
            pre_write_hook(&config);
            0
        }
        Command::Repair { files } => repair_files(&files, &config),
        hook => {
            if let Err(err) = post_write_hook(&hook, &config) {
                error!("{err:#}");
            }
            0
        }
    };
    std::process::exit(code);
}

/// Load config and install logging; both degrade to defaults on failure.
fn setup(cli: &Cli) -> EnricherConfig {
    let loaded = load_config(&cli.config);
    let logging_config = match &loaded {
        Ok(config) => config.logging.clone(),
        Err(_) => LoggingConfig::default(),
    };
    if let Err(err) = logging::init(&logging_config) {
        let _ = logging::init(&LoggingConfig {
            file: None,
            ..logging_config
        });
        error!("{err:#}");
    }
    match loaded {
        Ok(config) => config,
        Err(err) => {
            error!("{err:#}; using defaults");
            EnricherConfig::default()
        }
    }
}

fn pre_write_hook(config: &EnricherConfig) {
    let raw = match read_stdin() {
        Ok(raw) => raw,
        Err(err) => {
            error!("{err:#}");
            return;
        }
    };
    match pre_write::run(&raw, config) {
        Ok(event) => println!("{event}"),
        Err(err) => {
            error!("{err:#}");
            print!("{raw}");
        }
    }
}

fn post_write_hook(command: &Command, config: &EnricherConfig) -> Result<()> {
    let event = HookEvent::parse(&read_stdin()?)?;
    let counter = build_counter(&config.tokens);
    let ctx = PassContext::new(config, counter.as_ref());
    match command {
        Command::Init => report("init", initialize::run(&event, &ctx)?),
        Command::Finalize => report("finalize", finalize::run(&event, &ctx)?),
        Command::Enrich => {
            let outcomes = enrich::run(&event, &ctx);
            let written = outcomes
                .iter()
                .filter(|(_, outcome)| *outcome == StageOutcome::Written)
                .count();
            info!(stage = "enrich", checked = outcomes.len(), written, "done");
        }
        Command::PreWrite | Command::Repair { .. } => {}
    }
    Ok(())
}

fn report(stage: &str, outcome: StageOutcome) {
    info!(stage, ?outcome, "done");
}

fn repair_files(files: &[PathBuf], config: &EnricherConfig) -> i32 {
    let counter = build_counter(&config.tokens);
    let ctx = PassContext::new(config, counter.as_ref());
    let mut failed = 0;
    for path in files {
        match repair_file(path, &ctx) {
            Ok(outcome) => info!(stage = "repair", path = %path.display(), ?outcome, "done"),
            Err(err) => {
                error!(path = %path.display(), "{err:#}");
                failed += 1;
            }
        }
    }
    i32::from(failed > 0)
}
