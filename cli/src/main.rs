//! CLI entrypoint for the Council Orchestrator.
//!
//! Wires the four layers together: loads configuration, builds the model
//! registry (C1), constructs the event bus (C7) and session repository (C8),
//! picks a meta-planner (C5), and runs one `RunCouncil` call (C6) through
//! [`CouncilPipeline`].

use anyhow::{bail, Context, Result};
use clap::Parser;
use quorum_application::{CouncilPipeline, EventHandler, RunOptions};
use quorum_domain::council::VotingMethod;
use quorum_infrastructure::config::ConfigLoader;
use quorum_infrastructure::council::{AdapterRegistry, InMemorySessionRepository, InProcessEventBus};
use quorum_presentation::{Cli, ConsoleFormatter, OutputFormat, OutputFormatter, ProgressReporter, SimpleProgress};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    info!("starting council orchestrator");

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).context("failed to load configuration")?
    };

    if config.models.is_empty() {
        bail!(
            "no models configured; add a [[models]] entry to council.toml or \
             ~/.config/council-orchestrator/config.toml (see --help)"
        );
    }

    let adapters = AdapterRegistry::build(&config.models).context("failed to build model adapters")?;
    let planner_adapter = config.planner.model_id.as_ref().and_then(|id| adapters.get(id).cloned());

    let event_bus = Arc::new(InProcessEventBus::new());
    let session_repo = Arc::new(InMemorySessionRepository::new());

    let mut meta_planner = quorum_application::MetaPlanner::new(config.planner.parse_mode());
    if let Some(model_config) = config.planner.model_config() {
        meta_planner = meta_planner.with_model_config(model_config);
    }

    let mut opts = RunOptions::default();
    if cli.voting_method.is_some() || cli.max_iterations.is_some() || cli.no_iterations {
        // Plan once here (instead of leaving it to `run_council`) so the CLI's
        // per-run overrides land on a concrete plan before the pipeline sees it.
        let known_models: Vec<String> = adapters.keys().cloned().collect();
        let mut plan = meta_planner
            .plan(&cli.question, planner_adapter.as_deref())
            .await
            .context("meta-planner failed")?
            .apply_safety_clamps(&known_models);

        if let Some(method) = &cli.voting_method {
            plan.voting_method = method.parse::<VotingMethod>().map_err(|e| anyhow::anyhow!(e))?;
        }
        if cli.no_iterations {
            plan.allow_iterations = false;
        }
        if let Some(max_iterations) = cli.max_iterations {
            plan.allow_iterations = plan.allow_iterations && max_iterations > 1;
            plan.max_iterations = max_iterations;
        }
        opts.plan = Some(plan);
    }

    let mut pipeline = CouncilPipeline::new(adapters, event_bus.clone(), session_repo.clone(), meta_planner);
    if let Some(adapter) = planner_adapter {
        pipeline = pipeline.with_planner_adapter(adapter);
    }

    if !cli.quiet {
        let handler: Arc<dyn EventHandler> = if cli.verbose > 0 {
            Arc::new(SimpleProgress)
        } else {
            Arc::new(ProgressReporter::new())
        };
        event_bus.subscribe(None, handler);
    }

    let session = pipeline
        .run_council(&cli.question, opts)
        .await
        .context("council run failed")?;

    let rendered = match cli.output {
        OutputFormat::Full => ConsoleFormatter.format(&session),
        OutputFormat::Synthesis => ConsoleFormatter.format_synthesis_only(&session),
        OutputFormat::Json => ConsoleFormatter.format_json(&session),
    };

    println!("{}", rendered);
    Ok(())
}
