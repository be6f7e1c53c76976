//! CLI argument definitions (§6.1).

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for a finished council session.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Every stage: opinions, reviews, votes, and the synthesis.
    Full,
    /// Only the final synthesized answer.
    Synthesis,
    /// The full `CouncilSession`, as JSON.
    Json,
}

/// CLI arguments for the council orchestrator.
#[derive(Parser, Debug)]
#[command(name = "council")]
#[command(author, version, about = "Council Orchestrator - multiple LLMs deliberate and vote on an answer")]
#[command(long_about = r#"
The Council Orchestrator runs a panel of LLMs through a staged deliberation:

1. Opinions: every active member answers the question independently
2. Review: reviewing members critique the opinions
3. Voting: every voting member casts a position, with self-correction via
   backup activation when confidence falls below threshold
4. Synthesis: the synthesizer member produces the final answer

The council's composition (size, roles, voting method) is chosen by the
meta-planner unless overridden on the command line.

Example:
  council "What's the best way to handle errors in Rust?"
  council --voting-method weighted --max-iterations 3 "Compare async runtimes"
"#)]
pub struct Cli {
    /// The question to put before the council.
    pub question: String,

    /// Path to a config file (defaults to ./council.toml, then the global config).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Skip all config file discovery and use built-in defaults.
    #[arg(long)]
    pub no_config: bool,

    /// Override the meta-planner's voting method for this run.
    #[arg(long, value_name = "METHOD")]
    pub voting_method: Option<String>,

    /// Override the maximum number of iterations for this run.
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// Disable iterative refinement, forcing a single pass.
    #[arg(long)]
    pub no_iterations: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "synthesis")]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators.
    #[arg(short, long)]
    pub quiet: bool,
}
