use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    Sequential,
    Parallel,
    Batch,
    Script,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventsArg {
    Text,
    Jsonl,
}

#[derive(Parser, Debug)]
#[command(name = "stagerun", version, about = "Run stage-ordered, idempotent command pipelines")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.stagerun/config.toml or ./stagerun.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "stagerun_core=trace". RUST_LOG wins.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// TOML plan describing stages and commands.
    #[arg(long)]
    pub plan: PathBuf,

    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,

    /// Worker width for parallel execution and batches.
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Log what would run without touching anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Run only these stages, in the order given. Can be repeated.
    #[arg(long = "stage", action = clap::ArgAction::Append)]
    pub stages: Vec<String>,

    /// Per-command timeout for local backends.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long, value_enum)]
    pub events: Option<EventsArg>,

    /// Script path for the script backend.
    #[arg(long)]
    pub script: Option<String>,

    /// Show progress bars (parallel backend).
    #[arg(long)]
    pub progress: bool,

    #[arg(long, short)]
    pub quiet: bool,

    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ShowArgs {
    #[arg(long)]
    pub plan: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a plan.
    Run(RunArgs),
    /// Print a plan with pending and finished counts per stage.
    Show(ShowArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_repeated_stages() {
        let args = Args::try_parse_from([
            "stagerun",
            "--log-level",
            "debug",
            "run",
            "--plan",
            "plan.toml",
            "--backend",
            "parallel",
            "--stage",
            "prep",
            "--stage",
            "reg",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(args.log_level.as_deref(), Some("debug"));
        let Commands::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.backend, Some(BackendArg::Parallel));
        assert_eq!(run.stages, vec!["prep", "reg"]);
        assert!(run.dry_run);
    }

    #[test]
    fn global_config_after_subcommand() {
        let args =
            Args::try_parse_from(["stagerun", "show", "--plan", "p.toml", "--config", "c.toml"])
                .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("c.toml")));
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(Args::try_parse_from(["stagerun", "run", "--plan", "p", "--backend", "slurm"]).is_err());
    }
}
