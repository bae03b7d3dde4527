use clap::{Args, Parser, Subcommand};

/// vw-executor - Cached Vowpal Wabbit sweeps
///
/// Runs vw over one or more input files for every configuration of a sweep,
/// caching every produced file and captured output so repeated runs are free.
#[derive(Parser, Debug)]
#[command(name = "vw-executor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cached hyper-parameter sweeps for Vowpal Wabbit", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Configuration arguments shared across commands
#[derive(Args, Debug, Clone, Default)]
pub struct CommonConfigArgs {
    /// Config file path
    #[arg(short = 'c', long, env = "VW_EXECUTOR_CONFIG")]
    pub config: Option<String>,

    /// Cache directory
    #[arg(long, env = "VW_EXECUTOR_CACHE_DIR")]
    pub cache_dir: Option<String>,

    /// vw executable (name on PATH or path)
    #[arg(long, env = "VW_EXECUTOR_VW")]
    pub vw: Option<String>,

    /// Jobs run in parallel (1 = sequential)
    #[arg(long)]
    pub procs: Option<usize>,

    /// Fail instead of running vw when a result is not cached
    #[arg(long)]
    pub no_run: bool,

    /// Re-run vw even when results are cached
    #[arg(long)]
    pub reset: bool,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, env = "VW_EXECUTOR_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train one model chain per configuration
    Train(RunArgs),

    /// Evaluate every input independently per configuration
    Test(RunArgs),

    /// Manage the result cache
    Cache(CacheArgs),
}

impl Commands {
    pub fn log_level(&self) -> Option<&str> {
        match self {
            Commands::Train(args) | Commands::Test(args) => args.common.log_level.as_deref(),
            Commands::Cache(args) => args.common.log_level.as_deref(),
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonConfigArgs,

    /// Input files, processed in order
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// vw options of one configuration (repeat for a list of configurations)
    #[arg(long = "opts", allow_hyphen_values = true, conflicts_with = "sweep")]
    pub opts: Vec<String>,

    /// JSON sweep table: an array of objects mapping options to values
    #[arg(long)]
    pub sweep: Option<String>,

    /// Output slot to cache (e.g. -p, --readable_model)
    #[arg(long = "output", allow_hyphen_values = true)]
    pub outputs: Vec<String>,

    /// Option under which inputs are passed
    #[arg(long, default_value = "-d", allow_hyphen_values = true)]
    pub input_mode: String,

    /// Directory the input files are relative to
    #[arg(long, default_value = ".")]
    pub input_dir: String,
}

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,

    #[command(flatten)]
    pub common: CommonConfigArgs,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Build vw cache files for the distinct cache commands of a sweep
    Build {
        /// Input files
        #[arg(required = true)]
        inputs: Vec<String>,

        /// vw options of one configuration (repeatable)
        #[arg(long = "opts", allow_hyphen_values = true, conflicts_with = "sweep")]
        opts: Vec<String>,

        /// JSON sweep table
        #[arg(long)]
        sweep: Option<String>,

        /// Directory the input files are relative to
        #[arg(long, default_value = ".")]
        input_dir: String,
    },

    /// Show cache statistics
    Stats,

    /// Remove every cached result
    Clean,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_train_with_repeated_opts() {
        let cli = Cli::try_parse_from([
            "vw-executor",
            "train",
            "--opts",
            "--cb_adf -l 0.1",
            "--opts",
            "--cb_adf -l 0.01",
            "--output",
            "-p",
            "a.txt",
            "b.txt",
        ])
        .unwrap();

        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.opts.len(), 2);
                assert_eq!(args.outputs, vec!["-p"]);
                assert_eq!(args.inputs, vec!["a.txt", "b.txt"]);
                assert_eq!(args.input_mode, "-d");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_opts_conflict_with_sweep() {
        let result = Cli::try_parse_from([
            "vw-executor",
            "test",
            "--opts",
            "-l 0.1",
            "--sweep",
            "sweep.json",
            "a.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_cache_stats_with_dir() {
        let cli =
            Cli::try_parse_from(["vw-executor", "cache", "--cache-dir", "/tmp/c", "stats"]).unwrap();
        match cli.command {
            Commands::Cache(args) => {
                assert!(matches!(args.command, CacheCommands::Stats));
                assert_eq!(args.common.cache_dir.as_deref(), Some("/tmp/c"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
