use clap::{Args, Parser, Subcommand};
use tioverlap::dataset::DatasetKind;
use tioverlap::indicator::IndicatorKind;

pub mod batch;
pub mod compare;
pub mod config;
pub mod info;
pub mod init_config;
pub mod logging;
pub mod report;
pub mod simulate;
pub mod version;

#[derive(Parser)]
#[command(name = "tioverlap")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Privacy-preserving threat-indicator overlap estimation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Synthetic dataset and filter options shared by `simulate` and `batch`
#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Number of indicators held by the first party
    #[arg(long, default_value_t = 1000)]
    pub dataset1_size: usize,

    /// Number of indicators held by the second party
    #[arg(long, default_value_t = 1000)]
    pub dataset2_size: usize,

    /// Shared indicators, as a percentage of the smaller dataset (0-100)
    #[arg(long, default_value_t = 50.0)]
    pub overlap_percentage: f64,

    /// Type of indicators to generate
    #[arg(long, value_enum, default_value_t = DatasetKind::Ip)]
    pub ioc_type: DatasetKind,

    /// Bloom filter size (overrides config)
    #[arg(long)]
    pub bloom_size: Option<usize>,

    /// Hash rounds per indicator (overrides config)
    #[arg(long)]
    pub hash_count: Option<usize>,

    /// RNG seed for reproducible datasets
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a two-party overlap simulation on synthetic datasets
    Simulate {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Write the JSON result to this file
        #[arg(long, short)]
        output: Option<String>,

        /// Skip the cleartext accuracy check
        #[arg(long)]
        no_verify: bool,

        /// Path to config file (default: ~/.config/tioverlap/config.toml)
        #[arg(long)]
        config: Option<String>,
    },

    /// Estimate the overlap of two indicator files
    CompareFiles {
        /// First indicator file (one indicator per line)
        file1: String,

        /// Second indicator file (one indicator per line)
        file2: String,

        /// Indicator type of both files (auto-detected per line if omitted)
        #[arg(long)]
        ioc_type: Option<IndicatorKind>,

        /// Bloom filter size (overrides config)
        #[arg(long)]
        bloom_size: Option<usize>,

        /// Hash rounds per indicator (overrides config)
        #[arg(long)]
        hash_count: Option<usize>,

        /// Write the JSON result to this file
        #[arg(long, short)]
        output: Option<String>,

        /// Path to config file (default: ~/.config/tioverlap/config.toml)
        #[arg(long)]
        config: Option<String>,
    },

    /// Run several independent simulations concurrently
    Batch {
        /// Number of runs
        #[arg(long, default_value_t = 4)]
        runs: usize,

        #[command(flatten)]
        dataset: DatasetArgs,

        /// Path to config file (default: ~/.config/tioverlap/config.toml)
        #[arg(long)]
        config: Option<String>,
    },

    /// Show effective configuration and scheme parameters
    Info {
        /// Path to config file (default: ~/.config/tioverlap/config.toml)
        #[arg(long)]
        config: Option<String>,
    },

    /// Write a commented default configuration file
    InitConfig {
        /// Where to write it (default: ~/.config/tioverlap/config.toml)
        #[arg(long)]
        path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}

/// Load the config (and apply CLI overrides) and start logging.
fn prepare(
    config_path: Option<&str>,
    bloom_size: Option<usize>,
    hash_count: Option<usize>,
) -> Result<config::AppConfig, Box<dyn std::error::Error>> {
    let mut config = config::AppConfig::load_or_default(config_path.map(std::path::Path::new))?;
    config.apply_overrides(bloom_size, hash_count)?;
    logging::init(&config.logging)?;
    Ok(config)
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Simulate {
            dataset,
            output,
            no_verify,
            config,
        } => {
            let config = prepare(config.as_deref(), dataset.bloom_size, dataset.hash_count)?;
            simulate::execute(&config, dataset, output, !no_verify).await
        }
        Commands::CompareFiles {
            file1,
            file2,
            ioc_type,
            bloom_size,
            hash_count,
            output,
            config,
        } => {
            let config = prepare(config.as_deref(), bloom_size, hash_count)?;
            compare::execute(&config, file1, file2, ioc_type, output).await
        }
        Commands::Batch {
            runs,
            dataset,
            config,
        } => {
            let config = prepare(config.as_deref(), dataset.bloom_size, dataset.hash_count)?;
            batch::execute(&config, runs, dataset).await
        }
        Commands::Info { config } => {
            let path = config
                .map(std::path::PathBuf::from)
                .unwrap_or_else(config::default_config_path);
            info::execute(&path)
        }
        Commands::InitConfig { path, force } => init_config::execute(path, force),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
