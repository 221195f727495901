// locus CLI - batch location resolution for the builder directory

mod batch;
mod config_cmd;
mod context;
mod exit_codes;
mod json_store;
mod logging;
mod municipalities;
mod rank;
mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};

use locus_resolver::{CentroidLookup, Resolver};

use batch::{BatchRunner, Mode, RunError, RunOptions};
use context::Context;
use exit_codes::{EXIT_DATA_READ, EXIT_DATA_WRITE, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};
use report::RunReport;

#[derive(Parser)]
#[command(name = "locus")]
#[command(about = "Resolve and reconcile builder locations (area codes, addresses, service areas)")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file (default: <config dir>/locus/locus.toml)
    #[arg(long, global = true, env = "LOCUS_CONFIG")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). LOCUS_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one batch pass over the entity store
    #[command(after_help = "\
Modes:
  phone     area-code lookup for entities without a location
            (non-geographic numbers fall through to the address)
  geocode   address lookup for entities without a location
  validate  compare resolved vs declared service areas, write nothing
  fix       apply deterministic corrections, report the rest

Examples:
  locus resolve --mode phone
  locus resolve --mode validate --json > findings.json
  locus resolve --mode fix --output fix-report.json")]
    Resolve {
        #[arg(long, value_enum)]
        mode: Mode,

        /// Print the full report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to this file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Maintain the municipality centroid store
    #[command(subcommand)]
    Municipalities(MunicipalityCommands),

    /// List entities near a point
    #[command(after_help = "\
Examples:
  locus rank --lat 35.681 --lng 139.767 --max-km 30
  locus rank --lat 34.702 --lng 135.496 --max-km 50 --limit 10 --json")]
    Rank {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        #[arg(long, allow_hyphen_values = true)]
        max_km: f64,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Inspect or create the config file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum MunicipalityCommands {
    /// Geocode reference municipalities missing from the store
    Build {
        #[arg(long)]
        json: bool,
    },

    /// Compare the store against the reference dataset
    Check {
        #[arg(long)]
        json: bool,

        /// Exit non-zero when municipalities are missing
        #[arg(long)]
        strict: bool,
    },

    /// Merge hand-entered coordinates (JSON array) into the store
    ApplyOverrides {
        /// Overrides file (default: paths.overrides)
        file: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the config file path in effect
    Path,
    /// Print the effective settings
    Show,
    /// Write a starter config file
    Init {
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("LOCUS_GIT_HASH"), ")",
        "\nresolver: locus-resolver ", env!("CARGO_PKG_VERSION"),
        "\ntarget:   ", env!("LOCUS_TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = cli.config.as_deref();

    let result = match cli.command {
        None => {
            eprintln!("Usage: locus <command> [options]");
            eprintln!("       locus --help for more information");
            Ok(())
        }
        Some(Commands::Resolve { mode, json, output }) => cmd_resolve(config, mode, json, output),
        Some(Commands::Municipalities(cmd)) => Context::load(config).and_then(|ctx| match cmd {
            MunicipalityCommands::Build { json } => municipalities::cmd_build(&ctx, json),
            MunicipalityCommands::Check { json, strict } => {
                municipalities::cmd_check(&ctx, json, strict)
            }
            MunicipalityCommands::ApplyOverrides { file, json } => {
                municipalities::cmd_apply_overrides(&ctx, file, json)
            }
        }),
        Some(Commands::Rank { lat, lng, max_km, limit, json }) => Context::load(config)
            .and_then(|ctx| rank::cmd_rank(&ctx, lat, lng, max_km, limit, json)),
        Some(Commands::Config(cmd)) => match cmd {
            ConfigCommands::Path => config_cmd::cmd_path(config),
            ConfigCommands::Show => config_cmd::cmd_show(config),
            ConfigCommands::Init { path } => config_cmd::cmd_init(path),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<RunError> for CliError {
    fn from(err: RunError) -> Self {
        let code = match err {
            RunError::List(_) => EXIT_DATA_READ,
            RunError::Checkpoint(_) => EXIT_DATA_WRITE,
        };
        Self::new(code, err.to_string())
    }
}

// ============================================================================
// resolve
// ============================================================================

fn cmd_resolve(
    config: Option<&Path>,
    mode: Mode,
    json: bool,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let ctx = Context::load(config)?;
    let table = ctx.area_code_table()?;
    let area_codes = table.version().to_string();

    let municipalities = ctx.municipality_store()?;
    let centroids: Option<&dyn CentroidLookup> =
        (!municipalities.is_empty()).then_some(&municipalities as &dyn CentroidLookup);

    // Address lookups need some source; reconciliation never calls the API.
    let geocoder = match mode {
        Mode::Geocode if centroids.is_none() => Some(ctx.require_geocoder()?),
        Mode::Phone | Mode::Geocode => ctx.geocoder()?,
        Mode::Validate | Mode::Fix => None,
    };

    let mut store = ctx.entity_store()?;
    let options = RunOptions {
        checkpoint_every: ctx.settings.batch.checkpoint_every,
        sample_limit: ctx.settings.batch.sample_limit,
    };
    let mut runner = BatchRunner::new(Resolver::new(table), ctx.reconciler(centroids), options);
    if let Some(geocoder) = geocoder {
        runner = runner.with_geocoder(geocoder);
    }
    if let Some(centroids) = centroids {
        runner = runner.with_centroids(centroids);
    }

    let started_at = Utc::now();
    let stats = runner.run(&mut store, mode, started_at)?;

    let report = RunReport::new(mode, area_codes, started_at, stats);
    report.print_summary();
    report::emit(&report, json, output.as_deref())
}
