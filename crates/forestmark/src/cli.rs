//! Command-line surface
//!
//! Usage errors are left to clap; enumerated values are parsed here so an
//! unknown storage mode or access mode is a configuration error like any
//! other.

use crate::config::BenchConfig;
use crate::error::ConfigError;
use crate::logging::LogFormat;
use crate::scenario::ScenarioRegistry;
use crate::sweep::SweepPlan;
use crate::VERSION;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use forestmark_writer::ParseOptionError;
use std::path::PathBuf;
use std::str::FromStr;

/// A parsed invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Cli {
    /// Filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Log line format
    pub log_format: LogFormat,
    /// What to do
    pub action: Action,
}

/// Subcommand with its resolved settings
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// One benchmark run
    Run(BenchConfig),
    /// Run a matrix under `base`
    Sweep {
        /// Matrix
        plan: SweepPlan,
        /// Root of the point directories
        base: PathBuf,
    },
    /// Tabulate a finished matrix under `base`
    Extract {
        /// Matrix
        plan: SweepPlan,
        /// Root of the point directories
        base: PathBuf,
    },
}

/// The `forestmark` command with every scenario's options attached to `run`
#[must_use]
pub fn command(registry: &ScenarioRegistry) -> Command {
    Command::new("forestmark")
        .version(VERSION)
        .about("Collective write benchmark for adaptively refined hybrid forests")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .help("Log filter used when RUST_LOG is unset"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log line format"),
        )
        .subcommand(run_command(registry))
        .subcommand(
            matrix_args(Command::new("sweep").about("Run a benchmark matrix, skipping finished points"))
                .arg(
                    Arg::new("fill")
                        .short('f')
                        .long("fill")
                        .action(ArgAction::SetTrue)
                        .help("Pre-write fill values"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Run seed [default: 5489]"),
                )
                .arg(
                    Arg::new("chunk-len")
                        .long("chunk-len")
                        .value_parser(value_parser!(u64))
                        .help("Rows per chunk in the chunked layout [default: 4096]"),
                ),
        )
        .subcommand(matrix_args(
            Command::new("extract").about("Print the results of a benchmark matrix as CSV"),
        ))
}

fn run_command(registry: &ScenarioRegistry) -> Command {
    let command = Command::new("run")
        .about("Run the benchmark once")
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration; flags given here override it"),
        )
        .arg(
            Arg::new("fill")
                .short('f')
                .long("fill")
                .action(ArgAction::SetTrue)
                .help("Pre-write fill values"),
        )
        .arg(
            Arg::new("storage_mode")
                .short('s')
                .long("storage_mode")
                .help("contiguous (NC_CONTIGUOUS) or chunked (NC_CHUNKED) [default: chunked]"),
        )
        .arg(
            Arg::new("mpi_access")
                .short('m')
                .long("mpi_access")
                .help("independent (NC_INDEPENDENT), collective (NC_COLLECTIVE) or file_per_process [default: collective]"),
        )
        .arg(
            Arg::new("netcdf_version")
                .short('c')
                .long("netcdf_version")
                .help("cdf5 or netcdf4_hdf5 [default: netcdf4_hdf5]"),
        )
        .arg(
            Arg::new("scenario")
                .short('z')
                .long("scenario")
                .help(format!("Scenario to run: {} [default: pseudo_random]", registry.ids().join(", "))),
        )
        .arg(
            Arg::new("num_element_wise_variables")
                .short('v')
                .long("num_element_wise_variables")
                .value_parser(value_parser!(usize))
                .help("Number of synthetic element-wise variables [default: 0]"),
        )
        .arg(
            Arg::new("ranks")
                .long("ranks")
                .value_parser(value_parser!(usize))
                .help("Number of ranks [default: 1]"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(value_parser!(u64))
                .help("Run seed [default: 5489]"),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .value_parser(value_parser!(PathBuf))
                .help("Directory for the dataset and results.json [default: .]"),
        )
        .arg(
            Arg::new("chunk-len")
                .long("chunk-len")
                .value_parser(value_parser!(u64))
                .help("Rows per chunk in the chunked layout [default: 4096]"),
        );

    registry.all_options().fold(command, |command, option| {
        command.arg(
            Arg::new(option.key)
                .long(option.key)
                .help(format!("{} [default: {}]", option.help, option.default)),
        )
    })
}

fn matrix_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("base")
                .long("base")
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Root directory of the matrix"),
        )
        .arg(
            Arg::new("repetitions")
                .long("repetitions")
                .value_parser(value_parser!(usize))
                .help("Runs per configuration [default: 3]"),
        )
        .arg(
            Arg::new("ranks")
                .long("ranks")
                .value_delimiter(',')
                .value_parser(value_parser!(usize))
                .help("Comma-separated rank counts [default: 1]"),
        )
        .arg(
            Arg::new("mpi_access")
                .short('m')
                .long("mpi_access")
                .value_delimiter(',')
                .help("Comma-separated access modes [default: all]"),
        )
        .arg(
            Arg::new("storage_mode")
                .short('s')
                .long("storage_mode")
                .value_delimiter(',')
                .help("Comma-separated storage modes [default: all]"),
        )
        .arg(
            Arg::new("netcdf_version")
                .short('c')
                .long("netcdf_version")
                .value_delimiter(',')
                .help("Comma-separated format generations [default: all]"),
        )
        .arg(
            Arg::new("num_element_wise_variables")
                .short('v')
                .long("num_element_wise_variables")
                .value_parser(value_parser!(usize))
                .help("Number of synthetic element-wise variables [default: 0]"),
        )
        .arg(
            Arg::new("bytes")
                .long("bytes")
                .value_parser(value_parser!(u64))
                .help("Byte budget of the pseudo_random scenario [default: 1073741824]"),
        )
}

impl Cli {
    /// Resolve matches produced by [`command`]
    pub fn from_matches(registry: &ScenarioRegistry, matches: &ArgMatches) -> Result<Self, ConfigError> {
        let log_level = matches
            .get_one::<String>("log-level")
            .cloned()
            .unwrap_or_else(|| "info".to_string());
        let log_format = match matches.get_one::<String>("log-format") {
            Some(format) => format.parse()?,
            None => LogFormat::default(),
        };

        let action = match matches.subcommand() {
            Some(("run", args)) => Action::Run(run_config(registry, args)?),
            Some(("sweep", args)) => Action::Sweep {
                plan: sweep_plan(args, true)?,
                base: base_dir(args),
            },
            Some(("extract", args)) => Action::Extract {
                plan: sweep_plan(args, false)?,
                base: base_dir(args),
            },
            Some((other, _)) => return Err(ConfigError::invalid("command", other, "expected run, sweep or extract")),
            None => return Err(ConfigError::invalid("command", "", "expected run, sweep or extract")),
        };

        Ok(Self {
            log_level,
            log_format,
            action,
        })
    }
}

/// Defaults, then `--config`, then the remaining flags
fn run_config(registry: &ScenarioRegistry, args: &ArgMatches) -> Result<BenchConfig, ConfigError> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => BenchConfig::from_file(path)?,
        None => BenchConfig::default(),
    };

    if args.get_flag("fill") {
        config.fill = true;
    }
    if let Some(mode) = parsed(args, "storage_mode")? {
        config.storage_mode = mode;
    }
    if let Some(access) = parsed(args, "mpi_access")? {
        config.mpi_access = access;
    }
    if let Some(format) = parsed(args, "netcdf_version")? {
        config.netcdf_version = format;
    }
    if let Some(scenario) = args.get_one::<String>("scenario") {
        config.scenario.clone_from(scenario);
    }
    if let Some(&count) = args.get_one::<usize>("num_element_wise_variables") {
        config.num_element_wise_variables = count;
    }
    if let Some(&ranks) = args.get_one::<usize>("ranks") {
        config.ranks = ranks;
    }
    if let Some(&seed) = args.get_one::<u64>("seed") {
        config.seed = seed;
    }
    if let Some(dir) = args.get_one::<PathBuf>("output-dir") {
        config.output_dir.clone_from(dir);
    }
    if let Some(&len) = args.get_one::<u64>("chunk-len") {
        config.chunk_len = len;
    }
    for option in registry.all_options() {
        if let Some(value) = args.get_one::<String>(option.key) {
            config.scenario_options.insert(option.key.to_string(), value.clone());
        }
    }

    config.validate()?;
    Ok(config)
}

fn sweep_plan(args: &ArgMatches, runs: bool) -> Result<SweepPlan, ConfigError> {
    let mut plan = SweepPlan::default();
    if let Some(&repetitions) = args.get_one::<usize>("repetitions") {
        plan.repetitions = repetitions;
    }
    if let Some(ranks) = args.get_many::<usize>("ranks") {
        plan.ranks = ranks.copied().collect();
    }
    if let Some(modes) = parsed_list(args, "mpi_access")? {
        plan.access_modes = modes;
    }
    if let Some(modes) = parsed_list(args, "storage_mode")? {
        plan.storage_modes = modes;
    }
    if let Some(formats) = parsed_list(args, "netcdf_version")? {
        plan.formats = formats;
    }
    if let Some(&count) = args.get_one::<usize>("num_element_wise_variables") {
        plan.num_element_wise_variables = count;
    }
    if let Some(&bytes) = args.get_one::<u64>("bytes") {
        plan.bytes = bytes;
    }
    if runs {
        plan.fill = args.get_flag("fill");
        if let Some(&seed) = args.get_one::<u64>("seed") {
            plan.seed = seed;
        }
        if let Some(&len) = args.get_one::<u64>("chunk-len") {
            plan.chunk_len = len;
        }
    }

    if plan.ranks.contains(&0) {
        return Err(ConfigError::invalid("ranks", 0, "must be at least 1"));
    }
    if plan.chunk_len == 0 {
        return Err(ConfigError::invalid("chunk-len", 0, "must be at least 1"));
    }
    Ok(plan)
}

fn base_dir(args: &ArgMatches) -> PathBuf {
    args.get_one::<PathBuf>("base")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."))
}

fn parsed<T>(args: &ArgMatches, id: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr<Err = ParseOptionError>,
{
    Ok(args.get_one::<String>(id).map(|s| s.parse::<T>()).transpose()?)
}

fn parsed_list<T>(args: &ArgMatches, id: &str) -> Result<Option<Vec<T>>, ConfigError>
where
    T: FromStr<Err = ParseOptionError>,
{
    let Some(values) = args.get_many::<String>(id) else {
        return Ok(None);
    };
    let parsed = values.map(|s| s.parse::<T>()).collect::<Result<Vec<_>, _>>()?;
    Ok(Some(parsed))
}
