use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use libomicron_tools::config::{resolve_ifo, Config};
use libomicron_tools::error::{ConfigError, ReportError};
use libomicron_tools::gps::gps_now;
use libomicron_tools::report::{run_status, StatusParams};
use libomicron_tools::scheduler::CondorScheduler;
use libomicron_tools::status::Thresholds;

const DEFAULT_ARCHIVE: &str = "/home/detchar/triggers";
const DEFAULT_LOOKBACK: f64 = 7.0 * 86400.0;

fn make_template_config(path: &Path) -> Result<(), ReportError> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).map_err(ConfigError::from)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

fn cli() -> Command {
    Command::new("omicron_status")
        .about("Check the status of online Omicron processing")
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(true)
        .args_conflicts_with_subcommands(true)
        .subcommand_negates_reqs(true)
        .subcommand(
            Command::new("new")
                .about("Make a template configuration yaml file")
                .arg(Arg::new("path").required(true).help("Path to the new file")),
        )
        .arg(
            Arg::new("group")
                .required(true)
                .help("Name of the channel group to check"),
        )
        .arg(
            Arg::new("config-file")
                .short('c')
                .long("config-file")
                .env("OMICRON_CONFIG")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Path to the group configuration file"),
        )
        .arg(
            Arg::new("ifo")
                .short('i')
                .long("ifo")
                .help("IFO prefix, defaults to $IFO or the prefix of the first channel"),
        )
        .arg(
            Arg::new("gps-start")
                .short('s')
                .long("gps-start")
                .value_parser(value_parser!(f64))
                .help("GPS start of the search, defaults to one week before the end"),
        )
        .arg(
            Arg::new("gps-end")
                .short('e')
                .long("gps-end")
                .value_parser(value_parser!(f64))
                .help("GPS end of the search, defaults to now"),
        )
        .arg(
            Arg::new("channel")
                .short('x')
                .long("channel")
                .action(ArgAction::Append)
                .help("Check this channel instead of the configured ones (repeatable)"),
        )
        .arg(
            Arg::new("archive-directory")
                .short('a')
                .long("archive-directory")
                .env("OMICRON_ARCHIVE")
                .default_value(DEFAULT_ARCHIVE)
                .value_parser(value_parser!(PathBuf))
                .help("Root of the trigger archive"),
        )
        .arg(
            Arg::new("production-directory")
                .short('p')
                .long("production-directory")
                .value_parser(value_parser!(PathBuf))
                .help("Online production directory, defaults to ~/omicron/online/<group>"),
        )
        .arg(
            Arg::new("output-directory")
                .short('o')
                .long("output-directory")
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Directory for status documents, plots and the latency archive"),
        )
        .arg(
            Arg::new("latency-archive-tag")
                .short('t')
                .long("latency-archive-tag")
                .help("Tag of the latency archive file, defaults to the group name"),
        )
        .arg(
            Arg::new("skip-condor")
                .long("skip-condor")
                .action(ArgAction::SetTrue)
                .help("Do not check the HTCondor queue"),
        )
        .arg(
            Arg::new("skip-file-checks")
                .long("skip-file-checks")
                .action(ArgAction::SetTrue)
                .help("Stop after the HTCondor check"),
        )
        .arg(
            Arg::new("skip-plots")
                .long("skip-plots")
                .action(ArgAction::SetTrue)
                .help("Do not render PNG plots"),
        )
        .arg(
            Arg::new("html")
                .long("html")
                .action(ArgAction::SetTrue)
                .help("Write an HTML dashboard"),
        )
        .arg(
            Arg::new("warning")
                .long("warning")
                .value_parser(value_parser!(f64))
                .help("Latency (seconds) that raises a WARNING [default: 3600]"),
        )
        .arg(
            Arg::new("error")
                .long("error")
                .value_parser(value_parser!(f64))
                .help("Latency (seconds) that raises a CRITICAL [default: 7200]"),
        )
        .arg(
            Arg::new("unknown")
                .long("unknown")
                .value_parser(value_parser!(f64))
                .help("Age (seconds) after which a status document is stale [default: 1200]"),
        )
        .arg(
            Arg::new("minimum-gap")
                .long("minimum-gap")
                .value_parser(value_parser!(f64))
                .help("Edge gaps shorter than this (seconds) are unresolvable"),
        )
        .arg(
            Arg::new("condor-q")
                .long("condor-q")
                .default_value("condor_q")
                .help("The condor_q executable"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log debug messages"),
        )
}

/// Fill in everything the command line left to defaults
fn resolve_params(matches: &ArgMatches, config: &Config) -> Result<StatusParams, ReportError> {
    let group_name = matches
        .get_one::<String>("group")
        .cloned()
        .unwrap_or_default();
    let group = config.group(&group_name)?;

    let gps_end = matches
        .get_one::<f64>("gps-end")
        .copied()
        .unwrap_or_else(gps_now);
    let gps_start = matches
        .get_one::<f64>("gps-start")
        .copied()
        .unwrap_or(gps_end - DEFAULT_LOOKBACK);

    let environment_ifo = std::env::var("IFO").ok();
    let ifo = resolve_ifo(
        matches.get_one::<String>("ifo").map(|s| s.as_str()),
        environment_ifo.as_deref(),
        &group.channels,
    )?;

    let production_dir = match matches.get_one::<PathBuf>("production-directory") {
        Some(dir) => dir.clone(),
        None => PathBuf::from(std::env::var("HOME").unwrap_or_default())
            .join("omicron")
            .join("online")
            .join(&group_name),
    };

    let mut thresholds = Thresholds::default();
    if let Some(warning) = matches.get_one::<f64>("warning") {
        thresholds.warning = *warning;
    }
    if let Some(error) = matches.get_one::<f64>("error") {
        thresholds.error = *error;
    }
    if let Some(unknown) = matches.get_one::<f64>("unknown") {
        thresholds.unknown = *unknown;
    }

    Ok(StatusParams {
        latency_tag: matches
            .get_one::<String>("latency-archive-tag")
            .cloned()
            .unwrap_or_else(|| group_name.clone()),
        group: group_name,
        ifo,
        gps_start,
        gps_end,
        archive_dir: matches
            .get_one::<PathBuf>("archive-directory")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE)),
        production_dir,
        output_dir: matches
            .get_one::<PathBuf>("output-directory")
            .cloned()
            .unwrap_or_else(|| PathBuf::from(".")),
        skip_condor: matches.get_flag("skip-condor"),
        skip_file_checks: matches.get_flag("skip-file-checks"),
        skip_plots: matches.get_flag("skip-plots"),
        html: matches.get_flag("html"),
        thresholds,
        minimum_gap: matches.get_one::<f64>("minimum-gap").copied(),
    })
}

fn run(matches: &ArgMatches) -> Result<(), ReportError> {
    let config_path = matches
        .get_one::<PathBuf>("config-file")
        .cloned()
        .unwrap_or_default();
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let mut config = Config::read_config_file(&config_path)?;
    log::info!("Config successfully loaded.");

    if let (Some(name), Some(channels)) = (
        matches.get_one::<String>("group"),
        matches.get_many::<String>("channel"),
    ) {
        let group = config.group(name)?.clone();
        config
            .groups
            .insert(name.clone(), group.with_channels(channels.cloned().collect()));
    }
    let params = resolve_params(matches, &config)?;
    let group = config.group(&params.group)?;

    log::info!("Group: {}", params.group);
    log::info!("IFO: {}", params.ifo);
    log::info!("Channels: {}", group.channels.join(", "));
    log::info!("Span: [{}, {})", params.gps_start, params.gps_end);
    log::info!("Archive Path: {}", params.archive_dir.to_string_lossy());
    log::info!(
        "Production Path: {}",
        params.production_dir.to_string_lossy()
    );
    log::info!("Output Path: {}", params.output_dir.to_string_lossy());

    let scheduler = CondorScheduler::new(
        matches
            .get_one::<String>("condor-q")
            .map(|s| s.as_str())
            .unwrap_or("condor_q"),
    );
    let report = run_status(group, &config.author, &params, &scheduler)?;
    for status in report.statuses.iter() {
        log::info!(
            "{} status {} written to {}",
            status.check.name(),
            status.code,
            status.path.to_string_lossy()
        );
    }
    Ok(())
}

fn main() {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    if let Err(e) = simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    ) {
        eprintln!("Could not create logging: {e}");
    }

    if let Some(("new", sub_matches)) = matches.subcommand() {
        let path = sub_matches
            .get_one::<String>("path")
            .map(PathBuf::from)
            .unwrap_or_default();
        log::info!("Making a template config at {}...", path.to_string_lossy());
        match make_template_config(&path) {
            Ok(()) => log::info!("Done."),
            Err(e) => {
                log::error!("{e}");
                std::process::exit(1);
            }
        }
        return;
    }

    match run(&matches) {
        Ok(()) => log::info!("Done."),
        Err(e) => {
            log::error!("Status check failed with error: {e}");
            std::process::exit(1);
        }
    }
}
