use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

use libomicron_tools::merge::{backend_for, merge_files, MergeOptions};

fn cli() -> Command {
    Command::new("omicron_merge")
        .about("Merge a contiguous run of Omicron trigger files into one file")
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(true)
        .arg(
            Arg::new("files")
                .required(true)
                .num_args(2..)
                .value_parser(value_parser!(PathBuf))
                .help("Input files followed by the output file"),
        )
        .arg(
            Arg::new("remove-input")
                .long("remove-input")
                .action(ArgAction::SetTrue)
                .help("Remove the input files once the merge succeeds"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .action(ArgAction::SetTrue)
                .help("Require the inputs to be contiguous and non-overlapping"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log debug messages"),
        )
}

/// The last positional argument is the output, everything before it is an input
fn split_files(mut files: Vec<PathBuf>) -> Option<(Vec<PathBuf>, PathBuf)> {
    let output = files.pop()?;
    if files.is_empty() {
        None
    } else {
        Some((files, output))
    }
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

    let files: Vec<PathBuf> = matches
        .get_many::<PathBuf>("files")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let Some((inputs, output)) = split_files(files) else {
        log::error!("At least one input and one output file are required");
        std::process::exit(1);
    };

    let options = MergeOptions {
        strict: matches.get_flag("strict"),
        remove_input: matches.get_flag("remove-input"),
    };
    let backend = backend_for(&output);
    match merge_files(&inputs, &output, &options, backend.as_ref()) {
        Ok(summary) => {
            for path in summary.removed.iter() {
                log::debug!("Removed {}", path.to_string_lossy());
            }
            log::info!("Done.");
        }
        Err(e) => {
            log::error!("Merging failed with error: {e}");
            std::process::exit(1);
        }
    }
}
