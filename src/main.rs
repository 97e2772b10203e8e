use std::{path::PathBuf, sync::Arc};

use clap::{AppSettings, Parser};
use itertools::Itertools;
use log::{debug, error, info};

use pipedata::{container::schema, Container, ContainerError, DirStore, LoadOptions, SelfComm};

#[derive(Parser)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_long_args = true)]
struct Args {
    /// The directory store holding the container.
    store: Option<PathBuf>,

    /// The group of the store holding the container.
    #[clap(short, long, default_value = "/")]
    group: String,

    /// Print the registered container types and exit.
    #[clap(long)]
    list_types: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    verbosity: u8,
}

fn main() {
    let args = Args::parse();
    setup_logging(args.verbosity);

    if args.list_types {
        for name in schema::registered_types() {
            info!("{name}");
        }
        return;
    }

    let store = match args.store {
        Some(store) => store,
        None => {
            error!("No store given");
            std::process::exit(1);
        }
    };
    if let Err(e) = describe(store, &args.group) {
        error!("{e}");
        std::process::exit(1);
    }
}

/// Report the type, axes, datasets and attributes of a saved container
/// without reading any of its data.
fn describe(store: PathBuf, group: &str) -> Result<(), ContainerError> {
    debug!("Opening {}", store.display());
    let store = DirStore::open(store)?;
    let options = LoadOptions {
        lazy: true,
        ..Default::default()
    };
    let container = Container::load(Arc::new(store), group, &options, SelfComm::new_arc())?;

    info!("Container type: {}", container.container_type());
    info!("Axes:");
    for axis in container.axes() {
        info!("  {axis}");
    }
    info!("Datasets:");
    for dataset in container.datasets() {
        let distributed = match dataset.distributed_axis() {
            Some(axis) => format!(", distributed over '{}'", dataset.axes()[axis]),
            None => String::new(),
        };
        info!(
            "  {} [{}]: {} {:?}{distributed}",
            dataset.name(),
            dataset.axes().iter().join(", "),
            dataset.dtype(),
            dataset.shape()
        );
        for (key, value) in dataset.attrs() {
            info!("    {key} = {value}");
        }
    }
    if !container.attrs().is_empty() {
        info!("Attributes:");
        for (key, value) in container.attrs() {
            info!("  {key} = {value}");
        }
    }
    Ok(())
}

/// The log level for a verbosity, and whether records show where they came
/// from.
fn log_level(verbosity: u8) -> (log::LevelFilter, bool) {
    match verbosity {
        0 => (log::LevelFilter::Info, false),
        1 => (log::LevelFilter::Debug, false),
        2 => (log::LevelFilter::Trace, false),
        _ => (log::LevelFilter::Trace, true),
    }
}

fn setup_logging(verbosity: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    let (level, show_line) = log_level(verbosity);
    builder.filter_level(level);
    if show_line {
        builder.format(|buf, record| {
            use std::io::Write;

            let level = record.level();
            let target = record.target();
            let line = record.line().unwrap_or(0);
            writeln!(buf, "[{level} {target}:{line}] {}", record.args())
        });
    }
    builder.init();
}

#[cfg(test)]
mod tests {
    use log::LevelFilter;

    use super::*;

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0), (LevelFilter::Info, false));
        assert_eq!(log_level(1), (LevelFilter::Debug, false));
        assert_eq!(log_level(2), (LevelFilter::Trace, false));
        assert_eq!(log_level(3), (LevelFilter::Trace, true));
        assert_eq!(log_level(7), (LevelFilter::Trace, true));
    }
}
