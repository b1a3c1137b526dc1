use std::{
    ffi::OsString,
    io::{self, BufWriter, Write},
    path::PathBuf,
    process::ExitCode,
};

use alnoq::{config::Overrides, Config, Handle, QueryOptions};
use clap::{ArgAction, Args, Parser};

#[derive(Parser)]
#[command(name = "alnoq", version,
    about = "Display information about installed packages")]
struct Cli {
    /// Set an alternate installation root
    #[arg(short, long, value_name = "PATH")]
    root: Option<PathBuf>,

    /// Set an alternate database location
    #[arg(short = 'b', long, value_name = "PATH")]
    dbpath: Option<PathBuf>,

    /// Set an alternate configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Be verbose
    #[arg(short, long)]
    verbose: bool,

    /// Display debug messages
    #[arg(long)]
    debug: bool,

    #[command(flatten)]
    query: QueryArgs,
}

#[derive(Args)]
#[command(next_help_heading = "Query options")]
struct QueryArgs {
    /// List packages installed as dependencies [filter]
    #[arg(short, long)]
    deps: bool,

    /// List packages explicitly installed [filter]
    #[arg(short, long)]
    explicit: bool,

    /// View package information (-ii for more)
    #[arg(short, long, action = ArgAction::Count)]
    info: u8,

    /// List the contents of the queried package
    #[arg(short, long = "list")]
    listfiles: bool,

    /// List installed packages not found in sync db(s) [filter]
    #[arg(short = 'm', long)]
    foreign: bool,

    /// Show less information for query and search
    #[arg(short, long)]
    quiet: bool,

    /// List packages not required by any package [filter]
    #[arg(short = 't', long)]
    unrequired: bool,

    /// List outdated packages [filter]
    #[arg(short, long)]
    upgrades: bool,

    /// Packages to show (show all packages if no arguments)
    #[arg(value_name = "pkg")]
    pkgnames: Vec<String>,
}

impl From<QueryArgs> for QueryOptions {
    fn from(args: QueryArgs) -> Self {
        Self {
            deps: args.deps,
            explicit: args.explicit,
            info: args.info,
            listfiles: args.listfiles,
            foreign: args.foreign,
            quiet: args.quiet,
            unrequired: args.unrequired,
            upgrades: args.upgrades,
            pkgnames: args.pkgnames,
        }
    }
}

fn setup_logger(verbose: bool, debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    // RUST_LOG, when set, wins over the flags
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// The arguments as typed, for the verbose echo. Arguments that are not
/// valid UTF-8 are shown lossily.
fn invocation<I: IntoIterator<Item = OsString>>(args: I) -> String {
    let args: Vec<String> = args.into_iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    args.join(" ")
}

fn run(cli: Cli) -> alnoq::Result<u8> {
    let config = Config::load(Overrides {
        root_dir: cli.root,
        db_path: cli.dbpath,
        config_file: cli.config,
        verbose: cli.verbose,
        debug: cli.debug,
    })?;
    if config.verbose {
        eprintln!("query {}", invocation(std::env::args_os().skip(1)));
    }
    let options = QueryOptions::from(cli.query);
    let handle = Handle::try_from_config(&config, options.needs_syncdbs())?;
    let mut out = BufWriter::new(io::stdout().lock());
    let mut err = io::stderr().lock();
    let status = alnoq::query(&handle, &options, &mut out, &mut err)
        .and_then(|status| out.flush().map(|_| status));
    match status {
        Ok(status) => Ok(status),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            log::debug!("Output closed early: {}", e);
            Ok(0)
        },
        Err(e) => Err(e.into()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logger(cli.verbose, cli.debug);
    match run(cli) {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        },
    }
}
