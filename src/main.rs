use std::{error::Error, process};

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, LevelFilter};

use soundgate::{
    config::Config,
    gateway::Gateway,
    stream::{Playback, TrackResolvable},
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when built in release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Track, playlist or user reference
    ///
    /// A permalink URL (https://soundcloud.com/artist/title) or a bare
    /// numeric id.
    #[arg(value_name = "REFERENCE", value_hint = ValueHint::Url)]
    reference: String,

    /// Resolve a playlist (set) instead of a single track
    #[arg(short, long, default_value_t = false)]
    playlist: bool,

    /// Resolve the liked tracks of a user instead of a single track
    #[arg(long, default_value_t = false)]
    likes: bool,

    /// Maximum number of tracks to resolve from a collection
    #[arg(short, long, value_name = "COUNT")]
    limit: Option<usize>,

    /// Use a fixed client id instead of scraping one from the web app
    #[arg(long, value_name = "ID", env = "SOUNDCLOUD_CLIENT_ID")]
    client_id: Option<String>,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Prints one line per playable bundle: title, protocol, signed URL.
fn print_bundles(bundles: &[Playback]) {
    for bundle in bundles {
        if let Some(ref source) = bundle.stream {
            println!("{}\t{}\t{}", bundle.track.title, source.protocol, source.url);
        }
    }
}

/// Resolves the requested reference and prints the result.
///
/// # Errors
///
/// This function returns an error when the entity lookup fails or no HTTP
/// client could be created. Individual tracks without a resolvable stream
/// are not errors; they are reported and skipped.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = Config::new();
    config.client_id = args.client_id.clone();

    let gateway = Gateway::new(&config)?;

    if args.likes {
        let bundles = gateway.likes_playback(&args.reference, args.limit).await?;
        info!("{} liked tracks resolved", bundles.len());
        print_bundles(&bundles);
    } else if args.playlist {
        let playback = gateway.playlist_playback(&args.reference, args.limit).await?;
        info!(
            "playlist \"{}\": {} of {} tracks playable",
            playback.playlist.title,
            playback.tracks.len(),
            playback.playlist.track_count,
        );
        print_bundles(&playback.tracks);
    } else {
        let bundle = gateway
            .playback(TrackResolvable::from(args.reference.as_str()))
            .await?;
        match bundle.stream {
            Some(source) => {
                println!("{}\t{}\t{}", bundle.track.title, source.protocol, source.url);
            }
            None => {
                info!("no stream available for {}", bundle.track);
            }
        }
    }

    Ok(())
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and resolves the requested reference.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
