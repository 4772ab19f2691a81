mod config;
mod logging;
mod match_filter;
mod normalize;
mod ports;
mod queries;
mod services;
mod source;
mod spotify_rs;
#[cfg(test)]
mod test_utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};

use crate::{
    config::{Config, SpotifyCredentials},
    logging::setup_logging,
    services::transfer::{PlaylistJob, TransferService},
    spotify_rs::{auth::refresh_access_token, client::SpotifyHttpClient},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "TRACKSWAP_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Console log level (default: info)
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "TRACKSWAP_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn is_file(s: &str) -> Result<PathBuf, String> {
    let p: PathBuf = s.into();
    if p.is_file() {
        Ok(p)
    } else {
        Err(format!("`{}` is not an existing file", s))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find every track of scraped playlists on Spotify and add them to new playlists
    Transfer {
        /// CSV of scraped tracks with Number, Title and Artist columns. Repeat
        /// to transfer several playlists in turn
        #[arg(short, long, value_parser = is_file, required = true)]
        input: Vec<PathBuf>,

        /// Raw scrape text; the playlist name is read from its ninth line.
        /// Paired with --input by position
        #[arg(short, long)]
        raw: Vec<PathBuf>,

        /// Playlist name, overriding the one in the raw scrape. Paired with
        /// --input by position
        #[arg(short, long)]
        name: Vec<String>,

        /// Number of tracks searched at the same time
        #[arg(long)]
        concurrency: Option<usize>,

        /// Directory for the list of tracks that could not be found
        #[arg(long)]
        not_found_dir: Option<PathBuf>,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

async fn build_spotify_client(config: &Config) -> Result<SpotifyHttpClient> {
    let access_token = match config.spotify.credentials()? {
        SpotifyCredentials::AccessToken(token) => token,
        SpotifyCredentials::RefreshToken {
            client_id,
            client_secret,
            refresh_token,
        } => {
            log::debug!("Exchanging refresh token for an access token");
            refresh_access_token(&client_id, &client_secret, &refresh_token)
                .await
                .wrap_err("Failed to authenticate with Spotify")?
                .access_token
        }
    };

    Ok(SpotifyHttpClient::new(access_token)
        .with_requests_per_second(config.spotify.requests_per_second.unwrap_or(0)))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    log::debug!("trackswap starting");
    log::debug!("Loading configuration");

    let config = {
        if let Some(config) = args.config {
            Config::from_file(&config)
        } else {
            Config::load()
        }
    }
    .with_context(|| "Failed to load trackswap config")?;

    match args.command {
        Commands::Transfer {
            input,
            raw,
            name,
            concurrency,
            not_found_dir,
        } => {
            let jobs = PlaylistJob::pair(input, raw, name)?;

            let mut settings = config.transfer_settings();
            if let Some(concurrency) = concurrency {
                settings.concurrency = concurrency;
            }
            if let Some(not_found_dir) = not_found_dir {
                settings.not_found_directory = not_found_dir;
            }

            let client = Arc::new(build_spotify_client(&config).await?);
            let service = TransferService::new(client, settings);

            let total = jobs.len();
            let results = service.run_jobs(jobs).await;
            let mut failed = 0;
            for job in &results {
                match &job.result {
                    Ok(summary) => println!("{}", summary),
                    Err(e) => {
                        failed += 1;
                        println!("Playlist from {} failed: {:#}", job.input.display(), e);
                    }
                }
            }

            if failed > 0 {
                return Err(eyre!("{} of {} playlists failed", failed, total));
            }
            log::info!("Transfer command completed");
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                log::debug!("Creating default config");
                let path = Config::create_default()?;
                log::info!("Default config available at {}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}
