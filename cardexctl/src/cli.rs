use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use cardex_config::{Config, ConfigLoader};
use cardex_core::{
    BlacklistCache, Deadline, EpisodeInfo, IdMap, QueryKind, SeriesInfo, StorePaths, Title,
    TmdbClient, TmdbError, TmdbId, TmdbService,
};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "cardexctl", version, about = "Operator tooling for cardex")]
pub struct Cli {
    /// Path to the config file (defaults to ./cardex.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download stills for one season as s{season}e{episode}.jpg files.
    Season(SeasonArgs),

    /// Inspect or reset the negative cache.
    Blacklist {
        #[command(subcommand)]
        command: BlacklistCommand,
    },

    /// Maintain the identifier map.
    Map {
        #[command(subcommand)]
        command: MapCommand,
    },
}

#[derive(Debug, Args)]
struct SeasonArgs {
    /// Series title.
    title: String,

    /// Premiere year.
    year: u16,

    /// Season to download.
    #[arg(long)]
    season: u32,

    /// Number of episodes to fetch, starting at episode 1.
    #[arg(long)]
    episodes: u32,

    /// Directory to place the downloaded images in.
    #[arg(long)]
    directory: PathBuf,
}

#[derive(Debug, Subcommand)]
enum BlacklistCommand {
    /// Print every blacklist entry.
    Show,
    /// Delete the persisted blacklist entirely.
    Clear,
}

#[derive(Debug, Subcommand)]
enum MapCommand {
    /// Pin a series' full name to a TMDb ID, overriding future resolution.
    Set {
        name: String,
        year: u16,
        tmdb_id: u32,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::from_path(path),
        None => ConfigLoader::new(),
    };
    let loaded = loader.load()?;
    loaded.warnings.log_all();
    let config = loaded.config;
    let paths = config.store_paths();

    match cli.command {
        Command::Season(args) => download_season(&config, args).await,
        Command::Blacklist {
            command: BlacklistCommand::Show,
        } => {
            show_blacklist(&paths);
            Ok(())
        }
        Command::Blacklist {
            command: BlacklistCommand::Clear,
        } => {
            paths.blacklist().remove()?;
            info!(path = %paths.blacklist().path().display(), "deleted blacklist");
            Ok(())
        }
        Command::Map {
            command: MapCommand::Set { name, year, tmdb_id },
        } => {
            let full_name = SeriesInfo::new(name, year).full_name();
            let mut map = IdMap::load(paths.id_map());
            map.pin_name(&full_name, TmdbId::new(tmdb_id))?;
            info!(%full_name, tmdb_id, "pinned series ID");
            Ok(())
        }
    }
}

async fn download_season(config: &Config, args: SeasonArgs) -> Result<()> {
    let client = TmdbClient::new(config.tmdb.api_key.clone());
    match client.verify_key().await {
        Ok(()) => {}
        Err(TmdbError::InvalidApiKey) => bail!("TMDb rejected the configured API key"),
        Err(other) => return Err(other).context("cannot verify the TMDb API key"),
    }

    let service = TmdbService::new(
        Arc::new(client),
        &config.store_paths(),
        config.service_options(),
    );
    let mut series = SeriesInfo::new(args.title.clone(), args.year);

    let mut downloaded = 0u32;
    for episode_number in 1..=args.episodes {
        let episode = EpisodeInfo::new(Title::new(""), args.season, episode_number);
        match service
            .get_source_image(&mut series, &episode, false, Deadline::none())
            .await?
        {
            Some(url) => {
                let destination = args
                    .directory
                    .join(format!("s{}e{}.jpg", args.season, episode_number));
                service.download_image(&url, &destination).await?;
                info!(%url, destination = %destination.display(), "downloaded still");
                downloaded += 1;
            }
            None => warn!(episode = episode_number, "no still available"),
        }
    }

    info!(downloaded, requested = args.episodes, "season download finished");
    Ok(())
}

fn show_blacklist(paths: &StorePaths) {
    let cache = BlacklistCache::load(paths.blacklist());
    let mut total = 0usize;
    for kind in QueryKind::ALL {
        for (key, entry) in cache.entries(kind) {
            println!(
                "{:<5}  failures={:<3}  next={}  {}",
                kind.as_str(),
                entry.failures,
                entry.next.to_rfc3339(),
                key
            );
            total += 1;
        }
    }
    if total == 0 {
        println!("blacklist is empty");
    }
}
