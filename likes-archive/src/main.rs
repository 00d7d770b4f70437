use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueHint};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use twitter_likes::{
    read_likes, rebuild_lists, BatchDriver, HttpResolver, IdStore, JsonIdStore, RunOutcome,
    SkipCategory,
};

use crate::config::Config;
use crate::progress::ProgressBar;

mod config;
mod progress;
mod shutdown;

/// Archive the media of every tweet in a Twitter likes export
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file location
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download media and metadata for every liked tweet
    Download {
        /// Likes archive (like.js), overrides the config file
        #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
        archive: Option<PathBuf>,

        /// Archive root directory, overrides the config file
        #[arg(short, long, value_name = "DIR", value_hint = ValueHint::DirPath)]
        output: Option<PathBuf>,

        /// Ignore any saved checkpoint and start from the first like
        #[arg(long)]
        restart: bool,
    },

    /// Rebuild the skip lists from every saved error log
    RebuildLists {
        /// Archive root directory, overrides the config file
        #[arg(short, long, value_name = "DIR", value_hint = ValueHint::DirPath)]
        output: Option<PathBuf>,
    },
}

fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "Likes Archive")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    match run().await {
        Ok(_) => process::exit(0),
        Err(err) => {
            eprintln!("{:#}", err);
            process::exit(1);
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    let conf = Config::read(&args.config)?;

    match args.command {
        Commands::Download {
            archive,
            output,
            restart,
        } => {
            let settings = conf.likes.settings(output.as_deref());
            settings
                .paths
                .create_all()
                .context("Failed to create archive directories")?;

            let archive = archive
                .or_else(|| conf.likes.archive.clone())
                .context("No likes archive given, pass --archive or set likes.archive")?;
            let likes = read_likes(&archive)?;
            info!("{} likes in {}", likes.len(), archive.display());

            let resolver = HttpResolver::new(&conf.likes.resolver, settings.download_timeout)?;
            let mut store = JsonIdStore::load(&settings.paths.lists_dir);
            let cancel = shutdown::install_signal_handler();

            let mut driver = BatchDriver::new(&resolver, &mut store, &settings)?;
            let report = driver
                .run::<ProgressBar>(&likes, !restart, &cancel)
                .await;

            if let RunOutcome::Interrupted { at } = report.outcome {
                warn!(
                    "Stopped at {}/{}, run again to resume from there",
                    at,
                    likes.len()
                );
            }
        }
        Commands::RebuildLists { output } => {
            let settings = conf.likes.settings(output.as_deref());
            settings
                .paths
                .create_all()
                .context("Failed to create archive directories")?;
            let mut store = JsonIdStore::load(&settings.paths.lists_dir);
            rebuild_lists(&settings.paths.logs_dir, &mut store).with_context(|| {
                format!(
                    "Failed to read error logs in {}",
                    settings.paths.logs_dir.display()
                )
            })?;
            for category in SkipCategory::ALL {
                println!("{}: {}", category.file_name(), store.len(category));
            }
        }
    }

    Ok(())
}
