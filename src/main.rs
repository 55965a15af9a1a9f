// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! # Discography Downloader.
//!
//! Downloads the complete discography of every artist named in a list, from a
//! remote music catalog.
//!
//! A run follows a strict setup-run-teardown pattern:
//!
//! * **Setup**: configuration is loaded, the catalog session is opened (a
//!   rejected credential ends the run before any work) and the download
//!   history is read.
//! * **Run**: artists are resolved one at a time, then each artist's tracks
//!   are downloaded by a pool of worker threads. Tracks the history already
//!   holds are skipped.
//! * **Teardown**: the history is written back to disk. This also happens
//!   when the run is interrupted, so finished downloads are never forgotten.

mod client;
mod config;
mod history;
mod input;
mod model;
mod progress;
mod summary;
mod tasks;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use std::{
    io::IsTerminal,
    path::PathBuf,
    process::ExitCode,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    client::{CatalogClient, Quality, deezer::DeezerClient},
    config::AppConfig,
    history::History,
    model::EntityKind,
    progress::{ConsoleProgress, DownloadProgress, NoProgress},
    tasks::Orchestrator,
};

// Conventional exit status for a process stopped by SIGINT.
const INTERRUPTED_EXIT_CODE: u8 = 130;

#[derive(Parser, Debug)]
#[clap(version, about)]
struct CliArgs {
    /// File with one artist name per line.
    #[clap(default_value = "list.txt")]
    pub artist_list: PathBuf,

    /// Catalog access token.
    #[clap(long, env = "CHOOGET_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Number of tracks downloaded concurrently.
    #[clap(short, long)]
    pub workers: Option<usize>,

    /// Path of the download history file.
    #[clap(long)]
    pub history_file: Option<PathBuf>,

    /// Directory downloads are written to.
    #[clap(short = 'o', long)]
    pub download_dir: Option<PathBuf>,

    /// Maximum number of artists to process.
    #[clap(short = 'n', long)]
    pub limit: Option<usize>,

    /// Audio quality to download.
    #[clap(long, value_enum)]
    pub quality: Option<Quality>,

    /// Seconds to wait for a single track before giving up on it.
    #[clap(long)]
    pub unit_timeout: Option<u64>,

    /// Skip artists the history marks as completely downloaded, without
    /// searching for them.
    #[clap(long)]
    pub skip_completed_artists: bool,

    /// Store the effective settings (excluding the token) as the new defaults.
    #[clap(long)]
    pub save_config: bool,
}

impl CliArgs {
    /// Overlays the command line on top of the stored configuration.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(history_file) = &self.history_file {
            config.history_file = history_file.clone();
        }
        if let Some(download_dir) = &self.download_dir {
            config.download_dir = download_dir.clone();
        }
        if let Some(limit) = self.limit {
            config.artist_limit = Some(limit);
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(unit_timeout) = self.unit_timeout {
            config.unit_timeout_secs = unit_timeout;
        }
        if self.skip_completed_artists {
            config.skip_completed_artists = true;
        }
    }
}

/// The entry point of the application.
///
/// Failing to read the artist list or to authenticate ends the run with an
/// error. Individual artists and tracks that fail are reported but do not.
fn main() -> Result<ExitCode> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialise logging")?;

    let mut config = config::load_config();
    cli_args.apply(&mut config);

    if cli_args.save_config {
        config::save_config(&config).context("Failed to save configuration")?;
        info!("Configuration saved");
    }

    let names = input::read_artist_list(&cli_args.artist_list)?;
    info!("{} artists listed in {:?}", names.len(), cli_args.artist_list);

    let client = DeezerClient::new(config.request_timeout())
        .context("Failed to initialise catalog client")?;
    let session = client
        .authenticate(&cli_args.token)
        .context("Failed to authenticate")?;
    info!("Logged in as {} ({})", session.user_name, session.user_id);

    let history = History::load(&config.history_file);

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_cancel = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        if !handler_cancel.swap(true, Ordering::SeqCst) {
            warn!("Interrupted, finishing in-flight downloads and writing history...");
        }
    })
    .context("Failed to install interrupt handler")?;

    let progress: Box<dyn DownloadProgress> = if std::io::stderr().is_terminal() {
        Box::new(ConsoleProgress::new())
    } else {
        Box::new(NoProgress)
    };

    let mut orchestrator = Orchestrator::new(
        Arc::new(client),
        history,
        config.download_settings(),
        Arc::clone(&cancel),
        progress,
    );

    let summary = orchestrator.run(&names);
    info!(
        "History holds {} tracks, {} albums and {} artists",
        orchestrator.history().count(EntityKind::Track),
        orchestrator.history().count(EntityKind::Album),
        orchestrator.history().count(EntityKind::Artist)
    );

    // Written whatever happened above, an unwritten history loses finished work.
    let history = orchestrator.into_history();
    if let Err(e) = history.persist() {
        error!("Failed to write history to {:?}: {:#}", history.path(), e);
    }

    info!("{}", summary);

    if summary.interrupted {
        return Ok(ExitCode::from(INTERRUPTED_EXIT_CODE));
    }

    Ok(ExitCode::SUCCESS)
}
