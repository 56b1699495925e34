// Resource Fetcher - Album Download Engine
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use resource_fetcher::download::progress::{EventKind, ProgressEvent};
use resource_fetcher::file::scanner::RenumberOptions;
use resource_fetcher::{
    logging, AdapterRegistry, DownloadConfig, DownloadManager, FilenameSource, IzanmeiAdapter,
    ReqwestTransport, RetryPolicy, Transport,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "resource-fetcher")]
#[command(about = "Download albums from supported catalog sites", long_about = None)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download an album
    Download {
        /// Album page URL
        url: String,

        /// Output directory
        #[arg(short, long, default_value = "./downloads")]
        output: PathBuf,

        /// Download only the first N songs
        #[arg(short, long)]
        limit: Option<usize>,

        /// Replace existing files
        #[arg(long)]
        overwrite: bool,

        /// Prefix filenames with their position (01_, 02_, ...)
        #[arg(long)]
        renumber: bool,

        /// Per-song timeout in seconds
        #[arg(long, default_value_t = 60)]
        timeout: u64,

        /// Attempts per URL
        #[arg(long, default_value_t = 3)]
        retries: u32,

        /// Pause between songs in seconds
        #[arg(long, default_value_t = 0.5)]
        delay: f64,

        /// Mirror host for audio files (repeatable)
        #[arg(long = "backup-domain")]
        backup_domains: Vec<String>,

        /// Where filenames come from
        #[arg(long, value_enum, default_value_t = NameSource::Header)]
        filename_source: NameSource,

        /// Print machine-readable progress lines on stderr
        #[arg(long)]
        progress_markers: bool,
    },
    /// Renumber files in an existing album directory
    Renumber {
        /// Album directory
        directory: PathBuf,

        /// Show the plan without renaming
        #[arg(long)]
        dry_run: bool,
    },
    /// List supported sites
    Sites,
}

#[derive(Clone, Copy, ValueEnum)]
enum NameSource {
    Header,
    Catalog,
}

impl From<NameSource> for FilenameSource {
    fn from(source: NameSource) -> Self {
        match source {
            NameSource::Header => FilenameSource::Header,
            NameSource::Catalog => FilenameSource::Catalog,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.log_dir.as_deref()) {
        eprintln!("Warning: {}", e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Download {
            url,
            output,
            limit,
            overwrite,
            renumber,
            timeout,
            retries,
            delay,
            backup_domains,
            filename_source,
            progress_markers,
        } => {
            let config = DownloadConfig {
                output_directory: output,
                limit,
                timeout: Duration::from_secs(timeout),
                retry: RetryPolicy {
                    max_attempts: retries,
                    inter_download_delay: Duration::from_secs_f64(delay.clamp(0.0, 3600.0)),
                    ..Default::default()
                },
                overwrite,
                renumber,
                filename_source: filename_source.into(),
            };
            download(&url, config, backup_domains, progress_markers, cli.verbose).await
        }
        Commands::Renumber { directory, dry_run } => {
            let options = RenumberOptions {
                dry_run,
                ..Default::default()
            };
            let result = resource_fetcher::renumber_directory_with(&directory, &options)
                .await
                .with_context(|| format!("renumbering {}", directory.display()))?;

            let verb = if dry_run { "Would rename" } else { "Renamed" };
            for rename in &result.renamed {
                println!("{}: {} -> {}", verb, rename.from, rename.to);
            }
            for conflict in &result.conflicts {
                println!("Conflict: {} -> {} (target exists)", conflict.from, conflict.to);
            }
            println!("{}", result.summary());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sites => {
            let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new()?);
            for site in AdapterRegistry::with_defaults(transport).supported_sites() {
                println!("{}", site);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn download(
    url: &str,
    config: DownloadConfig,
    backup_domains: Vec<String>,
    progress_markers: bool,
    verbose: bool,
) -> Result<ExitCode> {
    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new()?);
    let registry = AdapterRegistry::new().register(
        IzanmeiAdapter::new(transport.clone())
            .with_backup_domains(backup_domains)
            .with_timeout(config.timeout),
    );

    let adapter = resource_fetcher::resolve_adapter(&registry, url).map_err(user_error)?;
    let album = resource_fetcher::fetch_album(adapter.as_ref(), url)
        .await
        .map_err(user_error)?;

    let manager = DownloadManager::new(transport, config)?;
    let cancel = manager.cancellation_token();
    let mut handle = manager.spawn(album);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling after the current song...");
            cancel.cancel();
        }
    });

    while let Some(event) = handle.events.recv().await {
        render(&event, progress_markers, verbose);
    }

    let result = handle.task.await.context("download task panicked")??;

    Ok(if result.interrupted.is_some() {
        ExitCode::from(130)
    } else if result.failed_count > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn render(event: &ProgressEvent, progress_markers: bool, verbose: bool) {
    if progress_markers {
        eprintln!("{}", event.to_marker());
    }

    match &event.kind {
        EventKind::SongProgress { .. } if !verbose => {}
        EventKind::AlbumCompleted { .. } => println!("\n{}", event.display_string()),
        _ => println!("{}", event.display_string()),
    }
}

fn user_error(e: resource_fetcher::FetcherError) -> anyhow::Error {
    anyhow::anyhow!(e.user_message())
}
