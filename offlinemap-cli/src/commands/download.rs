//! The `download` command.

use std::sync::Arc;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use offlinemap::config::ConfigFile;
use offlinemap::coord::CoordinateRegion;
use offlinemap::notify::{ChannelNotifier, Notifier};
use offlinemap::{DownloadError, DownloadEvent, DownloadRequest, JobState};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::common::{build_downloader, QualityArg};
use crate::error::CliError;

const BAR_TEMPLATE: &str = "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}";

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Map identifier on the tile server
    pub map_id: String,

    /// Latitude of the region center
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude of the region center
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Height of the region in degrees
    #[arg(long, default_value_t = 0.1)]
    pub lat_span: f64,

    /// Width of the region in degrees
    #[arg(long, default_value_t = 0.1)]
    pub lon_span: f64,

    #[arg(long, default_value_t = 10)]
    pub min_zoom: u8,

    #[arg(long, default_value_t = 14)]
    pub max_zoom: u8,

    /// Skip the map metadata document
    #[arg(long)]
    pub no_metadata: bool,

    /// Skip marker data and marker icons
    #[arg(long)]
    pub no_markers: bool,

    /// Tile image quality
    #[arg(long, value_enum, default_value_t = QualityArg::Full)]
    pub quality: QualityArg,
}

impl DownloadArgs {
    fn request(&self) -> Result<DownloadRequest, CliError> {
        if self.min_zoom > self.max_zoom {
            return Err(CliError::InvalidArgument(format!(
                "--min-zoom ({}) is greater than --max-zoom ({})",
                self.min_zoom, self.max_zoom
            )));
        }
        let region = CoordinateRegion::new(self.lat, self.lon, self.lat_span, self.lon_span);
        Ok(
            DownloadRequest::new(self.map_id.clone(), region, self.min_zoom, self.max_zoom)
                .with_metadata(!self.no_metadata)
                .with_markers(!self.no_markers)
                .with_image_quality(self.quality.into()),
        )
    }
}

/// Downloads one region and waits until the job completes or is interrupted.
pub async fn run(args: DownloadArgs, config: &ConfigFile) -> Result<(), CliError> {
    let request = args.request()?;

    let (notifier, mut events) = ChannelNotifier::new();
    let notifier: Arc<dyn Notifier> = Arc::new(notifier);
    let downloader = build_downloader(config, Some(notifier)).await?;

    let interrupt = CancellationToken::new();
    let handler_token = interrupt.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let job_id = downloader.begin_downloading(request).await?;
    println!("Downloading {} (job {})", args.map_id, job_id);

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(BAR_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message("preparing");

    let mut interrupted = false;
    loop {
        let event = tokio::select! {
            _ = interrupt.cancelled(), if !interrupted => {
                interrupted = true;
                bar.set_message("cancelling");
                downloader.cancel().await;
                continue;
            }
            event = events.recv() => event,
        };
        let Some(event) = event else {
            bar.abandon();
            return Err(CliError::Download(DownloadError::Cancelled));
        };
        if event.job_id() != job_id {
            continue;
        }

        match event {
            DownloadEvent::StateChanged { state, .. } => {
                debug!(state = %state, "Job state changed");
                if state == JobState::Suspended {
                    bar.set_message("suspended");
                }
            }
            DownloadEvent::InitialCount { expected, .. } => {
                bar.set_length(expected as u64);
                bar.set_message("downloading");
            }
            DownloadEvent::Progress { written, .. } => {
                bar.set_position(written as u64);
            }
            DownloadEvent::PartialFailure { error, .. } => {
                bar.println(format!("warning: {}", error));
            }
            DownloadEvent::Completed { package, error, .. } => {
                if let Some(error) = error {
                    bar.abandon_with_message("failed");
                    return Err(error.into());
                }
                bar.finish_with_message("done");
                if let Some(package) = package {
                    println!("Package: {}", package.id());
                    println!("  Location:  {}", package.location);
                    println!("  Resources: {}", package.resource_count);
                    if package.missing_count() > 0 {
                        println!("  Missing:   {}", package.missing_count());
                    }
                }
                return Ok(());
            }
        }
    }
}
