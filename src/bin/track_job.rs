use clap::Parser;
use deepfake_awareness::{
    models::{
        failure::FailureKind,
        job::{Job, JobKind, JobStatus},
    },
    services::{
        poller::{JobPoller, PollerConfig},
        provider::{HttpJobProvider, JobPayload},
    },
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Submit a face-swap job to a running server and follow it to the end.
#[derive(Debug, Parser)]
#[command(name = "track-job")]
#[command(about = "Submit a provider job and poll it until it finishes")]
#[command(version)]
struct Args {
    /// Base URL of the server hosting the submission and status endpoints
    #[arg(long, default_value = "http://127.0.0.1:3000", env = "TRACK_BASE_URL")]
    base_url: String,

    /// Job kind (face-swap-image or face-swap-video)
    #[arg(long, default_value = "face-swap-image")]
    kind: JobKind,

    /// Payload file to submit. Required unless --job-id is given.
    #[arg(long, required_unless_present = "job_id")]
    file: Option<PathBuf>,

    /// MIME type of the payload. Detected for images when omitted.
    #[arg(long)]
    content_type: Option<String>,

    /// Resume tracking an already submitted job instead of submitting
    #[arg(long, conflicts_with = "file")]
    job_id: Option<String>,

    #[arg(long)]
    section: Option<String>,

    #[arg(long)]
    scenario: Option<String>,

    #[arg(long)]
    gender: Option<String>,

    #[arg(long)]
    face_enhance: bool,

    /// Interval between status checks in milliseconds (per-kind default)
    #[arg(long, env = "TRACK_INTERVAL_MS")]
    interval_ms: Option<u64>,

    /// Status checks before giving up
    #[arg(long, env = "TRACK_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Attempts before an ambiguous status with a URL counts as success
    #[arg(long)]
    min_ambiguous: Option<u32>,
}

impl Args {
    fn poller_config(&self) -> PollerConfig {
        let defaults = PollerConfig::for_kind(self.kind);
        PollerConfig {
            interval: self
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            min_attempts_for_ambiguous_success: self
                .min_ambiguous
                .unwrap_or(defaults.min_attempts_for_ambiguous_success),
        }
    }

    fn payload(&self, path: &Path) -> Result<JobPayload, Box<dyn std::error::Error>> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let content_type = match &self.content_type {
            Some(ct) => ct.clone(),
            None => image::guess_format(&bytes)
                .map(|f| f.to_mime_type().to_string())
                .unwrap_or_else(|_| "application/octet-stream".to_string()),
        };

        let mut payload = JobPayload::new(bytes, file_name, content_type);
        for (name, value) in [
            ("section", &self.section),
            ("scenario", &self.scenario),
            ("gender", &self.gender),
        ] {
            if let Some(value) = value {
                payload = payload.with_field(name, value.clone());
            }
        }
        if self.face_enhance {
            payload = payload.with_field("face_enhance", "true");
        }
        Ok(payload)
    }
}

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(job) => {
            match serde_json::to_string_pretty(&job) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::error!(error = %e, "Failed to render job"),
            }
            if let Some(url) = job.gateway_url() {
                println!("{}", url);
            }
            if let Some(error) = job.surfaced_poll_error() {
                eprintln!("Last status check failed: {}", error);
            }
            if job.status() != JobStatus::Succeeded {
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Job tracking failed");
            std::process::exit(2);
        }
    }
}

async fn run(args: Args) -> Result<Job, Box<dyn std::error::Error>> {
    let provider = HttpJobProvider::new(&args.base_url)?;
    let poller = JobPoller::new(Arc::new(provider), args.poller_config());

    let job = match (&args.job_id, &args.file) {
        (Some(job_id), _) => Job::resume(args.kind, job_id.clone()),
        (None, Some(path)) => {
            let payload = args.payload(path)?;
            tracing::info!(kind = %args.kind, file = %path.display(), "Submitting job");
            poller.submit(args.kind, payload).await
        }
        (None, None) => return Err("either --file or --job-id is required".into()),
    };

    if job.is_terminal() {
        return Ok(job);
    }

    let handle = poller.track(job);
    let mut updates = handle.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let job = updates.borrow_and_update().clone();
                tracing::info!(
                    job_id = ?job.job_id(),
                    attempt = job.poll_attempt(),
                    status = %job.status(),
                    message = ?job.provider_message(),
                    "Job progress"
                );
                let retrying = FailureKind::NetworkErrorDuringPoll.retried_automatically()
                    && !job.is_terminal();
                if let (Some(error), true) = (job.last_poll_error(), retrying) {
                    tracing::debug!(%error, "Status check failed, retrying");
                }
                if job.is_terminal() {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted, cancelling job tracking");
                handle.cancel();
                break;
            }
        }
    }

    Ok(handle.wait().await)
}
