use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use client_core::{GenerationController, ImageUpload, Session, StartOutcome};
use shared::domain::Phase;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod download;
mod render;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "angle-video", about = "Upload 2 photos, get a 4-angle video")]
struct Args {
    /// Front photo (JPG or PNG, at most 10MB).
    #[arg(long)]
    front: PathBuf,
    /// Back photo (JPG or PNG, at most 10MB).
    #[arg(long)]
    back: PathBuf,
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Attempts to re-run a failed generation with the same photos.
    #[arg(long, default_value_t = 0)]
    retries: u32,
    /// Save the finished video to this file or directory.
    #[arg(long)]
    download: Option<PathBuf>,
    /// Print the result as JSON instead of text.
    #[arg(long)]
    json: bool,
    /// Skip the progress animation for single-response backends.
    #[arg(long)]
    no_animation: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = &args.backend_url {
        settings.backend_url = url.clone();
    }
    if args.no_animation {
        settings.animate_progress = false;
    }

    let front = ImageUpload::from_path(&args.front)
        .await
        .with_context(|| format!("front photo '{}' rejected", args.front.display()))?;
    let back = ImageUpload::from_path(&args.back)
        .await
        .with_context(|| format!("back photo '{}' rejected", args.back.display()))?;

    let controller = GenerationController::new(settings.controller_config()?)?;
    info!(backend = %settings.backend_url, "submitting photos");

    let mut outcome = controller.start(Some(front), Some(back));
    let mut retries_left = args.retries;
    loop {
        if !matches!(outcome, StartOutcome::Started { .. }) {
            bail!("generation did not start: {outcome:?}");
        }

        let session = follow_session(&controller).await;
        match session.phase() {
            Phase::Complete => {
                let Some(result) = session.result() else {
                    bail!("session completed without a result");
                };
                if args.json {
                    println!("{}", serde_json::to_string_pretty(result)?);
                } else {
                    print!("{}", render::result_summary(result));
                }
                if let Some(dest) = &args.download {
                    let path =
                        download::save_video(&reqwest::Client::new(), &result.video_url, dest)
                            .await?;
                    println!("Saved video to {}", path.display());
                }
                return Ok(());
            }
            Phase::Error => {
                let message = session.error_message().unwrap_or_default().to_string();
                if retries_left == 0 {
                    bail!(message);
                }
                eprintln!("Error: {message}");
                retries_left -= 1;
                warn!(retries_left, "retrying generation with the same photos");
                outcome = controller.retry();
            }
            Phase::Idle => bail!("generation cancelled"),
            Phase::Generating => unreachable!("follow_session returns once generation settles"),
        }
    }
}

/// Prints progress until the session settles. Ctrl-C resets the session.
async fn follow_session(controller: &Arc<GenerationController>) -> Session {
    let mut rx = controller.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ctrl_c_armed = true;
    let mut last_line = String::new();
    loop {
        let session = rx.borrow_and_update().clone();
        if session.phase() != Phase::Generating {
            return session;
        }

        let line = render::progress_line(&session);
        if line != last_line {
            eprintln!("{line}");
            for step in render::step_checklist(&session) {
                eprintln!("    {step}");
            }
            last_line = line;
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return controller.snapshot();
                }
            }
            signal = &mut ctrl_c, if ctrl_c_armed => {
                if let Err(err) = signal {
                    warn!(error = %err, "ctrl-c handler unavailable");
                    ctrl_c_armed = false;
                    continue;
                }
                eprintln!("Cancelling...");
                controller.reset();
                return controller.snapshot();
            }
        }
    }
}
