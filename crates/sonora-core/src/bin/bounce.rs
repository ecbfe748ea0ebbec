//! sonora-bounce - render a bounce job to a WAV file
//!
//! Usage: `sonora-bounce <job.yaml> [--output <file.wav>] [--config <engine.yaml>]`
//!
//! Set `RUST_LOG=debug` for verbose output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use sonora_core::asset::AssetStore;
use sonora_core::config::{default_config_path, load_config, BounceJob, EngineConfig};
use sonora_core::render::{BounceOutcome, BounceProgress, BounceWorker};

struct Args {
    job: PathBuf,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut job = None;
    let mut output = None;
    let mut config = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--output" | "-o" => output = Some(args.next().context("--output needs a path")?.into()),
            "--config" | "-c" => config = Some(args.next().context("--config needs a path")?.into()),
            "--help" | "-h" => {
                println!("Usage: sonora-bounce <job.yaml> [--output <file.wav>] [--config <engine.yaml>]");
                std::process::exit(0);
            }
            flag if flag.starts_with('-') => bail!("Unknown option: {}", flag),
            _ if job.is_none() => job = Some(PathBuf::from(arg)),
            _ => bail!("Unexpected argument: {}", arg),
        }
    }

    Ok(Args {
        job: job.context("Missing job file. Usage: sonora-bounce <job.yaml> [--output <file.wav>]")?,
        output,
        config,
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    let engine: EngineConfig = load_config(&args.config.unwrap_or_else(default_config_path));

    let job = BounceJob::load(&args.job)?;
    let base_dir = args.job.parent().unwrap_or(Path::new(".")).to_path_buf();
    let settings = job.settings(&engine);
    let output = args.output.unwrap_or_else(|| job.output_path(&base_dir));

    let store = AssetStore::new();
    let session = job.build_session(&store, &base_dir, settings.sample_rate)?;

    log::info!("Bouncing {:?} -> {:?}", args.job, output);
    let worker = BounceWorker::spawn_to_file(Arc::new(session), Some(job.automation()), settings, output.clone())?;

    let mut last_percent = 0;
    for progress in worker.progress().iter() {
        match progress {
            BounceProgress::Rendering(fraction) => {
                let percent = (fraction * 100.0) as u32;
                if percent >= last_percent + 10 {
                    last_percent = percent - percent % 10;
                    log::info!("{}%", last_percent);
                }
            }
            terminal => {
                log::debug!("Bounce finished: {:?}", terminal);
                break;
            }
        }
    }

    match worker.join()? {
        BounceOutcome::Completed { samples } => {
            log::info!(
                "Wrote {:?} ({:.2}s)",
                output,
                samples as f64 / settings.sample_rate as f64
            );
            Ok(())
        }
        BounceOutcome::Cancelled { samples_rendered } => {
            bail!("Bounce cancelled after {} samples", samples_rendered)
        }
    }
}
