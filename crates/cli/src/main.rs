mod cli;
mod registry;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediatask_core::{
    command::output_file_name, load_config, synthesize, validate_config, CapabilityProbe,
    CapabilityProvider, CommandOptions, Config, EngineAvailability, FfmpegCapabilityProvider,
    Operation, OrchestratorConfig, ProcessingRequest, SystemProcessSpawner, TaskEvent,
    TaskOrchestrator, TaskRecord, TaskStatus, VideoCodec,
};

use cli::{Cli, CommandArgs, Commands, RunArgs};
use registry::LocalFileRegistry;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => run_requests(&config, args).await,
        Commands::Command(args) => print_command(&config, args).await,
        Commands::Encoders => print_encoders(&config).await,
    }
}

/// Loads the explicit config file, or `./config.toml` when present, or defaults.
fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    let config_path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from("config.toml")).filter(|p| p.exists()),
    };

    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => {
            info!("No configuration file, using defaults");
            Config::default()
        }
    };

    validate_config(&config).context("Configuration validation failed")?;
    info!("ffmpeg binary: {:?}", config.engine.ffmpeg_path);
    info!("Output directory: {:?}", config.paths.output_dir);
    Ok(config)
}

fn capability_provider(config: &Config) -> Arc<dyn CapabilityProvider> {
    Arc::new(FfmpegCapabilityProvider::new(
        config.engine.ffmpeg_path.clone(),
        config.engine.platform,
    ))
}

fn read_request(path: &Path) -> Result<ProcessingRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request {:?}", path))?;
    let request: ProcessingRequest = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse request {:?}", path))?;
    Ok(request)
}

async fn run_requests(config: &Config, args: RunArgs) -> Result<()> {
    let requests = args
        .requests
        .iter()
        .map(|path| read_request(path))
        .collect::<Result<Vec<_>>>()?;

    let orchestrator = TaskOrchestrator::new(
        OrchestratorConfig::from_config(config),
        EngineAvailability::from(config),
        capability_provider(config),
        Arc::new(SystemProcessSpawner::new(config.engine.ffmpeg_path.clone())),
        Arc::new(LocalFileRegistry::new()),
    );
    let mut events = orchestrator.subscribe();

    let mut remaining = HashSet::new();
    for (path, request) in args.requests.iter().zip(requests) {
        let id = orchestrator
            .enqueue(request)
            .await
            .with_context(|| format!("Request {:?} was refused", path))?;
        info!("Queued {:?} as task {}", path, id);
        remaining.insert(id);
    }
    let ids: Vec<String> = remaining.iter().cloned().collect();

    let mut shown: HashMap<String, (TaskStatus, u32)> = HashMap::new();
    while !remaining.is_empty() {
        tokio::select! {
            _ = signal::ctrl_c() => {
                warn!("Interrupted, cancelling running task");
                orchestrator.shutdown().await;
                break;
            }
            event = events.recv() => match event {
                Ok(TaskEvent::Updated(record)) if remaining.contains(&record.id) => {
                    report(&record, args.json, &mut shown)?;
                    if record.status.is_terminal() {
                        remaining.remove(&record.id);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} task updates", skipped);
                    for id in ids.iter() {
                        if let Some(record) = orchestrator.task(id).await {
                            if record.status.is_terminal() {
                                remaining.remove(id);
                            }
                        }
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    let mut failed = 0;
    for record in orchestrator.tasks().await {
        match record.status {
            TaskStatus::Completed => {
                println!("{} completed: {}", record.id, record.output_file_ids.join(", "));
            }
            TaskStatus::Failed => {
                failed += 1;
                println!(
                    "{} failed ({}): {}",
                    record.id,
                    record.engine_error_code.as_deref().unwrap_or("unknown"),
                    record.error.as_deref().unwrap_or("")
                );
            }
            status => println!("{} {}", record.id, status),
        }
    }

    if failed > 0 {
        bail!("{} task(s) failed", failed);
    }
    Ok(())
}

/// Prints status changes and whole-percent progress steps.
fn report(
    record: &TaskRecord,
    json: bool,
    shown: &mut HashMap<String, (TaskStatus, u32)>,
) -> Result<()> {
    let percent = (record.progress * 100.0).floor() as u32;
    let current = (record.status, percent);
    if shown.get(&record.id) == Some(&current) {
        return Ok(());
    }
    shown.insert(record.id.clone(), current);

    if json {
        println!("{}", serde_json::to_string(record)?);
    } else {
        println!(
            "{} {:<9} {:>3}% {}",
            record.id,
            record.status,
            percent,
            record.request.operation.name()
        );
    }
    Ok(())
}

async fn print_command(config: &Config, args: CommandArgs) -> Result<()> {
    let request = read_request(&args.request)?;
    request.validate().context("Invalid request")?;

    let probe = CapabilityProbe::new(capability_provider(config));
    let selection = match request.operation.requested_codec(request.profile) {
        Some(codec) => match probe.resolve(codec).await {
            Some(selection) => Some(selection),
            None => bail!("No {} encoder available on {}", codec, probe.platform()),
        },
        None => None,
    };
    if let Some(reason) = selection.as_ref().and_then(|s| s.fallback_reason.as_ref()) {
        eprintln!("encoder fallback: {}", reason);
    }

    let output = args.output.unwrap_or_else(|| {
        config
            .paths
            .output_dir
            .join(output_file_name(&request, "preview"))
    });
    let manifest = match &request.operation {
        Operation::Merge { .. } => Some(config.paths.cache_dir.join("concat_preview.txt")),
        _ => None,
    };

    let options = CommandOptions {
        log_level: config.engine.ffmpeg_log_level.clone(),
        extra_args: config.engine.extra_ffmpeg_args.clone(),
    };
    let command = synthesize(
        &request,
        selection.as_ref(),
        &output,
        manifest.as_deref(),
        &options,
    )?;

    println!("{}", command.render(&config.engine.ffmpeg_path.to_string_lossy()));
    Ok(())
}

async fn print_encoders(config: &Config) -> Result<()> {
    let probe = CapabilityProbe::new(capability_provider(config));
    let encoders = probe.encoders().await;
    if encoders.is_empty() {
        bail!(
            "No video encoders reported by {:?}",
            config.engine.ffmpeg_path
        );
    }

    println!("platform: {}", probe.platform());
    for encoder in encoders {
        let kind = if encoder.hardware { "hardware" } else { "software" };
        println!("  {:<24} {}", encoder.name, kind);
    }

    for codec in [VideoCodec::H264, VideoCodec::Hevc] {
        match probe.resolve(codec).await {
            Some(selection) => println!(
                "{} -> {} ({}){}",
                codec,
                selection.video_encoder,
                selection.effective_codec,
                selection
                    .fallback_reason
                    .map(|r| format!(": {}", r))
                    .unwrap_or_default()
            ),
            None => println!("{} -> unavailable", codec),
        }
    }
    Ok(())
}
