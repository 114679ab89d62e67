mod cli;

use segmux::{config, simulate};
use segmux_record::{FileNaming, MuxerConfig};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "segmux=trace,segmux_record=trace,segmux_flow=trace,segmux_media=debug,segmux_common=debug"
                .to_string()
        } else {
            "segmux=info,segmux_record=warn,segmux_flow=warn,segmux_media=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Simulate {
            duration,
            fps,
            gop,
            start_us,
            fail_video_after,
            fail_open,
            worker,
            json,
        } => {
            let loaded = resolve(cli.config.as_deref(), cli.params.as_deref())?;
            let options = simulate::SimulationOptions {
                duration_secs: duration,
                fps,
                gop,
                start_us,
                fail_video_after,
                fail_open,
                use_worker: worker,
                worker: loaded.queues,
                log_capacity: loaded.events.log_capacity,
            };
            run_simulation(&loaded.recorder, &options, json)
        }
        Commands::Names { count } => {
            let loaded = resolve(cli.config.as_deref(), cli.params.as_deref())?;
            preview_names(&loaded.recorder, count)
        }
        Commands::Validate => validate(cli.config.as_deref(), cli.params.as_deref()),
        Commands::Version => {
            println!("segmux {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Configuration resolved from `--params` or a config file.
struct Loaded {
    recorder: MuxerConfig,
    queues: segmux_flow::WorkerOptions,
    events: config::EventsConfig,
}

fn resolve(config_path: Option<&Path>, params: Option<&str>) -> Result<Loaded> {
    let file = config::load_config_or_default(config_path)?;

    if let Some(params) = params {
        let recorder = MuxerConfig::parse(params).context("Invalid recorder parameters")?;
        let file = file.unwrap_or_default();
        return Ok(Loaded {
            recorder,
            queues: file.queues,
            events: file.events,
        });
    }

    let Some(file) = file else {
        anyhow::bail!("No recorder configuration: pass --params or --config");
    };
    Ok(Loaded {
        recorder: file.muxer_config().context("Invalid recorder parameters")?,
        queues: file.queues,
        events: file.events,
    })
}

fn run_simulation(
    recorder: &MuxerConfig,
    options: &simulate::SimulationOptions,
    json: bool,
) -> Result<()> {
    let report = simulate::run(recorder, options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Events: {}", report.events.len());
    for recorded in &report.events {
        println!(
            "  {} {}",
            recorded.timestamp.format("%H:%M:%S%.3f"),
            recorded.event
        );
    }

    println!("\nFiles: {}", report.files.len());
    for file in &report.files {
        print!(
            "  {} ({} video, {} audio frames)",
            file.path,
            file.video_frames.len(),
            file.audio_frames.len()
        );
        if !file.header_written {
            print!(" [no header]");
        }
        if file.callback {
            print!(" [{} bytes via callback]", file.bytes_emitted);
        }
        println!();
    }

    let stats = &report.stats;
    println!("\nCycles: {}", stats.cycles);
    println!("Sessions: {} opened, {} closed", stats.sessions_opened, stats.sessions_closed);
    println!("Rotations: {}", stats.rotations);
    println!("Failures: {}", stats.failures);
    if report.output_buffers > 0 {
        println!(
            "Callback output: {} buffers, {} bytes",
            report.output_buffers, report.output_bytes
        );
    }

    Ok(())
}

fn preview_names(recorder: &MuxerConfig, count: usize) -> Result<()> {
    let mut naming = FileNaming::from_config(recorder);
    for _ in 0..count {
        println!("{}", naming.generate());
    }
    Ok(())
}

fn validate(config_path: Option<&Path>, params: Option<&str>) -> Result<()> {
    let (recorder, warnings) = match params {
        Some(params) => {
            println!("Validating parameters");
            let recorder = MuxerConfig::parse(params).context("Invalid recorder parameters")?;
            let warnings = recorder.validate();
            (recorder, warnings)
        }
        None => {
            let Some(path) = config_path else {
                anyhow::bail!("Nothing to validate: pass --params or --config");
            };
            println!("Validating config: {:?}", path);
            let file = config::load_config(path)?;
            let warnings = config::validate_config(&file)?;
            (file.muxer_config()?, warnings)
        }
    };

    if recorder.backend.is_empty() {
        anyhow::bail!("Recorder backend name is missing");
    }

    println!("✓ Configuration is valid");
    println!("  Backend: {}", recorder.backend);
    println!("  IO mode: {:?}", recorder.io_mode());
    match recorder.rotation_threshold_us() {
        Some(_) => println!("  Segment duration: {}s", recorder.file_duration),
        None => println!("  Segment duration: disabled"),
    }
    println!("  Streaming at start: {}", recorder.enable_streaming);
    println!("  Track failure policy: {:?}", recorder.track_failure);
    for track in [&recorder.video, &recorder.audio].into_iter().flatten() {
        println!("  Track: {} {}", track.kind, track.codec);
    }
    for warning in &warnings {
        println!("  ! {}", warning);
    }
    println!("  Canonical: {}", recorder.to_params());

    Ok(())
}
