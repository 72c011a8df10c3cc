//! Synheart Behavior Pipeline CLI
//!
//! Replays recorded interaction events through the pipeline, hosts the
//! collector and inspects the persisted delivery queue.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use synheart_behavior_pipeline::{
    bridge::{DeliveryBridge, LocalChannel, Request},
    collector::{CollectorHandle, CollectorService},
    config::{Config, FeatureFlags},
    core::{compress, decompress, BatchReport},
    logging,
    pipeline::{describe, Dispatched},
    transparency::create_shared_stats_with_persistence,
    Pipeline, ReplaySource, VERSION,
};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "synheart-behavior")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "Interaction event pipeline with a persisted delivery queue", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSONL file of interaction records through the pipeline
    Run {
        /// Input file, one EventRecord per line ("-" for stdin)
        input: PathBuf,

        /// Feature overrides, e.g. "hover=off,rage_click=on"
        #[arg(long)]
        features: Option<String>,

        /// Forward every record to the collector queue
        #[arg(long)]
        forward: bool,

        /// Remote collector base URL (requires client feature)
        #[arg(long)]
        collector_url: Option<String>,

        /// Give up on a remote collector request after this many milliseconds
        #[arg(long)]
        collector_timeout: Option<u64>,

        /// Print the compressed payload of each batch
        #[arg(long)]
        print_batches: bool,

        /// Print every record as it is dispatched
        #[arg(long, short)]
        verbose: bool,
    },

    /// Serve the collector over HTTP (requires server feature)
    Collector {
        /// Port to listen on (0 for random)
        #[arg(long, default_value = "8787")]
        port: u16,
    },

    /// Operate on the persisted queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Compress text (argument or stdin) to transport-safe base64
    Compress { text: Option<String> },

    /// Decompress output of `compress`
    Decompress { text: Option<String> },

    /// Show pipeline statistics
    Stats,

    /// Show configuration
    Config,

    /// Show or change feature flags
    Features {
        /// Overrides to save, e.g. "send_to_background=on,hover=off"
        #[arg(long)]
        set: Option<String>,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Number of queued records
    Count,
    /// Take every queued record out of the queue
    Flush,
    /// Drop every queued record
    Clear,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());
    logging::init(&config.log_level);

    let result = match cli.command {
        Commands::Run {
            input,
            features,
            forward,
            collector_url,
            collector_timeout,
            print_batches,
            verbose,
        } => {
            let remote = collector_url.map(|url| (url, collector_timeout));
            cmd_run(
                config,
                &input,
                features.as_deref(),
                forward,
                remote,
                print_batches,
                verbose,
            )
            .await
        }
        Commands::Collector { port } => cmd_collector(config, port).await,
        Commands::Queue { action } => cmd_queue(config, action).await,
        Commands::Compress { text } => cmd_compress(text),
        Commands::Decompress { text } => cmd_decompress(text),
        Commands::Stats => cmd_stats(config).await,
        Commands::Config => {
            cmd_config(&config, cli.config.as_deref());
            Ok(())
        }
        Commands::Features { set } => cmd_features(config, cli.config.as_deref(), set.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Config {
    let loaded = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    loaded.unwrap_or_else(|e| {
        eprintln!("Warning: Could not load configuration, using defaults: {e}");
        Config::default()
    })
}

fn read_text(text: Option<String>) -> anyhow::Result<String> {
    match text {
        Some(text) => Ok(text),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf.trim_end_matches(['\r', '\n']).to_string())
        }
    }
}

fn local_bridge(config: &Config) -> DeliveryBridge {
    let (handle, _task) = CollectorHandle::spawn(CollectorService::persistent(config));
    DeliveryBridge::new(Arc::new(LocalChannel::new(handle)))
}

/// Remote collector base URL and optional request timeout in milliseconds.
type Remote = (String, Option<u64>);

fn create_bridge(config: &Config, remote: Option<Remote>) -> anyhow::Result<DeliveryBridge> {
    #[cfg(feature = "client")]
    if let Some((url, timeout)) = remote {
        use synheart_behavior_pipeline::HttpChannel;
        let channel = match timeout {
            Some(ms) => HttpChannel::with_timeout(url, std::time::Duration::from_millis(ms))?,
            None => HttpChannel::new(url)?,
        };
        return Ok(DeliveryBridge::new(Arc::new(channel)));
    }

    #[cfg(not(feature = "client"))]
    if remote.is_some() {
        eprintln!("Warning: --collector-url ignored (client feature not enabled at compile time)");
    }

    Ok(local_bridge(config))
}

fn print_report(report: &BatchReport, with_payload: bool) {
    println!(
        "{} {:?}: {} events, {} -> {} bytes",
        report.captured_at.format("%H:%M:%S%.3f"),
        report.reason,
        report.event_count,
        report.uncompressed_size,
        report.compressed_size
    );
    if with_payload {
        if let Some(ref compressed) = report.compressed {
            println!("  {compressed}");
        }
    }
}

async fn cmd_run(
    mut config: Config,
    input: &Path,
    features: Option<&str>,
    forward: bool,
    remote: Option<Remote>,
    print_batches: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    println!("Synheart Behavior Pipeline v{VERSION}");
    println!();

    if let Some(features) = features {
        config.features.apply_csv(features)?;
    }
    if forward || remote.is_some() {
        config.features.send_to_background = true;
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let stats = create_shared_stats_with_persistence(config.stats_path());
    let bridge = create_bridge(&config, remote)?;
    let (report_tx, mut report_rx) = mpsc::unbounded_channel();

    let source = if input == Path::new("-") {
        Arc::new(ReplaySource::from_reader(
            "stdin",
            std::io::BufReader::new(std::io::stdin()),
        ))
    } else {
        Arc::new(ReplaySource::open(input)?)
    };

    let mut pipeline = Pipeline::builder(config.clone())
        .stats(Arc::clone(&stats))
        .reports(report_tx)
        .bridge(bridge.clone())
        .build();

    println!("Replaying {}", input.display());
    println!(
        "  Forwarding to collector: {}",
        if config.features.send_to_background {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Batch interval: {}ms", config.batch_interval.as_millis());
    println!("Instance ID: {}", pipeline.instance_id());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    pipeline.install(source.clone()).await;
    source.start()?;

    // crossbeam receiver -> async loop
    let (record_tx, mut record_rx) = mpsc::unbounded_channel();
    let receiver = source.receiver().clone();
    tokio::task::spawn_blocking(move || {
        for record in receiver.iter() {
            if record_tx.send(record).is_err() {
                break;
            }
        }
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    // record time, starting from the first record
    let mut clock: Option<DateTime<Utc>> = None;
    let mut dispatched = 0usize;
    loop {
        tokio::select! {
            record = record_rx.recv() => {
                let Some(record) = record else { break };
                let now = match clock {
                    Some(clock) => clock.max(record.timestamp),
                    None => {
                        pipeline.start_clock(record.timestamp);
                        record.timestamp
                    }
                };
                clock = Some(now);
                pipeline.tick(now).await;
                let line = verbose.then(|| describe(&record));
                let outcome = pipeline.dispatch(record).await;
                if let Some(line) = line {
                    let marker = match outcome {
                        Dispatched::Recorded => "+",
                        Dispatched::Deferred => "~",
                        Dispatched::Tracked => ".",
                        Dispatched::Suppressed => "-",
                    };
                    println!("{marker} {line}");
                }
                dispatched += 1;
            }
            Some(report) = report_rx.recv() => print_report(&report, print_batches),
            _ = &mut ctrl_c => {
                println!();
                println!("Stopping...");
                source.stop();
                break;
            }
        }
    }

    // let pending debounced records settle
    if let Some(clock) = clock {
        pipeline.tick(clock + chrono::Duration::seconds(1)).await;
    }
    if let Some(report) = pipeline.flush(print_batches) {
        print_report(&report, print_batches);
    }
    pipeline.teardown().await;
    while let Ok(report) = report_rx.try_recv() {
        print_report(&report, print_batches);
    }

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save stats: {e}");
    }

    println!();
    println!("Dispatched {dispatched} records");
    println!("{}", stats.summary());

    if config.features.send_to_background {
        match bridge.pending_count().await {
            Ok(count) => println!("Collector queue: {count} pending"),
            Err(e) => eprintln!("Warning: Could not query collector: {e}"),
        }
    }

    Ok(())
}

#[cfg(feature = "server")]
async fn cmd_collector(config: Config, port: u16) -> anyhow::Result<()> {
    use synheart_behavior_pipeline::collector::server::{run, ServerConfig};

    config.ensure_directories()?;
    let (handle, _task) = CollectorHandle::spawn(CollectorService::persistent(&config));
    let (addr, shutdown_tx) = run(ServerConfig::new(port), handle).await?;

    println!("Collector listening on http://{addr}");
    println!("  Queue: {}", config.queue_dir().display());
    println!();
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    println!("Stopping...");
    let _ = shutdown_tx.send(());
    Ok(())
}

#[cfg(not(feature = "server"))]
async fn cmd_collector(_config: Config, _port: u16) -> anyhow::Result<()> {
    anyhow::bail!("collector command requires the server feature")
}

async fn cmd_queue(config: Config, action: QueueAction) -> anyhow::Result<()> {
    let request = match action {
        QueueAction::Count => Request::GetPendingCount,
        QueueAction::Flush => Request::FlushQueue,
        QueueAction::Clear => Request::ClearQueue,
    };

    let service = CollectorService::persistent(&config);
    let response = service.handle(&serde_json::to_value(&request)?).await;
    if let Some(error) = response.error() {
        anyhow::bail!("{} failed: {error}", request.kind());
    }

    println!("{}", serde_json::to_string_pretty(&response.to_value())?);
    Ok(())
}

fn cmd_compress(text: Option<String>) -> anyhow::Result<()> {
    let text = read_text(text)?;
    println!("{}", compress(&text));
    Ok(())
}

fn cmd_decompress(text: Option<String>) -> anyhow::Result<()> {
    let text = read_text(text)?;
    println!("{}", decompress(text.trim())?);
    Ok(())
}

async fn cmd_stats(config: Config) -> anyhow::Result<()> {
    let stats = create_shared_stats_with_persistence(config.stats_path());
    println!("{}", stats.summary());

    let count = local_bridge(&config).pending_count().await?;
    println!();
    println!("Collector queue: {count} pending ({})", config.queue_dir().display());
    Ok(())
}

fn cmd_config(config: &Config, path: Option<&Path>) {
    let path = path.map(Path::to_path_buf).unwrap_or_else(Config::config_path);
    println!("Configuration file: {path:?}");
    println!();
    match serde_json::to_string_pretty(config) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error serializing config: {e}"),
    }
}

fn cmd_features(mut config: Config, path: Option<&Path>, set: Option<&str>) -> anyhow::Result<()> {
    if let Some(set) = set {
        config.features.apply_csv(set)?;
        match path {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
        println!("Saved.");
        println!();
    }

    for name in FeatureFlags::NAMES {
        let enabled = config.features.get(name).unwrap_or(false);
        println!("  {name:<20} {}", if enabled { "on" } else { "off" });
    }
    Ok(())
}
