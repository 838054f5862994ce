use anyhow::Context;
use clap::Parser;
use mcmon_config::MonitorConfig;
use mcmon_core::bus::SystemBus;
use mcmon_core::memory::ProgramImage;
use mcmon_core::transport::StdioTransport;
use mcmon_core::{
    EntryTable, LaunchSlots, LineWriter, Monitor, MonitorSettings, RecordStats, Worker,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "MCMon multi-core debug monitor", long_about = None)]
struct Args {
    /// Path to the monitor configuration (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// S-record file to load before the prompt starts
    #[arg(long, conflicts_with = "image")]
    srec: Option<PathBuf>,

    /// Raw binary to load before the prompt starts
    #[arg(long, requires = "load_addr")]
    image: Option<PathBuf>,

    /// Load address (hex) of --image; also its entry point
    #[arg(long, value_parser = parse_hex)]
    load_addr: Option<u64>,

    /// Release every core at the loaded image's entry point
    #[arg(long)]
    start: bool,

    /// Write record counters and image hash as JSON when the console closes
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Enable debug logging (to stderr)
    #[arg(short, long)]
    trace: bool,
}

#[derive(Serialize, Debug)]
struct SessionStats {
    records: RecordStats,
    image_sha256: Option<String>,
}

fn parse_hex(s: &str) -> Result<u64, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid hex address '{}': {}", s, e))
}

fn image_hash(image: &ProgramImage) -> String {
    let mut hasher = Sha256::new();
    for segment in &image.segments {
        hasher.update(segment.start_addr.to_le_bytes());
        hasher.update(&segment.data);
    }
    format!("{:x}", hasher.finalize())
}

fn load_image(args: &Args) -> anyhow::Result<Option<ProgramImage>> {
    if let Some(path) = &args.srec {
        info!("Loading S-record file: {:?}", path);
        return mcmon_loader::load_srec(path).map(Some);
    }
    if let (Some(path), Some(addr)) = (&args.image, args.load_addr) {
        info!("Loading binary: {:?}", path);
        return mcmon_loader::load_binary(path, addr).map(Some);
    }
    Ok(None)
}

fn write_stats(path: &Path, stats: &SessionStats) -> anyhow::Result<()> {
    let f = std::fs::File::create(path)
        .with_context(|| format!("Failed to create stats file: {:?}", path))?;
    serde_json::to_writer_pretty(f, stats).context("Failed to write stats JSON")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the console; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.trace {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config = match &args.config {
        Some(path) => {
            info!("Loading monitor config: {:?}", path);
            MonitorConfig::from_file(path)?
        }
        None => {
            info!("Using default monitor configuration");
            MonitorConfig::default()
        }
    };

    let mut bus = SystemBus::from_config(&config)?;
    let image = load_image(&args)?;
    if let Some(image) = &image {
        let skipped = bus.load_image(image);
        if skipped > 0 {
            warn!("{} segments did not fit the memory map", skipped);
        }
        info!("Image entry point: {:#x}", image.entry_point);
    }

    let slots = Arc::new(LaunchSlots::new(config.cores));
    let entries = Arc::new(EntryTable::from_config(&config));

    for core in 1..config.cores {
        let slots = slots.clone();
        let entries = entries.clone();
        std::thread::Builder::new()
            .name(format!("core{}", core))
            .spawn(move || {
                let worker = Worker::new(core, &slots, &*entries);
                let mut out = LineWriter::new(std::io::stdout());
                worker.run_with(&mut out, std::thread::yield_now);
            })
            .with_context(|| format!("Failed to start core {}", core))?;
    }
    info!("{} started with {} cores", config.name, config.cores);

    let mut monitor = Monitor::new(
        StdioTransport::new(),
        bus,
        slots,
        entries,
        MonitorSettings::from(&config),
    );

    if args.start {
        match &image {
            Some(image) => {
                info!("Starting all cores at {:#x}", image.entry_point);
                if let Err(e) = monitor.go(image.entry_point, None) {
                    warn!("Could not start image: {}", e);
                }
            }
            None => warn!("--start given without an image to start"),
        }
    }

    let err = match monitor.run() {
        Ok(never) => match never {},
        Err(e) => e,
    };
    info!("Console closed: {}", err);

    if let Some(path) = &args.stats {
        let stats = SessionStats {
            records: monitor.stats(),
            image_sha256: image.as_ref().map(image_hash),
        };
        write_stats(path, &stats)?;
    }

    match err {
        mcmon_core::TransportError::Closed => Ok(()),
        e => Err(e.into()),
    }
}
