//! autolimit command line.

use anyhow::Context;
use autolimit::config::{Config, ConfigOverrides};
use autolimit::element::{LimiterParam, LoudnessParam};
use autolimit::host::MemoryHost;
use autolimit::settings::{keys, limiter_schema};
use autolimit::transform::linear_to_db;
use autolimit::{logging, EventBroadcaster, LimiterNode, Settings};
use autolimit_types::PropertyValue;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::rc::Rc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::LocalSet;
use tracing::{info, warn};

/// autolimit - self-adjusting limiter node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding limiter.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Path to the settings file (overrides --data-dir)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect or change the persisted limiter settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Feed loudness values to the gain controller and print the resulting gain
    Simulate {
        /// Target loudness (LUFS)
        #[arg(long, default_value_t = -12, allow_negative_numbers = true)]
        target: i64,
        /// Initial input gain (dB)
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        gain: f64,
        /// Loudness estimates (LUFS), in arrival order
        #[arg(required = true, allow_negative_numbers = true)]
        peaks: Vec<f64>,
    },
    /// Run the node until Ctrl+C, logging meter events
    Run {
        /// Meter cadence in milliseconds
        #[arg(long)]
        meter_interval_ms: Option<u64>,
        /// Pipeline description feeding the node
        #[cfg(feature = "gst")]
        #[arg(long, default_value = "audiotestsrc is-live=true")]
        source: String,
        /// Pipeline description consuming the node output
        #[cfg(feature = "gst")]
        #[arg(long, default_value = "autoaudiosink")]
        sink: String,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// List every key with its value
    List,
    /// Print one value
    Get { key: String },
    /// Set one value
    Set {
        key: String,
        #[arg(allow_negative_numbers = true)]
        value: String,
    },
    /// Restore one key, or all keys, to the default
    Reset { key: Option<String> },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let meter_interval_ms = match &args.command {
        Command::Run {
            meter_interval_ms, ..
        } => *meter_interval_ms,
        _ => None,
    };
    let config = Config::from_figment(ConfigOverrides {
        data_dir: args.data_dir.clone(),
        settings_path: args.settings.clone(),
        meter_interval_ms,
        log_level: args.log_level.clone(),
    })?;

    let _log_guard = logging::init(config.log_level.as_deref(), config.log_file.as_deref())?;

    match args.command {
        Command::Settings { action } => settings_command(&config, action),
        Command::Simulate {
            target,
            gain,
            peaks,
        } => simulate(&config, target, gain, &peaks),
        #[cfg(feature = "gst")]
        Command::Run { source, sink, .. } => run(&config, &source, &sink),
        #[cfg(not(feature = "gst"))]
        Command::Run { .. } => run(&config),
    }
}

fn settings_command(config: &Config, action: SettingsAction) -> anyhow::Result<()> {
    let path = &config.settings_path;
    let settings = Settings::load(limiter_schema(), path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    match action {
        SettingsAction::List => {
            for spec in settings.schema().iter() {
                let value = settings.get(spec.key)?;
                let marker = if settings.is_default(spec.key) { " " } else { "*" };
                println!("{} {:<22} {:>8}  {}", marker, spec.key, value, spec.summary);
            }
            return Ok(());
        }
        SettingsAction::Get { key } => {
            println!("{}", settings.get(&key)?);
            return Ok(());
        }
        SettingsAction::Set { key, value } => {
            let spec = settings.spec(&key)?;
            let value = spec.kind.parse(spec.key, &value)?;
            settings.set(&key, value)?;
        }
        SettingsAction::Reset { key: Some(key) } => settings.reset(&key)?,
        SettingsAction::Reset { key: None } => settings.reset_all(),
    }

    settings.save(path)?;
    Ok(())
}

fn simulate(config: &Config, target: i64, gain: f64, peaks: &[f64]) -> anyhow::Result<()> {
    let settings = Rc::new(Settings::new(limiter_schema()));
    settings.set(keys::AUTOVOLUME_TARGET, target)?;
    settings.set(keys::INPUT_GAIN, gain)?;
    settings.set(keys::AUTOVOLUME_STATE, true)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = LocalSet::new();

    local.block_on(&runtime, async {
        let host = MemoryHost::new();
        let node = LimiterNode::new(
            "limiter",
            &host,
            &settings,
            EventBroadcaster::default(),
            &config.node_options(),
        )?;
        let loudness = host
            .loudness()
            .context("Loudness meter was not created")?;

        println!("{:>10} {:>10}", "LUFS", "gain dB");
        for peak in peaks {
            loudness.publish(LoudnessParam::Loudness, PropertyValue::Float(*peak));
            let level = node
                .limiter()
                .and_then(|l| l.get(LimiterParam::LevelIn).as_f64())
                .unwrap_or(1.0);
            println!("{:>10.1} {:>10.1}", peak, linear_to_db(level));
        }
        anyhow::Ok(())
    })
}

async fn log_events(events: EventBroadcaster) {
    let mut rx = events.subscribe();
    loop {
        match rx.recv().await {
            Ok(event) => info!("{}", event.description()),
            Err(RecvError::Lagged(n)) => warn!("Event logger lagging, skipped {} events", n),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        return;
    }
    info!("Received Ctrl+C, shutting down...");
}

#[cfg(not(feature = "gst"))]
fn run(config: &Config) -> anyhow::Result<()> {
    let settings = Rc::new(Settings::load(limiter_schema(), &config.settings_path)?);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = LocalSet::new();

    local.block_on(&runtime, async {
        let events = EventBroadcaster::default();
        let logger = tokio::task::spawn_local(log_events(events.clone()));

        let host = MemoryHost::new();
        let node = LimiterNode::new(
            "limiter",
            &host,
            &settings,
            events,
            &config.node_options(),
        )?;
        info!(
            "Running {} on the in-process host (built without GStreamer), {} meters armed",
            node.name(),
            node.armed_meters()
        );

        wait_for_shutdown().await;
        drop(node);
        logger.abort();
        anyhow::Ok(())
    })?;

    settings.save(&config.settings_path)?;
    Ok(())
}

#[cfg(feature = "gst")]
fn run(config: &Config, source: &str, sink: &str) -> anyhow::Result<()> {
    use autolimit::host::GstHost;
    use gstreamer as gst;
    use gstreamer::prelude::*;

    gst::init()?;
    info!("GStreamer initialized");

    let settings = Rc::new(Settings::load(limiter_schema(), &config.settings_path)?);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = LocalSet::new();

    local.block_on(&runtime, async {
        let events = EventBroadcaster::default();
        let logger = tokio::task::spawn_local(log_events(events.clone()));

        let node = LimiterNode::new(
            "limiter",
            &GstHost::new(),
            &settings,
            events,
            &config.node_options(),
        )?;
        let Some(bin) = node.ports() else {
            warn!(
                "Limiter node is not installed ({}), nothing to run",
                node.uninstalled_reason().unwrap_or("unknown reason")
            );
            logger.abort();
            return anyhow::Ok(());
        };

        let pipeline = gst::Pipeline::new();
        let src = gst::parse::bin_from_description(source, true)?;
        let out = gst::parse::bin_from_description(sink, true)?;
        let chain: [&gst::Element; 3] = [src.upcast_ref(), bin.upcast_ref(), out.upcast_ref()];
        pipeline.add_many(chain)?;
        gst::Element::link_many(chain)?;

        pipeline.set_state(gst::State::Playing)?;
        info!("Pipeline playing: {} ! limiter ! {}", source, sink);

        wait_for_shutdown().await;

        pipeline.set_state(gst::State::Null)?;
        drop(node);
        logger.abort();
        anyhow::Ok(())
    })?;

    settings.save(&config.settings_path)?;
    Ok(())
}
