//! # Spout sender simulator
//!
//! Drives the plugin the way the host would (startup, update ticks, one drawable-changed event
//! per frame, shutdown) against a synthetic renderer, then prints what was shared.
//!
//! Flags:
//! - `--frames N`         frames to render (default 3000)
//! - `--skip-every K`     renderer omits LdrColor on every K-th frame
//! - `--foreign-every K`  inject an unrelated event on the frame stream every K-th frame
//! - `--no-factory`       run without a texture factory (inert mode)
//! - `--config <path>`    strict-load an export config instead of the defaults
//! - `--log-file <path>`  also append logs to a file (or env SPOUT_SENDER_LOG_FILE)
//! - `--json`             print the summary as JSON

mod sim_host;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use spout_sender::{logi, logw, LifecycleController};
use spout_sender_core::bus::LocalDispatcher;
use spout_sender_core::config::{load_export_config, ConfigMode};
use spout_sender_core::host::{
    EventDispatcher, EventKind, HostEvent, HostServices, Payload, Stage, TextureFactory,
};
use spout_sender_core::{Diagnostics, ExportConfig, ExportEvent};

use sim_host::{RecordingSender, SimFactory, SimStage};

#[derive(Debug)]
struct Args {
    frames: u64,
    skip_every: u64,
    foreign_every: u64,
    no_factory: bool,
    config: Option<PathBuf>,
    log_file: Option<PathBuf>,
    json: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            frames: 3000,
            skip_every: 0,
            foreign_every: 0,
            no_factory: false,
            config: None,
            log_file: None,
            json: false,
        }
    }
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(a) = it.next() {
        let mut value = |flag: &str| it.next().with_context(|| format!("{flag} needs a value"));
        match a.as_str() {
            "--frames" => args.frames = value("--frames")?.parse()?,
            "--skip-every" => args.skip_every = value("--skip-every")?.parse()?,
            "--foreign-every" => args.foreign_every = value("--foreign-every")?.parse()?,
            "--config" => args.config = Some(PathBuf::from(value("--config")?)),
            "--log-file" => args.log_file = Some(PathBuf::from(value("--log-file")?)),
            "--no-factory" => args.no_factory = true,
            "--json" => args.json = true,
            other => anyhow::bail!("unknown argument '{other}'"),
        }
    }
    Ok(args)
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    run_id: String,
    channel: String,
    frames: u64,
    updates: u64,
    published: u64,
    dropped: u64,
    ignored: u64,
    empty: u64,
    heartbeats: u64,
    backend_frames: u64,
    degraded: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    let run_id = spout_sender::logging::init(args.log_file.clone());
    logi!("INIT", "run_id={run_id}");

    let config = match &args.config {
        Some(path) => load_export_config(path, ConfigMode::Strict)?,
        None => ExportConfig::default(),
    };

    let bus = LocalDispatcher::new();
    let events: Arc<dyn EventDispatcher> = Arc::new(bus.clone());
    let factory: Option<Box<dyn TextureFactory>> = if args.no_factory {
        None
    } else {
        Some(Box::new(SimFactory::new(args.skip_every)))
    };
    let stage: Arc<dyn Stage> = Arc::new(SimStage::default());
    let host = HostServices {
        events: Some(events),
        factory,
        stage: Some(stage),
    };
    let sender = RecordingSender::default();
    let (diagnostics, diag_rx) = Diagnostics::channel(256);

    let mut controller =
        LifecycleController::new(host, Box::new(sender.clone()), config.clone(), diagnostics);
    controller.start("spout-sender-sim");

    let texture = controller.shared_texture().map(|t| t.id());
    if texture.is_none() {
        logw!("INIT", "no shared texture; only update ticks will be delivered");
    }

    let foreign = HostEvent::new(EventKind::Other("sim.unrelated".into()), Payload::new());
    let mut summary = Summary::default();
    let update = HostEvent::post_update();

    for frame in 1..=args.frames {
        bus.dispatch_update(&update);
        if let Some(id) = texture {
            if args.foreign_every > 0 && frame % args.foreign_every == 0 {
                bus.dispatch_frame(id, &foreign);
            }
            bus.dispatch_frame(id, &HostEvent::drawable_changed(frame));
        }
        // Drain as the host's UI would, so the bounded channel never fills up.
        for ev in diag_rx.try_iter() {
            if let ExportEvent::Heartbeat { .. } = ev {
                summary.heartbeats += 1;
            }
        }
    }

    controller.stop();
    for ev in diag_rx.try_iter() {
        match ev {
            ExportEvent::Heartbeat { .. } => summary.heartbeats += 1,
            ExportEvent::Stopped { stats } => {
                summary.updates = stats.updates;
                summary.published = stats.published;
                summary.dropped = stats.dropped;
                summary.ignored = stats.ignored;
                summary.empty = stats.empty;
            }
            _ => {}
        }
    }

    summary.run_id = run_id;
    summary.channel = config.channel_name.clone();
    summary.frames = args.frames;
    summary.backend_frames = sender.frames.load(Ordering::Relaxed);
    summary.degraded = controller.degraded_reason().map(str::to_string);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "channel '{}': {} frames, {} published, {} dropped, {} without AOV, \
             {} ignored events, {} heartbeats",
            summary.channel,
            summary.frames,
            summary.published,
            summary.dropped,
            summary.empty,
            summary.ignored,
            summary.heartbeats
        );
        if let Some(reason) = &summary.degraded {
            println!("degraded: {reason}");
        }
    }
    Ok(())
}
