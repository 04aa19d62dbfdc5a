//! Runs a monitor session end to end without a GPU: a synthetic producer
//! presents buffers, the pump reads them back and the reference sink hands
//! them to a consumer thread.

mod config;

use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use serde::Serialize;
use tracing::{info, instrument, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use vdisplay_pump::synthetic::{SyntheticDevice, SyntheticDeviceFactory, SyntheticProducer};
use vdisplay_pump::{FrameMetadata, MonitorSession, PumpStatsSnapshot};
use vdisplay_sink::{CapturedFrame, ChannelSink, SinkStatsSnapshot};

use crate::config::DemoConfig;

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "vdisplay=debug,vdisplay_pump=debug,vdisplay_sink=debug,vdisplay_d3d11=debug,vdisplay_demo=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// What the consumer thread saw.
#[derive(Debug, Default, Serialize)]
struct ConsumerReport {
    frames: u64,
    invalid: u64,
    last_sequence: u64,
}

#[derive(Debug, Serialize)]
struct Summary {
    pump: Option<PumpStatsSnapshot>,
    sink: SinkStatsSnapshot,
    consumer: ConsumerReport,
    exit: Option<String>,
}

fn main() -> Result<()> {
    init_logging();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => DemoConfig::load(&path)?,
        None => DemoConfig::default(),
    };
    config.validate()?;
    info!(?config, "Demo starting");

    if config.probe_gpu {
        probe_gpu(&config);
    }

    let summary = run(&config)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[instrument(name = "demo_run", skip_all)]
fn run(config: &DemoConfig) -> Result<Summary> {
    let (sink, frame_rx) = ChannelSink::new(config.sink.clone());
    let sink = Arc::new(sink);
    let consumer = spawn_consumer(frame_rx, Arc::downgrade(&sink))?;

    let device = SyntheticDevice::new().with_row_padding(config.row_padding);
    let session = MonitorSession::new(
        SyntheticDeviceFactory::new(device),
        Arc::clone(&sink),
        config.pump.clone(),
    );

    let (producer, swap_chain, signal) = SyntheticProducer::new();
    session
        .assign_swap_chain(swap_chain, config.adapter, signal)
        .context("failed to assign swap chain")?;

    for i in 0..config.frames {
        let metadata = if i % config.changed_every == 0 {
            FrameMetadata::new(1, 0)
        } else {
            FrameMetadata::unchanged()
        };
        producer.push_frame(metadata);
        thread::sleep(config.frame_interval);
    }

    let expected = config.frames as usize;
    if !producer.wait_until(Duration::from_secs(10), |c| c.finished >= expected) {
        warn!(
            finished = producer.counts().finished,
            expected, "Pump did not drain every buffer"
        );
    }

    let pump_stats = session.stats();
    session.unassign_swap_chain();
    let exit = session.last_exit().map(|exit| exit.to_string());
    let sink_stats = sink.stats();

    // The consumer exits once the last handle to the sink is gone.
    drop(session);
    drop(sink);
    let consumer = consumer
        .join()
        .map_err(|_| anyhow::anyhow!("consumer thread panicked"))?;

    info!(frames = consumer.frames, "Demo finished");
    Ok(Summary {
        pump: pump_stats,
        sink: sink_stats,
        consumer,
        exit,
    })
}

fn spawn_consumer(
    frame_rx: Receiver<CapturedFrame>,
    sink: Weak<ChannelSink>,
) -> Result<JoinHandle<ConsumerReport>> {
    let handle = thread::Builder::new()
        .name("frame-consumer".to_string())
        .spawn(move || {
            let mut report = ConsumerReport::default();
            for frame in frame_rx.iter() {
                report.frames += 1;
                report.last_sequence = frame.sequence;
                if !frame.is_valid() {
                    report.invalid += 1;
                }

                if let Some(sink) = sink.upgrade() {
                    sink.recycle(frame);
                }
            }
            report
        })?;
    Ok(handle)
}

#[cfg(windows)]
fn probe_gpu(config: &DemoConfig) {
    use vdisplay_d3d11::{probe_h264_encoder, Direct3DDeviceFactory};
    use vdisplay_pump::DeviceFactory;

    match Direct3DDeviceFactory::new().open(config.adapter) {
        Ok(device) => info!(adapter = %device.adapter_luid(), "Opened D3D11 device"),
        Err(e) => warn!("Failed to open D3D11 device: {}", e),
    }

    match probe_h264_encoder() {
        Some(encoder) => info!(
            codec = %encoder.codec,
            transforms = encoder.hardware_transforms,
            "Hardware encoder available"
        ),
        None => info!("No hardware encoder found"),
    }
}

#[cfg(not(windows))]
fn probe_gpu(_config: &DemoConfig) {
    info!("GPU probe is only supported on Windows");
}
