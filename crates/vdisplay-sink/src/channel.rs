//! Sink forwarding frames into a bounded channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, instrument, trace};

use vdisplay_pump::{FrameSink, PixelBuffer};

use crate::config::SinkConfig;
use crate::frame::{CaptureTimestamp, CapturedFrame};
use crate::log::LogKind;
use crate::pool::BufferPool;

const FRAMERATE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct SendState {
    last_sent: Option<Instant>,
    sequence: u64,
    window_start: Instant,
    window_frames: u32,
}

/// Point-in-time counters of a [`ChannelSink`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkStatsSnapshot {
    /// Frames delivered to the channel.
    pub frames_sent: u64,

    /// Frames dropped because the consumer was behind.
    pub frames_dropped: u64,

    /// Frames discarded because the consumer was gone.
    pub frames_discarded: u64,

    /// Forwarding decisions answered with "skip".
    pub frames_declined: u64,

    /// Buffers served from the pool.
    pub buffers_reused: u64,

    /// Buffers that needed a fresh allocation.
    pub buffers_allocated: u64,
}

/// Frame sink handing frames to a consumer thread over a channel.
///
/// The session shares it through an `Arc`. Each pump worker keeps a clone
/// until it exits, so the sink outlives every pump of its session.
#[derive(Debug)]
pub struct ChannelSink {
    config: SinkConfig,
    pool: BufferPool,
    frame_tx: Sender<CapturedFrame>,
    state: Mutex<SendState>,
    start_time: Instant,
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
    frames_discarded: AtomicU64,
    frames_declined: AtomicU64,
}

impl ChannelSink {
    /// Create the sink and the receiver its frames arrive on.
    #[instrument(name = "sink_init", skip_all, fields(capacity = config.channel_capacity))]
    pub fn new(config: SinkConfig) -> (Self, Receiver<CapturedFrame>) {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded(config.channel_capacity);
        let now = Instant::now();

        let sink = Self {
            pool: BufferPool::new(config.pool_capacity),
            config,
            frame_tx,
            state: Mutex::new(SendState {
                last_sent: None,
                sequence: 0,
                window_start: now,
                window_frames: 0,
            }),
            start_time: now,
            frames_sent: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            frames_discarded: AtomicU64::new(0),
            frames_declined: AtomicU64::new(0),
        };

        debug!("Channel sink created");
        (sink, frame_rx)
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Give a consumed frame's allocation back for reuse.
    ///
    /// Only reclaims the allocation when no other handle to the payload
    /// exists. A payload still shared with a clone is left to its last owner.
    pub fn recycle(&self, frame: CapturedFrame) {
        if frame.data.is_unique() {
            self.pool.give_back(Vec::from(frame.data));
        } else {
            trace!(sequence = frame.sequence, "Payload still shared, not pooled");
        }
    }

    /// Time since the last frame was handed to the channel.
    pub fn time_since_last_send(&self) -> Option<Duration> {
        self.state.lock().last_sent.map(|t| t.elapsed())
    }

    pub fn stats(&self) -> SinkStatsSnapshot {
        SinkStatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_discarded: self.frames_discarded.load(Ordering::Relaxed),
            frames_declined: self.frames_declined.load(Ordering::Relaxed),
            buffers_reused: self.pool.reused(),
            buffers_allocated: self.pool.allocated(),
        }
    }

    fn report_framerate(&self, state: &mut SendState, now: Instant) {
        state.window_frames += 1;
        let elapsed = now.duration_since(state.window_start);
        if elapsed < FRAMERATE_WINDOW {
            return;
        }

        if self.config.log_framerate && LogKind::Framerate.enabled() {
            let fps = state.window_frames as f32 / elapsed.as_secs_f32();
            LogKind::Framerate.emit(&format!("forwarding {:.1} fps", fps));
        }
        state.window_start = now;
        state.window_frames = 0;
    }
}

impl FrameSink for ChannelSink {
    fn should_forward(&self, has_changed: bool) -> bool {
        let forward = has_changed
            || self
                .state
                .lock()
                .last_sent
                .map_or(true, |t| t.elapsed() > self.config.resend_interval);

        if !forward {
            self.frames_declined.fetch_add(1, Ordering::Relaxed);
        }
        forward
    }

    fn allocate_buffer(&self, len: usize) -> Vec<u8> {
        self.pool.take(len)
    }

    fn accept(&self, frame: PixelBuffer) {
        let now = Instant::now();
        let sequence = {
            let mut state = self.state.lock();
            state.last_sent = Some(now);
            state.sequence += 1;
            self.report_framerate(&mut state, now);
            state.sequence
        };

        let frame = CapturedFrame {
            data: Bytes::from(frame.data),
            width: frame.width,
            height: frame.height,
            format: frame.format,
            timestamp: CaptureTimestamp::now(self.start_time),
            sequence,
        };

        match self.frame_tx.try_send(frame) {
            Ok(()) => {
                self.frames_sent.fetch_add(1, Ordering::Relaxed);
                trace!(sequence, "Frame sent");
            }
            Err(TrySendError::Full(frame)) => {
                self.frames_dropped.fetch_add(1, Ordering::Relaxed);
                trace!(sequence, "Channel full, dropping frame");
                self.recycle(frame);
            }
            Err(TrySendError::Disconnected(frame)) => {
                self.frames_discarded.fetch_add(1, Ordering::Relaxed);
                trace!(sequence, "Consumer gone, discarding frame");
                self.recycle(frame);
            }
        }
    }
}
