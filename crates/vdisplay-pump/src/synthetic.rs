//! In-memory swap chain, render device and sink.
//!
//! They let the pump and the session run end to end without a GPU or a host
//! display subsystem, and they count every protocol call so callers can
//! check ordering and cleanup.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::device::{DeviceFactory, RenderDevice, WorkerScope};
use crate::error::PumpError;
use crate::sink::FrameSink;
use crate::swap_chain::{BufferNotifier, ChannelSignal, SwapChain};
use crate::types::{
    Acquire, AcquiredBuffer, AdapterLuid, EncoderInfo, FrameMetadata, MappedSurface, MonitorMode,
    PixelBuffer,
};
use crate::PumpResult;

/// Byte the synthetic staging surface uses for row padding.
pub const PADDING_BYTE: u8 = 0xEE;

/// One scripted answer of the synthetic swap chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntheticStep {
    /// Hand out a buffer with these change hints.
    Frame(FrameMetadata),

    /// Fail the acquire call.
    Fail(String),
}

/// Protocol call counters of a synthetic swap chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerCounts {
    pub set_device: usize,
    pub acquired: usize,
    pub released: usize,
    pub finished: usize,
    pub deleted: usize,
}

#[derive(Default)]
struct ProducerState {
    script: VecDeque<SyntheticStep>,
    counts: ProducerCounts,
    outstanding: bool,
    next_frame: u64,
    reject_device: bool,
    finish_limit: Option<usize>,
}

struct ProducerShared {
    state: Mutex<ProducerState>,
    changed: Condvar,
}

impl ProducerShared {
    fn update(&self, f: impl FnOnce(&mut ProducerState)) {
        let mut state = self.state.lock();
        f(&mut state);
        self.changed.notify_all();
    }
}

/// Host side of a synthetic swap chain: scripts buffers and observes calls.
#[derive(Clone)]
pub struct SyntheticProducer {
    shared: Arc<ProducerShared>,
    notifier: BufferNotifier,
}

impl SyntheticProducer {
    /// Create a producer with its swap chain and "new buffer" signal.
    pub fn new() -> (Self, SyntheticSwapChain, ChannelSignal) {
        let shared = Arc::new(ProducerShared {
            state: Mutex::new(ProducerState::default()),
            changed: Condvar::new(),
        });
        let (notifier, signal) = ChannelSignal::new();

        let producer = Self {
            shared: Arc::clone(&shared),
            notifier,
        };
        (producer, SyntheticSwapChain { shared }, signal)
    }

    /// Queue a buffer and signal it.
    pub fn push_frame(&self, metadata: FrameMetadata) {
        self.push(SyntheticStep::Frame(metadata));
    }

    /// Make the next acquire fail.
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.push(SyntheticStep::Fail(reason.into()));
    }

    /// Make `set_device` fail.
    pub fn reject_device(&self) {
        self.shared.update(|state| state.reject_device = true);
    }

    /// Let `finishes` finish-frame calls succeed and fail every later one.
    pub fn fail_finish_after(&self, finishes: usize) {
        self.shared.update(|state| state.finish_limit = Some(finishes));
    }

    pub fn push(&self, step: SyntheticStep) {
        self.shared.update(|state| state.script.push_back(step));
        self.notifier.notify();
    }

    pub fn counts(&self) -> ProducerCounts {
        self.shared.state.lock().counts
    }

    /// Number of scripted steps not yet consumed.
    pub fn queued(&self) -> usize {
        self.shared.state.lock().script.len()
    }

    /// Block until `condition` holds for the counters or the timeout
    /// elapses. Returns whether the condition was met.
    pub fn wait_until(
        &self,
        timeout: Duration,
        mut condition: impl FnMut(&ProducerCounts) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();

        while !condition(&state.counts) {
            if self
                .shared
                .changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return condition(&state.counts);
            }
        }

        true
    }
}

/// Swap chain half of a synthetic producer.
pub struct SyntheticSwapChain {
    shared: Arc<ProducerShared>,
}

impl SwapChain<SyntheticDevice> for SyntheticSwapChain {
    fn set_device(&mut self, _device: &SyntheticDevice) -> PumpResult<()> {
        let mut rejected = false;
        self.shared.update(|state| {
            state.counts.set_device += 1;
            rejected = state.reject_device;
        });

        if rejected {
            return Err(PumpError::SwapChain("device rejected".to_string()));
        }
        Ok(())
    }

    fn acquire_buffer(&mut self) -> PumpResult<Acquire<SyntheticSurface>> {
        let mut state = self.shared.state.lock();

        if state.outstanding {
            return Err(PumpError::SwapChain(
                "previous buffer was not released".to_string(),
            ));
        }

        let step = match state.script.pop_front() {
            Some(step) => step,
            None => return Ok(Acquire::Pending),
        };

        let acquired = match step {
            SyntheticStep::Frame(metadata) => {
                let index = state.next_frame;
                state.next_frame += 1;
                state.outstanding = true;
                state.counts.acquired += 1;

                let surface = SyntheticSurface {
                    index,
                    shared: Arc::clone(&self.shared),
                };
                Ok(Acquire::Ready(AcquiredBuffer::new(surface, metadata)))
            }
            SyntheticStep::Fail(reason) => Err(PumpError::SwapChain(reason)),
        };

        self.shared.changed.notify_all();
        acquired
    }

    fn finish_frame(&mut self) -> PumpResult<()> {
        let mut result = Ok(());
        self.shared.update(|state| match state.finish_limit {
            Some(limit) if state.counts.finished >= limit => {
                result = Err(PumpError::FinishFrame(format!(
                    "buffer {} not finished",
                    state.next_frame.saturating_sub(1)
                )));
            }
            _ => state.counts.finished += 1,
        });
        result
    }

    fn delete(&mut self) {
        self.shared.update(|state| state.counts.deleted += 1);
    }
}

/// A buffer of the synthetic ring. Dropping it releases the slot.
#[derive(Debug)]
pub struct SyntheticSurface {
    index: u64,
    shared: Arc<ProducerShared>,
}

impl SyntheticSurface {
    /// Sequence number of the buffer, starting at zero.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Byte every pixel of this buffer is filled with.
    pub fn fill(&self) -> u8 {
        fill_byte(self.index)
    }
}

impl Drop for SyntheticSurface {
    fn drop(&mut self) {
        self.shared.update(|state| {
            state.outstanding = false;
            state.counts.released += 1;
        });
    }
}

impl std::fmt::Debug for ProducerShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerShared").finish_non_exhaustive()
    }
}

/// Pixel byte of the buffer with the given index. Never the padding byte.
pub fn fill_byte(index: u64) -> u8 {
    (index % 200) as u8 + 1
}

/// CPU staging surface of a synthetic device.
#[derive(Debug)]
pub struct SyntheticStaging {
    data: RefCell<Vec<u8>>,
    row_bytes: usize,
    row_pitch: usize,
}

/// Render device that keeps its surfaces in memory.
#[derive(Debug, Clone, Default)]
pub struct SyntheticDevice {
    row_padding: usize,
    fail_copy: bool,
    fail_map: bool,
    encoder: Option<EncoderInfo>,
    gauge: Option<WorkerGauge>,
}

impl SyntheticDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pad every staging row with `bytes` extra bytes.
    pub fn with_row_padding(mut self, bytes: usize) -> Self {
        self.row_padding = bytes;
        self
    }

    /// Make every GPU copy fail.
    pub fn failing_copy(mut self) -> Self {
        self.fail_copy = true;
        self
    }

    /// Make every staging map fail.
    pub fn failing_map(mut self) -> Self {
        self.fail_map = true;
        self
    }

    /// Report a hardware encoder from the capability probe.
    pub fn with_encoder(mut self, encoder: EncoderInfo) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Count worker threads using this device.
    pub fn with_gauge(mut self, gauge: WorkerGauge) -> Self {
        self.gauge = Some(gauge);
        self
    }
}

impl RenderDevice for SyntheticDevice {
    type Surface = SyntheticSurface;
    type Staging = SyntheticStaging;

    fn create_staging(&self, mode: &MonitorMode) -> PumpResult<SyntheticStaging> {
        let row_bytes = mode.row_bytes();
        let row_pitch = row_bytes + self.row_padding;

        Ok(SyntheticStaging {
            data: RefCell::new(vec![PADDING_BYTE; row_pitch * mode.height as usize]),
            row_bytes,
            row_pitch,
        })
    }

    fn copy_to_staging(
        &self,
        surface: &SyntheticSurface,
        staging: &SyntheticStaging,
    ) -> PumpResult<()> {
        if self.fail_copy {
            return Err(PumpError::SurfaceCopy(format!(
                "synthetic copy of buffer {} failed",
                surface.index()
            )));
        }

        let fill = surface.fill();
        for row in staging.data.borrow_mut().chunks_mut(staging.row_pitch) {
            row[..staging.row_bytes].fill(fill);
        }

        trace!(index = surface.index(), "Synthetic copy");
        Ok(())
    }

    fn read_staging(
        &self,
        staging: &SyntheticStaging,
        read: &mut dyn FnMut(MappedSurface<'_>) -> PumpResult<()>,
    ) -> PumpResult<()> {
        if self.fail_map {
            return Err(PumpError::SurfaceMap("synthetic map failed".to_string()));
        }

        let data = staging.data.borrow();
        read(MappedSurface {
            data: &data,
            row_pitch: staging.row_pitch,
        })
    }

    fn probe_encoder(&self) -> Option<EncoderInfo> {
        self.encoder.clone()
    }

    fn enter_worker_thread(&self) -> WorkerScope {
        match &self.gauge {
            Some(gauge) => gauge.enter(),
            None => WorkerScope::default(),
        }
    }
}

/// Opens synthetic devices, refusing adapters marked unavailable.
#[derive(Debug, Default)]
pub struct SyntheticDeviceFactory {
    template: SyntheticDevice,
    unavailable: Mutex<HashSet<AdapterLuid>>,
    opened: AtomicUsize,
}

impl SyntheticDeviceFactory {
    /// Factory handing out clones of `template`.
    pub fn new(template: SyntheticDevice) -> Self {
        Self {
            template,
            unavailable: Mutex::new(HashSet::new()),
            opened: AtomicUsize::new(0),
        }
    }

    /// Simulate removal or return of an adapter.
    pub fn set_available(&self, adapter: AdapterLuid, available: bool) {
        let mut unavailable = self.unavailable.lock();
        if available {
            unavailable.remove(&adapter);
        } else {
            unavailable.insert(adapter);
        }
    }

    /// Number of devices opened successfully.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl DeviceFactory for SyntheticDeviceFactory {
    type Device = SyntheticDevice;

    fn open(&self, adapter: AdapterLuid) -> PumpResult<SyntheticDevice> {
        if self.unavailable.lock().contains(&adapter) {
            return Err(PumpError::AdapterNotFound(adapter));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.template.clone())
    }
}

#[derive(Debug, Default)]
struct GaugeCounts {
    live: AtomicUsize,
    peak: AtomicUsize,
    entered: AtomicUsize,
}

/// Tracks how many pump workers are alive at once.
#[derive(Debug, Clone, Default)]
pub struct WorkerGauge {
    counts: Arc<GaugeCounts>,
}

impl WorkerGauge {
    pub fn new() -> Self {
        Self::default()
    }

    fn enter(&self) -> WorkerScope {
        let live = self.counts.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counts.peak.fetch_max(live, Ordering::SeqCst);
        self.counts.entered.fetch_add(1, Ordering::SeqCst);

        let counts = Arc::clone(&self.counts);
        WorkerScope::new(move || {
            counts.live.fetch_sub(1, Ordering::SeqCst);
        })
    }

    /// Workers currently running.
    pub fn live(&self) -> usize {
        self.counts.live.load(Ordering::SeqCst)
    }

    /// Highest number of workers seen running at the same time.
    pub fn peak(&self) -> usize {
        self.counts.peak.load(Ordering::SeqCst)
    }

    /// Workers started so far.
    pub fn entered(&self) -> usize {
        self.counts.entered.load(Ordering::SeqCst)
    }
}

/// Forwarding answer of a [`RecordingSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardPolicy {
    Always,
    Never,
    ChangedOnly,
}

#[derive(Debug, Default)]
struct SinkLog {
    decisions: Vec<bool>,
    allocations: Vec<usize>,
    accepted: Vec<PixelBuffer>,
}

/// Sink recording every call the pump makes.
#[derive(Debug)]
pub struct RecordingSink {
    policy: ForwardPolicy,
    short_by: usize,
    log: Mutex<SinkLog>,
}

impl RecordingSink {
    pub fn new(policy: ForwardPolicy) -> Self {
        Self {
            policy,
            short_by: 0,
            log: Mutex::new(SinkLog::default()),
        }
    }

    /// Hand out buffers `bytes` shorter than requested.
    pub fn with_short_buffers(mut self, bytes: usize) -> Self {
        self.short_by = bytes;
        self
    }

    /// The `has_changed` hints the pump asked about, in order.
    pub fn decisions(&self) -> Vec<bool> {
        self.log.lock().decisions.clone()
    }

    /// Requested buffer lengths, in order.
    pub fn allocations(&self) -> Vec<usize> {
        self.log.lock().allocations.clone()
    }

    pub fn accepted_count(&self) -> usize {
        self.log.lock().accepted.len()
    }

    /// Take the frames accepted so far.
    pub fn take_accepted(&self) -> Vec<PixelBuffer> {
        std::mem::take(&mut self.log.lock().accepted)
    }
}

impl FrameSink for RecordingSink {
    fn should_forward(&self, has_changed: bool) -> bool {
        self.log.lock().decisions.push(has_changed);
        match self.policy {
            ForwardPolicy::Always => true,
            ForwardPolicy::Never => false,
            ForwardPolicy::ChangedOnly => has_changed,
        }
    }

    fn allocate_buffer(&self, len: usize) -> Vec<u8> {
        self.log.lock().allocations.push(len);
        vec![0; len.saturating_sub(self.short_by)]
    }

    fn accept(&self, frame: PixelBuffer) {
        self.log.lock().accepted.push(frame);
    }
}
