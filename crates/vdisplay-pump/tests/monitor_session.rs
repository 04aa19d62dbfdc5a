//! Monitor session transitions against synthetic devices.

mod pump_helpers;

use std::sync::Arc;
use std::thread;

use pump_helpers::{test_config, TIMEOUT};
use vdisplay_pump::synthetic::{
    ForwardPolicy, RecordingSink, SyntheticDevice, SyntheticDeviceFactory, SyntheticProducer,
    WorkerGauge,
};
use vdisplay_pump::{AdapterLuid, FrameMetadata, MonitorSession, PumpError, PumpExit, SessionState};

const ADAPTER: AdapterLuid = AdapterLuid::new(0x1d2c, 0);

fn session(
    gauge: &WorkerGauge,
) -> MonitorSession<SyntheticDeviceFactory, RecordingSink> {
    let factory = SyntheticDeviceFactory::new(SyntheticDevice::new().with_gauge(gauge.clone()));
    MonitorSession::new(
        factory,
        Arc::new(RecordingSink::new(ForwardPolicy::ChangedOnly)),
        test_config(),
    )
}

#[test]
fn device_failure_deletes_swap_chain_and_stays_idle() {
    let gauge = WorkerGauge::new();
    let factory = SyntheticDeviceFactory::new(SyntheticDevice::new().with_gauge(gauge.clone()));
    factory.set_available(ADAPTER, false);
    let session = MonitorSession::new(
        factory,
        Arc::new(RecordingSink::new(ForwardPolicy::Always)),
        test_config(),
    );

    let (producer, chain, signal) = SyntheticProducer::new();
    let err = session.assign_swap_chain(chain, ADAPTER, signal).unwrap_err();

    assert!(matches!(err, PumpError::AdapterNotFound(luid) if luid == ADAPTER));
    assert!(err.is_device_loss());
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.is_pump_running());

    let counts = producer.counts();
    assert_eq!(counts.deleted, 1);
    assert_eq!(counts.set_device, 0);
    assert_eq!(gauge.entered(), 0);
}

#[test]
fn adapter_can_come_back_on_next_assignment() {
    let gauge = WorkerGauge::new();
    let factory = SyntheticDeviceFactory::new(SyntheticDevice::new().with_gauge(gauge.clone()));
    factory.set_available(ADAPTER, false);
    let session = MonitorSession::new(
        factory,
        Arc::new(RecordingSink::new(ForwardPolicy::Always)),
        test_config(),
    );

    let (_first, chain, signal) = SyntheticProducer::new();
    assert!(session.assign_swap_chain(chain, ADAPTER, signal).is_err());

    // The factory is owned by the session; a second adapter stands in for
    // the host's regenerated swap chain on a working GPU.
    let other = AdapterLuid::new(0x1d2d, 0);
    let (second, chain, signal) = SyntheticProducer::new();
    session.assign_swap_chain(chain, other, signal).unwrap();

    assert_eq!(session.state(), SessionState::Active);
    assert!(second.wait_until(TIMEOUT, |c| c.set_device == 1));
    assert_eq!(gauge.live(), 1);
}

#[test]
fn unassign_is_idempotent() {
    let gauge = WorkerGauge::new();
    let session = session(&gauge);

    session.unassign_swap_chain();
    session.unassign_swap_chain();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.last_exit().is_none());

    let (producer, chain, signal) = SyntheticProducer::new();
    session.assign_swap_chain(chain, ADAPTER, signal).unwrap();
    assert_eq!(session.state(), SessionState::Active);

    session.unassign_swap_chain();
    session.unassign_swap_chain();

    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.last_exit(), Some(PumpExit::Terminated));
    assert_eq!(producer.counts().deleted, 1);
    assert_eq!(gauge.live(), 0);
}

#[test]
fn reassignment_joins_previous_pump_first() {
    let gauge = WorkerGauge::new();
    let session = session(&gauge);

    let (first, chain, signal) = SyntheticProducer::new();
    session.assign_swap_chain(chain, ADAPTER, signal).unwrap();
    assert!(first.wait_until(TIMEOUT, |c| c.set_device == 1));

    let (second, chain, signal) = SyntheticProducer::new();
    session.assign_swap_chain(chain, ADAPTER, signal).unwrap();

    // The old worker was joined before the new one was started.
    assert_eq!(first.counts().deleted, 1);
    assert_eq!(second.counts().deleted, 0);
    assert!(second.wait_until(TIMEOUT, |c| c.set_device == 1));
    assert_eq!(gauge.live(), 1);
    assert_eq!(gauge.peak(), 1);

    drop(session);
    assert_eq!(second.counts().deleted, 1);
    assert_eq!(gauge.live(), 0);
}

#[test]
fn at_most_one_worker_across_transition_sequences() {
    let gauge = WorkerGauge::new();
    let factory = SyntheticDeviceFactory::new(SyntheticDevice::new().with_gauge(gauge.clone()));
    let lost = AdapterLuid::new(0xdead, 0);
    factory.set_available(lost, false);
    let session = MonitorSession::new(
        factory,
        Arc::new(RecordingSink::new(ForwardPolicy::Always)),
        test_config(),
    );

    let mut producers = Vec::new();
    for round in 0..12 {
        let (producer, chain, signal) = SyntheticProducer::new();
        producer.push_frame(FrameMetadata::new(1, 0));

        match round % 4 {
            0 | 1 => session.assign_swap_chain(chain, ADAPTER, signal).unwrap(),
            2 => {
                assert!(session.assign_swap_chain(chain, lost, signal).is_err());
                assert_eq!(session.state(), SessionState::Idle);
            }
            _ => {
                session.assign_swap_chain(chain, ADAPTER, signal).unwrap();
                session.unassign_swap_chain();
            }
        }

        assert!(gauge.live() <= 1);
        producers.push(producer);
    }

    drop(session);

    assert_eq!(gauge.live(), 0);
    assert_eq!(gauge.peak(), 1);
    for producer in &producers {
        let counts = producer.counts();
        assert_eq!(counts.deleted, 1);
        assert_eq!(counts.released, counts.acquired);
    }
}

#[test]
fn concurrent_assignments_are_serialized() {
    let gauge = WorkerGauge::new();
    let session = Arc::new(session(&gauge));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let mut producers = Vec::new();
                for _ in 0..5 {
                    let (producer, chain, signal) = SyntheticProducer::new();
                    session.assign_swap_chain(chain, ADAPTER, signal).unwrap();
                    producers.push(producer);
                }
                producers
            })
        })
        .collect();
    let producers: Vec<_> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();

    session.unassign_swap_chain();

    assert_eq!(gauge.peak(), 1);
    assert_eq!(gauge.live(), 0);
    assert!(producers.iter().all(|p| p.counts().deleted == 1));
}

#[test]
fn active_session_reports_pump_stats() {
    let gauge = WorkerGauge::new();
    let session = session(&gauge);
    assert!(session.stats().is_none());

    let (producer, chain, signal) = SyntheticProducer::new();
    session.assign_swap_chain(chain, ADAPTER, signal).unwrap();
    producer.push_frame(FrameMetadata::new(3, 0));
    producer.push_frame(FrameMetadata::unchanged());
    assert!(producer.wait_until(TIMEOUT, |c| c.finished == 2));

    assert!(session.is_pump_running());
    let stats = session.stats().unwrap();
    assert_eq!(stats.frames_acquired, 2);
    assert_eq!(stats.frames_forwarded, 1);
    assert_eq!(stats.frames_skipped, 1);
    assert_eq!(session.sink().accepted_count(), 1);
}

#[test]
fn pump_failure_keeps_session_active_until_unassigned() {
    let gauge = WorkerGauge::new();
    let session = session(&gauge);

    let (producer, chain, signal) = SyntheticProducer::new();
    session.assign_swap_chain(chain, ADAPTER, signal).unwrap();
    producer.push_failure("context lost");
    assert!(producer.wait_until(TIMEOUT, |c| c.deleted == 1));

    assert_eq!(session.state(), SessionState::Active);

    session.unassign_swap_chain();
    assert!(matches!(session.last_exit(), Some(PumpExit::AcquireFailed(_))));
    assert_eq!(producer.counts().deleted, 1);
}
