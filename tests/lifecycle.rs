//! Lifecycle controller behavior, driven by control events directly.

use std::time::Duration;

use api_host::lifecycle::events::{self, Delivery};
use api_host::lifecycle::{ControlEvent, Controller, Flow, LifecycleError, LifecycleState};

mod common;

use common::{Call, RecordingFactory, ScriptedSource, SharedBuffer};

async fn running() -> (
    Controller<ScriptedSource, RecordingFactory>,
    ScriptedSource,
    RecordingFactory,
    SharedBuffer,
) {
    let source = ScriptedSource::default();
    let factory = RecordingFactory::default();
    let dump = SharedBuffer::default();

    let mut controller =
        Controller::new(source.clone(), factory.clone()).with_dump_writer(dump.clone());
    controller.startup().await.unwrap();
    assert_eq!(controller.state(), LifecycleState::Running);

    (controller, source, factory, dump)
}

#[tokio::test]
async fn startup_config_failure_is_fatal() {
    let source = ScriptedSource::default();
    source.fail_resolution(true);
    let factory = RecordingFactory::default();

    let mut controller = Controller::new(source, factory.clone());
    let err = controller.startup().await.unwrap_err();

    assert!(matches!(err, LifecycleError::StartupConfig(_)));
    assert_ne!(controller.state(), LifecycleState::Running);
    assert!(factory.calls().is_empty());
}

#[tokio::test]
async fn startup_server_failure_is_fatal() {
    let factory = RecordingFactory::default();
    factory.fail_start(true);

    let mut controller = Controller::new(ScriptedSource::default(), factory);
    let err = controller.startup().await.unwrap_err();

    assert!(matches!(err, LifecycleError::StartupServer(_)));
    assert!(controller.current().is_none());
}

#[tokio::test]
async fn successive_reloads_keep_exactly_one_current_handle() {
    let (mut controller, _source, factory, _dump) = running().await;

    for expected in 2..=5 {
        let flow = controller.handle(ControlEvent::Reload).await.unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(controller.state(), LifecycleState::Running);
        assert_eq!(controller.current().unwrap().n(), expected);
    }

    // Every replaced handle was stopped exactly once, before its successor started.
    assert_eq!(
        factory.calls(),
        vec![
            Call::Start(1),
            Call::Stop(1),
            Call::Start(2),
            Call::Stop(2),
            Call::Start(3),
            Call::Stop(3),
            Call::Start(4),
            Call::Stop(4),
            Call::Start(5),
        ]
    );
}

#[tokio::test]
async fn failed_resolution_keeps_current_handle() {
    let (mut controller, source, factory, _dump) = running().await;

    source.fail_resolution(true);
    let flow = controller.handle(ControlEvent::Reload).await.unwrap();

    assert_eq!(flow, Flow::Continue);
    assert_eq!(controller.state(), LifecycleState::Running);
    assert_eq!(controller.current().unwrap().n(), 1);
    assert_eq!(factory.calls(), vec![Call::Start(1)]);
    assert_eq!(source.resolutions(), 2);

    // The next good reload works as usual.
    source.fail_resolution(false);
    controller.handle(ControlEvent::Reload).await.unwrap();
    assert_eq!(controller.current().unwrap().n(), 2);
}

#[tokio::test]
async fn failed_restart_after_stop_is_fatal() {
    let (mut controller, _source, factory, _dump) = running().await;

    factory.fail_start(true);
    let err = controller.handle(ControlEvent::Reload).await.unwrap_err();

    assert!(matches!(err, LifecycleError::ReloadServer(_)));
    assert!(controller.current().is_none());
    assert_eq!(controller.state(), LifecycleState::Terminated);
    assert_eq!(factory.calls(), vec![Call::Start(1), Call::Stop(1)]);
}

#[tokio::test]
async fn shutdown_stops_then_purges_once() {
    let (mut controller, _source, factory, _dump) = running().await;

    assert_eq!(controller.handle(ControlEvent::Shutdown).await.unwrap(), Flow::Exit);
    assert_eq!(controller.state(), LifecycleState::Terminated);

    // Anything after shutdown is ignored.
    assert_eq!(controller.handle(ControlEvent::Shutdown).await.unwrap(), Flow::Exit);
    assert_eq!(controller.handle(ControlEvent::DumpState).await.unwrap(), Flow::Exit);

    assert_eq!(
        factory.calls(),
        vec![Call::Start(1), Call::Stop(1), Call::Purge(1)]
    );
}

#[tokio::test]
async fn dump_state_writes_one_line() {
    let (mut controller, _source, factory, dump) = running().await;

    controller.handle(ControlEvent::DumpState).await.unwrap();

    assert_eq!(dump.contents(), "{\"handle\":1}\n");
    assert_eq!(dump.writes(), 1);
    assert_eq!(controller.current().unwrap().n(), 1);
    assert_eq!(factory.calls(), vec![Call::Start(1), Call::Snapshot(1)]);
}

#[tokio::test]
async fn dump_state_failures_are_contained() {
    let (mut controller, _source, factory, dump) = running().await;

    factory.fail_snapshot(true);
    let flow = controller.handle(ControlEvent::DumpState).await.unwrap();
    assert_eq!(flow, Flow::Continue);
    assert_eq!(dump.writes(), 0);

    factory.fail_snapshot(false);
    dump.fail_writes(true);
    let flow = controller.handle(ControlEvent::DumpState).await.unwrap();
    assert_eq!(flow, Flow::Continue);
    assert_eq!(dump.writes(), 1);

    assert_eq!(controller.state(), LifecycleState::Running);
    assert_eq!(controller.current().unwrap().n(), 1);
}

#[tokio::test]
async fn scenario_reload_dump_shutdown() {
    let (controller, _source, factory, dump) = running().await;
    let (tx, rx) = events::channel(8);

    assert_eq!(tx.send(ControlEvent::Reload), Delivery::Queued);
    assert_eq!(tx.send(ControlEvent::DumpState), Delivery::Queued);

    let run = tokio::spawn(controller.run(rx));

    // Let the queued events drain before asking for shutdown.
    tokio::time::timeout(Duration::from_secs(5), async {
        while !factory.calls().contains(&Call::Snapshot(2)) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    tx.send(ControlEvent::Shutdown);

    let result = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());

    assert_eq!(
        factory.calls(),
        vec![
            Call::Start(1),
            Call::Stop(1),
            Call::Start(2),
            Call::Snapshot(2),
            Call::Stop(2),
            Call::Purge(2),
        ]
    );
    assert_eq!(dump.contents(), "{\"handle\":2}\n");
}

#[tokio::test]
async fn queued_events_run_before_a_later_shutdown() {
    let (controller, _source, factory, dump) = running().await;
    let (tx, rx) = events::channel(16);

    assert_eq!(tx.send(ControlEvent::DumpState), Delivery::Queued);
    assert_eq!(tx.send(ControlEvent::Reload), Delivery::Queued);
    assert_eq!(tx.send(ControlEvent::Shutdown), Delivery::Queued);

    tokio::time::timeout(Duration::from_secs(5), controller.run(rx))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        factory.calls(),
        vec![
            Call::Start(1),
            Call::Snapshot(1),
            Call::Stop(1),
            Call::Start(2),
            Call::Stop(2),
            Call::Purge(2),
        ]
    );
    assert_eq!(dump.contents(), "{\"handle\":1}\n");
}

#[tokio::test]
async fn shutdown_on_a_full_queue_still_runs_after_queued_events() {
    let (controller, _source, factory, dump) = running().await;
    let (tx, rx) = events::channel(2);

    assert_eq!(tx.send(ControlEvent::DumpState), Delivery::Queued);
    assert_eq!(tx.send(ControlEvent::Reload), Delivery::Queued);
    assert_eq!(tx.send(ControlEvent::DumpState), Delivery::Dropped);
    assert_eq!(tx.send(ControlEvent::Shutdown), Delivery::Queued);

    tokio::time::timeout(Duration::from_secs(5), controller.run(rx))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        factory.calls(),
        vec![
            Call::Start(1),
            Call::Snapshot(1),
            Call::Stop(1),
            Call::Start(2),
            Call::Stop(2),
            Call::Purge(2),
        ]
    );
    assert_eq!(dump.writes(), 1);
}

#[tokio::test]
async fn scenario_reload_with_missing_config() {
    let (controller, source, factory, _dump) = running().await;
    let (tx, rx) = events::channel(8);

    source.fail_resolution(true);
    tx.send(ControlEvent::Reload);

    let run = tokio::spawn(controller.run(rx));
    tokio::time::timeout(Duration::from_secs(5), async {
        while source.resolutions() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    // Still serving: the process has not exited.
    assert!(!run.is_finished());
    assert_eq!(factory.calls(), vec![Call::Start(1)]);

    tx.send(ControlEvent::Shutdown);
    let result = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn concurrent_events_are_serialized() {
    let (controller, _source, factory, _dump) = running().await;
    factory.slow(true);
    let (tx, rx) = events::channel(64);

    let run = tokio::spawn(controller.run(rx));

    let senders: Vec<_> = (0..8)
        .map(|i| {
            let tx = tx.clone();
            tokio::spawn(async move {
                let event = if i % 2 == 0 {
                    ControlEvent::Reload
                } else {
                    ControlEvent::DumpState
                };
                tx.send(event)
            })
        })
        .collect();
    for sender in senders {
        assert_eq!(sender.await.unwrap(), Delivery::Queued);
    }

    tokio::time::timeout(Duration::from_secs(10), async {
        while factory.calls().iter().filter(|c| matches!(c, Call::Start(_))).count() < 5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    tx.send(ControlEvent::Shutdown);
    tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let calls = factory.calls();
    assert!(!calls.contains(&Call::Overlap), "transitions overlapped: {calls:?}");

    // Each stop is immediately followed by the start of its successor.
    for pair in calls.windows(2) {
        if let [Call::Stop(n), next] = pair {
            assert!(
                matches!(next, Call::Start(m) if *m == n + 1) || matches!(next, Call::Purge(m) if m == n),
                "unexpected call after stop of {n}: {next:?}"
            );
        }
    }
}

#[tokio::test]
async fn closed_intake_shuts_down() {
    let (controller, _source, factory, _dump) = running().await;
    let (tx, rx) = events::channel(4);
    drop(tx);

    controller.run(rx).await.unwrap();
    assert_eq!(
        factory.calls(),
        vec![Call::Start(1), Call::Stop(1), Call::Purge(1)]
    );
}
