//! End-to-end lifecycle tests against host doubles

mod common;

use common::{host, services, Executor, Hooks, Listener};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use whomine::plugin::ActivationState;
use whomine::{
    BootError, CommandDescriptor, Component, ComponentMarker, ComponentTable, LifecycleController, LifecycleState,
    StatusMarker,
};

/// Two marked classes and one untagged class, counting constructions
fn counted_table(constructed: &Arc<AtomicUsize>) -> ComponentTable {
    let mut table = ComponentTable::new();
    let (a, b, c) = (Arc::clone(constructed), Arc::clone(constructed), Arc::clone(constructed));
    table
        .register(
            "whomine.mscount.command.Home",
            Some(ComponentMarker::Command(CommandDescriptor::builder("home").build())),
            move || {
                a.fetch_add(1, Ordering::SeqCst);
                Ok(Component::Command(Arc::new(Executor)))
            },
        )
        .register(
            "whomine.mscount.listener.Quit",
            Some(ComponentMarker::EventListener),
            move || {
                b.fetch_add(1, Ordering::SeqCst);
                Ok(Component::EventListener(Arc::new(Listener)))
            },
        )
        .register("whomine.mscount.util.Strings", None, move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(Component::EventListener(Arc::new(Listener)))
        });
    table
}

#[test]
fn test_each_marked_class_is_constructed_once() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let constructed = Arc::new(AtomicUsize::new(0));
    let controller = LifecycleController::from_table(
        Hooks::new("MSCount"),
        Arc::new(counted_table(&constructed)),
        host(&dir, 0),
        services(),
    );

    controller.load().expect("Load failed");
    assert_eq!(constructed.load(Ordering::SeqCst), 2, "Untagged classes must never be constructed");

    let registry = controller.registry();
    assert_eq!(registry.len_commands(), 1);
    assert_eq!(registry.len_event_listeners(), 1);
    assert_eq!(registry.len_packet_listeners(), 0);
    assert_eq!(registry.len_inventory_holders(), 0);

    controller.enable().expect("Enable failed");
    assert_eq!(constructed.load(Ordering::SeqCst), 2, "Enable must reuse the loaded instances");
    assert!(registry
        .event_listeners()
        .iter()
        .all(|listener| listener.state() == ActivationState::Registered));
}

#[test]
fn test_watcher_sees_every_marker_in_order() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let constructed = Arc::new(AtomicUsize::new(0));
    let controller = LifecycleController::from_table(
        Hooks::new("MSCount"),
        Arc::new(counted_table(&constructed)),
        host(&dir, 0),
        services(),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    controller.status().add_watcher(move |marker: StatusMarker| {
        sink.lock().push(marker);
        Ok(())
    });

    controller.load().expect("Load failed");
    controller.enable().expect("Enable failed");
    controller.disable().expect("Disable failed");
    controller.enable().expect("Re-enable failed");

    assert_eq!(
        *seen.lock(),
        vec![
            StatusMarker::LoadInProgress,
            StatusMarker::Loaded,
            StatusMarker::EnableInProgress,
            StatusMarker::Enabled,
            StatusMarker::DisableInProgress,
            StatusMarker::Disabled,
            StatusMarker::EnableInProgress,
            StatusMarker::Enabled,
        ]
    );
    assert_eq!(constructed.load(Ordering::SeqCst), 2, "Re-enable must not rediscover");
}

#[test]
fn test_shutdown_requested_while_enabling() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let constructed = Arc::new(AtomicUsize::new(0));
    let controller = LifecycleController::from_table(
        Hooks::shutting_down("MSCount"),
        Arc::new(counted_table(&constructed)),
        host(&dir, 0),
        services(),
    );

    controller.load().expect("Load failed");
    controller.enable().expect("Enable failed");

    assert_eq!(controller.state(), LifecycleState::Disabled);
    assert!(!controller.status().contains(StatusMarker::Enabled));
    assert_eq!(controller.status().high_status(), Some(StatusMarker::Disabled));
    assert!(!controller.is_active());
}

#[test]
fn test_boot_failure_is_isolated() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let host = host(&dir, 0);
    std::fs::write(host.global_folder().join("MSBlocked"), b"").expect("Failed to block plugin folder");

    let mut blocked_table = ComponentTable::new();
    blocked_table.register("whomine.msblocked.listener.Join", Some(ComponentMarker::EventListener), || {
        Ok(Component::EventListener(Arc::new(Listener)))
    });
    let blocked = LifecycleController::from_table(
        Hooks::new("MSBlocked"),
        Arc::new(blocked_table),
        Arc::clone(&host),
        services(),
    );

    let constructed = Arc::new(AtomicUsize::new(0));
    let sibling = LifecycleController::from_table(
        Hooks::new("MSCount"),
        Arc::new(counted_table(&constructed)),
        host,
        services(),
    );

    assert!(matches!(blocked.load(), Err(BootError::Storage { .. })));
    assert_eq!(blocked.state(), LifecycleState::Failed);
    assert!(blocked.status().contains(StatusMarker::Failed));

    sibling.load().expect("Sibling load failed");
    sibling.enable().expect("Sibling enable failed");
    assert_eq!(sibling.state(), LifecycleState::Enabled);
}

#[test]
fn test_tracker_high_and_low_properties() {
    let tracker = whomine::StatusTracker::new();
    let sequence = [
        StatusMarker::LoadInProgress,
        StatusMarker::Loaded,
        StatusMarker::EnableInProgress,
        StatusMarker::Loaded,
        StatusMarker::Enabled,
        StatusMarker::DisableInProgress,
    ];

    let mut last_high = None;
    let mut low_count = 0;
    for marker in sequence {
        tracker.set_status(marker);
        if marker.is_high() {
            last_high = Some(marker);
        }

        assert_eq!(tracker.high_status(), last_high);
        let low = tracker.low_statuses();
        assert!(low.len() >= low_count, "Low markers must never be removed");
        low_count = low.len();
    }

    assert!(tracker.contains_all(&[StatusMarker::Loaded, StatusMarker::Enabled]).expect("One high marker"));
    assert!(tracker
        .contains_all(&[StatusMarker::Enabled, StatusMarker::DisableInProgress])
        .is_err());
}
