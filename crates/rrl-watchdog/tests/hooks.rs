//! Watchdog hooks on the panic handler and the diagnostic channel

use rrl_watchdog::{HealthState, ManualClock, NullHost, Watchdog, WatchdogConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;

// The panic hook is process-wide; tests that panic take turns.
static PANICS: parking_lot::Mutex<()> = parking_lot::const_mutex(());

fn watchdog(panic_hook: bool) -> (Watchdog, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let config = WatchdogConfig::default()
        .with_panic_hook(panic_hook)
        .with_error_threshold(2);
    (Watchdog::with_parts(config, clock.clone(), Arc::new(NullHost)), clock)
}

#[tokio::test]
async fn panic_hook_feeds_error_probe() {
    let _turn = PANICS.lock();
    let (watchdog, _clock) = watchdog(true);
    assert!(watchdog.apply_patch().unwrap());

    let caught = std::panic::catch_unwind(|| panic!("heap allocation failed"));

    assert!(caught.is_err());
    let status = watchdog.status();
    assert_eq!(status.error_count, 1);
    assert_eq!(status.recovery_attempts, 1);
    assert_eq!(watchdog.health(), HealthState::Healthy);
    watchdog.shutdown();
}

#[tokio::test]
async fn reinstalling_does_not_double_count_panics() {
    let _turn = PANICS.lock();
    let (watchdog, _clock) = watchdog(true);
    assert!(watchdog.apply_patch().unwrap());
    watchdog.shutdown();
    assert!(watchdog.apply_patch().unwrap());

    let caught = std::panic::catch_unwind(|| panic!("render failed"));

    assert!(caught.is_err());
    assert_eq!(watchdog.status().error_count, 1);
    watchdog.shutdown();
}

#[tokio::test]
async fn uninstalled_watchdog_ignores_panics() {
    let _turn = PANICS.lock();
    let (watchdog, _clock) = watchdog(true);
    assert!(watchdog.apply_patch().unwrap());
    watchdog.shutdown();

    let caught = std::panic::catch_unwind(|| panic!("render failed"));

    assert!(caught.is_err());
    assert_eq!(watchdog.status().error_count, 0);
}

#[test]
fn layer_trips_after_threshold_and_respects_cooldown() {
    let (watchdog, clock) = watchdog(false);
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(watchdog.error_layer());

    tracing::subscriber::with_default(subscriber, || {
        for n in 0..3 {
            tracing::error!(request = n, "upstream returned 502");
        }
        assert_eq!(watchdog.status().recovery_attempts, 1);

        for n in 0..3 {
            tracing::error!(request = n, "upstream returned 502");
        }
        assert_eq!(watchdog.status().recovery_attempts, 1);

        clock.advance(Duration::from_secs(10));
        for n in 0..3 {
            tracing::error!(request = n, "upstream returned 502");
        }
        assert_eq!(watchdog.status().recovery_attempts, 2);
    });
}

#[test]
fn dropped_watchdog_leaves_layer_inert() {
    let (watchdog, _clock) = watchdog(false);
    let layer = watchdog.error_layer();
    drop(watchdog);

    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, || {
        tracing::error!("nobody is listening");
    });
}
