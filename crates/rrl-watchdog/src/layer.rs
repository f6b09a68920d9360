//! Error-rate probe on the diagnostic channel
//!
//! [`ErrorRateLayer`] sits beside the application's other `tracing` layers.
//! It only observes: every event still reaches the formatter or exporter it
//! was meant for.

use crate::watchdog::WatchdogInner;
use std::fmt::Write as _;
use std::sync::Weak;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Counts ERROR events and forwards their text to the watchdog
#[derive(Clone)]
pub struct ErrorRateLayer {
    watchdog: Weak<WatchdogInner>,
}

impl ErrorRateLayer {
    pub(crate) fn new(watchdog: Weak<WatchdogInner>) -> Self {
        Self { watchdog }
    }
}

impl std::fmt::Debug for ErrorRateLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorRateLayer")
            .field("attached", &(self.watchdog.strong_count() > 0))
            .finish()
    }
}

impl<S> Layer<S> for ErrorRateLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }
        let Some(watchdog) = self.watchdog.upgrade() else {
            return;
        };

        let mut text = EventText::default();
        event.record(&mut text);
        watchdog.record_error(&text.0);
    }
}

/// Message plus `key=value` pairs of an event
#[derive(Default)]
struct EventText(String);

impl Visit for EventText {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.push_str(value);
        } else {
            let _ = write!(self.0, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.0, "{value:?}");
        } else {
            let _ = write!(self.0, " {}={:?}", field.name(), value);
        }
    }
}
