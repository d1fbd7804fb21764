//! Mock construction helpers

use graphs_core::events::{Notification, Notifier, ProjectEvent};
use mockall::mock;
use std::sync::{Arc, Mutex};

mock! {
    pub Notifier {}

    impl Notifier for Notifier {
        fn notify(&self, notification: Notification);
    }
}

/// A notifier that fails the test if anything is reported
pub fn silent_notifier() -> Box<MockNotifier> {
    let mut notifier = MockNotifier::new();
    notifier.expect_notify().never();
    Box::new(notifier)
}

/// Shared log of the events seen by a subscriber
pub type EventLog = Arc<Mutex<Vec<ProjectEvent>>>;

/// Subscribe a recorder to `engine` and return its log
pub fn record_events(engine: &mut graphs_core::ProjectEngine) -> EventLog {
    let log: EventLog = Arc::default();
    let sink = Arc::clone(&log);
    engine.subscribe("recorder", move |event: &ProjectEvent| {
        if let Ok(mut events) = sink.lock() {
            events.push(event.clone());
        }
    });
    log
}
