//! Test helpers for the transport module.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use super::{Connection, ConnectionHandler};

/// Counts connections and records whether the stop flag was raised when
/// each one finished.
pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
    hold: Duration,
    stopped_on_exit: Mutex<Vec<bool>>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        Self::holding(Duration::ZERO)
    }

    /// Handler that keeps each connection for `hold` before finishing.
    pub(crate) fn holding(hold: Duration) -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
            hold,
            stopped_on_exit: Mutex::new(Vec::new()),
        });
        (count, handler)
    }

    pub(crate) fn stopped_on_exit(&self) -> Vec<bool> {
        self.stopped_on_exit
            .lock()
            .expect("stop flags lock")
            .clone()
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, connection: Connection) {
        self.count.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.hold);
        self.stopped_on_exit
            .lock()
            .expect("stop flags lock")
            .push(connection.stop.is_raised());
    }
}
