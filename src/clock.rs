use chrono::{DateTime, Utc};
use std::cell::Cell;
use std::rc::Rc;

/// Source of "now" for the engine. Production code uses [`SystemClock`];
/// tests and simulation drive a [`ManualClock`].
pub trait TimeSource {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for deterministic tests and accelerated simulation.
/// Clones share the same underlying time, so a driver can keep a handle
/// while the engine owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.current.set(at);
    }

    pub fn advance_minutes(&self, minutes: f64) {
        let millis = (minutes * 60_000.0).round() as i64;
        self.current
            .set(self.current.get() + chrono::Duration::milliseconds(millis));
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.current.get()
    }
}
