use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Injectable source of "now". Every time-driven decision in the core reads
/// through this instead of calling `Utc::now()` directly, so tests can
/// advance the clock deterministically instead of sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock, used in production wiring.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub type SharedClock = Arc<dyn Clock>;

#[cfg(feature = "test-util")]
pub mod test_util {
    use super::*;
    use std::sync::Mutex;

    /// A clock tests can advance by hand, to exercise `evidence_timeout`,
    /// `adaptive_timeout`, and tick behavior without real sleeps.
    pub struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(start)))
        }

        pub fn advance(&self, delta: chrono::Duration) {
            let mut guard = self.0.lock().unwrap();
            *guard += delta;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }
}
