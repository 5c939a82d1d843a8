//! Server-assigned timestamps.
//!
//! Every write is stamped inside the store, never by the caller. Stamps are
//! strictly increasing per store so documents written in sequence always
//! sort in write order, even when the wall clock stalls or steps back.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

#[derive(Debug, Default)]
pub struct ServerClock {
    last_micros: Mutex<i64>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp, at least one microsecond after the previous one.
    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let mut last = match self.last_micros.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = if wall > *last { wall } else { *last + 1 };
        *last = next;
        from_micros(next)
    }
}

/// Convert stored microseconds back to a timestamp, saturating on overflow.
pub fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
