//! Crate clock.
//!
//! Wall-clock reads go through this module so that tests can stop and
//! advance time. Production code uses the [`Working`] clock; the test builds
//! of this crate switch the crate-wide `CurrentClock` alias to [`Stopped`].
use std::cell::Cell;
use std::time::Duration;

use crate::primitives::DurationSinceUnixEpoch;

/// Clock interface: the current time and checked arithmetic around it.
pub trait Time: Sized {
    fn now() -> DurationSinceUnixEpoch;

    fn now_add(period: &Duration) -> Option<DurationSinceUnixEpoch> {
        Self::now().checked_add(*period)
    }

    fn now_sub(period: &Duration) -> Option<DurationSinceUnixEpoch> {
        Self::now().checked_sub(*period)
    }
}

/// The production clock, backed by the system time.
#[derive(Debug)]
pub struct Working;

impl Time for Working {
    fn now() -> DurationSinceUnixEpoch {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
    }
}

thread_local! {
    static STOPPED_TIME: Cell<DurationSinceUnixEpoch> = const { Cell::new(Duration::ZERO) };
}

/// A stopped clock for tests. Time only moves when the test moves it.
///
/// The stopped time is thread-local, so parallel tests do not interfere with
/// each other.
#[derive(Debug)]
pub struct Stopped;

impl Time for Stopped {
    fn now() -> DurationSinceUnixEpoch {
        STOPPED_TIME.with(Cell::get)
    }
}

impl Stopped {
    /// Sets the local stopped time to a fixed value.
    pub fn local_set(time: &DurationSinceUnixEpoch) {
        STOPPED_TIME.with(|t| t.set(*time));
    }

    /// Advances the local stopped time by `period`.
    ///
    /// Returns the new time, or `None` on overflow.
    pub fn local_add(period: &Duration) -> Option<DurationSinceUnixEpoch> {
        STOPPED_TIME.with(|t| {
            let new_time = t.get().checked_add(*period)?;
            t.set(new_time);
            Some(new_time)
        })
    }
}
