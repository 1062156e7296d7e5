use std::time::{SystemTime, UNIX_EPOCH};

/// A source of wall-clock time, measured in whole seconds since the UNIX
/// epoch.
pub trait TimeSinceEpoch: Send + Sync + 'static {
    /// Returns the number of seconds since the UNIX epoch.
    fn since_epoch(&self) -> u64;
}

/// Implementation of [`TimeSinceEpoch`] that uses the system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentTime;

impl TimeSinceEpoch for CurrentTime {
    fn since_epoch(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Current time must be after UNIX epoch")
            .as_secs()
    }
}
