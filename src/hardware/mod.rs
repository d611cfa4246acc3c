use std::io::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Error;

/// The two status lines the radio drives. Read-only from our side.
pub trait LinkSignals {
    fn joined(&self) -> bool;
    fn connected(&self) -> bool;

    fn link_up(&self) -> bool {
        self.joined() && self.connected()
    }
}

/// The single output line used to request or withdraw a host session.
pub trait ConnectLine {
    fn set_connect(&mut self, high: bool);
    fn is_connect_high(&self) -> bool;
}

/// Text command channel to the radio.
pub trait CommandPort {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error>;
}

/// Byte-oriented inbound data channel. `None` when nothing is readable.
pub trait ByteSource {
    fn read_byte(&mut self) -> Option<u8>;
}

/// Companion output channel for status text and relayed bytes.
///
/// Called from the relay context as well as the control loop, so it takes
/// `&self` and implementations synchronise internally.
pub trait Sink {
    fn transmit(&self, bytes: &[u8]);
}

impl<T: Sink + ?Sized> Sink for Arc<T> {
    fn transmit(&self, bytes: &[u8]) {
        (**self).transmit(bytes)
    }
}

/// Monotonic time source plus a way to let time pass.
pub trait Clock: Clone {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Poll `condition` until it holds or `timeout` has elapsed on `clock`.
///
/// Returns whether the condition was observed true. The condition is checked
/// once more at the deadline so a signal that rises during the last poll
/// interval still counts.
pub fn wait_for<C, F>(clock: &C, timeout: Duration, poll_interval: Duration, mut condition: F) -> bool
where
    C: Clock,
    F: FnMut() -> bool,
{
    let start = clock.now();

    loop {
        if condition() {
            return true;
        }

        let elapsed = clock.now().saturating_sub(start);
        if elapsed >= timeout {
            return false;
        }

        clock.sleep(poll_interval.min(timeout - elapsed));
    }
}

/// Feed `bytes` through `write` until all of them are accepted.
///
/// Serial drivers may take only part of a buffer per call. A call that
/// accepts nothing is reported as `WriteZero` instead of looping forever.
pub fn write_all<F, E>(bytes: &[u8], mut write: F) -> Result<(), Error>
where
    F: FnMut(&[u8]) -> Result<usize, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut written = 0;

    while written < bytes.len() {
        match write(&bytes[written..])? {
            0 => return Err(std::io::Error::from(ErrorKind::WriteZero).into()),
            n => written += n,
        }
    }

    Ok(())
}
