use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Error;
use log::info;
use tokio::sync::watch;
use tokio::task::{self, JoinHandle};

use crate::hardware::{ByteSource, Sink};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    Forwarded(u8),
    Discarded(u8),
    /// The event fired but no byte was readable.
    Idle,
}

/// Forwards single inbound radio bytes to the sink while output is enabled.
///
/// `on_byte_available` is what the byte-ready event calls. It reads at most
/// one byte and does constant work: no allocation, no loop, no waiting.
pub struct ByteRelay<K> {
    sink: K,
    output_enabled: AtomicBool,
}

impl<K: Sink> ByteRelay<K> {
    pub fn new(sink: K, output_enabled: bool) -> Self {
        Self {
            sink,
            output_enabled: AtomicBool::new(output_enabled),
        }
    }

    pub fn set_output_enabled(&self, enabled: bool) {
        self.output_enabled.store(enabled, Ordering::Release);
    }

    pub fn output_enabled(&self) -> bool {
        self.output_enabled.load(Ordering::Acquire)
    }

    pub fn on_byte_available<B: ByteSource + ?Sized>(&self, source: &mut B) -> RelayOutcome {
        let Some(byte) = source.read_byte() else {
            return RelayOutcome::Idle;
        };

        if self.output_enabled() {
            self.sink.transmit(&[byte]);
            RelayOutcome::Forwarded(byte)
        } else {
            RelayOutcome::Discarded(byte)
        }
    }
}

/// Runs a relay off byte-ready events on the blocking pool.
///
/// The relay is handed over explicitly at registration and kept alive by the
/// dispatcher, so the handler never has to find its state through a global.
pub struct RelayDispatcher {
    handle: JoinHandle<()>,
}

impl RelayDispatcher {
    /// `idle_backoff` is how long to sleep when the source had nothing to
    /// read. The loop exits once `true` is sent on `shutdown`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register<K, B>(
        relay: Arc<ByteRelay<K>>,
        mut source: B,
        idle_backoff: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self
    where
        K: Sink + Send + Sync + 'static,
        B: ByteSource + Send + 'static,
    {
        let handle = task::spawn_blocking(move || {
            info!("Relay: dispatcher started");
            while !*shutdown.borrow() {
                if relay.on_byte_available(&mut source) == RelayOutcome::Idle {
                    thread::sleep(idle_backoff);
                }
            }
            info!("Relay: dispatcher stopped");
        });

        Self { handle }
    }

    pub async fn join(self) -> Result<(), Error> {
        self.handle.await?;
        Ok(())
    }
}
