use log::{error, info, warn};

use crate::command::ConfigSender;
use crate::config::{ProvisioningMode, TimingBudget};
use crate::hardware::{wait_for, Clock, CommandPort, ConnectLine, LinkSignals};

/// Upper bound on attempts within one join or connect phase.
pub const MAX_ATTEMPTS: u8 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// The signal came up during attempt number `attempts` (1-based).
    Restored { attempts: u8 },
    /// Every attempt timed out. The connect line has been withdrawn.
    Exhausted { attempts: u8 },
    /// `connect` was asked to run while the radio was not joined.
    NotJoined,
}

impl PhaseOutcome {
    pub fn is_restored(&self) -> bool {
        matches!(self, PhaseOutcome::Restored { .. })
    }
}

/// Bounded-retry recovery of the join and the host session.
///
/// Owns the connect line; nothing else in the crate drives it.
pub struct ReconnectSupervisor<S, O, P, C> {
    signals: S,
    connect_line: O,
    sender: ConfigSender<P, C>,
    clock: C,
    timing: TimingBudget,
}

impl<S, O, P, C> ReconnectSupervisor<S, O, P, C>
where
    S: LinkSignals,
    O: ConnectLine,
    P: CommandPort,
    C: Clock,
{
    pub fn new(
        signals: S,
        connect_line: O,
        sender: ConfigSender<P, C>,
        clock: C,
        timing: TimingBudget,
    ) -> Self {
        Self {
            signals,
            connect_line,
            sender,
            clock,
            timing,
        }
    }

    pub fn signals(&self) -> &S {
        &self.signals
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn connect_requested(&self) -> bool {
        self.connect_line.is_connect_high()
    }

    /// Boot-time configuration of the radio.
    pub fn provision(&mut self, mode: ProvisioningMode) -> Result<(), anyhow::Error> {
        self.sender.provision(mode)
    }

    /// Wait for the radio to associate, nudging it with its credentials
    /// between waits.
    pub fn join(&mut self) -> PhaseOutcome {
        let window = self.timing.join_window();
        let mut attempt = 0;

        loop {
            self.connect_line.set_connect(false);

            if attempt >= MAX_ATTEMPTS {
                self.disconnect_host();
                error!("Radio: join failed after {} attempts", attempt);
                return PhaseOutcome::Exhausted { attempts: attempt };
            }
            attempt += 1;

            if self.wait_joined(window) {
                info!("Radio: joined on attempt {}", attempt);
                return PhaseOutcome::Restored { attempts: attempt };
            }

            warn!("Radio: join attempt {} timed out, resending credentials", attempt);
            if let Err(e) = self.sender.send_credentials_nudge() {
                warn!("Radio: failed to resend credentials: {}", e);
            }

            if self.wait_joined(window) {
                info!("Radio: joined on attempt {}", attempt);
                return PhaseOutcome::Restored { attempts: attempt };
            }
        }
    }

    /// Raise the connect line and wait for the host session, resetting the
    /// host settings between waits.
    pub fn connect(&mut self) -> PhaseOutcome {
        let mut attempt = 0;

        loop {
            if !self.signals.joined() {
                self.connect_line.set_connect(false);
                warn!("Radio: cannot open a host session while unjoined");
                return PhaseOutcome::NotJoined;
            }

            if attempt >= MAX_ATTEMPTS {
                self.disconnect_host();
                error!("Radio: host connection failed after {} attempts", attempt);
                return PhaseOutcome::Exhausted { attempts: attempt };
            }
            attempt += 1;

            self.connect_line.set_connect(true);
            if self.wait_connected(self.timing.connect_window()) {
                info!("Radio: connected on attempt {}", attempt);
                return PhaseOutcome::Restored { attempts: attempt };
            }

            self.connect_line.set_connect(false);
            if !self.signals.joined() {
                continue;
            }

            warn!("Radio: connect attempt {} timed out, resetting host", attempt);
            if let Err(e) = self.sender.send_host_reset() {
                warn!("Radio: failed to reset host settings: {}", e);
            }
            if !self.signals.joined() {
                continue;
            }
            self.connect_line.set_connect(true);

            if self.wait_connected(self.timing.connect_retry_window()) {
                info!("Radio: connected on attempt {}", attempt);
                return PhaseOutcome::Restored { attempts: attempt };
            }
        }
    }

    /// Withdraw the connect request. Returns whether the host session is
    /// already down.
    pub fn disconnect_host(&mut self) -> bool {
        self.connect_line.set_connect(false);
        !self.signals.connected()
    }

    /// Send a liveness request to the host. Returns `false` without sending
    /// anything when there is no host session.
    pub fn ping(&mut self, path: &str) -> Result<bool, anyhow::Error> {
        if !self.signals.connected() {
            return Ok(false);
        }

        self.sender.send_ping(path)?;
        Ok(true)
    }

    pub fn transmit(&mut self, text: &str) -> Result<(), anyhow::Error> {
        self.sender.transmit(text)
    }

    fn wait_joined(&self, window: std::time::Duration) -> bool {
        let signals = &self.signals;
        wait_for(&self.clock, window, self.timing.poll_interval(), || {
            signals.joined()
        })
    }

    /// Gives up early if the join drops, since no session can open then.
    fn wait_connected(&self, window: std::time::Duration) -> bool {
        let signals = &self.signals;
        wait_for(&self.clock, window, self.timing.poll_interval(), || {
            signals.connected() || !signals.joined()
        }) && signals.connected()
    }
}
