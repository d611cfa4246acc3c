use std::time::Duration;

use log::{error, info, warn};

use crate::config::MonitorPolicy;
use crate::hardware::{Clock, CommandPort, ConnectLine, LinkSignals, Sink};
use crate::supervisor::{PhaseOutcome, ReconnectSupervisor};

pub const NETWORK_TIMED_OUT: &str = "------| Network Timed Out |------\n";
pub const CONNECTION_TIMED_OUT: &str = "------| Connection Timed Out |------\n";
pub const TIMEOUT_RELEASED: &str = "------| Timeout Released |------\n";

/// Where the monitor is within an outage.
///
/// The debounce timer lives inside `Debouncing`, so there is never more than
/// one running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutageEpisode {
    Idle,
    Debouncing { since: Duration },
    /// Too many escalations in a row failed. Outages are ignored until the
    /// link is seen up again or the monitor is reset.
    Abandoned,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EscalationReport {
    pub join: Option<PhaseOutcome>,
    pub connect: Option<PhaseOutcome>,
}

impl EscalationReport {
    /// Every phase that ran brought its signal back.
    pub fn recovered(&self) -> bool {
        self.join.map_or(true, |outcome| outcome.is_restored())
            && self.connect.map_or(true, |outcome| outcome.is_restored())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Stable,
    /// Link came back inside the debounce window.
    Recovered,
    OutageStarted,
    Debouncing { elapsed: Duration },
    Escalated(EscalationReport),
    /// Link is down but monitoring is switched off.
    Disabled,
    Abandoned,
}

/// Turns the two status lines into outage episodes and escalates into the
/// supervisor once an outage outlasts the debounce threshold.
pub struct LinkMonitor<S, O, P, C, K> {
    supervisor: ReconnectSupervisor<S, O, P, C>,
    sink: K,
    threshold: Duration,
    episode: OutageEpisode,
    enabled: bool,
    episode_limit: Option<u32>,
    failed_escalations: u32,
}

impl<S, O, P, C, K> LinkMonitor<S, O, P, C, K>
where
    S: LinkSignals,
    O: ConnectLine,
    P: CommandPort,
    C: Clock,
    K: Sink,
{
    pub fn new(
        supervisor: ReconnectSupervisor<S, O, P, C>,
        sink: K,
        threshold: Duration,
        policy: &MonitorPolicy,
    ) -> Self {
        Self {
            supervisor,
            sink,
            threshold,
            episode: OutageEpisode::Idle,
            enabled: policy.enabled,
            episode_limit: policy.episode_limit,
            failed_escalations: 0,
        }
    }

    pub fn episode(&self) -> OutageEpisode {
        self.episode
    }

    pub fn supervisor(&self) -> &ReconnectSupervisor<S, O, P, C> {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut ReconnectSupervisor<S, O, P, C> {
        &mut self.supervisor
    }

    /// Switch detection of new outage episodes on or off. An episode that is
    /// already debouncing runs its course.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Leave the abandoned state and start detecting outages again.
    pub fn reset(&mut self) {
        self.episode = OutageEpisode::Idle;
        self.failed_escalations = 0;
    }

    /// One tick of the state machine. Blocks for as long as an escalation
    /// takes.
    pub fn poll(&mut self) -> PollOutcome {
        let joined = self.supervisor.signals().joined();
        let connected = self.supervisor.signals().connected();
        let now = self.supervisor.clock().now();

        // A session request is meaningless without a join, debounced or not
        if !joined && self.supervisor.connect_requested() {
            info!("Link: join lost, withdrawing connect request");
            self.supervisor.disconnect_host();
        }

        match (joined && connected, self.episode) {
            (true, OutageEpisode::Debouncing { since }) => {
                info!(
                    "Link: recovered after {:?} without intervention",
                    now.saturating_sub(since)
                );
                self.episode = OutageEpisode::Idle;
                PollOutcome::Recovered
            }
            (true, OutageEpisode::Abandoned) => {
                info!("Link: up again, resuming outage detection");
                self.reset();
                PollOutcome::Stable
            }
            (true, OutageEpisode::Idle) => PollOutcome::Stable,
            (false, OutageEpisode::Abandoned) => PollOutcome::Abandoned,
            (false, OutageEpisode::Idle) => {
                if !self.enabled {
                    return PollOutcome::Disabled;
                }

                info!(
                    "Link: outage detected (joined: {}, connected: {})",
                    joined, connected
                );
                self.episode = OutageEpisode::Debouncing { since: now };
                PollOutcome::OutageStarted
            }
            (false, OutageEpisode::Debouncing { since }) => {
                let elapsed = now.saturating_sub(since);
                if elapsed < self.threshold {
                    return PollOutcome::Debouncing { elapsed };
                }

                self.episode = OutageEpisode::Idle;
                let report = self.escalate(elapsed);
                self.record(report);
                PollOutcome::Escalated(report)
            }
        }
    }

    fn escalate(&mut self, elapsed: Duration) -> EscalationReport {
        warn!("Link: outage persisted for {:?}, escalating", elapsed);
        let mut report = EscalationReport::default();

        if !self.supervisor.signals().joined() {
            self.sink.transmit(NETWORK_TIMED_OUT.as_bytes());
            let outcome = self.supervisor.join();
            report.join = Some(outcome);

            if !outcome.is_restored() {
                return report;
            }
            self.sink.transmit(TIMEOUT_RELEASED.as_bytes());
        }

        if !self.supervisor.signals().connected() {
            self.sink.transmit(CONNECTION_TIMED_OUT.as_bytes());
            let outcome = self.supervisor.connect();
            report.connect = Some(outcome);

            if outcome.is_restored() {
                self.sink.transmit(TIMEOUT_RELEASED.as_bytes());
            }
        }

        report
    }

    fn record(&mut self, report: EscalationReport) {
        if report.recovered() {
            self.failed_escalations = 0;
            return;
        }

        self.failed_escalations += 1;
        warn!(
            "Link: escalation failed ({} in a row)",
            self.failed_escalations
        );

        if let Some(limit) = self.episode_limit {
            if self.failed_escalations >= limit {
                error!("Link: giving up after {} failed escalations", limit);
                self.episode = OutageEpisode::Abandoned;
            }
        }
    }
}
