//! Simulated radio used by the unit tests.
//!
//! Time only moves when something sleeps on the [`SimClock`], so every
//! busy-wait in the supervisor advances a virtual clock instead of real time.
//! Status lines are scripted as timed edges, or `connected` can be made to
//! follow the connect line after a fixed latency.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Error};

use crate::config::{Credentials, HostEndpoint, ProvisioningMode, RadioProfile};
use crate::hardware::{ByteSource, Clock, CommandPort, ConnectLine, LinkSignals, Sink};

pub fn test_profile() -> RadioProfile {
    RadioProfile {
        credentials: Credentials {
            ssid: "Warring$Turtles".to_string(),
            passphrase: "12345678".to_string(),
        },
        host: HostEndpoint {
            address: "206.189.66.241".to_string(),
            port: 5555,
            remote_peer: "0".to_string(),
        },
        uart_baud: 9600,
        data_rate: 14,
        command_match: 13,
        io_function: 0x70,
        join_timer_ms: 10_000,
        profile_name: "BetterNamePending".to_string(),
        provisioning: ProvisioningMode::Full,
    }
}

#[derive(Default)]
struct SimState {
    now: Duration,
    joined_edges: Vec<(Duration, bool)>,
    connected_edges: Vec<(Duration, bool)>,
    connect_latency: Option<Duration>,
    connect_high: bool,
    connect_high_since: Option<Duration>,
    connect_history: Vec<(Duration, bool)>,
    commands: Vec<(Duration, String)>,
    sink: Vec<u8>,
    inbound: VecDeque<u8>,
    fail_writes: bool,
}

impl SimState {
    fn level(edges: &[(Duration, bool)], now: Duration) -> bool {
        edges
            .iter()
            .take_while(|(at, _)| *at <= now)
            .last()
            .map(|(_, level)| *level)
            .unwrap_or(false)
    }

    fn joined(&self) -> bool {
        Self::level(&self.joined_edges, self.now)
    }

    fn connected(&self) -> bool {
        match self.connect_latency {
            Some(latency) => {
                self.joined()
                    && self
                        .connect_high_since
                        .is_some_and(|since| self.now >= since + latency)
            }
            None => Self::level(&self.connected_edges, self.now),
        }
    }
}

fn push_edge(edges: &mut Vec<(Duration, bool)>, at: Duration, level: bool) {
    edges.push((at, level));
    edges.sort_by_key(|(at, _)| *at);
}

#[derive(Clone, Default)]
pub struct SimRadio {
    state: Rc<RefCell<SimState>>,
}

impl SimRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// A radio that is joined and connected from time zero.
    pub fn healthy() -> Self {
        let radio = Self::new();
        radio.set_joined_at(Duration::ZERO, true);
        radio.set_connected_at(Duration::ZERO, true);
        radio
    }

    pub fn set_joined_at(&self, at: Duration, level: bool) {
        push_edge(&mut self.state.borrow_mut().joined_edges, at, level);
    }

    pub fn set_connected_at(&self, at: Duration, level: bool) {
        push_edge(&mut self.state.borrow_mut().connected_edges, at, level);
    }

    /// Make `connected` rise `latency` after the connect line goes high,
    /// provided the radio is joined. Overrides scripted `connected` edges.
    pub fn connect_follows_line(&self, latency: Duration) {
        self.state.borrow_mut().connect_latency = Some(latency);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }

    pub fn push_inbound(&self, bytes: &[u8]) {
        self.state.borrow_mut().inbound.extend(bytes.iter().copied());
    }

    pub fn advance(&self, duration: Duration) {
        self.state.borrow_mut().now += duration;
    }

    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    pub fn commands(&self) -> Vec<String> {
        self.state
            .borrow()
            .commands
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn command_log(&self) -> Vec<(Duration, String)> {
        self.state.borrow().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.state.borrow_mut().commands.clear();
    }

    pub fn sink_bytes(&self) -> Vec<u8> {
        self.state.borrow().sink.clone()
    }

    pub fn sink_text(&self) -> String {
        String::from_utf8_lossy(&self.state.borrow().sink).into_owned()
    }

    pub fn connect_high(&self) -> bool {
        self.state.borrow().connect_high
    }

    pub fn connect_history(&self) -> Vec<(Duration, bool)> {
        self.state.borrow().connect_history.clone()
    }

    pub fn clock(&self) -> SimClock {
        SimClock(self.clone())
    }

    pub fn signals(&self) -> SimSignals {
        SimSignals(self.clone())
    }

    pub fn connect_line(&self) -> SimConnectLine {
        SimConnectLine(self.clone())
    }

    pub fn command_port(&self) -> SimCommandPort {
        SimCommandPort(self.clone())
    }

    pub fn sink(&self) -> SimSink {
        SimSink(self.clone())
    }

    pub fn source(&self) -> SimSource {
        SimSource(self.clone())
    }
}

#[derive(Clone)]
pub struct SimClock(SimRadio);

impl Clock for SimClock {
    fn now(&self) -> Duration {
        self.0.now()
    }

    fn sleep(&self, duration: Duration) {
        self.0.advance(duration);
    }
}

pub struct SimSignals(SimRadio);

impl LinkSignals for SimSignals {
    fn joined(&self) -> bool {
        self.0.state.borrow().joined()
    }

    fn connected(&self) -> bool {
        self.0.state.borrow().connected()
    }
}

pub struct SimConnectLine(SimRadio);

impl ConnectLine for SimConnectLine {
    fn set_connect(&mut self, high: bool) {
        let mut state = self.0.state.borrow_mut();
        let now = state.now;

        if high && !state.connect_high {
            state.connect_high_since = Some(now);
        } else if !high {
            state.connect_high_since = None;
        }

        state.connect_high = high;
        state.connect_history.push((now, high));
    }

    fn is_connect_high(&self) -> bool {
        self.0.state.borrow().connect_high
    }
}

pub struct SimCommandPort(SimRadio);

impl CommandPort for SimCommandPort {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut state = self.0.state.borrow_mut();
        if state.fail_writes {
            bail!("simulated serial write failure");
        }

        let now = state.now;
        state
            .commands
            .push((now, String::from_utf8_lossy(bytes).into_owned()));
        Ok(())
    }
}

pub struct SimSink(SimRadio);

impl Sink for SimSink {
    fn transmit(&self, bytes: &[u8]) {
        self.0.state.borrow_mut().sink.extend_from_slice(bytes);
    }
}

pub struct SimSource(SimRadio);

impl ByteSource for SimSource {
    fn read_byte(&mut self) -> Option<u8> {
        self.0.state.borrow_mut().inbound.pop_front()
    }
}
