use std::time::Duration;

use anyhow::{Context, Error};
use pi_pinout::{GpioPin, PhysicalPin, WiringPiPin};
use serde::{Deserialize, Serialize};

pub const CONFIG_PATH: &str = "config.ron";

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct Config {
    pub radio: RadioProfile,
    #[serde(default)]
    pub timing: TimingBudget,
    pub pins: Pins,
    #[serde(default)]
    pub serial: SerialPorts,
    #[serde(default)]
    pub monitor: MonitorPolicy,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Credentials {
    pub ssid: String,
    pub passphrase: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct HostEndpoint {
    pub address: String,
    pub port: u16,
    /// Value for `set com remote`, the string the radio sends to a peer on
    /// session open.
    #[serde(default = "HostEndpoint::default_remote_peer")]
    pub remote_peer: String,
}

impl HostEndpoint {
    fn default_remote_peer() -> String {
        "0".to_string()
    }
}

/// Everything the radio needs to be told during provisioning.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RadioProfile {
    pub credentials: Credentials,
    pub host: HostEndpoint,
    #[serde(default = "RadioProfile::default_uart_baud")]
    pub uart_baud: u32,
    #[serde(default = "RadioProfile::default_data_rate")]
    pub data_rate: u8,
    /// ASCII code of the character that flushes a packet (`set comm match`).
    #[serde(default = "RadioProfile::default_command_match")]
    pub command_match: u8,
    #[serde(default = "RadioProfile::default_io_function")]
    pub io_function: u8,
    #[serde(default = "RadioProfile::default_join_timer_ms")]
    pub join_timer_ms: u32,
    pub profile_name: String,
    #[serde(default)]
    pub provisioning: ProvisioningMode,
}

impl RadioProfile {
    fn default_uart_baud() -> u32 {
        9600
    }

    fn default_data_rate() -> u8 {
        12
    }

    fn default_command_match() -> u8 {
        b'\r'
    }

    fn default_io_function() -> u8 {
        0x70
    }

    fn default_join_timer_ms() -> u32 {
        10_000
    }
}

/// How the radio is configured at boot.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum ProvisioningMode {
    /// Send every setting explicitly.
    Full,
    /// Load the saved profile named in `profile_name`.
    #[default]
    Reload,
}

/// Delays and wait windows, all in milliseconds.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimingBudget {
    pub command_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub join_window_ms: u64,
    pub connect_window_ms: u64,
    pub connect_retry_window_ms: u64,
    pub outage_threshold_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for TimingBudget {
    fn default() -> Self {
        Self {
            command_delay_ms: 350,
            settle_delay_ms: 1_000,
            join_window_ms: 5_000,
            connect_window_ms: 3_000,
            connect_retry_window_ms: 5_000,
            outage_threshold_ms: 1_500,
            poll_interval_ms: 1,
        }
    }
}

impl TimingBudget {
    pub fn command_delay(&self) -> Duration {
        Duration::from_millis(self.command_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn join_window(&self) -> Duration {
        Duration::from_millis(self.join_window_ms)
    }

    pub fn connect_window(&self) -> Duration {
        Duration::from_millis(self.connect_window_ms)
    }

    pub fn connect_retry_window(&self) -> Duration {
        Duration::from_millis(self.connect_retry_window_ms)
    }

    pub fn outage_threshold(&self) -> Duration {
        Duration::from_millis(self.outage_threshold_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct Pins {
    pub joined: Pin,
    pub connected: Pin,
    pub connect: Pin,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub enum Pin {
    Physical(PhysicalPin),
    Gpio(GpioPin),
    WiringPi(WiringPiPin),
}

impl Pin {
    /// BCM GPIO number, which is what `rppal` addresses pins by.
    pub fn bcm(&self) -> u8 {
        let pin: GpioPin = match *self {
            Pin::Physical(pin) => pin.into(),
            Pin::Gpio(pin) => pin,
            Pin::WiringPi(pin) => pin.into(),
        };

        pin.0
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SerialPorts {
    pub radio_path: String,
    pub radio_baud: u32,
    pub sink_path: String,
    pub sink_baud: u32,
}

impl Default for SerialPorts {
    fn default() -> Self {
        Self {
            radio_path: "/dev/serial0".to_string(),
            radio_baud: 38_400,
            sink_path: "/dev/ttyAMA1".to_string(),
            sink_baud: 9_600,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonitorPolicy {
    /// Delay between two polls of the link monitor.
    pub tick_ms: u64,
    /// Whether new outage episodes are detected at all.
    pub enabled: bool,
    /// Consecutive failed escalations after which the monitor gives up.
    /// `None` retries forever.
    pub episode_limit: Option<u32>,
    /// Initial state of the relay's output-enable flag.
    pub relay_output: bool,
}

impl Default for MonitorPolicy {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            enabled: true,
            episode_limit: None,
            relay_output: false,
        }
    }
}

impl MonitorPolicy {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Config {
    pub fn load() -> Result<Config, Error> {
        let config = std::fs::read_to_string(CONFIG_PATH)
            .with_context(|| format!("reading {}", CONFIG_PATH))?;
        Self::from_ron(&config)
    }

    pub fn from_ron(source: &str) -> Result<Config, Error> {
        let config: Config = ron::from_str(source).context("parsing radio config")?;
        Ok(config)
    }
}
