use std::time::Duration;

use anyhow::Error;
use log::debug;

use crate::config::{ProvisioningMode, RadioProfile, TimingBudget};
use crate::hardware::{Clock, CommandPort};

/// Sent without a terminator; the radio needs a quiet period either side.
const ENTER_COMMAND_MODE: &str = "$$$";
const EXIT_COMMAND_MODE: &str = "exit";

/// Writes paced command sequences to the radio.
///
/// The radio acknowledges nothing we parse, so every command is followed by
/// a fixed delay long enough for its command parser to settle.
pub struct ConfigSender<P, C> {
    port: P,
    clock: C,
    profile: RadioProfile,
    timing: TimingBudget,
}

impl<P: CommandPort, C: Clock> ConfigSender<P, C> {
    pub fn new(port: P, clock: C, profile: RadioProfile, timing: TimingBudget) -> Self {
        Self {
            port,
            clock,
            profile,
            timing,
        }
    }

    pub fn profile(&self) -> &RadioProfile {
        &self.profile
    }

    pub fn provision(&mut self, mode: ProvisioningMode) -> Result<(), Error> {
        match mode {
            ProvisioningMode::Full => self.send_full_provisioning(),
            ProvisioningMode::Reload => {
                let profile_name = self.profile.profile_name.clone();
                self.send_fast_reload(&profile_name)
            }
        }
    }

    pub fn send_full_provisioning(&mut self) -> Result<(), Error> {
        debug!("Radio: sending full provisioning");
        let short = self.timing.command_delay();
        let settle = self.timing.settle_delay();

        self.enter_command_mode()?;

        let profile = &self.profile;
        let commands = [
            (format!("set com remote {}", profile.host.remote_peer), short),
            ("set ip dhcp 1".to_string(), short),
            (format!("set ip host {}", profile.host.address), short),
            (format!("set ip remote {}", profile.host.port), short),
            (format!("set wlan ssid {}", profile.credentials.ssid), settle),
            (
                format!("set wlan phrase {}", profile.credentials.passphrase),
                settle,
            ),
            ("set wlan join 1".to_string(), short),
            ("set wlan channel 0".to_string(), short),
            (format!("set opt jointmr {}", profile.join_timer_ms), short),
            (format!("set sys iofunc 0x{:x}", profile.io_function), short),
            (format!("set uart baud {}", profile.uart_baud), short),
            (format!("set wlan rate {}", profile.data_rate), short),
            (format!("set comm match {}", profile.command_match), short),
            ("open".to_string(), short),
        ];

        for (command, delay) in commands {
            self.send_command(&command, delay)?;
        }

        Ok(())
    }

    pub fn send_fast_reload(&mut self, profile_name: &str) -> Result<(), Error> {
        debug!("Radio: reloading saved profile {}", profile_name);
        self.enter_command_mode()?;
        self.send_command(&format!("load {}", profile_name), self.timing.settle_delay())?;
        self.write_line(EXIT_COMMAND_MODE)
    }

    /// Resend only the network credentials, the smallest change that makes
    /// the radio retry association.
    pub fn send_credentials_nudge(&mut self) -> Result<(), Error> {
        let settle = self.timing.settle_delay();
        let ssid = format!("set wlan ssid {}", self.profile.credentials.ssid);
        let phrase = format!("set wlan phrase {}", self.profile.credentials.passphrase);

        self.enter_command_mode()?;
        self.send_command(&ssid, settle)?;
        self.send_command(&phrase, settle)?;
        self.write_line(EXIT_COMMAND_MODE)
    }

    /// Reset the remote peer string and host address before reopening.
    pub fn send_host_reset(&mut self) -> Result<(), Error> {
        let short = self.timing.command_delay();
        let host = &self.profile.host;
        let commands = [
            format!("set com remote {}", host.remote_peer),
            format!("set ip host {}", host.address),
            format!("set ip remote {}", host.port),
        ];

        self.enter_command_mode()?;
        for command in &commands {
            self.send_command(command, short)?;
        }
        self.send_command(EXIT_COMMAND_MODE, short)
    }

    pub fn send_ping(&mut self, path: &str) -> Result<(), Error> {
        self.transmit(&format!("GET {}\r\n", path))
    }

    /// Raw write on the command channel, no terminator or pacing added.
    pub fn transmit(&mut self, text: &str) -> Result<(), Error> {
        self.port.write_bytes(text.as_bytes())
    }

    fn enter_command_mode(&mut self) -> Result<(), Error> {
        let delay = self.timing.command_delay();

        self.clock.sleep(delay);
        self.port.write_bytes(ENTER_COMMAND_MODE.as_bytes())?;
        self.clock.sleep(delay);
        self.port.write_bytes(b"\r")?;
        self.clock.sleep(delay);

        Ok(())
    }

    fn send_command(&mut self, command: &str, delay: Duration) -> Result<(), Error> {
        self.write_line(command)?;
        self.clock.sleep(delay);
        Ok(())
    }

    fn write_line(&mut self, command: &str) -> Result<(), Error> {
        debug!("Radio: > {}", command);
        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        line.push('\r');
        self.port.write_bytes(line.as_bytes())
    }
}
