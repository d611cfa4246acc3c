use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Error};
use log::{info, warn};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::uart::{Parity, Uart};

use crate::config::Config;
use crate::hardware::{write_all, ByteSource, CommandPort, ConnectLine, LinkSignals, Sink};

pub struct PiSignals {
    joined: InputPin,
    connected: InputPin,
}

impl LinkSignals for PiSignals {
    fn joined(&self) -> bool {
        self.joined.is_high()
    }

    fn connected(&self) -> bool {
        self.connected.is_high()
    }
}

impl ConnectLine for OutputPin {
    fn set_connect(&mut self, high: bool) {
        match high {
            true => self.set_high(),
            false => self.set_low(),
        }
    }

    fn is_connect_high(&self) -> bool {
        self.is_set_high()
    }
}

/// The radio UART. Commands go out and payload bytes come in on the same
/// port, so the control loop and the relay thread share it.
#[derive(Clone)]
pub struct SharedUart(Arc<Mutex<Uart>>);

impl SharedUart {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Uart>, Error> {
        self.0.lock().map_err(|_| anyhow!("radio UART lock poisoned"))
    }
}

impl CommandPort for SharedUart {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut uart = self.lock()?;
        write_all(bytes, |chunk| uart.write(chunk))
    }
}

impl ByteSource for SharedUart {
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        let mut uart = self.lock().ok()?;

        match uart.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            Ok(_) => None,
            Err(e) => {
                warn!("Radio: read failed: {}", e);
                None
            }
        }
    }
}

/// Companion serial link used for status text and relayed bytes.
pub struct UartSink(Mutex<Uart>);

impl Sink for UartSink {
    fn transmit(&self, bytes: &[u8]) {
        let Ok(mut uart) = self.0.lock() else {
            warn!("Sink: lock poisoned, dropping {} bytes", bytes.len());
            return;
        };

        if let Err(e) = write_all(bytes, |chunk| uart.write(chunk)) {
            warn!("Sink: write failed: {}", e);
        }
    }
}

pub struct PiRadio {
    pub signals: PiSignals,
    pub connect_line: OutputPin,
    pub uart: SharedUart,
    pub sink: Arc<UartSink>,
}

impl PiRadio {
    pub fn open(config: &Config) -> Result<Self, Error> {
        let gpio = Gpio::new()?;
        let pins = &config.pins;

        info!(
            "Radio: joined on GPIO {}, connected on GPIO {}, connect on GPIO {}",
            pins.joined.bcm(),
            pins.connected.bcm(),
            pins.connect.bcm()
        );

        let signals = PiSignals {
            joined: gpio.get(pins.joined.bcm())?.into_input(),
            connected: gpio.get(pins.connected.bcm())?.into_input(),
        };
        // No host session until the supervisor asks for one
        let connect_line = gpio.get(pins.connect.bcm())?.into_output_low();

        let serial = &config.serial;
        let mut uart = Uart::with_path(&serial.radio_path, serial.radio_baud, Parity::None, 8, 1)
            .with_context(|| format!("opening radio UART {}", serial.radio_path))?;
        uart.set_read_mode(0, Duration::ZERO)?;
        uart.set_write_mode(true)?;

        let mut sink = Uart::with_path(&serial.sink_path, serial.sink_baud, Parity::None, 8, 1)
            .with_context(|| format!("opening sink UART {}", serial.sink_path))?;
        sink.set_write_mode(true)?;

        Ok(Self {
            signals,
            connect_line,
            uart: SharedUart(Arc::new(Mutex::new(uart))),
            sink: Arc::new(UartSink(Mutex::new(sink))),
        })
    }
}
