use anyhow::Error;
use log::info;
use wifly_link::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    info!("Starting config...");
    let config = Config::load()?;

    run(config).await
}

#[cfg(feature = "pi")]
async fn run(config: Config) -> Result<(), Error> {
    use std::sync::Arc;
    use std::time::Duration;

    use log::{error, warn};
    use tokio::signal::unix::{signal, SignalKind};
    use tokio::sync::watch;
    use wifly_link::pi::PiRadio;

    info!("Starting radio...");
    let radio = PiRadio::open(&config)?;
    let clock = SystemClock::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Relay first so nothing the radio says during provisioning is lost
    info!("Starting relay...");
    let relay = Arc::new(ByteRelay::new(
        radio.sink.clone(),
        config.monitor.relay_output,
    ));
    let dispatcher = RelayDispatcher::register(
        relay.clone(),
        radio.uart.clone(),
        Duration::from_millis(1),
        shutdown_rx.clone(),
    );

    let sender = ConfigSender::new(
        radio.uart.clone(),
        clock,
        config.radio.clone(),
        config.timing.clone(),
    );
    let mut supervisor = ReconnectSupervisor::new(
        radio.signals,
        radio.connect_line,
        sender,
        clock,
        config.timing.clone(),
    );

    info!("Provisioning radio ({:?})...", config.radio.provisioning);
    supervisor.provision(config.radio.provisioning)?;

    let mut monitor = LinkMonitor::new(
        supervisor,
        radio.sink,
        config.timing.outage_threshold(),
        &config.monitor,
    );

    info!("Starting link monitor...");
    let tick = config.monitor.tick();
    let monitor_handle = tokio::task::spawn_blocking(move || {
        if !monitor.supervisor_mut().join().is_restored() {
            warn!("Radio: not joined after provisioning, leaving it to the monitor");
        } else if !monitor.supervisor_mut().connect().is_restored() {
            warn!("Radio: no host session after provisioning, leaving it to the monitor");
        }

        while !*shutdown_rx.borrow() {
            monitor.poll();
            std::thread::sleep(tick);
        }
    });

    // SIGUSR1 flips whether inbound radio bytes reach the sink
    let mut toggle = signal(SignalKind::user_defined1())?;
    loop {
        tokio::select! {
            _ = toggle.recv() => {
                let enabled = !relay.output_enabled();
                relay.set_output_enabled(enabled);
                info!("Relay: output {}", if enabled { "enabled" } else { "disabled" });
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    info!("Shutting down...");
    shutdown_tx.send_replace(true);

    let (monitor_result, relay_result) = tokio::join!(monitor_handle, dispatcher.join());
    if let Err(e) = monitor_result {
        error!("Link monitor stopped abnormally: {}", e);
    }
    if let Err(e) = relay_result {
        error!("Relay stopped abnormally: {}", e);
    }

    Ok(())
}

#[cfg(not(feature = "pi"))]
async fn run(config: Config) -> Result<(), Error> {
    info!(
        "Loaded profile {} for {}:{}",
        config.radio.profile_name, config.radio.host.address, config.radio.host.port
    );
    anyhow::bail!("radio hardware is only available with the `pi` feature")
}
