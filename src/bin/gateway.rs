//! Example entry point wiring the library against the pure-software
//! `FakeRadioPort` test double (§9 design note 1) — a real deployment
//! supplies its own Radio Port implementation against a modem driver.

use std::sync::Arc;

use semtech_packet_forwarder::clock::SystemTimeSource;
use semtech_packet_forwarder::config::GatewayConfig;
use semtech_packet_forwarder::radio_port::testing::FakeRadioPort;
use semtech_packet_forwarder::Gateway;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "gateway".to_string());
    let config = GatewayConfig::load(&config_path)?;

    let clock = Arc::new(SystemTimeSource::new());
    let (gateway, mut events) = Gateway::new(config.clone(), clock);

    for channel in &config.channels {
        let port = Box::new(FakeRadioPort::new(channel.defaults));
        gateway.bind_channel(channel.channel, port).await?;
    }

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::info!(?event, "gateway event");
        }
    });

    tokio::select! {
        _ = gateway.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("ctrl-c received, shutting down");
            gateway.shutdown();
        }
    }

    Ok(())
}
