//! Modbus SCADA Demo
//!
//! Runs the water level automation against a Modbus TCP device, or against
//! an in-process device that acknowledges every write when no address is
//! given. Prints the level and its alarm state once per second.
//!
//! Usage: cargo run --bin demo [device_address] [seconds]
//! Example: cargo run --bin demo 127.0.0.1:502 30
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

use modbus_scada::{
    AutomationManager, AutomationTrigger, CommandDispatcher, Configuration, FrameTransport,
    MemoryStorage, ModbusResult, PointConfig, PointType, TcpFrameTransport, WaterLevelPoints,
};

/// Device stand-in: a Modbus TCP slave echoes single writes verbatim.
struct EchoDevice;

impl FrameTransport for EchoDevice {
    async fn exchange(&mut self, request: &[u8]) -> ModbusResult<Vec<u8>> {
        Ok(request.to_vec())
    }
}

fn water_level_points() -> Vec<PointConfig> {
    vec![
        PointConfig::new(PointType::AnalogOutput, 1000)
            .with_description("Water level (l)")
            .with_egu_range(0.0, 12000.0)
            .with_limits(3000.0, 10500.0)
            .with_default_value(9000),
        PointConfig::new(PointType::DigitalOutput, 2000)
            .with_description("Stop")
            .with_abnormal_value(1),
        PointConfig::new(PointType::DigitalOutput, 2002).with_description("Valve V1"),
        PointConfig::new(PointType::DigitalOutput, 2005)
            .with_description("Pump switch P1")
            .with_default_value(1),
        PointConfig::new(PointType::DigitalOutput, 2006).with_description("Pump switch P2"),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{}", modbus_scada::info());

    let mut args = std::env::args().skip(1);
    let device: Option<SocketAddr> = args.next().map(|a| a.parse()).transpose()?;
    let seconds: u64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(15);

    let configuration = Arc::new(Configuration::new());
    let storage = Arc::new(MemoryStorage::new(water_level_points()));
    let (dispatcher, queue) = CommandDispatcher::new();
    let stats = dispatcher.stats();

    let dispatcher_task = match device {
        Some(address) => {
            let timeout = Duration::from_millis(configuration.timeout_ms);
            let transport = TcpFrameTransport::connect(address, timeout).await?;
            tokio::spawn(queue.run(transport, Arc::clone(&storage)))
        }
        None => {
            info!("No device address given, using in-process echo device");
            tokio::spawn(queue.run(EchoDevice, Arc::clone(&storage)))
        }
    };

    let mut automation = AutomationManager::new(
        Arc::clone(&storage),
        Arc::new(dispatcher),
        AutomationTrigger::new(),
        Arc::clone(&configuration),
    );
    automation.start(configuration.delay_between_commands)?;

    for _ in 0..seconds {
        tokio::select! {
            _ = sleep(Duration::from_secs(1)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
        if let Some(level) = storage.get_point(WaterLevelPoints::LEVEL) {
            info!(
                level = level.egu_value,
                alarm = %level.alarm,
                "Level at {}",
                level.timestamp.format("%H:%M:%S")
            );
        }
    }

    automation.stop().await;
    info!(cycles = automation.cycles_completed(), "Automation stopped");
    drop(automation);
    dispatcher_task.await?;

    info!(
        submitted = stats.submitted(),
        completed = stats.completed(),
        failed = stats.failed(),
        "Dispatcher summary"
    );
    Ok(())
}
