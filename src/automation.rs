//! # Water Level Automation
//!
//! A cyclic worker that reads five fixed points, evaluates the water-level
//! rule table once per trigger, and issues corrective writes through a
//! [`ProcessingManager`].
//!
//! ## Rule table
//!
//! | Rule | Condition | Writes |
//! |------|-----------|--------|
//! | R1 | stop == 1 | P1 = 0, P2 = 0 |
//! | R2 | stop == 0 | V1 = 0 |
//! | R3-R6 | pump switch combination | level += 0 / 80 / 160 / 240 |
//! | R7 | level >= high limit | STOP = 1, V1 = 1, level -= 50 |
//! | R8 | valve == 1 and level > 6000 | level -= 50 |
//! | R9 | otherwise valve == 1 (level <= 6000) | V1 = 0 |
//! | R10 | level <= 6000 and valve == 1 | level -= 50 |
//!
//! Rules see the snapshot taken at the top of the cycle. Level, stop and
//! valve are tracked in locals that follow this cycle's own writes, so R8
//! through R10 observe what R3 to R7 emitted.
//!
//! ## Lifecycle
//!
//! ```text
//! start() -> [Evaluating] -> run_cycle -> [Idle] -- trigger --> [Evaluating]
//!                 ^                                                  |
//!                 +---------------- stop flag clear -----------------+
//!                                   stop flag set  -> Terminated
//! ```
//!
//! The trigger holds at most one pending signal, so ticks that arrive while
//! a cycle is running collapse into one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::dispatcher::ProcessingManager;
use crate::egu::EguConverter;
use crate::error::{ModbusError, ModbusResult};
use crate::point::{PointIdentifier, PointType};
use crate::storage::{PointSnapshot, Storage};

/// Level below which an open valve stops draining.
pub const DRAINAGE_LEVEL: i32 = 6000;

/// Outflow per cycle while draining.
pub const OUTFLOW: i32 = 50;

/// Inflow per cycle for (switch1, switch2).
const fn inflow(switch1: u16, switch2: u16) -> Option<i32> {
    match (switch1, switch2) {
        (0, 0) => Some(0),
        (0, 1) => Some(80),
        (1, 0) => Some(160),
        (1, 1) => Some(240),
        _ => None,
    }
}

/// The five points the rule table works on.
pub struct WaterLevelPoints;

impl WaterLevelPoints {
    /// Water level (analog output)
    pub const LEVEL: PointIdentifier = PointIdentifier::new(PointType::AnalogOutput, 1000);
    /// Emergency stop (digital output)
    pub const STOP: PointIdentifier = PointIdentifier::new(PointType::DigitalOutput, 2000);
    /// Drain valve V1 (digital output)
    pub const VALVE: PointIdentifier = PointIdentifier::new(PointType::DigitalOutput, 2002);
    /// Pump switch P1 (digital output)
    pub const SWITCH1: PointIdentifier = PointIdentifier::new(PointType::DigitalOutput, 2005);
    /// Pump switch P2 (digital output)
    pub const SWITCH2: PointIdentifier = PointIdentifier::new(PointType::DigitalOutput, 2006);

    /// All five, in the order a cycle reads them.
    pub const ALL: [PointIdentifier; 5] = [
        Self::LEVEL,
        Self::STOP,
        Self::VALVE,
        Self::SWITCH1,
        Self::SWITCH2,
    ];
}

/// Single-slot wake-up signal for the automation worker.
#[derive(Debug, Clone, Default)]
pub struct AutomationTrigger {
    notify: Arc<Notify>,
}

impl AutomationTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the worker. Signals sent before the worker waits are kept,
    /// but only one.
    pub fn fire(&self) {
        self.notify.notify_one();
    }

    /// Wait for the next signal.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Shared state of one automation engine, used by both the owner and the
/// spawned worker.
struct Engine<S: ?Sized, P: ?Sized> {
    storage: Arc<S>,
    processing: Arc<P>,
    configuration: Arc<Configuration>,
}

impl<S, P> Engine<S, P>
where
    S: Storage + ?Sized,
    P: ProcessingManager + ?Sized,
{
    fn write(&self, point: &PointSnapshot, value: i32) {
        self.processing.execute_write_command(
            Arc::clone(&point.config),
            self.configuration.get_transaction_id(),
            self.configuration.unit_address,
            point.id.address,
            value,
        );
    }

    fn run_cycle(&self) -> ModbusResult<()> {
        let points = self.storage.get_points(&WaterLevelPoints::ALL)?;
        let [level_point, stop_point, valve_point, switch1_point, switch2_point] =
            <[PointSnapshot; 5]>::try_from(points).map_err(|points| {
                ModbusError::invalid_data(format!(
                    "storage returned {} points, expected 5",
                    points.len()
                ))
            })?;

        let level_config = &level_point.config;
        let mut level = EguConverter::convert_to_egu(
            level_config.scale_factor,
            level_config.deviation,
            level_point.raw_value,
        ) as i32;
        let mut stop = stop_point.raw_value;
        let mut valve = valve_point.raw_value;
        let switch1 = switch1_point.raw_value;
        let switch2 = switch2_point.raw_value;

        debug!(level, stop, valve, switch1, switch2, "Automation cycle");

        if stop == 1 {
            self.write(&switch1_point, 0);
            self.write(&switch2_point, 0);
        }
        if stop == 0 {
            self.write(&valve_point, 0);
        }

        if let Some(flow) = inflow(switch1, switch2) {
            level = level.saturating_add(flow);
            self.write(&level_point, level);
        }

        if f64::from(level) >= level_config.high_limit {
            stop = 1;
            valve = 1;
            level = level.saturating_sub(OUTFLOW);
            info!(level, "Level reached high limit, draining");
            self.write(&stop_point, i32::from(stop));
            self.write(&valve_point, i32::from(valve));
            self.write(&level_point, level);
        }

        if valve == 1 && level > DRAINAGE_LEVEL {
            level = level.saturating_sub(OUTFLOW);
            self.write(&level_point, level);
        } else if valve == 1 && level <= DRAINAGE_LEVEL {
            valve = 0;
            info!(level, "Drainage level reached, closing valve");
            self.write(&valve_point, i32::from(valve));
        }

        // Only reachable when R8 took the level across the drainage line
        if level <= DRAINAGE_LEVEL && valve == 1 {
            level = level.saturating_sub(OUTFLOW);
            self.write(&level_point, level);
        }

        Ok(())
    }
}

/// Owner of the automation worker.
pub struct AutomationManager<S: ?Sized, P: ?Sized> {
    engine: Arc<Engine<S, P>>,
    trigger: AutomationTrigger,
    stop_requested: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl<S, P> AutomationManager<S, P>
where
    S: Storage + ?Sized + 'static,
    P: ProcessingManager + ?Sized + 'static,
{
    pub fn new(
        storage: Arc<S>,
        processing: Arc<P>,
        trigger: AutomationTrigger,
        configuration: Arc<Configuration>,
    ) -> Self {
        Self {
            engine: Arc::new(Engine {
                storage,
                processing,
                configuration,
            }),
            trigger,
            stop_requested: Arc::new(AtomicBool::new(false)),
            cycles: Arc::new(AtomicU64::new(0)),
            worker: None,
            ticker: None,
        }
    }

    /// Run one rule pass on the calling task.
    pub fn run_cycle(&self) -> ModbusResult<()> {
        self.engine.run_cycle()
    }

    /// Cycles completed by the worker.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Check if the worker is running
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }

    /// Trigger shared with the worker
    pub fn trigger(&self) -> &AutomationTrigger {
        &self.trigger
    }

    /// Start the worker. The first cycle runs immediately; later cycles run
    /// on each trigger signal. With a non-zero `cadence_secs` a ticker task
    /// fires the trigger at that period, otherwise the caller drives it.
    pub fn start(&mut self, cadence_secs: u64) -> ModbusResult<()> {
        if self.worker.is_some() {
            return Err(ModbusError::configuration("automation already started"));
        }
        self.stop_requested.store(false, Ordering::Release);

        let engine = Arc::clone(&self.engine);
        let trigger = self.trigger.clone();
        let stop_requested = Arc::clone(&self.stop_requested);
        let cycles = Arc::clone(&self.cycles);

        self.worker = Some(tokio::spawn(async move {
            info!("Automation worker started");
            while !stop_requested.load(Ordering::Acquire) {
                if let Err(e) = engine.run_cycle() {
                    warn!("Automation cycle skipped: {}", e);
                }
                cycles.fetch_add(1, Ordering::Relaxed);
                trigger.wait().await;
            }
            info!(
                cycles = cycles.load(Ordering::Relaxed),
                "Automation worker stopped"
            );
        }));

        if cadence_secs > 0 {
            let trigger = self.trigger.clone();
            self.ticker = Some(tokio::spawn(async move {
                let mut ticker = interval(Duration::from_secs(cadence_secs));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // First tick completes immediately
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    trigger.fire();
                }
            }));
        }

        info!(cadence_secs, "Automation started");
        Ok(())
    }

    /// Request termination and wait for the worker to finish its current
    /// cycle. Does nothing if the worker was never started.
    pub async fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.stop_requested.store(true, Ordering::Release);
        self.trigger.fire();
        if let Err(e) = worker.await {
            warn!("Automation worker ended abnormally: {}", e);
        }
    }
}

impl<S: ?Sized, P: ?Sized> Drop for AutomationManager<S, P> {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if self.worker.take().is_some() {
            self.stop_requested.store(true, Ordering::Release);
            self.trigger.fire();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PointConfig;
    use crate::point::PointValues;
    use crate::storage::MemoryStorage;
    use std::sync::Mutex;
    use tokio_test::assert_ok;

    #[derive(Default)]
    struct RecordingProcessing {
        writes: Mutex<Vec<(u16, u16, i32)>>,
    }

    impl RecordingProcessing {
        fn take(&self) -> Vec<(u16, u16, i32)> {
            std::mem::take(&mut *self.writes.lock().unwrap())
        }
    }

    impl ProcessingManager for RecordingProcessing {
        fn execute_write_command(
            &self,
            _config: Arc<PointConfig>,
            transaction_id: u16,
            _unit_address: u8,
            point_address: u16,
            value: i32,
        ) {
            self.writes
                .lock()
                .unwrap()
                .push((transaction_id, point_address, value));
        }
    }

    /// Storage whose reads always fail.
    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn get_points(&self, _ids: &[PointIdentifier]) -> ModbusResult<Vec<PointSnapshot>> {
            Err(ModbusError::connection("storage offline"))
        }

        fn update_points(&self, _values: &PointValues) -> usize {
            0
        }
    }

    fn storage(level: u16, stop: u16, valve: u16, switch1: u16, switch2: u16) -> MemoryStorage {
        MemoryStorage::new([
            PointConfig::new(PointType::AnalogOutput, 1000)
                .with_egu_range(0.0, 12000.0)
                .with_limits(3000.0, 10500.0)
                .with_default_value(level),
            PointConfig::new(PointType::DigitalOutput, 2000).with_default_value(stop),
            PointConfig::new(PointType::DigitalOutput, 2002).with_default_value(valve),
            PointConfig::new(PointType::DigitalOutput, 2005).with_default_value(switch1),
            PointConfig::new(PointType::DigitalOutput, 2006).with_default_value(switch2),
        ])
    }

    fn manager(
        storage: MemoryStorage,
    ) -> (
        AutomationManager<MemoryStorage, RecordingProcessing>,
        Arc<RecordingProcessing>,
    ) {
        let processing = Arc::new(RecordingProcessing::default());
        let manager = AutomationManager::new(
            Arc::new(storage),
            Arc::clone(&processing),
            AutomationTrigger::new(),
            Arc::new(Configuration::new()),
        );
        (manager, processing)
    }

    fn addresses_and_values(writes: Vec<(u16, u16, i32)>) -> Vec<(u16, i32)> {
        writes.into_iter().map(|(_, a, v)| (a, v)).collect()
    }

    #[test]
    fn test_single_pump_fills() {
        let (manager, processing) = manager(storage(1000, 0, 0, 1, 0));
        manager.run_cycle().unwrap();

        assert_eq!(
            addresses_and_values(processing.take()),
            vec![(2002, 0), (1000, 1160)]
        );
    }

    #[test]
    fn test_second_pump_fills() {
        let (manager, processing) = manager(storage(1000, 0, 0, 0, 1));
        manager.run_cycle().unwrap();

        assert_eq!(
            addresses_and_values(processing.take()),
            vec![(2002, 0), (1000, 1080)]
        );
    }

    #[test]
    fn test_unknown_switch_state_leaves_level_alone() {
        let (manager, processing) = manager(storage(1000, 0, 0, 2, 0));
        manager.run_cycle().unwrap();

        assert_eq!(addresses_and_values(processing.take()), vec![(2002, 0)]);
    }

    #[test]
    fn test_level_arithmetic_saturates() {
        // 65535 * 100000 does not fit in i32
        let storage = MemoryStorage::new([
            PointConfig::new(PointType::AnalogOutput, 1000)
                .with_scaling(100000.0, 0.0)
                .with_default_value(u16::MAX),
            PointConfig::new(PointType::DigitalOutput, 2000),
            PointConfig::new(PointType::DigitalOutput, 2002),
            PointConfig::new(PointType::DigitalOutput, 2005).with_default_value(1),
            PointConfig::new(PointType::DigitalOutput, 2006),
        ]);
        let (manager, processing) = manager(storage);
        manager.run_cycle().unwrap();

        assert_eq!(
            addresses_and_values(processing.take()),
            vec![(2002, 0), (1000, i32::MAX)]
        );
    }

    #[test]
    fn test_stop_turns_pumps_off() {
        let (manager, processing) = manager(storage(5000, 1, 0, 0, 0));
        manager.run_cycle().unwrap();

        assert_eq!(
            addresses_and_values(processing.take()),
            vec![(2005, 0), (2006, 0), (1000, 5000)]
        );
    }

    #[test]
    fn test_high_limit_crossing() {
        let (manager, processing) = manager(storage(10440, 0, 0, 1, 0));
        assert_ok!(manager.run_cycle());

        assert_eq!(
            addresses_and_values(processing.take()),
            vec![
                (2002, 0),
                (1000, 10600),
                (2000, 1),
                (2002, 1),
                (1000, 10550),
                (1000, 10500),
            ]
        );
    }

    #[test]
    fn test_valve_closes_at_drainage_level() {
        let (manager, processing) = manager(storage(6000, 1, 1, 0, 0));
        manager.run_cycle().unwrap();

        assert_eq!(
            addresses_and_values(processing.take()),
            vec![(2005, 0), (2006, 0), (1000, 6000), (2002, 0)]
        );
    }

    #[test]
    fn test_drain_across_threshold_drains_twice() {
        // R8 takes 6040 to 5990, then R10 drains again with the valve open
        let (manager, processing) = manager(storage(6040, 1, 1, 0, 0));
        manager.run_cycle().unwrap();

        assert_eq!(
            addresses_and_values(processing.take()),
            vec![(2005, 0), (2006, 0), (1000, 6040), (1000, 5990), (1000, 5940)]
        );
    }

    #[test]
    fn test_transaction_ids_increase() {
        let (manager, processing) = manager(storage(1000, 0, 0, 1, 1));
        manager.run_cycle().unwrap();
        manager.run_cycle().unwrap();

        let ids: Vec<u16> = processing.take().into_iter().map(|(t, _, _)| t).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_storage_failure_skips_cycle() {
        let processing = Arc::new(RecordingProcessing::default());
        let manager = AutomationManager::new(
            Arc::new(BrokenStorage),
            Arc::clone(&processing),
            AutomationTrigger::new(),
            Arc::new(Configuration::new()),
        );

        assert!(manager.run_cycle().is_err());
        assert!(processing.take().is_empty());
    }

    #[tokio::test]
    async fn test_trigger_coalesces_signals() {
        let trigger = AutomationTrigger::new();
        trigger.fire();
        trigger.fire();
        trigger.fire();

        trigger.wait().await;
        let second = tokio::time::timeout(Duration::from_millis(50), trigger.wait()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let (mut manager, processing) = manager(storage(1000, 0, 0, 0, 0));

        manager.start(0).unwrap();
        assert!(manager.start(0).is_err());

        manager.trigger().fire();
        while manager.cycles_completed() < 2 {
            tokio::task::yield_now().await;
        }

        manager.stop().await;
        assert!(!manager.is_running());
        let completed = manager.cycles_completed();
        assert!(completed >= 2);
        assert_eq!(processing.take().len() as u64, completed * 2);
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let (mut manager, _) = manager(storage(1000, 0, 0, 0, 0));
        manager.stop().await;
        assert_eq!(manager.cycles_completed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_drives_cycles() {
        let (mut manager, _) = manager(storage(1000, 0, 0, 0, 0));
        manager.start(1).unwrap();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        manager.stop().await;

        // Initial cycle, three ticks, then the wake-up from stop
        let completed = manager.cycles_completed();
        assert!((4..=5).contains(&completed), "completed {}", completed);
    }
}
