//! End-to-end water level scenario: automation cycles against storage,
//! with writes applied the way a device echo would apply them.

use std::sync::{Arc, Mutex};

use modbus_scada::{
    AutomationManager, AutomationTrigger, CommandDispatcher, Configuration, EguConverter,
    FrameTransport, MemoryStorage, ModbusResult, PointConfig, PointIdentifier, PointType,
    ProcessingManager, Storage, WaterLevelPoints,
};

/// Applies each write to storage immediately and records it.
struct ApplyingProcessing {
    storage: Arc<MemoryStorage>,
    writes: Mutex<Vec<(u16, i32)>>,
}

impl ApplyingProcessing {
    fn new(storage: Arc<MemoryStorage>) -> Self {
        Self {
            storage,
            writes: Mutex::new(Vec::new()),
        }
    }

    fn take(&self) -> Vec<(u16, i32)> {
        std::mem::take(&mut *self.writes.lock().unwrap())
    }
}

impl ProcessingManager for ApplyingProcessing {
    fn execute_write_command(
        &self,
        config: Arc<PointConfig>,
        _transaction_id: u16,
        _unit_address: u8,
        point_address: u16,
        value: i32,
    ) {
        self.writes.lock().unwrap().push((point_address, value));
        let raw = if config.point_type.is_analog() {
            EguConverter::convert_to_raw(config.scale_factor, config.deviation, f64::from(value))
        } else {
            u16::from(value != 0)
        };
        self.storage
            .set_raw_value(PointIdentifier::new(config.point_type, point_address), raw)
            .unwrap();
    }
}

struct EchoDevice;

impl FrameTransport for EchoDevice {
    async fn exchange(&mut self, request: &[u8]) -> ModbusResult<Vec<u8>> {
        Ok(request.to_vec())
    }
}

fn storage(level: u16, stop: u16, valve: u16, switch1: u16, switch2: u16) -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::new([
        PointConfig::new(PointType::AnalogOutput, 1000)
            .with_egu_range(0.0, 12000.0)
            .with_limits(3000.0, 10500.0)
            .with_default_value(level),
        PointConfig::new(PointType::DigitalOutput, 2000).with_default_value(stop),
        PointConfig::new(PointType::DigitalOutput, 2002).with_default_value(valve),
        PointConfig::new(PointType::DigitalOutput, 2005).with_default_value(switch1),
        PointConfig::new(PointType::DigitalOutput, 2006).with_default_value(switch2),
    ]))
}

fn raw(storage: &MemoryStorage, id: PointIdentifier) -> u16 {
    storage.get_point(id).unwrap().raw_value
}

#[test]
fn test_fill_until_high_limit_then_drain() {
    let storage = storage(1000, 0, 0, 1, 0);
    let processing = Arc::new(ApplyingProcessing::new(Arc::clone(&storage)));
    let manager = AutomationManager::new(
        Arc::clone(&storage),
        Arc::clone(&processing),
        AutomationTrigger::new(),
        Arc::new(Configuration::new()),
    );

    // First cycle: valve held closed, level rises by 160
    manager.run_cycle().unwrap();
    assert_eq!(processing.take(), vec![(2002, 0), (1000, 1160)]);
    assert_eq!(raw(&storage, WaterLevelPoints::LEVEL), 1160);
    assert_eq!(raw(&storage, WaterLevelPoints::VALVE), 0);

    let mut crossing = None;
    for cycle in 2..=100 {
        manager.run_cycle().unwrap();
        let writes = processing.take();
        if writes.contains(&(2000, 1)) {
            crossing = Some((cycle, writes));
            break;
        }
    }

    let (cycle, writes) = crossing.expect("level never reached the high limit");
    assert_eq!(cycle, 60);
    assert!(writes.contains(&(2002, 1)));
    assert!(writes.contains(&(1000, 10600)));
    assert_eq!(writes.last(), Some(&(1000, 10500)));

    assert_eq!(raw(&storage, WaterLevelPoints::STOP), 1);
    assert_eq!(raw(&storage, WaterLevelPoints::VALVE), 1);
    assert_eq!(raw(&storage, WaterLevelPoints::LEVEL), 10500);

    // Next cycle still sees P1 on: pumps are switched off, and the pass
    // fills and drains once more from the pre-cycle snapshot
    manager.run_cycle().unwrap();
    assert_eq!(
        processing.take(),
        vec![
            (2005, 0),
            (2006, 0),
            (1000, 10660),
            (2000, 1),
            (2002, 1),
            (1000, 10610),
            (1000, 10560),
        ]
    );
    assert_eq!(raw(&storage, WaterLevelPoints::SWITCH1), 0);
}

#[test]
fn test_drain_down_to_drainage_level_closes_valve() {
    let storage = storage(6200, 1, 1, 0, 0);
    let processing = Arc::new(ApplyingProcessing::new(Arc::clone(&storage)));
    let manager = AutomationManager::new(
        Arc::clone(&storage),
        Arc::clone(&processing),
        AutomationTrigger::new(),
        Arc::new(Configuration::new()),
    );

    for _ in 0..10 {
        manager.run_cycle().unwrap();
        if raw(&storage, WaterLevelPoints::VALVE) == 0 {
            break;
        }
    }

    assert_eq!(raw(&storage, WaterLevelPoints::VALVE), 0);
    assert!(raw(&storage, WaterLevelPoints::LEVEL) <= 6000);
}

#[tokio::test]
async fn test_automation_through_dispatcher() {
    let storage = storage(1000, 0, 0, 1, 1);
    let (dispatcher, queue) = CommandDispatcher::new();
    let stats = dispatcher.stats();
    let dispatcher_task = tokio::spawn(queue.run(EchoDevice, Arc::clone(&storage)));

    let mut manager = AutomationManager::new(
        Arc::clone(&storage),
        Arc::new(dispatcher),
        AutomationTrigger::new(),
        Arc::new(Configuration::new()),
    );
    manager.start(0).unwrap();
    while manager.cycles_completed() < 1 {
        tokio::task::yield_now().await;
    }
    manager.stop().await;
    drop(manager);
    dispatcher_task.await.unwrap();

    // One cycle: valve closed and level raised by both pumps
    assert_eq!(stats.submitted(), 2);
    assert_eq!(stats.completed(), 2);
    assert_eq!(stats.failed(), 0);
    let level = storage.get_points(&[WaterLevelPoints::LEVEL]).unwrap();
    assert_eq!(level[0].raw_value, 1240);
}
