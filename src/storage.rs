//! # Point Storage
//!
//! Current value of every configured point. Readers get consistent
//! snapshots; writers (the dispatcher, pollers) apply decoded
//! [`PointValues`] which recompute engineering value and alarm state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::alarm::{classify_analog, classify_digital, AlarmType};
use crate::config::{ConfigItem, PointConfig};
use crate::egu::EguConverter;
use crate::error::{ModbusError, ModbusResult};
use crate::point::{PointIdentifier, PointValues};

/// Snapshot of one point.
#[derive(Debug, Clone)]
pub struct PointSnapshot {
    /// Point identity
    pub id: PointIdentifier,
    /// Last raw value
    pub raw_value: u16,
    /// Raw value in engineering units (digital points: the raw state)
    pub egu_value: f64,
    /// Alarm state for the current value
    pub alarm: AlarmType,
    /// Time of the last update
    pub timestamp: DateTime<Utc>,
    /// Static configuration
    pub config: Arc<PointConfig>,
}

impl PointSnapshot {
    fn new(config: Arc<PointConfig>, raw_value: u16) -> Self {
        let (egu_value, alarm) = evaluate(&config, raw_value);
        Self {
            id: config.identifier(),
            raw_value,
            egu_value,
            alarm,
            timestamp: Utc::now(),
            config,
        }
    }
}

fn evaluate(config: &PointConfig, raw_value: u16) -> (f64, AlarmType) {
    if config.point_type.is_analog() {
        let egu = EguConverter::convert_to_egu(config.scale_factor, config.deviation, raw_value);
        (egu, classify_analog(egu, config))
    } else {
        (f64::from(raw_value), classify_digital(raw_value, config))
    }
}

/// Point value store.
pub trait Storage: Send + Sync {
    /// Snapshots positionally aligned with `ids`.
    fn get_points(&self, ids: &[PointIdentifier]) -> ModbusResult<Vec<PointSnapshot>>;

    /// Apply decoded values; unknown points are skipped. Returns how many
    /// points were updated.
    fn update_points(&self, values: &PointValues) -> usize;
}

/// In-memory [`Storage`] behind a read/write lock.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    points: RwLock<HashMap<PointIdentifier, PointSnapshot>>,
}

impl MemoryStorage {
    /// Storage seeded with each point's default value.
    pub fn new(configs: impl IntoIterator<Item = PointConfig>) -> Self {
        let points = configs
            .into_iter()
            .map(|config| {
                let default_value = config.default_value;
                let snapshot = PointSnapshot::new(Arc::new(config), default_value);
                (snapshot.id, snapshot)
            })
            .collect();
        Self {
            points: RwLock::new(points),
        }
    }

    /// Number of configured points
    pub fn len(&self) -> usize {
        self.points.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if no points are configured
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of a single point.
    pub fn get_point(&self, id: PointIdentifier) -> Option<PointSnapshot> {
        self.points
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    /// Set one raw value directly.
    pub fn set_raw_value(&self, id: PointIdentifier, raw_value: u16) -> ModbusResult<()> {
        let mut values = PointValues::new();
        values.insert(id, raw_value);
        if self.update_points(&values) == 0 {
            return Err(ModbusError::invalid_data(format!("unknown point {}", id)));
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn get_points(&self, ids: &[PointIdentifier]) -> ModbusResult<Vec<PointSnapshot>> {
        let points = self.points.read().unwrap_or_else(|e| e.into_inner());
        ids.iter()
            .map(|id| {
                points
                    .get(id)
                    .cloned()
                    .ok_or_else(|| ModbusError::invalid_data(format!("unknown point {}", id)))
            })
            .collect()
    }

    fn update_points(&self, values: &PointValues) -> usize {
        let mut points = self.points.write().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        let mut updated = 0;

        for (id, &raw_value) in values {
            let Some(point) = points.get_mut(id) else {
                debug!("Skipping value for unconfigured point {}", id);
                continue;
            };
            let (egu_value, alarm) = evaluate(&point.config, raw_value);
            if alarm != point.alarm {
                debug!("Point {} alarm {} -> {}", id, point.alarm, alarm);
            }
            point.raw_value = raw_value;
            point.egu_value = egu_value;
            point.alarm = alarm;
            point.timestamp = now;
            updated += 1;
        }

        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::PointType;

    fn storage() -> MemoryStorage {
        MemoryStorage::new([
            PointConfig::new(PointType::AnalogOutput, 1000)
                .with_egu_range(0.0, 12000.0)
                .with_limits(3000.0, 10500.0)
                .with_default_value(5000),
            PointConfig::new(PointType::DigitalOutput, 2000).with_abnormal_value(1),
        ])
    }

    #[test]
    fn test_get_points_positional() {
        let storage = storage();
        let ids = [
            PointIdentifier::new(PointType::DigitalOutput, 2000),
            PointIdentifier::new(PointType::AnalogOutput, 1000),
        ];
        let points = storage.get_points(&ids).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].id, ids[0]);
        assert_eq!(points[1].id, ids[1]);
        assert_eq!(points[1].raw_value, 5000);
        assert_eq!(points[1].alarm, AlarmType::NoAlarm);
    }

    #[test]
    fn test_get_points_unknown_point() {
        let storage = storage();
        let ids = [PointIdentifier::new(PointType::AnalogInput, 1)];
        assert!(storage.get_points(&ids).is_err());
    }

    #[test]
    fn test_update_points_recomputes_alarm() {
        let storage = storage();
        let level = PointIdentifier::new(PointType::AnalogOutput, 1000);
        let stop = PointIdentifier::new(PointType::DigitalOutput, 2000);

        let mut values = PointValues::new();
        values.insert(level, 10600);
        values.insert(stop, 1);
        values.insert(PointIdentifier::new(PointType::AnalogInput, 9), 1);
        assert_eq!(storage.update_points(&values), 2);

        let level_point = storage.get_point(level).unwrap();
        assert_eq!(level_point.raw_value, 10600);
        assert_eq!(level_point.alarm, AlarmType::HighAlarm);
        assert_eq!(storage.get_point(stop).unwrap().alarm, AlarmType::AbnormalValue);
    }

    #[test]
    fn test_set_raw_value_unknown() {
        let storage = storage();
        assert!(storage
            .set_raw_value(PointIdentifier::new(PointType::DigitalInput, 1), 1)
            .is_err());
        assert_eq!(storage.len(), 2);
    }
}
