//! # Point and Runtime Configuration
//!
//! [`ConfigItem`] is the read-only view of a point's static configuration
//! consumed by the alarm classifier, the automation loop and the dispatcher.
//! [`PointConfig`] is the in-crate implementation; [`Configuration`] holds
//! the runtime settings shared by the whole process.
//!
//! ## Example
//!
//! ```rust
//! use modbus_scada::{ConfigItem, PointConfig, PointType};
//!
//! let level = PointConfig::new(PointType::AnalogOutput, 1000)
//!     .with_egu_range(0.0, 12000.0)
//!     .with_limits(3000.0, 10500.0);
//!
//! assert_eq!(level.high_limit(), 10500.0);
//! ```

use std::sync::atomic::{AtomicU16, Ordering};

use crate::point::{PointIdentifier, PointType};

/// Default unit (slave) address.
pub const DEFAULT_UNIT_ADDRESS: u8 = 1;

/// Default automation cadence in seconds.
pub const DEFAULT_DELAY_BETWEEN_COMMANDS_SECS: u64 = 1;

/// Default Modbus TCP port.
pub const DEFAULT_TCP_PORT: u16 = 502;

/// Default transport timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Read-only per-point configuration.
pub trait ConfigItem: Send + Sync {
    /// Point kind
    fn point_type(&self) -> PointType;
    /// Point address
    fn address(&self) -> u16;
    /// Lower bound of the physically plausible range
    fn egu_min(&self) -> f64;
    /// Upper bound of the physically plausible range
    fn egu_max(&self) -> f64;
    /// High alarm threshold
    fn high_limit(&self) -> f64;
    /// Low alarm threshold
    fn low_limit(&self) -> f64;
    /// Digital state considered abnormal
    fn abnormal_value(&self) -> u16;
    /// Raw-to-EGU multiplier
    fn scale_factor(&self) -> f64;
    /// Raw-to-EGU offset
    fn deviation(&self) -> f64;

    /// Identifier built from type and address.
    fn identifier(&self) -> PointIdentifier {
        PointIdentifier::new(self.point_type(), self.address())
    }
}

/// Static configuration of one point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointConfig {
    /// Point kind
    pub point_type: PointType,
    /// Modbus address
    pub address: u16,
    /// Free text shown to operators
    pub description: String,
    /// Lower plausibility bound
    pub egu_min: f64,
    /// Upper plausibility bound
    pub egu_max: f64,
    /// High alarm threshold
    pub high_limit: f64,
    /// Low alarm threshold
    pub low_limit: f64,
    /// Abnormal digital state
    pub abnormal_value: u16,
    /// Raw-to-EGU multiplier
    pub scale_factor: f64,
    /// Raw-to-EGU offset
    pub deviation: f64,
    /// Raw value before the first read
    pub default_value: u16,
}

impl PointConfig {
    /// Identity scaling, full u16 range, alarms effectively off.
    pub fn new(point_type: PointType, address: u16) -> Self {
        Self {
            point_type,
            address,
            description: String::new(),
            egu_min: f64::MIN,
            egu_max: f64::MAX,
            high_limit: f64::MAX,
            low_limit: f64::MIN,
            abnormal_value: u16::MAX,
            scale_factor: 1.0,
            deviation: 0.0,
            default_value: 0,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the plausibility range.
    pub fn with_egu_range(mut self, egu_min: f64, egu_max: f64) -> Self {
        self.egu_min = egu_min;
        self.egu_max = egu_max;
        self
    }

    /// Set low and high alarm thresholds.
    pub fn with_limits(mut self, low_limit: f64, high_limit: f64) -> Self {
        self.low_limit = low_limit;
        self.high_limit = high_limit;
        self
    }

    /// Set the abnormal digital state.
    pub fn with_abnormal_value(mut self, abnormal_value: u16) -> Self {
        self.abnormal_value = abnormal_value;
        self
    }

    /// Set linear conversion coefficients.
    pub fn with_scaling(mut self, scale_factor: f64, deviation: f64) -> Self {
        self.scale_factor = scale_factor;
        self.deviation = deviation;
        self
    }

    /// Set the initial raw value.
    pub fn with_default_value(mut self, default_value: u16) -> Self {
        self.default_value = default_value;
        self
    }
}

impl ConfigItem for PointConfig {
    fn point_type(&self) -> PointType {
        self.point_type
    }

    fn address(&self) -> u16 {
        self.address
    }

    fn egu_min(&self) -> f64 {
        self.egu_min
    }

    fn egu_max(&self) -> f64 {
        self.egu_max
    }

    fn high_limit(&self) -> f64 {
        self.high_limit
    }

    fn low_limit(&self) -> f64 {
        self.low_limit
    }

    fn abnormal_value(&self) -> u16 {
        self.abnormal_value
    }

    fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    fn deviation(&self) -> f64 {
        self.deviation
    }
}

/// Process-wide runtime settings.
///
/// Transaction ids are handed out from an atomic counter, so one
/// `Configuration` can be shared by the automation loop and any poller.
#[derive(Debug)]
pub struct Configuration {
    /// Unit address used for every command
    pub unit_address: u8,
    /// Automation cadence in seconds
    pub delay_between_commands: u64,
    /// Device TCP port
    pub tcp_port: u16,
    /// Per-operation transport timeout
    pub timeout_ms: u64,
    transaction_id: AtomicU16,
}

impl Configuration {
    /// Configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set unit address.
    pub fn with_unit_address(mut self, unit_address: u8) -> Self {
        self.unit_address = unit_address;
        self
    }

    /// Set automation cadence in seconds.
    pub fn with_delay_between_commands(mut self, seconds: u64) -> Self {
        self.delay_between_commands = seconds;
        self
    }

    /// Set device TCP port.
    pub fn with_tcp_port(mut self, port: u16) -> Self {
        self.tcp_port = port;
        self
    }

    /// Set transport timeout in milliseconds.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Next transaction id (wraps at `u16::MAX`).
    pub fn get_transaction_id(&self) -> u16 {
        self.transaction_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            unit_address: DEFAULT_UNIT_ADDRESS,
            delay_between_commands: DEFAULT_DELAY_BETWEEN_COMMANDS_SECS,
            tcp_port: DEFAULT_TCP_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            transaction_id: AtomicU16::new(0),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
