//! Point identity: which device point a raw value belongs to.

use std::collections::BTreeMap;
use std::fmt;

/// How a point's raw value is interpreted and which function family addresses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PointType {
    /// Discrete input bit (FC02)
    DigitalInput,
    /// Coil (FC01, FC05)
    DigitalOutput,
    /// Input register (FC04)
    AnalogInput,
    /// Holding register (FC03, FC06)
    AnalogOutput,
}

impl PointType {
    /// True for single-bit points.
    #[inline]
    pub fn is_digital(self) -> bool {
        matches!(self, PointType::DigitalInput | PointType::DigitalOutput)
    }

    /// True for 16-bit register points.
    #[inline]
    pub fn is_analog(self) -> bool {
        !self.is_digital()
    }
}

impl fmt::Display for PointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PointType::DigitalInput => "DIGITAL_INPUT",
            PointType::DigitalOutput => "DIGITAL_OUTPUT",
            PointType::AnalogInput => "ANALOG_INPUT",
            PointType::AnalogOutput => "ANALOG_OUTPUT",
        };
        f.write_str(name)
    }
}

/// Immutable `(PointType, address)` pair keying point-value maps.
///
/// Ordering is by type first, then address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PointIdentifier {
    /// Point kind
    pub point_type: PointType,
    /// Modbus address
    pub address: u16,
}

impl PointIdentifier {
    /// Create a point identifier.
    #[inline]
    pub const fn new(point_type: PointType, address: u16) -> Self {
        Self {
            point_type,
            address,
        }
    }
}

impl fmt::Display for PointIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.point_type, self.address)
    }
}

/// Decoded response: raw 16-bit value per point.
pub type PointValues = BTreeMap<PointIdentifier, u16>;
