//! # Alarm Classification
//!
//! Pure functions mapping a point value and its configuration to an
//! [`AlarmType`]. Plausibility is checked before thresholds, and both
//! threshold comparisons are inclusive.
//!
//! | Condition (analog) | Result |
//! |--------------------|--------|
//! | `egu <= egu_min` or `egu >= egu_max` | `ReasonabilityFailure` |
//! | `egu >= high_limit` | `HighAlarm` |
//! | `egu <= low_limit` | `LowAlarm` |
//! | otherwise | `NoAlarm` |

use std::fmt;

use crate::config::ConfigItem;

/// Alarm state of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlarmType {
    /// Value within limits
    #[default]
    NoAlarm,
    /// At or above the high threshold
    HighAlarm,
    /// At or below the low threshold
    LowAlarm,
    /// Outside the physically plausible range
    ReasonabilityFailure,
    /// Digital point in its abnormal state
    AbnormalValue,
}

impl fmt::Display for AlarmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlarmType::NoAlarm => "NO_ALARM",
            AlarmType::HighAlarm => "HIGH_ALARM",
            AlarmType::LowAlarm => "LOW_ALARM",
            AlarmType::ReasonabilityFailure => "REASONABILITY_FAILURE",
            AlarmType::AbnormalValue => "ABNORMAL_VALUE",
        };
        f.write_str(name)
    }
}

/// Classify an analog value in engineering units.
pub fn classify_analog<C: ConfigItem + ?Sized>(egu_value: f64, config: &C) -> AlarmType {
    if egu_value <= config.egu_min() || egu_value >= config.egu_max() {
        AlarmType::ReasonabilityFailure
    } else if egu_value >= config.high_limit() {
        AlarmType::HighAlarm
    } else if egu_value <= config.low_limit() {
        AlarmType::LowAlarm
    } else {
        AlarmType::NoAlarm
    }
}

/// Classify a digital state.
pub fn classify_digital<C: ConfigItem + ?Sized>(state: u16, config: &C) -> AlarmType {
    if state == config.abnormal_value() {
        AlarmType::AbnormalValue
    } else {
        AlarmType::NoAlarm
    }
}
