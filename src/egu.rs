//! Linear conversion between raw register values and engineering units.

/// Raw <-> EGU conversion: `egu = raw * scale_factor + deviation`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EguConverter;

impl EguConverter {
    /// Raw register value to engineering units.
    #[inline]
    pub fn convert_to_egu(scale_factor: f64, deviation: f64, raw_value: u16) -> f64 {
        f64::from(raw_value) * scale_factor + deviation
    }

    /// Engineering units back to a raw register value, rounded and clamped
    /// to the u16 range. A zero scale factor maps everything to 0.
    #[inline]
    pub fn convert_to_raw(scale_factor: f64, deviation: f64, egu_value: f64) -> u16 {
        if scale_factor == 0.0 {
            return 0;
        }
        let raw = ((egu_value - deviation) / scale_factor).round();
        raw.clamp(0.0, f64::from(u16::MAX)) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_to_egu() {
        assert_eq!(EguConverter::convert_to_egu(1.0, 0.0, 1000), 1000.0);
        assert_eq!(EguConverter::convert_to_egu(0.5, 10.0, 100), 60.0);
    }

    #[test]
    fn test_convert_to_raw_inverts_egu() {
        let egu = EguConverter::convert_to_egu(0.5, 10.0, 4321);
        assert_eq!(EguConverter::convert_to_raw(0.5, 10.0, egu), 4321);
    }

    #[test]
    fn test_convert_to_raw_clamps() {
        assert_eq!(EguConverter::convert_to_raw(1.0, 0.0, -50.0), 0);
        assert_eq!(EguConverter::convert_to_raw(1.0, 0.0, 70000.0), u16::MAX);
        assert_eq!(EguConverter::convert_to_raw(0.0, 0.0, 123.0), 0);
    }
}
