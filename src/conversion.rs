/// Status bit in the low byte marking a humidity result.
const STATUS_HUMIDITY: u8 = 0b10;

/// Two bytes read from a measurement register, most significant byte first. The two lowest
/// bits are status bits and are kept in the value, the conversion formulas account for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample(pub [u8; 2]);

impl RawSample {
    pub fn value(&self) -> u16 {
        u16::from_be_bytes(self.0)
    }

    /// Whether the sensor marked this sample as a humidity measurement.
    pub fn is_humidity(&self) -> bool {
        self.0[1] & STATUS_HUMIDITY != 0
    }
}

/// Converts a raw temperature sample to degrees Celsius.
pub fn raw_to_temperature(raw: u16) -> f32 {
    -46.85 + 175.72 * raw as f32 / 65535.0
}

/// Converts a raw humidity sample to percent relative humidity.
pub fn raw_to_humidity(raw: u16) -> f32 {
    -6.0 + 125.0 * raw as f32 / 65535.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 0.01, "{a} != {b}");
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(raw_to_temperature(0), -46.85);
        assert_eq!(raw_to_humidity(0), -6.0);
        assert_close(raw_to_temperature(u16::MAX), 128.87);
        assert_close(raw_to_humidity(u16::MAX), 119.0);
    }

    #[test]
    fn test_datasheet_values() {
        assert_close(raw_to_temperature(0x683a), 24.69);
        assert_close(raw_to_humidity(0x4e85), 32.34);
    }

    #[test]
    fn test_monotonic() {
        for raw in 1..=u16::MAX {
            assert!(raw_to_temperature(raw) > raw_to_temperature(raw - 1));
            assert!(raw_to_humidity(raw) > raw_to_humidity(raw - 1));
        }
    }

    #[test]
    fn test_raw_sample() {
        let temperature = RawSample([0x68, 0x38]);
        assert_eq!(temperature.value(), 0x6838);
        assert!(!temperature.is_humidity());

        let humidity = RawSample([0x4e, 0x86]);
        assert_eq!(humidity.value(), 0x4e86);
        assert!(humidity.is_humidity());
    }
}
