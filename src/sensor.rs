use log::{debug, warn};

use crate::bridge::{Adapter, Bridge, SmbusConfig};
use crate::conversion::{raw_to_humidity, raw_to_temperature, RawSample};
use crate::{transaction, Config, Error, Result};

/// Measures temperature in no-hold master mode.
pub const REG_MEASURE_TEMPERATURE: u8 = 0xf3;
/// Measures relative humidity in no-hold master mode.
pub const REG_MEASURE_HUMIDITY: u8 = 0xf5;
/// Writes the user register. Followed by 0x02, the power-on default, it doubles as a probe.
pub const REG_WRITE_USER: u8 = 0xe6;
pub const USER_REGISTER_DEFAULT: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Percent relative humidity.
    pub humidity: f32,
}

/// Opens the only adapter with the given USB identifiers and applies `smbus` to it. The adapter
/// is closed again if configuring fails.
pub(crate) fn open_single_adapter<B: Bridge>(
    bridge: &B,
    vendor_id: u16,
    product_id: u16,
    smbus: &SmbusConfig,
) -> Result<B::Adapter> {
    let count = bridge
        .enumerate(vendor_id, product_id)
        .map_err(Error::EnumerationFailed)?;
    match count {
        0 => return Err(Error::NoAdapterFound),
        1 => {}
        n => return Err(Error::AmbiguousAdapter(n)),
    }

    let mut adapter = bridge
        .open(0, vendor_id, product_id)
        .map_err(Error::AdapterOpenFailed)?;
    if let Err(e) = adapter.configure(smbus) {
        adapter.close();
        warn!("failed to configure the adapter: {e}");
        return Err(Error::AdapterConfigFailed(e));
    }
    Ok(adapter)
}

struct Link<A> {
    adapter: A,
    device_address: u8,
}

/// An HTU21D reached through a bridge adapter. Holds at most one open adapter.
pub struct Sensor<B: Bridge> {
    bridge: B,
    config: Config,
    link: Option<Link<B::Adapter>>,
}

impl<B: Bridge> Sensor<B> {
    pub fn new(bridge: B) -> Self {
        Self::with_config(bridge, Config::default())
    }

    pub fn with_config(bridge: B, config: Config) -> Self {
        Self {
            bridge,
            config,
            link: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connected(&self) -> bool {
        self.link.is_some()
    }

    /// Connects using the address and USB identifiers from the configuration.
    pub fn connect(&mut self) -> Result<()> {
        self.connect_with(
            self.config.device_address,
            self.config.vendor_id,
            self.config.product_id,
        )
    }

    /// Opens the only adapter with the given USB identifiers, configures it and checks that the
    /// sensor answers at `device_address`. Does nothing when already connected.
    pub fn connect_with(
        &mut self,
        device_address: u8,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<()> {
        if self.connected() {
            return Ok(());
        }

        let mut adapter =
            open_single_adapter(&self.bridge, vendor_id, product_id, &self.config.smbus)?;

        let probe = transaction::write_command(
            &mut adapter,
            device_address,
            &[REG_WRITE_USER, USER_REGISTER_DEFAULT],
            &self.config.transaction,
        );
        if let Err(e) = probe {
            adapter.close();
            warn!("target device did not answer: {e}");
            return Err(Error::ProbeFailed(Box::new(e)));
        }

        self.link = Some(Link {
            adapter,
            device_address,
        });
        debug!("connection established");
        Ok(())
    }

    /// Releases the adapter. Does nothing when not connected.
    pub fn close(&mut self) {
        if let Some(link) = self.link.take() {
            link.adapter.close();
            debug!("connection closed");
        }
    }

    /// Reads both measurement registers and checks their status bits. The humidity register is
    /// not touched if the temperature sample is rejected.
    pub fn read_raw(&mut self) -> Result<(RawSample, RawSample)> {
        let link = self.link.as_mut().ok_or(Error::NotConnected)?;
        let config = &self.config.transaction;

        let mut temperature = [0u8; 2];
        transaction::read_register(
            &mut link.adapter,
            link.device_address,
            REG_MEASURE_TEMPERATURE,
            &mut temperature,
            config,
        )?;
        let temperature = RawSample(temperature);
        if temperature.is_humidity() {
            warn!("expected status bit 1 cleared in temperature sample");
            return Err(Error::UnexpectedMeasurementType);
        }

        let mut humidity = [0u8; 2];
        transaction::read_register(
            &mut link.adapter,
            link.device_address,
            REG_MEASURE_HUMIDITY,
            &mut humidity,
            config,
        )?;
        let humidity = RawSample(humidity);
        if !humidity.is_humidity() {
            warn!("expected status bit 1 set in humidity sample");
            return Err(Error::UnexpectedMeasurementType);
        }

        Ok((temperature, humidity))
    }

    pub fn read(&mut self) -> Result<Measurement> {
        let (temperature, humidity) = self.read_raw()?;
        let measurement = Measurement {
            temperature: raw_to_temperature(temperature.value()),
            humidity: raw_to_humidity(humidity.value()),
        };
        debug!("done reading measurements: {measurement:?}");
        Ok(measurement)
    }
}

impl<B: Bridge> Drop for Sensor<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::mock::{complete, status, Call, MockBridge};
    use crate::bridge::{DetailedStatus, TransferStatus};
    use crate::config::DEFAULT_DEVICE_ADDRESS;
    use crate::protocol::{CP2112_PRODUCT_ID, CP2112_VENDOR_ID};
    use crate::BridgeError;
    use std::time::Duration;

    const ADDR: u8 = DEFAULT_DEVICE_ADDRESS;

    fn sensor(bridge: &MockBridge) -> Sensor<MockBridge> {
        let config = Config::default()
            .with_settle_delay(Duration::ZERO)
            .with_poll_timeout(Some(Duration::from_millis(100)));
        Sensor::with_config(bridge.clone(), config)
    }

    fn connected_sensor(bridge: &MockBridge) -> Sensor<MockBridge> {
        bridge
            .script
            .borrow_mut()
            .status_responses
            .push_back(Ok(complete()));
        let mut sensor = sensor(bridge);
        sensor.connect().unwrap();
        sensor
    }

    #[test]
    fn test_connect() {
        let bridge = MockBridge::new();
        let sensor = connected_sensor(&bridge);
        assert!(sensor.connected());
        assert_eq!(
            bridge.calls(),
            [
                Call::Enumerate(CP2112_VENDOR_ID, CP2112_PRODUCT_ID),
                Call::Open(0, CP2112_VENDOR_ID, CP2112_PRODUCT_ID),
                Call::Configure(SmbusConfig::default()),
                Call::WriteRequest(ADDR, vec![0xe6, 0x02]),
                Call::RequestTransferStatus,
                Call::GetTransferStatusResponse,
            ]
        );
    }

    #[test]
    fn test_connect_twice() {
        let bridge = MockBridge::new();
        let mut sensor = connected_sensor(&bridge);
        let calls = bridge.calls().len();
        sensor.connect().unwrap();
        assert_eq!(bridge.calls().len(), calls);
    }

    #[test]
    fn test_no_adapter() {
        let bridge = MockBridge::new();
        bridge.script.borrow_mut().adapter_count = Some(Ok(0));
        let mut sensor = sensor(&bridge);
        assert_eq!(sensor.connect(), Err(Error::NoAdapterFound));
        assert!(!sensor.connected());
        assert_eq!(bridge.calls().len(), 1);
    }

    #[test]
    fn test_ambiguous_adapter() {
        let bridge = MockBridge::new();
        bridge.script.borrow_mut().adapter_count = Some(Ok(2));
        let mut sensor = sensor(&bridge);
        assert_eq!(sensor.connect(), Err(Error::AmbiguousAdapter(2)));
        assert!(!sensor.connected());
        assert_eq!(bridge.calls().len(), 1);
    }

    #[test]
    fn test_enumeration_failed() {
        let bridge = MockBridge::new();
        let cause = BridgeError::EnumerationFailed(rusb::Error::Access);
        bridge.script.borrow_mut().adapter_count = Some(Err(cause));
        let mut sensor = sensor(&bridge);
        assert_eq!(sensor.connect(), Err(Error::EnumerationFailed(cause)));
    }

    #[test]
    fn test_open_failed() {
        let bridge = MockBridge::new();
        let cause = BridgeError::OpenFailed(rusb::Error::Busy);
        bridge.script.borrow_mut().open_result = Some(cause);
        let mut sensor = sensor(&bridge);
        assert_eq!(sensor.connect(), Err(Error::AdapterOpenFailed(cause)));
        assert_eq!(bridge.count_calls(&Call::Close), 0);
    }

    #[test]
    fn test_config_failure_closes_adapter() {
        let bridge = MockBridge::new();
        let cause = BridgeError::ConfigFailed(rusb::Error::Pipe);
        bridge.script.borrow_mut().configure_result = Some(cause);
        let mut sensor = sensor(&bridge);
        assert_eq!(sensor.connect(), Err(Error::AdapterConfigFailed(cause)));
        assert!(!sensor.connected());
        assert_eq!(bridge.count_calls(&Call::Close), 1);
        assert_eq!(bridge.count_writes(), 0);

        drop(sensor);
        assert_eq!(bridge.count_calls(&Call::Close), 1);
    }

    #[test]
    fn test_probe_failure_closes_adapter() {
        let bridge = MockBridge::new();
        bridge
            .script
            .borrow_mut()
            .status_responses
            .push_back(Ok(status(TransferStatus::Error, DetailedStatus::TIMEOUT_NACK)));
        let mut sensor = sensor(&bridge);
        assert_eq!(
            sensor.connect(),
            Err(Error::ProbeFailed(Box::new(Error::DeviceCommunicationFailed(
                DetailedStatus::TIMEOUT_NACK
            ))))
        );
        assert!(!sensor.connected());
        assert_eq!(bridge.count_calls(&Call::Close), 1);
    }

    #[test]
    fn test_close() {
        let bridge = MockBridge::new();
        let mut sensor = connected_sensor(&bridge);
        sensor.close();
        assert!(!sensor.connected());
        sensor.close();
        assert_eq!(bridge.count_calls(&Call::Close), 1);
    }

    #[test]
    fn test_drop_closes() {
        let bridge = MockBridge::new();
        let sensor = connected_sensor(&bridge);
        drop(sensor);
        assert_eq!(bridge.count_calls(&Call::Close), 1);
    }

    #[test]
    fn test_read_not_connected() {
        let bridge = MockBridge::new();
        let mut sensor = sensor(&bridge);
        assert_eq!(sensor.read(), Err(Error::NotConnected));
        assert!(bridge.calls().is_empty());
    }

    #[test]
    fn test_read() {
        let bridge = MockBridge::new();
        let mut sensor = connected_sensor(&bridge);
        bridge.schedule_register_read(&[0x68, 0x38]);
        bridge.schedule_register_read(&[0x4e, 0x86]);

        let measurement = sensor.read().unwrap();
        assert!((measurement.temperature - 24.69).abs() < 0.01);
        assert!((measurement.humidity - 32.34).abs() < 0.01);
        assert_eq!(bridge.count_calls(&Call::WriteRequest(ADDR, vec![0xf3])), 1);
        assert_eq!(bridge.count_calls(&Call::WriteRequest(ADDR, vec![0xf5])), 1);
        assert_eq!(bridge.count_calls(&Call::ReadRequest(ADDR, 2)), 2);
    }

    #[test]
    fn test_temperature_status_bit_set() {
        let bridge = MockBridge::new();
        let mut sensor = connected_sensor(&bridge);
        bridge.schedule_register_read(&[0x68, 0x3a]);
        bridge.schedule_register_read(&[0x4e, 0x86]);

        assert_eq!(sensor.read(), Err(Error::UnexpectedMeasurementType));
        assert_eq!(bridge.count_calls(&Call::WriteRequest(ADDR, vec![0xf5])), 0);
        assert!(sensor.connected());
    }

    #[test]
    fn test_humidity_status_bit_cleared() {
        let bridge = MockBridge::new();
        let mut sensor = connected_sensor(&bridge);
        bridge.schedule_register_read(&[0x68, 0x38]);
        bridge.schedule_register_read(&[0x4e, 0x84]);

        assert_eq!(sensor.read(), Err(Error::UnexpectedMeasurementType));
        assert!(sensor.connected());
    }

    #[test]
    fn test_failed_read_keeps_connection() {
        let bridge = MockBridge::new();
        let mut sensor = connected_sensor(&bridge);
        bridge
            .script
            .borrow_mut()
            .write_results
            .push_back(Err(BridgeError::WriteFailed(rusb::Error::NoDevice)));

        let error = sensor.read().unwrap_err();
        assert_eq!(
            error,
            Error::WriteRequestFailed(BridgeError::WriteFailed(rusb::Error::NoDevice))
        );
        assert!(error.is_transient());
        assert!(sensor.connected());
        assert_eq!(bridge.count_calls(&Call::Close), 0);

        // the next cycle works without reconnecting
        bridge.schedule_register_read(&[0x68, 0x38]);
        bridge.schedule_register_read(&[0x4e, 0x86]);
        sensor.read().unwrap();
    }

    #[test]
    fn test_custom_address() {
        let bridge = MockBridge::new();
        bridge
            .script
            .borrow_mut()
            .status_responses
            .push_back(Ok(complete()));
        let mut sensor = sensor(&bridge);
        sensor.connect_with(0x82, 0x1234, 0x5678).unwrap();
        assert_eq!(bridge.calls()[0], Call::Enumerate(0x1234, 0x5678));

        bridge.schedule_register_read(&[0x68, 0x38]);
        bridge.schedule_register_read(&[0x4e, 0x86]);
        sensor.read().unwrap();
        assert_eq!(bridge.count_calls(&Call::ReadRequest(0x82, 2)), 2);
    }
}
