//! Reads an HTU21D temperature and humidity sensor attached to a Silicon Labs CP2112
//! HID-to-SMBus bridge.
//!
//! ```no_run
//! use htu21d_cp2112::{Sensor, UsbBridge};
//!
//! let mut sensor = Sensor::new(UsbBridge::new());
//! sensor.connect()?;
//! let measurement = sensor.read()?;
//! println!("{:.1} °C, {:.0} %", measurement.temperature, measurement.humidity);
//! # Ok::<(), htu21d_cp2112::Error>(())
//! ```

mod bridge;
mod config;
mod connection;
mod conversion;
mod cp2112;
mod error;
mod i2c_impl;
mod protocol;
mod sensor;
pub mod transaction;


pub(crate) use connection::Connection;

pub use bridge::*;
pub use config::*;
pub use conversion::*;
pub use cp2112::*;
pub use error::*;
pub use i2c_impl::*;
pub use protocol::{CP2112_PRODUCT_ID, CP2112_VENDOR_ID};
pub use rusb;
pub use sensor::{
    Measurement, Sensor, REG_MEASURE_HUMIDITY, REG_MEASURE_TEMPERATURE, REG_WRITE_USER,
    USER_REGISTER_DEFAULT,
};
pub use transaction::{TransactionConfig, DEFAULT_POLL_TIMEOUT, DEFAULT_SETTLE_DELAY};
