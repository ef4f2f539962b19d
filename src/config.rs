use std::time::Duration;

use crate::bridge::SmbusConfig;
use crate::protocol::{CP2112_PRODUCT_ID, CP2112_VENDOR_ID};
use crate::transaction::TransactionConfig;

/// HTU21D bus address (0x40) in the 8-bit write form expected by the bridge.
pub const DEFAULT_DEVICE_ADDRESS: u8 = 0x40 << 1;

/// Settings for [`Sensor`](crate::Sensor). The defaults match an HTU21D behind a stock CP2112.
///
/// ```
/// use std::time::Duration;
/// use htu21d_cp2112::Config;
///
/// let config = Config::default()
///     .with_settle_delay(Duration::from_millis(60))
///     .with_poll_timeout(None);
/// assert_eq!(config.transaction.poll_timeout, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub device_address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub smbus: SmbusConfig,
    pub transaction: TransactionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_address: DEFAULT_DEVICE_ADDRESS,
            vendor_id: CP2112_VENDOR_ID,
            product_id: CP2112_PRODUCT_ID,
            smbus: SmbusConfig::default(),
            transaction: TransactionConfig::default(),
        }
    }
}

impl Config {
    pub fn with_device_address(mut self, device_address: u8) -> Self {
        self.device_address = device_address;
        self
    }

    pub fn with_usb_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self.product_id = product_id;
        self
    }

    pub fn with_smbus(mut self, smbus: SmbusConfig) -> Self {
        self.smbus = smbus;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.transaction.settle_delay = settle_delay;
        self
    }

    /// `None` lets transactions wait on the bridge without limit.
    pub fn with_poll_timeout(mut self, poll_timeout: Option<Duration>) -> Self {
        self.transaction.poll_timeout = poll_timeout;
        self
    }
}
