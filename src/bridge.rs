//! The operations the engine needs from a HID-to-SMBus bridge. The traits carry no protocol
//! knowledge: every method maps to a single request or response exchanged with the adapter.

use std::fmt;
use std::time::Duration;

use crate::BridgeError;

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Largest payload delivered by a single read response.
pub const MAX_CHUNK_LEN: usize = 61;

/// Largest length a single read request may ask for.
pub const MAX_READ_LEN: u16 = 512;

/// SMBus settings written to the adapter at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmbusConfig {
    pub clock_hz: u32,
    /// Fixed configuration byte sent alongside the clock rate.
    pub retry_limit: u8,
    pub auto_read_respond: bool,
    pub write_timeout: Duration,
    pub read_timeout: Duration,
    pub scl_low_timeout: bool,
    pub transfer_retries: u16,
}

impl Default for SmbusConfig {
    fn default() -> Self {
        Self {
            clock_hz: 100_000,
            retry_limit: 0x02,
            auto_read_respond: false,
            write_timeout: Duration::from_millis(1000),
            read_timeout: Duration::from_millis(1000),
            scl_low_timeout: true,
            transfer_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Idle,
    Busy,
    Complete,
    Error,
}

/// Qualifies a [`TransferStatus`], most importantly the `Error` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailedStatus(pub u8);

impl DetailedStatus {
    pub const TIMEOUT_NACK: Self = Self(0x00);
    pub const TIMEOUT_BUS_NOT_FREE: Self = Self(0x01);
    pub const ARBITRATION_LOST: Self = Self(0x02);
    pub const READ_INCOMPLETE: Self = Self(0x03);
    pub const WRITE_INCOMPLETE: Self = Self(0x04);
    pub const SUCCESS_AFTER_RETRY: Self = Self(0x05);
}

impl fmt::Display for DetailedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStatusResponse {
    pub status: TransferStatus,
    pub detailed_status: DetailedStatus,
    pub retries: u16,
    pub bytes_transferred: u16,
}

/// Header of one read response; the payload goes into the caller's chunk buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResponse {
    pub status: TransferStatus,
    pub length: usize,
}

/// Discovers and opens adapters.
pub trait Bridge {
    type Adapter: Adapter;

    /// Number of attached adapters with the given USB identifiers.
    fn enumerate(&self, vendor_id: u16, product_id: u16) -> BridgeResult<u32>;

    fn open(&self, index: u32, vendor_id: u16, product_id: u16) -> BridgeResult<Self::Adapter>;
}

/// An open adapter. Addresses are in the 8-bit write form.
pub trait Adapter {
    fn configure(&mut self, config: &SmbusConfig) -> BridgeResult<()>;

    fn write_request(&mut self, address: u8, data: &[u8]) -> BridgeResult<()>;

    fn read_request(&mut self, address: u8, length: u16) -> BridgeResult<()>;

    fn force_read_response(&mut self, length: u16) -> BridgeResult<()>;

    fn get_read_response(&mut self, chunk: &mut [u8; MAX_CHUNK_LEN]) -> BridgeResult<ReadResponse>;

    fn request_transfer_status(&mut self) -> BridgeResult<()>;

    fn get_transfer_status_response(&mut self) -> BridgeResult<TransferStatusResponse>;

    fn close(self);
}
