//! Write, poll and read sequences built from the single-shot [`Adapter`] requests.

use std::thread::sleep;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::bridge::{Adapter, DetailedStatus, TransferStatus, MAX_CHUNK_LEN};
use crate::{Error, Result};

/// Time the sensor needs to finish a conversion after the bridge reports the command as sent.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Upper bound on waiting for the bridge, matching the adapter's own bus timeouts.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Wait between the completed register write and the read request.
    pub settle_delay: Duration,
    /// Limit for polling the transfer status and collecting read responses. `None` polls
    /// until the bridge answers, however long that takes.
    pub poll_timeout: Option<Duration>,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            poll_timeout: Some(DEFAULT_POLL_TIMEOUT),
        }
    }
}

struct Deadline(Option<Instant>);

impl Deadline {
    fn start(timeout: Option<Duration>) -> Self {
        Self(timeout.map(|t| Instant::now() + t))
    }

    fn check(&self) -> Result<()> {
        match self.0 {
            Some(deadline) if Instant::now() >= deadline => Err(Error::Timeout),
            _ => Ok(()),
        }
    }
}

/// Waits until the outstanding transfer is no longer busy and checks how it ended.
fn wait_for_transfer(adapter: &mut impl Adapter, config: &TransactionConfig) -> Result<()> {
    adapter
        .request_transfer_status()
        .map_err(Error::StatusRequestFailed)?;

    let deadline = Deadline::start(config.poll_timeout);
    let response = loop {
        let response = adapter
            .get_transfer_status_response()
            .map_err(Error::StatusPollFailed)?;
        if response.status != TransferStatus::Busy {
            break response;
        }
        deadline.check()?;
    };

    match (response.status, response.detailed_status) {
        (TransferStatus::Complete, _) => Ok(()),
        (TransferStatus::Error, DetailedStatus::SUCCESS_AFTER_RETRY) => {
            debug!("transfer succeeded after {} retries", response.retries);
            Ok(())
        }
        (_, code) => Err(Error::DeviceCommunicationFailed(code)),
    }
}

/// Sends `data` to the device and waits for the bridge to confirm the transfer.
pub fn write_command(
    adapter: &mut impl Adapter,
    address: u8,
    data: &[u8],
    config: &TransactionConfig,
) -> Result<()> {
    adapter
        .write_request(address, data)
        .map_err(Error::WriteRequestFailed)?;
    wait_for_transfer(adapter, config)
}

/// Reads exactly `buf.len()` bytes from the device, reassembling them from as many read
/// responses as the bridge needs.
pub fn read_bytes(
    adapter: &mut impl Adapter,
    address: u8,
    buf: &mut [u8],
    config: &TransactionConfig,
) -> Result<()> {
    let length =
        u16::try_from(buf.len()).map_err(|_| Error::Io(std::io::ErrorKind::InvalidInput))?;
    adapter
        .read_request(address, length)
        .map_err(Error::ReadRequestFailed)?;
    adapter
        .force_read_response(length)
        .map_err(Error::ReadForceFailed)?;

    let deadline = Deadline::start(config.poll_timeout);
    let mut chunk = [0u8; MAX_CHUNK_LEN];
    let mut total = 0;
    while total < buf.len() {
        let response = adapter
            .get_read_response(&mut chunk)
            .map_err(Error::ReadResponseFailed)?;
        let received = response.length.min(MAX_CHUNK_LEN);
        if received == 0 {
            deadline.check()?;
            continue;
        }

        // a malformed over-length chunk only fills what is left of the buffer
        let n = received.min(buf.len() - total);
        buf[total..total + n].copy_from_slice(&chunk[..n]);
        total += received;
    }
    Ok(())
}

/// Selects `register` and reads its contents into `buf`.
pub fn read_register(
    adapter: &mut impl Adapter,
    address: u8,
    register: u8,
    buf: &mut [u8],
    config: &TransactionConfig,
) -> Result<()> {
    let result = write_command(adapter, address, &[register], config).and_then(|()| {
        sleep(config.settle_delay);
        read_bytes(adapter, address, buf, config)
    });
    if let Err(e) = &result {
        warn!("failed to read register {register:#04x}: {e}");
    }
    result
}
