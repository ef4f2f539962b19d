//! HID reports of the CP2112 HID-to-SMBus bridge, as documented in Silicon Labs AN495.

use std::time::Duration;

use log::debug;

use crate::bridge::{
    DetailedStatus, ReadResponse, SmbusConfig, TransferStatus, TransferStatusResponse,
    MAX_CHUNK_LEN, MAX_READ_LEN,
};
use crate::Connection;

pub const CP2112_VENDOR_ID: u16 = 0x10c4;
pub const CP2112_PRODUCT_ID: u16 = 0xea90;

#[allow(dead_code)]
mod constants {
    // report IDs
    pub const REPORT_RESET_DEVICE: u8 = 0x01;
    pub const REPORT_SMBUS_CONFIG: u8 = 0x06;
    pub const REPORT_DATA_READ_REQUEST: u8 = 0x10;
    pub const REPORT_DATA_WRITE_READ_REQUEST: u8 = 0x11;
    pub const REPORT_DATA_READ_FORCE_SEND: u8 = 0x12;
    pub const REPORT_DATA_READ_RESPONSE: u8 = 0x13;
    pub const REPORT_DATA_WRITE: u8 = 0x14;
    pub const REPORT_TRANSFER_STATUS_REQUEST: u8 = 0x15;
    pub const REPORT_TRANSFER_STATUS_RESPONSE: u8 = 0x16;
    pub const REPORT_CANCEL_TRANSFER: u8 = 0x17;

    // HID class requests for feature reports
    pub const HID_GET_REPORT: u8 = 0x01;
    pub const HID_SET_REPORT: u8 = 0x09;
    pub const HID_REPORT_TYPE_FEATURE: u16 = 0x03;

    pub const ENDPOINT_OUT: u8 = 0x01;
    pub const ENDPOINT_IN: u8 = 0x81;
    pub const INTERFACE: u16 = 0;

    // possible values for status 0
    pub const STATUS_IDLE: u8 = 0x00;
    pub const STATUS_BUSY: u8 = 0x01;
    pub const STATUS_COMPLETE: u8 = 0x02;
    pub const STATUS_ERROR: u8 = 0x03;

    // lengths include the report ID
    pub const REPORT_LEN: usize = 64;
    pub const SMBUS_CONFIG_LEN: usize = 14;
}
use constants::*;

// transfer parameters
pub const TIMEOUT: Duration = Duration::from_secs(1);

/// How many unrelated input reports are dropped while waiting for an expected one.
const MAX_STALE_REPORTS: usize = 8;

fn feature_value(report_id: u8) -> u16 {
    (HID_REPORT_TYPE_FEATURE << 8) | report_id as u16
}

fn set_feature(dev: &impl Connection, report: &[u8]) -> rusb::Result<()> {
    let req_type = {
        use rusb::constants::*;
        LIBUSB_REQUEST_TYPE_CLASS | LIBUSB_RECIPIENT_INTERFACE | LIBUSB_ENDPOINT_OUT
    };
    let n_written = dev.write_control(
        req_type,
        HID_SET_REPORT,
        feature_value(report[0]),
        INTERFACE,
        report,
        TIMEOUT,
    )?;
    if n_written != report.len() {
        Err(rusb::Error::Io)
    } else {
        Ok(())
    }
}

fn get_feature(dev: &impl Connection, report: &mut [u8]) -> rusb::Result<()> {
    let req_type = {
        use rusb::constants::*;
        LIBUSB_REQUEST_TYPE_CLASS | LIBUSB_RECIPIENT_INTERFACE | LIBUSB_ENDPOINT_IN
    };
    let n_read = dev.read_control(
        req_type,
        HID_GET_REPORT,
        feature_value(report[0]),
        INTERFACE,
        report,
        TIMEOUT,
    )?;
    if n_read != report.len() {
        Err(rusb::Error::Io)
    } else {
        Ok(())
    }
}

/// Sends an output report, zero-padded to the full report length.
fn send_report(dev: &impl Connection, report_id: u8, payload: &[u8]) -> rusb::Result<()> {
    if payload.len() >= REPORT_LEN {
        return Err(rusb::Error::InvalidParam);
    }
    let mut report = [0u8; REPORT_LEN];
    report[0] = report_id;
    report[1..=payload.len()].copy_from_slice(payload);

    let n_written = dev.write_interrupt(ENDPOINT_OUT, &report, TIMEOUT)?;
    if n_written != REPORT_LEN {
        Err(rusb::Error::Io)
    } else {
        Ok(())
    }
}

/// Receives the next input report with the given ID. Reports with other IDs left over from
/// earlier transfers are dropped.
fn receive_report(dev: &impl Connection, report_id: u8) -> rusb::Result<[u8; REPORT_LEN]> {
    for _ in 0..=MAX_STALE_REPORTS {
        let mut report = [0u8; REPORT_LEN];
        let n_read = dev.read_interrupt(ENDPOINT_IN, &mut report, TIMEOUT)?;
        if n_read == 0 {
            return Err(rusb::Error::Io);
        }
        if report[0] == report_id {
            return Ok(report);
        }
        debug!("dropping stale report {:#04x}", report[0]);
    }
    Err(rusb::Error::Other)
}

fn decode_status(status: u8) -> rusb::Result<TransferStatus> {
    match status {
        STATUS_IDLE => Ok(TransferStatus::Idle),
        STATUS_BUSY => Ok(TransferStatus::Busy),
        STATUS_COMPLETE => Ok(TransferStatus::Complete),
        STATUS_ERROR => Ok(TransferStatus::Error),
        _ => Err(rusb::Error::Other),
    }
}

fn timeout_ms(timeout: Duration) -> rusb::Result<u16> {
    u16::try_from(timeout.as_millis()).map_err(|_| rusb::Error::InvalidParam)
}

pub(crate) fn set_smbus_config(dev: &impl Connection, config: &SmbusConfig) -> rusb::Result<()> {
    let mut report = [0u8; SMBUS_CONFIG_LEN];
    report[0] = REPORT_SMBUS_CONFIG;
    report[1..5].copy_from_slice(&config.clock_hz.to_be_bytes());
    report[5] = config.retry_limit;
    report[6] = config.auto_read_respond as u8;
    report[7..9].copy_from_slice(&timeout_ms(config.write_timeout)?.to_be_bytes());
    report[9..11].copy_from_slice(&timeout_ms(config.read_timeout)?.to_be_bytes());
    report[11] = config.scl_low_timeout as u8;
    report[12..14].copy_from_slice(&config.transfer_retries.to_be_bytes());
    set_feature(dev, &report)
}

pub(crate) fn get_smbus_config(dev: &impl Connection) -> rusb::Result<SmbusConfig> {
    let mut report = [0u8; SMBUS_CONFIG_LEN];
    report[0] = REPORT_SMBUS_CONFIG;
    get_feature(dev, &mut report)?;
    Ok(SmbusConfig {
        clock_hz: u32::from_be_bytes([report[1], report[2], report[3], report[4]]),
        retry_limit: report[5],
        auto_read_respond: report[6] != 0,
        write_timeout: Duration::from_millis(u16::from_be_bytes([report[7], report[8]]) as u64),
        read_timeout: Duration::from_millis(u16::from_be_bytes([report[9], report[10]]) as u64),
        scl_low_timeout: report[11] != 0,
        transfer_retries: u16::from_be_bytes([report[12], report[13]]),
    })
}

pub(crate) fn data_write(dev: &impl Connection, address: u8, data: &[u8]) -> rusb::Result<()> {
    if data.is_empty() || data.len() > MAX_CHUNK_LEN {
        return Err(rusb::Error::InvalidParam);
    }
    let mut payload = [0u8; 2 + MAX_CHUNK_LEN];
    payload[0] = address;
    payload[1] = data.len() as u8; // no truncation, checked above
    payload[2..2 + data.len()].copy_from_slice(data);
    send_report(dev, REPORT_DATA_WRITE, &payload[..2 + data.len()])
}

pub(crate) fn data_read_request(
    dev: &impl Connection,
    address: u8,
    length: u16,
) -> rusb::Result<()> {
    if length == 0 || length > MAX_READ_LEN {
        return Err(rusb::Error::InvalidParam);
    }
    let [hi, lo] = length.to_be_bytes();
    send_report(dev, REPORT_DATA_READ_REQUEST, &[address, hi, lo])
}

pub(crate) fn data_read_force_send(dev: &impl Connection, length: u16) -> rusb::Result<()> {
    if length == 0 || length > MAX_READ_LEN {
        return Err(rusb::Error::InvalidParam);
    }
    send_report(dev, REPORT_DATA_READ_FORCE_SEND, &length.to_be_bytes())
}

pub(crate) fn data_read_response(
    dev: &impl Connection,
    chunk: &mut [u8; MAX_CHUNK_LEN],
) -> rusb::Result<ReadResponse> {
    let report = receive_report(dev, REPORT_DATA_READ_RESPONSE)?;
    let status = decode_status(report[1])?;
    let length = (report[2] as usize).min(MAX_CHUNK_LEN);
    chunk[..length].copy_from_slice(&report[3..3 + length]);
    Ok(ReadResponse { status, length })
}

pub(crate) fn transfer_status_request(dev: &impl Connection) -> rusb::Result<()> {
    send_report(dev, REPORT_TRANSFER_STATUS_REQUEST, &[0x01])
}

pub(crate) fn transfer_status_response(
    dev: &impl Connection,
) -> rusb::Result<TransferStatusResponse> {
    let report = receive_report(dev, REPORT_TRANSFER_STATUS_RESPONSE)?;
    Ok(TransferStatusResponse {
        status: decode_status(report[1])?,
        detailed_status: DetailedStatus(report[2]),
        retries: u16::from_be_bytes([report[3], report[4]]),
        bytes_transferred: u16::from_be_bytes([report[5], report[6]]),
    })
}

/// Receives the answer to an outstanding status request. The bridge answers every request
/// exactly once, so after a busy answer a new request goes out before the next receive.
pub(crate) fn poll_transfer_status(
    dev: &impl Connection,
    request_pending: &mut bool,
) -> rusb::Result<TransferStatusResponse> {
    if !*request_pending {
        transfer_status_request(dev)?;
        *request_pending = true;
    }
    let response = transfer_status_response(dev)?;
    *request_pending = false;
    Ok(response)
}
