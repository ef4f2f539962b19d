use crate::bridge::{Adapter, SmbusConfig, MAX_CHUNK_LEN, MAX_READ_LEN};
use crate::cp2112::{Cp2112, UsbBridge};
use crate::protocol::{CP2112_PRODUCT_ID, CP2112_VENDOR_ID};
use crate::transaction::{self, TransactionConfig};
use crate::{error::*, sensor};
use rusb::{GlobalContext, UsbContext};
use std::io::{Read, Write};

/// Plain I2C master on top of an open bridge adapter. Every write waits for the bridge to
/// confirm the transfer; reads are collected from as many responses as needed.
pub struct I2c<A: Adapter> {
    adapter: A,
    config: TransactionConfig,
    address: u8,
}

impl<A: Adapter> I2c<A> {
    pub fn new(adapter: A) -> Self {
        Self::with_config(adapter, TransactionConfig::default())
    }

    pub fn with_config(adapter: A, config: TransactionConfig) -> Self {
        Self {
            adapter,
            config,
            address: 0u8,
        }
    }

    /// Gives the adapter back, e.g. to close it explicitly.
    pub fn into_inner(self) -> A {
        self.adapter
    }
}

impl I2c<Cp2112<GlobalContext>> {
    /// Opens and configures the only CP2112 attached to the system.
    pub fn open_single_device() -> Result<Self> {
        let adapter = sensor::open_single_adapter(
            &UsbBridge::new(),
            CP2112_VENDOR_ID,
            CP2112_PRODUCT_ID,
            &SmbusConfig::default(),
        )?;
        Ok(I2c::new(adapter))
    }
}

impl<T: UsbContext> I2c<Cp2112<T>> {
    pub fn smbus_config(&self) -> Result<SmbusConfig> {
        self.adapter
            .smbus_config()
            .map_err(Error::AdapterConfigFailed)
    }
}

impl<A: Adapter> i2c::Master for I2c<A> {
    type Error = Error;
}

impl<A: Adapter> i2c::Address for I2c<A> {
    fn set_slave_address(&mut self, addr: u16, tenbit: bool) -> Result<()> {
        if tenbit || addr > 0x7f {
            Err(Error::AddressNotSupported)
        } else {
            // the bridge expects the address shifted into the write form
            self.address = (addr as u8) << 1;
            Ok(())
        }
    }
}

impl<A: Adapter> Read for I2c<A> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // longer reads are split by `read_exact`
        let n = buf.len().min(MAX_READ_LEN as usize);
        transaction::read_bytes(&mut self.adapter, self.address, &mut buf[..n], &self.config)?;
        Ok(n)
    }
}

impl<A: Adapter> Write for I2c<A> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        // longer buffers go out in several transfers through `write_all`
        let n = buf.len().min(MAX_CHUNK_LEN);
        transaction::write_command(&mut self.adapter, self.address, &buf[..n], &self.config)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(()) // noop since no buffering is performed
    }
}

// i2c::ReadWrite should be automatically implemented as long as requirements are met
#[allow(dead_code)]
const fn assert_impl_readwrite<T: i2c::ReadWrite>() {}
const _: () = assert_impl_readwrite::<I2c<Cp2112<GlobalContext>>>();
