use log::{debug, warn};
use rusb::{Device, DeviceHandle, GlobalContext, UsbContext};

use crate::bridge::{
    Adapter, Bridge, BridgeResult, ReadResponse, SmbusConfig, TransferStatusResponse,
    MAX_CHUNK_LEN,
};
use crate::{protocol, BridgeError};

/// Finds and opens CP2112 adapters through libusb.
#[derive(Debug, Clone)]
pub struct UsbBridge<T: UsbContext> {
    context: T,
}

impl UsbBridge<GlobalContext> {
    pub fn new() -> Self {
        Self {
            context: GlobalContext::default(),
        }
    }
}

impl Default for UsbBridge<GlobalContext> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: UsbContext> UsbBridge<T> {
    pub fn with_context(context: T) -> Self {
        Self { context }
    }

    fn matching_devices(&self, vendor_id: u16, product_id: u16) -> rusb::Result<Vec<Device<T>>> {
        let mut matching = Vec::new();
        for device in self.context.devices()?.iter() {
            let descriptor = device.device_descriptor()?;
            if descriptor.vendor_id() == vendor_id && descriptor.product_id() == product_id {
                matching.push(device);
            }
        }
        Ok(matching)
    }
}

impl<T: UsbContext> Bridge for UsbBridge<T> {
    type Adapter = Cp2112<T>;

    fn enumerate(&self, vendor_id: u16, product_id: u16) -> BridgeResult<u32> {
        let devices = self
            .matching_devices(vendor_id, product_id)
            .map_err(BridgeError::EnumerationFailed)?;
        Ok(devices.len() as u32)
    }

    fn open(&self, index: u32, vendor_id: u16, product_id: u16) -> BridgeResult<Cp2112<T>> {
        let devices = self
            .matching_devices(vendor_id, product_id)
            .map_err(BridgeError::OpenFailed)?;
        let device = devices
            .get(index as usize)
            .ok_or(BridgeError::OpenFailed(rusb::Error::NoDevice))?;
        Cp2112::open(device).map_err(BridgeError::OpenFailed)
    }
}

/// An open CP2112 adapter.
pub struct Cp2112<T: UsbContext> {
    device_handle: DeviceHandle<T>,
    // set while a status request has not been answered yet
    status_pending: bool,
}

impl<T: UsbContext> Cp2112<T> {
    #[inline]
    fn open(device: &Device<T>) -> rusb::Result<Self> {
        let device_handle = device.open()?;
        // the HID driver grabs the interface on most systems
        match device_handle.set_auto_detach_kernel_driver(true) {
            Ok(()) | Err(rusb::Error::NotSupported) => {}
            Err(e) => return Err(e),
        }
        device_handle.claim_interface(0)?;
        debug!(
            "opened CP2112 at bus {} address {}",
            device.bus_number(),
            device.address()
        );
        Ok(Self {
            device_handle,
            status_pending: false,
        })
    }

    /// Reads back the SMBus configuration currently active in the adapter.
    pub fn smbus_config(&self) -> BridgeResult<SmbusConfig> {
        protocol::get_smbus_config(&self.device_handle).map_err(BridgeError::ConfigFailed)
    }
}

impl<T: UsbContext> Adapter for Cp2112<T> {
    fn configure(&mut self, config: &SmbusConfig) -> BridgeResult<()> {
        protocol::set_smbus_config(&self.device_handle, config).map_err(BridgeError::ConfigFailed)
    }

    fn write_request(&mut self, address: u8, data: &[u8]) -> BridgeResult<()> {
        protocol::data_write(&self.device_handle, address, data).map_err(BridgeError::WriteFailed)
    }

    fn read_request(&mut self, address: u8, length: u16) -> BridgeResult<()> {
        protocol::data_read_request(&self.device_handle, address, length)
            .map_err(BridgeError::ReadFailed)
    }

    fn force_read_response(&mut self, length: u16) -> BridgeResult<()> {
        protocol::data_read_force_send(&self.device_handle, length).map_err(BridgeError::ReadFailed)
    }

    fn get_read_response(&mut self, chunk: &mut [u8; MAX_CHUNK_LEN]) -> BridgeResult<ReadResponse> {
        protocol::data_read_response(&self.device_handle, chunk)
            .map_err(BridgeError::ResponseFailed)
    }

    fn request_transfer_status(&mut self) -> BridgeResult<()> {
        protocol::transfer_status_request(&self.device_handle)
            .map_err(BridgeError::StatusFailed)?;
        self.status_pending = true;
        Ok(())
    }

    fn get_transfer_status_response(&mut self) -> BridgeResult<TransferStatusResponse> {
        protocol::poll_transfer_status(&self.device_handle, &mut self.status_pending)
            .map_err(BridgeError::StatusFailed)
    }

    fn close(self) {
        if let Err(e) = self.device_handle.release_interface(0) {
            warn!("failed to release the CP2112 interface: {e}");
        }
        // dropping the handle closes the device
    }
}
