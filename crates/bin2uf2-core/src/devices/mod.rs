pub use fpga_bitstream::FPGA_BITSTREAM;
pub use rp2040::RP2040;

use crate::slots::SlotTable;

pub mod fpga_bitstream;
pub mod rp2040;

/// This is a helper struct, which allows you to iterate over every device defined
pub struct DeviceIter {
    inner: std::vec::IntoIter<Box<dyn DeviceInfo>>,
}

impl DeviceIter {
    /// Creates a new DeviceIter
    pub fn new() -> Self {
        Self {
            inner: vec![
                Box::new(RP2040) as Box<dyn DeviceInfo>,
                Box::new(FPGA_BITSTREAM),
            ]
            .into_iter(),
        }
    }

    pub fn find_by_name(name: &str) -> Option<Box<dyn DeviceInfo>> {
        Self::new().find(|device| device.device_name().eq_ignore_ascii_case(name))
    }

    /// Finds the device a UF2 family ID belongs to.
    pub fn find_by_family(family_id: u32) -> Option<Box<dyn DeviceInfo>> {
        Self::new().find(|device| device.family_id() == family_id)
    }
}

impl Default for DeviceIter {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for DeviceIter {
    type Item = Box<dyn DeviceInfo>;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// A target whose bootloader accepts slotted images.
pub trait DeviceInfo {
    /// Returns the proper family id to use for the uf2 device
    fn family_id(&self) -> u32;

    /// Flash regions images can be placed in, indexed by slot number
    fn slot_table(&self) -> SlotTable;

    /// Get the device's name
    fn device_name(&self) -> &'static str;
}
