//! Byte-addressable ROM and RAM backing stores.
//!
//! Both stores hold bytes in bus order and assemble wider accesses big-endian.
//! The offset into the store is the raw address masked by the store size, so
//! every mirror of a region reaches the same bytes.

use crate::memory::access::{AccessSet, BusContext, MemoryHandler};
use crate::CoreError;

fn checked_store(size: usize, fill: u8) -> Result<Box<[u8]>, CoreError> {
    if size == 0 || !size.is_power_of_two() {
        return Err(CoreError::StorageSizeNotPowerOfTwo { size });
    }
    Ok(vec![fill; size].into_boxed_slice())
}

fn offset(bytes: &[u8], addr: u32) -> usize {
    addr as usize & (bytes.len() - 1)
}

fn load<const N: usize>(bytes: &[u8], addr: u32) -> [u8; N] {
    let mut out = [0; N];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = bytes[offset(bytes, addr.wrapping_add(i as u32))];
    }
    out
}

fn store(bytes: &mut [u8], addr: u32, value: &[u8]) {
    for (i, &byte) in value.iter().enumerate() {
        let at = offset(bytes, addr.wrapping_add(i as u32));
        bytes[at] = byte;
    }
}

/// Read-only image such as the boot ROM; writes are open bus.
#[derive(Debug, Clone)]
pub struct RomHandler {
    bytes: Box<[u8]>,
}

impl RomHandler {
    /// Creates a ROM of `size` bytes holding `image`, padded with `0xFF`.
    ///
    /// # Errors
    ///
    /// Fails when `size` is not a power of two or `image` is larger than it.
    pub fn new(size: usize, image: &[u8]) -> Result<Self, CoreError> {
        let mut bytes = checked_store(size, 0xFF)?;
        if image.len() > size {
            return Err(CoreError::ImageTooLarge {
                len: image.len(),
                capacity: size,
            });
        }
        bytes[..image.len()].copy_from_slice(image);
        Ok(Self { bytes })
    }

    /// Image contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl MemoryHandler for RomHandler {
    fn accesses(&self) -> AccessSet {
        AccessSet::READ_ALL
    }

    fn read8(&mut self, addr: u32, _ctx: &mut BusContext<'_>) -> u8 {
        self.bytes[offset(&self.bytes, addr)]
    }

    fn read16(&mut self, addr: u32, _ctx: &mut BusContext<'_>) -> u16 {
        u16::from_be_bytes(load(&self.bytes, addr))
    }

    fn read32(&mut self, addr: u32, _ctx: &mut BusContext<'_>) -> u32 {
        u32::from_be_bytes(load(&self.bytes, addr))
    }
}

/// Zero-initialized read/write memory.
#[derive(Debug, Clone)]
pub struct RamHandler {
    bytes: Box<[u8]>,
}

impl RamHandler {
    /// Creates `size` bytes of zeroed RAM.
    ///
    /// # Errors
    ///
    /// Fails when `size` is not a power of two.
    pub fn new(size: usize) -> Result<Self, CoreError> {
        Ok(Self {
            bytes: checked_store(size, 0)?,
        })
    }

    /// Copies `data` in at byte offset `at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ImageTooLarge`] when the data runs past the end.
    pub fn load(&mut self, at: usize, data: &[u8]) -> Result<(), CoreError> {
        let end = at.checked_add(data.len()).filter(|&end| end <= self.bytes.len());
        let Some(end) = end else {
            return Err(CoreError::ImageTooLarge {
                len: at.saturating_add(data.len()),
                capacity: self.bytes.len(),
            });
        };
        self.bytes[at..end].copy_from_slice(data);
        Ok(())
    }

    /// Memory contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl MemoryHandler for RamHandler {
    fn accesses(&self) -> AccessSet {
        AccessSet::ALL
    }

    fn read8(&mut self, addr: u32, _ctx: &mut BusContext<'_>) -> u8 {
        self.bytes[offset(&self.bytes, addr)]
    }

    fn read16(&mut self, addr: u32, _ctx: &mut BusContext<'_>) -> u16 {
        u16::from_be_bytes(load(&self.bytes, addr))
    }

    fn read32(&mut self, addr: u32, _ctx: &mut BusContext<'_>) -> u32 {
        u32::from_be_bytes(load(&self.bytes, addr))
    }

    fn write8(&mut self, addr: u32, value: u8, _ctx: &mut BusContext<'_>) {
        store(&mut self.bytes, addr, &[value]);
    }

    fn write16(&mut self, addr: u32, value: u16, _ctx: &mut BusContext<'_>) {
        store(&mut self.bytes, addr, &value.to_be_bytes());
    }

    fn write32(&mut self, addr: u32, value: u32, _ctx: &mut BusContext<'_>) {
        store(&mut self.bytes, addr, &value.to_be_bytes());
    }
}
