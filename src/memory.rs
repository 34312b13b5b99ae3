//! Flat, byte-addressable, bounds-checked memory.

use crate::error::{Error, Result};
use crate::instruction::Width;

/// 1024*1024 = 1MB
pub const MEMORY_SIZE: usize = 1_048_576;

/// A validated byte offset into memory.
pub type Address = u32;

pub struct Memory {
  bytes: Vec<u8>
}

impl Memory {

  pub fn new(capacity: usize) -> Memory {
    Memory {
      bytes: vec![0; capacity]
    }
  }

  pub fn capacity(&self) -> usize {
    self.bytes.len()
  }

  /// Checks that `[address, address + width)` lies inside memory.
  pub fn check(&self, address: i64, width: Width) -> Result<Address> {
    let size = width.bytes();
    match address >= 0 && address + size as i64 <= self.capacity() as i64 {
      true  => Ok(address as Address),
      false => Err(Error::OutOfBounds{ address, size, capacity: self.capacity() })
    }
  }

  /// Little-endian read of `width` bytes. The result is zero-extended.
  pub fn read(&self, address: Address, width: Width) -> Result<u32> {
    let start = self.check(address as i64, width)? as usize;
    let value =
      self.bytes[start..start + width.bytes() as usize]
        .iter()
        .enumerate()
        .fold(0u32, |value, (i, byte)| value | (*byte as u32) << (8 * i));
    Ok(value)
  }

  /// Little-endian write of the low `width` bytes of `value`.
  pub fn write(&mut self, address: Address, width: Width, value: u32) -> Result<()> {
    let start = self.check(address as i64, width)? as usize;
    for (i, byte) in self.bytes[start..start + width.bytes() as usize].iter_mut().enumerate() {
      *byte = (value >> (8 * i)) as u8;
    }
    Ok(())
  }

  /// Copies a data image to the bottom of memory.
  pub fn load_image(&mut self, image: &[u8]) -> Result<()> {
    if image.len() > self.capacity() {
      return Err(Error::ImageTooLarge{ size: image.len(), capacity: self.capacity() });
    }
    self.bytes[..image.len()].copy_from_slice(image);
    Ok(())
  }

  pub fn clear(&mut self) {
    for byte in self.bytes.iter_mut() {
      *byte = 0;
    }
  }
}
