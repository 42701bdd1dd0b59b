use crate::error::{Error, Result};
use zerocopy::byteorder::{LittleEndian, U16, U32, U64};
use zerocopy::FromBytes;

/// A virtual address inside the snapshot.
pub type Address = u64;

/// Read-only view of the memory captured in a snapshot.
///
/// Implementations translate a virtual address into bytes. There is no write
/// half: a snapshot is analysed, never modified.
pub trait AddressSpace {
    /// Fills `buf` with the bytes starting at `addr`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidReference` when any byte of the range is not
    /// present in the snapshot.
    fn read(&self, addr: Address, buf: &mut [u8]) -> Result<()>;

    /// Reads a little-endian unsigned integer of `width` bytes (1, 2, 4 or 8).
    fn read_unsigned(&self, addr: Address, width: usize) -> Result<u64> {
        let mut buf = [0u8; 8];
        let bytes = buf.get_mut(..width).ok_or_else(|| {
            Error::StructuralAnomaly(format!("unsupported integer width {}", width))
        })?;
        self.read(addr, bytes)?;

        let value = match width {
            1 => Some(u64::from(bytes[0])),
            2 => U16::<LittleEndian>::read_from(&bytes[..]).map(|v| u64::from(v.get())),
            4 => U32::<LittleEndian>::read_from(&bytes[..]).map(|v| u64::from(v.get())),
            8 => U64::<LittleEndian>::read_from(&bytes[..]).map(|v| v.get()),
            _ => None,
        };
        value.ok_or_else(|| Error::StructuralAnomaly(format!("unsupported integer width {}", width)))
    }

    /// Reads a pointer of the given width, zero-extended to 64 bits.
    fn read_pointer(&self, addr: Address, width: usize) -> Result<Address> {
        self.read_unsigned(addr, width)
    }
}

impl<T: AddressSpace + ?Sized> AddressSpace for &T {
    fn read(&self, addr: Address, buf: &mut [u8]) -> Result<()> {
        (**self).read(addr, buf)
    }
}
