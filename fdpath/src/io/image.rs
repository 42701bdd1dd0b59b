use crate::error::{Error, Result};
use crate::io::space::{Address, AddressSpace};
use log::debug;
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fs::File;
use std::io::prelude::*;
use std::io::SeekFrom;

/// A memory snapshot made of disjoint mapped segments.
///
/// Every segment is keyed by the virtual address of its first byte. A read
/// must fall entirely inside a single segment, anything else is reported as
/// an invalid reference just like a hole in a real dump.
#[derive(Debug, Default)]
pub struct MemoryImage {
    segments: BTreeMap<Address, Vec<u8>>,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `bytes` at virtual address `base`, replacing a segment that
    /// starts at the same address.
    pub fn map(&mut self, base: Address, bytes: Vec<u8>) {
        self.segments.insert(base, bytes);
    }

    /// Overwrites already mapped bytes. Used to fabricate images.
    pub fn write(&mut self, addr: Address, bytes: &[u8]) -> Result<()> {
        let (start, segment) = self
            .segments
            .range_mut(..=addr)
            .next_back()
            .ok_or(Error::InvalidReference {
                addr,
                len: bytes.len(),
            })?;
        let offset = (addr - *start) as usize;
        let dest = segment
            .get_mut(offset..offset + bytes.len())
            .ok_or(Error::InvalidReference {
                addr,
                len: bytes.len(),
            })?;
        dest.copy_from_slice(bytes);
        Ok(())
    }

    /// The total number of mapped bytes.
    pub fn mapped_len(&self) -> usize {
        self.segments.values().map(Vec::len).sum()
    }
}

impl AddressSpace for MemoryImage {
    fn read(&self, addr: Address, buf: &mut [u8]) -> Result<()> {
        let len = buf.len();
        let invalid = || Error::InvalidReference { addr, len };
        let (start, segment) = self.segments.range(..=addr).next_back().ok_or_else(invalid)?;
        let offset = usize::try_from(addr - *start).map_err(|_| invalid())?;
        let end = offset.checked_add(len).ok_or_else(invalid)?;
        let src = segment.get(offset..end).ok_or_else(invalid)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

/// A range of the dump file to place at a virtual address.
#[derive(Debug, Clone, Copy)]
struct Segment {
    file_offset: u64,
    vaddr: Address,
    len: usize,
}

/// Loads a raw memory dump from a file.
///
/// Without explicit segments the whole file is mapped contiguously at the
/// base address.
pub struct MemoryImageBuilder {
    fd: File,
    base: Address,
    segments: Vec<Segment>,
}

impl From<File> for MemoryImageBuilder {
    fn from(fd: File) -> Self {
        MemoryImageBuilder {
            fd,
            base: 0,
            segments: Vec::new(),
        }
    }
}

impl MemoryImageBuilder {
    /// Sets the virtual address of the first byte of a flat dump.
    pub fn with_base(mut self, base: Address) -> Self {
        self.base = base;
        self
    }

    /// Maps `len` bytes starting at `file_offset` to `vaddr`, like a loadable
    /// segment of a core file.
    pub fn with_segment(mut self, file_offset: u64, vaddr: Address, len: usize) -> Self {
        self.segments.push(Segment {
            file_offset,
            vaddr,
            len,
        });
        self
    }

    /// Reads the selected ranges into memory. The file is consumed.
    pub fn build(mut self) -> Result<MemoryImage> {
        let mut image = MemoryImage::new();
        if self.segments.is_empty() {
            let mut bytes = Vec::new();
            self.fd.seek(SeekFrom::Start(0))?;
            self.fd.read_to_end(&mut bytes)?;
            debug!("mapped {} byte dump at {:#x}", bytes.len(), self.base);
            image.map(self.base, bytes);
            return Ok(image);
        }

        for segment in self.segments.iter() {
            let mut bytes = vec![0; segment.len];
            self.fd.seek(SeekFrom::Start(segment.file_offset))?;
            self.fd.read_exact(&mut bytes)?;
            debug!(
                "mapped {} bytes from file offset {:#x} at {:#x}",
                segment.len, segment.file_offset, segment.vaddr
            );
            image.map(segment.vaddr, bytes);
        }
        Ok(image)
    }
}
