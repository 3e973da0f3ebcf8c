//! Shared-memory region backing the bulk payload windows.
//!
//! The region is a regular file mapped on both sides; its path is the
//! identifier handed to the worker. The creating side owns the file and
//! unlinks it on shutdown.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use core_protocol::{
    DEFAULT_REQUEST_OFFSET, DEFAULT_RESPONSE_OFFSET, ProtocolError, SharedHeader,
};

use crate::TransportError;

/// A mapped shared region. `owner` regions delete their backing file when
/// destroyed.
#[derive(Debug)]
pub struct SharedRegion {
    path: PathBuf,
    map: MmapMut,
    owner: bool,
}

impl SharedRegion {
    /// Create, size, zero, and map a fresh region, then write its header.
    pub fn create(path: &Path, size: usize) -> Result<Self, TransportError> {
        if size < DEFAULT_RESPONSE_OFFSET as usize {
            return Err(TransportError::RegionTooSmall(size));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size as u64)?;
        // Safety: the map lives as long as `self`; the file stays open via
        // the mapping and is written only through it.
        let map = unsafe { MmapMut::map_mut(&file)? };
        let mut region = Self {
            path: path.to_path_buf(),
            map,
            owner: true,
        };
        let hdr = SharedHeader::at_start_mut(&mut region.map)?;
        hdr.init(size as u32, DEFAULT_REQUEST_OFFSET, DEFAULT_RESPONSE_OFFSET);
        Ok(region)
    }

    /// Map an existing region created by the peer (worker side).
    pub fn open(path: &Path) -> Result<Self, TransportError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let map = unsafe { MmapMut::map_mut(&file)? };
        if map.len() < SharedHeader::SIZE {
            return Err(TransportError::Protocol(ProtocolError::BadHeader));
        }
        Ok(Self {
            path: path.to_path_buf(),
            map,
            owner: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }

    pub fn header(&self) -> Result<&SharedHeader, ProtocolError> {
        SharedHeader::at_start(&self.map)
    }

    pub fn header_mut(&mut self) -> Result<&mut SharedHeader, ProtocolError> {
        SharedHeader::at_start_mut(&mut self.map)
    }

    /// Unmap and, for the owner, unlink the backing file.
    pub fn destroy(self) {
        let path = self.path.clone();
        let owner = self.owner;
        drop(self);
        if owner {
            let _ = std::fs::remove_file(path);
        }
    }
}
