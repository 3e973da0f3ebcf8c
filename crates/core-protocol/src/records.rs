//! Op record stream reader and writer.
//!
//! The record stream is a contiguous run of `(header, payload)` pairs. The
//! reader only splits and bounds-checks; payload interpretation belongs to
//! the replay interpreter, which owns the per-opcode layouts.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::ProtocolError;

/// 8-byte record header preceding every payload.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct OpRecordHeader {
    opcode: [u8; 2],
    flags: [u8; 2],
    payload_len: [u8; 4],
}

const _: () = assert!(std::mem::size_of::<OpRecordHeader>() == 8);

impl OpRecordHeader {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(opcode: u16, flags: u16, payload_len: u32) -> Self {
        Self {
            opcode: opcode.to_le_bytes(),
            flags: flags.to_le_bytes(),
            payload_len: payload_len.to_le_bytes(),
        }
    }

    pub fn opcode(&self) -> u16 {
        u16::from_le_bytes(self.opcode)
    }
    pub fn flags(&self) -> u16 {
        u16::from_le_bytes(self.flags)
    }
    pub fn payload_len(&self) -> u32 {
        u32::from_le_bytes(self.payload_len)
    }
}

/// Borrowed view of one record: opcode plus its bounded payload.
#[derive(Debug, Clone, Copy)]
pub struct OpRecordView<'a> {
    pub opcode: u16,
    pub flags: u16,
    pub payload: &'a [u8],
}

/// Split a record stream into views, validating that every declared payload
/// fits in the remaining buffer and that the total equals `expected_count`.
pub fn read_op_records(
    records: &[u8],
    expected_count: u32,
) -> Result<Vec<OpRecordView<'_>>, ProtocolError> {
    let mut out = Vec::new();
    let mut off = 0usize;
    while off < records.len() {
        let (hdr, _) = OpRecordHeader::ref_from_prefix(&records[off..])
            .map_err(|_| ProtocolError::TruncatedOpHeader)?;
        off += OpRecordHeader::SIZE;
        let len = hdr.payload_len() as usize;
        if len > records.len() - off {
            return Err(ProtocolError::TruncatedOpPayload);
        }
        out.push(OpRecordView {
            opcode: hdr.opcode(),
            flags: hdr.flags(),
            payload: &records[off..off + len],
        });
        off += len;
    }
    if out.len() != expected_count as usize {
        return Err(ProtocolError::OpCountMismatch {
            expected: expected_count,
            parsed: out.len() as u32,
        });
    }
    Ok(out)
}

/// Little-endian cursor over one record payload. The replay interpreter
/// reads fields through this and then asserts full consumption.
pub struct PayloadCursor<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> PayloadCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, off: 0 }
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        let bytes = self.buf.get(self.off..self.off + 4)?;
        self.off += 4;
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    }

    pub fn read_f64(&mut self) -> Option<f64> {
        let bytes = self.buf.get(self.off..self.off + 8)?;
        self.off += 8;
        Some(f64::from_le_bytes(bytes.try_into().ok()?))
    }

    /// True when every payload byte has been consumed.
    pub fn exhausted(&self) -> bool {
        self.off == self.buf.len()
    }
}

/// Builds record streams. Production streams come from the worker; this
/// writer backs the test fixtures and the in-process worker used by the
/// transport integration suite.
#[derive(Default)]
pub struct RecordWriter {
    bytes: Vec<u8>,
    count: u32,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, opcode: crate::OpCode, payload: &[u8]) -> &mut Self {
        let hdr = OpRecordHeader::new(opcode as u16, 0, payload.len() as u32);
        self.bytes.extend_from_slice(hdr.as_bytes());
        self.bytes.extend_from_slice(payload);
        self.count += 1;
        self
    }

    /// Raw variant for malformed-stream tests.
    pub fn raw_record(&mut self, opcode: u16, payload: &[u8]) -> &mut Self {
        let hdr = OpRecordHeader::new(opcode, 0, payload.len() as u32);
        self.bytes.extend_from_slice(hdr.as_bytes());
        self.bytes.extend_from_slice(payload);
        self.count += 1;
        self
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Payload byte builder matching the little-endian field order each opcode
/// expects.
#[derive(Default)]
pub struct PayloadWriter {
    bytes: Vec<u8>,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn u32(mut self, v: u32) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }
    pub fn f64(mut self, v: f64) -> Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
