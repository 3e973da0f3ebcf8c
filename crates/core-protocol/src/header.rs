//! Packed shared-memory layouts and their validated decoders.
//!
//! All structs are byte-array fields under `#[repr(C)]` so any bit pattern
//! is valid and casts from untrusted shared memory cannot produce undefined
//! behavior; accessors do the little-endian conversion at the edge. The
//! decoders never index past a validated bound.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{IPC_MAGIC, IPC_VERSION, ProtocolError};

/// 60-byte shared region header at offset 0.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct SharedHeader {
    magic: [u8; 8],
    version: [u8; 4],
    capacity_bytes: [u8; 4],
    request_seq: [u8; 8],
    response_seq: [u8; 8],
    request_offset: [u8; 4],
    request_length: [u8; 4],
    response_offset: [u8; 4],
    response_length: [u8; 4],
    state: [u8; 4],
    error_code: [u8; 4],
    reserved: [u8; 4],
}

const _: () = assert!(std::mem::size_of::<SharedHeader>() == 60);

impl SharedHeader {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Overlay the header at the start of a mapped region.
    pub fn at_start(region: &[u8]) -> Result<&Self, ProtocolError> {
        Self::ref_from_prefix(region)
            .map(|(hdr, _)| hdr)
            .map_err(|_| ProtocolError::BadHeader)
    }

    /// Mutable overlay, used only by the owning host side and by tests
    /// standing in for the worker.
    pub fn at_start_mut(region: &mut [u8]) -> Result<&mut Self, ProtocolError> {
        Self::mut_from_prefix(region)
            .map(|(hdr, _)| hdr)
            .map_err(|_| ProtocolError::BadHeader)
    }

    /// Write a fresh header over a zeroed region.
    pub fn init(&mut self, capacity_bytes: u32, request_offset: u32, response_offset: u32) {
        self.magic = IPC_MAGIC;
        self.set_version(IPC_VERSION);
        self.set_capacity_bytes(capacity_bytes);
        self.set_request_seq(0);
        self.set_response_seq(0);
        self.set_request_offset(request_offset);
        self.set_request_length(0);
        self.set_response_offset(response_offset);
        self.set_response_length(0);
        self.set_state(crate::IpcState::Idle as u32);
        self.set_error_code(crate::IpcErrorCode::None as u32);
        self.reserved = [0; 4];
    }

    /// Magic + version check before any field is trusted.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.magic != IPC_MAGIC {
            return Err(ProtocolError::BadHeader);
        }
        if self.version() != IPC_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: IPC_VERSION,
                got: self.version(),
            });
        }
        Ok(())
    }

    pub fn version(&self) -> u32 {
        u32::from_le_bytes(self.version)
    }
    pub fn set_version(&mut self, v: u32) {
        self.version = v.to_le_bytes();
    }
    pub fn capacity_bytes(&self) -> u32 {
        u32::from_le_bytes(self.capacity_bytes)
    }
    pub fn set_capacity_bytes(&mut self, v: u32) {
        self.capacity_bytes = v.to_le_bytes();
    }
    pub fn request_seq(&self) -> u64 {
        u64::from_le_bytes(self.request_seq)
    }
    pub fn set_request_seq(&mut self, v: u64) {
        self.request_seq = v.to_le_bytes();
    }
    pub fn response_seq(&self) -> u64 {
        u64::from_le_bytes(self.response_seq)
    }
    pub fn set_response_seq(&mut self, v: u64) {
        self.response_seq = v.to_le_bytes();
    }
    pub fn request_offset(&self) -> u32 {
        u32::from_le_bytes(self.request_offset)
    }
    pub fn set_request_offset(&mut self, v: u32) {
        self.request_offset = v.to_le_bytes();
    }
    pub fn request_length(&self) -> u32 {
        u32::from_le_bytes(self.request_length)
    }
    pub fn set_request_length(&mut self, v: u32) {
        self.request_length = v.to_le_bytes();
    }
    pub fn response_offset(&self) -> u32 {
        u32::from_le_bytes(self.response_offset)
    }
    pub fn set_response_offset(&mut self, v: u32) {
        self.response_offset = v.to_le_bytes();
    }
    pub fn response_length(&self) -> u32 {
        u32::from_le_bytes(self.response_length)
    }
    pub fn set_response_length(&mut self, v: u32) {
        self.response_length = v.to_le_bytes();
    }
    pub fn state(&self) -> u32 {
        u32::from_le_bytes(self.state)
    }
    pub fn set_state(&mut self, v: u32) {
        self.state = v.to_le_bytes();
    }
    pub fn error_code(&self) -> u32 {
        u32::from_le_bytes(self.error_code)
    }
    pub fn set_error_code(&mut self, v: u32) {
        self.error_code = v.to_le_bytes();
    }
}

/// Request payload header: `{version, script_path_len}` followed by the raw
/// path bytes.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
struct RequestHeader {
    version: [u8; 4],
    script_path_len: [u8; 4],
}

/// Borrowed view of a decoded request.
pub struct RequestView<'a> {
    pub version: u32,
    pub script_path: &'a [u8],
}

/// Encode a request into the request window. Returns the encoded length.
pub fn encode_request(window: &mut [u8], script_path: &[u8]) -> Result<usize, ProtocolError> {
    let need = std::mem::size_of::<RequestHeader>() + script_path.len();
    if need > window.len() {
        return Err(ProtocolError::RequestTooLarge);
    }
    let hdr = RequestHeader {
        version: IPC_VERSION.to_le_bytes(),
        script_path_len: (script_path.len() as u32).to_le_bytes(),
    };
    window[..8].copy_from_slice(hdr.as_bytes());
    window[8..need].copy_from_slice(script_path);
    Ok(need)
}

/// Decode a request window (used by the in-process worker in tests).
pub fn decode_request(window: &[u8]) -> Result<RequestView<'_>, ProtocolError> {
    let (hdr, rest) =
        RequestHeader::ref_from_prefix(window).map_err(|_| ProtocolError::RequestTruncated)?;
    let version = u32::from_le_bytes(hdr.version);
    if version != IPC_VERSION {
        return Err(ProtocolError::VersionMismatch {
            expected: IPC_VERSION,
            got: version,
        });
    }
    let len = u32::from_le_bytes(hdr.script_path_len) as usize;
    if len > rest.len() {
        return Err(ProtocolError::RequestTruncated);
    }
    Ok(RequestView {
        version,
        script_path: &rest[..len],
    })
}

/// Scene response header, followed by the op record stream, the object
/// table, and the concatenated UTF-8 name blob.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
struct SceneHeaderWire {
    version: [u8; 4],
    object_count: [u8; 4],
    op_count: [u8; 4],
    records_size: [u8; 4],
    diagnostics_len: [u8; 4],
    object_table_size: [u8; 4],
}

/// Decoded scene header fields.
#[derive(Debug, Clone, Copy)]
pub struct SceneHeader {
    pub version: u32,
    pub object_count: u32,
    pub op_count: u32,
    pub records_size: u32,
    pub diagnostics_len: u32,
    pub object_table_size: u32,
}

/// One scene object entry in the object table (24 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct SceneObjectRecord {
    object_id_hash: [u8; 8],
    root_kind: [u8; 4],
    root_id: [u8; 4],
    name_len: [u8; 4],
    reserved: [u8; 4],
}

const _: () = assert!(std::mem::size_of::<SceneObjectRecord>() == 24);

impl SceneObjectRecord {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(object_id_hash: u64, root_kind: u32, root_id: u32, name_len: u32) -> Self {
        Self {
            object_id_hash: object_id_hash.to_le_bytes(),
            root_kind: root_kind.to_le_bytes(),
            root_id: root_id.to_le_bytes(),
            name_len: name_len.to_le_bytes(),
            reserved: [0; 4],
        }
    }

    pub fn object_id_hash(&self) -> u64 {
        u64::from_le_bytes(self.object_id_hash)
    }
    pub fn root_kind(&self) -> u32 {
        u32::from_le_bytes(self.root_kind)
    }
    pub fn root_id(&self) -> u32 {
        u32::from_le_bytes(self.root_id)
    }
    pub fn name_len(&self) -> u32 {
        u32::from_le_bytes(self.name_len)
    }
}

/// Borrowed, fully validated sections of a scene response.
#[derive(Debug)]
pub struct SceneSections<'a> {
    pub header: SceneHeader,
    pub records: &'a [u8],
    pub objects: Vec<SceneObjectRecord>,
    pub names: &'a [u8],
}

/// Split a scene response window into its sections, enforcing every size
/// invariant before anything is handed out.
pub fn decode_scene_sections(window: &[u8]) -> Result<SceneSections<'_>, ProtocolError> {
    let (wire, rest) =
        SceneHeaderWire::ref_from_prefix(window).map_err(|_| ProtocolError::ResponseTooSmall)?;
    let header = SceneHeader {
        version: u32::from_le_bytes(wire.version),
        object_count: u32::from_le_bytes(wire.object_count),
        op_count: u32::from_le_bytes(wire.op_count),
        records_size: u32::from_le_bytes(wire.records_size),
        diagnostics_len: u32::from_le_bytes(wire.diagnostics_len),
        object_table_size: u32::from_le_bytes(wire.object_table_size),
    };
    if header.version != IPC_VERSION {
        return Err(ProtocolError::VersionMismatch {
            expected: IPC_VERSION,
            got: header.version,
        });
    }
    if header.object_count == 0 {
        return Err(ProtocolError::ZeroObjects);
    }
    let expected_table = header.object_count as usize * SceneObjectRecord::SIZE;
    if header.object_table_size as usize != expected_table {
        return Err(ProtocolError::ObjectTableSizeMismatch);
    }
    let records_size = header.records_size as usize;
    let table_size = header.object_table_size as usize;
    let names_size = header.diagnostics_len as usize;
    let need = records_size
        .checked_add(table_size)
        .and_then(|n| n.checked_add(names_size))
        .ok_or(ProtocolError::ResponseTruncated)?;
    if need > rest.len() {
        return Err(ProtocolError::ResponseTruncated);
    }
    let records = &rest[..records_size];
    let table = &rest[records_size..records_size + table_size];
    let names = &rest[records_size + table_size..need];

    let mut objects = Vec::with_capacity(header.object_count as usize);
    let mut name_total = 0usize;
    for chunk in table.chunks_exact(SceneObjectRecord::SIZE) {
        let rec =
            SceneObjectRecord::read_from_bytes(chunk).map_err(|_| ProtocolError::BadHeader)?;
        name_total += rec.name_len() as usize;
        objects.push(rec);
    }
    if name_total != names.len() {
        return Err(ProtocolError::NameBlobTruncated);
    }

    Ok(SceneSections {
        header,
        records,
        objects,
        names,
    })
}

/// Encode a scene payload (worker side; also used by test workers). The
/// object table and name blob must agree: `names[i]` becomes the `name_len`
/// of `objects[i]` and the blobs are concatenated in order.
pub fn encode_scene_payload(
    window: &mut [u8],
    records: &[u8],
    op_count: u32,
    objects: &[SceneObjectRecord],
    names: &[&str],
) -> Result<usize, ProtocolError> {
    debug_assert_eq!(objects.len(), names.len());
    let table_size = objects.len() * SceneObjectRecord::SIZE;
    let names_size: usize = names.iter().map(|n| n.len()).sum();
    let need = std::mem::size_of::<SceneHeaderWire>() + records.len() + table_size + names_size;
    if need > window.len() {
        return Err(ProtocolError::RequestTooLarge);
    }
    let wire = SceneHeaderWire {
        version: IPC_VERSION.to_le_bytes(),
        object_count: (objects.len() as u32).to_le_bytes(),
        op_count: op_count.to_le_bytes(),
        records_size: (records.len() as u32).to_le_bytes(),
        diagnostics_len: (names_size as u32).to_le_bytes(),
        object_table_size: (table_size as u32).to_le_bytes(),
    };
    let mut off = wire.as_bytes().len();
    window[..off].copy_from_slice(wire.as_bytes());
    window[off..off + records.len()].copy_from_slice(records);
    off += records.len();
    for rec in objects {
        window[off..off + SceneObjectRecord::SIZE].copy_from_slice(rec.as_bytes());
        off += SceneObjectRecord::SIZE;
    }
    for name in names {
        window[off..off + name.len()].copy_from_slice(name.as_bytes());
        off += name.len();
    }
    Ok(off)
}

/// Error response header, followed by `file`, `stack`, and `message` UTF-8
/// blobs in that wire order.
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
struct ErrorHeaderWire {
    version: [u8; 4],
    error_code: [u8; 4],
    phase: [u8; 4],
    line: [u8; 4],
    column: [u8; 4],
    run_id: [u8; 8],
    duration_ms: [u8; 4],
    file_len: [u8; 4],
    stack_len: [u8; 4],
    message_len: [u8; 4],
}

const _: () = assert!(std::mem::size_of::<ErrorHeaderWire>() == 44);

/// Decoded worker error payload.
#[derive(Debug, Clone, Default)]
pub struct ErrorPayload {
    pub error_code: u32,
    pub phase: u32,
    pub line: u32,
    pub column: u32,
    pub run_id: u64,
    pub duration_ms: u32,
    pub file: String,
    pub stack: String,
    pub message: String,
}

pub fn decode_error_payload(window: &[u8]) -> Result<ErrorPayload, ProtocolError> {
    let (wire, rest) =
        ErrorHeaderWire::ref_from_prefix(window).map_err(|_| ProtocolError::ResponseTooSmall)?;
    let version = u32::from_le_bytes(wire.version);
    if version != IPC_VERSION {
        return Err(ProtocolError::VersionMismatch {
            expected: IPC_VERSION,
            got: version,
        });
    }
    let file_len = u32::from_le_bytes(wire.file_len) as usize;
    let stack_len = u32::from_le_bytes(wire.stack_len) as usize;
    let message_len = u32::from_le_bytes(wire.message_len) as usize;
    let need = file_len
        .checked_add(stack_len)
        .and_then(|n| n.checked_add(message_len))
        .ok_or(ProtocolError::ResponseTruncated)?;
    if need > rest.len() {
        return Err(ProtocolError::ResponseTruncated);
    }
    let text = |bytes: &[u8]| -> Result<String, ProtocolError> {
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::BadUtf8)
    };
    Ok(ErrorPayload {
        error_code: u32::from_le_bytes(wire.error_code),
        phase: u32::from_le_bytes(wire.phase),
        line: u32::from_le_bytes(wire.line),
        column: u32::from_le_bytes(wire.column),
        run_id: u64::from_le_bytes(wire.run_id),
        duration_ms: u32::from_le_bytes(wire.duration_ms),
        file: text(&rest[..file_len])?,
        stack: text(&rest[file_len..file_len + stack_len])?,
        message: text(&rest[file_len + stack_len..need])?,
    })
}

/// Encode an error payload (worker side; used by tests).
pub fn encode_error_payload(window: &mut [u8], payload: &ErrorPayload) -> Result<usize, ProtocolError> {
    let need = std::mem::size_of::<ErrorHeaderWire>()
        + payload.file.len()
        + payload.stack.len()
        + payload.message.len();
    if need > window.len() {
        return Err(ProtocolError::RequestTooLarge);
    }
    let wire = ErrorHeaderWire {
        version: IPC_VERSION.to_le_bytes(),
        error_code: payload.error_code.to_le_bytes(),
        phase: payload.phase.to_le_bytes(),
        line: payload.line.to_le_bytes(),
        column: payload.column.to_le_bytes(),
        run_id: payload.run_id.to_le_bytes(),
        duration_ms: payload.duration_ms.to_le_bytes(),
        file_len: (payload.file.len() as u32).to_le_bytes(),
        stack_len: (payload.stack.len() as u32).to_le_bytes(),
        message_len: (payload.message.len() as u32).to_le_bytes(),
    };
    let mut off = wire.as_bytes().len();
    window[..off].copy_from_slice(wire.as_bytes());
    for blob in [
        payload.file.as_bytes(),
        payload.stack.as_bytes(),
        payload.message.as_bytes(),
    ] {
        window[off..off + blob.len()].copy_from_slice(blob);
        off += blob.len();
    }
    Ok(off)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IpcState;

    #[test]
    fn header_init_and_validate() {
        let mut region = vec![0u8; 4096];
        let hdr = SharedHeader::at_start_mut(&mut region).unwrap();
        hdr.init(4096, 256, 2048);
        assert!(hdr.validate().is_ok());
        assert_eq!(hdr.capacity_bytes(), 4096);
        assert_eq!(hdr.state(), IpcState::Idle as u32);

        region[0] = b'X';
        let hdr = SharedHeader::at_start(&region).unwrap();
        assert_eq!(hdr.validate(), Err(ProtocolError::BadHeader));
    }

    #[test]
    fn request_round_trip() {
        let mut window = vec![0u8; 128];
        let n = encode_request(&mut window, b"model.vicad.ts").unwrap();
        assert_eq!(n, 8 + 14);
        let view = decode_request(&window).unwrap();
        assert_eq!(view.script_path, b"model.vicad.ts");
    }

    #[test]
    fn request_rejects_overflow() {
        let mut window = vec![0u8; 16];
        let err = encode_request(&mut window, &[b'p'; 64]).unwrap_err();
        assert_eq!(err, ProtocolError::RequestTooLarge);
    }

    fn scene_window(
        object_count: u32,
        table: &[SceneObjectRecord],
        names: &[u8],
        records: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::new();
        let table_bytes: Vec<u8> = table.iter().flat_map(|r| r.as_bytes().to_vec()).collect();
        let wire = SceneHeaderWire {
            version: IPC_VERSION.to_le_bytes(),
            object_count: object_count.to_le_bytes(),
            op_count: 0u32.to_le_bytes(),
            records_size: (records.len() as u32).to_le_bytes(),
            diagnostics_len: (names.len() as u32).to_le_bytes(),
            object_table_size: (table_bytes.len() as u32).to_le_bytes(),
        };
        out.extend_from_slice(wire.as_bytes());
        out.extend_from_slice(records);
        out.extend_from_slice(&table_bytes);
        out.extend_from_slice(names);
        out
    }

    #[test]
    fn scene_sections_validate_table_and_names() {
        let table = [
            SceneObjectRecord::new(7, 1, 3, 4),
            SceneObjectRecord::new(9, 2, 1, 5),
        ];
        let window = scene_window(2, &table, b"bodyplate", &[]);
        let sections = decode_scene_sections(&window).unwrap();
        assert_eq!(sections.objects.len(), 2);
        assert_eq!(sections.objects[0].object_id_hash(), 7);
        assert_eq!(sections.names, b"bodyplate");
    }

    #[test]
    fn scene_sections_reject_zero_objects() {
        let window = scene_window(0, &[], &[], &[]);
        assert_eq!(
            decode_scene_sections(&window).unwrap_err(),
            ProtocolError::ZeroObjects
        );
    }

    #[test]
    fn scene_sections_reject_table_size_mismatch() {
        // object_count says 2 but the table carries a single record.
        let table = [SceneObjectRecord::new(7, 1, 3, 0)];
        let window = scene_window(2, &table, &[], &[]);
        assert_eq!(
            decode_scene_sections(&window).unwrap_err(),
            ProtocolError::ObjectTableSizeMismatch
        );
    }

    #[test]
    fn scene_sections_reject_name_blob_mismatch() {
        let table = [SceneObjectRecord::new(7, 1, 3, 4)];
        let window = scene_window(1, &table, b"body-too-long", &[]);
        assert_eq!(
            decode_scene_sections(&window).unwrap_err(),
            ProtocolError::NameBlobTruncated
        );
    }

    #[test]
    fn error_payload_round_trip_preserves_wire_order() {
        let payload = ErrorPayload {
            error_code: 2,
            phase: 3,
            line: 12,
            column: 4,
            run_id: 99,
            duration_ms: 250,
            file: "model.vicad.ts".into(),
            stack: "at main".into(),
            message: "boom".into(),
        };
        let mut window = vec![0u8; 256];
        let n = encode_error_payload(&mut window, &payload).unwrap();
        let decoded = decode_error_payload(&window[..n]).unwrap();
        assert_eq!(decoded.message, "boom");
        assert_eq!(decoded.file, "model.vicad.ts");
        assert_eq!(decoded.stack, "at main");
        assert_eq!(decoded.run_id, 99);
    }

    #[test]
    fn error_payload_rejects_truncated_strings() {
        let payload = ErrorPayload {
            message: "a long message".into(),
            ..Default::default()
        };
        let mut window = vec![0u8; 256];
        let n = encode_error_payload(&mut window, &payload).unwrap();
        assert_eq!(
            decode_error_payload(&window[..n - 3]).unwrap_err(),
            ProtocolError::ResponseTruncated
        );
    }
}
