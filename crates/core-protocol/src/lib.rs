//! Wire protocol shared between the vicad host and the script worker.
//!
//! One shared-memory region carries bulk payloads; a stream socket carries
//! newline-terminated control lines (`RUN <seq>` / `DONE <seq>` /
//! `ERROR <seq>` / `SHUTDOWN`). This crate owns the bit-exact layout of the
//! region header, the request/response payloads, and the op record stream,
//! plus the validated readers over them. Nothing here touches sockets,
//! processes, or geometry; higher crates compose those.
//!
//! Layout rules:
//! * every multi-byte integer is little-endian;
//! * structs are packed, expressed as byte-array fields with accessor
//!   methods so they can be cast from untrusted shared memory without
//!   alignment or validity hazards;
//! * every decoder validates bounds before dereferencing and refuses
//!   overlong variable-length fields.

use thiserror::Error;

pub mod header;
pub mod records;

pub use header::{
    ErrorPayload, RequestView, SceneHeader, SceneObjectRecord, SceneSections, SharedHeader,
    decode_error_payload, decode_request, decode_scene_sections, encode_error_payload,
    encode_request, encode_scene_payload,
};
pub use records::{
    OpRecordHeader, OpRecordView, PayloadCursor, PayloadWriter, RecordWriter, read_op_records,
};

/// Magic bytes at offset 0 of the shared region.
pub const IPC_MAGIC: [u8; 8] = *b"VCADIPC1";
/// Protocol version carried by the header and every payload.
pub const IPC_VERSION: u32 = 3;
/// Default shared region capacity (100 MiB).
pub const DEFAULT_SHM_SIZE: usize = 100 * 1024 * 1024;
/// Default offset of the request window.
pub const DEFAULT_REQUEST_OFFSET: u32 = 4096;
/// Default offset of the response window.
pub const DEFAULT_RESPONSE_OFFSET: u32 = 1024 * 1024;

/// State word in the shared header. Transitions are ordered by control-socket
/// lines, not by memory barriers: the reader of a state is always the side
/// that just received the line naming it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum IpcState {
    Idle = 0,
    RequestReady = 1,
    RequestRunning = 2,
    ResponseReady = 3,
    ResponseError = 4,
    Shutdown = 5,
}

impl IpcState {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Idle),
            1 => Some(Self::RequestReady),
            2 => Some(Self::RequestRunning),
            3 => Some(Self::ResponseReady),
            4 => Some(Self::ResponseError),
            5 => Some(Self::Shutdown),
            _ => None,
        }
    }
}

/// Error code written by the worker alongside `ResponseError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum IpcErrorCode {
    None = 0,
    InvalidRequest = 1,
    ScriptFailure = 2,
    EncodeFailure = 3,
    DecodeFailure = 4,
    ReplayFailure = 5,
    Timeout = 6,
    InternalError = 7,
}

/// Phase tag inside the error payload, for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum IpcErrorPhase {
    Unknown = 0,
    RequestDecode = 1,
    ScriptLoad = 2,
    ScriptExecute = 3,
    SceneEncode = 4,
    ResponseDecode = 5,
    Transport = 6,
}

/// Which table a node id resolves into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum NodeKind {
    #[default]
    Unknown = 0,
    Manifold = 1,
    CrossSection = 2,
}

impl NodeKind {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => Self::Manifold,
            2 => Self::CrossSection,
            _ => Self::Unknown,
        }
    }
}

/// Construction opcodes. Each record writes exactly one `out_id`; the
/// payload layout per opcode is fixed by the decoder in `core-replay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OpCode {
    Sphere = 1,
    Cube = 2,
    Cylinder = 3,
    Union = 4,
    Subtract = 5,
    Intersect = 6,
    Translate = 7,
    Rotate = 8,
    Scale = 9,
    Extrude = 10,
    Revolve = 11,
    Slice = 12,
    CrossCircle = 100,
    CrossSquare = 101,
    CrossTranslate = 102,
    CrossRotate = 103,
    CrossRect = 104,
    CrossPoint = 105,
    CrossPolygons = 106,
    CrossFillet = 107,
    CrossOffsetClone = 108,
}

impl OpCode {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(Self::Sphere),
            2 => Some(Self::Cube),
            3 => Some(Self::Cylinder),
            4 => Some(Self::Union),
            5 => Some(Self::Subtract),
            6 => Some(Self::Intersect),
            7 => Some(Self::Translate),
            8 => Some(Self::Rotate),
            9 => Some(Self::Scale),
            10 => Some(Self::Extrude),
            11 => Some(Self::Revolve),
            12 => Some(Self::Slice),
            100 => Some(Self::CrossCircle),
            101 => Some(Self::CrossSquare),
            102 => Some(Self::CrossTranslate),
            103 => Some(Self::CrossRotate),
            104 => Some(Self::CrossRect),
            105 => Some(Self::CrossPoint),
            106 => Some(Self::CrossPolygons),
            107 => Some(Self::CrossFillet),
            108 => Some(Self::CrossOffsetClone),
            _ => None,
        }
    }

    /// Stable display name used by the operation inspector and traces.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sphere => "Sphere",
            Self::Cube => "Cube",
            Self::Cylinder => "Cylinder",
            Self::Union => "Union",
            Self::Subtract => "Subtract",
            Self::Intersect => "Intersect",
            Self::Translate => "Translate",
            Self::Rotate => "Rotate",
            Self::Scale => "Scale",
            Self::Extrude => "Extrude",
            Self::Revolve => "Revolve",
            Self::Slice => "Slice",
            Self::CrossCircle => "CrossCircle",
            Self::CrossSquare => "CrossSquare",
            Self::CrossTranslate => "CrossTranslate",
            Self::CrossRotate => "CrossRotate",
            Self::CrossRect => "CrossRect",
            Self::CrossPoint => "CrossPoint",
            Self::CrossPolygons => "CrossPolygons",
            Self::CrossFillet => "CrossFillet",
            Self::CrossOffsetClone => "CrossOffsetClone",
        }
    }
}

/// Failures while decoding wire data. Every variant is terminal for the
/// enclosing request; no partial state escapes a failed decode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("shared memory header is invalid")]
    BadHeader,
    #[error("protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },
    #[error("script path is too long for request buffer")]
    RequestTooLarge,
    #[error("request payload is truncated")]
    RequestTruncated,
    #[error("response payload is too small")]
    ResponseTooSmall,
    #[error("response payload is out of bounds")]
    ResponseOutOfBounds,
    #[error("response payload is truncated")]
    ResponseTruncated,
    #[error("scene has zero objects")]
    ZeroObjects,
    #[error("scene object table size mismatch")]
    ObjectTableSizeMismatch,
    #[error("scene name blob is truncated")]
    NameBlobTruncated,
    #[error("truncated op header")]
    TruncatedOpHeader,
    #[error("truncated op payload")]
    TruncatedOpPayload,
    #[error("op count mismatch: expected {expected}, parsed {parsed}")]
    OpCountMismatch { expected: u32, parsed: u32 },
    #[error("string field is not valid UTF-8")]
    BadUtf8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trips_through_u16() {
        for code in [
            OpCode::Sphere,
            OpCode::Union,
            OpCode::Slice,
            OpCode::CrossCircle,
            OpCode::CrossOffsetClone,
        ] {
            assert_eq!(OpCode::from_u16(code as u16), Some(code));
        }
        assert_eq!(OpCode::from_u16(13), None);
        assert_eq!(OpCode::from_u16(999), None);
    }

    #[test]
    fn ipc_state_rejects_out_of_range() {
        assert_eq!(IpcState::from_u32(3), Some(IpcState::ResponseReady));
        assert_eq!(IpcState::from_u32(6), None);
    }

    #[test]
    fn node_kind_maps_unknown_values_to_unknown() {
        assert_eq!(NodeKind::from_u32(1), NodeKind::Manifold);
        assert_eq!(NodeKind::from_u32(2), NodeKind::CrossSection);
        assert_eq!(NodeKind::from_u32(77), NodeKind::Unknown);
    }
}
