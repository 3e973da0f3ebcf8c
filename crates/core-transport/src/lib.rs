//! Worker transport: one shared-memory region, one control socket, one
//! subprocess, one outstanding request.
//!
//! The host writes a request into its window, flips the state word, and
//! sends `RUN <seq>`; the worker answers `DONE <seq>` or `ERROR <seq>`
//! after filling the response window. No memory barriers guard the state
//! word: the control-socket line is the ordering edge, so the reader of a
//! state is always the side that just received the line naming it.
//!
//! A transport instance is single-threaded. Requests are serialized by a
//! monotonic sequence counter; a response whose sequence does not match
//! the request just sent is rejected. There is no cancellation: a request
//! either completes or times out, and a timed-out transport is not reused
//! until it is shut down and restarted.

use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use glam::Vec3;
use thiserror::Error;

use core_kernel::{Manifold, MeshData};
use core_protocol::{
    IpcErrorCode, IpcState, NodeKind, ProtocolError, decode_error_payload, decode_scene_sections,
    encode_request,
};
use core_replay::{ReplayError, ReplayLodPolicy, ReplayTables, apply_replay_postprocess};

pub mod control;
pub mod events;
pub mod launcher;
pub mod shm;

pub use events::{log_event, log_event_with};
pub use launcher::{RuntimeLauncher, WorkerHandle, WorkerLauncher};
pub use shm::SharedRegion;

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(3);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Distinguishes per-instance socket/region paths when several transports
/// share a process (tests, future multi-document hosts).
static INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Transport faults. Fatal for the current request; faults before the
/// first successful round trip latch the startup-failed state.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error("transport i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("shared region of {0} bytes is too small for the payload windows")]
    RegionTooSmall(usize),
    #[error("failed to spawn worker: {0}")]
    SpawnFailed(String),
    #[error("timed out waiting for worker to connect")]
    AcceptTimeout,
    #[error("timed out waiting for worker response")]
    ResponseTimeout,
    #[error("worker socket closed unexpectedly")]
    SocketClosed,
    #[error("worker response line too long")]
    LineTooLong,
    #[error("failed writing socket data: {0}")]
    SocketWrite(String),
    #[error("worker socket read failed: {0}")]
    SocketRead(String),
    #[error("unexpected worker response: {0}")]
    UnexpectedResponse(String),
    #[error("worker state is not ResponseReady")]
    StateNotReady,
    #[error("worker sequence mismatch")]
    SequenceMismatch,
    #[error("worker reported an error: {0}")]
    Worker(String),
    #[error("scene object has unsupported root kind")]
    UnsupportedRootKind,
    #[error("failed to compute bounds for scene object {0}")]
    BoundsUnavailable(usize),
    #[error("worker returned no manifold scene objects")]
    NoManifoldObjects,
    #[error("failed to merge scene objects: {0}")]
    MergeFailed(&'static str),
    #[error("transport previously failed; shut down and restart it")]
    PreviouslyFailed,
}

/// Kind of a top-level scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneObjectKind {
    Unknown,
    Manifold,
    CrossSection,
}

/// One closed 2-D contour of a sketch object, lifted into the z = 0 plane.
#[derive(Debug, Clone, Default)]
pub struct SketchContour {
    pub points: Vec<Vec3>,
}

/// A named top-level result of a script run.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub object_id: u64,
    pub name: String,
    pub kind: SceneObjectKind,
    pub root_id: u32,
    pub manifold: Option<Manifold>,
    pub mesh: MeshData,
    pub contours: Vec<SketchContour>,
    pub bmin: Vec3,
    pub bmax: Vec3,
}

/// Scene objects plus the replay tables they were resolved from; the
/// tables feed the dimension lifter and the operation inspector.
#[derive(Debug)]
pub struct SceneOutcome {
    pub objects: Vec<SceneObject>,
    pub tables: ReplayTables,
}

/// Host side of the worker protocol.
pub struct WorkerClient {
    started: bool,
    failed: bool,
    region: Option<SharedRegion>,
    listener: Option<UnixListener>,
    conn: Option<UnixStream>,
    worker: Option<WorkerHandle>,
    next_seq: u64,
    shm_size: usize,
    socket_path: PathBuf,
    shm_path: PathBuf,
    launcher: Box<dyn WorkerLauncher>,
}

impl WorkerClient {
    /// Client with the default runtime launcher and region capacity.
    pub fn new() -> Self {
        Self::with_launcher(Box::new(RuntimeLauncher::default()), core_protocol::DEFAULT_SHM_SIZE)
    }

    pub fn with_launcher(launcher: Box<dyn WorkerLauncher>, shm_size: usize) -> Self {
        let pid = std::process::id();
        let instance = INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp = std::env::temp_dir();
        Self {
            started: false,
            failed: false,
            region: None,
            listener: None,
            conn: None,
            worker: None,
            next_seq: 1,
            shm_size,
            socket_path: tmp.join(format!("vicad-worker-{pid}-{instance}.sock")),
            shm_path: tmp.join(format!("vicad-shm-{pid}-{instance}")),
            launcher,
        }
    }

    pub fn started(&self) -> bool {
        self.started
    }

    /// Idempotent startup: region, listener, worker, bounded accept.
    pub fn start(&mut self) -> Result<(), TransportError> {
        if self.started {
            return Ok(());
        }
        match self.start_inner() {
            Ok(()) => {
                self.started = true;
                events::log_event("WORKER_START", 0);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(target: "transport", error = %e, "worker startup failed");
                self.shutdown();
                Err(e)
            }
        }
    }

    fn start_inner(&mut self) -> Result<(), TransportError> {
        self.region = Some(SharedRegion::create(&self.shm_path, self.shm_size)?);

        let _ = std::fs::remove_file(&self.socket_path);
        let listener = UnixListener::bind(&self.socket_path)?;
        listener.set_nonblocking(true)?;

        self.worker = Some(
            self.launcher
                .launch(&self.socket_path, &self.shm_path, self.shm_size as u64)?,
        );

        let deadline = Instant::now() + ACCEPT_TIMEOUT;
        let conn = loop {
            match listener.accept() {
                Ok((stream, _)) => break stream,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(TransportError::AcceptTimeout);
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => return Err(e.into()),
            }
        };
        conn.set_nonblocking(false)?;
        self.conn = Some(conn);
        self.listener = Some(listener);
        Ok(())
    }

    /// Run the script and decode the scene response into objects plus the
    /// replay tables.
    pub fn execute_script_scene(
        &mut self,
        script_path: &Path,
        lod_policy: &ReplayLodPolicy,
    ) -> Result<SceneOutcome, TransportError> {
        if self.failed {
            return Err(TransportError::PreviouslyFailed);
        }
        let result = self.execute_scene_inner(script_path, lod_policy);
        if matches!(
            result,
            Err(TransportError::ResponseTimeout | TransportError::SocketClosed)
        ) {
            self.failed = true;
        }
        result
    }

    fn execute_scene_inner(
        &mut self,
        script_path: &Path,
        lod_policy: &ReplayLodPolicy,
    ) -> Result<SceneOutcome, TransportError> {
        self.start()?;

        let seq = self.next_seq;
        self.next_seq += 1;

        let path_bytes = script_path.as_os_str().as_encoded_bytes().to_vec();
        {
            let region = self.region.as_mut().ok_or(TransportError::StateNotReady)?;
            let (req_off, resp_off) = {
                let hdr = region.header()?;
                hdr.validate()?;
                (hdr.request_offset() as usize, hdr.response_offset() as usize)
            };
            let req_len = {
                let window = &mut region.bytes_mut()[req_off..resp_off];
                encode_request(window, &path_bytes)?
            };
            let hdr = region.header_mut()?;
            hdr.set_request_seq(seq);
            hdr.set_request_length(req_len as u32);
            hdr.set_response_length(0);
            hdr.set_error_code(IpcErrorCode::None as u32);
            hdr.set_state(IpcState::RequestReady as u32);
        }

        events::log_event_with("RUN", seq, &script_path.display().to_string());
        let conn = self.conn.as_mut().ok_or(TransportError::SocketClosed)?;
        control::send_line(conn, &format!("RUN {seq}\n"))?;
        let line = control::read_line_with_timeout(conn, RESPONSE_TIMEOUT)?;

        let region = self.region.as_ref().ok_or(TransportError::StateNotReady)?;
        if line == format!("ERROR {seq}") {
            let hdr = region.header()?;
            let resp = response_window(region.bytes(), hdr.response_offset(), hdr.response_length())?;
            let payload = decode_error_payload(resp)?;
            let message = if payload.message.is_empty() {
                "Worker reported an error.".to_owned()
            } else {
                payload.message.clone()
            };
            events::log_event_with("SCRIPT_ERROR", seq, &message);
            if !payload.stack.is_empty() {
                tracing::debug!(target: "transport", stack = %payload.stack, file = %payload.file, "worker error context");
            }
            return Err(TransportError::Worker(message));
        }
        if line != format!("DONE {seq}") {
            return Err(TransportError::UnexpectedResponse(line));
        }

        let hdr = region.header()?;
        if hdr.state() != IpcState::ResponseReady as u32 {
            return Err(TransportError::StateNotReady);
        }
        if hdr.response_seq() != seq {
            return Err(TransportError::SequenceMismatch);
        }
        let resp = response_window(region.bytes(), hdr.response_offset(), hdr.response_length())?;
        let sections = decode_scene_sections(resp)?;

        let tables =
            core_replay::replay_ops_to_tables(sections.records, sections.header.op_count, lod_policy)?;

        let mut objects = Vec::with_capacity(sections.objects.len());
        let mut name_off = 0usize;
        for (i, rec) in sections.objects.iter().enumerate() {
            let name_len = rec.name_len() as usize;
            let name = std::str::from_utf8(&sections.names[name_off..name_off + name_len])
                .map_err(|_| ProtocolError::BadUtf8)?
                .to_owned();
            name_off += name_len;

            let object = match NodeKind::from_u32(rec.root_kind()) {
                NodeKind::Manifold => {
                    let manifold =
                        core_replay::resolve_replay_manifold(&tables, rec.root_kind(), rec.root_id())?;
                    let manifold = apply_replay_postprocess(manifold, &lod_policy.postprocess);
                    let mesh = manifold.get_mesh();
                    let (bmin, bmax) = mesh
                        .bounds()
                        .ok_or(TransportError::BoundsUnavailable(i))?;
                    SceneObject {
                        object_id: rec.object_id_hash(),
                        name,
                        kind: SceneObjectKind::Manifold,
                        root_id: rec.root_id(),
                        manifold: Some(manifold),
                        mesh,
                        contours: Vec::new(),
                        bmin: bmin.as_vec3(),
                        bmax: bmax.as_vec3(),
                    }
                }
                NodeKind::CrossSection => {
                    let section = core_replay::resolve_replay_cross_section(
                        &tables,
                        rec.root_kind(),
                        rec.root_id(),
                    )?;
                    let contours: Vec<SketchContour> = section
                        .contours()
                        .iter()
                        .map(|c| SketchContour {
                            points: c
                                .iter()
                                .map(|p| Vec3::new(p.x as f32, p.y as f32, 0.0))
                                .collect(),
                        })
                        .collect();
                    let (bmin, bmax) = sketch_bounds(&contours).unwrap_or((Vec3::ZERO, Vec3::ZERO));
                    SceneObject {
                        object_id: rec.object_id_hash(),
                        name,
                        kind: SceneObjectKind::CrossSection,
                        root_id: rec.root_id(),
                        manifold: None,
                        mesh: MeshData::empty(),
                        contours,
                        bmin,
                        bmax,
                    }
                }
                NodeKind::Unknown => return Err(TransportError::UnsupportedRootKind),
            };
            objects.push(object);
        }

        events::log_event_with("RUN_DONE", seq, &format!("objects={}", objects.len()));
        Ok(SceneOutcome { objects, tables })
    }

    /// Legacy single-mesh path: run the scene and batch-union its manifold
    /// objects. Retained for callers that want one bounds-and-picking
    /// surface; the scene path is the wire contract.
    pub fn execute_script(
        &mut self,
        script_path: &Path,
        lod_policy: &ReplayLodPolicy,
    ) -> Result<MeshData, TransportError> {
        let outcome = self.execute_script_scene(script_path, lod_policy)?;
        let parts: Vec<Manifold> = outcome
            .objects
            .iter()
            .filter_map(|o| o.manifold.clone())
            .collect();
        if parts.is_empty() {
            return Err(TransportError::NoManifoldObjects);
        }
        let merged = Manifold::union_many(&parts);
        if !merged.status().is_ok() {
            return Err(TransportError::MergeFailed(merged.status().name()));
        }
        Ok(merged.get_mesh())
    }

    /// Best-effort teardown: `SHUTDOWN` line, sockets, worker, region.
    /// Every resource is released exactly once.
    pub fn shutdown(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            let _ = control::send_line(conn, "SHUTDOWN\n");
        }
        self.conn = None;
        self.listener = None;
        let _ = std::fs::remove_file(&self.socket_path);
        if let Some(mut worker) = self.worker.take() {
            worker.terminate();
        }
        if let Some(region) = self.region.take() {
            region.destroy();
        }
        if self.started {
            events::log_event("SHUTDOWN", 0);
        }
        self.started = false;
        self.failed = false;
    }
}

impl Default for WorkerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkerClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bounds-checked response window slice.
fn response_window(bytes: &[u8], offset: u32, length: u32) -> Result<&[u8], ProtocolError> {
    let offset = offset as usize;
    let length = length as usize;
    if offset.checked_add(length).is_none_or(|end| end > bytes.len()) {
        return Err(ProtocolError::ResponseOutOfBounds);
    }
    Ok(&bytes[offset..offset + length])
}

/// Sketch bounds with the z axis padded so planar scenes still frame.
fn sketch_bounds(contours: &[SketchContour]) -> Option<(Vec3, Vec3)> {
    let mut mn = Vec3::splat(f32::INFINITY);
    let mut mx = Vec3::splat(f32::NEG_INFINITY);
    let mut any = false;
    for contour in contours {
        for &p in &contour.points {
            if !p.is_finite() {
                continue;
            }
            mn = mn.min(p);
            mx = mx.max(p);
            any = true;
        }
    }
    if !any {
        return None;
    }
    const Z_PAD: f32 = 1.0;
    mn.z -= Z_PAD;
    mx.z += Z_PAD;
    Some((mn, mx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sketch_bounds_pad_z_for_planar_contours() {
        let contours = vec![SketchContour {
            points: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(4.0, 0.0, 0.0),
                Vec3::new(4.0, 2.0, 0.0),
            ],
        }];
        let (mn, mx) = sketch_bounds(&contours).unwrap();
        assert_eq!(mn, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(mx, Vec3::new(4.0, 2.0, 1.0));
    }

    #[test]
    fn response_window_rejects_out_of_bounds() {
        let bytes = vec![0u8; 64];
        assert!(response_window(&bytes, 32, 32).is_ok());
        assert!(response_window(&bytes, 48, 32).is_err());
        assert!(response_window(&bytes, u32::MAX, 16).is_err());
    }
}
