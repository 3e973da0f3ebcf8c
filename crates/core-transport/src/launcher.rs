//! Worker process seam.
//!
//! Production launches the configured script runtime as a subprocess; the
//! integration tests drive the same socket and shared-memory contract from
//! an in-process thread. Either way the transport owns exactly one handle
//! and releases it once on shutdown.

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

use crate::TransportError;

/// Launches the worker for a transport instance.
pub trait WorkerLauncher: Send {
    fn launch(
        &self,
        socket_path: &Path,
        shm_path: &Path,
        shm_size: u64,
    ) -> Result<WorkerHandle, TransportError>;
}

/// Whatever `launch` produced; terminated exactly once.
pub enum WorkerHandle {
    Process(Child),
    Thread(Option<JoinHandle<()>>),
}

impl WorkerHandle {
    /// Stop the worker: signal and reap a process, or join a test thread.
    pub fn terminate(&mut self) {
        match self {
            WorkerHandle::Process(child) => {
                let _ = child.kill();
                let _ = child.wait();
            }
            WorkerHandle::Thread(handle) => {
                if let Some(h) = handle.take() {
                    let _ = h.join();
                }
            }
        }
    }
}

/// Default launcher: `<runtime> <script> --socket <path> --shm <name>
/// --size <bytes>`. The runtime binary is a deployment detail; the three
/// named arguments are the contract.
pub struct RuntimeLauncher {
    pub program: String,
    pub worker_script: String,
}

impl Default for RuntimeLauncher {
    fn default() -> Self {
        Self {
            program: "bun".to_owned(),
            worker_script: "worker/worker.ts".to_owned(),
        }
    }
}

impl WorkerLauncher for RuntimeLauncher {
    fn launch(
        &self,
        socket_path: &Path,
        shm_path: &Path,
        shm_size: u64,
    ) -> Result<WorkerHandle, TransportError> {
        let child = Command::new(&self.program)
            .arg(&self.worker_script)
            .arg("--socket")
            .arg(socket_path)
            .arg("--shm")
            .arg(shm_path)
            .arg("--size")
            .arg(shm_size.to_string())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| TransportError::SpawnFailed(e.to_string()))?;
        tracing::info!(
            target: "transport",
            program = %self.program,
            pid = child.id(),
            "spawned script worker"
        );
        Ok(WorkerHandle::Process(child))
    }
}
