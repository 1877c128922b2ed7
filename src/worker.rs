use std::sync::Arc;
use std::thread;
use std::time::Duration;
use log::{debug, error};
use crossbeam_channel::{unbounded, Receiver, Sender, RecvTimeoutError};
use parking_lot::RwLock;

use crate::rendering::MeshHandle;
use crate::voxel::VoxelMap;
use crate::voxel::mesh::MeshCompiler;

// A compile of an owned snapshot, so the caller may keep mutating its own map
#[derive(Debug)]
pub struct CompileRequest {
    pub id: u64,
    pub map: Arc<VoxelMap>,
    pub limit: Option<usize>,
}

#[derive(Debug)]
pub struct CompiledMesh {
    pub id: u64,
    pub limit: Option<usize>,
    pub mesh: MeshHandle,
}

/// Compiles meshes on a background thread. Requests that pile up while a
/// compile is running are coalesced: only the newest one is compiled.
/// A compile that has started always runs to completion.
pub struct MeshWorker {
    thread: Option<thread::JoinHandle<()>>,
    request_sender: Option<Sender<CompileRequest>>,
    result_receiver: Receiver<CompiledMesh>,
    is_busy: Arc<RwLock<bool>>,
    next_id: u64,
}

impl MeshWorker {
    pub fn new(compiler: MeshCompiler) -> Self {
        let (request_sender, request_receiver) = unbounded();
        let (result_sender, result_receiver) = unbounded();
        let is_busy = Arc::new(RwLock::new(false));
        let is_busy_clone = Arc::clone(&is_busy);

        let thread = thread::spawn(move || {
            Self::worker_thread(compiler, request_receiver, result_sender, is_busy_clone);
        });

        Self {
            thread: Some(thread),
            request_sender: Some(request_sender),
            result_receiver,
            is_busy,
            next_id: 0,
        }
    }

    fn worker_thread(
        compiler: MeshCompiler,
        request_receiver: Receiver<CompileRequest>,
        result_sender: Sender<CompiledMesh>,
        is_busy: Arc<RwLock<bool>>,
    ) {
        debug!("Mesh worker started");

        while let Ok(mut request) = request_receiver.recv() {
            // Skip to the newest queued request
            let mut skipped = 0;
            while let Ok(newer) = request_receiver.try_recv() {
                request = newer;
                skipped += 1;
            }
            if skipped > 0 {
                debug!("Mesh worker coalesced {} stale requests", skipped);
            }

            *is_busy.write() = true;

            let buffers = compiler.compile(&request.map, request.limit);
            let result = CompiledMesh {
                id: request.id,
                limit: request.limit,
                mesh: MeshHandle::assemble(buffers),
            };

            *is_busy.write() = false;

            if let Err(e) = result_sender.send(result) {
                error!("Mesh worker failed to send result: {:?}", e.0.id);
                break;
            }
        }

        debug!("Mesh worker exiting - channel closed");
    }

    /// Queues a compile and returns its request id. Ids increase
    /// monotonically.
    pub fn submit(&mut self, map: Arc<VoxelMap>, limit: Option<usize>) -> Option<u64> {
        let sender = self.request_sender.as_ref()?;
        self.next_id += 1;
        let id = self.next_id;

        match sender.send(CompileRequest { id, map, limit }) {
            Ok(()) => Some(id),
            Err(e) => {
                error!("Failed to submit compile request {}", e.0.id);
                None
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        *self.is_busy.read()
    }

    // Newest finished mesh, discarding older ones
    pub fn try_recv_latest(&self) -> Option<CompiledMesh> {
        self.result_receiver.try_iter().last()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<CompiledMesh> {
        match self.result_receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                error!("Mesh worker stopped unexpectedly");
                None
            }
        }
    }
}

impl Drop for MeshWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.request_sender.take();

        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }

        debug!("MeshWorker shut down, thread joined");
    }
}
