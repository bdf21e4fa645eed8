//! Caller-facing highlight client
//!
//! Mirrors each buffer's content and version locally, forwards requests to
//! the worker, and turns worker responses into [`HighlightEvent`]s.
//!
//! Edits bump the local version immediately, before the worker has seen
//! them. A highlight response is only surfaced when its version equals the
//! local version at the moment it is received; anything older is dropped.

use std::collections::{HashMap, VecDeque};
use std::ops::Range;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use ropey::Rope;

use crate::buffer::{translate_rope, BufferId, Edit, TextMutation};
use crate::config::HighlightConfig;
use crate::error::EngineError;
use crate::perf::{PerformanceStats, PerformanceTracker};
use crate::syntax::HighlightResponse;
use crate::worker::{spawn_worker, WorkerRequest, WorkerResponse};

/// Events delivered to the rendering layer
#[derive(Debug, Clone, PartialEq)]
pub enum HighlightEvent {
    HighlightsResponse {
        buffer_id: BufferId,
        version: u64,
        responses: Vec<HighlightResponse>,
    },
    BufferInitialized {
        buffer_id: BufferId,
        has_parser: bool,
    },
    BufferDisposed {
        buffer_id: BufferId,
    },
    Error {
        buffer_id: Option<BufferId>,
        message: String,
    },
    Warning {
        buffer_id: Option<BufferId>,
        message: String,
    },
}

/// Local copy of a buffer
#[derive(Debug)]
struct Mirror {
    version: u64,
    content: Rope,
    disposed: bool,
}

pub struct HighlightClient {
    requests: Sender<WorkerRequest>,
    responses: Receiver<WorkerResponse>,
    worker: Option<JoinHandle<()>>,
    ready: bool,
    /// Set once readiness timed out; every later call fails
    poisoned: bool,
    started: Instant,
    init_timeout: Duration,
    /// Requests made before the worker was ready, in order
    pending: Vec<WorkerRequest>,
    buffers: HashMap<BufferId, Mirror>,
    events: VecDeque<HighlightEvent>,
    perf: PerformanceTracker,
}

impl HighlightClient {
    /// Start a worker thread and connect to it
    pub fn spawn(config: &HighlightConfig) -> Result<Self, EngineError> {
        let handle = spawn_worker(config).map_err(|e| {
            tracing::error!("Failed to start highlight worker: {}", e);
            EngineError::WorkerUnavailable
        })?;
        let mut client = Self::from_channels(handle.requests, handle.responses, config);
        client.worker = Some(handle.thread);
        Ok(client)
    }

    /// Connect to a worker through existing channels
    pub fn from_channels(
        requests: Sender<WorkerRequest>,
        responses: Receiver<WorkerResponse>,
        config: &HighlightConfig,
    ) -> Self {
        Self {
            requests,
            responses,
            worker: None,
            ready: false,
            poisoned: false,
            started: Instant::now(),
            init_timeout: config.init_timeout(),
            pending: Vec::new(),
            buffers: HashMap::new(),
            events: VecDeque::new(),
            perf: PerformanceTracker::new(config.perf_window),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Block until the worker reports ready or the init timeout passes
    pub fn wait_ready(&mut self) -> Result<(), EngineError> {
        while !self.ready {
            self.check_alive()?;
            let remaining = self.init_timeout.saturating_sub(self.started.elapsed());
            match self.responses.recv_timeout(remaining) {
                Ok(response) => self.handle_response(response)?,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(EngineError::WorkerUnavailable),
            }
        }
        Ok(())
    }

    pub fn register_buffer(
        &mut self,
        id: BufferId,
        filetype: &str,
        content: &str,
    ) -> Result<(), EngineError> {
        self.check_alive()?;
        if let Some(mirror) = self.buffers.get(&id) {
            return Err(if mirror.disposed {
                EngineError::BufferDisposed(id)
            } else {
                EngineError::AlreadyRegistered(id)
            });
        }

        self.buffers.insert(
            id,
            Mirror {
                version: 0,
                content: Rope::from_str(content),
                disposed: false,
            },
        );
        self.send(WorkerRequest::Register {
            id,
            filetype: filetype.to_string(),
            content: content.to_string(),
        })
    }

    /// Apply an edit to the local mirror and forward it.
    ///
    /// The edit is validated against the mirror first; a malformed edit is
    /// rejected here and changes nothing. Returns the new local version.
    pub fn apply_edit(
        &mut self,
        id: BufferId,
        edit: Edit,
        new_content: String,
    ) -> Result<u64, EngineError> {
        self.check_alive()?;
        let mirror = live_mirror(&mut self.buffers, id)?;
        edit.validate_rope(&mirror.content, &new_content)
            .map_err(|reason| EngineError::EditRejected {
                buffer_id: id,
                reason,
            })?;

        let start = mirror.content.byte_to_char(edit.start_index);
        let end = mirror.content.byte_to_char(edit.old_end_index);
        mirror.content.remove(start..end);
        mirror
            .content
            .insert(start, &new_content[edit.start_index..edit.new_end_index]);

        let expected_version = mirror.version;
        mirror.version += 1;
        let version = mirror.version;

        self.send(WorkerRequest::Edit {
            id,
            edit,
            new_content,
            expected_version,
        })?;
        Ok(version)
    }

    /// Translate a raw mutation into an edit, apply it locally and forward it
    pub fn apply_mutation(
        &mut self,
        id: BufferId,
        mutation: &TextMutation,
    ) -> Result<u64, EngineError> {
        self.check_alive()?;
        let mirror = live_mirror(&mut self.buffers, id)?;
        let (edit, new_content) = translate_rope(&mirror.content, mutation).map_err(|reason| {
            EngineError::EditRejected {
                buffer_id: id,
                reason,
            }
        })?;

        let start = mirror.content.byte_to_char(mutation.range.start);
        let end = mirror.content.byte_to_char(mutation.range.end);
        mirror.content.remove(start..end);
        mirror.content.insert(start, &mutation.text);

        let expected_version = mirror.version;
        mirror.version += 1;
        let version = mirror.version;

        self.send(WorkerRequest::Edit {
            id,
            edit,
            new_content,
            expected_version,
        })?;
        Ok(version)
    }

    /// Ask for highlights of rows `lines` at the current local version
    pub fn request_highlights(
        &mut self,
        id: BufferId,
        lines: Range<usize>,
    ) -> Result<(), EngineError> {
        self.check_alive()?;
        let version = live_mirror(&mut self.buffers, id)?.version;
        self.send(WorkerRequest::Query { id, version, lines })
    }

    pub fn dispose_buffer(&mut self, id: BufferId) -> Result<(), EngineError> {
        self.check_alive()?;
        let mirror = live_mirror(&mut self.buffers, id)?;
        mirror.disposed = true;
        mirror.content = Rope::new();
        self.send(WorkerRequest::Dispose { id })
    }

    /// Current local version of a live buffer
    pub fn version(&self, id: BufferId) -> Option<u64> {
        self.buffers
            .get(&id)
            .filter(|m| !m.disposed)
            .map(|m| m.version)
    }

    /// Current local content of a live buffer
    pub fn content(&self, id: BufferId) -> Option<String> {
        self.buffers
            .get(&id)
            .filter(|m| !m.disposed)
            .map(|m| m.content.to_string())
    }

    /// Whether a response tagged `version` matches what the caller displays
    pub fn is_current(&self, id: BufferId, version: u64) -> bool {
        self.buffers
            .get(&id)
            .is_some_and(|m| !m.disposed && m.version == version)
    }

    /// Drain everything the worker has sent so far, without blocking
    pub fn poll_events(&mut self) -> Result<Vec<HighlightEvent>, EngineError> {
        loop {
            match self.responses.try_recv() {
                Ok(response) => self.handle_response(response)?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.events.is_empty() {
                        return Err(EngineError::WorkerUnavailable);
                    }
                    break;
                }
            }
        }
        self.check_alive()?;
        Ok(self.events.drain(..).collect())
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// Before the worker is ready this fails with `InitTimeout` as soon as
    /// the init window closes, even if `timeout` is longer.
    pub fn next_event(&mut self, timeout: Duration) -> Result<Option<HighlightEvent>, EngineError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self.events.pop_front() {
                return Ok(Some(event));
            }
            self.check_alive()?;

            let now = Instant::now();
            let mut remaining = deadline.saturating_duration_since(now);
            if !self.ready {
                // Wake at the readiness deadline so a missed init surfaces
                let init_deadline = self.started + self.init_timeout;
                remaining = remaining.min(init_deadline.saturating_duration_since(now));
            }
            match self.responses.recv_timeout(remaining) {
                Ok(response) => self.handle_response(response)?,
                Err(RecvTimeoutError::Timeout) => {
                    self.check_alive()?;
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(EngineError::WorkerUnavailable),
            }
        }
    }

    /// Rolling parse and query timings reported by the worker
    pub fn performance_stats(&self) -> PerformanceStats {
        self.perf.stats()
    }

    fn check_alive(&mut self) -> Result<(), EngineError> {
        if self.poisoned {
            return Err(EngineError::InitTimeout(self.init_timeout));
        }
        if !self.ready && self.started.elapsed() >= self.init_timeout {
            // Ready may already be queued
            while let Ok(response) = self.responses.try_recv() {
                self.handle_response(response)?;
                if self.ready {
                    return Ok(());
                }
            }
            tracing::error!(
                "highlight worker not ready after {:?}, giving up",
                self.init_timeout
            );
            self.poisoned = true;
            self.pending.clear();
            return Err(EngineError::InitTimeout(self.init_timeout));
        }
        Ok(())
    }

    fn send(&mut self, request: WorkerRequest) -> Result<(), EngineError> {
        if !self.ready {
            tracing::trace!("worker not ready, queueing {:?}", request.buffer_id());
            self.pending.push(request);
            return Ok(());
        }
        self.requests
            .send(request)
            .map_err(|_| EngineError::WorkerUnavailable)
    }

    fn handle_response(&mut self, response: WorkerResponse) -> Result<(), EngineError> {
        match response {
            WorkerResponse::Ready => {
                self.ready = true;
                tracing::debug!(
                    "highlight worker ready, flushing {} queued requests",
                    self.pending.len()
                );
                for request in std::mem::take(&mut self.pending) {
                    self.requests
                        .send(request)
                        .map_err(|_| EngineError::WorkerUnavailable)?;
                }
            }
            WorkerResponse::Initialized { id, has_parser } => {
                if self.version(id).is_some() {
                    self.events.push_back(HighlightEvent::BufferInitialized {
                        buffer_id: id,
                        has_parser,
                    });
                }
            }
            WorkerResponse::Parsed { parse_ms, .. } => self.perf.record_parse(parse_ms),
            WorkerResponse::Highlights {
                id,
                version,
                responses,
                query_ms,
                ..
            } => {
                self.perf.record_query(query_ms);
                if self.is_current(id, version) {
                    self.events.push_back(HighlightEvent::HighlightsResponse {
                        buffer_id: id,
                        version,
                        responses,
                    });
                } else {
                    tracing::trace!(
                        "dropping stale highlights for buffer {} (version {}, local {:?})",
                        id,
                        version,
                        self.version(id)
                    );
                }
            }
            WorkerResponse::Disposed { id } => {
                self.events
                    .push_back(HighlightEvent::BufferDisposed { buffer_id: id });
            }
            WorkerResponse::Error { id, message } => {
                self.events.push_back(HighlightEvent::Error {
                    buffer_id: id,
                    message,
                });
            }
            WorkerResponse::Warning { id, message } => {
                self.events.push_back(HighlightEvent::Warning {
                    buffer_id: id,
                    message,
                });
            }
        }
        Ok(())
    }
}

fn live_mirror(
    buffers: &mut HashMap<BufferId, Mirror>,
    id: BufferId,
) -> Result<&mut Mirror, EngineError> {
    match buffers.get_mut(&id) {
        Some(mirror) if mirror.disposed => Err(EngineError::BufferDisposed(id)),
        Some(mirror) => Ok(mirror),
        None => Err(EngineError::UnknownBuffer(id)),
    }
}

impl Drop for HighlightClient {
    fn drop(&mut self) {
        let _ = self.requests.send(WorkerRequest::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("highlight worker thread panicked");
            }
        }
    }
}
