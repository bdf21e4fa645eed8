//! Highlight worker
//!
//! A dedicated thread that owns the buffer registry and every parser and
//! tree. It talks to the outside world only through typed messages, so no
//! parse state is ever touched from two threads.
//!
//! ```text
//! WorkerRequest ──mpsc──▶ [highlight-worker] ──mpsc──▶ WorkerResponse
//! ```
//!
//! Requests are handled in the order they were sent. Each wake-up drains
//! everything queued; a query is skipped when a later query in the same
//! batch asks for the same buffer and lines at a newer version.

use std::collections::HashMap;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::buffer::{BufferId, BufferRegistry, BufferState, Edit, LineIndex};
use crate::config::HighlightConfig;
use crate::error::EngineError;
use crate::perf::as_millis_f64;
use crate::syntax::{grammars, HighlightEngine, HighlightResponse, LanguageId};

/// Messages from the client to the worker
#[derive(Debug, Clone)]
pub enum WorkerRequest {
    Register {
        id: BufferId,
        filetype: String,
        content: String,
    },
    Edit {
        id: BufferId,
        edit: Edit,
        new_content: String,
        /// Version the client saw before making this edit
        expected_version: u64,
    },
    Query {
        id: BufferId,
        version: u64,
        lines: Range<usize>,
    },
    Dispose {
        id: BufferId,
    },
    Shutdown,
}

impl WorkerRequest {
    pub fn buffer_id(&self) -> Option<BufferId> {
        match self {
            WorkerRequest::Register { id, .. }
            | WorkerRequest::Edit { id, .. }
            | WorkerRequest::Query { id, .. }
            | WorkerRequest::Dispose { id } => Some(*id),
            WorkerRequest::Shutdown => None,
        }
    }
}

/// Messages from the worker to the client
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerResponse {
    /// Grammars are loaded and requests will be served
    Ready,
    Initialized {
        id: BufferId,
        has_parser: bool,
    },
    /// A full or incremental parse finished
    Parsed {
        id: BufferId,
        version: u64,
        parse_ms: f64,
    },
    Highlights {
        id: BufferId,
        /// Buffer version the highlights were computed against
        version: u64,
        lines: Range<usize>,
        responses: Vec<HighlightResponse>,
        query_ms: f64,
    },
    Disposed {
        id: BufferId,
    },
    Error {
        id: Option<BufferId>,
        message: String,
    },
    Warning {
        id: Option<BufferId>,
        message: String,
    },
}

impl WorkerResponse {
    fn error(err: &EngineError) -> Self {
        WorkerResponse::Error {
            id: err.buffer_id(),
            message: err.to_string(),
        }
    }
}

/// Channel ends and thread handle of a running worker
pub struct WorkerHandle {
    pub requests: Sender<WorkerRequest>,
    pub responses: Receiver<WorkerResponse>,
    pub thread: JoinHandle<()>,
}

/// Start the worker on its own thread
pub fn spawn_worker(config: &HighlightConfig) -> std::io::Result<WorkerHandle> {
    let (req_tx, req_rx) = mpsc::channel();
    let (resp_tx, resp_rx) = mpsc::channel();
    let state = WorkerState::new(config);

    let thread = thread::Builder::new()
        .name("highlight-worker".into())
        .spawn(move || run(state, req_rx, resp_tx))?;

    Ok(WorkerHandle {
        requests: req_tx,
        responses: resp_rx,
        thread,
    })
}

fn run(
    mut state: WorkerState,
    requests: Receiver<WorkerRequest>,
    responses: Sender<WorkerResponse>,
) {
    let set = grammars();
    for (lang, reason) in set.failures() {
        let warning = WorkerResponse::Warning {
            id: None,
            message: format!("{} grammar unavailable: {}", lang.display_name(), reason),
        };
        if responses.send(warning).is_err() {
            return;
        }
    }
    if responses.send(WorkerResponse::Ready).is_err() {
        return;
    }
    tracing::debug!("highlight worker ready");

    while let Ok(first) = requests.recv() {
        let mut batch = vec![first];
        batch.extend(requests.try_iter());

        for request in coalesce(batch) {
            if matches!(request, WorkerRequest::Shutdown) {
                tracing::debug!("highlight worker shutting down");
                return;
            }
            for response in state.handle_guarded(request) {
                if responses.send(response).is_err() {
                    tracing::debug!("client gone, stopping highlight worker");
                    return;
                }
            }
        }
    }
}

/// Drop queries superseded by a later query in the same batch
pub(crate) fn coalesce(batch: Vec<WorkerRequest>) -> Vec<WorkerRequest> {
    let superseded: Vec<bool> = batch
        .iter()
        .enumerate()
        .map(|(i, request)| match request {
            WorkerRequest::Query { id, version, lines } => {
                batch[i + 1..].iter().any(|later| {
                    matches!(
                        later,
                        WorkerRequest::Query {
                            id: later_id,
                            version: later_version,
                            lines: later_lines,
                        } if later_id == id && later_lines == lines && later_version > version
                    )
                })
            }
            _ => false,
        })
        .collect();

    batch
        .into_iter()
        .zip(superseded)
        .filter_map(|(request, skip)| {
            if skip {
                tracing::trace!("skipping superseded query {:?}", request);
                None
            } else {
                Some(request)
            }
        })
        .collect()
}

/// Everything the worker thread owns
pub(crate) struct WorkerState {
    registry: BufferRegistry,
    engine: HighlightEngine,
    /// Line maps keyed by the version they were built for
    line_indexes: HashMap<BufferId, (u64, LineIndex)>,
    /// Makes edits to this buffer panic after the registry has accepted them
    #[cfg(test)]
    panic_on_edit: Option<BufferId>,
}

impl WorkerState {
    pub(crate) fn new(config: &HighlightConfig) -> Self {
        Self {
            registry: BufferRegistry::new(),
            engine: HighlightEngine::new(config.injections.clone()),
            line_indexes: HashMap::new(),
            #[cfg(test)]
            panic_on_edit: None,
        }
    }

    /// Handle one request, turning a panic into an error response
    pub(crate) fn handle_guarded(&mut self, request: WorkerRequest) -> Vec<WorkerResponse> {
        let id = request.buffer_id();
        match panic::catch_unwind(AssertUnwindSafe(|| self.handle(request))) {
            Ok(responses) => responses,
            Err(payload) => {
                let reason = if let Some(s) = payload.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                tracing::error!("highlight worker panicked on buffer {:?}: {}", id, reason);
                if let Some(id) = id {
                    // The tree may be half-updated; the next edit reparses from scratch
                    self.engine.forget(id);
                    self.line_indexes.remove(&id);
                    let _ = self.registry.set_state(id, BufferState::Registered);
                }
                vec![WorkerResponse::Error {
                    id,
                    message: format!("internal worker error: {}", reason),
                }]
            }
        }
    }

    fn handle(&mut self, request: WorkerRequest) -> Vec<WorkerResponse> {
        let result = match request {
            WorkerRequest::Register {
                id,
                filetype,
                content,
            } => self.register(id, &filetype, content),
            WorkerRequest::Edit {
                id,
                edit,
                new_content,
                expected_version,
            } => self.edit(id, &edit, new_content, expected_version),
            WorkerRequest::Query { id, version, lines } => self.query(id, version, lines),
            WorkerRequest::Dispose { id } => self.dispose(id),
            WorkerRequest::Shutdown => Ok(Vec::new()),
        };
        result.unwrap_or_else(|err| {
            tracing::debug!("request failed: {}", err);
            vec![WorkerResponse::error(&err)]
        })
    }

    fn register(
        &mut self,
        id: BufferId,
        filetype: &str,
        content: String,
    ) -> Result<Vec<WorkerResponse>, EngineError> {
        let buffer = self.registry.register(id, filetype, content)?;
        let language = buffer.language;
        let mut responses = Vec::new();

        if !HighlightEngine::supports(language) {
            if LanguageId::lookup(filetype).is_none() {
                responses.push(WorkerResponse::Warning {
                    id: Some(id),
                    message: format!("no parser available for filetype '{}'", filetype),
                });
            }
            responses.push(WorkerResponse::Initialized {
                id,
                has_parser: false,
            });
            return Ok(responses);
        }

        let started = Instant::now();
        let parsed = self.reparse_full(id)?;
        responses.push(WorkerResponse::Initialized {
            id,
            has_parser: parsed,
        });
        if parsed {
            responses.push(WorkerResponse::Parsed {
                id,
                version: 0,
                parse_ms: as_millis_f64(started.elapsed()),
            });
        }
        Ok(responses)
    }

    fn reparse_full(&mut self, id: BufferId) -> Result<bool, EngineError> {
        let buffer = self.registry.get(id)?;
        let parsed = self
            .engine
            .parse_full(id, buffer.language, &buffer.content);
        let state = if parsed {
            BufferState::Parsed
        } else {
            BufferState::Registered
        };
        self.registry.set_state(id, state)?;
        Ok(parsed)
    }

    fn edit(
        &mut self,
        id: BufferId,
        edit: &Edit,
        new_content: String,
        expected_version: u64,
    ) -> Result<Vec<WorkerResponse>, EngineError> {
        let version = self
            .registry
            .apply_edit(id, edit, new_content, expected_version)?;

        #[cfg(test)]
        if self.panic_on_edit == Some(id) {
            panic!("injected parser failure for buffer {}", id);
        }

        let buffer = self.registry.get(id)?;
        if !HighlightEngine::supports(buffer.language) {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let parsed = if self.engine.has_tree(id) {
            self.engine.apply_edit(id, edit, &buffer.content)
        } else {
            self.reparse_full(id)?
        };
        if !parsed {
            self.registry.set_state(id, BufferState::Registered)?;
            return Ok(vec![WorkerResponse::Warning {
                id: Some(id),
                message: format!("reparse failed at version {}", version),
            }]);
        }
        self.registry.mark_parsed(id)?;

        Ok(vec![WorkerResponse::Parsed {
            id,
            version,
            parse_ms: as_millis_f64(started.elapsed()),
        }])
    }

    fn query(
        &mut self,
        id: BufferId,
        version: u64,
        lines: Range<usize>,
    ) -> Result<Vec<WorkerResponse>, EngineError> {
        let buffer = self.registry.get(id)?;
        if buffer.version != version {
            tracing::trace!(
                "query for buffer {} at version {} answered at version {}",
                id,
                version,
                buffer.version
            );
        }
        let current = buffer.version;

        let started = Instant::now();
        let responses = if buffer.has_parser() {
            let cached = self
                .line_indexes
                .entry(id)
                .or_insert_with(|| (current, LineIndex::new(buffer.content.as_bytes())));
            if cached.0 != current {
                *cached = (current, LineIndex::new(buffer.content.as_bytes()));
            }
            self.engine
                .highlight_window(id, &buffer.content, &cached.1, lines.clone())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(vec![WorkerResponse::Highlights {
            id,
            version: current,
            lines,
            responses,
            query_ms: as_millis_f64(started.elapsed()),
        }])
    }

    fn dispose(&mut self, id: BufferId) -> Result<Vec<WorkerResponse>, EngineError> {
        self.registry.dispose(id)?;
        self.engine.forget(id);
        self.line_indexes.remove(&id);
        Ok(vec![WorkerResponse::Disposed { id }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn query(id: u64, version: u64, lines: Range<usize>) -> WorkerRequest {
        WorkerRequest::Query {
            id: BufferId(id),
            version,
            lines,
        }
    }

    fn register(
        state: &mut WorkerState,
        id: u64,
        filetype: &str,
        content: &str,
    ) -> Vec<WorkerResponse> {
        state.handle_guarded(WorkerRequest::Register {
            id: BufferId(id),
            filetype: filetype.into(),
            content: content.into(),
        })
    }

    #[test]
    fn test_coalesce_drops_superseded_queries() {
        let batch = vec![
            query(1, 0, 0..10),
            query(2, 0, 0..10),
            query(1, 0, 10..20),
            query(1, 1, 0..10),
        ];
        let kept = coalesce(batch);
        assert_eq!(kept.len(), 3);
        assert!(matches!(
            kept[0],
            WorkerRequest::Query { id: BufferId(2), .. }
        ));
        assert!(matches!(
            kept[2],
            WorkerRequest::Query { version: 1, .. }
        ));
    }

    #[test]
    fn test_coalesce_keeps_everything_else() {
        let batch = vec![
            WorkerRequest::Dispose { id: BufferId(1) },
            query(1, 3, 0..5),
            query(1, 3, 0..5),
        ];
        assert_eq!(coalesce(batch).len(), 3);
    }

    #[test]
    fn test_register_reports_parser() {
        let mut state = WorkerState::new(&HighlightConfig::default());
        let responses = register(&mut state, 1, "rust", "fn main() {}\n");
        assert_eq!(
            responses[0],
            WorkerResponse::Initialized {
                id: BufferId(1),
                has_parser: true
            }
        );
        assert!(matches!(
            responses[1],
            WorkerResponse::Parsed { version: 0, .. }
        ));

        let responses = register(&mut state, 2, "text", "hello");
        assert_eq!(
            responses,
            vec![WorkerResponse::Initialized {
                id: BufferId(2),
                has_parser: false
            }]
        );
    }

    #[test]
    fn test_unknown_filetype_warns_but_registers() {
        let mut state = WorkerState::new(&HighlightConfig::default());
        let responses = register(&mut state, 1, "cobol", "IDENTIFICATION DIVISION.");
        assert!(matches!(
            responses[0],
            WorkerResponse::Warning {
                id: Some(BufferId(1)),
                ..
            }
        ));
        assert!(matches!(
            responses[1],
            WorkerResponse::Initialized { has_parser: false, .. }
        ));

        let responses = state.handle_guarded(query(1, 0, 0..1));
        assert!(matches!(
            &responses[0],
            WorkerResponse::Highlights { responses, .. } if responses.is_empty()
        ));
    }

    #[test]
    fn test_edit_then_query_is_tagged_with_new_version() {
        let mut state = WorkerState::new(&HighlightConfig::default());
        register(&mut state, 1, "json", "[1]");

        let edit = Edit::from_offsets("[1]", "[1, 2]", 2, 2, 5);
        let responses = state.handle_guarded(WorkerRequest::Edit {
            id: BufferId(1),
            edit,
            new_content: "[1, 2]".into(),
            expected_version: 0,
        });
        assert!(matches!(
            responses[0],
            WorkerResponse::Parsed { version: 1, .. }
        ));

        let responses = state.handle_guarded(query(1, 1, 0..1));
        let WorkerResponse::Highlights {
            version, responses, ..
        } = &responses[0]
        else {
            panic!("expected highlights, got {:?}", responses);
        };
        assert_eq!(*version, 1);
        let numbers = responses[0]
            .highlights
            .iter()
            .filter(|r| r.group_name() == "number")
            .count();
        assert_eq!(numbers, 2);
    }

    #[test]
    fn test_rejected_edit_is_an_error_for_that_buffer() {
        let mut state = WorkerState::new(&HighlightConfig::default());
        register(&mut state, 1, "json", "[1]");

        let edit = Edit::from_offsets("[1]", "[1, 2]", 2, 2, 5);
        let responses = state.handle_guarded(WorkerRequest::Edit {
            id: BufferId(1),
            edit,
            new_content: "[9, 2]".into(),
            expected_version: 0,
        });
        assert!(matches!(
            responses[0],
            WorkerResponse::Error { id: Some(BufferId(1)), .. }
        ));
        assert_eq!(state.registry.get(BufferId(1)).unwrap().version, 0);
    }

    #[test]
    fn test_disposed_buffer_queries_fail() {
        let mut state = WorkerState::new(&HighlightConfig::default());
        register(&mut state, 4, "rust", "");
        assert_eq!(
            state.handle_guarded(WorkerRequest::Dispose { id: BufferId(4) }),
            vec![WorkerResponse::Disposed { id: BufferId(4) }]
        );
        let responses = state.handle_guarded(query(4, 0, 0..1));
        assert_eq!(
            responses,
            vec![WorkerResponse::error(&EngineError::BufferDisposed(BufferId(4)))]
        );
    }

    #[test]
    fn test_panic_becomes_error_and_buffer_recovers() {
        let mut state = WorkerState::new(&HighlightConfig::default());
        register(&mut state, 1, "json", "[1]");
        register(&mut state, 2, "json", "[2]");
        state.panic_on_edit = Some(BufferId(1));

        let edit = Edit::from_offsets("[1]", "[1, 2]", 2, 2, 5);
        let responses = state.handle_guarded(WorkerRequest::Edit {
            id: BufferId(1),
            edit,
            new_content: "[1, 2]".into(),
            expected_version: 0,
        });
        let [WorkerResponse::Error {
            id: Some(BufferId(1)),
            message,
        }] = responses.as_slice()
        else {
            panic!("expected one error, got {:?}", responses);
        };
        assert!(message.contains("internal worker error"), "{}", message);
        assert!(!state.engine.has_tree(BufferId(1)));
        let buffer = state.registry.get(BufferId(1)).unwrap();
        assert_eq!(buffer.state, BufferState::Registered);
        assert_eq!(buffer.version, 1);

        // Other buffers keep their trees and answer queries
        assert!(state.engine.has_tree(BufferId(2)));
        let responses = state.handle_guarded(query(2, 0, 0..1));
        assert!(matches!(
            &responses[0],
            WorkerResponse::Highlights { responses, .. } if !responses.is_empty()
        ));

        // The next edit rebuilds the tree from scratch
        state.panic_on_edit = None;
        let edit = Edit::from_offsets("[1, 2]", "[1, 2, 3]", 5, 5, 8);
        let responses = state.handle_guarded(WorkerRequest::Edit {
            id: BufferId(1),
            edit,
            new_content: "[1, 2, 3]".into(),
            expected_version: 1,
        });
        assert!(matches!(
            responses[0],
            WorkerResponse::Parsed { version: 2, .. }
        ));
        assert!(state.engine.has_tree(BufferId(1)));
        assert!(state.registry.get(BufferId(1)).unwrap().has_parser());

        let responses = state.handle_guarded(query(1, 2, 0..1));
        let WorkerResponse::Highlights { responses, .. } = &responses[0] else {
            panic!("expected highlights, got {:?}", responses);
        };
        let numbers = responses[0]
            .highlights
            .iter()
            .filter(|r| r.group_name() == "number")
            .count();
        assert_eq!(numbers, 3);
    }

    #[test]
    fn test_worker_thread_round_trip() {
        let handle = spawn_worker(&HighlightConfig::default()).unwrap();
        let timeout = Duration::from_secs(10);

        let mut got_ready = false;
        while let Ok(response) = handle.responses.recv_timeout(timeout) {
            if response == WorkerResponse::Ready {
                got_ready = true;
                break;
            }
        }
        assert!(got_ready);

        handle
            .requests
            .send(WorkerRequest::Register {
                id: BufferId(1),
                filetype: "bash".into(),
                content: "echo hi\n".into(),
            })
            .unwrap();
        handle.requests.send(query(1, 0, 0..1)).unwrap();
        handle.requests.send(WorkerRequest::Shutdown).unwrap();

        let mut saw_highlights = false;
        while let Ok(response) = handle.responses.recv_timeout(timeout) {
            if let WorkerResponse::Highlights { version, .. } = response {
                assert_eq!(version, 0);
                saw_highlights = true;
            }
        }
        assert!(saw_highlights);
        handle.thread.join().unwrap();
    }
}
